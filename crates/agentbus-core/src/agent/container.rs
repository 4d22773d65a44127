//! Ordered lifecycle management for agents sharing one bus.

use std::sync::Arc;

use agentbus_types::agent::{AgentStarted, AgentStopped, StopReason};
use agentbus_types::config::BusConfig;
use agentbus_types::error::AgentError;
use agentbus_types::event::Notification;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Agent, AgentContext};
use crate::event::{Dispatcher, EventBusExt, SharedEventBus};

/// Source name used for lifecycle notifications.
pub const CONTAINER_SOURCE: &str = "container";

/// Owns the bus and the agents attached to it.
///
/// Agents are activated in insertion order and terminated in reverse order.
/// Dropping a started container shuts it down.
pub struct AgentContainer {
    config: Arc<BusConfig>,
    bus: Arc<Dispatcher>,
    agents: Vec<Arc<dyn Agent>>,
    running: Vec<(Arc<dyn Agent>, AgentContext)>,
    root: CancellationToken,
    started: bool,
}

impl AgentContainer {
    pub fn new(config: BusConfig) -> Self {
        let bus = Dispatcher::new(config.clone()).shared();
        Self {
            config: Arc::new(bus.config().clone()),
            bus,
            agents: Vec::new(),
            running: Vec::new(),
            root: CancellationToken::new(),
            started: false,
        }
    }

    /// Queue an agent for activation. Agents added after `start` are picked
    /// up by the next `start` following a `shutdown`.
    pub fn add(&mut self, agent: Arc<dyn Agent>) -> &mut Self {
        debug!(agent = agent.name(), "agent added");
        self.agents.push(agent);
        self
    }

    pub fn bus(&self) -> &Arc<Dispatcher> {
        &self.bus
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Names of the active agents in activation order.
    pub fn running(&self) -> Vec<&str> {
        self.running.iter().map(|(agent, _)| agent.name()).collect()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.iter().any(|(agent, _)| agent.name() == name)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Activate every agent in insertion order.
    ///
    /// Stops at the first activation failure: the failing agent's listeners
    /// are released, agents already running are rolled back in reverse order,
    /// and the error is returned.
    pub fn start(&mut self) -> Result<(), AgentError> {
        if self.started {
            return Err(AgentError::AlreadyStarted);
        }
        self.started = true;

        for agent in self.agents.clone() {
            let ctx = AgentContext::new(
                agent.name(),
                Arc::clone(&self.bus) as SharedEventBus,
                Arc::clone(&self.config),
                self.root.child_token(),
            );

            if let Err(err) = agent.activate(&ctx) {
                error!(agent = agent.name(), error = %err, "agent activation failed, rolling back");
                ctx.cancellation().cancel();
                ctx.release();
                self.stop_running(StopReason::RolledBack);
                self.reset();
                return Err(err);
            }

            info!(agent = agent.name(), "agent activated");
            self.running.push((Arc::clone(&agent), ctx));
            self.announce(AgentStarted {
                agent: agent.name().to_string(),
            });
        }

        Ok(())
    }

    /// Cancel the root token and terminate running agents in reverse order.
    ///
    /// Termination failures are logged and do not stop the remaining agents.
    /// Returns the number of agents stopped.
    pub fn shutdown(&mut self) -> usize {
        if !self.started {
            return 0;
        }
        self.root.cancel();
        let stopped = self.stop_running(StopReason::Shutdown);
        self.reset();
        info!(stopped, "container shut down");
        stopped
    }

    fn stop_running(&mut self, reason: StopReason) -> usize {
        let mut stopped = 0;
        while let Some((agent, ctx)) = self.running.pop() {
            ctx.cancellation().cancel();
            if let Err(err) = agent.terminate(&ctx) {
                warn!(agent = agent.name(), error = %err, "agent termination failed");
            }
            let removed = ctx.release();
            debug!(agent = agent.name(), removed, ?reason, "agent stopped");
            self.announce(AgentStopped {
                agent: agent.name().to_string(),
                reason,
            });
            stopped += 1;
        }
        stopped
    }

    fn reset(&mut self) {
        self.started = false;
        self.root = CancellationToken::new();
    }

    fn announce<T>(&self, payload: T)
    where
        T: Send + Sync + std::fmt::Debug + 'static,
    {
        if let Err(err) = self.bus.post_event(Notification::new(CONTAINER_SOURCE, payload)) {
            warn!(error = %err, "failed to post lifecycle notification");
        }
    }
}

impl Drop for AgentContainer {
    fn drop(&mut self) {
        if self.started {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for AgentContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContainer")
            .field("agents", &self.agents.len())
            .field("running", &self.running())
            .field("started", &self.started)
            .finish()
    }
}
