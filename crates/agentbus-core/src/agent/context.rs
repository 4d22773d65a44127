//! Per-agent context handed to `Agent::activate` and `Agent::terminate`.
//!
//! `AgentContext` bundles the shared bus handle, the bus configuration, and a
//! cancellation token derived from the container's root token. Listeners
//! registered through `subscribe` are tracked so the container can remove
//! every one of them when the agent stops, even if the agent forgets.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use agentbus_types::config::BusConfig;
use agentbus_types::error::BusError;
use agentbus_types::event::{Event, EventKind};
use tokio_util::sync::CancellationToken;

use crate::event::{EventBusExt, EventListener, PostOutcome, Registration, SharedEventBus};

struct Subscription {
    listener: Arc<dyn EventListener>,
    kinds: Vec<EventKind>,
}

/// Shared execution context for one agent.
///
/// Clones share the same subscription list and cancellation token.
#[derive(Clone)]
pub struct AgentContext {
    agent: String,
    bus: SharedEventBus,
    config: Arc<BusConfig>,
    cancellation: CancellationToken,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl AgentContext {
    pub fn new(
        agent: impl Into<String>,
        bus: SharedEventBus,
        config: Arc<BusConfig>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            agent: agent.into(),
            bus,
            config,
            cancellation,
            subscriptions: Arc::default(),
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.agent
    }

    pub fn bus(&self) -> &SharedEventBus {
        &self.bus
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Cancelled when the container shuts down or rolls this agent back.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Register `listener` on the bus and remember it for `release`.
    pub fn subscribe(
        &self,
        listener: Arc<dyn EventListener>,
        kinds: &[EventKind],
    ) -> Result<Registration, BusError> {
        let registration = self.bus.register(Arc::clone(&listener), kinds)?;
        if !registration.is_noop() {
            self.lock_subscriptions().push(Subscription {
                listener,
                kinds: registration.added.clone(),
            });
        }
        Ok(registration)
    }

    pub fn subscribe_to<E: Event>(
        &self,
        listener: Arc<dyn EventListener>,
    ) -> Result<Registration, BusError> {
        self.subscribe(listener, &[EventKind::of::<E>()])
    }

    pub fn post<E: Event>(&self, event: E) -> Result<PostOutcome, BusError> {
        self.bus.post_event(event)
    }

    /// Remove every listener registered through this context.
    ///
    /// Returns the number of interest entries removed.
    pub fn release(&self) -> usize {
        let subscriptions = std::mem::take(&mut *self.lock_subscriptions());
        subscriptions
            .iter()
            .map(|sub| self.bus.remove(&sub.listener, &sub.kinds))
            .sum()
    }

    /// Number of tracked `subscribe` calls not yet released.
    pub fn subscription_count(&self) -> usize {
        self.lock_subscriptions().len()
    }

    fn lock_subscriptions(&self) -> MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("agent", &self.agent)
            .field("subscriptions", &self.subscription_count())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Dispatcher, listener_fn};
    use agentbus_types::event::Notification;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context(bus: &Arc<Dispatcher>) -> AgentContext {
        AgentContext::new(
            "tester",
            Arc::clone(bus) as SharedEventBus,
            Arc::new(BusConfig::default()),
            CancellationToken::new(),
        )
    }

    #[test]
    fn subscribe_then_release_removes_everything() {
        let bus = Dispatcher::default().shared();
        let ctx = context(&bus);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let listener = listener_fn("counter", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        ctx.subscribe(
            Arc::clone(&listener),
            &[
                EventKind::of::<Notification<u8>>(),
                EventKind::of::<Notification<u16>>(),
            ],
        )
        .unwrap();
        ctx.post(Notification::new("tester", 1_u8)).unwrap();
        ctx.post(Notification::new("tester", 2_u16)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert_eq!(ctx.release(), 2);
        assert_eq!(ctx.subscription_count(), 0);
        assert!(bus.registered_kinds().is_empty());

        ctx.post(Notification::new("tester", 3_u8)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn repeated_subscribe_is_tracked_once() {
        let bus = Dispatcher::default().shared();
        let ctx = context(&bus);
        let listener = listener_fn("noop", |_| Ok(()));

        ctx.subscribe_to::<Notification<u8>>(Arc::clone(&listener)).unwrap();
        let again = ctx.subscribe_to::<Notification<u8>>(listener).unwrap();
        assert!(again.is_noop());
        assert_eq!(ctx.subscription_count(), 1);
        assert_eq!(ctx.release(), 1);
    }

    #[test]
    fn clones_share_subscriptions_and_token() {
        let bus = Dispatcher::default().shared();
        let ctx = context(&bus);
        let copy = ctx.clone();

        copy.subscribe_to::<Notification<u8>>(listener_fn("noop", |_| Ok(())))
            .unwrap();
        assert_eq!(ctx.subscription_count(), 1);

        ctx.cancellation().cancel();
        assert!(copy.is_cancelled());
        assert_eq!(copy.agent_name(), "tester");
    }
}
