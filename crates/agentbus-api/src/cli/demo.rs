//! `abus demo` -- a small agent society exercising the bus end to end.
//!
//! Four agents share one container: a pinger, a ping counter, an echo
//! responder answering `EchoRequest`s, and a reporter collecting task
//! progress. The command posts pings, performs one request/response round
//! trip, runs a short multi-step task, shuts down, and prints bus statistics.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use agentbus_core::agent::{Agent, AgentContainer, AgentContext};
use agentbus_core::event::{BusStats, EventBusExt, SharedEventBus, typed_listener};
use agentbus_core::request::RequestEvent;
use agentbus_core::task::{StepTask, TaskRunner};
use agentbus_types::config::BusConfig;
use agentbus_types::error::{AgentError, TaskError};
use agentbus_types::event::{Event, EventMeta, Notification};
use agentbus_types::task::{TaskProgress, TaskState};

use crate::state::AppState;

const ECHO_TIMEOUT: Duration = Duration::from_secs(2);
const STEP_DELAY: Duration = Duration::from_millis(25);

/// A numbered ping.
#[derive(Debug)]
pub struct Ping {
    meta: EventMeta,
    pub seq: u32,
}

impl Ping {
    pub fn new(source: &str, seq: u32) -> Self {
        Self {
            meta: EventMeta::new(source),
            seq,
        }
    }
}

impl Event for Ping {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

/// Ask the echo responder to shout a message back.
pub type EchoRequest = RequestEvent<String, String>;

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Posts pings through its own context while running.
#[derive(Default)]
pub struct Pinger {
    ctx: Mutex<Option<AgentContext>>,
}

impl Pinger {
    /// Post `count` pings. Returns how many were accepted by the bus.
    pub fn ping(&self, count: u32) -> Result<u32, AgentError> {
        let ctx = self
            .ctx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| AgentError::NotRunning {
                agent: self.name().to_string(),
            })?;

        for seq in 1..=count {
            ctx.post(Ping::new(ctx.agent_name(), seq))?;
        }
        Ok(count)
    }
}

impl Agent for Pinger {
    fn name(&self) -> &str {
        "pinger"
    }

    fn activate(&self, ctx: &AgentContext) -> Result<(), AgentError> {
        *self.ctx.lock().unwrap_or_else(PoisonError::into_inner) = Some(ctx.clone());
        Ok(())
    }

    fn terminate(&self, _ctx: &AgentContext) -> Result<(), AgentError> {
        self.ctx.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}

/// Counts every ping it sees.
#[derive(Default)]
pub struct PingCounter {
    seen: Arc<AtomicU32>,
}

impl PingCounter {
    pub fn count(&self) -> u32 {
        self.seen.load(Ordering::SeqCst)
    }
}

impl Agent for PingCounter {
    fn name(&self) -> &str {
        "ping-counter"
    }

    fn activate(&self, ctx: &AgentContext) -> Result<(), AgentError> {
        let seen = Arc::clone(&self.seen);
        ctx.subscribe_to::<Ping>(typed_listener(self.name(), move |ping: &Ping| {
            seen.fetch_add(1, Ordering::SeqCst);
            debug!(seq = ping.seq, source = ping.source(), "ping counted");
            Ok(())
        }))?;
        Ok(())
    }
}

/// Answers every `EchoRequest` with its payload in upper case.
pub struct EchoResponder;

impl Agent for EchoResponder {
    fn name(&self) -> &str {
        "echo"
    }

    fn activate(&self, ctx: &AgentContext) -> Result<(), AgentError> {
        let me = ctx.agent_name().to_string();
        ctx.subscribe_to::<EchoRequest>(typed_listener(
            self.name(),
            move |request: &EchoRequest| {
                request
                    .respond(me.as_str(), request.payload().to_uppercase())
                    .map_err(anyhow::Error::from)?;
                Ok(())
            },
        ))?;
        Ok(())
    }
}

/// Collects task progress notifications.
#[derive(Default)]
pub struct TaskReporter {
    progress: Arc<Mutex<Vec<TaskProgress>>>,
}

impl TaskReporter {
    pub fn progress(&self) -> Vec<TaskProgress> {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Agent for TaskReporter {
    fn name(&self) -> &str {
        "task-reporter"
    }

    fn activate(&self, ctx: &AgentContext) -> Result<(), AgentError> {
        let progress = Arc::clone(&self.progress);
        ctx.subscribe_to::<Notification<TaskProgress>>(typed_listener(
            self.name(),
            move |n: &Notification<TaskProgress>| {
                debug!(
                    task = %n.payload.task,
                    step = n.payload.step,
                    percent = n.payload.percent(),
                    state = %n.payload.state,
                    "task progress"
                );
                progress
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(n.payload.clone());
                Ok(())
            },
        ))?;
        Ok(())
    }
}

/// A task whose steps just wait a little.
pub struct Countdown {
    steps: usize,
    delay: Duration,
}

impl StepTask for Countdown {
    fn name(&self) -> &str {
        "countdown"
    }

    fn total_steps(&self) -> usize {
        self.steps
    }

    async fn run_step(&self, step: usize, token: &CancellationToken) -> Result<(), TaskError> {
        tokio::select! {
            _ = token.cancelled() => Err(TaskError::Cancelled { step }),
            _ = tokio::time::sleep(self.delay) => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Everything the demo observed.
#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub pings_sent: u32,
    pub pings_counted: u32,
    pub echo: String,
    pub task_state: TaskState,
    pub progress: Vec<TaskProgress>,
    pub agents_stopped: usize,
    pub stats: BusStats,
}

/// Run the demo against `config` and return what happened.
pub async fn run_demo(config: BusConfig, pings: u32, steps: usize) -> Result<DemoReport> {
    let pinger = Arc::new(Pinger::default());
    let counter = Arc::new(PingCounter::default());
    let reporter = Arc::new(TaskReporter::default());

    let mut container = AgentContainer::new(config);
    container
        .add(pinger.clone())
        .add(counter.clone())
        .add(Arc::new(EchoResponder))
        .add(reporter.clone());
    container.start()?;

    let pings_sent = pinger.ping(pings)?;

    let echo = container
        .bus()
        .request(EchoRequest::new("demo", "hello, agents".to_string()))?
        .recv_timeout(ECHO_TIMEOUT)
        .await?
        .into_payload();

    let bus: SharedEventBus = container.bus().clone();
    let runner = TaskRunner::new(
        Countdown {
            steps,
            delay: STEP_DELAY,
        },
        bus,
    );
    let task_state = runner.run(&CancellationToken::new()).await?;

    let agents_stopped = container.shutdown();

    Ok(DemoReport {
        pings_sent,
        pings_counted: counter.count(),
        echo,
        task_state,
        progress: reporter.progress(),
        agents_stopped,
        stats: container.bus().stats(),
    })
}

/// `abus demo` entry point.
pub async fn demo(state: &AppState, pings: u32, steps: usize, json: bool) -> Result<()> {
    let report = run_demo(state.config().bus.clone(), pings, steps).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Pings: {} sent, {} counted",
        style("●").cyan(),
        style(report.pings_sent).bold(),
        style(report.pings_counted).bold()
    );
    println!(
        "  {} Echo:  {}",
        style("●").cyan(),
        style(&report.echo).green()
    );
    println!(
        "  {} Task:  {} ({} progress events)",
        style("●").cyan(),
        style(&report.task_state).green(),
        report.progress.len()
    );
    println!(
        "  {} Agents stopped: {}",
        style("●").cyan(),
        report.agents_stopped
    );
    println!();
    println!("{}", stats_table(&report.stats));
    println!();

    Ok(())
}

fn stats_table(stats: &BusStats) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Counter").fg(Color::White),
        Cell::new("Value").fg(Color::White),
    ]);

    let failures_color = if stats.listener_failures > 0 {
        Color::Red
    } else {
        Color::Green
    };
    let rows = [
        ("posted", stats.posted, Color::Cyan),
        ("dispatched", stats.dispatched, Color::Cyan),
        ("deliveries", stats.deliveries, Color::Cyan),
        ("listener failures", stats.listener_failures, failures_color),
        ("unrouted", stats.unrouted, Color::DarkGrey),
    ];
    for (name, value, color) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value).fg(color)]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_exercises_every_agent() {
        let report = run_demo(BusConfig::default(), 4, 2).await.unwrap();

        assert_eq!(report.pings_sent, 4);
        assert_eq!(report.pings_counted, 4);
        assert_eq!(report.echo, "HELLO, AGENTS");
        assert_eq!(report.task_state, TaskState::Completed);
        assert_eq!(report.agents_stopped, 4);
        assert_eq!(report.stats.listener_failures, 0);

        let steps: Vec<usize> = report.progress.iter().map(|p| p.step).collect();
        assert_eq!(steps, vec![0, 1, 2]);
    }

    #[test]
    fn pinger_refuses_when_stopped() {
        let pinger = Pinger::default();
        assert!(matches!(pinger.ping(1), Err(AgentError::NotRunning { .. })));
    }

    #[test]
    fn stats_table_lists_every_counter() {
        let rendered = stats_table(&BusStats {
            posted: 7,
            ..BusStats::default()
        })
        .to_string();
        assert!(rendered.contains("posted"));
        assert!(rendered.contains("unrouted"));
        assert!(rendered.contains('7'));
    }
}
