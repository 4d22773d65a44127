//! Drives a `StepTask` through `Idle -> Running -> {Completed | Cancelled | Failed}`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use agentbus_types::error::TaskError;
use agentbus_types::event::Notification;
use agentbus_types::task::{TaskProgress, TaskState};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::StepTask;
use crate::event::{EventBusExt, SharedEventBus};

/// Runs one task exactly once, posting `Notification<TaskProgress>` at start,
/// after every completed step, and on reaching a terminal state.
pub struct TaskRunner<T> {
    task: T,
    bus: SharedEventBus,
    state: Mutex<TaskState>,
}

impl<T: StepTask> TaskRunner<T> {
    pub fn new(task: T, bus: SharedEventBus) -> Self {
        Self {
            task,
            bus,
            state: Mutex::new(TaskState::Idle),
        }
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn state(&self) -> TaskState {
        self.lock_state().clone()
    }

    /// Run every step in order until done, cancelled, or failed.
    ///
    /// Returns the terminal state on success. Cancellation is checked before
    /// each step and while a step is in flight.
    pub async fn run(&self, token: &CancellationToken) -> Result<TaskState, TaskError> {
        {
            let mut state = self.lock_state();
            if *state != TaskState::Idle {
                return Err(TaskError::AlreadyStarted);
            }
            *state = TaskState::Running;
        }

        let total = self.task.total_steps();
        info!(task = self.task.name(), total, "task started");
        self.transition(0, total, TaskState::Running)?;

        for step in 0..total {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = self.task.run_step(step, token) => Some(result),
            };

            match outcome {
                None => {
                    info!(task = self.task.name(), step, "task cancelled");
                    self.transition(step, total, TaskState::Cancelled)?;
                    return Err(TaskError::Cancelled { step });
                }
                Some(Err(err)) => {
                    warn!(task = self.task.name(), step, error = %err, "task step failed");
                    self.transition(
                        step,
                        total,
                        TaskState::Failed {
                            reason: err.to_string(),
                        },
                    )?;
                    return Err(err);
                }
                Some(Ok(())) => {
                    debug!(task = self.task.name(), step, "task step done");
                    if step + 1 < total {
                        self.transition(step + 1, total, TaskState::Running)?;
                    }
                }
            }
        }

        self.transition(total, total, TaskState::Completed)?;
        info!(task = self.task.name(), "task completed");
        Ok(TaskState::Completed)
    }

    /// Record `state` and post it as progress.
    ///
    /// A failed post (only possible under the propagate failure policy) fails
    /// the task unless it already reached a terminal state.
    fn transition(&self, step: usize, total: usize, state: TaskState) -> Result<(), TaskError> {
        *self.lock_state() = state.clone();

        let progress = TaskProgress {
            task: self.task.name().to_string(),
            step,
            total,
            state,
        };
        if let Err(err) = self
            .bus
            .post_event(Notification::new(self.task.name(), progress))
        {
            let mut current = self.lock_state();
            if !current.is_terminal() {
                *current = TaskState::Failed {
                    reason: err.to_string(),
                };
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: StepTask> std::fmt::Debug for TaskRunner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("task", &self.task.name())
            .field("state", &self.state())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::event::{Dispatcher, typed_listener};
    use agentbus_types::config::{BusConfig, FailurePolicy};
    use agentbus_types::error::{BusError, ListenerError};

    struct Steps {
        total: usize,
        fail_at: Option<usize>,
        hang_at: Option<usize>,
        done: Arc<Mutex<Vec<usize>>>,
    }

    impl Steps {
        fn new(total: usize) -> Self {
            Self {
                total,
                fail_at: None,
                hang_at: None,
                done: Arc::default(),
            }
        }
    }

    impl StepTask for Steps {
        fn name(&self) -> &str {
            "steps"
        }

        fn total_steps(&self) -> usize {
            self.total
        }

        async fn run_step(&self, step: usize, _token: &CancellationToken) -> Result<(), TaskError> {
            if self.hang_at == Some(step) {
                std::future::pending::<()>().await;
            }
            if self.fail_at == Some(step) {
                return Err(TaskError::Step {
                    step,
                    reason: "disk full".to_string(),
                });
            }
            self.done.lock().unwrap().push(step);
            Ok(())
        }
    }

    fn watched_bus() -> (Arc<Dispatcher>, Arc<Mutex<Vec<TaskProgress>>>) {
        let bus = Dispatcher::default().shared();
        let seen: Arc<Mutex<Vec<TaskProgress>>> = Arc::default();
        let sink = Arc::clone(&seen);
        bus.register_for::<Notification<TaskProgress>>(typed_listener(
            "progress",
            move |n: &Notification<TaskProgress>| {
                sink.lock().unwrap().push(n.payload.clone());
                Ok(())
            },
        ))
        .unwrap();
        (bus, seen)
    }

    #[tokio::test]
    async fn runs_all_steps_and_reports_progress() {
        let (bus, seen) = watched_bus();
        let runner = TaskRunner::new(Steps::new(3), bus);

        let state = runner.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(state, TaskState::Completed);
        assert_eq!(*runner.task().done.lock().unwrap(), vec![0, 1, 2]);

        let seen = seen.lock().unwrap();
        let steps: Vec<usize> = seen.iter().map(|p| p.step).collect();
        assert_eq!(steps, vec![0, 1, 2, 3]);
        assert_eq!(seen.last().unwrap().state, TaskState::Completed);
        assert_eq!(seen.last().unwrap().percent(), 100);
    }

    #[tokio::test]
    async fn second_run_is_rejected() {
        let (bus, _) = watched_bus();
        let runner = TaskRunner::new(Steps::new(1), bus);
        runner.run(&CancellationToken::new()).await.unwrap();

        let err = runner.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TaskError::AlreadyStarted));
        assert_eq!(runner.state(), TaskState::Completed);
    }

    #[tokio::test]
    async fn cancelled_before_first_step() {
        let (bus, seen) = watched_bus();
        let runner = TaskRunner::new(Steps::new(2), bus);
        let token = CancellationToken::new();
        token.cancel();

        let err = runner.run(&token).await.unwrap_err();
        assert!(matches!(err, TaskError::Cancelled { step: 0 }));
        assert!(runner.task().done.lock().unwrap().is_empty());
        assert_eq!(runner.state(), TaskState::Cancelled);
        assert_eq!(seen.lock().unwrap().last().unwrap().state, TaskState::Cancelled);
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_running_step() {
        let (bus, _) = watched_bus();
        let mut task = Steps::new(3);
        task.hang_at = Some(1);
        let runner = TaskRunner::new(task, bus);

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = runner.run(&token).await.unwrap_err();
        assert!(matches!(err, TaskError::Cancelled { step: 1 }));
        assert_eq!(*runner.task().done.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn failing_step_fails_the_task() {
        let (bus, seen) = watched_bus();
        let mut task = Steps::new(4);
        task.fail_at = Some(2);
        let runner = TaskRunner::new(task, bus);

        let err = runner.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TaskError::Step { step: 2, .. }));
        assert!(matches!(runner.state(), TaskState::Failed { ref reason } if reason.contains("disk full")));

        let last = seen.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.step, 2);
        assert!(matches!(last.state, TaskState::Failed { .. }));
    }

    #[tokio::test]
    async fn rejected_progress_fails_under_propagate() {
        let bus = Dispatcher::new(BusConfig {
            failure_policy: FailurePolicy::Propagate,
            ..BusConfig::default()
        })
        .shared();
        bus.register_for::<Notification<TaskProgress>>(typed_listener(
            "picky",
            |_: &Notification<TaskProgress>| Err(ListenerError::Rejected("no".to_string())),
        ))
        .unwrap();

        let runner = TaskRunner::new(Steps::new(2), bus);
        let err = runner.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TaskError::Bus(BusError::ListenerFailed { .. })));
        assert!(matches!(runner.state(), TaskState::Failed { .. }));
        assert!(runner.task().done.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_step_task_completes_immediately() {
        let (bus, seen) = watched_bus();
        let runner = TaskRunner::new(Steps::new(0), bus);
        assert_eq!(
            runner.run(&CancellationToken::new()).await.unwrap(),
            TaskState::Completed
        );
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
