//! Multi-step task state and progress payloads.

use serde::{Deserialize, Serialize};

/// Lifecycle of a multi-step task run.
///
/// `Idle -> Running -> {Completed | Cancelled | Failed}`. Terminal states are
/// final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed { reason: String },
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Cancelled | TaskState::Failed { .. }
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Idle => write!(f, "idle"),
            TaskState::Running => write!(f, "running"),
            TaskState::Completed => write!(f, "completed"),
            TaskState::Cancelled => write!(f, "cancelled"),
            TaskState::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Progress report posted as `Notification<TaskProgress>`.
///
/// `step` counts completed steps, so a finished task reports `step == total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub task: String,
    pub step: usize,
    pub total: usize,
    pub state: TaskState,
}

impl TaskProgress {
    /// Completion percentage in `0..=100`. A task with no steps is 100% done.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.step.min(self.total) * 100) / self.total) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TaskState::Idle.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(
            TaskState::Failed {
                reason: "x".to_string()
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_progress_percent() {
        let progress = TaskProgress {
            task: "export".to_string(),
            step: 1,
            total: 4,
            state: TaskState::Running,
        };
        assert_eq!(progress.percent(), 25);

        let empty = TaskProgress {
            task: "noop".to_string(),
            step: 0,
            total: 0,
            state: TaskState::Completed,
        };
        assert_eq!(empty.percent(), 100);
    }

    #[test]
    fn test_task_state_serde_tag() {
        let failed = TaskState::Failed {
            reason: "io".to_string(),
        };
        let json = serde_json::to_string(&failed).unwrap();
        assert_eq!(json, r#"{"state":"failed","reason":"io"}"#);
    }
}
