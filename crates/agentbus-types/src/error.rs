use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors from event bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("registration for '{listener}' named no event kinds")]
    NoEventKinds { listener: String },

    #[error("listener '{listener}' failed on {kind}: {reason}")]
    ListenerFailed {
        listener: String,
        kind: String,
        reason: String,
    },

    #[error("request {request} was already completed")]
    AlreadyCompleted { request: Uuid },

    #[error("request {request} was dropped without a response")]
    Abandoned { request: Uuid },

    #[error("no response after {0:?}")]
    Timeout(Duration),
}

/// Error returned by a listener callback.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("event rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from agent lifecycle operations.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent '{agent}' failed to activate: {reason}")]
    Activation { agent: String, reason: String },

    #[error("agent '{agent}' failed to terminate: {reason}")]
    Termination { agent: String, reason: String },

    #[error("agent '{agent}' is not running")]
    NotRunning { agent: String },

    #[error("container already started")]
    AlreadyStarted,

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Errors from multi-step task execution.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("step {step} failed: {reason}")]
    Step { step: usize, reason: String },

    #[error("cancelled before step {step}")]
    Cancelled { step: usize },

    #[error("task already started")]
    AlreadyStarted,

    #[error(transparent)]
    Bus(#[from] BusError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_display() {
        let err = BusError::ListenerFailed {
            listener: "counter".to_string(),
            kind: "Notification<Ping>".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "listener 'counter' failed on Notification<Ping>: boom"
        );
    }

    #[test]
    fn test_listener_error_from_anyhow() {
        let err: ListenerError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.to_string(), "disk full");
        assert!(matches!(err, ListenerError::Other(_)));
    }

    #[test]
    fn test_agent_error_wraps_bus_error() {
        let err: AgentError = BusError::NoEventKinds {
            listener: "viewer".to_string(),
        }
        .into();
        assert!(err.to_string().contains("viewer"));
    }

    #[test]
    fn test_task_error_display() {
        let err = TaskError::Cancelled { step: 3 };
        assert_eq!(err.to_string(), "cancelled before step 3");
    }
}
