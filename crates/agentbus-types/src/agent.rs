//! Agent lifecycle payloads.
//!
//! The container posts these as `Notification<AgentStarted>` and
//! `Notification<AgentStopped>` so other agents can react to peers coming
//! and going without naming them.

use serde::{Deserialize, Serialize};

/// An agent finished activating and its listeners are live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStarted {
    pub agent: String,
}

/// An agent was terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStopped {
    pub agent: String,
    pub reason: StopReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Normal container shutdown.
    Shutdown,
    /// Rolled back because a later agent failed to activate.
    RolledBack,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_stopped_serde_roundtrip() {
        let stopped = AgentStopped {
            agent: "viewer".to_string(),
            reason: StopReason::RolledBack,
        };
        let json = serde_json::to_string(&stopped).unwrap();
        assert!(json.contains("\"rolled_back\""));
        let parsed: AgentStopped = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stopped);
    }
}
