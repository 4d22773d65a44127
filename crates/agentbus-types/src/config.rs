//! Configuration types for agentbus.
//!
//! `AppConfig` represents the top-level `agentbus.toml` that controls bus
//! failure handling, queue monitoring, and log output. Every field has a
//! default so an empty or missing file is valid.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What the dispatcher does when a listener fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and keep delivering to the remaining listeners.
    #[default]
    Isolate,
    /// End the dispatch session and surface the failure to the poster.
    Propagate,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Isolate => write!(f, "isolate"),
            FailurePolicy::Propagate => write!(f, "propagate"),
        }
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Pending-queue depth above which the dispatcher logs a warning.
    #[serde(default = "default_queue_warn_depth")]
    pub queue_warn_depth: usize,

    /// Log every listener delivery at trace level.
    #[serde(default)]
    pub trace_deliveries: bool,
}

fn default_queue_warn_depth() -> usize {
    256
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            queue_warn_depth: default_queue_warn_depth(),
            trace_deliveries: false,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,

    /// Bridge spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}
