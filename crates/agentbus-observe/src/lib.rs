//! Observability setup for agentbus binaries.

pub mod tracing_setup;
