//! Shared domain types for agentbus.
//!
//! The event ancestor trait, event metadata and kinds, configuration, lifecycle
//! payloads, and the error types used across the workspace.
//!
//! No async or IO dependencies -- only serde, serde_json, uuid, chrono, thiserror, anyhow.

pub mod agent;
pub mod config;
pub mod error;
pub mod event;
pub mod task;
