//! Event dispatch core for agentbus.
//!
//! Agents never call each other directly: they register listeners for the
//! event kinds they care about and post events to a shared bus. This crate
//! holds the bus itself, the request/response correlation built on top of it,
//! the agent container, and the multi-step task runner. It depends only on
//! `agentbus-types` -- never on `agentbus-infra` or any IO crate.

pub mod agent;
pub mod event;
pub mod request;
pub mod task;
