//! Infrastructure layer for agentbus.
//!
//! Everything that touches the environment lives here: locating the data
//! directory and reading `agentbus.toml` from it.

pub mod config;
pub mod filesystem;
