//! Agents: components that only talk to each other through the bus.
//!
//! - `context` -- `AgentContext`, the bus handle and cancellation token given to an agent
//! - `container` -- `AgentContainer`, ordered activation, rollback, and shutdown

use agentbus_types::error::AgentError;

pub mod container;
pub mod context;

pub use container::AgentContainer;
pub use context::AgentContext;

/// A component hosted by an `AgentContainer`.
///
/// `activate` typically registers listeners through `AgentContext::subscribe`;
/// anything registered that way is removed automatically when the agent stops.
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn activate(&self, ctx: &AgentContext) -> Result<(), AgentError>;

    fn terminate(&self, _ctx: &AgentContext) -> Result<(), AgentError> {
        Ok(())
    }
}
