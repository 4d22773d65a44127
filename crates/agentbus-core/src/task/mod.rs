//! Multi-step tasks that report progress on the bus and honor cancellation.
//!
//! - `runner` -- `TaskRunner`, the state machine driving a `StepTask`

use agentbus_types::error::TaskError;
use tokio_util::sync::CancellationToken;

pub mod runner;

pub use runner::TaskRunner;

/// A unit of work split into numbered steps.
///
/// Steps run in order, `0..total_steps()`. A step may watch `token` to stop
/// early; the runner also stops waiting on a step once the token fires.
pub trait StepTask: Send + Sync {
    fn name(&self) -> &str;

    fn total_steps(&self) -> usize;

    fn run_step(
        &self,
        step: usize,
        token: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<(), TaskError>> + Send;
}
