//! Request/response correlation layered on top of the plain event bus.
//!
//! - `event` -- `RequestEvent` and `ResponseEvent`, correlated by a shared
//!   single-shot completion slot
//! - `pending` -- `PendingResponse`, the future returned by `EventBusExt::request`
//!
//! The bus itself knows nothing about requests: a `RequestEvent` is routed like
//! any other event, and the responding listener completes it directly.

use std::fmt;

pub mod event;
pub mod pending;

pub use event::{RequestEvent, ResponseEvent};
pub use pending::PendingResponse;

/// Bound for request and response payloads.
pub trait Payload: Send + Sync + fmt::Debug + 'static {}

impl<T: Send + Sync + fmt::Debug + 'static> Payload for T {}
