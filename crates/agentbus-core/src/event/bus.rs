//! The `EventBus` contract shared by every agent.
//!
//! Agents only ever see `Arc<dyn EventBus>`: they register listeners for the
//! event kinds they care about, remove them when they stop, and post events
//! without naming the receiver.

use std::sync::Arc;

use agentbus_types::error::BusError;
use agentbus_types::event::{Event, EventKind};
use serde::Serialize;

use super::listener::EventListener;
use crate::request::{Payload, PendingResponse, RequestEvent};

/// Shared handle to a bus, as handed to agents.
pub type SharedEventBus = Arc<dyn EventBus>;

/// Publish/subscribe demultiplexer keyed by exact event kind.
pub trait EventBus: Send + Sync {
    /// Add `listener` to the interest list of every kind in `kinds`.
    ///
    /// Idempotent per (listener, kind): a listener registered twice for a kind
    /// still receives each event of that kind once.
    fn register(
        &self,
        listener: Arc<dyn EventListener>,
        kinds: &[EventKind],
    ) -> Result<Registration, BusError>;

    /// Remove `listener` from the interest list of every kind in `kinds`.
    ///
    /// Returns the number of interest entries removed. Removing a listener
    /// that was never registered is not an error.
    fn remove(&self, listener: &Arc<dyn EventListener>, kinds: &[EventKind]) -> usize;

    /// Post an event for delivery.
    ///
    /// Starts a dispatch session if none is active; otherwise the event is
    /// queued and delivered by the active session before it ends.
    fn post(&self, event: Arc<dyn Event>) -> Result<PostOutcome, BusError>;
}

/// Result of a `register` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    /// Kinds the listener was newly added to.
    pub added: Vec<EventKind>,
    /// Kinds the listener was already registered for.
    pub existing: Vec<EventKind>,
}

impl Registration {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
    }
}

/// What happened to a posted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PostOutcome {
    /// This call opened a dispatch session and drained the queue.
    Dispatched {
        /// Events drained, including ones queued by listeners along the way.
        events: usize,
        /// Successful listener invocations across those events.
        deliveries: usize,
    },
    /// A session was already active; the event waits in the queue.
    Queued { depth: usize },
}

/// Typed convenience methods available on every bus, including `dyn EventBus`.
pub trait EventBusExt: EventBus {
    /// Post a concrete event.
    fn post_event<E: Event>(&self, event: E) -> Result<PostOutcome, BusError> {
        self.post(Arc::new(event))
    }

    /// Register `listener` for the single kind `E`.
    fn register_for<E: Event>(
        &self,
        listener: Arc<dyn EventListener>,
    ) -> Result<Registration, BusError> {
        self.register(listener, &[EventKind::of::<E>()])
    }

    /// Remove `listener` from the single kind `E`.
    fn remove_for<E: Event>(&self, listener: &Arc<dyn EventListener>) -> usize {
        self.remove(listener, &[EventKind::of::<E>()])
    }

    /// Post a request and return a future resolving to its response.
    ///
    /// Any completion handler already attached to `request` is replaced.
    fn request<Q, A>(&self, request: RequestEvent<Q, A>) -> Result<PendingResponse<Q, A>, BusError>
    where
        Q: Payload,
        A: Payload,
    {
        let pending = request.response_channel()?;
        self.post(Arc::new(request))?;
        Ok(pending)
    }
}

impl<B: EventBus + ?Sized> EventBusExt for B {}
