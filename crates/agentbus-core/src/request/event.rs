//! `RequestEvent` and `ResponseEvent`.
//!
//! Every clone of a request shares one completion slot. The slot moves from
//! awaiting to completed exactly once: the first `ResponseEvent::complete`
//! wins, later ones get `BusError::AlreadyCompleted`. A response that arrives
//! before anyone is waiting for it is parked in the slot and handed over as
//! soon as a handler or channel is attached.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use agentbus_types::error::BusError;
use agentbus_types::event::{Event, EventMeta};
use tokio::sync::oneshot;
use tracing::{debug, trace};
use uuid::Uuid;

use super::Payload;
use super::pending::PendingResponse;

type Handler<Q, A> = Box<dyn FnOnce(&RequestEvent<Q, A>, &ResponseEvent<Q, A>) + Send>;

/// Where a completed response goes.
enum Target<Q, A> {
    Handler(Handler<Q, A>),
    Channel(oneshot::Sender<ResponseEvent<Q, A>>),
}

struct Slot<Q, A> {
    target: Option<Target<Q, A>>,
    completed: bool,
    /// Response parts held until a target is attached. Stored without the
    /// request handle so the slot never owns its own request.
    parked: Option<(EventMeta, A)>,
}

struct Inner<Q, A> {
    meta: EventMeta,
    payload: Q,
    slot: Mutex<Slot<Q, A>>,
}

/// An event that expects exactly one targeted reply.
///
/// Cloning is cheap and every clone refers to the same correlation slot.
pub struct RequestEvent<Q, A> {
    inner: Arc<Inner<Q, A>>,
}

impl<Q: Payload, A: Payload> RequestEvent<Q, A> {
    pub fn new(source: impl Into<String>, payload: Q) -> Self {
        Self::with_meta(EventMeta::new(source), payload)
    }

    pub fn with_meta(meta: EventMeta, payload: Q) -> Self {
        Self {
            inner: Arc::new(Inner {
                meta,
                payload,
                slot: Mutex::new(Slot {
                    target: None,
                    completed: false,
                    parked: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.meta.id
    }

    pub fn payload(&self) -> &Q {
        &self.inner.payload
    }

    /// True once a response has been accepted, whether or not it has been
    /// handed to a handler yet.
    pub fn is_completed(&self) -> bool {
        self.lock_slot().completed
    }

    /// Install the callback that receives the response.
    ///
    /// May be called before or after the request is posted. If the response
    /// is already parked, `handler` runs immediately on the calling thread.
    /// Installing a second handler before completion replaces the first.
    pub fn set_completion_handler<F>(&self, handler: F) -> Result<(), BusError>
    where
        F: FnOnce(&RequestEvent<Q, A>, &ResponseEvent<Q, A>) + Send + 'static,
    {
        self.attach(Target::Handler(Box::new(handler)))
    }

    /// Attach a oneshot channel as the completion target and return the
    /// receiving side as a future.
    pub fn response_channel(&self) -> Result<PendingResponse<Q, A>, BusError> {
        let (tx, rx) = oneshot::channel();
        self.attach(Target::Channel(tx))?;
        Ok(PendingResponse::new(self.id(), rx))
    }

    /// Build and complete a response in one call.
    pub fn respond(&self, source: impl Into<String>, payload: A) -> Result<(), BusError> {
        ResponseEvent::new(source, self, payload).complete()
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot<Q, A>> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attach(&self, target: Target<Q, A>) -> Result<(), BusError> {
        let (meta, payload) = {
            let mut slot = self.lock_slot();
            match slot.parked.take() {
                Some(parts) => parts,
                None if slot.completed => {
                    return Err(BusError::AlreadyCompleted { request: self.id() });
                }
                None => {
                    if slot.target.replace(target).is_some() {
                        debug!(request = %self.id(), "replaced completion target");
                    }
                    return Ok(());
                }
            }
        };

        trace!(request = %self.id(), "delivering parked response");
        self.fire(
            target,
            ResponseEvent {
                meta,
                request: self.clone(),
                payload,
            },
        );
        Ok(())
    }

    /// Called by `ResponseEvent::complete`.
    fn handle_completion(&self, response: ResponseEvent<Q, A>) -> Result<(), BusError> {
        let target = {
            let mut slot = self.lock_slot();
            if slot.completed {
                return Err(BusError::AlreadyCompleted { request: self.id() });
            }
            slot.completed = true;
            match slot.target.take() {
                Some(target) => target,
                None => {
                    trace!(request = %self.id(), "response parked until a handler is attached");
                    slot.parked = Some((response.meta, response.payload));
                    return Ok(());
                }
            }
        };

        self.fire(target, response);
        Ok(())
    }

    /// Hand the response to its target. Never called with the slot locked.
    fn fire(&self, target: Target<Q, A>, response: ResponseEvent<Q, A>) {
        match target {
            Target::Handler(handler) => handler(self, &response),
            Target::Channel(tx) => {
                if tx.send(response).is_err() {
                    debug!(request = %self.id(), "response receiver dropped before completion");
                }
            }
        }
    }
}

impl<Q, A> Clone for RequestEvent<Q, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Q: Payload, A: Payload> fmt::Debug for RequestEvent<Q, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestEvent")
            .field("id", &self.inner.meta.id)
            .field("source", &self.inner.meta.source)
            .field("payload", &self.inner.payload)
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl<Q: Payload, A: Payload> Event for RequestEvent<Q, A> {
    fn meta(&self) -> &EventMeta {
        &self.inner.meta
    }
}

/// The reply to one `RequestEvent`.
pub struct ResponseEvent<Q, A> {
    meta: EventMeta,
    request: RequestEvent<Q, A>,
    payload: A,
}

impl<Q: Payload, A: Payload> ResponseEvent<Q, A> {
    pub fn new(source: impl Into<String>, request: &RequestEvent<Q, A>, payload: A) -> Self {
        Self {
            meta: EventMeta::new(source),
            request: request.clone(),
            payload,
        }
    }

    pub fn request(&self) -> &RequestEvent<Q, A> {
        &self.request
    }

    pub fn payload(&self) -> &A {
        &self.payload
    }

    pub fn into_payload(self) -> A {
        self.payload
    }

    /// Deliver this response to the request's completion target.
    pub fn complete(self) -> Result<(), BusError> {
        let request = self.request.clone();
        request.handle_completion(self)
    }
}

impl<Q: Payload, A: Payload + Clone> Clone for ResponseEvent<Q, A> {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            request: self.request.clone(),
            payload: self.payload.clone(),
        }
    }
}

impl<Q: Payload, A: Payload> fmt::Debug for ResponseEvent<Q, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseEvent")
            .field("id", &self.meta.id)
            .field("source", &self.meta.source)
            .field("request", &self.request.id())
            .field("payload", &self.payload)
            .finish()
    }
}

impl<Q: Payload, A: Payload> Event for ResponseEvent<Q, A> {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}
