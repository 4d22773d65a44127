//! Listener contract for the event bus.
//!
//! A listener receives one event at a time on the posting thread. Listeners
//! are shared as `Arc<dyn EventListener>`; the bus compares them by pointer
//! identity, never by value.

use std::marker::PhantomData;
use std::sync::Arc;

use agentbus_types::error::ListenerError;
use agentbus_types::event::Event;

/// Callback invoked by the bus for every event of a kind the listener is
/// registered for.
pub trait EventListener: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Receive one event.
    fn on_event(&self, event: &dyn Event) -> Result<(), ListenerError>;
}

/// True when both handles point at the same listener instance.
pub fn same_listener(a: &Arc<dyn EventListener>, b: &Arc<dyn EventListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Listener backed by a closure over `&dyn Event`.
pub struct FnListener<F> {
    name: String,
    callback: F,
}

impl<F> EventListener for FnListener<F>
where
    F: Fn(&dyn Event) -> Result<(), ListenerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &dyn Event) -> Result<(), ListenerError> {
        (self.callback)(event)
    }
}

/// Build a shared listener from a closure.
pub fn listener_fn<F>(name: impl Into<String>, callback: F) -> Arc<dyn EventListener>
where
    F: Fn(&dyn Event) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    Arc::new(FnListener {
        name: name.into(),
        callback,
    })
}

/// Listener that only handles one concrete event type.
///
/// Events of any other type are ignored, which keeps a listener registered
/// for several kinds from having to downcast by hand.
pub struct TypedListener<E, F> {
    name: String,
    callback: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> EventListener for TypedListener<E, F>
where
    E: Event,
    F: Fn(&E) -> Result<(), ListenerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &dyn Event) -> Result<(), ListenerError> {
        match event.downcast_ref::<E>() {
            Some(typed) => (self.callback)(typed),
            None => Ok(()),
        }
    }
}

/// Build a shared listener that receives events of type `E` only.
pub fn typed_listener<E, F>(name: impl Into<String>, callback: F) -> Arc<dyn EventListener>
where
    E: Event,
    F: Fn(&E) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    Arc::new(TypedListener {
        name: name.into(),
        callback,
        _event: PhantomData,
    })
}
