//! Event bus: listener contract, bus trait, and the dispatcher.

pub mod bus;
pub mod dispatcher;
pub mod listener;

pub use bus::{EventBus, EventBusExt, PostOutcome, Registration, SharedEventBus};
pub use dispatcher::{BusStats, Dispatcher};
pub use listener::{EventListener, listener_fn, same_listener, typed_listener};
