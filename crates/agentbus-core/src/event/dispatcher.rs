//! Thread-safe event demultiplexer with a single active dispatch session.
//!
//! The `Dispatcher` maps each `EventKind` to the listeners interested in that
//! exact kind. `post` either opens a dispatch session and drains the pending
//! queue in arrival order, or, when a session is already active, appends to
//! the queue and returns. Listener callbacks run with no lock held, so they
//! may post, register, and remove freely; a re-entrant post never recurses.

use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use agentbus_types::config::{BusConfig, FailurePolicy};
use agentbus_types::error::BusError;
use agentbus_types::event::{Event, EventKind};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, error, trace, warn};

use super::bus::{EventBus, PostOutcome, Registration};
use super::listener::{EventListener, same_listener};

/// Queue state shared by all posters.
///
/// The flag and the queue live under one lock so that "enqueue or become the
/// session owner" and "queue empty, close the session" cannot interleave.
#[derive(Default)]
struct Session {
    dispatching: bool,
    queue: VecDeque<Arc<dyn Event>>,
}

#[derive(Default)]
struct Counters {
    posted: AtomicU64,
    dispatched: AtomicU64,
    deliveries: AtomicU64,
    listener_failures: AtomicU64,
    unrouted: AtomicU64,
}

/// Snapshot of dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// Events accepted by `post`.
    pub posted: u64,
    /// Events that had at least one listener when dequeued.
    pub dispatched: u64,
    /// Successful listener invocations.
    pub deliveries: u64,
    /// Listener invocations that returned an error or panicked.
    pub listener_failures: u64,
    /// Events dequeued with no listener for their kind.
    pub unrouted: u64,
}

/// A listener failure that ends the session under `FailurePolicy::Propagate`.
enum Failure {
    Error(BusError),
    Panic(Box<dyn Any + Send>),
}

/// Concrete event bus.
///
/// Construct one per application and share it as `Arc<Dispatcher>` or
/// `Arc<dyn EventBus>`.
pub struct Dispatcher {
    table: DashMap<EventKind, Vec<Arc<dyn EventListener>>>,
    session: Mutex<Session>,
    counters: Counters,
    config: BusConfig,
}

impl Dispatcher {
    pub fn new(config: BusConfig) -> Self {
        Self {
            table: DashMap::new(),
            session: Mutex::new(Session::default()),
            counters: Counters::default(),
            config: BusConfig {
                queue_warn_depth: config.queue_warn_depth.max(1),
                ..config
            },
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: &EventKind) -> usize {
        self.table.get(kind).map(|entry| entry.len()).unwrap_or(0)
    }

    pub fn is_registered(&self, listener: &Arc<dyn EventListener>, kind: &EventKind) -> bool {
        self.table
            .get(kind)
            .map(|entry| entry.iter().any(|l| same_listener(l, listener)))
            .unwrap_or(false)
    }

    /// Kinds with at least one registered listener.
    pub fn registered_kinds(&self) -> Vec<EventKind> {
        self.table.iter().map(|entry| *entry.key()).collect()
    }

    /// Events waiting in the queue.
    pub fn pending(&self) -> usize {
        self.lock_session().queue.len()
    }

    pub fn is_dispatching(&self) -> bool {
        self.lock_session().dispatching
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            posted: self.counters.posted.load(Ordering::Relaxed),
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
            listener_failures: self.counters.listener_failures.load(Ordering::Relaxed),
            unrouted: self.counters.unrouted.load(Ordering::Relaxed),
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        // Listener code never runs under this lock, so poisoning can only come
        // from a panic inside the dispatcher itself; the state is still usable.
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drain the queue until it is empty. Only the session owner calls this.
    fn drain(&self) -> Result<PostOutcome, BusError> {
        let mut events = 0;
        let mut deliveries = 0;

        loop {
            let next = {
                let mut session = self.lock_session();
                match session.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        session.dispatching = false;
                        break;
                    }
                }
            };

            events += 1;
            match self.deliver(next.as_ref()) {
                Ok(delivered) => deliveries += delivered,
                Err(failure) => {
                    let remaining = {
                        let mut session = self.lock_session();
                        session.dispatching = false;
                        session.queue.len()
                    };
                    if remaining > 0 {
                        debug!(remaining, "dispatch session aborted with events still queued");
                    }
                    return match failure {
                        Failure::Error(err) => Err(err),
                        Failure::Panic(payload) => panic::resume_unwind(payload),
                    };
                }
            }
        }

        Ok(PostOutcome::Dispatched { events, deliveries })
    }

    /// Deliver one event to a snapshot of its listeners.
    fn deliver(&self, event: &dyn Event) -> Result<usize, Failure> {
        let kind = event.kind();
        let Some(listeners) = self.table.get(&kind).map(|entry| entry.value().clone()) else {
            self.counters.unrouted.fetch_add(1, Ordering::Relaxed);
            trace!(%kind, event_id = %event.meta().id, "no listeners for event");
            return Ok(0);
        };
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        for listener in &listeners {
            if self.config.trace_deliveries {
                trace!(
                    listener = listener.name(),
                    %kind,
                    event_id = %event.meta().id,
                    source = event.source(),
                    "delivering event"
                );
            }

            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => {
                    delivered += 1;
                    self.counters.deliveries.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(err)) => {
                    self.counters.listener_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(listener = listener.name(), %kind, error = %err, "listener returned an error");
                    if self.config.failure_policy == FailurePolicy::Propagate {
                        return Err(Failure::Error(BusError::ListenerFailed {
                            listener: listener.name().to_string(),
                            kind: kind.short_name(),
                            reason: err.to_string(),
                        }));
                    }
                }
                Err(payload) => {
                    self.counters.listener_failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        listener = listener.name(),
                        %kind,
                        panic = panic_message(payload.as_ref()),
                        "listener panicked"
                    );
                    if self.config.failure_policy == FailurePolicy::Propagate {
                        return Err(Failure::Panic(payload));
                    }
                }
            }
        }

        Ok(delivered)
    }
}

impl EventBus for Dispatcher {
    fn register(
        &self,
        listener: Arc<dyn EventListener>,
        kinds: &[EventKind],
    ) -> Result<Registration, BusError> {
        if kinds.is_empty() {
            warn!(listener = listener.name(), "registration named no event kinds");
            return Err(BusError::NoEventKinds {
                listener: listener.name().to_string(),
            });
        }

        let mut registration = Registration::default();
        let mut seen = HashSet::with_capacity(kinds.len());
        for kind in kinds {
            if !seen.insert(*kind) {
                debug!(listener = listener.name(), %kind, "duplicate kind in registration ignored");
                continue;
            }

            let mut entry = self.table.entry(*kind).or_default();
            if entry.iter().any(|l| same_listener(l, &listener)) {
                registration.existing.push(*kind);
            } else {
                entry.push(Arc::clone(&listener));
                registration.added.push(*kind);
            }
        }

        debug!(
            listener = listener.name(),
            added = registration.added.len(),
            existing = registration.existing.len(),
            "registered listener"
        );
        Ok(registration)
    }

    fn remove(&self, listener: &Arc<dyn EventListener>, kinds: &[EventKind]) -> usize {
        let mut removed = 0;
        for kind in kinds {
            let now_empty = match self.table.get_mut(kind) {
                Some(mut entry) => {
                    let before = entry.len();
                    entry.retain(|l| !same_listener(l, listener));
                    removed += before - entry.len();
                    entry.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.table.remove_if(kind, |_, listeners| listeners.is_empty());
            }
        }

        if removed > 0 {
            debug!(listener = listener.name(), removed, "removed listener");
        } else {
            trace!(listener = listener.name(), "remove matched no registrations");
        }
        removed
    }

    fn post(&self, event: Arc<dyn Event>) -> Result<PostOutcome, BusError> {
        self.counters.posted.fetch_add(1, Ordering::Relaxed);
        {
            let mut session = self.lock_session();
            session.queue.push_back(event);
            if session.dispatching {
                let depth = session.queue.len();
                if depth > self.config.queue_warn_depth {
                    warn!(depth, threshold = self.config.queue_warn_depth, "pending event queue is deep");
                }
                return Ok(PostOutcome::Queued { depth });
            }
            session.dispatching = true;
        }
        self.drain()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("kinds", &self.table.len())
            .field("pending", &self.pending())
            .field("failure_policy", &self.config.failure_policy)
            .field("stats", &self.stats())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
