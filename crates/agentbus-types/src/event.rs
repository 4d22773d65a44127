//! Event ancestor types for the agentbus event core.
//!
//! Every value that can be posted on the bus implements [`Event`]. The bus
//! routes on [`EventKind`], the runtime tag of an event's concrete type, so a
//! listener registered for one kind never sees events of another kind.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata carried by every event.
///
/// `source` identifies the poster. `state_change` is an open payload slot for
/// event-specific data that has no dedicated field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// UUIDv7 event ID.
    pub id: Uuid,
    /// Name of the agent or component that created the event.
    pub source: String,
    /// Optional free-form payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_change: Option<serde_json::Value>,
    /// When the event was created.
    pub created_at: DateTime<Utc>,
}

impl EventMeta {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            state_change: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_state_change(mut self, state_change: serde_json::Value) -> Self {
        self.state_change = Some(state_change);
        self
    }
}

/// Object-safe access to the concrete type behind a `dyn Event`.
///
/// Implemented for every `'static` type; never implement it by hand.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// The common ancestor of all postable events.
pub trait Event: AsAny + Send + Sync + fmt::Debug + 'static {
    fn meta(&self) -> &EventMeta;

    fn source(&self) -> &str {
        &self.meta().source
    }

    fn state_change(&self) -> Option<&serde_json::Value> {
        self.meta().state_change.as_ref()
    }
}

impl dyn Event {
    /// The exact kind of this event's concrete type.
    pub fn kind(&self) -> EventKind {
        EventKind {
            id: Any::type_id(self.as_any()),
            name: self.type_name(),
        }
    }

    pub fn is<E: Event>(&self) -> bool {
        self.as_any().is::<E>()
    }

    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }
}

/// Runtime tag identifying the concrete type of an event.
///
/// Equality and hashing use the type identity only. The name is kept for
/// logging. A kind can only be built for a type implementing [`Event`].
#[derive(Clone, Copy)]
pub struct EventKind {
    id: TypeId,
    name: &'static str,
}

impl EventKind {
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without module paths, e.g. `Notification<Ping>`.
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }
}

impl PartialEq for EventKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventKind {}

impl Hash for EventKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventKind({})", self.short_name())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// Strip module paths from every segment of a type name.
fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for ch in full.chars() {
        match ch {
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
    out
}

/// A plain notification event with a typed payload.
///
/// `Notification<A>` and `Notification<B>` are distinct kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification<T> {
    pub meta: EventMeta,
    pub payload: T,
}

impl<T> Notification<T> {
    pub fn new(source: impl Into<String>, payload: T) -> Self {
        Self {
            meta: EventMeta::new(source),
            payload,
        }
    }
}

impl<T> Event for Notification<T>
where
    T: Send + Sync + fmt::Debug + 'static,
{
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Ping {
        meta: EventMeta,
    }

    impl Event for Ping {
        fn meta(&self) -> &EventMeta {
            &self.meta
        }
    }

    #[derive(Debug)]
    struct Pong {
        meta: EventMeta,
    }

    impl Event for Pong {
        fn meta(&self) -> &EventMeta {
            &self.meta
        }
    }

    #[test]
    fn kind_of_dyn_event_matches_concrete_type() {
        let ping = Ping {
            meta: EventMeta::new("tester"),
        };
        let event: &dyn Event = &ping;
        assert_eq!(event.kind(), EventKind::of::<Ping>());
        assert_ne!(event.kind(), EventKind::of::<Pong>());
    }

    #[test]
    fn kind_through_arc_is_the_inner_type() {
        let event: std::sync::Arc<dyn Event> = std::sync::Arc::new(Pong {
            meta: EventMeta::new("tester"),
        });
        assert_eq!(event.kind(), EventKind::of::<Pong>());
    }

    #[test]
    fn downcast_ref_recovers_concrete_event() {
        let ping = Ping {
            meta: EventMeta::new("viewer"),
        };
        let event: &dyn Event = &ping;
        assert!(event.is::<Ping>());
        assert!(event.downcast_ref::<Pong>().is_none());
        assert_eq!(event.downcast_ref::<Ping>().unwrap().source(), "viewer");
    }

    #[test]
    fn notification_payload_types_are_distinct_kinds() {
        assert_ne!(
            EventKind::of::<Notification<u32>>(),
            EventKind::of::<Notification<String>>()
        );
        assert_eq!(
            EventKind::of::<Notification<u32>>(),
            EventKind::of::<Notification<u32>>()
        );
    }

    #[test]
    fn short_name_strips_module_paths() {
        let kind = EventKind::of::<Notification<String>>();
        assert_eq!(kind.short_name(), "Notification<String>");
        assert_eq!(kind.to_string(), "Notification<String>");
        assert!(kind.name().contains("::"));
    }

    #[test]
    fn state_change_is_optional() {
        let plain = Notification::new("editor", 1_u8);
        assert!(plain.state_change().is_none());

        let mut changed = Notification::new("editor", 2_u8);
        changed.meta = changed.meta.with_state_change(json!({"zoom": 2.0}));
        assert_eq!(changed.state_change(), Some(&json!({"zoom": 2.0})));
    }

    #[test]
    fn event_meta_serde_roundtrip() {
        let meta = EventMeta::new("browser").with_state_change(json!({"selected": [1, 2]}));
        let json = serde_json::to_string(&meta).unwrap();
        let parsed: EventMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, meta);

        let bare = EventMeta::new("browser");
        let json = serde_json::to_string(&bare).unwrap();
        assert!(!json.contains("state_change"));
    }
}
