//! Entity identity and the temporal event record.
//!
//! A [`TemporalEvent`] is the unit of fact in the store: immutable once
//! constructed, stamped with the producer's instant and a vector-clock
//! snapshot in which the producing node has already ticked. Events are never
//! updated or deleted; state is derived by folding them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::causal::VectorClock;
use crate::determinism::{Determinism, FALLBACK_NODE};

/// Well-known event type tags understood by the document projector.
///
/// Other tags pass through the store untouched; the projector ignores them.
pub mod event_types {
    /// Merge the payload's fields into the entity's document.
    pub const DOC_SET: &str = "DOC_SET";
    /// Remove the keys listed under [`DEL_KEYS_FIELD`] from the document.
    pub const DOC_DEL: &str = "DOC_DEL";
    /// Payload field holding the key list of a [`DOC_DEL`] event.
    pub const DEL_KEYS_FIELD: &str = "keys";
}

/// Opaque identifier of an entity whose history lives in the store.
///
/// Serializes as the canonical UUID string form on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemporalId(pub Uuid);

impl TemporalId {
    /// Wrap an existing UUID.
    pub const fn new(value: Uuid) -> Self {
        Self(value)
    }

    /// Generate an identifier from a determinism context.
    ///
    /// Under a seeded context the identifier is reproducible from the seed.
    pub fn generate(det: &Determinism) -> Self {
        Self(det.random_uuid())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TemporalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TemporalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for TemporalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<TemporalId> for Uuid {
    fn from(id: TemporalId) -> Self {
        id.0
    }
}

/// An immutable, causally-timestamped fact about one entity.
///
/// Identity for deduplication is not a field: storage backends derive a
/// content hash over `(entity_id, type, observed_at, payload)` and absorb
/// re-appends of identical content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalEvent {
    /// The entity this event belongs to.
    pub entity_id: TemporalId,
    /// String tag, e.g. `DOC_SET` or `DOC_DEL`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Instant assigned by the producer's active clock (seeded or wall).
    pub observed_at: DateTime<Utc>,
    /// Vector-clock snapshot with the producing node already ticked.
    pub clock: VectorClock,
    /// Arbitrary keyed payload.
    pub payload: Map<String, Value>,
    /// Logical producer identity.
    #[serde(default = "default_node")]
    pub node: String,
}

fn default_node() -> String {
    FALLBACK_NODE.to_owned()
}

impl TemporalEvent {
    /// Record a new event under the given determinism context.
    ///
    /// The instant and node come from the context, and the clock is a fresh
    /// one ticked once for the producing node.
    pub fn observed(
        det: &Determinism,
        entity_id: TemporalId,
        event_type: &str,
        payload: Map<String, Value>,
    ) -> Self {
        let node = det.node().to_owned();
        let mut clock = VectorClock::new();
        clock.tick(&node);
        Self {
            entity_id,
            event_type: event_type.to_owned(),
            observed_at: det.now(),
            clock,
            payload,
            node,
        }
    }

    /// Record a [`event_types::DOC_SET`] event merging `fields` into the
    /// entity's document.
    pub fn doc_set(det: &Determinism, entity_id: TemporalId, fields: Map<String, Value>) -> Self {
        Self::observed(det, entity_id, event_types::DOC_SET, fields)
    }

    /// Record a [`event_types::DOC_DEL`] event removing `keys` from the
    /// entity's document.
    pub fn doc_del(det: &Determinism, entity_id: TemporalId, keys: Vec<String>) -> Self {
        let mut payload = Map::new();
        payload.insert(
            event_types::DEL_KEYS_FIELD.to_owned(),
            Value::Array(keys.into_iter().map(Value::String).collect()),
        );
        Self::observed(det, entity_id, event_types::DOC_DEL, payload)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn seeded() -> Determinism {
        Determinism::seeded(Some("n1"), 100).unwrap()
    }

    #[test]
    fn id_round_trips_through_string_form() {
        let det = seeded();
        let id = TemporalId::generate(&det);
        let parsed: TemporalId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn id_rejects_malformed_input() {
        let parsed = "not-a-uuid".parse::<TemporalId>();
        assert!(parsed.is_err());
    }

    #[test]
    fn observed_stamps_context_time_and_node() {
        let det = seeded();
        let id = TemporalId::generate(&det);
        let event = TemporalEvent::observed(&det, id, "DOC_SET", Map::new());

        assert_eq!(event.observed_at, det.now());
        assert_eq!(event.node, "n1");
        assert_eq!(event.clock.get("n1"), 1);
        assert_eq!(event.clock.get("n2"), 0);
    }

    #[test]
    fn doc_del_wraps_keys_in_payload() {
        let det = seeded();
        let id = TemporalId::generate(&det);
        let event = TemporalEvent::doc_del(&det, id, vec!["a".to_owned(), "b".to_owned()]);

        assert_eq!(event.event_type, event_types::DOC_DEL);
        let keys = event
            .payload
            .get(event_types::DEL_KEYS_FIELD)
            .and_then(Value::as_array)
            .unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn wire_form_uses_type_field_and_string_id() {
        let det = seeded();
        let id = TemporalId::generate(&det);
        let mut fields = Map::new();
        fields.insert("a".to_owned(), Value::from(1));
        let event = TemporalEvent::doc_set(&det, id, fields);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json.get("type").unwrap(), "DOC_SET");
        assert_eq!(
            json.get("entity_id").unwrap().as_str().unwrap(),
            id.to_string()
        );

        let back: TemporalEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn node_defaults_when_absent_from_wire_form() {
        let raw = serde_json::json!({
            "entity_id": "8c0f1f8e-1111-4222-8333-444455556666",
            "type": "DOC_SET",
            "observed_at": "2026-01-01T00:00:00Z",
            "clock": {"n1": 1},
            "payload": {}
        });
        let event: TemporalEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.node, FALLBACK_NODE);
    }
}
