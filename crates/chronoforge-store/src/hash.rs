//! Content hashing for idempotent append.
//!
//! Event identity for deduplication is derived, not stored: a SHA-256 digest
//! over `(entity_id, type, observed_at, payload)`. The payload is rendered in
//! canonical form (object keys sorted recursively) so two payloads that differ
//! only in key order hash identically.

use chrono::SecondsFormat;
use chronoforge_core::TemporalEvent;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute the idempotency key for an event.
///
/// Stable across processes and restarts: the same event content always
/// produces the same digest. The producing node is deliberately excluded,
/// matching the event's dedup identity.
pub fn content_hash(event: &TemporalEvent) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(event.entity_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(event.event_type.as_bytes());
    hasher.update(b"|");
    hasher.update(
        event
            .observed_at
            .to_rfc3339_opts(SecondsFormat::Micros, true)
            .as_bytes(),
    );
    hasher.update(b"|");
    let mut rendered = String::new();
    write_canonical(&Value::Object(event.payload.clone()), &mut rendered);
    hasher.update(rendered.as_bytes());
    hasher.finalize().into()
}

/// Render a JSON value with all object keys sorted, recursively.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(fields) => {
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                if let Some(field) = fields.get(key) {
                    write_canonical(field, out);
                }
            }
            out.push('}');
        }
        scalar => out.push_str(&serde_json::to_string(scalar).unwrap_or_default()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chronoforge_core::{Determinism, TemporalId};
    use serde_json::Map;

    fn event_with_payload(payload: Map<String, Value>) -> TemporalEvent {
        let det = Determinism::seeded(Some("n1"), 500).unwrap();
        let id = TemporalId::new(uuid::Uuid::nil());
        TemporalEvent::doc_set(&det, id, payload)
    }

    #[test]
    fn identical_content_hashes_identically() {
        let mut payload = Map::new();
        payload.insert("a".to_owned(), Value::from(1));
        let a = event_with_payload(payload.clone());
        let b = event_with_payload(payload);
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn payload_key_order_does_not_matter() {
        let mut forward = Map::new();
        forward.insert("a".to_owned(), Value::from(1));
        forward.insert("b".to_owned(), Value::from(2));
        let mut reversed = Map::new();
        reversed.insert("b".to_owned(), Value::from(2));
        reversed.insert("a".to_owned(), Value::from(1));

        let a = event_with_payload(forward);
        let b = event_with_payload(reversed);
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn nested_objects_are_canonicalized() {
        let inner_forward = serde_json::json!({"x": 1, "y": [ {"p": 1, "q": 2} ]});
        let inner_reversed = serde_json::json!({"y": [ {"q": 2, "p": 1} ], "x": 1});

        let mut forward = Map::new();
        forward.insert("nested".to_owned(), inner_forward);
        let mut reversed = Map::new();
        reversed.insert("nested".to_owned(), inner_reversed);

        assert_eq!(
            content_hash(&event_with_payload(forward)),
            content_hash(&event_with_payload(reversed))
        );
    }

    #[test]
    fn differing_content_hashes_differently() {
        let mut a_payload = Map::new();
        a_payload.insert("a".to_owned(), Value::from(1));
        let mut b_payload = Map::new();
        b_payload.insert("a".to_owned(), Value::from(2));

        let a = event_with_payload(a_payload);
        let b = event_with_payload(b_payload);
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn timestamp_participates_in_identity() {
        let det_a = Determinism::seeded(Some("n1"), 500).unwrap();
        let det_b = Determinism::seeded(Some("n1"), 501).unwrap();
        let id = TemporalId::new(uuid::Uuid::nil());
        let a = TemporalEvent::doc_set(&det_a, id, Map::new());
        let b = TemporalEvent::doc_set(&det_b, id, Map::new());
        assert_ne!(content_hash(&a), content_hash(&b));
    }
}
