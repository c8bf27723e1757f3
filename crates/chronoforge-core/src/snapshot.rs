//! Materialized document snapshot.
//!
//! A [`DocSnapshot`] is the projector's per-entity cache of the reconciled
//! current document. It is always re-derivable by folding the entity's event
//! history from an empty document; the event log, not the snapshot, is the
//! source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::causal::VectorClock;
use crate::event::TemporalId;

/// Per-entity materialized projection state.
///
/// Replaced wholesale on every accepted event; never deleted (content
/// deletion is a `DOC_DEL` event, not removal of the snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSnapshot {
    /// The entity this snapshot materializes.
    pub entity_id: TemporalId,
    /// Current reconciled field set.
    pub doc: Map<String, Value>,
    /// Causal frontier: everything incorporated into `doc`.
    pub clock: VectorClock,
    /// When this snapshot was last persisted.
    pub updated_at: DateTime<Utc>,
}

impl DocSnapshot {
    /// An empty snapshot for an entity with no projected events yet:
    /// empty document, zero clock.
    pub fn empty(entity_id: TemporalId, at: DateTime<Utc>) -> Self {
        Self {
            entity_id,
            doc: Map::new(),
            clock: VectorClock::new(),
            updated_at: at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn empty_snapshot_has_zero_clock() {
        let id = TemporalId::new(Uuid::nil());
        let snap = DocSnapshot::empty(id, Utc::now());
        assert!(snap.doc.is_empty());
        assert!(snap.clock.is_empty());
    }

    #[test]
    fn serde_round_trip() {
        let id = TemporalId::new(Uuid::nil());
        let mut snap = DocSnapshot::empty(id, Utc::now());
        snap.doc
            .insert("title".to_owned(), Value::String("draft".to_owned()));
        snap.clock.tick("n1");

        let json = serde_json::to_string(&snap).unwrap();
        let back: DocSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
