//! Point-in-time document reconstruction.
//!
//! Replays an entity's history up to a cutoff instant and folds it into a
//! document, independent of the materialized view. The fold is a straight
//! left-fold in timestamp order with NO conflict tie-break: this produces a
//! time-ordered view, not a causally-reconciled one. The two views can
//! differ when concurrent events interleave; that divergence is a documented
//! property of the system, not a defect.

use chrono::{DateTime, Utc};
use chronoforge_core::{TemporalEvent, TemporalId};
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::projector::apply_mutation;
use crate::store::EventStore;

/// Fold events observed at or before `at` into a document.
///
/// `None` means no cutoff: the full history folds. Events are sorted
/// ascending by `observed_at` before applying, and unrecognized types fall
/// through the mutation application untouched.
pub fn fold_document_at(
    events: &[TemporalEvent],
    at: Option<DateTime<Utc>>,
) -> Map<String, Value> {
    let mut window: Vec<&TemporalEvent> = events
        .iter()
        .filter(|e| at.is_none_or(|cutoff| e.observed_at <= cutoff))
        .collect();
    window.sort_by_key(|e| e.observed_at);

    let mut doc = Map::new();
    for event in window {
        apply_mutation(&mut doc, event);
    }
    doc
}

/// Read an entity's history from the store and fold it up to `at`.
///
/// # Errors
///
/// Propagates the store's read error; an unknown entity folds to an empty
/// document.
pub async fn document_at(
    store: &dyn EventStore,
    entity_id: TemporalId,
    at: Option<DateTime<Utc>>,
) -> Result<Map<String, Value>, StoreError> {
    let events = store.read(entity_id).await?;
    Ok(fold_document_at(&events, at))
}
