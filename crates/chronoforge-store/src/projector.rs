//! The document projector: folds the live event feed into per-entity
//! materialized snapshots, resolving concurrent writes deterministically.
//!
//! Conflict resolution, per delivered event:
//!
//! 1. Load the entity's snapshot (absent means empty document, zero clock).
//! 2. Classify `snapshot.clock.order(event.clock)`.
//! 3. `Greater`: the snapshot already causally dominates the event; discard.
//! 4. `Equal` or `Concurrent`: genuine conflict. Tie-break: accept only if
//!    the producing node is the lexicographically greatest node in the
//!    event's own clock. Every replica reaches the same verdict for the same
//!    event with no coordination.
//! 5. `Less`, or a tie-break win: apply the mutation, join the snapshot
//!    clock with the event's clock, persist the replacement snapshot.
//!
//! Unrecognized event types are ignored. A projection failure for one event
//! is logged and the feed continues; one broken entity never starves the
//! rest. The projector task consumes the subscription sequentially, which is
//! the per-entity serialization point for the snapshot read-modify-write.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use chronoforge_core::{CausalOrder, DocSnapshot, TemporalEvent, TemporalId, event_types};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::store::string_form;

/// Load and replace per-entity document snapshots.
///
/// `upsert` replaces the prior snapshot wholesale; callers never mutate a
/// stored snapshot in place.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The current snapshot for the entity, if one has been materialized.
    async fn get(&self, entity_id: TemporalId) -> Result<Option<DocSnapshot>, StoreError>;

    /// Replace the entity's snapshot atomically.
    async fn upsert(&self, snapshot: &DocSnapshot) -> Result<(), StoreError>;
}

/// In-memory snapshot store for tests and the single-node backend.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    inner: Mutex<BTreeMap<TemporalId, DocSnapshot>>,
}

impl InMemorySnapshotStore {
    /// Create an empty snapshot store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<TemporalId, DocSnapshot>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get(&self, entity_id: TemporalId) -> Result<Option<DocSnapshot>, StoreError> {
        Ok(self.lock().get(&entity_id).cloned())
    }

    async fn upsert(&self, snapshot: &DocSnapshot) -> Result<(), StoreError> {
        self.lock().insert(snapshot.entity_id, snapshot.clone());
        Ok(())
    }
}

/// What the projector decided for one delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOutcome {
    /// The mutation was applied and the snapshot replaced.
    Applied,
    /// The snapshot already causally dominated the event.
    Stale,
    /// Conflict resolved against this event's producer.
    TieBreakLost,
    /// The event type is not a document mutation.
    Ignored,
}

/// Maintains materialized documents from the store's subscription feed.
pub struct Projector {
    snapshots: Arc<dyn SnapshotStore>,
}

impl Projector {
    /// Create a projector writing to the given snapshot store.
    pub fn new(snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self { snapshots }
    }

    /// Fold one event into its entity's snapshot.
    ///
    /// # Errors
    ///
    /// Returns the snapshot store's error if loading or persisting fails;
    /// the classification itself cannot fail.
    pub async fn project(&self, event: &TemporalEvent) -> Result<ProjectOutcome, StoreError> {
        if event.event_type != event_types::DOC_SET && event.event_type != event_types::DOC_DEL {
            return Ok(ProjectOutcome::Ignored);
        }

        let now = Utc::now();
        let mut snapshot = self
            .snapshots
            .get(event.entity_id)
            .await?
            .unwrap_or_else(|| DocSnapshot::empty(event.entity_id, now));

        match snapshot.clock.order(&event.clock) {
            CausalOrder::Greater => return Ok(ProjectOutcome::Stale),
            CausalOrder::Equal | CausalOrder::Concurrent => {
                // Deterministic tie-break: the lexicographically greatest
                // participant in the event's own clock wins.
                if event.clock.max_node() != Some(event.node.as_str()) {
                    return Ok(ProjectOutcome::TieBreakLost);
                }
            }
            CausalOrder::Less => {}
        }

        apply_mutation(&mut snapshot.doc, event);
        snapshot.clock.join(&event.clock);
        snapshot.updated_at = now;
        self.snapshots.upsert(&snapshot).await?;
        Ok(ProjectOutcome::Applied)
    }

    /// Consume a subscription feed until the bus closes.
    ///
    /// Lagged deliveries skip ahead; projection failures are logged and the
    /// feed continues.
    pub async fn run(self, mut rx: broadcast::Receiver<TemporalEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let entity = event.entity_id;
                    match self.project(&event).await {
                        Ok(outcome) => {
                            tracing::debug!(%entity, ?outcome, "Projected event");
                        }
                        Err(e) => {
                            tracing::warn!(%entity, error = %e, "Projection failed, continuing");
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Projector lagged, skipping ahead");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Event bus closed, projector stopping");
                    return;
                }
            }
        }
    }
}

/// Apply a document mutation in place.
///
/// `DOC_SET` merges payload fields (last value wins per field within one
/// application); `DOC_DEL` removes the keys listed under the payload's
/// `keys` array. Shared by the projector and the time-travel reader.
pub fn apply_mutation(doc: &mut Map<String, Value>, event: &TemporalEvent) {
    match event.event_type.as_str() {
        event_types::DOC_SET => {
            for (key, value) in &event.payload {
                doc.insert(key.clone(), value.clone());
            }
        }
        event_types::DOC_DEL => {
            if let Some(Value::Array(keys)) = event.payload.get(event_types::DEL_KEYS_FIELD) {
                for key in keys {
                    doc.remove(&string_form(key));
                }
            }
        }
        _ => {}
    }
}

/// Snapshot store wrapper that fails for selected entities.
///
/// Test support for the log-and-continue contract.
#[cfg(test)]
struct FailingSnapshotStore {
    inner: InMemorySnapshotStore,
    poison: TemporalId,
}

#[cfg(test)]
#[async_trait]
impl SnapshotStore for FailingSnapshotStore {
    async fn get(&self, entity_id: TemporalId) -> Result<Option<DocSnapshot>, StoreError> {
        if entity_id == self.poison {
            return Err(StoreError::backend("snapshot row unavailable"));
        }
        self.inner.get(entity_id).await
    }

    async fn upsert(&self, snapshot: &DocSnapshot) -> Result<(), StoreError> {
        self.inner.upsert(snapshot).await
    }
}
