//! In-process reference implementation of the event store.
//!
//! No persistence: per-entity event vectors behind a mutex, a content-hash
//! set for idempotent append, and a broadcast bus for live fan-out. The
//! mutex serializes appends, which is what gives subscribers a single
//! consistent per-entity delivery order.
//!
//! Intended for tests and single-node use; the durable backend lives in
//! `chronoforge-store-postgres` and satisfies the same contract.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chronoforge_core::{TemporalEvent, TemporalId};
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::hash::content_hash;
use crate::store::{EventStore, SearchQuery};

/// Capacity of the broadcast channel for accepted events.
///
/// If a subscriber falls behind by more than this many events it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip to the
/// newest event. Producers never block on slow subscribers.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Mutable store state guarded by one mutex.
struct Inner {
    /// Events per entity, in acceptance order.
    by_entity: BTreeMap<TemporalId, Vec<TemporalEvent>>,
    /// Content hashes of every accepted event.
    seen: HashSet<[u8; 32]>,
}

/// In-memory reference backend.
pub struct InMemoryEventStore {
    inner: Mutex<Inner>,
    bus: broadcast::Sender<TemporalEvent>,
}

impl InMemoryEventStore {
    /// Create a store with the default subscriber buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    /// Create a store with an explicit subscriber buffer capacity.
    ///
    /// Smaller capacities surface the lag policy sooner; useful in tests.
    pub fn with_capacity(capacity: usize) -> Self {
        let (bus, _) = broadcast::channel(capacity);
        Self {
            inner: Mutex::new(Inner {
                by_entity: BTreeMap::new(),
                seen: HashSet::new(),
            }),
            bus,
        }
    }

    /// Lock the store state, recovering from a poisoned lock.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<TemporalEvent>) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }

        // One lock for the whole call: concurrent appends serialize here,
        // and in-call order is preserved on the bus.
        let mut inner = self.lock();
        for event in events {
            let hash = content_hash(&event);
            if !inner.seen.insert(hash) {
                tracing::debug!(entity = %event.entity_id, "Duplicate append absorbed");
                continue;
            }
            inner
                .by_entity
                .entry(event.entity_id)
                .or_default()
                .push(event.clone());
            // send errors only when no subscriber is connected, which is
            // not a failure of the append.
            let _ = self.bus.send(event);
        }
        Ok(())
    }

    async fn read(&self, entity_id: TemporalId) -> Result<Vec<TemporalEvent>, StoreError> {
        let inner = self.lock();
        let mut events = inner
            .by_entity
            .get(&entity_id)
            .cloned()
            .unwrap_or_default();
        events.sort_by_key(|e| e.observed_at);
        Ok(events)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<TemporalEvent>, StoreError> {
        let inner = self.lock();
        let mut events: Vec<TemporalEvent> = inner
            .by_entity
            .values()
            .flatten()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.observed_at);
        if let Some(limit) = query.effective_limit() {
            events.truncate(limit);
        }
        Ok(events)
    }

    fn subscribe(&self) -> broadcast::Receiver<TemporalEvent> {
        self.bus.subscribe()
    }
}
