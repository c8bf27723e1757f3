//! Shared application state for the API server.
//!
//! [`AppState`] holds the selected store backend, the snapshot repository
//! the projector maintains, and the process's ambient [`Determinism`]
//! context used when a request supplies no seed. Wrapped in [`Arc`] and
//! injected via Axum's `State` extractor.

use std::sync::Arc;

use chronoforge_core::{Determinism, TemporalEvent};
use chronoforge_store::{EventStore, InMemoryEventStore, InMemorySnapshotStore, SnapshotStore};
use tokio::sync::broadcast;

/// Shared state for the Axum application.
pub struct AppState {
    /// The event store backend serving this process.
    pub store: Arc<dyn EventStore>,
    /// The snapshot repository the projector maintains.
    pub snapshots: Arc<dyn SnapshotStore>,
    /// Ambient context for requests that supply no seed.
    pub determinism: Determinism,
}

impl AppState {
    /// Assemble state over an arbitrary backend pair.
    pub fn new(
        store: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        determinism: Determinism,
    ) -> Self {
        Self {
            store,
            snapshots,
            determinism,
        }
    }

    /// Assemble state over the in-process reference backend.
    ///
    /// Used by the `memory` backend configuration and by tests.
    pub fn in_memory(determinism: Determinism) -> Self {
        Self {
            store: Arc::new(InMemoryEventStore::new()),
            snapshots: Arc::new(InMemorySnapshotStore::new()),
            determinism,
        }
    }

    /// Subscribe to the store's live feed of accepted events.
    pub fn subscribe(&self) -> broadcast::Receiver<TemporalEvent> {
        self.store.subscribe()
    }
}
