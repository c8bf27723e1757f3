//! Event store layer for ChronoForge.
//!
//! Defines the store contract and ships the pieces that fold events into
//! state:
//!
//! - [`store`] -- the [`EventStore`] trait and [`SearchQuery`] filters
//! - [`memory`] -- the in-process reference backend
//! - [`hash`] -- content hashing for idempotent append
//! - [`projector`] -- live conflict-resolving document projection
//! - [`time_travel`] -- point-in-time replay, independent of the projection
//! - [`error`] -- shared error types
//!
//! The durable `PostgreSQL` backend lives in `chronoforge-store-postgres`
//! and satisfies the same contract.

pub mod error;
pub mod hash;
pub mod memory;
pub mod projector;
pub mod store;
pub mod time_travel;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use hash::content_hash;
pub use memory::InMemoryEventStore;
pub use projector::{
    InMemorySnapshotStore, ProjectOutcome, Projector, SnapshotStore, apply_mutation,
};
pub use store::{EventStore, SearchQuery, string_form};
pub use time_travel::{document_at, fold_document_at};
