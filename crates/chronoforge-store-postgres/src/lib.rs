//! Durable `PostgreSQL` backend for the ChronoForge event store.
//!
//! Satisfies the same contract as the in-memory reference backend:
//! idempotent content-addressed append (enforced by a unique hash column),
//! per-entity ascending reads, AND-combinable search, and live fan-out of
//! accepted events.
//!
//! # Modules
//!
//! - [`pool`] -- connection pool, configuration, migrations
//! - [`event_store`] -- the append-only `cf_event` log
//! - [`snapshot_store`] -- the `cf_doc_snapshot` repository
//! - [`error`] -- data-layer error types

pub mod error;
pub mod event_store;
pub mod pool;
pub mod snapshot_store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use event_store::{EventRow, PostgresEventStore};
pub use pool::{PostgresConfig, PostgresPool};
pub use snapshot_store::{PostgresSnapshotStore, SnapshotRow};
