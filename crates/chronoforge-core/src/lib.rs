//! Core types for the ChronoForge temporal event store.
//!
//! This crate holds the causal data model and the deterministic-execution
//! facility shared by every backend and surface:
//!
//! - [`causal`] -- vector clocks and the four-way causal ordering
//! - [`determinism`] -- explicit time/randomness/identity context
//! - [`event`] -- entity identity and the immutable event record
//! - [`snapshot`] -- the materialized per-entity document snapshot
//! - [`config`] -- typed YAML configuration with env overrides

pub mod causal;
pub mod config;
pub mod determinism;
pub mod event;
pub mod snapshot;

// Re-export primary types for convenience.
pub use causal::{CausalOrder, VectorClock};
pub use config::{
    ChronoforgeConfig, ConfigError, LoggingConfig, NodeConfig, ServiceConfig, StoreBackend,
    StoreConfig,
};
pub use determinism::{Determinism, DeterminismError, FALLBACK_NODE, NODE_ENV_VAR};
pub use event::{TemporalEvent, TemporalId, event_types};
pub use snapshot::DocSnapshot;
