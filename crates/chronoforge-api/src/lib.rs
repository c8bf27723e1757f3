//! HTTP surface for the ChronoForge temporal store.
//!
//! A thin collaborator around the store contract: REST endpoints for
//! append/read/search and document access, a `WebSocket` live event feed,
//! and the server lifecycle. All state derivation lives in
//! `chronoforge-store`; this crate only parses requests, threads the
//! determinism context, and maps errors onto HTTP.
//!
//! # Modules
//!
//! - [`state`] -- shared application state
//! - [`router`] -- route table and middleware
//! - [`handlers`] -- REST endpoint handlers
//! - [`ws`] -- `WebSocket` event feed
//! - [`server`] -- bind-and-serve lifecycle
//! - [`error`] -- HTTP error mapping

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use handlers::EventView;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
