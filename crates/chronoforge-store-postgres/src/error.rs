//! Error types for the `PostgreSQL` data layer.
//!
//! Pool lifecycle and migrations report through [`DbError`]; the
//! [`chronoforge_store::EventStore`] trait methods map database failures
//! into [`chronoforge_store::StoreError`] so consumers stay
//! backend-agnostic.

/// Errors that can occur in the `PostgreSQL` data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
