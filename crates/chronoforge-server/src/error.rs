//! Error types for server startup.

use chronoforge_core::ConfigError;
use chronoforge_store_postgres::DbError;

/// Errors raised while wiring the ChronoForge server.
#[derive(Debug, thiserror::Error)]
pub enum ServerInitError {
    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// The durable backend could not be prepared.
    #[error("database error: {source}")]
    Database {
        /// The underlying data-layer error.
        #[from]
        source: DbError,
    },
}
