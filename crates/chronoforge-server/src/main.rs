//! ChronoForge server binary.
//!
//! This is the main entry point that wires together the event store
//! backend, the document projector, and the HTTP API. It loads
//! configuration, initializes all subsystems, and serves until terminated.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `chronoforge-config.yaml` (or the path in
//!    `CHRONOFORGE_CONFIG`); a missing file yields the defaults
//! 2. Initialize structured logging (tracing)
//! 3. Resolve the process's ambient determinism context
//! 4. Select and prepare the event store backend (memory or `PostgreSQL`)
//! 5. Spawn the projector task on the store's subscription feed
//! 6. Run the API server

mod error;

use std::path::Path;
use std::sync::Arc;

use chronoforge_api::{AppState, ServerConfig};
use chronoforge_core::{ChronoforgeConfig, Determinism, StoreBackend};
use chronoforge_store::Projector;
use chronoforge_store_postgres::{
    PostgresConfig, PostgresEventStore, PostgresPool, PostgresSnapshotStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::ServerInitError;

/// Environment variable naming an alternate configuration file path.
const CONFIG_PATH_ENV_VAR: &str = "CHRONOFORGE_CONFIG";

/// Default configuration file path, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "chronoforge-config.yaml";

/// Application entry point for the ChronoForge server.
///
/// # Errors
///
/// Returns an error if any initialization step or the server itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .with_target(true)
        .init();

    info!("chronoforge-server starting");
    info!(
        host = config.service.host,
        port = config.service.port,
        backend = ?config.store.backend,
        "Configuration loaded"
    );

    // 3. Resolve the ambient determinism context (wall clock; requests may
    //    scope their own seeded context).
    let determinism = if config.node.name.trim().is_empty() {
        Determinism::wall()
    } else {
        Determinism::wall_on(&config.node.name)
    };
    info!(node = determinism.node(), "Logical node resolved");

    // 4. Select and prepare the store backend.
    let state = match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory event store (no persistence)");
            Arc::new(AppState::in_memory(determinism))
        }
        StoreBackend::Postgres => {
            let pg_config = PostgresConfig::new(&config.store.postgres_url)
                .with_max_connections(config.store.max_connections);
            let pool = PostgresPool::connect(&pg_config)
                .await
                .map_err(ServerInitError::from)?;
            pool.run_migrations().await.map_err(ServerInitError::from)?;
            info!("Using PostgreSQL event store");
            Arc::new(AppState::new(
                Arc::new(PostgresEventStore::new(&pool)),
                Arc::new(PostgresSnapshotStore::new(&pool)),
                determinism,
            ))
        }
    };

    // 5. Spawn the projector on the store's live feed.
    let projector = Projector::new(Arc::clone(&state.snapshots));
    tokio::spawn(projector.run(state.subscribe()));
    info!("Projector subscribed to the event feed");

    // 6. Run the API server until terminated.
    let server_config = ServerConfig {
        host: config.service.host.clone(),
        port: config.service.port,
    };
    chronoforge_api::start_server(&server_config, state).await?;

    Ok(())
}

/// Load configuration from disk, falling back to defaults (plus environment
/// overrides) when no config file exists.
fn load_config() -> Result<ChronoforgeConfig, ServerInitError> {
    let path =
        std::env::var(CONFIG_PATH_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    let path = Path::new(&path);

    if path.exists() {
        Ok(ChronoforgeConfig::from_file(path)?)
    } else {
        let mut config = ChronoforgeConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}
