//! Durable document snapshot repository.
//!
//! One row per entity in `cf_doc_snapshot`, replaced wholesale by upsert.
//! The projector's read-modify-write cycles through this repository; the
//! single projector task serializes those cycles per entity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronoforge_core::{DocSnapshot, TemporalId, VectorClock};
use chronoforge_store::{SnapshotStore, StoreError};
use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::pool::PostgresPool;

/// Durable `SnapshotStore` implementation on `PostgreSQL`.
pub struct PostgresSnapshotStore {
    pool: PgPool,
}

impl PostgresSnapshotStore {
    /// Create a repository over an established connection pool.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    async fn get(&self, entity_id: TemporalId) -> Result<Option<DocSnapshot>, StoreError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r"SELECT entity_id, doc, clock, updated_at
              FROM cf_doc_snapshot
              WHERE entity_id = $1",
        )
        .bind(entity_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(DocSnapshot::try_from).transpose()
    }

    async fn upsert(&self, snapshot: &DocSnapshot) -> Result<(), StoreError> {
        let doc = serde_json::to_value(&snapshot.doc)?;
        let clock = serde_json::to_value(&snapshot.clock)?;

        sqlx::query(
            r"INSERT INTO cf_doc_snapshot (entity_id, doc, clock, updated_at)
              VALUES ($1, $2, $3, now())
              ON CONFLICT (entity_id)
              DO UPDATE SET doc = EXCLUDED.doc, clock = EXCLUDED.clock, updated_at = now()",
        )
        .bind(snapshot.entity_id.into_inner())
        .bind(&doc)
        .bind(&clock)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }
}

/// A row from the `cf_doc_snapshot` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    /// The entity this snapshot materializes.
    pub entity_id: Uuid,
    /// Reconciled document as stored (JSONB).
    pub doc: Value,
    /// Causal frontier as stored (JSONB).
    pub clock: Value,
    /// Last persist time.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SnapshotRow> for DocSnapshot {
    type Error = StoreError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let doc: Map<String, Value> = serde_json::from_value(row.doc)?;
        let clock: VectorClock = serde_json::from_value(row.clock)?;
        Ok(Self {
            entity_id: TemporalId::new(row.entity_id),
            doc,
            clock,
            updated_at: row.updated_at,
        })
    }
}
