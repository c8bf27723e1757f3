//! Durable event store backed by `PostgreSQL`.
//!
//! Events land in the append-only `cf_event` table. Idempotence is enforced
//! by the database: each row carries the event's content hash under a unique
//! constraint, and `ON CONFLICT (hash) DO NOTHING` absorbs duplicates.
//! Only rows the database actually accepted are published to subscribers,
//! so a duplicate append produces neither a second record nor a second
//! delivery. An append the database rejects is surfaced to the caller and
//! never reported as accepted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronoforge_core::{TemporalEvent, TemporalId, VectorClock};
use chronoforge_store::{EventStore, SearchQuery, StoreError, content_hash};
use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::pool::PostgresPool;

/// Capacity of the broadcast channel for accepted events.
///
/// Laggards observe a lag marker and resume at the newest event; appends
/// never block on slow subscribers.
const BROADCAST_CAPACITY: usize = 256;

/// Columns selected when reconstructing events from rows.
const EVENT_COLUMNS: &str = "entity_id, event_type, observed_at, node, clock, payload";

/// Durable `EventStore` implementation on `PostgreSQL`.
pub struct PostgresEventStore {
    pool: PgPool,
    bus: broadcast::Sender<TemporalEvent>,
}

impl PostgresEventStore {
    /// Create a store over an established connection pool.
    pub fn new(pool: &PostgresPool) -> Self {
        let (bus, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            pool: pool.pool().clone(),
            bus,
        }
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, events: Vec<TemporalEvent>) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }

        for event in events {
            let hash = content_hash(&event);
            let clock = serde_json::to_value(&event.clock)?;
            let payload = serde_json::to_value(&event.payload)?;

            let result = sqlx::query(
                r"INSERT INTO cf_event (event_id, entity_id, observed_at, event_type, node, clock, payload, hash)
                  VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                  ON CONFLICT (hash) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(event.entity_id.into_inner())
            .bind(event.observed_at)
            .bind(&event.event_type)
            .bind(&event.node)
            .bind(&clock)
            .bind(&payload)
            .bind(hash.to_vec())
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

            if result.rows_affected() == 0 {
                tracing::debug!(entity = %event.entity_id, "Duplicate append absorbed");
                continue;
            }
            // send errors only when no subscriber is connected, which is
            // not a failure of the append.
            let _ = self.bus.send(event);
        }
        Ok(())
    }

    async fn read(&self, entity_id: TemporalId) -> Result<Vec<TemporalEvent>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT entity_id, event_type, observed_at, node, clock, payload
              FROM cf_event
              WHERE entity_id = $1
              ORDER BY observed_at ASC",
        )
        .bind(entity_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter().map(TemporalEvent::try_from).collect()
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<TemporalEvent>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EVENT_COLUMNS} FROM cf_event WHERE 1=1"
        ));

        if let Some(event_type) = &query.event_type {
            builder.push(" AND event_type = ").push_bind(event_type.clone());
        }
        if let Some(from) = query.from {
            builder.push(" AND observed_at >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            builder.push(" AND observed_at <= ").push_bind(to);
        }
        if let Some((field, value)) = query.field_predicate() {
            // Top-level string-valued containment, matching the in-memory
            // backend's string-form comparison.
            let contains = serde_json::json!({ field: value });
            builder.push(" AND payload @> ").push_bind(contains);
        }

        builder.push(" ORDER BY observed_at ASC");

        if let Some(limit) = query.effective_limit() {
            builder
                .push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<EventRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        rows.into_iter().map(TemporalEvent::try_from).collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<TemporalEvent> {
        self.bus.subscribe()
    }
}

/// A row from the `cf_event` table.
///
/// Uses runtime types rather than compile-time checked types to avoid
/// requiring a live database during builds.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// The entity the event belongs to.
    pub entity_id: Uuid,
    /// Event type tag.
    pub event_type: String,
    /// Producer-assigned instant.
    pub observed_at: DateTime<Utc>,
    /// Logical producer identity.
    pub node: String,
    /// Causal clock as stored (JSONB).
    pub clock: Value,
    /// Payload as stored (JSONB).
    pub payload: Value,
}

impl TryFrom<EventRow> for TemporalEvent {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let clock: VectorClock = serde_json::from_value(row.clock)?;
        let payload: Map<String, Value> = serde_json::from_value(row.payload)?;
        Ok(Self {
            entity_id: TemporalId::new(row.entity_id),
            event_type: row.event_type,
            observed_at: row.observed_at,
            clock,
            payload,
            node: row.node,
        })
    }
}
