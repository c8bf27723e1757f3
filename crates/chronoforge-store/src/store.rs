//! The event store contract.
//!
//! [`EventStore`] is a capability trait with two shipped implementations: the
//! in-process reference backend ([`crate::memory::InMemoryEventStore`]) and
//! the durable `PostgreSQL` backend (`chronoforge-store-postgres`). Both must
//! satisfy the identical contract: idempotent content-addressed append,
//! per-entity ascending reads, AND-combinable search filters, and live
//! fan-out of every accepted event to subscribers in append order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronoforge_core::{TemporalEvent, TemporalId};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StoreError;

/// Append, read, search, and subscribe over temporal events.
///
/// Implementations serialize the visible effect of concurrent appends for a
/// given entity: subscribers observe one consistent per-entity order.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist each event exactly-effectively-once and publish each newly
    /// accepted event to all active subscribers.
    ///
    /// Duplicate content (same content hash) is silently absorbed: no error,
    /// no second stored record, no second delivery. Events within a single
    /// call are never reordered. An empty input is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the store cannot durably record an
    /// event; such an event has not been accepted.
    async fn append(&self, events: Vec<TemporalEvent>) -> Result<(), StoreError>;

    /// All events for the entity, ascending by `observed_at`.
    ///
    /// An unknown entity yields an empty list, not an error.
    async fn read(&self, entity_id: TemporalId) -> Result<Vec<TemporalEvent>, StoreError>;

    /// Events matching every supplied filter, ascending by `observed_at`,
    /// truncated to the query's limit when positive.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<TemporalEvent>, StoreError>;

    /// Register a live feed of every event accepted from this point forward.
    ///
    /// This is not a replay: history is served by [`EventStore::read`].
    /// Every subscriber independently receives the full accepted stream. The
    /// feed is a bounded broadcast channel; a subscriber that falls behind
    /// its buffer observes a lag marker and resumes at the newest event, so
    /// producers never block on slow consumers.
    fn subscribe(&self) -> broadcast::Receiver<TemporalEvent>;
}

/// Filters for [`EventStore::search`]. All parts are optional and combine
/// with logical AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Exact event type to match.
    pub event_type: Option<String>,
    /// Inclusive lower bound on `observed_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `observed_at`.
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of results; `None` or zero means unlimited.
    pub limit: Option<usize>,
    /// Top-level payload field to compare.
    pub field: Option<String>,
    /// Expected string form of the payload field.
    pub value: Option<String>,
}

impl SearchQuery {
    /// An empty query matching every event.
    pub const fn new() -> Self {
        Self {
            event_type: None,
            from: None,
            to: None,
            limit: None,
            field: None,
            value: None,
        }
    }

    /// Filter on exact event type.
    #[must_use]
    pub fn with_type(mut self, event_type: &str) -> Self {
        self.event_type = Some(event_type.to_owned());
        self
    }

    /// Filter on `observed_at >= from`.
    #[must_use]
    pub const fn with_from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Filter on `observed_at <= to`.
    #[must_use]
    pub const fn with_to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    /// Truncate results to at most `limit` events.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Filter on a top-level payload field equalling `value` (string form).
    #[must_use]
    pub fn with_field_equals(mut self, field: &str, value: &str) -> Self {
        self.field = Some(field.to_owned());
        self.value = Some(value.to_owned());
        self
    }

    /// The payload predicate, present only when both field and value were
    /// supplied. A field without a value (or vice versa) applies no filter.
    pub fn field_predicate(&self) -> Option<(&str, &str)> {
        match (self.field.as_deref(), self.value.as_deref()) {
            (Some(field), Some(value)) => Some((field, value)),
            _ => None,
        }
    }

    /// Whether the event passes every supplied filter.
    pub fn matches(&self, event: &TemporalEvent) -> bool {
        if let Some(event_type) = self.event_type.as_deref()
            && event.event_type != event_type
        {
            return false;
        }
        if let Some(from) = self.from
            && event.observed_at < from
        {
            return false;
        }
        if let Some(to) = self.to
            && event.observed_at > to
        {
            return false;
        }
        if let Some((field, value)) = self.field_predicate()
            && !event
                .payload
                .get(field)
                .is_some_and(|v| string_form(v) == value)
        {
            return false;
        }
        true
    }

    /// The effective positive limit, if any.
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|&n| n > 0)
    }
}

/// String form of a JSON value for field-equality comparison: strings
/// compare by their content, everything else by its JSON rendering.
pub fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
