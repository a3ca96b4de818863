//! Storage trait and write operations.
//!
//! Defines the [`Datastore`] trait the engine reads events and users
//! through, plus the [`WriteOp`] batch operations it writes back with.
//! [`MemoryStore`] provides an in-memory implementation for testing
//! and single-node deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::event::{DiningEvent, EventId};
use crate::model::user::{NotificationKind, UserId, UserRecord};

pub mod memory;

pub use memory::MemoryStore;

/// A single operation in a write batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Set an event's reminder flag for one lead time. One-way: the
    /// engine never clears a flag once set.
    MarkReminded { event: EventId, lead_label: String },
    /// Drop a user's push token after the gateway reported it stale.
    ClearPushToken { user: UserId },
    /// Append a delivered-notification record.
    RecordNotification(NotificationRecord),
}

/// Audit record of one delivered notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Generated record id.
    pub id: String,
    /// Recipient.
    pub user: UserId,
    /// Notification kind.
    pub kind: NotificationKind,
    /// Event that triggered the notification, if any.
    pub event: Option<EventId>,
    /// Rendered title as sent.
    pub title: String,
    /// Rendered body as sent.
    pub body: String,
    /// Time the gateway accepted the delivery.
    pub sent_at: DateTime<Utc>,
}

/// Async event/user storage backend.
///
/// The engine is the only writer of reminder flags; other fields may
/// be written concurrently by the rest of the product. Implementations
/// enforce the limits from [`crate::config::StoreConfig`] and reject
/// oversized reads and batches, which callers treat as defects rather
/// than retryable failures.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Events with `starts_at` in `[start, end)`, any status.
    async fn events_starting_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DiningEvent>>;

    /// Fetch user records by id. Unknown ids are omitted from the
    /// result rather than reported as errors.
    async fn fetch_users(&self, ids: &[UserId]) -> Result<Vec<UserRecord>>;

    /// A user's sticky variant assignment for one experiment, if any.
    async fn variant_assignment(&self, user: &str, experiment: &str) -> Result<Option<String>>;

    /// Persist a variant assignment. Overwrites any previous value.
    async fn save_variant_assignment(
        &self,
        user: &str,
        experiment: &str,
        variant: &str,
    ) -> Result<()>;

    /// Apply a batch of write operations atomically. Operations that
    /// reference documents deleted since they were queued are skipped.
    async fn commit(&self, ops: Vec<WriteOp>) -> Result<()>;
}
