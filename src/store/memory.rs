//! In-memory datastore for testing and single-node deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{Datastore, NotificationRecord, WriteOp};
use crate::config::StoreConfig;
use crate::error::{DispatchError, Result};
use crate::model::event::{DiningEvent, EventId};
use crate::model::user::{UserId, UserRecord};

#[derive(Debug, Default)]
struct Inner {
    events: HashMap<EventId, DiningEvent>,
    users: HashMap<UserId, UserRecord>,
    notifications: Vec<NotificationRecord>,
}

/// In-memory [`Datastore`].
///
/// Documents live in an `Arc<RwLock<..>>` and are lost on drop.
/// Thread-safe and cheaply cloneable. Enforces the same read/write
/// limits a hosted document store would, so engine chunking bugs
/// surface in tests instead of production.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    in_query_limit: usize,
    write_batch_limit: usize,
}

impl MemoryStore {
    /// Create an empty store enforcing the configured limits.
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            in_query_limit: config.in_query_limit,
            write_batch_limit: config.write_batch_limit,
        }
    }

    /// Insert or replace an event.
    pub async fn insert_event(&self, event: DiningEvent) {
        let mut inner = self.inner.write().await;
        inner.events.insert(event.id.clone(), event);
    }

    /// Insert or replace a user.
    pub async fn insert_user(&self, user: UserRecord) {
        let mut inner = self.inner.write().await;
        inner.users.insert(user.id.clone(), user);
    }

    /// Remove an event, simulating deletion by another writer.
    pub async fn remove_event(&self, id: &str) {
        let mut inner = self.inner.write().await;
        inner.events.remove(id);
    }

    /// Current state of an event.
    pub async fn event(&self, id: &str) -> Option<DiningEvent> {
        let inner = self.inner.read().await;
        inner.events.get(id).cloned()
    }

    /// Current state of a user.
    pub async fn user(&self, id: &str) -> Option<UserRecord> {
        let inner = self.inner.read().await;
        inner.users.get(id).cloned()
    }

    /// All recorded notifications, in commit order.
    pub async fn notifications(&self) -> Vec<NotificationRecord> {
        let inner = self.inner.read().await;
        inner.notifications.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn events_starting_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DiningEvent>> {
        let inner = self.inner.read().await;
        let mut events: Vec<DiningEvent> = inner
            .events
            .values()
            .filter(|e| e.starts_at >= start && e.starts_at < end)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn fetch_users(&self, ids: &[UserId]) -> Result<Vec<UserRecord>> {
        if ids.len() > self.in_query_limit {
            return Err(DispatchError::Store(format!(
                "membership query of {} ids exceeds limit {}",
                ids.len(),
                self.in_query_limit
            )));
        }
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id).cloned())
            .collect())
    }

    async fn variant_assignment(&self, user: &str, experiment: &str) -> Result<Option<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .get(user)
            .and_then(|u| u.variant_assignments.get(experiment).cloned()))
    }

    async fn save_variant_assignment(
        &self,
        user: &str,
        experiment: &str,
        variant: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.users.get_mut(user) else {
            return Err(DispatchError::Store(format!("user not found: {user}")));
        };
        record
            .variant_assignments
            .insert(experiment.to_owned(), variant.to_owned());
        Ok(())
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<()> {
        if ops.len() > self.write_batch_limit {
            return Err(DispatchError::Store(format!(
                "write batch of {} ops exceeds limit {}",
                ops.len(),
                self.write_batch_limit
            )));
        }
        let mut inner = self.inner.write().await;
        for op in ops {
            match op {
                WriteOp::MarkReminded { event, lead_label } => {
                    if let Some(record) = inner.events.get_mut(&event) {
                        record.reminded.insert(lead_label, true);
                    } else {
                        tracing::debug!(event = %event, "mark-reminded target vanished; skipping");
                    }
                }
                WriteOp::ClearPushToken { user } => {
                    if let Some(record) = inner.users.get_mut(&user) {
                        record.push_token = None;
                    } else {
                        tracing::debug!(user = %user, "clear-token target vanished; skipping");
                    }
                }
                WriteOp::RecordNotification(record) => {
                    inner.notifications.push(record);
                }
            }
        }
        Ok(())
    }
}
