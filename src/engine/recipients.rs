//! Recipient resolution.
//!
//! Turns an event's participant list into deliverable push addresses.
//! Participant ids are fetched in chunks that respect the store's
//! membership-query limit, then filtered: per-event mutes, missing
//! push tokens and disabled reminder preferences all drop a recipient
//! silently. A store error aborts resolution so the whole event is
//! retried on the next tick.

use std::sync::Arc;

use crate::error::Result;
use crate::model::event::DiningEvent;
use crate::model::user::{NotificationKind, UserId};
use crate::push::PushAddress;
use crate::store::Datastore;

/// A participant with a live push address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub user: UserId,
    pub address: PushAddress,
}

/// Resolves event participants to deliverable recipients.
pub struct RecipientResolver {
    store: Arc<dyn Datastore>,
    chunk_limit: usize,
}

impl RecipientResolver {
    /// Create a resolver that chunks membership queries at `chunk_limit` ids.
    pub fn new(store: Arc<dyn Datastore>, chunk_limit: usize) -> Self {
        Self {
            store,
            chunk_limit: chunk_limit.max(1),
        }
    }

    /// Deliverable recipients for one event, in participant order.
    ///
    /// # Errors
    ///
    /// Returns an error if any chunk fetch fails; no partial result is
    /// returned in that case.
    pub async fn resolve(&self, event: &DiningEvent) -> Result<Vec<Recipient>> {
        let wanted: Vec<UserId> = event
            .participants
            .iter()
            .filter(|id| !event.reminder_muted(id))
            .cloned()
            .collect();

        let mut recipients = Vec::with_capacity(wanted.len());
        for chunk in wanted.chunks(self.chunk_limit) {
            let users = self.store.fetch_users(chunk).await?;
            for user in users {
                if !user.allows(NotificationKind::EventReminder) {
                    tracing::debug!(user = %user.id, "participant opted out of reminders; skipping");
                    continue;
                }
                // `allows` borrows the whole record, so it runs before
                // the token is moved out.
                let Some(address) = user.push_token else {
                    tracing::debug!(user = %user.id, "participant has no push token; skipping");
                    continue;
                };
                recipients.push(Recipient {
                    user: user.id,
                    address,
                });
            }
        }
        Ok(recipients)
    }
}
