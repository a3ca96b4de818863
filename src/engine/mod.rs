//! Reminder dispatch engine.
//!
//! [`ReminderEngine::run_tick`] drives one scheduled tick: for each
//! configured lead time it queries the reminder window, filters out
//! cancelled and already-reminded events, and processes the survivors
//! concurrently. Each event resolves recipients, renders per-user
//! content, pushes through the gateway and queues its write-backs.
//! The reminder flag is queued only after dispatch was attempted for
//! every deliverable recipient, and all writes flow through one
//! [`WriteBatcher`] per tick.
//!
//! Ticks are idempotent: re-running one only re-dispatches events
//! whose flags have not landed yet.

pub mod content;
pub mod dedup;
pub mod dispatch;
pub mod recipients;
pub mod window;
pub mod writeback;

pub use content::{ContentSelector, RenderedNotification, TemplateParams};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use recipients::{Recipient, RecipientResolver};
pub use window::ReminderWindow;
pub use writeback::WriteBatcher;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;

use crate::config::{DinnerbellConfig, LeadTimeConfig};
use crate::error::Result;
use crate::model::event::DiningEvent;
use crate::model::user::{NotificationKind, UserId};
use crate::push::{PushGateway, PushMessage, SendOutcome};
use crate::store::{Datastore, NotificationRecord, WriteOp};

/// Counters for one tick, logged at completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Windows queried (one per lead time).
    pub windows: usize,
    /// Events returned by the window queries, before filtering.
    pub candidates: usize,
    /// Events that still needed this reminder.
    pub eligible: usize,
    /// Events whose reminder flag was queued this tick.
    pub dispatched: usize,
    /// Events left unflagged for a later tick after a transient failure.
    pub retried: usize,
    /// Notifications the gateway accepted.
    pub delivered: usize,
    /// Per-address delivery failures, stale tokens included.
    pub failed: usize,
    /// Write operations committed.
    pub writes: usize,
}

/// Outcome of an immediate (non-reminder) notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmediateOutcome {
    /// The gateway accepted the notification.
    Delivered,
    /// Not sent; the reason says why.
    Skipped(SkipReason),
}

/// Why an immediate notification was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The recipient does not exist.
    UnknownUser,
    /// The recipient opted out of this notification kind.
    OptedOut,
    /// The recipient has no registered device.
    NoPushToken,
    /// No experiment is configured for this notification kind.
    NoExperiment,
    /// The device token was stale and has been cleared.
    StaleToken,
    /// The gateway rejected the delivery for this address.
    DeliveryFailed,
}

#[derive(Debug, Default)]
struct EventOutcome {
    dispatched: bool,
    retried: bool,
    delivered: usize,
    failed: usize,
}

#[derive(Clone)]
struct TickDeps {
    resolver: Arc<RecipientResolver>,
    selector: Arc<ContentSelector>,
    dispatcher: Arc<Dispatcher>,
    writer: Arc<WriteBatcher>,
    record_notifications: bool,
}

struct ContentGroup {
    message: PushMessage,
    members: Vec<Recipient>,
}

/// The reminder and push dispatch engine.
pub struct ReminderEngine {
    config: DinnerbellConfig,
    store: Arc<dyn Datastore>,
    gateway: Arc<dyn PushGateway>,
    resolver: Arc<RecipientResolver>,
    selector: Arc<ContentSelector>,
    dispatcher: Arc<Dispatcher>,
}

impl ReminderEngine {
    /// Wire up an engine over a store and push gateway.
    pub fn new(
        config: DinnerbellConfig,
        store: Arc<dyn Datastore>,
        gateway: Arc<dyn PushGateway>,
    ) -> Self {
        let resolver = Arc::new(RecipientResolver::new(
            Arc::clone(&store),
            config.store.in_query_limit,
        ));
        let selector = Arc::new(ContentSelector::new(
            Arc::clone(&store),
            &config.experiments,
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&gateway),
            config.push.multicast_limit,
        ));
        Self {
            config,
            store,
            gateway,
            resolver,
            selector,
            dispatcher,
        }
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &DinnerbellConfig {
        &self.config
    }

    /// Run one scheduled tick at `now`.
    ///
    /// Lead times are processed in order; the events inside each lead
    /// time run concurrently. Per-event failures are contained and the
    /// affected events retry next tick.
    ///
    /// # Errors
    ///
    /// Returns an error only when a window query fails, which means the
    /// store is unreachable for the whole tick. The next tick retries
    /// from scratch.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickSummary> {
        let started = std::time::Instant::now();
        let mut summary = TickSummary::default();
        let writer = Arc::new(WriteBatcher::new(
            Arc::clone(&self.store),
            self.config.store.write_batch_limit,
            self.config.store.write_batch_margin,
        ));
        let period =
            chrono::Duration::minutes(i64::from(self.config.engine.trigger_period_minutes));
        let jitter =
            chrono::Duration::minutes(i64::from(self.config.engine.scheduler_jitter_minutes));

        for lead in &self.config.engine.lead_times {
            let window = ReminderWindow::for_lead(now, lead.offset(), period, jitter);
            tracing::debug!(lead = %lead.label, window = %window, "querying reminder window");

            let events = match self
                .store
                .events_starting_between(window.start, window.end)
                .await
            {
                Ok(events) => events,
                Err(e) => {
                    // Flags for events already dispatched this tick must
                    // still land; flush before surfacing the failure.
                    let _ = writer.flush().await;
                    tracing::error!(lead = %lead.label, error = %e, "window query failed; ending tick");
                    return Err(e);
                }
            };

            summary.windows += 1;
            summary.candidates += events.len();
            let eligible = dedup::eligible_events(events, &lead.label);
            summary.eligible += eligible.len();

            let mut tasks = JoinSet::new();
            for event in eligible {
                let deps = TickDeps {
                    resolver: Arc::clone(&self.resolver),
                    selector: Arc::clone(&self.selector),
                    dispatcher: Arc::clone(&self.dispatcher),
                    writer: Arc::clone(&writer),
                    record_notifications: self.config.engine.record_notifications,
                };
                let lead = lead.clone();
                tasks.spawn(process_event(event, lead, deps));
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(outcome) => {
                        summary.dispatched += usize::from(outcome.dispatched);
                        summary.retried += usize::from(outcome.retried);
                        summary.delivered += outcome.delivered;
                        summary.failed += outcome.failed;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "event task aborted");
                        summary.retried += 1;
                    }
                }
            }
        }

        if let Err(e) = writer.flush().await {
            tracing::warn!(error = %e, "final write flush failed; unflagged events retry next tick");
        }
        summary.writes = writer.committed().await;

        tracing::info!(
            windows = summary.windows,
            candidates = summary.candidates,
            eligible = summary.eligible,
            dispatched = summary.dispatched,
            retried = summary.retried,
            delivered = summary.delivered,
            failed = summary.failed,
            writes = summary.writes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reminder tick complete"
        );
        Ok(summary)
    }

    /// Send a single non-reminder notification (chat message, new
    /// match) right away, honouring the user's preferences.
    ///
    /// # Errors
    ///
    /// Returns an error when the store or the gateway is unreachable.
    /// Nothing is queued; callers decide whether to retry.
    pub async fn dispatch_immediate(
        &self,
        kind: NotificationKind,
        user_id: &str,
        params: &TemplateParams,
    ) -> Result<ImmediateOutcome> {
        let ids = [user_id.to_owned()];
        let mut users = self.store.fetch_users(&ids).await?;
        let Some(user) = users.pop() else {
            tracing::debug!(user = %user_id, kind = %kind, "immediate notification for unknown user");
            return Ok(ImmediateOutcome::Skipped(SkipReason::UnknownUser));
        };
        if !user.allows(kind) {
            return Ok(ImmediateOutcome::Skipped(SkipReason::OptedOut));
        }
        let Some(address) = user.push_token.clone() else {
            return Ok(ImmediateOutcome::Skipped(SkipReason::NoPushToken));
        };
        let Some(experiment_id) = self
            .selector
            .experiment_for_kind(kind)
            .map(|e| e.id.clone())
        else {
            tracing::warn!(kind = %kind, "no experiment configured for notification kind");
            return Ok(ImmediateOutcome::Skipped(SkipReason::NoExperiment));
        };

        let content = self.selector.select(&experiment_id, &user.id, params).await?;
        let message = PushMessage {
            title: content.title,
            body: content.body,
        };

        match self.gateway.send(&address, &message).await? {
            SendOutcome::Delivered => {
                if self.config.engine.record_notifications {
                    let record = NotificationRecord {
                        id: uuid::Uuid::new_v4().to_string(),
                        user: user.id.clone(),
                        kind,
                        event: None,
                        title: message.title.clone(),
                        body: message.body.clone(),
                        sent_at: Utc::now(),
                    };
                    if let Err(e) = self
                        .store
                        .commit(vec![WriteOp::RecordNotification(record)])
                        .await
                    {
                        tracing::warn!(user = %user.id, error = %e, "failed to record notification");
                    }
                }
                Ok(ImmediateOutcome::Delivered)
            }
            SendOutcome::Unregistered => {
                if let Err(e) = self
                    .store
                    .commit(vec![WriteOp::ClearPushToken {
                        user: user.id.clone(),
                    }])
                    .await
                {
                    tracing::warn!(user = %user.id, error = %e, "failed to clear stale push token");
                }
                Ok(ImmediateOutcome::Skipped(SkipReason::StaleToken))
            }
            SendOutcome::Failed(reason) => {
                tracing::warn!(user = %user.id, kind = %kind, reason = %reason, "immediate notification failed");
                Ok(ImmediateOutcome::Skipped(SkipReason::DeliveryFailed))
            }
        }
    }
}

async fn process_event(event: DiningEvent, lead: LeadTimeConfig, deps: TickDeps) -> EventOutcome {
    let mut outcome = EventOutcome::default();

    let recipients = match deps.resolver.resolve(&event).await {
        Ok(recipients) => recipients,
        Err(e) => {
            tracing::warn!(
                event = %event.id,
                lead = %lead.label,
                error = %e,
                "recipient resolution failed; event retries next tick"
            );
            outcome.retried = true;
            return outcome;
        }
    };

    if recipients.is_empty() {
        // Nobody deliverable now means nobody deliverable on a retry
        // either; flag the event so it stops matching windows.
        tracing::debug!(event = %event.id, lead = %lead.label, "no deliverable recipients; marking reminded");
        return flag_event(&event, &lead, &deps, outcome).await;
    }

    let params = reminder_params(&event);

    // Render per recipient before pushing anything, so a store failure
    // here retries the event without partial deliveries.
    let mut groups: BTreeMap<String, ContentGroup> = BTreeMap::new();
    for recipient in recipients {
        let content = match deps
            .selector
            .select(&lead.experiment, &recipient.user, &params)
            .await
        {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(
                    event = %event.id,
                    user = %recipient.user,
                    error = %e,
                    "content selection failed; event retries next tick"
                );
                outcome.retried = true;
                return outcome;
            }
        };
        groups
            .entry(content.variant.clone().unwrap_or_default())
            .or_insert_with(|| ContentGroup {
                message: PushMessage {
                    title: content.title,
                    body: content.body,
                },
                members: Vec::new(),
            })
            .members
            .push(recipient);
    }

    let mut stale_users: Vec<UserId> = Vec::new();
    let mut records: Vec<NotificationRecord> = Vec::new();
    let mut gateway_failed = false;

    for (variant, group) in &groups {
        let addresses: Vec<_> = group.members.iter().map(|m| m.address.clone()).collect();
        match deps
            .dispatcher
            .dispatch(&event.id, &group.message, &addresses)
            .await
        {
            Ok(dispatched) => {
                outcome.delivered += dispatched.delivered.len();
                outcome.failed += dispatched.failed.len();
                for address in &dispatched.stale {
                    if let Some(member) = group.members.iter().find(|m| &m.address == address) {
                        stale_users.push(member.user.clone());
                    }
                }
                if deps.record_notifications {
                    for address in &dispatched.delivered {
                        if let Some(member) = group.members.iter().find(|m| &m.address == address)
                        {
                            records.push(NotificationRecord {
                                id: uuid::Uuid::new_v4().to_string(),
                                user: member.user.clone(),
                                kind: NotificationKind::EventReminder,
                                event: Some(event.id.clone()),
                                title: group.message.title.clone(),
                                body: group.message.body.clone(),
                                sent_at: Utc::now(),
                            });
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    event = %event.id,
                    variant = %variant,
                    error = %e,
                    "push gateway unavailable; event retries next tick"
                );
                gateway_failed = true;
            }
        }
    }

    if gateway_failed {
        // The flag stays unset. Recipients already reached may get the
        // reminder again next tick; delivery is at-least-once.
        outcome.retried = true;
        return outcome;
    }

    // Records and token clears are best-effort; the batcher logs any
    // commit failure.
    for record in records {
        let _ = deps
            .writer
            .queue(WriteOp::RecordNotification(record))
            .await;
    }
    for user in stale_users {
        let _ = deps.writer.queue(WriteOp::ClearPushToken { user }).await;
    }

    flag_event(&event, &lead, &deps, outcome).await
}

async fn flag_event(
    event: &DiningEvent,
    lead: &LeadTimeConfig,
    deps: &TickDeps,
    mut outcome: EventOutcome,
) -> EventOutcome {
    match deps
        .writer
        .queue(WriteOp::MarkReminded {
            event: event.id.clone(),
            lead_label: lead.label.clone(),
        })
        .await
    {
        Ok(()) => outcome.dispatched = true,
        // The batcher already logged the commit failure.
        Err(_) => outcome.retried = true,
    }
    outcome
}

fn reminder_params(event: &DiningEvent) -> TemplateParams {
    TemplateParams::from([
        ("event".to_owned(), event.title.clone()),
        (
            "date".to_owned(),
            event.starts_at.format("%Y-%m-%d").to_string(),
        ),
        (
            "time".to_owned(),
            event.starts_at.format("%H:%M").to_string(),
        ),
    ])
}
