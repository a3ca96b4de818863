//! Dining event model.
//!
//! Events are the unit of reminder dispatch: each event carries its own
//! reminder flags (one per lead time) and a per-participant mute map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::user::UserId;

/// Unique event identifier, assigned by the backing store.
pub type EventId = String;

/// Lifecycle status of a dining event.
///
/// Only [`EventStatus::Cancelled`] suppresses reminders; events still
/// waiting on confirmations are reminded like confirmed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Created, not all seats confirmed yet.
    Pending,
    /// All seats confirmed.
    Confirmed,
    /// Called off; no further notifications.
    Cancelled,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A scheduled group dinner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiningEvent {
    /// Store-assigned identifier.
    pub id: EventId,
    /// Title shown in notifications (restaurant or occasion name).
    pub title: String,
    /// Scheduled start time.
    pub starts_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: EventStatus,
    /// Participant user ids. Small by construction; tables seat at most
    /// a handful of diners.
    #[serde(default)]
    pub participants: Vec<UserId>,
    /// Reminder flags keyed by lead-time label (e.g. `"24h"`, `"2h"`).
    /// A flag set to `true` is never unset.
    #[serde(default)]
    pub reminded: BTreeMap<String, bool>,
    /// Participants who muted reminders for this event only.
    #[serde(default)]
    pub reminder_opt_out: BTreeMap<UserId, bool>,
}

impl DiningEvent {
    /// Create a new pending event with no participants.
    pub fn new(id: impl Into<String>, title: impl Into<String>, starts_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            starts_at,
            status: EventStatus::Pending,
            participants: Vec::new(),
            reminded: BTreeMap::new(),
            reminder_opt_out: BTreeMap::new(),
        }
    }

    /// Returns `true` if the reminder for the given lead time was
    /// already dispatched.
    #[must_use]
    pub fn reminded_for(&self, lead_label: &str) -> bool {
        self.reminded.get(lead_label).copied().unwrap_or(false)
    }

    /// Returns `true` if the participant muted reminders for this event.
    #[must_use]
    pub fn reminder_muted(&self, user: &str) -> bool {
        self.reminder_opt_out.get(user).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    fn sample_event() -> DiningEvent {
        let starts = Utc.with_ymd_and_hms(2025, 6, 14, 19, 0, 0).unwrap();
        DiningEvent::new("evt-1", "Trattoria Nonna", starts)
    }

    #[test]
    fn new_event_is_pending_with_no_flags() {
        let event = sample_event();
        assert_eq!(event.status, EventStatus::Pending);
        assert!(event.participants.is_empty());
        assert!(!event.reminded_for("24h"));
        assert!(!event.reminder_muted("user-1"));
    }

    #[test]
    fn reminded_for_reads_only_its_own_label() {
        let mut event = sample_event();
        event.reminded.insert("24h".to_owned(), true);
        assert!(event.reminded_for("24h"));
        assert!(!event.reminded_for("2h"));
    }

    #[test]
    fn reminder_muted_honours_explicit_false() {
        let mut event = sample_event();
        event.reminder_opt_out.insert("user-1".to_owned(), false);
        assert!(!event.reminder_muted("user-1"));
        event.reminder_opt_out.insert("user-1".to_owned(), true);
        assert!(event.reminder_muted("user-1"));
    }

    #[test]
    fn status_serialises_snake_case() {
        let json = serde_json::to_string(&EventStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        let restored: EventStatus = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(restored, EventStatus::Confirmed);
    }

    #[test]
    fn event_serde_round_trip_keeps_flags() {
        let mut event = sample_event();
        event.participants.push("user-1".to_owned());
        event.reminded.insert("2h".to_owned(), true);

        let json = serde_json::to_string(&event).unwrap();
        let restored: DiningEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, "evt-1");
        assert!(restored.reminded_for("2h"));
        assert_eq!(restored.participants, vec!["user-1".to_owned()]);
    }
}
