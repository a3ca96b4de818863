//! User records as seen by the dispatch engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique user identifier, assigned by the backing store.
pub type UserId = String;

/// Categories of push notification a user can opt in or out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Scheduled reminder ahead of a dinner.
    EventReminder,
    /// A new message in an event chat.
    ChatMessage,
    /// A new dining match was made.
    NewMatch,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EventReminder => write!(f, "event_reminder"),
            Self::ChatMessage => write!(f, "chat_message"),
            Self::NewMatch => write!(f, "new_match"),
        }
    }
}

/// The slice of a user profile the engine needs to deliver pushes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Store-assigned identifier.
    pub id: UserId,
    /// Name used when rendering notification templates.
    pub display_name: String,
    /// Device push address. `None` means the user never registered a
    /// device or the token was invalidated.
    #[serde(default)]
    pub push_token: Option<String>,
    /// Per-kind notification preferences. Absent kinds default to
    /// enabled.
    #[serde(default)]
    pub notification_prefs: BTreeMap<NotificationKind, bool>,
    /// Sticky experiment assignments, keyed by experiment id.
    #[serde(default)]
    pub variant_assignments: BTreeMap<String, String>,
}

impl UserRecord {
    /// Create a user with no device token and default preferences.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            push_token: None,
            notification_prefs: BTreeMap::new(),
            variant_assignments: BTreeMap::new(),
        }
    }

    /// Returns `true` if the user accepts notifications of this kind.
    #[must_use]
    pub fn allows(&self, kind: NotificationKind) -> bool {
        self.notification_prefs.get(&kind).copied().unwrap_or(true)
    }
}
