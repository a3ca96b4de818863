//! Reminder query windows.
//!
//! Each tick queries one window per lead time. Windows are anchored at
//! `now + lead`, stretched forward by the tick period and padded on
//! both sides by the scheduler jitter, so consecutive ticks overlap
//! slightly instead of leaving gaps when the scheduler fires late.
//! Overlap is safe: reminder flags make dispatch idempotent.

use chrono::{DateTime, Duration, Utc};

/// Half-open time range `[start, end)` of event start times to remind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReminderWindow {
    /// Window for one lead time at one tick.
    ///
    /// `period` is the tick cadence and `jitter` the worst-case
    /// scheduler delay; the result is
    /// `[now + lead - jitter, now + lead + period + jitter)`.
    #[must_use]
    pub fn for_lead(
        now: DateTime<Utc>,
        lead: Duration,
        period: Duration,
        jitter: Duration,
    ) -> Self {
        let anchor = now + lead;
        Self {
            start: anchor - jitter,
            end: anchor + period + jitter,
        }
    }

    /// Returns `true` if the instant falls inside the window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Window width.
    #[must_use]
    pub fn width(&self) -> Duration {
        self.end - self.start
    }
}

impl std::fmt::Display for ReminderWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} .. {})",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}
