//! Tick-level event filtering.
//!
//! Window queries deliberately over-fetch (overlapping windows, any
//! status), so every tick re-checks eligibility here. The filter is
//! pure: it never touches the store.

use crate::model::event::{DiningEvent, EventStatus};

/// Returns `true` if the event still needs a reminder for this lead time.
///
/// Cancelled events are never reminded. Pending events are: diners who
/// have not confirmed yet still benefit from the nudge.
#[must_use]
pub fn needs_reminder(event: &DiningEvent, lead_label: &str) -> bool {
    event.status != EventStatus::Cancelled && !event.reminded_for(lead_label)
}

/// Drop events that are cancelled or already reminded for this lead time.
#[must_use]
pub fn eligible_events(events: Vec<DiningEvent>, lead_label: &str) -> Vec<DiningEvent> {
    events
        .into_iter()
        .filter(|event| needs_reminder(event, lead_label))
        .collect()
}
