//! Notification content experiments.
//!
//! Every notification kind is rendered through an experiment: a set of
//! weighted copy variants plus a default. Users are assigned a variant
//! on first contact and keep it for the lifetime of the experiment.

use serde::{Deserialize, Serialize};

use super::user::NotificationKind;

/// One candidate rendering of a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Stable variant identifier, unique within its experiment.
    pub id: String,
    /// Title template. `{name}` placeholders are replaced at render time.
    pub title: String,
    /// Body template, same placeholder syntax as `title`.
    pub body: String,
    /// Optional emoji prepended to the rendered title.
    #[serde(default)]
    pub emoji: Option<String>,
    /// Share of users in percent. When absent, the experiment's weight
    /// budget is split evenly across variants.
    #[serde(default)]
    pub weight: Option<f64>,
}

impl Variant {
    /// Create a variant with no emoji and no explicit weight.
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            emoji: None,
            weight: None,
        }
    }
}

/// A named experiment over notification copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    /// Stable experiment identifier, referenced from lead-time config.
    pub id: String,
    /// Notification kind this experiment renders.
    pub kind: NotificationKind,
    /// Candidate variants, in definition order. Order matters: rolls
    /// walk the cumulative weights in this order.
    pub variants: Vec<Variant>,
    /// Variant used when a roll lands past the cumulative weights or a
    /// persisted assignment no longer exists.
    pub default_variant: String,
}

impl ExperimentDefinition {
    /// Look up a variant by id.
    #[must_use]
    pub fn variant(&self, id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn sample_experiment() -> ExperimentDefinition {
        ExperimentDefinition {
            id: "dinner_reminder_24h".to_owned(),
            kind: NotificationKind::EventReminder,
            variants: vec![
                Variant::new("control", "Dinner tomorrow", "See you at {event}."),
                Variant::new("friendly", "Tomorrow's the day!", "{event} is waiting for you."),
            ],
            default_variant: "control".to_owned(),
        }
    }

    #[test]
    fn variant_lookup_by_id() {
        let experiment = sample_experiment();
        assert_eq!(experiment.variant("friendly").unwrap().id, "friendly");
        assert!(experiment.variant("missing").is_none());
    }

    #[test]
    fn experiment_deserialises_from_toml() {
        let toml = r#"
            id = "dinner_reminder_2h"
            kind = "event_reminder"
            default_variant = "control"

            [[variants]]
            id = "control"
            title = "Starting soon"
            body = "{event} starts at {time}."
            weight = 60.0

            [[variants]]
            id = "urgent"
            title = "Almost time!"
            body = "Head out now for {event}."
            emoji = "🍽️"
            weight = 40.0
        "#;
        let experiment: ExperimentDefinition = toml::from_str(toml).unwrap();
        assert_eq!(experiment.kind, NotificationKind::EventReminder);
        assert_eq!(experiment.variants.len(), 2);
        assert_eq!(experiment.variants[1].emoji.as_deref(), Some("🍽️"));
        assert_eq!(experiment.variants[0].weight, Some(60.0));
    }
}
