//! Configuration types for the reminder dispatch engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::model::experiment::{ExperimentDefinition, Variant};
use crate::model::user::NotificationKind;

/// Top-level configuration for the dispatch engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DinnerbellConfig {
    /// Tick cadence, lead times and dispatch behaviour.
    pub engine: EngineConfig,
    /// Store query and write-batch limits.
    pub store: StoreConfig,
    /// Push gateway settings.
    pub push: PushConfig,
    /// Notification content experiments, in definition order.
    pub experiments: Vec<ExperimentDefinition>,
}

impl Default for DinnerbellConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            store: StoreConfig::default(),
            push: PushConfig::default(),
            experiments: default_experiments(),
        }
    }
}

/// Engine tick and reminder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minutes between scheduled ticks. Consecutive windows for a lead
    /// time tile without gaps as long as ticks fire at this cadence.
    pub trigger_period_minutes: u32,
    /// Worst-case scheduler start delay in minutes. Widens every query
    /// window on both sides so late ticks never skip events.
    pub scheduler_jitter_minutes: u32,
    /// Reminder lead times, each dispatched independently per tick.
    pub lead_times: Vec<LeadTimeConfig>,
    /// Whether delivered notifications are recorded in the store.
    pub record_notifications: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_period_minutes: 15,
            scheduler_jitter_minutes: 2,
            lead_times: default_lead_times(),
            record_notifications: true,
        }
    }
}

/// One reminder lead time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadTimeConfig {
    /// Label used as the reminder-flag key on events (e.g. `"24h"`).
    pub label: String,
    /// How far ahead of the event start this reminder fires, in minutes.
    pub offset_minutes: u32,
    /// Experiment id that renders this reminder's content.
    pub experiment: String,
}

impl LeadTimeConfig {
    /// Lead offset as a duration.
    #[must_use]
    pub fn offset(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.offset_minutes))
    }
}

/// Store access limits.
///
/// The limits mirror hard caps enforced by the backing document store;
/// the engine chunks its reads and writes to stay under them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum ids per membership query.
    pub in_query_limit: usize,
    /// Hard ceiling on operations per write batch.
    pub write_batch_limit: usize,
    /// Safety margin under the ceiling. Batches auto-flush once they
    /// reach `write_batch_limit - write_batch_margin` operations.
    pub write_batch_margin: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            in_query_limit: 10,
            write_batch_limit: 500,
            write_batch_margin: 50,
        }
    }
}

/// Push gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Gateway HTTP endpoint.
    pub endpoint: String,
    /// Server API key sent on every request. Empty means delivery will
    /// be rejected by the gateway; useful only for dry runs.
    pub server_key: String,
    /// Maximum device addresses per multicast request.
    pub multicast_limit: usize,
    /// HTTP request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://fcm.googleapis.com/fcm/send".to_owned(),
            server_key: String::new(),
            multicast_limit: 500,
            timeout_seconds: 10,
        }
    }
}

fn default_lead_times() -> Vec<LeadTimeConfig> {
    vec![
        LeadTimeConfig {
            label: "24h".to_owned(),
            offset_minutes: 24 * 60,
            experiment: "dinner_reminder_24h".to_owned(),
        },
        LeadTimeConfig {
            label: "2h".to_owned(),
            offset_minutes: 2 * 60,
            experiment: "dinner_reminder_2h".to_owned(),
        },
    ]
}

fn default_experiments() -> Vec<ExperimentDefinition> {
    vec![
        ExperimentDefinition {
            id: "dinner_reminder_24h".to_owned(),
            kind: NotificationKind::EventReminder,
            variants: vec![
                Variant::new(
                    "control",
                    "Dinner tomorrow: {event}",
                    "You're booked for {event} at {time}. See you there!",
                ),
                Variant {
                    emoji: Some("🍽️".to_owned()),
                    ..Variant::new(
                        "friendly",
                        "{event} is tomorrow!",
                        "Your table for {event} is set for {time}. Hungry yet?",
                    )
                },
            ],
            default_variant: "control".to_owned(),
        },
        ExperimentDefinition {
            id: "dinner_reminder_2h".to_owned(),
            kind: NotificationKind::EventReminder,
            variants: vec![Variant::new(
                "control",
                "Starting soon: {event}",
                "{event} starts at {time}. Time to head out.",
            )],
            default_variant: "control".to_owned(),
        },
        ExperimentDefinition {
            id: "chat_message".to_owned(),
            kind: NotificationKind::ChatMessage,
            variants: vec![Variant::new(
                "control",
                "New message from {sender}",
                "{preview}",
            )],
            default_variant: "control".to_owned(),
        },
        ExperimentDefinition {
            id: "new_match".to_owned(),
            kind: NotificationKind::NewMatch,
            variants: vec![Variant {
                emoji: Some("✨".to_owned()),
                ..Variant::new(
                    "control",
                    "You have a new match!",
                    "Say hi to {name} and pick a date for dinner.",
                )
            }],
            default_variant: "control".to_owned(),
        },
    ]
}

impl DinnerbellConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::DispatchError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::DispatchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/dinnerbell/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("dinnerbell").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("dinnerbell")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/dinnerbell-config/config.toml")
        }
    }

    /// Look up an experiment by id.
    #[must_use]
    pub fn experiment(&self, id: &str) -> Option<&ExperimentDefinition> {
        self.experiments.iter().find(|e| e.id == id)
    }
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueSeverity {
    Warning,
    Error,
}

/// Validation issue surfaced at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub id: String,
    pub title: String,
    pub severity: ConfigIssueSeverity,
    pub summary: String,
}

/// Validate engine configuration without network calls.
#[must_use]
pub fn validate_config(config: &DinnerbellConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    if config.engine.trigger_period_minutes == 0 {
        issues.push(ConfigIssue {
            id: "engine-zero-period".to_owned(),
            title: "Trigger period is zero".to_owned(),
            severity: ConfigIssueSeverity::Error,
            summary: "engine.trigger_period_minutes must be at least 1.".to_owned(),
        });
    }

    if config.engine.lead_times.is_empty() {
        issues.push(ConfigIssue {
            id: "engine-no-lead-times".to_owned(),
            title: "No reminder lead times".to_owned(),
            severity: ConfigIssueSeverity::Warning,
            summary: "The engine will tick but never dispatch reminders.".to_owned(),
        });
    }

    let mut seen_labels = Vec::new();
    for (index, lead) in config.engine.lead_times.iter().enumerate() {
        let label = lead.label.trim();
        if label.is_empty() {
            issues.push(ConfigIssue {
                id: format!("lead-missing-label-{index}"),
                title: "Lead time missing label".to_owned(),
                severity: ConfigIssueSeverity::Error,
                summary: format!("Lead time #{index} has an empty label."),
            });
            continue;
        }
        if seen_labels.contains(&label) {
            issues.push(ConfigIssue {
                id: format!("lead-duplicate-label-{index}"),
                title: "Duplicate lead time label".to_owned(),
                severity: ConfigIssueSeverity::Error,
                summary: format!(
                    "Label `{label}` appears more than once; reminder flags would collide."
                ),
            });
        }
        seen_labels.push(label);

        if lead.offset_minutes == 0 {
            issues.push(ConfigIssue {
                id: format!("lead-zero-offset-{index}"),
                title: "Lead time offset is zero".to_owned(),
                severity: ConfigIssueSeverity::Error,
                summary: format!("Lead time `{label}` must fire ahead of the event start."),
            });
        }

        if config.experiment(&lead.experiment).is_none() {
            issues.push(ConfigIssue {
                id: format!("lead-unknown-experiment-{index}"),
                title: "Lead time references unknown experiment".to_owned(),
                severity: ConfigIssueSeverity::Error,
                summary: format!(
                    "Lead time `{label}` references experiment `{}` which is not defined.",
                    lead.experiment
                ),
            });
        }
    }

    let mut seen_experiments = Vec::new();
    for (index, experiment) in config.experiments.iter().enumerate() {
        if seen_experiments.contains(&experiment.id.as_str()) {
            issues.push(ConfigIssue {
                id: format!("experiment-duplicate-id-{index}"),
                title: "Duplicate experiment id".to_owned(),
                severity: ConfigIssueSeverity::Error,
                summary: format!("Experiment id `{}` appears more than once.", experiment.id),
            });
        }
        seen_experiments.push(experiment.id.as_str());

        if experiment.variants.is_empty() {
            issues.push(ConfigIssue {
                id: format!("experiment-no-variants-{index}"),
                title: "Experiment has no variants".to_owned(),
                severity: ConfigIssueSeverity::Error,
                summary: format!(
                    "Experiment `{}` defines no variants; only placeholder content can be sent.",
                    experiment.id
                ),
            });
        }

        let mut seen_variants = Vec::new();
        let mut weight_total = 0.0_f64;
        for variant in &experiment.variants {
            if seen_variants.contains(&variant.id.as_str()) {
                issues.push(ConfigIssue {
                    id: format!("experiment-duplicate-variant-{index}"),
                    title: "Duplicate variant id".to_owned(),
                    severity: ConfigIssueSeverity::Error,
                    summary: format!(
                        "Experiment `{}` defines variant `{}` more than once.",
                        experiment.id, variant.id
                    ),
                });
            }
            seen_variants.push(variant.id.as_str());

            if let Some(weight) = variant.weight {
                if weight < 0.0 {
                    issues.push(ConfigIssue {
                        id: format!("experiment-negative-weight-{index}"),
                        title: "Negative variant weight".to_owned(),
                        severity: ConfigIssueSeverity::Error,
                        summary: format!(
                            "Variant `{}` in experiment `{}` has a negative weight.",
                            variant.id, experiment.id
                        ),
                    });
                } else {
                    weight_total += weight;
                }
            }
        }

        if weight_total > 100.0 {
            issues.push(ConfigIssue {
                id: format!("experiment-weights-over-budget-{index}"),
                title: "Variant weights exceed 100".to_owned(),
                severity: ConfigIssueSeverity::Warning,
                summary: format!(
                    "Experiment `{}` has cumulative weight {weight_total}; trailing variants are unreachable.",
                    experiment.id
                ),
            });
        }

        if experiment.variant(&experiment.default_variant).is_none() {
            issues.push(ConfigIssue {
                id: format!("experiment-missing-default-{index}"),
                title: "Default variant not defined".to_owned(),
                severity: ConfigIssueSeverity::Warning,
                summary: format!(
                    "Experiment `{}` names default variant `{}` which is not defined; placeholder content will be used for fallback rolls.",
                    experiment.id, experiment.default_variant
                ),
            });
        }
    }

    for kind in [NotificationKind::ChatMessage, NotificationKind::NewMatch] {
        let count = config.experiments.iter().filter(|e| e.kind == kind).count();
        if count == 0 {
            issues.push(ConfigIssue {
                id: format!("no-experiment-for-{kind}"),
                title: "Notification kind has no experiment".to_owned(),
                severity: ConfigIssueSeverity::Warning,
                summary: format!("Immediate notifications of kind `{kind}` cannot be sent."),
            });
        } else if count > 1 {
            issues.push(ConfigIssue {
                id: format!("multiple-experiments-for-{kind}"),
                title: "Notification kind has several experiments".to_owned(),
                severity: ConfigIssueSeverity::Warning,
                summary: format!(
                    "Kind `{kind}` is rendered by {count} experiments; the first in definition order wins."
                ),
            });
        }
    }

    if config.store.in_query_limit == 0 {
        issues.push(ConfigIssue {
            id: "store-zero-in-query-limit".to_owned(),
            title: "Membership query limit is zero".to_owned(),
            severity: ConfigIssueSeverity::Error,
            summary: "store.in_query_limit must be at least 1.".to_owned(),
        });
    }
    if config.store.write_batch_limit == 0 {
        issues.push(ConfigIssue {
            id: "store-zero-batch-limit".to_owned(),
            title: "Write batch limit is zero".to_owned(),
            severity: ConfigIssueSeverity::Error,
            summary: "store.write_batch_limit must be at least 1.".to_owned(),
        });
    } else if config.store.write_batch_margin >= config.store.write_batch_limit {
        issues.push(ConfigIssue {
            id: "store-margin-swallows-limit".to_owned(),
            title: "Write batch margin exceeds limit".to_owned(),
            severity: ConfigIssueSeverity::Error,
            summary: format!(
                "write_batch_margin ({}) must be smaller than write_batch_limit ({}).",
                config.store.write_batch_margin, config.store.write_batch_limit
            ),
        });
    }

    if config.push.multicast_limit == 0 {
        issues.push(ConfigIssue {
            id: "push-zero-multicast-limit".to_owned(),
            title: "Multicast limit is zero".to_owned(),
            severity: ConfigIssueSeverity::Error,
            summary: "push.multicast_limit must be at least 1.".to_owned(),
        });
    }
    if config.push.endpoint.trim().is_empty() {
        issues.push(ConfigIssue {
            id: "push-missing-endpoint".to_owned(),
            title: "Push endpoint missing".to_owned(),
            severity: ConfigIssueSeverity::Error,
            summary: "push.endpoint is empty.".to_owned(),
        });
    }
    if config.push.server_key.trim().is_empty() {
        issues.push(ConfigIssue {
            id: "push-missing-server-key".to_owned(),
            title: "Push server key missing".to_owned(),
            severity: ConfigIssueSeverity::Warning,
            summary: "push.server_key is empty; the gateway will reject deliveries.".to_owned(),
        });
    }

    issues
}
