//! Notification content selection.
//!
//! Every notification is rendered through an experiment: the user's
//! sticky variant is looked up (or drawn and persisted on first
//! contact), then the variant's templates are rendered with the
//! call-site parameters. Selection never fails the dispatch path for
//! content reasons; unknown experiments and vanished variants degrade
//! to placeholder content with a warning.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::model::experiment::{ExperimentDefinition, Variant};
use crate::model::user::{NotificationKind, UserId};
use crate::store::Datastore;

/// Template parameters, replaced globally in title and body.
pub type TemplateParams = BTreeMap<String, String>;

/// Rendered notification content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    /// Variant that produced the content; `None` for placeholder
    /// content sent when an experiment is misconfigured.
    pub variant: Option<String>,
    pub title: String,
    pub body: String,
}

impl RenderedNotification {
    fn placeholder() -> Self {
        Self {
            variant: None,
            title: String::new(),
            body: String::new(),
        }
    }
}

/// Pick the variant a roll in `[0, 100)` lands on.
///
/// Walks the variants in definition order, accumulating weights, and
/// returns the first variant whose cumulative weight strictly exceeds
/// the roll. Variants without an explicit weight share the 100-point
/// budget evenly. Returns `None` when the cumulative weights sum to
/// less than the roll (an under-allocated experiment); callers fall
/// back to the default variant.
#[must_use]
pub fn pick_variant(definition: &ExperimentDefinition, roll: f64) -> Option<&Variant> {
    if definition.variants.is_empty() {
        return None;
    }
    let even_share = 100.0 / definition.variants.len() as f64;
    let mut cumulative = 0.0_f64;
    for variant in &definition.variants {
        cumulative += variant.weight.unwrap_or(even_share);
        if cumulative > roll {
            return Some(variant);
        }
    }
    None
}

/// Replace every `{name}` placeholder with its parameter value.
#[must_use]
pub fn render_template(template: &str, params: &TemplateParams) -> String {
    let mut rendered = template.to_owned();
    for (name, value) in params {
        rendered = rendered.replace(&format!("{{{name}}}"), value);
    }
    rendered
}

fn render(variant: &Variant, params: &TemplateParams) -> RenderedNotification {
    let mut title = render_template(&variant.title, params);
    if let Some(emoji) = &variant.emoji {
        title = format!("{emoji} {title}");
    }
    RenderedNotification {
        variant: Some(variant.id.clone()),
        title,
        body: render_template(&variant.body, params),
    }
}

/// Selects and renders notification content with sticky assignments.
pub struct ContentSelector {
    store: Arc<dyn Datastore>,
    experiments: Vec<ExperimentDefinition>,
    /// Read-through cache of persisted assignments. The lock also
    /// serialises first-contact draws so concurrent selections for the
    /// same user cannot race to different variants.
    assigned: Mutex<HashMap<(UserId, String), String>>,
}

impl ContentSelector {
    /// Create a selector over the configured experiments.
    pub fn new(store: Arc<dyn Datastore>, experiments: &[ExperimentDefinition]) -> Self {
        Self {
            store,
            experiments: experiments.to_vec(),
            assigned: Mutex::new(HashMap::new()),
        }
    }

    /// Look up an experiment definition by id.
    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&ExperimentDefinition> {
        self.experiments.iter().find(|e| e.id == id)
    }

    /// The first experiment in definition order rendering this kind.
    #[must_use]
    pub fn experiment_for_kind(&self, kind: NotificationKind) -> Option<&ExperimentDefinition> {
        self.experiments.iter().find(|e| e.kind == kind)
    }

    /// Select the user's variant for an experiment and render it.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store fails while reading or
    /// persisting the assignment. Content problems degrade to
    /// placeholder output instead.
    pub async fn select(
        &self,
        experiment_id: &str,
        user: &str,
        params: &TemplateParams,
    ) -> Result<RenderedNotification> {
        let Some(definition) = self.definition(experiment_id) else {
            tracing::warn!(
                experiment = experiment_id,
                "unknown experiment; sending placeholder content"
            );
            return Ok(RenderedNotification::placeholder());
        };

        let assigned = self.assignment_for(definition, user).await?;
        let variant = definition
            .variant(&assigned)
            .or_else(|| definition.variant(&definition.default_variant));
        match variant {
            Some(variant) => Ok(render(variant, params)),
            None => {
                tracing::warn!(
                    experiment = experiment_id,
                    user = %user,
                    assigned = %assigned,
                    "assigned and default variants missing; sending placeholder content"
                );
                Ok(RenderedNotification::placeholder())
            }
        }
    }

    /// The user's sticky variant id, drawing and persisting one on
    /// first contact. Holding `assigned` across the store calls keeps
    /// concurrent first contacts for the same user single-file.
    async fn assignment_for(&self, definition: &ExperimentDefinition, user: &str) -> Result<String> {
        let key = (user.to_owned(), definition.id.clone());
        let mut assigned = self.assigned.lock().await;

        if let Some(variant) = assigned.get(&key) {
            return Ok(variant.clone());
        }

        if let Some(variant) = self.store.variant_assignment(user, &definition.id).await? {
            assigned.insert(key, variant.clone());
            return Ok(variant);
        }

        let roll = rand::thread_rng().gen_range(0.0..100.0);
        let variant = pick_variant(definition, roll)
            .map(|v| v.id.clone())
            .unwrap_or_else(|| definition.default_variant.clone());
        self.store
            .save_variant_assignment(user, &definition.id, &variant)
            .await?;
        tracing::debug!(
            experiment = %definition.id,
            user = %user,
            variant = %variant,
            "assigned experiment variant"
        );
        assigned.insert(key, variant.clone());
        Ok(variant)
    }
}
