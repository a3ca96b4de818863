//! Domain model: dining events, user records, and notification
//! content experiments.

pub mod event;
pub mod experiment;
pub mod user;

pub use event::{DiningEvent, EventId, EventStatus};
pub use experiment::{ExperimentDefinition, Variant};
pub use user::{NotificationKind, UserId, UserRecord};
