//! Dinnerbell: idempotent reminder and push dispatch engine.
//!
//! The engine wakes on a fixed period and, for every configured lead
//! time, queries the window of dining events due for that reminder,
//! drops cancelled and already-reminded events, resolves recipients,
//! renders experiment-driven content and pushes it out, then flags the
//! events so the next tick skips them.
//!
//! # Architecture
//!
//! A tick flows through independent stages:
//! - **Windowing**: jitter-padded, half-open query windows over event start times
//! - **Dedup**: one-way per-lead reminder flags keep retries idempotent
//! - **Recipients**: chunked user fetches with opt-outs and missing tokens dropped
//! - **Content**: sticky weighted variant assignment and template rendering
//! - **Dispatch**: multicast batches under the gateway ceiling via `reqwest`
//! - **Write-back**: store commits batched under the per-commit operation limit

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod push;
pub mod runner;
pub mod store;

pub use config::{ConfigIssue, ConfigIssueSeverity, DinnerbellConfig, validate_config};
pub use engine::{ImmediateOutcome, ReminderEngine, SkipReason, TickSummary};
pub use error::{DispatchError, Result};
pub use model::{DiningEvent, EventStatus, NotificationKind, UserRecord};
pub use push::{FcmGateway, PushGateway, PushMessage, SendOutcome};
pub use runner::EngineRunner;
pub use store::{Datastore, MemoryStore, NotificationRecord, WriteOp};
