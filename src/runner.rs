//! Periodic trigger loop.
//!
//! Production deployments fire the engine from a scheduler; this
//! runner is the in-process equivalent, ticking [`ReminderEngine`] on
//! a fixed period until the handle is aborted.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::engine::ReminderEngine;

/// Drives [`ReminderEngine::run_tick`] on a fixed period.
pub struct EngineRunner {
    engine: Arc<ReminderEngine>,
    period: Duration,
}

impl EngineRunner {
    /// A runner ticking at the engine's configured trigger period.
    #[must_use]
    pub fn new(engine: Arc<ReminderEngine>) -> Self {
        let minutes = u64::from(engine.config().engine.trigger_period_minutes.max(1));
        Self {
            engine,
            period: Duration::from_secs(minutes * 60),
        }
    }

    /// Override the tick period. Mostly for tests.
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Start the background loop.
    ///
    /// The first tick fires immediately, so a freshly started daemon
    /// catches up without waiting a full period. Tick failures are
    /// logged and the loop keeps going; the next period retries.
    pub fn run(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(period_secs = self.period.as_secs(), "reminder runner started");
            let mut interval = tokio::time::interval(self.period);

            loop {
                interval.tick().await;
                match self.engine.run_tick(chrono::Utc::now()).await {
                    Ok(summary) => {
                        debug!(
                            dispatched = summary.dispatched,
                            retried = summary.retried,
                            "tick finished"
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "tick failed; retrying on next period");
                    }
                }
            }
        })
    }
}
