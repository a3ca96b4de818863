//! Batched store writes.
//!
//! All store mutations from one tick funnel through a [`WriteBatcher`]
//! so they land in batches under the store's hard per-batch ceiling.
//! Batches auto-flush at a safety threshold below the ceiling and the
//! engine flushes the remainder at the end of the tick.
//!
//! A failed commit drops the batch: reminder flags lost that way are
//! simply re-dispatched next tick, which the at-least-once delivery
//! contract allows.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::store::{Datastore, WriteOp};

#[derive(Debug, Default)]
struct BatchState {
    pending: Vec<WriteOp>,
    committed: usize,
}

/// Accumulates write operations and commits them in bounded batches.
pub struct WriteBatcher {
    store: Arc<dyn Datastore>,
    flush_threshold: usize,
    state: Mutex<BatchState>,
}

impl WriteBatcher {
    /// Create a batcher that auto-flushes at `limit - margin` operations.
    pub fn new(store: Arc<dyn Datastore>, limit: usize, margin: usize) -> Self {
        Self {
            store,
            flush_threshold: limit.saturating_sub(margin).max(1),
            state: Mutex::new(BatchState::default()),
        }
    }

    /// Queue one operation, flushing first if the batch is full.
    ///
    /// # Errors
    ///
    /// Returns an error if an auto-flush commit fails. The batch is
    /// dropped in that case; operations it held take effect on a later
    /// tick when their events are retried.
    pub async fn queue(&self, op: WriteOp) -> Result<()> {
        let mut state = self.state.lock().await;
        state.pending.push(op);
        if state.pending.len() >= self.flush_threshold {
            self.commit_locked(&mut state).await?;
        }
        Ok(())
    }

    /// Commit everything still pending.
    pub async fn flush(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.pending.is_empty() {
            return Ok(());
        }
        self.commit_locked(&mut state).await
    }

    /// Operations committed so far.
    pub async fn committed(&self) -> usize {
        self.state.lock().await.committed
    }

    /// Operations queued but not yet committed.
    pub async fn pending(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    async fn commit_locked(&self, state: &mut BatchState) -> Result<()> {
        let batch = std::mem::take(&mut state.pending);
        let ops = batch.len();
        match self.store.commit(batch).await {
            Ok(()) => {
                state.committed += ops;
                tracing::debug!(ops, "write batch committed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    ops,
                    error = %e,
                    "write batch commit failed; affected events retry next tick"
                );
                Err(e)
            }
        }
    }
}
