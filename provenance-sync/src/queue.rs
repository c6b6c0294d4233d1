//! The single-writer delta queue.
//!
//! One worker task owns the store writes. Block jobs run strictly one
//! at a time in arrival order; concurrent submitters queue on the
//! bounded channel and each awaits its own job's completion.

use crate::apply::apply_block;
use crate::events::{BlockEvent, SETTLE_WAIT};
use crate::SyncError;
use provenance_store::BlockStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const QUEUE_DEPTH: usize = 16;

enum DeltaCmd {
    Apply {
        event: BlockEvent,
        resp: oneshot::Sender<Result<(), SyncError>>,
    },
    Shutdown,
}

/// Worker draining block jobs in FIFO order.
pub struct DeltaQueue {
    store: Arc<BlockStore>,
    rx: mpsc::Receiver<DeltaCmd>,
    settle_wait: Duration,
}

impl DeltaQueue {
    /// Spawn the worker and return its handle.
    pub fn spawn(store: Arc<BlockStore>) -> DeltaQueueHandle {
        Self::spawn_with_settle_wait(store, SETTLE_WAIT)
    }

    pub fn spawn_with_settle_wait(
        store: Arc<BlockStore>,
        settle_wait: Duration,
    ) -> DeltaQueueHandle {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let queue = DeltaQueue {
            store,
            rx,
            settle_wait,
        };
        tokio::spawn(queue.run());
        DeltaQueueHandle { tx }
    }

    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                DeltaCmd::Apply { event, resp } => {
                    let block_num = event.block_num;
                    let result = apply_block(&self.store, &event, self.settle_wait).await;
                    if let Err(err) = &result {
                        tracing::error!("applying block {} failed: {}", block_num, err);
                    } else {
                        tracing::debug!(
                            "applied block {} ({} changes)",
                            block_num,
                            event.changes.len()
                        );
                    }
                    let _ = resp.send(result);
                }
                DeltaCmd::Shutdown => break,
            }
        }
    }
}

/// Cloneable submitter side of the queue.
#[derive(Clone)]
pub struct DeltaQueueHandle {
    tx: mpsc::Sender<DeltaCmd>,
}

impl DeltaQueueHandle {
    /// Enqueue a block and wait for its application to complete.
    pub async fn apply(&self, event: BlockEvent) -> Result<(), SyncError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(DeltaCmd::Apply {
                event,
                resp: resp_tx,
            })
            .await
            .map_err(|_| SyncError::QueueClosed)?;
        resp_rx.await.map_err(|_| SyncError::QueueClosed)?
    }

    /// Stop the worker after the jobs already queued have drained.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(DeltaCmd::Shutdown).await;
    }
}
