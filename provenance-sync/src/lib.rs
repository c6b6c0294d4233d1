//! Provenance Sync
//!
//! Projects committed block events into the block-versioned read
//! store. Events may arrive concurrently; application is serialized
//! through a single-writer queue so blocks land strictly in arrival
//! order, with all non-page changes visible before any property page
//! of the same block.

pub mod apply;
pub mod events;
pub mod queue;

pub use events::{BlockEvent, StateChange, SETTLE_WAIT};
pub use queue::{DeltaQueue, DeltaQueueHandle};

use provenance_store::StoreError;
use thiserror::Error;

/// Errors from the sync pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Delta queue closed")]
    QueueClosed,
}
