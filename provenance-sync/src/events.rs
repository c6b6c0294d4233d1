//! Block event envelopes, decoupled from the wire messages.

use provenance_proto::validator::{state_change, EventList};
use std::time::Duration;

/// Pause between applying a block's entity changes and its property
/// pages, so the page projection's cross-table property read sees the
/// rows written moments before.
pub const SETTLE_WAIT: Duration = Duration::from_millis(100);

/// One namespaced state change from a committed block.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub address: String,
    pub value: Vec<u8>,
}

/// One committed block: descriptor plus its state changes.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockEvent {
    pub block_num: u64,
    pub block_id: String,
    pub state_root_hash: String,
    pub changes: Vec<StateChange>,
}

impl From<EventList> for BlockEvent {
    fn from(events: EventList) -> BlockEvent {
        let changes = events
            .changes
            .into_iter()
            .filter(|change| change.change_type() != state_change::ChangeType::Delete)
            .map(|change| StateChange {
                address: change.address,
                value: change.value,
            })
            .collect();

        BlockEvent {
            block_num: events.block_num,
            block_id: events.block_id,
            state_root_hash: events.state_root_hash,
            changes,
        }
    }
}
