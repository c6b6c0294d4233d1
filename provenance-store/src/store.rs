//! The block-versioned store and its single write primitive.
//!
//! Row keys are `index-key bytes ‖ 0x00 ‖ startBlockNum (BE)` so the
//! rows of one index value are contiguous and ordered by interval
//! start. Values are JSON documents carrying their interval bounds.

use crate::docs::BlockDoc;
use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Sentinel `endBlockNum` for rows that are currently live.
pub const CURRENT: u64 = u64::MAX;

const TABLE_AGENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("agents");
const TABLE_RECORDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records");
const TABLE_RECORD_TYPES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("recordTypes");
const TABLE_PROPERTIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("properties");
const TABLE_PROPERTY_PAGES: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("propertyPages");
const TABLE_PROPOSALS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("proposals");
const TABLE_BLOCKS: TableDefinition<u64, &[u8]> = TableDefinition::new("blocks");

/// Errors from the read store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The entity tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Agents,
    Records,
    RecordTypes,
    Properties,
    PropertyPages,
    Proposals,
}

impl TableKind {
    fn def(self) -> TableDefinition<'static, &'static [u8], &'static [u8]> {
        match self {
            TableKind::Agents => TABLE_AGENTS,
            TableKind::Records => TABLE_RECORDS,
            TableKind::RecordTypes => TABLE_RECORD_TYPES,
            TableKind::Properties => TABLE_PROPERTIES,
            TableKind::PropertyPages => TABLE_PROPERTY_PAGES,
            TableKind::Proposals => TABLE_PROPOSALS,
        }
    }

    pub const ALL: [TableKind; 6] = [
        TableKind::Agents,
        TableKind::Records,
        TableKind::RecordTypes,
        TableKind::Properties,
        TableKind::PropertyPages,
        TableKind::Proposals,
    ];
}

/// A stored row: the document plus its interval bounds.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Row<T> {
    start_block_num: u64,
    end_block_num: u64,
    #[serde(flatten)]
    doc: T,
}

/// NUL-join the index key parts.
fn index_key(parts: &[&str]) -> Vec<u8> {
    parts.join("\u{0}").into_bytes()
}

fn row_prefix(parts: &[&str]) -> Vec<u8> {
    let mut prefix = index_key(parts);
    prefix.push(0);
    prefix
}

pub struct BlockStore {
    db: Database,
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore").finish_non_exhaustive()
    }
}

impl BlockStore {
    /// Open or create the store database at the given file path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;

        // Create every table up front so readers never race table creation.
        let txn = db.begin_write()?;
        {
            for kind in TableKind::ALL {
                txn.open_table(kind.def())?;
            }
            txn.open_table(TABLE_BLOCKS)?;
        }
        txn.commit()?;

        Ok(Self { db })
    }

    /// Block-versioned upsert: close every live row for the index key
    /// at `block_num` and insert the new document as `[block_num, MAX)`.
    ///
    /// Replaying a block is a no-op: if a live row already starts at
    /// `block_num`, nothing changes.
    pub fn upsert<T: Serialize>(
        &self,
        table: TableKind,
        index: &[&str],
        doc: &T,
        block_num: u64,
    ) -> Result<(), StoreError> {
        let prefix = row_prefix(index);
        let doc = serde_json::to_value(doc)?;

        let txn = self.db.begin_write()?;
        {
            let mut t = txn.open_table(table.def())?;

            let mut live: Vec<(Vec<u8>, Row<serde_json::Value>)> = Vec::new();
            for item in t.range(prefix.as_slice()..)? {
                let (key, value) = item?;
                let key = key.value();
                if !key.starts_with(&prefix) {
                    break;
                }
                if key.len() != prefix.len() + 8 {
                    continue;
                }
                let row: Row<serde_json::Value> = serde_json::from_slice(value.value())?;
                if row.end_block_num == CURRENT {
                    live.push((key.to_vec(), row));
                }
            }

            if !live.iter().any(|(_, row)| row.start_block_num == block_num) {
                for (key, mut row) in live {
                    row.end_block_num = block_num;
                    t.insert(key.as_slice(), serde_json::to_vec(&row)?.as_slice())?;
                }

                let mut key = prefix.clone();
                key.extend_from_slice(&block_num.to_be_bytes());
                let row = Row {
                    start_block_num: block_num,
                    end_block_num: CURRENT,
                    doc,
                };
                t.insert(key.as_slice(), serde_json::to_vec(&row)?.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn find<T: DeserializeOwned>(
        &self,
        table: TableKind,
        index: &[&str],
        pred: impl Fn(u64, u64) -> bool,
    ) -> Result<Option<T>, StoreError> {
        let prefix = row_prefix(index);
        let txn = self.db.begin_read()?;
        let t = txn.open_table(table.def())?;

        for item in t.range(prefix.as_slice()..)? {
            let (key, value) = item?;
            let key = key.value();
            if !key.starts_with(&prefix) {
                break;
            }
            if key.len() != prefix.len() + 8 {
                continue;
            }
            let row: Row<serde_json::Value> = serde_json::from_slice(value.value())?;
            if pred(row.start_block_num, row.end_block_num) {
                return Ok(Some(serde_json::from_value(row.doc)?));
            }
        }
        Ok(None)
    }

    /// The currently live document for an index key.
    pub fn live<T: DeserializeOwned>(
        &self,
        table: TableKind,
        index: &[&str],
    ) -> Result<Option<T>, StoreError> {
        self.find(table, index, |_, end| end == CURRENT)
    }

    /// The document live at block height `block_num`.
    pub fn as_of<T: DeserializeOwned>(
        &self,
        table: TableKind,
        index: &[&str],
        block_num: u64,
    ) -> Result<Option<T>, StoreError> {
        self.find(table, index, |start, end| {
            start <= block_num && block_num < end
        })
    }

    /// All interval bounds for an index key, ordered by start.
    pub fn intervals(&self, table: TableKind, index: &[&str]) -> Result<Vec<(u64, u64)>, StoreError> {
        let prefix = row_prefix(index);
        let txn = self.db.begin_read()?;
        let t = txn.open_table(table.def())?;

        let mut intervals = Vec::new();
        for item in t.range(prefix.as_slice()..)? {
            let (key, value) = item?;
            let key = key.value();
            if !key.starts_with(&prefix) {
                break;
            }
            if key.len() != prefix.len() + 8 {
                continue;
            }
            let row: Row<serde_json::Value> = serde_json::from_slice(value.value())?;
            intervals.push((row.start_block_num, row.end_block_num));
        }
        Ok(intervals)
    }

    /// Raw contents of an entity table, for replay comparisons.
    pub fn dump(&self, table: TableKind) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let txn = self.db.begin_read()?;
        let t = txn.open_table(table.def())?;
        let mut rows = Vec::new();
        for item in t.iter()? {
            let (key, value) = item?;
            rows.push((key.value().to_vec(), value.value().to_vec()));
        }
        Ok(rows)
    }

    /// Record a committed block descriptor. Re-inserting the same block
    /// number overwrites the identical row.
    pub fn insert_block(&self, block: &BlockDoc) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut t = txn.open_table(TABLE_BLOCKS)?;
            t.insert(block.block_num, serde_json::to_vec(block)?.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// The highest committed block, if any.
    pub fn current_block(&self) -> Result<Option<BlockDoc>, StoreError> {
        let txn = self.db.begin_read()?;
        let t = txn.open_table(TABLE_BLOCKS)?;
        let result = match t.last()? {
            Some((_, value)) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        };
        result
    }

    /// All recorded block descriptors in height order.
    pub fn blocks(&self) -> Result<Vec<BlockDoc>, StoreError> {
        let txn = self.db.begin_read()?;
        let t = txn.open_table(TABLE_BLOCKS)?;
        let mut blocks = Vec::new();
        for item in t.iter()? {
            let (_, value) = item?;
            blocks.push(serde_json::from_slice(value.value())?);
        }
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs::AgentDoc;
    use tempfile::tempdir;

    fn agent(name: &str) -> AgentDoc {
        AgentDoc {
            public_key: "pk1".to_string(),
            name: name.to_string(),
            timestamp: 1,
        }
    }

    fn open_store(dir: &tempfile::TempDir) -> BlockStore {
        BlockStore::open(dir.path().join("store.db")).unwrap()
    }

    #[test]
    fn upsert_then_live() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store
            .upsert(TableKind::Agents, &["pk1"], &agent("Alice"), 1)
            .unwrap();

        let doc: AgentDoc = store.live(TableKind::Agents, &["pk1"]).unwrap().unwrap();
        assert_eq!(doc.name, "Alice");
        assert!(store
            .live::<AgentDoc>(TableKind::Agents, &["pk2"])
            .unwrap()
            .is_none());
    }

    #[test]
    fn upserts_close_intervals() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store
            .upsert(TableKind::Agents, &["pk1"], &agent("v1"), 1)
            .unwrap();
        store
            .upsert(TableKind::Agents, &["pk1"], &agent("v2"), 2)
            .unwrap();
        store
            .upsert(TableKind::Agents, &["pk1"], &agent("v3"), 5)
            .unwrap();

        assert_eq!(
            store.intervals(TableKind::Agents, &["pk1"]).unwrap(),
            vec![(1, 2), (2, 5), (5, CURRENT)]
        );

        let at_1: AgentDoc = store.as_of(TableKind::Agents, &["pk1"], 1).unwrap().unwrap();
        assert_eq!(at_1.name, "v1");
        let at_4: AgentDoc = store.as_of(TableKind::Agents, &["pk1"], 4).unwrap().unwrap();
        assert_eq!(at_4.name, "v2");
        let at_9: AgentDoc = store.as_of(TableKind::Agents, &["pk1"], 9).unwrap().unwrap();
        assert_eq!(at_9.name, "v3");
        assert!(store
            .as_of::<AgentDoc>(TableKind::Agents, &["pk1"], 0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn replaying_a_block_is_a_no_op() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store
            .upsert(TableKind::Agents, &["pk1"], &agent("v1"), 1)
            .unwrap();
        store
            .upsert(TableKind::Agents, &["pk1"], &agent("v2"), 2)
            .unwrap();
        let before = store.dump(TableKind::Agents).unwrap();

        store
            .upsert(TableKind::Agents, &["pk1"], &agent("v2"), 2)
            .unwrap();
        assert_eq!(store.dump(TableKind::Agents).unwrap(), before);
    }

    #[test]
    fn live_rows_partition_block_range() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        for block in [3_u64, 7, 20] {
            store
                .upsert(TableKind::Records, &["r1"], &agent("x"), block)
                .unwrap();
        }

        let intervals = store.intervals(TableKind::Records, &["r1"]).unwrap();
        for window in intervals.windows(2) {
            assert_eq!(window[0].1, window[1].0);
        }
        assert_eq!(intervals.last().unwrap().1, CURRENT);
        for (start, end) in intervals {
            assert!(start < end);
        }
    }

    #[test]
    fn compound_indexes_do_not_interfere() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store
            .upsert(TableKind::Properties, &["temp", "r1"], &agent("a"), 1)
            .unwrap();
        store
            .upsert(TableKind::Properties, &["temp", "r2"], &agent("b"), 1)
            .unwrap();

        assert_eq!(store.intervals(TableKind::Properties, &["temp", "r1"]).unwrap().len(), 1);
        assert_eq!(store.intervals(TableKind::Properties, &["temp", "r2"]).unwrap().len(), 1);
    }

    #[test]
    fn blocks_track_max_height() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        assert!(store.current_block().unwrap().is_none());

        for num in [1_u64, 2, 3] {
            store
                .insert_block(&BlockDoc {
                    block_num: num,
                    block_id: format!("block-{}", num),
                    state_root_hash: "00".to_string(),
                })
                .unwrap();
        }
        // Replay of an already-recorded block.
        store
            .insert_block(&BlockDoc {
                block_num: 2,
                block_id: "block-2".to_string(),
                state_root_hash: "00".to_string(),
            })
            .unwrap();

        assert_eq!(store.current_block().unwrap().unwrap().block_num, 3);
        assert_eq!(store.blocks().unwrap().len(), 3);
    }
}
