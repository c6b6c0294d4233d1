//! Provenance Read Store
//!
//! A block-versioned projection of committed on-chain state. One table
//! per entity class plus a `blocks` table; every row carries a
//! `[startBlockNum, endBlockNum)` interval and rows are closed, never
//! rewritten. "As-of" queries answer reads at any historical height,
//! and replaying a delta stream is idempotent.

pub mod docs;
pub mod store;

pub use docs::{
    AgentDoc, BlockDoc, LocationDoc, PropertyDoc, PropertyPageDoc, PropertySchemaDoc,
    ProposalDoc, RecordDoc, RecordTypeDoc, ReportDoc, ReporterDoc, ValueDoc,
};
pub use store::{BlockStore, StoreError, TableKind, CURRENT};
