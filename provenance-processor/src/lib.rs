//! Provenance Transaction Processor
//!
//! Validates and applies domain actions against the platform's flat
//! key-value state. The handler is pure with respect to its inputs:
//! one payload, the signer's public key, and a [`TransactionContext`]
//! for state access. Validation failures reject the whole transaction;
//! the platform discards state changes atomically.

pub mod context;
pub mod error;
pub mod handler;
pub mod payload;
pub mod state;

pub use context::{ContextError, MemoryContext, TransactionContext};
pub use error::ApplyError;
pub use handler::ProvenanceTransactionHandler;
pub use payload::{Action, ProvenancePayload};
pub use state::ProvenanceState;
