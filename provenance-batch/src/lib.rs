//! Provenance Batcher
//!
//! The server-side path between end-user transactions and the
//! platform: validate that each transaction names this server's
//! batcher key, wrap the transactions in a signed batch, submit, and
//! optionally wait for the commit to land. Also carries the
//! client-side transaction builder used by tooling and tests.

pub mod batcher;
pub mod builder;
pub mod client;
pub mod key;

pub use batcher::{BatchError, Batcher, DEFAULT_SETTLE_WAIT};
pub use builder::TransactionBuilder;
pub use client::{PlatformClient, PlatformError};
pub use key::{KeyError, Signer};
