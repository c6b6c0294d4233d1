//! Provenance Net
//!
//! Length-delimited protobuf framing over TCP to the platform's client
//! endpoint, and a demultiplexing client for request/response pairs and
//! the block event subscription.

pub mod client;
pub mod framing;

pub use client::ValidatorClient;
pub use framing::{MessageSink, MessageStream};

use thiserror::Error;

/// Errors from the validator connection.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Invalid validator url: {0}")]
    InvalidUrl(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Request rejected: {0}")]
    Rejected(String),
}
