use thiserror::Error;

/// Errors from applying a transaction.
///
/// `InvalidTransaction` is a validation failure: non-retried, fatal to
/// the transaction, and surfaced to the submitter with its message.
/// `InternalError` covers state access and serialization faults.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplyError {
    pub fn invalid(message: impl Into<String>) -> ApplyError {
        ApplyError::InvalidTransaction(message.into())
    }
}
