//! The platform submission interface, as consumed by the batcher.

use async_trait::async_trait;
use provenance_net::{NetError, ValidatorClient};
use provenance_proto::txn::Batch;
use provenance_proto::validator::{BatchStatusResponse, BatchSubmitResponse};
use thiserror::Error;

/// A transport fault talking to the platform. Recovered by the caller
/// with retry; the message is surfaced verbatim.
#[derive(Debug, Error)]
#[error("platform error: {0}")]
pub struct PlatformError(pub String);

/// Batch submission and status, as exposed by the platform.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn submit(&self, batches: Vec<Batch>) -> Result<BatchSubmitResponse, PlatformError>;

    async fn status(
        &self,
        batch_ids: Vec<String>,
        wait: bool,
        timeout_ms: u32,
    ) -> Result<BatchStatusResponse, PlatformError>;
}

#[async_trait]
impl PlatformClient for ValidatorClient {
    async fn submit(&self, batches: Vec<Batch>) -> Result<BatchSubmitResponse, PlatformError> {
        self.submit_batches(batches).await.map_err(from_net)
    }

    async fn status(
        &self,
        batch_ids: Vec<String>,
        wait: bool,
        timeout_ms: u32,
    ) -> Result<BatchStatusResponse, PlatformError> {
        self.batch_statuses(batch_ids, wait, timeout_ms)
            .await
            .map_err(from_net)
    }
}

fn from_net(err: NetError) -> PlatformError {
    PlatformError(err.to_string())
}
