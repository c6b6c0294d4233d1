//! Batch construction, signing, and submission.

use crate::client::PlatformClient;
use crate::key::Signer;
use prost::Message;
use provenance_proto::txn::{Batch, BatchHeader, Transaction, TransactionHeader};
use provenance_proto::validator::{batch_status, batch_submit_response};
use std::time::Duration;
use thiserror::Error;

/// Pause after a commit before returning, so the sync pipeline has
/// observed the committed block by the time the caller reads.
pub const DEFAULT_SETTLE_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum BatchError {
    /// The submitted transaction cannot be batched by this server.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The platform refused or failed the call; surfaced verbatim.
    #[error("Platform error: {0}")]
    Platform(String),

    /// The caller asked to wait and the batch did not commit in time.
    #[error("Batch not committed: {0}")]
    NotCommitted(String),
}

/// Wraps validated transactions into batches signed by the server's
/// long-lived batcher key.
pub struct Batcher<C> {
    key: Signer,
    client: C,
    settle_wait: Duration,
}

impl<C: PlatformClient> Batcher<C> {
    pub fn new(key: Signer, client: C) -> Batcher<C> {
        Batcher {
            key,
            client,
            settle_wait: DEFAULT_SETTLE_WAIT,
        }
    }

    pub fn with_settle_wait(mut self, settle_wait: Duration) -> Batcher<C> {
        self.settle_wait = settle_wait;
        self
    }

    pub fn public_key_hex(&self) -> String {
        self.key.public_key_hex()
    }

    /// Validate transaction headers and wrap them in a signed batch.
    ///
    /// Every transaction must name this server's key as its batcher;
    /// anything else is rejected before submission.
    pub fn build_batch(&self, transactions: Vec<Transaction>) -> Result<Batch, BatchError> {
        let public_key = self.key.public_key_hex();

        for transaction in &transactions {
            let header = TransactionHeader::decode(transaction.header.as_slice())
                .map_err(|err| {
                    BatchError::BadRequest(format!("undecodable transaction header: {}", err))
                })?;
            if header.batcher_public_key != public_key {
                return Err(BatchError::BadRequest(format!(
                    "transaction {} was not built for this batcher",
                    transaction.header_signature
                )));
            }
        }

        let header = BatchHeader {
            signer_public_key: public_key,
            transaction_ids: transactions
                .iter()
                .map(|transaction| transaction.header_signature.clone())
                .collect(),
        }
        .encode_to_vec();
        let header_signature = self.key.sign_hex(&header);

        Ok(Batch {
            header,
            header_signature,
            transactions,
        })
    }

    /// Build, submit, and (optionally) wait for commit.
    ///
    /// With `wait`, the platform's status endpoint is polled up to the
    /// caller's timeout; a COMMITTED result is followed by one settle
    /// interval before returning the batch id.
    pub async fn submit(
        &self,
        transactions: Vec<Transaction>,
        wait: Option<Duration>,
    ) -> Result<String, BatchError> {
        let batch = self.build_batch(transactions)?;
        let batch_id = batch.header_signature.clone();

        let response = self
            .client
            .submit(vec![batch])
            .await
            .map_err(|err| BatchError::Platform(err.to_string()))?;
        if response.status() != batch_submit_response::Status::Ok {
            return Err(BatchError::Platform(format!(
                "submission returned {:?}",
                response.status()
            )));
        }

        if let Some(timeout) = wait {
            let statuses = self
                .client
                .status(vec![batch_id.clone()], true, timeout.as_millis() as u32)
                .await
                .map_err(|err| BatchError::Platform(err.to_string()))?;

            let status = statuses
                .statuses
                .first()
                .map(|status| status.status())
                .unwrap_or(batch_status::Status::Unknown);
            if status != batch_status::Status::Committed {
                return Err(BatchError::NotCommitted(format!("{:?}", status)));
            }

            tokio::time::sleep(self.settle_wait).await;
        }

        Ok(batch_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TransactionBuilder;
    use crate::client::PlatformError;
    use crate::key::verify_hex;
    use async_trait::async_trait;
    use provenance_proto::payload::Payload;
    use provenance_proto::validator::{BatchStatus, BatchStatusResponse, BatchSubmitResponse};
    use std::sync::Mutex;

    /// Scripted platform that records submissions.
    struct ScriptedPlatform {
        submit_status: batch_submit_response::Status,
        commit_status: batch_status::Status,
        submitted: Mutex<Vec<Batch>>,
    }

    impl ScriptedPlatform {
        fn committing() -> ScriptedPlatform {
            ScriptedPlatform {
                submit_status: batch_submit_response::Status::Ok,
                commit_status: batch_status::Status::Committed,
                submitted: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl PlatformClient for ScriptedPlatform {
        async fn submit(&self, batches: Vec<Batch>) -> Result<BatchSubmitResponse, PlatformError> {
            self.submitted.lock().unwrap().extend(batches);
            Ok(BatchSubmitResponse {
                status: self.submit_status as i32,
            })
        }

        async fn status(
            &self,
            batch_ids: Vec<String>,
            _wait: bool,
            _timeout_ms: u32,
        ) -> Result<BatchStatusResponse, PlatformError> {
            Ok(BatchStatusResponse {
                statuses: batch_ids
                    .into_iter()
                    .map(|batch_id| BatchStatus {
                        batch_id,
                        status: self.commit_status as i32,
                        message: String::new(),
                    })
                    .collect(),
            })
        }
    }

    fn signed_transaction(batcher_public_key: &str) -> Transaction {
        TransactionBuilder::new(Signer::generate(), batcher_public_key.to_string())
            .build(&Payload::create_agent(1, "Alice"))
    }

    #[tokio::test]
    async fn batch_header_is_signed_by_batcher() {
        let batcher = Batcher::new(Signer::generate(), ScriptedPlatform::committing());
        let transaction = signed_transaction(&batcher.public_key_hex());

        let batch = batcher.build_batch(vec![transaction.clone()]).unwrap();
        verify_hex(&batcher.public_key_hex(), &batch.header, &batch.header_signature).unwrap();

        let header = BatchHeader::decode(batch.header.as_slice()).unwrap();
        assert_eq!(header.transaction_ids, vec![transaction.header_signature]);
    }

    #[tokio::test]
    async fn foreign_batcher_key_is_rejected() {
        let batcher = Batcher::new(Signer::generate(), ScriptedPlatform::committing());
        let foreign = signed_transaction(&Signer::generate().public_key_hex());

        let err = batcher.submit(vec![foreign], None).await.unwrap_err();
        assert!(matches!(err, BatchError::BadRequest(_)));
        // Nothing reached the platform.
        assert!(batcher.client.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wait_returns_after_commit() {
        let batcher = Batcher::new(Signer::generate(), ScriptedPlatform::committing())
            .with_settle_wait(Duration::ZERO);
        let transaction = signed_transaction(&batcher.public_key_hex());

        let batch_id = batcher
            .submit(vec![transaction], Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(batcher.client.submitted.lock().unwrap().len(), 1);
        assert_eq!(
            batcher.client.submitted.lock().unwrap()[0].header_signature,
            batch_id
        );
    }

    #[tokio::test]
    async fn pending_status_is_surfaced() {
        let platform = ScriptedPlatform {
            submit_status: batch_submit_response::Status::Ok,
            commit_status: batch_status::Status::Pending,
            submitted: Mutex::new(vec![]),
        };
        let batcher = Batcher::new(Signer::generate(), platform).with_settle_wait(Duration::ZERO);
        let transaction = signed_transaction(&batcher.public_key_hex());

        let err = batcher
            .submit(vec![transaction], Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::NotCommitted(_)));
        assert!(err.to_string().contains("Pending"));
    }

    #[tokio::test]
    async fn invalid_submission_is_surfaced() {
        let platform = ScriptedPlatform {
            submit_status: batch_submit_response::Status::InvalidBatch,
            commit_status: batch_status::Status::Unknown,
            submitted: Mutex::new(vec![]),
        };
        let batcher = Batcher::new(Signer::generate(), platform);
        let transaction = signed_transaction(&batcher.public_key_hex());

        let err = batcher.submit(vec![transaction], None).await.unwrap_err();
        assert!(matches!(err, BatchError::Platform(_)));
        assert!(err.to_string().contains("InvalidBatch"));
    }
}
