//! Client-side transaction construction.
//!
//! Builds the signed transactions end users hand to the batcher:
//! header with family identification, namespace inputs/outputs, a
//! random base-36 nonce, and the hex SHA-512 payload digest.

use crate::key::Signer;
use prost::Message;
use provenance_model::{FAMILY_NAME, FAMILY_VERSION, NAMESPACE};
use provenance_proto::payload::Payload;
use provenance_proto::txn::{Transaction, TransactionHeader};
use rand::Rng;
use sha2::{Digest, Sha512};

const NONCE_LENGTH: usize = 18;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub struct TransactionBuilder {
    signer: Signer,
    batcher_public_key: String,
}

impl TransactionBuilder {
    pub fn new(signer: Signer, batcher_public_key: String) -> TransactionBuilder {
        TransactionBuilder {
            signer,
            batcher_public_key,
        }
    }

    pub fn public_key_hex(&self) -> String {
        self.signer.public_key_hex()
    }

    /// Encode and sign one payload into a submittable transaction.
    pub fn build(&self, payload: &Payload) -> Transaction {
        let payload_bytes = payload.encode_to_vec();

        let header = TransactionHeader {
            family_name: FAMILY_NAME.to_string(),
            family_version: FAMILY_VERSION.to_string(),
            inputs: vec![NAMESPACE.to_string()],
            outputs: vec![NAMESPACE.to_string()],
            signer_public_key: self.signer.public_key_hex(),
            batcher_public_key: self.batcher_public_key.clone(),
            nonce: random_nonce(),
            payload_sha512: hex::encode(Sha512::digest(&payload_bytes)),
        }
        .encode_to_vec();
        let header_signature = self.signer.sign_hex(&header);

        Transaction {
            header,
            header_signature,
            payload: payload_bytes,
        }
    }
}

fn random_nonce() -> String {
    let mut rng = rand::thread_rng();
    (0..NONCE_LENGTH)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::verify_hex;

    #[test]
    fn header_carries_family_identification() {
        let builder = TransactionBuilder::new(Signer::generate(), "bb".repeat(32));
        let transaction = builder.build(&Payload::create_agent(1, "Alice"));

        let header = TransactionHeader::decode(transaction.header.as_slice()).unwrap();
        assert_eq!(header.family_name, FAMILY_NAME);
        assert_eq!(header.family_version, FAMILY_VERSION);
        assert_eq!(header.inputs, vec![NAMESPACE.to_string()]);
        assert_eq!(header.outputs, vec![NAMESPACE.to_string()]);
        assert_eq!(header.signer_public_key, builder.public_key_hex());
        assert_eq!(header.batcher_public_key, "bb".repeat(32));
        assert_eq!(header.nonce.len(), NONCE_LENGTH);
        assert!(header.nonce.bytes().all(|b| BASE36.contains(&b)));
        assert_eq!(
            header.payload_sha512,
            hex::encode(Sha512::digest(&transaction.payload))
        );
    }

    #[test]
    fn header_signature_verifies_under_signer_key() {
        let builder = TransactionBuilder::new(Signer::generate(), "bb".repeat(32));
        let transaction = builder.build(&Payload::create_agent(1, "Alice"));
        verify_hex(
            &builder.public_key_hex(),
            &transaction.header,
            &transaction.header_signature,
        )
        .unwrap();
    }

    #[test]
    fn nonces_are_random() {
        let builder = TransactionBuilder::new(Signer::generate(), "bb".repeat(32));
        let a = builder.build(&Payload::create_agent(1, "Alice"));
        let b = builder.build(&Payload::create_agent(1, "Alice"));
        let header_a = TransactionHeader::decode(a.header.as_slice()).unwrap();
        let header_b = TransactionHeader::decode(b.header.as_slice()).unwrap();
        assert_ne!(header_a.nonce, header_b.nonce);
    }
}
