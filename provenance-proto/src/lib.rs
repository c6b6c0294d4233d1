//! Generated protobuf definitions for the provenance application.
//!
//! Four packages: on-chain state messages, transaction payloads,
//! transaction/batch envelopes, and the validator client API. Container
//! helpers keep entry lists sorted so re-encoding is deterministic.

pub mod state {
    include!(concat!(env!("OUT_DIR"), "/provenance.state.rs"));
}

pub mod payload {
    include!(concat!(env!("OUT_DIR"), "/provenance.payload.rs"));
}

pub mod txn {
    include!(concat!(env!("OUT_DIR"), "/provenance.txn.rs"));
}

pub mod validator {
    include!(concat!(env!("OUT_DIR"), "/provenance.validator.rs"));
}

pub mod containers;
pub mod convert;

pub use containers::{Container, NaturalKey};
