//! Provenance Model
//!
//! Shared constants, the state address derivation scheme, and runtime
//! configuration. Everything here is pure and dependency-light: the
//! processor, the batcher, and the sync pipeline all derive addresses
//! through this crate, and the derivation must be bit-identical across
//! all three or on-chain state and the read store silently diverge.

pub mod addressing;
pub mod config;

pub use addressing::{
    agent_address, page_number, property_address, proposal_address, record_address,
    record_type_address, AddressError, AddressKind, ADDRESS_LENGTH, NAMESPACE,
};
pub use config::{Config, ConfigError};

/// Transaction family name, registered with the platform.
pub const FAMILY_NAME: &str = "supply_chain";

/// Transaction family version.
pub const FAMILY_VERSION: &str = "1.1";

/// Reports per property page.
pub const PAGE_SIZE: usize = 256;

/// Highest page number before the page pointer wraps back to 1.
/// Pages are addressed by a 4-hex-digit suffix; page 0 is the property itself.
pub const MAX_PAGES: u32 = 0xffff;
