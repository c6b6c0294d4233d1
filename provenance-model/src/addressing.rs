//! State address derivation.
//!
//! Every on-chain entity lives at a 70-hex-character address:
//! 6-hex namespace prefix, 2-hex type prefix, 62-hex body derived from
//! SHA-512 digests of the entity's natural key. Properties and their
//! pages share a prefix; the trailing 4 hex digits select the page
//! (`0000` is the property itself).

use sha2::{Digest, Sha512};
use thiserror::Error;

/// Namespace prefix for all provenance state.
pub const NAMESPACE: &str = "3400de";

/// Total address length in hex characters.
pub const ADDRESS_LENGTH: usize = 70;

const AGENT: &str = "ae";
const RECORD_TYPE: &str = "ec";
const RECORD: &str = "ee";
const PROPERTY: &str = "ea";
const PROPOSAL: &str = "aa";

/// Errors from address decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address has wrong length: expected {ADDRESS_LENGTH}, got {0}")]
    Length(usize),

    #[error("address is outside the provenance namespace: {0}")]
    Namespace(String),

    #[error("unknown type prefix: {0}")]
    UnknownPrefix(String),
}

/// Lowercase-hex SHA-512 of `input`, truncated to `len` characters.
fn hash(input: &str, len: usize) -> String {
    let digest = Sha512::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(len);
    hex
}

/// Format a page number as the 4-hex address tail.
pub fn page_number(page: u32) -> String {
    format!("{:04x}", page)
}

/// Address of an agent, keyed by its public key.
pub fn agent_address(public_key: &str) -> String {
    format!("{}{}{}", NAMESPACE, AGENT, hash(public_key, 62))
}

/// Address of a record type, keyed by its name.
pub fn record_type_address(name: &str) -> String {
    format!("{}{}{}", NAMESPACE, RECORD_TYPE, hash(name, 62))
}

/// Address of a record, keyed by its id.
pub fn record_address(record_id: &str) -> String {
    format!("{}{}{}", NAMESPACE, RECORD, hash(record_id, 62))
}

/// Address of a property (page 0) or one of its pages.
///
/// Body layout: 36 hex of the record digest, 22 hex of the name digest,
/// 4 hex page number.
pub fn property_address(record_id: &str, name: &str, page: u32) -> String {
    format!(
        "{}{}{}{}{}",
        NAMESPACE,
        PROPERTY,
        hash(record_id, 36),
        hash(name, 22),
        page_number(page)
    )
}

/// Address of a proposal, keyed by record, receiving agent, and role.
///
/// The three key parts are NUL-joined before hashing so distinct tuples
/// cannot collide by concatenation.
pub fn proposal_address(record_id: &str, receiving_agent: &str, role: &str) -> String {
    let key = format!("{}\x00{}\x00{}", record_id, receiving_agent, role);
    format!("{}{}{}", NAMESPACE, PROPOSAL, hash(&key, 62))
}

/// The entity class stored at an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Agent,
    RecordType,
    Record,
    Property,
    PropertyPage,
    Proposal,
}

impl AddressKind {
    /// Decode the entity class from an address.
    ///
    /// `ea` addresses are disambiguated by their 4-hex tail: `0000` is
    /// the property container, anything else a page.
    pub fn of(address: &str) -> Result<AddressKind, AddressError> {
        if address.len() != ADDRESS_LENGTH {
            return Err(AddressError::Length(address.len()));
        }
        if !address.starts_with(NAMESPACE) {
            return Err(AddressError::Namespace(address.to_string()));
        }
        match &address[6..8] {
            AGENT => Ok(AddressKind::Agent),
            RECORD_TYPE => Ok(AddressKind::RecordType),
            RECORD => Ok(AddressKind::Record),
            PROPOSAL => Ok(AddressKind::Proposal),
            PROPERTY => {
                if &address[66..70] == "0000" {
                    Ok(AddressKind::Property)
                } else {
                    Ok(AddressKind::PropertyPage)
                }
            }
            other => Err(AddressError::UnknownPrefix(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_PREFIXES: [&str; 5] = [AGENT, RECORD_TYPE, RECORD, PROPERTY, PROPOSAL];

    fn assert_well_formed(address: &str) {
        assert_eq!(address.len(), ADDRESS_LENGTH);
        assert!(address.starts_with(NAMESPACE));
        assert!(KNOWN_PREFIXES.contains(&&address[6..8]));
        assert!(address.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn namespace_is_family_digest() {
        // The namespace is the first 6 hex of SHA-512("supply_chain").
        assert_eq!(hash(crate::FAMILY_NAME, 6), NAMESPACE);
    }

    #[test]
    fn addresses_are_well_formed() {
        assert_well_formed(&agent_address("02a0bc"));
        assert_well_formed(&record_type_address("asset"));
        assert_well_formed(&record_address("r1"));
        assert_well_formed(&property_address("r1", "temp", 0));
        assert_well_formed(&property_address("r1", "temp", 42));
        assert_well_formed(&proposal_address("r1", "02a0bc", "OWNER"));
    }

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(agent_address("key"), agent_address("key"));
        assert_ne!(agent_address("key"), agent_address("key2"));
        assert_ne!(
            proposal_address("r1", "a", "OWNER"),
            proposal_address("r1", "a", "REPORTER")
        );
    }

    #[test]
    fn property_pages_share_prefix() {
        let prop = property_address("r1", "temp", 0);
        let page = property_address("r1", "temp", 7);
        assert_eq!(prop[..66], page[..66]);
        assert_eq!(&prop[66..], "0000");
        assert_eq!(&page[66..], "0007");
    }

    #[test]
    fn page_number_formats_four_hex() {
        assert_eq!(page_number(0), "0000");
        assert_eq!(page_number(1), "0001");
        assert_eq!(page_number(0xffff), "ffff");
    }

    #[test]
    fn kind_decodes_every_class() {
        assert_eq!(AddressKind::of(&agent_address("k")), Ok(AddressKind::Agent));
        assert_eq!(
            AddressKind::of(&record_type_address("t")),
            Ok(AddressKind::RecordType)
        );
        assert_eq!(AddressKind::of(&record_address("r")), Ok(AddressKind::Record));
        assert_eq!(
            AddressKind::of(&property_address("r", "p", 0)),
            Ok(AddressKind::Property)
        );
        assert_eq!(
            AddressKind::of(&property_address("r", "p", 3)),
            Ok(AddressKind::PropertyPage)
        );
        assert_eq!(
            AddressKind::of(&proposal_address("r", "a", "OWNER")),
            Ok(AddressKind::Proposal)
        );
    }

    #[test]
    fn kind_rejects_malformed() {
        assert_eq!(AddressKind::of("3400de"), Err(AddressError::Length(6)));
        let foreign = format!("{:0<70}", "abcdef");
        assert!(matches!(
            AddressKind::of(&foreign),
            Err(AddressError::Namespace(_))
        ));
        let unknown = format!("{}ff{}", NAMESPACE, "0".repeat(62));
        assert_eq!(
            AddressKind::of(&unknown),
            Err(AddressError::UnknownPrefix("ff".to_string()))
        );
    }
}
