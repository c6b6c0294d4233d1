//! Container helpers.
//!
//! The state store is flat, so distinct entities whose key digests
//! collide share an address. Each address therefore holds a container
//! message whose entries are kept sorted by natural key, giving every
//! write a canonical byte encoding.

use crate::state::{
    Agent, AgentContainer, Property, PropertyContainer, PropertyPage, PropertyPageContainer,
    Proposal, ProposalContainer, Record, RecordContainer, RecordType, RecordTypeContainer,
};

/// The sort/identity key of a container entry.
pub trait NaturalKey {
    type Key: Ord;

    fn natural_key(&self) -> Self::Key;
}

impl NaturalKey for Agent {
    type Key = String;

    fn natural_key(&self) -> String {
        self.public_key.clone()
    }
}

impl NaturalKey for RecordType {
    type Key = String;

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

impl NaturalKey for Record {
    type Key = String;

    fn natural_key(&self) -> String {
        self.record_id.clone()
    }
}

impl NaturalKey for Property {
    type Key = String;

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

// The page number is implicit in the address, so pages are keyed by
// property name like the property itself.
impl NaturalKey for PropertyPage {
    type Key = String;

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

impl NaturalKey for Proposal {
    type Key = (String, u64, String, i32);

    fn natural_key(&self) -> Self::Key {
        (
            self.record_id.clone(),
            self.timestamp,
            self.receiving_agent.clone(),
            self.role,
        )
    }
}

/// A sorted entity container stored at one address.
pub trait Container: Default + prost::Message + Sized {
    type Entry: NaturalKey + Clone;

    fn entries(&self) -> &[Self::Entry];

    fn entries_mut(&mut self) -> &mut Vec<Self::Entry>;

    /// Decode a container from state bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        Self::decode(bytes)
    }

    /// Canonical encoding for writing back to state.
    fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Find an entry by natural key.
    fn find(&self, key: &<Self::Entry as NaturalKey>::Key) -> Option<&Self::Entry> {
        self.entries().iter().find(|e| e.natural_key() == *key)
    }

    /// Insert an entry, replacing any existing entry with the same key,
    /// and restore sort order.
    fn insert(&mut self, entry: Self::Entry) {
        let key = entry.natural_key();
        let entries = self.entries_mut();
        entries.retain(|e| e.natural_key() != key);
        entries.push(entry);
        entries.sort_by_key(|e| e.natural_key());
    }
}

macro_rules! impl_container {
    ($container:ty, $entry:ty) => {
        impl Container for $container {
            type Entry = $entry;

            fn entries(&self) -> &[$entry] {
                &self.entries
            }

            fn entries_mut(&mut self) -> &mut Vec<$entry> {
                &mut self.entries
            }
        }
    };
}

impl_container!(AgentContainer, Agent);
impl_container!(RecordTypeContainer, RecordType);
impl_container!(RecordContainer, Record);
impl_container!(PropertyContainer, Property);
impl_container!(PropertyPageContainer, PropertyPage);
impl_container!(ProposalContainer, Proposal);

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(key: &str) -> Agent {
        Agent {
            public_key: key.to_string(),
            name: format!("agent {}", key),
            timestamp: 1,
        }
    }

    #[test]
    fn insert_keeps_entries_sorted() {
        let mut container = AgentContainer::default();
        container.insert(agent("cc"));
        container.insert(agent("aa"));
        container.insert(agent("bb"));

        let keys: Vec<_> = container.entries().iter().map(|a| a.public_key.as_str()).collect();
        assert_eq!(keys, ["aa", "bb", "cc"]);
    }

    #[test]
    fn insert_replaces_by_key() {
        let mut container = AgentContainer::default();
        container.insert(agent("aa"));

        let mut renamed = agent("aa");
        renamed.name = "renamed".to_string();
        container.insert(renamed);

        assert_eq!(container.entries().len(), 1);
        assert_eq!(container.entries()[0].name, "renamed");
    }

    #[test]
    fn find_by_key() {
        let mut container = AgentContainer::default();
        container.insert(agent("aa"));
        container.insert(agent("bb"));

        assert_eq!(container.find(&"bb".to_string()).unwrap().public_key, "bb");
        assert!(container.find(&"zz".to_string()).is_none());
    }

    #[test]
    fn encoding_round_trips_byte_stable() {
        let mut container = ProposalContainer::default();
        container.insert(Proposal {
            record_id: "r1".to_string(),
            timestamp: 5,
            issuing_agent: "a".to_string(),
            receiving_agent: "b".to_string(),
            role: crate::state::proposal::Role::Reporter as i32,
            properties: vec!["temp".to_string()],
            status: crate::state::proposal::Status::Open as i32,
            terms: String::new(),
        });
        container.insert(Proposal {
            record_id: "r1".to_string(),
            timestamp: 2,
            issuing_agent: "a".to_string(),
            receiving_agent: "c".to_string(),
            role: crate::state::proposal::Role::Owner as i32,
            properties: vec![],
            status: crate::state::proposal::Status::Open as i32,
            terms: String::new(),
        });

        let bytes = container.to_bytes();
        let decoded = ProposalContainer::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.to_bytes(), bytes);
        // Sorted by (record_id, timestamp, receiving_agent, role).
        assert_eq!(decoded.entries()[0].timestamp, 2);
    }

    #[test]
    fn proposals_with_distinct_roles_coexist() {
        let base = Proposal {
            record_id: "r1".to_string(),
            timestamp: 5,
            issuing_agent: "a".to_string(),
            receiving_agent: "b".to_string(),
            role: crate::state::proposal::Role::Owner as i32,
            properties: vec![],
            status: crate::state::proposal::Status::Open as i32,
            terms: String::new(),
        };
        let mut other = base.clone();
        other.role = crate::state::proposal::Role::Custodian as i32;

        let mut container = ProposalContainer::default();
        container.insert(base);
        container.insert(other);
        assert_eq!(container.entries().len(), 2);
    }
}
