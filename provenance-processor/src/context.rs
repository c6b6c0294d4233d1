//! State access abstraction.
//!
//! The platform hands the processor a view over its flat address space;
//! [`MemoryContext`] provides the same interface over a map for tests
//! and for driving the sync pipeline without a validator.

use crate::error::ApplyError;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors from the state context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("State error: {0}")]
    State(String),
}

impl From<ContextError> for ApplyError {
    fn from(err: ContextError) -> Self {
        ApplyError::InternalError(err.to_string())
    }
}

/// State operations the platform exposes to a transaction.
///
/// Writes must be readable by later gets within the same transaction so
/// that two writes to one address compose.
pub trait TransactionContext {
    fn get_state_entries(
        &self,
        addresses: &[String],
    ) -> Result<Vec<(String, Vec<u8>)>, ContextError>;

    fn set_state_entries(&mut self, entries: Vec<(String, Vec<u8>)>) -> Result<(), ContextError>;

    fn get_state_entry(&self, address: &str) -> Result<Option<Vec<u8>>, ContextError> {
        Ok(self
            .get_state_entries(&[address.to_string()])?
            .into_iter()
            .next()
            .map(|(_, value)| value))
    }

    fn set_state_entry(&mut self, address: String, value: Vec<u8>) -> Result<(), ContextError> {
        self.set_state_entries(vec![(address, value)])
    }
}

/// In-memory state with read-your-writes semantics.
///
/// Tracks which addresses each transaction touched so callers can turn
/// applied transactions into state-delta events. Cloning snapshots the
/// whole state, which is how tests model the platform's atomic discard
/// of failed transactions.
#[derive(Debug, Default, Clone)]
pub struct MemoryContext {
    state: BTreeMap<String, Vec<u8>>,
    touched: BTreeSet<String>,
}

impl MemoryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses written since the last call, with their current bytes,
    /// in address order.
    pub fn take_changes(&mut self) -> Vec<(String, Vec<u8>)> {
        let touched = std::mem::take(&mut self.touched);
        touched
            .into_iter()
            .filter_map(|address| {
                self.state
                    .get(&address)
                    .map(|value| (address, value.clone()))
            })
            .collect()
    }

    /// Snapshot of the full state, for invariant checks in tests.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Vec<u8>)> {
        self.state.iter()
    }
}

impl TransactionContext for MemoryContext {
    fn get_state_entries(
        &self,
        addresses: &[String],
    ) -> Result<Vec<(String, Vec<u8>)>, ContextError> {
        Ok(addresses
            .iter()
            .filter_map(|address| {
                self.state
                    .get(address)
                    .map(|value| (address.clone(), value.clone()))
            })
            .collect())
    }

    fn set_state_entries(&mut self, entries: Vec<(String, Vec<u8>)>) -> Result<(), ContextError> {
        for (address, value) in entries {
            self.touched.insert(address.clone());
            self.state.insert(address, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_your_writes() {
        let mut context = MemoryContext::new();
        context
            .set_state_entry("aa".to_string(), vec![1, 2])
            .unwrap();
        assert_eq!(context.get_state_entry("aa").unwrap(), Some(vec![1, 2]));
        assert_eq!(context.get_state_entry("bb").unwrap(), None);
    }

    #[test]
    fn take_changes_drains_touched_set() {
        let mut context = MemoryContext::new();
        context
            .set_state_entry("bb".to_string(), vec![2])
            .unwrap();
        context
            .set_state_entry("aa".to_string(), vec![1])
            .unwrap();
        context
            .set_state_entry("aa".to_string(), vec![3])
            .unwrap();

        let changes = context.take_changes();
        assert_eq!(
            changes,
            vec![("aa".to_string(), vec![3]), ("bb".to_string(), vec![2])]
        );
        assert!(context.take_changes().is_empty());
    }
}
