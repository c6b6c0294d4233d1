//! Typed state access over the flat address space.
//!
//! Every setter follows the container discipline: load the container at
//! the derived address (empty if absent), insert or replace the entity
//! by natural key, and write the re-sorted encoding back.

use crate::context::TransactionContext;
use crate::error::ApplyError;
use provenance_model::addressing;
use provenance_proto::containers::Container;
use provenance_proto::state::{
    Agent, AgentContainer, Property, PropertyContainer, PropertyPage, PropertyPageContainer,
    ProposalContainer, Record, RecordContainer, RecordType, RecordTypeContainer,
};

pub struct ProvenanceState<'a> {
    context: &'a mut dyn TransactionContext,
}

impl<'a> ProvenanceState<'a> {
    pub fn new(context: &'a mut dyn TransactionContext) -> ProvenanceState<'a> {
        ProvenanceState { context }
    }

    fn get_container<C: Container>(&mut self, address: &str) -> Result<C, ApplyError> {
        match self.context.get_state_entry(address)? {
            Some(bytes) => C::from_bytes(&bytes).map_err(|err| {
                ApplyError::InternalError(format!(
                    "Cannot deserialize container at {}: {}",
                    address, err
                ))
            }),
            None => Ok(C::default()),
        }
    }

    fn set_container<C: Container>(
        &mut self,
        address: &str,
        container: &C,
    ) -> Result<(), ApplyError> {
        self.context
            .set_state_entry(address.to_string(), container.to_bytes())?;
        Ok(())
    }

    pub fn get_agent(&mut self, public_key: &str) -> Result<Option<Agent>, ApplyError> {
        let container: AgentContainer =
            self.get_container(&addressing::agent_address(public_key))?;
        Ok(container.find(&public_key.to_string()).cloned())
    }

    pub fn set_agent(&mut self, agent: Agent) -> Result<(), ApplyError> {
        let address = addressing::agent_address(&agent.public_key);
        let mut container: AgentContainer = self.get_container(&address)?;
        container.insert(agent);
        self.set_container(&address, &container)
    }

    pub fn get_record_type(&mut self, name: &str) -> Result<Option<RecordType>, ApplyError> {
        let container: RecordTypeContainer =
            self.get_container(&addressing::record_type_address(name))?;
        Ok(container.find(&name.to_string()).cloned())
    }

    pub fn set_record_type(&mut self, record_type: RecordType) -> Result<(), ApplyError> {
        let address = addressing::record_type_address(&record_type.name);
        let mut container: RecordTypeContainer = self.get_container(&address)?;
        container.insert(record_type);
        self.set_container(&address, &container)
    }

    pub fn get_record(&mut self, record_id: &str) -> Result<Option<Record>, ApplyError> {
        let container: RecordContainer =
            self.get_container(&addressing::record_address(record_id))?;
        Ok(container.find(&record_id.to_string()).cloned())
    }

    pub fn set_record(&mut self, record: Record) -> Result<(), ApplyError> {
        let address = addressing::record_address(&record.record_id);
        let mut container: RecordContainer = self.get_container(&address)?;
        container.insert(record);
        self.set_container(&address, &container)
    }

    pub fn get_property(
        &mut self,
        record_id: &str,
        name: &str,
    ) -> Result<Option<Property>, ApplyError> {
        let container: PropertyContainer =
            self.get_container(&addressing::property_address(record_id, name, 0))?;
        Ok(container.find(&name.to_string()).cloned())
    }

    pub fn set_property(&mut self, property: Property) -> Result<(), ApplyError> {
        let address = addressing::property_address(&property.record_id, &property.name, 0);
        let mut container: PropertyContainer = self.get_container(&address)?;
        container.insert(property);
        self.set_container(&address, &container)
    }

    pub fn get_property_page(
        &mut self,
        record_id: &str,
        name: &str,
        page: u32,
    ) -> Result<Option<PropertyPage>, ApplyError> {
        let container: PropertyPageContainer =
            self.get_container(&addressing::property_address(record_id, name, page))?;
        Ok(container.find(&name.to_string()).cloned())
    }

    pub fn set_property_page(&mut self, page_num: u32, page: PropertyPage) -> Result<(), ApplyError> {
        let address = addressing::property_address(&page.record_id, &page.name, page_num);
        let mut container: PropertyPageContainer = self.get_container(&address)?;
        container.insert(page);
        self.set_container(&address, &container)
    }

    pub fn get_proposal_container(
        &mut self,
        record_id: &str,
        receiving_agent: &str,
        role: &str,
    ) -> Result<ProposalContainer, ApplyError> {
        self.get_container(&addressing::proposal_address(
            record_id,
            receiving_agent,
            role,
        ))
    }

    pub fn set_proposal_container(
        &mut self,
        record_id: &str,
        receiving_agent: &str,
        role: &str,
        container: &ProposalContainer,
    ) -> Result<(), ApplyError> {
        let address = addressing::proposal_address(record_id, receiving_agent, role);
        self.set_container(&address, container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryContext;

    #[test]
    fn set_then_get_round_trips() {
        let mut context = MemoryContext::new();
        let mut state = ProvenanceState::new(&mut context);

        state
            .set_agent(Agent {
                public_key: "pk1".to_string(),
                name: "Alice".to_string(),
                timestamp: 10,
            })
            .unwrap();

        let agent = state.get_agent("pk1").unwrap().unwrap();
        assert_eq!(agent.name, "Alice");
        assert!(state.get_agent("pk2").unwrap().is_none());
    }

    #[test]
    fn writes_to_one_address_compose() {
        let mut context = MemoryContext::new();
        let mut state = ProvenanceState::new(&mut context);

        // Two records whose container writes must not clobber each other
        // even when issued within one transaction.
        state
            .set_record(Record {
                record_id: "r1".to_string(),
                record_type: "asset".to_string(),
                owner: "pk1".to_string(),
                custodian: "pk1".to_string(),
                r#final: false,
            })
            .unwrap();
        let mut updated = state.get_record("r1").unwrap().unwrap();
        updated.r#final = true;
        state.set_record(updated).unwrap();

        assert!(state.get_record("r1").unwrap().unwrap().r#final);
    }
}
