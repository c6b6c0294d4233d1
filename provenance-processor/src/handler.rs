//! The transaction handler: one method per action.
//!
//! Dispatch decodes the payload, then each method validates against
//! current state and writes updated containers back. Any violation
//! returns `ApplyError::InvalidTransaction` and the platform discards
//! the transaction's state changes atomically.

use crate::context::TransactionContext;
use crate::error::ApplyError;
use crate::payload::{Action, ProvenancePayload};
use crate::state::ProvenanceState;
use provenance_model::{FAMILY_NAME, FAMILY_VERSION, MAX_PAGES, NAMESPACE, PAGE_SIZE};
use provenance_proto::containers::Container;
use provenance_proto::payload::answer_proposal_action::Response;
use provenance_proto::payload::{
    AnswerProposalAction, CreateAgentAction, CreateProposalAction, CreateRecordAction,
    CreateRecordTypeAction, FinalizeRecordAction, RevokeReporterAction, UpdatePropertiesAction,
};
use provenance_proto::state::property::Reporter;
use provenance_proto::state::property_page::ReportedValue;
use provenance_proto::state::proposal::{Role, Status};
use provenance_proto::state::{
    Agent, DataType, Property, PropertyPage, PropertySchema, PropertyValue, Proposal, Record,
    RecordType,
};
use std::collections::HashMap;

pub struct ProvenanceTransactionHandler {
    family_name: String,
    family_versions: Vec<String>,
    namespaces: Vec<String>,
}

impl Default for ProvenanceTransactionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvenanceTransactionHandler {
    pub fn new() -> ProvenanceTransactionHandler {
        ProvenanceTransactionHandler {
            family_name: FAMILY_NAME.to_string(),
            family_versions: vec![FAMILY_VERSION.to_string()],
            namespaces: vec![NAMESPACE.to_string()],
        }
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn family_versions(&self) -> &[String] {
        &self.family_versions
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Apply one transaction: decode the payload and dispatch on its
    /// action.
    pub fn apply(
        &self,
        payload_bytes: &[u8],
        signer: &str,
        context: &mut dyn TransactionContext,
    ) -> Result<(), ApplyError> {
        let payload = ProvenancePayload::parse(payload_bytes)?;
        let timestamp = payload.timestamp;
        let mut state = ProvenanceState::new(context);

        match payload.action {
            Action::CreateAgent(action) => {
                self.create_agent(action, &mut state, signer, timestamp)
            }
            Action::CreateRecord(action) => {
                self.create_record(action, &mut state, signer, timestamp)
            }
            Action::FinalizeRecord(action) => self.finalize_record(action, &mut state, signer),
            Action::CreateRecordType(action) => {
                self.create_record_type(action, &mut state, signer)
            }
            Action::UpdateProperties(action) => {
                self.update_properties(action, &mut state, signer, timestamp)
            }
            Action::CreateProposal(action) => {
                self.create_proposal(action, &mut state, signer, timestamp)
            }
            Action::AnswerProposal(action) => self.answer_proposal(action, &mut state, signer),
            Action::RevokeReporter(action) => self.revoke_reporter(action, &mut state, signer),
        }
    }

    fn create_agent(
        &self,
        action: CreateAgentAction,
        state: &mut ProvenanceState,
        signer: &str,
        timestamp: u64,
    ) -> Result<(), ApplyError> {
        if state.get_agent(signer)?.is_some() {
            return Err(ApplyError::invalid(format!(
                "Agent already exists: {}",
                signer
            )));
        }

        state.set_agent(Agent {
            public_key: signer.to_string(),
            name: action.name,
            timestamp,
        })
    }

    fn create_record_type(
        &self,
        action: CreateRecordTypeAction,
        state: &mut ProvenanceState,
        signer: &str,
    ) -> Result<(), ApplyError> {
        require_agent(state, signer)?;

        if state.get_record_type(&action.name)?.is_some() {
            return Err(ApplyError::invalid(format!(
                "Record type already exists: {}",
                action.name
            )));
        }

        state.set_record_type(RecordType {
            name: action.name,
            properties: action.properties,
        })
    }

    fn create_record(
        &self,
        action: CreateRecordAction,
        state: &mut ProvenanceState,
        signer: &str,
        timestamp: u64,
    ) -> Result<(), ApplyError> {
        require_agent(state, signer)?;

        if state.get_record(&action.record_id)?.is_some() {
            return Err(ApplyError::invalid(format!(
                "Record already exists: {}",
                action.record_id
            )));
        }

        let record_type = state
            .get_record_type(&action.record_type)?
            .ok_or_else(|| {
                ApplyError::invalid(format!("Record type does not exist: {}", action.record_type))
            })?;

        let mut provided: HashMap<&str, &PropertyValue> = HashMap::new();
        for value in &action.properties {
            provided.insert(value.name.as_str(), value);
        }

        for schema in &record_type.properties {
            if schema.required && !provided.contains_key(schema.name.as_str()) {
                return Err(ApplyError::invalid(format!(
                    "Required property not provided: {}",
                    schema.name
                )));
            }
        }

        for (name, value) in &provided {
            let schema = record_type
                .properties
                .iter()
                .find(|schema| schema.name == *name)
                .ok_or_else(|| {
                    ApplyError::invalid(format!("Provided property is not in the schema: {}", name))
                })?;
            if schema.delayed {
                return Err(ApplyError::invalid(format!(
                    "Property is delayed and cannot be set at record creation: {}",
                    name
                )));
            }
            validate_value(value, schema.data_type(), schema.number_exponent,
                &schema.enum_options, &schema.struct_properties)?;
        }

        state.set_record(Record {
            record_id: action.record_id.clone(),
            record_type: record_type.name.clone(),
            owner: signer.to_string(),
            custodian: signer.to_string(),
            r#final: false,
        })?;

        let creator = Reporter {
            public_key: signer.to_string(),
            authorized: true,
            index: 0,
        };

        for schema in &record_type.properties {
            state.set_property(Property {
                name: schema.name.clone(),
                record_id: action.record_id.clone(),
                record_type: record_type.name.clone(),
                data_type: schema.data_type,
                reporters: vec![creator.clone()],
                current_page: 1,
                wrapped: false,
                fixed: schema.fixed,
                number_exponent: schema.number_exponent,
                enum_options: schema.enum_options.clone(),
                struct_properties: schema.struct_properties.clone(),
                unit: schema.unit.clone(),
            })?;

            let mut page = PropertyPage {
                name: schema.name.clone(),
                record_id: action.record_id.clone(),
                reported_values: vec![],
            };
            if let Some(value) = provided.get(schema.name.as_str()) {
                page.reported_values
                    .push(make_reported_value(0, timestamp, value));
            }
            state.set_property_page(1, page)?;
        }

        Ok(())
    }

    fn update_properties(
        &self,
        action: UpdatePropertiesAction,
        state: &mut ProvenanceState,
        signer: &str,
        timestamp: u64,
    ) -> Result<(), ApplyError> {
        let record = require_record(state, &action.record_id)?;
        if record.r#final {
            return Err(ApplyError::invalid(format!(
                "Record is final: {}",
                action.record_id
            )));
        }

        for update in &action.properties {
            let mut property = state
                .get_property(&action.record_id, &update.name)?
                .ok_or_else(|| {
                    ApplyError::invalid(format!(
                        "Record does not have provided property: {}",
                        update.name
                    ))
                })?;

            let reporter_index = property
                .reporters
                .iter()
                .find(|reporter| reporter.public_key == signer && reporter.authorized)
                .map(|reporter| reporter.index)
                .ok_or_else(|| {
                    ApplyError::invalid(format!("Reporter is not authorized: {}", signer))
                })?;

            validate_value(update, property.data_type(), property.number_exponent,
                &property.enum_options, &property.struct_properties)?;

            let page_number = property.current_page;
            let mut page = state
                .get_property_page(&action.record_id, &update.name, page_number)?
                .ok_or_else(|| {
                    ApplyError::InternalError(format!(
                        "Property page does not exist: {} page {}",
                        update.name, page_number
                    ))
                })?;

            if property.fixed && (property.wrapped || !page.reported_values.is_empty()) {
                return Err(ApplyError::invalid(format!(
                    "Property is fixed and cannot be updated: {}",
                    update.name
                )));
            }

            page.reported_values
                .push(make_reported_value(reporter_index, timestamp, update));
            page.reported_values
                .sort_by_key(|value| (value.timestamp, value.reporter_index));
            state.set_property_page(page_number, page.clone())?;

            // Advance the page pointer once the page fills, wrapping
            // back to 1 after the last page and clearing the target.
            if page.reported_values.len() >= PAGE_SIZE {
                let next_page = if page_number >= MAX_PAGES {
                    1
                } else {
                    page_number + 1
                };

                let cleared = match state.get_property_page(
                    &action.record_id,
                    &update.name,
                    next_page,
                )? {
                    Some(mut existing) => {
                        existing.reported_values.clear();
                        existing
                    }
                    None => PropertyPage {
                        name: update.name.clone(),
                        record_id: action.record_id.clone(),
                        reported_values: vec![],
                    },
                };
                state.set_property_page(next_page, cleared)?;

                property.current_page = next_page;
                if next_page == 1 {
                    property.wrapped = true;
                }
                state.set_property(property)?;
            }
        }

        Ok(())
    }

    fn create_proposal(
        &self,
        action: CreateProposalAction,
        state: &mut ProvenanceState,
        signer: &str,
        timestamp: u64,
    ) -> Result<(), ApplyError> {
        require_agent(state, signer)?;
        if state.get_agent(&action.receiving_agent)?.is_none() {
            return Err(ApplyError::invalid(format!(
                "Receiving agent does not exist: {}",
                action.receiving_agent
            )));
        }

        let role = action.role();
        let record = require_record(state, &action.record_id)?;
        if record.r#final {
            return Err(ApplyError::invalid(format!(
                "Record is final: {}",
                action.record_id
            )));
        }

        match role {
            Role::Owner | Role::Reporter => {
                if record.owner != signer {
                    return Err(ApplyError::invalid(
                        "Only the owner can create this proposal",
                    ));
                }
            }
            Role::Custodian => {
                if record.custodian != signer {
                    return Err(ApplyError::invalid(
                        "Only the custodian can create this proposal",
                    ));
                }
            }
        }

        if role == Role::Reporter {
            if action.properties.is_empty() {
                return Err(ApplyError::invalid(
                    "Reporter proposals must name at least one property",
                ));
            }
            for name in &action.properties {
                if state.get_property(&action.record_id, name)?.is_none() {
                    return Err(ApplyError::invalid(format!(
                        "Record does not have property: {}",
                        name
                    )));
                }
            }
        }

        let mut container = state.get_proposal_container(
            &action.record_id,
            &action.receiving_agent,
            role.as_str_name(),
        )?;

        let open_exists = container.entries().iter().any(|proposal| {
            proposal.status() == Status::Open
                && proposal.record_id == action.record_id
                && proposal.receiving_agent == action.receiving_agent
                && proposal.role == action.role
        });
        if open_exists {
            return Err(ApplyError::invalid("Proposal already exists"));
        }

        container.insert(Proposal {
            record_id: action.record_id.clone(),
            timestamp,
            issuing_agent: signer.to_string(),
            receiving_agent: action.receiving_agent.clone(),
            role: action.role,
            properties: action.properties,
            status: Status::Open as i32,
            terms: action.terms,
        });

        state.set_proposal_container(
            &action.record_id,
            &action.receiving_agent,
            role.as_str_name(),
            &container,
        )
    }

    fn answer_proposal(
        &self,
        action: AnswerProposalAction,
        state: &mut ProvenanceState,
        signer: &str,
    ) -> Result<(), ApplyError> {
        let role = action.role();
        let response = action.response();

        let mut container = state.get_proposal_container(
            &action.record_id,
            &action.receiving_agent,
            role.as_str_name(),
        )?;

        let mut proposal = container
            .entries()
            .iter()
            .find(|proposal| {
                proposal.status() == Status::Open
                    && proposal.record_id == action.record_id
                    && proposal.receiving_agent == action.receiving_agent
                    && proposal.role == action.role
            })
            .cloned()
            .ok_or_else(|| {
                ApplyError::invalid(format!(
                    "No open proposal found for record {} for {}",
                    action.record_id, action.receiving_agent
                ))
            })?;

        match response {
            Response::Cancel => {
                if proposal.issuing_agent != signer {
                    return Err(ApplyError::invalid(
                        "Only the issuing agent can cancel a proposal",
                    ));
                }
                proposal.status = Status::Canceled as i32;
            }
            Response::Reject => {
                if proposal.receiving_agent != signer {
                    return Err(ApplyError::invalid(
                        "Only the receiving agent can reject a proposal",
                    ));
                }
                proposal.status = Status::Rejected as i32;
            }
            Response::Accept => {
                if proposal.receiving_agent != signer {
                    return Err(ApplyError::invalid(
                        "Only the receiving agent can accept a proposal",
                    ));
                }
                proposal.status = self.accept_proposal(&proposal, state)?;
            }
        }

        container.insert(proposal);
        state.set_proposal_container(
            &action.record_id,
            &action.receiving_agent,
            role.as_str_name(),
            &container,
        )
    }

    /// Apply an accepted proposal's role effect. Returns the final
    /// status: ACCEPTED, or CANCELED when the issuing agent no longer
    /// holds the role being transferred.
    fn accept_proposal(
        &self,
        proposal: &Proposal,
        state: &mut ProvenanceState,
    ) -> Result<i32, ApplyError> {
        let mut record = require_record(state, &proposal.record_id)?;

        match proposal.role() {
            Role::Owner => {
                if record.owner != proposal.issuing_agent {
                    tracing::info!(
                        record_id = %proposal.record_id,
                        "record owner no longer matches issuing agent, closing proposal"
                    );
                    return Ok(Status::Canceled as i32);
                }
                record.owner = proposal.receiving_agent.clone();
                state.set_record(record)?;
            }
            Role::Custodian => {
                if record.custodian != proposal.issuing_agent {
                    tracing::info!(
                        record_id = %proposal.record_id,
                        "record custodian no longer matches issuing agent, closing proposal"
                    );
                    return Ok(Status::Canceled as i32);
                }
                record.custodian = proposal.receiving_agent.clone();
                state.set_record(record)?;
            }
            Role::Reporter => {
                if record.owner != proposal.issuing_agent {
                    tracing::info!(
                        record_id = %proposal.record_id,
                        "record owner no longer matches issuing agent, closing proposal"
                    );
                    return Ok(Status::Canceled as i32);
                }
                for name in &proposal.properties {
                    let mut property = state
                        .get_property(&proposal.record_id, name)?
                        .ok_or_else(|| {
                            ApplyError::invalid(format!("Property does not exist: {}", name))
                        })?;

                    match property
                        .reporters
                        .iter_mut()
                        .find(|reporter| reporter.public_key == proposal.receiving_agent)
                    {
                        Some(reporter) => reporter.authorized = true,
                        None => {
                            let index = property.reporters.len() as u32;
                            property.reporters.push(Reporter {
                                public_key: proposal.receiving_agent.clone(),
                                authorized: true,
                                index,
                            });
                        }
                    }
                    state.set_property(property)?;
                }
            }
        }

        Ok(Status::Accepted as i32)
    }

    fn revoke_reporter(
        &self,
        action: RevokeReporterAction,
        state: &mut ProvenanceState,
        signer: &str,
    ) -> Result<(), ApplyError> {
        let record = require_record(state, &action.record_id)?;
        if record.owner != signer {
            return Err(ApplyError::invalid("Must be owner to revoke reporters"));
        }
        if record.r#final {
            return Err(ApplyError::invalid(format!(
                "Record is final: {}",
                action.record_id
            )));
        }

        for name in &action.properties {
            let mut property = state
                .get_property(&action.record_id, name)?
                .ok_or_else(|| {
                    ApplyError::invalid(format!("Property does not exist: {}", name))
                })?;

            let reporter = property
                .reporters
                .iter_mut()
                .find(|reporter| reporter.public_key == action.reporter_id)
                .ok_or_else(|| {
                    ApplyError::invalid(format!(
                        "Reporter cannot be revoked: {}",
                        action.reporter_id
                    ))
                })?;
            if !reporter.authorized {
                return Err(ApplyError::invalid("Reporter is already unauthorized"));
            }
            reporter.authorized = false;

            state.set_property(property)?;
        }

        Ok(())
    }

    fn finalize_record(
        &self,
        action: FinalizeRecordAction,
        state: &mut ProvenanceState,
        signer: &str,
    ) -> Result<(), ApplyError> {
        let mut record = require_record(state, &action.record_id)?;

        if record.owner != signer || record.custodian != signer {
            return Err(ApplyError::invalid(
                "Must be owner and custodian to finalize record",
            ));
        }
        if record.r#final {
            return Err(ApplyError::invalid(format!(
                "Record is already final: {}",
                action.record_id
            )));
        }

        record.r#final = true;
        state.set_record(record)
    }
}

fn require_agent(state: &mut ProvenanceState, public_key: &str) -> Result<Agent, ApplyError> {
    state.get_agent(public_key)?.ok_or_else(|| {
        ApplyError::invalid(format!("Agent is not registered: {}", public_key))
    })
}

fn require_record(state: &mut ProvenanceState, record_id: &str) -> Result<Record, ApplyError> {
    state.get_record(record_id)?.ok_or_else(|| {
        ApplyError::invalid(format!("Record does not exist: {}", record_id))
    })
}

/// Validate a provided value against the property's schema fields.
fn validate_value(
    value: &PropertyValue,
    data_type: DataType,
    number_exponent: i32,
    enum_options: &[String],
    struct_properties: &[PropertySchema],
) -> Result<(), ApplyError> {
    if value.data_type() != data_type {
        return Err(ApplyError::invalid(format!(
            "Value provided for {} is the wrong type: {:?} != {:?}",
            value.name,
            value.data_type(),
            data_type
        )));
    }

    match data_type {
        DataType::Number => {
            if value.number_exponent != number_exponent {
                return Err(ApplyError::invalid(format!(
                    "Number exponent for {} does not match the schema: {} != {}",
                    value.name, value.number_exponent, number_exponent
                )));
            }
        }
        DataType::Enum => {
            if value.enum_value as usize >= enum_options.len() {
                return Err(ApplyError::invalid(format!(
                    "Enum index for {} is out of range: {}",
                    value.name, value.enum_value
                )));
            }
        }
        DataType::Location => {
            if value.location_value.is_none() {
                return Err(ApplyError::invalid(format!(
                    "Location value is not set for {}",
                    value.name
                )));
            }
        }
        DataType::Struct => {
            validate_struct_values(&value.struct_values, struct_properties)?;
        }
        _ => {}
    }

    Ok(())
}

/// A struct value must carry exactly the sub-values its schema names,
/// each valid against the corresponding sub-schema.
fn validate_struct_values(
    values: &[PropertyValue],
    schemas: &[PropertySchema],
) -> Result<(), ApplyError> {
    if values.len() != schemas.len() {
        return Err(ApplyError::invalid(format!(
            "Provided struct does not match schema length: {} != {}",
            values.len(),
            schemas.len()
        )));
    }

    for schema in schemas {
        let value = values
            .iter()
            .find(|value| value.name == schema.name)
            .ok_or_else(|| {
                ApplyError::invalid(format!(
                    "Provided struct is missing schema property: {}",
                    schema.name
                ))
            })?;
        validate_value(value, schema.data_type(), schema.number_exponent,
            &schema.enum_options, &schema.struct_properties)?;
    }

    Ok(())
}

/// Copy the typed value of a validated update into a page report.
fn make_reported_value(
    reporter_index: u32,
    timestamp: u64,
    value: &PropertyValue,
) -> ReportedValue {
    let mut reported = ReportedValue {
        reporter_index,
        timestamp,
        ..Default::default()
    };

    match value.data_type() {
        DataType::Bytes => reported.bytes_value = value.bytes_value.clone(),
        DataType::Boolean => reported.boolean_value = value.boolean_value,
        DataType::Number => reported.number_value = value.number_value,
        DataType::String => reported.string_value = value.string_value.clone(),
        DataType::Enum => reported.enum_value = value.enum_value,
        DataType::Location => reported.location_value = value.location_value.clone(),
        DataType::Struct => reported.struct_values = value.struct_values.clone(),
        DataType::Unset => {}
    }

    reported
}
