//! Construction helpers for payload and value messages.

use crate::payload::{
    payload::Action, AnswerProposalAction, CreateAgentAction, CreateProposalAction,
    CreateRecordAction, CreateRecordTypeAction, FinalizeRecordAction, Payload,
    RevokeReporterAction, UpdatePropertiesAction,
};
use crate::payload::answer_proposal_action::Response;
use crate::state::proposal::Role;
use crate::state::{DataType, Location, PropertySchema, PropertyValue};

impl Payload {
    pub fn create_agent(timestamp: u64, name: impl Into<String>) -> Payload {
        Payload {
            action: Action::CreateAgent as i32,
            timestamp,
            create_agent: Some(CreateAgentAction { name: name.into() }),
            ..Default::default()
        }
    }

    pub fn create_record(
        timestamp: u64,
        record_id: impl Into<String>,
        record_type: impl Into<String>,
        properties: Vec<PropertyValue>,
    ) -> Payload {
        Payload {
            action: Action::CreateRecord as i32,
            timestamp,
            create_record: Some(CreateRecordAction {
                record_id: record_id.into(),
                record_type: record_type.into(),
                properties,
            }),
            ..Default::default()
        }
    }

    pub fn finalize_record(timestamp: u64, record_id: impl Into<String>) -> Payload {
        Payload {
            action: Action::FinalizeRecord as i32,
            timestamp,
            finalize_record: Some(FinalizeRecordAction {
                record_id: record_id.into(),
            }),
            ..Default::default()
        }
    }

    pub fn create_record_type(
        timestamp: u64,
        name: impl Into<String>,
        properties: Vec<PropertySchema>,
    ) -> Payload {
        Payload {
            action: Action::CreateRecordType as i32,
            timestamp,
            create_record_type: Some(CreateRecordTypeAction {
                name: name.into(),
                properties,
            }),
            ..Default::default()
        }
    }

    pub fn update_properties(
        timestamp: u64,
        record_id: impl Into<String>,
        properties: Vec<PropertyValue>,
    ) -> Payload {
        Payload {
            action: Action::UpdateProperties as i32,
            timestamp,
            update_properties: Some(UpdatePropertiesAction {
                record_id: record_id.into(),
                properties,
            }),
            ..Default::default()
        }
    }

    pub fn create_proposal(
        timestamp: u64,
        record_id: impl Into<String>,
        receiving_agent: impl Into<String>,
        role: Role,
        properties: Vec<String>,
    ) -> Payload {
        Payload {
            action: Action::CreateProposal as i32,
            timestamp,
            create_proposal: Some(CreateProposalAction {
                record_id: record_id.into(),
                receiving_agent: receiving_agent.into(),
                role: role as i32,
                properties,
                terms: String::new(),
            }),
            ..Default::default()
        }
    }

    pub fn answer_proposal(
        timestamp: u64,
        record_id: impl Into<String>,
        receiving_agent: impl Into<String>,
        role: Role,
        response: Response,
    ) -> Payload {
        Payload {
            action: Action::AnswerProposal as i32,
            timestamp,
            answer_proposal: Some(AnswerProposalAction {
                record_id: record_id.into(),
                receiving_agent: receiving_agent.into(),
                role: role as i32,
                response: response as i32,
            }),
            ..Default::default()
        }
    }

    pub fn revoke_reporter(
        timestamp: u64,
        record_id: impl Into<String>,
        reporter_id: impl Into<String>,
        properties: Vec<String>,
    ) -> Payload {
        Payload {
            action: Action::RevokeReporter as i32,
            timestamp,
            revoke_reporter: Some(RevokeReporterAction {
                record_id: record_id.into(),
                reporter_id: reporter_id.into(),
                properties,
            }),
            ..Default::default()
        }
    }
}

impl PropertyValue {
    pub fn number(name: impl Into<String>, value: i64, exponent: i32) -> PropertyValue {
        PropertyValue {
            name: name.into(),
            data_type: DataType::Number as i32,
            number_value: value,
            number_exponent: exponent,
            ..Default::default()
        }
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> PropertyValue {
        PropertyValue {
            name: name.into(),
            data_type: DataType::String as i32,
            string_value: value.into(),
            ..Default::default()
        }
    }

    pub fn boolean(name: impl Into<String>, value: bool) -> PropertyValue {
        PropertyValue {
            name: name.into(),
            data_type: DataType::Boolean as i32,
            boolean_value: value,
            ..Default::default()
        }
    }

    pub fn bytes(name: impl Into<String>, value: Vec<u8>) -> PropertyValue {
        PropertyValue {
            name: name.into(),
            data_type: DataType::Bytes as i32,
            bytes_value: value,
            ..Default::default()
        }
    }

    pub fn enumeration(name: impl Into<String>, index: u32) -> PropertyValue {
        PropertyValue {
            name: name.into(),
            data_type: DataType::Enum as i32,
            enum_value: index,
            ..Default::default()
        }
    }

    pub fn location(name: impl Into<String>, latitude: i64, longitude: i64) -> PropertyValue {
        PropertyValue {
            name: name.into(),
            data_type: DataType::Location as i32,
            location_value: Some(Location { latitude, longitude }),
            ..Default::default()
        }
    }

    pub fn structure(name: impl Into<String>, values: Vec<PropertyValue>) -> PropertyValue {
        PropertyValue {
            name: name.into(),
            data_type: DataType::Struct as i32,
            struct_values: values,
            ..Default::default()
        }
    }
}

impl PropertySchema {
    pub fn new(name: impl Into<String>, data_type: DataType, required: bool) -> PropertySchema {
        PropertySchema {
            name: name.into(),
            data_type: data_type as i32,
            required,
            ..Default::default()
        }
    }
}
