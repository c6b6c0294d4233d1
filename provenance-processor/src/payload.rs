//! Payload decoding and structural validation.
//!
//! Everything that can be rejected without consulting state is rejected
//! here: unknown actions, zero timestamps, empty names and ids, and
//! malformed property schemas.

use crate::error::ApplyError;
use prost::Message;
use provenance_proto::payload::{
    payload, AnswerProposalAction, CreateAgentAction, CreateProposalAction, CreateRecordAction,
    CreateRecordTypeAction, FinalizeRecordAction, Payload, RevokeReporterAction,
    UpdatePropertiesAction,
};
use provenance_proto::payload::answer_proposal_action::Response;
use provenance_proto::state::{proposal::Role, DataType, PropertySchema};

/// A decoded, structurally valid action.
#[derive(Debug, Clone)]
pub enum Action {
    CreateAgent(CreateAgentAction),
    CreateRecord(CreateRecordAction),
    FinalizeRecord(FinalizeRecordAction),
    CreateRecordType(CreateRecordTypeAction),
    UpdateProperties(UpdatePropertiesAction),
    CreateProposal(CreateProposalAction),
    AnswerProposal(AnswerProposalAction),
    RevokeReporter(RevokeReporterAction),
}

/// A decoded transaction payload.
#[derive(Debug, Clone)]
pub struct ProvenancePayload {
    pub action: Action,
    pub timestamp: u64,
}

impl ProvenancePayload {
    pub fn parse(bytes: &[u8]) -> Result<ProvenancePayload, ApplyError> {
        let payload = Payload::decode(bytes)
            .map_err(|_| ApplyError::invalid("Cannot deserialize payload"))?;

        if payload.timestamp == 0 {
            return Err(ApplyError::invalid("Timestamp is not set"));
        }

        let action_kind = payload::Action::try_from(payload.action)
            .map_err(|_| ApplyError::invalid(format!("Unknown action: {}", payload.action)))?;

        let action = match action_kind {
            payload::Action::Unset => {
                return Err(ApplyError::invalid("Action is not set"));
            }
            payload::Action::CreateAgent => {
                let create_agent = payload
                    .create_agent
                    .ok_or_else(|| ApplyError::invalid("CreateAgent data missing"))?;
                if create_agent.name.is_empty() {
                    return Err(ApplyError::invalid("Agent name cannot be an empty string"));
                }
                Action::CreateAgent(create_agent)
            }
            payload::Action::CreateRecord => {
                let create_record = payload
                    .create_record
                    .ok_or_else(|| ApplyError::invalid("CreateRecord data missing"))?;
                if create_record.record_id.is_empty() {
                    return Err(ApplyError::invalid("Record id cannot be an empty string"));
                }
                Action::CreateRecord(create_record)
            }
            payload::Action::FinalizeRecord => {
                let finalize_record = payload
                    .finalize_record
                    .ok_or_else(|| ApplyError::invalid("FinalizeRecord data missing"))?;
                if finalize_record.record_id.is_empty() {
                    return Err(ApplyError::invalid("Record id cannot be an empty string"));
                }
                Action::FinalizeRecord(finalize_record)
            }
            payload::Action::CreateRecordType => {
                let create_record_type = payload
                    .create_record_type
                    .ok_or_else(|| ApplyError::invalid("CreateRecordType data missing"))?;
                if create_record_type.name.is_empty() {
                    return Err(ApplyError::invalid(
                        "Record type name cannot be an empty string",
                    ));
                }
                if create_record_type.properties.is_empty() {
                    return Err(ApplyError::invalid(
                        "Record type must have at least one property",
                    ));
                }
                for schema in &create_record_type.properties {
                    validate_schema(schema)?;
                }
                Action::CreateRecordType(create_record_type)
            }
            payload::Action::UpdateProperties => {
                let update_properties = payload
                    .update_properties
                    .ok_or_else(|| ApplyError::invalid("UpdateProperties data missing"))?;
                if update_properties.record_id.is_empty() {
                    return Err(ApplyError::invalid("Record id cannot be an empty string"));
                }
                Action::UpdateProperties(update_properties)
            }
            payload::Action::CreateProposal => {
                let create_proposal = payload
                    .create_proposal
                    .ok_or_else(|| ApplyError::invalid("CreateProposal data missing"))?;
                if create_proposal.record_id.is_empty() {
                    return Err(ApplyError::invalid("Record id cannot be an empty string"));
                }
                if create_proposal.receiving_agent.is_empty() {
                    return Err(ApplyError::invalid(
                        "Receiving agent cannot be an empty string",
                    ));
                }
                Role::try_from(create_proposal.role)
                    .map_err(|_| ApplyError::invalid("Unknown proposal role"))?;
                Action::CreateProposal(create_proposal)
            }
            payload::Action::AnswerProposal => {
                let answer_proposal = payload
                    .answer_proposal
                    .ok_or_else(|| ApplyError::invalid("AnswerProposal data missing"))?;
                Role::try_from(answer_proposal.role)
                    .map_err(|_| ApplyError::invalid("Unknown proposal role"))?;
                Response::try_from(answer_proposal.response)
                    .map_err(|_| ApplyError::invalid("Unknown proposal response"))?;
                Action::AnswerProposal(answer_proposal)
            }
            payload::Action::RevokeReporter => {
                let revoke_reporter = payload
                    .revoke_reporter
                    .ok_or_else(|| ApplyError::invalid("RevokeReporter data missing"))?;
                if revoke_reporter.record_id.is_empty() {
                    return Err(ApplyError::invalid("Record id cannot be an empty string"));
                }
                if revoke_reporter.reporter_id.is_empty() {
                    return Err(ApplyError::invalid("Reporter id cannot be an empty string"));
                }
                Action::RevokeReporter(revoke_reporter)
            }
        };

        Ok(ProvenancePayload {
            action,
            timestamp: payload.timestamp,
        })
    }
}

/// Structural checks for a property schema, recursing into STRUCT
/// sub-schemas.
fn validate_schema(schema: &PropertySchema) -> Result<(), ApplyError> {
    if schema.name.is_empty() {
        return Err(ApplyError::invalid("Property name cannot be an empty string"));
    }
    let data_type = DataType::try_from(schema.data_type)
        .map_err(|_| ApplyError::invalid(format!("Unknown data type for {}", schema.name)))?;
    match data_type {
        DataType::Unset => Err(ApplyError::invalid(format!(
            "Data type is not set for {}",
            schema.name
        ))),
        DataType::Enum => {
            if schema.enum_options.is_empty() {
                return Err(ApplyError::invalid(format!(
                    "Enum property {} must have at least one option",
                    schema.name
                )));
            }
            Ok(())
        }
        DataType::Struct => {
            if schema.struct_properties.is_empty() {
                return Err(ApplyError::invalid(format!(
                    "Struct property {} must have a nested schema",
                    schema.name
                )));
            }
            for nested in &schema.struct_properties {
                validate_schema(nested)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_bytes() {
        let err = ProvenancePayload::parse(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, ApplyError::InvalidTransaction(_)));
    }

    #[test]
    fn rejects_zero_timestamp() {
        let payload = Payload::create_agent(0, "Alice");
        let err = ProvenancePayload::parse(&payload.encode_to_vec()).unwrap_err();
        assert!(err.to_string().contains("Timestamp"));
    }

    #[test]
    fn rejects_unset_action() {
        let payload = Payload {
            timestamp: 1,
            ..Default::default()
        };
        let err = ProvenancePayload::parse(&payload.encode_to_vec()).unwrap_err();
        assert!(err.to_string().contains("Action is not set"));
    }

    #[test]
    fn rejects_empty_agent_name() {
        let payload = Payload::create_agent(1, "");
        assert!(ProvenancePayload::parse(&payload.encode_to_vec()).is_err());
    }

    #[test]
    fn rejects_record_type_without_properties() {
        let payload = Payload::create_record_type(1, "asset", vec![]);
        let err = ProvenancePayload::parse(&payload.encode_to_vec()).unwrap_err();
        assert!(err.to_string().contains("at least one property"));
    }

    #[test]
    fn rejects_enum_schema_without_options() {
        let schema = PropertySchema::new("grade", DataType::Enum, true);
        let payload = Payload::create_record_type(1, "asset", vec![schema]);
        assert!(ProvenancePayload::parse(&payload.encode_to_vec()).is_err());
    }

    #[test]
    fn rejects_struct_schema_without_members() {
        let schema = PropertySchema::new("dims", DataType::Struct, true);
        let payload = Payload::create_record_type(1, "asset", vec![schema]);
        assert!(ProvenancePayload::parse(&payload.encode_to_vec()).is_err());
    }

    #[test]
    fn accepts_valid_create_record_type() {
        let mut schema = PropertySchema::new("grade", DataType::Enum, true);
        schema.enum_options = vec!["ok".to_string(), "bad".to_string()];
        let payload = Payload::create_record_type(7, "asset", vec![schema]);
        let parsed = ProvenancePayload::parse(&payload.encode_to_vec()).unwrap();
        assert_eq!(parsed.timestamp, 7);
        assert!(matches!(parsed.action, Action::CreateRecordType(_)));
    }
}
