//! Per-block application: decode containers, project documents.
//!
//! Entity changes are applied before property pages; pages are
//! enriched against the Property row (enum indices become option
//! strings, struct values fold into keyed maps). Undecodable changes
//! and pages without a property row are logged and skipped; the block
//! still commits.

use crate::events::{BlockEvent, StateChange};
use crate::SyncError;
use provenance_model::AddressKind;
use provenance_proto::containers::Container;
use provenance_proto::state::property_page::ReportedValue;
use provenance_proto::state::{
    AgentContainer, DataType, PropertyContainer, PropertyPageContainer, PropertySchema,
    PropertyValue, ProposalContainer, RecordContainer, RecordTypeContainer,
};
use provenance_store::{
    AgentDoc, BlockDoc, BlockStore, LocationDoc, PropertyDoc, PropertyPageDoc,
    PropertySchemaDoc, ProposalDoc, RecordDoc, RecordTypeDoc, ReportDoc, ReporterDoc, TableKind,
    ValueDoc,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Apply one committed block to the read store.
pub async fn apply_block(
    store: &BlockStore,
    event: &BlockEvent,
    settle_wait: Duration,
) -> Result<(), SyncError> {
    let mut entities = Vec::new();
    let mut pages = Vec::new();

    for change in &event.changes {
        match AddressKind::of(&change.address) {
            Ok(AddressKind::PropertyPage) => pages.push(change),
            Ok(kind) => entities.push((kind, change)),
            Err(err) => {
                tracing::warn!(address = %change.address, "skipping unrecognized address: {}", err);
            }
        }
    }

    for (kind, change) in entities {
        apply_entity(store, kind, change, event.block_num)?;
    }

    if !pages.is_empty() {
        // Let the property rows written above become read-visible
        // before the page projection consults them.
        tokio::time::sleep(settle_wait).await;
        for change in pages {
            apply_page(store, change, event.block_num)?;
        }
    }

    store.insert_block(&BlockDoc {
        block_num: event.block_num,
        block_id: event.block_id.clone(),
        state_root_hash: event.state_root_hash.clone(),
    })?;

    Ok(())
}

/// Project every entity in a non-page container change.
fn apply_entity(
    store: &BlockStore,
    kind: AddressKind,
    change: &StateChange,
    block_num: u64,
) -> Result<(), SyncError> {
    macro_rules! decode_or_skip {
        ($container:ty) => {
            match <$container>::from_bytes(&change.value) {
                Ok(container) => container,
                Err(err) => {
                    tracing::warn!(
                        address = %change.address,
                        "skipping undecodable container: {}",
                        err
                    );
                    return Ok(());
                }
            }
        };
    }

    match kind {
        AddressKind::Agent => {
            for agent in decode_or_skip!(AgentContainer).entries() {
                let doc = AgentDoc {
                    public_key: agent.public_key.clone(),
                    name: agent.name.clone(),
                    timestamp: agent.timestamp,
                };
                store.upsert(TableKind::Agents, &[&doc.public_key], &doc, block_num)?;
            }
        }
        AddressKind::RecordType => {
            for record_type in decode_or_skip!(RecordTypeContainer).entries() {
                let doc = RecordTypeDoc {
                    name: record_type.name.clone(),
                    properties: record_type.properties.iter().map(schema_doc).collect(),
                };
                store.upsert(TableKind::RecordTypes, &[&doc.name], &doc, block_num)?;
            }
        }
        AddressKind::Record => {
            for record in decode_or_skip!(RecordContainer).entries() {
                let doc = RecordDoc {
                    record_id: record.record_id.clone(),
                    record_type: record.record_type.clone(),
                    owner: record.owner.clone(),
                    custodian: record.custodian.clone(),
                    r#final: record.r#final,
                };
                store.upsert(TableKind::Records, &[&doc.record_id], &doc, block_num)?;
            }
        }
        AddressKind::Property => {
            for property in decode_or_skip!(PropertyContainer).entries() {
                let doc = PropertyDoc {
                    name: property.name.clone(),
                    record_id: property.record_id.clone(),
                    record_type: property.record_type.clone(),
                    data_type: property.data_type().as_str_name().to_string(),
                    reporters: property
                        .reporters
                        .iter()
                        .map(|reporter| ReporterDoc {
                            public_key: reporter.public_key.clone(),
                            authorized: reporter.authorized,
                            index: reporter.index,
                        })
                        .collect(),
                    current_page: property.current_page,
                    wrapped: property.wrapped,
                    fixed: property.fixed,
                    number_exponent: property.number_exponent,
                    enum_options: property.enum_options.clone(),
                    struct_properties: property.struct_properties.iter().map(schema_doc).collect(),
                    unit: property.unit.clone(),
                };
                store.upsert(
                    TableKind::Properties,
                    &[&doc.name, &doc.record_id],
                    &doc,
                    block_num,
                )?;
            }
        }
        AddressKind::Proposal => {
            for proposal in decode_or_skip!(ProposalContainer).entries() {
                let doc = ProposalDoc {
                    record_id: proposal.record_id.clone(),
                    timestamp: proposal.timestamp,
                    issuing_agent: proposal.issuing_agent.clone(),
                    receiving_agent: proposal.receiving_agent.clone(),
                    role: proposal.role().as_str_name().to_string(),
                    properties: proposal.properties.clone(),
                    status: proposal.status().as_str_name().to_string(),
                    terms: proposal.terms.clone(),
                };
                let timestamp = doc.timestamp.to_string();
                store.upsert(
                    TableKind::Proposals,
                    &[&doc.record_id, &timestamp, &doc.receiving_agent, &doc.role],
                    &doc,
                    block_num,
                )?;
            }
        }
        AddressKind::PropertyPage => unreachable!("pages are partitioned separately"),
    }

    Ok(())
}

/// Project a property page change, enriching reports against the
/// current Property row.
fn apply_page(store: &BlockStore, change: &StateChange, block_num: u64) -> Result<(), SyncError> {
    let container = match PropertyPageContainer::from_bytes(&change.value) {
        Ok(container) => container,
        Err(err) => {
            tracing::warn!(address = %change.address, "skipping undecodable page container: {}", err);
            return Ok(());
        }
    };

    // The page number is the 4-hex address tail.
    let page_num = match u32::from_str_radix(&change.address[66..70], 16) {
        Ok(page_num) => page_num,
        Err(_) => {
            tracing::warn!(address = %change.address, "skipping page with invalid page suffix");
            return Ok(());
        }
    };

    for page in container.entries() {
        let property: Option<PropertyDoc> =
            store.live(TableKind::Properties, &[&page.name, &page.record_id])?;
        let property = match property {
            Some(property) => property,
            None => {
                tracing::warn!(
                    name = %page.name,
                    record_id = %page.record_id,
                    "no property row for page, skipping"
                );
                continue;
            }
        };

        let doc = PropertyPageDoc {
            name: page.name.clone(),
            record_id: page.record_id.clone(),
            page_num,
            reported_values: page
                .reported_values
                .iter()
                .map(|report| report_doc(report, &property))
                .collect(),
        };
        let page_num_key = page_num.to_string();
        store.upsert(
            TableKind::PropertyPages,
            &[&doc.name, &doc.record_id, &page_num_key],
            &doc,
            block_num,
        )?;
    }

    Ok(())
}

fn schema_doc(schema: &PropertySchema) -> PropertySchemaDoc {
    PropertySchemaDoc {
        name: schema.name.clone(),
        data_type: schema.data_type().as_str_name().to_string(),
        required: schema.required,
        fixed: schema.fixed,
        delayed: schema.delayed,
        number_exponent: schema.number_exponent,
        enum_options: schema.enum_options.clone(),
        struct_properties: schema.struct_properties.iter().map(schema_doc).collect(),
        unit: schema.unit.clone(),
    }
}

fn report_doc(report: &ReportedValue, property: &PropertyDoc) -> ReportDoc {
    let mut value = ValueDoc::default();

    match property.data_type.as_str() {
        "BYTES" => value.bytes_value = Some(report.bytes_value.clone()),
        "BOOLEAN" => value.boolean_value = Some(report.boolean_value),
        "NUMBER" => value.number_value = Some(report.number_value),
        "STRING" => value.string_value = Some(report.string_value.clone()),
        "ENUM" => {
            value.enum_value = property
                .enum_options
                .get(report.enum_value as usize)
                .cloned();
            if value.enum_value.is_none() {
                tracing::warn!(
                    name = %property.name,
                    index = report.enum_value,
                    "enum report index outside the property's options"
                );
            }
        }
        "LOCATION" => {
            value.location_value = report.location_value.as_ref().map(|location| LocationDoc {
                latitude: location.latitude,
                longitude: location.longitude,
            });
        }
        "STRUCT" => {
            value.struct_value = Some(fold_struct(
                &report.struct_values,
                &property.struct_properties,
            ));
        }
        _ => {}
    }

    ReportDoc {
        reporter_index: report.reporter_index,
        timestamp: report.timestamp,
        value,
    }
}

/// Fold a struct report into `{name: value}`, recursively, resolving
/// nested enums against the sub-schemas.
fn fold_struct(
    values: &[PropertyValue],
    schemas: &[PropertySchemaDoc],
) -> BTreeMap<String, ValueDoc> {
    values
        .iter()
        .map(|value| {
            let schema = schemas.iter().find(|schema| schema.name == value.name);
            (value.name.clone(), value_doc(value, schema))
        })
        .collect()
}

fn value_doc(value: &PropertyValue, schema: Option<&PropertySchemaDoc>) -> ValueDoc {
    let mut doc = ValueDoc::default();

    match value.data_type() {
        DataType::Bytes => doc.bytes_value = Some(value.bytes_value.clone()),
        DataType::Boolean => doc.boolean_value = Some(value.boolean_value),
        DataType::Number => doc.number_value = Some(value.number_value),
        DataType::String => doc.string_value = Some(value.string_value.clone()),
        DataType::Enum => {
            doc.enum_value = schema
                .and_then(|schema| schema.enum_options.get(value.enum_value as usize))
                .cloned();
        }
        DataType::Location => {
            doc.location_value = value.location_value.as_ref().map(|location| LocationDoc {
                latitude: location.latitude,
                longitude: location.longitude,
            });
        }
        DataType::Struct => {
            let sub_schemas = schema.map(|schema| schema.struct_properties.as_slice());
            doc.struct_value = Some(fold_struct(
                &value.struct_values,
                sub_schemas.unwrap_or(&[]),
            ));
        }
        DataType::Unset => {}
    }

    doc
}
