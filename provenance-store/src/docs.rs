//! Document shapes stored in the read store.
//!
//! These are the enriched, query-friendly forms of the on-chain
//! entities: enum report values carry their option string, struct
//! report values are folded into keyed maps, and data types are
//! spelled out as their wire names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDoc {
    pub public_key: String,
    pub name: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchemaDoc {
    pub name: String,
    pub data_type: String,
    pub required: bool,
    pub fixed: bool,
    pub delayed: bool,
    pub number_exponent: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_options: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub struct_properties: Vec<PropertySchemaDoc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTypeDoc {
    pub name: String,
    pub properties: Vec<PropertySchemaDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDoc {
    pub record_id: String,
    pub record_type: String,
    pub owner: String,
    pub custodian: String,
    pub r#final: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReporterDoc {
    pub public_key: String,
    pub authorized: bool,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDoc {
    pub name: String,
    pub record_id: String,
    pub record_type: String,
    pub data_type: String,
    pub reporters: Vec<ReporterDoc>,
    pub current_page: u32,
    pub wrapped: bool,
    pub fixed: bool,
    pub number_exponent: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_options: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub struct_properties: Vec<PropertySchemaDoc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDoc {
    pub latitude: i64,
    pub longitude: i64,
}

/// One typed report value. Only the field matching the property's data
/// type is present; enum indices are resolved to their option string
/// and struct values are folded into a name-keyed map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_value: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boolean_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_value: Option<LocationDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub struct_value: Option<BTreeMap<String, ValueDoc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDoc {
    pub reporter_index: u32,
    pub timestamp: u64,
    #[serde(flatten)]
    pub value: ValueDoc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPageDoc {
    pub name: String,
    pub record_id: String,
    pub page_num: u32,
    pub reported_values: Vec<ReportDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalDoc {
    pub record_id: String,
    pub timestamp: u64,
    pub issuing_agent: String,
    pub receiving_agent: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub terms: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDoc {
    pub block_num: u64,
    pub block_id: String,
    pub state_root_hash: String,
}
