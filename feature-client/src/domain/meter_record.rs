use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::domain::{FieldMap, Point};
use crate::error::{FeatureStoreError, Result};

/// One utility meter as held by the hosted feature layer.
///
/// Every attribute except the object id is optional: layers in the field
/// carry different subsets of the schema, and a missing value is simply
/// `None` rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterRecord {
    pub object_id: i64,
    pub location: Option<Point>,
    pub address: Option<String>,
    pub account_number: Option<String>,
    pub customer_name: Option<String>,
    pub customer_account_number: Option<String>,
    pub account_update: Option<String>,
    pub class: Option<String>,
    #[serde(rename = "type")]
    pub meter_type: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub edit_date: Option<OffsetDateTime>,
    pub editor: Option<String>,
}

impl MeterRecord {
    /// A record with only an id; the remaining fields are filled in by callers.
    pub fn new(object_id: i64) -> Self {
        Self {
            object_id,
            location: None,
            address: None,
            account_number: None,
            customer_name: None,
            customer_account_number: None,
            account_update: None,
            class: None,
            meter_type: None,
            edit_date: None,
            editor: None,
        }
    }

    /// Build a typed record from a raw attribute map.
    ///
    /// The id field must be an integer. Text fields accept strings, numbers
    /// and booleans; null or absent becomes `None`. The edit date accepts
    /// epoch milliseconds (the service's native format) or RFC3339 text.
    pub fn from_attributes(
        attributes: &Map<String, Value>,
        location: Option<Point>,
        fields: &FieldMap,
    ) -> Result<Self> {
        let object_id = attributes
            .get(&fields.object_id)
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                FeatureStoreError::InvalidRecord(format!(
                    "missing or non-integer id field '{}'",
                    fields.object_id
                ))
            })?;

        let text = |name: &str| attribute_text(attributes.get(name));

        Ok(Self {
            object_id,
            location,
            address: text(&fields.address),
            account_number: text(&fields.account_number),
            customer_name: text(&fields.customer_name),
            customer_account_number: text(&fields.customer_account_number),
            account_update: text(&fields.account_update),
            class: text(&fields.class),
            meter_type: text(&fields.meter_type),
            edit_date: attribute_date(attributes.get(&fields.edit_date)),
            editor: text(&fields.editor),
        })
    }

    /// The account update value with surrounding whitespace removed; empty when absent.
    pub fn account_update_trimmed(&self) -> &str {
        self.account_update.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn needs_account_update(&self) -> bool {
        self.account_update_trimmed().is_empty()
    }
}

fn attribute_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn attribute_date(value: Option<&Value>) -> Option<OffsetDateTime> {
    match value? {
        Value::Number(n) => {
            let millis = n.as_i64()?;
            OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000).ok()
        }
        Value::String(s) => {
            OffsetDateTime::parse(s.trim(), &time::format_description::well_known::Rfc3339).ok()
        }
        _ => None,
    }
}
