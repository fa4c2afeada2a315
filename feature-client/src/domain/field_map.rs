use serde::Deserialize;

/// Maps the logical meter fields onto the hosted layer's schema field names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub object_id: String,
    pub address: String,
    pub account_number: String,
    pub customer_name: String,
    pub customer_account_number: String,
    pub account_update: String,
    pub class: String,
    pub meter_type: String,
    pub edit_date: String,
    pub editor: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            object_id: "OBJECTID".to_string(),
            address: "Address".to_string(),
            account_number: "AccountNumber".to_string(),
            customer_name: "CustomerName".to_string(),
            customer_account_number: "CustomerAccountNumber".to_string(),
            account_update: "AccountUpdate".to_string(),
            class: "Class".to_string(),
            meter_type: "Type".to_string(),
            edit_date: "last_edited_date".to_string(),
            editor: "last_edited_user".to_string(),
        }
    }
}
