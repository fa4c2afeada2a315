use serde::{Deserialize, Serialize};

use crate::domain::{Extent, MeterRecord};
use crate::error::Result;

/// One page of a predicate query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub where_clause: String,
    pub offset: usize,
    pub count: usize,
}

impl PageRequest {
    pub fn all(offset: usize, count: usize) -> Self {
        Self {
            where_clause: "1=1".to_string(),
            offset,
            count,
        }
    }
}

/// A single-field change proposed for one record. `None` clears the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeUpdate {
    pub object_id: i64,
    pub account_update: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditFailure {
    pub code: Option<i64>,
    pub description: Option<String>,
}

/// Per-record outcome of an apply-edits call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResult {
    pub object_id: Option<i64>,
    pub success: bool,
    pub error: Option<EditFailure>,
}

impl EditResult {
    /// Only an explicit success flag counts. A result with neither an error
    /// nor `success: true` is not upgraded to success.
    pub fn accepted(&self) -> bool {
        self.success
    }

    pub fn failure_message(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.description.clone())
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "the feature service did not confirm the edit".to_string())
    }
}

/// The remote geospatial record service holding the authoritative meters.
#[async_trait::async_trait]
pub trait FeatureStore: Send + Sync {
    async fn query_page(&self, request: PageRequest) -> Result<Vec<MeterRecord>>;

    async fn query_by_id(&self, object_id: i64) -> Result<Option<MeterRecord>>;

    async fn apply_edits(&self, updates: &[AttributeUpdate]) -> Result<Vec<EditResult>>;

    async fn query_extent(&self) -> Result<Option<Extent>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_success_flag_is_not_accepted() {
        let ambiguous = EditResult {
            object_id: Some(42),
            success: false,
            error: None,
        };
        assert!(!ambiguous.accepted());
        assert_eq!(
            ambiguous.failure_message(),
            "the feature service did not confirm the edit"
        );
    }

    #[test]
    fn failure_message_prefers_service_description() {
        let rejected = EditResult {
            object_id: Some(42),
            success: false,
            error: Some(EditFailure {
                code: Some(1019),
                description: Some("Field is not editable.".to_string()),
            }),
        };
        assert_eq!(rejected.failure_message(), "Field is not editable.");
    }
}
