use feature_client::{AttributeUpdate, FeatureStore, FeatureStoreError};

#[derive(thiserror::Error, Debug)]
pub enum EditError {
    #[error("edit to meter {object_id} rejected: {message}")]
    Rejected { object_id: i64, message: String },
    #[error("edit request failed: {0}")]
    Store(#[from] FeatureStoreError),
}

/// Writes one meter's account update back to the feature service.
///
/// Each call sends exactly one record. There is no retry: a failure is
/// reported and the caller keeps the user's input.
#[derive(Debug, Clone, Copy)]
pub struct EditSubmitter {
    normalize_empty_to_null: bool,
}

impl EditSubmitter {
    pub fn new(normalize_empty_to_null: bool) -> Self {
        Self {
            normalize_empty_to_null,
        }
    }

    pub fn prepare(&self, object_id: i64, raw_value: &str) -> AttributeUpdate {
        let value = raw_value.trim();
        let account_update = if value.is_empty() && self.normalize_empty_to_null {
            None
        } else {
            Some(value.to_string())
        };
        AttributeUpdate {
            object_id,
            account_update,
        }
    }

    /// Submit and return the update the service acknowledged.
    pub async fn submit(
        &self,
        store: &dyn FeatureStore,
        object_id: i64,
        raw_value: &str,
    ) -> Result<AttributeUpdate, EditError> {
        let update = self.prepare(object_id, raw_value);
        let results = store.apply_edits(std::slice::from_ref(&update)).await?;

        let result = results
            .iter()
            .find(|r| r.object_id == Some(object_id))
            .or_else(|| results.iter().find(|r| r.object_id.is_none()));

        match result {
            Some(r) if r.accepted() => {
                metrics::counter!("meter_edits_accepted_total").increment(1);
                tracing::info!(object_id, "account update saved");
                Ok(update)
            }
            Some(r) => {
                metrics::counter!("meter_edits_rejected_total").increment(1);
                tracing::warn!(object_id, response = ?r, "account update rejected");
                Err(EditError::Rejected {
                    object_id,
                    message: r.failure_message(),
                })
            }
            None => {
                metrics::counter!("meter_edits_rejected_total").increment(1);
                tracing::warn!(object_id, response = ?results, "no edit result for meter");
                Err(EditError::Rejected {
                    object_id,
                    message: "the feature service returned no result for this meter".to_string(),
                })
            }
        }
    }
}
