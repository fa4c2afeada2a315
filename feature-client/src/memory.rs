//! In-process [`FeatureStore`] used by tests in this and downstream crates.

use std::sync::{Mutex, MutexGuard};

use crate::domain::{Extent, MeterRecord};
use crate::error::{FeatureStoreError, Result};
use crate::store::{AttributeUpdate, EditFailure, EditResult, FeatureStore, PageRequest};

#[derive(Debug, Clone)]
enum EditBehaviour {
    Accept,
    Reject(String),
    /// `success` absent and no error.
    Unconfirmed,
}

struct Inner {
    records: Vec<MeterRecord>,
    page_requests: usize,
    fail_on_page: Option<usize>,
    edit_behaviour: EditBehaviour,
    edit_batches: Vec<Vec<AttributeUpdate>>,
}

pub struct InMemoryFeatureStore {
    inner: Mutex<Inner>,
}

impl InMemoryFeatureStore {
    pub fn new(records: Vec<MeterRecord>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                records,
                page_requests: 0,
                fail_on_page: None,
                edit_behaviour: EditBehaviour::Accept,
                edit_batches: Vec::new(),
            }),
        }
    }

    /// Fail the page request with this zero-based index.
    pub fn fail_on_page(self, index: usize) -> Self {
        self.lock().fail_on_page = Some(index);
        self
    }

    pub fn reject_edits(&self, description: impl Into<String>) {
        self.lock().edit_behaviour = EditBehaviour::Reject(description.into());
    }

    pub fn leave_edits_unconfirmed(&self) {
        self.lock().edit_behaviour = EditBehaviour::Unconfirmed;
    }

    pub fn accept_edits(&self) {
        self.lock().edit_behaviour = EditBehaviour::Accept;
    }

    pub fn page_requests(&self) -> usize {
        self.lock().page_requests
    }

    pub fn edit_batches(&self) -> Vec<Vec<AttributeUpdate>> {
        self.lock().edit_batches.clone()
    }

    pub fn record(&self, object_id: i64) -> Option<MeterRecord> {
        self.lock()
            .records
            .iter()
            .find(|r| r.object_id == object_id)
            .cloned()
    }

    /// Change a record behind the caller's back, as another editor would.
    pub fn set_account_update(&self, object_id: i64, value: Option<&str>) {
        if let Some(r) = self
            .lock()
            .records
            .iter_mut()
            .find(|r| r.object_id == object_id)
        {
            r.account_update = value.map(str::to_string);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl FeatureStore for InMemoryFeatureStore {
    async fn query_page(&self, request: PageRequest) -> Result<Vec<MeterRecord>> {
        let mut inner = self.lock();
        let index = inner.page_requests;
        inner.page_requests += 1;

        if inner.fail_on_page == Some(index) {
            return Err(FeatureStoreError::Network(format!(
                "simulated failure on page {index}"
            )));
        }

        Ok(inner
            .records
            .iter()
            .skip(request.offset)
            .take(request.count)
            .cloned()
            .collect())
    }

    async fn query_by_id(&self, object_id: i64) -> Result<Option<MeterRecord>> {
        Ok(self.record(object_id))
    }

    async fn apply_edits(&self, updates: &[AttributeUpdate]) -> Result<Vec<EditResult>> {
        let mut inner = self.lock();
        inner.edit_batches.push(updates.to_vec());
        let behaviour = inner.edit_behaviour.clone();

        let results = updates
            .iter()
            .map(|u| match &behaviour {
                EditBehaviour::Accept => {
                    if let Some(r) = inner.records.iter_mut().find(|r| r.object_id == u.object_id) {
                        r.account_update = u.account_update.clone();
                    }
                    EditResult {
                        object_id: Some(u.object_id),
                        success: true,
                        error: None,
                    }
                }
                EditBehaviour::Reject(description) => EditResult {
                    object_id: Some(u.object_id),
                    success: false,
                    error: Some(EditFailure {
                        code: Some(1000),
                        description: Some(description.clone()),
                    }),
                },
                EditBehaviour::Unconfirmed => EditResult {
                    object_id: Some(u.object_id),
                    success: false,
                    error: None,
                },
            })
            .collect();

        Ok(results)
    }

    async fn query_extent(&self) -> Result<Option<Extent>> {
        let inner = self.lock();
        Ok(Extent::around(inner.records.iter().filter_map(|r| r.location.as_ref())))
    }
}
