use std::{collections::HashSet, pin::Pin, sync::Arc, time::Instant};

use async_stream::try_stream;
use feature_client::{FeatureStore, FeatureStoreError, MeterRecord, PageRequest};
use futures::{Stream, StreamExt};

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("page {page} failed: {source}")]
    Page {
        page: usize,
        #[source]
        source: FeatureStoreError,
    },
    #[error("duplicate meter id {0} in feature service response")]
    DuplicateId(i64),
    #[error("page size must be greater than zero")]
    ZeroPageSize,
}

pub type PageStream = Pin<Box<dyn Stream<Item = Result<Vec<MeterRecord>, LoadError>> + Send>>;

/// Reads every meter from the feature service, one fixed-size page at a time,
/// so a server-side record cap smaller than the layer never truncates the load.
pub struct BulkLoader {
    store: Arc<dyn FeatureStore>,
    page_size: usize,
    where_clause: String,
}

impl BulkLoader {
    pub fn new(
        store: Arc<dyn FeatureStore>,
        page_size: usize,
        where_clause: impl Into<String>,
    ) -> Self {
        Self {
            store,
            page_size,
            where_clause: where_clause.into(),
        }
    }

    /// Pages in request order. The stream ends after the first page holding
    /// fewer than `page_size` records (an empty page included).
    pub fn pages(&self) -> PageStream {
        let store = self.store.clone();
        let page_size = self.page_size;
        let where_clause = self.where_clause.clone();

        if page_size == 0 {
            return Box::pin(futures::stream::iter([Err(LoadError::ZeroPageSize)]));
        }

        pin_pages(try_stream! {
            let mut page = 0usize;
            loop {
                let request = PageRequest {
                    where_clause: where_clause.clone(),
                    offset: page * page_size,
                    count: page_size,
                };
                let records = store
                    .query_page(request)
                    .await
                    .map_err(|source| LoadError::Page { page, source })?;

                metrics::counter!("meter_load_pages_total").increment(1);
                tracing::debug!(page, returned = records.len(), "meter page loaded");

                let last = records.len() < page_size;
                yield records;
                if last {
                    break;
                }
                page += 1;
            }
        })
    }

    /// Materialise the whole layer. Any failed page fails the load; nothing
    /// partial is returned.
    pub async fn load_all(&self) -> Result<Vec<MeterRecord>, LoadError> {
        let started = Instant::now();
        let mut pages = self.pages();
        let mut records = Vec::new();
        let mut seen = HashSet::new();

        while let Some(page) = pages.next().await {
            for record in page? {
                if !seen.insert(record.object_id) {
                    return Err(LoadError::DuplicateId(record.object_id));
                }
                records.push(record);
            }
        }

        metrics::counter!("meter_load_records_total").increment(records.len() as u64);
        metrics::histogram!("meter_load_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            records = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "meter layer loaded"
        );

        Ok(records)
    }
}

fn pin_pages<S>(s: S) -> PageStream
where
    S: Stream<Item = Result<Vec<MeterRecord>, LoadError>> + Send + 'static,
{
    Box::pin(s)
}
