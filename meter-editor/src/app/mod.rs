mod state;

pub use state::{AppState, LoadStatus};

use std::sync::Arc;

use feature_client::{Extent, FeatureStore, FeatureStoreError, MeterRecord};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::classify::{self, Classification, RendererView, Summary};
use crate::config::AppConfig;
use crate::edit::{EditError, EditSubmitter};
use crate::loader::{BulkLoader, LoadError};
use crate::notice::Notice;
use crate::search::{self, SearchOutcome};
use crate::selection::{self, SelectedMeter, Selection};

#[derive(thiserror::Error, Debug)]
pub enum EditorError {
    #[error("meters are still loading")]
    Loading,
    #[error("meter data is unavailable: {0}")]
    Unavailable(String),
    #[error("meter {0} not found")]
    UnknownMeter(i64),
    #[error("no meter is selected")]
    NoSelection,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Store(#[from] FeatureStoreError),
}

impl EditorError {
    /// What the user sees. The full error goes to the log.
    pub fn notice(&self) -> Notice {
        match self {
            EditorError::Loading => Notice::info("Meters are still loading."),
            EditorError::Unavailable(message) => Notice::error(message.clone()),
            EditorError::UnknownMeter(id) => Notice::warning(format!("Meter {id} was not found.")),
            EditorError::NoSelection => Notice::warning("Select a meter first."),
            EditorError::Load(_) => Notice::error(LOAD_FAILED),
            EditorError::Edit(EditError::Rejected { message, .. }) => {
                Notice::error(format!("Save failed: {message}"))
            }
            EditorError::Edit(EditError::Store(_)) => {
                Notice::error("Save failed: the feature service could not be reached.")
            }
            EditorError::Store(_) => Notice::error("The feature service request failed."),
        }
    }
}

const LOAD_FAILED: &str = "Unable to load meters from the feature service.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    pub object_id: i64,
    pub account_update: Option<String>,
    pub status: Classification,
    pub summary: Summary,
    pub selection: Selection,
    pub notice: Notice,
}

/// Owns the loaded meters, the current selection and the renderer, and is the
/// only path by which any of them change.
pub struct MeterEditor {
    store: Arc<dyn FeatureStore>,
    config: AppConfig,
    submitter: EditSubmitter,
    state: RwLock<AppState>,
    reloading: Mutex<()>,
}

impl MeterEditor {
    pub fn new(store: Arc<dyn FeatureStore>, config: AppConfig) -> Self {
        Self {
            store,
            submitter: EditSubmitter::new(config.editor.normalize_empty_to_null),
            config,
            state: RwLock::new(AppState::default()),
            reloading: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn account_update_field(&self) -> &str {
        &self.config.feature_service.fields.account_update
    }

    pub async fn initialize(&self) -> Result<Summary, EditorError> {
        self.reload().await
    }

    /// Load the whole layer and rebuild the renderer. A failure leaves the
    /// editor in `Failed` with no data rather than a partial collection.
    ///
    /// Reloads run one at a time, so the outcome is always that of the last
    /// one to start.
    pub async fn reload(&self) -> Result<Summary, EditorError> {
        let _reloading = self.reloading.lock().await;
        self.state.write().await.begin_load();

        let fs = &self.config.feature_service;
        let loader = BulkLoader::new(self.store.clone(), fs.page_size, fs.where_clause.clone());

        match loader.load_all().await {
            Ok(records) => {
                let mut state = self.state.write().await;
                state.finish_load(records, &self.config.palette, self.account_update_field());
                let summary = state.summary();
                tracing::info!(
                    total = summary.total,
                    needs_update = summary.needs_update,
                    "meter editor ready"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "meter load failed");
                self.state.write().await.fail_load(LOAD_FAILED);
                Err(e.into())
            }
        }
    }

    pub async fn status(&self) -> LoadStatus {
        self.state.read().await.status().clone()
    }

    pub async fn search(&self, query: &str) -> Result<SearchOutcome, EditorError> {
        metrics::counter!("meter_search_requests_total").increment(1);
        let state = self.state.read().await;
        let records = match state.ready() {
            Ok(records) => records,
            Err(EditorError::Loading) => &[],
            Err(e) => return Err(e),
        };
        Ok(search::search(records, query, &self.config.search))
    }

    pub async fn find(&self, object_id: i64) -> Result<MeterRecord, EditorError> {
        let state = self.state.read().await;
        state.ready()?;
        state
            .record(object_id)
            .cloned()
            .ok_or(EditorError::UnknownMeter(object_id))
    }

    pub async fn records(&self) -> Result<Vec<MeterRecord>, EditorError> {
        Ok(self.state.read().await.ready()?.to_vec())
    }

    /// Select a meter by id, replacing any current selection.
    pub async fn select_by_id(&self, object_id: i64) -> Result<SelectedMeter, EditorError> {
        let record = if self.config.selection.refetch_on_select {
            self.state.read().await.ready()?;
            self.store
                .query_by_id(object_id)
                .await?
                .ok_or(EditorError::UnknownMeter(object_id))?
        } else {
            self.find(object_id).await?
        };

        let mut state = self.state.write().await;
        let previous = state.selection().selected_id();
        let selected = state.selection_mut().select(
            record,
            &self.config.palette,
            self.config.selection.zoom_scale,
        );
        tracing::debug!(object_id, previous = ?previous, "meter selected");
        Ok(selected.clone())
    }

    /// Select whatever meter lies under a map click. A miss, or a lookup that
    /// fails, selects nothing.
    pub async fn select_at(&self, x: f64, y: f64) -> Result<Option<SelectedMeter>, EditorError> {
        let hit = {
            let state = self.state.read().await;
            let records = state.ready()?;
            let tolerance = self.config.selection.hit_tolerance;
            selection::hit_test(records, x, y, tolerance).map(|r| r.object_id)
        };

        let Some(object_id) = hit else {
            tracing::debug!(x, y, "map click hit no meter");
            return Ok(None);
        };

        match self.select_by_id(object_id).await {
            Ok(selected) => Ok(Some(selected)),
            Err(e @ (EditorError::Store(_) | EditorError::UnknownMeter(_))) => {
                tracing::warn!(error = %e, object_id, "map click selection failed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn close_selection(&self) -> Option<i64> {
        self.state.write().await.selection_mut().close()
    }

    pub async fn selection(&self) -> Selection {
        self.state.read().await.selection().clone()
    }

    /// Save a new account update for the selected meter.
    ///
    /// The target id is fixed before the request goes out; if the user picks
    /// another meter meanwhile, the result still lands on the original record
    /// and the newer selection is left as it is.
    pub async fn submit_edit(&self, raw_value: &str) -> Result<EditOutcome, EditorError> {
        let object_id = {
            let mut state = self.state.write().await;
            let selected = state.selection_mut().current_mut().ok_or(EditorError::NoSelection)?;
            selected.form.account_update = raw_value.trim().to_string();
            selected.record.object_id
        };

        let update = self
            .submitter
            .submit(self.store.as_ref(), object_id, raw_value)
            .await?;

        let mut state = self.state.write().await;
        let patched = state
            .patch_account_update(object_id, update.account_update.clone())
            .cloned();
        state.rebuild_renderer(&self.config.palette, self.account_update_field());

        if state.selection().selected_id() == Some(object_id) {
            match patched {
                Some(record) if self.config.editor.keep_panel_open_after_save => {
                    state.selection_mut().select(
                        record,
                        &self.config.palette,
                        self.config.selection.zoom_scale,
                    );
                }
                _ => {
                    state.selection_mut().close();
                }
            }
        }

        let status = match state.record(object_id) {
            Some(r) => Classification::of(r),
            None if update.account_update.as_deref().is_some_and(|v| !v.trim().is_empty()) => {
                Classification::Updated
            }
            None => Classification::NeedsUpdate,
        };

        Ok(EditOutcome {
            object_id,
            account_update: update.account_update,
            status,
            summary: state.summary(),
            selection: state.selection().clone(),
            notice: Notice::success("Account update saved."),
        })
    }

    pub async fn renderer(&self) -> Result<RendererView, EditorError> {
        let state = self.state.read().await;
        state.ready()?;
        match state.renderer() {
            Some(r) => Ok(r.clone()),
            None => Ok(RendererView::build(
                &[],
                &self.config.palette,
                self.account_update_field(),
            )),
        }
    }

    pub async fn summary(&self) -> Result<Summary, EditorError> {
        let state = self.state.read().await;
        state.ready()?;
        Ok(state.summary())
    }

    /// GeoJSON of all located meters, colored by classification.
    pub async fn layer(&self) -> Result<Value, EditorError> {
        let state = self.state.read().await;
        Ok(classify::feature_collection(state.ready()?, &self.config.palette))
    }

    /// Bounding region for the reset-view control. Falls back to the loaded
    /// meters when the service cannot answer.
    pub async fn extent(&self) -> Result<Option<Extent>, EditorError> {
        match self.store.query_extent().await {
            Ok(Some(extent)) => Ok(Some(extent)),
            Ok(None) => Ok(self.local_extent().await),
            Err(e) => {
                tracing::warn!(error = %e, "extent query failed, using loaded meters");
                Ok(self.local_extent().await)
            }
        }
    }

    async fn local_extent(&self) -> Option<Extent> {
        let state = self.state.read().await;
        let records = state.ready().ok()?;
        Extent::around(records.iter().filter_map(|r| r.location.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use feature_client::memory::InMemoryFeatureStore;
    use feature_client::{AttributeUpdate, EditResult, PageRequest, Point, SpatialReference};
    use tokio::sync::Notify;

    fn meter(id: i64, address: &str, account_update: Option<&str>) -> MeterRecord {
        let mut r = MeterRecord::new(id);
        r.address = Some(address.to_string());
        r.account_number = Some(format!("ACC-{id}"));
        r.account_update = account_update.map(str::to_string);
        r.location = Some(Point::new(id as f64, id as f64, SpatialReference::WGS84));
        r
    }

    fn fixture() -> Vec<MeterRecord> {
        vec![
            meter(41, "9 Oak Ave", Some("Moved in 2023")),
            meter(42, "123 Main St", None),
            meter(43, "77 Main St", Some("")),
        ]
    }

    async fn ready_editor(config: AppConfig) -> (Arc<InMemoryFeatureStore>, MeterEditor) {
        let store = Arc::new(InMemoryFeatureStore::new(fixture()));
        let editor = MeterEditor::new(store.clone(), config);
        editor.initialize().await.expect("load succeeds");
        (store, editor)
    }

    fn config() -> AppConfig {
        AppConfig::for_layer("https://example.com/FeatureServer/0")
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Gate {
        FirstPage,
        Edits,
    }

    /// Holds one kind of call open until `release` is notified. `entered` fires
    /// when a call reaches the gate.
    struct GatedStore {
        inner: InMemoryFeatureStore,
        gate: Gate,
        used: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl GatedStore {
        fn new(inner: InMemoryFeatureStore, gate: Gate) -> Self {
            Self {
                inner,
                gate,
                used: AtomicBool::new(false),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }

        async fn hold(&self) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    #[async_trait::async_trait]
    impl FeatureStore for GatedStore {
        async fn query_page(
            &self,
            request: PageRequest,
        ) -> feature_client::Result<Vec<MeterRecord>> {
            let page = self.inner.query_page(request).await;
            if self.gate == Gate::FirstPage && !self.used.swap(true, Ordering::SeqCst) {
                self.hold().await;
            }
            page
        }

        async fn query_by_id(&self, object_id: i64) -> feature_client::Result<Option<MeterRecord>> {
            self.inner.query_by_id(object_id).await
        }

        async fn apply_edits(
            &self,
            updates: &[AttributeUpdate],
        ) -> feature_client::Result<Vec<EditResult>> {
            if self.gate == Gate::Edits {
                self.hold().await;
            }
            self.inner.apply_edits(updates).await
        }

        async fn query_extent(&self) -> feature_client::Result<Option<Extent>> {
            self.inner.query_extent().await
        }
    }

    #[tokio::test]
    async fn search_before_load_reports_loading() {
        let store = Arc::new(InMemoryFeatureStore::new(fixture()));
        let editor = MeterEditor::new(store, config());

        assert_eq!(editor.search("main").await.expect("search"), SearchOutcome::Loading);
        assert!(matches!(editor.status().await, LoadStatus::Loading));
    }

    #[tokio::test]
    async fn failed_load_leaves_editor_unusable_but_alive() {
        let store = Arc::new(InMemoryFeatureStore::new(fixture()).fail_on_page(0));
        let editor = MeterEditor::new(store, config());

        assert!(matches!(editor.initialize().await, Err(EditorError::Load(_))));
        assert!(matches!(editor.status().await, LoadStatus::Failed { .. }));
        assert!(matches!(editor.search("main").await, Err(EditorError::Unavailable(_))));
        assert!(matches!(editor.select_by_id(42).await, Err(EditorError::Unavailable(_))));
    }

    #[tokio::test]
    async fn search_finds_main_street_in_collection_order() {
        let (_, editor) = ready_editor(config()).await;

        let outcome = editor.search("Main").await.expect("search");
        let ids: Vec<i64> = outcome.hits().iter().map(|h| h.object_id).collect();
        assert_eq!(ids, vec![42, 43]);
    }

    #[tokio::test]
    async fn selecting_another_meter_replaces_the_first() {
        let (_, editor) = ready_editor(config()).await;

        editor.select_by_id(41).await.expect("select 41");
        let selected = editor.select_by_id(42).await.expect("select 42");
        assert_eq!(selected.form.object_id, 42);
        assert_eq!(selected.form.account_update, "");

        let selection = editor.selection().await;
        assert_eq!(selection.highlights().len(), 1);
        assert_eq!(selection.selected_id(), Some(42));
    }

    #[tokio::test]
    async fn accepted_edit_patches_collection_and_reclassifies() {
        let (store, editor) = ready_editor(config()).await;
        assert_eq!(editor.summary().await.expect("summary").needs_update, 2);

        editor.select_by_id(42).await.expect("select");
        let outcome = editor.submit_edit("Updated 2024").await.expect("accepted");

        assert_eq!(outcome.status, Classification::Updated);
        assert_eq!(outcome.summary.needs_update, 1);
        assert!(outcome.selection.is_idle());

        let record = editor.find(42).await.expect("record");
        assert_eq!(record.account_update.as_deref(), Some("Updated 2024"));
        assert_eq!(Classification::of(&record), Classification::Updated);
        assert_eq!(store.edit_batches().len(), 1);
        assert_eq!(store.edit_batches()[0].len(), 1);
    }

    #[tokio::test]
    async fn accepted_edit_can_keep_the_panel_open() {
        let mut cfg = config();
        cfg.editor.keep_panel_open_after_save = true;
        let (_, editor) = ready_editor(cfg).await;

        editor.select_by_id(42).await.expect("select");
        let outcome = editor.submit_edit(" Updated 2024 ").await.expect("accepted");

        let selected = outcome.selection.current().expect("still selected");
        assert_eq!(selected.record.object_id, 42);
        assert_eq!(selected.form.account_update, "Updated 2024");
        assert_eq!(selected.status, Classification::Updated);
    }

    #[tokio::test]
    async fn rejected_edit_keeps_form_and_collection() {
        let (store, editor) = ready_editor(config()).await;
        store.reject_edits("Record is locked.");

        editor.select_by_id(42).await.expect("select");
        let err = editor.submit_edit("Updated 2024").await.expect_err("rejected");
        assert_eq!(err.notice().message, "Save failed: Record is locked.");

        let record = editor.find(42).await.expect("record");
        assert_eq!(record.account_update, None);

        let selection = editor.selection().await;
        let selected = selection.current().expect("form still open");
        assert_eq!(selected.form.account_update, "Updated 2024");
        assert_eq!(editor.summary().await.expect("summary").needs_update, 2);
    }

    #[tokio::test]
    async fn clearing_a_value_sends_null_and_reclassifies_as_needing_update() {
        let (store, editor) = ready_editor(config()).await;

        editor.select_by_id(41).await.expect("select");
        let outcome = editor.submit_edit("   ").await.expect("accepted");

        assert_eq!(outcome.account_update, None);
        assert_eq!(outcome.status, Classification::NeedsUpdate);
        assert_eq!(store.edit_batches()[0][0].account_update, None);
    }

    #[tokio::test]
    async fn submit_without_selection_is_an_error() {
        let (store, editor) = ready_editor(config()).await;
        assert!(matches!(editor.submit_edit("x").await, Err(EditorError::NoSelection)));
        assert!(store.edit_batches().is_empty());
    }

    #[tokio::test]
    async fn map_click_selects_nearest_meter_or_nothing() {
        let (_, editor) = ready_editor(config()).await;

        let hit = editor.select_at(42.0002, 42.0).await.expect("hit test");
        assert_eq!(hit.map(|s| s.record.object_id), Some(42));

        let miss = editor.select_at(100.0, 100.0).await.expect("hit test");
        assert!(miss.is_none());
        assert_eq!(editor.selection().await.selected_id(), Some(42));
    }

    #[tokio::test]
    async fn refetch_on_select_reads_the_service_copy() {
        let mut cfg = config();
        cfg.selection.refetch_on_select = true;
        let (store, editor) = ready_editor(cfg).await;
        store.set_account_update(42, Some("Changed elsewhere"));

        let selected = editor.select_by_id(42).await.expect("select");
        assert_eq!(selected.form.account_update, "Changed elsewhere");
        // The loaded collection is only patched by this editor's own saves.
        assert_eq!(editor.find(42).await.expect("record").account_update, None);
    }

    #[tokio::test]
    async fn extent_covers_loaded_meters() {
        let (_, editor) = ready_editor(config()).await;
        let extent = editor.extent().await.expect("extent").expect("some");
        assert_eq!((extent.xmin, extent.xmax), (41.0, 43.0));
    }

    #[tokio::test]
    async fn renderer_is_stable_between_calls() {
        let (_, editor) = ready_editor(config()).await;
        let a = editor.renderer().await.expect("renderer");
        let b = editor.renderer().await.expect("renderer");
        assert_eq!(a, b);
        assert_eq!(a.summary.total, 3);
    }

    #[tokio::test]
    async fn save_lands_on_original_meter_when_selection_moves_mid_flight() {
        let store = Arc::new(GatedStore::new(InMemoryFeatureStore::new(fixture()), Gate::Edits));
        let editor = Arc::new(MeterEditor::new(store.clone(), config()));
        editor.initialize().await.expect("load succeeds");

        editor.select_by_id(42).await.expect("select 42");
        let saving = {
            let editor = editor.clone();
            tokio::spawn(async move { editor.submit_edit("Updated 2024").await })
        };
        store.entered.notified().await;

        editor.select_by_id(41).await.expect("select 41");
        store.release.notify_one();
        let outcome = saving.await.expect("join").expect("accepted");

        assert_eq!(outcome.object_id, 42);
        assert_eq!(outcome.selection.selected_id(), Some(41));
        assert_eq!(editor.selection().await.selected_id(), Some(41));

        let saved = editor.find(42).await.expect("record");
        assert_eq!(saved.account_update.as_deref(), Some("Updated 2024"));
        let untouched = editor.find(41).await.expect("record");
        assert_eq!(untouched.account_update.as_deref(), Some("Moved in 2023"));
        let form = editor.selection().await.current().map(|s| s.form.account_update.clone());
        assert_eq!(form.as_deref(), Some("Moved in 2023"));
    }

    #[tokio::test]
    async fn overlapping_reloads_finish_with_the_later_result() {
        let inner = InMemoryFeatureStore::new(fixture()).fail_on_page(0);
        let store = Arc::new(GatedStore::new(inner, Gate::FirstPage));
        let editor = Arc::new(MeterEditor::new(store.clone(), config()));

        let first = {
            let editor = editor.clone();
            tokio::spawn(async move { editor.initialize().await })
        };
        store.entered.notified().await;

        let second = {
            let editor = editor.clone();
            tokio::spawn(async move { editor.reload().await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        store.release.notify_one();

        assert!(first.await.expect("join").is_err());
        let summary = second.await.expect("join").expect("second reload succeeds");
        assert_eq!(summary.total, 3);
        assert!(matches!(editor.status().await, LoadStatus::Ready { count: 3, .. }));
    }

    #[tokio::test]
    async fn reload_closes_the_selection() {
        let (_, editor) = ready_editor(config()).await;
        editor.select_by_id(42).await.expect("select");

        editor.reload().await.expect("reload");
        assert!(editor.selection().await.is_idle());
    }
}
