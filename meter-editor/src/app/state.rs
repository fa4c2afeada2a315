use std::collections::HashMap;

use feature_client::MeterRecord;
use serde::Serialize;
use time::OffsetDateTime;

use super::EditorError;
use crate::classify::{Palette, RendererView, Summary};
use crate::selection::Selection;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStatus {
    Loading,
    Ready {
        #[serde(with = "time::serde::rfc3339")]
        loaded_at: OffsetDateTime,
        count: usize,
    },
    Failed {
        message: String,
    },
}

/// Everything the editor mutates. Only [`super::MeterEditor`] holds one, behind
/// a lock, and all changes go through these methods.
#[derive(Debug)]
pub struct AppState {
    status: LoadStatus,
    records: Vec<MeterRecord>,
    positions: HashMap<i64, usize>,
    renderer: Option<RendererView>,
    selection: Selection,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            status: LoadStatus::Loading,
            records: Vec::new(),
            positions: HashMap::new(),
            renderer: None,
            selection: Selection::default(),
        }
    }
}

impl AppState {
    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn begin_load(&mut self) {
        self.status = LoadStatus::Loading;
    }

    /// Swap in a freshly loaded collection. Ids must already be unique.
    pub fn finish_load(&mut self, records: Vec<MeterRecord>, palette: &Palette, field: &str) {
        self.positions = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.object_id, i))
            .collect();
        self.records = records;
        self.selection.close();
        self.rebuild_renderer(palette, field);
        self.status = LoadStatus::Ready {
            loaded_at: OffsetDateTime::now_utc(),
            count: self.records.len(),
        };
    }

    /// Drop all data; nothing partially loaded stays visible.
    pub fn fail_load(&mut self, message: impl Into<String>) {
        self.records.clear();
        self.positions.clear();
        self.renderer = None;
        self.selection.close();
        self.status = LoadStatus::Failed {
            message: message.into(),
        };
    }

    /// The collection, if a load has completed.
    pub fn ready(&self) -> Result<&[MeterRecord], EditorError> {
        match &self.status {
            LoadStatus::Ready { .. } => Ok(&self.records),
            LoadStatus::Loading => Err(EditorError::Loading),
            LoadStatus::Failed { message } => Err(EditorError::Unavailable(message.clone())),
        }
    }

    pub fn record(&self, object_id: i64) -> Option<&MeterRecord> {
        self.positions
            .get(&object_id)
            .and_then(|&i| self.records.get(i))
    }

    /// Patch one record in place. Returns the patched record, or `None` when
    /// the id is not in the collection.
    pub fn patch_account_update(
        &mut self,
        object_id: i64,
        value: Option<String>,
    ) -> Option<&MeterRecord> {
        let i = *self.positions.get(&object_id)?;
        let record = self.records.get_mut(i)?;
        record.account_update = value;
        Some(&*record)
    }

    pub fn rebuild_renderer(&mut self, palette: &Palette, field: &str) {
        self.renderer = Some(RendererView::build(&self.records, palette, field));
    }

    pub fn renderer(&self) -> Option<&RendererView> {
        self.renderer.as_ref()
    }

    pub fn summary(&self) -> Summary {
        self.renderer
            .as_ref()
            .map(|r| r.summary)
            .unwrap_or_else(|| Summary::of(&self.records))
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }
}
