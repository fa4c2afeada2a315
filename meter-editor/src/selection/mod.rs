use feature_client::{MeterRecord, Point};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use crate::classify::{Classification, Palette};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailField {
    pub label: &'static str,
    pub value: String,
}

/// The details panel: display fields are read-only, the account update is
/// the one editable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailForm {
    pub object_id: i64,
    pub read_only: Vec<DetailField>,
    pub account_update: String,
}

impl DetailForm {
    pub fn for_record(record: &MeterRecord) -> Self {
        let edit_date = record.edit_date.and_then(|d| d.format(&Rfc3339).ok());
        let candidates: [(&'static str, Option<&str>); 8] = [
            ("Address", record.address.as_deref()),
            ("Account Number", record.account_number.as_deref()),
            ("Customer Name", record.customer_name.as_deref()),
            ("Customer Account Number", record.customer_account_number.as_deref()),
            ("Class", record.class.as_deref()),
            ("Type", record.meter_type.as_deref()),
            ("Last Edited", edit_date.as_deref()),
            ("Edited By", record.editor.as_deref()),
        ];

        Self {
            object_id: record.object_id,
            read_only: candidates
                .into_iter()
                .filter_map(|(label, value)| {
                    value.map(|v| DetailField {
                        label,
                        value: v.to_string(),
                    })
                })
                .collect(),
            account_update: record.account_update.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub object_id: i64,
    pub location: Option<Point>,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoomTarget {
    pub center: Point,
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedMeter {
    pub record: MeterRecord,
    pub status: Classification,
    pub highlight: Highlight,
    pub form: DetailForm,
    pub zoom: Option<ZoomTarget>,
}

impl SelectedMeter {
    fn new(record: MeterRecord, palette: &Palette, zoom_scale: f64) -> Self {
        Self {
            status: Classification::of(&record),
            highlight: Highlight {
                object_id: record.object_id,
                location: record.location,
                color: palette.selected.clone(),
            },
            form: DetailForm::for_record(&record),
            zoom: record.location.map(|center| ZoomTarget {
                center,
                scale: zoom_scale,
            }),
            record,
        }
    }
}

/// At most one meter is selected; it alone carries a highlight.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Selection {
    selected: Option<SelectedMeter>,
}

impl Selection {
    /// Select `record`, replacing (and un-highlighting) any current selection.
    pub fn select(
        &mut self,
        record: MeterRecord,
        palette: &Palette,
        zoom_scale: f64,
    ) -> &SelectedMeter {
        self.selected.insert(SelectedMeter::new(record, palette, zoom_scale))
    }

    /// Back to idle. Returns the id that was selected, if any.
    pub fn close(&mut self) -> Option<i64> {
        self.selected.take().map(|s| s.record.object_id)
    }

    pub fn is_idle(&self) -> bool {
        self.selected.is_none()
    }

    pub fn current(&self) -> Option<&SelectedMeter> {
        self.selected.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut SelectedMeter> {
        self.selected.as_mut()
    }

    pub fn selected_id(&self) -> Option<i64> {
        self.current().map(|s| s.record.object_id)
    }

    pub fn highlights(&self) -> Vec<&Highlight> {
        self.current().map(|s| &s.highlight).into_iter().collect()
    }
}

/// Nearest located meter within `tolerance` map units of the click. Ties go
/// to the earlier record.
pub fn hit_test(records: &[MeterRecord], x: f64, y: f64, tolerance: f64) -> Option<&MeterRecord> {
    records
        .iter()
        .filter_map(|r| r.location.map(|loc| (r, loc.distance_to(x, y))))
        .filter(|(_, d)| *d <= tolerance)
        .fold(None, |best: Option<(&MeterRecord, f64)>, (r, d)| match best {
            Some((_, bd)) if bd <= d => best,
            _ => Some((r, d)),
        })
        .map(|(r, _)| r)
}
