use feature_client::MeterRecord;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Display colors for the meter layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub needs_update: String,
    pub updated: String,
    pub selected: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            needs_update: "#e53935".to_string(),
            updated: "#43a047".to_string(),
            selected: "#00e5ff".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    NeedsUpdate,
    Updated,
}

impl Classification {
    /// Empty or absent (after trimming) means the account still needs updating.
    pub fn of(record: &MeterRecord) -> Self {
        if record.needs_account_update() {
            Classification::NeedsUpdate
        } else {
            Classification::Updated
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::NeedsUpdate => "Needs account update",
            Classification::Updated => "Account updated",
        }
    }

    pub fn color<'a>(&self, palette: &'a Palette) -> &'a str {
        match self {
            Classification::NeedsUpdate => &palette.needs_update,
            Classification::Updated => &palette.updated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub updated: usize,
    pub needs_update: usize,
}

impl Summary {
    pub fn of(records: &[MeterRecord]) -> Self {
        let updated = records
            .iter()
            .filter(|r| Classification::of(r) == Classification::Updated)
            .count();
        Self {
            total: records.len(),
            updated,
            needs_update: records.len() - updated,
        }
    }

    /// Share of meters already updated, 0.0 for an empty layer.
    pub fn percent_updated(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.updated as f64 * 100.0 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub class: Classification,
    pub label: &'static str,
    pub color: String,
    pub count: usize,
}

/// The two-class rule the map front-end draws with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererView {
    pub field: String,
    pub default_color: String,
    pub selected_color: String,
    pub classes: Vec<LegendEntry>,
    pub summary: Summary,
}

impl RendererView {
    pub fn build(records: &[MeterRecord], palette: &Palette, field: &str) -> Self {
        let summary = Summary::of(records);
        let entry = |class: Classification, count: usize| LegendEntry {
            class,
            label: class.label(),
            color: class.color(palette).to_string(),
            count,
        };

        metrics::gauge!("meters_total").set(summary.total as f64);
        metrics::gauge!("meters_needing_update").set(summary.needs_update as f64);

        Self {
            field: field.to_string(),
            default_color: palette.needs_update.clone(),
            selected_color: palette.selected.clone(),
            classes: vec![
                entry(Classification::NeedsUpdate, summary.needs_update),
                entry(Classification::Updated, summary.updated),
            ],
            summary,
        }
    }

    pub fn color_for(&self, record: &MeterRecord) -> &str {
        let class = Classification::of(record);
        self.classes
            .iter()
            .find(|e| e.class == class)
            .map(|e| e.color.as_str())
            .unwrap_or(&self.default_color)
    }
}

/// GeoJSON layer of every located meter, pre-classified so the front-end only
/// paints `properties.color`.
pub fn feature_collection(records: &[MeterRecord], palette: &Palette) -> Value {
    let features: Vec<Value> = records
        .iter()
        .filter_map(|r| {
            let loc = r.location?;
            let class = Classification::of(r);
            Some(json!({
                "type": "Feature",
                "id": r.object_id,
                "geometry": { "type": "Point", "coordinates": [loc.x, loc.y] },
                "properties": {
                    "objectId": r.object_id,
                    "address": r.address,
                    "accountNumber": r.account_number,
                    "accountUpdate": r.account_update,
                    "status": class,
                    "color": class.color(palette),
                },
            }))
        })
        .collect();

    json!({ "type": "FeatureCollection", "features": features })
}
