//! JSON shapes of the ArcGIS REST feature-layer endpoints.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::{Extent, FieldMap, MeterRecord, Point, SpatialReference};
use crate::error::{FeatureStoreError, Result};
use crate::store::{EditFailure, EditResult};

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    code: Option<i64>,
    message: Option<String>,
    #[serde(default)]
    details: Vec<String>,
}

impl From<ServiceErrorBody> for FeatureStoreError {
    fn from(body: ServiceErrorBody) -> Self {
        let mut message = body.message.unwrap_or_else(|| "unknown error".to_string());
        if !body.details.is_empty() {
            message = format!("{message} ({})", body.details.join("; "));
        }
        FeatureStoreError::Service {
            code: body.code.unwrap_or_default(),
            message,
        }
    }
}

/// Decode a response body, surfacing the in-band `error` object that the
/// service returns with an HTTP 200.
pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    let value: Value = serde_json::from_str(body)?;
    if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
        let err: ServiceErrorBody = serde_json::from_value(err.clone())?;
        return Err(err.into());
    }
    Ok(serde_json::from_value(value)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryResponse {
    #[serde(default)]
    features: Vec<WireFeature>,
    spatial_reference: Option<SpatialReference>,
}

#[derive(Debug, Deserialize)]
struct WireFeature {
    #[serde(default)]
    attributes: Map<String, Value>,
    geometry: Option<WireGeometry>,
}

#[derive(Debug, Deserialize)]
struct WireGeometry {
    x: Option<Value>,
    y: Option<Value>,
}

impl QueryResponse {
    pub(crate) fn into_records(self, fields: &FieldMap) -> Result<Vec<MeterRecord>> {
        let sr = self.spatial_reference.unwrap_or_default();
        self.features
            .into_iter()
            .map(|f| {
                let location = f.geometry.and_then(|g| {
                    let x = g.x.as_ref().and_then(Value::as_f64)?;
                    let y = g.y.as_ref().and_then(Value::as_f64)?;
                    Some(Point::new(x, y, sr))
                });
                MeterRecord::from_attributes(&f.attributes, location, fields)
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtentResponse {
    extent: Option<Value>,
}

impl ExtentResponse {
    /// Empty layers report `"NaN"` bounds; those become `None`.
    pub(crate) fn into_extent(self) -> Option<Extent> {
        let extent: Extent = serde_json::from_value(self.extent?).ok()?;
        extent.is_finite().then_some(extent)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApplyEditsResponse {
    #[serde(default)]
    update_results: Vec<WireEditResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEditResult {
    object_id: Option<i64>,
    success: Option<bool>,
    error: Option<WireEditError>,
}

#[derive(Debug, Deserialize)]
struct WireEditError {
    code: Option<i64>,
    description: Option<String>,
}

impl ApplyEditsResponse {
    pub(crate) fn into_results(self) -> Vec<EditResult> {
        self.update_results
            .into_iter()
            .map(|r| EditResult {
                object_id: r.object_id,
                success: r.success == Some(true),
                error: r.error.map(|e| EditFailure {
                    code: e.code,
                    description: e.description,
                }),
            })
            .collect()
    }
}
