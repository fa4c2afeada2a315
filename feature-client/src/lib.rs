pub mod domain;
pub mod error;
pub mod rest;
pub mod store;
mod wire;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use domain::{Extent, FieldMap, MeterRecord, Point, SpatialReference};
pub use error::{FeatureStoreError, Result};
pub use rest::ArcGisFeatureStore;
pub use store::{AttributeUpdate, EditFailure, EditResult, FeatureStore, PageRequest};
