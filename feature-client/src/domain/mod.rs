pub mod field_map;
pub mod geometry;
pub mod meter_record;

pub use field_map::FieldMap;
pub use geometry::{Extent, Point, SpatialReference};
pub use meter_record::MeterRecord;
