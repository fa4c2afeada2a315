use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialReference {
    pub wkid: Option<u32>,
    pub latest_wkid: Option<u32>,
}

impl SpatialReference {
    pub const WGS84: SpatialReference = SpatialReference {
        wkid: Some(4326),
        latest_wkid: Some(4326),
    };
}

/// A meter location as returned by the feature service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub spatial_reference: SpatialReference,
}

impl Point {
    pub fn new(x: f64, y: f64, spatial_reference: SpatialReference) -> Self {
        Self {
            x,
            y,
            spatial_reference,
        }
    }

    /// Planar distance in map units. Only meaningful between points that share
    /// a spatial reference.
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    #[serde(default)]
    pub spatial_reference: SpatialReference,
}

impl Extent {
    pub fn is_finite(&self) -> bool {
        [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Bounding box of the given points, `None` when there are none.
    pub fn around<'a, I>(points: I) -> Option<Extent>
    where
        I: IntoIterator<Item = &'a Point>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut extent = Extent {
            xmin: first.x,
            ymin: first.y,
            xmax: first.x,
            ymax: first.y,
            spatial_reference: first.spatial_reference,
        };
        for p in iter {
            extent.xmin = extent.xmin.min(p.x);
            extent.ymin = extent.ymin.min(p.y);
            extent.xmax = extent.xmax.max(p.x);
            extent.ymax = extent.ymax.max(p.y);
        }
        Some(extent)
    }
}
