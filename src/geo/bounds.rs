//! Region-level bounding boxes.
//!
//! These are plausibility gates, not coastlines: anything inside the box is
//! accepted as "somewhere in or near Taiwan".

/// Axis-aligned box over an (x, y) plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    /// Whether the edges themselves are inside
    pub inclusive: bool,
}

impl BoundingBox {
    /// NaN never falls inside any box.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if self.inclusive {
            (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
        } else {
            self.min_x < x && x < self.max_x && self.min_y < y && y < self.max_y
        }
    }
}

/// Taiwan and its outlying islands in WGS84 degrees (x = longitude, y = latitude).
pub const TAIWAN_LNGLAT: BoundingBox = BoundingBox {
    min_x: 118.0,
    max_x: 125.0,
    min_y: 20.0,
    max_y: 26.5,
    inclusive: false,
};

/// Typical TWD97 TM2 zone-121 extents in metres (x = easting, y = northing).
pub const TAIWAN_TM2: BoundingBox = BoundingBox {
    min_x: 100_000.0,
    max_x: 400_000.0,
    min_y: 2_000_000.0,
    max_y: 3_200_000.0,
    inclusive: true,
};

pub fn looks_like_lnglat(lng: f64, lat: f64) -> bool {
    TAIWAN_LNGLAT.contains(lng, lat)
}

pub fn looks_like_tm2(x: f64, y: f64) -> bool {
    TAIWAN_TM2.contains(x, y)
}
