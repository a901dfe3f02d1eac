//! Geographic plausibility checks and coordinate repair
//!
//! - [`bounds`]: region-level bounding boxes for Taiwan
//! - [`tm2`]: TWD97 TM2 (EPSG:3826) to WGS84 inverse projection
//! - [`normalizer`]: the ordered rule list that classifies raw positions

pub mod bounds;
pub mod normalizer;
pub mod tm2;

pub use bounds::{looks_like_lnglat, looks_like_tm2, BoundingBox, TAIWAN_LNGLAT, TAIWAN_TM2};
pub use normalizer::{normalize, normalize_all, Axis, Classification, ConversionError, Rule, RULES};
pub use tm2::tm2_to_wgs84;
