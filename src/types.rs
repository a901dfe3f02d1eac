//! Core record types for the disposal-site dataset
//!
//! - [`RawRecord`]: one site exactly as the upstream service returns it
//! - [`NormalizedRecord`]: a raw record plus its resolved WGS84 position
//! - [`CoordStatus`]: how that position was derived
//! - [`Snapshot`]: the published result of one refresh cycle

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Raw upstream record
// ============================================================================

/// One disposal-site entry as received from the upstream service.
///
/// Scalars are kept as raw JSON values: upstream sends some numeric fields as
/// numbers and others as text, and the spreadsheet must preserve whichever
/// type arrived. `null` and missing keys both deserialize to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: Option<Value>,

    /// Site name
    #[serde(default)]
    pub dumpname: Option<Value>,

    #[serde(default)]
    pub city: Option<Value>,

    /// Site type
    #[serde(default)]
    pub typename: Option<Value>,

    /// Flow-control code
    #[serde(default, rename = "controlId")]
    pub control_id: Option<Value>,

    /// Declaration date
    #[serde(default)]
    pub applydate: Option<Value>,

    /// Remaining B1~B7 fill capacity (m³)
    #[serde(default)]
    pub remain: Option<Value>,

    /// Approved B1~B7 fill capacity (m³)
    #[serde(default)]
    pub maxbury: Option<Value>,

    /// Area (hectares)
    #[serde(default)]
    pub area: Option<Value>,

    /// Raw position, unit and axis order unknown
    #[serde(default)]
    pub x: Option<Value>,

    #[serde(default)]
    pub y: Option<Value>,
}

impl RawRecord {
    /// Build a record carrying only a name and a raw position.
    pub fn with_position(name: &str, x: Value, y: Value) -> Self {
        Self {
            dumpname: Some(Value::String(name.to_string())),
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }
}

/// Render an optional scalar the way it should appear in free text:
/// strings unquoted, numbers in JSON notation, missing as empty.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ============================================================================
// Coordinate status
// ============================================================================

/// How a record's canonical (longitude, latitude) pair was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordStatus {
    /// `(x, y)` was already a Taiwan-region lng/lat pair
    AsIs,
    /// `(y, x)` was a Taiwan-region lng/lat pair
    Swapped,
    /// `(x, y)` was a TWD97 TM2 pair, reprojected
    Projected,
    /// `(y, x)` was a TWD97 TM2 pair, reprojected
    SwappedAndProjected,
    /// No hypothesis produced a plausible position
    Anomalous,
    /// The raw values could not be read as numbers
    ConversionError,
}

impl CoordStatus {
    pub const ALL: [Self; 6] = [
        Self::AsIs,
        Self::Swapped,
        Self::Projected,
        Self::SwappedAndProjected,
        Self::Anomalous,
        Self::ConversionError,
    ];

    /// Localized label shown in the spreadsheet and overlay.
    pub const fn label(self) -> &'static str {
        match self {
            Self::AsIs => "原始經緯度",
            Self::Swapped => "已修正(X/Y反轉→經緯度)",
            Self::Projected => "TWD97(TM2 3826)→WGS84 轉換",
            Self::SwappedAndProjected => "已修正(X/Y反轉)+TWD97→WGS84 轉換",
            Self::Anomalous => "座標異常/未能辨識座標系統",
            Self::ConversionError => "轉換錯誤",
        }
    }

    /// Whether the position is the `(0, 0)` sentinel rather than a real fix.
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Anomalous | Self::ConversionError)
    }
}

impl fmt::Display for CoordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::AsIs => "AS_IS",
            Self::Swapped => "SWAPPED",
            Self::Projected => "PROJECTED",
            Self::SwappedAndProjected => "SWAPPED_AND_PROJECTED",
            Self::Anomalous => "ANOMALOUS",
            Self::ConversionError => "CONVERSION_ERROR",
        };
        f.write_str(code)
    }
}

// ============================================================================
// Normalized record
// ============================================================================

/// A raw record augmented with its canonical WGS84 position.
///
/// `(lng, lat)` is either a Taiwan-region pair or exactly `(0, 0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    #[serde(flatten)]
    pub raw: RawRecord,

    #[serde(rename = "lng")]
    pub longitude: f64,

    #[serde(rename = "lat")]
    pub latitude: f64,

    pub coord_status: CoordStatus,
}

/// Per-status record tally for one refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts(pub BTreeMap<CoordStatus, usize>);

impl StatusCounts {
    pub fn from_records(records: &[NormalizedRecord]) -> Self {
        let mut counts = BTreeMap::new();
        for record in records {
            *counts.entry(record.coord_status).or_insert(0) += 1;
        }
        Self(counts)
    }

    pub fn get(&self, status: CoordStatus) -> usize {
        self.0.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Result of one completed refresh, published as a unit.
///
/// Snapshots are immutable once built; a refresh replaces the whole value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// 0 before the first refresh, then +1 per successful refresh
    pub generation: u64,

    /// Local timestamp of the refresh, or the "not yet updated" marker
    pub updated: String,

    /// Length of `records`
    pub count: usize,

    /// Records with a strictly positive position
    pub records: Vec<NormalizedRecord>,

    /// Spreadsheet written by this refresh
    pub excel_path: Option<PathBuf>,

    /// Overlay written by this refresh
    pub kml_path: Option<PathBuf>,

    /// Status tally over every fetched record, before filtering
    pub status_counts: StatusCounts,

    /// Placemarks written to the overlay
    pub placemarks: usize,
}

impl Snapshot {
    /// The value served before any refresh has completed.
    pub fn initial(not_updated_marker: &str) -> Self {
        Self {
            generation: 0,
            updated: not_updated_marker.to_string(),
            count: 0,
            records: Vec::new(),
            excel_path: None,
            kml_path: None,
            status_counts: StatusCounts::default(),
            placemarks: 0,
        }
    }

    pub const fn is_initial(&self) -> bool {
        self.generation == 0
    }
}
