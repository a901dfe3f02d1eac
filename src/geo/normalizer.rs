//! Coordinate Normalizer
//!
//! Upstream positions arrive in one of four shapes: WGS84 lng/lat, WGS84 with
//! the axes swapped, TWD97 TM2 metres, or TM2 with the axes swapped. Each
//! shape is a [`Rule`] in [`RULES`]; rules are tried in order and the first
//! one whose predicate matches AND whose transform lands inside the Taiwan
//! lng/lat box wins. A rule that matches but transforms out of the box falls
//! through to the next rule.
//!
//! Normalization never fails: unreadable input becomes
//! [`CoordStatus::ConversionError`] and unplausible input becomes
//! [`CoordStatus::Anomalous`], both with the `(0, 0)` sentinel.

use serde_json::Value;
use std::fmt;
use tracing::debug;

use super::bounds::{looks_like_lnglat, looks_like_tm2};
use super::tm2::tm2_to_wgs84;
use crate::types::{CoordStatus, NormalizedRecord, RawRecord, StatusCounts};

/// Which raw field a conversion error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("x"),
            Self::Y => f.write_str("y"),
        }
    }
}

/// Why a raw position could not be read as two numbers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("{0} is missing")]
    Missing(Axis),
    #[error("{0} is not numeric: {1:?}")]
    NotNumeric(Axis, String),
    #[error("{0} is not finite")]
    NotFinite(Axis),
}

/// Outcome of normalizing one raw position.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub longitude: f64,
    pub latitude: f64,
    pub status: CoordStatus,
    /// Set only for [`CoordStatus::ConversionError`]
    pub error: Option<ConversionError>,
}

impl Classification {
    const fn resolved(longitude: f64, latitude: f64, status: CoordStatus) -> Self {
        Self {
            longitude,
            latitude,
            status,
            error: None,
        }
    }

    const fn anomalous() -> Self {
        Self::resolved(0.0, 0.0, CoordStatus::Anomalous)
    }

    const fn conversion_error(error: ConversionError) -> Self {
        Self {
            longitude: 0.0,
            latitude: 0.0,
            status: CoordStatus::ConversionError,
            error: Some(error),
        }
    }
}

/// One classification hypothesis: a predicate on the raw `(x, y)` pair and
/// the transform producing a candidate `(lng, lat)`.
pub struct Rule {
    pub status: CoordStatus,
    pub matches: fn(f64, f64) -> bool,
    pub transform: fn(f64, f64) -> Option<(f64, f64)>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("status", &self.status).finish_non_exhaustive()
    }
}

impl Rule {
    /// Apply the rule, returning a position only if it passes the lng/lat gate.
    pub fn apply(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !(self.matches)(x, y) {
            return None;
        }
        (self.transform)(x, y).filter(|&(lng, lat)| looks_like_lnglat(lng, lat))
    }
}

/// Classification hypotheses in priority order. First match wins.
pub static RULES: [Rule; 4] = [
    Rule {
        status: CoordStatus::AsIs,
        matches: |x, y| looks_like_lnglat(x, y),
        transform: |x, y| Some((x, y)),
    },
    Rule {
        status: CoordStatus::Swapped,
        matches: |x, y| looks_like_lnglat(y, x),
        transform: |x, y| Some((y, x)),
    },
    Rule {
        status: CoordStatus::Projected,
        matches: |x, y| looks_like_tm2(x, y),
        transform: tm2_to_wgs84,
    },
    Rule {
        status: CoordStatus::SwappedAndProjected,
        matches: |x, y| looks_like_tm2(y, x),
        transform: |x, y| tm2_to_wgs84(y, x),
    },
];

/// Classify a numeric `(x, y)` pair against [`RULES`].
pub fn classify(x: f64, y: f64) -> Classification {
    RULES
        .iter()
        .find_map(|rule| {
            rule.apply(x, y)
                .map(|(lng, lat)| Classification::resolved(lng, lat, rule.status))
        })
        .unwrap_or_else(Classification::anomalous)
}

/// Read one raw axis as a finite `f64`.
///
/// Accepts JSON numbers and numeric strings (surrounding whitespace ignored).
pub fn parse_axis(value: Option<&Value>, axis: Axis) -> Result<f64, ConversionError> {
    let parsed = match value {
        None | Some(Value::Null) => return Err(ConversionError::Missing(axis)),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ConversionError::NotNumeric(axis, n.to_string()))?,
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(ConversionError::Missing(axis));
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| ConversionError::NotNumeric(axis, s.clone()))?
        }
        Some(other) => return Err(ConversionError::NotNumeric(axis, other.to_string())),
    };

    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(ConversionError::NotFinite(axis))
    }
}

/// Normalize the raw values of one position. Never fails.
pub fn classify_values(x: Option<&Value>, y: Option<&Value>) -> Classification {
    let parsed = parse_axis(x, Axis::X).and_then(|x| Ok((x, parse_axis(y, Axis::Y)?)));
    match parsed {
        Ok((x, y)) => classify(x, y),
        Err(e) => Classification::conversion_error(e),
    }
}

/// Normalize one record's raw position. Never fails.
pub fn normalize(raw: &RawRecord) -> Classification {
    classify_values(raw.x.as_ref(), raw.y.as_ref())
}

/// Normalize a whole batch, logging conversion failures and the status tally.
pub fn normalize_all(raws: Vec<RawRecord>) -> Vec<NormalizedRecord> {
    let records: Vec<NormalizedRecord> = raws
        .into_iter()
        .map(|raw| {
            let result = normalize(&raw);
            if let Some(err) = &result.error {
                debug!(
                    id = %crate::types::display_value(raw.id.as_ref()),
                    error = %err,
                    "Coordinate conversion failed"
                );
            }
            NormalizedRecord {
                raw,
                longitude: result.longitude,
                latitude: result.latitude,
                coord_status: result.status,
            }
        })
        .collect();

    let counts = StatusCounts::from_records(&records);
    debug!(
        total = records.len(),
        as_is = counts.get(CoordStatus::AsIs),
        swapped = counts.get(CoordStatus::Swapped),
        projected = counts.get(CoordStatus::Projected),
        swapped_and_projected = counts.get(CoordStatus::SwappedAndProjected),
        anomalous = counts.get(CoordStatus::Anomalous),
        conversion_error = counts.get(CoordStatus::ConversionError),
        "Normalized coordinates"
    );

    records
}
