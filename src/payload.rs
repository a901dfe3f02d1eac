//! Payload Builder
//!
//! Turns a normalized batch into the JSON body the map client consumes:
//! `{"updated", "count", "data", "excel_url", "kml_url"}`. Only records with a
//! strictly positive position are included, and every missing scalar is
//! replaced by `""` so the client never sees `null`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PayloadConfig;
use crate::types::{NormalizedRecord, Snapshot};

/// One site as shown on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadRow {
    pub dumpname: Value,
    pub city: Value,
    pub typename: Value,
    #[serde(rename = "controlId")]
    pub control_id: Value,
    pub applydate: Value,
    pub remain: Value,
    pub maxbury: Value,
    pub area: Value,
    pub lng: f64,
    pub lat: f64,
}

/// Client-facing summary of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub updated: String,
    pub count: usize,
    pub data: Vec<PayloadRow>,
    pub excel_url: String,
    pub kml_url: String,
}

/// Excludes the `(0, 0)` sentinel and any non-positive artifact.
pub fn has_valid_position(record: &NormalizedRecord) -> bool {
    record.longitude > 0.0 && record.latitude > 0.0
}

fn or_placeholder(value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) => Value::String(String::new()),
        Some(v) => v.clone(),
    }
}

impl PayloadRow {
    pub fn from_record(record: &NormalizedRecord) -> Self {
        let raw = &record.raw;
        Self {
            dumpname: or_placeholder(raw.dumpname.as_ref()),
            city: or_placeholder(raw.city.as_ref()),
            typename: or_placeholder(raw.typename.as_ref()),
            control_id: or_placeholder(raw.control_id.as_ref()),
            applydate: or_placeholder(raw.applydate.as_ref()),
            remain: or_placeholder(raw.remain.as_ref()),
            maxbury: or_placeholder(raw.maxbury.as_ref()),
            area: or_placeholder(raw.area.as_ref()),
            lng: record.longitude,
            lat: record.latitude,
        }
    }
}

/// Build the client payload from a batch of records.
pub fn build_payload(records: &[NormalizedRecord], updated: &str, config: &PayloadConfig) -> Payload {
    let data: Vec<PayloadRow> = records
        .iter()
        .filter(|r| has_valid_position(r))
        .map(PayloadRow::from_record)
        .collect();

    Payload {
        updated: updated.to_string(),
        count: data.len(),
        data,
        excel_url: config.excel_url.clone(),
        kml_url: config.kml_url.clone(),
    }
}

impl Payload {
    /// Payload view of a published snapshot.
    pub fn from_snapshot(snapshot: &Snapshot, config: &PayloadConfig) -> Self {
        build_payload(&snapshot.records, &snapshot.updated, config)
    }
}
