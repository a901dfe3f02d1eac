//! Record acquisition
//!
//! Provides a unified trait for obtaining the raw record set:
//! - [`UpstreamClient`]: the live upstream web service
//! - [`StaticSource`]: a pre-loaded record set (saved dumps, tests)
//!
//! A source never fails outward. Network and decoding problems are folded
//! into an empty [`FetchOutcome`] whose `failure` says what went wrong.

mod static_source;
mod upstream;

pub use static_source::StaticSource;
pub use upstream::UpstreamClient;

use async_trait::async_trait;

use crate::types::RawRecord;

/// Why a fetch produced no data.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("Malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Unexpected response shape: expected a JSON array, got {0}")]
    UnexpectedShape(&'static str),
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Result of one fetch attempt.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    /// Set when the fetch degraded to "no data"
    pub failure: Option<FetchError>,
    /// Array elements skipped because they were not record objects
    pub skipped: usize,
}

impl FetchOutcome {
    pub const fn ok(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            failure: None,
            skipped: 0,
        }
    }

    pub fn failed(error: FetchError) -> Self {
        Self {
            records: Vec::new(),
            failure: Some(error),
            skipped: 0,
        }
    }

    pub const fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }
}

/// Trait abstracting where raw records come from.
#[async_trait]
pub trait RecordSource: Send + Sync + 'static {
    /// Retrieve the full record set. Must not panic or hang past its own timeouts.
    async fn fetch(&self) -> FetchOutcome;

    /// Human-readable name for logging (e.g. "upstream", "file").
    fn source_name(&self) -> &str;
}

/// Decode a response body into records.
///
/// An empty body or JSON `null` is an empty record set. Array elements that
/// are not record objects are skipped and counted.
pub fn decode_records(body: &[u8]) -> Result<(Vec<RawRecord>, usize), FetchError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok((Vec::new(), 0));
    }

    let value: serde_json::Value = serde_json::from_slice(body)?;
    let items = match value {
        serde_json::Value::Null => return Ok((Vec::new(), 0)),
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(_) => return Err(FetchError::UnexpectedShape("object")),
        serde_json::Value::String(_) => return Err(FetchError::UnexpectedShape("string")),
        serde_json::Value::Number(_) => return Err(FetchError::UnexpectedShape("number")),
        serde_json::Value::Bool(_) => return Err(FetchError::UnexpectedShape("boolean")),
    };

    let total = items.len();
    let records: Vec<RawRecord> = items
        .into_iter()
        .filter(serde_json::Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    let skipped = total - records.len();
    Ok((records, skipped))
}
