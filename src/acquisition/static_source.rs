//! Pre-loaded record source.
//!
//! Replays a fixed record set on every fetch. Used to run the pipeline
//! offline against a saved upstream response (`refresh --input`).

use async_trait::async_trait;
use std::path::Path;

use super::{decode_records, FetchOutcome, RecordSource};
use crate::types::RawRecord;

/// Serves the same records on every fetch.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<RawRecord>,
    name: String,
}

impl StaticSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            name: "static".to_string(),
        }
    }

    /// Load a saved upstream response body (JSON array of records).
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let body = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let (records, skipped) = decode_records(&body)
            .with_context(|| format!("Failed to decode records from {}", path.display()))?;
        if skipped > 0 {
            tracing::warn!(skipped, path = %path.display(), "Skipped non-record array elements");
        }

        Ok(Self {
            records,
            name: format!("file:{}", path.display()),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    async fn fetch(&self) -> FetchOutcome {
        FetchOutcome::ok(self.records.clone())
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
