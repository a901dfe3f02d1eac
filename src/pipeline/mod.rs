//! Refresh Pipeline
//!
//! One refresh runs the four stages in sequence:
//!
//! ```text
//! RecordSource::fetch → normalize_all → export (blocking pool) → Snapshot
//! ```
//!
//! [`RefreshContext`] owns the published [`Snapshot`](crate::types::Snapshot)
//! and guarantees:
//! - at most one refresh runs at a time; callers that queued behind a
//!   running refresh receive its result instead of starting another
//! - readers always see a complete snapshot (atomic pointer swap)
//! - a failed refresh publishes nothing and keeps the previous snapshot

mod context;

pub use context::RefreshContext;

use std::fmt;

use crate::export::ExportError;

/// Failures that abort a refresh cycle.
///
/// Upstream and per-record failures never appear here; they degrade to an
/// empty dataset or a sentinel status instead.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
    #[error("Export task aborted: {0}")]
    Join(String),
}

/// Downloadable artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Excel,
    Kml,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excel => f.write_str("excel"),
            Self::Kml => f.write_str("kml"),
        }
    }
}

/// The requested artifact has not been produced by any refresh yet, or the
/// file has since disappeared from disk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{artifact} not ready")]
pub struct NotReady {
    pub artifact: Artifact,
}
