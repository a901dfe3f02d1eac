//! Soilmove Sync: Taiwan disposal-site dataset refresh
//!
//! Pulls the public soil/construction-waste disposal-site list, repairs its
//! positions, and republishes it as a map payload, a spreadsheet and a KML
//! overlay.
//!
//! ## Architecture
//!
//! - **Acquisition**: session-aware upstream fetch that degrades to "no data"
//! - **Geo**: ordered rule list resolving each raw `(x, y)` to WGS84
//! - **Export**: atomic spreadsheet + KML artifact writes
//! - **Payload**: null-free JSON summary for the map client
//! - **Pipeline**: single-flight refresh with atomic snapshot publication

pub mod acquisition;
pub mod config;
pub mod export;
pub mod geo;
pub mod payload;
pub mod pipeline;
pub mod types;

// Re-export configuration
pub use config::SyncConfig;

// Re-export commonly used types
pub use types::{CoordStatus, NormalizedRecord, RawRecord, Snapshot, StatusCounts};

// Re-export pipeline stages
pub use acquisition::{FetchError, FetchOutcome, RecordSource, StaticSource, UpstreamClient};
pub use export::{export, ArtifactPaths, ExportError};
pub use geo::{normalize, normalize_all, Classification};
pub use payload::{build_payload, Payload, PayloadRow};
pub use pipeline::{Artifact, NotReady, RefreshContext, RefreshError};
