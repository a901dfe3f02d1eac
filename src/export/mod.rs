//! Artifact Exporter
//!
//! Renders a normalized batch into the two "latest" download artifacts:
//!
//! - **Spreadsheet** (`.xlsx`): every record, localized headers
//! - **Overlay** (`.kml`): one placemark per record with a plausible position
//!
//! Both files are rendered in memory first and then swapped into place as one
//! group with [`atomic::write_all_atomic`], so a reader never sees a
//! half-written file and a failed refresh leaves both previous artifacts
//! intact.

pub mod atomic;
pub mod kml;
pub mod spreadsheet;

use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ExportConfig;
use crate::types::NormalizedRecord;

pub use atomic::{write_all_atomic, write_atomic};
pub use kml::{render_kml, RenderedKml};
pub use spreadsheet::{render_spreadsheet, COLUMNS};

/// Export failures. These abort the refresh.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),
    #[error("KML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl ExportError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where one export wrote its artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub excel_path: PathBuf,
    pub kml_path: PathBuf,
    /// Spreadsheet data rows
    pub rows: usize,
    /// Overlay placemarks
    pub placemarks: usize,
}

/// Write both artifacts, overwriting the previous "latest" files.
///
/// Both documents are rendered before either file is touched. If either file
/// cannot be replaced, neither is.
pub fn export(records: &[NormalizedRecord], config: &ExportConfig) -> Result<ArtifactPaths, ExportError> {
    let workbook = render_spreadsheet(records, &config.sheet_name)?;
    let overlay = render_kml(records, config)?;

    let excel_path = config.excel_path();
    let kml_path = config.kml_path();

    write_all_atomic(&[
        (excel_path.as_path(), workbook.as_slice()),
        (kml_path.as_path(), overlay.bytes.as_slice()),
    ])?;

    info!(
        rows = records.len(),
        placemarks = overlay.placemarks,
        excel = %excel_path.display(),
        kml = %kml_path.display(),
        "Exported artifacts"
    );

    Ok(ArtifactPaths {
        excel_path,
        kml_path,
        rows: records.len(),
        placemarks: overlay.placemarks,
    })
}
