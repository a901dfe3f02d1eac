//! Sync Configuration - upstream endpoints, export paths and payload URLs
//!
//! Each section implements `Default` with the values the deployed service
//! uses, so running without a config file reproduces production behavior.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{CONFIG_ENV, LOCAL_CONFIG_FILE, OUT_DIR_ENV};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one sync deployment.
///
/// Load with `SyncConfig::load()` which searches:
/// 1. `$SOILMOVE_CONFIG` env var
/// 2. `./soilmove.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Upstream web service
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Spreadsheet and overlay output
    #[serde(default)]
    pub export: ExportConfig,

    /// JSON payload handed to the map client
    #[serde(default)]
    pub payload: PayloadConfig,
}

impl SyncConfig {
    /// Load configuration using the standard search order, then apply the
    /// `SOILMOVE_OUT_DIR` override.
    pub fn load() -> Self {
        let mut config = Self::load_without_env_override();
        config.apply_env_overrides();
        config
    }

    fn load_without_env_override() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded sync config from SOILMOVE_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from SOILMOVE_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "SOILMOVE_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./soilmove.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded sync config from ./soilmove.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./soilmove.toml, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No soilmove.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SOILMOVE_OUT_DIR` if it is set to a non-empty value.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(OUT_DIR_ENV) {
            if !dir.trim().is_empty() {
                info!(out_dir = %dir, "Export directory overridden by SOILMOVE_OUT_DIR");
                self.export.out_dir = PathBuf::from(dir);
            }
        }
    }

    /// Serialize back to TOML (used by `show-config`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check cross-field constraints, collecting every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        Self::check_url(&self.upstream.landing_url, "upstream.landing_url", &mut errors);
        Self::check_url(&self.upstream.query_url, "upstream.query_url", &mut errors);

        if self.upstream.landing_timeout_secs == 0 {
            errors.push("upstream.landing_timeout_secs must be greater than 0".to_string());
        }
        if self.upstream.query_timeout_secs == 0 {
            errors.push("upstream.query_timeout_secs must be greater than 0".to_string());
        }

        if self.export.out_dir.as_os_str().is_empty() {
            errors.push("export.out_dir must not be empty".to_string());
        } else if self.export.out_dir.exists() && !self.export.out_dir.is_dir() {
            errors.push(format!(
                "export.out_dir ({}) exists and is not a directory",
                self.export.out_dir.display()
            ));
        }

        Self::check_filename(&self.export.excel_filename, ".xlsx", "export.excel_filename", &mut errors);
        Self::check_filename(&self.export.kml_filename, ".kml", "export.kml_filename", &mut errors);

        if self.export.sheet_name.trim().is_empty() || self.export.sheet_name.chars().count() > 31 {
            errors.push(format!(
                "export.sheet_name ({:?}) must be 1-31 characters",
                self.export.sheet_name
            ));
        }

        if chrono::format::StrftimeItems::new(&self.payload.timestamp_format)
            .any(|item| matches!(item, chrono::format::Item::Error))
        {
            errors.push(format!(
                "payload.timestamp_format ({:?}) is not a valid strftime format",
                self.payload.timestamp_format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_url(url: &str, key: &str, errors: &mut Vec<String>) {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(format!("{key} ({url:?}) must be an http(s) URL"));
        }
    }

    fn check_filename(name: &str, extension: &str, key: &str, errors: &mut Vec<String>) {
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            errors.push(format!("{key} ({name:?}) must be a bare filename"));
        } else if !name.to_lowercase().ends_with(extension) {
            errors.push(format!("{key} ({name:?}) must end with {extension}"));
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Config parse error ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),
    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Upstream
// ============================================================================

/// Upstream web service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Landing page visited first to establish the session cookie.
    #[serde(default = "default_landing_url")]
    pub landing_url: String,

    /// Query endpoint returning the JSON record array.
    #[serde(default = "default_query_url")]
    pub query_url: String,

    /// `city` form field; empty selects every city.
    #[serde(default)]
    pub city: String,

    #[serde(default = "default_landing_timeout_secs")]
    pub landing_timeout_secs: u64,

    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Browser User-Agent sent with both requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// The upstream presents an invalid certificate chain. Disabling this
    /// makes every fetch fail until the site fixes its TLS setup.
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

fn default_landing_url() -> String {
    "https://www.soilmove.tw/soilmove/dumpsiteGisQuery".to_string()
}

fn default_query_url() -> String {
    "https://www.soilmove.tw/soilmove/dumpsiteGisQueryList".to_string()
}

const fn default_landing_timeout_secs() -> u64 {
    20
}

const fn default_query_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            landing_url: default_landing_url(),
            query_url: default_query_url(),
            city: String::new(),
            landing_timeout_secs: default_landing_timeout_secs(),
            query_timeout_secs: default_query_timeout_secs(),
            user_agent: default_user_agent(),
            accept_invalid_certs: true,
        }
    }
}

// ============================================================================
// Export
// ============================================================================

/// Artifact export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory receiving both artifacts.
    ///
    /// Can be overridden by the `SOILMOVE_OUT_DIR` env var or `--out-dir`.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    #[serde(default = "default_excel_filename")]
    pub excel_filename: String,

    #[serde(default = "default_kml_filename")]
    pub kml_filename: String,

    /// Worksheet name (Excel caps these at 31 characters).
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    /// Icon shared by every placemark.
    #[serde(default = "default_icon_href")]
    pub icon_href: String,

    /// `<Document><name>` of the overlay.
    #[serde(default = "default_document_name")]
    pub document_name: String,
}

fn default_out_dir() -> PathBuf {
    std::env::temp_dir().join("soilmove")
}

fn default_excel_filename() -> String {
    "全台土資場清單_latest.xlsx".to_string()
}

fn default_kml_filename() -> String {
    "全台土資場分佈圖_latest.kml".to_string()
}

fn default_sheet_name() -> String {
    "土資場清單".to_string()
}

fn default_icon_href() -> String {
    "http://maps.google.com/mapfiles/kml/shapes/placemark_circle.png".to_string()
}

fn default_document_name() -> String {
    "全台土資場分佈圖".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            excel_filename: default_excel_filename(),
            kml_filename: default_kml_filename(),
            sheet_name: default_sheet_name(),
            icon_href: default_icon_href(),
            document_name: default_document_name(),
        }
    }
}

impl ExportConfig {
    pub fn excel_path(&self) -> PathBuf {
        self.out_dir.join(&self.excel_filename)
    }

    pub fn kml_path(&self) -> PathBuf {
        self.out_dir.join(&self.kml_filename)
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Client payload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadConfig {
    /// Download route for the spreadsheet, reported verbatim.
    #[serde(default = "default_excel_url")]
    pub excel_url: String,

    /// Download route for the overlay, reported verbatim.
    #[serde(default = "default_kml_url")]
    pub kml_url: String,

    /// `chrono` format string for the `updated` field (local time).
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// `updated` value reported before the first refresh.
    #[serde(default = "default_not_updated_marker")]
    pub not_updated_marker: String,
}

fn default_excel_url() -> String {
    "/download/excel".to_string()
}

fn default_kml_url() -> String {
    "/download/kml".to_string()
}

fn default_timestamp_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_not_updated_marker() -> String {
    "尚未更新".to_string()
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            excel_url: default_excel_url(),
            kml_url: default_kml_url(),
            timestamp_format: default_timestamp_format(),
            not_updated_marker: default_not_updated_marker(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_paths_share_out_dir() {
        let config = SyncConfig::default();
        assert_eq!(config.export.excel_path().parent(), Some(config.export.out_dir.as_path()));
        assert_eq!(config.export.kml_path().parent(), Some(config.export.out_dir.as_path()));
        assert!(config.export.kml_path().to_string_lossy().ends_with(".kml"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_str = r#"
[upstream]
query_timeout_secs = 45

[export]
out_dir = "/srv/soilmove"
"#;
        let config: SyncConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.upstream.query_timeout_secs, 45);
        assert_eq!(config.upstream.landing_timeout_secs, 20);
        assert!(config.upstream.accept_invalid_certs);
        assert_eq!(config.export.out_dir, PathBuf::from("/srv/soilmove"));
        assert_eq!(config.export.excel_filename, "全台土資場清單_latest.xlsx");
        assert_eq!(config.payload.kml_url, "/download/kml");
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = SyncConfig::default();
        config.upstream.query_url = "ftp://example".to_string();
        config.upstream.landing_timeout_secs = 0;
        config.export.kml_filename = "overlay.kmz".to_string();
        config.export.excel_filename = "../escape.xlsx".to_string();

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 4, "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("upstream.query_url")));
                assert!(errors.iter().any(|e| e.contains("landing_timeout_secs")));
                assert!(errors.iter().any(|e| e.contains(".kml")));
                assert!(errors.iter().any(|e| e.contains("bare filename")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soilmove.toml");
        std::fs::write(&path, "[export]\nsheet_name = \"\"\n").unwrap();

        let err = SyncConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_unusable_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"").unwrap();

        let mut config = SyncConfig::default();
        config.export.out_dir = file;
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("export.out_dir")), "{errors:?}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        config.export.out_dir = PathBuf::new();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.export.out_dir = dir.path().join("created-later");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_timestamp_format() {
        let mut config = SyncConfig::default();
        config.payload.timestamp_format = "%Y-%Q".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soilmove.toml");
        std::fs::write(&path, "[upstream\n").unwrap();

        let err = SyncConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = SyncConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: SyncConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.export.kml_filename, config.export.kml_filename);
        assert_eq!(parsed.upstream.query_url, config.upstream.query_url);
    }
}
