//! Sync Configuration Module
//!
//! Provides the runtime configuration for the upstream fetch, the artifact
//! export and the client payload, loaded from TOML with built-in defaults.
//!
//! ## Loading Order
//!
//! 1. `SOILMOVE_CONFIG` environment variable (path to TOML file)
//! 2. `soilmove.toml` in the current working directory
//! 3. Built-in defaults
//!
//! After the file is resolved, `SOILMOVE_OUT_DIR` overrides the export
//! directory regardless of where the rest of the config came from.
//!
//! ## Usage
//!
//! The config is passed explicitly into the refresh context; there is no
//! global accessor:
//!
//! ```ignore
//! let config = Arc::new(SyncConfig::load());
//! let ctx = RefreshContext::new(UpstreamClient::new(&config.upstream)?, config);
//! ```

mod sync_config;

pub use sync_config::*;

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV: &str = "SOILMOVE_CONFIG";

/// Environment variable overriding `export.out_dir`.
pub const OUT_DIR_ENV: &str = "SOILMOVE_OUT_DIR";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "soilmove.toml";
