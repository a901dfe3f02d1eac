//! Soilmove Sync - disposal-site dataset refresh tool
//!
//! Runs one refresh cycle against the upstream service (or a saved
//! response) and prints the map payload as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Refresh from the live upstream service
//! cargo run --release -- refresh --pretty
//!
//! # Refresh from a saved upstream response
//! ./soilmove-sync refresh --input dump.json
//!
//! # Check how one raw position would be classified
//! ./soilmove-sync classify 302000 2770000
//! ```
//!
//! # Environment Variables
//!
//! - `SOILMOVE_CONFIG`: Path to a TOML config file (default: ./soilmove.toml)
//! - `SOILMOVE_OUT_DIR`: Directory for the exported artifacts
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use soilmove_sync::acquisition::{RecordSource, StaticSource, UpstreamClient};
use soilmove_sync::config::SyncConfig;
use soilmove_sync::geo::normalizer::classify_values;
use soilmove_sync::pipeline::RefreshContext;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "soilmove-sync")]
#[command(about = "Taiwan disposal-site dataset refresh: fetch, repair coordinates, export xlsx + kml")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides SOILMOVE_CONFIG and ./soilmove.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for exported artifacts (overrides config and SOILMOVE_OUT_DIR)
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run one refresh cycle and print the payload
    Refresh {
        /// Read records from a saved upstream response instead of the network
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Pretty-print the payload
        #[arg(long)]
        pretty: bool,
    },

    /// Classify one raw (x, y) position
    Classify {
        /// Raw x value, as the upstream would send it
        #[arg(allow_hyphen_values = true)]
        x: String,
        /// Raw y value, as the upstream would send it
        #[arg(allow_hyphen_values = true)]
        y: String,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Logs go to stderr so stdout stays a clean JSON payload
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn resolve_config(args: &CliArgs) -> Result<SyncConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = SyncConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env_overrides();
            config
        }
        None => SyncConfig::load(),
    };

    if let Some(dir) = &args.out_dir {
        config.export.out_dir.clone_from(dir);
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run_refresh<S: RecordSource>(source: S, config: SyncConfig, pretty: bool) -> Result<()> {
    info!(source = source.source_name(), out_dir = %config.export.out_dir.display(), "Starting refresh");

    let ctx = RefreshContext::new(source, Arc::new(config));
    let snapshot = ctx.refresh().await.context("Refresh failed")?;

    if let (Some(excel), Some(kml)) = (&snapshot.excel_path, &snapshot.kml_path) {
        info!(excel = %excel.display(), kml = %kml.display(), "Artifacts ready");
    }

    let payload = ctx.payload();
    let json = if pretty {
        serde_json::to_string_pretty(&payload)?
    } else {
        serde_json::to_string(&payload)?
    };
    println!("{json}");
    Ok(())
}

fn raw_value(text: &str) -> serde_json::Value {
    serde_json::Value::String(text.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    let config = resolve_config(&args)?;

    match &args.command {
        SubCommand::Refresh { input, pretty } => match input {
            Some(path) => run_refresh(StaticSource::from_file(path)?, config, *pretty).await,
            None => {
                let client = UpstreamClient::new(&config.upstream).context("Failed to build upstream client")?;
                run_refresh(client, config, *pretty).await
            }
        },
        SubCommand::Classify { x, y } => {
            let result = classify_values(Some(&raw_value(x)), Some(&raw_value(y)));
            let mut out = serde_json::json!({
                "lng": result.longitude,
                "lat": result.latitude,
                "coord_status": result.status,
                "label": result.status.label(),
            });
            if let Some(err) = &result.error {
                out["error"] = serde_json::Value::String(err.to_string());
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        SubCommand::ShowConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
