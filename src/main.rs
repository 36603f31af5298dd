//! borehole-siting - borehole viability analysis for a field polygon
//!
//! # Usage
//!
//! ```bash
//! # Analyze a GeoJSON field against the live data services
//! borehole-siting analyze field.geojson --pretty
//!
//! # Offline, against the seeded synthetic provider
//! borehole-siting analyze field.geojson --offline --seed 7
//!
//! # Print the effective configuration as TOML
//! borehole-siting print-config
//! ```
//!
//! # Environment Variables
//!
//! - `BOREHOLE_CONFIG`: Path to an engine config TOML file
//! - `RUST_LOG`: Logging level (default: info)
//!
//! The report is written to stdout; logs go to stderr or `--log-file`.

use anyhow::{Context, Result};
use borehole_siting::config::{self, EngineConfig};
use borehole_siting::providers::{DataProvider, HttpDataProvider, SyntheticProvider};
use borehole_siting::BoreholeSiteAnalyzer;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "borehole-siting")]
#[command(about = "Hydrological scoring and recharge analysis for borehole siting")]
#[command(version)]
struct CliArgs {
    /// Engine config TOML (overrides BOREHOLE_CONFIG and ./borehole_config.toml)
    #[arg(long, global = true, env = "BOREHOLE_CONFIG")]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Analyze a field polygon and print the site report as JSON
    Analyze {
        /// GeoJSON file holding a Polygon geometry or Feature
        polygon: PathBuf,
        /// Use the synthetic provider instead of remote services
        #[arg(long)]
        offline: bool,
        /// Seed for synthetic data and fallback rainfall
        #[arg(long)]
        seed: Option<u64>,
        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },

    /// Print the effective engine configuration as TOML
    PrintConfig,
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(log_file: Option<&Path>, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::load_from_file(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(EngineConfig::load()),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = CliArgs::parse();
    init_logging(args.log_file.as_deref(), args.log_json)?;

    let engine_config = load_config(args.config.as_deref())?;
    config::init(engine_config.clone());

    match args.command {
        SubCommand::PrintConfig => {
            let rendered = engine_config.to_toml().context("rendering config")?;
            println!("{rendered}");
        }
        SubCommand::Analyze {
            polygon,
            offline,
            seed,
            pretty,
        } => {
            let raw = std::fs::read_to_string(&polygon)
                .with_context(|| format!("reading polygon {}", polygon.display()))?;
            let geojson: serde_json::Value =
                serde_json::from_str(&raw).with_context(|| format!("parsing GeoJSON {}", polygon.display()))?;

            let provider: Arc<dyn DataProvider> = if offline {
                Arc::new(SyntheticProvider::new(seed.unwrap_or(0)))
            } else {
                Arc::new(HttpDataProvider::new(&engine_config).context("building HTTP provider")?)
            };
            info!(provider = provider.name(), environment = %engine_config.environment, "Borehole siting engine ready");

            let mut analyzer = BoreholeSiteAnalyzer::new(provider, engine_config);
            if let Some(seed) = seed {
                analyzer = analyzer.with_seed(seed);
            }

            let report = analyzer.analyze_geojson(&geojson).await?;
            let out = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{out}");
        }
    }
    Ok(())
}
