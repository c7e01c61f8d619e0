//! AgriRent price inference CLI
//!
//! Loads the artifact directory once and prices a JSON request, prints the
//! engineered feature row, or lists artifact fingerprints.

use agrirent_ml_core::artifacts::fingerprint_all;
use agrirent_ml_core::{ArtifactKind, DirectoryStore, ModelContext, PricingConfig, RawRequest};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "agrirent-predict")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Price agricultural machinery rentals from trained artifacts", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Artifact directory (overrides config and environment)
    #[arg(short, long)]
    artifacts: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict a price for a JSON request (`-` reads stdin)
    Predict {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Print the engineered feature row for a JSON request
    Features {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Print the blake3 fingerprint of every artifact in the directory
    Fingerprint,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        PricingConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = &args.artifacts {
        config.artifacts.directory = dir.clone();
    }

    init_logging(args.verbose, &config.logging.level)?;
    info!("AgriRent price inference v{}", agrirent_ml_core::VERSION);

    for warning in config.validate().context("Invalid configuration")? {
        warn!("{}", warning);
    }

    match args.command {
        Command::Predict { input } => {
            let request = read_request(&input)?;
            let prediction = load_context(&config)?.predict(&request);
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Command::Features { input } => {
            let request = read_request(&input)?;
            let row = load_context(&config)?.features(&request);
            println!("{}", serde_json::to_string_pretty(&row)?);
        }
        Command::Fingerprint => {
            let store = DirectoryStore::new(&config.artifacts.directory);
            let prints = fingerprint_all(&store).context("Failed to fingerprint artifacts")?;
            for kind in ArtifactKind::ALL {
                match prints.get(&kind) {
                    Some(hash) => println!("{kind:<24} {hash}"),
                    None => println!("{kind:<24} (absent)"),
                }
            }
        }
    }

    Ok(())
}

fn load_context(config: &PricingConfig) -> Result<ModelContext> {
    ModelContext::from_config(config).with_context(|| {
        format!(
            "Failed to load artifacts from {}",
            config.artifacts.directory.display()
        )
    })
}

fn init_logging(verbose: bool, configured: &str) -> Result<()> {
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
        return Ok(());
    }

    let log_level = if verbose {
        Level::DEBUG
    } else {
        configured.parse().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Parse a request; a missing `created_at` becomes today's UTC date here.
fn read_request(path: &Path) -> Result<RawRequest> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read request at {}", path.display()))?
    };

    let mut request: RawRequest =
        serde_json::from_str(&contents).context("Request is not valid JSON")?;
    if request.created_at.is_none() {
        request.created_at = Some(Utc::now().date_naive().format("%Y-%m-%d").to_string());
    }
    Ok(request)
}
