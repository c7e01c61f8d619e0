//! AgriRent statistics builder CLI
//!
//! Reads a rentals CSV and writes the statistics, encoder, scaler, and
//! column-layout artifacts into an artifact directory.

use agrirent_ml_trainer::encoders::DEFAULT_SEED;
use agrirent_ml_trainer::{ArtifactBundle, RentalDataset};
use agrirent_ml_core::DirectoryStore;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "agrirent-stats")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Build AgriRent pricing statistics and encoders from a rentals CSV",
    long_about = None
)]
struct Args {
    /// Input rentals CSV (header row required)
    #[arg(short, long)]
    input: PathBuf,

    /// Output artifact directory
    #[arg(short, long, default_value = "models")]
    output: PathBuf,

    /// Seed for the target-encoder fold shuffle
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: i64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("AgriRent statistics builder v{}", agrirent_ml_trainer::VERSION);

    info!("Loading rentals from: {}", args.input.display());
    let mut dataset = RentalDataset::from_csv(&args.input).context("Failed to load dataset")?;
    let report = dataset.clean().context("Failed to clean dataset")?;
    info!(
        "Kept {} of {} rows ({} non-positive prices, {} outliers)",
        report.kept, report.loaded, report.non_positive_price, report.outliers
    );

    let bundle = ArtifactBundle::build(&dataset, args.seed).context("Failed to fit artifacts")?;

    let store = DirectoryStore::new(&args.output);
    let prints = bundle.write(&store).context("Failed to write artifacts")?;

    info!("Artifacts written to {}", args.output.display());
    for (kind, hash) in &prints {
        info!("  {kind:<22} {hash}");
    }

    Ok(())
}
