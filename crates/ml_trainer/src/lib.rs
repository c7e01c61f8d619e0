//! AgriRent artifact builder
//!
//! Fits the demand and seasonal statistics, machine-type encoders, scaler,
//! and column layouts that `agrirent-ml-core` loads at startup.

pub mod builders;
pub mod dataset;
pub mod deterministic;
pub mod encoders;
pub mod errors;

use agrirent_ml_core::{ArtifactKind, DirectoryStore};
use std::collections::BTreeMap;
use std::path::Path;

pub use builders::ArtifactBundle;
pub use dataset::{CleanReport, RentalDataset, RentalRow};
pub use deterministic::LcgRng;
pub use errors::TrainerError;

/// Clean a rentals CSV, fit every artifact, and write them to `output`.
pub fn build_artifacts_from_csv(
    input: &Path,
    output: &Path,
    seed: i64,
) -> Result<BTreeMap<ArtifactKind, String>, TrainerError> {
    let mut dataset = RentalDataset::from_csv(input)?;
    dataset.clean()?;
    let bundle = ArtifactBundle::build(&dataset, seed)?;
    bundle.write(&DirectoryStore::new(output))
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
