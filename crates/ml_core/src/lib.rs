//! Rental price inference for agricultural machinery
//!
//! Reproduces the training-time feature pipeline exactly and scores it with a
//! three-regressor tree ensemble.
//!
//! Modules:
//! - `demand`, `seasonal`: read-only trained statistics stores
//! - `features`: raw record to typed feature row
//! - `encoding`: frequency, target, and hybrid machine-type encodings
//! - `layout`: trained column lists, projections, and the scaler
//! - `gbdt`: tree ensemble evaluator
//! - `ensemble`: three-model averaging
//! - `artifacts`: versioned JSON artifact persistence
//! - `context`: immutable loaded state and the `predict` entry point
//! - `config`: TOML/env configuration

pub mod artifacts;
pub mod calendar;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod demand;
pub mod encoding;
pub mod ensemble;
pub mod errors;
pub mod features;
pub mod gbdt;
pub mod layout;
pub mod request;
pub mod seasonal;
pub mod serde_canon;
pub mod stats;

pub use artifacts::{ArtifactEnvelope, ArtifactKind, ArtifactStore, DirectoryStore, MemoryStore};
pub use collaborators::{Geocoder, Location, WeatherReading, WeatherSource};
pub use config::PricingConfig;
pub use context::{ContextHandle, ModelContext, PricePrediction};
pub use demand::{DemandField, DemandStats};
pub use encoding::{apply_encoders, FrequencyTable, HybridEncoder, TargetEncoder};
pub use errors::{PricingError, Result};
pub use features::{build_batch, build_features, FeatureRow, NumericColumn, RawRecord};
pub use request::RawRequest;
pub use seasonal::{SeasonalFeatures, SeasonalStats};

/// Crate version string for logs and CLI output
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
