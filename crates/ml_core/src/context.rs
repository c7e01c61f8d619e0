//! Immutable model context and the prediction entry points.
//!
//! All artifacts are read once into a `ModelContext`; after that every
//! prediction is a pure, lock-free computation over shared state. A
//! `ContextHandle` lets a service start accepting requests before the load
//! completes and answer them with `ServiceUnavailable` until it does.

use crate::artifacts::{load_artifact, load_required, ArtifactKind, ArtifactStore, DirectoryStore};
use crate::collaborators::{Geocoder, Location, WeatherSource};
use crate::config::PricingConfig;
use crate::demand::DemandStats;
use crate::encoding::{apply_encoders, FrequencyTable, HybridEncoder, TargetEncoder};
use crate::ensemble::EnsemblePredictor;
use crate::errors::{PricingError, Result};
use crate::features::{build_features, FeatureRow, RawRecord};
use crate::gbdt::Model;
use crate::layout::{CategoricalColumns, ColumnLayout, Reconciliation, StandardScaler};
use crate::request::RawRequest;
use crate::seasonal::{SeasonalPolicy, SeasonalStats};
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePrediction {
    /// Unweighted mean of the three regressors
    pub price: f64,
    /// `price` rounded to 2 decimals
    pub rounded: f64,
    /// A (scaled numeric), B (raw numeric), C (categorical-native)
    pub components: [f64; 3],
    pub reconciliation: Reconciliation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Everything needed to price a request, loaded once
#[derive(Debug, Clone)]
pub struct ModelContext {
    demand: DemandStats,
    seasonal: SeasonalStats,
    frequency: Option<FrequencyTable>,
    target: TargetEncoder,
    hybrid: HybridEncoder,
    ensemble: EnsemblePredictor,
    policy: SeasonalPolicy,
    fingerprints: BTreeMap<ArtifactKind, String>,
}

impl ModelContext {
    /// Load from the configured artifact directory.
    pub fn from_config(config: &PricingConfig) -> Result<Self> {
        let store = DirectoryStore::new(&config.artifacts.directory);
        Self::load(&store, config)
    }

    /// Load every artifact from `store`.
    ///
    /// Statistics, encoders, the scaler, and the frequency table fall back to
    /// neutral defaults when absent. The three regressors and both column
    /// lists are required.
    #[instrument(skip_all, fields(store = %store.describe()))]
    pub fn load(store: &dyn ArtifactStore, config: &PricingConfig) -> Result<Self> {
        let policy = config.features.seasonal_policy()?;
        let mut fingerprints = BTreeMap::new();

        let demand: DemandStats = optional(store, ArtifactKind::DemandStats, &mut fingerprints)?
            .unwrap_or_default();
        let seasonal: SeasonalStats =
            optional(store, ArtifactKind::SeasonalStats, &mut fingerprints)?.unwrap_or_default();
        let frequency: Option<FrequencyTable> =
            optional(store, ArtifactKind::FrequencyTable, &mut fingerprints)?;
        let target: TargetEncoder =
            optional(store, ArtifactKind::TargetEncoder, &mut fingerprints)?.unwrap_or_default();
        let hybrid: HybridEncoder =
            optional(store, ArtifactKind::HybridEncoder, &mut fingerprints)?.unwrap_or_default();
        let scaler: Option<StandardScaler> =
            optional(store, ArtifactKind::Scaler, &mut fingerprints)?;

        let numeric_columns: Vec<String> =
            required(store, ArtifactKind::NumericColumns, &mut fingerprints)?;
        let categorical_columns: CategoricalColumns =
            required(store, ArtifactKind::CategoricalColumns, &mut fingerprints)?;
        let scaled: Model = required(store, ArtifactKind::RegressorScaled, &mut fingerprints)?;
        let numeric: Model = required(store, ArtifactKind::RegressorNumeric, &mut fingerprints)?;
        let categorical: Model =
            required(store, ArtifactKind::RegressorCategorical, &mut fingerprints)?;

        let numeric_layout =
            ColumnLayout::numeric(ArtifactKind::NumericColumns.name(), &numeric_columns)?;
        let mixed_layout =
            ColumnLayout::mixed(ArtifactKind::CategoricalColumns.name(), &categorical_columns)?;

        let ensemble = EnsemblePredictor::new(
            scaled,
            numeric,
            categorical,
            numeric_layout,
            mixed_layout,
            scaler,
        )?;

        let [hash_a, hash_b, hash_c] = ensemble.fingerprints()?;
        let expected = &config.artifacts;
        verify_hash(
            ArtifactKind::RegressorScaled,
            &hash_a,
            expected.regressor_scaled_hash.as_deref(),
        )?;
        verify_hash(
            ArtifactKind::RegressorNumeric,
            &hash_b,
            expected.regressor_numeric_hash.as_deref(),
        )?;
        verify_hash(
            ArtifactKind::RegressorCategorical,
            &hash_c,
            expected.regressor_categorical_hash.as_deref(),
        )?;
        // Regressors are identified by the hash of the decoded model.
        fingerprints.insert(ArtifactKind::RegressorScaled, hash_a.clone());
        fingerprints.insert(ArtifactKind::RegressorNumeric, hash_b.clone());
        fingerprints.insert(ArtifactKind::RegressorCategorical, hash_c.clone());

        let rec = ensemble.reconciliation();
        if rec.missing > 0 {
            warn!(
                missing_columns = rec.missing,
                "trained columns unknown to the feature builder will be zero-filled"
            );
        }
        info!(
            numeric_columns = ensemble.numeric_layout().len(),
            categorical_columns = ensemble.mixed_layout().len(),
            extra_columns = rec.extra,
            regressor_scaled = %hash_a,
            regressor_numeric = %hash_b,
            regressor_categorical = %hash_c,
            "model context loaded"
        );

        Ok(Self {
            demand,
            seasonal,
            frequency,
            target,
            hybrid,
            ensemble,
            policy,
            fingerprints,
        })
    }

    /// Engineered and encoded feature row for a request
    pub fn features(&self, request: &RawRequest) -> FeatureRow {
        let record = RawRecord::assemble(request, &self.demand, &self.seasonal, &self.policy);
        let row = build_features(&record, self.frequency.as_ref());
        apply_encoders(row, &self.target, &self.hybrid)
    }

    pub fn predict(&self, request: &RawRequest) -> PricePrediction {
        let row = self.features(request);
        let output = self.ensemble.predict(&row);
        debug!(
            machine_type = %request.machine_type,
            price = output.price,
            "price predicted"
        );
        PricePrediction {
            price: output.price,
            rounded: round2(output.price),
            components: output.components,
            reconciliation: self.ensemble.reconciliation(),
            location: None,
        }
    }

    /// Predict with live collaborators. Weather is fetched only when the
    /// request carries none; the location is attached for display.
    pub fn predict_with(
        &self,
        request: &RawRequest,
        weather: &dyn WeatherSource,
        geocoder: &dyn Geocoder,
    ) -> PricePrediction {
        let location = geocoder.locate(&request.pincode);
        let mut request = request.clone();
        if request.weather_missing() {
            weather.current(&location).apply_to(&mut request);
        }
        let mut prediction = self.predict(&request);
        prediction.location = Some(location);
        prediction
    }

    /// Fingerprints of the artifacts that were present at load
    pub fn fingerprints(&self) -> &BTreeMap<ArtifactKind, String> {
        &self.fingerprints
    }

}

/// Slot for a context that is loaded after the service starts
#[derive(Debug, Default)]
pub struct ContextHandle {
    cell: OnceCell<Arc<ModelContext>>,
}

impl ContextHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the loaded context. Only the first install succeeds.
    pub fn install(&self, context: ModelContext) -> Result<Arc<ModelContext>> {
        let context = Arc::new(context);
        self.cell
            .set(Arc::clone(&context))
            .map_err(|_| PricingError::Config("model context already installed".to_string()))?;
        Ok(context)
    }

    pub fn is_ready(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> Result<Arc<ModelContext>> {
        self.cell.get().cloned().ok_or(PricingError::ServiceUnavailable)
    }

    pub fn predict(&self, request: &RawRequest) -> Result<PricePrediction> {
        Ok(self.get()?.predict(request))
    }
}

fn optional<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    kind: ArtifactKind,
    fingerprints: &mut BTreeMap<ArtifactKind, String>,
) -> Result<Option<T>> {
    match load_artifact::<T>(store, kind)? {
        Some(loaded) => {
            fingerprints.insert(kind, loaded.fingerprint);
            Ok(Some(loaded.payload))
        }
        None => {
            warn!(artifact = %kind, "optional artifact absent, using default");
            Ok(None)
        }
    }
}

fn required<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    kind: ArtifactKind,
    fingerprints: &mut BTreeMap<ArtifactKind, String>,
) -> Result<T> {
    let loaded = load_required::<T>(store, kind)?;
    fingerprints.insert(kind, loaded.fingerprint);
    Ok(loaded.payload)
}

fn verify_hash(kind: ArtifactKind, computed: &str, expected: Option<&str>) -> Result<()> {
    match expected {
        Some(expected) if !expected.eq_ignore_ascii_case(computed) => {
            Err(PricingError::HashMismatch {
                artifact: kind.name().to_string(),
                expected: expected.to_string(),
                computed: computed.to_string(),
            })
        }
        _ => Ok(()),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
