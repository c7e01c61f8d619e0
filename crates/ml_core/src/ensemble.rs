//! Three-model ensemble predictor
//!
//! Regressor A reads the scaled numeric projection, B the raw numeric
//! projection, C the categorical-native projection. The price is the plain
//! mean of the three outputs.

use crate::errors::{PricingError, Result};
use crate::features::FeatureRow;
use crate::gbdt::{Model, ModelError};
use crate::layout::{ColumnLayout, Reconciliation, StandardScaler};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Raw ensemble output for one row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleOutput {
    /// A (scaled numeric), B (raw numeric), C (categorical-native)
    pub components: [f64; 3],
    pub price: f64,
}

/// Regressors plus the layouts and scaler that feed them
#[derive(Debug, Clone)]
pub struct EnsemblePredictor {
    scaled: Model,
    numeric: Model,
    categorical: Model,
    numeric_layout: ColumnLayout,
    mixed_layout: ColumnLayout,
    scaler: StandardScaler,
}

impl EnsemblePredictor {
    /// Assemble and validate the ensemble. A scaler of the wrong width, a
    /// tree that reads past its projection, or a categorical split in a
    /// numeric model is rejected here rather than at predict time.
    pub fn new(
        scaled: Model,
        numeric: Model,
        categorical: Model,
        numeric_layout: ColumnLayout,
        mixed_layout: ColumnLayout,
        scaler: Option<StandardScaler>,
    ) -> Result<Self> {
        let scaler = scaler.unwrap_or_else(|| StandardScaler::identity(numeric_layout.len()));
        scaler.validate("scaler", numeric_layout.len())?;

        check_model("regressor_scaled", &scaled, false, numeric_layout.len())?;
        check_model("regressor_numeric", &numeric, false, numeric_layout.len())?;
        check_model("regressor_categorical", &categorical, true, mixed_layout.len())?;

        Ok(Self {
            scaled,
            numeric,
            categorical,
            numeric_layout,
            mixed_layout,
            scaler,
        })
    }

    pub fn reconciliation(&self) -> Reconciliation {
        self.numeric_layout
            .reconciliation()
            .merge(self.mixed_layout.reconciliation())
    }

    pub fn numeric_layout(&self) -> &ColumnLayout {
        &self.numeric_layout
    }

    pub fn mixed_layout(&self) -> &ColumnLayout {
        &self.mixed_layout
    }

    pub fn predict(&self, row: &FeatureRow) -> EnsembleOutput {
        let raw = self.numeric_layout.project_numeric(row);

        let mut scaled = raw.clone();
        self.scaler.transform(&mut scaled);
        for value in scaled.iter_mut() {
            if !value.is_finite() {
                *value = 0.0;
            }
        }

        let mixed = self.mixed_layout.project_mixed(row);

        let components = [
            self.scaled.score(scaled.as_slice()),
            self.numeric.score(raw.as_slice()),
            self.categorical.score(mixed.as_slice()),
        ];
        let price = components.iter().sum::<f64>() / components.len() as f64;

        let rec = self.reconciliation();
        debug!(
            a = components[0],
            b = components[1],
            c = components[2],
            missing_columns = rec.missing,
            extra_columns = rec.extra,
            "ensemble prediction"
        );

        EnsembleOutput { components, price }
    }

    /// Blake3 fingerprints of the three regressors, in A, B, C order
    pub fn fingerprints(&self) -> Result<[String; 3]> {
        Ok([
            model_hash("regressor_scaled", &self.scaled)?,
            model_hash("regressor_numeric", &self.numeric)?,
            model_hash("regressor_categorical", &self.categorical)?,
        ])
    }
}

fn check_model(artifact: &str, model: &Model, allow_categorical: bool, width: usize) -> Result<()> {
    model
        .validate(allow_categorical)
        .and_then(|_| model.check_width(width))
        .map_err(|e| invalid(artifact, e))
}

fn model_hash(artifact: &str, model: &Model) -> Result<String> {
    model.hash_hex().map_err(|e| invalid(artifact, e))
}

fn invalid(artifact: &str, error: ModelError) -> PricingError {
    PricingError::InvalidArtifact {
        artifact: artifact.to_string(),
        reason: error.to_string(),
    }
}
