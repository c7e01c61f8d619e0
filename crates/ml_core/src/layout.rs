//! Trained column layouts and the per-model projections.
//!
//! Column names from the artifacts are resolved once, at load time, into
//! typed slots. Names the feature row does not know become `Unknown` slots
//! and are filled with 0 (numeric) or "Unknown" (categorical) on every
//! projection.

use crate::errors::{PricingError, Result};
use crate::features::{CategoricalColumn, Column, FeatureRow, NumericColumn, UNKNOWN_CATEGORY};
use crate::gbdt::FeatureValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Ordered categorical-inclusive column list with the categorical positions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumns {
    pub columns: Vec<String>,
    pub cat_features_idx: Vec<usize>,
}

/// One trained column resolved against the feature row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSlot {
    Numeric(NumericColumn),
    Categorical(CategoricalColumn),
    Unknown { name: String, categorical: bool },
}

impl ColumnSlot {
    pub fn is_unknown(&self) -> bool {
        matches!(self, ColumnSlot::Unknown { .. })
    }
}

/// How far a trained layout diverges from the feature row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Trained columns the row cannot supply (filled with 0 / "Unknown")
    pub missing: usize,
    /// Row columns the layout does not use (dropped)
    pub extra: usize,
}

impl Reconciliation {
    pub fn merge(self, other: Reconciliation) -> Reconciliation {
        Reconciliation {
            missing: self.missing + other.missing,
            extra: self.extra + other.extra,
        }
    }
}

/// Resolved column order for one projection
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    artifact: String,
    slots: Vec<ColumnSlot>,
    reconciliation: Reconciliation,
}

impl ColumnLayout {
    /// Resolve a purely numeric column list.
    pub fn numeric(artifact: &str, names: &[String]) -> Result<Self> {
        let slots = names
            .iter()
            .map(|name| match Column::from_name(name) {
                Some(Column::Numeric(c)) => Ok(ColumnSlot::Numeric(c)),
                Some(Column::Categorical(_)) => Err(PricingError::SchemaMismatch {
                    artifact: artifact.to_string(),
                    expected: format!("numeric column at {name}"),
                    found: "categorical column".to_string(),
                }),
                None => Ok(ColumnSlot::Unknown {
                    name: name.clone(),
                    categorical: false,
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        Self::finish(artifact, slots)
    }

    /// Resolve a categorical-inclusive list; `cat_features_idx` marks the
    /// positions that must be categorical.
    pub fn mixed(artifact: &str, spec: &CategoricalColumns) -> Result<Self> {
        let flagged: BTreeSet<usize> = spec.cat_features_idx.iter().copied().collect();
        if let Some(bad) = flagged.iter().find(|i| **i >= spec.columns.len()) {
            return Err(PricingError::InvalidArtifact {
                artifact: artifact.to_string(),
                reason: format!(
                    "categorical index {bad} out of range for {} columns",
                    spec.columns.len()
                ),
            });
        }

        let slots = spec
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let categorical = flagged.contains(&i);
                match (Column::from_name(name), categorical) {
                    (Some(Column::Numeric(c)), false) => Ok(ColumnSlot::Numeric(c)),
                    (Some(Column::Categorical(c)), true) => Ok(ColumnSlot::Categorical(c)),
                    (Some(column), _) => Err(PricingError::SchemaMismatch {
                        artifact: artifact.to_string(),
                        expected: format!(
                            "{} column at {}",
                            if categorical { "categorical" } else { "numeric" },
                            column.name()
                        ),
                        found: format!(
                            "{} column",
                            if categorical { "numeric" } else { "categorical" }
                        ),
                    }),
                    (None, categorical) => Ok(ColumnSlot::Unknown {
                        name: name.clone(),
                        categorical,
                    }),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Self::finish(artifact, slots)
    }

    fn finish(artifact: &str, slots: Vec<ColumnSlot>) -> Result<Self> {
        if slots.is_empty() {
            return Err(PricingError::InvalidArtifact {
                artifact: artifact.to_string(),
                reason: "column list is empty".to_string(),
            });
        }

        let known: BTreeSet<&'static str> = slots
            .iter()
            .filter_map(|slot| match slot {
                ColumnSlot::Numeric(c) => Some(c.name()),
                ColumnSlot::Categorical(c) => Some(c.name()),
                ColumnSlot::Unknown { .. } => None,
            })
            .collect();
        let missing = slots.iter().filter(|s| s.is_unknown()).count();
        let reconciliation = Reconciliation {
            missing,
            extra: Column::count().saturating_sub(known.len()),
        };

        for slot in &slots {
            if let ColumnSlot::Unknown { name, categorical } = slot {
                debug!(
                    artifact,
                    column = %name,
                    categorical,
                    "trained column not produced by feature builder"
                );
            }
        }

        Ok(Self {
            artifact: artifact.to_string(),
            slots,
            reconciliation,
        })
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn slots(&self) -> &[ColumnSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn reconciliation(&self) -> Reconciliation {
        self.reconciliation
    }

    /// Numeric projection in trained order; anything non-numeric reads 0.0.
    pub fn project_numeric(&self, row: &FeatureRow) -> Vec<f64> {
        self.slots
            .iter()
            .map(|slot| match slot {
                ColumnSlot::Numeric(c) => row.get(*c),
                _ => 0.0,
            })
            .collect()
    }

    /// Mixed projection for the categorical-native model.
    pub fn project_mixed(&self, row: &FeatureRow) -> Vec<FeatureValue> {
        self.slots
            .iter()
            .map(|slot| match slot {
                ColumnSlot::Numeric(c) => FeatureValue::Number(row.get(*c)),
                ColumnSlot::Categorical(c) => FeatureValue::Category(row.category(*c).to_string()),
                ColumnSlot::Unknown { categorical: true, .. } => {
                    FeatureValue::Category(UNKNOWN_CATEGORY.to_string())
                }
                ColumnSlot::Unknown { categorical: false, .. } => FeatureValue::Number(0.0),
            })
            .collect()
    }
}

/// Per-column standardization fit on the training numeric columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Scaler that leaves a projection unchanged
    pub fn identity(width: usize) -> Self {
        Self {
            mean: vec![0.0; width],
            scale: vec![1.0; width],
        }
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn validate(&self, artifact: &str, width: usize) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            return Err(PricingError::InvalidArtifact {
                artifact: artifact.to_string(),
                reason: format!(
                    "mean has {} entries but scale has {}",
                    self.mean.len(),
                    self.scale.len()
                ),
            });
        }
        if self.mean.len() != width {
            return Err(PricingError::SchemaMismatch {
                artifact: artifact.to_string(),
                expected: format!("{width} columns"),
                found: format!("{} columns", self.mean.len()),
            });
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(PricingError::InvalidArtifact {
                artifact: artifact.to_string(),
                reason: "non-finite mean".to_string(),
            });
        }
        Ok(())
    }

    /// (x - mean) / scale, in place. A zero or non-finite scale divides by 1.
    pub fn transform(&self, values: &mut [f64]) {
        for (i, value) in values.iter_mut().enumerate() {
            let mean = self.mean.get(i).copied().unwrap_or(0.0);
            let scale = self
                .scale
                .get(i)
                .copied()
                .filter(|s| s.is_finite() && *s != 0.0)
                .unwrap_or(1.0);
            *value = (*value - mean) / scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{build_features, RawRecord};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn row() -> FeatureRow {
        let mut record = RawRecord::new("Tractor")
            .with(NumericColumn::Horsepower, 45.0)
            .with(NumericColumn::HoursUsed, 120.0);
        record.pincode = Some("641001".to_string());
        build_features(&record, None)
    }

    #[test]
    fn numeric_layout_fills_unknown_with_zero() {
        let layout =
            ColumnLayout::numeric("numeric_columns", &names(&["horsepower", "lat", "hours_used"]))
                .unwrap();
        assert_eq!(layout.project_numeric(&row()), vec![45.0, 0.0, 120.0]);
        let rec = layout.reconciliation();
        assert_eq!(rec.missing, 1);
        assert_eq!(rec.extra, Column::count() - 2);
    }

    #[test]
    fn numeric_layout_rejects_categorical_name() {
        let err = ColumnLayout::numeric("numeric_columns", &names(&["machine_type"])).unwrap_err();
        assert!(matches!(err, PricingError::SchemaMismatch { .. }));
    }

    #[test]
    fn mixed_layout_projects_categories() {
        let spec = CategoricalColumns {
            columns: names(&["machine_type", "horsepower", "pincode_str", "district", "ghost"]),
            cat_features_idx: vec![0, 2, 3],
        };
        let layout = ColumnLayout::mixed("categorical_columns", &spec).unwrap();
        assert_eq!(
            layout.project_mixed(&row()),
            vec![
                FeatureValue::Category("Tractor".into()),
                FeatureValue::Number(45.0),
                FeatureValue::Category("641001".into()),
                FeatureValue::Category("Unknown".into()),
                FeatureValue::Number(0.0),
            ]
        );
        assert_eq!(layout.reconciliation().missing, 2);
    }

    #[test]
    fn mixed_layout_flag_conflicts() {
        let numeric_flagged = CategoricalColumns {
            columns: names(&["horsepower"]),
            cat_features_idx: vec![0],
        };
        assert!(matches!(
            ColumnLayout::mixed("categorical_columns", &numeric_flagged),
            Err(PricingError::SchemaMismatch { .. })
        ));

        let categorical_unflagged = CategoricalColumns {
            columns: names(&["machine_type"]),
            cat_features_idx: vec![],
        };
        assert!(ColumnLayout::mixed("categorical_columns", &categorical_unflagged).is_err());

        let out_of_range = CategoricalColumns {
            columns: names(&["machine_type"]),
            cat_features_idx: vec![4],
        };
        assert!(matches!(
            ColumnLayout::mixed("categorical_columns", &out_of_range),
            Err(PricingError::InvalidArtifact { .. })
        ));
    }

    #[test]
    fn empty_layout_is_invalid() {
        assert!(ColumnLayout::numeric("numeric_columns", &[]).is_err());
    }

    #[test]
    fn scaler_transform_and_guards() {
        let scaler = StandardScaler {
            mean: vec![10.0, 5.0, 1.0],
            scale: vec![2.0, 0.0, f64::NAN],
        };
        let mut values = vec![14.0, 7.0, 3.0];
        scaler.transform(&mut values);
        assert_eq!(values, vec![2.0, 2.0, 2.0]);

        assert!(scaler.validate("scaler", 3).is_ok());
        assert!(scaler.validate("scaler", 4).is_err());

        let mut same = vec![1.5, -2.0];
        StandardScaler::identity(2).transform(&mut same);
        assert_eq!(same, vec![1.5, -2.0]);
    }
}
