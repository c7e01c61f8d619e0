//! Encoding layer
//!
//! Applies the machine-type encodings fit at training time: a frequency
//! table, a target encoder (median target per type), and a hybrid of the two.
//! Unseen types never fail; they fall back to the stored global median.

use crate::features::{FeatureRow, NumericColumn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Row counts per machine type in the training set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyTable {
    counts: BTreeMap<String, u64>,
}

impl FrequencyTable {
    pub fn new(counts: BTreeMap<String, u64>) -> Self {
        Self { counts }
    }

    pub fn get(&self, machine_type: &str) -> Option<f64> {
        self.counts.get(machine_type).map(|c| *c as f64)
    }

    /// Count for `machine_type`, or 0 when unseen.
    pub fn count(&self, machine_type: &str) -> u64 {
        self.counts.get(machine_type).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<(String, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self {
            counts: iter.into_iter().collect(),
        }
    }
}

/// Median target per machine type, with a global-median fallback
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetEncoder {
    pub te_dict: BTreeMap<String, f64>,
    pub global_median: f64,
}

impl TargetEncoder {
    pub fn encode(&self, machine_type: &str) -> f64 {
        self.te_dict
            .get(machine_type)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or_else(|| self.fallback())
    }

    fn fallback(&self) -> f64 {
        if self.global_median.is_finite() {
            self.global_median
        } else {
            0.0
        }
    }
}

/// 0.5 x frequency count + 0.5 x target-encoded value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HybridEncoder {
    pub freq_dict: FrequencyTable,
    #[serde(flatten)]
    pub target: TargetEncoder,
}

impl HybridEncoder {
    pub fn encode(&self, machine_type: &str) -> f64 {
        let freq = self.freq_dict.count(machine_type) as f64;
        0.5 * freq + 0.5 * self.target.encode(machine_type)
    }
}

/// Add `machine_type_xgb` and `machine_type_lgb` to a built row.
pub fn apply_encoders(
    mut row: FeatureRow,
    target: &TargetEncoder,
    hybrid: &HybridEncoder,
) -> FeatureRow {
    let xgb = target.encode(&row.machine_type);
    let lgb = hybrid.encode(&row.machine_type);
    row.set(NumericColumn::MachineTypeXgb, xgb);
    row.set(NumericColumn::MachineTypeLgb, lgb);
    row
}
