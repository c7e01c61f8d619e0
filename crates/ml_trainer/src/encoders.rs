//! Machine-type encoder fitting
//!
//! The target encoder is fit out-of-fold: each row's training encoding comes
//! from medians over the other folds, so a row never sees its own price. The
//! persisted dictionary uses every row.

use crate::deterministic::kfold;
use agrirent_ml_core::stats::median;
use agrirent_ml_core::{FrequencyTable, HybridEncoder, TargetEncoder};
use std::collections::BTreeMap;
use tracing::debug;

/// Upper bound on the number of folds
pub const MAX_FOLDS: usize = 5;

/// Seed used for the fold shuffle
pub const DEFAULT_SEED: i64 = 42;

/// A fitted encoder and the per-row encodings it produced during fitting
#[derive(Debug, Clone, PartialEq)]
pub struct Fitted<E> {
    pub encoder: E,
    pub encoded: Vec<f64>,
}

/// Count of each machine type
pub fn frequency_table(categories: &[String]) -> FrequencyTable {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for category in categories {
        *counts.entry(category.clone()).or_default() += 1;
    }
    FrequencyTable::new(counts)
}

fn group_medians<'a, I>(rows: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = (&'a String, f64)>,
{
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (category, target) in rows {
        groups.entry(category.clone()).or_default().push(target);
    }
    groups
        .into_iter()
        .filter_map(|(category, values)| median(&values).map(|m| (category, m)))
        .collect()
}

/// Fit the target encoder with k = min(5, n) folds.
///
/// With a single row there is nothing to hold out and every row encodes to
/// the global median.
pub fn fit_target_encoder(
    categories: &[String],
    targets: &[f64],
    seed: i64,
) -> Fitted<TargetEncoder> {
    let n = categories.len().min(targets.len());
    let global_median = median(&targets[..n]).unwrap_or(0.0);
    let te_dict = group_medians(categories[..n].iter().zip(targets[..n].iter().copied()));

    let k = if n <= 1 { 1 } else { MAX_FOLDS.min(n) };
    let mut encoded = vec![global_median; n];

    for fold in kfold(n, k, seed) {
        let medians = group_medians(fold.train.iter().map(|&i| (&categories[i], targets[i])));
        for &i in &fold.validation {
            encoded[i] = medians.get(&categories[i]).copied().unwrap_or(global_median);
        }
    }

    debug!(rows = n, folds = k, categories = te_dict.len(), "target encoder fit");
    Fitted {
        encoder: TargetEncoder {
            te_dict,
            global_median,
        },
        encoded,
    }
}

/// Fit the hybrid encoder: 0.5 x frequency count + 0.5 x out-of-fold target
/// encoding.
pub fn fit_hybrid_encoder(
    categories: &[String],
    targets: &[f64],
    seed: i64,
) -> Fitted<HybridEncoder> {
    let freq_dict = frequency_table(categories);
    let target = fit_target_encoder(categories, targets, seed);

    let encoded = categories
        .iter()
        .zip(&target.encoded)
        .map(|(category, te)| 0.5 * freq_dict.count(category) as f64 + 0.5 * te)
        .collect();

    Fitted {
        encoder: HybridEncoder {
            freq_dict,
            target: target.encoder,
        },
        encoded,
    }
}
