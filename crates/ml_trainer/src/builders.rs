//! Statistics, encoder, and layout builders
//!
//! Everything here is a pure function of the cleaned dataset and a seed.
//! `ArtifactBundle::write` persists the results in the envelope format the
//! inference context loads.

use crate::dataset::{RentalDataset, RentalRow};
use crate::encoders::{fit_hybrid_encoder, fit_target_encoder, frequency_table};
use crate::errors::TrainerError;
use agrirent_ml_core::artifacts::save_artifact;
use agrirent_ml_core::calendar::parse_month;
use agrirent_ml_core::demand::DemandRecord;
use agrirent_ml_core::features::CategoricalColumn;
use agrirent_ml_core::layout::{CategoricalColumns, StandardScaler};
use agrirent_ml_core::seasonal::SeasonalPolicy;
use agrirent_ml_core::stats::median;
use agrirent_ml_core::{
    build_batch, ArtifactKind, ArtifactStore, DemandField, DemandStats, FeatureRow,
    FrequencyTable, HybridEncoder, NumericColumn, RawRecord, SeasonalStats, TargetEncoder,
};
use std::collections::BTreeMap;
use tracing::{info, instrument};

fn demand_value(row: &RentalRow, field: DemandField) -> Option<f64> {
    match field {
        DemandField::OldRentalPrice => row.old_rental_price,
        DemandField::LastYearPrice => row.last_year_price,
        DemandField::Bookings7d => row.bookings_7d,
        DemandField::StockOnHand => row.stock_on_hand,
        DemandField::MarketTrendScore => row.market_trend_score,
    }
}

fn demand_medians<'a>(rows: impl Iterator<Item = &'a RentalRow> + Clone) -> DemandRecord {
    let mut record = DemandRecord::default();
    for field in DemandField::ALL {
        let values: Vec<f64> = rows.clone().filter_map(|r| demand_value(r, field)).collect();
        record.set(field, median(&values));
    }
    record
}

/// Per-type and global medians of the five demand fields
pub fn build_demand_stats(rows: &[RentalRow]) -> DemandStats {
    let mut grouped: BTreeMap<&str, Vec<&RentalRow>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.machine_type()).or_default().push(row);
    }

    DemandStats {
        by_type: grouped
            .into_iter()
            .map(|(machine_type, group)| {
                (machine_type.to_string(), demand_medians(group.into_iter()))
            })
            .collect(),
        global: demand_medians(rows.iter()),
    }
}

/// Median price per (type, month), per month, and overall.
///
/// Rows without a parsable month only count toward the global median when no
/// row has one.
pub fn build_seasonal_stats(rows: &[RentalRow]) -> SeasonalStats {
    let dated: Vec<(&RentalRow, u32)> = rows
        .iter()
        .filter_map(|r| r.created_at.as_deref().and_then(parse_month).map(|m| (r, m)))
        .collect();

    if dated.is_empty() {
        let prices: Vec<f64> = rows.iter().map(RentalRow::price).collect();
        return SeasonalStats {
            global_median: median(&prices).unwrap_or(0.0),
            ..Default::default()
        };
    }

    let mut by_type: BTreeMap<String, BTreeMap<u32, Vec<f64>>> = BTreeMap::new();
    let mut by_month: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (row, month) in &dated {
        by_type
            .entry(row.machine_type().to_string())
            .or_default()
            .entry(*month)
            .or_default()
            .push(row.price());
        by_month.entry(*month).or_default().push(row.price());
    }

    let medians = |groups: BTreeMap<u32, Vec<f64>>| -> BTreeMap<u32, f64> {
        groups
            .into_iter()
            .filter_map(|(month, prices)| median(&prices).map(|m| (month, m)))
            .collect()
    };

    let prices: Vec<f64> = dated.iter().map(|(r, _)| r.price()).collect();
    SeasonalStats {
        by_type: by_type
            .into_iter()
            .map(|(machine_type, months)| (machine_type, medians(months)))
            .collect(),
        by_month: medians(by_month),
        global_median: median(&prices).unwrap_or(0.0),
    }
}

/// Mean and population standard deviation of each named numeric column.
/// Constant columns get scale 1.
pub fn fit_scaler(rows: &[FeatureRow], columns: &[NumericColumn]) -> StandardScaler {
    let n = rows.len().max(1) as f64;
    let mut mean = Vec::with_capacity(columns.len());
    let mut scale = Vec::with_capacity(columns.len());
    for column in columns {
        let mu = rows.iter().map(|r| r.get(*column)).sum::<f64>() / n;
        let var = rows.iter().map(|r| (r.get(*column) - mu).powi(2)).sum::<f64>() / n;
        let sd = var.sqrt();
        mean.push(mu);
        scale.push(if sd > 0.0 && sd.is_finite() { sd } else { 1.0 });
    }
    StandardScaler { mean, scale }
}

/// Column order for the numeric regressors
pub fn numeric_columns() -> Vec<String> {
    NumericColumn::ALL.iter().map(|c| c.name().to_string()).collect()
}

/// Column order for the categorical regressor: native categoricals first
pub fn categorical_columns() -> CategoricalColumns {
    let mut columns: Vec<String> = CategoricalColumn::ALL
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let cat_features_idx = (0..columns.len()).collect();
    columns.extend(numeric_columns());
    CategoricalColumns {
        columns,
        cat_features_idx,
    }
}

/// Everything the trainer emits
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub demand: DemandStats,
    pub seasonal: SeasonalStats,
    pub frequency: FrequencyTable,
    pub target: TargetEncoder,
    pub hybrid: HybridEncoder,
    pub scaler: StandardScaler,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: CategoricalColumns,
}

impl ArtifactBundle {
    /// Build every artifact from a cleaned dataset.
    #[instrument(skip_all, fields(rows = dataset.len(), seed = seed))]
    pub fn build(dataset: &RentalDataset, seed: i64) -> Result<Self, TrainerError> {
        if dataset.is_empty() {
            return Err(TrainerError::Training("no rows to fit on".to_string()));
        }

        let demand = build_demand_stats(&dataset.rows);
        let seasonal = build_seasonal_stats(&dataset.rows);

        let machine_types = dataset.machine_types();
        let prices = dataset.prices();
        let frequency = frequency_table(&machine_types);
        let target = fit_target_encoder(&machine_types, &prices, seed);
        let hybrid = fit_hybrid_encoder(&machine_types, &prices, seed);

        let rows = training_rows(
            dataset,
            &demand,
            &seasonal,
            &frequency,
            &target.encoded,
            &hybrid.encoded,
        );
        let scaler = fit_scaler(&rows, NumericColumn::ALL);

        info!(
            machine_types = frequency.len(),
            months = seasonal.by_month.len(),
            global_median = seasonal.global_median,
            "artifacts fit"
        );

        Ok(Self {
            demand,
            seasonal,
            frequency,
            target: target.encoder,
            hybrid: hybrid.encoder,
            scaler,
            numeric_columns: numeric_columns(),
            categorical_columns: categorical_columns(),
        })
    }

    /// Persist every artifact; returns the payload fingerprints.
    pub fn write(
        &self,
        store: &dyn ArtifactStore,
    ) -> Result<BTreeMap<ArtifactKind, String>, TrainerError> {
        let mut prints = BTreeMap::new();
        prints.insert(
            ArtifactKind::DemandStats,
            save_artifact(store, ArtifactKind::DemandStats, &self.demand)?,
        );
        prints.insert(
            ArtifactKind::SeasonalStats,
            save_artifact(store, ArtifactKind::SeasonalStats, &self.seasonal)?,
        );
        prints.insert(
            ArtifactKind::FrequencyTable,
            save_artifact(store, ArtifactKind::FrequencyTable, &self.frequency)?,
        );
        prints.insert(
            ArtifactKind::TargetEncoder,
            save_artifact(store, ArtifactKind::TargetEncoder, &self.target)?,
        );
        prints.insert(
            ArtifactKind::HybridEncoder,
            save_artifact(store, ArtifactKind::HybridEncoder, &self.hybrid)?,
        );
        prints.insert(
            ArtifactKind::Scaler,
            save_artifact(store, ArtifactKind::Scaler, &self.scaler)?,
        );
        prints.insert(
            ArtifactKind::NumericColumns,
            save_artifact(store, ArtifactKind::NumericColumns, &self.numeric_columns)?,
        );
        prints.insert(
            ArtifactKind::CategoricalColumns,
            save_artifact(store, ArtifactKind::CategoricalColumns, &self.categorical_columns)?,
        );
        info!(artifacts = prints.len(), store = %store.describe(), "artifacts written");
        Ok(prints)
    }
}

/// Engineer the training rows the way inference does, with out-of-fold
/// encodings in place of the dictionary lookups.
pub fn training_rows(
    dataset: &RentalDataset,
    demand: &DemandStats,
    seasonal: &SeasonalStats,
    frequency: &FrequencyTable,
    target_encoded: &[f64],
    hybrid_encoded: &[f64],
) -> Vec<FeatureRow> {
    let policy = SeasonalPolicy::default();
    let records: Vec<RawRecord> = dataset
        .rows
        .iter()
        .map(|row| RawRecord::assemble(&row.to_request(), demand, seasonal, &policy))
        .collect();

    let mut rows = build_batch(&records, Some(frequency));
    for (i, row) in rows.iter_mut().enumerate() {
        row.set(NumericColumn::MachineTypeXgb, target_encoded.get(i).copied().unwrap_or(0.0));
        row.set(NumericColumn::MachineTypeLgb, hybrid_encoded.get(i).copied().unwrap_or(0.0));
    }
    rows
}
