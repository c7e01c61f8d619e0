//! Rentals CSV loading and cleaning
//!
//! Cleaning runs in a fixed order: rows without a positive `rental_price`
//! are dropped, missing numeric values are filled with their column median,
//! and prices outside the 1.5 x IQR band are removed.

use crate::errors::TrainerError;
use agrirent_ml_core::request::{DEFAULT_MACHINE_TYPE, DEFAULT_PINCODE};
use agrirent_ml_core::stats::{median, quantile};
use agrirent_ml_core::RawRequest;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

const NUMERIC_FIELDS: usize = 15;

/// One historical rental; unparsable numbers read as missing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RentalRow {
    #[serde(default)]
    pub machine_type: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub rental_price: Option<f64>,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub horsepower: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub age_years: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub hours_used: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub maintenance_cost: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub fuel_price: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub temp: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub pressure: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub wind_speed: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub rain: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub old_rental_price: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub last_year_price: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub bookings_7d: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub stock_on_hand: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub market_trend_score: Option<f64>,
}

impl RentalRow {
    /// Machine type with blanks read as `Unknown`
    pub fn machine_type(&self) -> &str {
        self.machine_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_MACHINE_TYPE)
    }

    pub fn price(&self) -> f64 {
        self.rental_price.unwrap_or(f64::NAN)
    }

    fn numeric_field(&mut self, idx: usize) -> Option<&mut Option<f64>> {
        self.numeric_fields().into_iter().nth(idx)
    }

    fn numeric_fields(&mut self) -> [&mut Option<f64>; NUMERIC_FIELDS] {
        [
            &mut self.horsepower,
            &mut self.age_years,
            &mut self.hours_used,
            &mut self.maintenance_cost,
            &mut self.fuel_price,
            &mut self.temp,
            &mut self.humidity,
            &mut self.pressure,
            &mut self.wind_speed,
            &mut self.rain,
            &mut self.old_rental_price,
            &mut self.last_year_price,
            &mut self.bookings_7d,
            &mut self.stock_on_hand,
            &mut self.market_trend_score,
        ]
    }

    /// The row as an inference request. Its own demand values act as
    /// overrides, exactly as a caller-supplied request would.
    pub fn to_request(&self) -> RawRequest {
        let pincode = self
            .pincode
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_PINCODE);
        RawRequest {
            machine_type: self.machine_type().to_string(),
            horsepower: self.horsepower.unwrap_or(0.0),
            age_years: self.age_years.unwrap_or(0.0),
            hours_used: self.hours_used.unwrap_or(0.0),
            pincode: pincode.to_string(),
            maintenance_cost: self.maintenance_cost.unwrap_or(0.0),
            fuel_price: self.fuel_price.unwrap_or(0.0),
            temp: self.temp.unwrap_or(0.0),
            humidity: self.humidity.unwrap_or(0.0),
            pressure: self.pressure.unwrap_or(0.0),
            wind_speed: self.wind_speed.unwrap_or(0.0),
            rain: self.rain.unwrap_or(0.0),
            created_at: self.created_at.clone(),
            old_rental_price: self.old_rental_price,
            last_year_price: self.last_year_price,
            bookings_7d: self.bookings_7d,
            stock_on_hand: self.stock_on_hand,
            market_trend_score: self.market_trend_score,
        }
    }
}

/// Row counts after each cleaning stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub loaded: usize,
    pub non_positive_price: usize,
    pub outliers: usize,
    pub kept: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RentalDataset {
    pub rows: Vec<RentalRow>,
}

impl RentalDataset {
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, TrainerError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            TrainerError::Dataset(format!("unable to open {}: {}", path.display(), e))
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TrainerError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut rows = Vec::new();
        for (line, result) in rdr.deserialize::<RentalRow>().enumerate() {
            let row =
                result.map_err(|e| TrainerError::Dataset(format!("row {}: {}", line + 1, e)))?;
            rows.push(row);
        }
        if rows.is_empty() {
            return Err(TrainerError::Dataset("dataset is empty".to_string()));
        }
        debug!(rows = rows.len(), "rentals loaded");
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.rows.iter().map(RentalRow::price).collect()
    }

    pub fn machine_types(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.machine_type().to_string()).collect()
    }

    /// Drop non-positive prices, median-fill, then drop price outliers.
    pub fn clean(&mut self) -> Result<CleanReport, TrainerError> {
        let loaded = self.rows.len();
        self.rows.retain(|r| r.price() > 0.0);
        let non_positive_price = loaded - self.rows.len();

        self.fill_medians();

        let prices = self.prices();
        let (q1, q3) = match (quantile(&prices, 0.25), quantile(&prices, 0.75)) {
            (Some(q1), Some(q3)) => (q1, q3),
            _ => {
                return Err(TrainerError::Dataset(
                    "no rows with a positive rental_price".to_string(),
                ))
            }
        };
        let iqr = q3 - q1;
        let (lo, hi) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
        let before = self.rows.len();
        self.rows.retain(|r| (lo..=hi).contains(&r.price()));
        let outliers = before - self.rows.len();

        let report = CleanReport {
            loaded,
            non_positive_price,
            outliers,
            kept: self.rows.len(),
        };
        info!(
            loaded = report.loaded,
            non_positive_price = report.non_positive_price,
            outliers = report.outliers,
            kept = report.kept,
            price_band_lo = lo,
            price_band_hi = hi,
            "dataset cleaned"
        );
        Ok(report)
    }

    /// Replace missing or non-finite numeric values with the column median.
    /// A column with no values at all stays missing.
    fn fill_medians(&mut self) {
        for idx in 0..NUMERIC_FIELDS {
            let values: Vec<f64> = self
                .rows
                .iter_mut()
                .filter_map(|r| r.numeric_field(idx).and_then(|v| *v))
                .collect();
            let Some(fill) = median(&values) else {
                continue;
            };
            for row in self.rows.iter_mut() {
                if let Some(slot) = row.numeric_field(idx) {
                    if !slot.is_some_and(f64::is_finite) {
                        *slot = Some(fill);
                    }
                }
            }
        }
    }
}
