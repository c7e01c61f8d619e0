//! Seasonal statistics store
//!
//! Median historical prices per (machine type, month) and per month, turned
//! into a bounded demand score relative to the global median.

use crate::calendar::parse_month;
use crate::errors::{PricingError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Month assumed when `created_at` cannot be parsed
pub const DEFAULT_MONTH: u32 = 6;

/// Lower and upper bound of the seasonal demand score
pub const SCORE_BOUNDS: (f64, f64) = (0.5, 1.5);

/// Seasonal statistics artifact payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalStats {
    pub by_type: BTreeMap<String, BTreeMap<u32, f64>>,
    pub by_month: BTreeMap<u32, f64>,
    pub global_median: f64,
}

/// Thresholds and defaults applied when scoring a date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPolicy {
    pub default_month: u32,
    pub peak_threshold: f64,
    pub off_threshold: f64,
}

impl Default for SeasonalPolicy {
    fn default() -> Self {
        Self {
            default_month: DEFAULT_MONTH,
            peak_threshold: 1.1,
            off_threshold: 0.9,
        }
    }
}

impl SeasonalPolicy {
    /// Reject thresholds under which a score could be both peak and off
    /// season.
    pub fn check(&self) -> Result<()> {
        if !(1..=12).contains(&self.default_month) {
            return Err(PricingError::Config(format!(
                "default_month must be in 1..=12, got {}",
                self.default_month
            )));
        }
        if !self.peak_threshold.is_finite() || !self.off_threshold.is_finite() {
            return Err(PricingError::Config(
                "season thresholds must be finite".to_string(),
            ));
        }
        if self.peak_threshold <= self.off_threshold {
            return Err(PricingError::Config(format!(
                "peak_threshold {} must be above off_threshold {}",
                self.peak_threshold, self.off_threshold
            )));
        }
        Ok(())
    }
}

/// Season-aware features derived for one request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalFeatures {
    pub seasonal_demand_score: f64,
    pub season_month: u32,
    pub is_peak_season: u8,
    pub is_off_season: u8,
}

impl Default for SeasonalFeatures {
    fn default() -> Self {
        Self {
            seasonal_demand_score: 1.0,
            season_month: DEFAULT_MONTH,
            is_peak_season: 0,
            is_off_season: 0,
        }
    }
}

impl SeasonalStats {
    /// Score `created_at` for `machine_type` with the default policy.
    pub fn estimate(&self, machine_type: &str, created_at: Option<&str>) -> SeasonalFeatures {
        self.estimate_with(machine_type, created_at, &SeasonalPolicy::default())
    }

    pub fn estimate_with(
        &self,
        machine_type: &str,
        created_at: Option<&str>,
        policy: &SeasonalPolicy,
    ) -> SeasonalFeatures {
        let month = match created_at.and_then(parse_month) {
            Some(m) => m,
            None => {
                warn!(
                    created_at = created_at.unwrap_or(""),
                    default_month = policy.default_month,
                    "unparsable created_at, using default month"
                );
                policy.default_month
            }
        };

        let global = self.normalizer();
        let base = self
            .by_type
            .get(machine_type)
            .and_then(|months| months.get(&month))
            .or_else(|| self.by_month.get(&month))
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(global);

        let raw = base / global;
        let score = if raw.is_finite() {
            raw.clamp(SCORE_BOUNDS.0, SCORE_BOUNDS.1)
        } else {
            1.0
        };

        SeasonalFeatures {
            seasonal_demand_score: score,
            season_month: month,
            is_peak_season: u8::from(score > policy.peak_threshold),
            is_off_season: u8::from(score < policy.off_threshold),
        }
    }

    /// Global median used as the denominator; 1.0 when absent or zero.
    fn normalizer(&self) -> f64 {
        if self.global_median.is_finite() && self.global_median != 0.0 {
            self.global_median
        } else {
            1.0
        }
    }
}
