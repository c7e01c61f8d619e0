//! Demand statistics store
//!
//! Read-only medians of the history-dependent fields a caller cannot supply:
//! previous prices, recent bookings, stock, and market trend. Lookups resolve
//! per machine type first, then globally, then to a literal zero.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One of the five history-dependent fields tracked per machine type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemandField {
    OldRentalPrice,
    LastYearPrice,
    Bookings7d,
    StockOnHand,
    MarketTrendScore,
}

impl DemandField {
    pub const ALL: [DemandField; 5] = [
        DemandField::OldRentalPrice,
        DemandField::LastYearPrice,
        DemandField::Bookings7d,
        DemandField::StockOnHand,
        DemandField::MarketTrendScore,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DemandField::OldRentalPrice => "old_rental_price",
            DemandField::LastYearPrice => "last_year_price",
            DemandField::Bookings7d => "bookings_7d",
            DemandField::StockOnHand => "stock_on_hand",
            DemandField::MarketTrendScore => "market_trend_score",
        }
    }
}

/// Medians for one machine type (or the global population).
///
/// Every field is optional: a field the training data never carried is
/// serialized as `null` and falls through to the next resolution level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandRecord {
    pub old_rental_price: Option<f64>,
    pub last_year_price: Option<f64>,
    pub bookings_7d: Option<f64>,
    pub stock_on_hand: Option<f64>,
    pub market_trend_score: Option<f64>,
}

impl DemandRecord {
    pub fn get(&self, field: DemandField) -> Option<f64> {
        let value = match field {
            DemandField::OldRentalPrice => self.old_rental_price,
            DemandField::LastYearPrice => self.last_year_price,
            DemandField::Bookings7d => self.bookings_7d,
            DemandField::StockOnHand => self.stock_on_hand,
            DemandField::MarketTrendScore => self.market_trend_score,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn set(&mut self, field: DemandField, value: Option<f64>) {
        let slot = match field {
            DemandField::OldRentalPrice => &mut self.old_rental_price,
            DemandField::LastYearPrice => &mut self.last_year_price,
            DemandField::Bookings7d => &mut self.bookings_7d,
            DemandField::StockOnHand => &mut self.stock_on_hand,
            DemandField::MarketTrendScore => &mut self.market_trend_score,
        };
        *slot = value;
    }
}

/// Fully resolved demand values fed into the feature row
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandFields {
    pub old_rental_price: f64,
    pub last_year_price: f64,
    pub bookings_7d: f64,
    pub stock_on_hand: f64,
    pub market_trend_score: f64,
}

impl DemandFields {
    pub fn get(&self, field: DemandField) -> f64 {
        match field {
            DemandField::OldRentalPrice => self.old_rental_price,
            DemandField::LastYearPrice => self.last_year_price,
            DemandField::Bookings7d => self.bookings_7d,
            DemandField::StockOnHand => self.stock_on_hand,
            DemandField::MarketTrendScore => self.market_trend_score,
        }
    }

    fn set(&mut self, field: DemandField, value: f64) {
        match field {
            DemandField::OldRentalPrice => self.old_rental_price = value,
            DemandField::LastYearPrice => self.last_year_price = value,
            DemandField::Bookings7d => self.bookings_7d = value,
            DemandField::StockOnHand => self.stock_on_hand = value,
            DemandField::MarketTrendScore => self.market_trend_score = value,
        }
    }
}

/// Demand statistics artifact payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandStats {
    pub by_type: BTreeMap<String, DemandRecord>,
    pub global: DemandRecord,
}

impl DemandStats {
    /// Resolve `field` for `machine_type`: type median, then global median, then 0.0.
    pub fn lookup(&self, machine_type: &str, field: DemandField) -> f64 {
        self.by_type
            .get(machine_type)
            .and_then(|record| record.get(field))
            .or_else(|| self.global.get(field))
            .unwrap_or(0.0)
    }

    /// Resolve all five fields, letting finite caller-supplied values win.
    pub fn resolve(&self, machine_type: &str, overrides: &DemandRecord) -> DemandFields {
        let mut fields = DemandFields::default();
        for field in DemandField::ALL {
            let value = overrides
                .get(field)
                .unwrap_or_else(|| self.lookup(machine_type, field));
            fields.set(field, value);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.global == DemandRecord::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> DemandStats {
        let mut by_type = BTreeMap::new();
        by_type.insert(
            "Tractor".to_string(),
            DemandRecord {
                old_rental_price: Some(1100.0),
                last_year_price: Some(1000.0),
                bookings_7d: None,
                stock_on_hand: Some(4.0),
                market_trend_score: Some(0.7),
            },
        );
        DemandStats {
            by_type,
            global: DemandRecord {
                old_rental_price: Some(900.0),
                last_year_price: Some(850.0),
                bookings_7d: Some(3.0),
                stock_on_hand: Some(6.0),
                market_trend_score: None,
            },
        }
    }

    #[test]
    fn type_median_wins() {
        assert_eq!(stats().lookup("Tractor", DemandField::OldRentalPrice), 1100.0);
    }

    #[test]
    fn null_type_field_falls_back_to_global() {
        assert_eq!(stats().lookup("Tractor", DemandField::Bookings7d), 3.0);
    }

    #[test]
    fn unknown_type_returns_global_not_zero() {
        let s = stats();
        assert_eq!(s.lookup("Seed Drill", DemandField::LastYearPrice), 850.0);
        assert_eq!(s.lookup("Seed Drill", DemandField::StockOnHand), 6.0);
    }

    #[test]
    fn missing_everywhere_is_zero() {
        assert_eq!(stats().lookup("Seed Drill", DemandField::MarketTrendScore), 0.0);
        assert_eq!(
            DemandStats::default().lookup("Tractor", DemandField::OldRentalPrice),
            0.0
        );
    }

    #[test]
    fn overrides_take_precedence_when_finite() {
        let overrides = DemandRecord {
            bookings_7d: Some(12.0),
            stock_on_hand: Some(f64::NAN),
            ..Default::default()
        };
        let fields = stats().resolve("Tractor", &overrides);
        assert_eq!(fields.bookings_7d, 12.0);
        assert_eq!(fields.stock_on_hand, 4.0);
        assert_eq!(fields.old_rental_price, 1100.0);
    }

    #[test]
    fn null_fields_deserialize() {
        let json =
            r#"{"by_type":{"Tractor":{"old_rental_price":null,"bookings_7d":2}},"global":{}}"#;
        let s: DemandStats = serde_json::from_str(json).unwrap();
        assert_eq!(s.lookup("Tractor", DemandField::Bookings7d), 2.0);
        assert_eq!(s.lookup("Tractor", DemandField::OldRentalPrice), 0.0);
    }
}
