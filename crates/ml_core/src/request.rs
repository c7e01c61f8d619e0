//! Caller-facing prediction request.
//!
//! Deserialization is lenient: numbers may arrive as JSON numbers, numeric
//! strings, or `null`, and anything unparsable reads as 0.0 for the base
//! inputs or "not supplied" for the demand overrides.

use crate::demand::DemandRecord;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_MACHINE_TYPE: &str = "Unknown";
pub const DEFAULT_PINCODE: &str = "000000";

/// Raw attributes of one rental price query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRequest {
    #[serde(default = "default_machine_type", deserialize_with = "machine_type")]
    pub machine_type: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub horsepower: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub age_years: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub hours_used: f64,
    #[serde(default = "default_pincode", deserialize_with = "pincode")]
    pub pincode: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub maintenance_cost: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fuel_price: f64,
    #[serde(default, alias = "weather_temp", deserialize_with = "lenient_f64")]
    pub temp: f64,
    #[serde(default, alias = "weather_humidity", deserialize_with = "lenient_f64")]
    pub humidity: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pressure: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub wind_speed: f64,
    #[serde(default, alias = "weather_rain", deserialize_with = "lenient_f64")]
    pub rain: f64,
    /// Calendar date of the query. Filled with "today" by the service, never here.
    #[serde(default, deserialize_with = "optional_string")]
    pub created_at: Option<String>,

    // Demand overrides; a finite value wins over the stats lookup.
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub old_rental_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub last_year_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub bookings_7d: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub stock_on_hand: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64", skip_serializing_if = "Option::is_none")]
    pub market_trend_score: Option<f64>,
}

impl Default for RawRequest {
    fn default() -> Self {
        Self {
            machine_type: default_machine_type(),
            horsepower: 0.0,
            age_years: 0.0,
            hours_used: 0.0,
            pincode: default_pincode(),
            maintenance_cost: 0.0,
            fuel_price: 0.0,
            temp: 0.0,
            humidity: 0.0,
            pressure: 0.0,
            wind_speed: 0.0,
            rain: 0.0,
            created_at: None,
            old_rental_price: None,
            last_year_price: None,
            bookings_7d: None,
            stock_on_hand: None,
            market_trend_score: None,
        }
    }
}

impl RawRequest {
    pub fn demand_overrides(&self) -> DemandRecord {
        DemandRecord {
            old_rental_price: self.old_rental_price,
            last_year_price: self.last_year_price,
            bookings_7d: self.bookings_7d,
            stock_on_hand: self.stock_on_hand,
            market_trend_score: self.market_trend_score,
        }
    }

    /// True when every weather field is still at its zero default.
    pub fn weather_missing(&self) -> bool {
        [self.temp, self.humidity, self.pressure, self.wind_speed, self.rain]
            .iter()
            .all(|v| *v == 0.0)
    }
}

fn default_machine_type() -> String {
    DEFAULT_MACHINE_TYPE.to_string()
}

fn default_pincode() -> String {
    DEFAULT_PINCODE.to_string()
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn value_as_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_f64(&value).unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_f64(&value).filter(|v| v.is_finite()))
}

fn optional_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_string(value))
}

fn machine_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_string(value)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default_machine_type))
}

fn pincode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_string(value).unwrap_or_else(default_pincode))
}
