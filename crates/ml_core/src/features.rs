//! Feature builder
//!
//! Pure transformation from a raw attribute record to a typed feature row:
//! pincode and date decompositions, frequency lookup, numeric coercion, the
//! derived ratios, and a final median sanitization pass. The same code runs
//! at training time (`build_batch`) and at serving time (`build_features`).

use crate::calendar::{parse_calendar_date, season_for_month};
use crate::demand::{DemandField, DemandStats};
use crate::encoding::FrequencyTable;
use crate::request::{RawRequest, DEFAULT_MACHINE_TYPE};
use crate::seasonal::{SeasonalPolicy, SeasonalStats};
use crate::stats::median;
use chrono::Datelike;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

/// Fill value for categorical columns that have nothing to carry
pub const UNKNOWN_CATEGORY: &str = "Unknown";

macro_rules! numeric_columns {
    ($($variant:ident => $name:literal,)+) => {
        /// Numeric columns a feature row carries, in canonical order
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum NumericColumn {
            $($variant,)+
        }

        impl NumericColumn {
            pub const ALL: &'static [NumericColumn] = &[$(NumericColumn::$variant,)+];
            pub const COUNT: usize = Self::ALL.len();

            pub fn name(self) -> &'static str {
                match self {
                    $(NumericColumn::$variant => $name,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(NumericColumn::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

numeric_columns! {
    Horsepower => "horsepower",
    AgeYears => "age_years",
    HoursUsed => "hours_used",
    MaintenanceCost => "maintenance_cost",
    FuelPrice => "fuel_price",
    OldRentalPrice => "old_rental_price",
    LastYearPrice => "last_year_price",
    Bookings7d => "bookings_7d",
    StockOnHand => "stock_on_hand",
    MarketTrendScore => "market_trend_score",
    MachineTypeFreq => "machine_type_freq",
    PincodeInt => "pincode_int",
    PincodePrefix => "pincode_prefix",
    PincodeSuffix => "pincode_suffix",
    CreatedYear => "created_year",
    CreatedMonth => "created_month",
    CreatedDayOfYear => "created_dayofyear",
    Season => "season",
    Temp => "temp",
    Humidity => "humidity",
    Pressure => "pressure",
    WindSpeed => "wind_speed",
    Rain => "rain",
    SeasonalDemandScore => "seasonal_demand_score",
    SeasonMonth => "season_month",
    IsPeakSeason => "is_peak_season",
    IsOffSeason => "is_off_season",
    UsageRatio => "usage_ratio",
    DemandRatio => "demand_ratio",
    PriceTrend => "price_trend",
    FuelCostFactor => "fuel_cost_factor",
    HeatStress => "heat_stress",
    HumidityStress => "humidity_stress",
    RainRisk => "rain_risk",
    MachineTypeXgb => "machine_type_xgb",
    MachineTypeLgb => "machine_type_lgb",
}

impl From<DemandField> for NumericColumn {
    fn from(field: DemandField) -> Self {
        match field {
            DemandField::OldRentalPrice => NumericColumn::OldRentalPrice,
            DemandField::LastYearPrice => NumericColumn::LastYearPrice,
            DemandField::Bookings7d => NumericColumn::Bookings7d,
            DemandField::StockOnHand => NumericColumn::StockOnHand,
            DemandField::MarketTrendScore => NumericColumn::MarketTrendScore,
        }
    }
}

/// String-valued columns consumed natively by the categorical regressor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CategoricalColumn {
    MachineType,
    Pincode,
    PincodeStr,
    CreatedAt,
}

impl CategoricalColumn {
    pub const ALL: [CategoricalColumn; 4] = [
        CategoricalColumn::MachineType,
        CategoricalColumn::Pincode,
        CategoricalColumn::PincodeStr,
        CategoricalColumn::CreatedAt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CategoricalColumn::MachineType => "machine_type",
            CategoricalColumn::Pincode => "pincode",
            CategoricalColumn::PincodeStr => "pincode_str",
            CategoricalColumn::CreatedAt => "created_at",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Any column a feature row knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Numeric(NumericColumn),
    Categorical(CategoricalColumn),
}

impl Column {
    pub fn from_name(name: &str) -> Option<Self> {
        NumericColumn::from_name(name)
            .map(Column::Numeric)
            .or_else(|| CategoricalColumn::from_name(name).map(Column::Categorical))
    }

    pub fn name(self) -> &'static str {
        match self {
            Column::Numeric(c) => c.name(),
            Column::Categorical(c) => c.name(),
        }
    }

    /// Total number of columns a row exposes
    pub fn count() -> usize {
        NumericColumn::COUNT + CategoricalColumn::ALL.len()
    }
}

/// Raw inputs for one row before feature engineering.
///
/// Numeric inputs are keyed by column; whatever is absent reads as 0.0 when
/// the row is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub machine_type: Option<String>,
    pub pincode: Option<String>,
    pub created_at: Option<String>,
    values: BTreeMap<NumericColumn, f64>,
}

impl RawRecord {
    pub fn new(machine_type: impl Into<String>) -> Self {
        Self {
            machine_type: Some(machine_type.into()),
            ..Default::default()
        }
    }

    pub fn with(mut self, column: NumericColumn, value: f64) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: NumericColumn, value: f64) {
        self.values.insert(column, value);
    }

    pub fn get(&self, column: NumericColumn) -> Option<f64> {
        self.values.get(&column).copied()
    }

    /// Combine a request with the demand and seasonal stores.
    ///
    /// Demand fields resolve through caller overrides, then the stats. The
    /// seasonal fields come from `created_at` scored under `policy`.
    pub fn assemble(
        request: &RawRequest,
        demand: &DemandStats,
        seasonal: &SeasonalStats,
        policy: &SeasonalPolicy,
    ) -> Self {
        let machine_type = request.machine_type.as_str();
        let mut record = RawRecord {
            machine_type: Some(machine_type.to_string()),
            pincode: Some(request.pincode.clone()),
            created_at: request.created_at.clone(),
            values: BTreeMap::new(),
        };

        record.set(NumericColumn::Horsepower, request.horsepower);
        record.set(NumericColumn::AgeYears, request.age_years);
        record.set(NumericColumn::HoursUsed, request.hours_used);
        record.set(NumericColumn::MaintenanceCost, request.maintenance_cost);
        record.set(NumericColumn::FuelPrice, request.fuel_price);
        record.set(NumericColumn::Temp, request.temp);
        record.set(NumericColumn::Humidity, request.humidity);
        record.set(NumericColumn::Pressure, request.pressure);
        record.set(NumericColumn::WindSpeed, request.wind_speed);
        record.set(NumericColumn::Rain, request.rain);

        let fields = demand.resolve(machine_type, &request.demand_overrides());
        for field in DemandField::ALL {
            record.set(field.into(), fields.get(field));
        }

        let season = seasonal.estimate_with(machine_type, request.created_at.as_deref(), policy);
        record.set(NumericColumn::SeasonalDemandScore, season.seasonal_demand_score);
        record.set(NumericColumn::SeasonMonth, f64::from(season.season_month));
        record.set(NumericColumn::IsPeakSeason, f64::from(season.is_peak_season));
        record.set(NumericColumn::IsOffSeason, f64::from(season.is_off_season));
        record
    }
}

/// Fully engineered row: every numeric column plus the categorical strings
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    values: [f64; NumericColumn::COUNT],
    pub machine_type: String,
    pub pincode: String,
    pub pincode_str: String,
    pub created_at: String,
}

impl FeatureRow {
    fn empty() -> Self {
        Self {
            values: [0.0; NumericColumn::COUNT],
            machine_type: DEFAULT_MACHINE_TYPE.to_string(),
            pincode: UNKNOWN_CATEGORY.to_string(),
            pincode_str: UNKNOWN_CATEGORY.to_string(),
            created_at: UNKNOWN_CATEGORY.to_string(),
        }
    }

    pub fn get(&self, column: NumericColumn) -> f64 {
        self.values[column as usize]
    }

    pub fn set(&mut self, column: NumericColumn, value: f64) {
        self.values[column as usize] = value;
    }

    pub fn category(&self, column: CategoricalColumn) -> &str {
        match column {
            CategoricalColumn::MachineType => &self.machine_type,
            CategoricalColumn::Pincode => &self.pincode,
            CategoricalColumn::PincodeStr => &self.pincode_str,
            CategoricalColumn::CreatedAt => &self.created_at,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    pub fn numeric_values(&self) -> impl Iterator<Item = (NumericColumn, f64)> + '_ {
        NumericColumn::ALL.iter().map(move |c| (*c, self.get(*c)))
    }
}

impl Serialize for FeatureRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Column::count()))?;
        for column in CategoricalColumn::ALL {
            map.serialize_entry(column.name(), self.category(column))?;
        }
        for (column, value) in self.numeric_values() {
            map.serialize_entry(column.name(), &value)?;
        }
        map.end()
    }
}

/// Build one sanitized feature row.
///
/// Without a frequency table `machine_type_freq` is 1.0; with one, unseen
/// types also get 1.0. A non-finite value in a single row has no other rows
/// to take a median from and becomes 0.0.
pub fn build_features(record: &RawRecord, frequency: Option<&FrequencyTable>) -> FeatureRow {
    let mut row = build_unsanitized(record, frequency);
    for value in row.values.iter_mut() {
        if !value.is_finite() {
            *value = 0.0;
        }
    }
    row
}

/// Build rows for a whole dataset, imputing non-finite values with the
/// median of that column across the batch.
pub fn build_batch(records: &[RawRecord], frequency: Option<&FrequencyTable>) -> Vec<FeatureRow> {
    let mut rows: Vec<FeatureRow> = records
        .iter()
        .map(|r| build_unsanitized(r, frequency))
        .collect();

    for column in NumericColumn::ALL {
        let idx = *column as usize;
        if rows.iter().all(|r| r.values[idx].is_finite()) {
            continue;
        }
        let column_values: Vec<f64> = rows.iter().map(|r| r.values[idx]).collect();
        let fill = median(&column_values).unwrap_or(0.0);
        for row in rows.iter_mut() {
            if !row.values[idx].is_finite() {
                row.values[idx] = fill;
            }
        }
    }
    rows
}

fn build_unsanitized(record: &RawRecord, frequency: Option<&FrequencyTable>) -> FeatureRow {
    use NumericColumn::*;

    let mut row = FeatureRow::empty();

    row.machine_type = record
        .machine_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_MACHINE_TYPE)
        .to_string();

    let pincode_raw = record.pincode.clone().unwrap_or_default();
    let pincode_str = pincode_raw.trim().to_string();
    let prefix: String = pincode_str.chars().take(3).collect();
    let suffix: String = pincode_str.chars().skip(3).collect();
    row.set(PincodePrefix, coerce_numeric(&prefix));
    row.set(PincodeSuffix, coerce_numeric(&suffix));
    row.set(PincodeInt, coerce_numeric(&pincode_str));
    row.pincode = if record.pincode.is_some() {
        pincode_raw
    } else {
        UNKNOWN_CATEGORY.to_string()
    };
    row.pincode_str = pincode_str;

    match record.created_at.as_deref().and_then(parse_calendar_date) {
        Some(date) => {
            row.set(CreatedYear, f64::from(date.year()));
            row.set(CreatedMonth, f64::from(date.month()));
            row.set(CreatedDayOfYear, f64::from(date.ordinal()));
            row.set(Season, f64::from(season_for_month(date.month())));
        }
        None => {
            row.set(CreatedYear, 0.0);
            row.set(CreatedMonth, 0.0);
            row.set(CreatedDayOfYear, 0.0);
            row.set(Season, 0.0);
        }
    }
    if let Some(created_at) = &record.created_at {
        row.created_at = created_at.clone();
    }

    let freq = frequency
        .and_then(|table| table.get(&row.machine_type))
        .unwrap_or(1.0);
    row.set(MachineTypeFreq, freq);

    for column in [
        Horsepower,
        AgeYears,
        HoursUsed,
        MaintenanceCost,
        FuelPrice,
        OldRentalPrice,
        LastYearPrice,
        Bookings7d,
        StockOnHand,
        MarketTrendScore,
        Temp,
        Humidity,
        Pressure,
        WindSpeed,
        Rain,
        SeasonalDemandScore,
        SeasonMonth,
        IsPeakSeason,
        IsOffSeason,
    ] {
        row.set(column, record.get(column).unwrap_or(0.0));
    }

    let hours = row.get(HoursUsed);
    row.set(UsageRatio, hours / (row.get(AgeYears) + 1.0));
    row.set(DemandRatio, row.get(Bookings7d) / (row.get(StockOnHand) + 1.0));
    row.set(PriceTrend, row.get(OldRentalPrice) - row.get(LastYearPrice));
    row.set(FuelCostFactor, row.get(FuelPrice) * hours);
    row.set(HeatStress, heat_stress(row.get(Temp)));
    row.set(HumidityStress, row.get(Humidity) / 100.0);
    row.set(RainRisk, if row.get(Rain) > 0.0 { 1.0 } else { 0.0 });

    row
}

fn heat_stress(temp: f64) -> f64 {
    if temp.is_nan() {
        return temp;
    }
    (temp - 35.0).max(0.0)
}

/// Numeric parse of a pincode fragment; anything non-numeric is 0.
fn coerce_numeric(s: &str) -> f64 {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}
