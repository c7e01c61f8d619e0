//! End-to-end pricing against an artifact directory on disk

use agrirent_ml_core::artifacts::{fingerprint_all, save_artifact};
use agrirent_ml_core::demand::DemandRecord;
use agrirent_ml_core::gbdt::{Model, Node, Tree};
use agrirent_ml_core::layout::{CategoricalColumns, StandardScaler};
use agrirent_ml_core::{
    ArtifactKind, DemandStats, DirectoryStore, FrequencyTable, HybridEncoder, ModelContext,
    NumericColumn, PricingConfig, PricingError, RawRequest, SeasonalStats, TargetEncoder,
};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

const NUMERIC_COLUMNS: [&str; 6] = [
    "horsepower",
    "age_years",
    "seasonal_demand_score",
    "machine_type_freq",
    "machine_type_xgb",
    "bookings_7d",
];

fn stump(feature: i32, threshold: f64, left: f64, right: f64) -> Model {
    Model::new(
        vec![Tree::new(
            vec![
                Node::internal(0, feature, threshold, 1, 2),
                Node::leaf(1, left),
                Node::leaf(2, right),
            ],
            1.0,
        )],
        0.0,
    )
}

fn tractor_model() -> Model {
    Model::new(
        vec![Tree::new(
            vec![
                Node::categorical(0, 0, vec!["Tractor".to_string()], 1, 2),
                Node::leaf(1, 1500.0),
                Node::leaf(2, 900.0),
            ],
            1.0,
        )],
        0.0,
    )
}

fn write_bundle(root: &Path) -> DirectoryStore {
    let store = DirectoryStore::new(root);

    let demand = DemandStats {
        by_type: [(
            "Tractor".to_string(),
            DemandRecord {
                old_rental_price: Some(1400.0),
                last_year_price: Some(1300.0),
                bookings_7d: Some(12.0),
                stock_on_hand: Some(3.0),
                market_trend_score: Some(0.8),
            },
        )]
        .into_iter()
        .collect(),
        global: DemandRecord {
            old_rental_price: Some(1000.0),
            last_year_price: Some(950.0),
            bookings_7d: Some(5.0),
            stock_on_hand: Some(4.0),
            market_trend_score: Some(0.5),
        },
    };
    save_artifact(&store, ArtifactKind::DemandStats, &demand).unwrap();

    let mut tractor_months = BTreeMap::new();
    tractor_months.insert(10, 1800.0);
    tractor_months.insert(6, 1500.0);
    let seasonal = SeasonalStats {
        by_type: [("Tractor".to_string(), tractor_months)].into_iter().collect(),
        by_month: [(10, 1500.0), (1, 900.0)].into_iter().collect(),
        global_median: 1500.0,
    };
    save_artifact(&store, ArtifactKind::SeasonalStats, &seasonal).unwrap();

    let frequency: FrequencyTable = [("Tractor".to_string(), 40), ("Harvester".to_string(), 10)]
        .into_iter()
        .collect();
    save_artifact(&store, ArtifactKind::FrequencyTable, &frequency).unwrap();

    let target = TargetEncoder {
        te_dict: [("Tractor".to_string(), 1200.0)].into_iter().collect(),
        global_median: 1000.0,
    };
    save_artifact(&store, ArtifactKind::TargetEncoder, &target).unwrap();
    save_artifact(
        &store,
        ArtifactKind::HybridEncoder,
        &HybridEncoder {
            freq_dict: frequency,
            target,
        },
    )
    .unwrap();

    save_artifact(
        &store,
        ArtifactKind::Scaler,
        &StandardScaler {
            mean: vec![40.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            scale: vec![10.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        },
    )
    .unwrap();

    let numeric: Vec<String> = NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect();
    save_artifact(&store, ArtifactKind::NumericColumns, &numeric).unwrap();
    save_artifact(
        &store,
        ArtifactKind::CategoricalColumns,
        &CategoricalColumns {
            columns: vec![
                "machine_type".to_string(),
                "horsepower".to_string(),
                "seasonal_demand_score".to_string(),
            ],
            cat_features_idx: vec![0],
        },
    )
    .unwrap();

    // A: scaled horsepower, B: seasonal score, C: machine type
    save_artifact(&store, ArtifactKind::RegressorScaled, &stump(0, 0.5, 1000.0, 1400.0)).unwrap();
    save_artifact(&store, ArtifactKind::RegressorNumeric, &stump(2, 1.1, 1100.0, 1600.0)).unwrap();
    save_artifact(&store, ArtifactKind::RegressorCategorical, &tractor_model()).unwrap();

    store
}

fn config_for(root: &Path) -> PricingConfig {
    let mut config = PricingConfig::default();
    config.artifacts.directory = root.to_path_buf();
    config
}

fn tractor_request() -> RawRequest {
    serde_json::from_str(
        r#"{
            "machine_type": "Tractor",
            "horsepower": 50,
            "age_years": "3",
            "hours_used": 1200,
            "pincode": 641001,
            "maintenance_cost": 5000,
            "fuel_price": 95,
            "weather_temp": 30,
            "weather_humidity": 60,
            "pressure": 1010,
            "wind_speed": 2,
            "weather_rain": 0,
            "created_at": "2024-10-15"
        }"#,
    )
    .unwrap()
}

#[test]
fn tractor_in_october() {
    let dir = TempDir::new().unwrap();
    write_bundle(dir.path());
    let context = ModelContext::from_config(&config_for(dir.path())).unwrap();

    let row = context.features(&tractor_request());
    assert!(row.is_finite());
    assert_eq!(row.machine_type, "Tractor");
    assert_eq!(row.pincode_str, "641001");
    assert_eq!(row.get(NumericColumn::PincodePrefix), 641.0);
    assert_eq!(row.get(NumericColumn::PincodeSuffix), 1.0);
    assert_eq!(row.get(NumericColumn::CreatedDayOfYear), 289.0);
    assert_eq!(row.get(NumericColumn::Season), 4.0);
    assert_eq!(row.get(NumericColumn::Bookings7d), 12.0);
    assert_eq!(row.get(NumericColumn::PriceTrend), 100.0);
    assert_eq!(row.get(NumericColumn::DemandRatio), 3.0);
    assert_eq!(row.get(NumericColumn::UsageRatio), 300.0);
    assert_eq!(row.get(NumericColumn::MachineTypeFreq), 40.0);
    assert_eq!(row.get(NumericColumn::SeasonMonth), 10.0);
    assert!((row.get(NumericColumn::SeasonalDemandScore) - 1.2).abs() < 1e-12);
    assert_eq!(row.get(NumericColumn::IsPeakSeason), 1.0);
    assert_eq!(row.get(NumericColumn::IsOffSeason), 0.0);
    assert_eq!(row.get(NumericColumn::MachineTypeXgb), 1200.0);
    assert_eq!(row.get(NumericColumn::MachineTypeLgb), 620.0);

    let prediction = context.predict(&tractor_request());
    assert_eq!(prediction.components, [1400.0, 1600.0, 1500.0]);
    assert!((prediction.price - 1500.0).abs() < 1e-9);
    assert_eq!(prediction.rounded, 1500.0);
    assert_eq!(prediction.reconciliation.missing, 0);
}

#[test]
fn unparsable_date_uses_default_month() {
    let dir = TempDir::new().unwrap();
    write_bundle(dir.path());
    let context = ModelContext::from_config(&config_for(dir.path())).unwrap();

    let mut request = tractor_request();
    request.created_at = Some("not-a-date".to_string());
    let row = context.features(&request);

    assert_eq!(row.get(NumericColumn::SeasonMonth), 6.0);
    assert_eq!(row.get(NumericColumn::SeasonalDemandScore), 1.0);
    assert_eq!(row.get(NumericColumn::IsPeakSeason), 0.0);
    assert_eq!(row.get(NumericColumn::CreatedYear), 0.0);
    assert_eq!(row.created_at, "not-a-date");

    // seasonal score 1.0 sends regressor B left
    assert_eq!(context.predict(&request).components[1], 1100.0);
}

#[test]
fn configured_default_month_applies() {
    let dir = TempDir::new().unwrap();
    write_bundle(dir.path());
    let mut config = config_for(dir.path());
    config.features.default_month = 1;
    let context = ModelContext::from_config(&config).unwrap();

    let mut request = tractor_request();
    request.machine_type = "Harvester".to_string();
    request.created_at = None;
    let row = context.features(&request);
    assert_eq!(row.get(NumericColumn::SeasonMonth), 1.0);
    assert!((row.get(NumericColumn::SeasonalDemandScore) - 0.6).abs() < 1e-12);
    assert_eq!(row.get(NumericColumn::IsOffSeason), 1.0);
}

#[test]
fn unseen_machine_type_still_prices() {
    let dir = TempDir::new().unwrap();
    write_bundle(dir.path());
    let context = ModelContext::from_config(&config_for(dir.path())).unwrap();

    let mut request = tractor_request();
    request.machine_type = "Drone".to_string();
    let row = context.features(&request);
    assert_eq!(row.get(NumericColumn::MachineTypeFreq), 1.0);
    assert_eq!(row.get(NumericColumn::MachineTypeXgb), 1000.0);
    assert_eq!(row.get(NumericColumn::Bookings7d), 5.0);

    let prediction = context.predict(&request);
    assert!(prediction.price.is_finite());
    assert_eq!(prediction.components, [1400.0, 1100.0, 900.0]);
}

#[test]
fn caller_demand_overrides_win() {
    let dir = TempDir::new().unwrap();
    write_bundle(dir.path());
    let context = ModelContext::from_config(&config_for(dir.path())).unwrap();

    let mut request = tractor_request();
    request.bookings_7d = Some(30.0);
    let row = context.features(&request);
    assert_eq!(row.get(NumericColumn::Bookings7d), 30.0);
    assert_eq!(row.get(NumericColumn::StockOnHand), 3.0);
}

#[test]
fn missing_frequency_table_defaults_to_one() {
    let dir = TempDir::new().unwrap();
    let store = write_bundle(dir.path());
    std::fs::remove_file(store.path_for(ArtifactKind::FrequencyTable)).unwrap();

    let context = ModelContext::from_config(&config_for(dir.path())).unwrap();
    let row = context.features(&tractor_request());
    assert_eq!(row.get(NumericColumn::MachineTypeFreq), 1.0);
    assert!(!context.fingerprints().contains_key(&ArtifactKind::FrequencyTable));
}

#[test]
fn missing_required_artifact_fails_load() {
    let dir = TempDir::new().unwrap();
    let store = write_bundle(dir.path());
    std::fs::remove_file(store.path_for(ArtifactKind::NumericColumns)).unwrap();

    let err = ModelContext::from_config(&config_for(dir.path())).unwrap_err();
    assert!(matches!(err, PricingError::ArtifactMissing { ref name } if name == "numeric_columns"));
}

#[test]
fn empty_directory_fails_load() {
    let dir = TempDir::new().unwrap();
    let err = ModelContext::from_config(&config_for(&dir.path().join("absent"))).unwrap_err();
    assert!(matches!(err, PricingError::ArtifactMissing { .. }));
}

#[test]
fn fingerprints_are_stable_across_loads() {
    let dir = TempDir::new().unwrap();
    let store = write_bundle(dir.path());

    let on_disk = fingerprint_all(&store).unwrap();
    assert_eq!(on_disk.len(), ArtifactKind::ALL.len());

    let first = ModelContext::from_config(&config_for(dir.path())).unwrap();
    let second = ModelContext::from_config(&config_for(dir.path())).unwrap();
    assert_eq!(first.fingerprints(), second.fingerprints());
    assert_eq!(
        first.fingerprints()[&ArtifactKind::DemandStats],
        on_disk[&ArtifactKind::DemandStats]
    );
    assert!(first
        .fingerprints()
        .values()
        .all(|h| h.len() == 64 && h.chars().all(|c| c.is_ascii_hexdigit())));
}

#[test]
fn toml_config_points_at_bundle() {
    let dir = TempDir::new().unwrap();
    let models = dir.path().join("models");
    write_bundle(&models);

    let config_path = dir.path().join("agrirent.toml");
    let mut config = config_for(&models);
    config.features.peak_threshold = 1.25;
    config.save_to_file(&config_path).unwrap();

    let loaded = PricingConfig::load_from_file(&config_path).unwrap();
    assert_eq!(loaded.artifacts.directory, models);
    let context = ModelContext::from_config(&loaded).unwrap();

    // 1.2 is no longer peak under the stricter threshold
    let row = context.features(&tractor_request());
    assert_eq!(row.get(NumericColumn::IsPeakSeason), 0.0);
}
