//! Artifact persistence
//!
//! Every trained object is stored as a versioned JSON envelope
//! `{"kind": ..., "version": 1, "payload": ...}`. The kind and version are
//! checked before the payload is decoded, and each payload is fingerprinted
//! with blake3 over its canonical JSON.

use crate::errors::{PricingError, Result};
use crate::serde_canon::{hash_canonical_hex, to_canonical_json, CanonicalError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// Envelope schema version written by this crate
pub const ARTIFACT_VERSION: u32 = 1;

/// Every artifact the pipeline reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    DemandStats,
    SeasonalStats,
    FrequencyTable,
    TargetEncoder,
    HybridEncoder,
    Scaler,
    RegressorScaled,
    RegressorNumeric,
    RegressorCategorical,
    NumericColumns,
    CategoricalColumns,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 11] = [
        ArtifactKind::DemandStats,
        ArtifactKind::SeasonalStats,
        ArtifactKind::FrequencyTable,
        ArtifactKind::TargetEncoder,
        ArtifactKind::HybridEncoder,
        ArtifactKind::Scaler,
        ArtifactKind::RegressorScaled,
        ArtifactKind::RegressorNumeric,
        ArtifactKind::RegressorCategorical,
        ArtifactKind::NumericColumns,
        ArtifactKind::CategoricalColumns,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ArtifactKind::DemandStats => "demand_stats",
            ArtifactKind::SeasonalStats => "seasonal_stats",
            ArtifactKind::FrequencyTable => "frequency_table",
            ArtifactKind::TargetEncoder => "target_encoder",
            ArtifactKind::HybridEncoder => "hybrid_encoder",
            ArtifactKind::Scaler => "scaler",
            ArtifactKind::RegressorScaled => "regressor_scaled",
            ArtifactKind::RegressorNumeric => "regressor_numeric",
            ArtifactKind::RegressorCategorical => "regressor_categorical",
            ArtifactKind::NumericColumns => "numeric_columns",
            ArtifactKind::CategoricalColumns => "categorical_columns",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }

    /// Regressors and column lists have no usable default.
    pub fn is_required(self) -> bool {
        matches!(
            self,
            ArtifactKind::RegressorScaled
                | ArtifactKind::RegressorNumeric
                | ArtifactKind::RegressorCategorical
                | ArtifactKind::NumericColumns
                | ArtifactKind::CategoricalColumns
        )
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Versioned wrapper around an artifact payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEnvelope<T> {
    pub kind: ArtifactKind,
    pub version: u32,
    pub payload: T,
}

impl<T> ArtifactEnvelope<T> {
    pub fn new(kind: ArtifactKind, payload: T) -> Self {
        Self {
            kind,
            version: ARTIFACT_VERSION,
            payload,
        }
    }
}

/// A decoded payload and its fingerprint
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub payload: T,
    pub fingerprint: String,
}

/// Backing storage for artifact envelopes, one entry per kind
pub trait ArtifactStore: Send + Sync {
    /// Human-readable location, for logs
    fn describe(&self) -> String;

    /// Raw envelope text, or `None` when the artifact is absent
    fn read(&self, kind: ArtifactKind) -> Result<Option<String>>;

    fn write(&self, kind: ArtifactKind, contents: &str) -> Result<()>;
}

/// Artifacts stored as `<root>/<name>.json`
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.file_name())
    }
}

impl ArtifactStore for DirectoryStore {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn read(&self, kind: ArtifactKind) -> Result<Option<String>> {
        let path = self.path_for(kind);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn write(&self, kind: ArtifactKind, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path_for(kind), contents)?;
        Ok(())
    }
}

/// In-process store, used by tests and embedding callers
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<ArtifactKind, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(&self, kind: ArtifactKind) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&kind)
    }
}

impl ArtifactStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn read(&self, kind: ArtifactKind) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(&kind).cloned())
    }

    fn write(&self, kind: ArtifactKind, contents: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(kind, contents.to_string());
        Ok(())
    }
}

fn canonical_error(kind: ArtifactKind, error: CanonicalError) -> PricingError {
    PricingError::InvalidArtifact {
        artifact: kind.name().to_string(),
        reason: error.to_string(),
    }
}

/// Wrap `payload` in an envelope, store it as canonical JSON, and return the
/// payload fingerprint.
pub fn save_artifact<T: Serialize>(
    store: &dyn ArtifactStore,
    kind: ArtifactKind,
    payload: &T,
) -> Result<String> {
    let envelope = ArtifactEnvelope::new(kind, payload);
    let json = to_canonical_json(&envelope).map_err(|e| canonical_error(kind, e))?;
    let fingerprint = hash_canonical_hex(payload).map_err(|e| canonical_error(kind, e))?;
    store.write(kind, &json)?;
    debug!(artifact = %kind, fingerprint = %fingerprint, "artifact written");
    Ok(fingerprint)
}

/// Load and decode one artifact; `Ok(None)` when it is absent.
#[instrument(skip(store), fields(artifact = %kind, store = %store.describe()))]
pub fn load_artifact<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    kind: ArtifactKind,
) -> Result<Option<Loaded<T>>> {
    let Some(raw) = store.read(kind)? else {
        debug!("artifact absent");
        return Ok(None);
    };

    let envelope: ArtifactEnvelope<serde_json::Value> =
        serde_json::from_str(&raw).map_err(|e| PricingError::InvalidArtifact {
            artifact: kind.name().to_string(),
            reason: format!("not a valid artifact envelope: {e}"),
        })?;

    if envelope.kind != kind {
        return Err(PricingError::SchemaMismatch {
            artifact: kind.name().to_string(),
            expected: format!("kind {kind}"),
            found: format!("kind {}", envelope.kind),
        });
    }
    if envelope.version != ARTIFACT_VERSION {
        return Err(PricingError::SchemaMismatch {
            artifact: kind.name().to_string(),
            expected: format!("version {ARTIFACT_VERSION}"),
            found: format!("version {}", envelope.version),
        });
    }

    let fingerprint = hash_canonical_hex(&envelope.payload).map_err(|e| canonical_error(kind, e))?;
    let payload = serde_json::from_value(envelope.payload).map_err(|e| {
        PricingError::InvalidArtifact {
            artifact: kind.name().to_string(),
            reason: e.to_string(),
        }
    })?;

    info!(fingerprint = %fingerprint, "artifact loaded");
    Ok(Some(Loaded {
        payload,
        fingerprint,
    }))
}

/// Load an artifact that has no default; absence is fatal.
pub fn load_required<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    kind: ArtifactKind,
) -> Result<Loaded<T>> {
    load_artifact(store, kind)?.ok_or_else(|| PricingError::ArtifactMissing {
        name: kind.name().to_string(),
    })
}

/// Fingerprints of every artifact present in `store`
pub fn fingerprint_all(store: &dyn ArtifactStore) -> Result<BTreeMap<ArtifactKind, String>> {
    let mut out = BTreeMap::new();
    for kind in ArtifactKind::ALL {
        if let Some(loaded) = load_artifact::<serde_json::Value>(store, kind)? {
            out.insert(kind, loaded.fingerprint);
        }
    }
    Ok(out)
}
