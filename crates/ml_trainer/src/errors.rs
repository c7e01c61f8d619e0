use agrirent_ml_core::PricingError;
use thiserror::Error;

/// Errors returned while building artifacts.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl From<csv::Error> for TrainerError {
    fn from(err: csv::Error) -> Self {
        TrainerError::Dataset(err.to_string())
    }
}
