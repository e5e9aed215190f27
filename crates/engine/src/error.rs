use alerter::error::AlerterError;
use api_client::error::ApiError;
use core_types::CanonicalField;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Exchange rate unavailable: {0}")]
    RateUnavailable(String),

    #[error("Failed to fetch source rows: {0}")]
    SourceFetchFailed(String),

    #[error("Source schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Cannot parse delivery date '{value}' of order '{order_id}'")]
    DateParseFailed { order_id: String, value: String },

    #[error("Invalid {field} '{value}' in order '{order_id}'")]
    InvalidValue { field: CanonicalField, order_id: String, value: String },

    #[error("Failed to send notification: {0}")]
    NotifySendFailed(#[from] AlerterError),

    #[error("Database error: {0}")]
    Database(#[from] database::DbError),
}

impl EngineError {
    /// Classifies a failure of the tabular source.
    pub fn from_source(err: ApiError) -> Self {
        match err {
            ApiError::SchemaMismatch(msg) => EngineError::SchemaMismatch(msg),
            other => EngineError::SourceFetchFailed(other.to_string()),
        }
    }

    /// Classifies a failure to obtain the exchange rate.
    pub fn from_rate(err: ApiError) -> Self {
        match err {
            ApiError::RateUnavailable(msg) => EngineError::RateUnavailable(msg),
            other => EngineError::RateUnavailable(other.to_string()),
        }
    }
}
