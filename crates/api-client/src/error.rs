use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("The API request returned an error: {0}")]
    ApiError(String),

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Invalid data format from API: {0}")]
    InvalidData(String),

    #[error("Exchange rate unavailable: {0}")]
    RateUnavailable(String),

    #[error("Source columns do not match the translation table: {0}")]
    SchemaMismatch(String),

    #[error("Credentials rejected or unusable: {0}")]
    Credentials(String),
}
