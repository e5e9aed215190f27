use crate::error::ApiError;
use async_trait::async_trait;
use core_types::RawRow;
use rust_decimal::Decimal;

mod auth;
pub mod error;
pub mod rates;
pub mod responses;
pub mod sheets;

// --- Public API ---
pub use auth::ServiceAccountKey;
pub use rates::{CbrRateClient, RateCache, RateSnapshot};
pub use sheets::{normalize_rows, GoogleSheetsClient};

/// A source of the exchange rate between the monitored currency pair.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetches the latest rate: units of local currency per one unit of foreign currency.
    async fn current_rate(&self) -> Result<Decimal, ApiError>;
}

/// A spreadsheet-like source of order rows.
#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Fetches every complete row of `source_name`, keyed by canonical field.
    ///
    /// Rows with an empty cell are dropped; a header that does not match the
    /// translation table fails the whole fetch with `SchemaMismatch`.
    async fn fetch_rows(&self, source_name: &str) -> Result<Vec<RawRow>, ApiError>;
}

/// Builds the shared `reqwest` client with the configured timeout.
pub fn http_client(config: &configuration::HttpConfig) -> Result<reqwest::Client, ApiError> {
    Ok(reqwest::Client::builder().timeout(config.timeout()).build()?)
}
