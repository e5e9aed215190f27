//! The exchange-rate feed and the process-wide slot holding its latest value.

use crate::error::ApiError;
use crate::responses::ValCurs;
use crate::RateProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use configuration::{HttpConfig, RateConfig};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Reads the Central Bank of Russia daily XML feed.
#[derive(Clone)]
pub struct CbrRateClient {
    client: reqwest::Client,
    feed_url: String,
    currency_id: String,
}

impl CbrRateClient {
    pub fn new(config: &RateConfig, http: &HttpConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client: crate::http_client(http)?,
            feed_url: config.feed_url.clone(),
            currency_id: config.currency_id.clone(),
        })
    }
}

#[async_trait]
impl RateProvider for CbrRateClient {
    async fn current_rate(&self) -> Result<Decimal, ApiError> {
        let response = self
            .client
            .get(&self.feed_url)
            .send()
            .await
            .map_err(|e| ApiError::RateUnavailable(format!("feed unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::RateUnavailable(format!("feed answered {status}")));
        }

        // `text()` honours the feed's windows-1251 charset header.
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::RateUnavailable(format!("failed to read feed body: {e}")))?;

        parse_cbr_rate(&body, &self.currency_id)
    }
}

/// Extracts the per-unit rate for `currency_id` from a daily rates document.
pub fn parse_cbr_rate(xml: &str, currency_id: &str) -> Result<Decimal, ApiError> {
    let document: ValCurs = quick_xml::de::from_str(xml)
        .map_err(|e| ApiError::RateUnavailable(format!("malformed feed: {e}")))?;

    let entry = document
        .valutes
        .iter()
        .find(|v| v.id == currency_id)
        .ok_or_else(|| ApiError::RateUnavailable(format!("currency {currency_id} missing from feed")))?;

    let value = parse_locale_decimal(&entry.value)
        .ok_or_else(|| ApiError::RateUnavailable(format!("unparseable rate '{}'", entry.value)))?;
    let nominal = parse_locale_decimal(&entry.nominal)
        .filter(|n| n.is_sign_positive() && !n.is_zero())
        .ok_or_else(|| ApiError::RateUnavailable(format!("unparseable nominal '{}'", entry.nominal)))?;

    Ok((value / nominal).normalize())
}

/// Parses a decimal that may use `,` as its separator.
fn parse_locale_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(&raw.trim().replace(',', ".")).ok()
}

/// A rate together with when it was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSnapshot {
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
}

/// The single process-wide slot holding the most recent successful fetch.
///
/// Cloning shares the slot. A failed refresh leaves the previous snapshot in
/// place; reading before any successful refresh fails with `RateUnavailable`.
#[derive(Debug, Clone, Default)]
pub struct RateCache {
    slot: Arc<RwLock<Option<RateSnapshot>>>,
}

impl RateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached snapshot with `rate`, stamped now.
    pub async fn store(&self, rate: Decimal) -> RateSnapshot {
        let snapshot = RateSnapshot { rate, fetched_at: Utc::now() };
        *self.slot.write().await = Some(snapshot);
        snapshot
    }

    /// The latest snapshot, or `RateUnavailable` if none was ever stored.
    pub async fn snapshot(&self) -> Result<RateSnapshot, ApiError> {
        let current = *self.slot.read().await;
        current.ok_or_else(|| ApiError::RateUnavailable("no successful rate fetch yet".to_string()))
    }

    /// Fetches from `provider` and stores the result only on success.
    pub async fn refresh(&self, provider: &dyn RateProvider) -> Result<RateSnapshot, ApiError> {
        let rate = provider.current_rate().await?;
        Ok(self.store(rate).await)
    }
}
