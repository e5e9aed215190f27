use serde::Deserialize;
use serde_json::Value;

/// The central-bank daily rates document: `<ValCurs><Valute ID="…">…</Valute>…</ValCurs>`.
#[derive(Debug, Deserialize)]
pub struct ValCurs {
    #[serde(rename = "Valute", default)]
    pub valutes: Vec<Valute>,
}

/// One currency entry of the daily rates document.
#[derive(Debug, Deserialize)]
pub struct Valute {
    #[serde(rename = "@ID")]
    pub id: String,
    /// How many units of the currency `value` is quoted for.
    #[serde(rename = "Nominal")]
    pub nominal: String,
    /// Uses a comma as the decimal separator, e.g. `92,1234`.
    #[serde(rename = "Value")]
    pub value: String,
}

/// The response from `GET /v4/spreadsheets/{id}/values/{range}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRangeResponse {
    pub range: Option<String>,
    /// Absent entirely when the range holds no data.
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

/// The slice of `GET /v4/spreadsheets/{id}?fields=sheets.properties.title` we read.
#[derive(Debug, Clone, Deserialize)]
pub struct SpreadsheetMetadata {
    #[serde(default)]
    pub sheets: Vec<SheetEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetEntry {
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetProperties {
    pub title: String,
}

/// A successful OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

/// The error body Google APIs return on failure.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorDetail {
    pub code: u16,
    pub message: String,
}
