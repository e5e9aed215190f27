//! Reads order rows from a Google Sheet.

use crate::auth::ServiceAccountKey;
use crate::error::ApiError;
use crate::responses::{GoogleErrorResponse, SpreadsheetMetadata, TokenResponse, ValueRangeResponse};
use crate::TabularSource;
use async_trait::async_trait;
use chrono::Utc;
use configuration::{HttpConfig, SheetsConfig};
use core_types::{CanonicalField, RawRow};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

/// Tokens are renewed this long before Google would reject them.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// A `TabularSource` backed by the Sheets v4 `values` endpoint, authenticated
/// as a service account.
pub struct GoogleSheetsClient {
    client: reqwest::Client,
    api_base_url: String,
    spreadsheet_id: String,
    key: ServiceAccountKey,
    columns: HashMap<String, CanonicalField>,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetsClient {
    /// Builds the client, reading the key file named in the configuration.
    ///
    /// A missing or malformed key file is reported here, at startup, rather
    /// than on the first sync.
    pub fn new(config: &SheetsConfig, http: &HttpConfig) -> Result<Self, ApiError> {
        let key = ServiceAccountKey::from_file(&config.credentials_path)?;
        Ok(Self {
            client: crate::http_client(http)?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            key,
            columns: config.columns.clone(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, ApiError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let assertion = self.key.sign_assertion(READONLY_SCOPE, Utc::now())?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Credentials(format!("token exchange failed ({status}): {text}")));
        }
        let token: TokenResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialization(e.to_string()))?;

        tracing::debug!(expires_in = token.expires_in, "Obtained a Sheets access token.");
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }

    fn spreadsheet_url(&self, tail: &[&str]) -> Result<reqwest::Url, ApiError> {
        let mut url = reqwest::Url::parse(&self.api_base_url)
            .map_err(|e| ApiError::InvalidData(format!("bad Sheets API url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidData("Sheets API url cannot have a path".to_string()))?
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
            .extend(tail);
        Ok(url)
    }

    /// Authenticated GET returning the decoded JSON body.
    async fn get_json<T: DeserializeOwned>(&self, url: reqwest::Url, query: &[(&str, &str)]) -> Result<T, ApiError> {
        let token = self.access_token().await?;
        let response = self.client.get(url).bearer_auth(token).query(query).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<GoogleErrorResponse>(&text)
                .map(|e| format!("{} {}", e.error.code, e.error.message))
                .unwrap_or(text);
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                // Force a fresh token next time in case this one was revoked.
                *self.token.lock().await = None;
                return Err(ApiError::Credentials(message));
            }
            return Err(ApiError::ApiError(message));
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Title of the spreadsheet's first worksheet.
    async fn first_sheet_title(&self) -> Result<String, ApiError> {
        let url = self.spreadsheet_url(&[])?;
        let metadata: SpreadsheetMetadata = self.get_json(url, &[("fields", "sheets.properties.title")]).await?;
        first_sheet(metadata)
    }
}

#[async_trait]
impl TabularSource for GoogleSheetsClient {
    /// An empty `source_name` reads the first worksheet.
    async fn fetch_rows(&self, source_name: &str) -> Result<Vec<RawRow>, ApiError> {
        let sheet = match source_name.trim() {
            "" => self.first_sheet_title().await?,
            name => name.to_string(),
        };
        let url = self.spreadsheet_url(&["values", sheet.as_str()])?;

        let body: ValueRangeResponse = self.get_json(url, &[("majorDimension", "ROWS")]).await?;
        let cells = body.values.into_iter().map(|row| row.into_iter().map(cell_text).collect()).collect();

        normalize_rows(cells, &self.columns)
    }
}

fn first_sheet(metadata: SpreadsheetMetadata) -> Result<String, ApiError> {
    metadata
        .sheets
        .into_iter()
        .next()
        .map(|sheet| sheet.properties.title)
        .ok_or_else(|| ApiError::InvalidData("spreadsheet has no worksheets".to_string()))
}

/// Renders one cell as the text a user would see in it.
fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Turns a raw grid (header row first) into canonical rows.
///
/// Every header cell must appear in `columns` (compared trimmed and
/// case-insensitively) and every canonical field must be covered exactly once;
/// anything else is a `SchemaMismatch`. Data rows with an empty cell, including
/// cells missing off the end of a short row, are dropped.
pub fn normalize_rows(
    mut grid: Vec<Vec<String>>,
    columns: &HashMap<String, CanonicalField>,
) -> Result<Vec<RawRow>, ApiError> {
    if grid.is_empty() {
        return Ok(Vec::new());
    }
    let header = grid.remove(0);

    let lookup: HashMap<String, CanonicalField> =
        columns.iter().map(|(name, field)| (name.trim().to_lowercase(), *field)).collect();

    let mut layout = Vec::with_capacity(header.len());
    for name in &header {
        let field = lookup
            .get(&name.trim().to_lowercase())
            .copied()
            .ok_or_else(|| ApiError::SchemaMismatch(format!("unrecognised column '{name}'")))?;
        if layout.contains(&field) {
            return Err(ApiError::SchemaMismatch(format!("more than one column maps to '{field}'")));
        }
        layout.push(field);
    }
    if let Some(missing) = CanonicalField::ALL.into_iter().find(|f| !layout.contains(f)) {
        return Err(ApiError::SchemaMismatch(format!("no column for '{missing}'")));
    }

    let total = grid.len();
    let rows: Vec<RawRow> = grid
        .into_iter()
        .filter_map(|cells| {
            let mut row = RawRow::new();
            for (index, field) in layout.iter().enumerate() {
                let value = cells.get(index).map(|c| c.trim()).unwrap_or_default();
                if value.is_empty() {
                    return None;
                }
                row.insert(*field, value);
            }
            Some(row)
        })
        .collect();

    if rows.len() < total {
        tracing::debug!(dropped = total - rows.len(), "Skipped incomplete source rows.");
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::settings::default_columns;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect()
    }

    const HEADER: &[&str] = &["№", "заказ №", "стоимость, $", "срок поставки"];

    #[test]
    fn remaps_columns_to_canonical_fields() {
        let rows = normalize_rows(grid(&[HEADER, &["1", "1249708", "675", "24.05.2022"]]), &default_columns()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(CanonicalField::IndexNumber), Some("1"));
        assert_eq!(rows[0].get(CanonicalField::OrderId), Some("1249708"));
        assert_eq!(rows[0].get(CanonicalField::PriceForeign), Some("675"));
        assert_eq!(rows[0].get(CanonicalField::DeliveryDate), Some("24.05.2022"));
    }

    #[test]
    fn rows_with_any_empty_value_are_dropped() {
        let rows = normalize_rows(
            grid(&[
                HEADER,
                &["1", "5", "", "2024-01-01"],
                &["2", "6", "10", "2024-01-02"],
                &["3", "7", "10"],
                &["4", "  ", "10", "2024-01-03"],
            ]),
            &default_columns(),
        )
        .unwrap();

        let ids: Vec<_> = rows.iter().map(|r| r.get(CanonicalField::OrderId).unwrap()).collect();
        assert_eq!(ids, vec!["6"]);
    }

    #[test]
    fn header_is_matched_case_insensitively_and_trimmed() {
        let rows = normalize_rows(
            grid(&[&[" № ", "ЗАКАЗ №", "Стоимость, $", "срок поставки"], &["1", "A", "1", "2024-01-01"]]),
            &default_columns(),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn unknown_column_is_schema_mismatch() {
        let result = normalize_rows(
            grid(&[&["№", "заказ №", "стоимость, $", "срок поставки", "comment"], &["1", "A", "1", "2024-01-01", "x"]]),
            &default_columns(),
        );
        assert!(matches!(result, Err(ApiError::SchemaMismatch(msg)) if msg.contains("comment")));
    }

    #[test]
    fn missing_column_is_schema_mismatch() {
        let result = normalize_rows(grid(&[&["№", "заказ №", "стоимость, $"]]), &default_columns());
        assert!(matches!(result, Err(ApiError::SchemaMismatch(msg)) if msg.contains("delivery_date")));
    }

    #[test]
    fn empty_sheet_yields_no_rows() {
        assert!(normalize_rows(Vec::new(), &default_columns()).unwrap().is_empty());
        assert!(normalize_rows(grid(&[HEADER]), &default_columns()).unwrap().is_empty());
    }

    #[test]
    fn first_worksheet_is_picked_from_metadata() {
        let metadata: SpreadsheetMetadata = serde_json::from_str(
            r#"{"sheets":[{"properties":{"title":"Orders"}},{"properties":{"title":"Archive"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_sheet(metadata).unwrap(), "Orders");

        let empty: SpreadsheetMetadata = serde_json::from_str("{}").unwrap();
        assert!(matches!(first_sheet(empty), Err(ApiError::InvalidData(_))));
    }

    #[test]
    fn numeric_cells_render_as_text() {
        assert_eq!(cell_text(serde_json::json!(675)), "675");
        assert_eq!(cell_text(serde_json::json!("24.05.2022")), "24.05.2022");
        assert_eq!(cell_text(Value::Null), "");
    }
}
