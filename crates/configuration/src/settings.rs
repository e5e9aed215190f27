use chrono::NaiveTime;
use core_types::CanonicalField;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// The schedule layout this build understands.
pub const SCHEDULE_VERSION: u32 = 1;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub rate: RateConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the reporting API listens.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Connection pool tuning. The URL itself comes from `DATABASE_URL`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// The spreadsheet orders are imported from.
#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// The sheet (tab) read on every sync. Empty reads the first worksheet.
    #[serde(default)]
    pub sheet_name: String,
    /// Path to the Google service-account key file.
    pub credentials_path: PathBuf,
    #[serde(default = "default_sheets_api_url")]
    pub api_base_url: String,
    /// Source header -> canonical field. Headers are matched case-insensitively.
    #[serde(default = "default_columns")]
    pub columns: HashMap<String, CanonicalField>,
}

/// The central-bank feed and the currency pair it is read for.
#[derive(Debug, Clone, Deserialize)]
pub struct RateConfig {
    pub feed_url: String,
    /// The feed's own identifier for the monitored currency (`R01235` is USD).
    pub currency_id: String,
    pub foreign_currency: String,
    pub local_currency: String,
}

/// Telegram bot credentials for delivery alerts.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_telegram_api_url")]
    pub api_base_url: String,
}

/// Outbound HTTP settings shared by every external client.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

/// When each job runs.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub version: u32,
    pub rate_refresh: JobSchedule,
    pub sync: JobSchedule,
    pub notify: JobSchedule,
    pub reset: JobSchedule,
}

/// Either a fixed interval or a daily local time of day (`HH:MM` or `HH:MM:SS`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum JobSchedule {
    Every { every_secs: u64 },
    Daily { daily_at: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// When set, logs are also written to a daily-rolling file here.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

/// The jobs the service knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    RefreshRate,
    Sync,
    Notify,
    Reset,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [JobKind::RefreshRate, JobKind::Sync, JobKind::Notify, JobKind::Reset];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::RefreshRate => "refresh-rate",
            JobKind::Sync => "sync",
            JobKind::Notify => "notify",
            JobKind::Reset => "reset",
        }
    }
}

impl JobSchedule {
    /// Parses the `daily_at` string. Returns `None` for interval schedules.
    pub fn time_of_day(&self) -> Result<Option<NaiveTime>, ConfigError> {
        match self {
            JobSchedule::Every { .. } => Ok(None),
            JobSchedule::Daily { daily_at } => NaiveTime::parse_from_str(daily_at, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(daily_at, "%H:%M"))
                .map(Some)
                .map_err(|_| ConfigError::ValidationError(format!("invalid time of day '{daily_at}'"))),
        }
    }
}

impl ScheduleConfig {
    pub fn for_job(&self, job: JobKind) -> &JobSchedule {
        match job {
            JobKind::RefreshRate => &self.rate_refresh,
            JobKind::Sync => &self.sync,
            JobKind::Notify => &self.notify,
            JobKind::Reset => &self.reset,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    /// Rejects settings the service cannot start with: missing credentials,
    /// an unknown schedule version, zero intervals or malformed times.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sheets.spreadsheet_id.trim().is_empty() {
            return Err(ConfigError::ValidationError("sheets.spreadsheet_id must be set".to_string()));
        }
        if self.sheets.credentials_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError("sheets.credentials_path must be set".to_string()));
        }
        for field in CanonicalField::ALL {
            if !self.sheets.columns.values().any(|mapped| *mapped == field) {
                return Err(ConfigError::ValidationError(format!(
                    "sheets.columns has no source column for '{field}'"
                )));
            }
        }
        if self.telegram.token.trim().is_empty() || self.telegram.chat_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "telegram.token and telegram.chat_id must be set".to_string(),
            ));
        }
        if self.schedule.version != SCHEDULE_VERSION {
            return Err(ConfigError::ValidationError(format!(
                "unsupported schedule version {} (expected {SCHEDULE_VERSION})",
                self.schedule.version
            )));
        }
        for job in JobKind::ALL {
            let schedule = self.schedule.for_job(job);
            if let JobSchedule::Every { every_secs: 0 } = schedule {
                return Err(ConfigError::ValidationError(format!("schedule.{} interval must be positive", job.name())));
            }
            schedule.time_of_day()?;
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::ValidationError("http.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

// --- Default Implementations ---

fn default_sheets_api_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

/// The header row of the order sheet.
pub fn default_columns() -> HashMap<String, CanonicalField> {
    HashMap::from([
        ("№".to_string(), CanonicalField::IndexNumber),
        ("заказ №".to_string(), CanonicalField::OrderId),
        ("стоимость, $".to_string(), CanonicalField::PriceForeign),
        ("срок поставки".to_string(), CanonicalField::DeliveryDate),
    ])
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 3000 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { max_connections: 10, acquire_timeout_secs: 5 }
    }
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            feed_url: "http://www.cbr.ru/scripts/XML_daily.asp".to_string(),
            currency_id: "R01235".to_string(),
            foreign_currency: "USD".to_string(),
            local_currency: "RUB".to_string(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self { token: String::new(), chat_id: String::new(), api_base_url: default_telegram_api_url() }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            version: SCHEDULE_VERSION,
            rate_refresh: JobSchedule::Every { every_secs: 3 * 60 * 60 },
            sync: JobSchedule::Every { every_secs: 15 },
            notify: JobSchedule::Every { every_secs: 15 * 60 },
            reset: JobSchedule::Daily { daily_at: "00:00".to_string() },
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), directory: None, file_prefix: "order-sync.log".to_string() }
    }
}
