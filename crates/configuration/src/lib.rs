use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    DatabaseConfig, HttpConfig, JobKind, JobSchedule, LoggingConfig, RateConfig, ScheduleConfig,
    ServerConfig, Settings, SheetsConfig, TelegramConfig,
};

/// The file read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Loads and validates the application configuration.
///
/// Values come from the TOML file first and are then overridden by environment
/// variables prefixed with `ORDER_SYNC`, using `__` to separate nested keys
/// (e.g. `ORDER_SYNC__TELEGRAM__TOKEN`). Secrets are expected to arrive
/// through the environment rather than the file.
pub fn load_config(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("ORDER_SYNC")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings = builder.try_deserialize::<Settings>()?;
    settings.validate()?;

    Ok(settings)
}

/// Parses settings from an in-memory TOML document, without environment overrides.
pub fn load_config_from_str(toml: &str) -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?
        .try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::CanonicalField;

    const MINIMAL: &str = r#"
        [sheets]
        spreadsheet_id = "sheet-123"
        credentials_path = "secret/creds.json"

        [telegram]
        token = "bot-token"
        chat_id = "-100200"
    "#;

    #[test]
    fn minimal_file_gets_stock_defaults() {
        let settings = load_config_from_str(MINIMAL).unwrap();

        assert!(settings.sheets.sheet_name.is_empty(), "first worksheet by default");
        assert_eq!(settings.rate.currency_id, "R01235");
        assert_eq!(settings.schedule.sync, JobSchedule::Every { every_secs: 15 });
        assert_eq!(settings.schedule.rate_refresh, JobSchedule::Every { every_secs: 10800 });
        assert_eq!(settings.sheets.columns.get("заказ №"), Some(&CanonicalField::OrderId));
        assert_eq!(
            settings.schedule.reset.time_of_day().unwrap(),
            chrono::NaiveTime::from_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn missing_telegram_credentials_are_rejected() {
        let toml = r#"
            [sheets]
            spreadsheet_id = "sheet-123"
            credentials_path = "secret/creds.json"
        "#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("telegram")));
    }

    #[test]
    fn schedule_accepts_daily_notify_and_rejects_unknown_version() {
        let daily = format!(
            "{MINIMAL}\n[schedule]\nversion = 1\nrate_refresh = {{ every_secs = 60 }}\nsync = {{ every_secs = 15 }}\nnotify = {{ daily_at = \"09:30\" }}\nreset = {{ daily_at = \"00:00\" }}\n"
        );
        let settings = load_config_from_str(&daily).unwrap();
        assert_eq!(settings.schedule.notify, JobSchedule::Daily { daily_at: "09:30".to_string() });

        let wrong_version = daily.replace("version = 1", "version = 2");
        assert!(matches!(
            load_config_from_str(&wrong_version),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let toml = format!(
            "{MINIMAL}\n[schedule]\nversion = 1\nrate_refresh = {{ every_secs = 60 }}\nsync = {{ every_secs = 0 }}\nnotify = {{ every_secs = 60 }}\nreset = {{ daily_at = \"00:00\" }}\n"
        );
        assert!(matches!(load_config_from_str(&toml), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn column_table_must_cover_every_field() {
        let toml = format!("{MINIMAL}\n[sheets.columns]\n\"Order\" = \"order_id\"\n");
        let err = load_config_from_str(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("index_number")));
    }
}
