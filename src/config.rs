use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub market_data_url: String,
    pub coin_names_url: String,
    pub quote_asset: String,
    pub top_n: usize,
    pub spreadsheet_path: PathBuf,
    pub report_path: PathBuf,
    pub refresh_interval: Duration,
    pub stale_after: Duration,
    pub http_timeout: Duration,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup so tests never touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let refresh_secs: u64 = parse_var(&lookup, "REFRESH_INTERVAL_SECS", 3600)?;
        if refresh_secs == 0 {
            return Err(AppError::Config(
                "REFRESH_INTERVAL_SECS must be greater than zero".into(),
            ));
        }

        let top_n: usize = parse_var(&lookup, "TOP_N", 50)?;
        if top_n == 0 {
            return Err(AppError::Config("TOP_N must be greater than zero".into()));
        }

        Ok(Self {
            port: parse_var(&lookup, "APP_PORT", 5000)?,
            environment: var("ENVIRONMENT", "development"),
            market_data_url: var("MARKET_DATA_URL", "https://data-api.binance.vision"),
            coin_names_url: var("COIN_NAMES_URL", "https://api.coingecko.com/api/v3"),
            quote_asset: var("QUOTE_ASSET", "USDT").to_uppercase(),
            top_n,
            spreadsheet_path: PathBuf::from(var("SPREADSHEET_PATH", "crypto_data.xlsx")),
            report_path: PathBuf::from(var("REPORT_PATH", "market_report.docx")),
            refresh_interval: Duration::from_secs(refresh_secs),
            stale_after: Duration::from_secs(parse_var(
                &lookup,
                "STALE_AFTER_SECS",
                refresh_secs,
            )?),
            http_timeout: Duration::from_secs(parse_var(&lookup, "HTTP_TIMEOUT_SECS", 30)?),
            otel_service_name: var("OTEL_SERVICE_NAME", "crypto-market-tracker"),
            otel_exporter_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} must be a number, got {raw:?}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.environment, "development");
        assert_eq!(config.quote_asset, "USDT");
        assert_eq!(config.top_n, 50);
        assert_eq!(config.spreadsheet_path, PathBuf::from("crypto_data.xlsx"));
        assert_eq!(config.report_path, PathBuf::from("market_report.docx"));
        assert_eq!(config.refresh_interval, Duration::from_secs(3600));
        assert_eq!(config.stale_after, Duration::from_secs(3600));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert!(!config.is_production());
    }

    #[test]
    fn test_stale_after_follows_refresh_interval() {
        let config = config_with(&[("REFRESH_INTERVAL_SECS", "300")]).unwrap();
        assert_eq!(config.refresh_interval, Duration::from_secs(300));
        assert_eq!(config.stale_after, Duration::from_secs(300));

        let config = config_with(&[
            ("REFRESH_INTERVAL_SECS", "300"),
            ("STALE_AFTER_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(config.stale_after, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("APP_PORT", "8080"),
            ("ENVIRONMENT", "production"),
            ("QUOTE_ASSET", "busd"),
            ("SPREADSHEET_PATH", "/tmp/out/data.xlsx"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.is_production());
        assert_eq!(config.quote_asset, "BUSD");
        assert_eq!(config.spreadsheet_path, PathBuf::from("/tmp/out/data.xlsx"));
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = config_with(&[("APP_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("APP_PORT"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(config_with(&[("REFRESH_INTERVAL_SECS", "0")]).is_err());
        assert!(config_with(&[("TOP_N", "0")]).is_err());
    }
}
