use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::time::Duration;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> Result<bool, String> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse::<bool>().map_err(|_| format!("{key} must be a bool, got {raw:?}")),
    }
}

fn env_decimal(key: &str, default: Decimal) -> Result<Decimal, String> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse::<Decimal>().map_err(|_| format!("{key} must be a decimal, got {raw:?}")),
    }
}

fn env_u32(key: &str, default: u32) -> Result<u32, String> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse::<u32>().map_err(|_| format!("{key} must be a non-negative integer, got {raw:?}")),
    }
}

fn env_u8(key: &str, default: u8) -> Result<u8, String> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse::<u8>().map_err(|_| format!("{key} must be an integer 0-255, got {raw:?}")),
    }
}

/// Every configuration key named in the external-interfaces section, loaded from environment
/// variables (optionally populated by a `.env` file) with documented defaults. A malformed or
/// missing required key is a fatal config error raised before any task spawns.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_dsn: String,
    pub redis_url: Option<String>,
    pub signal_queue_key: String,
    pub signal_max_retries: u32,

    pub rebalancer_market_hours_only: bool,
    pub enable_afterhours_rebalance: bool,
    pub afterhours_max_position_pct: Decimal,
    pub afterhours_max_urgency: u8,

    pub force_limit_orders: bool,
    pub max_urgency_level: u8,
    pub allow_market_orders_during_market_hours: bool,

    pub regime_reserve_pct_bull: Decimal,
    pub regime_reserve_pct_range: Decimal,
    pub regime_reserve_pct_bear: Decimal,
    pub intraday_reserve_delta_trend: Decimal,
    pub intraday_reserve_delta_range: Decimal,

    pub slack_webhook_url: Option<String>,
    pub broker_lot_size_error_code: String,
    pub broker_stale_price_error_code: String,
}

impl Config {
    /// Load from environment, applying an optional `.env`-style file first (existing
    /// environment variables always win), then CLI overrides from [`crate::cli::Cli`].
    pub fn load(env_file: Option<&str>) -> Result<Self, String> {
        if let Some(path) = env_file {
            load_dotenv(path)?;
        }

        let required = |key: &str| -> Result<String, String> {
            std::env::var(key).map_err(|_| format!("missing required configuration key {key}"))
        };

        Ok(Self {
            database_dsn: required("DATABASE_DSN")?,
            redis_url: std::env::var("REDIS_URL").ok(),
            signal_queue_key: env_or("SIGNAL_QUEUE_KEY", "trading"),
            signal_max_retries: env_u32("SIGNAL_MAX_RETRIES", 3)?,

            rebalancer_market_hours_only: env_bool("REBALANCER_MARKET_HOURS_ONLY", true)?,
            enable_afterhours_rebalance: env_bool("ENABLE_AFTERHOURS_REBALANCE", false)?,
            afterhours_max_position_pct: env_decimal("AFTERHOURS_MAX_POSITION_PCT", dec!(0.25))?,
            afterhours_max_urgency: env_u8("AFTERHOURS_MAX_URGENCY", 5)?,

            force_limit_orders: env_bool("FORCE_LIMIT_ORDERS", false)?,
            max_urgency_level: env_u8("MAX_URGENCY_LEVEL", 10)?,
            allow_market_orders_during_market_hours: env_bool("ALLOW_MARKET_ORDERS_DURING_MARKET_HOURS", true)?,

            regime_reserve_pct_bull: env_decimal("REGIME_RESERVE_PCT_BULL", dec!(0.15))?,
            regime_reserve_pct_range: env_decimal("REGIME_RESERVE_PCT_RANGE", dec!(0.30))?,
            regime_reserve_pct_bear: env_decimal("REGIME_RESERVE_PCT_BEAR", dec!(0.50))?,
            intraday_reserve_delta_trend: env_decimal("INTRADAY_RESERVE_DELTA_TREND", dec!(-0.05))?,
            intraday_reserve_delta_range: env_decimal("INTRADAY_RESERVE_DELTA_RANGE", dec!(0.05))?,

            slack_webhook_url: std::env::var("SLACK_WEBHOOK_URL").ok(),
            broker_lot_size_error_code: env_or("BROKER_LOT_SIZE_ERROR_CODE", "602001"),
            broker_stale_price_error_code: env_or("BROKER_STALE_PRICE_ERROR_CODE", "602035"),
        })
    }

    pub fn rebalance_interval(&self) -> Duration {
        Duration::from_secs(5 * 60)
    }
}

/// Minimal `KEY=VALUE` line parser for an optional `.env` file; does not overwrite variables
/// already present in the process environment.
fn load_dotenv(path: &str) -> Result<(), String> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(format!("failed to read env file {path}: {error}")),
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if std::env::var(key).is_err() {
            unsafe {
                std::env::set_var(key, value.trim().trim_matches('"'));
            }
        }
    }
    Ok(())
}
