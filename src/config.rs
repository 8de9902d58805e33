use std::env;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::risk::RiskParams;

/// Startup failure: raised at construction, before any loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
    #[error("live mode requires VENUE_ENDPOINT and VENUE_API_KEY")]
    MissingCredentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Paper,
    Live,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub symbol: String,
    pub interval_ms: u64,
    pub threshold_bps: Decimal,
    pub trade_qty: Decimal,
    pub risk: RiskParams,
    pub kill_switch: bool,
    pub binance_base_url: Option<String>,
    pub venue_endpoint: Option<String>,
    pub venue_api_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let defaults = RiskParams::default();
        Self {
            mode: Mode::Paper,
            symbol: "BTCUSDT".to_string(),
            interval_ms: 2000,
            threshold_bps: Decimal::from(15),
            trade_qty: Decimal::new(1, 3), // 0.001
            risk: defaults,
            kill_switch: false,
            binance_base_url: None,
            venue_endpoint: None,
            venue_api_key: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let mode = match env_str("MODE").as_deref() {
            Some("live") => Mode::Live,
            _ => Mode::Paper,
        };

        let risk = RiskParams {
            capital_base: env_decimal("CAPITAL_BASE", defaults.risk.capital_base)?,
            risk_per_trade_bps: env_decimal("RISK_PER_TRADE_BPS", defaults.risk.risk_per_trade_bps)?,
            daily_loss_cap_bps: env_decimal("DAILY_LOSS_CAP_BPS", defaults.risk.daily_loss_cap_bps)?,
            max_drawdown_bps: env_decimal("MAX_DRAWDOWN_BPS", defaults.risk.max_drawdown_bps)?,
            max_position_notional: env_decimal(
                "MAX_POSITION_NOTIONAL",
                defaults.risk.max_position_notional,
            )?,
            allow_leverage: env_bool("ALLOW_LEVERAGE", false)?,
            max_leverage: env_decimal("MAX_LEVERAGE", defaults.risk.max_leverage)?,
        };

        Config {
            mode,
            symbol: env_str("SYMBOL").unwrap_or(defaults.symbol),
            interval_ms: env_u64("TICK_INTERVAL_MS", defaults.interval_ms)?,
            threshold_bps: env_decimal("THRESHOLD_BPS", defaults.threshold_bps)?,
            trade_qty: env_decimal("TRADE_QTY", defaults.trade_qty)?,
            risk,
            kill_switch: env_bool("KILL_SWITCH", false)?,
            binance_base_url: env_str("BINANCE_BASE_URL"),
            venue_endpoint: env_str("VENUE_ENDPOINT"),
            venue_api_key: env_str("VENUE_API_KEY"),
            request_timeout: defaults.request_timeout,
        }
        .validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.mode == Mode::Live
            && (self.venue_endpoint.is_none() || self.venue_api_key.is_none())
        {
            return Err(ConfigError::MissingCredentials);
        }
        Ok(self)
    }
}

fn env_str(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_decimal(name: &'static str, default: Decimal) -> Result<Decimal, ConfigError> {
    match env_str(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}

fn env_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env_str(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}

fn env_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env_str(name) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "on" => Ok(true),
            "0" | "false" | "no" | "n" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { name, value: raw }),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_mode_without_credentials_is_fatal() {
        let cfg = Config { mode: Mode::Live, ..Config::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingCredentials)));
    }

    #[test]
    fn live_mode_with_credentials_passes() {
        let cfg = Config {
            mode: Mode::Live,
            venue_endpoint: Some("https://bridge.example".to_string()),
            venue_api_key: Some("key".to_string()),
            ..Config::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn paper_mode_needs_no_credentials() {
        assert!(Config::default().validate().is_ok());
    }
}
