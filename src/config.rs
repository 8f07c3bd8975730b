use crate::connection::{BackoffPolicy, Credentials};
use crate::error::ConfigError;
use crate::execution::OrderPolicy;
use crate::models::Timeframe;
use crate::risk::RiskLimits;
use crate::strategy::{BandMode, BollingerConfig, BollingerEngine, DonchianEngine, SignalEngine};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Which signal engine drives the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Bollinger,
    Donchian,
}

/// Runtime settings, layered from defaults, an optional TOML file and
/// `FXBOT_*` environment variables (a `.env` file is honored via
/// dotenvy before loading).
///
/// Validation is fatal at startup: the process never reaches the
/// gateway with an out-of-range parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    // Terminal session
    pub account: Option<u64>,
    pub password: Option<String>,
    pub server: Option<String>,
    pub bridge_url: String,

    // Instrument
    pub symbol: String,
    pub timeframe: Timeframe,

    // Signal engine
    pub engine: EngineKind,
    pub period: usize,
    pub multiplier: f64,
    pub band_mode: BandMode,
    pub donchian_period: usize,
    pub atr_period: usize,

    // Orders
    pub volume: f64,
    pub atr_stop_multiple: f64,
    pub take_profit_at_middle: bool,
    pub magic: u64,

    // Cadence and resilience
    pub poll_interval_secs: u64,
    pub call_timeout_secs: u64,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub max_connect_attempts: u32,
    pub max_degraded_strikes: u32,

    // Shutdown and audit
    pub flatten_on_exit: bool,
    /// Empty string disables the journal.
    pub journal_path: String,

    #[serde(default)]
    pub risk: RiskLimits,
}

impl Settings {
    pub fn load(file: Option<&Path>, paper: bool) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("bridge_url", "http://127.0.0.1:6542")?
            .set_default("symbol", "EURUSD")?
            .set_default("timeframe", "H4")?
            .set_default("engine", "bollinger")?
            .set_default("period", 20)?
            .set_default("multiplier", 2.0)?
            .set_default("band_mode", "mean_reversion")?
            .set_default("donchian_period", 10)?
            .set_default("atr_period", 14)?
            .set_default("volume", 0.1)?
            .set_default("atr_stop_multiple", 3.0)?
            .set_default("take_profit_at_middle", true)?
            .set_default("magic", 1001)?
            .set_default("poll_interval_secs", 300)?
            .set_default("call_timeout_secs", 10)?
            .set_default("backoff_base_ms", 1000)?
            .set_default("backoff_cap_ms", 30_000)?
            .set_default("max_connect_attempts", 5)?
            .set_default("max_degraded_strikes", 3)?
            .set_default("flatten_on_exit", false)?
            .set_default("journal_path", "logs/trades.jsonl")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("FXBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate(paper)?;
        Ok(settings)
    }

    fn validate(&self, paper: bool) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::MissingField("symbol"));
        }

        // Paper runs need no session; the bridge does
        if !paper {
            if self.account.is_none() {
                return Err(ConfigError::MissingField("account"));
            }
            if self.password.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigError::MissingField("password"));
            }
            if self.server.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigError::MissingField("server"));
            }
        }

        if self.period < 2 {
            return Err(ConfigError::InvalidRange(
                "period",
                format!("{} (must be at least 2)", self.period),
            ));
        }
        if self.multiplier <= 0.0 || !self.multiplier.is_finite() {
            return Err(ConfigError::InvalidRange(
                "multiplier",
                format!("{} (must be positive)", self.multiplier),
            ));
        }
        if self.donchian_period < 1 {
            return Err(ConfigError::InvalidRange(
                "donchian_period",
                "0 (must be at least 1)".to_string(),
            ));
        }
        if self.atr_period < 1 {
            return Err(ConfigError::InvalidRange(
                "atr_period",
                "0 (must be at least 1)".to_string(),
            ));
        }
        if self.volume <= 0.0 || !self.volume.is_finite() {
            return Err(ConfigError::InvalidRange(
                "volume",
                format!("{} (must be positive)", self.volume),
            ));
        }
        if self.atr_stop_multiple < 0.0 {
            return Err(ConfigError::InvalidRange(
                "atr_stop_multiple",
                format!("{} (must not be negative)", self.atr_stop_multiple),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidRange(
                "poll_interval_secs",
                "0 (must be positive)".to_string(),
            ));
        }
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::InvalidRange(
                "call_timeout_secs",
                "0 (must be positive)".to_string(),
            ));
        }
        if self.max_connect_attempts < 1 {
            return Err(ConfigError::InvalidRange(
                "max_connect_attempts",
                "0 (must be at least 1)".to_string(),
            ));
        }
        if self.backoff_base_ms == 0 || self.backoff_base_ms > self.backoff_cap_ms {
            return Err(ConfigError::InvalidRange(
                "backoff_base_ms",
                format!(
                    "{} (must be positive and no larger than backoff_cap_ms {})",
                    self.backoff_base_ms, self.backoff_cap_ms
                ),
            ));
        }
        if self.risk.max_open_positions < 1 {
            return Err(ConfigError::InvalidRange(
                "risk.max_open_positions",
                "0 (must be at least 1)".to_string(),
            ));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(self.backoff_base_ms),
            cap: Duration::from_millis(self.backoff_cap_ms),
            max_attempts: self.max_connect_attempts,
        }
    }

    /// Credentials for bridge mode; paper mode trades without a session.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            account: self.account.unwrap_or(0),
            password: self.password.clone().unwrap_or_default(),
            server: self.server.clone().unwrap_or_default(),
        }
    }

    pub fn order_policy(&self) -> OrderPolicy {
        OrderPolicy {
            volume: self.volume,
            atr_stop_multiple: self.atr_stop_multiple,
            take_profit_at_middle: self.take_profit_at_middle,
            magic: self.magic,
        }
    }

    pub fn build_engine(&self) -> Box<dyn SignalEngine> {
        match self.engine {
            EngineKind::Bollinger => Box::new(BollingerEngine::new(BollingerConfig {
                period: self.period,
                multiplier: self.multiplier,
                mode: self.band_mode,
                atr_period: self.atr_period,
            })),
            EngineKind::Donchian => {
                Box::new(DonchianEngine::new(self.donchian_period, self.atr_period))
            }
        }
    }
}
