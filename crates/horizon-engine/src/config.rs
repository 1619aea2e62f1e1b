//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     HORIZON_DATABASE_PATH=/var/lib/horizon/box-office.db               │
//! │     HORIZON_HOLD_SECS=900                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/boxoffice/horizon.toml (Linux)                           │
//! │     ~/Library/Application Support/com.horizon.boxoffice/horizon.toml   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "horizon.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//!
//! [checkout]
//! min_quantity = 1
//! max_quantity = 10
//! tax_rate_bps = 800        # 8%
//! service_fee_bps = 300     # 3%
//! currency = "USD"
//! hold_secs = 900           # seats stay held this long without payment
//!
//! [sweeper]
//! interval_secs = 60
//! batch_size = 100
//!
//! [compensation]
//! initial_backoff_ms = 50
//! max_elapsed_ms = 2000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use horizon_core::money::Rate;
use horizon_core::validation::validate_currency;
use horizon_core::{
    DEFAULT_CURRENCY, DEFAULT_SERVICE_FEE_BPS, DEFAULT_TAX_RATE_BPS, MAX_TICKETS_PER_ORDER,
    MIN_TICKETS_PER_ORDER,
};
use horizon_db::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, created when missing.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on SQLite's lock (seconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("horizon.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

impl DatabaseSettings {
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.path.clone())
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_secs(self.busy_timeout_secs))
    }
}

// =============================================================================
// Checkout Settings
// =============================================================================

/// Per-order bounds, rates and the hold window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSettings {
    #[serde(default = "default_min_quantity")]
    pub min_quantity: i64,

    #[serde(default = "default_max_quantity")]
    pub max_quantity: i64,

    /// Tax in basis points of the subtotal.
    #[serde(default = "default_tax_rate")]
    pub tax_rate_bps: u32,

    /// Service fee in basis points of the subtotal.
    #[serde(default = "default_service_fee")]
    pub service_fee_bps: u32,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Seconds a reservation stays held waiting for its payment.
    #[serde(default = "default_hold_secs")]
    pub hold_secs: i64,
}

fn default_min_quantity() -> i64 {
    MIN_TICKETS_PER_ORDER
}

fn default_max_quantity() -> i64 {
    MAX_TICKETS_PER_ORDER
}

fn default_tax_rate() -> u32 {
    DEFAULT_TAX_RATE_BPS
}

fn default_service_fee() -> u32 {
    DEFAULT_SERVICE_FEE_BPS
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_hold_secs() -> i64 {
    900
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            min_quantity: default_min_quantity(),
            max_quantity: default_max_quantity(),
            tax_rate_bps: default_tax_rate(),
            service_fee_bps: default_service_fee(),
            currency: default_currency(),
            hold_secs: default_hold_secs(),
        }
    }
}

impl CheckoutSettings {
    pub fn tax_rate(&self) -> Rate {
        Rate::from_bps(self.tax_rate_bps)
    }

    pub fn service_fee_rate(&self) -> Rate {
        Rate::from_bps(self.service_fee_bps)
    }

    pub fn hold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_secs)
    }
}

// =============================================================================
// Sweeper Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperSettings {
    /// Interval between sweeps (seconds).
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,

    /// Expired holds handled per sweep.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_batch_size() -> i64 {
    100
}

impl Default for SweeperSettings {
    fn default() -> Self {
        SweeperSettings {
            interval_secs: default_sweep_interval(),
            batch_size: default_batch_size(),
        }
    }
}

// =============================================================================
// Compensation Settings
// =============================================================================

/// Retry policy for releasing the seats of a failed checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationSettings {
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Give up (and escalate) after this long.
    #[serde(default = "default_max_elapsed")]
    pub max_elapsed_ms: u64,
}

fn default_initial_backoff() -> u64 {
    50
}

fn default_max_elapsed() -> u64 {
    2000
}

impl Default for CompensationSettings {
    fn default() -> Self {
        CompensationSettings {
            initial_backoff_ms: default_initial_backoff(),
            max_elapsed_ms: default_max_elapsed(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub sweeper: SweeperSettings,

    #[serde(default)]
    pub compensation: CompensationSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (horizon.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        let checkout = &self.checkout;

        if checkout.min_quantity < 1 || checkout.max_quantity < checkout.min_quantity {
            return Err(EngineError::InvalidConfig(format!(
                "quantity bounds {}..={} are not a valid range",
                checkout.min_quantity, checkout.max_quantity
            )));
        }

        if checkout.tax_rate_bps > 10_000 || checkout.service_fee_bps > 10_000 {
            return Err(EngineError::InvalidConfig(
                "tax and service fee rates must not exceed 100%".into(),
            ));
        }

        validate_currency(&checkout.currency)
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;

        if checkout.hold_secs <= 0 {
            return Err(EngineError::InvalidConfig(
                "hold_secs must be greater than 0".into(),
            ));
        }

        if self.sweeper.interval_secs == 0 || self.sweeper.batch_size <= 0 {
            return Err(EngineError::InvalidConfig(
                "sweeper interval and batch size must be greater than 0".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(EngineError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("HORIZON_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("HORIZON_MAX_CONNECTIONS") {
            if let Ok(m) = max.parse::<u32>() {
                self.database.max_connections = m;
            }
        }

        if let Ok(hold) = std::env::var("HORIZON_HOLD_SECS") {
            if let Ok(h) = hold.parse::<i64>() {
                debug!(hold_secs = h, "Overriding hold window from environment");
                self.checkout.hold_secs = h;
            }
        }

        if let Ok(currency) = std::env::var("HORIZON_CURRENCY") {
            self.checkout.currency = currency.to_uppercase();
        }

        if let Ok(interval) = std::env::var("HORIZON_SWEEP_INTERVAL_SECS") {
            match interval.parse::<u64>() {
                Ok(i) => self.sweeper.interval_secs = i,
                Err(_) => warn!(value = %interval, "Ignoring invalid sweep interval in environment"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "horizon", "boxoffice")
            .map(|dirs| dirs.config_dir().join("horizon.toml"))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweeper.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.checkout.max_quantity, 10);
        assert_eq!(config.checkout.tax_rate().bps(), 800);
        assert_eq!(config.checkout.service_fee_rate().bps(), 300);
        assert_eq!(config.checkout.currency, "USD");
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.checkout.max_quantity = 0;
        assert!(config.validate().unwrap_err().is_config_error());

        let mut config = EngineConfig::default();
        config.checkout.currency = "dollars".into();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.sweeper.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            [checkout]
            max_quantity = 4
            hold_secs = 120
        "#;
        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.checkout.max_quantity, 4);
        assert_eq!(config.checkout.min_quantity, 1);
        assert_eq!(config.checkout.hold().num_seconds(), 120);
        assert_eq!(config.sweeper.interval_secs, 60);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.checkout.hold_secs, config.checkout.hold_secs);
        assert_eq!(parsed.database.path, config.database.path);
    }
}
