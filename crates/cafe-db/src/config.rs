//! # POS Configuration
//!
//! Settings for the register: where the database lives, how long a checkout
//! may take and the loyalty exchange rates.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     CAFE_DB_PATH=/var/lib/cafe/cafe.db                                  │
//! │     CAFE_CHECKOUT_TIMEOUT_MS=3000                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/cafe-pos/cafe-pos.toml (Linux)                            │
//! │     ~/Library/Application Support/com.cafe.cafe-pos/cafe-pos.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/cafe/cafe.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [checkout]
//! timeout_ms = 3000
//!
//! [loyalty]
//! accrual_unit = 200000     # spend that earns one point
//! redemption_value = 10000  # discount per redeemed point
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use cafe_core::{LoyaltyPolicy, POINT_ACCRUAL_UNIT, POINT_REDEMPTION_VALUE};

use crate::checkout::CheckoutService;
use crate::error::DbError;
use crate::pool::{Database, DbConfig};

/// File name looked up in the platform config directory.
pub const CONFIG_FILE_NAME: &str = "cafe-pos.toml";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config directory available on this platform")]
    NoConfigDir,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `cafe.db` in the platform data directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a checkout waits for another one's write lock.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    ProjectDirs::from("com", "cafe", "cafe-pos")
        .map(|dirs| dirs.data_dir().join("cafe.db"))
        .unwrap_or_else(|| PathBuf::from("cafe.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// `[checkout]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Abandon a checkout after this many milliseconds. Unset waits forever.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl CheckoutSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// `[loyalty]` section, in whole currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltySettings {
    #[serde(default = "default_accrual_unit")]
    pub accrual_unit: i64,

    #[serde(default = "default_redemption_value")]
    pub redemption_value: i64,
}

fn default_accrual_unit() -> i64 {
    POINT_ACCRUAL_UNIT.major()
}

fn default_redemption_value() -> i64 {
    POINT_REDEMPTION_VALUE.major()
}

impl Default for LoyaltySettings {
    fn default() -> Self {
        LoyaltySettings {
            accrual_unit: default_accrual_unit(),
            redemption_value: default_redemption_value(),
        }
    }
}

impl LoyaltySettings {
    pub fn policy(&self) -> ConfigResult<LoyaltyPolicy> {
        LoyaltyPolicy::from_major(self.accrual_unit, self.redemption_value)
            .map_err(|e| ConfigError::Invalid(format!("loyalty: {}", e)))
    }
}

// =============================================================================
// PosConfig
// =============================================================================

/// Complete register configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub loyalty: LoyaltySettings,
}

impl PosConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`cafe-pos.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading POS config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load POS config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Saves configuration to file, creating parent directories.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoConfigDir)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "POS config saved");
        Ok(())
    }

    /// `cafe-pos.toml` in the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "cafe", "cafe-pos")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Applies `CAFE_*` environment variables over the loaded values.
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("CAFE_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
        if let Some(value) = lookup("CAFE_DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("CAFE_DB_MAX_CONNECTIONS", value)?;
        }
        if let Some(value) = lookup("CAFE_CHECKOUT_TIMEOUT_MS") {
            // 0 disables the timeout
            let ms: u64 = parse_env("CAFE_CHECKOUT_TIMEOUT_MS", value)?;
            self.checkout.timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(value) = lookup("CAFE_POINT_ACCRUAL_UNIT") {
            self.loyalty.accrual_unit = parse_env("CAFE_POINT_ACCRUAL_UNIT", value)?;
        }
        if let Some(value) = lookup("CAFE_POINT_REDEMPTION_VALUE") {
            self.loyalty.redemption_value = parse_env("CAFE_POINT_REDEMPTION_VALUE", value)?;
        }
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path is empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".into(),
            ));
        }
        if self.checkout.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "checkout.timeout_ms must be positive (omit it to disable)".into(),
            ));
        }
        self.loyalty.policy()?;
        Ok(())
    }

    /// Pool settings derived from `[database]`.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    /// Opens the database with this configuration's loyalty policy.
    pub async fn open_database(&self) -> Result<Database, DbError> {
        let policy = self
            .loyalty
            .policy()
            .map_err(|e| DbError::Internal(e.to_string()))?;

        if let Some(parent) = self.database.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
            }
        }

        Ok(Database::new(self.db_config())
            .await?
            .with_loyalty_policy(policy))
    }

    /// Checkout coordinator with the configured timeout.
    pub fn checkout_service(&self, db: &Database) -> CheckoutService {
        db.checkout().with_timeout(self.checkout.timeout())
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_loyalty_constants() {
        let config = PosConfig::default();
        assert_eq!(config.loyalty.policy().unwrap(), LoyaltyPolicy::default());
        assert_eq!(config.checkout.timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_file() {
        let toml = r#"
            [database]
            path = "/tmp/cafe-test.db"

            [checkout]
            timeout_ms = 2500

            [loyalty]
            accrual_unit = 100000
        "#;
        let config: PosConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/cafe-test.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.checkout.timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.loyalty.accrual_unit, 100_000);
        assert_eq!(config.loyalty.redemption_value, 10_000);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CAFE_DB_PATH", "/srv/cafe.db"),
            ("CAFE_DB_MAX_CONNECTIONS", "3"),
            ("CAFE_CHECKOUT_TIMEOUT_MS", "1500"),
            ("CAFE_POINT_REDEMPTION_VALUE", "5000"),
        ]
        .into_iter()
        .collect();

        let mut config = PosConfig::default();
        config
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/srv/cafe.db"));
        assert_eq!(config.database.max_connections, 3);
        assert_eq!(config.checkout.timeout_ms, Some(1500));
        assert_eq!(config.loyalty.redemption_value, 5_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_env_value_rejected() {
        let mut config = PosConfig::default();
        let err = config
            .apply_overrides(|name| (name == "CAFE_DB_MAX_CONNECTIONS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "CAFE_DB_MAX_CONNECTIONS", .. }));
    }

    #[test]
    fn test_invalid_loyalty_rates_rejected() {
        let mut config = PosConfig::default();
        config.loyalty.accrual_unit = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = PosConfig::default();
        config.checkout.timeout_ms = Some(4000);
        config.save(Some(path.clone())).unwrap();

        let reloaded = PosConfig::from_file(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
