//! Engine configuration.
//!
//! Loaded in layers, later ones winning:
//! 1. Built-in defaults
//! 2. Optional TOML file
//! 3. `LABBILL_*` environment variables (`LABBILL_BUSY_TIMEOUT_MS=2000`)

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use labbill_core::fiscal::business_offset;
use labbill_core::lifecycle::RefundPolicy;
use labbill_core::Percentage;
use labbill_db::DbConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "LABBILL";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite database file, or `:memory:`
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// How long a writer waits for the SQLite write lock
    pub busy_timeout_ms: u64,

    /// Upper bound on a whole engine operation
    pub operation_timeout_ms: u64,

    /// Refunded share of paid, in basis points, at which an invoice becomes
    /// REFUNDED (10000 = fully refunded)
    pub full_refund_threshold_bps: u32,

    /// Business timezone used for fiscal years (+330 = IST)
    pub utc_offset_minutes: i32,

    /// Invoice number prefix, as in `INV/25-26/00001`
    pub invoice_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: PathBuf::from("labbill.db"),
            max_connections: 8,
            busy_timeout_ms: 5_000,
            operation_timeout_ms: 15_000,
            full_refund_threshold_bps: 10_000,
            utc_offset_minutes: 330,
            invoice_prefix: "INV".to_string(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from the optional file and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(file, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with(file: Option<&Path>, env: config::Environment) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder.add_source(env.try_parsing(true)).build()?;
        let config: EngineConfig = settings.try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges the type system can't express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::invalid("max_connections", "must be at least 1"));
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::invalid("busy_timeout_ms", "must be positive"));
        }
        if self.operation_timeout_ms == 0 {
            return Err(ConfigError::invalid("operation_timeout_ms", "must be positive"));
        }
        if !(1..=10_000).contains(&self.full_refund_threshold_bps) {
            return Err(ConfigError::invalid(
                "full_refund_threshold_bps",
                "must be between 1 and 10000",
            ));
        }
        if business_offset(self.utc_offset_minutes).is_none() {
            return Err(ConfigError::invalid(
                "utc_offset_minutes",
                "must be within ±24 hours",
            ));
        }

        let prefix = self.invoice_prefix.trim();
        if prefix.is_empty() || prefix.contains('/') {
            return Err(ConfigError::invalid(
                "invoice_prefix",
                "must be non-empty and must not contain '/'",
            ));
        }

        Ok(())
    }

    /// Pool settings for the database layer.
    pub fn to_db_config(&self) -> DbConfig {
        let base = if self.database_path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(&self.database_path).max_connections(self.max_connections)
        };

        base.busy_timeout(self.busy_timeout())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn refund_policy(&self) -> RefundPolicy {
        RefundPolicy::new(Percentage::from_bps(self.full_refund_threshold_bps))
    }

    /// Business timezone.
    ///
    /// ## Errors
    /// `InvalidValue` when the offset is out of range.
    pub fn business_offset(&self) -> Result<FixedOffset, ConfigError> {
        business_offset(self.utc_offset_minutes)
            .ok_or_else(|| ConfigError::invalid("utc_offset_minutes", "must be within ±24 hours"))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: &str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = EngineConfig::load_with(None, env(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.business_offset().unwrap().local_minus_utc(), 330 * 60);
        assert_eq!(config.refund_policy(), RefundPolicy::default());
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let config = EngineConfig::load_with(
            None,
            env(&[
                ("LABBILL_BUSY_TIMEOUT_MS", "250"),
                ("LABBILL_INVOICE_PREFIX", "LAB"),
                ("LABBILL_UTC_OFFSET_MINUTES", "0"),
            ]),
        )
        .unwrap();

        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
        assert_eq!(config.invoice_prefix, "LAB");
        assert_eq!(config.utc_offset_minutes, 0);
        assert_eq!(config.max_connections, 8);
    }

    #[test]
    fn test_file_layer_sits_under_environment() {
        let path = std::env::temp_dir().join(format!("labbill-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "invoice_prefix = \"BILL\"\nmax_connections = 3\n").unwrap();

        let config =
            EngineConfig::load_with(Some(&path), env(&[("LABBILL_MAX_CONNECTIONS", "4")])).unwrap();
        assert_eq!(config.invoice_prefix, "BILL");
        assert_eq!(config.max_connections, 4);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::load_with(None, env(&[("LABBILL_INVOICE_PREFIX", "A/B")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "invoice_prefix"));

        let config = EngineConfig {
            full_refund_threshold_bps: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            utc_offset_minutes: 24 * 60,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_memory_path_maps_to_in_memory_pool() {
        let config = EngineConfig {
            database_path: PathBuf::from(":memory:"),
            busy_timeout_ms: 100,
            ..EngineConfig::default()
        };
        let db = config.to_db_config();
        assert!(db.is_in_memory());
        assert_eq!(db.max_connections, 1);
        assert_eq!(db.busy_timeout, Duration::from_millis(100));
    }
}
