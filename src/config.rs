//! Configuration management for Oersted
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files. The `api` section is the persisted
//! configuration record produced by the setup flow: access token, price zone
//! code and metering point id.

use crate::error::{OerstedError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Default locations probed by [`Config::load`]
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "oersted_config.yaml",
    "/data/oersted_config.yaml",
    "/etc/oersted/config.yaml",
];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pricing API configuration and the persisted setup record
    pub api: ApiConfig,

    /// Refresh scheduling configuration
    pub refresh: RefreshConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Display timezone for the daily price curve
    pub timezone: String,
}

/// Pricing API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// JSON-RPC endpoint URL
    pub endpoint: String,

    /// Bearer access token
    pub access_token: String,

    /// Price zone code of the selected metering point
    pub price_code: String,

    /// Metering point id of the selected meter
    pub mpid: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Refresh scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Hour of day (in the reference timezone) for the daily price fetch
    pub daily_hour: u32,

    /// Upper bound for the per-process random minute offset of the daily tick
    pub daily_jitter_minutes: u32,

    /// Timezone the daily tick is evaluated in (the API's locale)
    pub reference_timezone: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file (or directory for rotated logs)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://jsonrpc.barry.energy/json-rpc".to_string(),
            access_token: String::new(),
            price_code: String::new(),
            mpid: String::new(),
            timeout_secs: 15,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            daily_hour: 13,
            daily_jitter_minutes: 10,
            reference_timezone: "Europe/Stockholm".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/oersted.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            refresh: RefreshConfig::default(),
            logging: LoggingConfig::default(),
            timezone: "Europe/Copenhagen".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        for path in &DEFAULT_CONFIG_PATHS {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration (setup flow fills the record)
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Whether the setup flow has produced a usable configuration record
    pub fn is_configured(&self) -> bool {
        !self.api.access_token.trim().is_empty()
            && !self.api.price_code.is_empty()
            && !self.api.mpid.is_empty()
    }

    /// Resolve the display timezone
    pub fn display_timezone(&self) -> Result<chrono_tz::Tz> {
        chrono_tz::Tz::from_str(&self.timezone)
            .map_err(|_| OerstedError::validation("timezone", &format!("unknown: {}", self.timezone)))
    }

    /// Resolve the reference timezone for the daily tick
    pub fn reference_timezone(&self) -> Result<chrono_tz::Tz> {
        chrono_tz::Tz::from_str(&self.refresh.reference_timezone).map_err(|_| {
            OerstedError::validation(
                "refresh.reference_timezone",
                &format!("unknown: {}", self.refresh.reference_timezone),
            )
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.endpoint.is_empty() {
            return Err(OerstedError::validation(
                "api.endpoint",
                "Endpoint URL cannot be empty",
            ));
        }

        if self.api.timeout_secs == 0 {
            return Err(OerstedError::validation(
                "api.timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.refresh.daily_hour > 23 {
            return Err(OerstedError::validation(
                "refresh.daily_hour",
                "Must be between 0 and 23",
            ));
        }

        if self.refresh.daily_jitter_minutes > 59 {
            return Err(OerstedError::validation(
                "refresh.daily_jitter_minutes",
                "Must be between 0 and 59",
            ));
        }

        self.display_timezone()?;
        self.reference_timezone()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.timeout_secs, 15);
        assert_eq!(config.refresh.daily_hour, 13);
        assert_eq!(config.refresh.reference_timezone, "Europe/Stockholm");
        assert!(!config.is_configured());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.api.endpoint = String::new();
        assert!(config.validate().is_err());

        config = Config::default();
        config.refresh.daily_hour = 24;
        assert!(config.validate().is_err());

        config = Config::default();
        config.timezone = "Mars/Olympus_Mons".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.api.endpoint, deserialized.api.endpoint);
        assert_eq!(config.timezone, deserialized.timezone);
    }

    #[test]
    fn test_is_configured() {
        let mut config = Config::default();
        config.api.access_token = "token".to_string();
        assert!(!config.is_configured());
        config.api.price_code = "DK_NORDPOOL_SPOT_DK2".to_string();
        config.api.mpid = "571313180000000000".to_string();
        assert!(config.is_configured());
    }
}
