//! Application configuration loading, validation, and management.
//!
//! The top-level `Config` aggregates logging, meter, and broker settings.
//! It is loaded once at startup from a TOML file, validated, and kept
//! immutable thereafter. A missing file is not an error for this agent —
//! the defaults describe the standard deployment — but a file that exists
//! and fails to parse or validate is fatal.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use wattline_mqtt::MqttConfig;

pub mod logger;
pub mod meter;

use logger::LoggerConfig;
use meter::MeterConfig;

/// Simple macros for printing timestamped messages before the tracing
/// subscriber is initialized. Used during early configuration loading.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

/// Errors that can occur during configuration loading, parsing, or
/// validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error while accessing configuration files.
    #[error("IO error while reading configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failure to parse the TOML configuration file.
    #[error("Parse error while reading configuration: {0}")]
    Parse(String),

    /// Validation failure after successful parsing.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Logging subsystem configuration.
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Serial meter and throttle configuration.
    #[validate(nested)]
    pub meter: MeterConfig,

    /// MQTT broker configuration.
    #[validate(nested)]
    pub mqtt: MqttConfig,
}

impl Config {
    /// Constructs the configuration by locating and loading the config
    /// file, falling back to defaults when none exists.
    ///
    /// Path priority:
    /// 1. `WATTLINE_CONFIG` environment variable
    /// 2. `/etc/wattline/config.toml`
    /// 3. built-in defaults
    pub fn new() -> Result<Self, ConfigError> {
        if let Ok(config_path) = std::env::var("WATTLINE_CONFIG") {
            let path = PathBuf::from(config_path);
            print_info!("Using config from WATTLINE_CONFIG: {}", path.display());
            return Self::load(&path);
        }

        let fallback = Path::new("/etc/wattline/config.toml");
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Self::load(fallback);
        }

        print_info!("No configuration file found, using built-in defaults");
        Ok(Config::default())
    }

    /// Loads and validates configuration from the specified path.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let config_str = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&config_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }
}
