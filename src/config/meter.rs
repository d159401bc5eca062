//! Meter acquisition and publishing configuration.
//!
//! Everything the device pipeline needs: where the meter is attached, how
//! fast it talks, how often readings may be republished, and which topics
//! carry them. Device path and baud rate are deployment constants; the
//! defaults match the CurrentCost-style meter the agent was built for.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Serial meter and publish-throttle configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MeterConfig {
    /// Serial device path.
    #[validate(length(min = 1))]
    pub device: String,

    /// Baud rate of the meter's serial output.
    #[validate(range(min = 50))]
    pub baud: u32,

    /// Minimum interval between publishes, in seconds. Readings arriving
    /// inside the window are dropped, not queued.
    #[validate(range(min = 1))]
    pub publish_interval: u64,

    /// Delay before reopening the device after a session ends, in seconds.
    /// Retries are unbounded; a meter that is offline for a week reconnects
    /// whenever it returns.
    #[validate(range(min = 1))]
    pub retry_delay: u64,

    /// Topic for the channel-1 power reading.
    #[validate(length(min = 1))]
    pub power_topic: String,

    /// Topic for the Celsius temperature reading.
    #[validate(length(min = 1))]
    pub temperature_topic: String,

    /// Whether to publish an empty temperature payload when a qualifying
    /// reading carries no temperature. `true` reproduces the historical
    /// behavior; `false` guards the temperature publish behind its own
    /// presence check.
    pub publish_empty_temperature: bool,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud: 57_600,
            publish_interval: 60,
            retry_delay: 1,
            power_topic: "home/power/global".to_string(),
            temperature_topic: "home/temperature/placard".to_string(),
            publish_empty_temperature: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_meter_config_validates() {
        assert!(MeterConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_device_path_is_rejected() {
        let cfg = MeterConfig {
            device: String::new(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_publish_interval_is_rejected() {
        let cfg = MeterConfig {
            publish_interval: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
