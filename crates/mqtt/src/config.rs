//! Broker connection settings.
//!
//! Loaded as part of the agent's TOML configuration and validated with the
//! `validator` crate before any network activity. Defaults match a local
//! unauthenticated broker, the usual deployment for a home telemetry bridge.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// MQTT broker connection configuration.
///
/// Validation rules are enforced at load time:
/// - `host`: 1-255 characters
/// - `port`: 1-65535
/// - `client_id`: 1-36 characters (MQTT 3.1.1 spec limit)
/// - `keep_alive`: 5-3600 seconds
/// - `connect_timeout`: 1-300 seconds
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker hostname or IP.
    #[validate(length(min = 1, max = 255))]
    pub host: String,

    /// Broker port, typically 1883.
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Client identifier presented to the broker.
    #[validate(length(min = 1, max = 36))]
    pub client_id: String,

    /// Keep-alive interval in seconds. The broker drops the session if it
    /// hears nothing for 1.5x this long.
    #[validate(range(min = 5, max = 3600))]
    pub keep_alive: u64,

    /// Whether the broker should discard session state between connections.
    pub clean_session: bool,

    /// Capacity of the client's internal request channel. Publishes queue
    /// here before the event loop writes them to the socket.
    #[validate(range(min = 1, max = 1024))]
    pub channel_capacity: usize,

    /// How long `connect` waits for the first CONNACK before reporting a
    /// fatal startup error, in seconds.
    #[validate(range(min = 1, max = 300))]
    pub connect_timeout: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "wattline".to_string(),
            keep_alive: 30,
            clean_session: true,
            channel_capacity: 10,
            connect_timeout: 10,
        }
    }
}
