//! Error type for bus session operations.
//!
//! A single enum covers the three failure classes the agent distinguishes:
//! startup failures (`Config`, `Connect`), per-publish failures
//! (`ClientTransfer`, `Payload`), and connection-level failures observed by
//! the driver (`ClientConnection`). The caller maps these onto its own
//! policy — the agent aborts startup on the first class, ends the meter
//! session on the second, and lets the driver retry the third.

use thiserror::Error;

/// Unified error type for MQTT transfer operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Configuration failed validation before any network activity.
    #[error("invalid mqtt configuration: {0}")]
    Config(#[from] validator::ValidationErrors),

    /// The initial connection could not be established within the
    /// configured timeout. Fatal at startup.
    #[error("broker connection failed: {0}")]
    Connect(String),

    /// The local client could not accept a request (channel closed or
    /// full). Usually means the session is shutting down.
    #[error("client transfer error: {0}")]
    ClientTransfer(#[from] rumqttc::ClientError),

    /// The network link to the broker failed. Boxed: rumqttc's
    /// `ConnectionError` is large and would bloat every `Result`.
    #[error("broker link error: {0}")]
    ClientConnection(#[from] Box<rumqttc::ConnectionError>),

    /// A payload could not be framed into a valid MQTT packet.
    #[error("publish error: {0}")]
    Payload(#[from] rumqttc::mqttbytes::Error),
}

impl From<rumqttc::ConnectionError> for TransferError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        TransferError::ClientConnection(Box::new(err))
    }
}
