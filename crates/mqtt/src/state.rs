//! Connection state tracking for the bus session.
//!
//! The driver task publishes state transitions through a watch channel so
//! application code can observe the broker link without polling. The agent
//! itself only logs these; the channel exists so diagnostics stay decoupled
//! from the publish path.

use std::fmt;

/// Current state of the broker link.
///
/// Lifecycle: `Connecting` → `Connected` on CONNACK; any connection error
/// moves to `Reconnecting(delay)` and back to `Connecting` once the delay
/// elapses; `Disconnected` is terminal for a given session (broker-initiated
/// close or shutdown).
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// CONNECT sent, waiting for CONNACK.
    Connecting,

    /// Handshake complete; publishes will be delivered.
    Connected,

    /// Link lost or closed. The payload carries the reason.
    Disconnected(String),

    /// Waiting before the next connection attempt. The payload is the
    /// delay in seconds, for operator-facing countdowns.
    Reconnecting(f64),
}

impl ConnectionState {
    /// Short stable identifier for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected(_) => "disconnected",
            ConnectionState::Reconnecting(_) => "reconnecting",
        }
    }

    /// True only when publishes can succeed.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected(reason) => {
                write!(f, "{} ({reason})", self.as_str())
            }
            ConnectionState::Reconnecting(secs) => {
                write!(f, "{} (in {secs:.1}s)", self.as_str())
            }
            _ => write!(f, "{}", self.as_str()),
        }
    }
}
