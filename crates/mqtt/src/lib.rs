//! # wattline-mqtt: the bus session used by the wattline agent.
//!
//! A thin, reliability-focused wrapper around `rumqttc` that exposes exactly
//! the contract the agent core needs: connect once at startup, publish many
//! times, disconnect on shutdown. Connection upkeep (keep-alive, reconnects
//! with backoff, state tracking) happens on a background driver task so the
//! publishing side never has to think about it.
//!
//! # Architecture
//!
//! ```text
//! wattline core (publish calls)
//!        ↓
//! BusSession (connect / publish / disconnect)
//!        ↓                         ↘
//! rumqttc AsyncClient        driver task (polls EventLoop,
//!        ↓                   tracks ConnectionState, logs errors,
//! Network (TCP)              reconnects with Backoff)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tokio_util::sync::CancellationToken;
//! use wattline_mqtt::{BusSession, MqttConfig, QoS};
//!
//! let cancel = CancellationToken::new();
//! let session = BusSession::connect(&MqttConfig::default(), cancel.child_token()).await?;
//! session.publish("home/power/global", b"1200", QoS::AtMostOnce).await?;
//! session.disconnect().await?;
//! ```
//!
//! # Error model
//!
//! All fallible operations return [`TransferError`]. A failed `connect` is
//! fatal to the caller (the agent refuses to start without a broker link);
//! a failed `publish` is reported to the caller, which treats it as
//! session-ending; connection-level errors observed by the driver task are
//! logged and retried with backoff, and surfaced to observers through the
//! [`ConnectionState`] watch channel.

pub mod backoff;
pub mod config;
pub mod error;
pub mod session;
pub mod state;

pub use backoff::Backoff;
pub use config::MqttConfig;
pub use error::TransferError;
pub use session::BusSession;
pub use state::ConnectionState;

// Re-exported so callers pick a QoS without depending on rumqttc directly.
pub use rumqttc::QoS;
