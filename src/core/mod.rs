//! Core runtime: the decode/throttle/publish pipeline and its supervision.

/// XML line decoding into [`reading::Reading`] values.
pub mod decoder;

/// The decoded telemetry record.
pub mod reading;

/// One open-to-close lifetime of the meter transport.
pub mod session;

/// Restart loop around device sessions.
pub mod supervisor;

/// Publish-rate gating.
pub mod throttle;
