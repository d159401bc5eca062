//! wattline — serial power-meter telemetry bridge to MQTT
//!
//! This crate provides a long-running agent that reads newline-delimited XML
//! telemetry from a serial energy meter (CurrentCost CC128 family), decodes
//! it tolerantly, throttles it to one reading per window, and publishes the
//! result via MQTT. It is designed for unattended operation: device
//! disappearance, malformed lines and broker outages are all survived and
//! retried, with graceful shutdown on the usual termination signals.
//!
//! ## Modules
//!
//! * `config` — Configuration structures, loading, validation, and defaults.
//!   Supports TOML configuration files with validation via the `validator`
//!   crate.
//!
//! * `core` — Core runtime components:
//!   - XML line decoder and the decoded reading type
//!   - Publish-rate gate
//!   - Device session (read loop) and its restart supervisor
//!
//! * `transport` — Line-oriented serial transport behind a mockable trait.
//!
//! * `logger` — Centralized logging initialization using `tracing`.
//!   Supports console output in multiple formats (compact, pretty, JSON).
//!
//! * `signals` — Shutdown signal handling.

pub mod config;
pub mod core;
pub mod logger;
pub mod signals;
pub mod transport;
