//! Centralized logging configuration and initialization manager.
//!
//! The `LoggerManager` validates logging configuration and initializes the
//! global `tracing` subscriber with the configured console layer. It must
//! run once at startup, before any tracing macros are used.

use std::io;

use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};
use validator::{Validate, ValidationErrors};

use crate::config::logger::{ConsoleConfig, LogFormat, LoggerConfig};

/// Errors that can occur during logger configuration or initialization.
#[derive(Error, Debug)]
pub enum LoggerError {
    /// Validation errors from the logger configuration struct.
    #[error("Logger configuration validation error: {0}")]
    Validation(#[from] ValidationErrors),

    /// Failure to parse an environment-based filter directive.
    #[error("Environment filter error: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::FromEnvError),

    /// No output layers were configured.
    #[error("No logging layers were configured or successfully initialized")]
    NoLayersConfigured,
}

/// Manages logging configuration and global subscriber initialization.
pub struct LoggerManager {
    config: LoggerConfig,
}

impl LoggerManager {
    /// Creates a new `LoggerManager` and validates the provided
    /// configuration.
    pub fn new(config: LoggerConfig) -> Result<Self, LoggerError> {
        config.validate()?;
        Ok(LoggerManager { config })
    }

    /// Initializes the global `tracing` subscriber with configured layers.
    ///
    /// `RUST_LOG` takes precedence over the configured level so operators
    /// can raise verbosity without touching the config file.
    pub fn init(&mut self) -> Result<(), LoggerError> {
        let mut layers = Vec::new();

        if self.config.console.enabled {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&self.config.level));
            layers.push(Self::console_layer(&self.config.console, filter));
        }

        if layers.is_empty() {
            return Err(LoggerError::NoLayersConfigured);
        }

        tracing_subscriber::registry().with(layers).init();
        Ok(())
    }

    /// Constructs a console output layer according to the configuration.
    fn console_layer(
        config: &ConsoleConfig,
        filter: EnvFilter,
    ) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync> {
        let writer = io::stdout;
        match config.format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(config.ansi_colors)
                .with_writer(writer)
                .with_filter(filter)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(config.ansi_colors)
                .with_writer(writer)
                .with_filter(filter)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(config.ansi_colors)
                .with_writer(writer)
                .with_filter(filter)
                .boxed(),
        }
    }
}
