use std::{process, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wattline::{
    config::Config,
    core::{session::Publisher, supervisor::Supervisor, throttle::PublishPolicy},
    logger::LoggerManager,
    print_error, signals,
    transport::SerialLineSource,
};
use wattline_mqtt::BusSession;

/// How long shutdown waits for the supervisor before giving up on it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::new().unwrap_or_else(|e| {
        print_error!("{}", e);
        process::exit(1);
    });

    let mut logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });

    info!("Starting wattline version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", cfg.logger.level);
    debug!("{:#?}", cfg.meter);

    let cancel = CancellationToken::new();

    info!(
        "Connecting to MQTT broker at {}:{}...",
        cfg.mqtt.host, cfg.mqtt.port
    );
    // The bus gets its own token: the driver must outlive supervisor
    // shutdown so the final DISCONNECT still goes out.
    let bus = match BusSession::connect(&cfg.mqtt, CancellationToken::new()).await {
        Ok(bus) => Arc::new(bus),
        Err(e) => {
            error!("Failed to connect to MQTT broker: {}", e);
            return Err(e.into());
        }
    };
    info!("MQTT session established");

    let device = cfg.meter.device.clone();
    let baud = cfg.meter.baud;
    let supervisor = Supervisor::new(
        move || SerialLineSource::open(&device, baud),
        PublishPolicy::from(&cfg.meter),
        Duration::from_secs(cfg.meter.retry_delay),
    );

    info!("Reading meter telemetry from {}", cfg.meter.device);
    let supervisor_handle = tokio::spawn(supervisor.run(
        bus.clone() as Arc<dyn Publisher>,
        cancel.child_token(),
    ));

    signals::wait_for_shutdown_signal().await?;
    info!("Shutdown signal received — stopping...");

    cancel.cancel();
    if tokio::time::timeout(SHUTDOWN_GRACE, supervisor_handle)
        .await
        .is_err()
    {
        warn!("Supervisor did not stop within the grace period");
    }

    bus.disconnect().await?;
    info!("Shutdown complete");
    Ok(())
}
