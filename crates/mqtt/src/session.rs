//! The bus session: connect once, publish many, disconnect on shutdown.
//!
//! [`BusSession::connect`] builds the rumqttc client, spawns the driver
//! task, and only returns once the broker has acknowledged the connection —
//! so a misconfigured or unreachable broker is a fatal startup error rather
//! than a silent retry loop.
//!
//! The driver task is the session's heart. It pumps the rumqttc event loop,
//! which both delivers our queued publishes to the socket and services the
//! keep-alive. Connection errors are logged there (the asynchronous error
//! surface of the session), broadcast through the [`ConnectionState`] watch
//! channel, and retried with [`Backoff`]. Publish calls therefore never
//! block on reconnection; a publish issued while the link is down fails or
//! queues according to the client's channel capacity.

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use validator::Validate;

use crate::{backoff::Backoff, config::MqttConfig, error::TransferError, state::ConnectionState};

/// A live connection to the broker.
///
/// Cheap to share behind an `Arc`; the underlying `AsyncClient` is
/// thread-safe. The session owns the driver task through a cancellation
/// token: dropping the session does not stop the driver, [`disconnect`]
/// does.
///
/// [`disconnect`]: BusSession::disconnect
#[derive(Debug)]
pub struct BusSession {
    client: AsyncClient,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl BusSession {
    /// Connects to the broker described by `config`.
    ///
    /// Spawns the driver task and waits up to `config.connect_timeout`
    /// seconds for the CONNACK. On timeout or validation failure the driver
    /// is torn down and an error is returned; there is no background retry
    /// before the first successful handshake.
    pub async fn connect(
        config: &MqttConfig,
        cancel: CancellationToken,
    ) -> Result<Self, TransferError> {
        config.validate()?;

        let mut opts = MqttOptions::new(
            config.client_id.clone(),
            config.host.clone(),
            config.port,
        );
        opts.set_keep_alive(Duration::from_secs(config.keep_alive));
        opts.set_clean_session(config.clean_session);

        let (client, event_loop) = AsyncClient::new(opts, config.channel_capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        tokio::spawn(drive(event_loop, state_tx, cancel.clone()));

        let session = Self {
            client,
            state_rx,
            cancel,
        };

        let timeout = Duration::from_secs(config.connect_timeout);
        match tokio::time::timeout(timeout, session.await_connected()).await {
            Ok(()) => {
                info!("connected to broker {}:{}", config.host, config.port);
                Ok(session)
            }
            Err(_) => {
                session.cancel.cancel();
                Err(TransferError::Connect(format!(
                    "no CONNACK from {}:{} within {}s",
                    config.host, config.port, config.connect_timeout
                )))
            }
        }
    }

    /// Waits until the driver reports `Connected`.
    async fn await_connected(&self) {
        let mut rx = self.state_rx.clone();
        while !rx.borrow().is_connected() {
            if rx.changed().await.is_err() {
                // Driver gone; the connect timeout will fire.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Publishes a payload to `topic`.
    ///
    /// Retain is never set; the meter stream is live data. The call returns
    /// once the request is queued with the client, not once it is on the
    /// wire — matching fire-and-forget semantics at QoS 0.
    pub async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
    ) -> Result<(), TransferError> {
        self.client.publish(topic, qos, false, payload).await?;
        trace!("queued publish to {topic}");
        Ok(())
    }

    /// Sends DISCONNECT and stops the driver task.
    ///
    /// The DISCONNECT is sent while the driver is still polling so it
    /// actually reaches the wire; the driver is cancelled afterwards.
    pub async fn disconnect(&self) -> Result<(), TransferError> {
        let result = self.client.disconnect().await;
        self.cancel.cancel();
        result?;
        info!("bus session disconnected");
        Ok(())
    }

    /// Watch channel for observing the broker link state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }
}

/// Driver loop: polls the event loop, tracks state, reconnects with backoff.
async fn drive(
    mut event_loop: EventLoop,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
) {
    let mut backoff = Backoff::default();
    debug!("bus driver started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                update_state(&state_tx, ConnectionState::Disconnected("shutdown".into()));
                break;
            }

            polled = event_loop.poll() => match polled {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        backoff.reset();
                        update_state(&state_tx, ConnectionState::Connected);
                    } else {
                        warn!("broker refused connection: {:?}", ack.code);
                        update_state(
                            &state_tx,
                            ConnectionState::Disconnected(format!("{:?}", ack.code)),
                        );
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("disconnected by broker");
                    update_state(
                        &state_tx,
                        ConnectionState::Disconnected("disconnected by broker".into()),
                    );
                }
                Ok(event) => {
                    trace!("bus event: {event:?}");
                }
                Err(e) => {
                    let delay = backoff.next_sleep();
                    error!(
                        "broker link error: {e}; retrying in {:.1}s",
                        delay.as_secs_f64()
                    );
                    update_state(
                        &state_tx,
                        ConnectionState::Reconnecting(delay.as_secs_f64()),
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {
                            update_state(&state_tx, ConnectionState::Connecting);
                        }
                        _ = cancel.cancelled() => {
                            update_state(
                                &state_tx,
                                ConnectionState::Disconnected("shutdown".into()),
                            );
                            break;
                        }
                    }
                }
            }
        }
    }

    debug!("bus driver stopped");
}

/// Broadcasts a state change, skipping no-op transitions.
fn update_state(state_tx: &watch::Sender<ConnectionState>, state: ConnectionState) {
    let changed = *state_tx.borrow() != state;
    if changed {
        debug!("bus state: {state}");
        let _ = state_tx.send(state);
    }
}
