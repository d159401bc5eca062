//! The device session: one open-to-close lifetime of the meter transport.
//!
//! A session owns its [`LineSource`] exclusively and runs the read loop:
//! line → decode → gate decision → publishes. Lines are processed strictly
//! in arrival order, one at a time; the gate is borrowed from the
//! supervisor so its state outlives the session.
//!
//! A session ends — returning control to the supervisor, never killing the
//! process — when the transport reports end-of-stream or an error, when a
//! publish fails, or when cancellation is requested. The transport handle
//! is released on every exit path because the session owns it by value.

use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::{LineSource, TransportError};

use super::{
    decoder::decode_line,
    throttle::{PublishGate, PublishPolicy},
};

/// Why a session ended with an error. Both variants are recoverable at the
/// supervisor level.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The transport failed mid-read.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A publish call failed; the bus link is assumed unhealthy.
    #[error("publish failed: {0}")]
    Publish(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Outbound side of the pipeline. Implemented by the MQTT bus session; tests
/// substitute recording mocks.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes one payload, fire-and-forget.
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// One open-to-close run of the meter transport.
pub struct MeterSession<S> {
    source: S,
}

impl<S: LineSource> MeterSession<S> {
    /// Wraps an already-open transport. Opening is the caller's job so an
    /// open failure is distinguishable from a mid-stream one.
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Runs the read loop until the transport ends, a publish fails, or
    /// `cancel` fires.
    ///
    /// Returns `Ok(())` on clean end of stream or cancellation; the
    /// supervisor treats every return the same way (backoff, then a fresh
    /// session) unless cancellation was requested.
    pub async fn run(
        mut self,
        policy: &PublishPolicy,
        gate: &mut PublishGate,
        publisher: &dyn Publisher,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("meter session cancelled");
                    return Ok(());
                }
                line = self.source.next_line() => line?,
            };

            let Some(line) = line else {
                info!("meter stream ended");
                return Ok(());
            };
            if line.is_empty() {
                continue;
            }

            // A bad line is the meter's problem, not the session's.
            let reading = match decode_line(&line) {
                Ok(reading) => reading,
                Err(e) => {
                    warn!("skipping undecodable line: {e}");
                    continue;
                }
            };
            if reading.is_empty() {
                debug!("record carried no telemetry fields");
                continue;
            }

            let Some(outbound) = gate.decide(policy, &reading, Instant::now()) else {
                continue;
            };

            info!(
                "publishing {} W {} °C",
                reading.channel1_watts.as_deref().unwrap_or_default(),
                reading.temperature_c.as_deref().unwrap_or("-"),
            );
            for out in outbound {
                publisher
                    .publish(&out.topic, out.payload.as_bytes())
                    .await
                    .map_err(SessionError::Publish)?;
            }
        }
    }
}

#[async_trait]
impl Publisher for wattline_mqtt::BusSession {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // QoS 0: a dropped reading is replaced within a window anyway.
        wattline_mqtt::BusSession::publish(self, topic, payload, wattline_mqtt::QoS::AtMostOnce)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::transport::testing::{PendingSource, ScriptedSource};

    /// Records publishes; optionally fails every call.
    #[derive(Default)]
    pub(crate) struct MockPublisher {
        pub published: Mutex<Vec<(String, String)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Publisher for MockPublisher {
        async fn publish(
            &self,
            topic: &str,
            payload: &[u8],
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if self.fail {
                return Err("broker gone".into());
            }
            self.published.lock().unwrap().push((
                topic.to_string(),
                String::from_utf8_lossy(payload).into_owned(),
            ));
            Ok(())
        }
    }

    fn policy() -> PublishPolicy {
        PublishPolicy {
            interval: Duration::from_secs(60),
            power_topic: "home/power/global".into(),
            temperature_topic: "home/temperature/placard".into(),
            publish_empty_temperature: true,
        }
    }

    #[tokio::test]
    async fn first_qualifying_line_publishes_both_topics() {
        let source = ScriptedSource::new([
            "<msg><tmpr>21.5</tmpr><ch1><watts>1200</watts></ch1></msg>",
        ]);
        let publisher = MockPublisher::default();
        let mut gate = PublishGate::new();

        MeterSession::new(source)
            .run(&policy(), &mut gate, &publisher, &CancellationToken::new())
            .await
            .unwrap();

        let published = publisher.published.lock().unwrap();
        assert_eq!(
            *published,
            vec![
                ("home/power/global".to_string(), "1200".to_string()),
                ("home/temperature/placard".to_string(), "21.5".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_line_is_skipped_then_next_line_publishes() {
        let source = ScriptedSource::new([
            "<msg><tmpr>21.5</tmpr><ch1><wat".as_bytes().to_vec(),
            b"not xml at all".to_vec(),
            b"<msg><tmpr>22.0</tmpr><ch1><watts>0800</watts></ch1></msg>".to_vec(),
        ]);
        let publisher = MockPublisher::default();
        let mut gate = PublishGate::new();

        MeterSession::new(source)
            .run(&policy(), &mut gate, &publisher, &CancellationToken::new())
            .await
            .unwrap();

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0], ("home/power/global".into(), "0800".into()));
    }

    #[tokio::test]
    async fn non_qualifying_lines_publish_nothing() {
        let source = ScriptedSource::new([
            "<msg><tmpr>21.5</tmpr></msg>",
            "<msg><ch2><watts>950</watts></ch2></msg>",
        ]);
        let publisher = MockPublisher::default();
        let mut gate = PublishGate::new();

        MeterSession::new(source)
            .run(&policy(), &mut gate, &publisher, &CancellationToken::new())
            .await
            .unwrap();

        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_error_ends_session_with_error() {
        let source = ScriptedSource::failing_after([
            "<msg><ch1><watts>0100</watts></ch1></msg>",
        ]);
        let publisher = MockPublisher::default();
        let mut gate = PublishGate::new();

        let result = MeterSession::new(source)
            .run(&policy(), &mut gate, &publisher, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(SessionError::Transport(_))));
        // The line before the failure was still processed in order.
        assert_eq!(publisher.published.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn publish_failure_ends_session_with_error() {
        let source = ScriptedSource::new([
            "<msg><ch1><watts>0100</watts></ch1></msg>",
            "<msg><ch1><watts>0200</watts></ch1></msg>",
        ]);
        let publisher = MockPublisher {
            fail: true,
            ..Default::default()
        };
        let mut gate = PublishGate::new();

        let result = MeterSession::new(source)
            .run(&policy(), &mut gate, &publisher, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(SessionError::Publish(_))));
        // Gate advanced before the failed attempt: no retry storm.
        assert!(gate.last_published_at().is_some());
    }

    #[tokio::test]
    async fn cancellation_ends_a_blocked_session() {
        let cancel = CancellationToken::new();
        let publisher = MockPublisher::default();
        let mut gate = PublishGate::new();

        let child = cancel.clone();
        let session = MeterSession::new(PendingSource);
        let handle = tokio::spawn(async move {
            let p = policy();
            session.run(&p, &mut gate, &publisher, &child).await
        });

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("session did not observe cancellation")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn gate_state_spans_sessions() {
        // Two sessions share one gate: a qualifying line in the second
        // session inside the window publishes nothing.
        let publisher = MockPublisher::default();
        let mut gate = PublishGate::new();
        let p = policy();

        MeterSession::new(ScriptedSource::new([
            "<msg><ch1><watts>0100</watts></ch1></msg>",
        ]))
        .run(&p, &mut gate, &publisher, &CancellationToken::new())
        .await
        .unwrap();

        MeterSession::new(ScriptedSource::new([
            "<msg><ch1><watts>0200</watts></ch1></msg>",
        ]))
        .run(&p, &mut gate, &publisher, &CancellationToken::new())
        .await
        .unwrap();

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 2); // power + empty temperature, once
        assert_eq!(published[0].1, "0100");
    }
}
