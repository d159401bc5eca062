//! Restart-with-backoff supervision of device sessions.
//!
//! Two states: a session is RUNNING, or the loop is in BACKOFF waiting a
//! fixed delay before the next attempt. A failed open, a transport error,
//! and a failed publish all land in the same place — wait, then reopen.
//! Retries are unbounded by design: a meter that has been offline for a
//! week is picked up the moment it reappears.
//!
//! Cancellation is honored at every safe point: before an open, inside the
//! session's read loop, and during the backoff sleep. The gate lives here,
//! outside the per-session scope, so the publish window stays continuous
//! across reconnects.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::transport::{LineSource, TransportError};

use super::{
    session::{MeterSession, Publisher},
    throttle::{PublishGate, PublishPolicy},
};

/// Supervises device sessions over a transport produced by `open`.
///
/// Generic over the open function so tests can hand out scripted sources;
/// production wires it to [`SerialLineSource::open`].
///
/// [`SerialLineSource::open`]: crate::transport::SerialLineSource::open
pub struct Supervisor<F> {
    open: F,
    policy: PublishPolicy,
    retry_delay: Duration,
}

impl<F, S> Supervisor<F>
where
    F: FnMut() -> Result<S, TransportError> + Send,
    S: LineSource,
{
    pub fn new(open: F, policy: PublishPolicy, retry_delay: Duration) -> Self {
        Self {
            open,
            policy,
            retry_delay,
        }
    }

    /// Runs sessions until `cancel` fires.
    ///
    /// Never returns an error: every failure is logged and retried. The
    /// caller decides when to stop by cancelling the token.
    pub async fn run(mut self, publisher: Arc<dyn Publisher>, cancel: CancellationToken) {
        let mut gate = PublishGate::new();

        while !cancel.is_cancelled() {
            match (self.open)() {
                Ok(source) => {
                    info!("meter session starting");
                    let session = MeterSession::new(source);
                    match session
                        .run(&self.policy, &mut gate, publisher.as_ref(), &cancel)
                        .await
                    {
                        Ok(()) => info!("meter session ended"),
                        Err(e) => warn!("meter session failed: {e}"),
                    }
                }
                Err(e) => warn!("cannot open meter device: {e}"),
            }

            if cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.retry_delay) => {}
                _ = cancel.cancelled() => break,
            }
        }

        info!("meter supervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use tracing_test::traced_test;

    use super::*;
    use crate::core::session::tests::MockPublisher;
    use crate::transport::testing::ScriptedSource;

    fn policy() -> PublishPolicy {
        PublishPolicy {
            interval: Duration::from_secs(60),
            power_topic: "home/power/global".into(),
            temperature_topic: "home/temperature/placard".into(),
            publish_empty_temperature: true,
        }
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn supervisor_reopens_after_stream_end() {
        let opens = Arc::new(AtomicUsize::new(0));
        let opens_in_factory = opens.clone();
        let publisher = Arc::new(MockPublisher::default());
        let cancel = CancellationToken::new();

        let open = move || {
            opens_in_factory.fetch_add(1, Ordering::SeqCst);
            Ok(ScriptedSource::new(Vec::<Vec<u8>>::new()))
        };
        let supervisor = Supervisor::new(open, policy(), Duration::from_secs(1));

        let handle = tokio::spawn(supervisor.run(publisher.clone(), cancel.clone()));

        // Sessions end instantly on the empty stream; with 1s backoff and
        // paused time, ~5s of virtual time means several reopen cycles.
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(opens.load(Ordering::SeqCst) >= 4);
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn open_failures_are_retried_not_fatal() {
        let opens = Arc::new(AtomicUsize::new(0));
        let opens_in_factory = opens.clone();
        let cancel = CancellationToken::new();

        let open = move || -> Result<ScriptedSource, TransportError> {
            opens_in_factory.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Read(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such device",
            )))
        };
        let supervisor = Supervisor::new(open, policy(), Duration::from_secs(1));

        let handle = tokio::spawn(
            supervisor.run(Arc::new(MockPublisher::default()), cancel.clone()),
        );

        tokio::time::sleep(Duration::from_secs(3)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(opens.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gate_window_is_continuous_across_restarts() {
        // Each session delivers one qualifying line, then ends. All
        // sessions run well inside one 60s window, so only the very first
        // line is published no matter how many restarts happen.
        let publisher = Arc::new(MockPublisher::default());
        let cancel = CancellationToken::new();
        let sessions = Arc::new(Mutex::new(0u32));
        let sessions_in_factory = sessions.clone();

        let open = move || {
            *sessions_in_factory.lock().unwrap() += 1;
            Ok(ScriptedSource::new([
                "<msg><ch1><watts>0500</watts></ch1></msg>",
            ]))
        };
        let supervisor = Supervisor::new(open, policy(), Duration::from_secs(1));

        let handle = tokio::spawn(supervisor.run(publisher.clone(), cancel.clone()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(*sessions.lock().unwrap() >= 3);
        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 2); // one power + one empty temperature
        assert_eq!(published[0].1, "0500");
    }

    #[tokio::test]
    async fn cancelled_supervisor_stops_without_reopening() {
        let opens = Arc::new(AtomicUsize::new(0));
        let opens_in_factory = opens.clone();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let open = move || {
            opens_in_factory.fetch_add(1, Ordering::SeqCst);
            Ok(ScriptedSource::new(Vec::<Vec<u8>>::new()))
        };
        let supervisor = Supervisor::new(open, policy(), Duration::from_secs(1));
        supervisor
            .run(Arc::new(MockPublisher::default()), cancel)
            .await;

        assert_eq!(opens.load(Ordering::SeqCst), 0);
    }
}
