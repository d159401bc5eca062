//! Publish throttle: decides whether a decoded reading goes out.
//!
//! The gate is a pure rate limiter, not a queue. Readings arriving inside
//! the window are dropped; only the latest qualifying reading at the moment
//! the window reopens is sent. A reading qualifies only when channel-1
//! watts are present — temperature never opens the window on its own, it
//! rides along when the window opens.
//!
//! The gate's state lives for the whole process. It is not reset when the
//! device session restarts, so the window stays continuous across
//! reconnects.

use std::time::{Duration, Instant};

use crate::config::meter::MeterConfig;

use super::reading::Reading;

/// One (topic, payload) pair to emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: String,
    pub payload: String,
}

/// What and where to publish, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct PublishPolicy {
    /// Minimum time between publishes.
    pub interval: Duration,
    /// Topic for channel-1 watts.
    pub power_topic: String,
    /// Topic for Celsius temperature.
    pub temperature_topic: String,
    /// Emit an empty temperature payload when the qualifying reading has no
    /// temperature (historical behavior); otherwise skip that publish.
    pub publish_empty_temperature: bool,
}

impl From<&MeterConfig> for PublishPolicy {
    fn from(cfg: &MeterConfig) -> Self {
        Self {
            interval: Duration::from_secs(cfg.publish_interval),
            power_topic: cfg.power_topic.clone(),
            temperature_topic: cfg.temperature_topic.clone(),
            publish_empty_temperature: cfg.publish_empty_temperature,
        }
    }
}

/// Per-process throttle state.
#[derive(Debug, Default)]
pub struct PublishGate {
    /// `None` until the first publish, so the first qualifying reading
    /// after process start goes out immediately.
    last_published_at: Option<Instant>,
}

impl PublishGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether `reading` should be published at `now`.
    ///
    /// Returns the (topic, payload) pairs to emit, or `None` when the
    /// reading is not due (channel-1 absent, or the window has not elapsed).
    /// On a positive decision the gate advances to `now` *before* the caller
    /// performs the publishes, so a downstream failure cannot cause a retry
    /// storm on the next line.
    pub fn decide(
        &mut self,
        policy: &PublishPolicy,
        reading: &Reading,
        now: Instant,
    ) -> Option<Vec<Outbound>> {
        let watts = reading.channel1_watts.as_ref()?;

        if let Some(last) = self.last_published_at {
            if now.duration_since(last) <= policy.interval {
                return None;
            }
        }
        self.last_published_at = Some(now);

        let mut out = vec![Outbound {
            topic: policy.power_topic.clone(),
            payload: watts.clone(),
        }];

        match &reading.temperature_c {
            Some(t) => out.push(Outbound {
                topic: policy.temperature_topic.clone(),
                payload: t.clone(),
            }),
            None if policy.publish_empty_temperature => out.push(Outbound {
                topic: policy.temperature_topic.clone(),
                payload: String::new(),
            }),
            None => {}
        }

        Some(out)
    }

    /// When the last publish decision was made, if any.
    pub fn last_published_at(&self) -> Option<Instant> {
        self.last_published_at
    }
}
