//! Liveness probing for one open connection.
//!
//! The monitor owns two independent tickers: one sends probes every
//! `interval`, the other checks every `check_interval` whether the
//! connection has been silent for at least `stale_multiple × interval`.
//! It only *reports* staleness; closing the connection is up to the
//! supervisor that owns it.
//!
//! # Probe Format
//!
//! Probes carry `{"type":"ping","timestamp":N}` where `N` is milliseconds
//! since the monitor started. Replies are recognized either as transport
//! pongs echoing that payload or as text frames `{"type":"pong",
//! "timestamp":N}`; both yield a round-trip latency.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::infrastructure::config::HeartbeatConfig;

/// What the monitor wants the supervisor to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatSignal {
    /// Send a probe with this payload.
    Probe(Vec<u8>),
    /// No inbound activity for `silent_for`; reported once per episode.
    Stale { silent_for: Duration },
}

#[derive(Debug, Serialize, Deserialize)]
struct ProbeFrame {
    #[serde(rename = "type")]
    kind: String,
    timestamp: u64,
}

pub struct HeartbeatMonitor {
    probe: Interval,
    check: Interval,
    stale_after: Duration,
    epoch: Instant,
    last_activity: Instant,
    stale_reported: bool,
}

impl HeartbeatMonitor {
    /// Start monitoring a connection that just opened.
    ///
    /// The first probe and the first check fire one full period from now.
    #[must_use]
    pub fn new(config: &HeartbeatConfig) -> Self {
        let now = Instant::now();
        Self {
            probe: ticker(now, config.interval()),
            check: ticker(now, config.check_interval()),
            stale_after: config.stale_after(),
            epoch: now,
            last_activity: now,
            stale_reported: false,
        }
    }

    /// Wait for the next probe or stale signal.
    ///
    /// Cancel safe. A probe due at the same instant as a check goes first.
    pub async fn next_signal(&mut self) -> HeartbeatSignal {
        loop {
            tokio::select! {
                biased;

                _ = self.probe.tick() => {
                    return HeartbeatSignal::Probe(self.probe_payload(Instant::now()));
                }
                _ = self.check.tick() => {
                    if let Some(silent_for) = self.check(Instant::now()) {
                        return HeartbeatSignal::Stale { silent_for };
                    }
                }
            }
        }
    }

    /// Note inbound activity; ends any staleness episode.
    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
        self.stale_reported = false;
    }

    /// Silence duration if the connection just became stale at `now`.
    ///
    /// Returns `Some` at most once until [`record_activity`] is called.
    ///
    /// [`record_activity`]: Self::record_activity
    pub fn check(&mut self, now: Instant) -> Option<Duration> {
        let silent_for = now.saturating_duration_since(self.last_activity);
        if silent_for >= self.stale_after && !self.stale_reported {
            self.stale_reported = true;
            return Some(silent_for);
        }
        None
    }

    fn probe_payload(&self, now: Instant) -> Vec<u8> {
        let frame = ProbeFrame {
            kind: "ping".into(),
            timestamp: self.millis_at(now),
        };
        serde_json::to_vec(&frame).unwrap_or_default()
    }

    /// Round-trip latency for a probe reply payload, if it is one of ours.
    #[must_use]
    pub fn observe_reply(&self, payload: &[u8]) -> Option<Duration> {
        let frame: ProbeFrame = serde_json::from_slice(payload).ok()?;
        self.latency_since(frame.timestamp)
    }

    /// Round-trip latency if `text` is a `{"type":"pong"}` reply frame.
    #[must_use]
    pub fn observe_text_reply(&self, text: &str) -> Option<Duration> {
        let frame = parse_text_reply(text)?;
        self.latency_since(frame.timestamp)
    }

    fn latency_since(&self, sent_ms: u64) -> Option<Duration> {
        let now_ms = self.millis_at(Instant::now());
        now_ms.checked_sub(sent_ms).map(Duration::from_millis)
    }

    fn millis_at(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_millis() as u64
    }
}

/// True if `text` is a probe reply frame rather than application data.
#[must_use]
pub fn is_probe_reply(text: &str) -> bool {
    parse_text_reply(text).is_some()
}

fn parse_text_reply(text: &str) -> Option<ProbeFrame> {
    // Cheap reject before parsing every application frame.
    if !text.contains("pong") {
        return None;
    }
    serde_json::from_str::<ProbeFrame>(text)
        .ok()
        .filter(|frame| frame.kind == "pong")
}

fn ticker(now: Instant, period: Duration) -> Interval {
    let mut interval = interval_at(now + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
