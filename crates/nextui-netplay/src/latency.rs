//! Round-trip latency tracking.
//!
//! A ping carries the sender's monotonic clock in milliseconds; the peer
//! echoes it back untouched in a pong, so the sender can compute the round
//! trip without synchronized clocks. One-way latency is approximated as
//! RTT / 2.

use std::time::Instant;

use nextui_netproto::messages::{Message, sync::Ping};

#[derive(Debug)]
pub struct LatencyTracker {
    epoch: Instant,
    latency_ms: u32,
    last_ping_sent_ms: Option<u32>,
    last_pong_ms: Option<u32>,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            latency_ms: 0,
            last_ping_sent_ms: None,
            last_pong_ms: None,
        }
    }

    /// Milliseconds since this tracker was created. Wraps after ~49 days.
    pub fn now_ms(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    /// Build the payload for an outgoing ping and remember when it was sent.
    pub fn stamp_ping(&mut self) -> Ping {
        let t_ms = self.now_ms();
        self.last_ping_sent_ms = Some(t_ms);
        Ping { t_ms }
    }

    /// Record a pong received at `now_ms`.
    ///
    /// Returns the new latency, or `None` if the payload is not a 4-byte
    /// timestamp. There is a single latency slot: on a host with several
    /// clients, the last pong wins.
    pub fn record_pong(&mut self, payload: &[u8], now_ms: u32) -> Option<u32> {
        let ping = Ping::from_bytes(payload).ok()?;
        self.latency_ms = one_way_latency_ms(ping.t_ms, now_ms);
        self.last_pong_ms = Some(now_ms);
        Some(self.latency_ms)
    }

    pub fn latency_ms(&self) -> u32 {
        self.latency_ms
    }

    pub fn last_ping_sent_ms(&self) -> Option<u32> {
        self.last_ping_sent_ms
    }

    /// When the last valid pong arrived, on this tracker's clock.
    pub fn last_pong_ms(&self) -> Option<u32> {
        self.last_pong_ms
    }
}

/// Half of the round trip between `sent_ms` and `now_ms`, tolerant of clock
/// wrap-around.
pub fn one_way_latency_ms(sent_ms: u32, now_ms: u32) -> u32 {
    now_ms.wrapping_sub(sent_ms) / 2
}
