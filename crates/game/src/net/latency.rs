use std::time::{Duration, Instant};

/// Coarse round-trip timer. One ping is assumed in flight; a newer ping
/// overwrites the start time of an unanswered one, and pongs carry no
/// correlation id, so a late or duplicated pong yields a skewed reading.
#[derive(Debug)]
pub struct LatencyProbe {
    interval: Duration,
    next_ping: Option<Instant>,
    ping_start: Option<Instant>,
}

impl LatencyProbe {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_ping: None,
            ping_start: None,
        }
    }

    /// Arms the interval. The first ping goes out one interval after `now`.
    pub fn start(&mut self, now: Instant) {
        self.next_ping = Some(now + self.interval);
    }

    /// Clears the interval. Returns whether it was running.
    pub fn stop(&mut self) -> bool {
        self.ping_start = None;
        self.next_ping.take().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.next_ping.is_some()
    }

    /// True when a ping should be sent at `now`; records it as sent.
    pub fn poll_ping(&mut self, now: Instant) -> bool {
        match self.next_ping {
            Some(due) if now >= due => {
                self.ping_start = Some(now);
                let mut next = due + self.interval;
                if next <= now {
                    next = now + self.interval;
                }
                self.next_ping = Some(next);
                true
            }
            _ => false,
        }
    }

    /// Round trip in whole milliseconds, or `None` if no ping was ever sent.
    pub fn on_pong(&self, now: Instant) -> Option<u64> {
        let start = self.ping_start?;
        Some(now.saturating_duration_since(start).as_millis() as u64)
    }
}
