//! Round-trip time and clock-offset estimation from the `ping`/`pong`
//! pair.
//!
//! Grounded on the teacher's `net::tracking::AckTracker`, which smooths
//! RTT samples with the same exponentially-weighted moving average RFC
//! 6298 uses for TCP's retransmission timer (`ALPHA = 0.125`).

const ALPHA: f64 = 0.125;

#[derive(Debug, Clone)]
pub struct TimeSync {
    smoothed_rtt_ms: Option<f64>,
    /// Our best estimate of `server_time - local_time`, so
    /// `local_time + offset` approximates the server's clock.
    server_offset_ms: Option<i64>,
}

impl Default for TimeSync {
    fn default() -> Self {
        Self { smoothed_rtt_ms: None, server_offset_ms: None }
    }
}

impl TimeSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one `pong` response. `client_time_ms` and `server_time_ms`
    /// are the fields the `pong` message echoes back; `now_ms` is the
    /// local time the `pong` was received.
    pub fn record_pong(&mut self, client_time_ms: u64, server_time_ms: u64, now_ms: u64) {
        let rtt = now_ms.saturating_sub(client_time_ms) as f64;
        self.smoothed_rtt_ms = Some(match self.smoothed_rtt_ms {
            Some(previous) => previous + ALPHA * (rtt - previous),
            None => rtt,
        });

        // The server's clock, at the moment it sent the pong, was
        // roughly `server_time_ms`; by the time we measure it the one-way
        // trip has already happened, so back that out by half the RTT.
        let estimated_server_now = server_time_ms as f64 + rtt / 2.0;
        let offset = estimated_server_now - now_ms as f64;
        self.server_offset_ms = Some(match self.server_offset_ms {
            Some(previous) => (previous as f64 + ALPHA * (offset - previous as f64)) as i64,
            None => offset as i64,
        });
    }

    pub fn smoothed_rtt_ms(&self) -> Option<f64> {
        self.smoothed_rtt_ms
    }

    pub fn estimate_server_time(&self, local_now_ms: u64) -> u64 {
        match self.server_offset_ms {
            Some(offset) => (local_now_ms as i64 + offset).max(0) as u64,
            None => local_now_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pong_sets_rtt_directly() {
        let mut sync = TimeSync::new();
        sync.record_pong(1_000, 1_000, 1_040);
        assert_eq!(sync.smoothed_rtt_ms(), Some(40.0));
    }

    #[test]
    fn subsequent_pongs_smooth_toward_the_new_sample() {
        let mut sync = TimeSync::new();
        sync.record_pong(1_000, 1_000, 1_040);
        sync.record_pong(2_000, 2_000, 2_100);
        let rtt = sync.smoothed_rtt_ms().unwrap();
        assert!(rtt > 40.0 && rtt < 100.0);
    }

    #[test]
    fn estimate_server_time_without_samples_falls_back_to_local_time() {
        let sync = TimeSync::new();
        assert_eq!(sync.estimate_server_time(5_000), 5_000);
    }
}
