//! Room clock seeded from the server timestamp exchange
//!
//! The server sends `{room_start_timestamp, join_timestamp}` exactly once
//! per connection. From that pair and the local receipt time the clock
//! derives the elapsed room time and remembers the client/server offset so
//! a resume from background suspension can re-derive elapsed time without
//! another round-trip.

/// Convert a server timestamp pair into elapsed room seconds.
///
/// `reference` is the timestamp to measure against the room start; the
/// result is clamped to zero so a skewed clock can never run time backwards.
pub fn reconcile(room_start_timestamp: u64, reference_timestamp: u64) -> f32 {
    let delta_ms = reference_timestamp.saturating_sub(room_start_timestamp);
    delta_ms as f32 / 1000.0
}

/// Shared logical clock, seconds since the room's first player joined.
#[derive(Debug, Clone, Default)]
pub struct RoomClock {
    room_start_timestamp: u64,
    /// Local receipt time minus the server join timestamp, in ms. Reused on
    /// resume to translate a fresh local timestamp into server time.
    clock_offset_ms: i64,
    elapsed: f64,
    seeded: bool,
}

impl RoomClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the join-time timestamp exchange. Returns elapsed seconds.
    pub fn seed(&mut self, room_start: u64, join: u64, client_now: u64) -> f32 {
        self.room_start_timestamp = room_start;
        self.clock_offset_ms = client_now as i64 - join as i64;
        let elapsed = reconcile(room_start, join);
        self.elapsed = elapsed as f64;
        self.seeded = true;
        elapsed
    }

    /// Recompute elapsed time after a background suspension using the cached
    /// offset. Returns the corrected elapsed seconds.
    pub fn resume(&mut self, client_now: u64) -> f32 {
        let server_now = (client_now as i64 - self.clock_offset_ms).max(0) as u64;
        let elapsed = reconcile(self.room_start_timestamp, server_now);
        self.elapsed = elapsed as f64;
        elapsed
    }

    /// Advance by one frame of locally accumulated time.
    pub fn advance(&mut self, dt: f32) {
        if self.seeded {
            self.elapsed += dt as f64;
        }
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed as f32
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_skew_yields_elapsed_seconds() {
        let mut clock = RoomClock::new();
        // room started at T0, player joined 5s later, no network delay
        let elapsed = clock.seed(1_000_000, 1_005_000, 1_005_000);
        assert_eq!(elapsed, 5.0);
        assert_eq!(clock.elapsed(), 5.0);
    }

    #[test]
    fn reconcile_clamps_negative() {
        // reference before room start: clock skew must not go negative
        assert_eq!(reconcile(2_000, 1_000), 0.0);
    }

    #[test]
    fn seeding_twice_with_same_inputs_is_idempotent() {
        let mut a = RoomClock::new();
        let mut b = RoomClock::new();
        let e1 = a.seed(1_000_000, 1_012_500, 1_012_600);
        a.seed(1_000_000, 1_012_500, 1_012_600);
        let e2 = b.seed(1_000_000, 1_012_500, 1_012_600);
        assert_eq!(e1, e2);
        assert_eq!(a.elapsed(), b.elapsed());
    }

    #[test]
    fn resume_uses_cached_offset() {
        let mut clock = RoomClock::new();
        // client clock runs 250ms ahead of the server
        clock.seed(1_000_000, 1_005_000, 1_005_250);
        // 10s of wall time pass while suspended
        let elapsed = clock.resume(1_015_250);
        assert!((elapsed - 15.0).abs() < 1e-3);
    }

    #[test]
    fn advance_accumulates_frame_delta() {
        let mut clock = RoomClock::new();
        clock.seed(0, 2_000, 2_000);
        for _ in 0..50 {
            clock.advance(0.02);
        }
        assert!((clock.elapsed() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn unseeded_clock_does_not_advance() {
        let mut clock = RoomClock::new();
        clock.advance(1.0);
        assert_eq!(clock.elapsed(), 0.0);
    }
}
