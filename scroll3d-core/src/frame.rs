/// Frame pacing for the per-refresh loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCounters {
    pub drawn: u64,
    pub skipped: u64,
}

/// Gatekeeper for the per-refresh callback.
///
/// A tick that arrives while the previous frame is still being worked on, or
/// before the surface has consumed the previous submission, is dropped rather
/// than queued. Duplicate or out-of-order timestamps are dropped too.
#[derive(Debug, Default)]
pub struct FrameLoop {
    running: bool,
    in_flight: bool,
    last_timestamp: Option<f64>,
    counters: FrameCounters,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.running = true;
        self.in_flight = false;
        self.last_timestamp = None;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.in_flight = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn counters(&self) -> FrameCounters {
        self.counters
    }

    /// Decide whether the tick at `timestamp_ms` may draw. A `true` result
    /// must be followed by [`FrameLoop::finish`].
    pub fn begin(&mut self, timestamp_ms: f64, surface_ready: bool) -> bool {
        if !self.running {
            return false;
        }

        let stale = self
            .last_timestamp
            .map_or(false, |last| timestamp_ms <= last);
        if self.in_flight || !surface_ready || stale {
            self.counters.skipped += 1;
            log::trace!(
                "skipping frame at {:.1}ms (in flight: {}, surface ready: {})",
                timestamp_ms,
                self.in_flight,
                surface_ready
            );
            return false;
        }

        self.in_flight = true;
        self.last_timestamp = Some(timestamp_ms);
        true
    }

    /// Mark the current frame's work as done.
    pub fn finish(&mut self) {
        if self.in_flight {
            self.in_flight = false;
            self.counters.drawn += 1;
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_loop_never_draws() {
        let mut frames = FrameLoop::new();
        assert!(!frames.begin(16.0, true));
        assert_eq!(frames.counters(), FrameCounters::default());
    }

    #[test]
    fn test_pending_frame_skips_next_tick() {
        let mut frames = FrameLoop::new();
        frames.start();
        assert!(frames.begin(16.0, true));
        assert!(!frames.begin(32.0, true));
        frames.finish();
        assert!(frames.begin(48.0, true));
        frames.finish();
        assert_eq!(frames.counters(), FrameCounters { drawn: 2, skipped: 1 });
    }

    #[test]
    fn test_busy_surface_skips() {
        let mut frames = FrameLoop::new();
        frames.start();
        assert!(!frames.begin(16.0, false));
        assert!(frames.begin(32.0, true));
        frames.finish();
        assert_eq!(frames.counters().skipped, 1);
    }

    #[test]
    fn test_duplicate_timestamp_skips() {
        let mut frames = FrameLoop::new();
        frames.start();
        assert!(frames.begin(16.0, true));
        frames.finish();
        assert!(!frames.begin(16.0, true));
        assert!(!frames.begin(10.0, true));
        assert_eq!(frames.counters(), FrameCounters { drawn: 1, skipped: 2 });
    }

    #[test]
    fn test_stop_clears_in_flight() {
        let mut frames = FrameLoop::new();
        frames.start();
        assert!(frames.begin(1.0, true));
        frames.stop();
        assert!(!frames.is_in_flight());
        frames.finish();
        assert_eq!(frames.counters().drawn, 0);
    }
}
