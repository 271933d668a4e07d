//! Edge-crossing detector.
//!
//! A small, pure state machine. Cooldown prevents oscillation when the
//! cursor sits near an edge; the grace window prevents a warp (which
//! itself lands the cursor near an edge) from instantly retriggering a
//! crossing.

/// Tunable constants, held separately from the detector's runtime state
/// so tests can shrink the windows instead of waiting on a real clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeDetectorConfig {
    pub edge_inset: f64,
    pub cooldown: f64,
    pub grace_after_warp: f64,
}

impl Default for EdgeDetectorConfig {
    fn default() -> Self {
        Self {
            edge_inset: 6.0,
            cooldown: 0.25,
            grace_after_warp: 0.50,
        }
    }
}

/// Per-side edge-crossing detector. `now` is always a monotonic seconds
/// value; callers own the clock (typically `Instant::now()` measured
/// against a fixed epoch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeDetector {
    config: EdgeDetectorConfig,
    last_point: (f64, f64),
    last_hit_time: f64,
    last_warp_time: f64,
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new(EdgeDetectorConfig::default())
    }
}

impl EdgeDetector {
    pub fn new(config: EdgeDetectorConfig) -> Self {
        Self {
            config,
            last_point: (0.0, 0.0),
            last_hit_time: f64::NEG_INFINITY,
            last_warp_time: f64::NEG_INFINITY,
        }
    }

    fn in_cooldown(&self, now: f64) -> bool {
        now - self.last_hit_time < self.config.cooldown
    }

    fn in_warp_grace(&self, now: f64) -> bool {
        now - self.last_warp_time < self.config.grace_after_warp
    }

    /// Called on the Client side while in `Local` mode: does crossing
    /// the left edge of `global_left_edge` mean we should enter Remote?
    pub fn should_enter_remote(
        &mut self,
        now: f64,
        point: (f64, f64),
        delta_x: f64,
        global_left_edge: f64,
    ) -> bool {
        let result = !self.in_cooldown(now)
            && !self.in_warp_grace(now)
            && point.0 <= global_left_edge + self.config.edge_inset
            && (delta_x < -0.5
                || point.0 < self.last_point.0
                || (delta_x == 0.0 && point.0 <= global_left_edge));

        if result {
            self.last_hit_time = now;
        }
        self.last_point = point;
        result
    }

    /// Called on the Host side while in `Remote` mode: does crossing the
    /// right edge of the active display mean control should release back
    /// to Local?
    pub fn should_release(&mut self, now: f64, point: (f64, f64), display_max_x: f64) -> bool {
        let result = !self.in_cooldown(now)
            && !self.in_warp_grace(now)
            && point.0 >= display_max_x - self.config.edge_inset;

        if result {
            self.last_hit_time = now;
        }
        result
    }

    /// Arms the post-warp grace window.
    pub fn record_warp(&mut self, now: f64) {
        self.last_warp_time = now;
    }

    /// Zeros all timestamps. Called on any Ready -> not-Ready connection
    /// transition.
    pub fn reset(&mut self) {
        self.last_point = (0.0, 0.0);
        self.last_hit_time = f64::NEG_INFINITY;
        self.last_warp_time = f64::NEG_INFINITY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_enter_remote_scenario() {
        // Cursor crossing left, then sitting still, then crossing again.
        let mut d = EdgeDetector::default();
        assert!(d.should_enter_remote(1.0, (0.0, 500.0), -10.0, 0.0));
        assert!(!d.should_enter_remote(1.10, (0.0, 500.0), -10.0, 0.0));
        // 1.30 is still within the 0.25s cooldown window measured from
        // the hit recorded at 1.0? No: 1.30 - 1.0 = 0.30 > cooldown, so
        // this call is decided purely by the "moving left" predicate.
        // Cursor hasn't moved since the last call (same point), and
        // delta_x is nonzero, so the "moving left" disjunct fails.
        assert!(!d.should_enter_remote(1.30, (0.0, 500.0), 0.1, 0.0));
    }

    #[test]
    fn cooldown_blocks_reentry_for_exactly_the_window() {
        let mut d = EdgeDetector::default();
        assert!(d.should_enter_remote(0.0, (0.0, 0.0), -1.0, 0.0));
        assert!(!d.should_enter_remote(0.24, (-1.0, 0.0), -1.0, 0.0));
        assert!(d.should_enter_remote(0.26, (-2.0, 0.0), -1.0, 0.0));
    }

    #[test]
    fn post_warp_grace_scenario() {
        // A warp lands the cursor back at the right edge; the grace
        // window should swallow an immediate re-hit there.
        let mut d = EdgeDetector::default();
        let max_x = 1920.0;
        d.record_warp(5.0);
        assert!(!d.should_release(5.3, (max_x - 1.0, 0.0), max_x));
        assert!(d.should_release(5.55, (max_x - 1.0, 0.0), max_x));
    }

    #[test]
    fn wall_contact_with_zero_delta_still_triggers() {
        let mut d = EdgeDetector::default();
        d.last_point = (50.0, 0.0);
        assert!(d.should_enter_remote(10.0, (0.0, 0.0), 0.0, 0.0));
    }

    #[test]
    fn reset_zeroes_timestamps() {
        let mut d = EdgeDetector::default();
        d.should_enter_remote(1.0, (0.0, 0.0), -10.0, 0.0);
        d.record_warp(1.0);
        d.reset();
        // Immediately after reset, neither cooldown nor grace should
        // suppress a fresh hit.
        assert!(d.should_enter_remote(1.0, (0.0, 0.0), -10.0, 0.0));
    }

    #[test]
    fn release_requires_right_edge_proximity() {
        let mut d = EdgeDetector::default();
        assert!(!d.should_release(100.0, (500.0, 0.0), 1920.0));
        assert!(d.should_release(100.0, (1915.0, 0.0), 1920.0));
    }
}
