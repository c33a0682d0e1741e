use std::fmt;
use std::ops::Sub;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SimTime
// ---------------------------------------------------------------------------

/// Integer-nanosecond control-loop clock.
///
/// The actuation tick advances this clock by a fixed step; tracking
/// elapsed time as a monotonically increasing `u64` nanosecond count
/// avoids floating-point drift over long runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SimTime {
    nanos: u64,
}

impl SimTime {
    /// Create a new `SimTime` at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { nanos: 0 }
    }

    /// Create a `SimTime` from a raw nanosecond count.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Create a `SimTime` from seconds (as `f64`).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_secs(secs: f64) -> Self {
        Self {
            nanos: (secs * 1_000_000_000.0) as u64,
        }
    }

    /// Raw nanosecond count.
    #[must_use]
    pub const fn nanos(&self) -> u64 {
        self.nanos
    }

    /// Elapsed seconds as `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn secs_f64(&self) -> f64 {
        self.nanos as f64 / 1_000_000_000.0
    }

    /// Advance the clock by `delta_secs` seconds.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn advance_secs(&mut self, delta_secs: f64) {
        self.nanos = self.nanos.saturating_add((delta_secs * 1_000_000_000.0) as u64);
    }

    /// Number of complete steps of `dt_secs` that fit in the current time.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn step_count(&self, dt_secs: f64) -> u64 {
        let dt_nanos = (dt_secs * 1_000_000_000.0) as u64;
        if dt_nanos == 0 {
            return 0;
        }
        self.nanos / dt_nanos
    }
}

impl Sub for SimTime {
    type Output = Duration;

    /// Saturating subtraction: an earlier minuend yields zero.
    fn sub(self, rhs: Self) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(rhs.nanos))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_secs = self.nanos / 1_000_000_000;
        let remaining_nanos = self.nanos % 1_000_000_000;
        let millis = remaining_nanos / 1_000_000;
        let micros = (remaining_nanos % 1_000_000) / 1_000;
        write!(f, "{total_secs}.{millis:03}{micros:03}s")
    }
}

// ---------------------------------------------------------------------------
// SolveCadence
// ---------------------------------------------------------------------------

/// Counts actuation ticks and fires every `steps_per_solve` ticks.
///
/// The control loop steps the actuators at a higher rate than it
/// re-solves; this is the "simulation steps per MPC update" knob.
#[derive(Debug, Clone)]
pub struct SolveCadence {
    steps_per_solve: u32,
    ticks: u32,
}

impl SolveCadence {
    /// Create a cadence firing every `steps_per_solve` ticks.
    /// The first tick fires immediately so a fresh loop re-solves at once.
    #[must_use]
    pub const fn new(steps_per_solve: u32) -> Self {
        Self {
            steps_per_solve,
            ticks: 0,
        }
    }

    /// Register one actuation tick. Returns `true` when a solve is due.
    pub const fn should_solve(&mut self) -> bool {
        let due = self.ticks == 0;
        self.ticks += 1;
        if self.ticks >= self.steps_per_solve {
            self.ticks = 0;
        }
        due
    }

    /// Ticks between solves.
    #[must_use]
    pub const fn steps_per_solve(&self) -> u32 {
        self.steps_per_solve
    }

    /// Reset the tick counter so the next tick fires.
    pub const fn reset(&mut self) {
        self.ticks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- SimTime ----

    #[test]
    fn simtime_new_is_zero() {
        assert_eq!(SimTime::new().nanos(), 0);
    }

    #[test]
    fn simtime_from_secs() {
        let t = SimTime::from_secs(2.5);
        assert_eq!(t.nanos(), 2_500_000_000);
        assert!((t.secs_f64() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn simtime_advance_secs_accumulates() {
        let mut t = SimTime::new();
        for _ in 0..400 {
            t.advance_secs(0.0025);
        }
        // 400 ticks at 2.5 ms is exactly one second on the integer clock.
        assert_eq!(t.nanos(), 1_000_000_000);
    }

    #[test]
    fn simtime_step_count() {
        let t = SimTime::from_secs(1.0);
        assert_eq!(t.step_count(0.0025), 400);
        assert_eq!(t.step_count(0.0), 0);
    }

    #[test]
    fn simtime_sub_saturates() {
        let a = SimTime::from_secs(1.0);
        let b = SimTime::from_secs(3.0);
        assert_eq!(a - b, Duration::ZERO);
        assert_eq!(b - a, Duration::from_secs(2));
    }

    #[test]
    fn simtime_display() {
        let t = SimTime::from_nanos(1_234_567_890);
        assert_eq!(format!("{t}"), "1.234567s");
    }

    // ---- SolveCadence ----

    #[test]
    fn cadence_fires_on_first_tick() {
        let mut cadence = SolveCadence::new(5);
        assert!(cadence.should_solve());
    }

    #[test]
    fn cadence_fires_every_k_ticks() {
        let mut cadence = SolveCadence::new(5);
        let fired: Vec<bool> = (0..12).map(|_| cadence.should_solve()).collect();
        assert_eq!(
            fired,
            vec![
                true, false, false, false, false, true, false, false, false, false, true, false
            ]
        );
    }

    #[test]
    fn cadence_every_tick() {
        let mut cadence = SolveCadence::new(1);
        assert!(cadence.should_solve());
        assert!(cadence.should_solve());
        assert!(cadence.should_solve());
    }

    #[test]
    fn cadence_reset_rearms() {
        let mut cadence = SolveCadence::new(4);
        assert!(cadence.should_solve());
        assert!(!cadence.should_solve());
        cadence.reset();
        assert!(cadence.should_solve());
    }
}
