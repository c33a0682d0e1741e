//! Periodic task-space references synchronized to the gait phase.
//!
//! Foot references hold the current foothold during stance and follow a
//! smooth foothold-to-foothold arc during swing; the center-of-mass
//! reference integrates the commanded stride velocity. Both are pure
//! functions of time built on the same phase math the timeline planner
//! uses, so reference curves meet the planned footholds exactly.
//!
//! The swing arc uses 12-point (degree-11) Bezier curves. The control
//! points are arranged to give zero velocity and acceleration at
//! liftoff (t=0) and touchdown (t=1), with the height profile
//! normalized so the peak equals `swing_height` at mid-swing.

use nalgebra::Vector3;

use crate::gait::GaitParameters;

// 12-point Bezier for horizontal interpolation (S-curve from 0 to 1).
// First 3 and last 3 control points are equal, so velocity and
// acceleration vanish at both endpoints.
const BEZIER_S: [f64; 12] = [
    0.0, 0.0, 0.0, //
    0.5, 0.5, //
    0.5, 0.5, //
    0.5, 0.5, //
    1.0, 1.0, 1.0,
];

// 12-point Bezier for the height profile (peaks at t=0.5).
// Scaled by swing_height / BEZIER_H_PEAK at evaluation so the actual
// peak equals swing_height.
const BEZIER_H: [f64; 12] = [
    0.0, 0.0, 0.0, //
    0.9, 0.9, //
    1.0, 1.0, //
    0.9, 0.9, //
    0.0, 0.0, 0.0,
];

// bezier_eval(&BEZIER_H, 0.5), pre-computed for normalization.
const BEZIER_H_PEAK: f64 = 0.886230468750;

/// Evaluate a degree-11 Bezier curve at `t` via De Casteljau's algorithm.
fn bezier_eval(points: &[f64; 12], t: f64) -> f64 {
    let mut work = *points;
    for k in 1..12 {
        for i in 0..(12 - k) {
            work[i] = work[i] * (1.0 - t) + work[i + 1] * t;
        }
    }
    work[0]
}

/// Derivative of a degree-11 Bezier curve at `t` (hodograph form).
fn bezier_derivative(points: &[f64; 12], t: f64) -> f64 {
    let mut diffs = [0.0; 11];
    for i in 0..11 {
        diffs[i] = points[i + 1] - points[i];
    }
    for k in 1..11 {
        for i in 0..(11 - k) {
            diffs[i] = diffs[i] * (1.0 - t) + diffs[i + 1] * t;
        }
    }
    11.0 * diffs[0]
}

// ---------------------------------------------------------------------------
// PeriodicFootRef
// ---------------------------------------------------------------------------

/// Phase-indexed reference for one foot.
///
/// `inverted` selects the diagonal pair that lifts first: an inverted
/// foot lifts at `lift0` and its first step covers half a stride; a
/// non-inverted foot lifts half a stride later and steps a full stride,
/// phase-shifted by half a period relative to its diagonal opposites.
#[derive(Debug, Clone)]
pub struct PeriodicFootRef {
    foothold0: Vector3<f64>,
    step_vector: Vector3<f64>,
    swing_height: f64,
    /// This foot's first liftoff time.
    t0: f64,
    swing_time: f64,
    /// Full foot cycle: one swing plus one long stance.
    period: f64,
    /// Fraction of a stride covered by the first step.
    first_fraction: f64,
}

impl PeriodicFootRef {
    /// Build a foot reference from gait parameters.
    ///
    /// `lift0` is the timeline's first liftoff (of the inverted pair).
    #[must_use]
    pub fn new(
        foothold0: Vector3<f64>,
        params: &GaitParameters,
        lift0: f64,
        inverted: bool,
    ) -> Self {
        let (t0, first_fraction) = if inverted {
            (lift0, 0.5)
        } else {
            (lift0 + params.half_stride(), 1.0)
        };
        Self {
            foothold0,
            step_vector: params.step_vector(),
            swing_height: params.swing_height(),
            t0,
            swing_time: params.swing_time(),
            period: params.stride_period(),
            first_fraction,
        }
    }

    /// Foothold at the start of cycle `k` (before that cycle's swing).
    fn foothold_before(&self, k: u64) -> Vector3<f64> {
        if k == 0 {
            self.foothold0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let strides = self.first_fraction + (k - 1) as f64;
            self.foothold0 + self.step_vector * strides
        }
    }

    /// Foothold after cycle `k`'s swing.
    fn foothold_after(&self, k: u64) -> Vector3<f64> {
        self.foothold_before(k + 1)
    }

    /// Reference position and velocity at time `t`.
    ///
    /// Position is continuous at every stance/swing boundary; velocity
    /// jumps at liftoff and touchdown.
    #[must_use]
    pub fn eval(&self, t: f64) -> (Vector3<f64>, Vector3<f64>) {
        if t < self.t0 {
            return (self.foothold0, Vector3::zeros());
        }
        let tau = t - self.t0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let k = (tau / self.period).floor() as u64;
        let tau_cycle = tau - (tau / self.period).floor() * self.period;

        if tau_cycle < self.swing_time {
            let phase = tau_cycle / self.swing_time;
            let start = self.foothold_before(k);
            let target = self.foothold_after(k);

            let s = bezier_eval(&BEZIER_S, phase);
            let height = bezier_eval(&BEZIER_H, phase) * (self.swing_height / BEZIER_H_PEAK);
            let pos = start + (target - start) * s + Vector3::new(0.0, 0.0, height);

            let ds_dt = bezier_derivative(&BEZIER_S, phase) / self.swing_time;
            let dh_dt = bezier_derivative(&BEZIER_H, phase) * (self.swing_height / BEZIER_H_PEAK)
                / self.swing_time;
            let vel = (target - start) * ds_dt + Vector3::new(0.0, 0.0, dh_dt);

            (pos, vel)
        } else {
            (self.foothold_after(k), Vector3::zeros())
        }
    }

    /// Whether the foot is scheduled airborne at `t`.
    #[must_use]
    pub fn in_swing(&self, t: f64) -> bool {
        if t < self.t0 {
            return false;
        }
        let tau = t - self.t0;
        tau % self.period < self.swing_time
    }
}

// ---------------------------------------------------------------------------
// PeriodicComRef
// ---------------------------------------------------------------------------

/// Center-of-mass reference: constant commanded horizontal velocity and
/// yaw rate from the first liftoff on, height held at the nominal
/// standing height.
#[derive(Debug, Clone)]
pub struct PeriodicComRef {
    com0: Vector3<f64>,
    vcom: Vector3<f64>,
    yaw_rate: f64,
    t0: f64,
    standing_height: f64,
}

impl PeriodicComRef {
    /// Build a CoM reference from gait parameters.
    #[must_use]
    pub fn new(
        com0: Vector3<f64>,
        params: &GaitParameters,
        lift0: f64,
        standing_height: f64,
    ) -> Self {
        Self {
            com0: Vector3::new(com0.x, com0.y, standing_height),
            vcom: params.commanded_velocity(),
            yaw_rate: params.commanded_yaw_rate(),
            t0: lift0,
            standing_height,
        }
    }

    /// Reference position and velocity at time `t`.
    #[must_use]
    pub fn eval(&self, t: f64) -> (Vector3<f64>, Vector3<f64>) {
        if t < self.t0 {
            return (self.com0, Vector3::zeros());
        }
        let tau = t - self.t0;
        let mut pos = self.com0 + self.vcom * tau;
        pos.z = self.standing_height;
        let vel = Vector3::new(self.vcom.x, self.vcom.y, 0.0);
        (pos, vel)
    }

    /// Reference yaw angle at time `t` (zero at the timeline origin).
    #[must_use]
    pub fn yaw(&self, t: f64) -> f64 {
        if t < self.t0 {
            0.0
        } else {
            self.yaw_rate * (t - self.t0)
        }
    }

    /// Commanded horizontal velocity.
    #[must_use]
    pub const fn commanded_velocity(&self) -> Vector3<f64> {
        self.vcom
    }
}

// ---------------------------------------------------------------------------
// ReferenceSet
// ---------------------------------------------------------------------------

/// The per-foot and CoM references for one planned timeline.
#[derive(Debug, Clone)]
pub struct ReferenceSet {
    /// Foot references indexed by `ContactId` order: LF, LH, RF, RH.
    pub feet: [PeriodicFootRef; 4],
    /// Center-of-mass reference.
    pub com: PeriodicComRef,
}

impl ReferenceSet {
    /// Build references matching a planned trot timeline.
    ///
    /// `footholds` are the initial contact positions (LF, LH, RF, RH);
    /// `lift0` is the first liftoff time. LH and RF lift first
    /// (inverted), LF and RH half a stride later, the same pairing the
    /// planner schedules.
    #[must_use]
    pub fn for_gait(
        params: &GaitParameters,
        footholds: &[Vector3<f64>; 4],
        com0: Vector3<f64>,
        standing_height: f64,
        lift0: f64,
    ) -> Self {
        Self {
            feet: [
                PeriodicFootRef::new(footholds[0], params, lift0, false), // LF
                PeriodicFootRef::new(footholds[1], params, lift0, true),  // LH
                PeriodicFootRef::new(footholds[2], params, lift0, true),  // RF
                PeriodicFootRef::new(footholds[3], params, lift0, false), // RH
            ],
            com: PeriodicComRef::new(com0, params, lift0, standing_height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strider_core::GaitConfig;

    fn trot_params() -> GaitParameters {
        GaitParameters::from_config(&GaitConfig {
            step_vector: [0.3, 0.0, 0.0],
            swing_time: 0.25,
            stance_time: 0.1,
            swing_start_time: 0.5,
            cycle_count: 4,
            swing_height: 0.2,
            ..GaitConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn holds_foothold_before_liftoff() {
        let p = trot_params();
        let x0 = Vector3::new(-0.4, 0.3, 0.0);
        let foot = PeriodicFootRef::new(x0, &p, 0.5, true);
        let (pos, vel) = foot.eval(0.1);
        assert_relative_eq!(pos, x0, epsilon = 1e-12);
        assert_relative_eq!(vel.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn swing_starts_and_ends_on_footholds() {
        let p = trot_params();
        let x0 = Vector3::new(-0.4, 0.3, 0.0);
        let foot = PeriodicFootRef::new(x0, &p, 0.5, true);

        // First swing window: [0.5, 0.75]. Half step for the first pair.
        let (start, _) = foot.eval(0.5);
        assert_relative_eq!(start, x0, epsilon = 1e-12);
        let (end, _) = foot.eval(0.75);
        assert_relative_eq!(end, x0 + Vector3::new(0.15, 0.0, 0.0), epsilon = 1e-10);
    }

    #[test]
    fn peak_height_at_swing_midpoint() {
        let p = trot_params();
        let x0 = Vector3::new(-0.4, 0.3, 0.0);
        let foot = PeriodicFootRef::new(x0, &p, 0.5, true);
        // Temporal midpoint of the first swing window.
        let (pos, _) = foot.eval(0.5 + 0.125);
        assert_relative_eq!(pos.z, 0.2, epsilon = 1e-10);
    }

    #[test]
    fn stance_holds_post_swing_foothold() {
        let p = trot_params();
        let x0 = Vector3::new(-0.4, 0.3, 0.0);
        let foot = PeriodicFootRef::new(x0, &p, 0.5, true);
        // Deep in the stance portion of cycle 0.
        let (pos, vel) = foot.eval(1.0);
        assert_relative_eq!(pos, x0 + Vector3::new(0.15, 0.0, 0.0), epsilon = 1e-10);
        assert_relative_eq!(vel.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn position_continuous_at_boundaries() {
        let p = trot_params();
        let x0 = Vector3::new(0.4, 0.3, 0.0);
        let foot = PeriodicFootRef::new(x0, &p, 0.5, false);
        let eps = 1e-7;
        // Check every liftoff and touchdown over the planned horizon.
        for k in 0..4 {
            let lift = 0.5 + p.half_stride() + f64::from(k) * p.stride_period();
            let touchdown = lift + p.swing_time();
            for boundary in [lift, touchdown] {
                let (before, _) = foot.eval(boundary - eps);
                let (after, _) = foot.eval(boundary + eps);
                assert!(
                    (after - before).norm() < 1e-4,
                    "discontinuity at t={boundary}: {before:?} vs {after:?}"
                );
            }
        }
    }

    #[test]
    fn inverted_pairs_swing_out_of_phase() {
        let p = trot_params();
        let first = PeriodicFootRef::new(Vector3::zeros(), &p, 0.5, true);
        let second = PeriodicFootRef::new(Vector3::zeros(), &p, 0.5, false);

        // Mid first swing window.
        let t = 0.5 + 0.125;
        assert!(first.in_swing(t));
        assert!(!second.in_swing(t));

        // Half a stride later the roles flip.
        let t = t + p.half_stride();
        assert!(!first.in_swing(t));
        assert!(second.in_swing(t));
    }

    #[test]
    fn net_displacement_after_four_strides() {
        let p = trot_params();
        let x0 = Vector3::new(0.4, 0.3, 0.0);
        // Non-inverted foot: four full steps.
        let foot = PeriodicFootRef::new(x0, &p, 0.5, false);
        let t_end = 0.5 + p.half_stride() + 4.0 * p.stride_period();
        let (pos, _) = foot.eval(t_end);
        assert_relative_eq!(pos.x - x0.x, 4.0 * 0.3, epsilon = 1e-10);
        assert_relative_eq!(pos.z, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn swing_velocity_zero_at_endpoints() {
        let p = trot_params();
        let foot = PeriodicFootRef::new(Vector3::zeros(), &p, 0.5, true);
        let (_, v_start) = foot.eval(0.5);
        assert_relative_eq!(v_start.norm(), 0.0, epsilon = 1e-9);
        // Just inside the end of the swing window.
        let (_, v_end) = foot.eval(0.75 - 1e-9);
        assert!(v_end.norm() < 1e-4);
    }

    #[test]
    fn com_integrates_commanded_velocity() {
        let p = trot_params();
        let com0 = Vector3::new(0.0, 0.0, 0.45);
        let com = PeriodicComRef::new(com0, &p, 0.5, 0.45);

        // Before liftoff: parked.
        let (pos, vel) = com.eval(0.25);
        assert_relative_eq!(pos, com0, epsilon = 1e-12);
        assert_relative_eq!(vel.norm(), 0.0, epsilon = 1e-12);

        // One stride after liftoff: one step_vector of displacement.
        let (pos, vel) = com.eval(0.5 + p.stride_period());
        assert_relative_eq!(pos.x, 0.3, epsilon = 1e-12);
        assert_relative_eq!(pos.z, 0.45, epsilon = 1e-12);
        assert_relative_eq!(vel.x, 0.3 / 0.7, epsilon = 1e-12);
        assert_relative_eq!(vel.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn com_yaw_integrates_rate() {
        let params = GaitParameters::from_config(&GaitConfig {
            step_yaw: std::f64::consts::PI / 12.0,
            swing_time: 0.25,
            stance_time: 0.1,
            ..GaitConfig::default()
        })
        .unwrap();
        let com = PeriodicComRef::new(Vector3::zeros(), &params, 0.5, 0.45);
        assert_relative_eq!(com.yaw(0.2), 0.0, epsilon = 1e-12);
        assert_relative_eq!(
            com.yaw(0.5 + params.stride_period()),
            std::f64::consts::PI / 12.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn reference_set_pairs_match_planner() {
        let p = trot_params();
        let footholds = [
            Vector3::new(0.4, 0.3, 0.0),
            Vector3::new(-0.4, 0.3, 0.0),
            Vector3::new(0.4, -0.3, 0.0),
            Vector3::new(-0.4, -0.3, 0.0),
        ];
        let refs =
            ReferenceSet::for_gait(&p, &footholds, Vector3::new(0.0, 0.0, 0.45), 0.45, 0.5);

        // LH and RF swing first; LF and RH wait half a stride.
        let t = 0.5 + 0.1;
        assert!(!refs.feet[0].in_swing(t)); // LF
        assert!(refs.feet[1].in_swing(t)); // LH
        assert!(refs.feet[2].in_swing(t)); // RF
        assert!(!refs.feet[3].in_swing(t)); // RH
    }

    #[test]
    fn bezier_height_peak_normalization() {
        // The table's raw peak equals the precomputed constant.
        assert_relative_eq!(bezier_eval(&BEZIER_H, 0.5), BEZIER_H_PEAK, epsilon = 1e-12);
        // The S-curve is a proper 0-to-1 ease.
        assert_relative_eq!(bezier_eval(&BEZIER_S, 0.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(bezier_eval(&BEZIER_S, 1.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(bezier_eval(&BEZIER_S, 0.5), 0.5, epsilon = 1e-12);
    }
}
