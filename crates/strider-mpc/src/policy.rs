//! Feedback policies produced by one optimizer solve.
//!
//! A [`FeedbackPolicy`] is a time-indexed affine control law
//! `u(t) = u_ref(t) + K(t) * (x - x_ref(t))`, valid over one planning
//! horizon and replaced wholesale on the next solve. Solution access is
//! through named fields, not string keys.

use nalgebra::{DMatrix, DVector};

// ---------------------------------------------------------------------------
// RobotState / ControlCommand
// ---------------------------------------------------------------------------

/// Measured (or predicted) robot state: generalized positions and
/// velocities stacked separately.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotState {
    /// Generalized positions.
    pub positions: DVector<f64>,
    /// Generalized velocities.
    pub velocities: DVector<f64>,
}

impl RobotState {
    /// Zero state of the given position/velocity dimensions.
    #[must_use]
    pub fn zeros(nq: usize, nv: usize) -> Self {
        Self {
            positions: DVector::zeros(nq),
            velocities: DVector::zeros(nv),
        }
    }

    /// Total state dimension (positions plus velocities).
    #[must_use]
    pub fn dim(&self) -> usize {
        self.positions.len() + self.velocities.len()
    }

    /// Stacked `[q; v]` vector.
    #[must_use]
    pub fn as_vector(&self) -> DVector<f64> {
        let mut x = DVector::zeros(self.dim());
        x.rows_mut(0, self.positions.len()).copy_from(&self.positions);
        x.rows_mut(self.positions.len(), self.velocities.len())
            .copy_from(&self.velocities);
        x
    }

    /// Split a stacked `[q; v]` vector back into a state.
    #[must_use]
    pub fn from_vector(x: &DVector<f64>, nq: usize) -> Self {
        Self {
            positions: x.rows(0, nq).into_owned(),
            velocities: x.rows(nq, x.len() - nq).into_owned(),
        }
    }

    /// Whether any component is NaN or infinite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.positions.iter().chain(self.velocities.iter()).all(|v| v.is_finite())
    }
}

/// Actuation command for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlCommand {
    /// Generalized control input (joint torques for a legged robot).
    pub u: DVector<f64>,
}

// ---------------------------------------------------------------------------
// FeedbackPolicy
// ---------------------------------------------------------------------------

/// Time-indexed affine control law from one solve.
///
/// Knots are spaced `dt` apart starting at `t0`. Between knots the law
/// is zero-order held; past the last knot it extrapolates by clamping
/// to the final knot, so a stale policy keeps producing bounded
/// commands until a fresh one is installed.
#[derive(Debug, Clone)]
pub struct FeedbackPolicy {
    t0: f64,
    dt: f64,
    u_ref: Vec<DVector<f64>>,
    gains: Vec<DMatrix<f64>>,
    x_ref: Vec<DVector<f64>>,
}

impl FeedbackPolicy {
    /// Assemble a policy from per-knot references and gains.
    ///
    /// All three vectors must have equal, non-zero length; knot `k`
    /// applies from `t0 + k*dt`.
    #[must_use]
    pub fn new(
        t0: f64,
        dt: f64,
        u_ref: Vec<DVector<f64>>,
        gains: Vec<DMatrix<f64>>,
        x_ref: Vec<DVector<f64>>,
    ) -> Self {
        debug_assert!(!u_ref.is_empty());
        debug_assert_eq!(u_ref.len(), gains.len());
        debug_assert_eq!(u_ref.len(), x_ref.len());
        Self {
            t0,
            dt,
            u_ref,
            gains,
            x_ref,
        }
    }

    /// Start of the policy's validity window.
    #[must_use]
    pub const fn t0(&self) -> f64 {
        self.t0
    }

    /// Knot spacing in seconds.
    #[must_use]
    pub const fn dt(&self) -> f64 {
        self.dt
    }

    /// Number of knots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.u_ref.len()
    }

    /// Whether the policy holds no knots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.u_ref.is_empty()
    }

    /// End of the planning horizon this policy was solved over.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn horizon_end(&self) -> f64 {
        self.t0 + self.u_ref.len() as f64 * self.dt
    }

    /// Whether `t` lies beyond the policy's horizon.
    #[must_use]
    pub fn is_stale(&self, t: f64) -> bool {
        t >= self.horizon_end()
    }

    /// Knot index for time `t`, clamped into the horizon.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn knot(&self, t: f64) -> usize {
        if t <= self.t0 {
            return 0;
        }
        let k = ((t - self.t0) / self.dt) as usize;
        k.min(self.u_ref.len() - 1)
    }

    /// Reference state at time `t` (zero-order hold, clamped).
    #[must_use]
    pub fn state_ref(&self, t: f64) -> &DVector<f64> {
        &self.x_ref[self.knot(t)]
    }

    /// Evaluate the affine law at time `t` for the stacked state `x`.
    #[must_use]
    pub fn command_at(&self, t: f64, x: &DVector<f64>) -> ControlCommand {
        let k = self.knot(t);
        let u = &self.u_ref[k] + &self.gains[k] * (x - &self.x_ref[k]);
        ControlCommand { u }
    }
}

// ---------------------------------------------------------------------------
// Delay compensation
// ---------------------------------------------------------------------------

/// Propagate a measured state forward by `delay` seconds along the
/// policy's open-loop reference dynamics.
///
/// The measured deviation from the reference is preserved; only the
/// reference motion over the delay window is added:
/// `x_comp = x + (x_ref(t + delay) - x_ref(t))`. Zero delay is the
/// identity. Pure function, so it is testable apart from the loop.
#[must_use]
pub fn compensate_delay(
    x: &DVector<f64>,
    policy: &FeedbackPolicy,
    t: f64,
    delay: f64,
) -> DVector<f64> {
    if delay == 0.0 {
        return x.clone();
    }
    let shift = policy.state_ref(t + delay) - policy.state_ref(t);
    x + shift
}

// ---------------------------------------------------------------------------
// PolicySolution
// ---------------------------------------------------------------------------

/// Typed result of one optimizer solve: the policy plus its
/// convergence diagnostics.
#[derive(Debug, Clone)]
pub struct PolicySolution {
    /// The feedback policy covering the solve's horizon.
    pub policy: FeedbackPolicy,
    /// How the solve went.
    pub diagnostics: crate::optimizer::ConvergenceDiagnostics,
}
