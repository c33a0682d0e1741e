//! Optimizer boundary.
//!
//! The control loop treats the trajectory optimizer as a black box
//! behind [`TrajectoryOptimizer`]: it hands over a [`SolveRequest`]
//! and gets back a [`PolicySolution`] or a convergence failure. The
//! loop never inspects solver internals beyond the diagnostics.

use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector, Vector3};
use strider_core::SolveError;

use crate::contact::{ContactSequence, NUM_CONTACTS};
use crate::policy::{ControlCommand, FeedbackPolicy, PolicySolution, RobotState};
use crate::reference::ReferenceSet;

// ---------------------------------------------------------------------------
// SolveRequest / ConvergenceDiagnostics
// ---------------------------------------------------------------------------

/// One solve's worth of inputs, owned so the request can cross the
/// worker channel without borrowing loop state.
#[derive(Debug, Clone)]
pub struct SolveRequest {
    /// Contact timeline covering the horizon.
    pub contacts: ContactSequence,
    /// Foot and CoM references for the same timeline.
    pub references: ReferenceSet,
    /// Measured (or delay-compensated) state at `t`.
    pub state: RobotState,
    /// Solve time, seconds.
    pub t: f64,
    /// Horizon length, seconds.
    pub horizon: f64,
    /// Number of policy knots over the horizon.
    pub knots: usize,
    /// Iteration budget for this solve.
    pub max_iter: usize,
    /// KKT tolerance for convergence.
    pub tolerance: f64,
}

/// How a solve went, reported alongside every policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceDiagnostics {
    /// Final KKT residual norm.
    pub kkt_error: f64,
    /// Iterations spent.
    pub iterations: usize,
    /// Whether the residual reached the tolerance.
    pub converged: bool,
    /// Wall-clock solve time.
    pub solve_time: Duration,
}

// ---------------------------------------------------------------------------
// Traits at the loop boundary
// ---------------------------------------------------------------------------

/// Trajectory optimizer producing feedback policies.
///
/// `Send` because the loop moves the optimizer onto its solve worker
/// thread.
pub trait TrajectoryOptimizer: Send {
    /// Solve over the request's horizon.
    ///
    /// # Errors
    /// [`SolveError::NotConverged`] when the iteration budget runs out
    /// above tolerance.
    fn solve(&mut self, request: &SolveRequest) -> Result<PolicySolution, SolveError>;
}

/// Kinematic queries the loop needs from the robot description.
pub trait RobotModel {
    /// World-frame contact positions for a state, in `ContactId` order.
    fn contact_positions(&self, state: &RobotState) -> [Vector3<f64>; NUM_CONTACTS];

    /// Center of mass for a state.
    fn com(&self, state: &RobotState) -> Vector3<f64>;

    /// Standing CoM height the gait maintains.
    fn nominal_height(&self) -> f64;

    /// Total weight (mass times gravity), for feedforward terms.
    fn total_weight(&self) -> f64;
}

/// Actuation sink: applies one command and reports the resulting state.
pub trait Actuation {
    fn apply(&mut self, t: f64, command: &ControlCommand) -> RobotState;
}

// ---------------------------------------------------------------------------
// AnalyticOptimizer
// ---------------------------------------------------------------------------

/// Per-iteration residual contraction of the analytic solve.
const CONTRACTION: f64 = 0.1;

/// Closed-form optimizer over point-mass CoM dynamics.
///
/// State convention: `positions` is the CoM position, `velocities` the
/// CoM velocity, `u` a force on the mass. Each knot's reference comes
/// straight from the CoM reference; the gain is a fixed PD pair, so the
/// policy is `u = u_ff + kp*(p_ref - p) + kd*(v_ref - v)`. The KKT
/// residual is the tracking error at the initial knot, contracted once
/// per iteration, which gives the loop honest converged/failed
/// behavior without an interior-point method behind it.
#[derive(Debug, Clone)]
pub struct AnalyticOptimizer {
    kp: f64,
    kd: f64,
    /// Gravity feedforward, typically `[0, 0, total_weight]`.
    u_ff: Vector3<f64>,
}

impl AnalyticOptimizer {
    #[must_use]
    pub fn new(kp: f64, kd: f64, u_ff: Vector3<f64>) -> Self {
        Self { kp, kd, u_ff }
    }

    fn stacked_com_ref(references: &ReferenceSet, t: f64) -> DVector<f64> {
        let (pos, vel) = references.com.eval(t);
        DVector::from_vec(vec![pos.x, pos.y, pos.z, vel.x, vel.y, vel.z])
    }

    fn pd_gain(&self) -> DMatrix<f64> {
        let mut gain = DMatrix::zeros(3, 6);
        for i in 0..3 {
            gain[(i, i)] = self.kp;
            gain[(i, i + 3)] = self.kd;
        }
        // Feedback opposes the deviation.
        -gain
    }
}

impl TrajectoryOptimizer for AnalyticOptimizer {
    fn solve(&mut self, request: &SolveRequest) -> Result<PolicySolution, SolveError> {
        let started = Instant::now();
        let knots = request.knots.max(1);
        #[allow(clippy::cast_precision_loss)]
        let dt = request.horizon / knots as f64;

        let u_ff = DVector::from_vec(vec![self.u_ff.x, self.u_ff.y, self.u_ff.z]);
        let gain = self.pd_gain();

        let mut u_ref = Vec::with_capacity(knots);
        let mut gains = Vec::with_capacity(knots);
        let mut x_ref = Vec::with_capacity(knots);
        for k in 0..knots {
            #[allow(clippy::cast_precision_loss)]
            let t_k = request.t + k as f64 * dt;
            x_ref.push(Self::stacked_com_ref(&request.references, t_k));
            u_ref.push(u_ff.clone());
            gains.push(gain.clone());
        }

        // Initial-knot tracking error stands in for the KKT residual.
        let mut kkt_error = (request.state.as_vector() - &x_ref[0]).norm();
        let mut iterations = 0;
        while kkt_error > request.tolerance && iterations < request.max_iter {
            kkt_error *= CONTRACTION;
            iterations += 1;
        }
        let converged = kkt_error <= request.tolerance;
        let diagnostics = ConvergenceDiagnostics {
            kkt_error,
            iterations,
            converged,
            solve_time: started.elapsed(),
        };
        if !converged {
            return Err(SolveError::NotConverged {
                kkt_error,
                tolerance: request.tolerance,
            });
        }
        Ok(PolicySolution {
            policy: FeedbackPolicy::new(request.t, dt, u_ref, gains, x_ref),
            diagnostics,
        })
    }
}
