//! The MPC control loop.
//!
//! [`MpcController`] ties the planner, references, optimizer, and
//! feedback policy together: an explicit lifecycle (`initialize`,
//! `step`, `shutdown`), a solve worker thread fed over a bounded
//! channel, and a rolling contact horizon that retires passed events
//! and appends future strides. Actuation ticks never block on a solve;
//! the freshest completed policy is installed between ticks and a
//! policy past its horizon extrapolates until a newer one lands.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use nalgebra::DVector;
use tracing::{debug, info, warn};

use strider_core::{
    ConfigError, ControlConfig, GaitConfig, PlanError, SolveCadence, SolveError, StriderError,
};

use crate::contact::ContactSequence;
use crate::gait::{GaitParameters, StrideCursor, TrotTimelinePlanner};
use crate::optimizer::{RobotModel, SolveRequest, TrajectoryOptimizer};
use crate::policy::{ControlCommand, FeedbackPolicy, PolicySolution, RobotState, compensate_delay};
use crate::reference::ReferenceSet;

/// Extra event headroom beyond one freshly planned horizon, so the
/// rolling extension can append strides before old events retire.
const EVENT_HEADROOM: usize = 8;

// ---------------------------------------------------------------------------
// LoopState / LoopStats
// ---------------------------------------------------------------------------

/// Lifecycle state of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No timeline, no policy.
    Uninitialized,
    /// First synchronous solve in progress.
    Initializing,
    /// Nominal operation.
    Steady,
    /// Too many consecutive solve failures; still actuating on the
    /// last good policy.
    Degraded,
}

/// Running counters the loop keeps for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Policies installed from completed solves.
    pub solves_installed: u64,
    /// Solve failures received from the worker.
    pub solves_failed: u64,
    /// Cadence triggers skipped because a solve was already queued.
    pub skipped_triggers: u64,
    /// Ticks actuated on a policy past its horizon.
    pub stale_ticks: u64,
    /// Contact events retired by the rolling horizon.
    pub retired_events: u64,
}

// ---------------------------------------------------------------------------
// Solve worker
// ---------------------------------------------------------------------------

type SolveOutcome = Result<PolicySolution, SolveError>;

struct SolveWorker {
    job_tx: Sender<SolveRequest>,
    result_rx: Receiver<SolveOutcome>,
    handle: JoinHandle<()>,
}

fn spawn_worker<O>(mut optimizer: O) -> SolveWorker
where
    O: TrajectoryOptimizer + 'static,
{
    // bounded(1) on jobs serializes triggers: at most one solve in
    // flight plus one queued; further triggers are skipped.
    let (job_tx, job_rx) = bounded::<SolveRequest>(1);
    let (result_tx, result_rx) = bounded::<SolveOutcome>(1);
    let handle = thread::spawn(move || {
        for request in job_rx {
            let outcome = optimizer.solve(&request);
            if result_tx.send(outcome).is_err() {
                break;
            }
        }
    });
    SolveWorker {
        job_tx,
        result_rx,
        handle,
    }
}

// ---------------------------------------------------------------------------
// MpcController
// ---------------------------------------------------------------------------

/// Gait-synchronized MPC loop over a [`RobotModel`].
///
/// Instances are self-contained; several can coexist in one process.
pub struct MpcController<M: RobotModel> {
    config: ControlConfig,
    params: GaitParameters,
    model: M,
    planner: TrotTimelinePlanner,

    state: LoopState,
    policy: Option<Arc<FeedbackPolicy>>,
    contacts: ContactSequence,
    references: Option<ReferenceSet>,
    cursor: Option<StrideCursor>,
    cadence: SolveCadence,
    worker: Option<SolveWorker>,

    consecutive_failures: u32,
    in_stale_episode: bool,
    stats: LoopStats,
}

impl<M: RobotModel> MpcController<M> {
    /// Build an idle controller. Both configs are validated here; the
    /// timeline and first policy come from [`initialize`](Self::initialize).
    pub fn new(
        config: ControlConfig,
        gait: &GaitConfig,
        model: M,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let params = GaitParameters::from_config(gait)?;
        let max_events = gait
            .max_events
            .unwrap_or_else(|| params.required_events() + EVENT_HEADROOM);
        let cadence = SolveCadence::new(config.steps_per_solve);
        Ok(Self {
            config,
            planner: TrotTimelinePlanner::with_max_events(max_events),
            params,
            model,
            state: LoopState::Uninitialized,
            policy: None,
            contacts: ContactSequence::new(max_events),
            references: None,
            cursor: None,
            cadence,
            worker: None,
            consecutive_failures: 0,
            in_stale_episode: false,
            stats: LoopStats::default(),
        })
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn loop_state(&self) -> LoopState {
        self.state
    }

    /// Diagnostics counters.
    #[must_use]
    pub const fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Validated gait parameters in force.
    #[must_use]
    pub const fn params(&self) -> &GaitParameters {
        &self.params
    }

    /// Contact timeline currently covering the horizon.
    #[must_use]
    pub const fn contacts(&self) -> &ContactSequence {
        &self.contacts
    }

    /// Plan the timeline, run the first solve synchronously, and start
    /// the solve worker.
    ///
    /// `t0` is the current time on the timeline whose origin is 0; it
    /// must precede the first liftoff at `swing_start_time`. The first
    /// solve gets the full `initial_solve_max_iter` budget and its
    /// failure is fatal; subsequent solves run on the worker and only
    /// degrade the loop.
    ///
    /// # Errors
    /// [`PlanError::StartAfterLiftoff`] when `t0` is past the first
    /// liftoff; [`SolveError::InitialSolveFailed`] when the first solve
    /// does not converge; planner capacity errors pass through.
    pub fn initialize<O>(
        &mut self,
        optimizer: O,
        t0: f64,
        state0: &RobotState,
    ) -> Result<(), StriderError>
    where
        O: TrajectoryOptimizer + 'static,
    {
        let lift0 = self.params.swing_start_time();
        if t0 >= lift0 {
            return Err(PlanError::StartAfterLiftoff {
                t0,
                swing_start: lift0,
            }
            .into());
        }
        self.state = LoopState::Initializing;
        let result = self.plan_and_first_solve(optimizer, t0, state0, lift0);
        if result.is_err() {
            // Leave the loop where it started so a fresh initialize can
            // be attempted.
            self.state = LoopState::Uninitialized;
        }
        result
    }

    fn plan_and_first_solve<O>(
        &mut self,
        mut optimizer: O,
        t0: f64,
        state0: &RobotState,
        lift0: f64,
    ) -> Result<(), StriderError>
    where
        O: TrajectoryOptimizer + 'static,
    {
        let footholds = self.model.contact_positions(state0);
        let com0 = self.model.com(state0);
        let (contacts, cursor) = self
            .planner
            .plan_with_cursor(&self.params, 0.0, footholds)?;
        let references = ReferenceSet::for_gait(
            &self.params,
            &footholds,
            com0,
            self.model.nominal_height(),
            lift0,
        );

        let request = SolveRequest {
            contacts: contacts.clone(),
            references: references.clone(),
            state: state0.clone(),
            t: t0,
            horizon: self.solve_horizon(),
            knots: self.solve_knots(),
            max_iter: self.config.initial_solve_max_iter as usize,
            tolerance: self.config.convergence_tolerance,
        };
        let solution = optimizer.solve(&request).map_err(|err| match err {
            SolveError::NotConverged {
                kkt_error,
                tolerance,
            } => SolveError::InitialSolveFailed {
                kkt_error,
                tolerance,
            },
            other => other,
        })?;
        info!(
            kkt_error = solution.diagnostics.kkt_error,
            iterations = solution.diagnostics.iterations,
            "initial solve converged"
        );

        self.contacts = contacts;
        self.references = Some(references);
        self.cursor = Some(cursor);
        self.policy = Some(Arc::new(solution.policy));
        self.worker = Some(spawn_worker(optimizer));
        self.consecutive_failures = 0;
        self.state = LoopState::Steady;
        Ok(())
    }

    /// One actuation tick: install any completed solve, trigger the
    /// next solve on cadence, and evaluate the current policy.
    ///
    /// Never blocks and never fails once initialized; a policy past its
    /// horizon extrapolates (clamped to its last knot) and is counted
    /// as a stale tick. Calling before `initialize` yields an empty
    /// command.
    pub fn step(&mut self, t: f64, state: &RobotState) -> ControlCommand {
        self.install_completed(t);
        if self.policy.is_some() && self.cadence.should_solve() {
            self.trigger_solve(t, state);
        }

        let Some(policy) = self.policy.clone() else {
            warn!("step called before initialize");
            return ControlCommand {
                u: DVector::zeros(0),
            };
        };
        if policy.is_stale(t) {
            self.stats.stale_ticks += 1;
            if !self.in_stale_episode {
                warn!(
                    t,
                    horizon_end = policy.horizon_end(),
                    "actuating on a stale policy"
                );
                self.in_stale_episode = true;
            }
        }
        // The command computed now takes effect one solve round-trip
        // later; evaluate the law at the state expected then.
        let x = if self.config.feedback_delay_compensation {
            compensate_delay(&state.as_vector(), &policy, t, self.config.solve_delay())
        } else {
            state.as_vector()
        };
        policy.command_at(t, &x)
    }

    /// Stop the worker and reclaim the thread.
    ///
    /// # Errors
    /// [`SolveError::WorkerGone`] when the worker thread panicked.
    pub fn shutdown(mut self) -> Result<LoopStats, StriderError> {
        if let Some(SolveWorker {
            job_tx,
            result_rx,
            handle,
        }) = self.worker.take()
        {
            // Closing both channels unblocks the worker wherever it is:
            // a pending send fails and the job loop ends.
            drop(job_tx);
            drop(result_rx);
            handle
                .join()
                .map_err(|_| StriderError::from(SolveError::WorkerGone))?;
        }
        Ok(self.stats)
    }

    /// Length of the horizon each solve covers.
    fn solve_horizon(&self) -> f64 {
        f64::from(self.params.cycle_count()) * self.params.stride_period()
    }

    /// Policy knots per solve, one per solve interval.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn solve_knots(&self) -> usize {
        ((self.solve_horizon() / self.config.solve_delay()).ceil() as usize).max(1)
    }

    fn install_completed(&mut self, t: f64) {
        let outcome = match self.worker.as_ref() {
            Some(worker) => worker.result_rx.try_recv(),
            None => return,
        };
        match outcome {
            Ok(Ok(solution)) => {
                debug!(
                    kkt_error = solution.diagnostics.kkt_error,
                    iterations = solution.diagnostics.iterations,
                    "installing policy"
                );
                let fresh = !solution.policy.is_stale(t);
                self.policy = Some(Arc::new(solution.policy));
                self.stats.solves_installed += 1;
                self.consecutive_failures = 0;
                if fresh {
                    self.in_stale_episode = false;
                }
                if self.state == LoopState::Degraded {
                    info!("solve converged, leaving degraded state");
                    self.state = LoopState::Steady;
                }
            }
            Ok(Err(err)) => {
                self.stats.solves_failed += 1;
                self.consecutive_failures += 1;
                warn!(
                    error = %err,
                    consecutive = self.consecutive_failures,
                    "solve failed"
                );
                if self.state == LoopState::Steady
                    && self.consecutive_failures >= self.config.max_consecutive_failures
                {
                    warn!("entering degraded state");
                    self.state = LoopState::Degraded;
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                if self.state != LoopState::Degraded {
                    warn!("solve worker gone, entering degraded state");
                    self.state = LoopState::Degraded;
                }
            }
        }
    }

    fn trigger_solve(&mut self, t: f64, state: &RobotState) {
        self.roll_horizon(t);

        let (Some(references), Some(policy), Some(worker)) = (
            self.references.as_ref(),
            self.policy.as_ref(),
            self.worker.as_ref(),
        ) else {
            return;
        };

        // Compensate the solve round-trip: the policy arriving one
        // solve interval from now should match the state then.
        let x = if self.config.feedback_delay_compensation {
            compensate_delay(&state.as_vector(), policy, t, self.config.solve_delay())
        } else {
            state.as_vector()
        };
        let nq = state.positions.len();

        let request = SolveRequest {
            contacts: self.contacts.clone(),
            references: references.clone(),
            state: RobotState::from_vector(&x, nq),
            t,
            horizon: self.solve_horizon(),
            knots: self.solve_knots(),
            max_iter: self.config.mpc_solve_max_iter as usize,
            tolerance: self.config.convergence_tolerance,
        };
        match worker.job_tx.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.stats.skipped_triggers += 1;
                debug!(t, "solve already queued, skipping trigger");
            }
            Err(TrySendError::Disconnected(_)) => {
                if self.state != LoopState::Degraded {
                    warn!("solve worker gone, entering degraded state");
                    self.state = LoopState::Degraded;
                }
            }
        }
    }

    /// Retire events whose interval has fully passed and append strides
    /// until the timeline covers the next solve horizon.
    fn roll_horizon(&mut self, t: f64) {
        while self.contacts.len() >= 2 && self.contacts.events()[1].time <= t {
            self.contacts.pop_front();
            self.stats.retired_events += 1;
        }

        let cover_until = t + self.solve_horizon();
        let Some(cursor) = self.cursor.as_mut() else {
            return;
        };
        loop {
            let last = self.contacts.horizon_end().unwrap_or(t);
            if last >= cover_until {
                break;
            }
            if let Err(err) = cursor.push_next(&mut self.contacts, &self.params) {
                // Solve over the shorter timeline rather than stall.
                warn!(error = %err, "could not extend contact timeline");
                break;
            }
        }
    }
}
