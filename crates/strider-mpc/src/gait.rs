//! Trot timeline planning.
//!
//! Turns validated gait parameters plus initial footholds into a
//! [`ContactSequence`] covering a whole number of strides. The planner
//! is a pure function: footholds are folded through the stride loop
//! explicitly and identical inputs yield identical sequences.

use nalgebra::{Rotation2, Vector2, Vector3};
use strider_core::{ConfigError, GaitConfig, PlanError};

use crate::contact::{ContactSequence, ContactState, LF, LH, NUM_CONTACTS, RF, RH};

/// The two diagonal leg pairs of a trot.
///
/// `LhRf` (left-hind + right-front) lifts first, matching the timeline
/// where left-front and right-hind carry the first single-support phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagonalPair {
    /// Left-hind + right-front.
    LhRf,
    /// Left-front + right-hind.
    LfRh,
}

impl DiagonalPair {
    /// The opposite diagonal.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::LhRf => Self::LfRh,
            Self::LfRh => Self::LhRf,
        }
    }

    /// Contact indices of this pair's feet.
    #[must_use]
    pub const fn feet(self) -> [usize; 2] {
        match self {
            Self::LhRf => [LH.0, RF.0],
            Self::LfRh => [LF.0, RH.0],
        }
    }

    /// Contact indices of the feet that stay planted while this pair swings.
    #[must_use]
    pub const fn stance_feet(self) -> [usize; 2] {
        self.other().feet()
    }
}

// ---------------------------------------------------------------------------
// GaitParameters
// ---------------------------------------------------------------------------

/// Validated, immutable trot gait parameters.
///
/// Re-planning builds a fresh instance; nothing mutates these after a
/// timeline has been generated from them.
#[derive(Debug, Clone, PartialEq)]
pub struct GaitParameters {
    step_vector: Vector3<f64>,
    step_yaw: f64,
    swing_time: f64,
    stance_time: f64,
    swing_start_time: f64,
    cycle_count: u32,
    swing_height: f64,
}

impl GaitParameters {
    /// Build from a [`GaitConfig`], rejecting inconsistent values.
    pub fn from_config(config: &GaitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            step_vector: Vector3::from(config.step_vector),
            step_yaw: config.step_yaw,
            swing_time: config.swing_time,
            stance_time: config.stance_time,
            swing_start_time: config.swing_start_time,
            cycle_count: config.cycle_count,
            swing_height: config.swing_height,
        })
    }

    /// Displacement per full stride, world frame.
    #[must_use]
    pub const fn step_vector(&self) -> Vector3<f64> {
        self.step_vector
    }

    /// Yaw rotation per full stride, radians.
    #[must_use]
    pub const fn step_yaw(&self) -> f64 {
        self.step_yaw
    }

    /// Swing phase duration, seconds.
    #[must_use]
    pub const fn swing_time(&self) -> f64 {
        self.swing_time
    }

    /// Double-support duration, seconds.
    #[must_use]
    pub const fn stance_time(&self) -> f64 {
        self.stance_time
    }

    /// First liftoff time relative to the timeline origin, seconds.
    #[must_use]
    pub const fn swing_start_time(&self) -> f64 {
        self.swing_start_time
    }

    /// Number of full strides in a planned timeline.
    #[must_use]
    pub const fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    /// Peak swing foot height above ground, meters.
    #[must_use]
    pub const fn swing_height(&self) -> f64 {
        self.swing_height
    }

    /// Duration of one full stride: two swings and two double supports.
    #[must_use]
    pub fn stride_period(&self) -> f64 {
        2.0 * (self.swing_time + self.stance_time)
    }

    /// Half-stride period: one swing plus one double support. This is
    /// the period of the foot-reference phase.
    #[must_use]
    pub fn half_stride(&self) -> f64 {
        self.swing_time + self.stance_time
    }

    /// End of the planned horizon when the first liftoff is at `lift0`.
    #[must_use]
    pub fn horizon_end(&self, lift0: f64) -> f64 {
        lift0 + f64::from(self.cycle_count) * self.stride_period()
    }

    /// Commanded horizontal CoM velocity: one stride of displacement
    /// per stride period.
    #[must_use]
    pub fn commanded_velocity(&self) -> Vector3<f64> {
        self.step_vector / self.stride_period()
    }

    /// Commanded yaw rate.
    #[must_use]
    pub fn commanded_yaw_rate(&self) -> f64 {
        self.step_yaw / self.stride_period()
    }

    /// Events a freshly planned timeline can need: the initial stance
    /// plus four configuration changes per stride. Merging at
    /// `stance_time = 0` only ever reduces this.
    #[must_use]
    pub fn required_events(&self) -> usize {
        1 + 4 * self.cycle_count as usize
    }
}

// ---------------------------------------------------------------------------
// TrotTimelinePlanner
// ---------------------------------------------------------------------------

/// Stateless planner producing trot contact sequences.
#[derive(Debug, Clone, Default)]
pub struct TrotTimelinePlanner {
    /// Optional override of the event budget; planner-sized when unset.
    pub max_events: Option<usize>,
}

impl TrotTimelinePlanner {
    /// Planner with a default, parameter-sized event budget.
    #[must_use]
    pub const fn new() -> Self {
        Self { max_events: None }
    }

    /// Planner with an explicit event budget.
    #[must_use]
    pub const fn with_max_events(max_events: usize) -> Self {
        Self {
            max_events: Some(max_events),
        }
    }

    /// Plan a timeline of `cycle_count` strides.
    ///
    /// The initial full-stance event sits at `t_start`; the first
    /// liftoff at `t_start + swing_start_time`. Each stride swings
    /// [`DiagonalPair::LhRf`] then [`DiagonalPair::LfRh`]; the first
    /// LhRf step covers half a stride so the pattern starts symmetric.
    pub fn plan(
        &self,
        params: &GaitParameters,
        t_start: f64,
        footholds: [Vector3<f64>; NUM_CONTACTS],
    ) -> Result<ContactSequence, PlanError> {
        self.plan_with_cursor(params, t_start, footholds)
            .map(|(seq, _)| seq)
    }

    /// Like [`plan`](Self::plan), but also returns the cursor positioned
    /// after the last planned stride, ready to extend the sequence as
    /// the horizon rolls forward.
    pub fn plan_with_cursor(
        &self,
        params: &GaitParameters,
        t_start: f64,
        footholds: [Vector3<f64>; NUM_CONTACTS],
    ) -> Result<(ContactSequence, StrideCursor), PlanError> {
        let max_events = self.max_events.unwrap_or_else(|| params.required_events());
        let mut seq = ContactSequence::new(max_events);
        seq.init(t_start, ContactState::standing(footholds));

        let mut cursor = StrideCursor::new(footholds, t_start + params.swing_start_time());
        for _ in 0..params.cycle_count() {
            cursor.push_next(&mut seq, params)?;
        }
        Ok((seq, cursor))
    }
}

// ---------------------------------------------------------------------------
// StrideCursor
// ---------------------------------------------------------------------------

/// Cursor over an unbounded trot timeline.
///
/// Folds footholds and accumulated heading through strides; the planner
/// uses it for the initial timeline and the control loop keeps it to
/// append strides as earlier events retire.
#[derive(Debug, Clone)]
pub struct StrideCursor {
    holds: [Vector3<f64>; NUM_CONTACTS],
    heading: f64,
    next_stride: u64,
    lift0: f64,
}

impl StrideCursor {
    /// Cursor at the first stride, lifting off at `lift0`.
    #[must_use]
    pub const fn new(footholds: [Vector3<f64>; NUM_CONTACTS], lift0: f64) -> Self {
        Self {
            holds: footholds,
            heading: 0.0,
            next_stride: 0,
            lift0,
        }
    }

    /// Liftoff time of the next unplanned stride.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn next_liftoff(&self, params: &GaitParameters) -> f64 {
        self.lift0 + self.next_stride as f64 * params.stride_period()
    }

    /// Footholds as they stand after every planned stride.
    #[must_use]
    pub const fn footholds(&self) -> &[Vector3<f64>; NUM_CONTACTS] {
        &self.holds
    }

    /// Append one stride's four configuration changes to `seq`.
    ///
    /// Each stride swings [`DiagonalPair::LhRf`] then
    /// [`DiagonalPair::LfRh`]; the very first LhRf step covers half a
    /// stride so the pattern starts symmetric.
    pub fn push_next(
        &mut self,
        seq: &mut ContactSequence,
        params: &GaitParameters,
    ) -> Result<(), PlanError> {
        let t_cycle = self.next_liftoff(params);
        let first_fraction = if self.next_stride == 0 { 0.5 } else { 1.0 };

        // Pair A lifts; positions record pre-swing footholds.
        seq.push(t_cycle, ContactState::with_active(&[LF, RH], self.holds))?;

        // Touchdown: A's feet advanced, everyone planted.
        self.holds = advance_pair(
            self.holds,
            DiagonalPair::LhRf,
            params,
            self.heading,
            first_fraction,
        );
        seq.push(t_cycle + params.swing_time(), ContactState::standing(self.holds))?;

        // Pair B lifts after the double support.
        let t_b = t_cycle + params.half_stride();
        seq.push(t_b, ContactState::with_active(&[LH, RF], self.holds))?;

        // Touchdown: B's feet advanced a full step.
        self.holds = advance_pair(self.holds, DiagonalPair::LfRh, params, self.heading, 1.0);
        seq.push(t_b + params.swing_time(), ContactState::standing(self.holds))?;

        self.heading += params.step_yaw();
        self.next_stride += 1;
        Ok(())
    }
}

/// Advance one diagonal pair's footholds by `fraction` of a stride,
/// rotating the step displacement by the accumulated heading. The
/// pre-swing point itself is unchanged by the rotation.
fn advance_pair(
    mut holds: [Vector3<f64>; NUM_CONTACTS],
    pair: DiagonalPair,
    params: &GaitParameters,
    heading: f64,
    fraction: f64,
) -> [Vector3<f64>; NUM_CONTACTS] {
    let step = params.step_vector() * fraction;
    let rot = Rotation2::new(heading + fraction * params.step_yaw());
    let step_xy = rot * Vector2::new(step.x, step.y);
    let delta = Vector3::new(step_xy.x, step_xy.y, step.z);
    for foot in pair.feet() {
        holds[foot] += delta;
    }
    holds
}
