//! Gait-synchronized contact scheduling and MPC control loop for
//! trotting quadrupeds.
//!
//! The pipeline mirrors the classic receding-horizon trot stack:
//!
//! 1. **Contact schedule** — a [`ContactSequence`] of discrete contact
//!    configuration changes over the planning horizon
//! 2. **Timeline planner** — [`TrotTimelinePlanner`] folds footholds
//!    through alternating diagonal-pair strides
//! 3. **Periodic references** — closed-form foot swing curves and a
//!    constant-velocity CoM reference ([`ReferenceSet`])
//! 4. **Control loop** — [`MpcController`] runs solves on a worker
//!    thread and actuates a time-indexed affine [`FeedbackPolicy`]
//!
//! The trajectory optimizer itself is a black box behind
//! [`TrajectoryOptimizer`]; [`AnalyticOptimizer`] is a closed-form
//! stand-in over point-mass CoM dynamics.

pub mod contact;
pub mod controller;
pub mod gait;
pub mod optimizer;
pub mod policy;
pub mod reference;

pub use contact::{
    ContactEvent, ContactId, ContactSequence, ContactState, EVENT_MERGE_EPS, LF, LH,
    NUM_CONTACTS, RF, RH,
};
pub use controller::{LoopState, LoopStats, MpcController};
pub use gait::{DiagonalPair, GaitParameters, StrideCursor, TrotTimelinePlanner};
pub use optimizer::{
    Actuation, AnalyticOptimizer, ConvergenceDiagnostics, RobotModel, SolveRequest,
    TrajectoryOptimizer,
};
pub use policy::{
    ControlCommand, FeedbackPolicy, PolicySolution, RobotState, compensate_delay,
};
pub use reference::{PeriodicComRef, PeriodicFootRef, ReferenceSet};
