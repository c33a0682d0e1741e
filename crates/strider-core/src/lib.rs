// strider-core: Clock, configuration, and error types for the strider control stack.

pub mod config;
pub mod error;
pub mod time;

pub use config::{ControlConfig, GaitConfig};
pub use error::{ConfigError, PlanError, SolveError, StriderError};
pub use time::{SimTime, SolveCadence};
