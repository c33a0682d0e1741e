use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_control_dt() -> f64 {
    0.0025
}
const fn default_steps_per_solve() -> u32 {
    5
}
const fn default_true() -> bool {
    true
}
const fn default_initial_solve_max_iter() -> u32 {
    200
}
const fn default_mpc_solve_max_iter() -> u32 {
    1
}
const fn default_convergence_tolerance() -> f64 {
    1.0e-4
}
const fn default_max_consecutive_failures() -> u32 {
    5
}
const fn default_step_vector() -> [f64; 3] {
    [0.3, 0.0, 0.0]
}
const fn default_swing_time() -> f64 {
    0.25
}
const fn default_stance_time() -> f64 {
    0.1
}
const fn default_swing_start_time() -> f64 {
    0.5
}
const fn default_cycle_count() -> u32 {
    3
}
const fn default_swing_height() -> f64 {
    0.2
}

// ---------------------------------------------------------------------------
// ControlConfig
// ---------------------------------------------------------------------------

/// Control-loop configuration: actuation rate, solve cadence, and
/// convergence handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Actuation tick in seconds (default: 0.0025 = 400 Hz).
    #[serde(default = "default_control_dt")]
    pub control_dt: f64,

    /// Actuation ticks per MPC re-solve (default: 5, giving an 80 Hz
    /// solve rate at the default tick).
    #[serde(default = "default_steps_per_solve")]
    pub steps_per_solve: u32,

    /// Propagate the measured state forward by the solve round-trip
    /// before computing the feedback correction.
    #[serde(default = "default_true")]
    pub feedback_delay_compensation: bool,

    /// Iteration budget for the full-horizon initial solve.
    #[serde(default = "default_initial_solve_max_iter")]
    pub initial_solve_max_iter: u32,

    /// Iteration budget per re-solve.
    #[serde(default = "default_mpc_solve_max_iter")]
    pub mpc_solve_max_iter: u32,

    /// KKT error below which a solve counts as converged.
    #[serde(default = "default_convergence_tolerance")]
    pub convergence_tolerance: f64,

    /// Consecutive non-converged solves before the loop is Degraded.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            control_dt: default_control_dt(),
            steps_per_solve: default_steps_per_solve(),
            feedback_delay_compensation: true,
            initial_solve_max_iter: default_initial_solve_max_iter(),
            mpc_solve_max_iter: default_mpc_solve_max_iter(),
            convergence_tolerance: default_convergence_tolerance(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl ControlConfig {
    /// Validate configuration. Returns `Err` on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_dt <= 0.0 {
            return Err(ConfigError::ControlDtNotPositive(self.control_dt));
        }
        if self.steps_per_solve == 0 {
            return Err(ConfigError::SolveIntervalZero);
        }
        if self.convergence_tolerance <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "convergence_tolerance".into(),
                message: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Actuation rate in Hz.
    #[must_use]
    pub fn control_hz(&self) -> f64 {
        1.0 / self.control_dt
    }

    /// Solve rate in Hz.
    #[must_use]
    pub fn solve_hz(&self) -> f64 {
        self.control_hz() / f64::from(self.steps_per_solve)
    }

    /// Round-trip solve latency compensated by the feedback path.
    #[must_use]
    pub fn solve_delay(&self) -> f64 {
        f64::from(self.steps_per_solve) * self.control_dt
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// GaitConfig
// ---------------------------------------------------------------------------

/// Trot gait parameters as supplied at startup.
///
/// This is the serde-facing form; planners consume the validated
/// `GaitParameters` built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaitConfig {
    /// Displacement per full stride, world frame [x, y, z] in meters.
    #[serde(default = "default_step_vector")]
    pub step_vector: [f64; 3],

    /// Yaw rotation per full stride in radians.
    #[serde(default)]
    pub step_yaw: f64,

    /// Duration of one swing phase in seconds.
    #[serde(default = "default_swing_time")]
    pub swing_time: f64,

    /// Duration of one double-support phase in seconds.
    #[serde(default = "default_stance_time")]
    pub stance_time: f64,

    /// Time of the first liftoff, seconds after the timeline origin.
    #[serde(default = "default_swing_start_time")]
    pub swing_start_time: f64,

    /// Number of full strides in the planned timeline.
    #[serde(default = "default_cycle_count")]
    pub cycle_count: u32,

    /// Peak foot height above ground at mid-swing, meters.
    #[serde(default = "default_swing_height")]
    pub swing_height: f64,

    /// Event-count bound for the planned contact sequence. When unset,
    /// the planner sizes it from `cycle_count`.
    #[serde(default)]
    pub max_events: Option<usize>,
}

impl Default for GaitConfig {
    fn default() -> Self {
        Self {
            step_vector: default_step_vector(),
            step_yaw: 0.0,
            swing_time: default_swing_time(),
            stance_time: default_stance_time(),
            swing_start_time: default_swing_start_time(),
            cycle_count: default_cycle_count(),
            swing_height: default_swing_height(),
            max_events: None,
        }
    }
}

impl GaitConfig {
    /// Validate configuration. Returns `Err` on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.swing_time <= 0.0 {
            return Err(ConfigError::NonPositiveDuration {
                field: "swing_time",
                value: self.swing_time,
            });
        }
        if self.stance_time < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "stance_time".into(),
                message: format!("must be non-negative, got {}", self.stance_time),
            });
        }
        if self.swing_start_time <= 0.0 {
            return Err(ConfigError::NonPositiveDuration {
                field: "swing_start_time",
                value: self.swing_start_time,
            });
        }
        if self.cycle_count == 0 {
            return Err(ConfigError::InvalidCycleCount);
        }
        if self.swing_height < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "swing_height".into(),
                message: format!("must be non-negative, got {}", self.swing_height),
            });
        }
        Ok(())
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- ControlConfig ----

    #[test]
    fn control_config_default_values() {
        let cfg = ControlConfig::default();
        assert!((cfg.control_dt - 0.0025).abs() < f64::EPSILON);
        assert_eq!(cfg.steps_per_solve, 5);
        assert!(cfg.feedback_delay_compensation);
        assert_eq!(cfg.initial_solve_max_iter, 200);
        assert_eq!(cfg.mpc_solve_max_iter, 1);
        assert_eq!(cfg.max_consecutive_failures, 5);
    }

    #[test]
    fn control_config_rates() {
        let cfg = ControlConfig::default();
        assert!((cfg.control_hz() - 400.0).abs() < 1e-9);
        assert!((cfg.solve_hz() - 80.0).abs() < 1e-9);
        assert!((cfg.solve_delay() - 0.0125).abs() < 1e-12);
    }

    #[test]
    fn control_config_validate_ok() {
        assert!(ControlConfig::default().validate().is_ok());
    }

    #[test]
    fn control_config_validate_bad_dt() {
        let cfg = ControlConfig {
            control_dt: 0.0,
            ..ControlConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::ControlDtNotPositive(_)
        ));
    }

    #[test]
    fn control_config_validate_zero_interval() {
        let cfg = ControlConfig {
            steps_per_solve: 0,
            ..ControlConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::SolveIntervalZero
        ));
    }

    #[test]
    fn control_config_toml_defaults() {
        let cfg: ControlConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, ControlConfig::default());
    }

    #[test]
    fn control_config_toml_override() {
        let cfg: ControlConfig = toml::from_str(
            r"
            control_dt = 0.005
            steps_per_solve = 10
            feedback_delay_compensation = false
        ",
        )
        .unwrap();
        assert!((cfg.control_dt - 0.005).abs() < f64::EPSILON);
        assert_eq!(cfg.steps_per_solve, 10);
        assert!(!cfg.feedback_delay_compensation);
    }

    // ---- GaitConfig ----

    #[test]
    fn gait_config_default_values() {
        let cfg = GaitConfig::default();
        assert_eq!(cfg.step_vector, [0.3, 0.0, 0.0]);
        assert!((cfg.swing_time - 0.25).abs() < f64::EPSILON);
        assert!((cfg.stance_time - 0.1).abs() < f64::EPSILON);
        assert_eq!(cfg.cycle_count, 3);
        assert!(cfg.max_events.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn gait_config_rejects_zero_swing_time() {
        let cfg = GaitConfig {
            swing_time: 0.0,
            ..GaitConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::NonPositiveDuration {
                field: "swing_time",
                ..
            }
        ));
    }

    #[test]
    fn gait_config_rejects_negative_stance_time() {
        let cfg = GaitConfig {
            stance_time: -0.1,
            ..GaitConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn gait_config_accepts_zero_stance_time() {
        let cfg = GaitConfig {
            stance_time: 0.0,
            ..GaitConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn gait_config_rejects_zero_cycles() {
        let cfg = GaitConfig {
            cycle_count: 0,
            ..GaitConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::InvalidCycleCount
        ));
    }

    #[test]
    fn gait_config_toml_deserialization() {
        let cfg: GaitConfig = toml::from_str(
            r"
            step_vector = [0.15, 0.0, 0.0]
            step_yaw = 0.26
            swing_time = 0.5
            stance_time = 0.04
            cycle_count = 3
            max_events = 16
        ",
        )
        .unwrap();
        assert_eq!(cfg.step_vector, [0.15, 0.0, 0.0]);
        assert!((cfg.step_yaw - 0.26).abs() < f64::EPSILON);
        assert!((cfg.swing_time - 0.5).abs() < f64::EPSILON);
        assert_eq!(cfg.max_events, Some(16));
    }

    #[test]
    fn gait_config_from_file() {
        let dir = std::env::temp_dir().join("strider_test_gait_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gait.toml");
        std::fs::write(
            &path,
            r"
            swing_time = 0.3
            stance_time = 0.05
            cycle_count = 4
        ",
        )
        .unwrap();

        let cfg = GaitConfig::from_file(&path).unwrap();
        assert!((cfg.swing_time - 0.3).abs() < f64::EPSILON);
        assert_eq!(cfg.cycle_count, 4);

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir(&dir);
    }

    #[test]
    fn gait_config_from_file_invalid() {
        let dir = std::env::temp_dir().join("strider_test_gait_config_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gait.toml");
        std::fs::write(&path, "swing_time = -0.5").unwrap();

        assert!(GaitConfig::from_file(&path).is_err());

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir(&dir);
    }
}
