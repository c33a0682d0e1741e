use thiserror::Error;

/// Top-level error type for the strider control stack.
#[derive(Debug, Error)]
pub enum StriderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("Solve error: {0}")]
    Solve(#[from] SolveError),
}

/// Configuration errors. Raised before any planning or control starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("{field} must be positive, got {value}")]
    NonPositiveDuration { field: &'static str, value: f64 },

    #[error("cycle_count must be at least 1")]
    InvalidCycleCount,

    #[error("control_dt must be positive, got {0}")]
    ControlDtNotPositive(f64),

    #[error("steps_per_solve must be at least 1")]
    SolveIntervalZero,
}

/// Timeline planning errors. Fatal: the caller must widen the event
/// budget or shorten the gait before any control starts.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PlanError {
    #[error("Contact sequence capacity exceeded: {required} events > max_events {max_events}")]
    CapacityExceeded { required: usize, max_events: usize },

    #[error("Contact event at t={time} not after previous event at t={last}")]
    NonMonotonicEvent { time: f64, last: f64 },

    #[error("Initial time {t0} must precede swing start time {swing_start}")]
    StartAfterLiftoff { t0: f64, swing_start: f64 },
}

/// Optimizer solve errors. Non-fatal after initialization; the first
/// solve failing is fatal because no control law exists yet.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SolveError {
    #[error("Solve did not converge: KKT error {kkt_error} > tolerance {tolerance}")]
    NotConverged { kkt_error: f64, tolerance: f64 },

    #[error("Initial solve failed to converge: KKT error {kkt_error} > tolerance {tolerance}")]
    InitialSolveFailed { kkt_error: f64, tolerance: f64 },

    #[error("Solve worker is no longer running")]
    WorkerGone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strider_error_from_config_error() {
        let err = ConfigError::ControlDtNotPositive(-0.01);
        let top: StriderError = err.into();
        assert!(matches!(top, StriderError::Config(_)));
        assert!(top.to_string().contains("-0.01"));
    }

    #[test]
    fn strider_error_from_plan_error() {
        let err = PlanError::CapacityExceeded {
            required: 13,
            max_events: 8,
        };
        let top: StriderError = err.into();
        assert!(matches!(top, StriderError::Plan(_)));
        assert!(top.to_string().contains("13"));
    }

    #[test]
    fn strider_error_from_solve_error() {
        let err = SolveError::NotConverged {
            kkt_error: 0.5,
            tolerance: 1e-6,
        };
        let top: StriderError = err.into();
        assert!(matches!(top, StriderError::Solve(_)));
    }

    #[test]
    fn config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ConfigError = io_err.into();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn plan_error_is_copy() {
        let err = PlanError::NonMonotonicEvent {
            time: 1.0,
            last: 2.0,
        };
        let err2 = err;
        assert_eq!(err, err2);
    }

    #[test]
    fn plan_error_display_messages() {
        assert_eq!(
            PlanError::CapacityExceeded {
                required: 13,
                max_events: 8
            }
            .to_string(),
            "Contact sequence capacity exceeded: 13 events > max_events 8"
        );
        assert_eq!(
            PlanError::NonMonotonicEvent {
                time: 0.5,
                last: 0.5
            }
            .to_string(),
            "Contact event at t=0.5 not after previous event at t=0.5"
        );
        assert_eq!(
            PlanError::StartAfterLiftoff {
                t0: 1.0,
                swing_start: 0.5
            }
            .to_string(),
            "Initial time 1 must precede swing start time 0.5"
        );
    }

    #[test]
    fn config_error_display_messages() {
        assert_eq!(
            ConfigError::NonPositiveDuration {
                field: "swing_time",
                value: 0.0
            }
            .to_string(),
            "swing_time must be positive, got 0"
        );
        assert_eq!(
            ConfigError::InvalidCycleCount.to_string(),
            "cycle_count must be at least 1"
        );
        assert_eq!(
            ConfigError::SolveIntervalZero.to_string(),
            "steps_per_solve must be at least 1"
        );
        assert_eq!(
            ConfigError::InvalidValue {
                field: "swing_height".into(),
                message: "must be non-negative".into()
            }
            .to_string(),
            "Invalid value for swing_height: must be non-negative"
        );
    }

    #[test]
    fn solve_error_display_messages() {
        assert_eq!(
            SolveError::NotConverged {
                kkt_error: 0.5,
                tolerance: 0.001
            }
            .to_string(),
            "Solve did not converge: KKT error 0.5 > tolerance 0.001"
        );
        assert_eq!(
            SolveError::WorkerGone.to_string(),
            "Solve worker is no longer running"
        );
    }
}
