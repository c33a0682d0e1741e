//! Trot MPC demo CLI.
//!
//! Two modes of operation:
//! - `run`: drive the MPC loop against a point-mass simulator and
//!   print tracking statistics
//! - `info`: print workspace crate versions and the default gait

use clap::{Parser, Subcommand};
use nalgebra::{DVector, Vector3};
use tracing::info;

use strider_core::{ControlConfig, GaitConfig, SimTime, StriderError};
use strider_mpc::{
    Actuation, AnalyticOptimizer, ControlCommand, LoopState, MpcController, NUM_CONTACTS,
    RobotModel, RobotState,
};

const GRAVITY: f64 = 9.81;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Gait-synchronized trot MPC.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control loop against the point-mass simulator.
    Run {
        /// Simulated duration in seconds.
        #[arg(short, long, default_value_t = 5.0)]
        duration: f64,

        /// Control configuration TOML; defaults apply when omitted.
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,

        /// Gait configuration TOML; defaults apply when omitted.
        #[arg(short, long)]
        gait: Option<std::path::PathBuf>,

        /// Robot mass in kilograms.
        #[arg(short, long, default_value_t = 30.0)]
        mass: f64,
    },

    /// Print crate information and the default gait.
    Info,
}

// ---------------------------------------------------------------------------
// Point-mass robot
// ---------------------------------------------------------------------------

/// Rigid stance rectangle around a point-mass CoM.
struct PointMassModel {
    mass: f64,
    standing_height: f64,
    half_length: f64,
    half_width: f64,
}

impl RobotModel for PointMassModel {
    fn contact_positions(&self, state: &RobotState) -> [Vector3<f64>; NUM_CONTACTS] {
        let x = state.positions[0];
        let y = state.positions[1];
        [
            Vector3::new(x + self.half_length, y + self.half_width, 0.0), // LF
            Vector3::new(x - self.half_length, y + self.half_width, 0.0), // LH
            Vector3::new(x + self.half_length, y - self.half_width, 0.0), // RF
            Vector3::new(x - self.half_length, y - self.half_width, 0.0), // RH
        ]
    }

    fn com(&self, state: &RobotState) -> Vector3<f64> {
        Vector3::new(state.positions[0], state.positions[1], state.positions[2])
    }

    fn nominal_height(&self) -> f64 {
        self.standing_height
    }

    fn total_weight(&self) -> f64 {
        self.mass * GRAVITY
    }
}

/// Integrates commanded CoM forces at the actuation rate.
struct PointMassSim {
    mass: f64,
    dt: f64,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
}

impl PointMassSim {
    fn new(mass: f64, dt: f64, position: Vector3<f64>) -> Self {
        Self {
            mass,
            dt,
            position,
            velocity: Vector3::zeros(),
        }
    }

    fn state(&self) -> RobotState {
        RobotState {
            positions: DVector::from_vec(vec![
                self.position.x,
                self.position.y,
                self.position.z,
            ]),
            velocities: DVector::from_vec(vec![
                self.velocity.x,
                self.velocity.y,
                self.velocity.z,
            ]),
        }
    }
}

impl Actuation for PointMassSim {
    fn apply(&mut self, _t: f64, command: &ControlCommand) -> RobotState {
        let force = Vector3::new(command.u[0], command.u[1], command.u[2]);
        let accel = force / self.mass - Vector3::new(0.0, 0.0, GRAVITY);
        self.velocity += accel * self.dt;
        self.position += self.velocity * self.dt;
        self.state()
    }
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn run(
    duration: f64,
    config_path: Option<&std::path::Path>,
    gait_path: Option<&std::path::Path>,
    mass: f64,
) -> Result<(), StriderError> {
    let config = match config_path {
        Some(path) => ControlConfig::from_file(path)?,
        None => ControlConfig::default(),
    };
    let gait = match gait_path {
        Some(path) => GaitConfig::from_file(path)?,
        None => GaitConfig::default(),
    };

    let model = PointMassModel {
        mass,
        standing_height: 0.4,
        half_length: 0.35,
        half_width: 0.25,
    };
    let weight = model.total_weight();
    let standing_height = model.nominal_height();
    let mut sim = PointMassSim::new(
        mass,
        config.control_dt,
        Vector3::new(0.0, 0.0, standing_height),
    );
    let control_dt = config.control_dt;

    let mut controller = MpcController::new(config, &gait, model)?;
    let optimizer = AnalyticOptimizer::new(
        40.0 * mass,
        12.0 * mass,
        Vector3::new(0.0, 0.0, weight),
    );
    controller.initialize(optimizer, 0.0, &sim.state())?;
    info!(
        velocity = ?controller.params().commanded_velocity(),
        "loop initialized"
    );

    let mut clock = SimTime::new();
    let mut state = sim.state();
    let mut next_report = 1.0;
    while clock.secs_f64() < duration {
        let t = clock.secs_f64();
        let command = controller.step(t, &state);
        state = sim.apply(t, &command);
        clock.advance_secs(control_dt);

        if clock.secs_f64() >= next_report {
            let com = Vector3::new(state.positions[0], state.positions[1], state.positions[2]);
            println!(
                "t={clock}  com=[{:+.3} {:+.3} {:+.3}]  state={:?}",
                com.x,
                com.y,
                com.z,
                controller.loop_state()
            );
            next_report += 1.0;
        }
    }

    let degraded = controller.loop_state() == LoopState::Degraded;
    let stats = controller.shutdown()?;
    println!(
        "\nran {} ticks over {clock}: solves={}, failed={}, skipped={}, stale={}, retired={}",
        clock.step_count(control_dt),
        stats.solves_installed,
        stats.solves_failed,
        stats.skipped_triggers,
        stats.stale_ticks,
        stats.retired_events,
    );
    if degraded {
        println!("loop finished degraded");
    }
    Ok(())
}

fn run_info() {
    println!("strider v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("crates:");
    println!("  strider-core  {}", env!("CARGO_PKG_VERSION"));
    println!("  strider-mpc   {}", env!("CARGO_PKG_VERSION"));
    println!();
    let gait = GaitConfig::default();
    println!("default gait:");
    println!("  step_vector      = {:?}", gait.step_vector);
    println!("  swing_time       = {}", gait.swing_time);
    println!("  stance_time      = {}", gait.stance_time);
    println!("  swing_start_time = {}", gait.swing_start_time);
    println!("  cycle_count      = {}", gait.cycle_count);
    println!("  swing_height     = {}", gait.swing_height);
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<(), StriderError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Run {
            duration,
            config,
            gait,
            mass,
        }) => run(duration, config.as_deref(), gait.as_deref(), mass),
        Some(Commands::Info) => {
            run_info();
            Ok(())
        }
        None => run(5.0, None, None, 30.0),
    }
}
