//! Tweezer - Optical Tweezer Rig Controller
//!
//! Host binary that runs the experiment loop against a simulated rig.
//! One embassy task per collaborator (camera, stage, SLM, temperature
//! controller) plus the experiment sequencer, all sharing the control
//! state store. The main task supervises device health and shutdown.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use embassy_executor::Spawner;
use embassy_time::Duration;
use static_cell::StaticCell;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tweezer_core::geometry::{Aoi, Displacement};
use tweezer_sim::{
    shared, SampleConfig, SampleModel, SharedSample, SimCamera, SimRecorder, SimSlm, SimStage,
    SimThermostat, ThermostatConfig, ThresholdDetector,
};

use crate::config::{parse_schedule, LoadedSchedule, RigConfig, SimulationConfig};
use crate::store::ControlState;
use crate::tasks::supervisor::StopReason;

/// Embedded default configuration (compiled into the binary)
/// Edit rig.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../rig.toml");

/// Embedded default schedule
const EMBEDDED_SCHEDULE: &str = include_str!("../schedule.toml");

mod channels;
mod config;
mod store;
mod tasks;

// Shared state must live forever for task references
static STATE: StaticCell<ControlState> = StaticCell::new();

#[derive(Parser)]
#[command(name = "tweezer-rig")]
#[command(version)]
#[command(about = "Run an optical tweezer experiment schedule on a simulated rig")]
struct Args {
    /// Rig configuration file (defaults to the embedded rig.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Experiment schedule file (defaults to the embedded schedule.toml)
    #[arg(long, short)]
    schedule: Option<PathBuf>,

    /// Override the simulated sample seed
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    max_runtime_s: Option<u64>,

    /// Wait with tracking off instead of starting the schedule
    #[arg(long)]
    no_autostart: bool,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Tweezer rig starting...");

    match run(spawner, args).await {
        Ok(reason) => {
            info!(?reason, "Tweezer rig stopped");
            process::exit(0);
        }
        Err(e) => {
            error!("Tweezer rig failed: {e:#}");
            process::exit(1);
        }
    }
}

async fn run(spawner: Spawner, args: Args) -> anyhow::Result<StopReason> {
    let mut config = match &args.config {
        Some(path) => RigConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => RigConfig::embedded(EMBEDDED_CONFIG),
    };
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(limit) = args.max_runtime_s {
        config.runtime.max_runtime_s = Some(limit);
    }
    if args.no_autostart {
        config.runtime.autostart = false;
    }

    let loaded = match &args.schedule {
        Some(path) => LoadedSchedule::load(path)
            .with_context(|| format!("loading schedule from {}", path.display()))?,
        None => {
            let loaded = parse_schedule(EMBEDDED_SCHEDULE).context("parsing embedded schedule")?;
            loaded.log("embedded");
            loaded
        }
    };
    if loaded.schedule.is_empty() {
        warn!("Schedule has no steps, the rig will stay idle");
    }

    let sensor = config.camera.model.sensor();
    let sim = config.simulation;
    let sample = build_sample(&sim, sensor);
    info!(
        camera = ?config.camera.model,
        particles = sim.particle_count,
        seed = sim.seed,
        "Simulated rig initialized"
    );

    let camera = tasks::CameraWorker::new(
        SimCamera::new(sample.clone(), sensor),
        ThresholdDetector,
        SimRecorder::new(),
        config.detection,
        sensor,
    );
    let stage = tasks::StageWorker::new(
        SimStage::new(sample.clone(), config.mm_to_pixel())
            .with_encoder(sim.z_encoder)
            .with_z_range(config.stage.z_min_ticks, config.stage.z_max_ticks),
        config.stage,
        config.camera.model,
    );
    let slm = SimSlm::new(sample, config.slm);

    let state: &'static ControlState = STATE.init(ControlState::new(config.slm, sensor, loaded.schedule));

    // Spawn tasks
    spawner.spawn(tasks::camera_task(
        state,
        camera,
        Duration::from_millis(u64::from(config.camera.frame_interval_ms)),
    ))?;
    spawner.spawn(tasks::stage_task(state, stage))?;
    spawner.spawn(tasks::slm_task(
        state,
        slm,
        Duration::from_millis(sim.slm_render_ms),
    ))?;
    if sim.thermostat {
        let thermostat = SimThermostat::new(ThermostatConfig::default());
        spawner.spawn(tasks::temperature_task(
            state,
            tasks::TemperatureWorker::new(thermostat),
        ))?;
    } else {
        warn!("No temperature controller, stability waits are skipped");
    }
    spawner.spawn(tasks::experiment_task(
        state,
        config.runner_config(),
        Duration::from_millis(config.runtime.tick_interval_ms),
    ))?;

    info!("All tasks spawned, rig running");

    if config.runtime.autostart {
        state.set_tracking(true);
    }

    Ok(tasks::supervise(state, config.runtime, sim.thermostat).await)
}

/// Scatter particles over twice the sensor area, centred on the sensor
fn build_sample(sim: &SimulationConfig, sensor: Aoi) -> SharedSample {
    let (w, h) = (sensor.width(), sensor.height());
    let mut model = SampleModel::new(
        SampleConfig {
            particle_count: sim.particle_count,
            spread: Aoi::full(2 * w, 2 * h),
            capture_radius_px: sim.capture_radius_px,
            depth_of_field_ticks: sim.depth_of_field_ticks,
            escape_probability: sim.escape_probability,
        },
        sim.seed,
    );
    model.shift(Displacement::new(-(w as f32) / 2.0, -(h as f32) / 2.0));
    shared(model)
}
