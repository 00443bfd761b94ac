//! Experiment loop task
//!
//! Snapshots the store, runs one sequencer tick on the copy and applies
//! the resulting intents back into the store.

use core::sync::atomic::Ordering;

use embassy_time::{Duration, Ticker};
use tracing::{debug, info, warn};

use tweezer_core::sequencer::{ExperimentRunner, Notice, RunnerConfig, Tick};
use tweezer_core::state::Event;

use crate::store::ControlState;

/// Experiment task
#[embassy_executor::task]
pub async fn experiment_task(state: &'static ControlState, config: RunnerConfig, interval: Duration) {
    let _guard = state.register_task("experiment");
    info!("Experiment task started");

    let mut runner = ExperimentRunner::new(config);
    let mut ticker = Ticker::every(interval);

    while state.is_running() {
        ticker.next().await;
        run_tick(state, &mut runner);
    }

    // Let the sequencer stop recording and send z home
    state.set_tracking(false);
    run_tick(state, &mut runner);
    info!("Experiment task stopped");
}

/// One sequencer cycle against the store
pub fn run_tick(state: &ControlState, runner: &mut ExperimentRunner) -> Tick {
    let snapshot = state.snapshot();
    let tick = runner.tick(&snapshot.observation());

    for notice in &tick.notices {
        log_notice(notice);
    }
    for intent in &tick.intents {
        state.apply(*intent);
    }
    state.set_phase(tick.phase);

    if tick.event == Some(Event::ScheduleFinished) {
        state.schedule_finished.store(true, Ordering::Release);
    }
    tick
}

fn log_notice(notice: &Notice) {
    match *notice {
        Notice::PhaseChanged { from, to } => info!(?from, ?to, "Phase changed"),
        Notice::StepStarted(step) => info!(step, "Schedule step started"),
        Notice::ScheduleFinished => info!("Schedule finished"),
        Notice::WaitTimedOut(kind) => warn!(?kind, "Wait timed out, continuing"),
        Notice::TemperatureUnavailable => {
            warn!("No temperature reading, skipping stability wait")
        }
        Notice::Searching {
            particles,
            occupied,
        } => debug!(particles, occupied, "Searching for particles"),
        Notice::Capturing { trap, particle } => debug!(trap, particle, "Moving particle to trap"),
        Notice::PlannerFallback(error) => debug!(?error, "No planned path, moving directly"),
        Notice::TrapsActivated(active) => info!(active, "Traps activated"),
        Notice::LiftStarted { start_z } => info!(start_z, "Lifting particles"),
        Notice::LiftAborted => warn!("Particle lost during lift"),
        Notice::RecordingStarted { duration_ms } => info!(duration_ms, "Recording started"),
        Notice::RecordingStopped { remaining_ms } => info!(remaining_ms, "Recording stopped"),
    }
}
