//! Stage task
//!
//! Executes queued stage moves in order, returns z home when asked and
//! keeps the reported position in the store fresh.

use core::sync::atomic::Ordering;

use embassy_futures::select::select;
use embassy_time::{Duration, Timer};
use tracing::{debug, info, warn};

use tweezer_core::config::{CameraModel, StageAxes};
use tweezer_core::traits::{StageDriver, StageError};
use tweezer_sim::SimStage;

use crate::channels::STAGE_WAKE;
use crate::store::{ControlState, StageCommand};

/// Position refresh period while idle
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Stage driver plus the z bookkeeping a missing encoder needs
pub struct StageWorker<S> {
    stage: S,
    axes: StageAxes,
    camera: CameraModel,
    /// z at start-up
    home_z: i32,
    /// Last commanded z
    commanded_z: i32,
}

pub type SimStageWorker = StageWorker<SimStage>;

impl<S: StageDriver> StageWorker<S> {
    pub fn new(stage: S, axes: StageAxes, camera: CameraModel) -> Self {
        let home_z = stage.position().ok().and_then(|p| p.z_ticks).unwrap_or(0);
        Self {
            stage,
            axes,
            camera,
            home_z,
            commanded_z: home_z,
        }
    }

    pub fn execute(&mut self, command: StageCommand) -> Result<(), StageError> {
        match command {
            StageCommand::MoveXy(d) => {
                let (dx_mm, dy_mm) = self.axes.pixels_to_mm(self.camera, d.dx, d.dy);
                self.stage.move_xy(dx_mm, dy_mm)?;
                debug!(dx_mm, dy_mm, "Stage moved");
            }
            StageCommand::LiftZ(ticks) => {
                let target = self.axes.clamp_z(self.commanded_z.saturating_add(ticks));
                if target != self.commanded_z {
                    self.stage.move_z_by(target - self.commanded_z)?;
                    self.commanded_z = target;
                }
                debug!(z = target, "Objective moved");
            }
        }
        Ok(())
    }

    /// Move z back to where it started
    pub fn return_home(&mut self) -> Result<(), StageError> {
        if self.commanded_z != self.home_z {
            self.stage.move_z_to(self.home_z)?;
            self.commanded_z = self.home_z;
            info!(z = self.home_z, "Objective returned home");
        }
        Ok(())
    }

    /// Publish the current position
    pub fn refresh(&mut self, state: &ControlState) {
        match self.stage.position() {
            Ok(position) => {
                if let Some(z) = position.z_ticks {
                    self.commanded_z = z;
                }
                state.update_stage(position);
            }
            Err(e) => {
                debug!(error = ?e, "Stage position unavailable");
                state.set_stage_connected(false);
            }
        }
    }

    /// Drain the queue, then handle a pending return home
    pub fn service(&mut self, state: &ControlState) {
        while let Some(command) = state.next_stage_command() {
            if let Err(e) = self.execute(command) {
                warn!(?command, error = ?e, "Stage command failed");
            }
        }
        if state.return_z_home.swap(false, Ordering::AcqRel) {
            if let Err(e) = self.return_home() {
                warn!(error = ?e, "Failed to return z home");
            }
        }
        self.refresh(state);
    }
}

/// Stage task
#[embassy_executor::task]
pub async fn stage_task(state: &'static ControlState, mut worker: SimStageWorker) {
    let _guard = state.register_task("stage");
    info!("Stage task started");

    worker.refresh(state);
    while state.is_running() {
        select(STAGE_WAKE.wait(), Timer::after(POLL_INTERVAL)).await;
        worker.service(state);
    }

    if let Err(e) = worker.return_home() {
        warn!(error = ?e, "Failed to return z home on exit");
    }
    info!("Stage task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweezer_core::experiment::ExperimentSchedule;
    use tweezer_core::geometry::{Aoi, Displacement, Point, SlmCalibration};
    use tweezer_core::sequencer::Intent;
    use tweezer_sim::{shared, SampleConfig, SampleModel, SharedSample};

    fn setup(encoder: bool) -> (ControlState, SimStageWorker, SharedSample) {
        let sample = shared(SampleModel::with_particles(
            SampleConfig::default(),
            &[Point::new(100.0, 100.0)],
        ));
        let stage = SimStage::new(sample.clone(), CameraModel::Basler.mm_to_pixel())
            .with_encoder(encoder);
        let axes = StageAxes {
            z_min_ticks: -500,
            z_max_ticks: 500,
            ..StageAxes::default()
        };
        let worker = StageWorker::new(stage, axes, CameraModel::Basler);
        let state = ControlState::new(
            SlmCalibration::default(),
            Aoi::full(672, 512),
            ExperimentSchedule::default(),
        );
        (state, worker, sample)
    }

    #[test]
    fn test_pixel_move_shifts_the_sample() {
        let (state, mut worker, sample) = setup(true);
        state.apply(Intent::MoveStage(Displacement::new(30.0, -20.0)));
        worker.service(&state);

        let visible = sample.lock(|s| s.borrow().visible_particles());
        assert!((visible[0].x - 130.0).abs() < 0.01);
        assert!((visible[0].y - 80.0).abs() < 0.01);
        assert!(state.connectivity().stage);
    }

    #[test]
    fn test_lift_is_clamped_to_travel() {
        let (state, mut worker, _) = setup(true);
        state.apply(Intent::LiftZ(400));
        state.apply(Intent::LiftZ(400));
        worker.service(&state);
        assert_eq!(worker.commanded_z, 500);
        assert_eq!(state.snapshot().stage.z_ticks, Some(500));
    }

    #[test]
    fn test_return_home_after_queue() {
        let (state, mut worker, _) = setup(true);
        state.apply(Intent::LiftZ(120));
        state.apply(Intent::ReturnZHome);
        worker.service(&state);

        assert_eq!(worker.commanded_z, 0);
        assert_eq!(state.snapshot().stage.z_ticks, Some(0));
        assert!(!state.return_z_home.load(Ordering::Acquire));
    }

    #[test]
    fn test_without_encoder_tracks_commanded_z() {
        let (state, mut worker, sample) = setup(false);
        state.apply(Intent::LiftZ(80));
        worker.service(&state);

        assert_eq!(worker.commanded_z, 80);
        assert_eq!(sample.lock(|s| s.borrow().z()), 80);
        assert_eq!(state.snapshot().stage.z_ticks, None);
    }

    #[test]
    fn test_disconnected_stage_is_reported() {
        let (state, mut worker, _) = setup(true);
        worker.refresh(&state);
        assert!(state.connectivity().stage);

        worker.stage.set_connected(false);
        state.apply(Intent::MoveStage(Displacement::new(5.0, 0.0)));
        worker.service(&state);
        assert!(!state.connectivity().stage);
        assert!(state.next_stage_command().is_none());
    }
}
