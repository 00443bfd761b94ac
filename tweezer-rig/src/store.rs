//! Control state store
//!
//! Process-wide state shared between the rig tasks. Each field group sits
//! behind its own blocking mutex that is held only to copy values in or
//! out; the experiment task plans on a copied [`Snapshot`], so camera
//! ingestion never waits for the planner. Phase flags are atomics.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;
use heapless::Deque;
use tracing::{debug, info, warn};

use tweezer_core::experiment::{
    DeviceTrap, ExperimentParameters, ExperimentSchedule, TrapLayout,
};
use tweezer_core::geometry::{Aoi, Displacement, Point, SlmCalibration};
use tweezer_core::sequencer::{Intent, Observation};
use tweezer_core::state::Phase;
use tweezer_core::traits::{HologramSettings, SnapshotLabel, StagePosition, TemperatureReading};

use crate::channels::{PHASEMASK_REQUEST, STAGE_WAKE};

/// Pending commands per queue
const QUEUE_DEPTH: usize = 8;

type Group<T> = Mutex<CriticalSectionRawMutex, RefCell<T>>;

/// Stage work queued by the experiment task
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageCommand {
    /// Shift the sample so particles move by this many pixels
    MoveXy(Displacement),
    /// Relative z move (ticks)
    LiftZ(i32),
}

/// Camera and recorder work queued by the experiment task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraCommand {
    ZoomIn(Aoi),
    ZoomOut,
    StartRecording,
    StopRecording,
    Snapshot(SnapshotLabel),
}

/// Trap geometry and the live parameter set
#[derive(Debug, Clone, Default)]
pub struct GeometryState {
    pub params: ExperimentParameters,
    pub layout: TrapLayout,
    pub calibration: SlmCalibration,
}

/// Latest detections with the AOI they were measured in
#[derive(Debug, Clone)]
pub struct Detections {
    /// AOI-relative particle centres
    pub particles: Vec<Point>,
    pub aoi: Aoi,
    /// Store time of the frame (ms)
    pub frame_ms: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct StageState {
    pub position: StagePosition,
    /// First position reported after start-up
    pub start: Option<StagePosition>,
    pub connected: bool,
    pub pending: Deque<StageCommand, QUEUE_DEPTH>,
}

#[derive(Debug, Clone, Default)]
pub struct CameraState {
    pub pending: Deque<CameraCommand, QUEUE_DEPTH>,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemperatureState {
    /// None while no controller answers
    pub reading: Option<TemperatureReading>,
    pub connected: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleState {
    /// Fixed for the whole run, shared with every snapshot
    pub schedule: Arc<ExperimentSchedule>,
    pub progress: usize,
    /// Seconds of the running recording
    pub runtime_s: u64,
    pub phase: Phase,
}

/// Owned copy of everything one sequencer tick reads
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub now_ms: u64,
    pub tracking_on: bool,
    pub schedule: Arc<ExperimentSchedule>,
    pub geometry: GeometryState,
    pub detections: Detections,
    pub stage: StagePosition,
    pub stage_start: StagePosition,
    pub temperature: Option<TemperatureReading>,
    pub phasemask_pending: bool,
}

impl Snapshot {
    pub fn observation(&self) -> Observation<'_> {
        Observation {
            now_ms: self.now_ms,
            tracking_on: self.tracking_on,
            schedule: &self.schedule,
            params: &self.geometry.params,
            layout: &self.geometry.layout,
            calibration: self.geometry.calibration,
            aoi: self.detections.aoi,
            particles: &self.detections.particles,
            stage: self.stage,
            stage_start: self.stage_start,
            temperature: self.temperature,
            phasemask_pending: self.phasemask_pending,
        }
    }
}

/// Connectivity as last reported by the device tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity {
    pub stage: bool,
    pub thermostat: bool,
    pub slm: bool,
    pub camera: bool,
    pub last_frame_ms: Option<u64>,
}

/// Shared rig state
pub struct ControlState {
    pub program_running: AtomicBool,
    pub tracking_on: AtomicBool,
    pub recording: AtomicBool,
    pub phasemask_pending: AtomicBool,
    pub return_z_home: AtomicBool,
    /// The last schedule step has finished
    pub schedule_finished: AtomicBool,
    /// Bumped on every phase mask request
    phasemask_generation: AtomicUsize,
    slm_connected: AtomicBool,
    live_tasks: AtomicUsize,
    started: Instant,
    geometry: Group<GeometryState>,
    detections: Group<Detections>,
    stage: Group<StageState>,
    camera: Group<CameraState>,
    temperature: Group<TemperatureState>,
    schedule: Group<ScheduleState>,
}

impl ControlState {
    pub fn new(calibration: SlmCalibration, sensor: Aoi, schedule: ExperimentSchedule) -> Self {
        Self {
            program_running: AtomicBool::new(true),
            tracking_on: AtomicBool::new(false),
            recording: AtomicBool::new(false),
            phasemask_pending: AtomicBool::new(false),
            return_z_home: AtomicBool::new(false),
            schedule_finished: AtomicBool::new(false),
            phasemask_generation: AtomicUsize::new(0),
            slm_connected: AtomicBool::new(true),
            live_tasks: AtomicUsize::new(0),
            started: Instant::now(),
            geometry: Mutex::new(RefCell::new(GeometryState {
                calibration,
                ..GeometryState::default()
            })),
            detections: Mutex::new(RefCell::new(Detections {
                particles: Vec::new(),
                aoi: sensor,
                frame_ms: None,
            })),
            stage: Mutex::new(RefCell::new(StageState::default())),
            camera: Mutex::new(RefCell::new(CameraState::default())),
            temperature: Mutex::new(RefCell::new(TemperatureState::default())),
            schedule: Mutex::new(RefCell::new(ScheduleState {
                schedule: Arc::new(schedule),
                ..ScheduleState::default()
            })),
        }
    }

    /// Milliseconds since the store was created
    pub fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis()
    }

    pub fn is_running(&self) -> bool {
        self.program_running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.program_running.store(false, Ordering::Release);
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking_on.load(Ordering::Acquire)
    }

    pub fn set_tracking(&self, on: bool) {
        if self.tracking_on.swap(on, Ordering::AcqRel) != on {
            info!(tracking = on, "Tracking switched");
        }
    }

    /// Register a running task; it deregisters when the guard drops
    pub fn register_task(&self, name: &'static str) -> TaskGuard<'_> {
        self.live_tasks.fetch_add(1, Ordering::AcqRel);
        TaskGuard { state: self, name }
    }

    pub fn live_tasks(&self) -> usize {
        self.live_tasks.load(Ordering::Acquire)
    }

    // --- Snapshots -------------------------------------------------------

    /// Copy the state one sequencer tick needs
    pub fn snapshot(&self) -> Snapshot {
        let (stage, stage_start) = self.stage.lock(|s| {
            let s = s.borrow();
            (s.position, s.start.unwrap_or(s.position))
        });
        Snapshot {
            now_ms: self.now_ms(),
            tracking_on: self.is_tracking(),
            schedule: self.schedule.lock(|s| Arc::clone(&s.borrow().schedule)),
            geometry: self.geometry.lock(|g| g.borrow().clone()),
            detections: self.detections.lock(|d| d.borrow().clone()),
            stage,
            stage_start,
            temperature: self.temperature.lock(|t| t.borrow().reading),
            phasemask_pending: self.phasemask_pending.load(Ordering::Acquire),
        }
    }

    /// Traps and beam settings for the next phase mask
    pub fn hologram_input(&self) -> (Vec<DeviceTrap>, HologramSettings) {
        self.geometry.lock(|g| {
            let g = g.borrow();
            (g.layout.active_traps(), HologramSettings::from(&g.params))
        })
    }

    /// Setpoint and output switch requested by the current step
    pub fn temperature_request(&self) -> (f32, bool) {
        self.geometry.lock(|g| {
            let p = &g.borrow().params;
            (p.setpoint_temperature_c, p.temperature_output_on)
        })
    }

    /// Name for recordings and snapshots of the current step
    pub fn measurement_name(&self) -> String {
        let name = self.geometry.lock(|g| g.borrow().params.measurement_name.clone());
        if name.is_empty() {
            format!("step_{}", self.progress())
        } else {
            name.as_str().to_owned()
        }
    }

    pub fn progress(&self) -> usize {
        self.schedule.lock(|s| s.borrow().progress)
    }

    pub fn runtime_s(&self) -> u64 {
        self.schedule.lock(|s| s.borrow().runtime_s)
    }

    pub fn phase(&self) -> Phase {
        self.schedule.lock(|s| s.borrow().phase)
    }

    pub fn schedule_len(&self) -> usize {
        self.schedule.lock(|s| s.borrow().schedule.len())
    }

    pub fn set_phase(&self, phase: Phase) {
        self.schedule.lock(|s| s.borrow_mut().phase = phase);
    }

    pub fn connectivity(&self) -> Connectivity {
        Connectivity {
            stage: self.stage.lock(|s| s.borrow().connected),
            thermostat: self.temperature.lock(|t| t.borrow().connected),
            slm: self.slm_connected.load(Ordering::Acquire),
            camera: self.camera.lock(|c| c.borrow().connected),
            last_frame_ms: self.detections.lock(|d| d.borrow().frame_ms),
        }
    }

    // --- Sensor updates --------------------------------------------------

    pub fn update_detections(&self, particles: Vec<Point>, aoi: Aoi) {
        let now = self.now_ms();
        self.detections.lock(|d| {
            *d.borrow_mut() = Detections {
                particles,
                aoi,
                frame_ms: Some(now),
            };
        });
    }

    pub fn set_camera_connected(&self, connected: bool) {
        self.camera.lock(|c| c.borrow_mut().connected = connected);
    }

    /// Record the stage position; the first report becomes the start
    pub fn update_stage(&self, position: StagePosition) {
        self.stage.lock(|s| {
            let mut s = s.borrow_mut();
            s.start.get_or_insert(position);
            s.position = position;
            s.connected = true;
        });
    }

    pub fn set_stage_connected(&self, connected: bool) {
        self.stage.lock(|s| s.borrow_mut().connected = connected);
    }

    pub fn update_temperature(&self, reading: Option<TemperatureReading>) {
        self.temperature.lock(|t| {
            *t.borrow_mut() = TemperatureState {
                reading,
                connected: reading.is_some(),
            };
        });
    }

    pub fn set_slm_connected(&self, connected: bool) {
        self.slm_connected.store(connected, Ordering::Release);
    }

    pub fn phasemask_generation(&self) -> usize {
        self.phasemask_generation.load(Ordering::Acquire)
    }

    /// Mark the mask for `generation` as displayed
    ///
    /// A request that arrived during the render keeps the flag raised.
    pub fn finish_phasemask(&self, generation: usize) {
        if self.phasemask_generation() == generation {
            self.phasemask_pending.store(false, Ordering::Release);
        }
    }

    // --- Command queues --------------------------------------------------

    pub fn next_stage_command(&self) -> Option<StageCommand> {
        self.stage.lock(|s| s.borrow_mut().pending.pop_front())
    }

    pub fn next_camera_command(&self) -> Option<CameraCommand> {
        self.camera.lock(|c| c.borrow_mut().pending.pop_front())
    }

    fn queue_stage(&self, command: StageCommand) {
        let queued = self.stage.lock(|s| s.borrow_mut().pending.push_back(command).is_ok());
        if queued {
            STAGE_WAKE.signal(());
        } else {
            warn!(?command, "Stage queue full, command dropped");
        }
    }

    fn queue_camera(&self, command: CameraCommand) {
        let queued = self.camera.lock(|c| c.borrow_mut().pending.push_back(command).is_ok());
        if !queued {
            warn!(?command, "Camera queue full, command dropped");
        }
    }

    fn request_phasemask(&self) {
        self.phasemask_generation.fetch_add(1, Ordering::AcqRel);
        self.phasemask_pending.store(true, Ordering::Release);
        PHASEMASK_REQUEST.signal(());
    }

    // --- Intents ---------------------------------------------------------

    /// Carry out one sequencer intent
    pub fn apply(&self, intent: Intent) {
        match intent {
            Intent::ApplyStep(index) => self.apply_step(index),
            Intent::ActivateTraps(n) => {
                let active = self.geometry.lock(|g| g.borrow_mut().layout.set_active(n));
                debug!(active, "Traps activated");
                self.request_phasemask();
            }
            Intent::AddGhostTraps(index) => {
                let spec = self
                    .schedule
                    .lock(|s| s.borrow().schedule.get(index).and_then(|step| step.ghosts.clone()));
                let Some(spec) = spec else {
                    warn!(step = index, "Step has no ghost traps");
                    return;
                };
                let count = self.geometry.lock(|g| {
                    let g = &mut *g.borrow_mut();
                    let ghosts = spec.to_device(&g.calibration);
                    g.layout.add_ghosts(&ghosts);
                    ghosts.len()
                });
                info!(step = index, count, "Ghost traps added");
                self.request_phasemask();
            }
            Intent::ClearGhostTraps => {
                let had_ghosts = self.geometry.lock(|g| {
                    let mut g = g.borrow_mut();
                    let had = g.layout.ghost_count() > 0;
                    g.layout.clear_ghosts();
                    had
                });
                if had_ghosts {
                    self.request_phasemask();
                }
            }
            Intent::MoveStage(d) => self.queue_stage(StageCommand::MoveXy(d)),
            Intent::LiftZ(ticks) => self.queue_stage(StageCommand::LiftZ(ticks)),
            Intent::ReturnZHome => {
                self.return_z_home.store(true, Ordering::Release);
                STAGE_WAKE.signal(());
            }
            Intent::SetRecording(on) => {
                self.recording.store(on, Ordering::Release);
                self.queue_camera(if on {
                    CameraCommand::StartRecording
                } else {
                    CameraCommand::StopRecording
                });
            }
            Intent::ZoomIn(aoi) => self.queue_camera(CameraCommand::ZoomIn(aoi)),
            Intent::ZoomOut => self.queue_camera(CameraCommand::ZoomOut),
            Intent::Snapshot(label) => self.queue_camera(CameraCommand::Snapshot(label)),
            Intent::ReportProgress(progress) => {
                self.schedule.lock(|s| s.borrow_mut().progress = progress);
            }
            Intent::ReportRuntime(seconds) => {
                self.schedule.lock(|s| s.borrow_mut().runtime_s = seconds);
            }
        }
    }

    fn apply_step(&self, index: usize) {
        let step = self.schedule.lock(|s| s.borrow().schedule.get(index).cloned());
        let Some(step) = step else {
            warn!(step = index, "No such schedule step");
            return;
        };

        let (report, had_ghosts, traps) = self.geometry.lock(|g| {
            let g = &mut *g.borrow_mut();
            let report = g.params.apply(&step.entries, &g.calibration);
            let had_ghosts = g.layout.ghost_count() > 0;
            g.layout = TrapLayout::from_parameters(&g.params);
            (report, had_ghosts, g.layout.full_count())
        });

        for rejection in &report.rejected {
            warn!(
                step = index,
                key = %rejection.key,
                reason = ?rejection.reason,
                "Schedule entry rejected"
            );
        }
        if let Some(t) = report.truncated {
            warn!(
                step = index,
                axis = ?t.axis,
                from = t.from,
                to = t.to,
                "Trap coordinate lists differ in length, truncated"
            );
        }
        info!(
            step = index,
            name = step.name().unwrap_or("-"),
            applied = report.applied,
            traps,
            "Schedule step applied"
        );

        if report.needs_phasemask || had_ghosts {
            self.request_phasemask();
        }
    }
}

/// Live-task registration, dropped when a task leaves its loop
pub struct TaskGuard<'a> {
    state: &'a ControlState,
    name: &'static str,
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.state.live_tasks.fetch_sub(1, Ordering::AcqRel);
        debug!(task = self.name, "Task deregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweezer_core::experiment::{ExperimentStep, ParamValue, StepEntry};

    fn step(entries: &[(&str, ParamValue)]) -> ExperimentStep {
        ExperimentStep::new(
            entries
                .iter()
                .map(|(k, v)| StepEntry::new(k, v.clone()))
                .collect(),
        )
    }

    fn state(steps: Vec<ExperimentStep>) -> ControlState {
        ControlState::new(
            SlmCalibration::default(),
            Aoi::full(672, 512),
            ExperimentSchedule::new(steps),
        )
    }

    fn pair() -> ExperimentStep {
        step(&[
            ("xm", ParamValue::List(vec![300.0, 400.0])),
            ("ym", ParamValue::List(vec![250.0, 250.0])),
            ("ghost_traps_x", ParamValue::List(vec![350.0])),
            ("ghost_traps_y", ParamValue::List(vec![200.0])),
        ])
    }

    #[test]
    fn test_apply_step_rebuilds_layout_and_requests_mask() {
        let s = state(vec![pair()]);
        s.apply(Intent::ApplyStep(0));

        let snap = s.snapshot();
        assert_eq!(snap.geometry.layout.full_count(), 2);
        assert!(snap.phasemask_pending);
    }

    #[test]
    fn test_rejected_entries_do_not_abort_the_step() {
        let s = state(vec![step(&[
            ("no_such_key", ParamValue::Int(1)),
            ("recording_duration", ParamValue::Int(12)),
        ])]);
        s.apply(Intent::ApplyStep(0));

        let snap = s.snapshot();
        assert_eq!(snap.geometry.params.recording_duration_ms(), 12_000);
        assert!(!snap.phasemask_pending);
    }

    #[test]
    fn test_snapshots_share_the_schedule() {
        let state = state(vec![pair(), pair()]);
        let first = state.snapshot();
        let second = state.snapshot();
        assert!(Arc::ptr_eq(&first.schedule, &second.schedule));
        assert_eq!(first.observation().schedule.len(), 2);
    }

    #[test]
    fn test_missing_step_is_ignored() {
        let s = state(vec![]);
        s.apply(Intent::ApplyStep(3));
        assert_eq!(s.snapshot().geometry.layout.full_count(), 0);
    }

    #[test]
    fn test_ghosts_come_and_go() {
        let s = state(vec![pair()]);
        s.apply(Intent::ApplyStep(0));
        s.finish_phasemask(s.phasemask_generation());

        s.apply(Intent::AddGhostTraps(0));
        assert_eq!(s.snapshot().geometry.layout.ghost_count(), 1);
        assert!(s.phasemask_pending.load(Ordering::Acquire));
        s.finish_phasemask(s.phasemask_generation());

        s.apply(Intent::ClearGhostTraps);
        assert_eq!(s.snapshot().geometry.layout.ghost_count(), 0);
        assert!(s.phasemask_pending.load(Ordering::Acquire));
        s.finish_phasemask(s.phasemask_generation());

        // Nothing to clear, nothing to render
        s.apply(Intent::ClearGhostTraps);
        assert!(!s.phasemask_pending.load(Ordering::Acquire));
    }

    #[test]
    fn test_request_during_render_keeps_mask_pending() {
        let s = state(vec![pair()]);
        s.apply(Intent::ApplyStep(0));
        let generation = s.phasemask_generation();
        s.apply(Intent::ActivateTraps(1));
        s.finish_phasemask(generation);
        assert!(s.phasemask_pending.load(Ordering::Acquire));

        s.finish_phasemask(s.phasemask_generation());
        assert!(!s.phasemask_pending.load(Ordering::Acquire));
    }

    #[test]
    fn test_stage_commands_keep_order() {
        let s = state(vec![]);
        s.apply(Intent::MoveStage(Displacement::new(5.0, 0.0)));
        s.apply(Intent::LiftZ(40));
        s.apply(Intent::ReturnZHome);

        assert_eq!(
            s.next_stage_command(),
            Some(StageCommand::MoveXy(Displacement::new(5.0, 0.0)))
        );
        assert_eq!(s.next_stage_command(), Some(StageCommand::LiftZ(40)));
        assert_eq!(s.next_stage_command(), None);
        assert!(s.return_z_home.load(Ordering::Acquire));
    }

    #[test]
    fn test_recording_intents_reach_camera_queue() {
        let s = state(vec![]);
        s.apply(Intent::Snapshot(SnapshotLabel::Before));
        s.apply(Intent::ZoomIn(Aoi::new(0, 160, 0, 128)));
        s.apply(Intent::SetRecording(true));

        assert!(s.recording.load(Ordering::Acquire));
        assert_eq!(
            s.next_camera_command(),
            Some(CameraCommand::Snapshot(SnapshotLabel::Before))
        );
        assert_eq!(
            s.next_camera_command(),
            Some(CameraCommand::ZoomIn(Aoi::new(0, 160, 0, 128)))
        );
        assert_eq!(s.next_camera_command(), Some(CameraCommand::StartRecording));
    }

    #[test]
    fn test_first_stage_report_is_start() {
        let s = state(vec![]);
        let first = StagePosition {
            x_mm: 1.0,
            y_mm: 2.0,
            z_ticks: Some(10),
        };
        s.update_stage(first);
        s.update_stage(StagePosition {
            x_mm: 1.5,
            ..first
        });

        let snap = s.snapshot();
        assert_eq!(snap.stage_start, first);
        assert_eq!(snap.stage.x_mm, 1.5);
    }

    #[test]
    fn test_task_guard_counts_live_tasks() {
        let s = state(vec![]);
        {
            let _a = s.register_task("a");
            let _b = s.register_task("b");
            assert_eq!(s.live_tasks(), 2);
        }
        assert_eq!(s.live_tasks(), 0);
    }

    #[test]
    fn test_progress_and_runtime_are_mirrored() {
        let s = state(vec![]);
        s.apply(Intent::ReportProgress(2));
        s.apply(Intent::ReportRuntime(17));
        assert_eq!(s.progress(), 2);
        assert_eq!(s.runtime_s(), 17);
        assert_eq!(s.measurement_name(), "step_2");
    }
}
