//! Tick-driven experiment runner

use alloc::vec::Vec;
use heapless::Deque;

use crate::assignment::{Assignment, Candidate};
use crate::geometry::{zoom_region, Point};
use crate::motion::{compensate_focus, FocusReference, ScanPattern};
use crate::planner::PathPlanner;
use crate::state::{Event, Phase};
use crate::traits::SnapshotLabel;

use super::types::{Intent, Notice, Observation, RunnerConfig, Tick, WaitKind};

const MAX_WAITS: usize = 4;

#[derive(Debug, Clone, Copy)]
struct Wait {
    kind: WaitKind,
    ticks_left: u32,
}

#[derive(Debug, Clone, Copy)]
struct LiftState {
    /// Focus-compensated z the lift is measured from
    start_z: i32,
    /// Integrated z for stages without an encoder
    commanded_z: i32,
    patience: u32,
}

#[derive(Debug, Clone, Copy)]
struct RecordingState {
    started_ms: u64,
    duration_ms: u64,
    patience: u32,
}

/// Experiment state machine
///
/// Owns the phase, schedule progress and the patience counters. All
/// rig state comes in through the `Observation`; all effects go out as
/// `Intent`s.
#[derive(Debug, Clone)]
pub struct ExperimentRunner {
    config: RunnerConfig,
    planner: PathPlanner,
    scan: ScanPattern,
    phase: Phase,
    progress: usize,
    waits: Deque<Wait, MAX_WAITS>,
    step_loaded: bool,
    lift: Option<LiftState>,
    recording: Option<RecordingState>,
    /// Recording time carried over after an early stop
    remaining_ms: Option<u64>,
    ghosts_added: bool,
    focus_reference: Option<FocusReference>,
}

impl Default for ExperimentRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl ExperimentRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            planner: PathPlanner::from_config(&config.planner),
            scan: ScanPattern::new(config.scan),
            phase: Phase::Idle,
            progress: 0,
            waits: Deque::new(),
            step_loaded: false,
            lift: None,
            recording: None,
            remaining_ms: None,
            ghosts_added: false,
            focus_reference: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Index of the current schedule step
    pub fn progress(&self) -> usize {
        self.progress
    }

    pub fn is_waiting(&self) -> bool {
        !self.waits.is_empty()
    }

    /// Start the schedule over, e.g. after a new one was loaded
    pub fn reset(&mut self) {
        *self = Self {
            focus_reference: self.focus_reference,
            ..Self::new(self.config)
        };
    }

    /// Run one decision cycle
    pub fn tick(&mut self, obs: &Observation<'_>) -> Tick {
        let mut out = Tick::new(self.phase);

        if !obs.tracking_on {
            if !self.phase.is_idle() {
                self.cancel(&mut out);
            }
            out.phase = self.phase;
            return out;
        }

        if !self.poll_waits(obs, &mut out) {
            return out;
        }

        let event = match self.phase {
            Phase::Idle => self.idle(obs),
            Phase::SchedulePending => self.schedule_pending(obs, &mut out),
            Phase::FillingTraps => self.filling(obs, &mut out),
            Phase::Lifting => self.lifting(obs, &mut out),
            Phase::Recording => self.recording(obs, &mut out),
            Phase::Advancing => self.advancing(obs, &mut out),
        };

        if let Some(event) = event {
            self.fire(event, obs, &mut out);
        }
        out.phase = self.phase;
        out
    }

    fn fire(&mut self, event: Event, obs: &Observation<'_>, out: &mut Tick) {
        let from = self.phase;
        let to = from.transition(event);
        out.event = Some(event);
        if to == from {
            return;
        }
        out.notice(Notice::PhaseChanged { from, to });
        self.phase = to;

        match to {
            Phase::SchedulePending => {
                self.step_loaded = false;
                self.remaining_ms = None;
            }
            Phase::FillingTraps => {
                self.lift = None;
                self.recording = None;
            }
            Phase::Lifting => {
                let start_z = self.focus_z(obs);
                self.lift = Some(LiftState {
                    start_z,
                    commanded_z: start_z,
                    patience: 0,
                });
                out.notice(Notice::LiftStarted { start_z });
            }
            Phase::Idle => {
                self.waits.clear();
                self.lift = None;
                self.recording = None;
            }
            Phase::Recording | Phase::Advancing => {}
        }
    }

    fn cancel(&mut self, out: &mut Tick) {
        if self.recording.take().is_some() {
            out.push(Intent::SetRecording(false));
            out.push(Intent::ZoomOut);
        }
        if self.ghosts_added {
            self.ghosts_added = false;
            out.push(Intent::ClearGhostTraps);
        }
        out.push(Intent::ReturnZHome);

        self.waits.clear();
        self.lift = None;
        self.step_loaded = false;
        self.remaining_ms = None;

        let from = self.phase;
        self.phase = from.transition(Event::TrackingStopped);
        out.event = Some(Event::TrackingStopped);
        out.notice(Notice::PhaseChanged {
            from,
            to: self.phase,
        });
    }

    fn wait(&mut self, kind: WaitKind) {
        let ticks_left = match kind {
            WaitKind::Phasemask => self.config.sequencer.phasemask_wait_ticks,
            WaitKind::Temperature => self.config.sequencer.temperature_wait_ticks,
        };
        let _ = self.waits.push_back(Wait { kind, ticks_left });
    }

    /// Returns false while a wait is still blocking the tick
    fn poll_waits(&mut self, obs: &Observation<'_>, out: &mut Tick) -> bool {
        while let Some(wait) = self.waits.front_mut() {
            let done = match wait.kind {
                WaitKind::Phasemask => !obs.phasemask_pending,
                WaitKind::Temperature => {
                    if !obs.params.need_t_stable {
                        true
                    } else if let Some(reading) = obs.temperature {
                        reading.stable
                    } else {
                        out.notice(Notice::TemperatureUnavailable);
                        true
                    }
                }
            };

            if done {
                self.waits.pop_front();
                continue;
            }
            if wait.ticks_left == 0 {
                out.notice(Notice::WaitTimedOut(wait.kind));
                self.waits.pop_front();
                continue;
            }
            wait.ticks_left -= 1;
            return false;
        }
        true
    }

    fn focus_z(&self, obs: &Observation<'_>) -> i32 {
        let reference = self.focus_reference.unwrap_or(FocusReference {
            z_ticks: obs.stage_start.z_ticks.unwrap_or(0),
            x_mm: obs.stage_start.x_mm,
            y_mm: obs.stage_start.y_mm,
            temperature_c: None,
        });
        compensate_focus(
            &self.config.focus,
            &reference,
            obs.stage.x_mm,
            obs.stage.y_mm,
            obs.temperature.map(|t| t.current_c),
        )
    }

    /// Trap pixel positions and their occupancy for this tick
    fn assign(&self, obs: &Observation<'_>) -> (Vec<Point>, Assignment) {
        let traps = obs.layout.pixel_positions(&obs.calibration, &obs.aoi);
        let assignment = Assignment::compute(
            &traps,
            obs.layout.ghost_count(),
            obs.particles,
            self.config.sequencer.movement_threshold_px,
        );
        (traps, assignment)
    }

    fn idle(&mut self, obs: &Observation<'_>) -> Option<Event> {
        if self.progress >= obs.schedule.len() {
            return None;
        }
        if self.focus_reference.is_none() {
            self.focus_reference = Some(FocusReference {
                z_ticks: obs.stage_start.z_ticks.unwrap_or(0),
                x_mm: obs.stage_start.x_mm,
                y_mm: obs.stage_start.y_mm,
                temperature_c: obs.temperature.map(|t| t.current_c),
            });
        }
        Some(Event::TrackingStarted)
    }

    fn schedule_pending(&mut self, obs: &Observation<'_>, out: &mut Tick) -> Option<Event> {
        let Some(step) = obs.schedule.get(self.progress) else {
            out.push(Intent::ReturnZHome);
            out.notice(Notice::ScheduleFinished);
            return Some(Event::ScheduleFinished);
        };

        if !self.step_loaded {
            self.step_loaded = true;
            out.push(Intent::ApplyStep(self.progress));
            out.notice(Notice::StepStarted(self.progress));
            if step.touches_hologram() {
                self.wait(WaitKind::Phasemask);
            }
            self.wait(WaitKind::Temperature);
            return None;
        }

        let (_, assignment) = self.assign(obs);
        if !assignment.occupancy.all_filled() {
            out.push(Intent::ReturnZHome);
            if obs.params.activate_traps_one_by_one {
                let n = self
                    .config
                    .sequencer
                    .initial_trap_batch
                    .min(obs.layout.full_count());
                out.push(Intent::ActivateTraps(n));
                out.notice(Notice::TrapsActivated(n));
                self.wait(WaitKind::Phasemask);
            }
        }
        Some(Event::StepLoaded)
    }

    fn filling(&mut self, obs: &Observation<'_>, out: &mut Tick) -> Option<Event> {
        let cfg = self.config.sequencer;
        let (traps, assignment) = self.assign(obs);
        let occupancy = &assignment.occupancy;

        if !occupancy.all_filled() {
            let occupied = occupancy.occupied_real().count();
            if obs.particles.len() <= occupied {
                // Every visible particle is already trapped: go look for more
                out.push(Intent::ReturnZHome);
                let movement = self.scan.step(
                    (obs.stage.x_mm, obs.stage.y_mm),
                    (obs.stage_start.x_mm, obs.stage_start.y_mm),
                );
                out.push(Intent::MoveStage(movement));
                out.notice(Notice::Searching {
                    particles: obs.particles.len(),
                    occupied,
                });
            } else {
                self.capture(obs, &traps, &assignment, out);
            }
            return None;
        }

        if !obs.layout.fully_active() {
            let n = (obs.layout.active_count() + cfg.trap_batch.max(1)).min(obs.layout.full_count());
            out.push(Intent::ActivateTraps(n));
            out.notice(Notice::TrapsActivated(n));
            self.wait(WaitKind::Phasemask);
            return None;
        }

        Some(Event::AllTrapsFilled)
    }

    fn capture(&mut self, obs: &Observation<'_>, traps: &[Point], assignment: &Assignment, out: &mut Tick) {
        let cfg = self.config.sequencer;
        let Candidate::Pair { trap, particle, .. } = assignment.closest_unoccupied(cfg.match_cutoff_px) else {
            return;
        };
        out.notice(Notice::Capturing { trap, particle });

        let target = traps[trap];
        let source = obs.particles[particle];
        let guards: Vec<Point> = assignment.occupancy.occupied_real().map(|i| traps[i]).collect();

        let movement = if guards.is_empty() {
            source.towards(target).clamp_axes(cfg.free_move_limit_px)
        } else {
            match self.planner.plan_move(&guards, source, target, &obs.aoi) {
                Ok(planned) => planned.displacement.clamp_axes(cfg.guarded_move_limit_px),
                Err(e) => {
                    out.notice(Notice::PlannerFallback(e));
                    source.towards(target).clamp_axes(cfg.guarded_move_limit_px)
                }
            }
        };

        if !movement.is_zero() {
            out.push(Intent::MoveStage(movement));
        }
    }

    fn lifting(&mut self, obs: &Observation<'_>, out: &mut Tick) -> Option<Event> {
        let cfg = self.config.sequencer;
        let (_, assignment) = self.assign(obs);
        let lift = self.lift.get_or_insert(LiftState {
            start_z: 0,
            commanded_z: 0,
            patience: 0,
        });

        let current_z = obs.stage.z_ticks.unwrap_or(lift.commanded_z);
        if current_z - lift.start_z >= obs.params.target_experiment_z {
            return Some(Event::LiftComplete);
        }

        if assignment.occupancy.all_filled() {
            out.push(Intent::LiftZ(cfg.lift_step_ticks));
            lift.commanded_z += cfg.lift_step_ticks;
            lift.patience = 0;
        } else {
            lift.patience += 1;
        }

        if lift.patience >= cfg.lift_patience {
            out.push(Intent::ReturnZHome);
            out.notice(Notice::LiftAborted);
            return Some(Event::ParticleLost);
        }
        None
    }

    fn recording(&mut self, obs: &Observation<'_>, out: &mut Tick) -> Option<Event> {
        let cfg = self.config.sequencer;

        if !self.ghosts_added && self.recording.is_none() {
            let has_ghosts = obs
                .schedule
                .get(self.progress)
                .is_some_and(|step| step.ghosts.is_some());
            if has_ghosts {
                self.ghosts_added = true;
                out.push(Intent::AddGhostTraps(self.progress));
                self.wait(WaitKind::Phasemask);
                return None;
            }
        }

        if self.recording.is_none() {
            self.start_recording(obs, out);
            return None;
        }

        let (_, assignment) = self.assign(obs);
        let Some(state) = self.recording.as_mut() else {
            return None;
        };

        let elapsed = obs.now_ms.saturating_sub(state.started_ms);
        if elapsed >= state.duration_ms {
            return Some(self.finish_recording(0, out));
        }

        if assignment.occupancy.all_filled() {
            state.patience = 0;
            out.push(Intent::ReportRuntime(elapsed / 1000));
        } else {
            state.patience += 1;
        }

        if state.patience > cfg.recording_patience {
            let remaining = state.duration_ms - elapsed;
            return Some(self.finish_recording(remaining, out));
        }
        None
    }

    fn start_recording(&mut self, obs: &Observation<'_>, out: &mut Tick) {
        let camera = self.config.camera;
        let duration_ms = self
            .remaining_ms
            .take()
            .unwrap_or_else(|| obs.params.recording_duration_ms());

        out.push(Intent::Snapshot(SnapshotLabel::Before));
        let absolute = obs.layout.absolute_pixels(&obs.calibration);
        if let Some(region) = zoom_region(
            &absolute,
            camera.zoom_margin_px,
            camera.model.aoi_granularity(),
            camera.model.sensor(),
        ) {
            out.push(Intent::ZoomIn(region));
        }
        out.push(Intent::SetRecording(true));
        out.notice(Notice::RecordingStarted { duration_ms });

        self.recording = Some(RecordingState {
            started_ms: obs.now_ms,
            duration_ms,
            patience: 0,
        });
    }

    fn finish_recording(&mut self, remaining_ms: u64, out: &mut Tick) -> Event {
        self.recording = None;
        out.push(Intent::SetRecording(false));
        out.push(Intent::ZoomOut);
        out.push(Intent::Snapshot(SnapshotLabel::After));
        out.notice(Notice::RecordingStopped { remaining_ms });

        if remaining_ms < self.config.sequencer.min_remaining_ms {
            return Event::RecordingComplete;
        }

        // Particles were lost: catch them again and record the rest
        self.remaining_ms = Some(remaining_ms);
        if self.ghosts_added {
            self.ghosts_added = false;
            out.push(Intent::ClearGhostTraps);
        }
        out.push(Intent::ReturnZHome);
        Event::RecordingInterrupted
    }

    fn advancing(&mut self, obs: &Observation<'_>, out: &mut Tick) -> Option<Event> {
        self.progress += 1;
        self.remaining_ms = None;
        out.push(Intent::ReportProgress(self.progress));
        if self.ghosts_added {
            self.ghosts_added = false;
            out.push(Intent::ClearGhostTraps);
        }

        if self.progress >= obs.schedule.len() {
            out.push(Intent::ReturnZHome);
            out.notice(Notice::ScheduleFinished);
            Some(Event::ScheduleFinished)
        } else {
            Some(Event::NextStep)
        }
    }
}
