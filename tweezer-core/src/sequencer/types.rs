//! Sequencer inputs and outputs

use heapless::Vec;

use crate::config::{CameraConfig, FocusConfig, PlannerConfig, ScanConfig, SequencerConfig};
use crate::experiment::{ExperimentParameters, ExperimentSchedule, TrapLayout};
use crate::geometry::{Aoi, Displacement, Point, SlmCalibration};
use crate::planner::PlanError;
use crate::state::{Event, Phase};
use crate::traits::{SnapshotLabel, StagePosition, TemperatureReading};

/// Maximum intents issued per tick
pub const MAX_INTENTS: usize = 8;

/// Maximum notices issued per tick
pub const MAX_NOTICES: usize = 8;

/// Everything the runner needs to know about the rig
#[derive(Debug, Clone, Copy, Default)]
pub struct RunnerConfig {
    pub sequencer: SequencerConfig,
    pub planner: PlannerConfig,
    pub scan: ScanConfig,
    pub focus: FocusConfig,
    pub camera: CameraConfig,
}

/// Snapshot of the control state for one tick
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    /// Time since program start (ms)
    pub now_ms: u64,
    pub tracking_on: bool,
    pub schedule: &'a ExperimentSchedule,
    pub params: &'a ExperimentParameters,
    pub layout: &'a TrapLayout,
    pub calibration: SlmCalibration,
    /// Current camera window
    pub aoi: Aoi,
    /// Detected particles, AOI-relative pixels
    pub particles: &'a [Point],
    pub stage: StagePosition,
    /// Stage position when the program started
    pub stage_start: StagePosition,
    /// None while no temperature controller is connected
    pub temperature: Option<TemperatureReading>,
    /// The SLM has not yet displayed the latest trap layout
    pub phasemask_pending: bool,
}

/// Side effects requested by the runner
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// Apply schedule step `n` to the parameters and rebuild the layout
    ApplyStep(usize),
    /// Enable the first `n` programmed traps
    ActivateTraps(usize),
    /// Append the ghost traps of schedule step `n`
    AddGhostTraps(usize),
    ClearGhostTraps,
    /// Shift the sample so particles move by this many pixels
    MoveStage(Displacement),
    /// Raise z by this many ticks
    LiftZ(i32),
    /// Move z back to the focus position the program started at
    ReturnZHome,
    SetRecording(bool),
    ZoomIn(Aoi),
    ZoomOut,
    Snapshot(SnapshotLabel),
    /// Schedule progress index
    ReportProgress(usize),
    /// Seconds of the current recording with all traps filled
    ReportRuntime(u64),
}

/// Bounded waits checked at the top of every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitKind {
    Phasemask,
    Temperature,
}

/// Things worth logging
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notice {
    PhaseChanged { from: Phase, to: Phase },
    StepStarted(usize),
    WaitTimedOut(WaitKind),
    /// Temperature gating skipped, no controller
    TemperatureUnavailable,
    Searching { particles: usize, occupied: usize },
    Capturing { trap: usize, particle: usize },
    PlannerFallback(PlanError),
    TrapsActivated(usize),
    LiftStarted { start_z: i32 },
    LiftAborted,
    RecordingStarted { duration_ms: u64 },
    RecordingStopped { remaining_ms: u64 },
    ScheduleFinished,
}

/// Result of one runner tick
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Phase after this tick
    pub phase: Phase,
    /// Event fired this tick, if any
    pub event: Option<Event>,
    pub intents: Vec<Intent, MAX_INTENTS>,
    pub notices: Vec<Notice, MAX_NOTICES>,
}

impl Tick {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            event: None,
            intents: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, intent: Intent) {
        let _ = self.intents.push(intent);
    }

    pub(crate) fn notice(&mut self, notice: Notice) {
        let _ = self.notices.push(notice);
    }

    /// Check whether an intent was issued
    pub fn has(&self, intent: &Intent) -> bool {
        self.intents.contains(intent)
    }
}
