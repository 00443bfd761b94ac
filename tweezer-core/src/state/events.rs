//! Phase machine events

/// Events that drive phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Operator switched tracking on
    TrackingStarted,
    /// Operator switched tracking off, or the program is stopping
    TrackingStopped,
    /// The current schedule step has been applied
    StepLoaded,
    /// Every programmed trap is active and holds a particle
    AllTrapsFilled,
    /// The lift target height was reached with all traps filled
    LiftComplete,
    /// Particles dropped out during the lift
    ParticleLost,
    /// Recording ran to its duration
    RecordingComplete,
    /// Recording ended early with time left
    RecordingInterrupted,
    /// Another schedule step follows
    NextStep,
    /// The last schedule step has finished
    ScheduleFinished,
}
