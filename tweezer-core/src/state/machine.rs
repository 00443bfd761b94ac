//! Phase machine definition
//!
//! All stage, trap and recording behavior of the experiment loop is a
//! function of the current phase and an event.

use super::events::Event;

/// Experiment phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Tracking off or schedule finished
    #[default]
    Idle,
    /// Loading the current schedule step
    SchedulePending,
    /// Capturing particles into empty traps
    FillingTraps,
    /// Raising the captured particles to the experiment height
    Lifting,
    /// Holding the particles while the recorder runs
    Recording,
    /// Moving on to the next schedule step
    Advancing,
}

impl Phase {
    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }

    /// Process an event and return the next phase
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use Phase::*;

        match (self, event) {
            // Cancellation from anywhere
            (_, TrackingStopped) => Idle,

            (Idle, TrackingStarted) => SchedulePending,

            (SchedulePending, StepLoaded) => FillingTraps,
            (SchedulePending, ScheduleFinished) => Idle,

            (FillingTraps, AllTrapsFilled) => Lifting,

            (Lifting, LiftComplete) => Recording,
            (Lifting, ParticleLost) => FillingTraps,

            (Recording, RecordingComplete) => Advancing,
            (Recording, RecordingInterrupted) => FillingTraps,

            (Advancing, NextStep) => SchedulePending,
            (Advancing, ScheduleFinished) => Idle,

            // Default: stay in current phase
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_to_pending() {
        let next = Phase::Idle.transition(Event::TrackingStarted);
        assert_eq!(next, Phase::SchedulePending);
    }

    #[test]
    fn test_stop_from_any_phase() {
        let phases = [
            Phase::Idle,
            Phase::SchedulePending,
            Phase::FillingTraps,
            Phase::Lifting,
            Phase::Recording,
            Phase::Advancing,
        ];

        for phase in phases {
            assert_eq!(phase.transition(Event::TrackingStopped), Phase::Idle);
        }
    }

    #[test]
    fn test_full_cycle() {
        let phase = Phase::Idle
            .transition(Event::TrackingStarted)
            .transition(Event::StepLoaded)
            .transition(Event::AllTrapsFilled)
            .transition(Event::LiftComplete)
            .transition(Event::RecordingComplete);
        assert_eq!(phase, Phase::Advancing);

        assert_eq!(phase.transition(Event::NextStep), Phase::SchedulePending);
        assert_eq!(phase.transition(Event::ScheduleFinished), Phase::Idle);
    }

    #[test]
    fn test_regression_to_filling() {
        assert_eq!(
            Phase::Lifting.transition(Event::ParticleLost),
            Phase::FillingTraps
        );
        assert_eq!(
            Phase::Recording.transition(Event::RecordingInterrupted),
            Phase::FillingTraps
        );
    }

    #[test]
    fn test_unrelated_events_ignored() {
        assert_eq!(Phase::Idle.transition(Event::AllTrapsFilled), Phase::Idle);
        assert_eq!(
            Phase::FillingTraps.transition(Event::LiftComplete),
            Phase::FillingTraps
        );
        assert_eq!(
            Phase::Recording.transition(Event::TrackingStarted),
            Phase::Recording
        );
    }

    #[test]
    fn test_exhausted_schedule_returns_to_idle() {
        assert_eq!(
            Phase::SchedulePending.transition(Event::ScheduleFinished),
            Phase::Idle
        );
        assert_eq!(
            Phase::Advancing.transition(Event::ScheduleFinished),
            Phase::Idle
        );
    }

    #[test]
    fn test_phase_properties() {
        assert!(Phase::default().is_idle());
        assert!(!Phase::Recording.is_idle());
        assert!(Phase::Recording.transition(Event::TrackingStopped).is_idle());
    }
}
