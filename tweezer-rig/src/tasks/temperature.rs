//! Temperature task
//!
//! Follows the setpoint and output switch of the current step and
//! publishes the controller reading.

use embassy_time::{Duration, Ticker};
use tracing::{debug, info, warn};

use tweezer_core::traits::TemperatureController;
use tweezer_sim::SimThermostat;

use crate::store::ControlState;

/// Controller poll period
const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct TemperatureWorker<T> {
    controller: T,
    /// Last setpoint the controller accepted
    setpoint: Option<f32>,
    /// Last output state the controller accepted
    output: Option<bool>,
}

pub type SimTemperatureWorker = TemperatureWorker<SimThermostat>;

impl<T: TemperatureController> TemperatureWorker<T> {
    pub fn new(controller: T) -> Self {
        Self {
            controller,
            setpoint: None,
            output: None,
        }
    }

    /// Push changed requests, then read
    pub fn poll(&mut self, state: &ControlState) {
        let (setpoint, output) = state.temperature_request();

        if self.setpoint != Some(setpoint) {
            match self.controller.set_setpoint(setpoint) {
                Ok(()) => {
                    info!(setpoint, "Temperature setpoint changed");
                    self.setpoint = Some(setpoint);
                }
                Err(e) => debug!(error = ?e, "Setpoint not accepted"),
            }
        }
        if self.output != Some(output) {
            match self.controller.set_output(output) {
                Ok(()) => {
                    info!(on = output, "Temperature output switched");
                    self.output = Some(output);
                }
                Err(e) => debug!(error = ?e, "Output switch not accepted"),
            }
        }

        match self.controller.read() {
            Ok(reading) => state.update_temperature(Some(reading)),
            Err(e) => {
                debug!(error = ?e, "Temperature read failed");
                state.update_temperature(None);
                // Resend both once the controller is back
                self.setpoint = None;
                self.output = None;
            }
        }
    }

    pub fn shutdown(&mut self) {
        if let Err(e) = self.controller.set_output(false) {
            warn!(error = ?e, "Failed to switch temperature output off");
        }
    }
}

/// Temperature task
#[embassy_executor::task]
pub async fn temperature_task(state: &'static ControlState, mut worker: SimTemperatureWorker) {
    let _guard = state.register_task("temperature");
    info!("Temperature task started");

    let mut ticker = Ticker::every(POLL_INTERVAL);
    while state.is_running() {
        worker.poll(state);
        ticker.next().await;
    }

    worker.shutdown();
    info!("Temperature task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweezer_core::experiment::{ExperimentSchedule, ExperimentStep, ParamValue, StepEntry};
    use tweezer_core::geometry::{Aoi, SlmCalibration};
    use tweezer_core::sequencer::Intent;
    use tweezer_sim::ThermostatConfig;

    fn setup() -> (ControlState, SimTemperatureWorker) {
        let step = ExperimentStep::new(vec![
            StepEntry::new("setpoint_temperature", ParamValue::Float(30.0)),
            StepEntry::new("temperature_output_on", ParamValue::Bool(true)),
        ]);
        let state = ControlState::new(
            SlmCalibration::default(),
            Aoi::full(672, 512),
            ExperimentSchedule::new(vec![step]),
        );
        let worker = TemperatureWorker::new(SimThermostat::new(ThermostatConfig::default()));
        (state, worker)
    }

    #[test]
    fn test_reading_follows_setpoint() {
        let (state, mut worker) = setup();
        state.apply(Intent::ApplyStep(0));

        worker.poll(&state);
        let first = state.snapshot().temperature.unwrap();
        assert_eq!(first.setpoint_c, 30.0);
        assert!(!first.stable);

        for _ in 0..60 {
            worker.poll(&state);
        }
        let settled = state.snapshot().temperature.unwrap();
        assert!((settled.current_c - 30.0).abs() < 0.05);
        assert!(settled.stable);
        assert!(state.connectivity().thermostat);
    }

    #[test]
    fn test_lost_controller_clears_reading() {
        let (state, mut worker) = setup();
        worker.poll(&state);
        assert!(state.snapshot().temperature.is_some());

        worker.controller.set_connected(false);
        worker.poll(&state);
        assert!(state.snapshot().temperature.is_none());
        assert!(!state.connectivity().thermostat);
        assert_eq!(worker.setpoint, None);
    }

    #[test]
    fn test_shutdown_switches_output_off() {
        let (state, mut worker) = setup();
        state.apply(Intent::ApplyStep(0));
        worker.poll(&state);
        worker.shutdown();

        let mut controller = worker.controller;
        for _ in 0..60 {
            controller.read().unwrap();
        }
        let reading = controller.read().unwrap();
        assert!((reading.current_c - ThermostatConfig::default().ambient_c).abs() < 0.1);
        assert!(!reading.stable);
    }
}
