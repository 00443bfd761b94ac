//! Supervisor loop
//!
//! Runs on the main task: watches device connectivity, decides when the
//! program should end and shuts the tasks down in order.

use core::sync::atomic::Ordering;

use embassy_time::{Duration, Instant, Ticker, Timer};
use tracing::{debug, info, warn};

use tweezer_core::health::{HealthChange, HealthMonitor, HealthStatus};

use crate::config::RuntimeConfig;
use crate::store::ControlState;

/// Longest wait for the tasks to leave their loops
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the program ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Something cleared the running flag
    Stopped,
    /// The configured maximum runtime elapsed
    MaxRuntime,
    /// Every schedule step has run
    ScheduleFinished,
}

/// Feed the latest connectivity into the monitor, returning the edges
pub fn check_health(
    state: &ControlState,
    monitor: &mut HealthMonitor,
    thermostat_fitted: bool,
) -> Vec<HealthChange> {
    let link = state.connectivity();
    if let Some(t) = link.last_frame_ms {
        monitor.frame_received(t);
    }

    let mut changes = Vec::new();
    changes.extend(monitor.update_stage(link.stage));
    changes.extend(monitor.update_slm(link.slm));
    if thermostat_fitted {
        changes.extend(monitor.update_thermostat(link.thermostat));
    }
    changes.extend(monitor.update_time(state.now_ms()));
    changes
}

pub fn stop_reason(state: &ControlState, runtime: &RuntimeConfig, uptime: Duration) -> Option<StopReason> {
    if !state.is_running() {
        return Some(StopReason::Stopped);
    }
    if matches!(runtime.max_runtime_s, Some(limit) if uptime.as_secs() >= limit) {
        return Some(StopReason::MaxRuntime);
    }
    if runtime.exit_when_done && state.schedule_finished.load(Ordering::Acquire) {
        return Some(StopReason::ScheduleFinished);
    }
    None
}

/// Supervise until a stop condition, then shut down
pub async fn supervise(
    state: &'static ControlState,
    runtime: RuntimeConfig,
    thermostat_fitted: bool,
) -> StopReason {
    info!("Supervisor started");

    let started = Instant::now();
    let mut monitor = HealthMonitor::new();
    let mut degraded = false;
    let mut ticker = Ticker::every(Duration::from_millis(runtime.health_interval_ms));

    let reason = loop {
        ticker.next().await;

        for change in check_health(state, &mut monitor, thermostat_fitted) {
            match change {
                HealthChange::Lost(device) => warn!(?device, "Device lost"),
                HealthChange::Restored(device) => info!(?device, "Device restored"),
            }
        }
        match monitor.check() {
            HealthStatus::Degraded(device) if !degraded => {
                warn!(?device, capabilities = ?monitor.capabilities(), "Rig degraded");
                degraded = true;
            }
            HealthStatus::Ok if degraded => {
                info!("All devices connected");
                degraded = false;
            }
            _ => {}
        }

        debug!(
            phase = ?state.phase(),
            step = state.progress(),
            steps = state.schedule_len(),
            runtime_s = state.runtime_s(),
            "Heartbeat"
        );

        if let Some(reason) = stop_reason(state, &runtime, started.elapsed()) {
            break reason;
        }
    };

    info!(?reason, "Shutting down");
    shutdown(state, Duration::from_millis(runtime.tick_interval_ms)).await;
    reason
}

/// Stop tracking, let the experiment loop wind down, then stop every task
async fn shutdown(state: &ControlState, tick: Duration) {
    state.set_tracking(false);
    Timer::after(tick * 2).await;
    state.stop();

    let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
    while state.live_tasks() > 0 {
        if Instant::now() >= deadline {
            warn!(remaining = state.live_tasks(), "Tasks still running at shutdown");
            return;
        }
        Timer::after(Duration::from_millis(20)).await;
    }
    info!("All tasks stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweezer_core::experiment::ExperimentSchedule;
    use tweezer_core::geometry::{Aoi, SlmCalibration};
    use tweezer_core::health::Device;
    use tweezer_core::traits::StagePosition;

    fn state() -> ControlState {
        ControlState::new(
            SlmCalibration::default(),
            Aoi::full(672, 512),
            ExperimentSchedule::default(),
        )
    }

    #[test]
    fn test_lost_stage_is_reported_once() {
        let state = state();
        let mut monitor = HealthMonitor::new();
        state.update_stage(StagePosition::default());
        state.update_detections(Vec::new(), Aoi::full(672, 512));
        state.update_temperature(None);

        // No thermostat fitted: its missing reading is not a fault
        assert!(check_health(&state, &mut monitor, false).is_empty());

        state.set_stage_connected(false);
        assert_eq!(
            check_health(&state, &mut monitor, false),
            vec![HealthChange::Lost(Device::Stage)]
        );
        assert!(check_health(&state, &mut monitor, false).is_empty());
        assert_eq!(monitor.check(), HealthStatus::Degraded(Device::Stage));
    }

    #[test]
    fn test_missing_thermostat_reading_when_fitted() {
        let state = state();
        let mut monitor = HealthMonitor::new();
        state.update_stage(StagePosition::default());
        state.update_detections(Vec::new(), Aoi::full(672, 512));
        state.update_temperature(None);

        assert_eq!(
            check_health(&state, &mut monitor, true),
            vec![HealthChange::Lost(Device::Thermostat)]
        );
        assert!(!monitor.capabilities().temperature_gating);
    }

    #[test]
    fn test_stop_reasons() {
        let state = state();
        let runtime = RuntimeConfig {
            max_runtime_s: Some(60),
            exit_when_done: true,
            ..RuntimeConfig::default()
        };
        assert_eq!(stop_reason(&state, &runtime, Duration::from_secs(10)), None);
        assert_eq!(
            stop_reason(&state, &runtime, Duration::from_secs(60)),
            Some(StopReason::MaxRuntime)
        );

        state.schedule_finished.store(true, Ordering::Release);
        assert_eq!(
            stop_reason(&state, &runtime, Duration::from_secs(10)),
            Some(StopReason::ScheduleFinished)
        );
        let keep_going = RuntimeConfig {
            exit_when_done: false,
            max_runtime_s: None,
            ..runtime
        };
        assert_eq!(stop_reason(&state, &keep_going, Duration::from_secs(10)), None);

        state.stop();
        assert_eq!(
            stop_reason(&state, &keep_going, Duration::from_secs(10)),
            Some(StopReason::Stopped)
        );
    }
}
