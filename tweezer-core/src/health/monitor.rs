//! Health monitor implementation
//!
//! Watches the stage, temperature controller, SLM and camera feed and
//! reports connectivity changes once per edge.

/// Camera feed counts as lost after this long without a frame
pub const FRAME_STALE_MS: u64 = 2000;

/// Monitored collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Device {
    Camera,
    Stage,
    Thermostat,
    Slm,
}

/// A connectivity edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HealthChange {
    Lost(Device),
    Restored(Device),
}

/// Overall health
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HealthStatus {
    /// All collaborators connected
    Ok,
    /// At least this collaborator is unavailable
    Degraded(Device),
}

/// Features available with the current hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capabilities {
    /// Temperature-stability waits and the thermal focus term
    pub temperature_gating: bool,
    /// Stage moves are executed
    pub stage_motion: bool,
    /// Phase masks can be rendered
    pub holograms: bool,
    /// Detections are fresh
    pub live_camera: bool,
}

/// Connectivity tracker
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    stage: bool,
    thermostat: bool,
    slm: bool,
    camera: bool,
    last_frame_ms: Option<u64>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    /// Create a monitor that assumes everything is connected
    pub fn new() -> Self {
        Self {
            stage: true,
            thermostat: true,
            slm: true,
            camera: true,
            last_frame_ms: None,
        }
    }

    fn edge(flag: &mut bool, connected: bool, device: Device) -> Option<HealthChange> {
        let change = match (*flag, connected) {
            (true, false) => Some(HealthChange::Lost(device)),
            (false, true) => Some(HealthChange::Restored(device)),
            _ => None,
        };
        *flag = connected;
        change
    }

    pub fn update_stage(&mut self, connected: bool) -> Option<HealthChange> {
        Self::edge(&mut self.stage, connected, Device::Stage)
    }

    pub fn update_thermostat(&mut self, connected: bool) -> Option<HealthChange> {
        Self::edge(&mut self.thermostat, connected, Device::Thermostat)
    }

    pub fn update_slm(&mut self, connected: bool) -> Option<HealthChange> {
        Self::edge(&mut self.slm, connected, Device::Slm)
    }

    /// Record the capture time of the latest frame
    pub fn frame_received(&mut self, timestamp_ms: u64) {
        self.last_frame_ms = Some(timestamp_ms);
    }

    /// Update frame staleness
    ///
    /// # Arguments
    /// - `now_ms`: Time since program start
    pub fn update_time(&mut self, now_ms: u64) -> Option<HealthChange> {
        let fresh = match self.last_frame_ms {
            Some(t) => now_ms.saturating_sub(t) < FRAME_STALE_MS,
            None => now_ms < FRAME_STALE_MS,
        };
        Self::edge(&mut self.camera, fresh, Device::Camera)
    }

    /// Check all collaborators; the first unavailable one is reported
    pub fn check(&self) -> HealthStatus {
        if !self.stage {
            return HealthStatus::Degraded(Device::Stage);
        }
        if !self.camera {
            return HealthStatus::Degraded(Device::Camera);
        }
        if !self.slm {
            return HealthStatus::Degraded(Device::Slm);
        }
        if !self.thermostat {
            return HealthStatus::Degraded(Device::Thermostat);
        }
        HealthStatus::Ok
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            temperature_gating: self.thermostat,
            stage_motion: self.stage,
            holograms: self.slm,
            live_camera: self.camera,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_operation() {
        let mut monitor = HealthMonitor::new();
        monitor.frame_received(0);
        assert_eq!(monitor.update_time(500), None);
        assert_eq!(monitor.check(), HealthStatus::Ok);
    }

    #[test]
    fn test_thermostat_loss_reported_once() {
        let mut monitor = HealthMonitor::new();
        assert_eq!(
            monitor.update_thermostat(false),
            Some(HealthChange::Lost(Device::Thermostat))
        );
        assert_eq!(monitor.update_thermostat(false), None);
        assert!(!monitor.capabilities().temperature_gating);
        assert_eq!(monitor.check(), HealthStatus::Degraded(Device::Thermostat));
        assert_eq!(
            monitor.update_thermostat(true),
            Some(HealthChange::Restored(Device::Thermostat))
        );
    }

    #[test]
    fn test_stale_camera() {
        let mut monitor = HealthMonitor::new();
        monitor.frame_received(1000);
        assert_eq!(
            monitor.update_time(1000 + FRAME_STALE_MS),
            Some(HealthChange::Lost(Device::Camera))
        );
        assert!(!monitor.capabilities().live_camera);
        monitor.frame_received(3100);
        assert_eq!(
            monitor.update_time(3200),
            Some(HealthChange::Restored(Device::Camera))
        );
    }

    #[test]
    fn test_stage_fault_takes_priority() {
        let mut monitor = HealthMonitor::new();
        monitor.update_thermostat(false);
        monitor.update_stage(false);
        assert_eq!(monitor.check(), HealthStatus::Degraded(Device::Stage));
    }
}
