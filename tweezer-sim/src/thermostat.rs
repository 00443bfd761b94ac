//! Simulated temperature controller
//!
//! First-order approach towards the setpoint while the output is on,
//! towards ambient while it is off. The reading counts as stable after
//! a number of consecutive reads inside the stability band.

use tweezer_core::traits::{SensorError, TemperatureController, TemperatureReading};

/// Thermal model parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermostatConfig {
    pub ambient_c: f32,
    /// Fraction of the remaining error closed per read
    pub rate: f32,
    /// Half-width of the stability band (°C)
    pub stable_band_c: f32,
    /// Consecutive in-band reads before reporting stable
    pub stable_reads: u32,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            ambient_c: 22.0,
            rate: 0.2,
            stable_band_c: 0.05,
            stable_reads: 5,
        }
    }
}

pub struct SimThermostat {
    config: ThermostatConfig,
    current_c: f32,
    setpoint_c: f32,
    output_on: bool,
    in_band: u32,
    connected: bool,
}

impl SimThermostat {
    pub fn new(config: ThermostatConfig) -> Self {
        Self {
            config,
            current_c: config.ambient_c,
            setpoint_c: config.ambient_c,
            output_on: false,
            in_band: 0,
            connected: true,
        }
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    fn check(&self) -> Result<(), SensorError> {
        if self.connected {
            Ok(())
        } else {
            Err(SensorError::NotConnected)
        }
    }
}

impl TemperatureController for SimThermostat {
    fn read(&mut self) -> Result<TemperatureReading, SensorError> {
        self.check()?;
        let target = if self.output_on {
            self.setpoint_c
        } else {
            self.config.ambient_c
        };
        self.current_c += (target - self.current_c) * self.config.rate;

        if self.output_on && (self.current_c - self.setpoint_c).abs() < self.config.stable_band_c {
            self.in_band = self.in_band.saturating_add(1);
        } else {
            self.in_band = 0;
        }

        Ok(TemperatureReading {
            current_c: self.current_c,
            setpoint_c: self.setpoint_c,
            stable: self.in_band >= self.config.stable_reads,
        })
    }

    fn set_setpoint(&mut self, celsius: f32) -> Result<(), SensorError> {
        self.check()?;
        if celsius != self.setpoint_c {
            self.setpoint_c = celsius;
            self.in_band = 0;
        }
        Ok(())
    }

    fn set_output(&mut self, on: bool) -> Result<(), SensorError> {
        self.check()?;
        self.output_on = on;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settles_to_setpoint() {
        let mut t = SimThermostat::new(ThermostatConfig::default());
        t.set_setpoint(25.0).unwrap();
        t.set_output(true).unwrap();

        let first = t.read().unwrap();
        assert!(!first.stable);
        assert!(first.current_c > 22.0);

        let stable = (0..200).map(|_| t.read().unwrap()).find(|r| r.stable);
        let reading = stable.expect("never settled");
        assert!((reading.current_c - 25.0).abs() < 0.05);
    }

    #[test]
    fn test_output_off_is_never_stable() {
        let mut t = SimThermostat::new(ThermostatConfig::default());
        t.set_setpoint(22.0).unwrap();
        for _ in 0..50 {
            assert!(!t.read().unwrap().stable);
        }
    }

    #[test]
    fn test_new_setpoint_resets_stability() {
        let mut t = SimThermostat::new(ThermostatConfig::default());
        t.set_output(true).unwrap();
        t.set_setpoint(23.0).unwrap();
        for _ in 0..100 {
            t.read().unwrap();
        }
        assert!(t.read().unwrap().stable);
        t.set_setpoint(30.0).unwrap();
        assert!(!t.read().unwrap().stable);
    }

    #[test]
    fn test_disconnected() {
        let mut t = SimThermostat::new(ThermostatConfig::default());
        t.set_connected(false);
        assert_eq!(t.read(), Err(SensorError::NotConnected));
    }
}
