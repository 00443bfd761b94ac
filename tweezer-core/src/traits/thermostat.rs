//! Temperature controller trait

/// Errors that can occur with temperature sensing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Controller not connected
    NotConnected,
    /// Reading failed
    ReadFailed,
}

/// A controller status snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureReading {
    pub current_c: f32,
    pub setpoint_c: f32,
    /// The controller considers the temperature settled
    pub stable: bool,
}

/// Trait for sample temperature controllers
pub trait TemperatureController {
    fn read(&mut self) -> Result<TemperatureReading, SensorError>;

    fn set_setpoint(&mut self, celsius: f32) -> Result<(), SensorError>;

    /// Enable or disable the heating/cooling output
    fn set_output(&mut self, on: bool) -> Result<(), SensorError>;
}
