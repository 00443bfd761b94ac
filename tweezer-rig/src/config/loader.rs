//! Rig configuration loading
//!
//! One TOML file with a section per subsystem. Every key is optional;
//! missing keys keep the built-in defaults of the core config types.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use tweezer_core::config::{
    CameraConfig, DetectionConfig, FocusConfig, PlannerConfig, ScanConfig, SequencerConfig,
    StageAxes,
};
use tweezer_core::geometry::SlmCalibration;
use tweezer_core::sequencer::RunnerConfig;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Loop timing and program lifetime
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Experiment loop period (ms)
    pub tick_interval_ms: u64,
    /// Supervisor period (ms)
    pub health_interval_ms: u64,
    /// Switch tracking on at start-up
    pub autostart: bool,
    /// Stop the program once the schedule has finished
    pub exit_when_done: bool,
    /// Stop the program after this long
    pub max_runtime_s: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 300,
            health_interval_ms: 500,
            autostart: true,
            exit_when_done: true,
            max_runtime_s: None,
        }
    }
}

/// Simulated hardware
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub particle_count: usize,
    pub capture_radius_px: f32,
    pub depth_of_field_ticks: i32,
    pub escape_probability: f64,
    /// The z axis reports its position
    pub z_encoder: bool,
    /// A temperature controller is attached
    pub thermostat: bool,
    /// Phase mask computation time (ms)
    pub slm_render_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            particle_count: 40,
            capture_radius_px: 15.0,
            depth_of_field_ticks: 60,
            escape_probability: 0.0,
            z_encoder: true,
            thermostat: true,
            slm_render_ms: 200,
        }
    }
}

/// Complete rig configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub sequencer: SequencerConfig,
    pub planner: PlannerConfig,
    pub scan: ScanConfig,
    pub detection: DetectionConfig,
    pub camera: CameraConfig,
    pub slm: SlmCalibration,
    pub focus: FocusConfig,
    pub stage: StageAxes,
    pub runtime: RuntimeConfig,
    pub simulation: SimulationConfig,
}

impl RigConfig {
    /// Parse and validate a TOML document
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: RigConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::parse(&read(path)?)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse the configuration compiled into the binary
    ///
    /// Falls back to the built-in defaults if it does not parse.
    pub fn embedded(text: &str) -> Self {
        match Self::parse(text) {
            Ok(config) => {
                info!("Parsed embedded configuration");
                config
            }
            Err(e) => {
                error!(error = %e, "Failed to parse embedded config, using defaults");
                Self::default()
            }
        }
    }

    /// Reject values the rig cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &'static str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { field, reason })
        };

        if self.runtime.tick_interval_ms == 0 {
            return invalid("runtime.tick_interval_ms", "must be positive");
        }
        if self.runtime.health_interval_ms == 0 {
            return invalid("runtime.health_interval_ms", "must be positive");
        }
        if self.planner.cell_width == 0 {
            return invalid("planner.cell_width", "must be positive");
        }
        if self.detection.size_threshold >= self.detection.upper_size_threshold {
            return invalid(
                "detection.upper_size_threshold",
                "must exceed size_threshold",
            );
        }
        if self.camera.frame_interval_ms == 0 {
            return invalid("camera.frame_interval_ms", "must be positive");
        }
        if self.slm.slm_to_pixel == 0.0 {
            return invalid("slm.slm_to_pixel", "must not be zero");
        }
        if matches!(self.stage.mm_to_pixel, Some(s) if s <= 0.0) {
            return invalid("stage.mm_to_pixel", "must be positive");
        }
        if self.stage.z_min_ticks >= self.stage.z_max_ticks {
            return invalid("stage.z_max_ticks", "must exceed z_min_ticks");
        }
        if self.sequencer.lift_step_ticks <= 0 {
            return invalid("sequencer.lift_step_ticks", "must be positive");
        }
        if !(0.0..=1.0).contains(&self.simulation.escape_probability) {
            return invalid("simulation.escape_probability", "must be within 0..=1");
        }
        Ok(())
    }

    /// Settings the experiment sequencer runs with
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            sequencer: self.sequencer,
            planner: self.planner,
            scan: self.scan,
            focus: self.focus,
            camera: self.camera,
        }
    }

    /// Stage pixels per millimetre
    pub fn mm_to_pixel(&self) -> f32 {
        self.stage
            .mm_to_pixel
            .unwrap_or(self.camera.model.mm_to_pixel())
    }
}

pub(super) fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweezer_core::config::{CameraModel, ScanDirection};

    const RIG_TOML: &str = include_str!("../../rig.toml");

    #[test]
    fn test_embedded_config_parses() {
        let config = RigConfig::parse(RIG_TOML).unwrap();
        assert_eq!(config.camera.model, CameraModel::Basler);
        assert_eq!(config.scan.initial_direction, ScanDirection::Up);
        assert_eq!(config.slm.x_center, 336.0);
        assert_eq!(config.runtime.tick_interval_ms, 300);
        assert!(config.simulation.thermostat);
    }

    #[test]
    fn test_missing_keys_keep_defaults() {
        let config = RigConfig::parse(
            r#"
            [sequencer]
            lift_patience = 7

            [camera]
            model = "thorlabs"
            "#,
        )
        .unwrap();
        assert_eq!(config.sequencer.lift_patience, 7);
        assert_eq!(
            config.sequencer.guarded_move_limit_px,
            SequencerConfig::default().guarded_move_limit_px
        );
        assert_eq!(config.camera.model, CameraModel::Thorlabs);
        assert_eq!(config.planner, PlannerConfig::default());
        assert_eq!(config.mm_to_pixel(), 16140.0);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = RigConfig::parse("").unwrap();
        assert_eq!(config.runtime, RuntimeConfig::default());
        assert_eq!(config.simulation, SimulationConfig::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = RigConfig::parse("[planner]\ncell_width = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "planner.cell_width",
                ..
            }
        ));

        let err = RigConfig::parse(
            "[detection]\nsize_threshold = 500\nupper_size_threshold = 400\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_bad_toml_is_a_parse_error() {
        let err = RigConfig::parse("[camera\nmodel = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = RigConfig::parse("[camera]\nmodel = \"webcam\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_embedded_falls_back_to_defaults() {
        let config = RigConfig::embedded("not = [valid");
        assert_eq!(config.runtime, RuntimeConfig::default());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = RigConfig::load(Path::new("/nonexistent/rig.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rig.toml"));
    }
}
