//! Experiment steps and the schedule

use alloc::vec::Vec;

use super::layout::DeviceTrap;
use super::params::{ParamKey, ParamValue, StepEntry};
use crate::geometry::{Axis, PixelBound, SlmCalibration};

/// Ghost traps to add once the particles are lifted
///
/// Coordinates may be device units or absolute pixels; lists whose
/// smallest value exceeds 1 are treated as pixels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GhostSpec {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Option<Vec<f32>>,
}

impl GhostSpec {
    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty()
    }

    /// Ghost traps in device coordinates
    ///
    /// Unpaired coordinates are dropped and missing z values are zero.
    pub fn to_device(&self, calibration: &SlmCalibration) -> Vec<DeviceTrap> {
        let mut x = self.x.clone();
        let mut y = self.y.clone();
        calibration.normalize(Axis::X, &mut x, PixelBound::FromOne);
        calibration.normalize(Axis::Y, &mut y, PixelBound::FromOne);

        x.iter()
            .zip(y.iter())
            .enumerate()
            .map(|(i, (&xm, &ym))| DeviceTrap {
                xm,
                ym,
                zm: self
                    .z
                    .as_ref()
                    .and_then(|z| z.get(i).copied())
                    .unwrap_or(0.0),
            })
            .collect()
    }
}

/// One entry of the experiment schedule
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExperimentStep {
    /// Parameter entries applied when the step is loaded
    pub entries: Vec<StepEntry>,
    /// Ghost traps added before recording
    pub ghosts: Option<GhostSpec>,
}

impl ExperimentStep {
    /// Build a step, splitting ghost trap coordinates out of the entries
    pub fn new(entries: Vec<StepEntry>) -> Self {
        let mut params = Vec::with_capacity(entries.len());
        let mut ghosts = GhostSpec::default();
        let mut has_ghosts = false;

        for entry in entries {
            let list = |v: &ParamValue| match v {
                ParamValue::List(l) => l.clone(),
                ParamValue::Float(f) => alloc::vec![*f],
                ParamValue::Int(i) => alloc::vec![*i as f32],
                _ => Vec::new(),
            };
            match ParamKey::parse(&entry.key) {
                Some(ParamKey::GhostTrapsX) => {
                    ghosts.x = list(&entry.value);
                    has_ghosts = true;
                }
                Some(ParamKey::GhostTrapsY) => {
                    ghosts.y = list(&entry.value);
                    has_ghosts = true;
                }
                Some(ParamKey::GhostTrapsZ) => ghosts.z = Some(list(&entry.value)),
                _ => params.push(entry),
            }
        }

        Self {
            entries: params,
            ghosts: (has_ghosts && !ghosts.is_empty()).then_some(ghosts),
        }
    }

    /// Measurement name, if the step sets one
    pub fn name(&self) -> Option<&str> {
        self.entries.iter().find_map(|e| match (&e.value, ParamKey::parse(&e.key)) {
            (ParamValue::Text(s), Some(ParamKey::MeasurementName)) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Applying this step will need a new phase mask
    pub fn touches_hologram(&self) -> bool {
        self.entries
            .iter()
            .filter_map(|e| ParamKey::parse(&e.key))
            .any(ParamKey::requires_new_phasemask)
    }
}

/// Ordered list of experiment steps
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExperimentSchedule {
    steps: Vec<ExperimentStep>,
}

impl ExperimentSchedule {
    pub fn new(steps: Vec<ExperimentStep>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ExperimentStep> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[ExperimentStep] {
        &self.steps
    }
}
