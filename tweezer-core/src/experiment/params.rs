//! Schedulable experiment parameters
//!
//! Steps carry loosely typed `StepEntry` values as read from a schedule
//! file. `ExperimentParameters::apply` is the update boundary: known keys
//! are converted and stored, anything else is rejected entry by entry
//! without aborting the rest of the update.

use alloc::vec;
use alloc::vec::Vec;
use heapless::String;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::{Axis, PixelBound, SlmCalibration};

/// Maximum stored key length
pub const MAX_KEY_LEN: usize = 32;

/// Maximum measurement name length
pub const MAX_NAME_LEN: usize = 64;

/// A loosely typed parameter value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Text(String<MAX_NAME_LEN>),
    List(Vec<f32>),
}

impl ParamValue {
    fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    fn as_f32(&self) -> Option<f32> {
        match self {
            ParamValue::Int(i) => Some(*i as f32),
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn as_i32(&self) -> Option<i32> {
        match self {
            ParamValue::Int(i) => i32::try_from(*i).ok(),
            ParamValue::Float(f) => Some(*f as i32),
            _ => None,
        }
    }

    fn as_list(&self) -> Option<Vec<f32>> {
        match self {
            ParamValue::List(v) => Some(v.clone()),
            other => other.as_f32().map(|x| vec![x]),
        }
    }
}

/// One `key = value` entry of an experiment step
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepEntry {
    pub key: String<MAX_KEY_LEN>,
    pub value: ParamValue,
}

impl StepEntry {
    /// Create an entry; keys longer than `MAX_KEY_LEN` are cut short
    pub fn new(key: &str, value: ParamValue) -> Self {
        let mut k = String::new();
        for c in key.chars() {
            if k.push(c).is_err() {
                break;
            }
        }
        Self { key: k, value }
    }
}

/// Parameter keys accepted at the update boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParamKey {
    Xm,
    Ym,
    Zm,
    UseLgo,
    LgoOrder,
    SetpointTemperature,
    RecordingDuration,
    TargetExperimentZ,
    SlmIterations,
    TemperatureOutputOn,
    ActivateTrapsOneByOne,
    NeedTStable,
    MeasurementName,
    /// Precomputed phase masks are not supported
    Phasemask,
    GhostTrapsX,
    GhostTrapsY,
    GhostTrapsZ,
}

impl ParamKey {
    const NAMES: [(&'static str, ParamKey); 17] = [
        ("xm", ParamKey::Xm),
        ("ym", ParamKey::Ym),
        ("zm", ParamKey::Zm),
        ("use_lgo", ParamKey::UseLgo),
        ("lgo_order", ParamKey::LgoOrder),
        ("setpoint_temperature", ParamKey::SetpointTemperature),
        ("recording_duration", ParamKey::RecordingDuration),
        ("target_experiment_z", ParamKey::TargetExperimentZ),
        ("slm_iterations", ParamKey::SlmIterations),
        ("temperature_output_on", ParamKey::TemperatureOutputOn),
        ("activate_traps_one_by_one", ParamKey::ActivateTrapsOneByOne),
        ("need_t_stable", ParamKey::NeedTStable),
        ("measurement_name", ParamKey::MeasurementName),
        ("phasemask", ParamKey::Phasemask),
        ("ghost_traps_x", ParamKey::GhostTrapsX),
        ("ghost_traps_y", ParamKey::GhostTrapsY),
        ("ghost_traps_z", ParamKey::GhostTrapsZ),
    ];

    /// Look up a key, ignoring ASCII case (`use_LGO` and `use_lgo` match)
    pub fn parse(key: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, k)| *k)
    }

    /// Changing this key invalidates the current phase mask
    pub fn requires_new_phasemask(self) -> bool {
        matches!(
            self,
            ParamKey::UseLgo
                | ParamKey::LgoOrder
                | ParamKey::Xm
                | ParamKey::Ym
                | ParamKey::Zm
                | ParamKey::SlmIterations
        )
    }

    /// Ghost trap coordinates are split off into the step's ghost spec
    pub fn is_ghost(self) -> bool {
        matches!(
            self,
            ParamKey::GhostTrapsX | ParamKey::GhostTrapsY | ParamKey::GhostTrapsZ
        )
    }
}

/// Why a step entry was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RejectReason {
    UnknownKey,
    TypeMismatch,
    Unsupported,
}

/// A rejected step entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub key: String<MAX_KEY_LEN>,
    pub reason: RejectReason,
}

/// Trap coordinate lists that had to be shortened to match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Truncation {
    /// The axis whose list was cut
    pub axis: Axis,
    pub from: usize,
    pub to: usize,
}

/// Outcome of applying a step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Entries stored
    pub applied: usize,
    pub rejected: Vec<Rejection>,
    pub truncated: Option<Truncation>,
    /// Some applied key changes the hologram
    pub needs_phasemask: bool,
    /// Trap coordinates were given in pixels and converted
    pub converted_pixels: bool,
}

/// Live experiment parameter set
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentParameters {
    /// Trap x positions in device units
    pub xm: Vec<f32>,
    /// Trap y positions in device units
    pub ym: Vec<f32>,
    /// Trap defocus per trap
    pub zm: Vec<f32>,
    pub use_lgo: bool,
    pub lgo_order: i32,
    pub setpoint_temperature_c: f32,
    pub recording_duration_s: f32,
    /// Lift height above the focus start (z ticks)
    pub target_experiment_z: i32,
    pub slm_iterations: u32,
    pub temperature_output_on: bool,
    pub activate_traps_one_by_one: bool,
    pub need_t_stable: bool,
    pub measurement_name: String<MAX_NAME_LEN>,
}

impl Default for ExperimentParameters {
    fn default() -> Self {
        // One trap near the top-left of the field of view
        let cal = SlmCalibration::default();
        Self {
            xm: vec![cal.pixel_to_device(Axis::X, 100.0)],
            ym: vec![cal.pixel_to_device(Axis::Y, 200.0)],
            zm: vec![0.0],
            use_lgo: false,
            lgo_order: -8,
            setpoint_temperature_c: 25.0,
            recording_duration_s: 3000.0,
            target_experiment_z: 150,
            slm_iterations: 5,
            temperature_output_on: true,
            activate_traps_one_by_one: false,
            need_t_stable: false,
            measurement_name: String::new(),
        }
    }
}

impl ExperimentParameters {
    /// Number of programmed traps
    pub fn trap_count(&self) -> usize {
        self.xm.len()
    }

    /// Recording duration in milliseconds
    pub fn recording_duration_ms(&self) -> u64 {
        (self.recording_duration_s.max(0.0) * 1000.0) as u64
    }

    /// Apply a step's entries
    ///
    /// Ghost trap keys are ignored here; they belong to the step's ghost
    /// spec. After all entries are stored, mismatched `xm`/`ym` lengths
    /// are cut to the shorter list and `zm` is padded with zeros or cut
    /// to the same length.
    pub fn apply(&mut self, entries: &[StepEntry], calibration: &SlmCalibration) -> ApplyReport {
        let mut report = ApplyReport::default();

        for entry in entries {
            let Some(key) = ParamKey::parse(&entry.key) else {
                report.rejected.push(Rejection {
                    key: entry.key.clone(),
                    reason: RejectReason::UnknownKey,
                });
                continue;
            };
            if key.is_ghost() {
                continue;
            }

            match self.store(key, &entry.value, calibration, &mut report) {
                Ok(()) => {
                    report.applied += 1;
                    report.needs_phasemask |= key.requires_new_phasemask();
                }
                Err(reason) => report.rejected.push(Rejection {
                    key: entry.key.clone(),
                    reason,
                }),
            }
        }

        let (nx, ny) = (self.xm.len(), self.ym.len());
        if nx > ny {
            self.xm.truncate(ny);
            report.truncated = Some(Truncation { axis: Axis::X, from: nx, to: ny });
        } else if ny > nx {
            self.ym.truncate(nx);
            report.truncated = Some(Truncation { axis: Axis::Y, from: ny, to: nx });
        }
        self.zm.resize(self.xm.len(), 0.0);

        report
    }

    fn store(
        &mut self,
        key: ParamKey,
        value: &ParamValue,
        calibration: &SlmCalibration,
        report: &mut ApplyReport,
    ) -> Result<(), RejectReason> {
        use ParamKey::*;
        let mismatch = RejectReason::TypeMismatch;

        match key {
            Xm | Ym => {
                let mut list = value.as_list().ok_or(mismatch)?;
                let axis = if key == Xm { Axis::X } else { Axis::Y };
                report.converted_pixels |=
                    calibration.normalize(axis, &mut list, PixelBound::AboveOne);
                if key == Xm {
                    self.xm = list;
                } else {
                    self.ym = list;
                }
            }
            Zm => self.zm = value.as_list().ok_or(mismatch)?,
            UseLgo => self.use_lgo = value.as_bool().ok_or(mismatch)?,
            LgoOrder => self.lgo_order = value.as_i32().ok_or(mismatch)?,
            SetpointTemperature => self.setpoint_temperature_c = value.as_f32().ok_or(mismatch)?,
            RecordingDuration => self.recording_duration_s = value.as_f32().ok_or(mismatch)?,
            TargetExperimentZ => self.target_experiment_z = value.as_i32().ok_or(mismatch)?,
            SlmIterations => {
                let n = value.as_i32().ok_or(mismatch)?;
                self.slm_iterations = u32::try_from(n).map_err(|_| mismatch)?;
            }
            TemperatureOutputOn => self.temperature_output_on = value.as_bool().ok_or(mismatch)?,
            ActivateTrapsOneByOne => {
                self.activate_traps_one_by_one = value.as_bool().ok_or(mismatch)?
            }
            NeedTStable => self.need_t_stable = value.as_bool().ok_or(mismatch)?,
            MeasurementName => match value {
                ParamValue::Text(s) => self.measurement_name = s.clone(),
                _ => return Err(mismatch),
            },
            Phasemask => return Err(RejectReason::Unsupported),
            GhostTrapsX | GhostTrapsY | GhostTrapsZ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> ParamValue {
        ParamValue::Text(String::try_from(s).unwrap())
    }

    #[test]
    fn test_key_parse_ignores_case() {
        assert_eq!(ParamKey::parse("use_LGO"), Some(ParamKey::UseLgo));
        assert_eq!(ParamKey::parse("SLM_iterations"), Some(ParamKey::SlmIterations));
        assert_eq!(ParamKey::parse("need_T_stable"), Some(ParamKey::NeedTStable));
        assert_eq!(ParamKey::parse("bogus"), None);
    }

    #[test]
    fn test_apply_known_keys() {
        let mut p = ExperimentParameters::default();
        let report = p.apply(
            &[
                StepEntry::new("recording_duration", ParamValue::Int(600)),
                StepEntry::new("target_experiment_z", ParamValue::Float(200.0)),
                StepEntry::new("measurement_name", text("run-a")),
                StepEntry::new("need_T_stable", ParamValue::Bool(true)),
            ],
            &SlmCalibration::default(),
        );
        assert_eq!(report.applied, 4);
        assert!(report.rejected.is_empty());
        assert!(!report.needs_phasemask);
        assert_eq!(p.recording_duration_ms(), 600_000);
        assert_eq!(p.target_experiment_z, 200);
        assert_eq!(p.measurement_name.as_str(), "run-a");
        assert!(p.need_t_stable);
    }

    #[test]
    fn test_unknown_and_bad_entries_rejected_individually() {
        let mut p = ExperimentParameters::default();
        let report = p.apply(
            &[
                StepEntry::new("laser_power", ParamValue::Int(3)),
                StepEntry::new("lgo_order", text("four")),
                StepEntry::new("phasemask", ParamValue::List(vec![0.0])),
                StepEntry::new("LGO_order", ParamValue::Int(4)),
            ],
            &SlmCalibration::default(),
        );
        assert_eq!(report.applied, 1);
        let reasons: Vec<_> = report.rejected.iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            vec![
                RejectReason::UnknownKey,
                RejectReason::TypeMismatch,
                RejectReason::Unsupported
            ]
        );
        assert_eq!(p.lgo_order, 4);
        assert!(report.needs_phasemask);
    }

    #[test]
    fn test_mismatched_coordinates_truncated() {
        let mut p = ExperimentParameters::default();
        let report = p.apply(
            &[
                StepEntry::new("xm", ParamValue::List(vec![1e-5, 2e-5, 3e-5])),
                StepEntry::new("ym", ParamValue::List(vec![0.0, 1e-5])),
            ],
            &SlmCalibration::default(),
        );
        assert_eq!(
            report.truncated,
            Some(Truncation { axis: Axis::X, from: 3, to: 2 })
        );
        assert_eq!(p.xm.len(), 2);
        assert_eq!(p.zm, vec![0.0, 0.0]);
        assert!(report.needs_phasemask);
    }

    #[test]
    fn test_pixel_coordinates_converted() {
        let mut p = ExperimentParameters::default();
        let report = p.apply(
            &[
                StepEntry::new("xm", ParamValue::List(vec![558.0, 608.0])),
                StepEntry::new("ym", ParamValue::List(vec![576.0, 576.0])),
            ],
            &SlmCalibration::default(),
        );
        assert!(report.converted_pixels);
        assert_eq!(p.xm[0], 0.0);
        assert!((p.xm[1] - 1e-5).abs() < 1e-9);
        assert_eq!(p.ym, vec![0.0, 0.0]);
    }

    #[test]
    fn test_ghost_keys_left_to_step() {
        let mut p = ExperimentParameters::default();
        let report = p.apply(
            &[StepEntry::new("ghost_traps_x", ParamValue::List(vec![300.0]))],
            &SlmCalibration::default(),
        );
        assert_eq!(report.applied, 0);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_long_key_is_cut() {
        let e = StepEntry::new(
            "a_really_long_parameter_name_that_overflows",
            ParamValue::Bool(true),
        );
        assert_eq!(e.key.len(), MAX_KEY_LEN);
    }
}
