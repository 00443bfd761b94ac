//! Experiment schedule files
//!
//! A schedule is a list of `[[experiment]]` tables. Every key becomes a
//! step entry; the update boundary in the core decides which keys are
//! known. Values the core cannot represent are skipped here and reported
//! back so the caller can log them.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use tweezer_core::experiment::{
    ExperimentSchedule, ExperimentStep, ParamValue, StepEntry, MAX_KEY_LEN,
};

use super::loader::{read, ConfigError};

#[derive(Debug, Deserialize)]
struct ScheduleFile {
    #[serde(default)]
    experiment: Vec<toml::Table>,
}

/// An entry left out of the schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub step: usize,
    pub key: String,
    pub reason: &'static str,
}

/// Parsed schedule plus whatever was skipped
#[derive(Debug, Clone, Default)]
pub struct LoadedSchedule {
    pub schedule: ExperimentSchedule,
    pub skipped: Vec<SkippedEntry>,
}

impl LoadedSchedule {
    /// Read and parse a schedule file, logging skipped entries
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let loaded = parse_schedule(&read(path)?)?;
        loaded.log(&path.display().to_string());
        Ok(loaded)
    }

    pub fn log(&self, source: &str) {
        for s in &self.skipped {
            warn!(step = s.step, key = %s.key, reason = s.reason, "Schedule entry skipped");
        }
        info!(source, steps = self.schedule.len(), "Schedule loaded");
    }
}

/// Parse a schedule document
pub fn parse_schedule(text: &str) -> Result<LoadedSchedule, ConfigError> {
    let file: ScheduleFile = toml::from_str(text)?;
    let mut skipped = Vec::new();

    let steps = file
        .experiment
        .iter()
        .enumerate()
        .map(|(step, table)| {
            let entries = table
                .iter()
                .filter_map(|(key, value)| match convert(key, value) {
                    Ok(value) => Some(StepEntry::new(key, value)),
                    Err(reason) => {
                        skipped.push(SkippedEntry {
                            step,
                            key: key.clone(),
                            reason,
                        });
                        None
                    }
                })
                .collect();
            ExperimentStep::new(entries)
        })
        .collect();

    Ok(LoadedSchedule {
        schedule: ExperimentSchedule::new(steps),
        skipped,
    })
}

fn convert(key: &str, value: &toml::Value) -> Result<ParamValue, &'static str> {
    if key.len() > MAX_KEY_LEN {
        return Err("key too long");
    }
    match value {
        toml::Value::Boolean(b) => Ok(ParamValue::Bool(*b)),
        toml::Value::Integer(i) => Ok(ParamValue::Int(*i)),
        toml::Value::Float(f) => Ok(ParamValue::Float(*f as f32)),
        toml::Value::String(s) => heapless::String::try_from(s.as_str())
            .map(ParamValue::Text)
            .map_err(|_| "text too long"),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                toml::Value::Integer(i) => Ok(*i as f32),
                toml::Value::Float(f) => Ok(*f as f32),
                _ => Err("array must be numeric"),
            })
            .collect::<Result<Vec<f32>, _>>()
            .map(ParamValue::List),
        toml::Value::Table(_) | toml::Value::Datetime(_) => Err("unsupported value type"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULE_TOML: &str = include_str!("../../schedule.toml");

    #[test]
    fn test_default_schedule_parses() {
        let loaded = parse_schedule(SCHEDULE_TOML).unwrap();
        assert_eq!(loaded.schedule.len(), 2);
        assert!(loaded.skipped.is_empty());

        let first = loaded.schedule.get(0).unwrap();
        assert_eq!(first.name(), Some("pair"));
        assert!(first.touches_hologram());
        assert!(first.ghosts.is_none());

        let second = loaded.schedule.get(1).unwrap();
        assert!(second.ghosts.is_some());
        assert!(!second.touches_hologram());
    }

    #[test]
    fn test_value_types() {
        let loaded = parse_schedule(
            r#"
            [[experiment]]
            use_lgo = true
            lgo_order = -8
            setpoint_temperature = 30.5
            xm = [100, 200.5]
            "#,
        )
        .unwrap();
        let step = loaded.schedule.get(0).unwrap();
        let value = |key: &str| {
            step.entries
                .iter()
                .find(|e| e.key.as_str() == key)
                .map(|e| e.value.clone())
        };
        assert_eq!(value("use_lgo"), Some(ParamValue::Bool(true)));
        assert_eq!(value("lgo_order"), Some(ParamValue::Int(-8)));
        assert_eq!(value("setpoint_temperature"), Some(ParamValue::Float(30.5)));
        assert_eq!(value("xm"), Some(ParamValue::List(vec![100.0, 200.5])));
    }

    #[test]
    fn test_unsupported_values_are_skipped() {
        let loaded = parse_schedule(
            r#"
            [[experiment]]
            xm = ["a", "b"]
            nested = { a = 1 }
            when = 1979-05-27
            recording_duration = 5
            "#,
        )
        .unwrap();
        assert_eq!(loaded.schedule.get(0).unwrap().entries.len(), 1);

        let mut keys: Vec<&str> = loaded.skipped.iter().map(|s| s.key.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["nested", "when", "xm"]);
        assert!(loaded.skipped.iter().all(|s| s.step == 0));
    }

    #[test]
    fn test_long_text_is_skipped() {
        let text = format!("[[experiment]]\nmeasurement_name = \"{}\"\n", "x".repeat(100));
        let loaded = parse_schedule(&text).unwrap();
        assert_eq!(loaded.skipped[0].reason, "text too long");
    }

    #[test]
    fn test_empty_document_has_no_steps() {
        let loaded = parse_schedule("").unwrap();
        assert!(loaded.schedule.is_empty());
    }

    #[test]
    fn test_malformed_schedule_is_an_error() {
        assert!(matches!(
            parse_schedule("[[experiment]\nxm = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
