//! Focus drift compensation
//!
//! Tilt of the sample and thermal expansion move the focal plane as the
//! stage travels. The z position that keeps the sample in focus is a
//! linear correction from the reference taken when the program started.

use crate::config::FocusConfig;

/// Stage and temperature state at program start
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FocusReference {
    /// z position in focus at the reference point (ticks)
    pub z_ticks: i32,
    pub x_mm: f32,
    pub y_mm: f32,
    /// Sample temperature, when a controller was connected
    pub temperature_c: Option<f32>,
}

/// z position (ticks) that keeps the sample in focus at `(x_mm, y_mm)`
///
/// The temperature term is dropped unless both the reference and the
/// current temperature are known.
pub fn compensate_focus(
    config: &FocusConfig,
    reference: &FocusReference,
    x_mm: f32,
    y_mm: f32,
    temperature_c: Option<f32>,
) -> i32 {
    let mut z = reference.z_ticks as f32
        + config.z_x_diff * (reference.x_mm - x_mm)
        + config.z_y_diff * (reference.y_mm - y_mm);

    if let (Some(t0), Some(t)) = (reference.temperature_c, temperature_c) {
        z += config.temperature_z_diff * (t - t0);
    }

    z as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> FocusReference {
        FocusReference {
            z_ticks: 100,
            x_mm: 10.0,
            y_mm: 5.0,
            temperature_c: Some(25.0),
        }
    }

    #[test]
    fn test_no_drift_keeps_reference() {
        let z = compensate_focus(&FocusConfig::default(), &reference(), 12.0, 3.0, Some(30.0));
        assert_eq!(z, 100);
    }

    #[test]
    fn test_linear_terms() {
        let config = FocusConfig {
            z_x_diff: 10.0,
            z_y_diff: -4.0,
            temperature_z_diff: -80.0,
        };
        // 100 + 10*(10-9) - 4*(5-6) - 80*(26-25)
        let z = compensate_focus(&config, &reference(), 9.0, 6.0, Some(26.0));
        assert_eq!(z, 100 + 10 + 4 - 80);
    }

    #[test]
    fn test_missing_temperature_drops_term() {
        let config = FocusConfig {
            temperature_z_diff: -80.0,
            ..FocusConfig::default()
        };
        assert_eq!(compensate_focus(&config, &reference(), 10.0, 5.0, None), 100);
    }
}
