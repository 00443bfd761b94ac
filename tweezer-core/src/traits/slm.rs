//! Hologram (SLM) service trait

use crate::experiment::{DeviceTrap, ExperimentParameters};

/// Errors from the hologram service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlmError {
    NotConnected,
    /// Phase mask computation failed
    RenderFailed,
}

/// Beam shaping settings for a render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HologramSettings {
    /// Laguerre-Gauss beams instead of plain spots
    pub use_lgo: bool,
    pub lgo_order: i32,
    /// Phase retrieval iterations
    pub iterations: u32,
}

impl From<&ExperimentParameters> for HologramSettings {
    fn from(p: &ExperimentParameters) -> Self {
        Self {
            use_lgo: p.use_lgo,
            lgo_order: p.lgo_order,
            iterations: p.slm_iterations,
        }
    }
}

/// Trait for hologram generators
///
/// `render` returns once the new phase mask is displayed.
pub trait HologramService {
    fn render(&mut self, traps: &[DeviceTrap], settings: &HologramSettings) -> Result<(), SlmError>;
}
