//! Stage motion helpers
//!
//! Search scanning for new particles and focus drift compensation.

pub mod focus;
pub mod scan;

pub use focus::{compensate_focus, FocusReference};
pub use scan::ScanPattern;
