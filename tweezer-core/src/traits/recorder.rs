//! Video recorder trait

use super::camera::Frame;

/// Errors from the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecorderError {
    /// No recording in progress
    NotRecording,
    /// Storage could not be written
    Io,
}

/// Snapshots taken around each recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SnapshotLabel {
    /// Full field of view before zooming in
    Before,
    /// Full field of view after zooming out
    After,
}

impl SnapshotLabel {
    pub fn suffix(self) -> &'static str {
        match self {
            SnapshotLabel::Before => "pre",
            SnapshotLabel::After => "after",
        }
    }
}

/// Trait for frame recorders
pub trait Recorder {
    /// Begin a new recording
    fn start(&mut self, name: &str) -> Result<(), RecorderError>;

    /// Finish the recording, returning the number of frames written
    fn stop(&mut self) -> Result<u32, RecorderError>;

    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecorderError>;

    fn snapshot(&mut self, frame: &Frame, name: &str, label: SnapshotLabel) -> Result<(), RecorderError>;

    fn is_recording(&self) -> bool;
}
