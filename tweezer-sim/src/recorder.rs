//! Frame-counting recorder
//!
//! Keeps a summary of every recording and snapshot instead of encoding
//! video.

use tweezer_core::traits::{Frame, Recorder, RecorderError, SnapshotLabel};

/// A finished recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    pub name: String,
    pub frames: u32,
}

#[derive(Debug, Default)]
pub struct SimRecorder {
    active: Option<RecordingSummary>,
    finished: Vec<RecordingSummary>,
    snapshots: Vec<String>,
}

impl SimRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finished(&self) -> &[RecordingSummary] {
        &self.finished
    }

    /// Snapshot file stems, e.g. `run-a_pre`
    pub fn snapshots(&self) -> &[String] {
        &self.snapshots
    }
}

impl Recorder for SimRecorder {
    fn start(&mut self, name: &str) -> Result<(), RecorderError> {
        if let Some(previous) = self.active.take() {
            self.finished.push(previous);
        }
        self.active = Some(RecordingSummary {
            name: name.to_string(),
            frames: 0,
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<u32, RecorderError> {
        let recording = self.active.take().ok_or(RecorderError::NotRecording)?;
        let frames = recording.frames;
        self.finished.push(recording);
        Ok(frames)
    }

    fn write_frame(&mut self, _frame: &Frame) -> Result<(), RecorderError> {
        let recording = self.active.as_mut().ok_or(RecorderError::NotRecording)?;
        recording.frames += 1;
        Ok(())
    }

    fn snapshot(&mut self, _frame: &Frame, name: &str, label: SnapshotLabel) -> Result<(), RecorderError> {
        self.snapshots.push(format!("{}_{}", name, label.suffix()));
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweezer_core::geometry::Aoi;

    fn frame() -> Frame {
        Frame {
            aoi: Aoi::full(4, 4),
            pixels: vec![0; 16],
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_counts_frames() {
        let mut rec = SimRecorder::new();
        rec.start("run-a").unwrap();
        assert!(rec.is_recording());
        for _ in 0..3 {
            rec.write_frame(&frame()).unwrap();
        }
        assert_eq!(rec.stop(), Ok(3));
        assert!(!rec.is_recording());
        assert_eq!(
            rec.finished(),
            &[RecordingSummary {
                name: "run-a".into(),
                frames: 3
            }]
        );
    }

    #[test]
    fn test_write_without_recording() {
        let mut rec = SimRecorder::new();
        assert_eq!(rec.write_frame(&frame()), Err(RecorderError::NotRecording));
        assert_eq!(rec.stop(), Err(RecorderError::NotRecording));
    }

    #[test]
    fn test_snapshot_names() {
        let mut rec = SimRecorder::new();
        rec.snapshot(&frame(), "run-a", SnapshotLabel::Before).unwrap();
        rec.snapshot(&frame(), "run-a", SnapshotLabel::After).unwrap();
        assert_eq!(rec.snapshots(), &["run-a_pre".to_string(), "run-a_after".to_string()]);
    }
}
