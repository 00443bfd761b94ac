//! Camera and recorder task
//!
//! Captures a frame every period, runs particle detection and publishes
//! the detections together with the AOI they were measured in. Zoom,
//! snapshot and recording requests queued by the experiment task are
//! handled before each capture.

use embassy_time::{Duration, Ticker};
use tracing::{debug, info, warn};

use tweezer_core::config::DetectionConfig;
use tweezer_core::geometry::Aoi;
use tweezer_core::traits::{Camera, Detector, Recorder};
use tweezer_sim::{SimCamera, SimRecorder, ThresholdDetector};

use crate::store::{CameraCommand, ControlState};

/// Camera, detector and recorder owned by the camera task
pub struct CameraWorker<C, D, R> {
    camera: C,
    detector: D,
    recorder: R,
    detection: DetectionConfig,
    sensor: Aoi,
    /// Name of the running recording
    recording: Option<String>,
}

/// Worker over the simulated devices
pub type SimCameraWorker = CameraWorker<SimCamera, ThresholdDetector, SimRecorder>;

impl<C: Camera, D: Detector, R: Recorder> CameraWorker<C, D, R> {
    pub fn new(camera: C, detector: D, recorder: R, detection: DetectionConfig, sensor: Aoi) -> Self {
        Self {
            camera,
            detector,
            recorder,
            detection,
            sensor,
            recording: None,
        }
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn handle(&mut self, state: &ControlState, command: CameraCommand) {
        match command {
            CameraCommand::ZoomIn(aoi) => self.set_aoi(aoi),
            CameraCommand::ZoomOut => self.set_aoi(self.sensor),
            CameraCommand::StartRecording => {
                let name = state.measurement_name();
                match self.recorder.start(&name) {
                    Ok(()) => {
                        info!(name = %name, "Video recording started");
                        self.recording = Some(name);
                    }
                    Err(e) => warn!(error = ?e, "Failed to start recording"),
                }
            }
            CameraCommand::StopRecording => self.stop_recording(),
            CameraCommand::Snapshot(label) => {
                let name = self
                    .recording
                    .clone()
                    .unwrap_or_else(|| state.measurement_name());
                let result = self
                    .camera
                    .capture()
                    .map_err(|e| format!("{e:?}"))
                    .and_then(|frame| {
                        self.recorder
                            .snapshot(&frame, &name, label)
                            .map_err(|e| format!("{e:?}"))
                    });
                match result {
                    Ok(()) => debug!(name = %name, suffix = label.suffix(), "Snapshot saved"),
                    Err(e) => warn!(error = %e, "Snapshot failed"),
                }
            }
        }
    }

    fn set_aoi(&mut self, aoi: Aoi) {
        match self.camera.set_aoi(aoi) {
            Ok(()) => debug!(?aoi, "Camera AOI set"),
            Err(e) => warn!(?aoi, error = ?e, "Failed to set camera AOI"),
        }
    }

    fn stop_recording(&mut self) {
        if !self.recorder.is_recording() {
            return;
        }
        match self.recorder.stop() {
            Ok(frames) => info!(frames, "Video recording stopped"),
            Err(e) => warn!(error = ?e, "Failed to stop recording"),
        }
        self.recording = None;
    }

    /// Capture, detect and publish one frame
    pub fn frame(&mut self, state: &ControlState) {
        let frame = match self.camera.capture() {
            Ok(frame) => frame,
            Err(e) => {
                state.set_camera_connected(false);
                debug!(error = ?e, "Capture failed");
                return;
            }
        };
        state.set_camera_connected(true);

        let particles = self.detector.detect(&frame, &self.detection);
        state.update_detections(particles, frame.aoi);

        if self.recorder.is_recording() {
            if let Err(e) = self.recorder.write_frame(&frame) {
                warn!(error = ?e, "Dropped video frame");
            }
        }
    }

    pub fn shutdown(&mut self) {
        self.stop_recording();
        self.set_aoi(self.sensor);
    }
}

/// Camera task
#[embassy_executor::task]
pub async fn camera_task(state: &'static ControlState, mut worker: SimCameraWorker, interval: Duration) {
    let _guard = state.register_task("camera");
    info!("Camera task started");

    let mut ticker = Ticker::every(interval);
    while state.is_running() {
        while let Some(command) = state.next_camera_command() {
            worker.handle(state, command);
        }
        worker.frame(state);
        ticker.next().await;
    }

    worker.shutdown();
    info!(
        recordings = worker.recorder().finished().len(),
        "Camera task stopped"
    );
}
