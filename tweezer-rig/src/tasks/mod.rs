//! Embassy async tasks
//!
//! Each task owns one collaborator and talks to the others through the
//! control state store.

pub mod camera;
pub mod experiment;
pub mod slm;
pub mod stage;
pub mod supervisor;
pub mod temperature;

pub use camera::{camera_task, CameraWorker};
pub use experiment::experiment_task;
pub use slm::slm_task;
pub use stage::{stage_task, StageWorker};
pub use supervisor::supervise;
pub use temperature::{temperature_task, TemperatureWorker};
