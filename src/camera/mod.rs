pub mod commands;
pub mod controller;
pub mod loop_worker;
pub mod state;

pub use controller::{CameraController, CameraSupervisor};
pub use state::CameraView;
