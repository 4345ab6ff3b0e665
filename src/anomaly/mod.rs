pub mod commands;
pub mod controller;
pub mod state;

pub use controller::AnomalyController;
pub use state::{CameraId, Clip, DashboardState};
