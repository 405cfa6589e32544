pub mod bus;
pub mod config;
pub mod controller;

pub use config::ControllerSettings;
pub use controller::{ControllerError, ControllerHandle, LogicalButton};
