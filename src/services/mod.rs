pub mod controller;

pub use controller::{Controller, ControllerHandle, ControllerSettings};
