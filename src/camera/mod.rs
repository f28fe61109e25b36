pub mod backend;
#[cfg(test)]
pub mod mock;
pub mod naming;
pub mod rpicam;

pub use backend::CaptureBackend;
pub use naming::MediaNamer;
pub use rpicam::RpicamBackend;
