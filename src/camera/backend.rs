use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for the camera hardware driven by the controller
///
/// Implementations own whatever device or process handles they need. Every
/// call returns once the operation has taken effect:
/// - `capture_still` once the image file is written
/// - `start_recording` once the encode session is running
/// - `stop_recording` once the output file is finalized
#[async_trait]
pub trait CaptureBackend: Send {
    async fn capture_still(&mut self, path: &Path) -> Result<()>;

    async fn start_recording(&mut self, path: &Path) -> Result<()>;

    async fn stop_recording(&mut self) -> Result<()>;

    /// Release the camera before the process exits
    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
