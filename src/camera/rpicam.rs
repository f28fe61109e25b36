use super::backend::CaptureBackend;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Camera backend driving the board's `rpicam-*` programs
///
/// Stills run the still program to completion. Video spawns the video program
/// with no time limit and keeps the child until `stop_recording`, which sends
/// it an interrupt so the container gets finalized, then waits for it to exit.
/// A child that ignores the interrupt is killed once `stop_timeout` expires.
pub struct RpicamBackend {
    still_command: String,
    video_command: String,
    video_bitrate: u32,
    stop_timeout: Duration,
    recording: Option<Child>,
}

impl RpicamBackend {
    pub fn new(
        still_command: String,
        video_command: String,
        video_bitrate: u32,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            still_command,
            video_command,
            video_bitrate,
            stop_timeout,
            recording: None,
        }
    }

    fn still_args(path: &Path) -> Vec<String> {
        vec![
            "-n".to_string(),
            "-o".to_string(),
            path.to_string_lossy().into_owned(),
        ]
    }

    fn video_args(&self, path: &Path) -> Vec<String> {
        vec![
            "-n".to_string(),
            "-t".to_string(),
            "0".to_string(),
            "--codec".to_string(),
            "libav".to_string(),
            "--bitrate".to_string(),
            self.video_bitrate.to_string(),
            "-o".to_string(),
            path.to_string_lossy().into_owned(),
        ]
    }

    async fn interrupt(child: &Child) -> Result<()> {
        let pid = child.id().context("Video process has already been reaped")?;

        let status = Command::new("kill")
            .arg("-INT")
            .arg(pid.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .context("Failed to run kill")?;

        if !status.success() {
            return Err(anyhow::anyhow!("kill -INT {} exited with {}", pid, status));
        }

        Ok(())
    }
}

#[async_trait]
impl CaptureBackend for RpicamBackend {
    async fn capture_still(&mut self, path: &Path) -> Result<()> {
        tracing::debug!("Running {} for {:?}", self.still_command, path);

        let output = Command::new(&self.still_command)
            .args(Self::still_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to spawn {}", self.still_command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "{} exited with {}: {}",
                self.still_command,
                output.status,
                stderr.trim()
            ));
        }

        Ok(())
    }

    async fn start_recording(&mut self, path: &Path) -> Result<()> {
        if self.recording.is_some() {
            return Err(anyhow::anyhow!("A recording session is already running"));
        }

        tracing::debug!("Spawning {} for {:?}", self.video_command, path);

        let mut child = Command::new(&self.video_command)
            .args(self.video_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.video_command))?;

        if let Some(status) = child
            .try_wait()
            .context("Failed to poll video process")?
        {
            return Err(anyhow::anyhow!(
                "{} exited immediately with {}",
                self.video_command,
                status
            ));
        }

        self.recording = Some(child);
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<()> {
        let mut child = self
            .recording
            .take()
            .context("No recording session is running")?;

        if let Err(e) = Self::interrupt(&child).await {
            tracing::warn!("Failed to interrupt video process: {}", e);
        }

        match tokio::time::timeout(self.stop_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!("{} exited with {}", self.video_command, status);
                Ok(())
            }
            Ok(Err(e)) => Err(anyhow::anyhow!("Failed to wait on video process: {}", e)),
            Err(_) => {
                child.kill().await.context("Failed to kill video process")?;
                Err(anyhow::anyhow!(
                    "{} did not finish within {:?} and was killed",
                    self.video_command,
                    self.stop_timeout
                ))
            }
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        if self.recording.is_some() {
            self.stop_recording().await?;
        }
        Ok(())
    }
}
