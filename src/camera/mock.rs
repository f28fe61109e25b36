use super::backend::CaptureBackend;
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// A backend call as seen by the mock
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Still(PathBuf),
    Start(PathBuf),
    Stop,
    Shutdown,
}

pub type CallLog = Arc<Mutex<Vec<(Call, Instant)>>>;

/// Camera backend that records every call with its time
#[derive(Default)]
pub struct MockBackend {
    pub log: CallLog,
    pub fail_starts: usize,
    pub fail_stops: usize,
    pub start_delay: Option<Duration>,
}

impl MockBackend {
    fn record(&self, call: Call) {
        self.log.lock().unwrap().push((call, Instant::now()));
    }
}

/// Calls in the order they were made
pub fn calls(log: &CallLog) -> Vec<Call> {
    log.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
}

#[async_trait]
impl CaptureBackend for MockBackend {
    async fn capture_still(&mut self, path: &Path) -> Result<()> {
        self.record(Call::Still(path.to_path_buf()));
        Ok(())
    }

    async fn start_recording(&mut self, path: &Path) -> Result<()> {
        if let Some(delay) = self.start_delay.take() {
            tokio::time::sleep(delay).await;
        }
        self.record(Call::Start(path.to_path_buf()));
        if self.fail_starts > 0 {
            self.fail_starts -= 1;
            return Err(anyhow::anyhow!("encoder fault"));
        }
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<()> {
        self.record(Call::Stop);
        if self.fail_stops > 0 {
            self.fail_stops -= 1;
            return Err(anyhow::anyhow!("storage full"));
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.record(Call::Shutdown);
        Ok(())
    }
}
