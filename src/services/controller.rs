use crate::camera::{CaptureBackend, MediaNamer};
use crate::messages::{ControllerCommand, RecordingState, TriggerEvent};
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// Timing parameters for the controller
#[derive(Clone, Copy, Debug)]
pub struct ControllerSettings {
    /// Delay between `MotionEnded` and the stop it causes
    pub grace: Duration,
    /// Optional hard limit on the length of one clip
    pub max_clip: Option<Duration>,
    /// Upper bound on every backend call
    pub backend_timeout: Duration,
}

/// Serializes trigger events into camera commands
///
/// This service:
/// - Owns the recording state and the exit flag, publishing both over watch channels
/// - Guarantees at most one recording at a time, whichever input asked for it
/// - Defers motion-end stops by the grace period, cancelled by any new start
/// - Logs backend failures and falls back to Idle instead of exiting
///
/// Stops are not tied to the input that started the recording: a video button
/// release ends a motion-started clip and vice versa.
pub struct Controller {
    backend: Box<dyn CaptureBackend>,
    namer: MediaNamer,
    settings: ControllerSettings,
    cmd_rx: mpsc::Receiver<ControllerCommand>,
    state: RecordingState,
    state_tx: watch::Sender<RecordingState>,
    exit_tx: watch::Sender<bool>,
    stop_at: Option<Instant>,
    clip_ends_at: Option<Instant>,
}

impl Controller {
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        namer: MediaNamer,
        settings: ControllerSettings,
        cmd_rx: mpsc::Receiver<ControllerCommand>,
    ) -> Self {
        let (state_tx, _) = watch::channel(RecordingState::Idle);
        let (exit_tx, _) = watch::channel(false);

        Self {
            backend,
            namer,
            settings,
            cmd_rx,
            state: RecordingState::Idle,
            state_tx,
            exit_tx,
            stop_at: None,
            clip_ends_at: None,
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RecordingState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_exit(&self) -> watch::Receiver<bool> {
        self.exit_tx.subscribe()
    }

    pub async fn run(mut self) {
        loop {
            let deadline = self.next_deadline();

            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ControllerCommand::Event(event)) => self.handle_event(event).await,
                    Some(ControllerCommand::Shutdown(reply)) => {
                        let result = self.shutdown().await;
                        let _ = reply.send(result);
                        break;
                    }
                    None => {
                        if let Err(e) = self.shutdown().await {
                            tracing::error!("Failed to release camera: {}", e);
                        }
                        break;
                    }
                },

                _ = sleep_until_deadline(deadline) => self.handle_deadline().await,
            }
        }

        tracing::debug!("Controller stopped");
    }

    async fn handle_event(&mut self, event: TriggerEvent) {
        tracing::debug!("handle_event: {:?} in state {:?}", event, self.state);

        match (self.state, event) {
            (_, TriggerEvent::ExitHeld) => self.request_exit(),

            (RecordingState::Idle, TriggerEvent::StillRequested) => self.take_still().await,
            (RecordingState::Recording, TriggerEvent::StillRequested) => {
                tracing::warn!("Busy recording, still capture skipped");
            }

            (
                RecordingState::Idle,
                TriggerEvent::VideoStartRequested | TriggerEvent::MotionStarted,
            ) => self.start_recording().await,
            (
                RecordingState::Recording,
                TriggerEvent::VideoStartRequested | TriggerEvent::MotionStarted,
            ) => {
                if self.stop_at.take().is_some() {
                    tracing::debug!("Pending stop cancelled by {:?}", event);
                }
            }

            (RecordingState::Recording, TriggerEvent::VideoStopRequested) => {
                self.stop_recording().await;
            }
            (RecordingState::Recording, TriggerEvent::MotionEnded) => {
                if self.stop_at.is_none() {
                    tracing::debug!("Motion ended, stopping in {:?}", self.settings.grace);
                    self.stop_at = Some(Instant::now() + self.settings.grace);
                }
            }

            (
                RecordingState::Idle,
                TriggerEvent::VideoStopRequested | TriggerEvent::MotionEnded,
            ) => {
                tracing::warn!("Not recording, ignoring {:?}", event);
            }
        }
    }

    async fn handle_deadline(&mut self) {
        let now = Instant::now();

        if self.stop_at.is_some_and(|at| at <= now) {
            tracing::debug!("Grace period elapsed");
            self.stop_recording().await;
        } else if self.clip_ends_at.is_some_and(|at| at <= now) {
            tracing::info!("Clip length limit reached");
            self.stop_recording().await;
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.stop_at, self.clip_ends_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn set_state(&mut self, state: RecordingState) {
        tracing::debug!("State {:?} -> {:?}", self.state, state);
        self.state = state;
        self.state_tx.send_replace(state);
    }

    fn request_exit(&mut self) {
        let changed = self.exit_tx.send_if_modified(|requested| {
            let first = !*requested;
            *requested = true;
            first
        });

        if changed {
            tracing::debug!("Exit requested");
        }
    }

    async fn take_still(&mut self) {
        let path = self.namer.next_still();
        tracing::info!("Click");

        let timeout = self.settings.backend_timeout;
        match guarded(timeout, "capture_still", self.backend.capture_still(&path)).await {
            Ok(()) => tracing::info!("Still saved to {:?}", path),
            Err(e) => tracing::error!("Failed to capture still {:?}: {}", path, e),
        }
    }

    async fn start_recording(&mut self) {
        let path = self.namer.next_video();
        tracing::info!("Action...");

        let timeout = self.settings.backend_timeout;
        match guarded(timeout, "start_recording", self.backend.start_recording(&path)).await {
            Ok(()) => {
                tracing::info!("Recording to {:?}", path);
                self.clip_ends_at = self.settings.max_clip.map(|limit| Instant::now() + limit);
                self.set_state(RecordingState::Recording);
            }
            Err(e) => tracing::error!("Failed to start recording {:?}: {}", path, e),
        }
    }

    async fn stop_recording(&mut self) {
        tracing::info!("Cut!");
        self.stop_at = None;
        self.clip_ends_at = None;
        self.set_state(RecordingState::Idle);

        let timeout = self.settings.backend_timeout;
        if let Err(e) = guarded(timeout, "stop_recording", self.backend.stop_recording()).await {
            tracing::error!("Failed to stop recording: {}", e);
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        if self.state == RecordingState::Recording {
            self.stop_recording().await;
        }

        let timeout = self.settings.backend_timeout;
        guarded(timeout, "shutdown", self.backend.shutdown()).await
    }
}

async fn guarded<T>(
    timeout: Duration,
    operation: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| anyhow::anyhow!("{} timed out after {:?}", operation, timeout))?
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Handle for communicating with the Controller
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControllerCommand>,
}

impl ControllerHandle {
    pub fn new(tx: mpsc::Sender<ControllerCommand>) -> Self {
        Self { tx }
    }

    pub async fn send_event(&self, event: TriggerEvent) -> Result<()> {
        self.tx
            .send(ControllerCommand::Event(event))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send event: {}", e))
    }

    /// Stop any active recording and release the camera
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControllerCommand::Shutdown(reply))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send shutdown command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive shutdown response: {}", e))?
    }
}
