use anyhow::Result;
use tokio::sync::oneshot;

/// Discrete events raised by the input monitor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerEvent {
    StillRequested,
    VideoStartRequested,
    VideoStopRequested,
    MotionStarted,
    MotionEnded,
    ExitHeld,
}

/// Commands for the Controller service
pub enum ControllerCommand {
    Event(TriggerEvent),
    Shutdown(oneshot::Sender<Result<()>>),
}

/// Recording state (observable via watch channel)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}
