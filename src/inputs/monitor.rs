use super::debounce::{Debouncer, Edge, HoldDetector, PresenceFilter};
use crate::messages::TriggerEvent;
use crate::services::ControllerHandle;
use anyhow::Result;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Logical activity of the three inputs at one sampling instant
///
/// `true` means active: a button is pressed or the sensor reports presence.
/// Electrical polarity is resolved by the level source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputLevels {
    pub still: bool,
    pub video: bool,
    pub motion: bool,
}

/// Anything that can be sampled for input levels
pub trait LevelSource: Send {
    fn read(&mut self) -> InputLevels;
}

/// Timing parameters for the input filters
#[derive(Clone, Copy, Debug)]
pub struct MonitorSettings {
    pub debounce: Duration,
    pub hold: Duration,
    pub motion_queue_len: usize,
    pub motion_threshold: f32,
}

/// Turns sampled levels into trigger events
///
/// - still: press edge emits `StillRequested`, a press held for `hold` emits
///   `ExitHeld` once
/// - video: press edge emits `VideoStartRequested`, release edge emits
///   `VideoStopRequested`
/// - motion: filtered rising edge emits `MotionStarted`, falling edge emits
///   `MotionEnded`
pub struct InputMonitor {
    still: Debouncer,
    still_hold: HoldDetector,
    video: Debouncer,
    motion: PresenceFilter,
}

impl InputMonitor {
    pub fn new(settings: MonitorSettings) -> Self {
        Self {
            still: Debouncer::new(settings.debounce),
            still_hold: HoldDetector::new(settings.hold),
            video: Debouncer::new(settings.debounce),
            motion: PresenceFilter::new(settings.motion_queue_len, settings.motion_threshold),
        }
    }

    pub fn sample(&mut self, levels: InputLevels, now: Instant) -> Vec<TriggerEvent> {
        let mut events = Vec::new();

        match self.still.update(levels.still, now) {
            Some(Edge::Activated) => {
                self.still_hold.press(now);
                events.push(TriggerEvent::StillRequested);
            }
            Some(Edge::Deactivated) => self.still_hold.release(),
            None => {}
        }
        if self.still_hold.poll(now) {
            events.push(TriggerEvent::ExitHeld);
        }

        match self.video.update(levels.video, now) {
            Some(Edge::Activated) => events.push(TriggerEvent::VideoStartRequested),
            Some(Edge::Deactivated) => events.push(TriggerEvent::VideoStopRequested),
            None => {}
        }

        match self.motion.update(levels.motion) {
            Some(Edge::Activated) => events.push(TriggerEvent::MotionStarted),
            Some(Edge::Deactivated) => events.push(TriggerEvent::MotionEnded),
            None => {}
        }

        events
    }
}

/// Sample `source` every `period` and forward events to the controller.
///
/// Returns when the controller stops accepting events.
pub async fn monitor_inputs<S: LevelSource>(
    mut source: S,
    mut monitor: InputMonitor,
    period: Duration,
    controller: ControllerHandle,
) -> Result<()> {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let now = ticker.tick().await;
        let levels = source.read();

        for event in monitor.sample(levels, now) {
            tracing::debug!("Input event: {:?}", event);
            if controller.send_event(event).await.is_err() {
                tracing::debug!("Controller gone, input monitor exiting");
                return Ok(());
            }
        }
    }
}
