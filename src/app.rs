use crate::camera::{MediaNamer, RpicamBackend};
use crate::config::Config;
use crate::inputs::{self, GpioInputs, InputMonitor, MonitorSettings};
use crate::messages::{ControllerCommand, RecordingState};
use crate::services::{Controller, ControllerHandle, ControllerSettings};

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

enum ExitReason {
    ShutterHeld,
    Interrupted,
}

pub struct App {
    controller: ControllerHandle,
    controller_task: JoinHandle<()>,
    monitor_task: JoinHandle<Result<()>>,
    exit_rx: watch::Receiver<bool>,
    state_rx: watch::Receiver<RecordingState>,
    exit_poll: Duration,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let namer = Self::setup_output_dirs(&config)?;
        let (controller, controller_tx) = Self::setup_controller(&config, namer);

        let app = Self::assemble(
            controller,
            controller_tx,
            |handle| Self::setup_input_monitoring(&config, handle),
            config.exit_poll(),
        )?;

        tracing::info!(
            "Ready! Video button on pin {}, still button on pin {} (hold {}s to exit), motion on pin {}",
            config.video_pin,
            config.still_pin,
            config.hold_secs,
            config.motion_pin
        );

        Ok(app)
    }

    /// Spawn the controller, then start the inputs feeding it
    fn assemble(
        controller: Controller,
        controller_tx: mpsc::Sender<ControllerCommand>,
        start_inputs: impl FnOnce(ControllerHandle) -> Result<JoinHandle<Result<()>>>,
        exit_poll: Duration,
    ) -> Result<Self> {
        let exit_rx = controller.subscribe_exit();
        let state_rx = controller.subscribe_state();
        let controller_task = tokio::spawn(controller.run());

        let handle = ControllerHandle::new(controller_tx);
        let monitor_task = start_inputs(handle.clone())?;

        Ok(Self {
            controller: handle,
            controller_task,
            monitor_task,
            exit_rx,
            state_rx,
            exit_poll,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        tracing::info!("Smile :-)");

        match self.wait_for_exit().await {
            ExitReason::ShutterHeld => tracing::info!("Shutter-Release Held - Time to exit."),
            ExitReason::Interrupted => tracing::info!("Okay, I'll quit now."),
        }

        self.shutdown().await
    }

    async fn wait_for_exit(&mut self) -> ExitReason {
        let mut ticker = tokio::time::interval(self.exit_poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *self.exit_rx.borrow() {
                        return ExitReason::ShutterHeld;
                    }
                }
                _ = &mut ctrl_c => {
                    return ExitReason::Interrupted;
                }
            }
        }
    }

    async fn shutdown(self) -> Result<()> {
        // Release the pins first so no event arrives mid-shutdown
        self.monitor_task.abort();
        match self.monitor_task.await {
            Ok(Err(e)) => tracing::warn!("Input monitor failed: {}", e),
            Ok(Ok(())) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::warn!("Input monitor panicked: {}", e),
        }

        if *self.state_rx.borrow() == RecordingState::Recording {
            tracing::info!("Finishing the recording in progress");
        }

        if let Err(e) = self.controller.shutdown().await {
            tracing::error!("Error releasing camera: {}", e);
        }
        drop(self.controller);

        self.controller_task
            .await
            .context("Controller task panicked")?;

        tracing::info!("MoCam shutdown complete");
        Ok(())
    }

    fn setup_output_dirs(config: &Config) -> Result<MediaNamer> {
        let pictures_dir = config.pictures_dir()?;
        let videos_dir = config.videos_dir()?;

        for dir in [&pictures_dir, &videos_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
        }

        tracing::info!("Stills go to {:?}, videos to {:?}", pictures_dir, videos_dir);
        Ok(MediaNamer::new(pictures_dir, videos_dir))
    }

    fn setup_controller(
        config: &Config,
        namer: MediaNamer,
    ) -> (Controller, mpsc::Sender<ControllerCommand>) {
        let backend = RpicamBackend::new(
            config.still_command.clone(),
            config.video_command.clone(),
            config.video_bitrate,
            config.video_stop_timeout(),
        );

        let settings = ControllerSettings {
            grace: config.grace(),
            max_clip: config.max_clip(),
            backend_timeout: config.backend_timeout(),
        };

        let (controller_tx, controller_rx) = mpsc::channel(10);
        let controller = Controller::new(Box::new(backend), namer, settings, controller_rx);

        (controller, controller_tx)
    }

    fn setup_input_monitoring(
        config: &Config,
        controller: ControllerHandle,
    ) -> Result<JoinHandle<Result<()>>> {
        let source = GpioInputs::open(
            config.still_pin,
            config.video_pin,
            config.motion_pin,
            config.motion_bias,
        )?;

        let monitor = InputMonitor::new(MonitorSettings {
            debounce: config.debounce(),
            hold: config.hold(),
            motion_queue_len: config.motion_queue_len,
            motion_threshold: config.motion_threshold,
        });

        Ok(tokio::spawn(inputs::monitor_inputs(
            source,
            monitor,
            config.sample_interval(),
            controller,
        )))
    }
}
