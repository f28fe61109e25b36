use super::monitor::{InputLevels, LevelSource};
use crate::config::Bias;
use anyhow::{Context, Result};
use rppal::gpio::{Gpio, InputPin};

/// Input pins on the board's GPIO header
///
/// Both buttons short their pin to ground, so they use pull-ups and read
/// active-low. The motion sensor drives its pin high on presence.
pub struct GpioInputs {
    still: InputPin,
    video: InputPin,
    motion: InputPin,
}

impl GpioInputs {
    pub fn open(still_pin: u8, video_pin: u8, motion_pin: u8, motion_bias: Bias) -> Result<Self> {
        let gpio = Gpio::new().context("Failed to open GPIO")?;

        let still = gpio
            .get(still_pin)
            .with_context(|| format!("Failed to claim still button pin {}", still_pin))?
            .into_input_pullup();

        let video = gpio
            .get(video_pin)
            .with_context(|| format!("Failed to claim video button pin {}", video_pin))?
            .into_input_pullup();

        let motion = gpio
            .get(motion_pin)
            .with_context(|| format!("Failed to claim motion sensor pin {}", motion_pin))?;
        let motion = match motion_bias {
            Bias::PullUp => motion.into_input_pullup(),
            Bias::PullDown => motion.into_input_pulldown(),
            Bias::None => motion.into_input(),
        };

        tracing::info!(
            "GPIO inputs ready (still: {}, video: {}, motion: {})",
            still_pin,
            video_pin,
            motion_pin
        );

        Ok(Self {
            still,
            video,
            motion,
        })
    }
}

impl LevelSource for GpioInputs {
    fn read(&mut self) -> InputLevels {
        InputLevels {
            still: self.still.is_low(),
            video: self.video.is_low(),
            motion: self.motion.is_high(),
        }
    }
}
