use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for every configured delay, one day
const MAX_TIMING_SECS: f64 = 86_400.0;

/// Bias applied to an input pin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    PullUp,
    PullDown,
    None,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_still_pin")]
    pub still_pin: u8,

    #[serde(default = "default_video_pin")]
    pub video_pin: u8,

    #[serde(default = "default_motion_pin")]
    pub motion_pin: u8,

    #[serde(default = "default_motion_bias")]
    pub motion_bias: Bias,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    #[serde(default = "default_motion_queue_len")]
    pub motion_queue_len: usize,

    #[serde(default = "default_motion_threshold")]
    pub motion_threshold: f32,

    #[serde(default = "default_hold_secs")]
    pub hold_secs: f64,

    #[serde(default = "default_grace_secs")]
    pub grace_secs: f64,

    #[serde(default)]
    pub max_clip_secs: Option<f64>,

    #[serde(default = "default_exit_poll_ms")]
    pub exit_poll_ms: u64,

    #[serde(default)]
    pub pictures_dir: Option<PathBuf>,

    #[serde(default)]
    pub videos_dir: Option<PathBuf>,

    #[serde(default = "default_still_command")]
    pub still_command: String,

    #[serde(default = "default_video_command")]
    pub video_command: String,

    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: u32,

    #[serde(default = "default_backend_timeout_secs")]
    pub backend_timeout_secs: u64,
}

fn default_still_pin() -> u8 {
    21
}

fn default_video_pin() -> u8 {
    20
}

fn default_motion_pin() -> u8 {
    16
}

fn default_motion_bias() -> Bias {
    Bias::PullUp
}

fn default_debounce_ms() -> u64 {
    20
}

fn default_sample_interval_ms() -> u64 {
    10
}

fn default_motion_queue_len() -> usize {
    1
}

fn default_motion_threshold() -> f32 {
    0.5
}

fn default_hold_secs() -> f64 {
    3.0
}

fn default_grace_secs() -> f64 {
    1.0
}

fn default_exit_poll_ms() -> u64 {
    100
}

fn default_still_command() -> String {
    "rpicam-still".to_string()
}

fn default_video_command() -> String {
    "rpicam-vid".to_string()
}

fn default_video_bitrate() -> u32 {
    10_000_000
}

fn default_backend_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            still_pin: default_still_pin(),
            video_pin: default_video_pin(),
            motion_pin: default_motion_pin(),
            motion_bias: default_motion_bias(),
            debounce_ms: default_debounce_ms(),
            sample_interval_ms: default_sample_interval_ms(),
            motion_queue_len: default_motion_queue_len(),
            motion_threshold: default_motion_threshold(),
            hold_secs: default_hold_secs(),
            grace_secs: default_grace_secs(),
            max_clip_secs: None,
            exit_poll_ms: default_exit_poll_ms(),
            pictures_dir: None,
            videos_dir: None,
            still_command: default_still_command(),
            video_command: default_video_command(),
            video_bitrate: default_video_bitrate(),
            backend_timeout_secs: default_backend_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/mocam/config.json)
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    /// Save configuration to the given path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            home_dir()?.join(".config")
        };

        Ok(config_dir.join("mocam").join("config.json"))
    }

    /// Directory for still images, `~/Pictures` unless overridden
    pub fn pictures_dir(&self) -> Result<PathBuf> {
        match &self.pictures_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(home_dir()?.join("Pictures")),
        }
    }

    /// Directory for video clips, `~/Videos` unless overridden
    pub fn videos_dir(&self) -> Result<PathBuf> {
        match &self.videos_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(home_dir()?.join("Videos")),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_secs_f64(self.hold_secs)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs_f64(self.grace_secs)
    }

    pub fn max_clip(&self) -> Option<Duration> {
        self.max_clip_secs.map(Duration::from_secs_f64)
    }

    pub fn exit_poll(&self) -> Duration {
        Duration::from_millis(self.exit_poll_ms)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// How long the video program gets to finalize its file after an interrupt.
    /// Shorter than `backend_timeout` so the backend's own kill fallback runs
    /// before the controller gives up on the call.
    pub fn video_stop_timeout(&self) -> Duration {
        self.backend_timeout() / 2
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.still_pin == self.video_pin
            || self.still_pin == self.motion_pin
            || self.video_pin == self.motion_pin
        {
            return Err(anyhow::anyhow!(
                "still_pin, video_pin and motion_pin must be distinct"
            ));
        }

        if !(self.hold_secs > 0.0 && self.hold_secs <= MAX_TIMING_SECS) {
            return Err(anyhow::anyhow!(
                "hold_secs must be positive and at most {}",
                MAX_TIMING_SECS
            ));
        }

        if !(self.grace_secs >= 0.0 && self.grace_secs <= MAX_TIMING_SECS) {
            return Err(anyhow::anyhow!(
                "grace_secs must be between 0 and {}",
                MAX_TIMING_SECS
            ));
        }

        if let Some(limit) = self.max_clip_secs {
            if !(limit > 0.0 && limit <= MAX_TIMING_SECS) {
                return Err(anyhow::anyhow!(
                    "max_clip_secs must be positive and at most {}",
                    MAX_TIMING_SECS
                ));
            }
        }

        if self.sample_interval_ms == 0 || self.exit_poll_ms == 0 {
            return Err(anyhow::anyhow!(
                "sample_interval_ms and exit_poll_ms must be positive"
            ));
        }

        if self.backend_timeout_secs == 0 || self.backend_timeout_secs as f64 > MAX_TIMING_SECS {
            return Err(anyhow::anyhow!(
                "backend_timeout_secs must be positive and at most {}",
                MAX_TIMING_SECS
            ));
        }

        if self.motion_queue_len == 0 {
            return Err(anyhow::anyhow!("motion_queue_len must be at least 1"));
        }

        // presence needs a sample mean strictly above the threshold
        if !(self.motion_threshold > 0.0 && self.motion_threshold < 1.0) {
            return Err(anyhow::anyhow!("motion_threshold must be in (0, 1)"));
        }

        if self.still_command.is_empty() || self.video_command.is_empty() {
            return Err(anyhow::anyhow!(
                "still_command and video_command cannot be empty"
            ));
        }

        Ok(())
    }
}

fn home_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.still_pin, 21);
        assert_eq!(config.video_pin, 20);
        assert_eq!(config.motion_pin, 16);
        assert_eq!(config.motion_bias, Bias::PullUp);
        assert_eq!(config.hold(), Duration::from_secs(3));
        assert_eq!(config.grace(), Duration::from_secs(1));
        assert_eq!(config.exit_poll(), Duration::from_millis(100));
        assert_eq!(config.max_clip(), None);
        assert_eq!(config.video_bitrate, 10_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let config: Config = serde_json::from_str(
            r#"{ "grace_secs": 2.5, "motion_bias": "pull_down", "videos_dir": "/srv/clips" }"#,
        )
        .unwrap();

        assert_eq!(config.grace(), Duration::from_millis(2500));
        assert_eq!(config.motion_bias, Bias::PullDown);
        assert_eq!(config.videos_dir().unwrap(), PathBuf::from("/srv/clips"));
        assert_eq!(config.still_pin, 21);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            video_pin: 21,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            hold_secs: 0.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            grace_secs: -1.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            max_clip_secs: Some(0.0),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            motion_threshold: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            motion_queue_len: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            video_command: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_timings() {
        let config: Config =
            serde_json::from_str(r#"{ "hold_secs": 1e20, "grace_secs": 1e20 }"#).unwrap();
        assert!(config.validate().is_err());

        let config: Config = serde_json::from_str(r#"{ "grace_secs": 1e19 }"#).unwrap();
        assert!(config.validate().is_err());

        let config: Config = serde_json::from_str(r#"{ "max_clip_secs": 1e20 }"#).unwrap();
        assert!(config.validate().is_err());

        let config = Config {
            hold_secs: f64::INFINITY,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            grace_secs: f64::NAN,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            backend_timeout_secs: u64::MAX,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_largest_valid_timings_convert() {
        let config = Config {
            hold_secs: MAX_TIMING_SECS,
            grace_secs: MAX_TIMING_SECS,
            max_clip_secs: Some(MAX_TIMING_SECS),
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        let day = Duration::from_secs(86_400);
        assert_eq!(config.hold(), day);
        assert_eq!(config.grace(), day);
        assert_eq!(config.max_clip(), Some(day));
        assert!(tokio::time::Instant::now().checked_add(config.grace()).is_some());
    }

    #[test]
    fn test_threshold_of_one_is_rejected() {
        let config = Config {
            motion_threshold: 1.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            motion_threshold: 0.99,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_video_stop_timeout_is_inside_backend_timeout() {
        let config = Config::default();
        assert_eq!(config.video_stop_timeout(), Duration::from_secs(5));
        assert!(config.video_stop_timeout() < config.backend_timeout());

        let config = Config {
            backend_timeout_secs: 1,
            ..Config::default()
        };
        assert!(config.video_stop_timeout() < config.backend_timeout());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            max_clip_secs: Some(5.0),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.max_clip(), Some(Duration::from_secs(5)));
        assert_eq!(loaded.still_command, "rpicam-still");
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
