use chrono::{DateTime, Local};
use std::path::PathBuf;

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// `mcv-YYYYMMDD-HHMMSS.mp4`
pub fn video_file_name(at: &DateTime<Local>) -> String {
    format!("mcv-{}.mp4", at.format(TIMESTAMP_FORMAT))
}

/// `mcp-YYYYMMDD-HHMMSS.jpg`
pub fn still_file_name(at: &DateTime<Local>) -> String {
    format!("mcp-{}.jpg", at.format(TIMESTAMP_FORMAT))
}

/// Builds output paths for captured media
///
/// Two captures within the same second get the same name; the later one
/// overwrites the earlier.
pub struct MediaNamer {
    pictures_dir: PathBuf,
    videos_dir: PathBuf,
    clock: Box<dyn Fn() -> DateTime<Local> + Send>,
}

impl MediaNamer {
    pub fn new(pictures_dir: PathBuf, videos_dir: PathBuf) -> Self {
        Self {
            pictures_dir,
            videos_dir,
            clock: Box::new(Local::now),
        }
    }

    /// Replace the wall clock used for timestamps
    #[cfg(test)]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Local> + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn next_video(&self) -> PathBuf {
        self.videos_dir.join(video_file_name(&(self.clock)()))
    }

    pub fn next_still(&self) -> PathBuf {
        self.pictures_dir.join(still_file_name(&(self.clock)()))
    }
}
