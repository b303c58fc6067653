use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    playback::PlaybackTimings,
    transition::{DriverConfig, TransitionMode},
    visibility::ViewabilityConfig,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub image_dwell_ms: u64,
    /// Unset by default: a video that never reports its end holds the feed
    /// until the user scrolls away.
    pub stall_timeout_ms: Option<u64>,
    /// Extent of one item along the scroll axis.  Every item has the same one.
    pub item_extent: f64,
    pub viewport_extent: f64,
    pub wrap_mode: TransitionMode,
    pub retry_delay_ms: u64,
    pub max_retries: u32,
    pub settle_timeout_ms: u64,
    pub visible_percent_threshold: f64,
    pub minimum_view_time_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            image_dwell_ms: 3000,
            stall_timeout_ms: None,
            item_extent: 800.0,
            viewport_extent: 800.0,
            wrap_mode: TransitionMode::Instant,
            retry_delay_ms: 100,
            max_retries: 1,
            settle_timeout_ms: 2000,
            visible_percent_threshold: 80.0,
            minimum_view_time_ms: 100,
        }
    }
}

impl FeedConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        log::info!("loading config: {:?}", path);
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn playback(&self) -> PlaybackTimings {
        PlaybackTimings {
            dwell: Duration::from_millis(self.image_dwell_ms),
            stall_timeout: self.stall_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn driver(&self) -> DriverConfig {
        DriverConfig {
            item_extent: self.item_extent,
            wrap_mode: self.wrap_mode,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_retries: self.max_retries,
        }
    }

    pub fn viewability(&self) -> ViewabilityConfig {
        ViewabilityConfig {
            visible_percent_threshold: self.visible_percent_threshold,
            minimum_view_time: Duration::from_millis(self.minimum_view_time_ms),
        }
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}
