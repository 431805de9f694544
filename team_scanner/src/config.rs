use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use toml;

use crate::modules::frame_source::{Facing, FeedRequest};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    // Cadence of the detection probe while scanning
    pub poll_interval_ms: u64,
    // Which camera to ask the frame source for
    pub facing: Facing,
    // Resolution hints, the device may fall back to whatever it supports
    pub preferred_width: u32,
    pub preferred_height: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            facing: Facing::Environment,
            preferred_width: 1280,
            preferred_height: 720,
        }
    }
}

impl ScannerConfig {
    // Never zero, a zero period would make the timer spin
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn feed_request(&self) -> FeedRequest {
        FeedRequest {
            facing: self.facing,
            preferred_width: self.preferred_width,
            preferred_height: self.preferred_height,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    // Fixed endpoint every record is POSTed to
    pub endpoint_url: String,
    // Unset means the request may hang forever
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub frames_dir: PathBuf,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("team_scanner/frames"),
        }
    }
}

pub fn load_config(path: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let config: Config = toml::from_str(contents)?;
    Ok(config)
}
