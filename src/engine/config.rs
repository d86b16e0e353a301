//! Engine configuration
//!
//! Stream format and device preferences for the monitor engine, loadable
//! from a JSON file. Every field is optional in the file and falls back to
//! its default.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dsp::DspContext;

/// Default sample rate (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default channel count (mono, matching a single microphone)
pub const DEFAULT_CHANNELS: usize = 1;

/// Default callback block size in frames (4ms at 48kHz)
pub const DEFAULT_BLOCK_SIZE: usize = 192;

/// Default ring buffer length in seconds of audio
pub const DEFAULT_RING_SECONDS: f32 = 8.0;

/// Longest ring buffer accepted by `validate`.
pub const MAX_RING_SECONDS: f32 = 60.0;

/// Largest ring buffer accepted by `validate`, in samples across all channels.
pub const MAX_RING_SAMPLES: usize = 1 << 26;

/// Latency preference passed to the platform when opening a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PerformanceMode {
    /// Ask for the smallest stable buffer
    #[default]
    LowLatency,
    /// Let the platform choose
    None,
}

/// Device sharing preference passed to the platform when opening a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SharingMode {
    /// Prefer exclusive access to the device
    #[default]
    Exclusive,
    /// Share the device with other applications
    Shared,
}

/// Configuration for [`MonitorEngine`](super::MonitorEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channels per frame, shared by input and output
    pub channels: usize,
    /// Requested frames per callback
    pub block_size: usize,
    /// Capacity of the capture-to-render ring buffer in seconds
    pub ring_seconds: f32,
    /// Latency preference for both streams
    pub performance_mode: PerformanceMode,
    /// Sharing preference for both streams
    pub sharing_mode: SharingMode,
    /// Input device index, or -1 for the system default
    pub preferred_input_device: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            block_size: DEFAULT_BLOCK_SIZE,
            ring_seconds: DEFAULT_RING_SECONDS,
            performance_mode: PerformanceMode::default(),
            sharing_mode: SharingMode::default(),
            preferred_input_device: -1,
        }
    }
}

/// Errors from loading an [`EngineConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value the engine cannot run with
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl EngineConfig {
    /// Parses and validates a config from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Loading engine config from {:?}", path);
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Saves the config as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Rejects values that would leave the engine without a usable format.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".into()));
        }
        if self.channels == 0 {
            return Err(ConfigError::Invalid("channels must be positive".into()));
        }
        if self.block_size == 0 {
            return Err(ConfigError::Invalid("block_size must be positive".into()));
        }
        if !self.ring_seconds.is_finite() || self.ring_seconds <= 0.0 {
            return Err(ConfigError::Invalid("ring_seconds must be positive".into()));
        }
        if self.ring_seconds > MAX_RING_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "ring_seconds must be at most {}",
                MAX_RING_SECONDS
            )));
        }
        let samples =
            f64::from(self.sample_rate) * f64::from(self.ring_seconds) * self.channels as f64;
        if samples > MAX_RING_SAMPLES as f64 {
            return Err(ConfigError::Invalid(format!(
                "ring buffer of {:.0} samples exceeds {}",
                samples, MAX_RING_SAMPLES
            )));
        }
        Ok(())
    }

    /// Ring buffer capacity in samples.
    pub fn ring_capacity(&self) -> usize {
        let frames = (self.sample_rate as f32 * self.ring_seconds) as usize;
        (frames * self.channels).max(self.channels)
    }

    /// Processing context the chain is prepared with.
    pub fn context(&self) -> DspContext {
        DspContext::new(self.sample_rate, self.channels, self.block_size)
    }
}
