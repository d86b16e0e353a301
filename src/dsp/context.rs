//! Processing context for DSP nodes.
//!
//! Describes the stream format a node is prepared for.

/// Stream format snapshot handed to every node's `prepare`.
///
/// Created when the engine's streams are (re)configured and immutable for the
/// lifetime of that session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DspContext {
    /// The audio sample rate in Hz (e.g., 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels per frame.
    pub channels: usize,
    /// Preferred number of frames per callback block.
    pub block_size: usize,
}

impl DspContext {
    /// Creates a new context.
    pub fn new(sample_rate: u32, channels: usize, block_size: usize) -> Self {
        Self {
            sample_rate,
            channels,
            block_size,
        }
    }

    /// Returns the duration of one block in seconds.
    pub fn block_duration(&self) -> f32 {
        self.block_size as f32 / self.sample_rate as f32
    }

    /// Converts a duration in milliseconds to frames, truncating.
    pub fn ms_to_frames(&self, ms: f32) -> usize {
        (ms * self.sample_rate as f32 / 1000.0) as usize
    }

    /// Converts a duration in seconds to frames, truncating.
    pub fn seconds_to_frames(&self, seconds: f32) -> usize {
        (seconds * self.sample_rate as f32) as usize
    }

    /// Number of interleaved samples in `frames` frames.
    pub fn samples_for(&self, frames: usize) -> usize {
        frames * self.channels
    }
}

impl Default for DspContext {
    fn default() -> Self {
        Self::new(48000, 1, 192)
    }
}
