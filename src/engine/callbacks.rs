//! Stream data callbacks
//!
//! The capture side measures the input level and enqueues samples into the
//! ring; the render side dequeues them and runs them through the DSP chain.
//! Both run on platform audio threads and are real-time safe.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::ring_buffer::SampleRing;
use crate::dsp::DspChain;

/// Weight of the previous level in the smoothing filter.
const LEVEL_DECAY: f32 = 0.8;

/// Exponentially smoothed peak level of the captured signal.
///
/// Written only by the capture callback, readable from any thread.
pub struct LevelMeter {
    level_bits: AtomicU32,
}

impl LevelMeter {
    /// Creates a meter reading zero.
    pub fn new() -> Self {
        Self {
            level_bits: AtomicU32::new(0.0f32.to_bits()),
        }
    }

    /// Current smoothed level.
    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    /// Folds one block's peak into the smoothed level.
    pub fn update(&self, peak: f32) {
        let smoothed = self.level() * LEVEL_DECAY + peak * (1.0 - LEVEL_DECAY);
        self.level_bits.store(smoothed.to_bits(), Ordering::Relaxed);
    }

    /// Resets the level to zero.
    pub fn reset(&self) {
        self.level_bits.store(0.0f32.to_bits(), Ordering::Relaxed);
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Data callback for the input stream.
pub struct CaptureCallback {
    ring: Arc<SampleRing>,
    meter: Arc<LevelMeter>,
}

impl CaptureCallback {
    /// Creates a capture callback feeding `ring` and `meter`.
    pub fn new(ring: Arc<SampleRing>, meter: Arc<LevelMeter>) -> Self {
        Self { ring, meter }
    }

    /// Handles one block of interleaved input.
    ///
    /// REAL-TIME SAFE: no locks, no allocation.
    pub fn on_audio(&mut self, input: &[f32]) {
        let peak = input.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
        self.meter.update(peak);
        // Overflow is dropped by the ring.
        self.ring.write(input);
    }
}

/// Data callback for the output stream.
pub struct RenderCallback {
    ring: Arc<SampleRing>,
    chain: Arc<DspChain>,
    channels: usize,
}

impl RenderCallback {
    /// Creates a render callback reading `ring` and processing through `chain`.
    pub fn new(ring: Arc<SampleRing>, chain: Arc<DspChain>, channels: usize) -> Self {
        Self {
            ring,
            chain,
            channels,
        }
    }

    /// Fills one block of interleaved output.
    ///
    /// Missing input is rendered as silence. Parameter changes reach the
    /// chain without its node lock, so every block is processed.
    ///
    /// REAL-TIME SAFE: no allocation; the node lock is only contended by
    /// chain edits.
    pub fn on_audio(&mut self, output: &mut [f32]) {
        self.ring.read(output);
        if self.channels == 0 {
            return;
        }
        let frames = output.len() / self.channels;
        self.chain.process(output, frames);
    }

    /// Channel count the callback was built for.
    pub fn channels(&self) -> usize {
        self.channels
    }
}
