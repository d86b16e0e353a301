//! Audio backend trait
//!
//! Abstracts the platform audio subsystem behind two operations: open an
//! output stream driven by a [`RenderCallback`] and open an input stream
//! driving a [`CaptureCallback`]. Each open returns a handle that keeps the
//! stream alive until it is closed.
//!
//! Implementations:
//! - [`CpalBackend`](super::cpal_backend::CpalBackend) for real devices
//! - [`OfflineBackend`](super::offline_backend::OfflineBackend), driven by
//!   the host for tests and offline rendering

use std::fmt;

use super::callbacks::{CaptureCallback, RenderCallback};
use super::config::{EngineConfig, PerformanceMode, SharingMode};
use super::error::AudioResult;
use super::recovery::DisconnectNotifier;

/// Direction of an audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamDirection {
    /// Capture from a microphone.
    Input,
    /// Playback to a speaker or headphones.
    Output,
}

impl fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamDirection::Input => write!(f, "input"),
            StreamDirection::Output => write!(f, "output"),
        }
    }
}

/// Everything a backend needs to open one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub direction: StreamDirection,
    pub sample_rate: u32,
    pub channels: usize,
    /// Preferred frames per callback.
    pub block_size: usize,
    pub performance_mode: PerformanceMode,
    pub sharing_mode: SharingMode,
    /// Device index for input streams; `None` selects the system default.
    pub device_index: Option<usize>,
}

impl StreamRequest {
    /// Request for the output stream described by `config`.
    pub fn output(config: &EngineConfig) -> Self {
        Self::new(StreamDirection::Output, config, None)
    }

    /// Request for the input stream described by `config`.
    ///
    /// A negative `preferred_device` selects the system default.
    pub fn input(config: &EngineConfig, preferred_device: i32) -> Self {
        let device_index = usize::try_from(preferred_device).ok();
        Self::new(StreamDirection::Input, config, device_index)
    }

    fn new(
        direction: StreamDirection,
        config: &EngineConfig,
        device_index: Option<usize>,
    ) -> Self {
        Self {
            direction,
            sample_rate: config.sample_rate,
            channels: config.channels,
            block_size: config.block_size,
            performance_mode: config.performance_mode,
            sharing_mode: config.sharing_mode,
            device_index,
        }
    }
}

/// An open stream. Dropping the handle without closing it also releases the
/// stream.
pub trait StreamHandle: Send {
    /// Stops and releases the stream. No callback runs after this returns.
    fn close(self: Box<Self>);
}

/// Platform audio subsystem.
///
/// Opening may block on device I/O and is only called from the control
/// thread or the recovery worker, never from an audio callback.
pub trait AudioBackend: Send + Sync {
    /// Opens and starts an output stream that pulls audio from `render`.
    fn open_output(
        &self,
        request: &StreamRequest,
        render: RenderCallback,
        notifier: DisconnectNotifier,
    ) -> AudioResult<Box<dyn StreamHandle>>;

    /// Opens and starts an input stream that pushes audio into `capture`.
    fn open_input(
        &self,
        request: &StreamRequest,
        capture: CaptureCallback,
        notifier: DisconnectNotifier,
    ) -> AudioResult<Box<dyn StreamHandle>>;
}
