//! Engine module
//!
//! Full-duplex monitor engine and its stream plumbing.
//! Handles cpal integration, the capture/render ring buffer, lifecycle
//! events and restart after device disconnects.

pub mod audio_engine;
pub mod backend;
pub mod callbacks;
pub mod config;
pub mod cpal_backend;
pub mod error;
pub mod events;
pub mod offline_backend;
pub mod recovery;
pub mod ring_buffer;

pub use audio_engine::{EngineState, MonitorEngine};
pub use backend::{AudioBackend, StreamDirection, StreamHandle, StreamRequest};
pub use callbacks::{CaptureCallback, LevelMeter, RenderCallback};
pub use config::{ConfigError, EngineConfig, PerformanceMode, SharingMode};
pub use cpal_backend::{CpalBackend, DeviceInfo};
pub use error::{AudioError, AudioResult};
pub use events::{EngineEvent, EngineEvents, DEFAULT_EVENT_BUFFER_SIZE};
pub use offline_backend::OfflineBackend;
pub use recovery::{DisconnectNotifier, RecoveryRequest};
pub use ring_buffer::SampleRing;
