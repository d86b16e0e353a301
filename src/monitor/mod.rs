//! Monitor module
//!
//! Speech monitor facade over the engine and its presets.

pub mod preset;
pub mod speech;

pub use preset::MicPreset;
pub use speech::SpeechMonitor;
