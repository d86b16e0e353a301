//! Mic Monitor Library
//!
//! Core library for the low-latency microphone monitor: a lock-free
//! capture/render path, a chain of DSP nodes and a self-recovering
//! full-duplex engine.

pub mod dsp;
pub mod engine;
pub mod monitor;
pub mod nodes;
