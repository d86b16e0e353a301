//! Nodes module
//!
//! Built-in DSP nodes for the monitoring chain.
//! Includes gain, delay, limiter, noise gate and the resampling pitch node.

pub mod delay;
pub mod gain;
pub mod limiter;
pub mod noise_gate;
pub mod pitch;

pub use delay::DelayNode;
pub use gain::GainNode;
pub use limiter::LimiterNode;
pub use noise_gate::NoiseGateNode;
pub use pitch::ResamplePitchNode;

use crate::dsp::NodeRegistry;

/// Creates a node registry with all built-in nodes.
pub fn create_node_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register::<GainNode>();
    registry.register::<DelayNode>();
    registry.register::<LimiterNode>();
    registry.register::<NoiseGateNode>();
    registry.register::<ResamplePitchNode>();
    registry
}
