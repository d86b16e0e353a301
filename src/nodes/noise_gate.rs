//! Noise gate node.
//!
//! Attenuates frames whose peak falls below a threshold. The decision is
//! made per frame across all channels, so a frame is either gated on every
//! channel or on none.

use crate::dsp::{
    node_trait::{frames_in_block, DspNode, NodeInfo},
    parameter::{param_slots, ParamSlots, ParameterDefinition},
    DspContext, ParameterDisplay,
};

static INFO: NodeInfo = NodeInfo::new(
    NoiseGateNode::NAME,
    "Noise Gate",
    "Attenuates frames whose peak is below a threshold",
);

static PARAMETERS: [ParameterDefinition; 2] = [
    ParameterDefinition::new(
        "threshold",
        "Threshold",
        0.0,
        0.2,
        0.0,
        ParameterDisplay::linear(""),
    ),
    ParameterDefinition::normalized("attenuation", "Attenuation", 1.0),
];

/// Per-frame noise gate.
///
/// # Parameters
///
/// - **Threshold** (0-0.2, id 0): Frames with a peak below this are gated.
///   0 disables the gate entirely. Default 0.
/// - **Attenuation** (0-1, id 1): Factor applied to gated frames. Default 1.
pub struct NoiseGateNode {
    params: ParamSlots,
    channels: usize,
}

impl NoiseGateNode {
    /// Registry key of this node type.
    pub const NAME: &'static str = "noise_gate";

    /// Parameter id of the gate threshold.
    pub const PARAM_THRESHOLD: usize = 0;
    /// Parameter id of the gated-frame attenuation.
    pub const PARAM_ATTENUATION: usize = 1;

    /// Creates a new gate in its disabled state.
    pub fn new() -> Self {
        Self {
            params: param_slots(&PARAMETERS),
            channels: DspContext::default().channels,
        }
    }
}

impl Default for NoiseGateNode {
    fn default() -> Self {
        Self::new()
    }
}

impl DspNode for NoiseGateNode {
    fn info(&self) -> &NodeInfo {
        &INFO
    }

    fn parameters(&self) -> &[ParameterDefinition] {
        &PARAMETERS
    }

    fn param_slots(&self) -> &ParamSlots {
        &self.params
    }

    fn prepare(&mut self, context: &DspContext) {
        self.channels = context.channels;
    }

    fn process(&mut self, block: &mut [f32], frames: usize) {
        let threshold = self.params[Self::PARAM_THRESHOLD].get();
        if threshold <= 0.0 || self.channels == 0 {
            return;
        }
        let attenuation = self.params[Self::PARAM_ATTENUATION].get();
        let frames = frames_in_block(block, frames, self.channels);

        for frame in block[..frames * self.channels].chunks_exact_mut(self.channels) {
            let peak = frame.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
            if peak < threshold {
                for sample in frame.iter_mut() {
                    *sample *= attenuation;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_info() {
        let gate = NoiseGateNode::new();
        assert_eq!(gate.name(), "noise_gate");
        assert_eq!(gate.param(NoiseGateNode::PARAM_THRESHOLD), Some(0.0));
        assert_eq!(gate.param(NoiseGateNode::PARAM_ATTENUATION), Some(1.0));
    }

    #[test]
    fn test_zero_threshold_is_bit_identical() {
        let mut gate = NoiseGateNode::new();
        gate.prepare(&DspContext::new(48000, 2, 4));
        gate.set_param(NoiseGateNode::PARAM_THRESHOLD, 0.0);
        gate.set_param(NoiseGateNode::PARAM_ATTENUATION, 0.0);

        let input = [1e-6f32, -1e-7, 0.001, 0.0, -0.5, 0.7, f32::MIN_POSITIVE, -0.0];
        let mut block = input;
        gate.process(&mut block, 4);

        for (a, b) in input.iter().zip(block.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_quiet_frame_attenuated_on_every_channel() {
        let mut gate = NoiseGateNode::new();
        gate.prepare(&DspContext::new(48000, 2, 2));
        gate.set_param(NoiseGateNode::PARAM_THRESHOLD, 0.05);
        gate.set_param(NoiseGateNode::PARAM_ATTENUATION, 0.1);

        // Frame 0 is quiet on both channels, frame 1 has one loud channel.
        let mut block = [0.02f32, -0.04, 0.01, 0.5];
        gate.process(&mut block, 2);

        assert!((block[0] - 0.002).abs() < 1e-7);
        assert!((block[1] + 0.004).abs() < 1e-7);
        assert_eq!(block[2], 0.01);
        assert_eq!(block[3], 0.5);
    }

    #[test]
    fn test_threshold_clamped_to_range() {
        let gate = NoiseGateNode::new();
        gate.set_param(NoiseGateNode::PARAM_THRESHOLD, 0.9);
        assert_eq!(gate.param(NoiseGateNode::PARAM_THRESHOLD), Some(0.2));
        gate.set_param(NoiseGateNode::PARAM_ATTENUATION, 3.0);
        assert_eq!(gate.param(NoiseGateNode::PARAM_ATTENUATION), Some(1.0));
    }

    #[test]
    fn test_frame_at_threshold_passes() {
        let mut gate = NoiseGateNode::new();
        gate.prepare(&DspContext::new(48000, 1, 1));
        gate.set_param(NoiseGateNode::PARAM_THRESHOLD, 0.1);
        gate.set_param(NoiseGateNode::PARAM_ATTENUATION, 0.0);

        let mut block = [0.1f32, 0.05];
        gate.process(&mut block, 2);
        assert_eq!(block[0], 0.1);
        assert_eq!(block[1], 0.0);
    }
}
