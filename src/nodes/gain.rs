//! Gain node.
//!
//! Scales every sample by a single gain factor.

use crate::dsp::{
    node_trait::{frames_in_block, DspNode, NodeInfo},
    parameter::{param_slots, ParamSlots, ParameterDefinition},
    DspContext, ParameterDisplay,
};

static INFO: NodeInfo = NodeInfo::new(
    GainNode::NAME,
    "Gain",
    "Scales the signal by a constant factor",
);

static PARAMETERS: [ParameterDefinition; 1] = [ParameterDefinition::new(
    "gain",
    "Gain",
    0.0,
    3.0,
    1.0,
    ParameterDisplay::linear("x"),
)];

/// Multiplies every sample by a scalar gain.
///
/// # Parameters
///
/// - **Gain** (0-3, id 0): Linear amplitude factor. Default 1.0.
pub struct GainNode {
    params: ParamSlots,
    channels: usize,
}

impl GainNode {
    /// Registry key of this node type.
    pub const NAME: &'static str = "gain";

    /// Parameter id of the gain factor.
    pub const PARAM_GAIN: usize = 0;

    /// Creates a new gain node at unity gain.
    pub fn new() -> Self {
        Self {
            params: param_slots(&PARAMETERS),
            channels: DspContext::default().channels,
        }
    }
}

impl Default for GainNode {
    fn default() -> Self {
        Self::new()
    }
}

impl DspNode for GainNode {
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
        let frames = frames_in_block(block, frames, self.channels);
        let gain = self.params[Self::PARAM_GAIN].get();
        for sample in block[..frames * self.channels].iter_mut() {
            *sample *= gain;
        }
    }
}
