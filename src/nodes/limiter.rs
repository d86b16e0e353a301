//! Hard-knee limiter node.

use crate::dsp::{
    node_trait::{frames_in_block, DspNode, NodeInfo},
    parameter::{param_slots, ParamSlots, ParameterDefinition},
    DspContext, ParameterDisplay,
};

static INFO: NodeInfo = NodeInfo::new(
    LimiterNode::NAME,
    "Limiter",
    "Hard-knee compressor followed by a [-1, 1] clip",
);

static PARAMETERS: [ParameterDefinition; 2] = [
    ParameterDefinition::new(
        "threshold",
        "Threshold",
        0.1,
        1.2,
        0.9,
        ParameterDisplay::linear(""),
    ),
    ParameterDefinition::new(
        "ratio",
        "Ratio",
        1.0,
        f32::INFINITY,
        4.0,
        ParameterDisplay::logarithmic(":1"),
    ),
];

/// Hard-knee limiter.
///
/// Magnitude above the threshold is divided by the ratio (sign preserved),
/// then the result is clipped to [-1, 1], so no output sample ever exceeds
/// full scale.
///
/// # Parameters
///
/// - **Threshold** (0.1-1.2, id 0): Knee position. Default 0.9.
/// - **Ratio** (>= 1, id 1): Compression ratio above the knee. Default 4.
pub struct LimiterNode {
    params: ParamSlots,
    channels: usize,
}

impl LimiterNode {
    /// Registry key of this node type.
    pub const NAME: &'static str = "limiter";

    /// Parameter id of the threshold.
    pub const PARAM_THRESHOLD: usize = 0;
    /// Parameter id of the ratio.
    pub const PARAM_RATIO: usize = 1;

    /// Creates a new limiter with threshold 0.9 and ratio 4:1.
    pub fn new() -> Self {
        Self {
            params: param_slots(&PARAMETERS),
            channels: DspContext::default().channels,
        }
    }

    /// Applies the limiter curve to one sample.
    #[inline]
    fn limit(x: f32, threshold: f32, inv_ratio: f32) -> f32 {
        let magnitude = x.abs();
        let shaped = if magnitude > threshold {
            let compressed = threshold + (magnitude - threshold) * inv_ratio;
            compressed.copysign(x)
        } else {
            x
        };
        shaped.clamp(-1.0, 1.0)
    }
}

impl Default for LimiterNode {
    fn default() -> Self {
        Self::new()
    }
}

impl DspNode for LimiterNode {
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
        let threshold = self.params[Self::PARAM_THRESHOLD].get();
        let ratio = self.params[Self::PARAM_RATIO].get();
        let inv_ratio = if ratio <= 1.0 { 1.0 } else { 1.0 / ratio };

        for sample in block[..frames * self.channels].iter_mut() {
            *sample = Self::limit(*sample, threshold, inv_ratio);
        }
    }
}
