//! Resampling pitch node for frequency-altered feedback.
//!
//! Keeps a short history of the input and reads it back with a fractional
//! cursor that advances by the pitch ratio each frame. This is variable-rate
//! playback, not a formant-preserving shifter: the read cursor drifts relative
//! to the write cursor and wraps through the history.

use crate::dsp::{
    node_trait::{frames_in_block, DspNode, NodeInfo},
    parameter::{param_slots, ParamSlots, ParameterDefinition},
    DspContext, ParameterDisplay,
};

/// Length of the input history in seconds.
const HISTORY_SECONDS: f32 = 0.4;

/// Mix at or below this bypasses the wet path.
const MIX_BYPASS: f32 = 0.001;

static INFO: NodeInfo = NodeInfo::new(
    ResamplePitchNode::NAME,
    "FAF Pitch",
    "Resampling pitch shift for frequency-altered feedback",
);

static PARAMETERS: [ParameterDefinition; 2] = [
    ParameterDefinition::new(
        "ratio",
        "Pitch Ratio",
        0.8,
        1.2,
        1.0,
        ParameterDisplay::linear("x"),
    ),
    ParameterDefinition::normalized("mix", "Mix", 0.0),
];

/// Variable-rate playback of recent input.
///
/// The history is fed on every call, including while bypassed.
///
/// # Parameters
///
/// - **Pitch Ratio** (0.8-1.2, id 0): Read speed relative to input. 1.0 is
///   no change and bypasses the effect. Default 1.0.
/// - **Mix** (0-1, id 1): 0 is dry, 1 is only the shifted signal. Default 0.
pub struct ResamplePitchNode {
    params: ParamSlots,
    channels: usize,
    history: Vec<f32>,
    history_frames: usize,
    write_pos: usize,
    read_pos: f32,
}

impl ResamplePitchNode {
    /// Registry key of this node type.
    pub const NAME: &'static str = "faf_pitch";

    /// Parameter id of the pitch ratio.
    pub const PARAM_RATIO: usize = 0;
    /// Parameter id of the wet/dry mix.
    pub const PARAM_MIX: usize = 1;

    /// Creates a bypassed pitch node prepared for the default context.
    pub fn new() -> Self {
        let mut node = Self {
            params: param_slots(&PARAMETERS),
            channels: 0,
            history: Vec::new(),
            history_frames: 0,
            write_pos: 0,
            read_pos: 0.0,
        };
        node.prepare(&DspContext::default());
        node
    }

    /// Length of the input history in frames.
    pub fn history_frames(&self) -> usize {
        self.history_frames
    }

    fn feed_history(&mut self, input: &[f32]) {
        let channels = self.channels;
        for frame in input.chunks_exact(channels) {
            let base = self.write_pos * channels;
            self.history[base..base + channels].copy_from_slice(frame);
            self.write_pos = (self.write_pos + 1) % self.history_frames;
        }
    }
}

impl Default for ResamplePitchNode {
    fn default() -> Self {
        Self::new()
    }
}

impl DspNode for ResamplePitchNode {
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
        self.history_frames = context.seconds_to_frames(HISTORY_SECONDS).max(1);
        self.history.clear();
        self.history.resize(self.history_frames * context.channels, 0.0);
        self.write_pos = 0;
        self.read_pos = 0.0;
    }

    fn process(&mut self, block: &mut [f32], frames: usize) {
        let channels = self.channels;
        let frames = frames_in_block(block, frames, channels);
        if frames == 0 || self.history.is_empty() {
            return;
        }
        let block = &mut block[..frames * channels];

        self.feed_history(block);

        let ratio = self.params[Self::PARAM_RATIO].get();
        let mix = self.params[Self::PARAM_MIX].get();
        if mix <= MIX_BYPASS || ratio == 1.0 {
            return;
        }

        let len = self.history_frames;
        for frame in block.chunks_exact_mut(channels) {
            let index0 = (self.read_pos as usize) % len;
            let index1 = (index0 + 1) % len;
            let frac = self.read_pos.fract();

            let base0 = index0 * channels;
            let base1 = index1 * channels;
            for (c, sample) in frame.iter_mut().enumerate() {
                let s0 = self.history[base0 + c];
                let s1 = self.history[base1 + c];
                let shifted = s0 + (s1 - s0) * frac;
                *sample = *sample * (1.0 - mix) + shifted * mix;
            }

            self.read_pos += ratio;
            if self.read_pos >= len as f32 {
                self.read_pos -= len as f32;
            }
        }
    }
}
