//! Delay node.
//!
//! A per-channel circular delay line with feedback and wet/dry mix. Used for
//! delayed auditory feedback as well as plain echo.

use crate::dsp::{
    node_trait::{frames_in_block, DspNode, NodeInfo},
    parameter::{param_slots, ParamSlots, ParameterDefinition},
    DspContext, ParameterDisplay,
};

/// Maximum delay time in milliseconds.
const MAX_DELAY_MS: f32 = 2000.0;

static INFO: NodeInfo = NodeInfo::new(
    DelayNode::NAME,
    "Delay",
    "Circular delay line with feedback and wet/dry mix",
);

static PARAMETERS: [ParameterDefinition; 3] = [
    ParameterDefinition::new(
        "time",
        "Time",
        1.0,
        MAX_DELAY_MS,
        250.0,
        ParameterDisplay::logarithmic("ms"),
    ),
    ParameterDefinition::new(
        "feedback",
        "Feedback",
        0.0,
        0.98,
        0.4,
        ParameterDisplay::linear("%"),
    ),
    ParameterDefinition::normalized("mix", "Mix", 0.25),
];

/// Circular delay with feedback.
///
/// For every sample: `d = line[w]`, `line[w] = in + d * feedback`,
/// `out = in * (1 - mix) + d * mix`. The line holds
/// `max(1, time_ms * rate / 1000)` frames.
///
/// Storage for the longest allowed delay is allocated in `prepare`, so a time
/// change on the audio thread only shortens or lengthens the active region.
/// A time change zeroes the line and restarts the write cursor; the resulting
/// click is accepted.
///
/// # Parameters
///
/// - **Time** (1-2000 ms, id 0): Delay length. Default 250 ms.
/// - **Feedback** (0-0.98, id 1): Amount of the delayed signal fed back. Default 0.4.
/// - **Mix** (0-1, id 2): Wet/dry balance. Default 0.25.
pub struct DelayNode {
    params: ParamSlots,
    context: DspContext,
    /// Interleaved delay storage sized for `MAX_DELAY_MS`.
    line: Vec<f32>,
    /// Active length of the line in frames.
    delay_frames: usize,
    /// Write cursor in frames, always `< delay_frames`.
    write_pos: usize,
    /// Time value the active length was computed from.
    applied_time_ms: f32,
}

impl DelayNode {
    /// Registry key of this node type.
    pub const NAME: &'static str = "delay";

    /// Parameter id of the delay time in milliseconds.
    pub const PARAM_TIME_MS: usize = 0;
    /// Parameter id of the feedback amount.
    pub const PARAM_FEEDBACK: usize = 1;
    /// Parameter id of the wet/dry mix.
    pub const PARAM_MIX: usize = 2;

    /// Creates a new delay prepared for the default context.
    pub fn new() -> Self {
        let mut node = Self {
            params: param_slots(&PARAMETERS),
            context: DspContext::default(),
            line: Vec::new(),
            delay_frames: 1,
            write_pos: 0,
            applied_time_ms: 0.0,
        };
        node.allocate_line();
        node
    }

    /// Current active length of the delay line in frames.
    pub fn delay_frames(&self) -> usize {
        self.delay_frames
    }

    fn max_frames(&self) -> usize {
        self.context.ms_to_frames(MAX_DELAY_MS).max(1)
    }

    fn allocate_line(&mut self) {
        let len = self.max_frames() * self.context.channels;
        self.line.clear();
        self.line.resize(len, 0.0);
        self.apply_time(self.params[Self::PARAM_TIME_MS].get());
    }

    /// Recomputes the active length for `time_ms`, zeroing the line and
    /// resetting the write cursor.
    fn apply_time(&mut self, time_ms: f32) {
        let frames = self.context.ms_to_frames(time_ms).max(1);
        self.delay_frames = frames.min(self.max_frames());
        self.applied_time_ms = time_ms;
        self.write_pos = 0;
        self.line.fill(0.0);
    }
}

impl Default for DelayNode {
    fn default() -> Self {
        Self::new()
    }
}

impl DspNode for DelayNode {
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
        self.context = *context;
        self.allocate_line();
    }

    fn process(&mut self, block: &mut [f32], frames: usize) {
        let channels = self.context.channels;
        let frames = frames_in_block(block, frames, channels);
        if frames == 0 {
            return;
        }

        let time_ms = self.params[Self::PARAM_TIME_MS].get();
        if time_ms != self.applied_time_ms {
            self.apply_time(time_ms);
        }

        let feedback = self.params[Self::PARAM_FEEDBACK].get();
        let mix = self.params[Self::PARAM_MIX].get();

        for frame in block[..frames * channels].chunks_exact_mut(channels) {
            let base = self.write_pos * channels;
            for (c, sample) in frame.iter_mut().enumerate() {
                let input = *sample;
                let delayed = self.line[base + c];
                self.line[base + c] = input + delayed * feedback;
                *sample = input * (1.0 - mix) + delayed * mix;
            }
            self.write_pos += 1;
            if self.write_pos >= self.delay_frames {
                self.write_pos = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(len: usize) -> Vec<f32> {
        let mut block = vec![0.0; len];
        block[0] = 1.0;
        block
    }

    #[test]
    fn test_delay_info() {
        let delay = DelayNode::new();
        assert_eq!(delay.name(), "delay");
        assert_eq!(delay.parameters().len(), 3);
        assert_eq!(delay.param(DelayNode::PARAM_TIME_MS), Some(250.0));
        assert_eq!(delay.param(DelayNode::PARAM_FEEDBACK), Some(0.4));
        assert_eq!(delay.param(DelayNode::PARAM_MIX), Some(0.25));
    }

    #[test]
    fn test_line_length_follows_context() {
        let mut delay = DelayNode::new();
        delay.prepare(&DspContext::new(48000, 1, 64));
        // 250ms at 48kHz
        assert_eq!(delay.delay_frames(), 12000);

        delay.prepare(&DspContext::new(44100, 2, 64));
        assert_eq!(delay.delay_frames(), 11025);
    }

    #[test]
    fn test_echo_arrives_after_delay_time() {
        let mut delay = DelayNode::new();
        delay.prepare(&DspContext::new(48000, 1, 128));
        delay.set_param(DelayNode::PARAM_TIME_MS, 1.0); // 48 frames
        delay.set_param(DelayNode::PARAM_FEEDBACK, 0.0);
        delay.set_param(DelayNode::PARAM_MIX, 1.0);

        let mut block = impulse(128);
        delay.process(&mut block, 128);

        for (i, sample) in block.iter().enumerate() {
            let expected = if i == 48 { 1.0 } else { 0.0 };
            assert_eq!(*sample, expected, "frame {}", i);
        }
    }

    #[test]
    fn test_feedback_repeats_decay() {
        let mut delay = DelayNode::new();
        delay.prepare(&DspContext::new(1000, 1, 16));
        delay.set_param(DelayNode::PARAM_TIME_MS, 4.0); // 4 frames at 1kHz
        delay.set_param(DelayNode::PARAM_FEEDBACK, 0.5);
        delay.set_param(DelayNode::PARAM_MIX, 1.0);

        let mut block = impulse(16);
        delay.process(&mut block, 16);

        assert_eq!(block[4], 1.0);
        assert_eq!(block[8], 0.5);
        assert_eq!(block[12], 0.25);
        assert_eq!(block[3], 0.0);
    }

    #[test]
    fn test_dry_mix_is_passthrough() {
        let mut delay = DelayNode::new();
        delay.prepare(&DspContext::new(48000, 2, 8));
        delay.set_param(DelayNode::PARAM_MIX, 0.0);

        let input = [0.1f32, -0.2, 0.3, -0.4, 0.5, -0.6, 0.7, -0.8];
        let mut block = input;
        delay.process(&mut block, 4);
        assert_eq!(block, input);
    }

    #[test]
    fn test_channels_delayed_independently() {
        let mut delay = DelayNode::new();
        delay.prepare(&DspContext::new(1000, 2, 8));
        delay.set_param(DelayNode::PARAM_TIME_MS, 2.0); // 2 frames
        delay.set_param(DelayNode::PARAM_FEEDBACK, 0.0);
        delay.set_param(DelayNode::PARAM_MIX, 1.0);

        // Left impulse on frame 0, right impulse on frame 1.
        let mut block = [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        delay.process(&mut block, 4);
        assert_eq!(block, [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_time_change_clears_line() {
        let mut delay = DelayNode::new();
        delay.prepare(&DspContext::new(1000, 1, 8));
        delay.set_param(DelayNode::PARAM_TIME_MS, 4.0);
        delay.set_param(DelayNode::PARAM_FEEDBACK, 0.0);
        delay.set_param(DelayNode::PARAM_MIX, 1.0);

        let mut block = impulse(2);
        delay.process(&mut block, 2);

        // The pending echo is discarded when the time changes.
        delay.set_param(DelayNode::PARAM_TIME_MS, 3.0);
        let mut block = [0.0f32; 8];
        delay.process(&mut block, 8);
        assert_eq!(delay.delay_frames(), 3);
        assert!(block.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_time_clamped_to_range() {
        let mut delay = DelayNode::new();
        delay.prepare(&DspContext::new(1000, 1, 8));
        delay.set_param(DelayNode::PARAM_TIME_MS, 0.0);
        assert_eq!(delay.param(DelayNode::PARAM_TIME_MS), Some(1.0));
        delay.set_param(DelayNode::PARAM_TIME_MS, 5000.0);
        assert_eq!(delay.param(DelayNode::PARAM_TIME_MS), Some(2000.0));

        let mut block = [0.0f32; 1];
        delay.process(&mut block, 1);
        assert_eq!(delay.delay_frames(), 2000);

        delay.set_param(DelayNode::PARAM_FEEDBACK, 1.5);
        assert_eq!(delay.param(DelayNode::PARAM_FEEDBACK), Some(0.98));
    }
}
