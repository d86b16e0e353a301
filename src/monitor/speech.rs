//! Speech monitor
//!
//! Fixed gain → noise gate → delay → pitch chain on top of [`MonitorEngine`],
//! driven by a handful of speech-therapy style controls (delayed and
//! frequency-altered auditory feedback).
//!
//! Settings are remembered while stopped and reapplied on every start.

use crate::engine::{AudioResult, EngineEvents, EngineState, MonitorEngine};
use crate::nodes::{DelayNode, GainNode, NoiseGateNode, ResamplePitchNode};

use super::preset::MicPreset;

/// Range of `set_gain`.
const GAIN_RANGE: (f32, f32) = (0.0, 2.0);
/// Range of `set_global_gain`.
const GLOBAL_GAIN_RANGE: (f32, f32) = (0.5, 2.0);
/// Range of the combined gain sent to the gain node.
const EFFECTIVE_GAIN_RANGE: (f32, f32) = (0.0, 3.0);
/// Range of `set_delay_ms`.
const DELAY_MS_RANGE: (u32, u32) = (0, 300);
/// Delay time actually used while delayed feedback is on.
const FEEDBACK_DELAY_MS_RANGE: (u32, u32) = (60, 220);
const PITCH_RATIO_RANGE: (f32, f32) = (0.8, 1.2);

/// Noise gate settings with suppression on: (threshold, attenuation).
const GATE_ON: (f32, f32) = (0.035, 0.10);
/// Noise gate settings with suppression off.
const GATE_OFF: (f32, f32) = (0.0, 1.0);

/// Chain indices of the nodes added on start.
#[derive(Debug, Clone, Copy, Default)]
struct ChainNodes {
    gain: Option<usize>,
    noise_gate: Option<usize>,
    delay: Option<usize>,
    pitch: Option<usize>,
}

/// User-facing speech monitor.
pub struct SpeechMonitor {
    engine: MonitorEngine,
    nodes: Option<ChainNodes>,

    gain: f32,
    global_gain: f32,
    delay_ms: u32,
    feedback_enabled: bool,
    preset: MicPreset,
    pitch_ratio: f32,
    pitch_mix: f32,
    noise_suppression: bool,
    preferred_input_device: i32,
}

impl SpeechMonitor {
    /// Wrap an engine. The engine's chain is rebuilt on every start.
    pub fn new(engine: MonitorEngine) -> Self {
        let preferred_input_device = engine.preferred_input_device_id();
        Self {
            engine,
            nodes: None,
            gain: 1.0,
            global_gain: 1.0,
            delay_ms: 0,
            feedback_enabled: false,
            preset: MicPreset::default(),
            pitch_ratio: 1.0,
            pitch_mix: 0.0,
            noise_suppression: false,
            preferred_input_device,
        }
    }

    /// Start the engine and build the speech chain.
    ///
    /// Does nothing if already started. If the engine stopped on its own
    /// (a failed restart after a device loss), the chain is rebuilt.
    pub fn start(&mut self) -> AudioResult<()> {
        if self.is_started() {
            log::info!("Speech monitor already started");
            return Ok(());
        }
        if self.nodes.take().is_some() {
            log::warn!("Engine stopped underneath the speech monitor, rebuilding");
        }

        self.engine
            .set_preferred_input_device_id(self.preferred_input_device);
        self.engine.start()?;
        self.engine.clear_chain();

        let nodes = ChainNodes {
            gain: self.engine.add_node(GainNode::NAME),
            noise_gate: self.engine.add_node(NoiseGateNode::NAME),
            delay: self.engine.add_node(DelayNode::NAME),
            pitch: self.engine.add_node(ResamplePitchNode::NAME),
        };
        log::info!("Speech monitor chain built: {:?}", nodes);
        if nodes.pitch.is_none() {
            log::error!("No '{}' node registered", ResamplePitchNode::NAME);
        }
        self.nodes = Some(nodes);

        self.apply_gain();
        self.apply_noise_suppression();
        self.apply_delay_time();
        self.apply_delay_mix();
        self.apply_pitch();
        Ok(())
    }

    /// Stop the engine and forget the chain.
    pub fn stop(&mut self) {
        let had_chain = self.nodes.take().is_some();
        if !had_chain && self.engine.state() == EngineState::Stopped {
            return;
        }
        log::info!("Speech monitor stopping");
        self.engine.stop();
    }

    /// Check if the monitor has been started and its engine is still up.
    pub fn is_started(&self) -> bool {
        self.nodes.is_some() && self.engine.state() != EngineState::Stopped
    }

    /// Set the voice gain, clamped to [0, 2].
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(GAIN_RANGE.0, GAIN_RANGE.1);
        self.apply_gain();
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Set the global gain multiplier, clamped to [0.5, 2].
    pub fn set_global_gain(&mut self, gain: f32) {
        self.global_gain = gain.clamp(GLOBAL_GAIN_RANGE.0, GLOBAL_GAIN_RANGE.1);
        self.apply_gain();
    }

    pub fn global_gain(&self) -> f32 {
        self.global_gain
    }

    /// Gain actually applied by the gain node.
    pub fn effective_gain(&self) -> f32 {
        (self.gain * self.global_gain).clamp(EFFECTIVE_GAIN_RANGE.0, EFFECTIVE_GAIN_RANGE.1)
    }

    /// Select a preset. Overrides the voice gain.
    pub fn set_mic_preset(&mut self, preset: MicPreset) {
        log::info!("Mic preset set to {}", preset);
        self.preset = preset;
        self.gain = preset.gain();
        self.apply_gain();
        self.apply_delay_mix();
    }

    pub fn mic_preset(&self) -> MicPreset {
        self.preset
    }

    /// Set the delayed feedback time, clamped to [0, 300] ms.
    pub fn set_delay_ms(&mut self, delay_ms: u32) {
        self.delay_ms = delay_ms.clamp(DELAY_MS_RANGE.0, DELAY_MS_RANGE.1);
        self.apply_delay_time();
        self.apply_delay_mix();
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    /// Turn delayed auditory feedback on or off.
    pub fn set_feedback_mode(&mut self, enabled: bool) {
        log::info!("Delayed feedback {}", if enabled { "on" } else { "off" });
        self.feedback_enabled = enabled;
        self.apply_delay_mix();
    }

    pub fn feedback_mode(&self) -> bool {
        self.feedback_enabled
    }

    /// Turn the noise gate on or off.
    pub fn set_noise_suppression(&mut self, enabled: bool) {
        self.noise_suppression = enabled;
        self.apply_noise_suppression();
    }

    pub fn noise_suppression(&self) -> bool {
        self.noise_suppression
    }

    /// Set the pitch shift ratio, clamped to [0.8, 1.2]. 1.0 is unchanged.
    pub fn set_pitch_ratio(&mut self, ratio: f32) {
        self.pitch_ratio = ratio.clamp(PITCH_RATIO_RANGE.0, PITCH_RATIO_RANGE.1);
        self.apply_pitch();
    }

    pub fn pitch_ratio(&self) -> f32 {
        self.pitch_ratio
    }

    /// Set the pitch-shifted mix, clamped to [0, 1]. 0 is the dry voice only.
    pub fn set_pitch_mix(&mut self, mix: f32) {
        self.pitch_mix = mix.clamp(0.0, 1.0);
        self.apply_pitch();
    }

    pub fn pitch_mix(&self) -> f32 {
        self.pitch_mix
    }

    /// Input level in [0, 1].
    pub fn mic_input_level(&self) -> f32 {
        self.engine.input_level().clamp(0.0, 1.0)
    }

    /// Select the input device. Restarts the monitor if it is running and
    /// the id changed.
    pub fn set_preferred_input_device_id(&mut self, device_id: i32) -> AudioResult<()> {
        if self.preferred_input_device == device_id {
            return Ok(());
        }
        self.preferred_input_device = device_id;
        self.engine.set_preferred_input_device_id(device_id);
        if self.is_started() {
            self.stop();
            self.start()?;
        }
        Ok(())
    }

    pub fn preferred_input_device_id(&self) -> i32 {
        self.preferred_input_device
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &MonitorEngine {
        &self.engine
    }

    /// Take the engine's lifecycle event receiver. See
    /// [`MonitorEngine::take_events`].
    pub fn take_events(&self) -> Option<EngineEvents> {
        self.engine.take_events()
    }

    fn set_node_param(&self, index: Option<usize>, param_id: usize, value: f32) {
        if let Some(index) = index {
            self.engine.set_param(index, param_id, value);
        }
    }

    fn apply_gain(&self) {
        let Some(nodes) = self.nodes else { return };
        self.set_node_param(nodes.gain, GainNode::PARAM_GAIN, self.effective_gain());
    }

    fn apply_noise_suppression(&self) {
        let Some(nodes) = self.nodes else { return };
        let (threshold, attenuation) = if self.noise_suppression {
            GATE_ON
        } else {
            GATE_OFF
        };
        self.set_node_param(nodes.noise_gate, NoiseGateNode::PARAM_THRESHOLD, threshold);
        self.set_node_param(nodes.noise_gate, NoiseGateNode::PARAM_ATTENUATION, attenuation);
    }

    fn apply_delay_time(&self) {
        let Some(nodes) = self.nodes else { return };
        self.set_node_param(nodes.delay, DelayNode::PARAM_TIME_MS, self.delay_ms as f32);
    }

    fn apply_delay_mix(&self) {
        let Some(nodes) = self.nodes else { return };
        if !self.feedback_enabled || self.delay_ms == 0 {
            log::debug!("Delayed feedback off");
            self.set_node_param(nodes.delay, DelayNode::PARAM_FEEDBACK, 0.0);
            self.set_node_param(nodes.delay, DelayNode::PARAM_MIX, 0.0);
            return;
        }

        let time_ms = self
            .delay_ms
            .clamp(FEEDBACK_DELAY_MS_RANGE.0, FEEDBACK_DELAY_MS_RANGE.1);
        log::debug!("Delayed feedback at {} ms ({})", time_ms, self.preset);
        self.set_node_param(nodes.delay, DelayNode::PARAM_TIME_MS, time_ms as f32);
        self.set_node_param(
            nodes.delay,
            DelayNode::PARAM_FEEDBACK,
            self.preset.delay_feedback(),
        );
        self.set_node_param(nodes.delay, DelayNode::PARAM_MIX, self.preset.delay_mix());
    }

    fn apply_pitch(&self) {
        let Some(nodes) = self.nodes else { return };
        self.set_node_param(nodes.pitch, ResamplePitchNode::PARAM_RATIO, self.pitch_ratio);
        self.set_node_param(nodes.pitch, ResamplePitchNode::PARAM_MIX, self.pitch_mix);
    }
}

impl Drop for SpeechMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
