//! Microphone presets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Voice character presets for the speech monitor.
///
/// Each preset picks a base gain and, when delayed feedback is on, how much
/// of the delayed signal is mixed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MicPreset {
    /// Most natural sound, light delayed feedback.
    #[default]
    Neutral,
    /// Slightly softer voice, a bit more of the delayed signal.
    Smooth,
    /// Louder voice and the strongest delayed feedback.
    Dynamic,
}

impl MicPreset {
    /// All presets, in display order.
    pub const ALL: [MicPreset; 3] = [MicPreset::Neutral, MicPreset::Smooth, MicPreset::Dynamic];

    /// Base gain applied when the preset is selected.
    pub fn gain(self) -> f32 {
        match self {
            MicPreset::Neutral => 1.0,
            MicPreset::Smooth => 0.8,
            MicPreset::Dynamic => 1.3,
        }
    }

    /// Delay wet mix used while delayed feedback is enabled.
    pub fn delay_mix(self) -> f32 {
        match self {
            MicPreset::Neutral => 0.60,
            MicPreset::Smooth => 0.45,
            MicPreset::Dynamic => 0.80,
        }
    }

    /// Delay feedback used while delayed feedback is enabled.
    pub fn delay_feedback(self) -> f32 {
        0.0
    }

    /// Short name for display.
    pub fn label(self) -> &'static str {
        match self {
            MicPreset::Neutral => "Neutral",
            MicPreset::Smooth => "Smooth",
            MicPreset::Dynamic => "Dynamic",
        }
    }
}

impl fmt::Display for MicPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MicPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MicPreset::ALL
            .into_iter()
            .find(|preset| preset.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown preset '{}'", s))
    }
}
