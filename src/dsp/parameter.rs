//! Parameter definitions and lock-free parameter storage for DSP nodes.
//!
//! Parameters are the tunable values on nodes (gain, delay time, mix...).
//! Each one is addressed by a small integer id (its index in the node's
//! definition list) and stored in its own atomic, so the control thread can
//! update it without ever blocking the audio thread.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// How a parameter value should be displayed and interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterDisplay {
    /// Linear scaling with a unit suffix (e.g., "ms", "%").
    Linear { unit: &'static str },
    /// Logarithmic scaling, common for time and ratio controls.
    Logarithmic { unit: &'static str },
}

impl ParameterDisplay {
    /// Creates a linear display with the given unit.
    pub const fn linear(unit: &'static str) -> Self {
        Self::Linear { unit }
    }

    /// Creates a logarithmic display with the given unit.
    pub const fn logarithmic(unit: &'static str) -> Self {
        Self::Logarithmic { unit }
    }

    /// Returns the unit string.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Linear { unit } | Self::Logarithmic { unit } => unit,
        }
    }

    /// Returns true if this is a logarithmic parameter.
    pub fn is_logarithmic(&self) -> bool {
        matches!(self, Self::Logarithmic { .. })
    }
}

/// Definition of a parameter on a DSP node.
///
/// The position of a definition in the node's list is the parameter id used
/// by `set_param`. Values outside `[min, max]` are clamped, never rejected.
#[derive(Clone, Debug)]
pub struct ParameterDefinition {
    /// Stable identifier for this parameter within the node.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Minimum value of the parameter.
    pub min: f32,
    /// Maximum value of the parameter (may be `f32::INFINITY`).
    pub max: f32,
    /// Value the parameter holds when the node is created.
    pub default: f32,
    /// How to display and interpret the parameter value.
    pub display: ParameterDisplay,
}

impl ParameterDefinition {
    /// Creates a new parameter definition.
    pub const fn new(
        id: &'static str,
        name: &'static str,
        min: f32,
        max: f32,
        default: f32,
        display: ParameterDisplay,
    ) -> Self {
        Self {
            id,
            name,
            min,
            max,
            default,
            display,
        }
    }

    /// Creates a normalized parameter (0.0 to 1.0) with linear display.
    pub const fn normalized(id: &'static str, name: &'static str, default: f32) -> Self {
        Self::new(id, name, 0.0, 1.0, default, ParameterDisplay::linear("%"))
    }

    /// Clamps a value to this parameter's valid range.
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// A single parameter value shared between the control and audio threads.
///
/// The value is stored as raw `f32` bits in an `AtomicU32`. Writes are
/// clamped into the definition's range; NaN writes are dropped so the audio
/// path never sees a non-number.
#[derive(Debug)]
pub struct AtomicParam {
    bits: AtomicU32,
    min: f32,
    max: f32,
}

impl AtomicParam {
    /// Creates a parameter slot holding the definition's default value.
    pub fn from_definition(definition: &ParameterDefinition) -> Self {
        Self {
            bits: AtomicU32::new(definition.clamp(definition.default).to_bits()),
            min: definition.min,
            max: definition.max,
        }
    }

    /// Stores a new value, clamped into range.
    pub fn set(&self, value: f32) {
        if value.is_nan() {
            return;
        }
        let clamped = value.clamp(self.min, self.max);
        self.bits.store(clamped.to_bits(), Ordering::Relaxed);
    }

    /// Loads the current value.
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Live parameter storage of one node, shared with the chain's control side.
pub type ParamSlots = Arc<[AtomicParam]>;

/// Builds one `AtomicParam` per definition, in order.
pub fn param_slots(definitions: &[ParameterDefinition]) -> ParamSlots {
    definitions.iter().map(AtomicParam::from_definition).collect()
}
