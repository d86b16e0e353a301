//! DSP module
//!
//! Core DSP traits and types.
//! Defines the DspNode trait, parameters, the node registry and the chain.

pub mod chain;
pub mod context;
pub mod node_trait;
pub mod parameter;
pub mod registry;

pub use chain::{DspChain, NodeHandle};
pub use context::DspContext;
pub use node_trait::{DspNode, NodeInfo};
pub use parameter::{
    param_slots, AtomicParam, ParamSlots, ParameterDefinition, ParameterDisplay,
};
pub use registry::{NodeFactory, NodeRegistry};
