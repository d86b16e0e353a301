//! The core DspNode trait and supporting types.
//!
//! This module defines the interface every stage of the monitoring chain
//! implements, so built-in and user-registered nodes can be driven uniformly
//! by the chain and looked up by name in the registry.

use super::context::DspContext;
use super::parameter::{AtomicParam, ParamSlots, ParameterDefinition};

/// Static information about a DSP node type.
#[derive(Clone, Debug)]
pub struct NodeInfo {
    /// Registry key for the node type (e.g., "gain", "delay").
    pub id: &'static str,
    /// Human-readable name (e.g., "Gain", "Delay").
    pub name: &'static str,
    /// A brief description of what the node does.
    pub description: &'static str,
}

impl NodeInfo {
    /// Creates a new node info.
    pub const fn new(id: &'static str, name: &'static str, description: &'static str) -> Self {
        Self {
            id,
            name,
            description,
        }
    }
}

/// The core trait that all DSP nodes must implement.
///
/// Nodes transform a block of interleaved samples in place. The chain calls
/// `prepare` with the current [`DspContext`] before the first `process`, and
/// again whenever the stream format changes.
///
/// # Thread Safety
///
/// `DspNode` requires `Send + 'static` because nodes are built on the control
/// thread and then driven from the render callback thread. `set_param` takes
/// `&self`: parameter storage is atomic, so an update never waits on the
/// audio thread and becomes visible on the next block. Updates to different
/// parameters are independent; there is no multi-parameter transaction.
pub trait DspNode: Send + 'static {
    /// Returns static information about this node.
    fn info(&self) -> &NodeInfo;

    /// Returns the parameter definitions, indexed by parameter id.
    fn parameters(&self) -> &[ParameterDefinition];

    /// Returns the live parameter storage, indexed by parameter id.
    ///
    /// The chain keeps a clone of this handle so parameters can be set and
    /// read without touching the node itself.
    fn param_slots(&self) -> &ParamSlots;

    /// (Re)initializes internal state for the given context.
    ///
    /// May be called any number of times. Buffers that depend on the sample
    /// rate or channel count are (re)allocated here.
    fn prepare(&mut self, context: &DspContext);

    /// Transforms `frames` frames of interleaved audio in place.
    ///
    /// # Real-time Constraints
    ///
    /// This method runs on the render thread and must not:
    /// - Allocate memory (except where a node documents otherwise)
    /// - Acquire locks
    /// - Perform I/O operations
    ///
    /// `frames == 0` must be a no-op. If `block` is shorter than
    /// `frames * channels`, only the whole frames it contains are processed.
    fn process(&mut self, block: &mut [f32], frames: usize);

    /// Stable identifying string, used as the registry lookup key.
    fn name(&self) -> &'static str {
        self.info().id
    }

    /// Updates one parameter.
    ///
    /// Unknown ids are ignored and values are clamped into the declared range.
    fn set_param(&self, id: usize, value: f32) {
        if let Some(slot) = self.param_slots().get(id) {
            slot.set(value);
        }
    }

    /// Reads the current value of a parameter, or `None` for an unknown id.
    fn param(&self, id: usize) -> Option<f32> {
        self.param_slots().get(id).map(AtomicParam::get)
    }
}

/// Number of whole frames of `channels` samples that fit in both `frames`
/// and `block`.
#[inline]
pub(crate) fn frames_in_block(block: &[f32], frames: usize, channels: usize) -> usize {
    if channels == 0 {
        return 0;
    }
    frames.min(block.len() / channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::parameter::{param_slots, ParameterDisplay};

    static PASSTHROUGH_INFO: NodeInfo =
        NodeInfo::new("passthrough", "Passthrough", "Passes audio through unchanged");

    /// A minimal test node that passes audio through unchanged.
    struct PassthroughNode {
        params: ParamSlots,
        prepared: Option<DspContext>,
    }

    impl PassthroughNode {
        fn new() -> Self {
            Self {
                params: param_slots(&[]),
                prepared: None,
            }
        }
    }

    impl DspNode for PassthroughNode {
        fn info(&self) -> &NodeInfo {
            &PASSTHROUGH_INFO
        }

        fn parameters(&self) -> &[ParameterDefinition] {
            &[]
        }

        fn param_slots(&self) -> &ParamSlots {
            &self.params
        }

        fn prepare(&mut self, context: &DspContext) {
            self.prepared = Some(*context);
        }

        fn process(&mut self, _block: &mut [f32], _frames: usize) {}
    }

    const SCALE_PARAMS: [ParameterDefinition; 1] = [ParameterDefinition::new(
        "scale",
        "Scale",
        0.0,
        2.0,
        1.0,
        ParameterDisplay::linear("x"),
    )];

    static SCALE_INFO: NodeInfo = NodeInfo::new("scale", "Scale", "Scales the signal");

    /// A test node with one parameter.
    struct ScaleNode {
        params: ParamSlots,
        channels: usize,
    }

    impl ScaleNode {
        fn new() -> Self {
            Self {
                params: param_slots(&SCALE_PARAMS),
                channels: 1,
            }
        }
    }

    impl DspNode for ScaleNode {
        fn info(&self) -> &NodeInfo {
            &SCALE_INFO
        }

        fn parameters(&self) -> &[ParameterDefinition] {
            &SCALE_PARAMS
        }

        fn param_slots(&self) -> &ParamSlots {
            &self.params
        }

        fn prepare(&mut self, context: &DspContext) {
            self.channels = context.channels;
        }

        fn process(&mut self, block: &mut [f32], frames: usize) {
            let frames = frames_in_block(block, frames, self.channels);
            let scale = self.params[0].get();
            for sample in block[..frames * self.channels].iter_mut() {
                *sample *= scale;
            }
        }
    }

    #[test]
    fn test_node_info_creation() {
        let info = NodeInfo::new("test_node", "Test Node", "A test node");
        assert_eq!(info.id, "test_node");
        assert_eq!(info.name, "Test Node");
        assert_eq!(info.description, "A test node");
    }

    #[test]
    fn test_name_defaults_to_info_id() {
        let node = PassthroughNode::new();
        assert_eq!(node.name(), "passthrough");
    }

    #[test]
    fn test_prepare_records_context() {
        let mut node = PassthroughNode::new();
        let ctx = DspContext::new(44100, 2, 128);
        node.prepare(&ctx);
        assert_eq!(node.prepared, Some(ctx));
    }

    #[test]
    fn test_default_set_param_clamps_and_ignores_unknown() {
        let node = ScaleNode::new();

        node.set_param(0, 1.5);
        assert_eq!(node.param(0), Some(1.5));

        node.set_param(0, 10.0);
        assert_eq!(node.param(0), Some(2.0));

        // Unknown ids do nothing
        node.set_param(7, 0.0);
        assert_eq!(node.param(7), None);
        assert_eq!(node.param(0), Some(2.0));
    }

    #[test]
    fn test_process_respects_frame_count() {
        let mut node = ScaleNode::new();
        node.prepare(&DspContext::new(48000, 2, 4));
        node.set_param(0, 2.0);

        let mut block = [1.0f32; 8];
        node.process(&mut block, 2);

        assert_eq!(&block[..4], &[2.0, 2.0, 2.0, 2.0]);
        assert_eq!(&block[4..], &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_frames_in_block() {
        let block = [0.0f32; 10];
        assert_eq!(frames_in_block(&block, 3, 2), 3);
        assert_eq!(frames_in_block(&block, 8, 2), 5);
        assert_eq!(frames_in_block(&block, 4, 0), 0);
    }

    #[test]
    fn test_node_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<PassthroughNode>();
        assert_send::<ScaleNode>();
        assert_send::<Box<dyn DspNode>>();
    }
}
