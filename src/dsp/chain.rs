//! Ordered chain of DSP nodes.
//!
//! The chain is shared between the control thread (which adds, clears and
//! tunes nodes) and the render thread (which runs `process` once per block).
//!
//! Two locks split the work:
//! - `nodes` holds the boxed nodes. The render thread takes it for one
//!   block; control-side edits only push or swap out the vector under it.
//! - `control` holds the context and, per node, its name and a clone of
//!   its parameter storage. Parameter writes, reads and listings go through
//!   this side only, so they never contend with the render thread.
//!
//! Lock order is `control` then `nodes`.

use std::sync::{Mutex, MutexGuard};

use super::context::DspContext;
use super::node_trait::DspNode;
use super::parameter::{AtomicParam, ParamSlots};

/// Control-side view of one node in a chain.
///
/// Shares the node's parameter storage, so reads and writes through the
/// handle reach the node without locking it.
#[derive(Clone)]
pub struct NodeHandle {
    name: &'static str,
    params: ParamSlots,
}

impl NodeHandle {
    /// Registry key of the node.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of parameters the node declares.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Current value of a parameter, or `None` for an unknown id.
    pub fn param(&self, param_id: usize) -> Option<f32> {
        self.params.get(param_id).map(AtomicParam::get)
    }

    /// Sets a parameter. Unknown ids are ignored; values are clamped.
    pub fn set_param(&self, param_id: usize, value: f32) {
        if let Some(slot) = self.params.get(param_id) {
            slot.set(value);
        }
    }
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("name", &self.name)
            .field("params", &self.params.len())
            .finish()
    }
}

struct ControlState {
    /// Context the nodes were last prepared with, if any.
    context: Option<DspContext>,
    /// One handle per node, in processing order.
    handles: Vec<NodeHandle>,
}

/// An ordered, mutable sequence of DSP nodes.
///
/// Insertion order is processing order. Once the chain knows a context,
/// every node it holds has been prepared with that context.
pub struct DspChain {
    nodes: Mutex<Vec<Box<dyn DspNode>>>,
    control: Mutex<ControlState>,
}

/// Locks `mutex`, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DspChain {
    /// Creates an empty chain with no context.
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(Vec::new()),
            control: Mutex::new(ControlState {
                context: None,
                handles: Vec::new(),
            }),
        }
    }

    /// Stores the context and prepares every node with it.
    ///
    /// Holds the node lock while nodes reallocate, so call it while no
    /// render stream is running.
    pub fn prepare(&self, context: DspContext) {
        let mut control = lock(&self.control);
        control.context = Some(context);
        for node in lock(&self.nodes).iter_mut() {
            node.prepare(&context);
        }
    }

    /// Returns the context the chain was last prepared with.
    pub fn context(&self) -> Option<DspContext> {
        lock(&self.control).context
    }

    /// Appends a node, preparing it first if a context is known.
    ///
    /// Returns the index of the new node.
    pub fn add(&self, mut node: Box<dyn DspNode>) -> usize {
        let mut control = lock(&self.control);
        // Prepare before the node is visible to the render thread.
        if let Some(context) = control.context {
            node.prepare(&context);
        }
        control.handles.push(NodeHandle {
            name: node.name(),
            params: ParamSlots::clone(node.param_slots()),
        });
        lock(&self.nodes).push(node);
        control.handles.len() - 1
    }

    /// Removes every node.
    pub fn clear(&self) {
        let mut control = lock(&self.control);
        control.handles.clear();
        // Nodes are freed after the guard is released.
        let removed = std::mem::take(&mut *lock(&self.nodes));
        drop(control);
        drop(removed);
    }

    /// Number of nodes in the chain.
    pub fn size(&self) -> usize {
        lock(&self.control).handles.len()
    }

    /// Returns true if the chain holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Handle to the node at `index`, or `None` if out of range.
    pub fn at(&self, index: usize) -> Option<NodeHandle> {
        lock(&self.control).handles.get(index).cloned()
    }

    /// Names of the nodes in processing order.
    pub fn node_names(&self) -> Vec<&'static str> {
        lock(&self.control)
            .handles
            .iter()
            .map(|handle| handle.name)
            .collect()
    }

    /// Sets a parameter on the node at `index`.
    ///
    /// Returns false (and does nothing) if the index is out of range.
    /// Unknown parameter ids are ignored; values are clamped.
    pub fn set_param(&self, index: usize, param_id: usize, value: f32) -> bool {
        let control = lock(&self.control);
        let Some(handle) = control.handles.get(index) else {
            return false;
        };
        handle.set_param(param_id, value);
        true
    }

    /// Reads a parameter of the node at `index`.
    pub fn param(&self, index: usize, param_id: usize) -> Option<f32> {
        lock(&self.control)
            .handles
            .get(index)
            .and_then(|handle| handle.param(param_id))
    }

    /// Feeds the block through every node in insertion order.
    ///
    /// Called by the render callback. Waits only for `add`, `clear` or
    /// `prepare`, never for parameter traffic.
    pub fn process(&self, block: &mut [f32], frames: usize) {
        if frames == 0 {
            return;
        }
        for node in lock(&self.nodes).iter_mut() {
            node.process(block, frames);
        }
    }
}

impl Default for DspChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{GainNode, LimiterNode};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_empty_chain_is_passthrough() {
        let chain = DspChain::new();
        chain.prepare(DspContext::default());

        let mut block = [0.1, -0.2, 0.3];
        chain.process(&mut block, 3);
        assert_eq!(block, [0.1, -0.2, 0.3]);
        assert!(chain.is_empty());
    }

    #[test]
    fn test_add_returns_index() {
        let chain = DspChain::new();
        assert_eq!(chain.add(Box::new(GainNode::new())), 0);
        assert_eq!(chain.add(Box::new(LimiterNode::new())), 1);
        assert_eq!(chain.size(), 2);
        assert_eq!(chain.node_names(), vec!["gain", "limiter"]);
    }

    #[test]
    fn test_add_prepares_with_known_context() {
        let chain = DspChain::new();
        let ctx = DspContext::new(48000, 2, 64);
        chain.prepare(ctx);
        chain.add(Box::new(GainNode::new()));
        chain.set_param(0, 0, 2.0);

        // Stereo block: both channels of both frames must be scaled,
        // which only happens if the node learned channels = 2.
        let mut block = [0.25f32; 4];
        chain.process(&mut block, 2);
        assert_eq!(block, [0.5; 4]);
    }

    #[test]
    fn test_prepare_reaches_existing_nodes() {
        let chain = DspChain::new();
        chain.add(Box::new(GainNode::new()));
        chain.prepare(DspContext::new(44100, 2, 128));
        assert_eq!(chain.context(), Some(DspContext::new(44100, 2, 128)));

        chain.set_param(0, 0, 0.5);
        let mut block = [1.0f32; 4];
        chain.process(&mut block, 2);
        assert_eq!(block, [0.5; 4]);
    }

    #[test]
    fn test_nodes_apply_in_insertion_order() {
        let chain = DspChain::new();
        chain.prepare(DspContext::default());

        let gain = chain.add(Box::new(GainNode::new()));
        let limiter = chain.add(Box::new(LimiterNode::new()));
        chain.set_param(gain, GainNode::PARAM_GAIN, 2.0);
        chain.set_param(limiter, LimiterNode::PARAM_THRESHOLD, 0.9);
        chain.set_param(limiter, LimiterNode::PARAM_RATIO, 1.0);

        // gain first: 0.6 * 2 = 1.2, then the limiter clips to 1.0.
        // Reversed order would give 0.6 * 2 = 1.2 unclipped.
        let mut block = [0.6f32];
        chain.process(&mut block, 1);
        assert!((block[0] - 1.0).abs() < 1e-6, "got {}", block[0]);
    }

    #[test]
    fn test_clear_removes_all_nodes() {
        let chain = DspChain::new();
        chain.add(Box::new(GainNode::new()));
        chain.add(Box::new(GainNode::new()));
        chain.clear();
        assert_eq!(chain.size(), 0);
        assert_eq!(chain.param(0, 0), None);
        assert!(!chain.set_param(0, 0, 1.0));

        // Indices restart after a clear.
        assert_eq!(chain.add(Box::new(LimiterNode::new())), 0);
        assert_eq!(chain.node_names(), vec!["limiter"]);
    }

    #[test]
    fn test_set_param_reaches_node() {
        let chain = DspChain::new();
        assert!(!chain.set_param(3, 0, 1.0));
        chain.add(Box::new(GainNode::new()));
        assert!(chain.set_param(0, 0, 1.5));
        assert_eq!(chain.param(0, 0), Some(1.5));

        // Unknown parameter id on a valid node.
        assert!(chain.set_param(0, 7, 1.0));
        assert_eq!(chain.param(0, 7), None);

        // Clamped into the node's declared range.
        chain.set_param(0, GainNode::PARAM_GAIN, 5.0);
        assert_eq!(chain.param(0, GainNode::PARAM_GAIN), Some(3.0));
    }

    #[test]
    fn test_at_returns_live_handle() {
        let chain = DspChain::new();
        chain.prepare(DspContext::default());
        assert!(chain.at(0).is_none());
        chain.add(Box::new(GainNode::new()));
        chain.add(Box::new(LimiterNode::new()));

        let limiter = chain.at(1).unwrap();
        assert_eq!(limiter.name(), "limiter");
        assert_eq!(limiter.param_count(), 2);
        assert!(chain.at(2).is_none());

        // The handle shares storage with the node inside the chain.
        let gain = chain.at(0).unwrap();
        gain.set_param(GainNode::PARAM_GAIN, 0.5);
        assert_eq!(chain.param(0, GainNode::PARAM_GAIN), Some(0.5));
        let mut block = [1.0f32];
        chain.process(&mut block, 1);
        assert_eq!(block, [0.5]);
    }

    #[test]
    fn test_zero_frames_is_noop() {
        let chain = DspChain::new();
        chain.prepare(DspContext::default());
        chain.add(Box::new(GainNode::new()));
        chain.set_param(0, 0, 3.0);

        let mut block = [0.2f32; 2];
        chain.process(&mut block, 0);
        assert_eq!(block, [0.2, 0.2]);
    }

    #[test]
    fn test_process_runs_during_parameter_traffic() {
        let chain = Arc::new(DspChain::new());
        chain.prepare(DspContext::default());
        chain.add(Box::new(GainNode::new()));
        chain.set_param(0, GainNode::PARAM_GAIN, 0.0);

        let done = Arc::new(AtomicBool::new(false));
        let control = {
            let chain = Arc::clone(&chain);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    assert_eq!(chain.node_names(), vec!["gain"]);
                    chain.set_param(0, GainNode::PARAM_GAIN, 0.0);
                    assert_eq!(chain.param(0, GainNode::PARAM_GAIN), Some(0.0));
                }
            })
        };

        for _ in 0..5000 {
            let mut block = [0.5f32; 192];
            chain.process(&mut block, 192);
            assert!(block.iter().all(|s| *s == 0.0));
        }
        done.store(true, Ordering::Relaxed);
        control.join().unwrap();
    }

    #[test]
    fn test_chain_is_sync() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<DspChain>();
    }
}
