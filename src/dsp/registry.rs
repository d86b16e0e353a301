//! Node registry for managing DSP node types.
//!
//! The registry provides a central catalog of available node types,
//! enabling the engine to instantiate nodes by their string name.

use std::collections::HashMap;

use super::node_trait::{DspNode, NodeInfo};

/// Factory function type for creating node instances.
///
/// Returns a boxed trait object for type erasure.
pub type NodeFactory = fn() -> Box<dyn DspNode>;

/// Central registry of available DSP node types.
///
/// Populated once when the engine is built, then only read.
///
/// # Example
///
/// ```ignore
/// let mut registry = NodeRegistry::new();
/// registry.register::<GainNode>();
/// registry.register::<DelayNode>();
///
/// // Later, create instances by name
/// if let Some(gain) = registry.create("gain") {
///     chain.add(gain);
/// }
/// ```
pub struct NodeRegistry {
    /// Map of node name to factory function.
    factories: HashMap<&'static str, NodeFactory>,
    /// Cached node information for listing, in registration order.
    infos: Vec<NodeInfo>,
}

impl NodeRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            infos: Vec::new(),
        }
    }

    /// Registers a node type with the registry.
    ///
    /// A temporary instance is created to read the node's info, which is
    /// stored along with a factory function.
    ///
    /// # Panics
    ///
    /// Panics if a node with the same name is already registered.
    pub fn register<N: DspNode + Default>(&mut self) {
        let temp = N::default();
        let info = temp.info().clone();
        let id = info.id;

        if self.factories.contains_key(id) {
            panic!("Node '{}' is already registered", id);
        }

        self.factories.insert(id, create_node::<N>);
        self.infos.push(info);
    }

    /// Creates a new instance of a node by its name.
    ///
    /// Returns `None` if no node with the given name is registered.
    pub fn create(&self, name: &str) -> Option<Box<dyn DspNode>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Returns info for all registered node types, in registration order.
    pub fn list_nodes(&self) -> &[NodeInfo] {
        &self.infos
    }

    /// Returns the number of registered node types.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if no node types are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Checks if a node with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn create_node<N: DspNode + Default>() -> Box<dyn DspNode> {
    Box::new(N::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{param_slots, DspContext, ParamSlots, ParameterDefinition};

    static SILENCE_INFO: NodeInfo =
        NodeInfo::new("test.silence", "Silence", "Zeroes its input for registry testing");

    struct SilenceNode {
        params: ParamSlots,
    }

    impl Default for SilenceNode {
        fn default() -> Self {
            Self {
                params: param_slots(&[]),
            }
        }
    }

    impl DspNode for SilenceNode {
        fn info(&self) -> &NodeInfo {
            &SILENCE_INFO
        }

        fn parameters(&self) -> &[ParameterDefinition] {
            &[]
        }

        fn param_slots(&self) -> &ParamSlots {
            &self.params
        }

        fn prepare(&mut self, _context: &DspContext) {}

        fn process(&mut self, block: &mut [f32], _frames: usize) {
            for sample in block.iter_mut() {
                *sample = 0.0;
            }
        }
    }

    static PASS_INFO: NodeInfo =
        NodeInfo::new("test.pass", "Pass", "Passthrough for registry testing");

    struct PassNode {
        params: ParamSlots,
    }

    impl Default for PassNode {
        fn default() -> Self {
            Self {
                params: param_slots(&[]),
            }
        }
    }

    impl DspNode for PassNode {
        fn info(&self) -> &NodeInfo {
            &PASS_INFO
        }

        fn parameters(&self) -> &[ParameterDefinition] {
            &[]
        }

        fn param_slots(&self) -> &ParamSlots {
            &self.params
        }

        fn prepare(&mut self, _context: &DspContext) {}

        fn process(&mut self, _block: &mut [f32], _frames: usize) {}
    }

    #[test]
    fn test_registry_creation() {
        let registry = NodeRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_multiple_nodes() {
        let mut registry = NodeRegistry::new();
        registry.register::<SilenceNode>();
        registry.register::<PassNode>();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("test.silence"));
        assert!(registry.contains("test.pass"));
    }

    #[test]
    fn test_create_node() {
        let mut registry = NodeRegistry::new();
        registry.register::<SilenceNode>();

        let node = registry.create("test.silence");
        assert!(node.is_some());
        assert_eq!(node.unwrap().name(), "test.silence");
    }

    #[test]
    fn test_create_unknown_node() {
        let registry = NodeRegistry::new();
        assert!(registry.create("nonexistent").is_none());
    }

    #[test]
    fn test_each_create_is_a_fresh_instance() {
        let mut registry = NodeRegistry::new();
        registry.register::<SilenceNode>();

        let mut first = registry.create("test.silence").unwrap();
        let second = registry.create("test.silence").unwrap();

        let mut block = [1.0f32; 4];
        first.process(&mut block, 4);
        assert_eq!(block, [0.0; 4]);
        assert_eq!(second.name(), first.name());
    }

    #[test]
    fn test_list_nodes_in_registration_order() {
        let mut registry = NodeRegistry::new();
        registry.register::<PassNode>();
        registry.register::<SilenceNode>();

        let ids: Vec<&str> = registry.list_nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["test.pass", "test.silence"]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration_panics() {
        let mut registry = NodeRegistry::new();
        registry.register::<PassNode>();
        registry.register::<PassNode>();
    }

    #[test]
    fn test_default_implementation() {
        let registry = NodeRegistry::default();
        assert!(registry.is_empty());
    }
}
