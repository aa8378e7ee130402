//! Node arena for the define-by-run computation graph.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use super::function::Operator;
use crate::buffer::Buffer;
use crate::error::{GradError, Result};

/// Unique identifier for a node in the computation graph.
///
/// The index names an arena slot; the generation names one occupant of
/// that slot. An id whose generation no longer matches its slot is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u64,
}

impl NodeId {
    /// Get the internal index.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(index: usize) -> Self {
        Self {
            index,
            generation: 0,
        }
    }
}

/// A value recorded as an operand of an operator instance.
///
/// Only `Node` parents take part in traversal; constants are opaque
/// option values kept for display and bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parent {
    Node(NodeId),
    Constant(f32),
}

impl Parent {
    /// Node id if this parent is a graph node.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Parent::Node(id) => Some(*id),
            Parent::Constant(_) => None,
        }
    }
}

/// Construction options for leaf nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TensorOptions {
    /// Whether an optimizer should update this node's value from its grad.
    /// Advisory only: gradients flow regardless.
    pub trainable: bool,
    /// Display name, used by the DOT export.
    pub label: String,
}

impl TensorOptions {
    pub fn trainable(mut self, trainable: bool) -> Self {
        self.trainable = trainable;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// A vertex of the computation graph.
pub struct Node {
    value: Buffer,
    grad: Buffer,
    creator: Option<Box<dyn Operator>>,
    released: bool,
    trainable: bool,
    label: String,
}

impl Node {
    fn new(value: Buffer, creator: Option<Box<dyn Operator>>, options: TensorOptions) -> Self {
        Self {
            grad: value.zeros_like(),
            value,
            creator,
            released: false,
            trainable: options.trainable,
            label: options.label,
        }
    }

    pub fn value(&self) -> &Buffer {
        &self.value
    }

    pub fn grad(&self) -> &Buffer {
        &self.grad
    }

    /// Operator instance that produced this node, if still held.
    pub fn creator(&self) -> Option<&dyn Operator> {
        self.creator.as_deref()
    }

    /// True for user-created inputs: no creator and never released.
    pub fn is_leaf(&self) -> bool {
        self.creator.is_none() && !self.released
    }

    /// True once a backward pass has torn down this node's creator.
    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn trainable(&self) -> bool {
        self.trainable
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn value_mut(&mut self) -> &mut Buffer {
        &mut self.value
    }

    pub(crate) fn grad_mut(&mut self) -> &mut Buffer {
        &mut self.grad
    }

    pub(crate) fn set_trainable(&mut self, trainable: bool) {
        self.trainable = trainable;
    }

    pub(crate) fn set_label(&mut self, label: String) {
        self.label = label;
    }

    /// Move the creator out for the duration of its backward call.
    pub(crate) fn take_creator(&mut self) -> Option<Box<dyn Operator>> {
        self.creator.take()
    }

    pub(crate) fn restore_creator(&mut self, creator: Box<dyn Operator>) {
        self.creator = Some(creator);
    }

    /// Drop the creator and mark the node as torn down.
    ///
    /// No-op on leaves.
    pub fn release(&mut self) {
        if self.creator.take().is_some() {
            self.released = true;
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("shape", &self.value.shape())
            .field("creator", &self.creator.as_ref().map(|c| c.name()))
            .field("released", &self.released)
            .field("trainable", &self.trainable)
            .field("label", &self.label)
            .finish()
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    node: Option<Node>,
}

/// Thread-local arena of graph nodes.
///
/// Nodes live until the arena is cleared or swept with
/// [`retain_reachable`](Self::retain_reachable). Freed slots are reused
/// under a new generation, so an id never resolves to a node other than
/// the one it was issued for.
#[derive(Debug, Default)]
pub struct ComputationGraph {
    slots: Vec<Slot>,
    free: Vec<usize>,
    next_generation: u64,
}

impl ComputationGraph {
    /// Create a new empty computation graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user-created leaf.
    pub fn create_leaf(&mut self, value: Buffer, options: TensorOptions) -> NodeId {
        self.push(Node::new(value, None, options))
    }

    /// Insert an operation result.
    ///
    /// Results are always marked trainable, whatever their operands say.
    pub fn create_node(&mut self, value: Buffer, creator: Box<dyn Operator>) -> NodeId {
        let options = TensorOptions::default().trainable(true);
        self.push(Node::new(value, Some(creator), options))
    }

    fn push(&mut self, node: Node) -> NodeId {
        let generation = self.next_generation;
        self.next_generation += 1;
        let slot = Slot {
            generation,
            node: Some(node),
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = slot;
                index
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        NodeId { index, generation }
    }

    /// Get node by ID.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(GradError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(GradError::UnknownNode(id))
    }

    /// Free a single node; its id becomes stale.
    pub(crate) fn discard(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;
        self.slots[id.index].node = None;
        self.free.push(id.index);
        Ok(())
    }

    /// Reset every node's gradient to zero.
    pub fn zero_grad_all(&mut self) {
        for node in self.slots.iter_mut().filter_map(|slot| slot.node.as_mut()) {
            node.grad.fill(0.0);
        }
    }

    /// Drop every node. Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    /// Free every node that is not reachable from `keep`.
    ///
    /// Reachability follows held creators, so a kept result keeps its
    /// unreleased history alive. Kept ids stay valid; freed ids become
    /// stale. Returns the number of nodes freed.
    ///
    /// # Errors
    ///
    /// `GradError::UnknownNode` if an id in `keep` is stale. Nothing is
    /// freed in that case.
    pub fn retain_reachable(&mut self, keep: &[NodeId]) -> Result<usize> {
        let mut reachable = HashSet::new();
        let mut stack = Vec::with_capacity(keep.len());
        for &id in keep {
            self.node(id)?;
            stack.push(id);
        }
        while let Some(id) = stack.pop() {
            if !reachable.insert(id) {
                continue;
            }
            if let Some(creator) = self.node(id)?.creator() {
                stack.extend(creator.inputs());
            }
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let id = NodeId {
                index,
                generation: slot.generation,
            };
            if slot.node.is_some() && !reachable.contains(&id) {
                slot.node = None;
                self.free.push(index);
                freed += 1;
            }
        }
        debug!(freed, live = reachable.len(), "swept graph");
        Ok(freed)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

thread_local! {
    static GRAPH: RefCell<ComputationGraph> = RefCell::new(ComputationGraph::new());
}

/// Access the thread-local computation graph.
///
/// The closure must not call back into anything that touches the graph.
///
/// # Example
///
/// ```
/// use ndgrad::autodiff::{clear_graph, with_graph};
/// use ndgrad::Tensor;
///
/// clear_graph();
/// let _x = Tensor::scalar(1.0);
/// assert_eq!(with_graph(|g| g.len()), 1);
/// ```
pub fn with_graph<R>(f: impl FnOnce(&mut ComputationGraph) -> R) -> R {
    GRAPH.with(|g| f(&mut g.borrow_mut()))
}

/// Clear the thread-local computation graph.
pub fn clear_graph() {
    with_graph(|g| g.clear());
}

/// Zero the gradient of every node in the thread-local graph.
pub fn zero_grad_all() {
    with_graph(|g| g.zero_grad_all());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::function::Operator;

    #[derive(Debug)]
    struct PassThrough {
        parents: Vec<Parent>,
    }

    impl Operator for PassThrough {
        fn name(&self) -> &'static str {
            "PassThrough"
        }

        fn parents(&self) -> &[Parent] {
            &self.parents
        }

        fn backward(&self, grad_output: &Buffer) -> Result<Vec<(NodeId, Buffer)>> {
            Ok(self
                .inputs()
                .into_iter()
                .map(|id| (id, grad_output.clone()))
                .collect())
        }
    }

    #[test]
    fn test_create_leaf() {
        let mut graph = ComputationGraph::new();

        let a = graph.create_leaf(Buffer::scalar(1.0), TensorOptions::default());
        let b = graph.create_leaf(
            Buffer::zeros(&[2]),
            TensorOptions::default().trainable(true).label("b"),
        );

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(graph.len(), 2);

        let node_a = graph.node(a).unwrap();
        assert!(node_a.is_leaf());
        assert!(!node_a.trainable());
        assert_eq!(node_a.grad(), &Buffer::zeros(&[]));

        let node_b = graph.node(b).unwrap();
        assert!(node_b.trainable());
        assert_eq!(node_b.label(), "b");
    }

    #[test]
    fn test_create_node_is_trainable() {
        let mut graph = ComputationGraph::new();
        let leaf = graph.create_leaf(Buffer::scalar(1.0), TensorOptions::default());
        let op = PassThrough {
            parents: vec![Parent::Node(leaf), Parent::Constant(2.0)],
        };
        let out = graph.create_node(Buffer::scalar(1.0), Box::new(op));

        let node = graph.node(out).unwrap();
        assert!(!node.is_leaf());
        assert!(node.trainable());
        assert_eq!(node.creator().unwrap().inputs(), vec![leaf]);
    }

    #[test]
    fn test_release_marks_node() {
        let mut graph = ComputationGraph::new();
        let leaf = graph.create_leaf(Buffer::scalar(1.0), TensorOptions::default());
        let out = graph.create_node(
            Buffer::scalar(1.0),
            Box::new(PassThrough {
                parents: vec![Parent::Node(leaf)],
            }),
        );

        graph.node_mut(out).unwrap().release();
        let node = graph.node(out).unwrap();
        assert!(node.creator().is_none());
        assert!(node.is_released());
        assert!(!node.is_leaf());

        // releasing a leaf does nothing
        graph.node_mut(leaf).unwrap().release();
        assert!(graph.node(leaf).unwrap().is_leaf());
    }

    #[test]
    fn test_unknown_node() {
        let graph = ComputationGraph::new();
        let err = graph.node(NodeId::new_for_test(3)).unwrap_err();
        assert!(matches!(err, GradError::UnknownNode(id) if id.index() == 3));
    }

    #[test]
    fn test_cleared_id_does_not_resolve_to_new_occupant() {
        let mut graph = ComputationGraph::new();
        let old = graph.create_leaf(Buffer::scalar(1.0), TensorOptions::default());
        graph.clear();
        let fresh = graph.create_leaf(Buffer::scalar(42.0), TensorOptions::default());

        assert_eq!(old.index(), fresh.index());
        assert_ne!(old, fresh);
        assert!(matches!(graph.node(old), Err(GradError::UnknownNode(id)) if id == old));
        assert!(graph.node_mut(old).is_err());
        assert_eq!(graph.node(fresh).unwrap().value().item(), Some(42.0));
    }

    #[test]
    fn test_retain_reachable_keeps_history() {
        let mut graph = ComputationGraph::new();
        let w = graph.create_leaf(Buffer::scalar(1.0), TensorOptions::default());
        let x = graph.create_leaf(Buffer::scalar(2.0), TensorOptions::default());
        let y = graph.create_node(
            Buffer::scalar(2.0),
            Box::new(PassThrough {
                parents: vec![Parent::Node(w), Parent::Node(x)],
            }),
        );
        let orphan = graph.create_leaf(Buffer::scalar(3.0), TensorOptions::default());

        let freed = graph.retain_reachable(&[y]).unwrap();
        assert_eq!(freed, 1);
        assert_eq!(graph.len(), 3);
        assert!(graph.node(w).is_ok() && graph.node(x).is_ok());
        assert!(graph.node(orphan).is_err());

        // once y's creator is gone, only w and y survive a sweep keyed on both
        graph.node_mut(y).unwrap().release();
        assert_eq!(graph.retain_reachable(&[w, y]).unwrap(), 1);
        assert!(graph.node(x).is_err());

        // freed slots are reused under a new generation
        let z = graph.create_leaf(Buffer::scalar(4.0), TensorOptions::default());
        assert!(z.index() == x.index() || z.index() == orphan.index());
        assert!(graph.node(x).is_err() && graph.node(orphan).is_err());
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_retain_reachable_rejects_stale_keep() {
        let mut graph = ComputationGraph::new();
        let a = graph.create_leaf(Buffer::scalar(1.0), TensorOptions::default());
        graph.clear();
        let b = graph.create_leaf(Buffer::scalar(2.0), TensorOptions::default());

        assert!(graph.retain_reachable(&[a]).is_err());
        assert!(graph.node(b).is_ok());
    }

    #[test]
    fn test_thread_local_graph() {
        clear_graph();

        with_graph(|g| {
            g.create_leaf(Buffer::scalar(1.0), TensorOptions::default());
            g.create_leaf(Buffer::scalar(2.0), TensorOptions::default());
        });
        assert_eq!(with_graph(|g| g.len()), 2);

        clear_graph();
        assert!(with_graph(|g| g.is_empty()));
    }
}
