//! Tensor - user-facing handle to a node in the thread-local graph.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use super::backward::{BackwardOptions, run_backward};
use super::function::{Function, Input};
use super::graph::{Node, NodeId, Parent, TensorOptions, with_graph};
use crate::buffer::Buffer;
use crate::error::{GradError, Result};

/// Handle to a node of the thread-local computation graph.
///
/// `Tensor` is a copyable id; the value, gradient and creator live in the
/// graph arena. Handles are tied to the thread that created them and become
/// stale after [`clear_graph`](super::clear_graph).
///
/// Accessors panic on a stale handle; graph-building operations return
/// `GradError::UnknownNode` instead.
///
/// # Example
///
/// ```
/// use ndgrad::Tensor;
/// use ndgrad::autodiff::clear_graph;
///
/// clear_graph();
/// let a = Tensor::scalar(2.0);
/// let b = Tensor::scalar(3.0);
/// let c = ((a * b).unwrap() + a).unwrap();
/// c.backward().unwrap();
///
/// assert_eq!(a.grad().item(), Some(4.0));
/// assert_eq!(b.grad().item(), Some(2.0));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tensor {
    id: NodeId,
    _thread_local: PhantomData<Rc<()>>,
}

/// An operand accepted by [`apply`] and the arithmetic operators.
///
/// Raw values are wrapped into fresh, non-trainable leaves.
#[derive(Debug, Clone)]
pub enum Operand {
    Tensor(Tensor),
    Raw(Buffer),
}

impl From<Tensor> for Operand {
    fn from(tensor: Tensor) -> Self {
        Operand::Tensor(tensor)
    }
}

impl From<&Tensor> for Operand {
    fn from(tensor: &Tensor) -> Self {
        Operand::Tensor(*tensor)
    }
}

impl From<Buffer> for Operand {
    fn from(buffer: Buffer) -> Self {
        Operand::Raw(buffer)
    }
}

impl From<f32> for Operand {
    fn from(value: f32) -> Self {
        Operand::Raw(Buffer::scalar(value))
    }
}

impl From<Vec<f32>> for Operand {
    fn from(data: Vec<f32>) -> Self {
        Operand::Raw(Buffer::from(data))
    }
}

/// Run `function` on `operands` and record the result in the graph.
///
/// Raw operands become leaves first. The result node's creator is the
/// operator instance returned by `forward`, and the result is always
/// marked trainable, even when no operand is.
///
/// # Errors
///
/// `GradError::Arity` if the operand count differs from
/// `function.arity()`, `GradError::UnknownNode` for stale handles, and
/// whatever `forward` returns. The graph is left as it was on error.
pub fn apply<F, I>(function: &F, operands: I) -> Result<Tensor>
where
    F: Function + ?Sized,
    I: IntoIterator,
    I::Item: Into<Operand>,
{
    let operands: Vec<Operand> = operands.into_iter().map(Into::into).collect();
    if operands.len() != function.arity() {
        return Err(GradError::Arity {
            op: function.name(),
            expected: function.arity(),
            actual: operands.len(),
        });
    }

    with_graph(|graph| {
        for operand in &operands {
            if let Operand::Tensor(tensor) = operand {
                graph.node(tensor.id)?;
            }
        }

        let mut raw = Vec::new();
        let ids: Vec<NodeId> = operands
            .into_iter()
            .map(|operand| match operand {
                Operand::Tensor(tensor) => tensor.id,
                Operand::Raw(buffer) => {
                    let id = graph.create_leaf(buffer, TensorOptions::default());
                    raw.push(id);
                    id
                }
            })
            .collect();

        let forward = ids
            .iter()
            .map(|&id| graph.node(id).map(|node| Input::new(id, node.value())))
            .collect::<Result<Vec<_>>>()
            .and_then(|inputs| function.forward(&inputs));

        match forward {
            Ok((value, creator)) => Ok(Tensor::from_id(graph.create_node(value, creator))),
            Err(err) => {
                for id in raw {
                    graph.discard(id)?;
                }
                Err(err)
            }
        }
    })
}

/// Free every node of the thread-local graph except `keep` and the
/// history their held creators still reference.
///
/// Use between training steps to drop intermediates while keeping
/// parameter handles valid. Returns the number of nodes freed.
///
/// ```
/// use ndgrad::Tensor;
/// use ndgrad::autodiff::{clear_graph, clear_graph_except, with_graph};
///
/// clear_graph();
/// let w = Tensor::scalar(2.0).requires_grad_();
/// (w * 3.0).unwrap().backward().unwrap();
///
/// clear_graph_except(&[w]).unwrap();
/// assert_eq!(with_graph(|g| g.len()), 1);
/// assert_eq!(w.grad().item(), Some(3.0));
/// ```
///
/// # Errors
///
/// `GradError::UnknownNode` if a handle in `keep` is stale; nothing is
/// freed then.
pub fn clear_graph_except(keep: &[Tensor]) -> Result<usize> {
    let ids: Vec<NodeId> = keep.iter().map(Tensor::id).collect();
    with_graph(|g| g.retain_reachable(&ids))
}

impl Tensor {
    pub(crate) fn from_id(id: NodeId) -> Self {
        Self {
            id,
            _thread_local: PhantomData,
        }
    }

    /// Create a non-trainable leaf from a buffer.
    pub fn new(value: Buffer) -> Self {
        Self::leaf_with(value, TensorOptions::default())
    }

    /// Create a leaf with explicit construction options.
    ///
    /// ```
    /// use ndgrad::{Buffer, Tensor, TensorOptions};
    ///
    /// let w = Tensor::leaf_with(
    ///     Buffer::zeros(&[2, 2]),
    ///     TensorOptions::default().trainable(true).label("w"),
    /// );
    /// assert!(w.trainable());
    /// assert_eq!(w.label(), "w");
    /// ```
    pub fn leaf_with(value: Buffer, options: TensorOptions) -> Self {
        Self::from_id(with_graph(|g| g.create_leaf(value, options)))
    }

    pub fn scalar(value: f32) -> Self {
        Self::new(Buffer::scalar(value))
    }

    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        Ok(Self::new(Buffer::from_vec(data, shape)?))
    }

    pub fn full(shape: &[usize], value: f32) -> Self {
        Self::new(Buffer::full(shape, value))
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::new(Buffer::zeros(shape))
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::new(Buffer::ones(shape))
    }

    /// Leaf of the given shape whose contents should not be relied on.
    ///
    /// Currently zero-filled.
    pub fn empty(shape: &[usize]) -> Self {
        Self::zeros(shape)
    }

    pub fn eye(n: usize) -> Self {
        Self::new(Buffer::eye(n))
    }

    pub fn arange(start: f32, stop: f32) -> Self {
        Self::new(Buffer::arange(start, stop))
    }

    pub fn zeros_like(&self) -> Self {
        Self::zeros(&self.shape())
    }

    pub fn ones_like(&self) -> Self {
        Self::ones(&self.shape())
    }

    // ***** accessors *****

    pub fn id(&self) -> NodeId {
        self.id
    }

    fn read<R>(&self, f: impl FnOnce(&Node) -> R) -> R {
        with_graph(|g| match g.node(self.id) {
            Ok(node) => f(node),
            Err(err) => panic!("{err}"),
        })
    }

    fn write<R>(&self, f: impl FnOnce(&mut Node) -> R) -> R {
        with_graph(|g| match g.node_mut(self.id) {
            Ok(node) => f(node),
            Err(err) => panic!("{err}"),
        })
    }

    /// Copy of the node's value.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn value(&self) -> Buffer {
        self.read(|node| node.value().clone())
    }

    /// Copy of the node's accumulated gradient.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn grad(&self) -> Buffer {
        self.read(|node| node.grad().clone())
    }

    pub fn shape(&self) -> Vec<usize> {
        self.read(|node| node.value().shape().to_vec())
    }

    /// The single element of a one-element tensor.
    pub fn item(&self) -> Option<f32> {
        self.read(|node| node.value().item())
    }

    pub fn is_leaf(&self) -> bool {
        self.read(Node::is_leaf)
    }

    pub fn is_released(&self) -> bool {
        self.read(Node::is_released)
    }

    /// Label of the operator that produced this node, if still held.
    pub fn creator_name(&self) -> Option<&'static str> {
        self.read(|node| node.creator().map(|c| c.name()))
    }

    /// Parents recorded by this node's creator; empty for leaves.
    pub fn parents(&self) -> Vec<Parent> {
        self.read(|node| {
            node.creator()
                .map(|c| c.parents().to_vec())
                .unwrap_or_default()
        })
    }

    pub fn trainable(&self) -> bool {
        self.read(Node::trainable)
    }

    pub fn label(&self) -> String {
        self.read(|node| node.label().to_string())
    }

    // ***** options *****

    pub fn set_trainable(&self, trainable: bool) {
        self.write(|node| node.set_trainable(trainable));
    }

    /// Mark as trainable and return the handle.
    pub fn requires_grad_(self) -> Self {
        self.set_trainable(true);
        self
    }

    /// Mark as not trainable and return the handle.
    pub fn no_grad(self) -> Self {
        self.set_trainable(false);
        self
    }

    pub fn with_label(self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.write(|node| node.set_label(label));
        self
    }

    // ***** backprop *****

    /// Backpropagate from this node and release the graph behind it.
    ///
    /// See [`backward_with`](Self::backward_with).
    pub fn backward(&self) -> Result<()> {
        self.backward_with(BackwardOptions::default())
    }

    /// Backpropagate from this node.
    ///
    /// Gradients of every reachable node are accumulated into their `grad`;
    /// this node's own grad is reset to ones. Without `retain_graph` the
    /// operator instances are released and a second call fails with
    /// `GradError::InvalidGraphState`. With it, a second call adds to the
    /// existing grads; call [`zero_grad`](Self::zero_grad) or
    /// [`zero_grad_all`](super::zero_grad_all) in between.
    pub fn backward_with(&self, options: BackwardOptions) -> Result<()> {
        with_graph(|g| run_backward(g, self.id, options))
    }

    /// Reset this node's gradient to zero.
    pub fn zero_grad(&self) {
        self.write(|node| node.grad_mut().fill(0.0));
    }

    // ***** in-place updates (outside the graph) *****

    /// Update the value elementwise from `rhs` without recording an edge.
    ///
    /// Grad and creator are untouched. Any pending backward pass that reads
    /// this node's old value through a saved copy is unaffected; one that
    /// reads it through this handle is not.
    ///
    /// # Errors
    ///
    /// `GradError::ShapeMismatch` if `rhs` does not broadcast to this
    /// tensor's shape; the value is left unchanged.
    pub fn update_with(&self, rhs: impl Into<Operand>, f: impl Fn(f32, f32) -> f32) -> Result<()> {
        let rhs = operand_value(rhs.into())?;
        with_graph(|g| g.node_mut(self.id)?.value_mut().zip_assign(&rhs, f))
    }

    pub fn add_(&self, rhs: impl Into<Operand>) -> Result<()> {
        self.update_with(rhs, |a, b| a + b)
    }

    pub fn sub_(&self, rhs: impl Into<Operand>) -> Result<()> {
        self.update_with(rhs, |a, b| a - b)
    }

    pub fn mul_(&self, rhs: impl Into<Operand>) -> Result<()> {
        self.update_with(rhs, |a, b| a * b)
    }

    pub fn div_(&self, rhs: impl Into<Operand>) -> Result<()> {
        self.update_with(rhs, |a, b| a / b)
    }

    pub fn pow_(&self, rhs: impl Into<Operand>) -> Result<()> {
        self.update_with(rhs, f32::powf)
    }

    /// Replace the value with `value @ rhs`; the shape must not change.
    pub fn matmul_(&self, rhs: impl Into<Operand>) -> Result<()> {
        let rhs = operand_value(rhs.into())?;
        with_graph(|g| {
            let value = g.node_mut(self.id)?.value_mut();
            let product = value.matmul(&rhs)?;
            if product.shape() != value.shape() {
                return Err(GradError::shape_mismatch(value.shape(), rhs.shape()));
            }
            *value = product;
            Ok(())
        })
    }
}

fn operand_value(operand: Operand) -> Result<Buffer> {
    match operand {
        Operand::Tensor(tensor) => with_graph(|g| Ok(g.node(tensor.id)?.value().clone())),
        Operand::Raw(buffer) => Ok(buffer),
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.id.index())
            .finish()
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match with_graph(|g| g.node(self.id).map(|node| node.value().clone())) {
            Ok(value) => write!(f, "{value}"),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}
