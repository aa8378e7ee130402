//! Operator contract shared by every differentiable primitive.
//!
//! A primitive is split in two:
//!
//! - a [`Function`]: stateless (or option-carrying) type that owns `forward`
//! - an [`Operator`]: the per-call instance returned by `forward`, which
//!   records the parents and whatever state `backward` needs
//!
//! ```text
//! apply(&Mul, [a, b])
//!   └─► Mul::forward(inputs) ──► (value, Box<MulBackward>)
//!                                          │ stored as node.creator
//!   backward pass ◄── MulBackward::backward(grad) ──► [(a, ga), (b, gb)]
//! ```

use std::fmt::Debug;

use super::graph::{NodeId, Parent};
use crate::buffer::Buffer;
use crate::error::{Capability, GradError, Result};

/// Per-call operator instance recorded as a node's creator.
///
/// `backward` runs while the thread-local graph is borrowed and must not
/// use `Tensor` handles.
pub trait Operator: Debug {
    /// Stable display label.
    fn name(&self) -> &'static str;

    /// Operands as supplied to `forward`, in order.
    fn parents(&self) -> &[Parent];

    /// Vector-Jacobian product: given the gradient of the root with respect
    /// to this operator's output, return the contribution for each node
    /// parent, already reduced to that parent's shape.
    ///
    /// The engine adds each contribution into the parent's grad.
    fn backward(&self, grad_output: &Buffer) -> Result<Vec<(NodeId, Buffer)>> {
        let _ = grad_output;
        Err(GradError::NotImplemented {
            op: self.name(),
            capability: Capability::Backward,
        })
    }

    /// Node parents only, in order.
    fn inputs(&self) -> Vec<NodeId> {
        self.parents().iter().filter_map(Parent::node).collect()
    }
}

/// Differentiable primitive that can be passed to [`apply`](super::apply).
pub trait Function: Debug {
    fn name(&self) -> &'static str;

    /// Fixed operand count.
    fn arity(&self) -> usize;

    /// Compute the output buffer and the instance that can differentiate it.
    ///
    /// Runs while the thread-local graph is borrowed; work on the input
    /// buffers only.
    fn forward(&self, inputs: &[Input<'_>]) -> Result<(Buffer, Box<dyn Operator>)> {
        let _ = inputs;
        Err(GradError::NotImplemented {
            op: self.name(),
            capability: Capability::Forward,
        })
    }
}

/// A node operand as seen by `forward`.
#[derive(Debug, Clone, Copy)]
pub struct Input<'a> {
    id: NodeId,
    value: &'a Buffer,
}

impl<'a> Input<'a> {
    pub fn new(id: NodeId, value: &'a Buffer) -> Self {
        Self { id, value }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn value(&self) -> &'a Buffer {
        self.value
    }

    pub fn parent(&self) -> Parent {
        Parent::Node(self.id)
    }

    /// Copy this operand's value for use during backward.
    pub fn save(&self) -> SavedInput {
        SavedInput {
            id: self.id,
            value: self.value.clone(),
        }
    }
}

/// Operand value captured at forward time.
///
/// Later in-place updates of the node do not affect what backward sees.
#[derive(Debug, Clone)]
pub struct SavedInput {
    id: NodeId,
    value: Buffer,
}

impl SavedInput {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn value(&self) -> &Buffer {
        &self.value
    }

    pub fn shape(&self) -> &[usize] {
        self.value.shape()
    }
}

/// Borrow exactly `N` inputs or fail with `GradError::Arity`.
pub fn operands<'i, 'a, const N: usize>(
    op: &'static str,
    inputs: &'i [Input<'a>],
) -> Result<&'i [Input<'a>; N]> {
    inputs.try_into().map_err(|_| GradError::Arity {
        op,
        expected: N,
        actual: inputs.len(),
    })
}
