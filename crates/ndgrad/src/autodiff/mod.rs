//! Define-by-run reverse-mode automatic differentiation.
//!
//! Every operation on a [`Tensor`] runs eagerly and records a node in a
//! thread-local computation graph. Calling [`Tensor::backward`] walks that
//! graph from the chosen root and accumulates gradients into every node it
//! reaches.
//!
//! # Architecture
//!
//! ```text
//! Tensor (Copy handle) ──names──►  ComputationGraph (thread_local)
//!        │                                 │
//!        ▼                                 ▼
//!   apply(&Mul, [a, b])              Vec<Node { value, grad, creator }>
//!        │                                          │
//!        ▼                                          ▼
//!   Mul::forward ──► (Buffer, Box<MulBackward>) ── Operator::backward
//! ```
//!
//! # Example
//!
//! ```
//! use ndgrad::Tensor;
//! use ndgrad::autodiff::clear_graph;
//!
//! clear_graph();
//!
//! let x = Tensor::scalar(2.0).requires_grad_();
//! let y = x.pow(3.0).unwrap();
//! let z = ((y * 2.0).unwrap() + x).unwrap();
//! z.backward().unwrap();
//!
//! // dz/dx = 6x^2 + 1
//! assert_eq!(x.grad().item(), Some(25.0));
//! ```
//!
//! # Key Types
//!
//! - [`Tensor`]: handle to a graph node
//! - [`Function`] / [`Operator`]: forward and backward halves of a kernel
//! - [`apply`]: run a `Function` and record the result
//! - [`BackwardOptions`]: retain the graph for repeated passes
//!
//! # Design Notes
//!
//! - Thread-local arena, `NodeId` indices instead of shared pointers
//! - A backward pass releases the operator instances it used unless
//!   `retain_graph` is set; a second pass over released nodes fails
//! - In-place updates (`add_`, `+=`, ...) change values without recording
//!   an edge
//! - [`clear_graph_except`] frees intermediates between training steps and
//!   keeps parameter handles valid; ids of freed nodes are never reissued

mod activation;
mod arith;
mod backward;
mod dot;
mod function;
mod graph;
#[cfg(feature = "random")]
mod init;
pub mod ops;
mod tensor;

pub use backward::{BackwardOptions, run_backward, topological_sort};
pub use dot::build_display_graph;
pub use function::{Function, Input, Operator, SavedInput, operands};
pub use graph::{
    ComputationGraph, Node, NodeId, Parent, TensorOptions, clear_graph, with_graph, zero_grad_all,
};
pub use tensor::{Operand, Tensor, apply, clear_graph_except};
