//! Error types for ndgrad.

use std::fmt;

use thiserror::Error;

use crate::autodiff::NodeId;

/// Which half of an operator contract was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Forward,
    Backward,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Forward => f.write_str("forward"),
            Capability::Backward => f.write_str("backward"),
        }
    }
}

/// Errors that can occur while building or differentiating a graph.
#[derive(Debug, Error)]
pub enum GradError {
    /// An operator variant does not supply the requested capability.
    #[error("{capability} not implemented for {op}")]
    NotImplemented {
        op: &'static str,
        capability: Capability,
    },

    /// Operand shapes cannot be broadcast together.
    #[error("shape mismatch: cannot combine {lhs:?} with {rhs:?}")]
    ShapeMismatch { lhs: Vec<usize>, rhs: Vec<usize> },

    /// Data length does not match the requested shape.
    #[error("length mismatch: expected {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Operation requires a specific buffer rank.
    #[error("{op} expects rank {expected}, got rank {actual}")]
    RankMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Wrong number of operands passed to an operator.
    #[error("{op} takes {expected} operands, got {actual}")]
    Arity {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The graph cannot be traversed in its current state.
    #[error("invalid graph state: {0}")]
    InvalidGraphState(String),

    /// Handle refers to a node that is not in the thread's graph.
    #[error("node {} is not in the computation graph", .0.index())]
    UnknownNode(NodeId),
}

impl GradError {
    pub(crate) fn shape_mismatch(lhs: &[usize], rhs: &[usize]) -> Self {
        GradError::ShapeMismatch {
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GradError>;
