//! ndgrad - define-by-run reverse-mode automatic differentiation
//!
//! Tensors are handles into a thread-local computation graph. Arithmetic
//! runs eagerly on dense `f32` buffers and records each result's creator,
//! so a later backward pass can apply the chain rule in reverse
//! topological order.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Tensor API (autodiff::Tensor, std::ops, activations)
//!     → a * b, x.exp(), x.sigmoid(), x.backward()
//!
//! Level 2: Operator contract (autodiff::Function / autodiff::Operator)
//!     → apply(&function, operands), custom kernels
//!
//! Level 3: Dense storage (buffer::Buffer)
//!     → broadcasting arithmetic, reductions, faer matmul
//! ```
//!
//! # Example
//!
//! ```
//! use ndgrad::{Tensor, autodiff::clear_graph};
//!
//! clear_graph();
//!
//! let w = Tensor::from_vec(vec![1.0, -2.0, 0.5], &[3]).unwrap().requires_grad_();
//! let x = Tensor::from_vec(vec![3.0, 1.0, 4.0], &[3]).unwrap();
//!
//! let loss = (w * x).unwrap().sum().unwrap();
//! loss.backward().unwrap();
//!
//! assert_eq!(w.grad().data(), &[3.0, 1.0, 4.0]);
//! ```

pub mod autodiff;
pub mod buffer;
pub mod error;

pub use autodiff::{BackwardOptions, Tensor, TensorOptions};
pub use buffer::Buffer;
pub use error::{GradError, Result};
