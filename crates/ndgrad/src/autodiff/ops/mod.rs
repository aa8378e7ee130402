//! Built-in differentiable kernels and the tracked `Tensor` methods that
//! dispatch to them.
//!
//! Every method here goes through [`apply`], so it records a graph edge.
//! Operands may be tensors or raw values (`f32`, `Vec<f32>`, `Buffer`),
//! which become fresh non-trainable leaves.

mod binary;
mod reduce;
mod unary;

pub use binary::{
    Add, AddBackward, Div, DivBackward, Matmul, MatmulBackward, Mul, MulBackward, Pow,
    PowBackward, Sub, SubBackward,
};
pub use reduce::{ExtremumBackward, Max, Mean, Min, SpreadBackward, Sum};
pub use unary::{Abs, Exp, Log, Reciprocal, Relu, UnaryBackward};

use super::tensor::{Operand, Tensor, apply};
use crate::error::Result;

fn binary<F: super::Function>(function: &F, lhs: Operand, rhs: Operand) -> Result<Tensor> {
    apply(function, [lhs, rhs])
}

impl Tensor {
    /// `self ^ exponent`, elementwise with broadcasting.
    pub fn pow(&self, exponent: impl Into<Operand>) -> Result<Tensor> {
        binary(&Pow, self.into(), exponent.into())
    }

    /// Matrix product of two rank-2 tensors.
    ///
    /// # Errors
    ///
    /// `GradError::RankMismatch` unless both sides are rank 2 and
    /// `GradError::ShapeMismatch` if the inner dimensions differ.
    pub fn matmul(&self, rhs: impl Into<Operand>) -> Result<Tensor> {
        binary(&Matmul, self.into(), rhs.into())
    }

    pub fn exp(&self) -> Result<Tensor> {
        apply(&Exp, [self])
    }

    pub fn log(&self) -> Result<Tensor> {
        apply(&Log, [self])
    }

    pub fn reciprocal(&self) -> Result<Tensor> {
        apply(&Reciprocal, [self])
    }

    pub fn abs(&self) -> Result<Tensor> {
        apply(&Abs, [self])
    }

    pub fn relu(&self) -> Result<Tensor> {
        apply(&Relu, [self])
    }

    /// Sum of all elements as a rank-0 tensor.
    pub fn sum(&self) -> Result<Tensor> {
        apply(&Sum, [self])
    }

    pub fn mean(&self) -> Result<Tensor> {
        apply(&Mean, [self])
    }

    pub fn max(&self) -> Result<Tensor> {
        apply(&Max, [self])
    }

    pub fn min(&self) -> Result<Tensor> {
        apply(&Min, [self])
    }

    /// `self ^ 0.5`.
    pub fn sqrt(&self) -> Result<Tensor> {
        self.pow(0.5)
    }

    /// `self ^ 2`.
    pub fn square(&self) -> Result<Tensor> {
        self.pow(2.0)
    }

    // Reflected forms: `lhs ∘ self`, with the raw operand on the left.

    pub fn radd(&self, lhs: impl Into<Operand>) -> Result<Tensor> {
        binary(&Add, lhs.into(), self.into())
    }

    pub fn rsub(&self, lhs: impl Into<Operand>) -> Result<Tensor> {
        binary(&Sub, lhs.into(), self.into())
    }

    pub fn rmul(&self, lhs: impl Into<Operand>) -> Result<Tensor> {
        binary(&Mul, lhs.into(), self.into())
    }

    pub fn rdiv(&self, lhs: impl Into<Operand>) -> Result<Tensor> {
        binary(&Div, lhs.into(), self.into())
    }

    pub fn rpow(&self, lhs: impl Into<Operand>) -> Result<Tensor> {
        binary(&Pow, lhs.into(), self.into())
    }

    pub fn rmatmul(&self, lhs: impl Into<Operand>) -> Result<Tensor> {
        binary(&Matmul, lhs.into(), self.into())
    }
}
