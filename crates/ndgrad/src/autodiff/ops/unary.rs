//! Elementwise unary kernels.

use crate::autodiff::function::{Function, Input, Operator, SavedInput, operands};
use crate::autodiff::graph::{NodeId, Parent};
use crate::buffer::Buffer;
use crate::error::Result;

/// Backward state shared by every unary kernel: the saved operand and the
/// local derivative as a function of it.
#[derive(Debug)]
pub struct UnaryBackward {
    name: &'static str,
    parents: [Parent; 1],
    input: SavedInput,
    derivative: fn(f32) -> f32,
}

impl UnaryBackward {
    fn new(name: &'static str, input: &Input<'_>, derivative: fn(f32) -> f32) -> Self {
        Self {
            name,
            parents: [input.parent()],
            input: input.save(),
            derivative,
        }
    }
}

impl Operator for UnaryBackward {
    fn name(&self) -> &'static str {
        self.name
    }

    fn parents(&self) -> &[Parent] {
        &self.parents
    }

    fn backward(&self, grad_output: &Buffer) -> Result<Vec<(NodeId, Buffer)>> {
        let local = self.input.value().map(self.derivative);
        Ok(vec![(self.input.id(), grad_output.mul(&local)?)])
    }
}

macro_rules! unary_function {
    ($(#[$meta:meta])* $ty:ident, $name:literal, forward: $fwd:expr, derivative: $der:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $ty;

        impl Function for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn arity(&self) -> usize {
                1
            }

            fn forward(&self, inputs: &[Input<'_>]) -> Result<(Buffer, Box<dyn Operator>)> {
                let [x] = operands::<1>(self.name(), inputs)?;
                let value = x.value().map($fwd);
                Ok((value, Box::new(UnaryBackward::new($name, x, $der))))
            }
        }
    };
}

unary_function!(
    /// `e^x`.
    Exp, "Exp",
    forward: f32::exp,
    derivative: f32::exp
);

unary_function!(
    /// Natural logarithm.
    Log, "Log",
    forward: f32::ln,
    derivative: |x| 1.0 / x
);

unary_function!(
    /// `1 / x`.
    Reciprocal, "Reciprocal",
    forward: |x| 1.0 / x,
    derivative: |x| -1.0 / (x * x)
);

unary_function!(
    /// `|x|`; the derivative at zero is zero.
    Abs, "Abs",
    forward: f32::abs,
    derivative: |x| if x > 0.0 { 1.0 } else if x < 0.0 { -1.0 } else { 0.0 }
);

unary_function!(
    /// `max(x, 0)`; the derivative at zero is zero.
    Relu, "ReLU",
    forward: |x| x.max(0.0),
    derivative: |x| if x > 0.0 { 1.0 } else { 0.0 }
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tensor;
    use crate::autodiff::{apply, clear_graph};
    use approx::assert_relative_eq;

    fn grad_of(function: &dyn Function, x: f32) -> (f32, f32) {
        clear_graph();
        let t = Tensor::scalar(x);
        let y = apply(function, [t]).unwrap();
        y.backward().unwrap();
        (y.item().unwrap(), t.grad().item().unwrap())
    }

    #[test]
    fn test_exp() {
        let (y, g) = grad_of(&Exp, 1.0);
        assert_relative_eq!(y, std::f32::consts::E);
        assert_relative_eq!(g, std::f32::consts::E);
    }

    #[test]
    fn test_log() {
        let (y, g) = grad_of(&Log, 4.0);
        assert_relative_eq!(y, 4.0f32.ln());
        assert_relative_eq!(g, 0.25);
    }

    #[test]
    fn test_reciprocal() {
        let (y, g) = grad_of(&Reciprocal, 2.0);
        assert_relative_eq!(y, 0.5);
        assert_relative_eq!(g, -0.25);
    }

    #[test]
    fn test_abs_sign_and_zero() {
        assert_eq!(grad_of(&Abs, -3.0), (3.0, -1.0));
        assert_eq!(grad_of(&Abs, 2.0), (2.0, 1.0));
        assert_eq!(grad_of(&Abs, 0.0), (0.0, 0.0));
    }

    #[test]
    fn test_relu_masks_gradient() {
        clear_graph();
        let x = Tensor::from_vec(vec![-1.0, 0.0, 2.0], &[3]).unwrap();
        let y = x.relu().unwrap();
        assert_eq!(y.value().data(), &[0.0, 0.0, 2.0]);
        assert_eq!(y.creator_name(), Some("ReLU"));

        y.sum().unwrap().backward().unwrap();
        assert_eq!(x.grad().data(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unary_arity() {
        clear_graph();
        let x = Tensor::scalar(1.0);
        assert!(apply(&Exp, [x, x]).is_err());
    }
}
