//! `std::ops` arithmetic on tensors.
//!
//! The binary operators record a graph edge and return `Result<Tensor>`,
//! so expressions read `((a * b)? + c)?`. The compound assignment
//! operators update the value in place without recording anything.

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use super::ops;
use super::tensor::{Operand, Tensor, apply};
use crate::error::Result;

macro_rules! binary_op {
    ($trait:ident, $method:ident, $function:ident) => {
        impl<R: Into<Operand>> $trait<R> for Tensor {
            type Output = Result<Tensor>;

            fn $method(self, rhs: R) -> Self::Output {
                apply(&ops::$function, [Operand::from(self), rhs.into()])
            }
        }

        impl<R: Into<Operand>> $trait<R> for &Tensor {
            type Output = Result<Tensor>;

            fn $method(self, rhs: R) -> Self::Output {
                apply(&ops::$function, [Operand::from(self), rhs.into()])
            }
        }

        impl $trait<Tensor> for f32 {
            type Output = Result<Tensor>;

            fn $method(self, rhs: Tensor) -> Self::Output {
                apply(&ops::$function, [Operand::from(self), Operand::from(rhs)])
            }
        }

        impl $trait<&Tensor> for f32 {
            type Output = Result<Tensor>;

            fn $method(self, rhs: &Tensor) -> Self::Output {
                apply(&ops::$function, [Operand::from(self), Operand::from(rhs)])
            }
        }
    };
}

binary_op!(Add, add, Add);
binary_op!(Sub, sub, Sub);
binary_op!(Mul, mul, Mul);
binary_op!(Div, div, Div);

/// `-x` is recorded as `0 - x`.
impl Neg for Tensor {
    type Output = Result<Tensor>;

    fn neg(self) -> Self::Output {
        0.0 - self
    }
}

impl Neg for &Tensor {
    type Output = Result<Tensor>;

    fn neg(self) -> Self::Output {
        0.0 - self
    }
}

macro_rules! assign_op {
    ($trait:ident, $method:ident, $inplace:ident) => {
        /// In-place update outside the graph.
        ///
        /// # Panics
        ///
        /// Panics if `rhs` does not broadcast to this tensor's shape or a
        /// handle is stale. Use the fallible method of the same name with a
        /// trailing underscore to get the error instead.
        impl<R: Into<Operand>> $trait<R> for Tensor {
            fn $method(&mut self, rhs: R) {
                if let Err(err) = self.$inplace(rhs) {
                    panic!("{}: {err}", stringify!($method));
                }
            }
        }
    };
}

assign_op!(AddAssign, add_assign, add_);
assign_op!(SubAssign, sub_assign, sub_);
assign_op!(MulAssign, mul_assign, mul_);
assign_op!(DivAssign, div_assign, div_);
