//! Binary kernels: Add, Sub, Mul, Div, Pow, Matmul.
//!
//! Elementwise kernels broadcast their operands; their backward sums each
//! gradient back down to the operand's shape.

use crate::autodiff::function::{Function, Input, Operator, SavedInput, operands};
use crate::autodiff::graph::{NodeId, Parent};
use crate::buffer::{Buffer, Shape};
use crate::error::Result;

/// Operand id and shape; enough for kernels whose local derivative is constant.
#[derive(Debug, Clone)]
struct Edge {
    id: NodeId,
    shape: Shape,
}

impl Edge {
    fn new(input: &Input<'_>) -> Self {
        Self {
            id: input.id(),
            shape: input.value().shape().into(),
        }
    }
}

fn parents_of(a: &Input<'_>, b: &Input<'_>) -> [Parent; 2] {
    [a.parent(), b.parent()]
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Add;

#[derive(Debug)]
pub struct AddBackward {
    parents: [Parent; 2],
    lhs: Edge,
    rhs: Edge,
}

impl Function for Add {
    fn name(&self) -> &'static str {
        "Add"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[Input<'_>]) -> Result<(Buffer, Box<dyn Operator>)> {
        let [a, b] = operands::<2>(self.name(), inputs)?;
        let value = a.value().add(b.value())?;
        let op = AddBackward {
            parents: parents_of(a, b),
            lhs: Edge::new(a),
            rhs: Edge::new(b),
        };
        Ok((value, Box::new(op)))
    }
}

impl Operator for AddBackward {
    fn name(&self) -> &'static str {
        "Add"
    }

    fn parents(&self) -> &[Parent] {
        &self.parents
    }

    fn backward(&self, grad_output: &Buffer) -> Result<Vec<(NodeId, Buffer)>> {
        Ok(vec![
            (self.lhs.id, grad_output.sum_to_shape(&self.lhs.shape)?),
            (self.rhs.id, grad_output.sum_to_shape(&self.rhs.shape)?),
        ])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sub;

#[derive(Debug)]
pub struct SubBackward {
    parents: [Parent; 2],
    lhs: Edge,
    rhs: Edge,
}

impl Function for Sub {
    fn name(&self) -> &'static str {
        "Sub"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[Input<'_>]) -> Result<(Buffer, Box<dyn Operator>)> {
        let [a, b] = operands::<2>(self.name(), inputs)?;
        let value = a.value().sub(b.value())?;
        let op = SubBackward {
            parents: parents_of(a, b),
            lhs: Edge::new(a),
            rhs: Edge::new(b),
        };
        Ok((value, Box::new(op)))
    }
}

impl Operator for SubBackward {
    fn name(&self) -> &'static str {
        "Sub"
    }

    fn parents(&self) -> &[Parent] {
        &self.parents
    }

    fn backward(&self, grad_output: &Buffer) -> Result<Vec<(NodeId, Buffer)>> {
        Ok(vec![
            (self.lhs.id, grad_output.sum_to_shape(&self.lhs.shape)?),
            (
                self.rhs.id,
                grad_output.scale(-1.0).sum_to_shape(&self.rhs.shape)?,
            ),
        ])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Mul;

#[derive(Debug)]
pub struct MulBackward {
    parents: [Parent; 2],
    lhs: SavedInput,
    rhs: SavedInput,
}

impl Function for Mul {
    fn name(&self) -> &'static str {
        "Mul"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[Input<'_>]) -> Result<(Buffer, Box<dyn Operator>)> {
        let [a, b] = operands::<2>(self.name(), inputs)?;
        let value = a.value().mul(b.value())?;
        let op = MulBackward {
            parents: parents_of(a, b),
            lhs: a.save(),
            rhs: b.save(),
        };
        Ok((value, Box::new(op)))
    }
}

impl Operator for MulBackward {
    fn name(&self) -> &'static str {
        "Mul"
    }

    fn parents(&self) -> &[Parent] {
        &self.parents
    }

    fn backward(&self, grad_output: &Buffer) -> Result<Vec<(NodeId, Buffer)>> {
        let (a, b) = (&self.lhs, &self.rhs);
        let grad_a = grad_output.mul(b.value())?.sum_to_shape(a.shape())?;
        let grad_b = grad_output.mul(a.value())?.sum_to_shape(b.shape())?;
        Ok(vec![(a.id(), grad_a), (b.id(), grad_b)])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Div;

#[derive(Debug)]
pub struct DivBackward {
    parents: [Parent; 2],
    lhs: SavedInput,
    rhs: SavedInput,
}

impl Function for Div {
    fn name(&self) -> &'static str {
        "Div"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[Input<'_>]) -> Result<(Buffer, Box<dyn Operator>)> {
        let [a, b] = operands::<2>(self.name(), inputs)?;
        let value = a.value().div(b.value())?;
        let op = DivBackward {
            parents: parents_of(a, b),
            lhs: a.save(),
            rhs: b.save(),
        };
        Ok((value, Box::new(op)))
    }
}

impl Operator for DivBackward {
    fn name(&self) -> &'static str {
        "Div"
    }

    fn parents(&self) -> &[Parent] {
        &self.parents
    }

    fn backward(&self, grad_output: &Buffer) -> Result<Vec<(NodeId, Buffer)>> {
        let (a, b) = (&self.lhs, &self.rhs);
        // d(a/b)/da = 1/b, d(a/b)/db = -a/b^2
        let grad_a = grad_output.div(b.value())?.sum_to_shape(a.shape())?;
        let local_b = a.value().zip_with(b.value(), |x, y| -x / (y * y))?;
        let grad_b = grad_output.mul(&local_b)?.sum_to_shape(b.shape())?;
        Ok(vec![(a.id(), grad_a), (b.id(), grad_b)])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Pow;

#[derive(Debug)]
pub struct PowBackward {
    parents: [Parent; 2],
    base: SavedInput,
    exponent: SavedInput,
}

impl Function for Pow {
    fn name(&self) -> &'static str {
        "Pow"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[Input<'_>]) -> Result<(Buffer, Box<dyn Operator>)> {
        let [a, b] = operands::<2>(self.name(), inputs)?;
        let value = a.value().pow(b.value())?;
        let op = PowBackward {
            parents: parents_of(a, b),
            base: a.save(),
            exponent: b.save(),
        };
        Ok((value, Box::new(op)))
    }
}

impl Operator for PowBackward {
    fn name(&self) -> &'static str {
        "Pow"
    }

    fn parents(&self) -> &[Parent] {
        &self.parents
    }

    fn backward(&self, grad_output: &Buffer) -> Result<Vec<(NodeId, Buffer)>> {
        let (a, b) = (&self.base, &self.exponent);
        // x^0 is constant; avoids 0 * inf at x = 0
        let local_a = a.value().zip_with(b.value(), |x, y| {
            if y == 0.0 { 0.0 } else { y * x.powf(y - 1.0) }
        })?;
        // ln(a) is undefined for a <= 0; the exponent gets no gradient there
        let local_b = a.value().zip_with(b.value(), |x, y| {
            if x > 0.0 { x.powf(y) * x.ln() } else { 0.0 }
        })?;
        let grad_a = grad_output.mul(&local_a)?.sum_to_shape(a.shape())?;
        let grad_b = grad_output.mul(&local_b)?.sum_to_shape(b.shape())?;
        Ok(vec![(a.id(), grad_a), (b.id(), grad_b)])
    }
}

/// Matrix product of two rank-2 operands.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matmul;

#[derive(Debug)]
pub struct MatmulBackward {
    parents: [Parent; 2],
    lhs: SavedInput,
    rhs: SavedInput,
}

impl Function for Matmul {
    fn name(&self) -> &'static str {
        "Matmul"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[Input<'_>]) -> Result<(Buffer, Box<dyn Operator>)> {
        let [a, b] = operands::<2>(self.name(), inputs)?;
        let value = a.value().matmul(b.value())?;
        let op = MatmulBackward {
            parents: parents_of(a, b),
            lhs: a.save(),
            rhs: b.save(),
        };
        Ok((value, Box::new(op)))
    }
}

impl Operator for MatmulBackward {
    fn name(&self) -> &'static str {
        "Matmul"
    }

    fn parents(&self) -> &[Parent] {
        &self.parents
    }

    fn backward(&self, grad_output: &Buffer) -> Result<Vec<(NodeId, Buffer)>> {
        let (a, b) = (&self.lhs, &self.rhs);
        // C = A B  =>  dA = dC B^T, dB = A^T dC
        let grad_a = grad_output.matmul(&b.value().transpose()?)?;
        let grad_b = a.value().transpose()?.matmul(grad_output)?;
        Ok(vec![(a.id(), grad_a), (b.id(), grad_b)])
    }
}
