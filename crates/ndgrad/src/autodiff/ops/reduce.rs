//! Whole-buffer reductions to a rank-0 result.

use crate::autodiff::function::{Function, Input, Operator, SavedInput, operands};
use crate::autodiff::graph::{NodeId, Parent};
use crate::buffer::Buffer;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

/// Arithmetic mean of every element.
///
/// An empty operand yields NaN, and its backward spreads a weight of
/// `1/0` over no elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mean;

#[derive(Debug)]
pub struct SpreadBackward {
    name: &'static str,
    parents: [Parent; 1],
    input: NodeId,
    shape: Vec<usize>,
    /// Factor applied to the upstream scalar before it is spread.
    weight: f32,
}

impl Function for Sum {
    fn name(&self) -> &'static str {
        "Sum"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[Input<'_>]) -> Result<(Buffer, Box<dyn Operator>)> {
        let [x] = operands::<1>(self.name(), inputs)?;
        let op = SpreadBackward {
            name: "Sum",
            parents: [x.parent()],
            input: x.id(),
            shape: x.value().shape().to_vec(),
            weight: 1.0,
        };
        Ok((Buffer::scalar(x.value().sum()), Box::new(op)))
    }
}

impl Function for Mean {
    fn name(&self) -> &'static str {
        "Mean"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[Input<'_>]) -> Result<(Buffer, Box<dyn Operator>)> {
        let [x] = operands::<1>(self.name(), inputs)?;
        let op = SpreadBackward {
            name: "Mean",
            parents: [x.parent()],
            input: x.id(),
            shape: x.value().shape().to_vec(),
            weight: 1.0 / x.value().len() as f32,
        };
        Ok((Buffer::scalar(x.value().mean()), Box::new(op)))
    }
}

impl Operator for SpreadBackward {
    fn name(&self) -> &'static str {
        self.name
    }

    fn parents(&self) -> &[Parent] {
        &self.parents
    }

    fn backward(&self, grad_output: &Buffer) -> Result<Vec<(NodeId, Buffer)>> {
        let upstream = grad_output.sum() * self.weight;
        Ok(vec![(self.input, Buffer::full(&self.shape, upstream))])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

#[derive(Debug, Clone, Copy, Default)]
pub struct Min;

/// Routes the upstream gradient to the positions holding the extremum,
/// split evenly between ties.
#[derive(Debug)]
pub struct ExtremumBackward {
    name: &'static str,
    parents: [Parent; 1],
    input: SavedInput,
    extremum: f32,
}

impl ExtremumBackward {
    fn new(name: &'static str, input: &Input<'_>, extremum: f32) -> Self {
        Self {
            name,
            parents: [input.parent()],
            input: input.save(),
            extremum,
        }
    }
}

impl Function for Max {
    fn name(&self) -> &'static str {
        "Max"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[Input<'_>]) -> Result<(Buffer, Box<dyn Operator>)> {
        let [x] = operands::<1>(self.name(), inputs)?;
        let max = x.value().max();
        Ok((Buffer::scalar(max), Box::new(ExtremumBackward::new("Max", x, max))))
    }
}

impl Function for Min {
    fn name(&self) -> &'static str {
        "Min"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[Input<'_>]) -> Result<(Buffer, Box<dyn Operator>)> {
        let [x] = operands::<1>(self.name(), inputs)?;
        let min = x.value().min();
        Ok((Buffer::scalar(min), Box::new(ExtremumBackward::new("Min", x, min))))
    }
}

impl Operator for ExtremumBackward {
    fn name(&self) -> &'static str {
        self.name
    }

    fn parents(&self) -> &[Parent] {
        &self.parents
    }

    fn backward(&self, grad_output: &Buffer) -> Result<Vec<(NodeId, Buffer)>> {
        let value = self.input.value();
        let ties = value.data().iter().filter(|&&v| v == self.extremum).count();
        let share = if ties == 0 {
            0.0
        } else {
            grad_output.sum() / ties as f32
        };
        let extremum = self.extremum;
        let grad = value.map(|v| if v == extremum { share } else { 0.0 });
        Ok(vec![(self.input.id(), grad)])
    }
}
