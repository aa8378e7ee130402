//! Dense n-dimensional `f32` buffer.
//!
//! `Buffer` is the numeric storage behind every graph node. It provides
//! broadcasting elementwise arithmetic, whole-buffer reductions and the
//! handful of generators the autodiff layer needs. Data is row-major and a
//! rank-0 buffer (shape `[]`) holds exactly one element.

mod matmul;
#[cfg(feature = "random")]
mod random;
mod strides;

use std::fmt;

use smallvec::SmallVec;

use crate::error::{GradError, Result};

pub use strides::{
    Shape, broadcast_shape, broadcast_strides, cartesian_to_linear, compute_strides, next_index,
};

/// Owned, contiguous, row-major `f32` array.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    data: Vec<f32>,
    shape: Shape,
}

impl Buffer {
    /// Create a buffer from data and shape.
    ///
    /// # Errors
    ///
    /// Returns `GradError::LengthMismatch` if `data.len()` is not the
    /// product of `shape`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndgrad::Buffer;
    ///
    /// let b = Buffer::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// assert_eq!(b.shape(), &[2, 3]);
    /// assert_eq!(b.get(&[1, 0]), Some(4.0)); // row-major
    /// ```
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(GradError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            shape: SmallVec::from_slice(shape),
        })
    }

    /// Rank-0 buffer holding a single value.
    pub fn scalar(value: f32) -> Self {
        Self {
            data: vec![value],
            shape: Shape::new(),
        }
    }

    /// Buffer of `shape` with every element set to `value`.
    pub fn full(shape: &[usize], value: f32) -> Self {
        let len = shape.iter().product();
        Self {
            data: vec![value; len],
            shape: SmallVec::from_slice(shape),
        }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    /// Zero buffer with the same shape as `self`.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(&self.shape)
    }

    /// Ones buffer with the same shape as `self`.
    pub fn ones_like(&self) -> Self {
        Self::ones(&self.shape)
    }

    /// `n x n` identity matrix.
    ///
    /// ```
    /// use ndgrad::Buffer;
    ///
    /// let i = Buffer::eye(3);
    /// assert_eq!(i.get(&[1, 1]), Some(1.0));
    /// assert_eq!(i.get(&[0, 2]), Some(0.0));
    /// ```
    pub fn eye(n: usize) -> Self {
        let mut buffer = Self::zeros(&[n, n]);
        for i in 0..n {
            buffer.data[i * n + i] = 1.0;
        }
        buffer
    }

    /// Values `start, start + 1, ...` strictly below `stop`, as a rank-1 buffer.
    ///
    /// ```
    /// use ndgrad::Buffer;
    ///
    /// assert_eq!(Buffer::arange(0.0, 4.0).data(), &[0.0, 1.0, 2.0, 3.0]);
    /// assert!(Buffer::arange(3.0, 1.0).is_empty());
    /// ```
    pub fn arange(start: f32, stop: f32) -> Self {
        let len = (stop - start).ceil().max(0.0) as usize;
        let data: Vec<f32> = (0..len).map(|i| start + i as f32).collect();
        Self {
            shape: SmallVec::from_slice(&[data.len()]),
            data,
        }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// The single element of a one-element buffer.
    pub fn item(&self) -> Option<f32> {
        match self.data.as_slice() {
            [value] => Some(*value),
            _ => None,
        }
    }

    /// Element at cartesian `indices`, or `None` if out of bounds.
    pub fn get(&self, indices: &[usize]) -> Option<f32> {
        if indices.len() != self.ndim() {
            return None;
        }
        if indices.iter().zip(self.shape.iter()).any(|(&i, &d)| i >= d) {
            return None;
        }
        let linear = cartesian_to_linear(indices, &compute_strides(&self.shape));
        self.data.get(linear).copied()
    }

    /// Apply `f` to each element, returning a new buffer.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            data: self.data.iter().map(|&x| f(x)).collect(),
            shape: self.shape.clone(),
        }
    }

    /// Combine two buffers elementwise with broadcasting.
    ///
    /// # Errors
    ///
    /// Returns `GradError::ShapeMismatch` if the shapes do not broadcast.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndgrad::Buffer;
    ///
    /// let m = Buffer::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
    /// let row = Buffer::from_vec(vec![10.0, 20.0], &[2]).unwrap();
    /// let out = m.zip_with(&row, |a, b| a + b).unwrap();
    /// assert_eq!(out.data(), &[11.0, 22.0, 13.0, 24.0]);
    /// ```
    pub fn zip_with(&self, other: &Buffer, f: impl Fn(f32, f32) -> f32) -> Result<Self> {
        if self.shape == other.shape {
            let data = self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect();
            return Ok(Self {
                data,
                shape: self.shape.clone(),
            });
        }

        let shape = broadcast_shape(&self.shape, &other.shape)?;
        let lhs_strides = broadcast_strides(&self.shape, &shape);
        let rhs_strides = broadcast_strides(&other.shape, &shape);
        let len: usize = shape.iter().product();

        let mut data = Vec::with_capacity(len);
        let mut indices: Shape = SmallVec::from_elem(0, shape.len());
        for _ in 0..len {
            let a = self.data[cartesian_to_linear(&indices, &lhs_strides)];
            let b = other.data[cartesian_to_linear(&indices, &rhs_strides)];
            data.push(f(a, b));
            next_index(&mut indices, &shape);
        }
        Ok(Self { data, shape })
    }

    /// Update `self` elementwise from a broadcast `other`, keeping `self`'s shape.
    ///
    /// # Errors
    ///
    /// Returns `GradError::ShapeMismatch` if `other` does not broadcast to
    /// `self`'s shape.
    pub fn zip_assign(&mut self, other: &Buffer, f: impl Fn(f32, f32) -> f32) -> Result<()> {
        let out = self.zip_with(other, f)?;
        if out.shape != self.shape {
            return Err(GradError::shape_mismatch(&self.shape, &other.shape));
        }
        self.data = out.data;
        Ok(())
    }

    pub fn add(&self, other: &Buffer) -> Result<Self> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Buffer) -> Result<Self> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Buffer) -> Result<Self> {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn div(&self, other: &Buffer) -> Result<Self> {
        self.zip_with(other, |a, b| a / b)
    }

    pub fn pow(&self, other: &Buffer) -> Result<Self> {
        self.zip_with(other, f32::powf)
    }

    /// Multiply every element by `alpha`.
    pub fn scale(&self, alpha: f32) -> Self {
        self.map(|x| x * alpha)
    }

    /// Add `other` into `self`; shapes must match exactly.
    ///
    /// Used for gradient accumulation, where a silent broadcast would hide
    /// a kernel bug.
    pub fn accumulate(&mut self, other: &Buffer) -> Result<()> {
        if self.shape != other.shape {
            return Err(GradError::shape_mismatch(&self.shape, &other.shape));
        }
        for (x, &y) in self.data.iter_mut().zip(other.data.iter()) {
            *x += y;
        }
        Ok(())
    }

    /// Set every element to `value` in place.
    pub fn fill(&mut self, value: f32) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    /// Arithmetic mean; NaN for an empty buffer.
    pub fn mean(&self) -> f32 {
        self.sum() / self.data.len() as f32
    }

    /// Largest element; `-inf` for an empty buffer.
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Smallest element; `inf` for an empty buffer.
    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Sum over broadcast axes so the result has `shape`.
    ///
    /// This is the adjoint of broadcasting `shape` up to `self.shape()` and
    /// is how binary kernels return gradients to their operands.
    ///
    /// # Errors
    ///
    /// Returns `GradError::ShapeMismatch` if `shape` does not broadcast to
    /// `self.shape()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndgrad::Buffer;
    ///
    /// let g = Buffer::ones(&[2, 3]);
    /// assert_eq!(g.sum_to_shape(&[3]).unwrap().data(), &[2.0, 2.0, 2.0]);
    /// assert_eq!(g.sum_to_shape(&[2, 1]).unwrap().data(), &[3.0, 3.0]);
    /// assert_eq!(g.sum_to_shape(&[]).unwrap().item(), Some(6.0));
    /// ```
    pub fn sum_to_shape(&self, shape: &[usize]) -> Result<Self> {
        if self.shape.as_slice() == shape {
            return Ok(self.clone());
        }
        if shape.len() > self.ndim() || broadcast_shape(shape, &self.shape)? != self.shape {
            return Err(GradError::shape_mismatch(shape, &self.shape));
        }

        let mut out = Self::zeros(shape);
        let strides = broadcast_strides(shape, &self.shape);
        let mut indices: Shape = SmallVec::from_elem(0, self.ndim());
        for &value in &self.data {
            out.data[cartesian_to_linear(&indices, &strides)] += value;
            next_index(&mut indices, &self.shape);
        }
        Ok(out)
    }

    /// Transpose of a rank-2 buffer.
    ///
    /// # Errors
    ///
    /// Returns `GradError::RankMismatch` for any other rank.
    pub fn transpose(&self) -> Result<Self> {
        let (rows, cols) = self.matrix_dims("transpose")?;
        let mut data = Vec::with_capacity(self.len());
        for j in 0..cols {
            for i in 0..rows {
                data.push(self.data[i * cols + j]);
            }
        }
        Self::from_vec(data, &[cols, rows])
    }

    /// Matrix product of two rank-2 buffers, `[m, k] @ [k, n] -> [m, n]`.
    ///
    /// # Errors
    ///
    /// Returns `GradError::RankMismatch` if either operand is not rank 2 and
    /// `GradError::ShapeMismatch` if the inner dimensions differ.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndgrad::Buffer;
    ///
    /// let a = Buffer::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
    /// let c = a.matmul(&Buffer::eye(2)).unwrap();
    /// assert_eq!(c.data(), a.data());
    /// ```
    pub fn matmul(&self, other: &Buffer) -> Result<Self> {
        let (m, k) = self.matrix_dims("matmul")?;
        let (k2, n) = other.matrix_dims("matmul")?;
        if k != k2 {
            return Err(GradError::shape_mismatch(&self.shape, &other.shape));
        }
        let data = matmul::gemm(&self.data, &other.data, m, k, n);
        Self::from_vec(data, &[m, n])
    }

    /// Elementwise comparison within an absolute-or-relative tolerance.
    pub fn approx_eq(&self, other: &Buffer, tol: f32) -> bool {
        self.shape == other.shape
            && self.data.iter().zip(other.data.iter()).all(|(&a, &b)| {
                let scale = a.abs().max(b.abs()).max(1.0);
                (a - b).abs() <= tol * scale
            })
    }

    fn matrix_dims(&self, op: &'static str) -> Result<(usize, usize)> {
        match self.shape.as_slice() {
            &[rows, cols] => Ok((rows, cols)),
            _ => Err(GradError::RankMismatch {
                op,
                expected: 2,
                actual: self.ndim(),
            }),
        }
    }
}

impl From<f32> for Buffer {
    fn from(value: f32) -> Self {
        Buffer::scalar(value)
    }
}

impl From<Vec<f32>> for Buffer {
    fn from(data: Vec<f32>) -> Self {
        Self {
            shape: SmallVec::from_slice(&[data.len()]),
            data,
        }
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item() {
            Some(value) if self.ndim() == 0 => write!(f, "{value}"),
            _ => write!(f, "{:?} shape={:?}", self.data, self.shape.as_slice()),
        }
    }
}
