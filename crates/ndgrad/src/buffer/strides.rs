//! Stride and broadcasting utilities.
//!
//! Buffers are stored in row-major (C) order: the last axis is contiguous.

use smallvec::SmallVec;

use crate::error::{GradError, Result};

/// Inline storage for shapes and strides; most buffers have rank <= 4.
pub type Shape = SmallVec<[usize; 4]>;

/// Compute row-major strides from shape.
///
/// For shape [d0, d1, d2], returns strides [d1*d2, d2, 1].
///
/// # Examples
///
/// ```
/// use ndgrad::buffer::compute_strides;
///
/// assert_eq!(compute_strides(&[3, 4, 5]).as_slice(), &[20, 5, 1]);
/// assert_eq!(compute_strides(&[2, 3]).as_slice(), &[3, 1]);
/// assert!(compute_strides(&[]).is_empty());
/// ```
pub fn compute_strides(shape: &[usize]) -> Shape {
    let mut strides: Shape = SmallVec::from_elem(0, shape.len());
    let mut stride = 1;
    for (axis, &dim) in shape.iter().enumerate().rev() {
        strides[axis] = stride;
        stride *= dim;
    }
    strides
}

/// Resulting shape when broadcasting `lhs` against `rhs`.
///
/// Shapes are aligned on their trailing axes; each pair of dimensions must
/// be equal or one of them must be 1.
///
/// # Examples
///
/// ```
/// use ndgrad::buffer::broadcast_shape;
///
/// assert_eq!(broadcast_shape(&[2, 3], &[3]).unwrap().as_slice(), &[2, 3]);
/// assert_eq!(broadcast_shape(&[4, 1], &[1, 5]).unwrap().as_slice(), &[4, 5]);
/// assert!(broadcast_shape(&[2, 3], &[4]).is_err());
/// ```
pub fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Result<Shape> {
    let ndim = lhs.len().max(rhs.len());
    let mut shape: Shape = SmallVec::from_elem(1, ndim);
    for axis in 0..ndim {
        let l = dim_from_end(lhs, ndim - 1 - axis);
        let r = dim_from_end(rhs, ndim - 1 - axis);
        shape[axis] = match (l, r) {
            (l, r) if l == r => l,
            (1, r) => r,
            (l, 1) => l,
            _ => return Err(GradError::shape_mismatch(lhs, rhs)),
        };
    }
    Ok(shape)
}

/// Strides that read a buffer of `shape` as if it had `target` shape.
///
/// Broadcast axes (missing or of size 1) get stride 0. `shape` must
/// broadcast to `target`; this is not rechecked here.
pub fn broadcast_strides(shape: &[usize], target: &[usize]) -> Shape {
    let own = compute_strides(shape);
    let offset = target.len() - shape.len();
    let mut strides: Shape = SmallVec::from_elem(0, target.len());
    for (axis, &dim) in shape.iter().enumerate() {
        if dim != 1 {
            strides[axis + offset] = own[axis];
        }
    }
    strides
}

/// Convert cartesian indices to a linear offset.
#[inline]
pub fn cartesian_to_linear(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&idx, &stride)| idx * stride)
        .sum()
}

/// Advance `indices` to the next position in row-major order.
///
/// Wraps to all zeros after the last position.
#[inline]
pub fn next_index(indices: &mut [usize], shape: &[usize]) {
    for axis in (0..shape.len()).rev() {
        indices[axis] += 1;
        if indices[axis] < shape[axis] {
            return;
        }
        indices[axis] = 0;
    }
}

fn dim_from_end(shape: &[usize], back: usize) -> usize {
    if back < shape.len() {
        shape[shape.len() - 1 - back]
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_strides_3d() {
        assert_eq!(compute_strides(&[3, 4, 5]).as_slice(), &[20, 5, 1]);
    }

    #[test]
    fn test_compute_strides_1d() {
        assert_eq!(compute_strides(&[5]).as_slice(), &[1]);
    }

    #[test]
    fn test_broadcast_shape_scalar() {
        assert_eq!(broadcast_shape(&[], &[2, 3]).unwrap().as_slice(), &[2, 3]);
        assert_eq!(broadcast_shape(&[2, 3], &[]).unwrap().as_slice(), &[2, 3]);
    }

    #[test]
    fn test_broadcast_shape_mismatch() {
        let err = broadcast_shape(&[2, 3], &[2]).unwrap_err();
        assert!(matches!(err, GradError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_broadcast_strides() {
        // [3] read as [2, 3]: rows share the same data
        assert_eq!(broadcast_strides(&[3], &[2, 3]).as_slice(), &[0, 1]);
        // [2, 1] read as [2, 3]: columns share the same data
        assert_eq!(broadcast_strides(&[2, 1], &[2, 3]).as_slice(), &[1, 0]);
        assert_eq!(broadcast_strides(&[], &[2, 3]).as_slice(), &[0, 0]);
    }

    #[test]
    fn test_next_index_walks_row_major() {
        let shape = [2, 3];
        let strides = compute_strides(&shape);
        let mut indices = [0, 0];
        for expected in 0..6 {
            assert_eq!(cartesian_to_linear(&indices, &strides), expected);
            next_index(&mut indices, &shape);
        }
        assert_eq!(indices, [0, 0]);
    }
}
