//! Matrix product via faer.
//!
//! Buffers are row-major, so operands are viewed with
//! `from_row_major_slice` and the product is written straight into a
//! row-major output without copies.

use faer::linalg::matmul::matmul;
use faer::{Accum, MatMut, MatRef, Par};

/// `C = A * B` for row-major `A: [m, k]`, `B: [k, n]`; returns row-major `C: [m, n]`.
pub(super) fn gemm(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; m * n];
    if m == 0 || n == 0 || k == 0 {
        return out;
    }

    let a_mat = MatRef::from_row_major_slice(a, m, k);
    let b_mat = MatRef::from_row_major_slice(b, k, n);
    let mut c_mat = MatMut::from_row_major_slice_mut(&mut out, m, n);

    matmul(c_mat.as_mut(), Accum::Replace, a_mat, b_mat, 1.0f32, Par::Seq);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gemm_identity() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let eye = [1.0, 0.0, 0.0, 1.0];
        assert_eq!(gemm(&a, &eye, 2, 2, 2), a.to_vec());
    }

    #[test]
    fn test_gemm_row_vector_times_matrix() {
        // [1, 2, 3] @ [[1, 0], [0, 1], [1, 1]] = [4, 5]
        let a = [1.0, 2.0, 3.0];
        let b = [1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let c = gemm(&a, &b, 1, 3, 2);
        assert_relative_eq!(c[0], 4.0);
        assert_relative_eq!(c[1], 5.0);
    }

    #[test]
    fn test_gemm_empty_inner_dimension() {
        assert_eq!(gemm(&[], &[], 2, 0, 3), vec![0.0; 6]);
    }
}
