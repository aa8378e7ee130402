//! Random leaf constructors.

use rand::Rng;

use super::tensor::Tensor;
use crate::buffer::Buffer;

fn fan_scale(shape: &[usize]) -> f32 {
    let n: usize = shape.iter().product();
    (n.max(1) as f32).powf(-0.5)
}

fn glorot_scale(shape: &[usize]) -> f32 {
    let fan_in = shape.first().copied().unwrap_or(1);
    let fan_out: usize = shape.iter().skip(1).product();
    let fans = (fan_in + fan_out).max(1) as f32;
    (6.0 / fans).sqrt()
}

impl Tensor {
    /// Leaf with values drawn from `U[-1, 1)`.
    pub fn uniform(shape: &[usize]) -> Self {
        Self::new(Buffer::uniform(shape))
    }

    pub fn uniform_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        Self::new(Buffer::uniform_with_rng(shape, rng))
    }

    /// Leaf with values drawn from `N(0, 1)`.
    pub fn randn(shape: &[usize]) -> Self {
        Self::new(Buffer::randn(shape))
    }

    pub fn randn_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        Self::new(Buffer::randn_with_rng(shape, rng))
    }

    /// `U[-1, 1)` scaled by `n^-1/2`, where `n` is the element count.
    pub fn scaled_uniform(shape: &[usize]) -> Self {
        Self::scaled_uniform_with_rng(shape, &mut rand::rng())
    }

    pub fn scaled_uniform_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        Self::new(Buffer::uniform_with_rng(shape, rng).scale(fan_scale(shape)))
    }

    /// Glorot (Xavier) uniform initialisation.
    ///
    /// `U[-1, 1)` scaled by `sqrt(6 / (fan_in + fan_out))`, with `fan_in`
    /// the leading dimension and `fan_out` the product of the rest.
    pub fn glorot_uniform(shape: &[usize]) -> Self {
        Self::glorot_uniform_with_rng(shape, &mut rand::rng())
    }

    pub fn glorot_uniform_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        Self::new(Buffer::uniform_with_rng(shape, rng).scale(glorot_scale(shape)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::clear_graph;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_seeded_constructors_are_reproducible() {
        clear_graph();
        let a = Tensor::randn_with_rng(&[3, 2], &mut StdRng::seed_from_u64(42));
        let b = Tensor::randn_with_rng(&[3, 2], &mut StdRng::seed_from_u64(42));
        assert_eq!(a.value(), b.value());
        assert!(a.is_leaf() && !a.trainable());
    }

    #[test]
    fn test_scaled_uniform_bound() {
        clear_graph();
        let mut rng = StdRng::seed_from_u64(1);
        let t = Tensor::scaled_uniform_with_rng(&[4, 4], &mut rng);
        let bound = 0.25;
        assert!(t.value().data().iter().all(|v| v.abs() <= bound));
    }

    #[test]
    fn test_glorot_uniform_bound() {
        clear_graph();
        let mut rng = StdRng::seed_from_u64(2);
        let t = Tensor::glorot_uniform_with_rng(&[2, 3, 2], &mut rng);
        let bound = (6.0f32 / 8.0).sqrt();
        assert_eq!(t.shape(), vec![2, 3, 2]);
        assert!(t.value().data().iter().all(|v| v.abs() <= bound));
    }

    #[test]
    fn test_scales() {
        assert_relative_eq!(fan_scale(&[]), 1.0);
        assert_relative_eq!(fan_scale(&[4]), 0.5);
        assert_relative_eq!(glorot_scale(&[3, 3]), 1.0);
    }

    #[test]
    fn test_uniform_range() {
        clear_graph();
        let t = Tensor::uniform(&[64]);
        assert!(t.value().data().iter().all(|v| (-1.0..1.0).contains(v)));
    }
}
