//! Random buffer construction.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::StandardNormal;

use super::Buffer;

impl Buffer {
    /// Uniform random values in `[-1, 1)`.
    ///
    /// # Example
    ///
    /// ```
    /// use ndgrad::Buffer;
    ///
    /// let b = Buffer::uniform(&[2, 3]);
    /// assert_eq!(b.shape(), &[2, 3]);
    /// assert!(b.data().iter().all(|v| (-1.0..1.0).contains(v)));
    /// ```
    pub fn uniform(shape: &[usize]) -> Self {
        Self::uniform_with_rng(shape, &mut rand::rng())
    }

    /// Uniform random values in `[-1, 1)` using a specific RNG.
    ///
    /// ```
    /// use ndgrad::Buffer;
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let a = Buffer::uniform_with_rng(&[4], &mut StdRng::seed_from_u64(7));
    /// let b = Buffer::uniform_with_rng(&[4], &mut StdRng::seed_from_u64(7));
    /// assert_eq!(a, b);
    /// ```
    pub fn uniform_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        Self::sample(shape, || rng.sample::<f32, _>(StandardUniform) * 2.0 - 1.0)
    }

    /// Standard normal random values.
    pub fn randn(shape: &[usize]) -> Self {
        Self::randn_with_rng(shape, &mut rand::rng())
    }

    /// Standard normal random values using a specific RNG.
    pub fn randn_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        Self::sample(shape, || rng.sample::<f32, _>(StandardNormal))
    }

    fn sample(shape: &[usize], mut draw: impl FnMut() -> f32) -> Self {
        let mut buffer = Self::zeros(shape);
        buffer.data_mut().iter_mut().for_each(|x| *x = draw());
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_uniform_range() {
        let b = Buffer::uniform(&[200]);
        for &v in b.data() {
            assert!((-1.0..1.0).contains(&v), "value {} not in [-1, 1)", v);
        }
        // both halves of the interval should be hit
        assert!(b.data().iter().any(|&v| v < 0.0));
        assert!(b.data().iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_randn_moments() {
        let b = Buffer::randn_with_rng(&[400], &mut StdRng::seed_from_u64(54321));
        let mean = b.mean();
        assert!(mean.abs() < 0.3, "mean {} too far from 0", mean);

        let var = b.data().iter().map(|x| (x - mean).powi(2)).sum::<f32>() / 400.0;
        assert!(var > 0.5 && var < 1.5, "variance {} too far from 1", var);
    }

    #[test]
    fn test_randn_reproducible() {
        let t1 = Buffer::randn_with_rng(&[3, 4], &mut StdRng::seed_from_u64(12345));
        let t2 = Buffer::randn_with_rng(&[3, 4], &mut StdRng::seed_from_u64(12345));
        assert_eq!(t1, t2);
    }

    #[test]
    fn test_random_scalar() {
        let b = Buffer::uniform(&[]);
        assert_eq!(b.len(), 1);
    }
}
