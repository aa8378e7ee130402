//! Activation functions built from the primitive kernels.
//!
//! Nothing here has its own backward: each function is a short expression
//! over `ops`, so gradients come from the primitives it records.

use super::tensor::Tensor;
use crate::error::Result;

const SQRT_2_OVER_PI: f32 = 0.797_884_6;

impl Tensor {
    /// `1 / (1 + e^-x)`.
    pub fn sigmoid(&self) -> Result<Tensor> {
        ((-self)?.exp()? + 1.0)?.reciprocal()
    }

    /// `2 * sigmoid(2x) - 1`.
    pub fn tanh(&self) -> Result<Tensor> {
        ((self * 2.0)?.sigmoid()? * 2.0)? - 1.0
    }

    /// `x` for positive inputs, `alpha * (e^x - 1)` otherwise.
    pub fn elu(&self, alpha: f32) -> Result<Tensor> {
        let negative = (1.0 - self.exp()?)?.relu()?;
        self.relu()? - (negative * alpha)?
    }

    /// `x * sigmoid(x)`.
    pub fn swish(&self) -> Result<Tensor> {
        self * self.sigmoid()?
    }

    /// Alias of [`swish`](Self::swish).
    pub fn silu(&self) -> Result<Tensor> {
        self.swish()
    }

    /// ReLU capped at 6.
    pub fn relu6(&self) -> Result<Tensor> {
        self.relu()? - (self - 6.0)?.relu()?
    }

    /// `x * relu6(x + 3) / 6`.
    pub fn hardswish(&self) -> Result<Tensor> {
        (self * (self + 3.0)?.relu6()?)? * (1.0 / 6.0)
    }

    /// GELU, tanh approximation.
    pub fn gelu(&self) -> Result<Tensor> {
        let cubic = ((self * self)? * 0.044_715)?;
        let inner = ((self * SQRT_2_OVER_PI)? * (cubic + 1.0)?)?;
        (self * 0.5)? * (inner.tanh()? + 1.0)?
    }

    /// `x * sigmoid(1.702 x)`.
    pub fn quick_gelu(&self) -> Result<Tensor> {
        self * (self * 1.702)?.sigmoid()?
    }

    /// ReLU with slope `negative_slope` below zero.
    pub fn leaky_relu(&self, negative_slope: f32) -> Result<Tensor> {
        self.relu()? - (self * -negative_slope)?.relu()?
    }

    /// `ln(1 + e^(beta x)) / beta`.
    pub fn softplus(&self, beta: f32) -> Result<Tensor> {
        ((self * beta)?.exp()? + 1.0)?.log()? * (1.0 / beta)
    }

    /// `x * tanh(softplus(x))`.
    pub fn mish(&self) -> Result<Tensor> {
        self * self.softplus(1.0)?.tanh()?
    }

    /// Clamp into `[min, max]`; the gradient is zero outside the range.
    pub fn clip(&self, min: f32, max: f32) -> Result<Tensor> {
        ((self - min)?.relu()? + min)? - (self - max)?.relu()?
    }

    /// Smooth sign, `x / (|x| + 1e-10)`.
    pub fn sign(&self) -> Result<Tensor> {
        self / (self.abs()? + 1e-10)?
    }
}

#[cfg(test)]
mod tests {
    use crate::Tensor;
    use crate::autodiff::clear_graph;
    use approx::assert_relative_eq;

    fn values(t: Tensor) -> Vec<f32> {
        t.value().into_vec()
    }

    fn input() -> Tensor {
        Tensor::from_vec(vec![-2.0, -0.5, 0.5, 3.0, 8.0], &[5]).unwrap()
    }

    #[test]
    fn test_sigmoid_and_tanh_match_closed_form() {
        clear_graph();
        let x = input();
        for (got, &v) in values(x.sigmoid().unwrap()).iter().zip(x.value().data()) {
            assert_relative_eq!(*got, 1.0 / (1.0 + (-v).exp()), epsilon = 1e-6);
        }
        for (got, &v) in values(x.tanh().unwrap()).iter().zip(x.value().data()) {
            assert_relative_eq!(*got, v.tanh(), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_sigmoid_gradient() {
        clear_graph();
        let x = Tensor::scalar(0.0);
        x.sigmoid().unwrap().backward().unwrap();
        assert_relative_eq!(x.grad().item().unwrap(), 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_piecewise_linear() {
        clear_graph();
        let x = input();
        assert_eq!(values(x.relu6().unwrap()), vec![0.0, 0.0, 0.5, 3.0, 6.0]);
        assert_eq!(values(x.clip(-1.0, 4.0).unwrap()), vec![-1.0, -0.5, 0.5, 3.0, 4.0]);

        let leaky = values(x.leaky_relu(0.1).unwrap());
        assert_relative_eq!(leaky[0], -0.2, epsilon = 1e-6);
        assert_relative_eq!(leaky[3], 3.0);
    }

    #[test]
    fn test_elu() {
        clear_graph();
        let x = input();
        let out = values(x.elu(1.0).unwrap());
        assert_relative_eq!(out[0], (-2.0f32).exp() - 1.0, epsilon = 1e-6);
        assert_relative_eq!(out[4], 8.0);
    }

    #[test]
    fn test_hardswish() {
        clear_graph();
        let x = input();
        let out = values(x.hardswish().unwrap());
        assert_relative_eq!(out[0], -2.0 * 1.0 / 6.0, epsilon = 1e-6);
        assert_relative_eq!(out[4], 8.0, epsilon = 1e-6);
    }

    #[test]
    fn test_smooth_activations() {
        clear_graph();
        let x = Tensor::scalar(1.0);
        let sig = 1.0 / (1.0 + (-1.0f32).exp());
        let softplus = 1.0f32.exp().ln_1p();

        assert_relative_eq!(x.swish().unwrap().item().unwrap(), sig, epsilon = 1e-6);
        assert_relative_eq!(x.silu().unwrap().item().unwrap(), sig, epsilon = 1e-6);
        assert_relative_eq!(x.softplus(1.0).unwrap().item().unwrap(), softplus, epsilon = 1e-6);
        assert_relative_eq!(
            x.mish().unwrap().item().unwrap(),
            softplus.tanh(),
            epsilon = 1e-5
        );
        assert_relative_eq!(x.gelu().unwrap().item().unwrap(), 0.841_192, epsilon = 1e-4);
        assert_relative_eq!(
            x.quick_gelu().unwrap().item().unwrap(),
            1.0 / (1.0 + (-1.702f32).exp()),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_sign() {
        clear_graph();
        let x = Tensor::from_vec(vec![-3.0, 0.0, 2.0], &[3]).unwrap();
        let out = values(x.sign().unwrap());
        assert_relative_eq!(out[0], -1.0, epsilon = 1e-6);
        assert_eq!(out[1], 0.0);
        assert_relative_eq!(out[2], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_composite_backward_reaches_leaf() {
        clear_graph();
        let x = Tensor::from_vec(vec![-1.0, 2.0], &[2]).unwrap();
        x.clip(0.0, 1.0).unwrap().sum().unwrap().backward().unwrap();
        // both points sit outside [0, 1]
        assert_eq!(x.grad().data(), &[0.0, 0.0]);
    }
}
