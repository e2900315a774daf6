//! Sigmoid (Tanh) Kernel Implementation
//!
//! K(x, y) = tanh(γ * <x, y> + r)
//!
//! The kernel is not positive semi-definite for every (γ, r); the solver
//! clamps non-positive curvature instead of failing.

use crate::kernel::traits::Kernel;
use ndarray::ArrayView1;

/// Sigmoid (Hyperbolic Tangent) kernel for non-linear classification
#[derive(Debug, Clone)]
pub struct SigmoidKernel {
    pub gamma: f64,
    pub coef0: f64,
}

impl SigmoidKernel {
    pub fn new(gamma: f64, coef0: f64) -> Self {
        Self { gamma, coef0 }
    }
}

impl Kernel for SigmoidKernel {
    fn compute(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        (self.gamma * x.dot(&y) + self.coef0).tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_sigmoid_known_value() {
        let kernel = SigmoidKernel::new(0.5, -1.0);
        let x = array![1.0, 2.0];
        let y = array![2.0, 1.0];
        assert_relative_eq!(kernel.compute(x.view(), y.view()), (0.5f64 * 4.0 - 1.0).tanh());
    }

    #[test]
    fn test_sigmoid_is_bounded() {
        let kernel = SigmoidKernel::new(10.0, 0.0);
        let x = array![100.0];
        let y = array![-100.0];
        let k = kernel.compute(x.view(), y.view());
        assert!((-1.0..=1.0).contains(&k));
    }
}
