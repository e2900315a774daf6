//! Histogram Intersection Kernel Implementation
//!
//! K(x, y) = Σᵢ min(xᵢ, yᵢ)
//!
//! Positive semi-definite for non-negative features. The kernel has no
//! hyperparameters.

use crate::kernel::traits::Kernel;
use ndarray::{ArrayView1, Zip};

/// Histogram intersection kernel
#[derive(Debug, Clone, Copy, Default)]
pub struct HistogramIntersectionKernel;

impl HistogramIntersectionKernel {
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for HistogramIntersectionKernel {
    fn compute(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        Zip::from(&x)
            .and(&y)
            .fold(0.0, |acc, &a, &b| acc + a.min(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_intersection() {
        let kernel = HistogramIntersectionKernel::new();
        let x = array![0.5, 0.2, 0.3];
        let y = array![0.1, 0.6, 0.3];
        assert!((kernel.compute(x.view(), y.view()) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_self_intersection_is_mass() {
        let kernel = HistogramIntersectionKernel::new();
        let x = array![1.0, 2.0, 3.0];
        assert_eq!(kernel.compute(x.view(), x.view()), 6.0);
    }
}
