//! RBF (Radial Basis Function) kernel implementation
//!
//! The RBF kernel is defined as: K(x, y) = exp(-γ * ||x - y||²)
//! where γ (gamma) is a hyperparameter that controls the kernel width.

use crate::kernel::Kernel;
use ndarray::{ArrayView1, Zip};

/// RBF (Radial Basis Function) kernel: K(x, y) = exp(-γ * ||x - y||²)
///
/// The gamma parameter controls the "reach" of each training example:
/// - High gamma: close points have high influence (potential overfitting)
/// - Low gamma: distant points have influence (potential underfitting)
#[derive(Debug, Clone, Copy)]
pub struct RBFKernel {
    gamma: f64,
}

impl RBFKernel {
    /// Create a new RBF kernel with specified gamma parameter
    pub fn new(gamma: f64) -> Self {
        Self { gamma }
    }

    /// Get the gamma parameter
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Kernel for RBFKernel {
    fn compute(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        let squared_distance = squared_euclidean_distance(x, y);
        (-self.gamma * squared_distance).exp()
    }

    fn compute_with_norms(
        &self,
        x: ArrayView1<f64>,
        y: ArrayView1<f64>,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        // ||x - y||² = ||x||² + ||y||² - 2*x^T*y
        let squared_distance = (x_norm_sq + y_norm_sq - 2.0 * x.dot(&y)).max(0.0);
        (-self.gamma * squared_distance).exp()
    }
}

fn squared_euclidean_distance(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    Zip::from(&x).and(&y).fold(0.0, |acc, &a, &b| {
        let diff = a - b;
        acc + diff * diff
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_rbf_identical_vectors() {
        let kernel = RBFKernel::new(0.5);
        let x = array![1.0, 2.0, 3.0];
        assert_eq!(kernel.compute(x.view(), x.view()), 1.0);
    }

    #[test]
    fn test_rbf_known_value() {
        let kernel = RBFKernel::new(0.5);
        let x = array![1.0, 0.0];
        let y = array![0.0, 1.0];
        // ||x - y||² = 2, exp(-0.5 * 2) = exp(-1)
        assert_relative_eq!(kernel.compute(x.view(), y.view()), (-1.0f64).exp());
    }

    #[test]
    fn test_rbf_with_norms_matches_direct() {
        let kernel = RBFKernel::new(0.3);
        let x = array![1.0, -2.0, 0.5];
        let y = array![0.5, 1.0, -1.5];
        let direct = kernel.compute(x.view(), y.view());
        let with_norms =
            kernel.compute_with_norms(x.view(), y.view(), x.dot(&x), y.dot(&y));
        assert_relative_eq!(direct, with_norms, epsilon = 1e-12);
    }
}
