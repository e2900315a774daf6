//! Chi-Square Kernel Implementation
//!
//! The Chi-square kernel is effective for histogram and distribution data.
//!
//! K(x, y) = exp(-γ * χ²(x, y))
//!
//! Where χ²(x, y) = Σᵢ (xᵢ - yᵢ)² / (xᵢ + yᵢ) for xᵢ + yᵢ ≠ 0

use crate::kernel::traits::Kernel;
use ndarray::{ArrayView1, Zip};

/// Chi-square kernel for histogram and distribution data
#[derive(Debug, Clone)]
pub struct ChiSquareKernel {
    pub gamma: f64,
}

impl ChiSquareKernel {
    pub fn new(gamma: f64) -> Self {
        Self { gamma }
    }

    /// Chi-square distance between two rows; terms with a zero denominator are skipped
    pub fn chi_square_distance(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        Zip::from(&x).and(&y).fold(0.0, |acc, &a, &b| {
            let sum = a + b;
            if sum != 0.0 {
                let diff = a - b;
                acc + diff * diff / sum
            } else {
                acc
            }
        })
    }
}

impl Kernel for ChiSquareKernel {
    fn compute(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        (-self.gamma * Self::chi_square_distance(x, y)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_identical_histograms() {
        let kernel = ChiSquareKernel::new(1.0);
        let x = array![0.2, 0.3, 0.5];
        assert_eq!(kernel.compute(x.view(), x.view()), 1.0);
    }

    #[test]
    fn test_known_distance() {
        let x = array![1.0, 0.0, 2.0];
        let y = array![3.0, 0.0, 2.0];
        // (1-3)^2/(1+3) = 1, zero-denominator term skipped, last term 0
        assert_relative_eq!(ChiSquareKernel::chi_square_distance(x.view(), y.view()), 1.0);

        let kernel = ChiSquareKernel::new(0.5);
        assert_relative_eq!(kernel.compute(x.view(), y.view()), (-0.5f64).exp());
    }
}
