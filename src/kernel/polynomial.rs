//! Polynomial Kernel Implementation
//!
//! The polynomial kernel is defined as:
//! K(x, y) = (γ * <x, y> + r)^d
//!
//! Where:
//! - γ (gamma): scaling factor for the dot product
//! - r (coef0): independent term in the polynomial
//! - d (degree): degree of the polynomial, a real number

use crate::kernel::traits::Kernel;
use ndarray::ArrayView1;

/// Polynomial kernel with configurable degree, gamma, and coefficient
#[derive(Debug, Clone)]
pub struct PolynomialKernel {
    pub gamma: f64,
    pub coef0: f64,
    pub degree: f64,
}

impl PolynomialKernel {
    pub fn new(degree: f64, gamma: f64, coef0: f64) -> Self {
        Self {
            gamma,
            coef0,
            degree,
        }
    }
}

impl Kernel for PolynomialKernel {
    fn compute(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        let base = self.gamma * x.dot(&y) + self.coef0;
        if self.degree.fract() == 0.0 && self.degree.abs() <= i32::MAX as f64 {
            base.powi(self.degree as i32)
        } else {
            base.powf(self.degree)
        }
    }
}
