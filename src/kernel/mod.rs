//! Kernel functions for SVM
//!
//! Every kernel operates on dense feature rows. [`KernelFunction`] is the
//! closed set of kernels a model can be trained with, built from the
//! hyperparameters captured at training time.

pub mod chi_square;
pub mod histogram_intersection;
pub mod linear;
pub mod polynomial;
pub mod rbf;
pub mod sigmoid;
pub mod traits;

pub use self::chi_square::*;
pub use self::histogram_intersection::*;
pub use self::linear::*;
pub use self::polynomial::*;
pub use self::rbf::*;
pub use self::sigmoid::*;
pub use self::traits::*;

use crate::core::{KernelType, SvmParams};
use ndarray::ArrayView1;

/// Kernel selected by [`KernelType`] with its parameters bound
#[derive(Debug, Clone)]
pub enum KernelFunction {
    Linear(LinearKernel),
    Polynomial(PolynomialKernel),
    Rbf(RBFKernel),
    Sigmoid(SigmoidKernel),
    ChiSquare(ChiSquareKernel),
    Intersection(HistogramIntersectionKernel),
}

impl KernelFunction {
    /// Bind the kernel family and parameters of `params`
    pub fn from_params(params: &SvmParams) -> Self {
        match params.kernel_type {
            KernelType::Linear => KernelFunction::Linear(LinearKernel::new()),
            KernelType::Poly => KernelFunction::Polynomial(PolynomialKernel::new(
                params.degree,
                params.gamma,
                params.coef0,
            )),
            KernelType::Rbf => KernelFunction::Rbf(RBFKernel::new(params.gamma)),
            KernelType::Sigmoid => {
                KernelFunction::Sigmoid(SigmoidKernel::new(params.gamma, params.coef0))
            }
            KernelType::Chi2 => KernelFunction::ChiSquare(ChiSquareKernel::new(params.gamma)),
            KernelType::Inter => {
                KernelFunction::Intersection(HistogramIntersectionKernel::new())
            }
        }
    }

    pub fn kernel_type(&self) -> KernelType {
        match self {
            KernelFunction::Linear(_) => KernelType::Linear,
            KernelFunction::Polynomial(_) => KernelType::Poly,
            KernelFunction::Rbf(_) => KernelType::Rbf,
            KernelFunction::Sigmoid(_) => KernelType::Sigmoid,
            KernelFunction::ChiSquare(_) => KernelType::Chi2,
            KernelFunction::Intersection(_) => KernelType::Inter,
        }
    }

    /// Whether `compute_with_norms` is cheaper than `compute` for this kernel
    pub fn uses_norms(&self) -> bool {
        matches!(self, KernelFunction::Rbf(_))
    }
}

impl Kernel for KernelFunction {
    fn compute(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        match self {
            KernelFunction::Linear(k) => k.compute(x, y),
            KernelFunction::Polynomial(k) => k.compute(x, y),
            KernelFunction::Rbf(k) => k.compute(x, y),
            KernelFunction::Sigmoid(k) => k.compute(x, y),
            KernelFunction::ChiSquare(k) => k.compute(x, y),
            KernelFunction::Intersection(k) => k.compute(x, y),
        }
    }

    fn compute_with_norms(
        &self,
        x: ArrayView1<f64>,
        y: ArrayView1<f64>,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        match self {
            KernelFunction::Rbf(k) => k.compute_with_norms(x, y, x_norm_sq, y_norm_sq),
            other => other.compute(x, y),
        }
    }
}
