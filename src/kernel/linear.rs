//! Linear kernel implementation

use crate::kernel::Kernel;
use ndarray::ArrayView1;

/// Linear kernel: K(x, y) = x^T * y
///
/// Decision functions of a linear model collapse to a single weight row,
/// which is what the compressed support-vector form stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearKernel;

impl LinearKernel {
    /// Create a new linear kernel
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for LinearKernel {
    fn compute(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        x.dot(&y)
    }
}
