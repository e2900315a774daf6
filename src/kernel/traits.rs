//! Kernel trait definition

use ndarray::ArrayView1;

/// Kernel function trait
///
/// A kernel function K(x, y) computes the similarity of two samples in an
/// implicit feature space. Samples are dense feature rows of equal length.
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64;

    /// Optional: compute kernel value using precomputed squared norms
    /// This can be more efficient for some kernels (e.g., RBF)
    fn compute_with_norms(
        &self,
        x: ArrayView1<f64>,
        y: ArrayView1<f64>,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        // Default implementation ignores the norms
        let _ = (x_norm_sq, y_norm_sq);
        self.compute(x, y)
    }
}
