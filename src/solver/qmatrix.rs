//! Q matrices of the SVM dual problems
//!
//! Q(i, j) = sign(i) * sign(j) * K(x[index(i)], x[index(j)]). Classification
//! signs by label, one-class uses all-positive signs, and regression doubles
//! the problem to 2l variables with signs +1 then -1.

use crate::cache::{CacheStats, KernelCache};
use crate::kernel::{Kernel, KernelFunction};
use ndarray::ArrayView2;
use std::sync::Arc;

/// Kernel-backed Q matrix with a row cache
pub struct QMatrix<'a> {
    samples: ArrayView2<'a, f64>,
    kernel: &'a KernelFunction,
    norms: Option<Vec<f64>>,
    sign: Vec<f64>,
    index: Vec<usize>,
    diagonal: Vec<f64>,
    cache: KernelCache,
}

impl<'a> QMatrix<'a> {
    /// Q for C-SVC and ν-SVC with labels `y` in {+1, -1}
    pub fn classification(
        samples: ArrayView2<'a, f64>,
        kernel: &'a KernelFunction,
        y: &[i8],
        cache_bytes: usize,
    ) -> Self {
        let sign = y.iter().map(|&v| f64::from(v)).collect();
        let index = (0..samples.nrows()).collect();
        Self::build(samples, kernel, sign, index, cache_bytes)
    }

    /// Q for the one-class problem
    pub fn one_class(
        samples: ArrayView2<'a, f64>,
        kernel: &'a KernelFunction,
        cache_bytes: usize,
    ) -> Self {
        let n = samples.nrows();
        Self::build(samples, kernel, vec![1.0; n], (0..n).collect(), cache_bytes)
    }

    /// Q for ε-SVR and ν-SVR over 2l variables
    pub fn regression(
        samples: ArrayView2<'a, f64>,
        kernel: &'a KernelFunction,
        cache_bytes: usize,
    ) -> Self {
        let n = samples.nrows();
        let sign = (0..2 * n).map(|k| if k < n { 1.0 } else { -1.0 }).collect();
        let index = (0..2 * n).map(|k| k % n).collect();
        Self::build(samples, kernel, sign, index, cache_bytes)
    }

    fn build(
        samples: ArrayView2<'a, f64>,
        kernel: &'a KernelFunction,
        sign: Vec<f64>,
        index: Vec<usize>,
        cache_bytes: usize,
    ) -> Self {
        let norms = kernel
            .uses_norms()
            .then(|| samples.rows().into_iter().map(|r| r.dot(&r)).collect::<Vec<_>>());

        let diagonal = index
            .iter()
            .map(|&s| {
                let row = samples.row(s);
                match &norms {
                    Some(n) => kernel.compute_with_norms(row, row, n[s], n[s]),
                    None => kernel.compute(row, row),
                }
            })
            .collect();

        Self {
            samples,
            kernel,
            norms,
            sign,
            index,
            diagonal,
            cache: KernelCache::with_memory_limit(cache_bytes, samples.nrows()),
        }
    }

    /// Number of dual variables
    pub fn size(&self) -> usize {
        self.index.len()
    }

    /// Q(i, i) for every variable
    pub fn diagonal(&self) -> &[f64] {
        &self.diagonal
    }

    /// Row i of Q over all variables
    pub fn row(&mut self, i: usize) -> Vec<f64> {
        let kernel_row = self.kernel_row(self.index[i]);
        let si = self.sign[i];
        self.index
            .iter()
            .zip(&self.sign)
            .map(|(&s, &sj)| si * sj * kernel_row[s])
            .collect()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn kernel_row(&mut self, s: usize) -> Arc<[f64]> {
        let QMatrix {
            samples,
            kernel,
            norms,
            cache,
            ..
        } = self;
        cache.get_or_insert_with(s, || {
            compute_kernel_row(samples, kernel, norms.as_deref(), s)
        })
    }
}

fn compute_kernel_row(
    samples: &ArrayView2<f64>,
    kernel: &KernelFunction,
    norms: Option<&[f64]>,
    s: usize,
) -> Vec<f64> {
    let x = samples.row(s);
    samples
        .rows()
        .into_iter()
        .enumerate()
        .map(|(t, y)| match norms {
            Some(n) => kernel.compute_with_norms(x, y, n[s], n[t]),
            None => kernel.compute(x, y),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, SvmParams};
    use ndarray::array;

    fn linear() -> KernelFunction {
        KernelFunction::from_params(&SvmParams {
            kernel_type: KernelType::Linear,
            ..SvmParams::default()
        })
    }

    #[test]
    fn test_classification_signs() {
        let x = array![[1.0, 0.0], [0.0, 2.0], [1.0, 1.0]];
        let kernel = linear();
        let mut q = QMatrix::classification(x.view(), &kernel, &[1, -1, 1], 1 << 20);

        assert_eq!(q.size(), 3);
        assert_eq!(q.diagonal(), &[1.0, 4.0, 2.0]);
        // Q(0, 2) = 1 * 1 * 1 = 1, Q(1, 2) = -1 * 1 * 2 = -2
        assert_eq!(q.row(2), vec![1.0, -2.0, 2.0]);
    }

    #[test]
    fn test_regression_doubles_variables() {
        let x = array![[1.0], [2.0]];
        let kernel = linear();
        let mut q = QMatrix::regression(x.view(), &kernel, 1 << 20);

        assert_eq!(q.size(), 4);
        assert_eq!(q.diagonal(), &[1.0, 4.0, 1.0, 4.0]);
        assert_eq!(q.row(0), vec![1.0, 2.0, -1.0, -2.0]);
        assert_eq!(q.row(3), vec![-2.0, -4.0, 2.0, 4.0]);
    }

    #[test]
    fn test_rows_are_cached() {
        let x = array![[1.0], [2.0], [3.0]];
        let kernel = KernelFunction::from_params(&SvmParams::default());
        let mut q = QMatrix::one_class(x.view(), &kernel, 1 << 20);

        let first = q.row(1);
        let second = q.row(1);
        assert_eq!(first, second);
        assert_eq!(q.cache_stats().hits, 1);
        assert_eq!(q.cache_stats().misses, 1);
        assert!((q.diagonal()[0] - 1.0).abs() < 1e-12);
    }
}
