//! Core traits for SVM implementation

use crate::core::{CalcErrorOutput, PredictFlags, Prediction, Result};
use crate::data::TrainData;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Samples accepted by `predict`: one feature vector or a batch with one sample per row
#[derive(Debug, Clone)]
pub enum PredictInput<'a> {
    Vector(ArrayView1<'a, f64>),
    Matrix(ArrayView2<'a, f64>),
}

impl<'a> PredictInput<'a> {
    /// Number of samples
    pub fn n_samples(&self) -> usize {
        match self {
            PredictInput::Vector(_) => 1,
            PredictInput::Matrix(m) => m.nrows(),
        }
    }

    /// Number of features per sample
    pub fn n_features(&self) -> usize {
        match self {
            PredictInput::Vector(v) => v.len(),
            PredictInput::Matrix(m) => m.ncols(),
        }
    }

    /// Borrow the i-th sample
    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        match self {
            PredictInput::Vector(v) => v.view(),
            PredictInput::Matrix(m) => m.row(i),
        }
    }
}

impl<'a> From<ArrayView1<'a, f64>> for PredictInput<'a> {
    fn from(view: ArrayView1<'a, f64>) -> Self {
        PredictInput::Vector(view)
    }
}

impl<'a> From<&'a Array1<f64>> for PredictInput<'a> {
    fn from(array: &'a Array1<f64>) -> Self {
        PredictInput::Vector(array.view())
    }
}

impl<'a> From<&'a [f64]> for PredictInput<'a> {
    fn from(slice: &'a [f64]) -> Self {
        PredictInput::Vector(ArrayView1::from(slice))
    }
}

impl<'a> From<ArrayView2<'a, f64>> for PredictInput<'a> {
    fn from(view: ArrayView2<'a, f64>) -> Self {
        PredictInput::Matrix(view)
    }
}

impl<'a> From<&'a Array2<f64>> for PredictInput<'a> {
    fn from(array: &'a Array2<f64>) -> Self {
        PredictInput::Matrix(array.view())
    }
}

/// Trained statistical model interface
pub trait StatModel {
    /// Whether a training call has succeeded
    fn is_trained(&self) -> bool;

    /// Number of input features seen at training time (0 before training)
    fn var_count(&self) -> usize;

    /// Whether the model predicts class labels
    fn is_classifier(&self) -> bool;

    /// Predict one sample or a batch of samples
    fn predict<'a, I>(&self, samples: I, flags: PredictFlags) -> Result<Prediction>
    where
        I: Into<PredictInput<'a>>;

    /// Evaluate the model on the train or test subset of a dataset
    fn calc_error(&self, data: &TrainData, use_test_subset: bool) -> Result<CalcErrorOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_predict_input_shapes() {
        let v = array![1.0, 2.0, 3.0];
        let input: PredictInput = (&v).into();
        assert_eq!(input.n_samples(), 1);
        assert_eq!(input.n_features(), 3);
        assert_eq!(input.row(0)[2], 3.0);

        let m = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let input: PredictInput = (&m).into();
        assert_eq!(input.n_samples(), 3);
        assert_eq!(input.n_features(), 2);
        assert_eq!(input.row(1)[0], 3.0);

        let slice: &[f64] = &[0.5, 0.25];
        let input: PredictInput = slice.into();
        assert_eq!(input.n_features(), 2);
    }
}
