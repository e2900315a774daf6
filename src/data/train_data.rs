//! In-memory training dataset
//!
//! Samples are stored one per row regardless of the declared layout. The
//! first `train_count` rows form the train subset and the remaining rows the
//! test subset.

use crate::core::{Result, SVMError, SampleLayout};
use crate::optimizer::class_label;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Seed of the permutation applied before plain folds are cut
pub const FOLD_SHUFFLE_SEED: u64 = 42;

/// Index sets of one cross-validation fold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    /// Rows used to fit the candidate model
    pub train: Vec<usize>,
    /// Held-out rows used to score it
    pub test: Vec<usize>,
}

/// Samples, responses and a train/test split
#[derive(Debug, Clone)]
pub struct TrainData {
    samples: Array2<f64>,
    responses: Array1<f64>,
    layout: SampleLayout,
    train_count: usize,
}

impl TrainData {
    /// Create a dataset; with `SampleLayout::Col` each column of `samples` is one sample
    pub fn new(samples: Array2<f64>, layout: SampleLayout, responses: Array1<f64>) -> Result<Self> {
        let samples = match layout {
            SampleLayout::Row => samples,
            SampleLayout::Col => samples.reversed_axes().as_standard_layout().into_owned(),
        };

        if samples.nrows() == 0 || samples.ncols() == 0 {
            return Err(SVMError::InvalidArgument(format!(
                "samples must be non-empty, got {} samples x {} features",
                samples.nrows(),
                samples.ncols()
            )));
        }
        if responses.len() != samples.nrows() {
            return Err(SVMError::InvalidArgument(format!(
                "{} responses given for {} samples",
                responses.len(),
                samples.nrows()
            )));
        }
        if samples.iter().chain(responses.iter()).any(|v| !v.is_finite()) {
            return Err(SVMError::InvalidArgument(
                "samples and responses must be finite".to_string(),
            ));
        }

        let train_count = samples.nrows();
        Ok(Self {
            samples,
            responses,
            layout,
            train_count,
        })
    }

    /// Create a dataset from a responses matrix that is a single row or column
    pub fn from_matrices(
        samples: Array2<f64>,
        layout: SampleLayout,
        responses: Array2<f64>,
    ) -> Result<Self> {
        let (rows, cols) = responses.dim();
        if rows != 1 && cols != 1 {
            return Err(SVMError::InvalidArgument(format!(
                "responses must be a row or column vector, got a {rows}x{cols} matrix"
            )));
        }
        let responses: Array1<f64> = responses.iter().copied().collect();
        Self::new(samples, layout, responses)
    }

    pub fn n_samples(&self) -> usize {
        self.samples.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.samples.ncols()
    }

    /// Layout the samples were supplied in
    pub fn layout(&self) -> SampleLayout {
        self.layout
    }

    /// All samples, one per row
    pub fn samples(&self) -> ArrayView2<f64> {
        self.samples.view()
    }

    pub fn responses(&self) -> ArrayView1<f64> {
        self.responses.view()
    }

    /// Samples in their declared layout, with responses and that layout
    pub fn as_matrices(&self) -> (ArrayView2<f64>, ArrayView1<f64>, SampleLayout) {
        let samples = match self.layout {
            SampleLayout::Row => self.samples.view(),
            SampleLayout::Col => self.samples.t(),
        };
        (samples, self.responses.view(), self.layout)
    }

    /// Use the first `train_count` rows for training and the rest for testing
    pub fn set_train_test_split(&mut self, train_count: usize) -> Result<()> {
        if train_count == 0 || train_count > self.n_samples() {
            return Err(SVMError::InvalidArgument(format!(
                "train count must be in 1..={}, got {}",
                self.n_samples(),
                train_count
            )));
        }
        self.train_count = train_count;
        Ok(())
    }

    /// Use the leading `ratio` share of rows for training
    pub fn set_train_test_split_ratio(&mut self, ratio: f64) -> Result<()> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(SVMError::InvalidArgument(format!(
                "train ratio must be in (0, 1], got {ratio}"
            )));
        }
        let count = ((self.n_samples() as f64) * ratio).round() as usize;
        self.set_train_test_split(count.clamp(1, self.n_samples()))
    }

    pub fn train_count(&self) -> usize {
        self.train_count
    }

    pub fn test_count(&self) -> usize {
        self.n_samples() - self.train_count
    }

    pub fn train_samples(&self) -> ArrayView2<f64> {
        self.samples.slice(s![..self.train_count, ..])
    }

    pub fn train_responses(&self) -> ArrayView1<f64> {
        self.responses.slice(s![..self.train_count])
    }

    pub fn test_samples(&self) -> ArrayView2<f64> {
        self.samples.slice(s![self.train_count.., ..])
    }

    pub fn test_responses(&self) -> ArrayView1<f64> {
        self.responses.slice(s![self.train_count..])
    }

    /// New dataset holding the given rows, all in the train subset
    pub fn subset(&self, indices: &[usize]) -> Result<TrainData> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_samples()) {
            return Err(SVMError::InvalidArgument(format!(
                "row {} out of range for {} samples",
                bad,
                self.n_samples()
            )));
        }
        TrainData::new(
            self.samples.select(Axis(0), indices),
            SampleLayout::Row,
            self.responses.select(Axis(0), indices),
        )
    }

    /// Split the train subset into `k` folds
    ///
    /// Plain folds cut a seeded shuffle of the train rows into blocks whose
    /// sizes differ by at most one, with the remainder going to the earliest
    /// folds; the same data always yields the same folds. Balanced folds deal
    /// the members of each class (ascending label order, rows in order)
    /// round-robin, continuing the fold cursor from one class to the next.
    pub fn partition_into_folds(&self, k: usize, balanced: bool) -> Result<Vec<Fold>> {
        let n = self.train_count;
        if k < 2 {
            return Err(SVMError::InvalidArgument(format!(
                "k-fold must be at least 2, got {k}"
            )));
        }
        if n < k {
            return Err(SVMError::InvalidArgument(format!(
                "cannot split {n} training samples into {k} non-empty folds"
            )));
        }

        let tests = if balanced {
            self.balanced_test_sets(k)?
        } else {
            shuffled_test_sets(n, k)
        };

        Ok(tests
            .into_iter()
            .map(|test| {
                let mut held_out = vec![false; n];
                for &i in &test {
                    held_out[i] = true;
                }
                let train = (0..n).filter(|&i| !held_out[i]).collect();
                Fold { train, test }
            })
            .collect())
    }

    fn balanced_test_sets(&self, k: usize) -> Result<Vec<Vec<usize>>> {
        let mut members: Vec<(i32, usize)> = Vec::with_capacity(self.train_count);
        for (i, &r) in self.train_responses().iter().enumerate() {
            members.push((class_label(r)?, i));
        }
        // Stable: rows keep their order inside a class
        members.sort_by_key(|&(label, _)| label);

        let mut start = 0;
        while start < members.len() {
            let label = members[start].0;
            let size = members[start..]
                .iter()
                .take_while(|&&(l, _)| l == label)
                .count();
            if size < k {
                return Err(SVMError::InvalidArgument(format!(
                    "class {label} has {size} samples, fewer than {k} folds"
                )));
            }
            start += size;
        }

        let mut tests = vec![Vec::new(); k];
        for (cursor, &(_, row)) in members.iter().enumerate() {
            tests[cursor % k].push(row);
        }
        for test in &mut tests {
            test.sort_unstable();
        }
        Ok(tests)
    }
}

fn shuffled_test_sets(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(FOLD_SHUFFLE_SEED);
    order.shuffle(&mut rng);

    let base = n / k;
    let remainder = n % k;
    let mut start = 0;
    (0..k)
        .map(|f| {
            let size = base + usize::from(f < remainder);
            let mut test = order[start..start + size].to_vec();
            test.sort_unstable();
            start += size;
            test
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sequential(n: usize) -> TrainData {
        let samples = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64);
        let responses = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        TrainData::new(samples, SampleLayout::Row, responses).expect("valid dataset")
    }

    #[test]
    fn test_column_layout_is_transposed() {
        // Three samples with two features each, one per column
        let samples = array![[1.0, 2.0, 3.0], [10.0, 20.0, 30.0]];
        let data = TrainData::new(samples.clone(), SampleLayout::Col, array![0.0, 1.0, 0.0])
            .expect("valid dataset");

        assert_eq!(data.n_samples(), 3);
        assert_eq!(data.n_features(), 2);
        assert_eq!(data.samples().row(1).to_vec(), vec![2.0, 20.0]);

        let (view, _, layout) = data.as_matrices();
        assert_eq!(layout, SampleLayout::Col);
        assert_eq!(view, samples.view());
    }

    #[test]
    fn test_rejects_bad_input() {
        let samples = array![[1.0], [2.0]];
        assert!(TrainData::new(samples.clone(), SampleLayout::Row, array![1.0]).is_err());
        assert!(TrainData::new(
            Array2::zeros((0, 3)),
            SampleLayout::Row,
            Array1::zeros(0)
        )
        .is_err());
        assert!(
            TrainData::new(array![[f64::NAN], [1.0]], SampleLayout::Row, array![0.0, 1.0])
                .is_err()
        );
        assert!(TrainData::from_matrices(samples, SampleLayout::Row, Array2::zeros((2, 2)))
            .is_err());
    }

    #[test]
    fn test_from_matrices_accepts_row_or_column_responses() {
        let samples = array![[1.0], [2.0]];
        let column = TrainData::from_matrices(samples.clone(), SampleLayout::Row, array![[0.0], [1.0]])
            .expect("column responses");
        let row = TrainData::from_matrices(samples, SampleLayout::Row, array![[0.0, 1.0]])
            .expect("row responses");
        assert_eq!(column.responses(), row.responses());
    }

    #[test]
    fn test_train_test_split() {
        let mut data = sequential(10);
        assert_eq!(data.train_count(), 10);
        assert_eq!(data.test_count(), 0);

        data.set_train_test_split_ratio(0.8).expect("valid ratio");
        assert_eq!(data.train_count(), 8);
        assert_eq!(data.test_samples().nrows(), 2);
        assert_eq!(data.test_samples()[[0, 0]], 16.0);
        assert_eq!(data.train_responses().len(), 8);

        assert!(data.set_train_test_split(0).is_err());
        assert!(data.set_train_test_split(11).is_err());
        assert!(data.set_train_test_split_ratio(1.5).is_err());
    }

    #[test]
    fn test_plain_folds_partition_shuffled_rows() {
        let data = sequential(10);
        let folds = data.partition_into_folds(3, false).expect("valid folds");

        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);

        let mut all: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
        for fold in &folds {
            assert!(fold.test.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(fold.train.len() + fold.test.len(), 10);
            assert!(fold.train.iter().all(|i| !fold.test.contains(i)));
        }

        // Seeded, so repeated calls agree
        assert_eq!(folds, data.partition_into_folds(3, false).expect("valid folds"));
    }

    #[test]
    fn test_plain_folds_mix_label_sorted_rows() {
        let samples = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let responses = Array1::from_shape_fn(20, |i| if i < 10 { 0.0 } else { 1.0 });
        let data = TrainData::new(samples, SampleLayout::Row, responses).expect("valid");

        let folds = data.partition_into_folds(2, false).expect("valid folds");
        for fold in &folds {
            assert!(fold.train.iter().any(|&i| i < 10));
            assert!(fold.train.iter().any(|&i| i >= 10));
        }
    }

    #[test]
    fn test_balanced_folds_deal_round_robin() {
        let samples = Array2::zeros((7, 1));
        let responses = array![1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let data = TrainData::new(samples, SampleLayout::Row, responses).expect("valid");

        let folds = data.partition_into_folds(3, true).expect("valid folds");
        // Class 0 rows 1, 3, 5 then class 1 rows 0, 2, 4, 6 with the cursor carried over
        assert_eq!(folds[0].test, vec![0, 1, 6]);
        assert_eq!(folds[1].test, vec![2, 3]);
        assert_eq!(folds[2].test, vec![4, 5]);
    }

    #[test]
    fn test_fold_errors() {
        let data = sequential(4);
        assert!(data.partition_into_folds(1, false).is_err());
        assert!(data.partition_into_folds(5, false).is_err());
        // Each class has two members
        assert!(data.partition_into_folds(3, true).is_err());
    }

    #[test]
    fn test_folds_only_cover_train_subset() {
        let mut data = sequential(12);
        data.set_train_test_split(9).expect("valid split");
        let folds = data.partition_into_folds(3, false).expect("valid folds");
        assert!(folds.iter().all(|f| f.test.iter().chain(&f.train).all(|&i| i < 9)));
    }

    #[test]
    fn test_subset() {
        let data = sequential(6);
        let sub = data.subset(&[4, 1]).expect("valid rows");
        assert_eq!(sub.n_samples(), 2);
        assert_eq!(sub.samples().row(0).to_vec(), vec![8.0, 9.0]);
        assert_eq!(sub.responses().to_vec(), vec![0.0, 1.0]);
        assert!(data.subset(&[6]).is_err());
    }
}
