//! High-level API for Support Vector Machine operations
//!
//! [`Svm`] owns a hyperparameter set and, once trained, the model it
//! produced. Hyperparameters can be changed freely after training; the
//! trained model keeps predicting with the values it was trained with until
//! the next successful training call.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use autosvm::{CrossValidationConfig, LibSvmReader, PredictFlags, StatModel, Svm};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = LibSvmReader::new().load_file("data.libsvm")?;
//!
//! let mut svm = Svm::new();
//! svm.train_auto(&data, &CrossValidationConfig::default())?;
//!
//! let out = svm.calc_error(&data, false)?;
//! println!("Training error: {:.2}%", out.error * 100.0);
//!
//! let first = data.samples().row(0).to_owned();
//! println!("{:?}", svm.predict(&first, PredictFlags::NONE)?);
//! svm.save("model.json")?;
//! # Ok(())
//! # }
//! ```

use crate::autotune::{CrossValidationConfig, GridSearch};
use crate::cache::DEFAULT_CACHE_BYTES;
use crate::core::{
    CalcErrorOutput, KernelType, ParamsUpdate, PredictFlags, PredictInput, Prediction, Result,
    SVMError, SampleLayout, StatModel, SvmParams, SvmType, TermCriteria, TrainFlags,
};
use crate::data::TrainData;
use crate::optimizer::{DecisionFunction, SVMOptimizer, TrainedSVM};
use crate::persistence::SerializableModel;
use crate::solver::SolverConfig;
use log::info;
use ndarray::Array2;
use std::path::Path;

/// Support vector machine with configurable hyperparameters
#[derive(Debug, Clone)]
pub struct Svm {
    params: SvmParams,
    cache_size: usize,
    model: Option<TrainedSVM>,
}

impl Default for Svm {
    fn default() -> Self {
        Self::new()
    }
}

impl Svm {
    /// Create an untrained SVM with default hyperparameters
    pub fn new() -> Self {
        Self::with_params(SvmParams::default())
    }

    /// Create an untrained SVM with the given hyperparameters
    pub fn with_params(params: SvmParams) -> Self {
        Self {
            params,
            cache_size: DEFAULT_CACHE_BYTES,
            model: None,
        }
    }

    /// Set the kernel row cache budget in bytes
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Restore a model saved with [`Svm::save`]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut svm = Self::new();
        svm.load(path)?;
        Ok(svm)
    }

    /// Current hyperparameters
    pub fn params(&self) -> &SvmParams {
        &self.params
    }

    /// Apply the fields present in `update`, keeping the others
    ///
    /// Provided fields are checked against the merged SVM and kernel types
    /// before anything changes; on error the parameters stay as they were.
    pub fn set_params(&mut self, update: &ParamsUpdate) -> Result<()> {
        self.params = self.params.updated(update)?;
        Ok(())
    }

    pub fn get_svm_type(&self) -> SvmType {
        self.params.svm_type
    }

    pub fn set_svm_type(&mut self, svm_type: SvmType) {
        self.params.svm_type = svm_type;
    }

    pub fn get_kernel_type(&self) -> KernelType {
        self.params.kernel_type
    }

    pub fn set_kernel_type(&mut self, kernel_type: KernelType) {
        self.params.kernel_type = kernel_type;
    }

    pub fn get_c(&self) -> f64 {
        self.params.c
    }

    pub fn set_c(&mut self, c: f64) {
        self.params.c = c;
    }

    pub fn get_coef0(&self) -> f64 {
        self.params.coef0
    }

    pub fn set_coef0(&mut self, coef0: f64) {
        self.params.coef0 = coef0;
    }

    pub fn get_degree(&self) -> f64 {
        self.params.degree
    }

    pub fn set_degree(&mut self, degree: f64) {
        self.params.degree = degree;
    }

    pub fn get_gamma(&self) -> f64 {
        self.params.gamma
    }

    pub fn set_gamma(&mut self, gamma: f64) {
        self.params.gamma = gamma;
    }

    pub fn get_nu(&self) -> f64 {
        self.params.nu
    }

    pub fn set_nu(&mut self, nu: f64) {
        self.params.nu = nu;
    }

    pub fn get_p(&self) -> f64 {
        self.params.p
    }

    pub fn set_p(&mut self, p: f64) {
        self.params.p = p;
    }

    pub fn get_class_weights(&self) -> Option<&[f64]> {
        self.params.class_weights.as_deref()
    }

    pub fn set_class_weights(&mut self, weights: Option<Vec<f64>>) {
        self.params.class_weights = weights;
    }

    pub fn get_term_criteria(&self) -> TermCriteria {
        self.params.term_criteria
    }

    pub fn set_term_criteria(&mut self, term_criteria: TermCriteria) {
        self.params.term_criteria = term_criteria;
    }

    fn solver_config(&self, params: &SvmParams) -> SolverConfig {
        SolverConfig::from_term_criteria(&params.term_criteria).with_cache_size(self.cache_size)
    }

    fn fit(&self, params: &SvmParams, data: &TrainData) -> Result<TrainedSVM> {
        SVMOptimizer::new(params.clone(), self.solver_config(params))
            .train(data.train_samples(), data.train_responses())
    }

    /// Train on the train subset of `data` with the current hyperparameters
    ///
    /// Returns whether every solver run converged. A failed call leaves the
    /// previously trained model in place.
    pub fn train(&mut self, data: &TrainData, flags: TrainFlags) -> Result<bool> {
        if flags.contains(TrainFlags::UPDATE_MODEL) {
            return Err(SVMError::UnsupportedOperation(
                "SVM models cannot be updated incrementally".to_string(),
            ));
        }
        let model = self.fit(&self.params, data)?;
        let converged = model.converged();
        self.model = Some(model);
        Ok(converged)
    }

    /// Train on raw matrices; `responses` must be a single row or column
    pub fn train_matrices(
        &mut self,
        samples: Array2<f64>,
        layout: SampleLayout,
        responses: Array2<f64>,
    ) -> Result<bool> {
        let data = TrainData::from_matrices(samples, layout, responses)?;
        self.train(&data, TrainFlags::NONE)
    }

    /// Pick hyperparameters by cross-validated grid search, then train with them
    ///
    /// One-class models have no validation labels to score against and are
    /// trained with the current hyperparameters instead.
    pub fn train_auto(&mut self, data: &TrainData, config: &CrossValidationConfig) -> Result<bool> {
        if config.k_fold < 2 {
            return Err(SVMError::InvalidArgument(format!(
                "k-fold must be at least 2, got {}",
                config.k_fold
            )));
        }
        if self.params.svm_type == SvmType::OneClass {
            info!("ONE_CLASS models are not searched; training with current parameters");
            return self.train(data, TrainFlags::NONE);
        }

        let outcome = GridSearch::new(&self.params, config)
            .with_solver_config(self.solver_config(&self.params))
            .run(data)?;

        let model = self.fit(&outcome.params, data)?;
        let converged = model.converged();
        self.params = outcome.params;
        self.model = Some(model);
        Ok(converged)
    }

    fn trained(&self) -> Result<&TrainedSVM> {
        self.model.as_ref().ok_or(SVMError::NotTrained)
    }

    /// Trained model, if any
    pub fn trained_model(&self) -> Option<&TrainedSVM> {
        self.model.as_ref()
    }

    /// Support vectors; for LINEAR one weight row per decision function
    pub fn support_vectors(&self) -> Result<Array2<f64>> {
        Ok(self.trained()?.support_vectors().clone())
    }

    /// Support vectors as they appeared in the training data
    pub fn uncompressed_support_vectors(&self) -> Result<Array2<f64>> {
        self.trained()?.uncompressed_support_vectors()
    }

    pub fn decision_functions(&self) -> Result<&[DecisionFunction]> {
        Ok(self.trained()?.decision_functions())
    }

    /// Class labels in ascending order (classification models)
    pub fn class_labels(&self) -> Result<&[i32]> {
        Ok(self.trained()?.class_labels())
    }

    /// Write the trained model to `path` as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        SerializableModel::from_trained_model(self.trained()?).save_to_file(path)
    }

    /// Replace this SVM's state with the model stored at `path`
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let model = SerializableModel::load_from_file(path)?.to_trained_model()?;
        self.params = model.params().clone();
        self.model = Some(model);
        Ok(())
    }
}

impl StatModel for Svm {
    fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    fn var_count(&self) -> usize {
        self.model.as_ref().map_or(0, TrainedSVM::var_count)
    }

    fn is_classifier(&self) -> bool {
        let svm_type = self
            .model
            .as_ref()
            .map_or(self.params.svm_type, |m| m.params().svm_type);
        !svm_type.is_regressor()
    }

    fn predict<'a, I>(&self, samples: I, flags: PredictFlags) -> Result<Prediction>
    where
        I: Into<PredictInput<'a>>,
    {
        let model = self.trained()?;
        let input = samples.into();
        if input.n_features() != model.var_count() {
            return Err(SVMError::InvalidArgument(format!(
                "model expects {} features, got {}",
                model.var_count(),
                input.n_features()
            )));
        }

        let raw = flags.contains(PredictFlags::RAW_OUTPUT);
        let outputs: Vec<f64> = (0..input.n_samples())
            .map(|i| model.predict_sample(input.row(i), raw))
            .collect();

        Ok(match outputs.as_slice() {
            [single] => Prediction::Scalar(*single),
            _ => Prediction::Batch(outputs),
        })
    }

    fn calc_error(&self, data: &TrainData, use_test_subset: bool) -> Result<CalcErrorOutput> {
        let model = self.trained()?;
        let (samples, responses) = if use_test_subset {
            (data.test_samples(), data.test_responses())
        } else {
            (data.train_samples(), data.train_responses())
        };
        model.evaluate(samples, responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};
    use tempfile::NamedTempFile;

    fn blobs() -> TrainData {
        let samples = array![
            [1.0, 1.2],
            [1.4, 0.9],
            [0.8, 1.1],
            [1.1, 1.5],
            [-1.0, -1.3],
            [-1.2, -0.8],
            [-0.9, -1.1],
            [-1.5, -1.0]
        ];
        let responses = array![1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0];
        TrainData::new(samples, SampleLayout::Row, responses).expect("valid dataset")
    }

    #[test]
    fn test_set_params_merges() {
        let mut svm = Svm::new();
        svm.set_coef0(0.5);
        svm.set_params(&ParamsUpdate::new().with_c(4.0).with_kernel_type(KernelType::Sigmoid))
            .expect("valid update");

        assert_eq!(svm.get_c(), 4.0);
        assert_eq!(svm.get_kernel_type(), KernelType::Sigmoid);
        assert_eq!(svm.get_coef0(), 0.5);
        assert_eq!(svm.get_gamma(), 1.0);
    }

    #[test]
    fn test_set_params_is_atomic() {
        let mut svm = Svm::new();
        let err = svm
            .set_params(&ParamsUpdate::new().with_gamma(2.0).with_c(-1.0))
            .unwrap_err();
        assert!(matches!(err, SVMError::InvalidArgument(_)));
        assert_eq!(svm.get_gamma(), 1.0);
        assert_eq!(svm.get_c(), 1.0);
    }

    #[test]
    fn test_set_params_ignores_stale_untouched_fields() {
        let mut svm = Svm::new();
        // POLY reads degree, which is still the default 0
        svm.set_kernel_type(KernelType::Poly);
        svm.set_params(&ParamsUpdate::new().with_c(2.0))
            .expect("only C is provided");
        assert_eq!(svm.get_c(), 2.0);

        assert!(matches!(
            svm.set_params(&ParamsUpdate::new().with_degree(0.0)),
            Err(SVMError::InvalidArgument(_))
        ));
        assert!(matches!(
            svm.train(&blobs(), TrainFlags::NONE),
            Err(SVMError::SolverFailure(_))
        ));

        svm.set_params(&ParamsUpdate::new().with_degree(3.0))
            .expect("valid degree");
        assert!(svm.train(&blobs(), TrainFlags::NONE).is_ok());
    }

    #[test]
    fn test_untrained_state() {
        let svm = Svm::new();
        assert!(!svm.is_trained());
        assert_eq!(svm.var_count(), 0);
        assert!(matches!(
            svm.predict(&array![1.0, 2.0], PredictFlags::NONE),
            Err(SVMError::NotTrained)
        ));
        assert!(matches!(svm.support_vectors(), Err(SVMError::NotTrained)));
        assert!(matches!(svm.calc_error(&blobs(), false), Err(SVMError::NotTrained)));
        assert!(matches!(
            svm.save(NamedTempFile::new().unwrap().path()),
            Err(SVMError::NotTrained)
        ));
    }

    #[test]
    fn test_train_and_predict_shapes() {
        let mut svm = Svm::new();
        assert!(svm.train(&blobs(), TrainFlags::NONE).expect("trains"));
        assert!(svm.is_trained());
        assert_eq!(svm.var_count(), 2);
        assert_eq!(svm.class_labels().unwrap(), &[-1, 1]);

        let single = svm.predict(&array![1.0, 1.0], PredictFlags::NONE).unwrap();
        assert_eq!(single, Prediction::Scalar(1.0));

        let one_row = svm.predict(&array![[-1.0, -1.0]], PredictFlags::NONE).unwrap();
        assert_eq!(one_row, Prediction::Scalar(-1.0));

        let batch = svm
            .predict(&array![[1.0, 1.0], [-1.0, -1.0], [1.2, 1.0]], PredictFlags::NONE)
            .unwrap();
        assert_eq!(batch, Prediction::Batch(vec![1.0, -1.0, 1.0]));

        assert!(matches!(
            svm.predict(&array![1.0, 2.0, 3.0], PredictFlags::NONE),
            Err(SVMError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_raw_output() {
        let mut svm = Svm::new();
        svm.train(&blobs(), TrainFlags::NONE).expect("trains");
        let raw = svm
            .predict(&array![-1.0, -1.0], PredictFlags::RAW_OUTPUT)
            .unwrap()
            .as_scalar()
            .expect("scalar");
        // Class -1 is the first class, so its side of the boundary is positive
        assert!(raw > 0.0);
    }

    #[test]
    fn test_update_model_is_unsupported() {
        let mut svm = Svm::new();
        assert!(matches!(
            svm.train(&blobs(), TrainFlags::UPDATE_MODEL),
            Err(SVMError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_failed_train_keeps_previous_model() {
        let mut svm = Svm::new();
        svm.train(&blobs(), TrainFlags::NONE).expect("trains");
        let before = svm.support_vectors().unwrap();

        svm.set_gamma(-1.0);
        assert!(matches!(
            svm.train(&blobs(), TrainFlags::NONE),
            Err(SVMError::SolverFailure(_))
        ));
        assert!(svm.is_trained());
        assert_eq!(svm.support_vectors().unwrap(), before);

        // Prediction keeps using the gamma captured at training time
        assert_eq!(
            svm.predict(&array![1.0, 1.0], PredictFlags::NONE).unwrap(),
            Prediction::Scalar(1.0)
        );
    }

    #[test]
    fn test_train_matrices_column_layout() {
        let mut svm = Svm::new();
        let samples = array![[1.0, 1.2, -1.0, -1.1], [1.0, 0.9, -1.2, -0.8]];
        let responses = array![[0.0, 0.0, 1.0, 1.0]];
        svm.train_matrices(samples, SampleLayout::Col, responses).expect("trains");
        assert_eq!(svm.var_count(), 2);
        assert_eq!(
            svm.predict(&array![-1.0, -1.0], PredictFlags::NONE).unwrap(),
            Prediction::Scalar(1.0)
        );
    }

    #[test]
    fn test_calc_error_subsets() {
        let mut data = blobs();
        let mut svm = Svm::new();
        svm.train(&data, TrainFlags::NONE).expect("trains");

        let out = svm.calc_error(&data, false).unwrap();
        assert_eq!(out.error, 0.0);
        assert_eq!(out.responses.dim(), (8, 1));

        // No test rows
        assert!(matches!(
            svm.calc_error(&data, true),
            Err(SVMError::InvalidArgument(_))
        ));

        data.set_train_test_split(6).unwrap();
        assert_eq!(svm.calc_error(&data, true).unwrap().responses.nrows(), 2);
    }

    #[test]
    fn test_regression_calc_error_is_mse() {
        let samples = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let responses = Array1::from_shape_fn(10, |i| i as f64);
        let data = TrainData::new(samples, SampleLayout::Row, responses).unwrap();

        let mut svm = Svm::with_params(SvmParams {
            svm_type: SvmType::EpsSvr,
            kernel_type: KernelType::Linear,
            c: 10.0,
            p: 0.1,
            ..SvmParams::default()
        });
        svm.train(&data, TrainFlags::NONE).expect("trains");
        assert!(!svm.is_classifier());
        let out = svm.calc_error(&data, false).unwrap();
        assert!(out.error < 0.05, "mse {}", out.error);
    }

    #[test]
    fn test_one_class_train_auto_falls_back() {
        let mut svm = Svm::with_params(SvmParams {
            svm_type: SvmType::OneClass,
            nu: 0.5,
            ..SvmParams::default()
        });
        for k in [0, 1] {
            let config = CrossValidationConfig::new().with_k_fold(k);
            assert!(matches!(
                svm.train_auto(&blobs(), &config),
                Err(SVMError::InvalidArgument(_))
            ));
        }
        assert!(!svm.is_trained());

        let config = CrossValidationConfig::new().with_k_fold(2);
        svm.train_auto(&blobs(), &config).expect("plain training");
        assert!(svm.is_trained());
        assert_eq!(svm.get_nu(), 0.5);
    }

    #[test]
    fn test_save_and_from_file() {
        let mut svm = Svm::new();
        svm.train(&blobs(), TrainFlags::NONE).expect("trains");
        let file = NamedTempFile::new().unwrap();
        svm.save(file.path()).expect("saves");

        let restored = Svm::from_file(file.path()).expect("loads");
        assert_eq!(restored.params(), svm.params());
        assert_eq!(restored.support_vectors().unwrap(), svm.support_vectors().unwrap());
    }
}
