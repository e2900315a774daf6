//! Optimization algorithms for SVM
//!
//! This module turns a dense training set and a hyperparameter set into a
//! [`TrainedSVM`]: it splits the problem into binary sub-problems, runs the
//! SMO solver on each and collects the support vectors and decision
//! functions they produce.

use crate::core::{CalcErrorOutput, KernelType, Result, SVMError, SvmParams, SvmType};
use crate::kernel::{Kernel, KernelFunction};
use crate::solver::{QMatrix, SMOSolver, SolutionInfo, SolverConfig, SolverVariant};
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// One binary sub-model: f(x) = Σ alpha[k] * K(sv[sv_index[k]], x) - rho
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionFunction {
    pub rho: f64,
    pub alpha: Vec<f64>,
    pub sv_index: Vec<usize>,
}

/// High-level SVM optimizer that integrates kernel functions and solving algorithms
pub struct SVMOptimizer {
    params: SvmParams,
    kernel: KernelFunction,
    config: SolverConfig,
}

impl SVMOptimizer {
    /// Create a new SVM optimizer for the given hyperparameters and solver configuration
    pub fn new(params: SvmParams, config: SolverConfig) -> Self {
        let kernel = KernelFunction::from_params(&params);
        Self {
            params,
            kernel,
            config,
        }
    }

    /// Create an optimizer whose solver limits come from the parameters' term criteria
    pub fn with_params(params: SvmParams) -> Self {
        let config = SolverConfig::from_term_criteria(&params.term_criteria);
        Self::new(params, config)
    }

    /// Get the optimizer configuration
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Train on one sample per row of `samples`
    pub fn train(
        &self,
        samples: ArrayView2<f64>,
        responses: ArrayView1<f64>,
    ) -> Result<TrainedSVM> {
        self.params
            .validate()
            .map_err(|e| e.into_solver_failure("invalid training parameters"))?;

        if samples.nrows() == 0 || samples.ncols() == 0 {
            return Err(SVMError::InvalidArgument(
                "training set must contain at least one sample and one feature".to_string(),
            ));
        }
        if responses.len() != samples.nrows() {
            return Err(SVMError::DimensionMismatch {
                expected: samples.nrows(),
                actual: responses.len(),
            });
        }

        info!(
            "Training {} with {} kernel on {} samples x {} features",
            self.params.svm_type,
            self.params.kernel_type,
            samples.nrows(),
            samples.ncols()
        );

        let mut model = if self.params.svm_type.is_classifier() {
            self.train_classification(samples, responses)?
        } else {
            self.train_single(samples, responses)?
        };

        if self.params.kernel_type == KernelType::Linear {
            model.compress_linear();
        }

        info!(
            "Training finished: {} support vectors, {} decision functions, converged={}",
            model.support_vectors.nrows(),
            model.decision_functions.len(),
            model.converged
        );
        Ok(model)
    }

    /// One-class and regression problems: one decision function over all samples
    fn train_single(
        &self,
        samples: ArrayView2<f64>,
        responses: ArrayView1<f64>,
    ) -> Result<TrainedSVM> {
        let (alpha, si) = match self.params.svm_type {
            SvmType::OneClass => self.solve_one_class(samples),
            SvmType::EpsSvr => self.solve_epsilon_svr(samples, responses),
            SvmType::NuSvr => self.solve_nu_svr(samples, responses),
            SvmType::CSvc | SvmType::NuSvc => {
                return Err(SVMError::InvalidArgument(format!(
                    "{} is a classification type",
                    self.params.svm_type
                )))
            }
        };
        log_solution(&si, &alpha);

        let sv_rows: Vec<usize> = nonzero_positions(&alpha);
        let decision = DecisionFunction {
            rho: si.rho,
            alpha: sv_rows.iter().map(|&i| alpha[i]).collect(),
            sv_index: (0..sv_rows.len()).collect(),
        };

        Ok(TrainedSVM {
            params: self.params.clone(),
            kernel: self.kernel.clone(),
            var_count: samples.ncols(),
            class_labels: Vec::new(),
            support_vectors: samples.select(Axis(0), &sv_rows),
            uncompressed_support_vectors: None,
            decision_functions: vec![decision],
            converged: si.converged,
        })
    }

    /// One-vs-one classification over every pair of classes
    fn train_classification(
        &self,
        samples: ArrayView2<f64>,
        responses: ArrayView1<f64>,
    ) -> Result<TrainedSVM> {
        let groups = ClassGroups::from_responses(responses)?;
        let n_classes = groups.labels.len();
        if n_classes < 2 {
            return Err(SVMError::InvalidArgument(format!(
                "{} needs at least two classes, found {}",
                self.params.svm_type, n_classes
            )));
        }

        let weighted_c = self.weighted_c(n_classes)?;
        let n = samples.nrows();
        let mut nonzero = vec![false; n];
        let mut pair_alphas = Vec::with_capacity(n_classes * (n_classes - 1) / 2);
        let mut rhos = Vec::with_capacity(pair_alphas.capacity());
        let mut converged = true;

        for a in 0..n_classes {
            for b in (a + 1)..n_classes {
                let positions: Vec<usize> = groups.range(a).chain(groups.range(b)).collect();
                let rows: Vec<usize> = positions.iter().map(|&p| groups.perm[p]).collect();
                let sub_samples = samples.select(Axis(0), &rows);
                let y: Vec<i8> = std::iter::repeat(1)
                    .take(groups.count[a])
                    .chain(std::iter::repeat(-1).take(groups.count[b]))
                    .collect();

                debug!(
                    "Solving class pair ({}, {}) with {} samples",
                    groups.labels[a],
                    groups.labels[b],
                    rows.len()
                );

                let (alpha, si) = match self.params.svm_type {
                    SvmType::NuSvc => self.solve_nu_svc(sub_samples.view(), &y)?,
                    _ => self.solve_c_svc(sub_samples.view(), &y, weighted_c[a], weighted_c[b]),
                };
                log_solution(&si, &alpha);
                converged &= si.converged;

                for (k, &p) in positions.iter().enumerate() {
                    if alpha[k] != 0.0 {
                        nonzero[p] = true;
                    }
                }
                pair_alphas.push((positions, alpha));
                rhos.push(si.rho);
            }
        }

        // Support vectors in class-grouped order
        let mut sv_of_position = vec![usize::MAX; n];
        let mut sv_rows = Vec::new();
        for (p, &is_sv) in nonzero.iter().enumerate() {
            if is_sv {
                sv_of_position[p] = sv_rows.len();
                sv_rows.push(groups.perm[p]);
            }
        }

        let decision_functions = pair_alphas
            .into_iter()
            .zip(rhos)
            .map(|((positions, alpha), rho)| {
                let (sv_index, coef) = positions
                    .iter()
                    .zip(&alpha)
                    .filter(|(_, &a)| a != 0.0)
                    .map(|(&p, &a)| (sv_of_position[p], a))
                    .unzip();
                DecisionFunction {
                    rho,
                    alpha: coef,
                    sv_index,
                }
            })
            .collect();

        Ok(TrainedSVM {
            params: self.params.clone(),
            kernel: self.kernel.clone(),
            var_count: samples.ncols(),
            class_labels: groups.labels,
            support_vectors: samples.select(Axis(0), &sv_rows),
            uncompressed_support_vectors: None,
            decision_functions,
            converged,
        })
    }

    fn weighted_c(&self, n_classes: usize) -> Result<Vec<f64>> {
        match &self.params.class_weights {
            None => Ok(vec![self.params.c; n_classes]),
            Some(weights) if weights.len() == n_classes => {
                Ok(weights.iter().map(|w| self.params.c * w).collect())
            }
            Some(weights) => Err(SVMError::SolverFailure(format!(
                "{} class weights given for {} classes",
                weights.len(),
                n_classes
            ))),
        }
    }

    fn solve_c_svc(
        &self,
        samples: ArrayView2<f64>,
        y: &[i8],
        cp: f64,
        cn: f64,
    ) -> (Vec<f64>, SolutionInfo) {
        let l = y.len();
        let mut alpha = vec![0.0; l];
        let mut q = QMatrix::classification(
            samples.reborrow(),
            &self.kernel,
            y,
            self.config.cache_size,
        );
        let si = SMOSolver::solve(
            SolverVariant::Standard,
            &mut q,
            &vec![-1.0; l],
            y,
            &mut alpha,
            cp,
            cn,
            &self.config,
        );

        for (a, &yi) in alpha.iter_mut().zip(y) {
            *a *= f64::from(yi);
        }
        (alpha, si)
    }

    fn solve_nu_svc(&self, samples: ArrayView2<f64>, y: &[i8]) -> Result<(Vec<f64>, SolutionInfo)> {
        let l = y.len();
        let nu = self.params.nu;
        let n_pos = y.iter().filter(|&&v| v == 1).count();
        let n_neg = l - n_pos;
        if nu * l as f64 / 2.0 > n_pos.min(n_neg) as f64 {
            return Err(SVMError::SolverFailure(format!(
                "nu = {nu} is infeasible for a class pair of sizes {n_pos} and {n_neg}"
            )));
        }

        let mut alpha = vec![0.0; l];
        let mut sum_pos = nu * l as f64 / 2.0;
        let mut sum_neg = nu * l as f64 / 2.0;
        for (a, &yi) in alpha.iter_mut().zip(y) {
            let remaining = if yi == 1 { &mut sum_pos } else { &mut sum_neg };
            *a = remaining.min(1.0);
            *remaining -= *a;
        }

        let mut q = QMatrix::classification(
            samples.reborrow(),
            &self.kernel,
            y,
            self.config.cache_size,
        );
        let mut si = SMOSolver::solve(
            SolverVariant::Nu,
            &mut q,
            &vec![0.0; l],
            y,
            &mut alpha,
            1.0,
            1.0,
            &self.config,
        );

        let r = si.r;
        if !(r.abs() > f64::EPSILON) {
            return Err(SVMError::SolverFailure(
                "nu-SVC produced a degenerate margin".to_string(),
            ));
        }
        for (a, &yi) in alpha.iter_mut().zip(y) {
            *a *= f64::from(yi) / r;
        }
        si.rho /= r;
        si.obj /= r * r;
        si.upper_bound_p = 1.0 / r;
        si.upper_bound_n = 1.0 / r;
        Ok((alpha, si))
    }

    fn solve_one_class(&self, samples: ArrayView2<f64>) -> (Vec<f64>, SolutionInfo) {
        let l = samples.nrows();
        let bound = self.params.nu * l as f64;
        let n = bound as usize;

        let mut alpha = vec![0.0; l];
        for a in alpha.iter_mut().take(n.min(l)) {
            *a = 1.0;
        }
        if n < l {
            alpha[n] = bound - n as f64;
        }

        let y = vec![1i8; l];
        let mut q =
            QMatrix::one_class(samples.reborrow(), &self.kernel, self.config.cache_size);
        let si = SMOSolver::solve(
            SolverVariant::Standard,
            &mut q,
            &vec![0.0; l],
            &y,
            &mut alpha,
            1.0,
            1.0,
            &self.config,
        );
        (alpha, si)
    }

    fn solve_epsilon_svr(
        &self,
        samples: ArrayView2<f64>,
        responses: ArrayView1<f64>,
    ) -> (Vec<f64>, SolutionInfo) {
        let l = samples.nrows();
        let p = self.params.p;
        let linear_term: Vec<f64> = responses
            .iter()
            .map(|&t| p - t)
            .chain(responses.iter().map(|&t| p + t))
            .collect();
        let y = svr_signs(l);

        let mut alpha2 = vec![0.0; 2 * l];
        let mut q =
            QMatrix::regression(samples.reborrow(), &self.kernel, self.config.cache_size);
        let si = SMOSolver::solve(
            SolverVariant::Standard,
            &mut q,
            &linear_term,
            &y,
            &mut alpha2,
            self.params.c,
            self.params.c,
            &self.config,
        );
        (fold_svr_alpha(&alpha2), si)
    }

    fn solve_nu_svr(
        &self,
        samples: ArrayView2<f64>,
        responses: ArrayView1<f64>,
    ) -> (Vec<f64>, SolutionInfo) {
        let l = samples.nrows();
        let c = self.params.c;

        let mut alpha2 = vec![0.0; 2 * l];
        let mut sum = c * self.params.nu * l as f64 / 2.0;
        for i in 0..l {
            let a = sum.min(c);
            alpha2[i] = a;
            alpha2[i + l] = a;
            sum -= a;
        }

        let linear_term: Vec<f64> = responses
            .iter()
            .map(|&t| -t)
            .chain(responses.iter().copied())
            .collect();
        let y = svr_signs(l);

        let mut q =
            QMatrix::regression(samples.reborrow(), &self.kernel, self.config.cache_size);
        let si = SMOSolver::solve(
            SolverVariant::Nu,
            &mut q,
            &linear_term,
            &y,
            &mut alpha2,
            c,
            c,
            &self.config,
        );
        (fold_svr_alpha(&alpha2), si)
    }
}

fn svr_signs(l: usize) -> Vec<i8> {
    std::iter::repeat(1)
        .take(l)
        .chain(std::iter::repeat(-1).take(l))
        .collect()
}

fn fold_svr_alpha(alpha2: &[f64]) -> Vec<f64> {
    let l = alpha2.len() / 2;
    (0..l).map(|i| alpha2[i] - alpha2[i + l]).collect()
}

fn nonzero_positions(alpha: &[f64]) -> Vec<usize> {
    alpha
        .iter()
        .enumerate()
        .filter(|(_, &a)| a != 0.0)
        .map(|(i, _)| i)
        .collect()
}

fn log_solution(si: &SolutionInfo, alpha: &[f64]) {
    let n_sv = alpha.iter().filter(|&&a| a != 0.0).count();
    let n_bsv = alpha
        .iter()
        .filter(|&&a| (a > 0.0 && a >= si.upper_bound_p) || (a < 0.0 && -a >= si.upper_bound_n))
        .count();
    debug!(
        "obj = {:.6}, rho = {:.6}, nSV = {}, nBSV = {}",
        si.obj, si.rho, n_sv, n_bsv
    );
}

/// Samples grouped by class in ascending label order
struct ClassGroups {
    labels: Vec<i32>,
    start: Vec<usize>,
    count: Vec<usize>,
    /// Row indices ordered by class, original order within a class
    perm: Vec<usize>,
}

impl ClassGroups {
    fn from_responses(responses: ArrayView1<f64>) -> Result<Self> {
        let mut labels = Vec::with_capacity(responses.len());
        for &r in responses.iter() {
            labels.push(class_label(r)?);
        }

        let mut distinct = labels.clone();
        distinct.sort_unstable();
        distinct.dedup();

        let mut count = vec![0usize; distinct.len()];
        let class_of: Vec<usize> = labels
            .iter()
            .map(|l| {
                let k = distinct.partition_point(|d| d < l);
                count[k] += 1;
                k
            })
            .collect();

        let mut start = vec![0usize; distinct.len()];
        for k in 1..distinct.len() {
            start[k] = start[k - 1] + count[k - 1];
        }

        let mut next = start.clone();
        let mut perm = vec![0usize; labels.len()];
        for (row, &k) in class_of.iter().enumerate() {
            perm[next[k]] = row;
            next[k] += 1;
        }

        Ok(Self {
            labels: distinct,
            start,
            count,
            perm,
        })
    }

    fn range(&self, class: usize) -> std::ops::Range<usize> {
        self.start[class]..self.start[class] + self.count[class]
    }
}

/// Convert a classification response to an integer class label
pub(crate) fn class_label(response: f64) -> Result<i32> {
    if response.fract() != 0.0 || response < i32::MIN as f64 || response > i32::MAX as f64 {
        return Err(SVMError::InvalidArgument(format!(
            "classification responses must be integral class labels, got {response}"
        )));
    }
    Ok(response as i32)
}

/// A trained SVM model that can make predictions
#[derive(Debug, Clone)]
pub struct TrainedSVM {
    params: SvmParams,
    kernel: KernelFunction,
    var_count: usize,
    class_labels: Vec<i32>,
    support_vectors: Array2<f64>,
    uncompressed_support_vectors: Option<Array2<f64>>,
    decision_functions: Vec<DecisionFunction>,
    converged: bool,
}

impl TrainedSVM {
    /// Reassemble a model from its persisted parts
    pub(crate) fn from_parts(
        params: SvmParams,
        var_count: usize,
        class_labels: Vec<i32>,
        support_vectors: Array2<f64>,
        uncompressed_support_vectors: Option<Array2<f64>>,
        decision_functions: Vec<DecisionFunction>,
    ) -> Result<Self> {
        let expected_functions = if params.svm_type.is_classifier() {
            if class_labels.len() < 2 {
                return Err(SVMError::FormatError(format!(
                    "classifier needs at least two class labels, found {}",
                    class_labels.len()
                )));
            }
            class_labels.len() * (class_labels.len() - 1) / 2
        } else {
            1
        };
        if decision_functions.len() != expected_functions {
            return Err(SVMError::FormatError(format!(
                "expected {} decision functions, found {}",
                expected_functions,
                decision_functions.len()
            )));
        }
        if support_vectors.ncols() != var_count && support_vectors.nrows() > 0 {
            return Err(SVMError::FormatError(format!(
                "support vectors have {} features, model declares {}",
                support_vectors.ncols(),
                var_count
            )));
        }
        if let Some(u) = &uncompressed_support_vectors {
            if u.ncols() != var_count && u.nrows() > 0 {
                return Err(SVMError::FormatError(format!(
                    "uncompressed support vectors have {} features, model declares {}",
                    u.ncols(),
                    var_count
                )));
            }
        }
        for df in &decision_functions {
            if df.alpha.len() != df.sv_index.len() {
                return Err(SVMError::FormatError(
                    "decision function alpha and sv_index lengths differ".to_string(),
                ));
            }
            if let Some(&bad) = df.sv_index.iter().find(|&&i| i >= support_vectors.nrows()) {
                return Err(SVMError::FormatError(format!(
                    "decision function references support vector {} of {}",
                    bad,
                    support_vectors.nrows()
                )));
            }
        }

        Ok(Self {
            kernel: KernelFunction::from_params(&params),
            params,
            var_count,
            class_labels,
            support_vectors,
            uncompressed_support_vectors,
            decision_functions,
            converged: true,
        })
    }

    /// Collapse each linear decision function into a single weight row
    fn compress_linear(&mut self) {
        let mut weights = Array2::zeros((self.decision_functions.len(), self.var_count));
        for (d, df) in self.decision_functions.iter_mut().enumerate() {
            let mut w = weights.row_mut(d);
            for (&a, &s) in df.alpha.iter().zip(&df.sv_index) {
                w.scaled_add(a, &self.support_vectors.row(s));
            }
            df.alpha = vec![1.0];
            df.sv_index = vec![d];
        }
        let uncompressed = std::mem::replace(&mut self.support_vectors, weights);
        self.uncompressed_support_vectors = Some(uncompressed);
    }

    /// Hyperparameters captured at training time
    pub fn params(&self) -> &SvmParams {
        &self.params
    }

    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// Class labels in ascending order (empty for one-class and regression models)
    pub fn class_labels(&self) -> &[i32] {
        &self.class_labels
    }

    /// Support vectors as stored; one weight row per decision function for LINEAR
    pub fn support_vectors(&self) -> &Array2<f64> {
        &self.support_vectors
    }

    /// Original support rows, if known
    pub fn uncompressed_support_vectors(&self) -> Result<Array2<f64>> {
        match &self.uncompressed_support_vectors {
            Some(rows) => Ok(rows.clone()),
            None if self.params.kernel_type == KernelType::Linear => {
                Err(SVMError::UnsupportedOperation(
                    "this model was stored without its uncompressed support vectors".to_string(),
                ))
            }
            None => Ok(self.support_vectors.clone()),
        }
    }

    pub(crate) fn stored_uncompressed_support_vectors(&self) -> Option<&Array2<f64>> {
        self.uncompressed_support_vectors.as_ref()
    }

    pub fn decision_functions(&self) -> &[DecisionFunction] {
        &self.decision_functions
    }

    /// Whether every solver run met its tolerance within the iteration cap
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Values of every decision function at `x`
    pub fn decision_values(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let kernel_values: Vec<f64> = self
            .support_vectors
            .rows()
            .into_iter()
            .map(|sv| self.kernel.compute(sv, x))
            .collect();

        self.decision_functions
            .iter()
            .map(|df| {
                df.alpha
                    .iter()
                    .zip(&df.sv_index)
                    .map(|(a, &s)| a * kernel_values[s])
                    .sum::<f64>()
                    - df.rho
            })
            .collect()
    }

    /// Predict one sample; `raw` returns the decision value where one exists
    pub fn predict_sample(&self, x: ArrayView1<f64>, raw: bool) -> f64 {
        let values = self.decision_values(x);
        match self.params.svm_type {
            SvmType::CSvc | SvmType::NuSvc => {
                let n_classes = self.class_labels.len();
                if raw && n_classes == 2 {
                    return values[0];
                }
                let mut votes = vec![0usize; n_classes];
                let mut k = 0;
                for a in 0..n_classes {
                    for b in (a + 1)..n_classes {
                        if values[k] > 0.0 {
                            votes[a] += 1;
                        } else {
                            votes[b] += 1;
                        }
                        k += 1;
                    }
                }
                let mut best = 0;
                for (c, &v) in votes.iter().enumerate().skip(1) {
                    if v > votes[best] {
                        best = c;
                    }
                }
                f64::from(self.class_labels[best])
            }
            SvmType::OneClass => {
                if raw {
                    values[0]
                } else if values[0] > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            SvmType::EpsSvr | SvmType::NuSvr => values[0],
        }
    }
}

impl TrainedSVM {
    /// Score predictions on `samples` against `responses`
    ///
    /// Classifiers and one-class models report the misclassified fraction,
    /// regressors the mean squared error.
    pub fn evaluate(
        &self,
        samples: ArrayView2<f64>,
        responses: ArrayView1<f64>,
    ) -> Result<CalcErrorOutput> {
        if samples.nrows() == 0 {
            return Err(SVMError::InvalidArgument(
                "cannot compute the error of an empty subset".to_string(),
            ));
        }
        if samples.ncols() != self.var_count {
            return Err(SVMError::DimensionMismatch {
                expected: self.var_count,
                actual: samples.ncols(),
            });
        }
        if responses.len() != samples.nrows() {
            return Err(SVMError::DimensionMismatch {
                expected: samples.nrows(),
                actual: responses.len(),
            });
        }

        let predictions: Array1<f64> = samples
            .rows()
            .into_iter()
            .map(|row| self.predict_sample(row, false))
            .collect();

        let n = predictions.len() as f64;
        let error = if self.params.svm_type.is_regressor() {
            predictions
                .iter()
                .zip(responses.iter())
                .map(|(p, r)| (p - r) * (p - r))
                .sum::<f64>()
                / n
        } else {
            predictions
                .iter()
                .zip(responses.iter())
                .filter(|(p, r)| p != r)
                .count() as f64
                / n
        };

        let responses = predictions.insert_axis(Axis(1));
        Ok(CalcErrorOutput { error, responses })
    }
}
