//! Cross-validated grid search over SVM hyperparameters
//!
//! Every combination of grid values is scored by k-fold cross-validation on
//! the train subset of a dataset; the combination with the lowest mean fold
//! error wins, and ties go to the combination enumerated first.

pub mod grid;

pub use self::grid::*;

use crate::core::{ParamId, Result, SVMError, SvmParams};
use crate::data::{Fold, TrainData};
use crate::optimizer::SVMOptimizer;
use crate::solver::SolverConfig;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Settings of `train_auto`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationConfig {
    pub k_fold: usize,
    pub c_grid: ParamGrid,
    pub gamma_grid: ParamGrid,
    pub p_grid: ParamGrid,
    pub nu_grid: ParamGrid,
    pub coef_grid: ParamGrid,
    pub degree_grid: ParamGrid,
    /// Stratify folds by class (classification only)
    pub balanced: bool,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            k_fold: 10,
            c_grid: ParamGrid::default_for(ParamId::C),
            gamma_grid: ParamGrid::default_for(ParamId::Gamma),
            p_grid: ParamGrid::default_for(ParamId::P),
            nu_grid: ParamGrid::default_for(ParamId::Nu),
            coef_grid: ParamGrid::default_for(ParamId::Coef),
            degree_grid: ParamGrid::default_for(ParamId::Degree),
            balanced: false,
        }
    }
}

impl CrossValidationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_k_fold(mut self, k_fold: usize) -> Self {
        self.k_fold = k_fold;
        self
    }

    pub fn with_balanced(mut self, balanced: bool) -> Self {
        self.balanced = balanced;
        self
    }

    /// Replace the grid searched for `id`
    pub fn with_grid(mut self, id: ParamId, grid: ParamGrid) -> Self {
        *self.grid_mut(id) = grid;
        self
    }

    /// Pin every dimension at the given parameters' values
    pub fn with_fixed_params(mut self, params: &SvmParams) -> Self {
        for id in ParamId::ALL {
            *self.grid_mut(id) = ParamGrid::fixed(params.get(id));
        }
        self
    }

    pub fn grid(&self, id: ParamId) -> &ParamGrid {
        match id {
            ParamId::C => &self.c_grid,
            ParamId::Gamma => &self.gamma_grid,
            ParamId::P => &self.p_grid,
            ParamId::Nu => &self.nu_grid,
            ParamId::Coef => &self.coef_grid,
            ParamId::Degree => &self.degree_grid,
        }
    }

    fn grid_mut(&mut self, id: ParamId) -> &mut ParamGrid {
        match id {
            ParamId::C => &mut self.c_grid,
            ParamId::Gamma => &mut self.gamma_grid,
            ParamId::P => &mut self.p_grid,
            ParamId::Nu => &mut self.nu_grid,
            ParamId::Coef => &mut self.coef_grid,
            ParamId::Degree => &mut self.degree_grid,
        }
    }
}

/// Best combination found by a search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub params: SvmParams,
    /// Mean cross-validated error of `params`
    pub error: f64,
    /// Number of combinations scored
    pub evaluated: usize,
}

/// Grid search engine bound to a base parameter set
pub struct GridSearch<'a> {
    base: &'a SvmParams,
    config: &'a CrossValidationConfig,
    solver: SolverConfig,
}

impl<'a> GridSearch<'a> {
    pub fn new(base: &'a SvmParams, config: &'a CrossValidationConfig) -> Self {
        Self {
            base,
            config,
            solver: SolverConfig::from_term_criteria(&base.term_criteria),
        }
    }

    /// Override the solver settings used for every fold
    pub fn with_solver_config(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Values searched per dimension in enumeration order
    ///
    /// Dimensions the SVM and kernel types never read keep the base value.
    pub fn axes(&self) -> Result<Vec<(ParamId, Vec<f64>)>> {
        ParamId::ALL
            .iter()
            .map(|&id| {
                if self.base.uses(id) {
                    let grid = self.config.grid(id);
                    grid.validate(id)?;
                    Ok((id, grid.values()))
                } else {
                    Ok((id, vec![self.base.get(id)]))
                }
            })
            .collect()
    }

    /// Every candidate parameter set, first dimension outermost
    pub fn candidates(&self) -> Result<Vec<SvmParams>> {
        let axes = self.axes()?;
        let mut candidates = vec![self.base.clone()];
        for (id, values) in &axes {
            candidates = candidates
                .into_iter()
                .flat_map(|params| {
                    values.iter().map(move |&v| {
                        let mut next = params.clone();
                        next.set(*id, v);
                        next
                    })
                })
                .collect();
        }
        Ok(candidates)
    }

    /// Score every candidate on the train subset of `data`
    pub fn run(&self, data: &TrainData) -> Result<SearchOutcome> {
        if self.config.k_fold < 2 {
            return Err(SVMError::InvalidArgument(format!(
                "k-fold must be at least 2, got {}",
                self.config.k_fold
            )));
        }

        let balanced = self.config.balanced && self.base.svm_type.is_classifier();
        let folds = data.partition_into_folds(self.config.k_fold, balanced)?;
        let fold_data = folds
            .iter()
            .map(|Fold { train, test }| Ok((data.subset(train)?, data.subset(test)?)))
            .collect::<Result<Vec<_>>>()?;

        let candidates = self.candidates()?;
        info!(
            "Grid search over {} combinations with {}-fold cross-validation",
            candidates.len(),
            self.config.k_fold
        );

        let mut best: Option<(SvmParams, f64)> = None;
        for params in &candidates {
            let error = self.cross_validate(params, &fold_data)?;
            debug!(
                "C={} gamma={} p={} nu={} coef0={} degree={} -> mean error {:.6}",
                params.c, params.gamma, params.p, params.nu, params.coef0, params.degree, error
            );
            if best.as_ref().map_or(true, |(_, e)| error < *e) {
                best = Some((params.clone(), error));
            }
        }

        let (params, error) = best.ok_or_else(|| {
            SVMError::InvalidArgument("parameter grids produced no combinations".to_string())
        })?;
        info!(
            "Best combination: C={} gamma={} p={} nu={} coef0={} degree={} (error {:.6})",
            params.c, params.gamma, params.p, params.nu, params.coef0, params.degree, error
        );

        Ok(SearchOutcome {
            params,
            error,
            evaluated: candidates.len(),
        })
    }

    /// Mean held-out error of `params` over all folds
    fn cross_validate(&self, params: &SvmParams, folds: &[(TrainData, TrainData)]) -> Result<f64> {
        let optimizer = SVMOptimizer::new(params.clone(), self.solver.clone());
        let score = |(f, (train, test)): (usize, &(TrainData, TrainData))| {
            optimizer
                .train(train.samples(), train.responses())
                .and_then(|model| model.evaluate(test.samples(), test.responses()))
                .map(|out| out.error)
                .map_err(|e| e.into_solver_failure(&format!("fold {}", f + 1)))
        };

        // A rayon worker blocked in a join steals queued jobs, and a gateway
        // worker holds its model lock here, so folds run inline on pool threads.
        let errors = if rayon::current_thread_index().is_some() {
            folds.iter().enumerate().map(score).collect::<Result<Vec<f64>>>()?
        } else {
            folds.par_iter().enumerate().map(score).collect::<Result<Vec<f64>>>()?
        };

        Ok(errors.iter().sum::<f64>() / errors.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, SampleLayout, SvmType};
    use ndarray::{Array1, Array2};

    fn blobs(n: usize) -> TrainData {
        let samples = Array2::from_shape_fn((n, 2), |(i, j)| {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            sign * (1.0 + 0.1 * ((i * 7 + j * 3) % 5) as f64)
        });
        let responses = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        TrainData::new(samples, SampleLayout::Row, responses).expect("valid dataset")
    }

    #[test]
    fn test_unused_dimensions_are_skipped() {
        let base = SvmParams {
            c: 3.0,
            nu: 0.25,
            ..SvmParams::default()
        };
        let config = CrossValidationConfig::default();
        let search = GridSearch::new(&base, &config);
        let axes = search.axes().expect("valid grids");

        let lengths: Vec<usize> = axes.iter().map(|(_, v)| v.len()).collect();
        // C_SVC with RBF searches C and gamma only
        assert_eq!(lengths, vec![6, 5, 1, 1, 1, 1]);
        assert_eq!(axes[3].1, vec![0.25]);
    }

    #[test]
    fn test_candidate_order() {
        let base = SvmParams {
            kernel_type: KernelType::Poly,
            degree: 2.0,
            ..SvmParams::default()
        };
        let config = CrossValidationConfig::new()
            .with_fixed_params(&base)
            .with_grid(ParamId::C, ParamGrid::new(1.0, 10.0, 10.0))
            .with_grid(ParamId::Degree, ParamGrid::new(2.0, 3.0, 1.5));
        let candidates = GridSearch::new(&base, &config).candidates().expect("valid");

        let pairs: Vec<(f64, f64)> = candidates.iter().map(|p| (p.c, p.degree)).collect();
        assert_eq!(pairs, vec![(1.0, 2.0), (1.0, 3.0), (10.0, 2.0), (10.0, 3.0)]);
    }

    #[test]
    fn test_invalid_grid_is_rejected() {
        let base = SvmParams::default();
        let config = CrossValidationConfig::new().with_grid(ParamId::C, ParamGrid::new(0.0, 10.0, 2.0));
        assert!(matches!(
            GridSearch::new(&base, &config).candidates(),
            Err(SVMError::InvalidArgument(_))
        ));

        // The same grid is ignored when the dimension is unused
        let nu_svc = SvmParams {
            svm_type: SvmType::NuSvc,
            nu: 0.5,
            ..SvmParams::default()
        };
        assert!(GridSearch::new(&nu_svc, &config).candidates().is_ok());
    }

    #[test]
    fn test_k_fold_must_be_at_least_two() {
        let base = SvmParams::default();
        let data = blobs(20);
        for k in [0, 1] {
            let config = CrossValidationConfig::new().with_k_fold(k);
            assert!(matches!(
                GridSearch::new(&base, &config).run(&data),
                Err(SVMError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_search_finds_separating_params() {
        let base = SvmParams::default();
        let config = CrossValidationConfig::new()
            .with_k_fold(4)
            .with_grid(ParamId::C, ParamGrid::new(1.0, 100.0, 10.0))
            .with_grid(ParamId::Gamma, ParamGrid::new(0.1, 1.0, 10.0));
        let outcome = GridSearch::new(&base, &config).run(&blobs(24)).expect("search succeeds");

        assert_eq!(outcome.evaluated, 6);
        assert_eq!(outcome.error, 0.0);
        // Every combination separates the blobs, so the first one wins
        assert_eq!((outcome.params.c, outcome.params.gamma), (1.0, 0.1));
    }

    #[test]
    fn test_search_on_pool_thread_matches_caller_thread() {
        let base = SvmParams::default();
        let config = CrossValidationConfig::new()
            .with_k_fold(5)
            .with_grid(ParamId::C, ParamGrid::new(0.1, 10.0, 10.0))
            .with_grid(ParamId::Gamma, ParamGrid::new(0.01, 1.0, 10.0));
        let data = blobs(30);

        let outside = GridSearch::new(&base, &config).run(&data).expect("search succeeds");
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let inside = pool
            .install(|| GridSearch::new(&base, &config).run(&data))
            .expect("search succeeds");

        assert_eq!(inside.params, outside.params);
        assert_eq!(inside.error, outside.error);
    }

    #[test]
    fn test_fold_failure_is_solver_failure() {
        // nu = 0.9 is infeasible for every fold of this unbalanced set
        let base = SvmParams {
            svm_type: SvmType::NuSvc,
            nu: 0.9,
            ..SvmParams::default()
        };
        let samples = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let responses = Array1::from_shape_fn(12, |i| if i < 3 { 1.0 } else { 0.0 });
        let data = TrainData::new(samples, SampleLayout::Row, responses).expect("valid");

        let config = CrossValidationConfig::new()
            .with_k_fold(3)
            .with_balanced(true)
            .with_fixed_params(&base);
        assert!(matches!(
            GridSearch::new(&base, &config).run(&data),
            Err(SVMError::SolverFailure(_))
        ));
    }
}
