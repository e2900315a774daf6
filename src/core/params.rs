//! Hyperparameters of the SVM model and partial updates to them

use crate::core::{KernelType, ParamId, Result, SVMError, SvmType, TermCriteria};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Complete hyperparameter set of an SVM model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    pub svm_type: SvmType,
    pub kernel_type: KernelType,
    /// Regularization parameter (C_SVC, EPS_SVR, NU_SVR)
    pub c: f64,
    /// Independent kernel term (POLY, SIGMOID)
    pub coef0: f64,
    /// Polynomial degree (POLY)
    pub degree: f64,
    /// Kernel width (POLY, RBF, SIGMOID, CHI2)
    pub gamma: f64,
    /// ν parameter (NU_SVC, ONE_CLASS, NU_SVR)
    pub nu: f64,
    /// Width of the ε-insensitive tube (EPS_SVR)
    pub p: f64,
    /// Per-class multipliers of C, indexed by class position in ascending label order
    pub class_weights: Option<Vec<f64>>,
    pub term_criteria: TermCriteria,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            svm_type: SvmType::CSvc,
            kernel_type: KernelType::Rbf,
            c: 1.0,
            coef0: 0.0,
            degree: 0.0,
            gamma: 1.0,
            nu: 0.0,
            p: 0.0,
            class_weights: None,
            term_criteria: TermCriteria::default(),
        }
    }
}

impl SvmParams {
    /// Read a searchable hyperparameter by id
    pub fn get(&self, id: ParamId) -> f64 {
        match id {
            ParamId::C => self.c,
            ParamId::Gamma => self.gamma,
            ParamId::P => self.p,
            ParamId::Nu => self.nu,
            ParamId::Coef => self.coef0,
            ParamId::Degree => self.degree,
        }
    }

    /// Write a searchable hyperparameter by id
    pub fn set(&mut self, id: ParamId, value: f64) {
        match id {
            ParamId::C => self.c = value,
            ParamId::Gamma => self.gamma = value,
            ParamId::P => self.p = value,
            ParamId::Nu => self.nu = value,
            ParamId::Coef => self.coef0 = value,
            ParamId::Degree => self.degree = value,
        }
    }

    /// Whether training with the current SVM and kernel types reads `id`
    pub fn uses(&self, id: ParamId) -> bool {
        match id {
            ParamId::C => matches!(
                self.svm_type,
                SvmType::CSvc | SvmType::EpsSvr | SvmType::NuSvr
            ),
            ParamId::Gamma => self.kernel_type.uses_gamma(),
            ParamId::P => self.svm_type == SvmType::EpsSvr,
            ParamId::Nu => matches!(
                self.svm_type,
                SvmType::NuSvc | SvmType::OneClass | SvmType::NuSvr
            ),
            ParamId::Coef => self.kernel_type.uses_coef0(),
            ParamId::Degree => self.kernel_type.uses_degree(),
        }
    }

    /// Check the values that the declared SVM and kernel types read
    pub fn validate(&self) -> Result<()> {
        for id in ParamId::ALL {
            self.validate_field(id)?;
        }
        if let Some(weights) = &self.class_weights {
            validate_class_weights(weights)?;
        }
        validate_term_criteria(&self.term_criteria)
    }

    /// Check one searchable value; values the current types never read pass
    pub fn validate_field(&self, id: ParamId) -> Result<()> {
        if !self.uses(id) {
            return Ok(());
        }
        let value = self.get(id);
        let message = match id {
            ParamId::C if !(value > 0.0 && value.is_finite()) => {
                format!("C must be positive for {}, got {}", self.svm_type, value)
            }
            ParamId::Nu if !(value > 0.0 && value < 1.0) => {
                format!("nu must be in (0, 1) for {}, got {}", self.svm_type, value)
            }
            ParamId::P if !(value >= 0.0 && value.is_finite()) => {
                format!("p must be non-negative for {}, got {}", self.svm_type, value)
            }
            ParamId::Gamma if !(value > 0.0 && value.is_finite()) => format!(
                "gamma must be positive for the {} kernel, got {}",
                self.kernel_type, value
            ),
            ParamId::Degree if !(value > 0.0 && value.is_finite()) => format!(
                "degree must be positive for the {} kernel, got {}",
                self.kernel_type, value
            ),
            ParamId::Coef if !value.is_finite() => format!("coef0 must be finite, got {value}"),
            _ => return Ok(()),
        };
        Err(SVMError::InvalidArgument(message))
    }

    /// Apply `update`, checking only the fields it provides
    ///
    /// Stale values of untouched fields are left for training to reject.
    pub fn updated(&self, update: &ParamsUpdate) -> Result<SvmParams> {
        let merged = self.merged(update)?;
        for id in ParamId::ALL {
            if update.get(id).is_some() {
                merged.validate_field(id)?;
            }
        }
        if let Some(term_criteria) = &update.term_criteria {
            validate_term_criteria(term_criteria)?;
        }
        Ok(merged)
    }

    /// Produce a copy with every field present in `update` applied
    pub fn merged(&self, update: &ParamsUpdate) -> Result<SvmParams> {
        let class_weights = match &update.class_weights {
            Some(matrix) => Some(class_weights_from_matrix(matrix)?),
            None => self.class_weights.clone(),
        };

        Ok(SvmParams {
            svm_type: update.svm_type.unwrap_or(self.svm_type),
            kernel_type: update.kernel_type.unwrap_or(self.kernel_type),
            c: update.c.unwrap_or(self.c),
            coef0: update.coef0.unwrap_or(self.coef0),
            degree: update.degree.unwrap_or(self.degree),
            gamma: update.gamma.unwrap_or(self.gamma),
            nu: update.nu.unwrap_or(self.nu),
            p: update.p.unwrap_or(self.p),
            class_weights,
            term_criteria: update.term_criteria.unwrap_or(self.term_criteria),
        })
    }
}

fn validate_term_criteria(term_criteria: &TermCriteria) -> Result<()> {
    if term_criteria.max_iter == 0 {
        return Err(SVMError::InvalidArgument(
            "term criteria max_iter must be at least 1".to_string(),
        ));
    }
    if !(term_criteria.epsilon > 0.0) {
        return Err(SVMError::InvalidArgument(format!(
            "term criteria epsilon must be positive, got {}",
            term_criteria.epsilon
        )));
    }
    Ok(())
}

fn validate_class_weights(weights: &[f64]) -> Result<()> {
    if weights.is_empty() {
        return Err(SVMError::InvalidArgument(
            "class weights must not be empty".to_string(),
        ));
    }
    if let Some(w) = weights.iter().find(|w| !(w.is_finite() && **w >= 0.0)) {
        return Err(SVMError::InvalidArgument(format!(
            "class weights must be finite and non-negative, got {w}"
        )));
    }
    Ok(())
}

/// Flatten a 1 x n or n x 1 weight matrix
fn class_weights_from_matrix(matrix: &Array2<f64>) -> Result<Vec<f64>> {
    let (rows, cols) = matrix.dim();
    if rows != 1 && cols != 1 {
        return Err(SVMError::InvalidArgument(format!(
            "class weights must be a row or column vector, got a {rows}x{cols} matrix"
        )));
    }
    let weights: Vec<f64> = matrix.iter().copied().collect();
    validate_class_weights(&weights)?;
    Ok(weights)
}

/// Sparse set of hyperparameter overrides; absent fields keep their current value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamsUpdate {
    pub svm_type: Option<SvmType>,
    pub kernel_type: Option<KernelType>,
    pub c: Option<f64>,
    pub coef0: Option<f64>,
    pub degree: Option<f64>,
    pub gamma: Option<f64>,
    pub nu: Option<f64>,
    pub p: Option<f64>,
    /// Row or column vector of per-class weights
    pub class_weights: Option<Array2<f64>>,
    pub term_criteria: Option<TermCriteria>,
}

impl ParamsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provided value of a searchable hyperparameter
    pub fn get(&self, id: ParamId) -> Option<f64> {
        match id {
            ParamId::C => self.c,
            ParamId::Gamma => self.gamma,
            ParamId::P => self.p,
            ParamId::Nu => self.nu,
            ParamId::Coef => self.coef0,
            ParamId::Degree => self.degree,
        }
    }

    pub fn with_svm_type(mut self, svm_type: SvmType) -> Self {
        self.svm_type = Some(svm_type);
        self
    }

    pub fn with_kernel_type(mut self, kernel_type: KernelType) -> Self {
        self.kernel_type = Some(kernel_type);
        self
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = Some(c);
        self
    }

    pub fn with_coef0(mut self, coef0: f64) -> Self {
        self.coef0 = Some(coef0);
        self
    }

    pub fn with_degree(mut self, degree: f64) -> Self {
        self.degree = Some(degree);
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    pub fn with_nu(mut self, nu: f64) -> Self {
        self.nu = Some(nu);
        self
    }

    pub fn with_p(mut self, p: f64) -> Self {
        self.p = Some(p);
        self
    }

    /// Set class weights from a plain vector (stored as a 1 x n row)
    pub fn with_class_weights(mut self, weights: Vec<f64>) -> Self {
        let n = weights.len();
        self.class_weights = Array2::from_shape_vec((1, n), weights).ok();
        self
    }

    /// Set class weights from a matrix; must be a row or column vector
    pub fn with_class_weight_matrix(mut self, weights: Array2<f64>) -> Self {
        self.class_weights = Some(weights);
        self
    }

    pub fn with_term_criteria(mut self, term_criteria: TermCriteria) -> Self {
        self.term_criteria = Some(term_criteria);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_defaults() {
        let params = SvmParams::default();
        assert_eq!(params.svm_type, SvmType::CSvc);
        assert_eq!(params.kernel_type, KernelType::Rbf);
        assert_eq!(params.c, 1.0);
        assert_eq!(params.gamma, 1.0);
        assert!(params.class_weights.is_none());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let base = SvmParams {
            coef0: 0.5,
            nu: 0.3,
            ..SvmParams::default()
        };
        let merged = base
            .merged(&ParamsUpdate::new().with_c(10.0).with_gamma(0.25))
            .expect("merge should succeed");

        assert_eq!(merged.c, 10.0);
        assert_eq!(merged.gamma, 0.25);
        assert_eq!(merged.coef0, 0.5);
        assert_eq!(merged.nu, 0.3);
        assert_eq!(merged.kernel_type, base.kernel_type);
    }

    #[test]
    fn test_class_weights_shape() {
        let base = SvmParams::default();

        let column = ParamsUpdate::new().with_class_weight_matrix(array![[1.0], [2.0]]);
        let merged = base.merged(&column).expect("column vector accepted");
        assert_eq!(merged.class_weights, Some(vec![1.0, 2.0]));

        let square = ParamsUpdate::new().with_class_weight_matrix(array![[1.0, 2.0], [3.0, 4.0]]);
        assert!(matches!(
            base.merged(&square),
            Err(SVMError::InvalidArgument(_))
        ));

        let negative = ParamsUpdate::new().with_class_weights(vec![1.0, -1.0]);
        assert!(matches!(
            base.merged(&negative),
            Err(SVMError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validation_is_type_specific() {
        // nu is ignored by C_SVC, so its zero default is fine
        let params = SvmParams::default();
        assert!(params.validate().is_ok());

        let nu_svc = SvmParams {
            svm_type: SvmType::NuSvc,
            ..SvmParams::default()
        };
        assert!(matches!(
            nu_svc.validate(),
            Err(SVMError::InvalidArgument(_))
        ));

        let poly = SvmParams {
            kernel_type: KernelType::Poly,
            ..SvmParams::default()
        };
        assert!(poly.validate().is_err(), "degree 0 is invalid for POLY");

        let linear = SvmParams {
            kernel_type: KernelType::Linear,
            gamma: -1.0,
            ..SvmParams::default()
        };
        assert!(linear.validate().is_ok(), "LINEAR never reads gamma");
    }

    #[test]
    fn test_update_checks_only_provided_fields() {
        let poly = SvmParams {
            kernel_type: KernelType::Poly,
            ..SvmParams::default()
        };
        let updated = poly
            .updated(&ParamsUpdate::new().with_c(2.0))
            .expect("stale degree is not checked");
        assert_eq!(updated.c, 2.0);
        assert_eq!(updated.degree, 0.0);

        assert!(poly.updated(&ParamsUpdate::new().with_degree(-1.0)).is_err());
        assert!(poly
            .updated(&ParamsUpdate::new().with_c(f64::INFINITY))
            .is_err());
        // Unused by C_SVC, so any value is accepted
        assert!(poly.updated(&ParamsUpdate::new().with_nu(5.0)).is_ok());

        // Provided values are checked against the merged types
        let to_nu_svc = ParamsUpdate::new()
            .with_svm_type(SvmType::NuSvc)
            .with_nu(5.0);
        assert!(poly.updated(&to_nu_svc).is_err());

        let bad_term = ParamsUpdate::new().with_term_criteria(TermCriteria {
            max_iter: 0,
            ..TermCriteria::default()
        });
        assert!(poly.updated(&bad_term).is_err());
    }

    #[test]
    fn test_get_set_by_id() {
        let mut params = SvmParams::default();
        for (i, id) in ParamId::ALL.iter().enumerate() {
            params.set(*id, i as f64 + 0.5);
        }
        for (i, id) in ParamId::ALL.iter().enumerate() {
            assert_eq!(params.get(*id), i as f64 + 0.5);
        }
    }

    #[test]
    fn test_uses() {
        let mut params = SvmParams::default();
        assert!(params.uses(ParamId::C));
        assert!(!params.uses(ParamId::Nu));
        assert!(!params.uses(ParamId::P));
        params.svm_type = SvmType::EpsSvr;
        assert!(params.uses(ParamId::P));
        params.svm_type = SvmType::NuSvc;
        assert!(!params.uses(ParamId::C));
    }
}
