//! Core type definitions for SVM

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Formulation of the SVM problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SvmType {
    /// C-support vector classification
    CSvc,
    /// ν-support vector classification
    NuSvc,
    /// Distribution estimation (one-class SVM)
    OneClass,
    /// ε-support vector regression
    EpsSvr,
    /// ν-support vector regression
    NuSvr,
}

impl SvmType {
    /// Whether the responses are class labels
    pub fn is_classifier(self) -> bool {
        matches!(self, SvmType::CSvc | SvmType::NuSvc)
    }

    /// Whether the responses are continuous targets
    pub fn is_regressor(self) -> bool {
        matches!(self, SvmType::EpsSvr | SvmType::NuSvr)
    }
}

impl fmt::Display for SvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SvmType::CSvc => "C_SVC",
            SvmType::NuSvc => "NU_SVC",
            SvmType::OneClass => "ONE_CLASS",
            SvmType::EpsSvr => "EPS_SVR",
            SvmType::NuSvr => "NU_SVR",
        };
        f.write_str(name)
    }
}

/// Kernel function family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KernelType {
    Linear,
    Poly,
    Rbf,
    Sigmoid,
    Chi2,
    Inter,
}

impl KernelType {
    /// Whether the kernel reads `gamma`
    pub fn uses_gamma(self) -> bool {
        matches!(
            self,
            KernelType::Poly | KernelType::Rbf | KernelType::Sigmoid | KernelType::Chi2
        )
    }

    /// Whether the kernel reads `coef0`
    pub fn uses_coef0(self) -> bool {
        matches!(self, KernelType::Poly | KernelType::Sigmoid)
    }

    /// Whether the kernel reads `degree`
    pub fn uses_degree(self) -> bool {
        matches!(self, KernelType::Poly)
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KernelType::Linear => "LINEAR",
            KernelType::Poly => "POLY",
            KernelType::Rbf => "RBF",
            KernelType::Sigmoid => "SIGMOID",
            KernelType::Chi2 => "CHI2",
            KernelType::Inter => "INTER",
        };
        f.write_str(name)
    }
}

/// Whether each training example occupies a row or a column of the samples matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleLayout {
    #[default]
    Row,
    Col,
}

/// Identifier of a searchable hyperparameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    C,
    Gamma,
    P,
    Nu,
    Coef,
    Degree,
}

impl ParamId {
    /// All searchable hyperparameters in grid enumeration order
    pub const ALL: [ParamId; 6] = [
        ParamId::C,
        ParamId::Gamma,
        ParamId::P,
        ParamId::Nu,
        ParamId::Coef,
        ParamId::Degree,
    ];
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamId::C => "C",
            ParamId::Gamma => "gamma",
            ParamId::P => "p",
            ParamId::Nu => "nu",
            ParamId::Coef => "coef0",
            ParamId::Degree => "degree",
        };
        f.write_str(name)
    }
}

/// Solver termination criteria
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermCriteria {
    /// Maximum number of SMO iterations per binary sub-problem
    pub max_iter: usize,
    /// Tolerance on the KKT violation
    pub epsilon: f64,
}

impl Default for TermCriteria {
    fn default() -> Self {
        Self {
            max_iter: 1_000_000,
            epsilon: 1e-3,
        }
    }
}

/// Flags accepted by the training entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrainFlags(u32);

impl TrainFlags {
    pub const NONE: TrainFlags = TrainFlags(0);
    /// Refine the existing model instead of training from scratch
    pub const UPDATE_MODEL: TrainFlags = TrainFlags(1);

    pub fn from_bits(bits: u32) -> Self {
        TrainFlags(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: TrainFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

/// Flags accepted by `predict`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PredictFlags(u32);

impl PredictFlags {
    pub const NONE: PredictFlags = PredictFlags(0);
    /// Return the decision function value instead of the class label (two-class models)
    pub const RAW_OUTPUT: PredictFlags = PredictFlags(1);

    pub fn from_bits(bits: u32) -> Self {
        PredictFlags(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: PredictFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

/// Result of `predict`
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// Exactly one sample produced exactly one output
    Scalar(f64),
    /// One output per input row, in input order
    Batch(Vec<f64>),
}

impl Prediction {
    /// View the prediction as a slice of per-sample outputs
    pub fn values(&self) -> &[f64] {
        match self {
            Prediction::Scalar(v) => std::slice::from_ref(v),
            Prediction::Batch(vs) => vs,
        }
    }

    /// Consume into a vector of per-sample outputs
    pub fn into_vec(self) -> Vec<f64> {
        match self {
            Prediction::Scalar(v) => vec![v],
            Prediction::Batch(vs) => vs,
        }
    }

    /// The scalar value, if this prediction covers a single sample
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Prediction::Scalar(v) => Some(*v),
            Prediction::Batch(_) => None,
        }
    }
}

/// Result of `calc_error`
#[derive(Debug, Clone)]
pub struct CalcErrorOutput {
    /// Misclassified fraction for classifiers, mean squared error for regressors
    pub error: f64,
    /// Per-sample predictions (n x 1) in subset row order
    pub responses: Array2<f64>,
}
