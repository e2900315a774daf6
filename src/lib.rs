//! Support Vector Machine training with cross-validated hyperparameter search
//!
//! The solver follows the SMO decomposition of "Working Set Selection Using
//! Second Order Information for Training SVM" (Fan, Chen and Lin). On top of
//! it, [`Svm::train_auto`] picks hyperparameters by k-fold grid search and
//! [`gateway::TrainingGateway`] runs training calls on a worker pool.

pub mod api;
pub mod autotune;
pub mod cache;
pub mod core;
pub mod data;
pub mod gateway;
pub mod kernel;
pub mod optimizer;
pub mod persistence;
pub mod solver;

// Re-export main types for convenience
pub use crate::api::Svm;
pub use crate::autotune::{CrossValidationConfig, GridSearch, ParamGrid, SearchOutcome};
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::core::error::*;
pub use crate::core::params::*;
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::data::{CsvReader, Fold, LibSvmReader, TrainData};
pub use crate::gateway::{GatewayConfig, JobId, SharedSvm, TrainRequest, TrainingGateway};
pub use crate::kernel::{Kernel, KernelFunction};
pub use crate::optimizer::{DecisionFunction, SVMOptimizer, TrainedSVM};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
