//! SVM solver implementations
//!
//! This module implements the Sequential Minimal Optimization (SMO) algorithm
//! over kernel-backed Q matrices for the classification, one-class and
//! regression duals.

pub mod qmatrix;
pub mod smo;

pub use self::qmatrix::*;
pub use self::smo::*;
