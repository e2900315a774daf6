//! Datasets and file loaders
//!
//! [`TrainData`] is the in-memory dataset every training entry point takes;
//! the readers build one from LibSVM or CSV files.

pub mod csv;
pub mod libsvm;
pub mod train_data;

pub use self::csv::*;
pub use self::libsvm::*;
pub use self::train_data::*;
