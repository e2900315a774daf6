//! Model serialization and persistence
//!
//! Trained models are stored as a single JSON document. Version 2 carries
//! both support vector forms. Version 1 is the compressed-only layout with no
//! `uncompressed_support_vectors` field; it still loads, and LINEAR models
//! read from it answer `UnsupportedOperation` when asked for their original
//! support rows.

use crate::core::{Result, SVMError, SvmParams};
use crate::optimizer::{DecisionFunction, TrainedSVM};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Version written by this library
pub const FORMAT_VERSION: u32 = 2;

/// Serializable representation of a trained SVM model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableModel {
    pub format_version: u32,
    pub metadata: ModelMetadata,
    /// Hyperparameters captured at training time
    pub params: SvmParams,
    pub var_count: usize,
    /// Ascending class labels (classification only)
    #[serde(default)]
    pub class_labels: Vec<i32>,
    pub support_vectors: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncompressed_support_vectors: Option<Vec<Vec<f64>>>,
    pub decision_functions: Vec<DecisionFunction>,
}

/// Model metadata for tracking and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

fn to_rows(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.rows().into_iter().map(|r| r.to_vec()).collect()
}

fn from_rows(rows: &[Vec<f64>], n_cols: usize, what: &str) -> Result<Array2<f64>> {
    let mut flat = Vec::with_capacity(rows.len() * n_cols);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != n_cols {
            return Err(SVMError::FormatError(format!(
                "{} row {} has {} values, expected {}",
                what,
                i,
                row.len(),
                n_cols
            )));
        }
        flat.extend_from_slice(row);
    }
    Array2::from_shape_vec((rows.len(), n_cols), flat)
        .map_err(|e| SVMError::FormatError(format!("{what}: {e}")))
}

impl SerializableModel {
    /// Create a serializable model from a trained model
    pub fn from_trained_model(model: &TrainedSVM) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            metadata: ModelMetadata {
                library_version: env!("CARGO_PKG_VERSION").to_string(),
                created_at: chrono::Utc::now().to_rfc3339(),
            },
            params: model.params().clone(),
            var_count: model.var_count(),
            class_labels: model.class_labels().to_vec(),
            support_vectors: to_rows(model.support_vectors()),
            uncompressed_support_vectors: model.stored_uncompressed_support_vectors().map(to_rows),
            decision_functions: model.decision_functions().to_vec(),
        }
    }

    /// Save model to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write(BufWriter::new(file))
    }

    /// Load model from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SVMError::FormatError(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }

    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let model: Self =
            serde_json::from_reader(reader).map_err(|e| SVMError::FormatError(e.to_string()))?;
        if model.format_version == 0 || model.format_version > FORMAT_VERSION {
            return Err(SVMError::FormatError(format!(
                "unsupported model format version {}",
                model.format_version
            )));
        }
        Ok(model)
    }

    /// Rebuild the trained model, checking the document for consistency
    pub fn to_trained_model(&self) -> Result<TrainedSVM> {
        self.params
            .validate()
            .map_err(|e| SVMError::FormatError(format!("stored parameters: {e}")))?;

        let support_vectors = from_rows(&self.support_vectors, self.var_count, "support_vectors")?;
        let uncompressed = self
            .uncompressed_support_vectors
            .as_deref()
            .map(|rows| from_rows(rows, self.var_count, "uncompressed_support_vectors"))
            .transpose()?;

        TrainedSVM::from_parts(
            self.params.clone(),
            self.var_count,
            self.class_labels.clone(),
            support_vectors,
            uncompressed,
            self.decision_functions.clone(),
        )
    }

    /// Print model summary
    pub fn print_summary(&self) {
        println!("=== SVM Model Summary ===");
        println!("SVM Type: {:?}", self.params.svm_type);
        println!("Kernel Type: {:?}", self.params.kernel_type);
        println!("Features: {}", self.var_count);
        if !self.class_labels.is_empty() {
            println!("Classes: {:?}", self.class_labels);
        }
        println!("Support Vectors: {}", self.support_vectors.len());
        if let Some(rows) = &self.uncompressed_support_vectors {
            println!("Uncompressed Support Vectors: {}", rows.len());
        }
        println!("Decision Functions: {}", self.decision_functions.len());
        println!("Format Version: {}", self.format_version);
        println!("Library Version: {}", self.metadata.library_version);
        println!("Created: {}", self.metadata.created_at);
        println!("Parameters:");
        println!("  C: {}", self.params.c);
        println!("  gamma: {}", self.params.gamma);
        println!("  coef0: {}", self.params.coef0);
        println!("  degree: {}", self.params.degree);
        println!("  nu: {}", self.params.nu);
        println!("  p: {}", self.params.p);
    }
}
