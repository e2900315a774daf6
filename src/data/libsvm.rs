//! LibSVM format loader
//!
//! Supports loading datasets in the libsvm format:
//! label index:value index:value ...
//!
//! Example:
//! +1 1:0.5 3:1.2 7:0.8
//! -1 2:0.3 5:2.1
//!
//! Indices are 1-based; missing features are zero in the dense rows.

use crate::core::{Result, SVMError, SampleLayout};
use crate::data::TrainData;
use ndarray::{Array1, Array2};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One parsed line: label and 0-based sparse entries
type SparseRow = (f64, Vec<(usize, f64)>);

/// Reader for LibSVM format files
#[derive(Debug, Clone, Copy, Default)]
pub struct LibSvmReader {
    n_features: Option<usize>,
}

impl LibSvmReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the feature count instead of inferring it from the largest index
    ///
    /// Useful when a test file never mentions the trailing features of the
    /// training file.
    pub fn with_n_features(mut self, n_features: usize) -> Self {
        self.n_features = Some(n_features);
        self
    }

    /// Load a dataset from a LibSVM format file
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<TrainData> {
        let file = File::open(path)?;
        self.load(BufReader::new(file))
    }

    /// Load a dataset from a reader (for testing and flexibility)
    pub fn load<R: BufRead>(&self, reader: R) -> Result<TrainData> {
        let mut rows: Vec<SparseRow> = Vec::new();
        let mut max_dimension = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let row = Self::parse_line(line).map_err(|e| {
                SVMError::FormatError(format!("Error parsing line {}: {}", line_num + 1, e))
            })?;
            if let Some(&(max_idx, _)) = row.1.iter().max_by_key(|(i, _)| *i) {
                max_dimension = max_dimension.max(max_idx + 1);
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(SVMError::FormatError("no samples found".to_string()));
        }

        let dimensions = match self.n_features {
            Some(n) if n < max_dimension => {
                return Err(SVMError::DimensionMismatch {
                    expected: n,
                    actual: max_dimension,
                })
            }
            Some(n) => n,
            None => max_dimension,
        };
        if dimensions == 0 {
            return Err(SVMError::FormatError("no features found".to_string()));
        }

        let mut samples = Array2::zeros((rows.len(), dimensions));
        let mut responses = Array1::zeros(rows.len());
        for (r, (label, entries)) in rows.into_iter().enumerate() {
            responses[r] = label;
            for (index, value) in entries {
                samples[[r, index]] = value;
            }
        }

        TrainData::new(samples, SampleLayout::Row, responses)
    }

    /// Parse a single line in libsvm format
    fn parse_line(line: &str) -> std::result::Result<SparseRow, String> {
        let mut parts = line.split_whitespace();

        let label_str = parts.next().ok_or_else(|| "Empty line".to_string())?;
        let label = label_str
            .parse::<f64>()
            .map_err(|_| format!("Invalid label: {label_str}"))?;

        let mut entries = Vec::new();
        for feature_str in parts {
            let (index_str, value_str) = feature_str
                .split_once(':')
                .ok_or_else(|| format!("Invalid feature format: {feature_str}"))?;

            let index = index_str
                .parse::<usize>()
                .map_err(|_| format!("Invalid feature index: {index_str}"))?;
            let value = value_str
                .parse::<f64>()
                .map_err(|_| format!("Invalid feature value: {value_str}"))?;

            // libsvm uses 1-based indexing, convert to 0-based
            if index == 0 {
                return Err(format!("Feature index must be positive: {index}"));
            }
            entries.push((index - 1, value));
        }

        Ok((label, entries))
    }
}
