//! CSV format loader
//!
//! Supports loading datasets from CSV files where:
//! - The last column is the label
//! - All other columns are features
//! - First row can be headers (automatically detected)

use crate::core::{Result, SVMError, SampleLayout};
use crate::data::TrainData;
use ndarray::{Array1, Array2};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Reader for comma-separated files
#[derive(Debug, Clone, Copy)]
pub struct CsvReader {
    auto_detect_header: bool,
}

impl Default for CsvReader {
    fn default() -> Self {
        Self {
            auto_detect_header: true,
        }
    }
}

impl CsvReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable header detection on the first line
    pub fn with_header_detection(mut self, enabled: bool) -> Self {
        self.auto_detect_header = enabled;
        self
    }

    /// Load a dataset from a CSV file
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<TrainData> {
        let file = File::open(path)?;
        self.load(BufReader::new(file))
    }

    /// Load a dataset from a reader
    pub fn load<R: BufRead>(&self, reader: R) -> Result<TrainData> {
        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut seen_first = false;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let first = !seen_first;
            seen_first = true;
            if first && self.auto_detect_header && Self::is_header_line(line) {
                continue;
            }

            let row = Self::parse_data_line(line).map_err(|e| {
                SVMError::FormatError(format!("Error parsing line {}: {}", line_num + 1, e))
            })?;
            if let Some(previous) = rows.first() {
                if previous.len() != row.len() {
                    return Err(SVMError::FormatError(format!(
                        "line {} has {} columns, expected {}",
                        line_num + 1,
                        row.len(),
                        previous.len()
                    )));
                }
            }
            rows.push(row);
        }

        let n_columns = match rows.first() {
            Some(row) => row.len(),
            None => return Err(SVMError::FormatError("no samples found".to_string())),
        };

        let n_features = n_columns - 1;
        let mut samples = Array2::zeros((rows.len(), n_features));
        let mut responses = Array1::zeros(rows.len());
        for (r, row) in rows.iter().enumerate() {
            for (c, &value) in row[..n_features].iter().enumerate() {
                samples[[r, c]] = value;
            }
            responses[r] = row[n_features];
        }

        TrainData::new(samples, SampleLayout::Row, responses)
    }

    /// Check if a line appears to be a header
    fn is_header_line(line: &str) -> bool {
        let fields: Vec<&str> = line.split(',').collect();

        if fields.len() < 2 {
            return false;
        }

        // Check if most fields are non-numeric (likely headers)
        let non_numeric_count = fields
            .iter()
            .take(fields.len() - 1) // Exclude last column (label)
            .filter(|field| field.trim().parse::<f64>().is_err())
            .count();

        non_numeric_count > fields.len() / 2
    }

    /// Parse a CSV data line into features followed by the label
    fn parse_data_line(line: &str) -> std::result::Result<Vec<f64>, String> {
        let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();

        if fields.len() < 2 {
            return Err(format!("Line has too few fields: {line}"));
        }

        fields
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                field
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid value at column {}: {}", idx + 1, field))
            })
            .collect()
    }
}
