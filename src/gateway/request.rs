//! Training requests executed by gateway workers

use crate::api::Svm;
use crate::autotune::CrossValidationConfig;
use crate::core::{Result, SampleLayout, TrainFlags};
use crate::data::TrainData;
use ndarray::Array2;
use std::sync::Arc;

/// Input of a plain training call
#[derive(Debug, Clone)]
pub enum TrainInput {
    /// Train on the train subset of a shared dataset
    Dataset {
        data: Arc<TrainData>,
        flags: TrainFlags,
    },
    /// Train on matrices moved into the request
    Matrices {
        samples: Array2<f64>,
        layout: SampleLayout,
        responses: Array2<f64>,
    },
}

/// A training call the gateway can run on a worker
#[derive(Debug, Clone)]
pub enum TrainRequest {
    Train(TrainInput),
    Auto {
        data: Arc<TrainData>,
        config: CrossValidationConfig,
    },
}

impl TrainRequest {
    pub fn dataset(data: Arc<TrainData>, flags: TrainFlags) -> Self {
        TrainRequest::Train(TrainInput::Dataset { data, flags })
    }

    pub fn matrices(samples: Array2<f64>, layout: SampleLayout, responses: Array2<f64>) -> Self {
        TrainRequest::Train(TrainInput::Matrices {
            samples,
            layout,
            responses,
        })
    }

    pub fn auto(data: Arc<TrainData>, config: CrossValidationConfig) -> Self {
        TrainRequest::Auto { data, config }
    }

    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            TrainRequest::Train(TrainInput::Dataset { .. }) => "train",
            TrainRequest::Train(TrainInput::Matrices { .. }) => "train_matrices",
            TrainRequest::Auto { .. } => "train_auto",
        }
    }

    /// Run the blocking call against `svm`
    pub fn execute(self, svm: &mut Svm) -> Result<bool> {
        match self {
            TrainRequest::Train(TrainInput::Dataset { data, flags }) => svm.train(&data, flags),
            TrainRequest::Train(TrainInput::Matrices {
                samples,
                layout,
                responses,
            }) => svm.train_matrices(samples, layout, responses),
            TrainRequest::Auto { data, config } => svm.train_auto(&data, &config),
        }
    }
}
