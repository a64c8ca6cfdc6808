use std::{num::NonZeroUsize, path::PathBuf};

use serde::{Deserialize, Serialize};

use super::TreeSpec;

/// The specification for the loss applied to a path's terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    CrossEntropyMulti,
    CrossEntropyBinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostTermSpec {
    pub loss: LossFnSpec,
    pub weight: f32,
}

/// The weighted sum of one cost term per path, in path order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSpec {
    pub terms: Vec<CostTermSpec>,
}

/// The specification for the `Optimizer`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    GradientDescentWithMomentum {
        learning_rate: f32,
        momentum: f32,
        stochastic_round: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSpec {
    pub every: NonZeroUsize,
    pub path: PathBuf,
}

/// Lifecycle hooks the engine runs around the fit loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackSpec {
    pub validation_every: Option<NonZeroUsize>,
    pub checkpoint: Option<CheckpointSpec>,
    pub progress_bar: bool,
    pub output_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKindSpec {
    Cpu,
    Gpu,
    Mgpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataTypeSpec {
    F16,
    F32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackendSpec {
    pub kind: BackendKindSpec,
    pub rng_seed: Option<u64>,
    pub device_id: usize,
    pub datatype: DataTypeSpec,
    pub stochastic_round: bool,
}

/// The specification for the `Dataset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetSpec {
    Mnist { path: PathBuf, nclass: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSpec {
    Misclassification,
}

/// Everything an engine needs to run a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub tree: TreeSpec,
    pub cost: CostSpec,
    pub optimizer: OptimizerSpec,
    pub callbacks: CallbackSpec,
    pub backend: BackendSpec,
    pub dataset: DatasetSpec,
    pub epochs: NonZeroUsize,
    pub batch_size: NonZeroUsize,
}
