use std::{
    fmt,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
};

use super::BranchTree;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LossFnConfig {
    CrossEntropyMulti,
    CrossEntropyBinary,
}

/// One weighted sub-loss, applied to a single path's terminal output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostTerm {
    pub loss: LossFnConfig,
    pub weight: f32,
}

/// A loss made of one `CostTerm` per path, in path declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedMultiCost {
    terms: Vec<CostTerm>,
}

impl WeightedMultiCost {
    pub(crate) fn new(terms: Vec<CostTerm>) -> Self {
        Self { terms }
    }

    pub fn terms(&self) -> &[CostTerm] {
        &self.terms
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizerConfig {
    GradientDescentWithMomentum {
        lr: f32,
        mu: f32,
        stochastic_round: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointConfig {
    pub every: NonZeroUsize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackConfig {
    /// Epochs between validation passes, `None` disables them.
    pub validation_every: Option<NonZeroUsize>,
    pub checkpoint: Option<CheckpointConfig>,
    pub progress_bar: bool,
    pub output_file: Option<PathBuf>,
}

impl CallbackConfig {
    pub fn with_progress_bar(mut self, progress_bar: bool) -> Self {
        self.progress_bar = progress_bar;
        self
    }

    pub fn with_output_file<P: Into<PathBuf>>(mut self, output_file: Option<P>) -> Self {
        self.output_file = output_file.map(Into::into);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum BackendKind {
    #[default]
    Cpu,
    Gpu,
    Mgpu,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            "mgpu" => Ok(Self::Mgpu),
            other => Err(format!("unknown backend {other:?}, expected cpu, gpu or mgpu")),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Mgpu => "mgpu",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum DataType {
    F16,
    #[default]
    F32,
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "f16" | "float16" => Ok(Self::F16),
            "f32" | "float32" => Ok(Self::F32),
            other => Err(format!("unsupported datatype {other:?}, expected f16 or f32")),
        }
    }
}

/// Compute backend selection, handed to the engine instead of living in a global.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub rng_seed: Option<u64>,
    pub device_id: usize,
    pub datatype: DataType,
    pub stochastic_round: bool,
}

pub const MNIST_INPUT_SIZE: usize = 28 * 28;
pub const MNIST_CLASSES: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum DatasetConfig {
    Mnist { path: PathBuf },
}

impl DatasetConfig {
    pub fn path(&self) -> &Path {
        match self {
            Self::Mnist { path } => path,
        }
    }

    pub fn input_size(&self) -> usize {
        match self {
            Self::Mnist { .. } => MNIST_INPUT_SIZE,
        }
    }

    pub fn nclass(&self) -> usize {
        match self {
            Self::Mnist { .. } => MNIST_CLASSES,
        }
    }
}

/// A complete training job, built once and handed immutably to an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub tree: BranchTree,
    pub cost: WeightedMultiCost,
    pub optimizer: OptimizerConfig,
    pub callbacks: CallbackConfig,
    pub backend: BackendConfig,
    pub dataset: DatasetConfig,
    pub epochs: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    pub initial_weights: Option<PathBuf>,
}
