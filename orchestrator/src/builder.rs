use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    configs::{
        ActFnConfig, BackendConfig, BranchTree, CallbackConfig, CheckpointConfig, CostTerm,
        DatasetConfig, InitConfig, JobDescriptor, LayerConfig, LossFnConfig, OptimizerConfig,
        PathConfig, WeightedMultiCost,
    },
    error::{ConfigError, OrchestratorError, Result},
};

pub const BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(128).unwrap();
pub const LEARNING_RATE: f32 = 0.1;
pub const MOMENTUM: f32 = 0.9;
/// Main path first, then one weight per branch.
pub const COST_WEIGHTS: [f32; 3] = [1.0, 0.25, 0.25];

const INIT: InitConfig = InitConfig::Gaussian {
    loc: 0.0,
    scale: 0.01,
};
const SIGMOID: ActFnConfig = ActFnConfig::Logistic { shortcut: true };

/// An opaque serialized model state, only the engine knows how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightBlob {
    bytes: Vec<u8>,
}

impl WeightBlob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Builds the branching classifier.
///
/// The main path has four fully connected layers ending in a softmax over the
/// ten digits, with branch points after the first and third layers. Each
/// branch adds a hidden layer and a sigmoid output.
///
/// # Errors
/// Returns an `OrchestratorError::InvalidConfig` if a branch references an
/// undeclared branch point.
pub fn build_topology() -> Result<BranchTree> {
    let main = PathConfig::new(vec![
        LayerConfig::dense("m_l1", 100, INIT, ActFnConfig::Rectlin),
        LayerConfig::branch("b1"),
        LayerConfig::dense("m_l2", 32, INIT, ActFnConfig::Rectlin),
        LayerConfig::dense("m_l3", 16, INIT, ActFnConfig::Rectlin),
        LayerConfig::branch("b2"),
        LayerConfig::dense("m_l4", 10, INIT, ActFnConfig::Softmax),
    ]);

    let branch = |root: &str| {
        PathConfig::new(vec![
            LayerConfig::branch(root),
            LayerConfig::dense(format!("{root}_l1"), 16, INIT, ActFnConfig::Rectlin),
            LayerConfig::dense(format!("{root}_l2"), 10, INIT, SIGMOID),
        ])
    };

    let tree = BranchTree::new(vec![main, branch("b1"), branch("b2")])?;
    debug!("built topology with {} paths", tree.paths().len());
    Ok(tree)
}

/// Pairs each path with its loss, the main path is a multi class problem and
/// every branch a binary one.
///
/// # Errors
/// Returns an `OrchestratorError::InvalidConfig` unless there's exactly one
/// weight per path.
pub fn build_cost(tree: &BranchTree, weights: &[f32]) -> Result<WeightedMultiCost> {
    let expected = tree.paths().len();
    if weights.len() != expected {
        return Err(ConfigError::CostCountMismatch {
            got: weights.len(),
            expected,
        }
        .into());
    }

    let terms = weights
        .iter()
        .enumerate()
        .map(|(i, &weight)| CostTerm {
            loss: match i {
                0 => LossFnConfig::CrossEntropyMulti,
                _ => LossFnConfig::CrossEntropyBinary,
            },
            weight,
        })
        .collect();

    Ok(WeightedMultiCost::new(terms))
}

/// # Errors
/// Returns an `OrchestratorError::InvalidConfig` if `lr` isn't positive or
/// `momentum` falls outside `[0, 1)`.
pub fn build_optimizer(lr: f32, momentum: f32, stochastic_round: bool) -> Result<OptimizerConfig> {
    if !(lr.is_finite() && lr > 0.0) {
        return Err(ConfigError::InvalidLearningRate(lr).into());
    }
    if !(0.0..1.0).contains(&momentum) {
        return Err(ConfigError::InvalidMomentum(momentum).into());
    }

    Ok(OptimizerConfig::GradientDescentWithMomentum {
        lr,
        mu: momentum,
        stochastic_round,
    })
}

/// A zero `validation_freq` disables validation and a non positive
/// `checkpoint_freq` disables checkpointing.
///
/// # Errors
/// Returns an `OrchestratorError::InvalidConfig` if checkpointing is enabled
/// without a destination.
pub fn build_callbacks(
    validation_freq: usize,
    checkpoint_freq: i64,
    checkpoint_path: Option<&Path>,
) -> Result<CallbackConfig> {
    let validation_every = NonZeroUsize::new(validation_freq);

    let checkpoint = match usize::try_from(checkpoint_freq).ok().and_then(NonZeroUsize::new) {
        None => None,
        Some(every) => match checkpoint_path {
            Some(path) if !path.as_os_str().is_empty() => Some(CheckpointConfig {
                every,
                path: path.to_path_buf(),
            }),
            _ => return Err(ConfigError::MissingCheckpointPath.into()),
        },
    };

    Ok(CallbackConfig {
        validation_every,
        checkpoint,
        ..CallbackConfig::default()
    })
}

/// Reads a previously saved model state.
///
/// # Errors
/// Returns `OrchestratorError::MissingFile` if `path` doesn't exist, or an io
/// error if it can't be read.
pub fn load_initial_weights(path: &Path) -> Result<WeightBlob> {
    if !path.try_exists()? {
        return Err(OrchestratorError::MissingFile(path.to_path_buf()));
    }

    info!("loading initial model state from {}", path.display());
    let bytes = fs::read(path)?;
    Ok(WeightBlob { bytes })
}

/// Collects the run parameters and assembles a validated `JobDescriptor`.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    dataset: DatasetConfig,
    backend: BackendConfig,
    epochs: NonZeroUsize,
    cost_weights: Vec<f32>,
    lr: f32,
    momentum: f32,
    stochastic_round: bool,
    validation_freq: usize,
    checkpoint_freq: i64,
    checkpoint_path: Option<PathBuf>,
    progress_bar: bool,
    output_file: Option<PathBuf>,
    initial_weights: Option<PathBuf>,
}

impl JobBuilder {
    pub fn new(dataset: DatasetConfig, backend: BackendConfig, epochs: NonZeroUsize) -> Self {
        Self {
            dataset,
            backend,
            epochs,
            cost_weights: COST_WEIGHTS.to_vec(),
            lr: LEARNING_RATE,
            momentum: MOMENTUM,
            stochastic_round: false,
            validation_freq: 0,
            checkpoint_freq: 0,
            checkpoint_path: None,
            progress_bar: false,
            output_file: None,
            initial_weights: None,
        }
    }

    pub fn cost_weights(mut self, weights: Vec<f32>) -> Self {
        self.cost_weights = weights;
        self
    }

    pub fn optimizer(mut self, lr: f32, momentum: f32) -> Self {
        self.lr = lr;
        self.momentum = momentum;
        self
    }

    /// Stochastic rounding of the optimizer updates.
    pub fn stochastic_round(mut self, enabled: bool) -> Self {
        self.stochastic_round = enabled;
        self
    }

    pub fn validation_freq(mut self, freq: usize) -> Self {
        self.validation_freq = freq;
        self
    }

    pub fn checkpoint(mut self, freq: i64, path: Option<PathBuf>) -> Self {
        self.checkpoint_freq = freq;
        self.checkpoint_path = path;
        self
    }

    pub fn progress_bar(mut self, enabled: bool) -> Self {
        self.progress_bar = enabled;
        self
    }

    pub fn output_file(mut self, path: Option<PathBuf>) -> Self {
        self.output_file = path;
        self
    }

    /// An empty path counts as no initial state.
    pub fn initial_weights(mut self, path: Option<PathBuf>) -> Self {
        self.initial_weights = path.filter(|path| !path.as_os_str().is_empty());
        self
    }

    /// # Errors
    /// Returns an `OrchestratorError::InvalidConfig` if any part of the job is invalid.
    pub fn build(self) -> Result<JobDescriptor> {
        let tree = build_topology()?;
        let cost = build_cost(&tree, &self.cost_weights)?;
        let optimizer = build_optimizer(self.lr, self.momentum, self.stochastic_round)?;
        let callbacks = build_callbacks(
            self.validation_freq,
            self.checkpoint_freq,
            self.checkpoint_path.as_deref(),
        )?
        .with_progress_bar(self.progress_bar)
        .with_output_file(self.output_file);

        info!(
            "job ready: {} epochs, batch size {BATCH_SIZE}, backend {}, data at {}",
            self.epochs,
            self.backend.kind,
            self.dataset.path().display()
        );

        Ok(JobDescriptor {
            tree,
            cost,
            optimizer,
            callbacks,
            backend: self.backend,
            dataset: self.dataset,
            epochs: self.epochs,
            batch_size: BATCH_SIZE,
            initial_weights: self.initial_weights,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn epochs(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn mnist() -> DatasetConfig {
        DatasetConfig::Mnist {
            path: "data".into(),
        }
    }

    #[test]
    fn topology_has_a_main_path_and_two_branches() {
        let tree = build_topology().unwrap();
        let paths = tree.paths();

        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0].root(), None);
        assert_eq!(paths[0].layers().len(), 6);
        assert_eq!(paths[1].root(), Some("b1"));
        assert_eq!(paths[2].root(), Some("b2"));

        assert_eq!(tree.branch_point("b1").unwrap().position, 1);
        assert_eq!(tree.branch_point("b2").unwrap().position, 4);
        assert!(paths.iter().all(|p| p.terminal_width() == Some(10)));
    }

    #[test]
    fn main_path_ends_in_softmax_and_branches_in_sigmoid() {
        let tree = build_topology().unwrap();
        let act_fn = |path: &PathConfig| match path.layers().last() {
            Some(LayerConfig::FullyConnected { act_fn, .. }) => *act_fn,
            other => panic!("unexpected terminal {other:?}"),
        };

        assert_eq!(act_fn(&tree.paths()[0]), ActFnConfig::Softmax);
        assert_eq!(act_fn(&tree.paths()[1]), SIGMOID);
        assert_eq!(act_fn(&tree.paths()[2]), SIGMOID);
    }

    #[test]
    fn cost_succeeds_only_with_one_weight_per_path() {
        let tree = build_topology().unwrap();

        for len in 0..6 {
            let weights = vec![0.5; len];
            let res = build_cost(&tree, &weights);
            assert_eq!(res.is_ok(), len == 3, "len {len}");
        }
    }

    #[test]
    fn cost_keeps_weights_in_path_order() {
        let tree = build_topology().unwrap();
        let cost = build_cost(&tree, &[1.0, 0.25, 0.25]).unwrap();

        assert_eq!(
            cost.terms(),
            [
                CostTerm {
                    loss: LossFnConfig::CrossEntropyMulti,
                    weight: 1.0
                },
                CostTerm {
                    loss: LossFnConfig::CrossEntropyBinary,
                    weight: 0.25
                },
                CostTerm {
                    loss: LossFnConfig::CrossEntropyBinary,
                    weight: 0.25
                },
            ]
        );
    }

    #[test]
    fn optimizer_checks_ranges() {
        assert!(build_optimizer(0.1, 0.9, true).is_ok());
        assert!(build_optimizer(0.1, 0.0, false).is_ok());

        for lr in [0.0, -0.1, f32::NAN, f32::INFINITY] {
            assert!(build_optimizer(lr, 0.9, false).is_err(), "lr {lr}");
        }
        for mu in [1.0, 1.5, -0.1, f32::NAN] {
            assert!(build_optimizer(0.1, mu, false).is_err(), "momentum {mu}");
        }
    }

    #[test]
    fn zero_validation_freq_disables_validation() {
        let callbacks = build_callbacks(0, 0, None).unwrap();
        assert_eq!(callbacks.validation_every, None);

        let callbacks = build_callbacks(2, 0, None).unwrap();
        assert_eq!(callbacks.validation_every, NonZeroUsize::new(2));
    }

    #[test]
    fn non_positive_checkpoint_freq_disables_checkpoints() {
        for freq in [0, -1, i64::MIN] {
            let callbacks = build_callbacks(1, freq, None).unwrap();
            assert_eq!(callbacks.checkpoint, None);
        }

        let callbacks = build_callbacks(1, 3, Some(Path::new("checkpoint.bin"))).unwrap();
        assert_eq!(
            callbacks.checkpoint,
            Some(CheckpointConfig {
                every: NonZeroUsize::new(3).unwrap(),
                path: "checkpoint.bin".into(),
            })
        );
    }

    #[test]
    fn checkpoints_need_a_destination() {
        for path in [None, Some(Path::new(""))] {
            let err = build_callbacks(0, 1, path).unwrap_err();
            assert!(matches!(
                err,
                OrchestratorError::InvalidConfig(ConfigError::MissingCheckpointPath)
            ));
        }
    }

    #[test]
    fn missing_weights_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.bin");

        let err = load_initial_weights(&path).unwrap_err();
        assert!(matches!(err, OrchestratorError::MissingFile(p) if p == path));
    }

    #[test]
    fn unreadable_weights_path_is_an_io_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().join("weights.bin");

        let err = load_initial_weights(&path).unwrap_err();
        assert!(matches!(err, OrchestratorError::Io(_)));
    }

    #[test]
    fn empty_weights_path_means_none() {
        let job = JobBuilder::new(mnist(), BackendConfig::default(), epochs(1))
            .initial_weights(Some(PathBuf::new()))
            .build()
            .unwrap();
        assert_eq!(job.initial_weights, None);
    }

    #[test]
    fn existing_weights_file_is_read_verbatim() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3, 4]).unwrap();

        let blob = load_initial_weights(file.path()).unwrap();
        assert_eq!(blob.as_bytes(), [1, 2, 3, 4]);
    }

    #[test]
    fn builder_assembles_the_default_job() {
        let job = JobBuilder::new(mnist(), BackendConfig::default(), epochs(10))
            .validation_freq(1)
            .checkpoint(2, Some("ckpt.bin".into()))
            .progress_bar(true)
            .build()
            .unwrap();

        assert_eq!(job.tree.paths().len(), 3);
        assert_eq!(job.cost.terms().len(), 3);
        assert_eq!(job.batch_size, BATCH_SIZE);
        assert_eq!(job.epochs.get(), 10);
        assert_eq!(
            job.optimizer,
            OptimizerConfig::GradientDescentWithMomentum {
                lr: LEARNING_RATE,
                mu: MOMENTUM,
                stochastic_round: false
            }
        );
        assert!(job.callbacks.progress_bar);
        assert_eq!(job.callbacks.validation_every, NonZeroUsize::new(1));
        assert!(job.callbacks.checkpoint.is_some());
        assert_eq!(job.initial_weights, None);
    }

    #[test]
    fn builder_propagates_invalid_parts() {
        let res = JobBuilder::new(mnist(), BackendConfig::default(), epochs(1))
            .cost_weights(vec![1.0])
            .build();
        assert!(res.is_err());

        let res = JobBuilder::new(mnist(), BackendConfig::default(), epochs(1))
            .checkpoint(1, None)
            .build();
        assert!(res.is_err());
    }
}
