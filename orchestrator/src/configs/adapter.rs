use std::collections::HashMap;

use comms::specs::{
    ActFnSpec, BackendKindSpec, BackendSpec, CallbackSpec, CheckpointSpec, CostSpec, CostTermSpec,
    DataTypeSpec, DatasetSpec, InitSpec, JobSpec, LayerSpec, LossFnSpec, MetricSpec,
    OptimizerSpec, PathSpec, TreeSpec,
};

use super::{
    ActFnConfig, BackendConfig, BackendKind, BranchTree, CallbackConfig, DataType, DatasetConfig,
    InitConfig, JobDescriptor, LayerConfig, LossFnConfig, OptimizerConfig, WeightedMultiCost,
};
use crate::{
    engine::Metric,
    error::{ConfigError, Result},
};

/// Turns a `JobDescriptor` into the wire level `JobSpec` an engine consumes.
pub struct Adapter;

impl Adapter {
    pub fn new() -> Self {
        Self
    }

    pub fn adapt_job(&self, job: &JobDescriptor) -> Result<JobSpec> {
        self.validate_cost(&job.tree, &job.cost)?;
        self.validate_outputs(&job.tree, &job.dataset)?;

        Ok(JobSpec {
            tree: self.adapt_tree(&job.tree, job.dataset.input_size())?,
            cost: self.adapt_cost(&job.cost),
            optimizer: self.adapt_optimizer(job.optimizer),
            callbacks: self.adapt_callbacks(&job.callbacks),
            backend: self.adapt_backend(job.backend),
            dataset: self.adapt_dataset(&job.dataset),
            epochs: job.epochs,
            batch_size: job.batch_size,
        })
    }

    pub fn adapt_metric(&self, metric: Metric) -> MetricSpec {
        match metric {
            Metric::Misclassification => MetricSpec::Misclassification,
        }
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    fn validate_cost(&self, tree: &BranchTree, cost: &WeightedMultiCost) -> Result<()> {
        let (got, expected) = (cost.terms().len(), tree.paths().len());
        if got != expected {
            return Err(ConfigError::CostCountMismatch { got, expected }.into());
        }
        Ok(())
    }

    fn validate_outputs(&self, tree: &BranchTree, dataset: &DatasetConfig) -> Result<()> {
        let expected = dataset.nclass();

        for (path, layers) in tree.paths().iter().enumerate() {
            let Some(got) = layers.terminal_width() else {
                return Err(ConfigError::MissingTerminal { path }.into());
            };
            if got != expected {
                return Err(ConfigError::OutputSizeMismatch {
                    path,
                    got,
                    expected,
                }
                .into());
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Adaptation
    // -------------------------------------------------------------------------

    /// Walks the paths in declaration order, the input width of each fully
    /// connected layer is the output width of whatever feeds it.
    fn adapt_tree(&self, tree: &BranchTree, input_size: usize) -> Result<TreeSpec> {
        let mut widths: HashMap<&str, usize> = HashMap::new();
        let mut paths = Vec::with_capacity(tree.paths().len());

        for (i, path) in tree.paths().iter().enumerate() {
            let root = path.root().map(str::to_string);
            let mut layers = path.layers();

            let mut width = match path.root() {
                Some(name) => {
                    layers = &layers[1..];
                    *widths
                        .get(name)
                        .ok_or_else(|| ConfigError::UndeclaredBranchPoint {
                            path: i,
                            name: name.to_string(),
                        })?
                }
                None => input_size,
            };

            let layers = layers
                .iter()
                .map(|layer| match layer {
                    LayerConfig::FullyConnected {
                        name,
                        nout,
                        init,
                        act_fn,
                    } => {
                        let dim = (width, *nout);
                        width = *nout;
                        LayerSpec::Dense {
                            name: name.clone(),
                            dim,
                            init: self.adapt_init(*init),
                            act_fn: self.adapt_act_fn(*act_fn),
                        }
                    }
                    LayerConfig::BranchPoint { name } => {
                        widths.insert(name, width);
                        LayerSpec::Branch { name: name.clone() }
                    }
                })
                .collect();

            paths.push(PathSpec { root, layers });
        }

        Ok(TreeSpec { paths })
    }

    fn adapt_init(&self, init: InitConfig) -> InitSpec {
        match init {
            InitConfig::Constant { value } => InitSpec::Constant { value },
            InitConfig::Uniform { low, high } => InitSpec::Uniform { low, high },
            InitConfig::Gaussian { loc, scale } => InitSpec::Gaussian { loc, scale },
        }
    }

    fn adapt_act_fn(&self, act_fn: ActFnConfig) -> ActFnSpec {
        match act_fn {
            ActFnConfig::Identity => ActFnSpec::Identity,
            ActFnConfig::Rectlin => ActFnSpec::Rectlin,
            ActFnConfig::Logistic { shortcut } => ActFnSpec::Logistic { shortcut },
            ActFnConfig::Softmax => ActFnSpec::Softmax,
        }
    }

    fn adapt_cost(&self, cost: &WeightedMultiCost) -> CostSpec {
        let terms = cost
            .terms()
            .iter()
            .map(|term| CostTermSpec {
                loss: self.adapt_loss_fn(term.loss),
                weight: term.weight,
            })
            .collect();

        CostSpec { terms }
    }

    fn adapt_loss_fn(&self, loss_fn: LossFnConfig) -> LossFnSpec {
        match loss_fn {
            LossFnConfig::CrossEntropyMulti => LossFnSpec::CrossEntropyMulti,
            LossFnConfig::CrossEntropyBinary => LossFnSpec::CrossEntropyBinary,
        }
    }

    fn adapt_optimizer(&self, optimizer: OptimizerConfig) -> OptimizerSpec {
        match optimizer {
            OptimizerConfig::GradientDescentWithMomentum {
                lr,
                mu,
                stochastic_round,
            } => OptimizerSpec::GradientDescentWithMomentum {
                learning_rate: lr,
                momentum: mu,
                stochastic_round,
            },
        }
    }

    fn adapt_callbacks(&self, callbacks: &CallbackConfig) -> CallbackSpec {
        CallbackSpec {
            validation_every: callbacks.validation_every,
            checkpoint: callbacks.checkpoint.as_ref().map(|c| CheckpointSpec {
                every: c.every,
                path: c.path.clone(),
            }),
            progress_bar: callbacks.progress_bar,
            output_file: callbacks.output_file.clone(),
        }
    }

    fn adapt_backend(&self, backend: BackendConfig) -> BackendSpec {
        let kind = match backend.kind {
            BackendKind::Cpu => BackendKindSpec::Cpu,
            BackendKind::Gpu => BackendKindSpec::Gpu,
            BackendKind::Mgpu => BackendKindSpec::Mgpu,
        };
        let datatype = match backend.datatype {
            DataType::F16 => DataTypeSpec::F16,
            DataType::F32 => DataTypeSpec::F32,
        };

        BackendSpec {
            kind,
            rng_seed: backend.rng_seed,
            device_id: backend.device_id,
            datatype,
            stochastic_round: backend.stochastic_round,
        }
    }

    fn adapt_dataset(&self, dataset: &DatasetConfig) -> DatasetSpec {
        match dataset {
            DatasetConfig::Mnist { path } => DatasetSpec::Mnist {
                path: path.clone(),
                nclass: dataset.nclass(),
            },
        }
    }
}

impl Default for Adapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::builder::{COST_WEIGHTS, build_cost, build_topology};

    fn job() -> JobDescriptor {
        let tree = build_topology().unwrap();
        let cost = build_cost(&tree, &COST_WEIGHTS).unwrap();

        JobDescriptor {
            tree,
            cost,
            optimizer: OptimizerConfig::GradientDescentWithMomentum {
                lr: 0.1,
                mu: 0.9,
                stochastic_round: false,
            },
            callbacks: CallbackConfig::default(),
            backend: BackendConfig::default(),
            dataset: DatasetConfig::Mnist {
                path: "data".into(),
            },
            epochs: NonZeroUsize::new(3).unwrap(),
            batch_size: NonZeroUsize::new(128).unwrap(),
            initial_weights: None,
        }
    }

    fn dims(path: &PathSpec) -> Vec<(usize, usize)> {
        path.layers
            .iter()
            .filter_map(|layer| match layer {
                LayerSpec::Dense { dim, .. } => Some(*dim),
                LayerSpec::Branch { .. } => None,
            })
            .collect()
    }

    #[test]
    fn resolves_input_widths_across_branch_points() {
        let spec = Adapter::new().adapt_job(&job()).unwrap();
        let paths = &spec.tree.paths;

        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0].root, None);
        assert_eq!(dims(&paths[0]), [(784, 100), (100, 32), (32, 16), (16, 10)]);

        assert_eq!(paths[1].root.as_deref(), Some("b1"));
        assert_eq!(dims(&paths[1]), [(100, 16), (16, 10)]);

        assert_eq!(paths[2].root.as_deref(), Some("b2"));
        assert_eq!(dims(&paths[2]), [(16, 16), (16, 10)]);
    }

    #[test]
    fn roots_are_not_repeated_as_layers() {
        let spec = Adapter::new().adapt_job(&job()).unwrap();
        let first = &spec.tree.paths[1].layers[0];
        assert!(matches!(first, LayerSpec::Dense { name, .. } if name == "b1_l1"));
    }

    #[test]
    fn carries_cost_terms_in_path_order() {
        let spec = Adapter::new().adapt_job(&job()).unwrap();
        let losses: Vec<_> = spec.cost.terms.iter().map(|t| (t.loss, t.weight)).collect();

        assert_eq!(
            losses,
            [
                (LossFnSpec::CrossEntropyMulti, 1.0),
                (LossFnSpec::CrossEntropyBinary, 0.25),
                (LossFnSpec::CrossEntropyBinary, 0.25),
            ]
        );
    }

    #[test]
    fn rejects_cost_that_no_longer_matches_the_tree() {
        let mut job = job();
        job.cost = WeightedMultiCost::new(job.cost.terms()[..2].to_vec());

        let err = Adapter::new().adapt_job(&job).unwrap_err();
        assert!(err.to_string().contains("got 2 cost weights"));
    }

    #[test]
    fn rejects_outputs_that_dont_match_the_classes() {
        let mut job = job();
        let mut paths = job.tree.paths().to_vec();
        paths[0] = crate::configs::PathConfig::new(vec![
            LayerConfig::dense("m_l1", 100, InitConfig::Constant { value: 0.0 }, ActFnConfig::Rectlin),
            LayerConfig::branch("b1"),
            LayerConfig::dense("m_l2", 16, InitConfig::Constant { value: 0.0 }, ActFnConfig::Rectlin),
            LayerConfig::branch("b2"),
            LayerConfig::dense("m_l4", 2, InitConfig::Constant { value: 0.0 }, ActFnConfig::Softmax),
        ]);
        job.tree = BranchTree::new(paths).unwrap();

        let err = Adapter::new().adapt_job(&job).unwrap_err();
        assert!(matches!(
            err,
            crate::OrchestratorError::InvalidConfig(ConfigError::OutputSizeMismatch {
                path: 0,
                got: 2,
                expected: 10
            })
        ));
    }
}
