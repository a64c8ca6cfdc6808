mod adapter;
mod model;
mod training;

pub use adapter::Adapter;
pub use model::{ActFnConfig, BranchPointId, BranchTree, InitConfig, LayerConfig, PathConfig};
pub use training::{
    BackendConfig, BackendKind, CallbackConfig, CheckpointConfig, CostTerm, DataType,
    DatasetConfig, JobDescriptor, LossFnConfig, MNIST_CLASSES, MNIST_INPUT_SIZE, OptimizerConfig,
    WeightedMultiCost,
};
