mod job;
mod model;

pub use job::{
    BackendKindSpec, BackendSpec, CallbackSpec, CheckpointSpec, CostSpec, CostTermSpec,
    DatasetSpec, DataTypeSpec, JobSpec, LossFnSpec, MetricSpec, OptimizerSpec,
};
pub use model::{ActFnSpec, InitSpec, LayerSpec, PathSpec, TreeSpec};
