mod builder;
pub mod configs;
mod engine;
pub mod error;
mod session;

use std::{fmt::Display, net::ToSocketAddrs};

use log::info;

pub use builder::{
    BATCH_SIZE, COST_WEIGHTS, JobBuilder, LEARNING_RATE, MOMENTUM, WeightBlob, build_callbacks,
    build_cost, build_optimizer, build_topology, load_initial_weights,
};
pub use engine::{Metric, TrainingEngine, run};
pub use error::{ConfigError, OrchestratorError, Result};
pub use session::Session;

use crate::configs::JobDescriptor;

/// Trains `job` on the engine listening at `engine_addr` and returns the
/// misclassification rate on the validation split.
///
/// The initial weights, if any, are read before connecting so a missing file
/// fails the run before any training starts.
///
/// # Errors
/// Returns an `OrchestratorError` if the weights can't be read, the engine
/// can't be reached or the engine fails.
pub fn train<A: ToSocketAddrs + Display>(engine_addr: A, job: &JobDescriptor) -> Result<f32> {
    let initial_weights = job
        .initial_weights
        .as_deref()
        .map(load_initial_weights)
        .transpose()?;

    info!("connecting to training engine at {engine_addr}");
    let mut session = Session::connect(engine_addr)?;
    let score = run(&mut session, job, initial_weights.as_ref())?;
    session.disconnect()?;
    Ok(score)
}
