use log::info;

use crate::{builder::WeightBlob, configs::JobDescriptor, error::Result};

/// Quality measures an engine can report after fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Fraction of misclassified samples in the validation split.
    Misclassification,
}

/// The external collaborator that owns tensors, gradients and the fit loop.
pub trait TrainingEngine {
    /// Restores a previously saved model state before fitting.
    fn load_weights(&mut self, blob: &WeightBlob) -> Result<()>;

    /// Blocks until the whole job has been trained.
    fn fit(&mut self, job: &JobDescriptor) -> Result<()>;

    fn evaluate(&mut self, metric: Metric) -> Result<f32>;
}

/// Runs `job` to completion on `engine` and returns its misclassification rate.
///
/// # Errors
/// Any engine failure is returned untouched, nothing is retried.
pub fn run<E: TrainingEngine + ?Sized>(
    engine: &mut E,
    job: &JobDescriptor,
    initial_weights: Option<&WeightBlob>,
) -> Result<f32> {
    if let Some(blob) = initial_weights {
        engine.load_weights(blob)?;
    }

    info!("fitting for {} epochs", job.epochs);
    engine.fit(job)?;

    let score = engine.evaluate(Metric::Misclassification)?;
    info!("evaluation finished, misclassification {score}");
    Ok(score)
}
