//! Contracts a storage backend fulfils.
//!
//! Catalogs only ever talk to these traits. Each method must be safe to call
//! from several threads at once; concurrent writes to the same record resolve
//! as last write wins unless a backend documents otherwise.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::{
    api::{
        error::Result,
        experiment::Experiment,
        metric::{MetricKind, MetricRecord, ScalarMetric},
        model::ModelArtifact,
        run::Run,
    },
    ExperimentId, RunId,
};

#[rustfmt::skip]
pub trait ExperimentRepository: Send + Sync {
    fn create_experiment(&self, experiment: &Experiment) -> Result<ExperimentId>;
    fn get_experiment(&self, id: &ExperimentId) -> Result<Experiment>;
    /// All experiments, oldest first.
    fn list_experiments(&self) -> Result<Vec<Experiment>>;
    /// The oldest experiment carrying `name`.
    fn find_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>>;
}

#[rustfmt::skip]
pub trait RunRepository: Send + Sync {
    /// Fails with `ExperimentNotFound` if the parent experiment is unknown.
    fn create_run(&self, run: &Run) -> Result<RunId>;
    fn get_run(&self, id: &RunId) -> Result<Run>;
    /// Runs of one experiment, oldest first.
    fn list_runs(&self, experiment: &ExperimentId) -> Result<Vec<Run>>;
    fn set_training_time(&self, id: &RunId, training_time: Duration) -> Result<()>;
    fn log_hyperparameter(&self, id: &RunId, key: &str, value: &str) -> Result<()>;
    fn set_completed(&self, id: &RunId, completed_at: DateTime<Utc>) -> Result<()>;
    fn set_model(&self, id: &RunId, model: &ModelArtifact) -> Result<()>;
}

#[rustfmt::skip]
pub trait MetricRepository: Send + Sync {
    /// Replaces any earlier record of the same kind; `RunNotFound` if the run is unknown.
    fn save_metric(&self, record: &MetricRecord) -> Result<()>;
    fn get_metric(&self, run: &RunId, kind: MetricKind) -> Result<MetricRecord>;
    fn log_scalar(&self, metric: &ScalarMetric) -> Result<()>;
    /// Scalar metrics of a run in the order they were logged.
    fn scalars(&self, run: &RunId) -> Result<Vec<ScalarMetric>>;
}

/// Stores model binaries keyed by run.
#[rustfmt::skip]
pub trait ModelRepository: Send + Sync {
    fn save_model(&self, run: &RunId, model: &[u8]) -> Result<ModelArtifact>;
    fn load_model(&self, run: &RunId) -> Result<Vec<u8>>;
}

/// A backend that keeps all run metadata: experiments, runs and metrics.
pub trait MetadataStore: ExperimentRepository + RunRepository + MetricRepository {}

impl<T> MetadataStore for T where T: ExperimentRepository + RunRepository + MetricRepository {}
