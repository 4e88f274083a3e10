use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::{
    api::{
        error::{Error, Result},
        experiment::Experiment,
        repository::{ExperimentRepository, RunRepository},
        run::Run,
    },
    ExperimentId, RunId,
};

/// Creation of experiments and runs, and the state queries around them.
///
/// This is the only place identifiers are minted.
#[derive(Clone)]
pub struct LifeCycleCatalog {
    experiments: Arc<dyn ExperimentRepository>,
    runs: Arc<dyn RunRepository>,
}

impl LifeCycleCatalog {
    pub(crate) fn new(experiments: Arc<dyn ExperimentRepository>, runs: Arc<dyn RunRepository>) -> Self {
        LifeCycleCatalog { experiments, runs }
    }

    pub fn create_experiment(&self, name: &str) -> Result<ExperimentId> {
        if name.is_empty() {
            warn!("rejected experiment without a name");
            return Err(Error::invalid("the experiment name must not be empty"));
        }
        let experiment = Experiment::new(name);
        let id = self.experiments.create_experiment(&experiment)?;
        info!(experiment_id = %id, name, "created experiment");
        Ok(id)
    }

    pub fn get_experiment(&self, id: &ExperimentId) -> Result<Experiment> {
        self.experiments.get_experiment(id)
    }

    /// All experiments, oldest first.
    pub fn list_experiments(&self) -> Result<Vec<Experiment>> {
        self.experiments.list_experiments()
    }

    pub fn create_run(&self, experiment: &ExperimentId, name: &str) -> Result<RunId> {
        let experiment = self.experiments.get_experiment(experiment)?;
        self.insert_run(&experiment, name)
    }

    /// Like [`create_run`](Self::create_run), but looks the experiment up by
    /// name. With several experiments of that name the oldest one is used.
    pub fn create_run_in(&self, experiment_name: &str, run_name: &str) -> Result<RunId> {
        let experiment = self
            .experiments
            .find_experiment_by_name(experiment_name)?
            .ok_or_else(|| Error::ExperimentNotFound(experiment_name.to_owned()))?;
        self.insert_run(&experiment, run_name)
    }

    fn insert_run(&self, experiment: &Experiment, name: &str) -> Result<RunId> {
        let run = Run::new(experiment.experiment_id, name);
        let id = self.runs.create_run(&run)?;
        info!(run_id = %id, experiment_id = %experiment.experiment_id, "created run");
        Ok(id)
    }

    pub fn get_run(&self, id: &RunId) -> Result<Run> {
        self.runs.get_run(id)
    }

    pub fn list_runs(&self, experiment: &ExperimentId) -> Result<Vec<Run>> {
        self.experiments.get_experiment(experiment)?;
        self.runs.list_runs(experiment)
    }

    pub fn set_training_time(&self, run: &RunId, training_time: Duration) -> Result<()> {
        super::existing_run(self.runs.as_ref(), run)?;
        self.runs.set_training_time(run, training_time)?;
        debug!(run_id = %run, ?training_time, "recorded training time");
        Ok(())
    }

    /// Marks the run as completed. Metrics can still be attached afterwards.
    pub fn complete_run(&self, run: &RunId) -> Result<()> {
        super::existing_run(self.runs.as_ref(), run)?;
        self.runs.set_completed(run, crate::timestamp())
    }
}
