use anyhow::anyhow;
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};
use tracing::debug;

use crate::{
    api::{
        error::{Error, Result},
        experiment::Experiment,
        metric::{MetricKind, MetricRecord, ScalarMetric},
        model::ModelArtifact,
        repository::{ExperimentRepository, MetricRepository, ModelRepository, RunRepository},
        run::Run,
    },
    ExperimentId, RunId,
};

#[derive(Debug, Default)]
struct State {
    experiments: HashMap<ExperimentId, Experiment>,
    experiment_order: Vec<ExperimentId>,
    runs: HashMap<RunId, Run>,
    run_order: Vec<RunId>,
    metrics: HashMap<(RunId, MetricKind), MetricRecord>,
    scalars: HashMap<RunId, Vec<ScalarMetric>>,
}

impl State {
    fn run_mut(&mut self, id: &RunId) -> Result<&mut Run> {
        self.runs.get_mut(id).ok_or(Error::RunNotFound(*id))
    }
}

/// Keeps all metadata in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    state: RwLock<State>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| Error::Backend(anyhow!("in-memory storage lock is poisoned")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| Error::Backend(anyhow!("in-memory storage lock is poisoned")))
    }
}

impl ExperimentRepository for InMemoryStorage {
    fn create_experiment(&self, experiment: &Experiment) -> Result<ExperimentId> {
        let mut state = self.write()?;
        let id = experiment.experiment_id;
        if state.experiments.insert(id, experiment.clone()).is_none() {
            state.experiment_order.push(id);
        }
        debug!(experiment_id = %id, "stored experiment in memory");
        Ok(id)
    }

    fn get_experiment(&self, id: &ExperimentId) -> Result<Experiment> {
        self.read()?
            .experiments
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ExperimentNotFound(id.to_string()))
    }

    fn list_experiments(&self) -> Result<Vec<Experiment>> {
        let state = self.read()?;
        Ok(state
            .experiment_order
            .iter()
            .filter_map(|id| state.experiments.get(id).cloned())
            .collect())
    }

    fn find_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        let state = self.read()?;
        Ok(state
            .experiment_order
            .iter()
            .filter_map(|id| state.experiments.get(id))
            .find(|experiment| experiment.name == name)
            .cloned())
    }
}

impl RunRepository for InMemoryStorage {
    fn create_run(&self, run: &Run) -> Result<RunId> {
        let mut state = self.write()?;
        if !state.experiments.contains_key(&run.experiment_id) {
            return Err(Error::ExperimentNotFound(run.experiment_id.to_string()));
        }
        let id = run.run_id;
        if state.runs.insert(id, run.clone()).is_none() {
            state.run_order.push(id);
        }
        debug!(run_id = %id, "stored run in memory");
        Ok(id)
    }

    fn get_run(&self, id: &RunId) -> Result<Run> {
        self.read()?.runs.get(id).cloned().ok_or(Error::RunNotFound(*id))
    }

    fn list_runs(&self, experiment: &ExperimentId) -> Result<Vec<Run>> {
        let state = self.read()?;
        Ok(state
            .run_order
            .iter()
            .filter_map(|id| state.runs.get(id))
            .filter(|run| run.experiment_id == *experiment)
            .cloned()
            .collect())
    }

    fn set_training_time(&self, id: &RunId, training_time: Duration) -> Result<()> {
        self.write()?.run_mut(id)?.training_time = Some(training_time);
        Ok(())
    }

    fn log_hyperparameter(&self, id: &RunId, key: &str, value: &str) -> Result<()> {
        self.write()?
            .run_mut(id)?
            .hyperparameters
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn set_completed(&self, id: &RunId, completed_at: DateTime<Utc>) -> Result<()> {
        self.write()?.run_mut(id)?.completed_at = Some(completed_at);
        Ok(())
    }

    fn set_model(&self, id: &RunId, model: &ModelArtifact) -> Result<()> {
        self.write()?.run_mut(id)?.model = Some(model.clone());
        Ok(())
    }
}

impl MetricRepository for InMemoryStorage {
    fn save_metric(&self, record: &MetricRecord) -> Result<()> {
        let mut state = self.write()?;
        if !state.runs.contains_key(&record.run_id) {
            return Err(Error::RunNotFound(record.run_id));
        }
        state
            .metrics
            .insert((record.run_id, record.kind), record.clone());
        Ok(())
    }

    fn get_metric(&self, run: &RunId, kind: MetricKind) -> Result<MetricRecord> {
        let state = self.read()?;
        if !state.runs.contains_key(run) {
            return Err(Error::RunNotFound(*run));
        }
        state
            .metrics
            .get(&(*run, kind))
            .cloned()
            .ok_or(Error::MetricNotFound { run: *run, kind })
    }

    fn log_scalar(&self, metric: &ScalarMetric) -> Result<()> {
        let mut state = self.write()?;
        if !state.runs.contains_key(&metric.run_id) {
            return Err(Error::RunNotFound(metric.run_id));
        }
        state
            .scalars
            .entry(metric.run_id)
            .or_default()
            .push(metric.clone());
        Ok(())
    }

    fn scalars(&self, run: &RunId) -> Result<Vec<ScalarMetric>> {
        let state = self.read()?;
        if !state.runs.contains_key(run) {
            return Err(Error::RunNotFound(*run));
        }
        Ok(state.scalars.get(run).cloned().unwrap_or_default())
    }
}

/// Keeps model binaries in process memory.
#[derive(Debug, Default)]
pub struct InMemoryModelRepository {
    models: RwLock<HashMap<RunId, Vec<u8>>>,
}

impl InMemoryModelRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelRepository for InMemoryModelRepository {
    fn save_model(&self, run: &RunId, model: &[u8]) -> Result<ModelArtifact> {
        self.models
            .write()
            .map_err(|_| Error::Backend(anyhow!("in-memory model repository lock is poisoned")))?
            .insert(*run, model.to_vec());
        Ok(ModelArtifact {
            run_id: *run,
            location: format!("memory://{}", run),
            size: model.len() as u64,
            saved_at: crate::timestamp(),
        })
    }

    fn load_model(&self, run: &RunId) -> Result<Vec<u8>> {
        self.models
            .read()
            .map_err(|_| Error::Backend(anyhow!("in-memory model repository lock is poisoned")))?
            .get(run)
            .cloned()
            .ok_or(Error::ModelNotFound(*run))
    }
}
