//! File-based backend: one JSON document per record below a root directory.
//!
//! ```text
//! <root>/experiments/<experiment id>.json
//! <root>/runs/<run id>.json
//! <root>/metrics/<run id>/<kind>.json
//! <root>/metrics/<run id>/scalars.json
//! ```

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
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

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(Error::Backend(
                anyhow::Error::new(err).context(format!("failed to read {}", path.display())),
            ))
        }
    };
    let value = serde_json::from_str(&text).with_context(|| format!("{} is corrupt", path.display()))?;
    Ok(Some(value))
}

// Write next to the target first so readers never observe half a document.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serializing document failed")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, text).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

fn read_all<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let entries = fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    let mut values = Vec::new();
    for entry in entries {
        let path = entry.context("failed to list directory entry")?.path();
        if path.extension().map_or(false, |ext| ext == "json") {
            if let Some(value) = read_json(&path)? {
                values.push(value);
            }
        }
    }
    Ok(values)
}

/// Persists metadata as JSON documents on the local filesystem.
///
/// Read-modify-write cycles are serialized through one process-wide lock;
/// several processes sharing a root directory are not coordinated.
#[derive(Debug)]
pub struct FsStorage {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsStorage {
    /// Opens the store at `root`, creating the directory layout if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in &["experiments", "runs", "metrics"] {
            let dir = root.join(dir);
            fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        }
        debug!(root = %root.display(), "opened filesystem storage");
        Ok(FsStorage {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| Error::Backend(anyhow::anyhow!("filesystem storage lock is poisoned")))
    }

    fn experiment_path(&self, id: &ExperimentId) -> PathBuf {
        self.root.join("experiments").join(format!("{}.json", id))
    }

    fn run_path(&self, id: &RunId) -> PathBuf {
        self.root.join("runs").join(format!("{}.json", id))
    }

    fn metric_dir(&self, run: &RunId) -> PathBuf {
        self.root.join("metrics").join(run.to_string())
    }

    fn run_exists(&self, id: &RunId) -> bool {
        self.run_path(id).is_file()
    }

    fn update_run(&self, id: &RunId, update: impl FnOnce(&mut Run)) -> Result<()> {
        let _guard = self.lock()?;
        let path = self.run_path(id);
        let mut run: Run = read_json(&path)?.ok_or(Error::RunNotFound(*id))?;
        update(&mut run);
        write_json(&path, &run)
    }
}

impl ExperimentRepository for FsStorage {
    fn create_experiment(&self, experiment: &Experiment) -> Result<ExperimentId> {
        let _guard = self.lock()?;
        write_json(&self.experiment_path(&experiment.experiment_id), experiment)?;
        debug!(experiment_id = %experiment.experiment_id, "stored experiment on disk");
        Ok(experiment.experiment_id)
    }

    fn get_experiment(&self, id: &ExperimentId) -> Result<Experiment> {
        read_json(&self.experiment_path(id))?.ok_or_else(|| Error::ExperimentNotFound(id.to_string()))
    }

    fn list_experiments(&self) -> Result<Vec<Experiment>> {
        let mut experiments: Vec<Experiment> = read_all(&self.root.join("experiments"))?;
        experiments.sort_by_key(|experiment| (experiment.created_at, experiment.experiment_id));
        Ok(experiments)
    }

    fn find_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        Ok(self
            .list_experiments()?
            .into_iter()
            .find(|experiment| experiment.name == name))
    }
}

impl RunRepository for FsStorage {
    fn create_run(&self, run: &Run) -> Result<RunId> {
        let _guard = self.lock()?;
        if !self.experiment_path(&run.experiment_id).is_file() {
            return Err(Error::ExperimentNotFound(run.experiment_id.to_string()));
        }
        write_json(&self.run_path(&run.run_id), run)?;
        debug!(run_id = %run.run_id, "stored run on disk");
        Ok(run.run_id)
    }

    fn get_run(&self, id: &RunId) -> Result<Run> {
        read_json(&self.run_path(id))?.ok_or(Error::RunNotFound(*id))
    }

    fn list_runs(&self, experiment: &ExperimentId) -> Result<Vec<Run>> {
        let mut runs: Vec<Run> = read_all(&self.root.join("runs"))?;
        runs.retain(|run| run.experiment_id == *experiment);
        runs.sort_by_key(|run| (run.created_at, run.run_id));
        Ok(runs)
    }

    fn set_training_time(&self, id: &RunId, training_time: Duration) -> Result<()> {
        self.update_run(id, |run| run.training_time = Some(training_time))
    }

    fn log_hyperparameter(&self, id: &RunId, key: &str, value: &str) -> Result<()> {
        self.update_run(id, |run| {
            run.hyperparameters.insert(key.to_owned(), value.to_owned());
        })
    }

    fn set_completed(&self, id: &RunId, completed_at: DateTime<Utc>) -> Result<()> {
        self.update_run(id, |run| run.completed_at = Some(completed_at))
    }

    fn set_model(&self, id: &RunId, model: &ModelArtifact) -> Result<()> {
        self.update_run(id, |run| run.model = Some(model.clone()))
    }
}

impl MetricRepository for FsStorage {
    fn save_metric(&self, record: &MetricRecord) -> Result<()> {
        let _guard = self.lock()?;
        if !self.run_exists(&record.run_id) {
            return Err(Error::RunNotFound(record.run_id));
        }
        let dir = self.metric_dir(&record.run_id);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        write_json(&dir.join(format!("{}.json", record.kind.key())), record)
    }

    fn get_metric(&self, run: &RunId, kind: MetricKind) -> Result<MetricRecord> {
        if !self.run_exists(run) {
            return Err(Error::RunNotFound(*run));
        }
        let path = self.metric_dir(run).join(format!("{}.json", kind.key()));
        read_json(&path)?.ok_or(Error::MetricNotFound { run: *run, kind })
    }

    fn log_scalar(&self, metric: &ScalarMetric) -> Result<()> {
        let _guard = self.lock()?;
        if !self.run_exists(&metric.run_id) {
            return Err(Error::RunNotFound(metric.run_id));
        }
        let dir = self.metric_dir(&metric.run_id);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join("scalars.json");
        let mut scalars: Vec<ScalarMetric> = read_json(&path)?.unwrap_or_default();
        scalars.push(metric.clone());
        write_json(&path, &scalars)
    }

    fn scalars(&self, run: &RunId) -> Result<Vec<ScalarMetric>> {
        if !self.run_exists(run) {
            return Err(Error::RunNotFound(*run));
        }
        Ok(read_json(&self.metric_dir(run).join("scalars.json"))?.unwrap_or_default())
    }
}

/// Stores each model binary as `<root>/<run id>/model.bin`.
#[derive(Debug)]
pub struct FsModelRepository {
    root: PathBuf,
}

impl FsModelRepository {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
        Ok(FsModelRepository { root })
    }

    fn model_path(&self, run: &RunId) -> PathBuf {
        self.root.join(run.to_string()).join("model.bin")
    }
}

impl ModelRepository for FsModelRepository {
    fn save_model(&self, run: &RunId, model: &[u8]) -> Result<ModelArtifact> {
        let path = self.model_path(run);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let tmp = path.with_extension("bin.tmp");
        fs::write(&tmp, model).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("failed to replace {}", path.display()))?;
        debug!(run_id = %run, path = %path.display(), "stored model on disk");
        Ok(ModelArtifact {
            run_id: *run,
            location: path.display().to_string(),
            size: model.len() as u64,
            saved_at: crate::timestamp(),
        })
    }

    fn load_model(&self, run: &RunId) -> Result<Vec<u8>> {
        let path = self.model_path(run);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(Error::ModelNotFound(*run)),
            Err(err) => Err(Error::Backend(
                anyhow::Error::new(err).context(format!("failed to read {}", path.display())),
            )),
        }
    }
}
