use anyhow::Context;
use std::{fs, path::Path, sync::Arc};
use tracing::info;

use crate::{
    api::{
        error::Result,
        model::ModelArtifact,
        repository::{ModelRepository, RunRepository},
    },
    RunId,
};

/// Model binaries produced by a run.
#[derive(Clone)]
pub struct ModelCatalog {
    runs: Arc<dyn RunRepository>,
    models: Arc<dyn ModelRepository>,
}

impl ModelCatalog {
    pub(crate) fn new(runs: Arc<dyn RunRepository>, models: Arc<dyn ModelRepository>) -> Self {
        ModelCatalog { runs, models }
    }

    /// Stores the model and records the reference on the run.
    pub fn upload_model(&self, run: &RunId, model: &[u8]) -> Result<ModelArtifact> {
        super::existing_run(self.runs.as_ref(), run)?;
        let artifact = self.models.save_model(run, model)?;
        self.runs.set_model(run, &artifact)?;
        info!(run_id = %run, location = %artifact.location, size = artifact.size, "uploaded model");
        Ok(artifact)
    }

    pub fn upload_model_file(&self, run: &RunId, path: impl AsRef<Path>) -> Result<ModelArtifact> {
        let path = path.as_ref();
        super::existing_run(self.runs.as_ref(), run)?;
        let model = fs::read(path).with_context(|| format!("failed to read model file {}", path.display()))?;
        self.upload_model(run, &model)
    }

    pub fn download_model(&self, run: &RunId) -> Result<Vec<u8>> {
        super::existing_run(self.runs.as_ref(), run)?;
        self.models.load_model(run)
    }

    pub fn download_model_file(&self, run: &RunId, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let model = self.download_model(run)?;
        fs::write(path, model).with_context(|| format!("failed to write model file {}", path.display()))?;
        Ok(())
    }
}
