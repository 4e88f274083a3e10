use std::sync::Arc;
use tracing::info;

use crate::{
    api::{
        error::{Error, Result},
        repository::{ExperimentRepository, MetadataStore, MetricRepository, ModelRepository, RunRepository},
    },
    backend::{
        fs::{FsModelRepository, FsStorage},
        memory::{InMemoryModelRepository, InMemoryStorage},
        rest::HttpModelRepository,
    },
    catalog::{EvaluationCatalog, LifeCycleCatalog, ModelCatalog, TrainingCatalog},
    config::{ModelRepositoryConfig, StorageConfig, TrackingConfig},
};

/// The access point for tracking code.
///
/// Built once by a [`ContextBuilder`] and cheap to clone; clones share the
/// same backends and can be handed to other threads.
#[derive(Clone)]
pub struct TrackingContext {
    lifecycle: LifeCycleCatalog,
    evaluation: EvaluationCatalog,
    training: TrainingCatalog,
    model: ModelCatalog,
}

impl TrackingContext {
    /// Experiments, runs and their state.
    pub fn lifecycle(&self) -> &LifeCycleCatalog {
        &self.lifecycle
    }

    /// Evaluation metrics of a run.
    pub fn evaluation(&self) -> &EvaluationCatalog {
        &self.evaluation
    }

    /// Hyperparameters and training time of a run.
    pub fn training(&self) -> &TrainingCatalog {
        &self.training
    }

    /// Model binaries of a run.
    pub fn model(&self) -> &ModelCatalog {
        &self.model
    }
}

struct Metadata {
    experiments: Arc<dyn ExperimentRepository>,
    runs: Arc<dyn RunRepository>,
    metrics: Arc<dyn MetricRepository>,
}

/// Picks one backend per capability and wires the catalogs against them.
#[derive(Default)]
pub struct ContextBuilder {
    metadata: Option<Metadata>,
    models: Option<Arc<dyn ModelRepository>>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the backends named in `config`.
    pub fn from_config(config: &TrackingConfig) -> Result<Self> {
        let builder = match &config.storage {
            StorageConfig::Memory => ContextBuilder::new().use_storage(InMemoryStorage::new()),
            StorageConfig::Filesystem { root } => ContextBuilder::new().use_storage(FsStorage::open(root)?),
        };
        let builder = match &config.model_repository {
            ModelRepositoryConfig::Memory => builder.use_model_repository(InMemoryModelRepository::new()),
            ModelRepositoryConfig::Filesystem { root } => {
                builder.use_model_repository(FsModelRepository::open(root)?)
            }
            ModelRepositoryConfig::Http { url } => builder.use_model_repository(HttpModelRepository::new(url.as_str())),
        };
        Ok(builder)
    }

    /// Keeps experiments, runs and metrics in `storage`, replacing an earlier choice.
    pub fn use_storage<S>(mut self, storage: S) -> Self
    where
        S: MetadataStore + 'static,
    {
        let storage = Arc::new(storage);
        self.metadata = Some(Metadata {
            experiments: storage.clone(),
            runs: storage.clone(),
            metrics: storage,
        });
        self
    }

    /// Keeps model binaries in `models`, replacing an earlier choice.
    pub fn use_model_repository<M>(mut self, models: M) -> Self
    where
        M: ModelRepository + 'static,
    {
        self.models = Some(Arc::new(models));
        self
    }

    pub fn build(self) -> Result<TrackingContext> {
        let metadata = self
            .metadata
            .ok_or_else(|| Error::Configuration("no storage backend configured".to_owned()))?;
        let models = self
            .models
            .ok_or_else(|| Error::Configuration("no model repository configured".to_owned()))?;
        info!("assembled tracking context");
        Ok(TrackingContext {
            lifecycle: LifeCycleCatalog::new(metadata.experiments.clone(), metadata.runs.clone()),
            evaluation: EvaluationCatalog::new(
                metadata.experiments,
                metadata.runs.clone(),
                metadata.metrics,
            ),
            training: TrainingCatalog::new(metadata.runs.clone()),
            model: ModelCatalog::new(metadata.runs, models),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::metric::ConfusionMatrix, ExperimentId, RunId};
    use proptest::prelude::*;
    use std::{thread, time::Duration};

    fn context() -> TrackingContext {
        ContextBuilder::new()
            .use_model_repository(InMemoryModelRepository::new())
            .use_storage(InMemoryStorage::new())
            .build()
            .unwrap()
    }

    #[test]
    fn missing_storage_fails_at_build() {
        let err = ContextBuilder::new()
            .use_model_repository(InMemoryModelRepository::new())
            .build()
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "invalid configuration: no storage backend configured");
    }

    #[test]
    fn missing_model_repository_fails_at_build() {
        let err = ContextBuilder::new()
            .use_storage(InMemoryStorage::new())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn create_experiment_returns_uuid() {
        let context = context();
        let id = context.lifecycle().create_experiment("first experiment").unwrap();
        let parsed: ExperimentId = id.to_string().parse().unwrap();
        assert!(!parsed.as_uuid().is_nil());
        assert_eq!(
            context.lifecycle().get_experiment(&id).unwrap().name,
            "first experiment"
        );
    }

    #[test]
    fn set_training_time_on_run() {
        let context = context();
        let experiment = context.lifecycle().create_experiment("exp").unwrap();
        let run = context.lifecycle().create_run(&experiment, "Test").unwrap();

        context
            .lifecycle()
            .set_training_time(&run, Duration::from_secs(5 * 60))
            .unwrap();

        let run = context.lifecycle().get_run(&run).unwrap();
        assert_eq!(run.training_time, Some(Duration::from_secs(300)));
    }

    #[test]
    fn set_training_time_without_run_fails() {
        let context = context();
        let run = RunId::generate();
        let err = context
            .lifecycle()
            .set_training_time(&run, Duration::from_secs(300))
            .unwrap_err();
        assert!(err.to_string().contains(&run.to_string()));
        assert!(matches!(err, Error::RunNotFound(_)));
    }

    #[test]
    fn log_confusion_matrix_on_run() {
        let context = context();
        let experiment = context.lifecycle().create_experiment("exp").unwrap();
        let run = context.lifecycle().create_run(&experiment, "Test").unwrap();
        let matrix = ConfusionMatrix::binary(3, 0, 1, 4);

        context.evaluation().log_confusion_matrix(&run, &matrix).unwrap();

        let logged = context.evaluation().get_confusion_matrix(&run).unwrap();
        assert!(!logged.serialized_details().is_empty());
        assert_eq!(logged.matrix().unwrap(), matrix);
    }

    #[test]
    fn filesystem_context_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackingConfig {
            storage: StorageConfig::Filesystem {
                root: dir.path().join("meta"),
            },
            model_repository: ModelRepositoryConfig::Filesystem {
                root: dir.path().join("models"),
            },
        };
        let context = ContextBuilder::from_config(&config).unwrap().build().unwrap();
        let experiment = context.lifecycle().create_experiment("on disk").unwrap();
        let run = context.lifecycle().create_run(&experiment, "Test").unwrap();
        context.model().upload_model(&run, b"weights").unwrap();

        let reopened = ContextBuilder::from_config(&config).unwrap().build().unwrap();
        let stored = reopened.lifecycle().get_run(&run).unwrap();
        assert!(stored.model.is_some());
        assert_eq!(reopened.model().download_model(&run).unwrap(), b"weights".to_vec());
    }

    #[test]
    fn context_is_shared_across_threads() {
        let context = context();
        let experiment = context.lifecycle().create_experiment("parallel").unwrap();
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let context = context.clone();
                thread::spawn(move || {
                    let run = context
                        .lifecycle()
                        .create_run(&experiment, &format!("run {}", i))
                        .unwrap();
                    context.evaluation().log_metric(&run, "loss", f64::from(i)).unwrap();
                    context
                        .lifecycle()
                        .set_training_time(&run, Duration::from_millis(u64::from(i)))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let runs = context.lifecycle().list_runs(&experiment).unwrap();
        assert_eq!(runs.len(), 8);
        assert!(runs.iter().all(|run| run.training_time.is_some()));
    }

    proptest! {
        #[test]
        fn prop_confusion_matrix_round_trips(tp in 0u64..1000, fn_ in 0u64..1000, fp in 0u64..1000, tn in 0u64..1000) {
            let context = context();
            let experiment = context.lifecycle().create_experiment("exp").unwrap();
            let run = context.lifecycle().create_run(&experiment, "Test").unwrap();
            let matrix = ConfusionMatrix::binary(tp, fn_, fp, tn);
            context.evaluation().log_confusion_matrix(&run, &matrix).unwrap();
            let logged = context.evaluation().get_confusion_matrix(&run).unwrap();
            prop_assert!(!logged.serialized_details().is_empty());
            prop_assert_eq!(logged.matrix().unwrap(), matrix);
        }

        #[test]
        fn prop_unknown_run_leaves_no_record(secs in 0u64..100_000) {
            let context = context();
            let run = RunId::generate();
            let result = context.lifecycle().set_training_time(&run, Duration::from_secs(secs));
            prop_assert!(matches!(result, Err(Error::RunNotFound(_))));
            prop_assert!(context.lifecycle().get_run(&run).is_err());
        }
    }
}
