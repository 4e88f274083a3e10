use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    api::{
        error::{Error, Result},
        metric::{ConfusionMatrix, ConfusionMatrixRecord, Goal, MetricKind, MetricRecord, ScalarMetric},
        repository::{ExperimentRepository, MetricRepository, RunRepository},
        run::Run,
    },
    ExperimentId, RunId,
};

/// Evaluation results of a run.
#[derive(Clone)]
pub struct EvaluationCatalog {
    experiments: Arc<dyn ExperimentRepository>,
    runs: Arc<dyn RunRepository>,
    metrics: Arc<dyn MetricRepository>,
}

impl EvaluationCatalog {
    pub(crate) fn new(
        experiments: Arc<dyn ExperimentRepository>,
        runs: Arc<dyn RunRepository>,
        metrics: Arc<dyn MetricRepository>,
    ) -> Self {
        EvaluationCatalog {
            experiments,
            runs,
            metrics,
        }
    }

    /// Stores `matrix` for the run, replacing one logged earlier.
    pub fn log_confusion_matrix(&self, run: &RunId, matrix: &ConfusionMatrix) -> Result<()> {
        super::existing_run(self.runs.as_ref(), run)?;
        let record = MetricRecord::encode(*run, MetricKind::ConfusionMatrix, matrix)?;
        self.metrics.save_metric(&record)?;
        debug!(run_id = %run, "logged confusion matrix");
        Ok(())
    }

    /// Fails with `RunNotFound` for an unknown run and with `MetricNotFound`
    /// if the run exists but never had a matrix logged.
    pub fn get_confusion_matrix(&self, run: &RunId) -> Result<ConfusionMatrixRecord> {
        super::existing_run(self.runs.as_ref(), run)?;
        let record = self.metrics.get_metric(run, MetricKind::ConfusionMatrix)?;
        Ok(ConfusionMatrixRecord::new(record))
    }

    pub fn log_metric(&self, run: &RunId, key: &str, value: f64) -> Result<()> {
        if key.trim().is_empty() {
            warn!(run_id = %run, "rejected metric without a name");
            return Err(Error::invalid("the metric name must not be empty"));
        }
        if !value.is_finite() {
            return Err(Error::invalid(format!("the metric {} must be finite, got {}", key, value)));
        }
        super::existing_run(self.runs.as_ref(), run)?;
        self.metrics.log_scalar(&ScalarMetric {
            run_id: *run,
            key: key.to_owned(),
            value,
            logged_at: crate::timestamp(),
        })
    }

    /// Scalar metrics of the run in logging order.
    pub fn get_metrics(&self, run: &RunId) -> Result<Vec<ScalarMetric>> {
        super::existing_run(self.runs.as_ref(), run)?;
        self.metrics.scalars(run)
    }

    /// The run of `experiment` whose latest value of `key` is best, or `None`
    /// if no run logged `key`.
    pub fn best_run(&self, experiment: &ExperimentId, key: &str, goal: Goal) -> Result<Option<Run>> {
        self.experiments.get_experiment(experiment)?;
        let mut best: Option<(f64, Run)> = None;
        for run in self.runs.list_runs(experiment)? {
            let latest = self
                .metrics
                .scalars(&run.run_id)?
                .into_iter()
                .rev()
                .find(|metric| metric.key == key);
            let value = match latest {
                Some(metric) => metric.value,
                None => continue,
            };
            let better = match &best {
                None => true,
                Some((current, _)) => match goal {
                    Goal::Maximize => value > *current,
                    Goal::Minimize => value < *current,
                },
            };
            if better {
                best = Some((value, run));
            }
        }
        Ok(best.map(|(_, run)| run))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::memory::InMemoryStorage, catalog::LifeCycleCatalog};

    fn catalogs() -> (LifeCycleCatalog, EvaluationCatalog) {
        let storage = Arc::new(InMemoryStorage::new());
        (
            LifeCycleCatalog::new(storage.clone(), storage.clone()),
            EvaluationCatalog::new(storage.clone(), storage.clone(), storage),
        )
    }

    fn run(lifecycle: &LifeCycleCatalog) -> RunId {
        let experiment = lifecycle.create_experiment("exp").unwrap();
        lifecycle.create_run(&experiment, "Test").unwrap()
    }

    #[test]
    fn confusion_matrix_round_trip() {
        let (lifecycle, evaluation) = catalogs();
        let run = run(&lifecycle);
        let matrix = ConfusionMatrix::binary(3, 1, 0, 4);

        evaluation.log_confusion_matrix(&run, &matrix).unwrap();

        let record = evaluation.get_confusion_matrix(&run).unwrap();
        assert!(!record.serialized_details().is_empty());
        assert_eq!(record.run_id(), &run);
        assert_eq!(record.matrix().unwrap(), matrix);
    }

    #[test]
    fn confusion_matrix_misses_are_distinguishable() {
        let (lifecycle, evaluation) = catalogs();
        let run = run(&lifecycle);
        assert!(matches!(
            evaluation.get_confusion_matrix(&run),
            Err(Error::MetricNotFound { .. })
        ));
        assert!(matches!(
            evaluation.get_confusion_matrix(&RunId::generate()),
            Err(Error::RunNotFound(_))
        ));
        assert!(matches!(
            evaluation.log_confusion_matrix(&RunId::generate(), &ConfusionMatrix::binary(1, 0, 0, 1)),
            Err(Error::RunNotFound(_))
        ));
    }

    #[test]
    fn scalar_metrics_are_validated() {
        let (lifecycle, evaluation) = catalogs();
        let run = run(&lifecycle);
        assert!(matches!(evaluation.log_metric(&run, "", 1.0), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            evaluation.log_metric(&run, "loss", f64::NAN),
            Err(Error::InvalidArgument(_))
        ));
        evaluation.log_metric(&run, "loss", 0.25).unwrap();
        let metrics = evaluation.get_metrics(&run).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].key, "loss");
    }

    #[test]
    fn best_run_uses_latest_value() {
        let (lifecycle, evaluation) = catalogs();
        let experiment = lifecycle.create_experiment("exp").unwrap();
        let a = lifecycle.create_run(&experiment, "a").unwrap();
        let b = lifecycle.create_run(&experiment, "b").unwrap();
        let silent = lifecycle.create_run(&experiment, "silent").unwrap();
        evaluation.log_metric(&a, "accuracy", 0.95).unwrap();
        evaluation.log_metric(&a, "accuracy", 0.60).unwrap();
        evaluation.log_metric(&b, "accuracy", 0.80).unwrap();
        evaluation.log_metric(&silent, "loss", 0.1).unwrap();

        let best = evaluation.best_run(&experiment, "accuracy", Goal::Maximize).unwrap();
        assert_eq!(best.map(|run| run.run_id), Some(b));
        let worst = evaluation.best_run(&experiment, "accuracy", Goal::Minimize).unwrap();
        assert_eq!(worst.map(|run| run.run_id), Some(a));
        assert!(evaluation.best_run(&experiment, "f1", Goal::Maximize).unwrap().is_none());
    }

    #[test]
    fn best_run_of_unknown_experiment_fails() {
        let (_, evaluation) = catalogs();
        let err = evaluation
            .best_run(&ExperimentId::generate(), "accuracy", Goal::Maximize)
            .unwrap_err();
        assert!(matches!(err, Error::ExperimentNotFound(_)));
    }
}
