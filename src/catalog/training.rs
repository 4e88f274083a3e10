use std::{collections::BTreeMap, sync::Arc, time::Duration, time::Instant};
use tracing::debug;

use crate::{
    api::{
        error::{Error, Result},
        repository::RunRepository,
    },
    RunId,
};

/// Hyperparameters and timing of the training step of a run.
#[derive(Clone)]
pub struct TrainingCatalog {
    runs: Arc<dyn RunRepository>,
}

impl TrainingCatalog {
    pub(crate) fn new(runs: Arc<dyn RunRepository>) -> Self {
        TrainingCatalog { runs }
    }

    /// Records a hyperparameter, overwriting an earlier value under `key`.
    pub fn log_hyperparameter(&self, run: &RunId, key: &str, value: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(Error::invalid("the hyperparameter name must not be empty"));
        }
        super::existing_run(self.runs.as_ref(), run)?;
        self.runs.log_hyperparameter(run, key, value)?;
        debug!(run_id = %run, key, value, "logged hyperparameter");
        Ok(())
    }

    pub fn hyperparameters(&self, run: &RunId) -> Result<BTreeMap<String, String>> {
        Ok(super::existing_run(self.runs.as_ref(), run)?.hyperparameters)
    }

    pub fn set_training_time(&self, run: &RunId, training_time: Duration) -> Result<()> {
        super::existing_run(self.runs.as_ref(), run)?;
        self.runs.set_training_time(run, training_time)
    }

    /// Runs `train` and records how long it took as the training time of `run`.
    ///
    /// The run is checked before `train` is called. If `train` fails, its
    /// error is handed back and no training time is written.
    pub fn train<T, E, F>(&self, run: &RunId, train: F) -> Result<Result<T, E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        super::existing_run(self.runs.as_ref(), run)?;
        let start = Instant::now();
        let outcome = train();
        let elapsed = start.elapsed();
        if outcome.is_ok() {
            self.runs.set_training_time(run, elapsed)?;
            debug!(run_id = %run, ?elapsed, "timed training");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::memory::InMemoryStorage, catalog::LifeCycleCatalog};

    fn catalogs() -> (LifeCycleCatalog, TrainingCatalog, RunId) {
        let storage = Arc::new(InMemoryStorage::new());
        let lifecycle = LifeCycleCatalog::new(storage.clone(), storage.clone());
        let experiment = lifecycle.create_experiment("exp").unwrap();
        let run = lifecycle.create_run(&experiment, "Test").unwrap();
        (lifecycle, TrainingCatalog::new(storage), run)
    }

    #[test]
    fn hyperparameters_overwrite_by_key() {
        let (_, training, run) = catalogs();
        training.log_hyperparameter(&run, "learning_rate", "0.1").unwrap();
        training.log_hyperparameter(&run, "learning_rate", "0.01").unwrap();
        training.log_hyperparameter(&run, "epochs", "10").unwrap();

        let params = training.hyperparameters(&run).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params["learning_rate"], "0.01");
    }

    #[test]
    fn hyperparameter_on_unknown_run_fails() {
        let (_, training, _) = catalogs();
        let err = training.log_hyperparameter(&RunId::generate(), "k", "v").unwrap_err();
        assert!(matches!(err, Error::RunNotFound(_)));
    }

    #[test]
    fn train_records_elapsed_time() {
        let (lifecycle, training, run) = catalogs();
        let outcome = training
            .train(&run, || {
                std::thread::sleep(Duration::from_millis(5));
                Ok::<_, String>(42)
            })
            .unwrap();
        assert_eq!(outcome, Ok(42));
        let training_time = lifecycle.get_run(&run).unwrap().training_time.unwrap();
        assert!(training_time >= Duration::from_millis(5));
    }

    #[test]
    fn failed_training_records_nothing() {
        let (lifecycle, training, run) = catalogs();
        let outcome = training.train(&run, || Err::<(), _>("diverged")).unwrap();
        assert_eq!(outcome, Err("diverged"));
        assert_eq!(lifecycle.get_run(&run).unwrap().training_time, None);
    }

    #[test]
    fn train_checks_run_first() {
        let (_, training, _) = catalogs();
        let mut called = false;
        let result = training.train(&RunId::generate(), || {
            called = true;
            Ok::<_, ()>(())
        });
        assert!(matches!(result, Err(Error::RunNotFound(_))));
        assert!(!called);
    }
}
