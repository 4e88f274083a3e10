use thiserror::Error;

use crate::{api::metric::MetricKind, RunId};

/// Failures raised by a storage backend (I/O, connectivity, corrupt documents).
pub type StorageError = anyhow::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("The experiment {0} does not exist")]
    ExperimentNotFound(String),
    #[error("The run with id {0} does not exist")]
    RunNotFound(RunId),
    #[error("no {kind} was logged for the run with id {run}")]
    MetricNotFound { run: RunId, kind: MetricKind },
    #[error("no model was saved for the run with id {0}")]
    ModelNotFound(RunId),
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("an error ocurred in the storage backend: {0:?}")]
    Backend(#[from] StorageError),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Whether the error reports a missing experiment, run, metric or model.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ExperimentNotFound(_)
                | Error::RunNotFound(_)
                | Error::MetricNotFound { .. }
                | Error::ModelNotFound(_)
        )
    }
}
