//! Façades grouping the operations exposed by a [`TrackingContext`](crate::TrackingContext).

pub mod evaluation;
pub mod lifecycle;
pub mod model;
pub mod training;

pub use evaluation::EvaluationCatalog;
pub use lifecycle::LifeCycleCatalog;
pub use model::ModelCatalog;
pub use training::TrainingCatalog;

use crate::{
    api::{error::Result, repository::RunRepository, run::Run},
    RunId,
};

// Every mutation is preceded by this lookup, so a missing run fails with
// `RunNotFound` before anything is written.
fn existing_run(runs: &dyn RunRepository, id: &RunId) -> Result<Run> {
    runs.get_run(id)
}
