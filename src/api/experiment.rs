use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ExperimentId;

/// A named line of investigation grouping any number of runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: ExperimentId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Experiment {
    pub(crate) fn new(name: &str) -> Self {
        Experiment {
            experiment_id: ExperimentId::generate(),
            name: name.to_owned(),
            created_at: crate::timestamp(),
        }
    }
}
