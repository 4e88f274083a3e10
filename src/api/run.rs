use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};

use crate::{
    api::{model::ModelArtifact, opt_duration_nanos},
    ExperimentId, RunId,
};

/// One attempt within an experiment.
///
/// The parent experiment is fixed at creation. Everything else only ever gets
/// filled in: a run stays open for new metrics even after it was trained or
/// marked as completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunId,
    pub experiment_id: ExperimentId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "opt_duration_nanos")]
    pub training_time: Option<Duration>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hyperparameters: BTreeMap<String, String>,
    #[serde(default)]
    pub model: Option<ModelArtifact>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No training time recorded yet.
    Created,
    Trained,
}

impl Run {
    pub(crate) fn new(experiment_id: ExperimentId, name: &str) -> Self {
        Run {
            run_id: RunId::generate(),
            experiment_id,
            name: name.to_owned(),
            created_at: crate::timestamp(),
            training_time: None,
            completed_at: None,
            hyperparameters: BTreeMap::new(),
            model: None,
        }
    }

    pub fn state(&self) -> RunState {
        match self.training_time {
            Some(_) => RunState::Trained,
            None => RunState::Created,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_run_is_created_state() {
        let run = Run::new(ExperimentId::generate(), "Test");
        assert_eq!(run.state(), RunState::Created);
        assert!(!run.is_completed());
        assert!(run.hyperparameters.is_empty());
    }

    #[test]
    fn training_time_survives_json_exactly() {
        let mut run = Run::new(ExperimentId::generate(), "Test");
        run.training_time = Some(Duration::new(300, 123_456_789));
        let json = serde_json::to_string(&run).unwrap();
        let parsed: Run = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, run);
        assert_eq!(parsed.state(), RunState::Trained);
    }

    #[test]
    fn parse_run_without_optional_fields() {
        let json = r#"
        {
            "run_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "experiment_id": "936da01f-9abd-4d9d-80c7-02af85c822a8",
            "name": "Test",
            "created_at": "2020-11-29T10:00:00Z"
        }
        "#;
        let parsed = serde_json::from_str::<Run>(json).unwrap();
        assert_eq!(
            parsed.experiment_id.to_string(),
            "936da01f-9abd-4d9d-80c7-02af85c822a8"
        );
        assert_eq!(parsed.training_time, None);
        assert!(parsed.model.is_none());
    }
}
