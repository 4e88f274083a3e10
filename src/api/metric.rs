use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{convert::TryFrom, fmt};

use crate::{api::error::Error, RunId};

/// The families of structured metrics a run can carry, one record per kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    ConfusionMatrix,
}

impl MetricKind {
    /// Stable key used by backends to name the record.
    pub fn key(self) -> &'static str {
        match self {
            MetricKind::ConfusionMatrix => "confusion_matrix",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::ConfusionMatrix => f.write_str("confusion matrix"),
        }
    }
}

/// A structured metric as persisted by a backend.
///
/// `serialized_details` is whatever the evaluation side produced, kept as
/// JSON text; backends store it without looking inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub run_id: RunId,
    pub kind: MetricKind,
    pub serialized_details: String,
    pub logged_at: DateTime<Utc>,
}

impl MetricRecord {
    pub(crate) fn encode<T: Serialize>(run_id: RunId, kind: MetricKind, value: &T) -> Result<Self, Error> {
        let serialized_details = serde_json::to_string(value)
            .map_err(|err| Error::invalid(format!("{} is not serializable: {}", kind, err)))?;
        Ok(MetricRecord {
            run_id,
            kind,
            serialized_details,
            logged_at: crate::timestamp(),
        })
    }

    pub(crate) fn decode<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_str(&self.serialized_details).map_err(|err| {
            Error::Backend(anyhow::Error::new(err).context(format!(
                "stored {} of run {} is corrupt",
                self.kind, self.run_id
            )))
        })
    }
}

/// A single named measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarMetric {
    pub run_id: RunId,
    pub key: String,
    pub value: f64,
    pub logged_at: DateTime<Utc>,
}

/// Whether larger or smaller values of a metric are better.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Goal {
    Maximize,
    Minimize,
}

/// Counts of predicted against actual classes.
///
/// `counts[actual][predicted]`, rows and columns ordered like `class_names`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConfusionMatrix")]
pub struct ConfusionMatrix {
    class_names: Vec<String>,
    counts: Vec<Vec<u64>>,
}

// Stored payloads go through `ConfusionMatrix::new` so a ragged matrix never
// decodes.
#[derive(Deserialize)]
struct RawConfusionMatrix {
    class_names: Vec<String>,
    counts: Vec<Vec<u64>>,
}

impl TryFrom<RawConfusionMatrix> for ConfusionMatrix {
    type Error = Error;

    fn try_from(raw: RawConfusionMatrix) -> Result<Self, Self::Error> {
        ConfusionMatrix::new(raw.class_names, raw.counts)
    }
}

impl ConfusionMatrix {
    pub fn new(class_names: Vec<String>, counts: Vec<Vec<u64>>) -> Result<Self, Error> {
        if class_names.is_empty() {
            return Err(Error::invalid("a confusion matrix needs at least one class"));
        }
        if counts.len() != class_names.len() || counts.iter().any(|row| row.len() != class_names.len()) {
            return Err(Error::invalid(format!(
                "a confusion matrix over {} classes must be {n}x{n}",
                class_names.len(),
                n = class_names.len()
            )));
        }
        Ok(ConfusionMatrix { class_names, counts })
    }

    /// Binary matrix from the usual four counts, classes `["positive", "negative"]`.
    pub fn binary(true_positives: u64, false_negatives: u64, false_positives: u64, true_negatives: u64) -> Self {
        ConfusionMatrix {
            class_names: vec!["positive".to_owned(), "negative".to_owned()],
            counts: vec![
                vec![true_positives, false_negatives],
                vec![false_positives, true_negatives],
            ],
        }
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn counts(&self) -> &[Vec<u64>] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// Share of samples on the diagonal, `None` for an empty matrix.
    pub fn accuracy(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let correct: u64 = (0..self.counts.len()).map(|i| self.counts[i][i]).sum();
        Some(correct as f64 / total as f64)
    }
}

/// A logged confusion matrix, as handed back by the evaluation catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrixRecord {
    record: MetricRecord,
}

impl ConfusionMatrixRecord {
    pub(crate) fn new(record: MetricRecord) -> Self {
        ConfusionMatrixRecord { record }
    }

    pub fn run_id(&self) -> &RunId {
        &self.record.run_id
    }

    pub fn serialized_details(&self) -> &str {
        &self.record.serialized_details
    }

    pub fn logged_at(&self) -> DateTime<Utc> {
        self.record.logged_at
    }

    pub fn matrix(&self) -> Result<ConfusionMatrix, Error> {
        self.record.decode()
    }
}
