use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RunId;

/// Reference to a stored model binary.
///
/// `location` is a handle only the repository that produced it understands:
/// a file path, a URL or an in-memory key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub run_id: RunId,
    pub location: String,
    pub size: u64,
    pub saved_at: DateTime<Utc>,
}
