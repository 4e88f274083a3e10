//! Tracking of machine learning experiments, runs and their metrics.
//!
//! A [`TrackingContext`] is assembled once with a [`ContextBuilder`], choosing
//! one storage backend for the metadata and one repository for model
//! binaries. Everything afterwards goes through its catalogs:
//!
//! ```
//! use mltrack::{backend::memory::{InMemoryModelRepository, InMemoryStorage}, ContextBuilder};
//! use std::time::Duration;
//!
//! let context = ContextBuilder::new()
//!     .use_storage(InMemoryStorage::new())
//!     .use_model_repository(InMemoryModelRepository::new())
//!     .build()
//!     .unwrap();
//!
//! let experiment = context.lifecycle().create_experiment("first experiment").unwrap();
//! let run = context.lifecycle().create_run(&experiment, "Test").unwrap();
//! context.lifecycle().set_training_time(&run, Duration::from_secs(300)).unwrap();
//!
//! let run = context.lifecycle().get_run(&run).unwrap();
//! assert_eq!(run.training_time, Some(Duration::from_secs(300)));
//! ```

pub mod api;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod context;

pub use api::error::{Error, Result};
pub use api::id::{ExperimentId, RunId};
pub use config::TrackingConfig;
pub use context::{ContextBuilder, TrackingContext};

/// Utility function to create a tracking timestamp.
pub fn timestamp() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}
