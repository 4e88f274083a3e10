//! Storage backends shipped with the crate.
//!
//! Any other store can be plugged in by implementing the traits in
//! [`crate::api::repository`].

pub mod fs;
pub mod memory;
pub mod rest;
