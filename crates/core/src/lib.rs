//! Domain types shared across the genrelay workspace.
//!
//! Pure data and validation only: the model catalog, the job state machine,
//! error types, and the provider seam. No I/O happens in this crate.

pub mod catalog;
pub mod error;
pub mod job;
pub mod provider;
pub mod types;
