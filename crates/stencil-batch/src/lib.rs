#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Run configuration.
pub mod config;

/// Error types of the batch pipeline.
pub mod error;

/// Template loading, target discovery and the per-target job loop.
pub mod orchestrator;

/// Per-target and per-pair results of a run.
pub mod outcome;

/// Side-by-side match visualization and artifact export.
pub mod render;

pub use crate::config::BatchConfig;
pub use crate::error::{BatchError, ExportError, LoadError};
pub use crate::orchestrator::{run, Orchestrator};
pub use crate::outcome::{BatchReport, BatchSummary};
