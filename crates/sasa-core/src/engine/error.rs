use thiserror::Error;

use super::config::ConfigError;
use crate::core::io::lammps::StructureFileError;
use crate::core::io::sink::SinkError;
use crate::core::surface::GeometryError;

/// Fatal errors that stop a run before or outside task dispatch.
///
/// Failures of individual tasks are not errors of this type: they end the run with
/// [`RunOutcome::Aborted`](super::scheduler::RunOutcome::Aborted).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Baseline energies unavailable: {reason}")]
    BaselineUnavailable { reason: String },

    #[error("Invalid run configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Structure file error: {0}")]
    Structure(#[from] StructureFileError),

    #[error("Geometry stage failed: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Result file error: {0}")]
    Sink(#[from] SinkError),

    #[error("Failed to prepare execution directory '{path}': {source}")]
    Workspace {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
}
