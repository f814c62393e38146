//! File formats touched by the orchestrator.
//!
//! The structure and probe files are only inspected (atom counts), never converted;
//! the evaluator reads them itself.

pub mod lammps;
pub mod points;
pub mod sink;
