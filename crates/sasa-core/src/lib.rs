//! # sasaprobe Core Library
//!
//! Run orchestration for solvent-accessible-surface (SASA) probing of a macromolecule.
//! A probe molecule is placed at every accessible surface point of a target structure
//! and an external molecular energy evaluator computes the interaction energy there.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`TaskDescriptor`, `Orientation`,
//!   `BaselinePair`), structure and point-file inspection, the result sink, and the
//!   interfaces of the external geometry collaborators.
//!
//! - **[`engine`]: The Logic Core.** The stateful orchestration machinery: run context,
//!   baseline evaluation, task construction, the bounded worker pool, and the abort
//!   controller enforcing fail-fast semantics against a possibly-failing evaluator.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together into a complete
//!   probing run with a single entry point.

pub mod core;
pub mod engine;
pub mod workflows;
