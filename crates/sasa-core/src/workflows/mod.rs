//! # Workflows Module
//!
//! High-level entry points that run a complete SASA probing job, from an empty
//! execution directory to a finished (or explicitly aborted) result file.
//!
//! ## Overview
//!
//! A workflow wires the engine pieces together in their required order: execution
//! directory preparation, baseline energies, geometry stages, task construction and
//! bounded dispatch. Callers supply the geometry collaborators and the evaluator, and get
//! back a [`probe::RunReport`] describing what happened.
//!
//! ## Architecture
//!
//! - **Probe Workflow** ([`probe`]) - Baseline, sampling and fail-fast dispatch of one
//!   evaluator invocation per retained sample point.

pub mod probe;
