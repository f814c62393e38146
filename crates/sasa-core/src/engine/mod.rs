//! # Engine Module
//!
//! This module implements run orchestration for SASA probing: everything between
//! "here is a structure, a probe and an evaluator" and "the result file is complete".
//!
//! ## Overview
//!
//! A run first establishes reference energies of the isolated macromolecule and probe,
//! then turns every retained sample point into an independent task, and dispatches the
//! tasks to a bounded pool of workers. Each worker blocks on one external evaluator
//! process at a time. A single evaluator failure aborts the whole run; an operator
//! interrupt cancels it. In both cases queued tasks are never started and running
//! evaluator processes are killed.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Immutable run context shared by all workers
//! - **Error Handling** ([`error`]) - Fatal, pre-dispatch error taxonomy
//! - **Progress Monitoring** ([`progress`]) - Phase and per-task progress callbacks
//! - **Evaluator** ([`evaluator`]) - Invocation contract and the process-backed evaluator
//! - **Workspace** ([`workspace`]) - Execution directory preparation
//! - **Baseline** ([`baseline`]) - Reference energies of the isolated molecules
//! - **Task Builder** ([`tasks`]) - Zips aligned inputs into task descriptors
//! - **Abort Controller** ([`abort`]) - Run state machine and cancellation token
//! - **Scheduler** ([`scheduler`]) - Bounded worker pool with fail-fast dispatch

pub mod abort;
pub mod baseline;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod progress;
pub mod scheduler;
pub mod tasks;
pub mod workspace;
