//! # Core Module
//!
//! Stateless building blocks of a probing run.
//!
//! - **Models** ([`models`]) - Positions, orientations, residue identifiers, task descriptors
//!   and baseline energies.
//! - **I/O** ([`io`]) - Structure/probe file inspection, precomputed sample points, the
//!   evaluator energy log, and the tab-separated result sink.
//! - **Surface collaborators** ([`surface`]) - Interfaces of the external geometry stages
//!   (surface sampling, occlusion filtering, probe orientation).

pub mod io;
pub mod models;
pub mod surface;
