//! Interfaces of the external geometry stages.
//!
//! Sampling points on the scaled van-der-Waals spheres, filtering occluded points, and
//! orienting multi-atom probes all happen outside the orchestrator. It only relies on
//! the three stages being synchronous and returning sequences aligned with the retained
//! sample points.

use super::io::points::PointsFileError;
use super::models::geometry::{Orientation, Position};
use super::models::ids::ResidueId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error(transparent)]
    PointsFile(#[from] PointsFileError),

    #[error("Sample point ({x:.3}, {y:.3}, {z:.3}) is unknown to the neighbor table")]
    UnknownPoint { x: f64, y: f64, z: f64 },

    #[error("No orientation available for sample point {index}")]
    MissingOrientation { index: usize },

    #[error(
        "Sample points were generated with probe radius scale {recorded}, but {requested} was requested"
    )]
    RadiusScaleMismatch { recorded: f64, requested: f64 },
}

pub trait SurfaceSampler {
    /// Candidate probe positions on the structure's atom spheres, scaled by
    /// `probe_radius_scale`, at most `max_samples` per atom, occluded points removed.
    fn sample_points(
        &self,
        probe_radius_scale: f64,
        max_samples: usize,
    ) -> Result<Vec<Position>, GeometryError>;
}

pub trait NeighborFinder {
    /// Residue owning each point; the result is aligned with `points`.
    fn find_occluding_neighbors(&self, points: &[Position])
    -> Result<Vec<ResidueId>, GeometryError>;
}

pub trait OrientationSolver {
    /// Probe rotation for each point so that the probe faces the macromolecule the same
    /// way everywhere; the result is aligned with `points`.
    fn compute_orientations(
        &self,
        points: &[Position],
        residues: &[ResidueId],
    ) -> Result<Vec<Orientation>, GeometryError>;
}
