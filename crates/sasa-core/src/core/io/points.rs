//! Reader for precomputed sample points.
//!
//! The file is tab-separated with a header row:
//!
//! ```text
//! atom  x  y  z  res  [angle  ax  ay  az]
//! ```
//!
//! Lines starting with `#` are comments. The rotation columns are optional per row; a row
//! without them describes a point for an isotropic (single-atom) probe.
//!
//! The sampler that produced the file should record the radius scale it used in a
//! `# probe-radius-scale: <value>` comment. A run requesting a different scale is
//! rejected, since the points cannot be resampled here.

use crate::core::models::geometry::{Orientation, Position};
use crate::core::models::ids::ResidueId;
use crate::core::surface::{GeometryError, NeighborFinder, OrientationSolver, SurfaceSampler};
use csv::{ReaderBuilder, StringRecord, Trim};
use nalgebra::Vector3;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

const RADIUS_SCALE_DIRECTIVE: &str = "probe-radius-scale:";
const RADIUS_SCALE_TOLERANCE: f64 = 1e-9;

const REQUIRED_COLUMNS: [&str; 5] = ["atom", "x", "y", "z", "res"];
const ROTATION_COLUMNS: [&str; 4] = ["angle", "ax", "ay", "az"];

#[derive(Debug, Error)]
pub enum PointsFileError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("Missing required column '{column}' in '{path}'")]
    MissingColumn { path: String, column: &'static str },
    #[error("Invalid value '{value}' for column '{column}' on line {line}")]
    InvalidValue {
        line: u64,
        column: &'static str,
        value: String,
    },
    #[error("Incomplete rotation on line {line}: either all or none of angle/ax/ay/az must be given")]
    PartialRotation { line: u64 },
    #[error("Zero rotation axis on line {line}")]
    ZeroAxis { line: u64 },
    #[error("Sample points {first} and {second} share position ({x:.3}, {y:.3}, {z:.3})")]
    DuplicatePosition {
        first: usize,
        second: usize,
        x: f64,
        y: f64,
        z: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplePoint {
    /// Index of the atom whose sphere the point was sampled from.
    pub atom: usize,
    pub position: Position,
    pub residue: ResidueId,
    pub orientation: Option<Orientation>,
}

/// Geometry collaborators backed by a file of already sampled, filtered and oriented
/// points.
///
/// Positions are unique: residue and orientation lookups are keyed by position.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedGeometry {
    points: Vec<SamplePoint>,
    index: HashMap<[u64; 3], usize>,
    probe_radius_scale: Option<f64>,
}

struct ColumnMap {
    required: [usize; 5],
    rotation: Option<[usize; 4]>,
}

impl PrecomputedGeometry {
    pub fn from_points(points: Vec<SamplePoint>) -> Result<Self, PointsFileError> {
        let mut index = HashMap::with_capacity(points.len());
        for (i, point) in points.iter().enumerate() {
            if let Some(&first) = index.get(&position_key(&point.position)) {
                return Err(PointsFileError::DuplicatePosition {
                    first,
                    second: i,
                    x: point.position.x,
                    y: point.position.y,
                    z: point.position.z,
                });
            }
            index.insert(position_key(&point.position), i);
        }
        Ok(Self {
            points,
            index,
            probe_radius_scale: None,
        })
    }

    /// Records the radius scale the points were sampled with.
    pub fn with_probe_radius_scale(mut self, scale: f64) -> Self {
        self.probe_radius_scale = Some(scale);
        self
    }

    pub fn load(path: &Path) -> Result<Self, PointsFileError> {
        let content = std::fs::read_to_string(path).map_err(|e| PointsFileError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let recorded_scale = recorded_radius_scale(&content)?;

        let csv_err = |e| PointsFileError::Csv {
            path: path.display().to_string(),
            source: e,
        };
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .flexible(true)
            .trim(Trim::All)
            .from_reader(content.as_bytes());

        let headers = reader.headers().map_err(csv_err)?.clone();
        let columns = resolve_columns(&headers, path)?;

        let mut points = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            points.push(parse_record(&record, &columns)?);
        }

        debug!(count = points.len(), path = %path.display(), "Loaded precomputed sample points.");
        let geometry = Self::from_points(points)?;
        Ok(match recorded_scale {
            Some(scale) => geometry.with_probe_radius_scale(scale),
            None => geometry,
        })
    }

    /// Radius scale the points were sampled with, if the file records it.
    pub fn probe_radius_scale(&self) -> Option<f64> {
        self.probe_radius_scale
    }

    pub fn points(&self) -> &[SamplePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn lookup(&self, position: &Position) -> Result<&SamplePoint, GeometryError> {
        self.index
            .get(&position_key(position))
            .map(|&i| &self.points[i])
            .ok_or(GeometryError::UnknownPoint {
                x: position.x,
                y: position.y,
                z: position.z,
            })
    }
}

impl SurfaceSampler for PrecomputedGeometry {
    fn sample_points(
        &self,
        probe_radius_scale: f64,
        max_samples: usize,
    ) -> Result<Vec<Position>, GeometryError> {
        match self.probe_radius_scale {
            Some(recorded) if (recorded - probe_radius_scale).abs() > RADIUS_SCALE_TOLERANCE => {
                return Err(GeometryError::RadiusScaleMismatch {
                    recorded,
                    requested: probe_radius_scale,
                });
            }
            Some(_) => {}
            None => warn!(
                probe_radius_scale,
                "Sample points do not record their radius scale; cannot verify the requested one."
            ),
        }
        let mut per_atom: HashMap<usize, usize> = HashMap::new();
        Ok(self
            .points
            .iter()
            .filter(|point| {
                let seen = per_atom.entry(point.atom).or_insert(0);
                *seen += 1;
                *seen <= max_samples
            })
            .map(|point| point.position)
            .collect())
    }
}

impl NeighborFinder for PrecomputedGeometry {
    fn find_occluding_neighbors(
        &self,
        points: &[Position],
    ) -> Result<Vec<ResidueId>, GeometryError> {
        points
            .iter()
            .map(|p| self.lookup(p).map(|point| point.residue))
            .collect()
    }
}

impl OrientationSolver for PrecomputedGeometry {
    fn compute_orientations(
        &self,
        points: &[Position],
        _residues: &[ResidueId],
    ) -> Result<Vec<Orientation>, GeometryError> {
        points
            .iter()
            .enumerate()
            .map(|(index, p)| {
                self.lookup(p)?
                    .orientation
                    .ok_or(GeometryError::MissingOrientation { index })
            })
            .collect()
    }
}

fn recorded_radius_scale(content: &str) -> Result<Option<f64>, PointsFileError> {
    for (number, line) in content.lines().enumerate() {
        let Some(comment) = line.trim_start().strip_prefix('#') else {
            continue;
        };
        let Some(raw) = comment.trim().strip_prefix(RADIUS_SCALE_DIRECTIVE) else {
            continue;
        };
        let raw = raw.trim();
        return raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
            .map(Some)
            .ok_or_else(|| PointsFileError::InvalidValue {
                line: number as u64 + 1,
                column: "probe-radius-scale",
                value: raw.to_string(),
            });
    }
    Ok(None)
}

fn position_key(position: &Position) -> [u64; 3] {
    [position.x.to_bits(), position.y.to_bits(), position.z.to_bits()]
}

fn resolve_columns(headers: &StringRecord, path: &Path) -> Result<ColumnMap, PointsFileError> {
    let find = |name: &str| headers.iter().position(|h| h == name);

    let mut required = [0usize; 5];
    for (slot, column) in required.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = find(column).ok_or_else(|| PointsFileError::MissingColumn {
            path: path.display().to_string(),
            column,
        })?;
    }

    let rotation = match ROTATION_COLUMNS.map(find) {
        [Some(a), Some(x), Some(y), Some(z)] => Some([a, x, y, z]),
        _ => None,
    };

    Ok(ColumnMap { required, rotation })
}

fn parse_record(record: &StringRecord, columns: &ColumnMap) -> Result<SamplePoint, PointsFileError> {
    let line = record.position().map_or(0, |p| p.line());

    let field = |idx: usize, column: &'static str| -> Result<&str, PointsFileError> {
        record
            .get(idx)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PointsFileError::InvalidValue {
                line,
                column,
                value: String::new(),
            })
    };
    let float = |idx: usize, column: &'static str| -> Result<f64, PointsFileError> {
        let raw = field(idx, column)?;
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| PointsFileError::InvalidValue {
                line,
                column,
                value: raw.to_string(),
            })
    };

    let [atom_idx, x_idx, y_idx, z_idx, res_idx] = columns.required;
    let atom_raw = field(atom_idx, "atom")?;
    let atom = atom_raw
        .parse::<usize>()
        .map_err(|_| PointsFileError::InvalidValue {
            line,
            column: "atom",
            value: atom_raw.to_string(),
        })?;
    let res_raw = field(res_idx, "res")?;
    let residue = res_raw
        .parse::<ResidueId>()
        .map_err(|_| PointsFileError::InvalidValue {
            line,
            column: "res",
            value: res_raw.to_string(),
        })?;
    let position = Position::new(float(x_idx, "x")?, float(y_idx, "y")?, float(z_idx, "z")?);

    let orientation = match columns.rotation {
        None => None,
        Some(rotation) => {
            let present = rotation
                .iter()
                .filter(|&&idx| record.get(idx).is_some_and(|v| !v.is_empty()))
                .count();
            match present {
                0 => None,
                4 => {
                    let [a, ax, ay, az] = rotation;
                    let axis = Vector3::new(float(ax, "ax")?, float(ay, "ay")?, float(az, "az")?);
                    Some(
                        Orientation::aligned(float(a, "angle")?, axis)
                            .ok_or(PointsFileError::ZeroAxis { line })?,
                    )
                }
                _ => return Err(PointsFileError::PartialRotation { line }),
            }
        }
    };

    Ok(SamplePoint {
        atom,
        position,
        residue,
        orientation,
    })
}
