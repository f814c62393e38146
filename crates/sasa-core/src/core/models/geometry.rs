use nalgebra::{Point3, Unit, Vector3};

/// Cartesian probe position in Angstroms.
pub type Position = Point3<f64>;

const AXIS_NORM_EPSILON: f64 = 1e-9;

/// Rotation applied to the probe molecule before it is placed at a sample point.
///
/// A zero rotation axis is not representable: `Aligned` always carries a unit vector,
/// and `Isotropic` is resolved to a fixed axis only when the evaluator command line is
/// built (see [`Orientation::angle_axis`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Orientation {
    /// Rotate by `angle` (degrees) around `axis`.
    Aligned {
        angle: f64,
        axis: Unit<Vector3<f64>>,
    },
    /// Single-atom probe; any rotation leaves it unchanged.
    Isotropic,
}

impl Orientation {
    /// Builds an aligned orientation, returning `None` for a (near) zero or non-finite axis.
    pub fn aligned(angle: f64, axis: Vector3<f64>) -> Option<Self> {
        if !angle.is_finite() || axis.iter().any(|c| !c.is_finite()) {
            return None;
        }
        Unit::try_new(axis, AXIS_NORM_EPSILON).map(|axis| Self::Aligned { angle, axis })
    }

    /// Angle and axis handed to the evaluator.
    ///
    /// For `Isotropic` the angle is zero, so the rotation is the identity for every axis;
    /// the evaluator still rejects a zero axis vector, hence +y.
    pub fn angle_axis(&self) -> (f64, Vector3<f64>) {
        match self {
            Self::Aligned { angle, axis } => (*angle, axis.into_inner()),
            Self::Isotropic => (0.0, Vector3::y()),
        }
    }

    pub fn is_isotropic(&self) -> bool {
        matches!(self, Self::Isotropic)
    }
}
