use super::geometry::{Orientation, Position};
use super::ids::ResidueId;

/// Reference energies of the isolated macromolecule and the isolated probe.
///
/// Both values are finite; every later interaction energy is reported relative to them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselinePair {
    macromolecule: f64,
    probe: f64,
}

impl BaselinePair {
    /// Placeholder passed to the baseline invocations themselves.
    pub(crate) const UNSET: Self = Self {
        macromolecule: 0.0,
        probe: 0.0,
    };

    pub fn new(macromolecule: f64, probe: f64) -> Option<Self> {
        (macromolecule.is_finite() && probe.is_finite()).then_some(Self {
            macromolecule,
            probe,
        })
    }

    pub fn macromolecule(&self) -> f64 {
        self.macromolecule
    }

    pub fn probe(&self) -> f64 {
        self.probe
    }
}

/// One self-contained probe placement handed to a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    /// Submission index (input order).
    pub index: usize,
    pub template: String,
    pub position: Position,
    pub orientation: Orientation,
    /// Number of atoms in the macromolecule.
    pub atom_count: usize,
    pub residue: ResidueId,
    pub baseline: BaselinePair,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_pair_accepts_finite_values() {
        let pair = BaselinePair::new(-1520.25, -3.5).unwrap();
        assert_eq!(pair.macromolecule(), -1520.25);
        assert_eq!(pair.probe(), -3.5);
    }

    #[test]
    fn baseline_pair_rejects_non_finite_values() {
        assert!(BaselinePair::new(f64::NAN, 0.0).is_none());
        assert!(BaselinePair::new(0.0, f64::INFINITY).is_none());
        assert!(BaselinePair::new(f64::NEG_INFINITY, f64::NAN).is_none());
    }
}
