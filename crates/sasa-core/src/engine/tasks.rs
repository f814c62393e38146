use super::error::EngineError;
use crate::core::models::geometry::{Orientation, Position};
use crate::core::models::ids::ResidueId;
use crate::core::models::task::{BaselinePair, TaskDescriptor};

/// Orientation source for a batch of tasks.
#[derive(Debug, Clone, Copy)]
pub enum ProbeOrientations<'a> {
    /// Single-atom probe: every task gets [`Orientation::Isotropic`].
    Isotropic,
    /// One orientation per sample point, aligned with the positions.
    PerPoint(&'a [Orientation]),
}

impl ProbeOrientations<'_> {
    fn get(&self, index: usize) -> Orientation {
        match self {
            Self::Isotropic => Orientation::Isotropic,
            Self::PerPoint(orientations) => orientations[index],
        }
    }
}

/// Zips aligned positions, residues and orientations into task descriptors.
///
/// The output has one task per position, in input order, with `index` set to the
/// position in the input. Misaligned inputs are a precondition failure.
pub fn build_tasks(
    positions: &[Position],
    residues: &[ResidueId],
    orientations: ProbeOrientations<'_>,
    template: &str,
    atom_count: usize,
    baseline: BaselinePair,
) -> Result<Vec<TaskDescriptor>, EngineError> {
    if residues.len() != positions.len() {
        return Err(EngineError::Precondition(format!(
            "{} sample positions but {} residue identifiers",
            positions.len(),
            residues.len()
        )));
    }
    if let ProbeOrientations::PerPoint(list) = orientations {
        if list.len() != positions.len() {
            return Err(EngineError::Precondition(format!(
                "{} sample positions but {} probe orientations",
                positions.len(),
                list.len()
            )));
        }
    }

    Ok(positions
        .iter()
        .zip(residues)
        .enumerate()
        .map(|(index, (position, residue))| TaskDescriptor {
            index,
            template: template.to_string(),
            position: *position,
            orientation: orientations.get(index),
            atom_count,
            residue: *residue,
            baseline,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn baseline() -> BaselinePair {
        BaselinePair::new(-35210.5, -2.25).unwrap()
    }

    fn positions() -> Vec<Position> {
        vec![
            Position::new(1.0, 2.0, 3.0),
            Position::new(-4.5, 0.0, 7.25),
            Position::new(0.125, -9.0, 2.0),
        ]
    }

    #[test]
    fn zips_inputs_element_wise() {
        let positions = positions();
        let residues = [ResidueId(12), ResidueId(12), ResidueId(40)];
        let orientations = [
            Orientation::aligned(30.0, Vector3::x()).unwrap(),
            Orientation::aligned(45.0, Vector3::new(0.0, 1.0, 1.0)).unwrap(),
            Orientation::aligned(90.0, Vector3::z()).unwrap(),
        ];

        let tasks = build_tasks(
            &positions,
            &residues,
            ProbeOrientations::PerPoint(&orientations),
            "in.template",
            812,
            baseline(),
        )
        .unwrap();

        assert_eq!(tasks.len(), 3);
        for (i, task) in tasks.iter().enumerate() {
            assert_eq!(task.index, i);
            assert_eq!(task.position, positions[i]);
            assert_eq!(task.residue, residues[i]);
            assert_eq!(task.orientation, orientations[i]);
            assert_eq!(task.atom_count, 812);
            assert_eq!(task.template, "in.template");
            assert_eq!(task.baseline, baseline());
        }
    }

    #[test]
    fn single_atom_probe_never_yields_a_zero_axis() {
        let positions = positions();
        let residues = [ResidueId(1), ResidueId(2), ResidueId(3)];

        let tasks = build_tasks(
            &positions,
            &residues,
            ProbeOrientations::Isotropic,
            "in.template",
            10,
            baseline(),
        )
        .unwrap();

        for task in &tasks {
            assert!(task.orientation.is_isotropic());
            let (angle, axis) = task.orientation.angle_axis();
            assert_eq!(angle, 0.0);
            assert!(axis.norm() > 0.0);
        }
    }

    #[test]
    fn empty_inputs_produce_no_tasks() {
        let tasks =
            build_tasks(&[], &[], ProbeOrientations::PerPoint(&[]), "in.template", 5, baseline())
                .unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn misaligned_residues_are_a_precondition_failure() {
        let result = build_tasks(
            &positions(),
            &[ResidueId(1)],
            ProbeOrientations::Isotropic,
            "in.template",
            5,
            baseline(),
        );
        assert!(matches!(result, Err(EngineError::Precondition(_))));
    }

    #[test]
    fn misaligned_orientations_are_a_precondition_failure() {
        let orientations = [Orientation::Isotropic];
        let result = build_tasks(
            &positions(),
            &[ResidueId(1), ResidueId(2), ResidueId(3)],
            ProbeOrientations::PerPoint(&orientations),
            "in.template",
            5,
            baseline(),
        );
        match result {
            Err(EngineError::Precondition(message)) => {
                assert!(message.contains("3 sample positions but 1 probe orientations"))
            }
            other => panic!("expected precondition failure, got {:?}", other),
        }
    }
}
