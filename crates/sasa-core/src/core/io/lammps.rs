use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructureFileError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("No atom count line ('<N> atoms') found in header of '{path}'")]
    MissingAtomCount { path: String },
    #[error("Invalid atom count '{value}' in '{path}'")]
    InvalidAtomCount { path: String, value: String },
}

#[derive(Debug, Error)]
pub enum EnergyLogError {
    #[error("File I/O error for energy log '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Energy log '{path}' holds {found} value(s), expected at least 2")]
    TooFewValues { path: String, found: usize },
    #[error("Unparsable energy value '{value}' on line {line} of '{path}'")]
    InvalidValue {
        path: String,
        line: usize,
        value: String,
    },
}

/// Number of atoms of the macromolecule, read from the `N atoms` header line of a
/// LAMMPS data file.
pub fn count_atoms_in_data_file(path: &Path) -> Result<usize, StructureFileError> {
    count_atoms(path)
}

/// Number of atoms of the probe, read from the `N atoms` line of a LAMMPS molecule file.
pub fn count_atoms_in_molecule_file(path: &Path) -> Result<usize, StructureFileError> {
    count_atoms(path)
}

fn count_atoms(path: &Path) -> Result<usize, StructureFileError> {
    let file = File::open(path).map_err(|e| StructureFileError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_atom_count(&mut BufReader::new(file), path)
}

fn parse_atom_count(reader: &mut impl BufRead, path: &Path) -> Result<usize, StructureFileError> {
    // The first line of both formats is a free-form title.
    for line in reader.lines().skip(1) {
        let line = line.map_err(|e| StructureFileError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let content = line.split('#').next().unwrap_or("");
        let tokens: Vec<&str> = content.split_whitespace().collect();
        if let [count, "atoms"] = tokens.as_slice() {
            return count
                .parse::<usize>()
                .map_err(|_| StructureFileError::InvalidAtomCount {
                    path: path.display().to_string(),
                    value: count.to_string(),
                });
        }
    }
    Err(StructureFileError::MissingAtomCount {
        path: path.display().to_string(),
    })
}

/// Reads the two most recently appended energies from the evaluator's energy log.
///
/// Each non-empty line carries one record; its last whitespace-separated token is the
/// energy. Returns the values in file order (older first).
pub fn read_last_two_energies(path: &Path) -> Result<(f64, f64), EnergyLogError> {
    let content = std::fs::read_to_string(path).map_err(|e| EnergyLogError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let records: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();

    if records.len() < 2 {
        return Err(EnergyLogError::TooFewValues {
            path: path.display().to_string(),
            found: records.len(),
        });
    }

    let parse = |(idx, line): (usize, &str)| -> Result<f64, EnergyLogError> {
        let token = line.split_whitespace().last().unwrap_or("");
        token
            .parse::<f64>()
            .map_err(|_| EnergyLogError::InvalidValue {
                path: path.display().to_string(),
                line: idx + 1,
                value: token.to_string(),
            })
    };

    let first = parse(records[records.len() - 2])?;
    let second = parse(records[records.len() - 1])?;
    Ok((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    const DATA_FILE: &str = "\
LAMMPS data file via gro2lammps

1286 atoms
4 atom types

-40.0 40.0 xlo xhi

Atoms # charge

1 1 0.0 1.0 2.0 3.0
";

    const MOLECULE_FILE: &str = "\
# water probe

3 atoms

Coords

1 0.0 0.0 0.0
";

    #[test]
    fn counts_atoms_in_data_file_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("protein.data");
        fs::write(&path, DATA_FILE).unwrap();

        assert_eq!(count_atoms_in_data_file(&path).unwrap(), 1286);
    }

    #[test]
    fn counts_atoms_in_molecule_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h2o.mol");
        fs::write(&path, MOLECULE_FILE).unwrap();

        assert_eq!(count_atoms_in_molecule_file(&path).unwrap(), 3);
    }

    #[test]
    fn title_line_is_never_parsed_as_count() {
        let mut reader = Cursor::new("7 atoms\n\n2 atoms\n");
        assert_eq!(parse_atom_count(&mut reader, Path::new("t")).unwrap(), 2);
    }

    #[test]
    fn missing_count_line_is_an_error() {
        let mut reader = Cursor::new("title\n4 atom types\n");
        let err = parse_atom_count(&mut reader, Path::new("t")).unwrap_err();
        assert!(matches!(err, StructureFileError::MissingAtomCount { .. }));
    }

    #[test]
    fn invalid_count_is_an_error() {
        let mut reader = Cursor::new("title\n-3 atoms\n");
        let err = parse_atom_count(&mut reader, Path::new("t")).unwrap_err();
        assert!(matches!(err, StructureFileError::InvalidAtomCount { ref value, .. } if value == "-3"));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let dir = tempdir().unwrap();
        let err = count_atoms_in_data_file(&dir.path().join("absent.data")).unwrap_err();
        assert!(matches!(err, StructureFileError::Io { .. }));
    }

    #[test]
    fn reads_last_two_energies_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("etot");
        fs::write(&path, "-1.0\n0 -35210.482\n\n0 -2.114\n").unwrap();

        let (first, second) = read_last_two_energies(&path).unwrap();
        assert_eq!(first, -35210.482);
        assert_eq!(second, -2.114);
    }

    #[test]
    fn single_energy_is_too_few() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("etot");
        fs::write(&path, "-35210.482\n").unwrap();

        let err = read_last_two_energies(&path).unwrap_err();
        assert!(matches!(err, EnergyLogError::TooFewValues { found: 1, .. }));
    }

    #[test]
    fn garbage_energy_reports_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("etot");
        fs::write(&path, "-1.0\nERROR: lost atoms\n").unwrap();

        let err = read_last_two_energies(&path).unwrap_err();
        assert!(matches!(err, EnergyLogError::InvalidValue { line: 2, .. }));
    }
}
