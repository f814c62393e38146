//! Append-only result file.
//!
//! Line 1 holds the number of retained sample points, line 2 the column names, and every
//! completed task contributes one tab-separated record. Records are written by the
//! evaluator itself, in completion order.

use crate::core::models::geometry::Position;
use crate::core::models::ids::ResidueId;
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const COLUMNS: &str = "atom\tx\ty\tz\tres\tetot/eV\teint/eV";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error on result file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Malformed result file '{path}': {reason}")]
    Malformed { path: String, reason: String },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultRecord {
    pub atom: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub res: i64,
    #[serde(rename = "etot/eV")]
    pub total_energy: f64,
    #[serde(rename = "eint/eV")]
    pub interaction_energy: f64,
}

impl ResultRecord {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y, self.z)
    }

    pub fn residue(&self) -> ResidueId {
        ResidueId(self.res)
    }

    #[cfg(test)]
    fn to_line(&self) -> String {
        format!(
            "{}\t{:.3}\t{:.3}\t{:.3}\t{}\t{:.6}\t{:.6}\n",
            self.atom, self.x, self.y, self.z, self.res, self.total_energy, self.interaction_energy
        )
    }
}

/// Header written once before dispatch, independent of how many tasks follow.
pub fn header(n_probes: usize) -> String {
    format!("{}\n{}\n", n_probes, COLUMNS)
}

#[derive(Debug, Clone)]
pub struct ResultSink {
    path: PathBuf,
}

impl ResultSink {
    /// Truncates (or creates) the result file and writes the header.
    pub fn open(path: &Path, n_probes: usize) -> Result<Self, SinkError> {
        let io_err = |e| SinkError::Io {
            path: path.display().to_string(),
            source: e,
        };
        let mut file = File::create(path).map_err(io_err)?;
        file.write_all(header(n_probes).as_bytes()).map_err(io_err)?;
        file.sync_data().map_err(io_err)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Handle to a result file that has already been opened (header written), for
    /// reading back records the evaluator appended.
    pub fn attach(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record the way the evaluator does: a single write on an `O_APPEND`
    /// handle, so concurrent appenders never interleave within a line.
    #[cfg(test)]
    pub(crate) fn append(&self, record: &ResultRecord) -> Result<(), SinkError> {
        let io_err = |e| SinkError::Io {
            path: self.path.display().to_string(),
            source: e,
        };
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(record.to_line().as_bytes()).map_err(io_err)
    }

    /// Probe count announced in the header.
    pub fn announced_probes(&self) -> Result<usize, SinkError> {
        let content = self.read_to_string()?;
        let first = content.lines().next().unwrap_or("");
        first.trim().parse().map_err(|_| SinkError::Malformed {
            path: self.path.display().to_string(),
            reason: format!("first line '{}' is not a probe count", first),
        })
    }

    /// All records appended so far, in file (completion) order.
    pub fn read_records(&self) -> Result<Vec<ResultRecord>, SinkError> {
        let content = self.read_to_string()?;
        let body = match content.split_once('\n') {
            Some((_, rest)) => rest,
            None => {
                return Err(SinkError::Malformed {
                    path: self.path.display().to_string(),
                    reason: "missing column header".to_string(),
                });
            }
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .trim(Trim::All)
            .from_reader(body.as_bytes());
        reader
            .deserialize::<ResultRecord>()
            .map(|r| {
                r.map_err(|e| SinkError::Csv {
                    path: self.path.display().to_string(),
                    source: e,
                })
            })
            .collect()
    }

    fn read_to_string(&self) -> Result<String, SinkError> {
        std::fs::read_to_string(&self.path).map_err(|e| SinkError::Io {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::tempdir;

    fn record(atom: usize, res: i64) -> ResultRecord {
        ResultRecord {
            atom,
            x: 1.0,
            y: 2.0,
            z: 3.0,
            res,
            total_energy: -1520.5,
            interaction_energy: -0.125,
        }
    }

    #[test]
    fn empty_run_produces_header_only_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spec.xyz");

        let sink = ResultSink::open(&path, 0).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "0\natom\tx\ty\tz\tres\tetot/eV\teint/eV\n");
        assert_eq!(sink.announced_probes().unwrap(), 0);
        assert!(sink.read_records().unwrap().is_empty());
    }

    #[test]
    fn open_truncates_previous_results() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spec.xyz");
        std::fs::write(&path, "stale content\n").unwrap();

        let sink = ResultSink::open(&path, 3).unwrap();

        assert_eq!(sink.announced_probes().unwrap(), 3);
        assert!(!std::fs::read_to_string(&path).unwrap().contains("stale"));
    }

    #[test]
    fn appended_records_are_read_back_in_file_order() {
        let dir = tempdir().unwrap();
        let sink = ResultSink::open(&dir.path().join("spec.xyz"), 2).unwrap();

        sink.append(&record(5, 2)).unwrap();
        sink.append(&record(1, 1)).unwrap();

        let records = sink.read_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].atom, 5);
        assert_eq!(records[0].residue(), ResidueId(2));
        assert_eq!(records[1].position(), Position::new(1.0, 2.0, 3.0));
        assert_eq!(records[1].interaction_energy, -0.125);
    }

    #[test]
    fn concurrent_appends_keep_lines_intact() {
        let dir = tempdir().unwrap();
        let sink = ResultSink::open(&dir.path().join("spec.xyz"), 64).unwrap();

        thread::scope(|s| {
            for worker in 0..4 {
                let sink = &sink;
                s.spawn(move || {
                    for i in 0..16 {
                        sink.append(&record(worker * 16 + i, worker as i64)).unwrap();
                    }
                });
            }
        });

        let mut atoms: Vec<usize> = sink.read_records().unwrap().iter().map(|r| r.atom).collect();
        atoms.sort_unstable();
        assert_eq!(atoms, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn attach_reads_records_written_by_the_evaluator() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spec.xyz");
        std::fs::write(
            &path,
            "2\natom\tx\ty\tz\tres\tetot/eV\teint/eV\n\
             17\t1.250\t-0.500\t3.000\t4\t-1526.330112\t-0.041201\n",
        )
        .unwrap();

        let sink = ResultSink::attach(&path);

        assert_eq!(sink.announced_probes().unwrap(), 2);
        let records = sink.read_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].atom, 17);
        assert_eq!(records[0].residue(), ResidueId(4));
        assert_eq!(records[0].interaction_energy, -0.041201);
    }

    #[test]
    fn malformed_count_line_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spec.xyz");
        let sink = ResultSink::open(&path, 1).unwrap();
        std::fs::write(&path, "many\n").unwrap();

        assert!(matches!(
            sink.announced_probes(),
            Err(SinkError::Malformed { .. })
        ));
    }
}
