//! Invocation contract of the external energy evaluator.
//!
//! One invocation is one blocking single-point calculation. On success the evaluator
//! has appended its own result record (probe invocations) or energy log entry (baseline
//! invocations); only success or failure of the call is inspected here.

mod process;

pub use process::ProcessEvaluator;

use super::abort::CancellationToken;
use crate::core::models::geometry::{Orientation, Position};
use crate::core::models::ids::ResidueId;
use crate::core::models::task::{BaselinePair, TaskDescriptor};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineTarget {
    Macromolecule,
    Probe,
}

impl BaselineTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Macromolecule => "macromolecule",
            Self::Probe => "probe",
        }
    }
}

impl fmt::Display for BaselineTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Baseline(BaselineTarget),
    Probe { task_index: usize },
}

/// Everything one evaluator call needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation<'a> {
    pub stage: Stage,
    pub template: &'a str,
    pub position: Position,
    pub orientation: Orientation,
    pub atom_count: usize,
    pub residue: ResidueId,
    pub baseline: BaselinePair,
}

impl<'a> Invocation<'a> {
    /// Degenerate geometry: origin, no rotation, no baseline yet.
    pub fn baseline(template: &'a str, target: BaselineTarget) -> Self {
        Self {
            stage: Stage::Baseline(target),
            template,
            position: Position::origin(),
            orientation: Orientation::Isotropic,
            atom_count: 0,
            residue: ResidueId::default(),
            baseline: BaselinePair::UNSET,
        }
    }
}

impl<'a> From<&'a TaskDescriptor> for Invocation<'a> {
    fn from(task: &'a TaskDescriptor) -> Self {
        Self {
            stage: Stage::Probe {
                task_index: task.index,
            },
            template: &task.template,
            position: task.position,
            orientation: task.orientation,
            atom_count: task.atom_count,
            residue: task.residue,
            baseline: task.baseline,
        }
    }
}

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Failed to launch evaluator '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Evaluator exited with {}", describe_status(.status))]
    NonZeroExit {
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Evaluator invocation was cancelled")]
    Cancelled,

    #[error("I/O error while waiting for evaluator: {0}")]
    Io(#[from] std::io::Error),

    #[error("Evaluator failed: {0}")]
    Other(String),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

impl EvaluatorError {
    /// Captured evaluator output, surfaced verbatim to the operator.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::NonZeroExit { stdout, stderr, .. } => match (stdout.is_empty(), stderr.is_empty()) {
                (false, false) => format!("{}\n{}", stdout, stderr),
                (false, true) => stdout.clone(),
                (true, _) => stderr.clone(),
            },
            other => other.to_string(),
        }
    }
}

/// The external single-point energy evaluator.
///
/// Implementations block until the calculation finishes, and should return
/// [`EvaluatorError::Cancelled`] promptly once `cancel` reports cancellation.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        invocation: &Invocation<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), EvaluatorError>;
}


#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::core::io::sink::{ResultRecord, ResultSink};
    use std::collections::HashSet;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    /// In-process stand-in for the external evaluator.
    ///
    /// Baseline invocations append an energy to the energy log, probe invocations append a
    /// result record to the result file, exactly like the real input templates do.
    pub(crate) struct MockEvaluator {
        pub energy_log: PathBuf,
        pub output: PathBuf,
        pub baseline_energies: (f64, f64),
        pub fail_baseline: bool,
        pub fail_residues: HashSet<ResidueId>,
        pub delay: Duration,
        calls: Mutex<Vec<Stage>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockEvaluator {
        pub fn new(dir: &Path) -> Self {
            Self {
                energy_log: dir.join("etot"),
                output: dir.join("spec.xyz"),
                baseline_energies: (-35210.5, -2.25),
                fail_baseline: false,
                fail_residues: HashSet::new(),
                delay: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        pub fn failing_on(mut self, residues: &[i64]) -> Self {
            self.fail_residues = residues.iter().copied().map(ResidueId).collect();
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn calls(&self) -> Vec<Stage> {
            self.calls.lock().unwrap().clone()
        }

        pub fn probe_calls(&self) -> usize {
            self.calls()
                .iter()
                .filter(|s| matches!(s, Stage::Probe { .. }))
                .count()
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        fn wait(&self, cancel: &CancellationToken) -> Result<(), EvaluatorError> {
            let step = Duration::from_millis(5);
            let mut waited = Duration::ZERO;
            while waited < self.delay {
                if cancel.is_cancelled() {
                    return Err(EvaluatorError::Cancelled);
                }
                thread::sleep(step);
                waited += step;
            }
            Ok(())
        }

        fn run(&self, invocation: &Invocation<'_>, cancel: &CancellationToken) -> Result<(), EvaluatorError> {
            if cancel.is_cancelled() {
                return Err(EvaluatorError::Cancelled);
            }
            match invocation.stage {
                Stage::Baseline(target) => {
                    if self.fail_baseline {
                        return Err(EvaluatorError::NonZeroExit {
                            status: Some(1),
                            stdout: "ERROR: Unknown pair style".to_string(),
                            stderr: String::new(),
                        });
                    }
                    let energy = match target {
                        BaselineTarget::Macromolecule => self.baseline_energies.0,
                        BaselineTarget::Probe => self.baseline_energies.1,
                    };
                    let mut log = OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&self.energy_log)?;
                    writeln!(log, "0 {}", energy)?;
                    Ok(())
                }
                Stage::Probe { task_index } => {
                    if self.fail_residues.contains(&invocation.residue) {
                        return Err(EvaluatorError::NonZeroExit {
                            status: Some(1),
                            stdout: format!("ERROR on task {}: Lost atoms", task_index),
                            stderr: String::new(),
                        });
                    }
                    self.wait(cancel)?;
                    let etot = invocation.baseline.macromolecule() + invocation.baseline.probe() - 1.0;
                    ResultSink::attach(&self.output)
                        .append(&ResultRecord {
                            atom: task_index + 1,
                            x: invocation.position.x,
                            y: invocation.position.y,
                            z: invocation.position.z,
                            res: invocation.residue.0,
                            total_energy: etot,
                            interaction_energy: -1.0,
                        })
                        .map_err(|e| EvaluatorError::Other(e.to_string()))
                }
            }
        }
    }

    impl Evaluator for MockEvaluator {
        fn evaluate(
            &self,
            invocation: &Invocation<'_>,
            cancel: &CancellationToken,
        ) -> Result<(), EvaluatorError> {
            self.calls.lock().unwrap().push(invocation.stage);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let result = self.run(invocation, cancel);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }
}
