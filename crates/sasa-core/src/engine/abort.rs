//! Run state machine shared by the orchestrator, the workers and the interrupt handler.
//!
//! ```text
//!             interrupt()               finish()
//!   Running ──────────────► Interrupting ────────► Aborted
//!      │  fail(cause)                                 ▲
//!      ├──────────────────────────────────────────────┘
//!      │  finish()
//!      └──────────────────► Completed
//! ```
//!
//! `Aborted` and `Completed` are terminal. The first transition out of `Running` decides
//! the abort cause; later interrupts or failures are ignored.

use crate::core::models::ids::ResidueId;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Interrupting,
    Aborted,
    Completed,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Interrupting,
            2 => Self::Aborted,
            _ => Self::Completed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Interrupting => 1,
            Self::Aborted => 2,
            Self::Completed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Aborted | Self::Completed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AbortCause {
    /// External interrupt (e.g. Ctrl+C) during dispatch.
    OperatorCancellation,
    /// An evaluator invocation failed; `diagnostic` is the captured process output.
    EvaluatorFailure {
        task_index: usize,
        residue: ResidueId,
        message: String,
        diagnostic: String,
    },
}

impl fmt::Display for AbortCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorCancellation => write!(f, "cancelled by operator"),
            Self::EvaluatorFailure {
                task_index,
                residue,
                message,
                ..
            } => write!(
                f,
                "evaluator failed on task {} (residue {}): {}",
                task_index, residue, message
            ),
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    cause: OnceLock<AbortCause>,
}

/// Owner side of the run state machine. Cheap to clone; all clones share one state.
#[derive(Debug, Clone)]
pub struct AbortController {
    shared: Arc<Shared>,
}

/// Read-only view handed to evaluators: "should I stop?".
#[derive(Debug, Clone)]
pub struct CancellationToken {
    shared: Arc<Shared>,
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortController {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(RunState::Running.as_u8()),
                cause: OnceLock::new(),
            }),
        }
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() != RunState::Running
    }

    /// Operator-requested cancel. Returns `true` if this call moved the run out of
    /// `Running`.
    pub fn interrupt(&self) -> bool {
        let moved = self.transition(RunState::Running, RunState::Interrupting);
        if moved {
            let _ = self.shared.cause.set(AbortCause::OperatorCancellation);
            warn!("Interrupt received; terminating worker pool.");
        } else {
            debug!(state = ?self.state(), "Interrupt ignored; run is no longer running.");
        }
        moved
    }

    /// Fail-fast on a task failure. Returns `true` if this failure is the abort cause.
    pub fn fail(&self, cause: AbortCause) -> bool {
        let moved = self.transition(RunState::Running, RunState::Aborted);
        if moved {
            warn!(%cause, "Aborting run.");
            let _ = self.shared.cause.set(cause);
        } else {
            debug!(%cause, "Additional failure after abort; ignored.");
        }
        moved
    }

    /// Settles the state once the pool has shut down and returns the terminal state.
    pub fn finish(&self) -> RunState {
        if self.transition(RunState::Running, RunState::Completed) {
            return RunState::Completed;
        }
        self.transition(RunState::Interrupting, RunState::Aborted);
        self.state()
    }

    pub fn cause(&self) -> Option<AbortCause> {
        self.shared.cause.get().cloned()
    }

    fn transition(&self, from: RunState, to: RunState) -> bool {
        self.shared
            .state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        self.shared.state.load(Ordering::SeqCst) != RunState::Running.as_u8()
    }
}
