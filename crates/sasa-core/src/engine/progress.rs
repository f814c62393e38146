//! Progress events emitted while a run advances.
//!
//! The engine never draws anything itself; front-ends install a callback and map these
//! events onto whatever display they own.

/// One progress notification.
#[derive(Debug, Clone)]
pub enum Progress {
    /// A run phase ("Preparation", "Baseline", "Sampling", "Probing") begins.
    PhaseStart { name: &'static str },
    PhaseFinish,

    /// Dispatch begins with `total_steps` tasks.
    TaskStart { total_steps: u64 },
    /// One evaluator invocation succeeded. Emitted from worker threads.
    TaskIncrement,
    /// Dispatch ended, whether completed or aborted.
    TaskFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards events to an optional callback; shared by reference across workers.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Sends a free-text message; `text` is only evaluated when a callback is installed.
    pub fn message(&self, text: impl FnOnce() -> String) {
        if let Some(cb) = &self.callback {
            cb(Progress::Message(text()));
        }
    }
}
