use super::abort::{AbortCause, AbortController, CancellationToken, RunState};
use super::config::RunContext;
use super::error::EngineError;
use super::evaluator::{Evaluator, EvaluatorError, Invocation};
use super::progress::{Progress, ProgressReporter};
use crate::core::models::task::TaskDescriptor;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    /// The result file is incomplete and must not be post-processed.
    Aborted(AbortCause),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Monotonic counters, readable while dispatch is in progress.
#[derive(Debug, Default)]
pub struct DispatchCounters {
    dispatched: AtomicU64,
    completed: AtomicU64,
}

impl DispatchCounters {
    /// Tasks handed to an evaluator so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// Tasks whose evaluator invocation succeeded so far.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}

/// Dispatches tasks to a fixed-size pool of workers, one task per free worker.
///
/// Each worker blocks on one evaluator invocation at a time. The first evaluator failure
/// aborts the run through the [`AbortController`]; after that (or after an operator
/// interrupt) no queued task is started and running invocations are cancelled.
pub struct Scheduler<'a, E: Evaluator + ?Sized> {
    evaluator: &'a E,
    controller: &'a AbortController,
    reporter: &'a ProgressReporter<'a>,
    counters: DispatchCounters,
}

impl<'a, E: Evaluator + ?Sized> Scheduler<'a, E> {
    pub fn new(
        evaluator: &'a E,
        controller: &'a AbortController,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            evaluator,
            controller,
            reporter,
            counters: DispatchCounters::default(),
        }
    }

    pub fn counters(&self) -> &DispatchCounters {
        &self.counters
    }

    #[instrument(skip_all, name = "scheduler", fields(tasks = tasks.len(), workers = context.worker_count))]
    pub fn run_all(
        &self,
        tasks: &[TaskDescriptor],
        context: &RunContext,
    ) -> Result<RunOutcome, EngineError> {
        let workers = context.worker_count.min(tasks.len());

        if workers > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("sasa-worker-{}", i))
                .build()
                .map_err(|e| EngineError::WorkerPool(e.to_string()))?;

            info!("Dispatching {} tasks to {} workers.", tasks.len(), workers);
            let next = AtomicUsize::new(0);
            let token = self.controller.token();
            let (next, token) = (&next, &token);
            pool.scope(|scope| {
                for _ in 0..workers {
                    scope.spawn(move |_| self.work(tasks, next, token));
                }
            });
        }

        let outcome = match self.controller.finish() {
            RunState::Completed => RunOutcome::Completed,
            _ => RunOutcome::Aborted(
                self.controller
                    .cause()
                    .unwrap_or(AbortCause::OperatorCancellation),
            ),
        };

        match &outcome {
            RunOutcome::Completed => info!(
                completed = self.counters.completed(),
                "All tasks completed."
            ),
            RunOutcome::Aborted(cause) => warn!(
                completed = self.counters.completed(),
                dispatched = self.counters.dispatched(),
                total = tasks.len(),
                %cause,
                "Run aborted; result file is incomplete."
            ),
        }
        Ok(outcome)
    }

    fn work(&self, tasks: &[TaskDescriptor], next: &AtomicUsize, token: &CancellationToken) {
        loop {
            if token.is_cancelled() {
                return;
            }
            let index = next.fetch_add(1, Ordering::SeqCst);
            let Some(task) = tasks.get(index) else {
                return;
            };
            if token.is_cancelled() {
                return;
            }

            self.counters.dispatched.fetch_add(1, Ordering::SeqCst);
            debug!(task = index, residue = %task.residue, "Dispatching task");

            match self.evaluator.evaluate(&Invocation::from(task), token) {
                Ok(()) => {
                    self.counters.completed.fetch_add(1, Ordering::SeqCst);
                    self.reporter.report(Progress::TaskIncrement);
                }
                Err(EvaluatorError::Cancelled) => {
                    debug!(task = index, "Task abandoned after cancellation");
                    return;
                }
                Err(e) => {
                    let cause = AbortCause::EvaluatorFailure {
                        task_index: index,
                        residue: task.residue,
                        message: e.to_string(),
                        diagnostic: e.diagnostic(),
                    };
                    if self.controller.fail(cause) {
                        error!(task = index, residue = %task.residue, error = %e, "Evaluator failed");
                    }
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::sink::ResultSink;
    use crate::core::models::geometry::Position;
    use crate::core::models::ids::ResidueId;
    use crate::core::models::task::BaselinePair;
    use crate::engine::config::RunContextBuilder;
    use crate::engine::evaluator::testing::MockEvaluator;
    use crate::engine::tasks::{ProbeOrientations, build_tasks};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    fn context(dir: &Path, workers: usize) -> RunContext {
        RunContextBuilder::new()
            .executable(PathBuf::from("lmp"))
            .data_file(PathBuf::from("protein.data"))
            .mol_file(PathBuf::from("probe.mol"))
            .execution_dir(dir.to_path_buf())
            .worker_count(workers)
            .build()
            .unwrap()
    }

    fn tasks(n: usize) -> Vec<TaskDescriptor> {
        let positions: Vec<Position> = (0..n)
            .map(|i| Position::new(i as f64, 0.5, -1.0))
            .collect();
        let residues: Vec<ResidueId> = (0..n).map(|i| ResidueId(i as i64 + 1)).collect();
        build_tasks(
            &positions,
            &residues,
            ProbeOrientations::Isotropic,
            "in.template",
            120,
            BaselinePair::new(-35210.5, -2.25).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn all_tasks_succeed_with_two_workers() {
        let dir = tempdir().unwrap();
        let context = context(dir.path(), 2);
        let sink = ResultSink::open(&context.output_path(), 3).unwrap();
        let evaluator = MockEvaluator::new(dir.path());
        let controller = AbortController::new();
        let reporter = ProgressReporter::new();
        let scheduler = Scheduler::new(&evaluator, &controller, &reporter);

        let outcome = scheduler.run_all(&tasks(3), &context).unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(controller.state(), RunState::Completed);
        assert_eq!(sink.read_records().unwrap().len(), 3);
        assert_eq!(scheduler.counters().completed(), 3);
        assert_eq!(evaluator.probe_calls(), 3);
        assert!(evaluator.max_in_flight() <= 2);
    }

    #[test]
    fn every_task_is_dispatched_exactly_once() {
        let dir = tempdir().unwrap();
        let context = context(dir.path(), 3);
        let sink = ResultSink::open(&context.output_path(), 10).unwrap();
        let evaluator = MockEvaluator::new(dir.path()).with_delay(Duration::from_millis(5));
        let controller = AbortController::new();
        let reporter = ProgressReporter::new();

        Scheduler::new(&evaluator, &controller, &reporter)
            .run_all(&tasks(10), &context)
            .unwrap();

        let mut atoms: Vec<usize> = sink
            .read_records()
            .unwrap()
            .into_iter()
            .map(|r| r.atom)
            .collect();
        atoms.sort_unstable();
        assert_eq!(atoms, (1..=10).collect::<Vec<_>>());
        assert!(evaluator.max_in_flight() <= 3);
    }

    #[test]
    fn single_failure_aborts_the_run() {
        let dir = tempdir().unwrap();
        let context = context(dir.path(), 4);
        let sink = ResultSink::open(&context.output_path(), 5).unwrap();
        // Residue 3 is the third task (index 2).
        let evaluator = MockEvaluator::new(dir.path())
            .failing_on(&[3])
            .with_delay(Duration::from_millis(50));
        let controller = AbortController::new();
        let reporter = ProgressReporter::new();
        let scheduler = Scheduler::new(&evaluator, &controller, &reporter);

        let outcome = scheduler.run_all(&tasks(5), &context).unwrap();

        match outcome {
            RunOutcome::Aborted(AbortCause::EvaluatorFailure {
                task_index,
                residue,
                diagnostic,
                ..
            }) => {
                assert_eq!(task_index, 2);
                assert_eq!(residue, ResidueId(3));
                assert!(diagnostic.contains("Lost atoms"));
            }
            other => panic!("expected evaluator failure, got {:?}", other),
        }
        assert_eq!(controller.state(), RunState::Aborted);
        assert!(sink.read_records().unwrap().len() < 5);
        assert!(scheduler.counters().dispatched() < 5);
    }

    #[test]
    fn failure_with_one_worker_stops_at_the_failing_task() {
        let dir = tempdir().unwrap();
        let context = context(dir.path(), 1);
        let sink = ResultSink::open(&context.output_path(), 5).unwrap();
        let evaluator = MockEvaluator::new(dir.path()).failing_on(&[2]);
        let controller = AbortController::new();
        let reporter = ProgressReporter::new();

        let outcome = Scheduler::new(&evaluator, &controller, &reporter)
            .run_all(&tasks(5), &context)
            .unwrap();

        assert!(!outcome.is_completed());
        assert_eq!(evaluator.probe_calls(), 2);
        assert_eq!(sink.read_records().unwrap().len(), 1);
    }

    #[test]
    fn operator_interrupt_cancels_queued_and_running_tasks() {
        let dir = tempdir().unwrap();
        let context = context(dir.path(), 2);
        let sink = ResultSink::open(&context.output_path(), 20).unwrap();
        let evaluator = MockEvaluator::new(dir.path()).with_delay(Duration::from_millis(40));
        let controller = AbortController::new();
        let reporter = ProgressReporter::new();
        let scheduler = Scheduler::new(&evaluator, &controller, &reporter);
        let tasks = tasks(20);

        let outcome = thread::scope(|s| {
            let interrupter = controller.clone();
            s.spawn(move || {
                thread::sleep(Duration::from_millis(60));
                interrupter.interrupt();
            });
            scheduler.run_all(&tasks, &context).unwrap()
        });

        assert_eq!(
            outcome,
            RunOutcome::Aborted(AbortCause::OperatorCancellation)
        );
        assert_eq!(controller.state(), RunState::Aborted);
        assert!(sink.read_records().unwrap().len() < 20);
        assert!(scheduler.counters().dispatched() < 20);
    }

    #[test]
    fn interrupt_before_dispatch_starts_nothing() {
        let dir = tempdir().unwrap();
        let context = context(dir.path(), 2);
        let evaluator = MockEvaluator::new(dir.path());
        let controller = AbortController::new();
        controller.interrupt();
        let reporter = ProgressReporter::new();

        let outcome = Scheduler::new(&evaluator, &controller, &reporter)
            .run_all(&tasks(4), &context)
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Aborted(AbortCause::OperatorCancellation)
        );
        assert_eq!(evaluator.probe_calls(), 0);
    }

    #[test]
    fn empty_task_list_completes_immediately() {
        let dir = tempdir().unwrap();
        let context = context(dir.path(), 4);
        let evaluator = MockEvaluator::new(dir.path());
        let controller = AbortController::new();
        let reporter = ProgressReporter::new();

        let outcome = Scheduler::new(&evaluator, &controller, &reporter)
            .run_all(&[], &context)
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert!(evaluator.calls().is_empty());
    }

    #[test]
    fn reports_one_increment_per_completed_task() {
        let dir = tempdir().unwrap();
        let context = context(dir.path(), 3);
        ResultSink::open(&context.output_path(), 6).unwrap();
        let evaluator = MockEvaluator::new(dir.path());
        let controller = AbortController::new();
        let increments = Mutex::new(0u64);
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if matches!(event, Progress::TaskIncrement) {
                *increments.lock().unwrap() += 1;
            }
        }));

        let scheduler = Scheduler::new(&evaluator, &controller, &reporter);
        scheduler.run_all(&tasks(6), &context).unwrap();

        assert_eq!(*increments.lock().unwrap(), 6);
        assert_eq!(scheduler.counters().completed(), 6);
        assert_eq!(scheduler.counters().dispatched(), 6);
    }
}
