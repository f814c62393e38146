use crate::core::io::lammps::{count_atoms_in_data_file, count_atoms_in_molecule_file};
use crate::core::io::sink::ResultSink;
use crate::core::models::task::BaselinePair;
use crate::core::surface::{NeighborFinder, OrientationSolver, SurfaceSampler};
use crate::engine::abort::{AbortCause, AbortController};
use crate::engine::baseline::compute_baseline;
use crate::engine::config::RunContext;
use crate::engine::error::EngineError;
use crate::engine::evaluator::Evaluator;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::scheduler::{RunOutcome, Scheduler};
use crate::engine::tasks::{ProbeOrientations, build_tasks};
use crate::engine::workspace;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Number of tasks announced in the result file header.
    pub n_probes: usize,
    /// Tasks whose evaluator invocation succeeded.
    pub completed: usize,
    /// `None` only when the run was cancelled before both baselines were available.
    pub baseline: Option<BaselinePair>,
    pub output_path: PathBuf,
}

/// Runs one complete probing job.
///
/// Baseline evaluation strictly precedes task dispatch. Evaluator failures and operator
/// interrupts during dispatch are reported through [`RunReport::outcome`]; every other
/// failure is returned as an [`EngineError`] before any task starts.
#[instrument(skip_all, name = "probe_workflow")]
pub fn run<G, E>(
    context: &RunContext,
    geometry: &G,
    evaluator: &E,
    controller: &AbortController,
    reporter: &ProgressReporter,
) -> Result<RunReport, EngineError>
where
    G: SurfaceSampler + NeighborFinder + OrientationSolver,
    E: Evaluator + ?Sized,
{
    let token = controller.token();
    let output_path = context.output_path();

    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    workspace::prepare(context)?;
    let atom_count = count_atoms_in_data_file(&context.data_file_path())?;
    let probe_atoms = count_atoms_in_molecule_file(&context.mol_file_path())?;
    if probe_atoms == 0 {
        return Err(EngineError::Precondition(format!(
            "probe molecule file '{}' declares no atoms",
            context.mol_file_path().display()
        )));
    }
    info!(atom_count, probe_atoms, "Structure files inspected.");
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Baseline energies ===
    reporter.report(Progress::PhaseStart { name: "Baseline" });
    let baseline = match compute_baseline(context, evaluator, &token, reporter) {
        Ok(pair) => pair,
        Err(e) if token.is_cancelled() => {
            warn!(error = %e, "Run cancelled during baseline evaluation.");
            controller.finish();
            return Ok(RunReport {
                outcome: RunOutcome::Aborted(
                    controller
                        .cause()
                        .unwrap_or(AbortCause::OperatorCancellation),
                ),
                n_probes: 0,
                completed: 0,
                baseline: None,
                output_path,
            });
        }
        Err(e) => return Err(e),
    };
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Sampling, occlusion and orientation ===
    reporter.report(Progress::PhaseStart { name: "Sampling" });
    let positions = geometry.sample_points(
        context.sampling.probe_radius_scale,
        context.sampling.max_samples,
    )?;
    let residues = geometry.find_occluding_neighbors(&positions)?;
    let computed;
    let orientations = if probe_atoms > 1 {
        computed = geometry.compute_orientations(&positions, &residues)?;
        ProbeOrientations::PerPoint(&computed)
    } else {
        ProbeOrientations::Isotropic
    };
    info!(points = positions.len(), "Retained accessible sample points.");
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Result file and task construction ===
    let tasks = build_tasks(
        &positions,
        &residues,
        orientations,
        &context.templates.task,
        atom_count,
        baseline,
    )?;
    ResultSink::open(&output_path, tasks.len())?;

    // === Phase 4: Dispatch ===
    reporter.report(Progress::PhaseStart { name: "Probing" });
    reporter.report(Progress::TaskStart {
        total_steps: tasks.len() as u64,
    });
    let scheduler = Scheduler::new(evaluator, controller, reporter);
    let outcome = scheduler.run_all(&tasks, context)?;
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let report = RunReport {
        outcome,
        n_probes: tasks.len(),
        completed: scheduler.counters().completed() as usize,
        baseline: Some(baseline),
        output_path,
    };
    info!(
        completed = report.completed,
        n_probes = report.n_probes,
        "Workflow finished."
    );
    Ok(report)
}
