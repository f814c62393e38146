use super::abort::CancellationToken;
use super::config::RunContext;
use super::error::EngineError;
use super::evaluator::{BaselineTarget, Evaluator, Invocation};
use super::progress::ProgressReporter;
use crate::core::io::lammps::read_last_two_energies;
use crate::core::models::task::BaselinePair;
use tracing::{debug, info, instrument};

/// Runs the evaluator on the isolated macromolecule and the isolated probe, in that
/// order, and reads both reference energies back from the energy log.
///
/// Any failure is fatal for the run and reported as [`EngineError::BaselineUnavailable`].
#[instrument(skip_all, name = "baseline")]
pub fn compute_baseline<E: Evaluator + ?Sized>(
    context: &RunContext,
    evaluator: &E,
    cancel: &CancellationToken,
    reporter: &ProgressReporter,
) -> Result<BaselinePair, EngineError> {
    for target in [BaselineTarget::Macromolecule, BaselineTarget::Probe] {
        reporter.message(|| format!("Evaluating isolated {}...", target));
        debug!(%target, template = %context.templates.baseline, "Invoking evaluator for baseline");

        let invocation = Invocation::baseline(&context.templates.baseline, target);
        evaluator
            .evaluate(&invocation, cancel)
            .map_err(|e| {
                let summary = e.to_string();
                let diagnostic = e.diagnostic();
                let reason = if diagnostic.is_empty() || diagnostic == summary {
                    format!("{} run: {}", target, summary)
                } else {
                    format!("{} run: {}\n{}", target, summary, diagnostic)
                };
                EngineError::BaselineUnavailable { reason }
            })?;
    }

    let log_path = context.energy_log_path();
    let (macromolecule, probe) =
        read_last_two_energies(&log_path).map_err(|e| EngineError::BaselineUnavailable {
            reason: e.to_string(),
        })?;

    let pair = BaselinePair::new(macromolecule, probe).ok_or_else(|| {
        EngineError::BaselineUnavailable {
            reason: format!(
                "non-finite energies in '{}': macromolecule = {}, probe = {}",
                log_path.display(),
                macromolecule,
                probe
            ),
        }
    })?;

    info!(
        e_macromolecule = pair.macromolecule(),
        e_probe = pair.probe(),
        "Baseline energies established"
    );
    Ok(pair)
}
