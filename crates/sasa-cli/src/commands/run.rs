use crate::cli::RunArgs;
use crate::config::PartialRunConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use sasaprobe::{
    core::io::points::PrecomputedGeometry,
    engine::{
        abort::{AbortCause, AbortController},
        evaluator::ProcessEvaluator,
        progress::ProgressReporter,
        scheduler::RunOutcome,
    },
    workflows,
};
use tracing::{error, info, warn};

/// Exit status after a forced quit (128 + SIGINT).
const FORCED_EXIT_CODE: i32 = 130;

#[derive(Debug, PartialEq, Eq)]
enum InterruptAction {
    /// Stop dispatch and kill running evaluators, then report as usual.
    Cancel,
    /// Leave immediately without waiting for the shutdown.
    ForceExit,
}

fn interrupt_action(controller: &AbortController, received: usize) -> InterruptAction {
    if received > 1 {
        return InterruptAction::ForceExit;
    }
    controller.interrupt();
    InterruptAction::Cancel
}

pub async fn run(args: RunArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialRunConfig::from_file(path)?,
        None => PartialRunConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;
    let context = &config.context;

    info!("Loading sample points from {:?}", &config.points_file);
    let geometry =
        PrecomputedGeometry::load(&config.points_file).map_err(|e| CliError::FileParsing {
            path: config.points_file.clone(),
            source: e.into(),
        })?;

    let evaluator = ProcessEvaluator::new(context);
    let controller = AbortController::new();

    // Evaluator children run in their own process group, so the terminal's Ctrl+C
    // reaches this handler only.
    let interrupter = controller.clone();
    let output_path = context.output_path();
    let signal_task = tokio::spawn(async move {
        let mut received = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            received += 1;
            match interrupt_action(&interrupter, received) {
                InterruptAction::Cancel => eprintln!(
                    "\nInterrupt received; stopping evaluator processes (Ctrl+C again to force quit)..."
                ),
                InterruptAction::ForceExit => {
                    warn!("Second interrupt; exiting without waiting for shutdown.");
                    eprintln!("\nForced exit; '{}' is incomplete.", output_path.display());
                    std::process::exit(FORCED_EXIT_CODE);
                }
            }
        }
    });

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Probing {} sample point(s) with {} worker(s) in {}",
        geometry.len(),
        context.worker_count,
        context.execution_dir.display()
    );
    info!("Invoking the core probe workflow...");

    let result = tokio::task::block_in_place(|| {
        workflows::probe::run(context, &geometry, &evaluator, &controller, &reporter)
    });
    signal_task.abort();
    let report = result?;

    match report.outcome {
        RunOutcome::Completed => {
            if let Some(baseline) = report.baseline {
                println!(
                    "Baseline energies: macromolecule {:.4}, probe {:.4}",
                    baseline.macromolecule(),
                    baseline.probe()
                );
            }
            println!(
                "✓ {} of {} probe(s) evaluated; results written to: {}",
                report.completed,
                report.n_probes,
                report.output_path.display()
            );
            Ok(())
        }
        RunOutcome::Aborted(AbortCause::OperatorCancellation) => {
            warn!("Run cancelled by operator.");
            Err(CliError::Aborted(format!(
                "cancelled by operator after {} of {} probe(s); '{}' is incomplete",
                report.completed,
                report.n_probes,
                report.output_path.display()
            )))
        }
        RunOutcome::Aborted(cause @ AbortCause::EvaluatorFailure { .. }) => {
            error!(%cause, "Evaluator failure aborted the run.");
            if let AbortCause::EvaluatorFailure { diagnostic, .. } = &cause {
                eprintln!("--- evaluator output ---\n{}\n------------------------", diagnostic);
            }
            Err(CliError::Aborted(format!(
                "{}; '{}' is incomplete and must not be post-processed",
                cause,
                report.output_path.display()
            )))
        }
    }
}
