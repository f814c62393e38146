use super::{Evaluator, EvaluatorError, Invocation, Stage};
use crate::engine::abort::CancellationToken;
use crate::engine::config::RunContext;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs one evaluator process per invocation.
///
/// The command line is an explicit argument list (no shell). Every input is passed as a
/// `-var NAME VALUE` pair for the input template to consume. Children run in
/// `execution_dir` and, on unix, in their own process group, so a terminal interrupt
/// reaches only the orchestrator. Cancelling an invocation kills the whole group, which
/// includes whatever a launcher such as `mpirun` started underneath.
#[derive(Debug, Clone)]
pub struct ProcessEvaluator {
    executable: PathBuf,
    launcher: Vec<String>,
    working_dir: PathBuf,
    data_file: PathBuf,
    mol_file: PathBuf,
    unit_conversion: f64,
}

impl ProcessEvaluator {
    pub fn new(context: &RunContext) -> Self {
        Self {
            executable: context.evaluator.executable.clone(),
            launcher: context.evaluator.launcher.clone(),
            working_dir: context.execution_dir.clone(),
            data_file: context.structure.data_file.clone(),
            mol_file: context.structure.mol_file.clone(),
            unit_conversion: context.evaluator.unit_conversion,
        }
    }

    /// Program and argument list for one invocation.
    pub fn command_line(&self, invocation: &Invocation<'_>) -> (String, Vec<String>) {
        let executable = self.executable.to_string_lossy().into_owned();
        let (program, mut args) = match self.launcher.split_first() {
            Some((program, rest)) => {
                let mut args = rest.to_vec();
                args.push(executable);
                (program.clone(), args)
            }
            None => (executable, Vec::new()),
        };

        args.push("-in".to_string());
        args.push(invocation.template.to_string());

        let (angle, axis) = invocation.orientation.angle_axis();
        let mut var = |name: &str, value: String| {
            args.push("-var".to_string());
            args.push(name.to_string());
            args.push(value);
        };

        var("DataFile", self.data_file.to_string_lossy().into_owned());
        var("MolFile", self.mol_file.to_string_lossy().into_owned());
        var("sasaX", format!("{:.3}", invocation.position.x));
        var("sasaY", format!("{:.3}", invocation.position.y));
        var("sasaZ", format!("{:.3}", invocation.position.z));
        var("rotAng", format!("{:.3}", angle));
        var("rotVecX", format!("{:.3}", axis.x));
        var("rotVecY", format!("{:.3}", axis.y));
        var("rotVecZ", format!("{:.3}", axis.z));
        var("atom_number", invocation.atom_count.to_string());
        var("res", invocation.residue.to_string());
        var("emol", format!("{:.3}", invocation.baseline.macromolecule()));
        var("eprob", format!("{:.3}", invocation.baseline.probe()));
        var("conv", self.unit_conversion.to_string());
        if let Stage::Baseline(target) = invocation.stage {
            var("target", target.as_str().to_string());
        }

        (program, args)
    }
}

impl Evaluator for ProcessEvaluator {
    fn evaluate(
        &self,
        invocation: &Invocation<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), EvaluatorError> {
        if cancel.is_cancelled() {
            return Err(EvaluatorError::Cancelled);
        }

        let (program, args) = self.command_line(invocation);
        let mut command = Command::new(&program);
        command
            .args(&args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        trace!(%program, ?args, "Spawning evaluator.");
        let mut child = command.spawn().map_err(|source| EvaluatorError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    terminate(&mut child);
                    return Err(EvaluatorError::Io(e));
                }
            }
            if cancel.is_cancelled() {
                debug!(pid = child.id(), "Killing evaluator after cancellation.");
                terminate(&mut child);
                return Err(EvaluatorError::Cancelled);
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if status.success() {
            Ok(())
        } else {
            Err(EvaluatorError::NonZeroExit {
                status: status.code(),
                stdout,
                stderr,
            })
        }
    }
}

/// Kills the child's process group (or just the child off unix) and reaps it.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        // The child leads its own group, so its pid is the group id.
        let group = Pid::from_raw(child.id() as i32);
        if let Err(e) = killpg(group, Signal::SIGKILL) {
            tracing::warn!(pgid = %group, error = %e, "Failed to SIGKILL evaluator process group");
            let _ = child.kill();
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
