use super::config::{DUMP_COMMAND_FILE, FF_PARAMS_FILE, RunContext};
use super::error::EngineError;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};

/// Readies the execution directory for a fresh run.
///
/// Checks that the structure files and both input templates are present, removes the
/// result file and energy log of an earlier run, and writes the force-field and dump
/// command snippets the templates include, if configured.
pub fn prepare(context: &RunContext) -> Result<(), EngineError> {
    let dir = &context.execution_dir;
    if !dir.is_dir() {
        return Err(EngineError::Precondition(format!(
            "execution directory '{}' does not exist",
            dir.display()
        )));
    }

    let required = [
        ("structure data file", context.data_file_path()),
        ("probe molecule file", context.mol_file_path()),
        ("task input template", dir.join(&context.templates.task)),
        ("baseline input template", dir.join(&context.templates.baseline)),
    ];
    for (what, path) in &required {
        if !path.is_file() {
            return Err(EngineError::Precondition(format!(
                "{} '{}' not found",
                what,
                path.display()
            )));
        }
    }

    remove_stale(&context.output_path())?;
    remove_stale(&context.energy_log_path())?;

    if let Some(params) = &context.force_field {
        write_snippet(&dir.join(FF_PARAMS_FILE), params)?;
    }
    if let Some(command) = &context.dump_command {
        write_snippet(&dir.join(DUMP_COMMAND_FILE), command)?;
    }

    info!(dir = %dir.display(), "Execution directory prepared");
    Ok(())
}

fn remove_stale(path: &Path) -> Result<(), EngineError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stale file from a previous run");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(workspace_error(path, e)),
    }
}

fn write_snippet(path: &Path, content: &str) -> Result<(), EngineError> {
    let mut text = content.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    fs::write(path, text).map_err(|e| workspace_error(path, e))
}

fn workspace_error(path: &Path, source: io::Error) -> EngineError {
    EngineError::Workspace {
        path: path.display().to_string(),
        source,
    }
}
