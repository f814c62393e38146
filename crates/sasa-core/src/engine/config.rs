use std::path::{Path, PathBuf};
use thiserror::Error;

/// kcal/mol to eV.
pub const KCAL_TO_EV: f64 = 0.0433641;

pub const DEFAULT_PROBE_RADIUS_SCALE: f64 = 1.4;
pub const DEFAULT_MAX_SAMPLES: usize = 100;
pub const DEFAULT_WORKER_COUNT: usize = 1;
pub const DEFAULT_OUTPUT_FILE: &str = "spec.xyz";
pub const DEFAULT_ENERGY_LOG: &str = "etot";
pub const DEFAULT_TASK_TEMPLATE: &str = "in.template";
pub const DEFAULT_BASELINE_TEMPLATE: &str = "in.pre";
pub const FF_PARAMS_FILE: &str = "ff_params.dat";
pub const DUMP_COMMAND_FILE: &str = "dump_com.dat";

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    Invalid {
        parameter: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorConfig {
    pub executable: PathBuf,
    /// Program and arguments placed before the executable, e.g. `mpirun -np 1`.
    pub launcher: Vec<String>,
    pub unit_conversion: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructureFiles {
    /// Simulation-ready data file of the macromolecule.
    pub data_file: PathBuf,
    /// Molecule file of the probe.
    pub mol_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Templates {
    pub task: String,
    pub baseline: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub probe_radius_scale: f64,
    pub max_samples: usize,
}

/// Immutable per-run configuration, shared read-only by every worker.
///
/// Relative file names are resolved against `execution_dir`, which is also the working
/// directory of every evaluator process.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub evaluator: EvaluatorConfig,
    pub structure: StructureFiles,
    pub templates: Templates,
    pub sampling: SamplingConfig,
    pub worker_count: usize,
    pub execution_dir: PathBuf,
    pub output_file: PathBuf,
    pub energy_log: PathBuf,
    pub force_field: Option<String>,
    pub dump_command: Option<String>,
}

impl RunContext {
    pub fn resolve(&self, file: &Path) -> PathBuf {
        self.execution_dir.join(file)
    }

    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output_file)
    }

    pub fn energy_log_path(&self) -> PathBuf {
        self.resolve(&self.energy_log)
    }

    pub fn data_file_path(&self) -> PathBuf {
        self.resolve(&self.structure.data_file)
    }

    pub fn mol_file_path(&self) -> PathBuf {
        self.resolve(&self.structure.mol_file)
    }
}

#[derive(Default)]
pub struct RunContextBuilder {
    executable: Option<PathBuf>,
    launcher: Vec<String>,
    unit_conversion: Option<f64>,
    data_file: Option<PathBuf>,
    mol_file: Option<PathBuf>,
    task_template: Option<String>,
    baseline_template: Option<String>,
    probe_radius_scale: Option<f64>,
    max_samples: Option<usize>,
    worker_count: Option<usize>,
    execution_dir: Option<PathBuf>,
    output_file: Option<PathBuf>,
    energy_log: Option<PathBuf>,
    force_field: Option<String>,
    dump_command: Option<String>,
}

impl RunContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executable(mut self, path: PathBuf) -> Self {
        self.executable = Some(path);
        self
    }
    pub fn launcher(mut self, launcher: Vec<String>) -> Self {
        self.launcher = launcher;
        self
    }
    pub fn unit_conversion(mut self, factor: f64) -> Self {
        self.unit_conversion = Some(factor);
        self
    }
    pub fn data_file(mut self, path: PathBuf) -> Self {
        self.data_file = Some(path);
        self
    }
    pub fn mol_file(mut self, path: PathBuf) -> Self {
        self.mol_file = Some(path);
        self
    }
    pub fn task_template(mut self, name: impl Into<String>) -> Self {
        self.task_template = Some(name.into());
        self
    }
    pub fn baseline_template(mut self, name: impl Into<String>) -> Self {
        self.baseline_template = Some(name.into());
        self
    }
    pub fn probe_radius_scale(mut self, scale: f64) -> Self {
        self.probe_radius_scale = Some(scale);
        self
    }
    pub fn max_samples(mut self, n: usize) -> Self {
        self.max_samples = Some(n);
        self
    }
    pub fn worker_count(mut self, n: usize) -> Self {
        self.worker_count = Some(n);
        self
    }
    pub fn execution_dir(mut self, path: PathBuf) -> Self {
        self.execution_dir = Some(path);
        self
    }
    pub fn output_file(mut self, path: PathBuf) -> Self {
        self.output_file = Some(path);
        self
    }
    pub fn energy_log(mut self, path: PathBuf) -> Self {
        self.energy_log = Some(path);
        self
    }
    pub fn force_field(mut self, params: Option<String>) -> Self {
        self.force_field = params;
        self
    }
    pub fn dump_command(mut self, command: Option<String>) -> Self {
        self.dump_command = command;
        self
    }

    pub fn build(self) -> Result<RunContext, ConfigError> {
        let evaluator = EvaluatorConfig {
            executable: self
                .executable
                .ok_or(ConfigError::MissingParameter("executable"))?,
            launcher: self.launcher,
            unit_conversion: self.unit_conversion.unwrap_or(KCAL_TO_EV),
        };
        let structure = StructureFiles {
            data_file: self
                .data_file
                .ok_or(ConfigError::MissingParameter("data_file"))?,
            mol_file: self
                .mol_file
                .ok_or(ConfigError::MissingParameter("mol_file"))?,
        };
        let templates = Templates {
            task: self
                .task_template
                .unwrap_or_else(|| DEFAULT_TASK_TEMPLATE.to_string()),
            baseline: self
                .baseline_template
                .unwrap_or_else(|| DEFAULT_BASELINE_TEMPLATE.to_string()),
        };
        let sampling = SamplingConfig {
            probe_radius_scale: self
                .probe_radius_scale
                .unwrap_or(DEFAULT_PROBE_RADIUS_SCALE),
            max_samples: self.max_samples.unwrap_or(DEFAULT_MAX_SAMPLES),
        };
        let worker_count = self.worker_count.unwrap_or(DEFAULT_WORKER_COUNT);

        if worker_count == 0 {
            return Err(ConfigError::Invalid {
                parameter: "worker_count",
                reason: "at least one worker is required".to_string(),
            });
        }
        if !(sampling.probe_radius_scale.is_finite() && sampling.probe_radius_scale > 0.0) {
            return Err(ConfigError::Invalid {
                parameter: "probe_radius_scale",
                reason: format!("must be positive, got {}", sampling.probe_radius_scale),
            });
        }
        if sampling.max_samples == 0 {
            return Err(ConfigError::Invalid {
                parameter: "max_samples",
                reason: "at least one sample per atom is required".to_string(),
            });
        }
        if !evaluator.unit_conversion.is_finite() {
            return Err(ConfigError::Invalid {
                parameter: "unit_conversion",
                reason: "must be finite".to_string(),
            });
        }

        Ok(RunContext {
            evaluator,
            structure,
            templates,
            sampling,
            worker_count,
            execution_dir: self.execution_dir.unwrap_or_else(|| PathBuf::from(".")),
            output_file: self
                .output_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE)),
            energy_log: self
                .energy_log
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ENERGY_LOG)),
            force_field: self.force_field,
            dump_command: self.dump_command,
        })
    }
}
