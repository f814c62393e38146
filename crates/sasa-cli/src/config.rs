use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use sasaprobe::engine::config::{RunContext, RunContextBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum PartialLauncher {
    Command(String),
    Args(Vec<String>),
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialEvaluatorConfig {
    executable: Option<PathBuf>,
    launcher: Option<PartialLauncher>,
    unit_conversion: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialStructureConfig {
    data_file: Option<PathBuf>,
    mol_file: Option<PathBuf>,
    points_file: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialTemplatesConfig {
    task: Option<String>,
    baseline: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialSamplingConfig {
    probe_radius_scale: Option<f64>,
    max_samples: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialExecutionConfig {
    workers: Option<usize>,
    execution_dir: Option<PathBuf>,
    output: Option<PathBuf>,
    energy_log: Option<PathBuf>,
    force_field_file: Option<PathBuf>,
    dump_file: Option<PathBuf>,
}

/// Contents of the TOML config file; every field may be overridden from the command line.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    evaluator: Option<PartialEvaluatorConfig>,
    structure: Option<PartialStructureConfig>,
    templates: Option<PartialTemplatesConfig>,
    sampling: Option<PartialSamplingConfig>,
    run: Option<PartialExecutionConfig>,
}

/// Fully merged configuration of one `run` invocation.
#[derive(Debug)]
pub struct AppConfig {
    pub points_file: PathBuf,
    pub context: RunContext,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Command-line arguments win over `-S` overrides, which win over the file; anything
    /// still unset falls back to the core defaults.
    pub fn merge_with_cli(mut self, args: &RunArgs) -> Result<AppConfig> {
        self.apply_set_values(&args.set_values)?;

        let evaluator = self.evaluator.take().unwrap_or_default();
        let structure = self.structure.take().unwrap_or_default();
        let templates = self.templates.take().unwrap_or_default();
        let sampling = self.sampling.take().unwrap_or_default();
        let run = self.run.take().unwrap_or_default();

        let points_file = args
            .points
            .clone()
            .or(structure.points_file)
            .ok_or_else(|| {
                CliError::Config(
                    "A points file is required either in the config file (`structure.points-file`) or via --points."
                        .to_string(),
                )
            })?;

        let launcher = match (&args.launcher, evaluator.launcher) {
            (Some(command), _) => parse_launcher(command)?,
            (None, Some(PartialLauncher::Command(command))) => parse_launcher(&command)?,
            (None, Some(PartialLauncher::Args(list))) => list,
            (None, None) => Vec::new(),
        };

        let force_field = read_snippet(args.ff_file.as_ref().or(run.force_field_file.as_ref()))?;
        let dump_command = read_snippet(args.dump_file.as_ref().or(run.dump_file.as_ref()))?;

        let mut builder = RunContextBuilder::new()
            .launcher(launcher)
            .force_field(force_field)
            .dump_command(dump_command);

        if let Some(executable) = args.evaluator.clone().or(evaluator.executable) {
            builder = builder.executable(executable);
        }
        if let Some(factor) = evaluator.unit_conversion {
            builder = builder.unit_conversion(factor);
        }
        if let Some(path) = args.data_file.clone().or(structure.data_file) {
            builder = builder.data_file(path);
        }
        if let Some(path) = args.mol_file.clone().or(structure.mol_file) {
            builder = builder.mol_file(path);
        }
        if let Some(name) = templates.task {
            builder = builder.task_template(name);
        }
        if let Some(name) = templates.baseline {
            builder = builder.baseline_template(name);
        }
        if let Some(scale) = args.probe_radius_scale.or(sampling.probe_radius_scale) {
            builder = builder.probe_radius_scale(scale);
        }
        if let Some(n) = args.max_samples.or(sampling.max_samples) {
            builder = builder.max_samples(n);
        }
        if let Some(n) = args.workers.or(run.workers) {
            builder = builder.worker_count(n);
        }
        if let Some(dir) = args.execution_dir.clone().or(run.execution_dir) {
            builder = builder.execution_dir(dir);
        }
        if let Some(path) = args.output.clone().or(run.output) {
            builder = builder.output_file(path);
        }
        if let Some(path) = run.energy_log {
            builder = builder.energy_log(path);
        }

        let context = builder
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        Ok(AppConfig {
            points_file,
            context,
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) =
                parser::parse_key_value(kv_pair).map_err(|e| CliError::Config(e.to_string()))?;

            match key {
                "run.workers" => {
                    self.run.get_or_insert_with(Default::default).workers =
                        Some(parse_value(key, value)?);
                }
                "sampling.probe-radius-scale" => {
                    self.sampling
                        .get_or_insert_with(Default::default)
                        .probe_radius_scale = Some(parse_value(key, value)?);
                }
                "sampling.max-samples" => {
                    self.sampling.get_or_insert_with(Default::default).max_samples =
                        Some(parse_value(key, value)?);
                }
                "evaluator.unit-conversion" => {
                    self.evaluator
                        .get_or_insert_with(Default::default)
                        .unit_conversion = Some(parse_value(key, value)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CliError::Config(format!("Invalid value for {}: '{}'", key, value))
    })
}

fn parse_launcher(command: &str) -> Result<Vec<String>> {
    parser::parse_launcher(command).map_err(|e| CliError::Argument(e.to_string()))
}

fn read_snippet(path: Option<&PathBuf>) -> Result<Option<String>> {
    path.map(|p| {
        std::fs::read_to_string(p).map_err(|e| CliError::FileParsing {
            path: p.clone(),
            source: e.into(),
        })
    })
    .transpose()
}
