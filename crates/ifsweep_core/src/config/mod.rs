//! Sweep configuration
//!
//! [`SweepSettings`] describes where the sessions live, how the engine and
//! converter are launched and what to harvest. The sweep variables
//! themselves are declared with the builder DSL:
//!
//! ```ignore
//! use ifsweep_core::config::{CoefficientSpec, ParameterSpec, SweepBuilder};
//!
//! let space = SweepBuilder::new()
//!     .parameter(ParameterSpec::world("TFR_adj").bounds(0.8, 1.0).steps(3))
//!     .coefficient(CoefficientSpec::new("fert", 1, "beta").bounds(0.1, 0.2).steps(2))
//!     .build()?;
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{ExternalConverter, ExternalEngine};
use crate::error::ConfigError;
use crate::process::{ExternalCommand, RunOptions};
use crate::scenario::Horizon;

pub mod builder;

pub use builder::{CoefficientSpec, ParameterSpec, Switch, SweepBuilder};

fn default_extension() -> String {
    "parquet".to_string()
}

fn default_output_variables() -> Vec<OutputVariable> {
    ["TFR", "POP", "LIFEXP", "BIRTHS", "DEATHS"]
        .into_iter()
        .map(OutputVariable::new)
        .collect()
}

fn default_dotnet() -> PathBuf {
    PathBuf::from("dotnet")
}

fn default_engine_entry() -> Option<PathBuf> {
    Some(PathBuf::from("ifs.dll"))
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("netcoreapp2.2")
}

fn default_batch_size() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_engine_log() -> String {
    "ifslog.txt".to_string()
}

fn default_progress_prefix() -> String {
    "Year".to_string()
}

fn default_converter_entry() -> Option<PathBuf> {
    Some(PathBuf::from("ParquetReader.dll"))
}

fn default_queue_capacity() -> usize {
    40
}

fn default_runfiles_dir() -> PathBuf {
    PathBuf::from("RUNFILES")
}

fn default_base_file() -> String {
    "IFsBase.run.db".to_string()
}

fn default_working_file() -> String {
    "Working.run.db".to_string()
}

fn default_scenario_dir() -> PathBuf {
    PathBuf::from("Scenario")
}

fn default_scenario_file() -> String {
    "Working.sce".to_string()
}

/// Everything a sweep needs besides the sweep variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSettings {
    pub horizon: Horizon,
    /// Archive directories are created under this root, one per scenario
    pub output_root: PathBuf,
    #[serde(default)]
    pub outputs: OutputSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub converter: Option<ConverterSettings>,
    pub pool: PoolSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

impl SweepSettings {
    /// Settings with reference defaults for everything but the locations
    pub fn new(horizon: Horizon, output_root: PathBuf, session_roots: Vec<PathBuf>) -> Self {
        Self {
            horizon,
            output_root,
            outputs: OutputSettings::default(),
            engine: EngineSettings::default(),
            converter: None,
            pool: PoolSettings {
                session_roots,
                queue_capacity: default_queue_capacity(),
            },
            store: StoreSettings::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.horizon.validate()?;

        if self.pool.session_roots.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one session root is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for root in &self.pool.session_roots {
            if !seen.insert(root) {
                return Err(ConfigError::Invalid(format!(
                    "session root {} is used more than once; sessions must not share a run store",
                    root.display()
                )));
            }
        }
        if self.pool.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if self.outputs.extension.is_empty() || self.outputs.extension.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "invalid output extension `{}`",
                self.outputs.extension
            )));
        }
        for variable in &self.outputs.variables {
            if variable.name.is_empty() || variable.name.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!(
                    "invalid output variable name `{}`",
                    variable.name
                )));
            }
        }
        if self.engine.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "engine batch size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Output variables to harvest after each run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_output_variables")]
    pub variables: Vec<OutputVariable>,
    /// Extension of the harvested blob files
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            variables: default_output_variables(),
            extension: default_extension(),
        }
    }
}

impl OutputSettings {
    /// Names of the variables switched on for analysis
    pub fn enabled_variables(&self) -> Vec<String> {
        self.variables
            .iter()
            .filter(|v| v.analysis.is_on())
            .map(|v| v.name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputVariable {
    pub name: String,
    #[serde(default)]
    pub analysis: Switch,
}

impl OutputVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            analysis: Switch::On,
        }
    }
}

/// How the engine is launched inside a session root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Launcher program, e.g. `dotnet`, or the engine executable itself
    #[serde(default = "default_dotnet")]
    pub program: PathBuf,
    /// Entry assembly passed before the positional arguments
    #[serde(default = "default_engine_entry")]
    pub entry: Option<PathBuf>,
    /// Engine installation folder, relative to the session root
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_true")]
    pub rebuild: bool,
    #[serde(default = "default_engine_log")]
    pub log_file: String,
    /// Pass the pool slot as the session index instead of `-1`
    #[serde(default)]
    pub numbered_sessions: bool,
    /// Kill a run that takes longer than this
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Surface `Year ...` progress lines from the engine's stdout
    #[serde(default)]
    pub stream_progress: bool,
    #[serde(default = "default_progress_prefix")]
    pub progress_prefix: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            program: default_dotnet(),
            entry: default_engine_entry(),
            model_dir: default_model_dir(),
            batch_size: default_batch_size(),
            rebuild: true,
            log_file: default_engine_log(),
            numbered_sessions: false,
            timeout_secs: None,
            stream_progress: false,
            progress_prefix: default_progress_prefix(),
        }
    }
}

impl EngineSettings {
    /// Engine launcher for the session rooted at `root`
    pub fn engine_for(&self, root: &Path) -> ExternalEngine {
        let mut command = ExternalCommand::new(&self.program, root.join(&self.model_dir));
        if let Some(entry) = &self.entry {
            command = command.arg(entry);
        }
        let options = RunOptions {
            timeout: self.timeout_secs.map(Duration::from_secs),
            progress_prefix: self
                .stream_progress
                .then(|| self.progress_prefix.clone()),
        };
        ExternalEngine::new(command, options)
    }
}

/// How the format converter is launched. Shared by all sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterSettings {
    #[serde(default = "default_dotnet")]
    pub program: PathBuf,
    #[serde(default = "default_converter_entry")]
    pub entry: Option<PathBuf>,
    /// Converter installation folder, used as the working directory
    pub dir: PathBuf,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ConverterSettings {
    pub fn converter(&self) -> ExternalConverter {
        let mut command = ExternalCommand::new(&self.program, &self.dir);
        if let Some(entry) = &self.entry {
            command = command.arg(entry);
        }
        let options = RunOptions {
            timeout: self.timeout_secs.map(Duration::from_secs),
            progress_prefix: None,
        };
        ExternalConverter::new(command, options)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// One isolated installation per worker
    pub session_roots: Vec<PathBuf>,
    /// Maximum number of combinations waiting in the queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// What happens to the base run store before each run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    /// Inject coefficients straight into the base store. Each run
    /// overwrites the values left by the previous one.
    #[default]
    MutateBase,
    /// Copy the base store over the working store, then inject into the
    /// copy. The base store is never modified.
    CopyOnCheckout,
}

/// File layout inside a session root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub mode: StoreMode,
    #[serde(default = "default_runfiles_dir")]
    pub runfiles_dir: PathBuf,
    #[serde(default = "default_base_file")]
    pub base_file: String,
    #[serde(default = "default_working_file")]
    pub working_file: String,
    #[serde(default = "default_scenario_dir")]
    pub scenario_dir: PathBuf,
    #[serde(default = "default_scenario_file")]
    pub scenario_file: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            mode: StoreMode::default(),
            runfiles_dir: default_runfiles_dir(),
            base_file: default_base_file(),
            working_file: default_working_file(),
            scenario_dir: default_scenario_dir(),
            scenario_file: default_scenario_file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SweepSettings {
        SweepSettings::new(
            Horizon::new(1995, 2025).unwrap(),
            PathBuf::from("/tmp/out"),
            vec![PathBuf::from("/srv/ifs00"), PathBuf::from("/srv/ifs01")],
        )
    }

    #[test]
    fn test_defaults_validate() {
        let settings = settings();
        settings.validate().unwrap();
        assert_eq!(settings.pool.queue_capacity, 40);
        assert_eq!(settings.outputs.enabled_variables().len(), 5);
        assert_eq!(settings.store.mode, StoreMode::MutateBase);
    }

    #[test]
    fn test_shared_session_root_rejected() {
        let mut settings = settings();
        settings.pool.session_roots.push(PathBuf::from("/srv/ifs00"));
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_pool_rejected() {
        let mut settings = settings();
        settings.pool.session_roots.clear();
        assert!(settings.validate().is_err());

        let mut settings = self::settings();
        settings.pool.queue_capacity = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_disabled_outputs_are_filtered() {
        let mut settings = settings();
        settings.outputs.variables[1].analysis = Switch::Off;
        let enabled = settings.outputs.enabled_variables();
        assert_eq!(enabled, ["TFR", "LIFEXP", "BIRTHS", "DEATHS"]);
    }

    #[test]
    fn test_engine_command_layout() {
        let engine = EngineSettings::default().engine_for(Path::new("/srv/ifs00"));
        let command = engine.command();
        assert_eq!(command.program, PathBuf::from("dotnet"));
        assert_eq!(command.leading_args, ["ifs.dll"]);
        assert_eq!(command.working_dir, PathBuf::from("/srv/ifs00/netcoreapp2.2"));
    }
}
