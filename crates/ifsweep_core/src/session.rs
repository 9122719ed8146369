//! Worker sessions
//!
//! A [`WorkerSession`] binds one pool slot to one isolated installation of
//! the engine: its model folder, scenario file and run stores all live under
//! the session root, and no other session may point at the same root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{StoreMode, SweepSettings};
use crate::engine::{EngineArgs, FormatConverter, SimulationEngine, UNNUMBERED_SESSION};
use crate::error::SweepError;
use crate::scenario::Horizon;

/// Resolved file locations of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    pub root: PathBuf,
    /// Engine installation folder, used as the engine's working directory
    pub model_dir: PathBuf,
    pub scenario_path: PathBuf,
    /// Template store the coefficients are injected into
    pub base_store: PathBuf,
    /// Store the engine leaves its results in
    pub working_store: PathBuf,
}

impl SessionLayout {
    pub fn resolve(root: &Path, settings: &SweepSettings) -> Self {
        let store = &settings.store;
        let runfiles = root.join(&store.runfiles_dir);
        Self {
            root: root.to_path_buf(),
            model_dir: root.join(&settings.engine.model_dir),
            scenario_path: root.join(&store.scenario_dir).join(&store.scenario_file),
            base_store: runfiles.join(&store.base_file),
            working_store: runfiles.join(&store.working_file),
        }
    }
}

/// Per-run settings shared by every combination a session processes
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunPlan {
    pub horizon: Horizon,
    pub output_root: PathBuf,
    pub variables: Vec<String>,
    pub extension: String,
    pub store_mode: StoreMode,
    pub working_file: String,
    pub engine_args: EngineArgs,
}

/// One pool slot and the engine installation it owns
pub struct WorkerSession {
    index: usize,
    layout: SessionLayout,
    pub(crate) plan: RunPlan,
    pub(crate) engine: Box<dyn SimulationEngine>,
    pub(crate) converter: Option<Box<dyn FormatConverter>>,
}

impl std::fmt::Debug for WorkerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSession")
            .field("index", &self.index)
            .field("layout", &self.layout)
            .field("has_converter", &self.converter.is_some())
            .finish_non_exhaustive()
    }
}

impl WorkerSession {
    /// Open session `index` rooted at `root`, launching the engine and
    /// converter as configured.
    ///
    /// The root must exist; the scenario folder and the output root are
    /// created when missing.
    pub fn open(index: usize, root: &Path, settings: &SweepSettings) -> Result<Self, SweepError> {
        let engine = Box::new(settings.engine.engine_for(root));
        let converter = settings
            .converter
            .as_ref()
            .map(|c| Box::new(c.converter()) as Box<dyn FormatConverter>);
        Self::with_engine(index, root, settings, engine, converter)
    }

    /// Open a session driving the given engine and converter
    pub fn with_engine(
        index: usize,
        root: &Path,
        settings: &SweepSettings,
        engine: Box<dyn SimulationEngine>,
        converter: Option<Box<dyn FormatConverter>>,
    ) -> Result<Self, SweepError> {
        let session_error = |source: io::Error| SweepError::Session {
            index,
            root: root.to_path_buf(),
            source,
        };

        let layout = SessionLayout::resolve(root, settings);
        if !layout.root.is_dir() {
            return Err(session_error(io::Error::new(
                io::ErrorKind::NotFound,
                "session root is not a directory",
            )));
        }
        if let Some(scenario_dir) = layout.scenario_path.parent() {
            fs::create_dir_all(scenario_dir).map_err(session_error)?;
        }
        fs::create_dir_all(&settings.output_root).map_err(session_error)?;

        let engine_settings = &settings.engine;
        let session_index = if engine_settings.numbered_sessions {
            i32::try_from(index).unwrap_or(i32::MAX)
        } else {
            UNNUMBERED_SESSION
        };
        let plan = RunPlan {
            horizon: settings.horizon,
            output_root: settings.output_root.clone(),
            variables: settings.outputs.enabled_variables(),
            extension: settings.outputs.extension.clone(),
            store_mode: settings.store.mode,
            working_file: settings.store.working_file.clone(),
            engine_args: EngineArgs {
                batch_size: engine_settings.batch_size,
                forecast_year: settings.horizon.end_year,
                session_index,
                rebuild: engine_settings.rebuild,
                log_file: engine_settings.log_file.clone(),
            },
        };

        tracing::debug!(
            worker = index,
            root = %layout.root.display(),
            store_mode = ?plan.store_mode,
            "Opened worker session"
        );

        Ok(Self {
            index,
            layout,
            plan,
            engine,
            converter,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn layout(&self) -> &SessionLayout {
        &self.layout
    }

    pub fn horizon(&self) -> &Horizon {
        &self.plan.horizon
    }

    pub fn output_root(&self) -> &Path {
        &self.plan.output_root
    }

    /// Output variables harvested after each run
    pub fn variables(&self) -> &[String] {
        &self.plan.variables
    }
}
