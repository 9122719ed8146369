//! YAML sweep files
//!
//! A sweep file holds the settings plus the parameter and coefficient
//! declarations:
//!
//! ```yaml
//! horizon: { start_year: 1995, end_year: 2025 }
//! output_root: out
//! parameters:
//!   - { name: TFR_adj, min: 0.8, max: 1.0, steps: 3 }
//! coefficients:
//!   - { function: fert, sequence: 1, coefficient: beta, min: 0.1, max: 0.2, steps: 2 }
//! pool:
//!   session_roots: [ifs00, ifs01]
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ifsweep_core::combinations::SweepSpace;
use ifsweep_core::config::{
    CoefficientSpec, ConverterSettings, EngineSettings, OutputSettings, ParameterSpec,
    PoolSettings, StoreSettings, SweepBuilder, SweepSettings,
};
use ifsweep_core::error::ConfigError;
use ifsweep_core::scenario::Horizon;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SweepFileError {
    #[error("failed to read sweep file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse sweep file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid sweep file: {0}")]
    Config(#[from] ConfigError),
}

/// On-disk shape of a sweep file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFile {
    pub horizon: Horizon,
    pub output_root: PathBuf,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub coefficients: Vec<CoefficientSpec>,
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

/// A validated sweep, ready to plan or run
#[derive(Debug, Clone)]
pub struct LoadedSweep {
    pub settings: SweepSettings,
    pub space: SweepSpace,
}

impl SweepFile {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_saphyr::Error> {
        serde_saphyr::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_saphyr::ser::Error> {
        serde_saphyr::to_string(self)
    }

    /// Read and parse `path`, then validate it
    pub fn load(path: &Path) -> Result<LoadedSweep, SweepFileError> {
        let content = fs::read_to_string(path).map_err(|source| SweepFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file = Self::from_yaml(&content).map_err(|e| SweepFileError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let sweep = file.resolve(base_dir)?;
        tracing::info!(
            path = %path.display(),
            parameters = sweep.space.parameters().len(),
            coefficients = sweep.space.coefficients().len(),
            sessions = sweep.settings.pool.session_roots.len(),
            "Loaded sweep file"
        );
        Ok(sweep)
    }

    /// Resolve relative paths against `base_dir`, validate the settings and
    /// build the sweep space from the entries switched on for tuning.
    pub fn resolve(self, base_dir: &Path) -> Result<LoadedSweep, SweepFileError> {
        let resolve = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            }
        };

        let mut pool = self.pool;
        pool.session_roots = pool.session_roots.into_iter().map(resolve).collect();
        let converter = self.converter.map(|mut c| {
            c.dir = resolve(c.dir);
            c
        });

        let settings = SweepSettings {
            horizon: self.horizon,
            output_root: resolve(self.output_root),
            outputs: self.outputs,
            engine: self.engine,
            converter,
            pool,
            store: self.store,
        };
        settings.validate()?;

        let space = SweepBuilder::from_specs(self.parameters, self.coefficients).build()?;
        Ok(LoadedSweep { settings, space })
    }
}
