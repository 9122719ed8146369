//! The per-combination run pipeline.
//!
//! Six stages run strictly in order inside one worker:
//!
//! 1. [`Stage::BuildScenario`] renders the scenario file for a fresh id
//! 2. [`Stage::InjectCoefficients`] writes coefficients into the run store
//! 3. [`Stage::RunSimulation`] runs the engine from the model folder
//! 4. [`Stage::PersistRun`] creates the archive and copies scenario + store
//! 5. [`Stage::HarvestVariables`] writes one file per output variable
//! 6. [`Stage::ConvertFormat`] hands the archive to the format converter
//!
//! A failure in stages 1 to 5 aborts the remaining stages for that
//! combination. Engine stderr, a non-zero engine exit and converter
//! failures are only logged. Nothing is retried or rolled back: coefficients
//! injected before a failed run stay in the store for the next combination.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::StoreMode;
use crate::error::{PipelineError, RunError};
use crate::model::{Combination, ScenarioId};
use crate::process::ProcessOutcome;
use crate::run_store::{InjectionReport, RunStore};
use crate::scenario::ScenarioSpec;
use crate::session::WorkerSession;

/// Extension of the archived scenario file
pub const SCENARIO_EXTENSION: &str = "sce";

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    BuildScenario,
    InjectCoefficients,
    RunSimulation,
    PersistRun,
    HarvestVariables,
    ConvertFormat,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::BuildScenario,
        Stage::InjectCoefficients,
        Stage::RunSimulation,
        Stage::PersistRun,
        Stage::HarvestVariables,
        Stage::ConvertFormat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::BuildScenario => "build_scenario",
            Stage::InjectCoefficients => "inject_coefficients",
            Stage::RunSimulation => "run_simulation",
            Stage::PersistRun => "persist_run",
            Stage::HarvestVariables => "harvest_variables",
            Stage::ConvertFormat => "convert_format",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the converter stage ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// No converter configured
    Skipped,
    Converted,
    /// Converter failed; the harvested files are left as they are
    Failed(String),
}

/// What one successful pass through the pipeline produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub scenario_id: ScenarioId,
    pub archive_dir: PathBuf,
    pub injection: InjectionReport,
    pub engine: ProcessOutcome,
    /// Output variables written to the archive
    pub harvested: Vec<String>,
    pub conversion: Conversion,
    pub elapsed: Duration,
}

impl WorkerSession {
    /// Drive one combination through every stage
    pub fn run(&mut self, combination: &Combination) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let spec = self
            .build_scenario(combination)
            .map_err(|e| PipelineError::new(Stage::BuildScenario, e))?;

        let span = tracing::info_span!(
            "run",
            worker = self.index(),
            scenario_id = %spec.id()
        );
        let _entered = span.enter();

        let injection = self
            .inject_coefficients(combination)
            .map_err(|e| PipelineError::new(Stage::InjectCoefficients, e))?;
        let engine = self
            .run_simulation()
            .map_err(|e| PipelineError::new(Stage::RunSimulation, e))?;
        let archive_dir = self
            .persist_run(&spec)
            .map_err(|e| PipelineError::new(Stage::PersistRun, e))?;
        let harvested = self
            .harvest_variables(&archive_dir)
            .map_err(|e| PipelineError::new(Stage::HarvestVariables, e))?;
        let conversion = self.convert_format(&archive_dir);

        let elapsed = started.elapsed();
        tracing::info!(
            harvested = harvested.len(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Run archived"
        );

        Ok(RunReport {
            scenario_id: spec.id(),
            archive_dir,
            injection,
            engine,
            harvested,
            conversion,
            elapsed,
        })
    }

    /// Render the scenario for a fresh id and write it to the session's
    /// scenario file, replacing any stale one.
    pub fn build_scenario(&self, combination: &Combination) -> Result<ScenarioSpec, RunError> {
        let spec = ScenarioSpec::build(ScenarioId::generate(), combination, &self.plan.horizon);
        let path = &self.layout().scenario_path;
        spec.write_to(path)
            .map_err(|e| RunError::io(format!("writing scenario {}", path.display()), e))?;
        tracing::trace!(path = %path.display(), "Wrote scenario file");
        Ok(spec)
    }

    /// Write the combination's coefficients into the run store.
    ///
    /// With [`StoreMode::MutateBase`] the base store is updated in place and
    /// keeps these values until the next injection. With
    /// [`StoreMode::CopyOnCheckout`] the base store is first copied over the
    /// working store and only the copy is updated.
    pub fn inject_coefficients(
        &self,
        combination: &Combination,
    ) -> Result<InjectionReport, RunError> {
        let layout = self.layout();
        let base = RunStore::new(&layout.base_store);
        let target = match self.plan.store_mode {
            StoreMode::MutateBase => base,
            StoreMode::CopyOnCheckout => base.checkout(&layout.working_store)?,
        };

        let report = target.inject_coefficients(&combination.coefficients)?;
        if !report.unmatched.is_empty() {
            tracing::warn!(
                unmatched = ?report.unmatched,
                "Coefficients matched no row in the run store"
            );
        }
        tracing::debug!(updated = report.updated, "Injected coefficients");
        Ok(report)
    }

    /// Run the engine once. Only a failure to start or a timeout is an
    /// error; stderr output and the exit code are logged and ignored.
    pub fn run_simulation(&mut self) -> Result<ProcessOutcome, RunError> {
        let outcome = self.engine.run(&self.plan.engine_args)?;

        if let Some(warning) = outcome.warning() {
            tracing::warn!(stderr = warning, "Engine reported errors");
        }
        if !outcome.success() {
            tracing::warn!(exit_code = ?outcome.exit_code, "Engine exited unsuccessfully");
        }
        tracing::debug!(
            elapsed_secs = outcome.elapsed.as_secs_f64(),
            last_progress = outcome.last_progress.as_deref(),
            "Engine finished"
        );
        Ok(outcome)
    }

    /// Create `<output_root>/<id>/` and copy the scenario file and the
    /// working store into it. An existing archive directory is an error.
    pub fn persist_run(&self, spec: &ScenarioSpec) -> Result<PathBuf, RunError> {
        let archive_dir = self.plan.output_root.join(spec.id().to_string());
        fs::create_dir(&archive_dir).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => RunError::ArchiveExists(archive_dir.clone()),
            _ => RunError::io(format!("creating {}", archive_dir.display()), e),
        })?;

        let layout = self.layout();
        let scenario_copy = archive_dir.join(format!("{}.{SCENARIO_EXTENSION}", spec.id()));
        copy_file(&layout.scenario_path, &scenario_copy)?;
        copy_file(
            &layout.working_store,
            &archive_dir.join(&self.plan.working_file),
        )?;

        tracing::debug!(archive = %archive_dir.display(), "Persisted run");
        Ok(archive_dir)
    }

    /// Write every non-empty output variable of the archived store to its
    /// own file, then delete the archived store.
    pub fn harvest_variables(&self, archive_dir: &Path) -> Result<Vec<String>, RunError> {
        let store = RunStore::new(archive_dir.join(&self.plan.working_file));
        let written =
            store.export_variables(&self.plan.variables, archive_dir, &self.plan.extension)?;
        store.remove()?;

        if written.len() < self.plan.variables.len() {
            tracing::debug!(
                written = written.len(),
                requested = self.plan.variables.len(),
                "Some output variables had no data"
            );
        }
        Ok(written)
    }

    /// Run the converter over the archive. Failures are logged and
    /// reported, never raised.
    pub fn convert_format(&mut self, archive_dir: &Path) -> Conversion {
        let Some(converter) = self.converter.as_mut() else {
            return Conversion::Skipped;
        };
        match converter.convert(archive_dir) {
            Ok(outcome) => {
                if let Some(warning) = outcome.warning() {
                    tracing::warn!(stderr = warning, "Converter reported errors");
                }
                Conversion::Converted
            }
            Err(e) => {
                let error = PipelineError::new(Stage::ConvertFormat, e);
                tracing::warn!(error = %error, "Format conversion failed, keeping raw output");
                Conversion::Failed(error.to_string())
            }
        }
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<(), RunError> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| RunError::io(format!("copying {} to {}", from.display(), to.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_names() {
        assert_eq!(Stage::ALL[0], Stage::BuildScenario);
        assert_eq!(Stage::ALL[5], Stage::ConvertFormat);
        assert_eq!(Stage::PersistRun.to_string(), "persist_run");
    }

    #[test]
    fn test_pipeline_error_names_stage() {
        let err = PipelineError::new(
            Stage::PersistRun,
            RunError::ArchiveExists(PathBuf::from("/out/abc")),
        );
        assert_eq!(
            err.to_string(),
            "persist_run failed: archive directory /out/abc already exists"
        );
    }
}
