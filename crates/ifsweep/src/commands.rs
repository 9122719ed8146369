//! `run` and `plan` command implementations

use std::io::{self, Write};

use ifsweep_core::config::SweepSettings;
use ifsweep_core::error::SweepError;
use ifsweep_core::model::ScenarioId;
use ifsweep_core::pool::{SweepCoordinator, SweepSummary};
use ifsweep_core::progress::SweepProgress;
use ifsweep_core::scenario::ScenarioSpec;
use ifsweep_core::session::WorkerSession;

use crate::sweep_file::LoadedSweep;

/// Open one session per configured root, in pool order
pub fn open_sessions(settings: &SweepSettings) -> Result<Vec<WorkerSession>, SweepError> {
    settings
        .pool
        .session_roots
        .iter()
        .enumerate()
        .map(|(index, root)| WorkerSession::open(index, root, settings))
        .collect()
}

/// Number of combinations a run will produce, saturated at `u64::MAX`
pub fn planned_total(sweep: &LoadedSweep, limit: Option<u64>) -> u64 {
    let total = u64::try_from(sweep.space.total_combinations()).unwrap_or(u64::MAX);
    limit.map_or(total, |limit| total.min(limit))
}

/// Run the whole sweep and return its summary
pub fn run(
    sweep: &LoadedSweep,
    limit: Option<u64>,
    progress: SweepProgress,
) -> Result<SweepSummary, SweepError> {
    let settings = &sweep.settings;
    let sessions = open_sessions(settings)?;
    progress.reset(planned_total(sweep, limit));

    tracing::info!(
        total = progress.total(),
        sessions = sessions.len(),
        output_root = %settings.output_root.display(),
        store_mode = ?settings.store.mode,
        "Running sweep"
    );

    SweepCoordinator::new(settings.pool.queue_capacity)
        .with_progress(progress)
        .with_limit(limit)
        .run(sessions, sweep.space.combinations())
}

/// Ctrl-C handler for a running sweep. The producer stops at its next
/// send; combinations already queued still run before the pool closes.
pub fn interrupt_handler(progress: SweepProgress) -> impl Fn() + Send + 'static {
    move || {
        if !progress.is_cancelled() {
            tracing::warn!(
                processed = progress.processed(),
                total = progress.total(),
                "Interrupted, draining queued combinations"
            );
        }
        progress.cancel();
    }
}

/// Print the size of the sweep and the scenario text of its first
/// `preview` combinations. No session is touched.
pub fn plan(sweep: &LoadedSweep, preview: usize, out: &mut impl Write) -> io::Result<()> {
    let space = &sweep.space;
    let settings = &sweep.settings;

    writeln!(
        out,
        "{} parameters x {} coefficients",
        space.parameters().len(),
        space.coefficients().len()
    )?;
    for param in space.parameters() {
        let (min, max) = param.bounds();
        writeln!(
            out,
            "  parameter   {:<24} {:>3} steps  [{min}, {max}]",
            param.name(),
            param.steps()
        )?;
    }
    for coef in space.coefficients() {
        let (min, max) = coef.bounds();
        writeln!(
            out,
            "  coefficient {:<24} {:>3} steps  [{min}, {max}]",
            coef.id().to_string(),
            coef.steps()
        )?;
    }
    writeln!(out, "total combinations: {}", space.total_combinations())?;
    writeln!(
        out,
        "sessions: {}, queue capacity: {}",
        settings.pool.session_roots.len(),
        settings.pool.queue_capacity
    )?;

    for (i, combination) in space.combinations().take(preview).enumerate() {
        let spec = ScenarioSpec::build(ScenarioId::generate(), &combination, &settings.horizon);
        writeln!(out, "\n# combination {}", i + 1)?;
        writeln!(out, "{}", spec.text())?;
    }
    Ok(())
}
