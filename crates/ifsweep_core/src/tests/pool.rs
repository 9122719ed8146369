//! Tests for the bounded work queue and the worker pool

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use super::fixtures::{scripted_session, session_root, test_settings};
use crate::config::{CoefficientSpec, ParameterSpec, SweepBuilder};
use crate::error::{EngineError, PipelineError, SweepError};
use crate::model::{Combination, ScenarioId};
use crate::pipeline::{Conversion, RunReport, Stage};
use crate::pool::{CombinationRunner, SweepCoordinator};
use crate::process::ProcessOutcome;
use crate::progress::SweepProgress;
use crate::run_store::InjectionReport;

fn empty_report() -> RunReport {
    RunReport {
        scenario_id: ScenarioId::generate(),
        archive_dir: PathBuf::new(),
        injection: InjectionReport::default(),
        engine: ProcessOutcome::default(),
        harvested: Vec::new(),
        conversion: Conversion::Skipped,
        elapsed: Duration::ZERO,
    }
}

/// Runner that sleeps per combination and counts what it sees
struct SlowRunner {
    delay: Duration,
    seen: Arc<AtomicUsize>,
}

impl CombinationRunner for SlowRunner {
    fn run_combination(&mut self, _: &Combination) -> Result<RunReport, PipelineError> {
        thread::sleep(self.delay);
        self.seen.fetch_add(1, Ordering::SeqCst);
        Ok(empty_report())
    }
}

fn combinations(n: usize) -> impl Iterator<Item = Combination> {
    (0..n).map(|_| Combination::default())
}

#[test]
fn test_queue_depth_bounded_and_one_close_per_worker() {
    let seen = Arc::new(AtomicUsize::new(0));
    let workers: Vec<_> = (0..3)
        .map(|_| SlowRunner {
            delay: Duration::from_millis(2),
            seen: seen.clone(),
        })
        .collect();

    let summary = SweepCoordinator::new(2)
        .run(workers, combinations(60))
        .unwrap();

    assert!(summary.max_queue_depth <= 2);
    assert_eq!(summary.produced, 60);
    assert_eq!(summary.completed, 60);
    assert_eq!(seen.load(Ordering::SeqCst), 60);
    assert_eq!(summary.close_signals, 3);
    assert_eq!(summary.workers.len(), 3);
    assert!(summary.workers.iter().all(|w| w.close_signals == 1));
}

/// Runner that measures how far the producer has pulled ahead of it
struct LaggingRunner {
    started: usize,
    pulled: Arc<AtomicUsize>,
    max_ahead: Arc<AtomicUsize>,
}

impl CombinationRunner for LaggingRunner {
    fn run_combination(&mut self, _: &Combination) -> Result<RunReport, PipelineError> {
        self.started += 1;
        let ahead = self.pulled.load(Ordering::SeqCst) - self.started;
        self.max_ahead.fetch_max(ahead, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(2));
        Ok(empty_report())
    }
}

#[test]
fn test_producer_blocks_when_queue_is_full() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let max_ahead = Arc::new(AtomicUsize::new(0));
    let runner = LaggingRunner {
        started: 0,
        pulled: pulled.clone(),
        max_ahead: max_ahead.clone(),
    };
    let stream = combinations(40).inspect(|_| {
        pulled.fetch_add(1, Ordering::SeqCst);
    });

    let summary = SweepCoordinator::new(1).run(vec![runner], stream).unwrap();
    assert_eq!(summary.completed, 40);
    // At most one queued item plus the one the producer is waiting to send
    assert!(max_ahead.load(Ordering::SeqCst) <= 2);
}

/// Runner that fails every other combination
struct FlakyRunner {
    calls: usize,
}

impl CombinationRunner for FlakyRunner {
    fn run_combination(&mut self, _: &Combination) -> Result<RunReport, PipelineError> {
        self.calls += 1;
        if self.calls % 2 == 0 {
            return Err(PipelineError::new(
                Stage::RunSimulation,
                EngineError::Hung {
                    program: "engine".into(),
                    timeout: Duration::from_secs(1),
                },
            ));
        }
        Ok(empty_report())
    }
}

#[test]
fn test_failed_combinations_do_not_stop_the_sweep() {
    let progress = SweepProgress::new(10);
    let summary = SweepCoordinator::new(4)
        .with_progress(progress.clone())
        .run(vec![FlakyRunner { calls: 0 }], combinations(10))
        .unwrap();

    assert_eq!(summary.completed, 5);
    assert_eq!(summary.failed, 5);
    assert_eq!(progress.completed(), 5);
    assert_eq!(progress.failed(), 5);
    assert_eq!(summary.close_signals, 1);
}

/// Runner that cancels the sweep on its first combination
struct CancellingRunner {
    progress: SweepProgress,
}

impl CombinationRunner for CancellingRunner {
    fn run_combination(&mut self, _: &Combination) -> Result<RunReport, PipelineError> {
        self.progress.cancel();
        thread::sleep(Duration::from_millis(5));
        Ok(empty_report())
    }
}

#[test]
fn test_cancel_stops_producer_and_still_closes_workers() {
    let progress = SweepProgress::new(1000);
    let runner = CancellingRunner {
        progress: progress.clone(),
    };

    let summary = SweepCoordinator::new(1)
        .with_progress(progress.clone())
        .run(vec![runner], combinations(1000))
        .unwrap();

    assert!(summary.cancelled);
    assert!(summary.produced < 10);
    assert_eq!(summary.completed, summary.produced);
    assert_eq!(summary.close_signals, 1);
}

#[test]
fn test_limit_caps_production() {
    let seen = Arc::new(AtomicUsize::new(0));
    let workers = vec![SlowRunner {
        delay: Duration::ZERO,
        seen: seen.clone(),
    }];

    let summary = SweepCoordinator::new(8)
        .with_limit(Some(7))
        .run(workers, combinations(100))
        .unwrap();
    assert_eq!(summary.produced, 7);
    assert_eq!(seen.load(Ordering::SeqCst), 7);
    assert!(!summary.cancelled);
}

struct PanickingRunner;

impl CombinationRunner for PanickingRunner {
    fn run_combination(&mut self, _: &Combination) -> Result<RunReport, PipelineError> {
        panic!("worker blew up");
    }
}

#[test]
fn test_worker_panic_is_reported() {
    let err = SweepCoordinator::new(1)
        .run(vec![PanickingRunner], combinations(5))
        .unwrap_err();
    assert!(matches!(err, SweepError::WorkerPanicked(0)));
}

#[test]
fn test_empty_pool_is_rejected() {
    let err = SweepCoordinator::new(1)
        .run(Vec::<PanickingRunner>::new(), combinations(1))
        .unwrap_err();
    assert!(matches!(err, SweepError::Config(_)));
}

#[test]
fn test_sessions_share_nothing_but_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path(), 2);
    let sessions: Vec<_> = settings
        .pool
        .session_roots
        .iter()
        .enumerate()
        .map(|(i, root)| {
            let name = root.file_name().unwrap().to_str().unwrap();
            let root = session_root(dir.path(), name, &settings);
            scripted_session(i, &root, &settings, None)
        })
        .collect();

    let space = SweepBuilder::new()
        .parameter(ParameterSpec::world("TFR_adj").bounds(0.8, 1.0).steps(3))
        .parameter(ParameterSpec::scalar("wgdp").bounds(0.0, 1.0).steps(2))
        .coefficient(CoefficientSpec::new("fert", 1, "beta").bounds(0.1, 0.2).steps(2))
        .build()
        .unwrap();
    let total = space.total_combinations() as u64;

    let summary = SweepCoordinator::new(settings.pool.queue_capacity)
        .with_progress(SweepProgress::new(total))
        .run(sessions, space.combinations())
        .unwrap();

    assert_eq!(summary.completed, 12);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.close_signals, 2);

    // One archive per combination, each with its own scenario file
    let archives: Vec<_> = fs::read_dir(&settings.output_root)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(archives.len(), 12);
    for archive in archives {
        let id = archive.file_name().unwrap().to_str().unwrap().to_string();
        let scenario = fs::read_to_string(archive.join(format!("{id}.sce"))).unwrap();
        assert!(scenario.ends_with(&format!("Scenario_ID:{id}")));
        // Harvested blob was produced from this archive's own scenario
        assert_eq!(fs::read_to_string(archive.join("TFR.parquet")).unwrap(), scenario);
    }
}
