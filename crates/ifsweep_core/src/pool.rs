//! Worker pool and sweep coordination.
//!
//! One producer feeds the combination stream into a bounded queue shared by
//! a fixed set of workers. A full queue blocks the producer, so at most
//! `queue_capacity` combinations are ever waiting. Once the stream is
//! exhausted (or the sweep is cancelled) the producer sends one
//! [`WorkItem::Close`] per worker; each worker leaves its loop on the first
//! close it receives, so every worker sees exactly one.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::error::{PipelineError, SweepError};
use crate::model::Combination;
use crate::pipeline::RunReport;
use crate::progress::SweepProgress;
use crate::session::WorkerSession;

/// Element of the work queue
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    Run(Combination),
    /// Terminal signal, one per worker
    Close,
}

/// Something that can process combinations one at a time
pub trait CombinationRunner: Send {
    fn run_combination(&mut self, combination: &Combination) -> Result<RunReport, PipelineError>;
}

impl CombinationRunner for WorkerSession {
    fn run_combination(&mut self, combination: &Combination) -> Result<RunReport, PipelineError> {
        self.run(combination)
    }
}

/// Per-worker tally
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub index: usize,
    pub completed: u64,
    pub failed: u64,
    /// Close signals this worker consumed
    pub close_signals: usize,
}

/// Outcome of a whole sweep
#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    /// Combinations handed to the queue
    pub produced: u64,
    pub completed: u64,
    pub failed: u64,
    /// The producer stopped early on a cancel request
    pub cancelled: bool,
    /// Deepest queue the producer observed right after a send
    pub max_queue_depth: usize,
    /// Close signals consumed across all workers
    pub close_signals: usize,
    pub workers: Vec<WorkerStats>,
    pub elapsed: Duration,
}

/// Runs a sweep over a fixed pool of workers
#[derive(Debug, Clone)]
pub struct SweepCoordinator {
    queue_capacity: usize,
    limit: Option<u64>,
    progress: SweepProgress,
}

impl SweepCoordinator {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue_capacity: queue_capacity.max(1),
            limit: None,
            progress: SweepProgress::default(),
        }
    }

    /// Share an existing progress tracker, e.g. one the front-end polls
    #[must_use]
    pub fn with_progress(mut self, progress: SweepProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Stop producing after `limit` combinations
    #[must_use]
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn progress(&self) -> &SweepProgress {
        &self.progress
    }

    /// Start one thread per worker, stream `combinations` through the queue
    /// and join every worker once all close signals are sent.
    ///
    /// Failures of individual combinations are counted, not returned; only
    /// a dead pool or a panicked worker fails the sweep.
    pub fn run<R, I>(&self, workers: Vec<R>, combinations: I) -> Result<SweepSummary, SweepError>
    where
        R: CombinationRunner,
        I: IntoIterator<Item = Combination>,
    {
        if workers.is_empty() {
            return Err(SweepError::Config(crate::error::ConfigError::Invalid(
                "a sweep needs at least one worker".to_string(),
            )));
        }

        let started = Instant::now();
        let worker_count = workers.len();
        let (tx, rx) = bounded::<WorkItem>(self.queue_capacity);
        tracing::info!(
            workers = worker_count,
            queue_capacity = self.queue_capacity,
            total = self.progress.total(),
            "Starting sweep"
        );

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(worker_count);
            for (index, mut runner) in workers.into_iter().enumerate() {
                let rx = rx.clone();
                let progress = self.progress.clone();
                let handle = thread::Builder::new()
                    .name(format!("ifsweep-worker-{index}"))
                    .spawn_scoped(scope, move || worker_loop(index, &mut runner, &rx, &progress))
                    .map_err(|source| SweepError::Spawn { index, source });
                match handle {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        // Release the workers already started
                        for _ in 0..handles.len() {
                            let _ = tx.send(WorkItem::Close);
                        }
                        return Err(e);
                    }
                }
            }
            drop(rx);

            let produced = self.produce(&tx, combinations, worker_count);
            drop(tx);

            let mut summary = SweepSummary {
                produced: produced.sent,
                cancelled: produced.cancelled,
                max_queue_depth: produced.max_depth,
                ..Default::default()
            };
            let mut panicked = None;
            for (index, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(stats) => {
                        summary.completed += stats.completed;
                        summary.failed += stats.failed;
                        summary.close_signals += stats.close_signals;
                        summary.workers.push(stats);
                    }
                    Err(_) => {
                        tracing::error!(worker = index, "Worker panicked");
                        panicked.get_or_insert(index);
                    }
                }
            }
            summary.elapsed = started.elapsed();

            if let Some(index) = panicked {
                return Err(SweepError::WorkerPanicked(index));
            }
            if produced.disconnected {
                return Err(SweepError::QueueClosed);
            }

            tracing::info!(
                produced = summary.produced,
                completed = summary.completed,
                failed = summary.failed,
                cancelled = summary.cancelled,
                elapsed_mins = summary.elapsed.as_secs_f64() / 60.0,
                "Sweep finished"
            );
            Ok(summary)
        })
    }

    fn produce<I>(&self, tx: &Sender<WorkItem>, combinations: I, workers: usize) -> Produced
    where
        I: IntoIterator<Item = Combination>,
    {
        let mut produced = Produced::default();
        let limit = self.limit.unwrap_or(u64::MAX);

        for combination in combinations {
            if produced.sent >= limit {
                tracing::info!(limit, "Combination limit reached");
                break;
            }
            if self.progress.is_cancelled() {
                tracing::info!(sent = produced.sent, "Sweep cancelled, stopping producer");
                produced.cancelled = true;
                break;
            }
            if tx.send(WorkItem::Run(combination)).is_err() {
                produced.disconnected = true;
                break;
            }
            produced.sent += 1;
            produced.max_depth = produced.max_depth.max(tx.len());
        }

        for _ in 0..workers {
            if tx.send(WorkItem::Close).is_err() {
                produced.disconnected = true;
                break;
            }
        }
        produced
    }
}

#[derive(Debug, Default)]
struct Produced {
    sent: u64,
    max_depth: usize,
    cancelled: bool,
    disconnected: bool,
}

fn worker_loop<R: CombinationRunner>(
    index: usize,
    runner: &mut R,
    rx: &Receiver<WorkItem>,
    progress: &SweepProgress,
) -> WorkerStats {
    let mut stats = WorkerStats {
        index,
        ..Default::default()
    };

    loop {
        match rx.recv() {
            Ok(WorkItem::Run(combination)) => {
                match runner.run_combination(&combination) {
                    Ok(report) => {
                        stats.completed += 1;
                        progress.record_completed();
                        tracing::debug!(
                            worker = index,
                            scenario_id = %report.scenario_id,
                            processed = progress.processed(),
                            total = progress.total(),
                            "Combination done"
                        );
                    }
                    Err(e) => {
                        stats.failed += 1;
                        progress.record_failed();
                        tracing::error!(
                            worker = index,
                            stage = %e.stage,
                            error = %e,
                            "Combination failed"
                        );
                    }
                }
            }
            Ok(WorkItem::Close) => {
                stats.close_signals += 1;
                break;
            }
            Err(_) => {
                tracing::warn!(worker = index, "Work queue disconnected without close signal");
                break;
            }
        }
    }

    tracing::debug!(
        worker = index,
        completed = stats.completed,
        failed = stats.failed,
        "Worker exiting"
    );
    stats
}
