//! Parameter sweep scheduler for an external simulation engine
//!
//! This crate drives a combinatorial sweep: every combination of parameter
//! and coefficient test values is turned into one run of a prebuilt engine,
//! whose results are harvested and archived per scenario.
//! It provides:
//! - Linear test grids and a lazy stream over the combination space
//! - Scenario file rendering and run store coefficient injection
//! - Child process supervision with progress streaming and timeouts
//! - A six-stage run pipeline executed inside isolated worker sessions
//! - A bounded-queue worker pool with one close signal per worker
//!
//! # Builder DSL
//!
//! ```ignore
//! use ifsweep_core::{CoefficientSpec, ParameterSpec, SweepBuilder, SweepCoordinator};
//!
//! let space = SweepBuilder::new()
//!     .parameter(ParameterSpec::world("TFR_adj").bounds(0.8, 1.0).steps(3))
//!     .coefficient(CoefficientSpec::new("fert", 1, "beta").bounds(0.1, 0.2).steps(2))
//!     .build()?;
//!
//! let sessions = settings
//!     .pool
//!     .session_roots
//!     .iter()
//!     .enumerate()
//!     .map(|(i, root)| WorkerSession::open(i, root, &settings))
//!     .collect::<Result<Vec<_>, _>>()?;
//!
//! let summary = SweepCoordinator::new(settings.pool.queue_capacity)
//!     .run(sessions, space.combinations())?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Sweep space
// ============================================================================

pub mod combinations;
pub mod grid;
pub mod scenario;

// ============================================================================
// Execution
// ============================================================================

pub mod engine;
pub mod pipeline;
pub mod pool;
pub mod process;
pub mod progress;
pub mod run_store;
pub mod session;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod error;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use combinations::{CombinationStream, SweepSpace};
pub use config::{CoefficientSpec, ParameterSpec, SweepBuilder, SweepSettings};
pub use error::{ConfigError, EngineError, PipelineError, RunError, SweepError};
pub use pipeline::{RunReport, Stage};
pub use pool::{SweepCoordinator, SweepSummary, WorkItem};
pub use progress::SweepProgress;
pub use session::WorkerSession;
