use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::Stage;

/// Errors produced while building a test grid
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("at least 2 steps are needed to interpolate, got {0}")]
    TooFewSteps(usize),
    #[error("bounds must be finite (min={min}, max={max})")]
    NonFinite { min: f64, max: f64 },
    #[error("min {min} is greater than max {max}")]
    Inverted { min: f64, max: f64 },
}

/// Errors in the sweep definition. These are fatal and surface before any
/// engine invocation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid grid for `{name}`: {source}")]
    Grid {
        name: String,
        #[source]
        source: GridError,
    },
    #[error("coefficient identity `{0}` does not split into function, sequence and name")]
    MalformedCoefId(String),
    #[error("name `{0}` is empty or contains the `_` delimiter")]
    InvalidComponent(String),
    #[error("duplicate sweep variable `{0}`")]
    Duplicate(String),
    #[error("forecast end year {end} precedes start year {start}")]
    InvertedHorizon { start: i32, end: i32 },
    #[error("{0}")]
    Invalid(String),
}

/// Failures of an external process (engine or format converter)
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program}` did not exit within {timeout:?}, killed")]
    Hung { program: String, timeout: Duration },
    #[error("failed waiting on `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program}` exited with {status}")]
    Exit { program: String, status: String },
}

/// Failure inside one pipeline stage
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("run store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("archive directory {} already exists", .0.display())]
    ArchiveExists(PathBuf),
}

impl RunError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        RunError::Io {
            context: context.into(),
            source,
        }
    }
}

/// A [`RunError`] tagged with the stage that raised it
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: RunError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: impl Into<RunError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Errors that stop the sweep as a whole
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to prepare session {index} at {}: {source}", root.display())]
    Session {
        index: usize,
        root: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn worker thread {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },
    #[error("work queue closed before the sweep finished")]
    QueueClosed,
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}
