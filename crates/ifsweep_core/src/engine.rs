//! The external simulation engine and format converter.
//!
//! Both are opaque programs. The pipeline talks to them through the
//! [`SimulationEngine`] and [`FormatConverter`] traits so tests can swap in
//! scripted stand-ins; production uses the process-backed implementations.

use std::path::Path;

use crate::error::EngineError;
use crate::process::{ExternalCommand, ProcessOutcome, RunOptions, run_process};

/// Session index passed when sessions are not numbered
pub const UNNUMBERED_SESSION: i32 = -1;

/// Positional arguments of one engine run:
/// `<batch> <forecastYear> <session> false false <rebuild> False --log <file>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineArgs {
    pub batch_size: u32,
    pub forecast_year: i32,
    pub session_index: i32,
    pub rebuild: bool,
    pub log_file: String,
}

impl EngineArgs {
    pub fn to_args(&self) -> Vec<String> {
        vec![
            self.batch_size.to_string(),
            self.forecast_year.to_string(),
            self.session_index.to_string(),
            "false".to_string(),
            "false".to_string(),
            if self.rebuild { "1" } else { "0" }.to_string(),
            "False".to_string(),
            "--log".to_string(),
            self.log_file.clone(),
        ]
    }
}

/// Runs one simulation against the session's run store
pub trait SimulationEngine: Send {
    fn run(&mut self, args: &EngineArgs) -> Result<ProcessOutcome, EngineError>;
}

/// Converts the per-variable blob files of one archive directory in place
pub trait FormatConverter: Send {
    fn convert(&mut self, archive_dir: &Path) -> Result<ProcessOutcome, EngineError>;
}

/// Engine launched as a child process
#[derive(Debug, Clone)]
pub struct ExternalEngine {
    command: ExternalCommand,
    options: RunOptions,
}

impl ExternalEngine {
    pub fn new(command: ExternalCommand, options: RunOptions) -> Self {
        Self { command, options }
    }

    pub fn command(&self) -> &ExternalCommand {
        &self.command
    }
}

impl SimulationEngine for ExternalEngine {
    fn run(&mut self, args: &EngineArgs) -> Result<ProcessOutcome, EngineError> {
        run_process(&self.command, &args.to_args(), &self.options)
    }
}

/// Converter launched as a child process with the archive path as its only
/// argument. A non-zero exit is reported as an error.
#[derive(Debug, Clone)]
pub struct ExternalConverter {
    command: ExternalCommand,
    options: RunOptions,
}

impl ExternalConverter {
    pub fn new(command: ExternalCommand, options: RunOptions) -> Self {
        Self { command, options }
    }
}

impl FormatConverter for ExternalConverter {
    fn convert(&mut self, archive_dir: &Path) -> Result<ProcessOutcome, EngineError> {
        let dir = std::path::absolute(archive_dir).unwrap_or_else(|_| archive_dir.to_path_buf());
        let outcome = run_process(
            &self.command,
            &[dir.display().to_string()],
            &self.options,
        )?;
        if !outcome.success() {
            return Err(EngineError::Exit {
                program: self.command.program.display().to_string(),
                status: match outcome.exit_code {
                    Some(code) => format!("code {code}"),
                    None => "signal".to_string(),
                },
            });
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_argument_contract() {
        let args = EngineArgs {
            batch_size: 5,
            forecast_year: 2025,
            session_index: UNNUMBERED_SESSION,
            rebuild: true,
            log_file: "ifslog.txt".to_string(),
        };
        assert_eq!(
            args.to_args(),
            [
                "5", "2025", "-1", "false", "false", "1", "False", "--log", "ifslog.txt"
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_external_converter_receives_directory() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("converted");
        let command = ExternalCommand::new("sh", dir.path())
            .arg("-c")
            .arg("touch \"$1/converted\"")
            .arg("converter");

        let mut converter = ExternalConverter::new(command, RunOptions::default());
        converter.convert(dir.path()).unwrap();
        assert!(marker.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_external_converter_failure_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let command = ExternalCommand::new("sh", dir.path()).arg("-c").arg("exit 2");

        let mut converter = ExternalConverter::new(command, RunOptions::default());
        assert!(matches!(
            converter.convert(dir.path()),
            Err(EngineError::Exit { .. })
        ));
    }
}
