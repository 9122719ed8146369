//! Child process execution with optional progress streaming and timeout.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::EngineError;

/// Interval between liveness checks while a timeout is armed
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A program plus the arguments that precede the per-call ones, run from a
/// fixed working directory (e.g. `dotnet ifs.dll` from the engine folder).
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalCommand {
    pub program: PathBuf,
    pub leading_args: Vec<OsString>,
    pub working_dir: PathBuf,
}

impl ExternalCommand {
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            working_dir: working_dir.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    fn display_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// How a process is supervised
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    /// Kill the process once it has run this long
    pub timeout: Option<Duration>,
    /// Stdout lines starting with this prefix are surfaced as progress.
    /// `None` discards stdout entirely.
    pub progress_prefix: Option<String>,
}

/// What a finished process left behind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutcome {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stderr: String,
    pub progress_lines: usize,
    pub last_progress: Option<String>,
    pub elapsed: Duration,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Trimmed stderr, if the process wrote any
    pub fn warning(&self) -> Option<&str> {
        let trimmed = self.stderr.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

#[derive(Debug, Default)]
struct ProgressScan {
    lines: usize,
    last: Option<String>,
}

/// Run `command` with `args` appended and wait for it.
///
/// Stdout is always drained so the child never blocks on a full pipe;
/// stderr is collected and returned. An exit status other than success is
/// not an error here, callers decide how to treat it.
pub fn run_process(
    command: &ExternalCommand,
    args: &[String],
    options: &RunOptions,
) -> Result<ProcessOutcome, EngineError> {
    let program = command.display_name();
    let started = Instant::now();

    let mut child = Command::new(&command.program)
        .args(&command.leading_args)
        .args(args)
        .current_dir(&command.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| EngineError::Spawn {
            program: program.clone(),
            source,
        })?;

    let span = tracing::Span::current();
    let prefix = options.progress_prefix.clone();
    let stdout_reader = child.stdout.take().map(|out| {
        let span = span.clone();
        thread::spawn(move || {
            let _entered = span.enter();
            scan_progress(out, prefix.as_deref())
        })
    });
    let stderr_reader = child.stderr.take().map(|err| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = BufReader::new(err).read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    });

    // Readers are left detached on error: a killed wrapper's own children
    // may still hold the pipes open.
    let status = wait_for(&mut child, options.timeout, &program)?;

    let scan = stdout_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    Ok(ProcessOutcome {
        exit_code: status.code(),
        stderr,
        progress_lines: scan.lines,
        last_progress: scan.last,
        elapsed: started.elapsed(),
    })
}

fn scan_progress(out: impl Read, prefix: Option<&str>) -> ProgressScan {
    let mut scan = ProgressScan::default();
    for line in BufReader::new(out).split(b'\n') {
        let Ok(line) = line else { break };
        let Some(prefix) = prefix else { continue };

        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end();
        if line.starts_with(prefix) {
            tracing::debug!(progress = line, "Engine progress");
            scan.lines += 1;
            scan.last = Some(line.to_string());
        }
    }
    scan
}

fn wait_for(
    child: &mut Child,
    timeout: Option<Duration>,
    program: &str,
) -> Result<ExitStatus, EngineError> {
    let wait_error = |source| EngineError::Wait {
        program: program.to_string(),
        source,
    };

    let Some(timeout) = timeout else {
        return child.wait().map_err(wait_error);
    };

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if started.elapsed() >= timeout => {
                tracing::warn!(program, ?timeout, "Process exceeded its timeout, killing");
                let _ = child.kill();
                let _ = child.wait();
                return Err(EngineError::Hung {
                    program: program.to_string(),
                    timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL.min(timeout)),
            Err(source) => return Err(wait_error(source)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> (ExternalCommand, Vec<String>) {
        let dir = std::env::temp_dir();
        (
            ExternalCommand::new("sh", dir).arg("-c"),
            vec![script.to_string()],
        )
    }

    #[test]
    fn test_progress_lines_are_filtered() {
        let (cmd, args) = sh("echo 'Model start'; echo 'Year 1995'; echo noise; echo 'Year 1996'");
        let options = RunOptions {
            progress_prefix: Some("Year".into()),
            ..Default::default()
        };

        let outcome = run_process(&cmd, &args, &options).unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.progress_lines, 2);
        assert_eq!(outcome.last_progress.as_deref(), Some("Year 1996"));
        assert_eq!(outcome.warning(), None);
    }

    #[test]
    fn test_stdout_discarded_without_prefix() {
        let (cmd, args) = sh("echo 'Year 1995'");
        let outcome = run_process(&cmd, &args, &RunOptions::default()).unwrap();
        assert_eq!(outcome.progress_lines, 0);
        assert!(outcome.last_progress.is_none());
    }

    #[test]
    fn test_stderr_and_exit_code_are_reported() {
        let (cmd, args) = sh("echo 'missing input' >&2; exit 3");
        let outcome = run_process(&cmd, &args, &RunOptions::default()).unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.success());
        assert_eq!(outcome.warning(), Some("missing input"));
    }

    #[test]
    fn test_timeout_kills_hung_process() {
        let (cmd, args) = sh("exec sleep 10");
        let options = RunOptions {
            timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        };

        let started = Instant::now();
        let err = run_process(&cmd, &args, &options).unwrap_err();
        assert!(matches!(err, EngineError::Hung { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_timeout_returns_while_grandchild_holds_pipes() {
        // sh forks sleep instead of exec'ing it, so killing sh leaves sleep
        // attached to stdout and stderr
        let (cmd, args) = sh("sleep 6; true");
        let options = RunOptions {
            timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        };

        let started = Instant::now();
        let err = run_process(&cmd, &args, &options).unwrap_err();
        assert!(matches!(err, EngineError::Hung { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let cmd = ExternalCommand::new("/nonexistent/engine-binary", std::env::temp_dir());
        let err = run_process(&cmd, &[], &RunOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }
}
