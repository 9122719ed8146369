//! Shared fixtures: session roots with a seeded run store and a scripted
//! engine that behaves like the real one from the pipeline's point of view.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, params};

use crate::config::SweepSettings;
use crate::engine::{EngineArgs, FormatConverter, SimulationEngine};
use crate::error::EngineError;
use crate::process::ProcessOutcome;
use crate::scenario::Horizon;
use crate::session::{SessionLayout, WorkerSession};

/// Rows seeded into every fixture coefficient table
pub const SEED_COEFFICIENTS: &[(&str, u32, &str, f64)] = &[
    ("fert", 1, "beta", 0.0),
    ("fert", 2, "beta", 0.5),
    ("mort", 1, "alpha", 1.0),
];

/// Create a run store with the coefficient table seeded from `rows`
pub fn create_run_store(path: &Path, rows: &[(&str, u32, &str, f64)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE ifs_reg_coeff (
             RegressionName TEXT NOT NULL,
             RegressionSeq INTEGER NOT NULL,
             Name TEXT NOT NULL,
             Value REAL NOT NULL
         );
         CREATE TABLE ifs_var_blob (
             VariableName TEXT PRIMARY KEY,
             Data BLOB
         );",
    )
    .unwrap();
    for (function, seq, name, value) in rows {
        conn.execute(
            "INSERT INTO ifs_reg_coeff (RegressionName, RegressionSeq, Name, Value) \
             VALUES (?1, ?2, ?3, ?4)",
            params![function, seq, name, value],
        )
        .unwrap();
    }
}

/// Store a blob for `variable`, creating the blob table if needed
pub fn put_blob(path: &Path, variable: &str, data: Option<&[u8]>) {
    let conn = Connection::open(path).unwrap();
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ifs_var_blob (VariableName TEXT PRIMARY KEY, Data BLOB)",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT OR REPLACE INTO ifs_var_blob (VariableName, Data) VALUES (?1, ?2)",
        params![variable, data],
    )
    .unwrap();
}

/// Create `<dir>/<name>` laid out as a session root with a seeded base store
pub fn session_root(dir: &Path, name: &str, settings: &SweepSettings) -> PathBuf {
    let root = dir.join(name);
    fs::create_dir_all(&root).unwrap();
    let layout = SessionLayout::resolve(&root, settings);
    fs::create_dir_all(&layout.model_dir).unwrap();
    create_run_store(&layout.base_store, SEED_COEFFICIENTS);
    root
}

/// Settings for `roots` session roots under `dir`, archiving to `dir/out`
pub fn test_settings(dir: &Path, roots: usize) -> SweepSettings {
    let session_roots = (0..roots).map(|i| dir.join(format!("ifs{i:02}"))).collect();
    SweepSettings::new(Horizon::new(1995, 1997).unwrap(), dir.join("out"), session_roots)
}

/// Engine stand-in.
///
/// Each run writes the current scenario file as the `TFR` blob of the
/// working store, an empty `POP` blob, and leaves the other output
/// variables absent. Every call is recorded.
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    layout: SessionLayout,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub fail_to_start: bool,
    pub calls: Arc<Mutex<Vec<EngineArgs>>>,
}

impl ScriptedEngine {
    pub fn new(root: &Path, settings: &SweepSettings) -> Self {
        Self {
            layout: SessionLayout::resolve(root, settings),
            stderr: String::new(),
            exit_code: Some(0),
            fail_to_start: false,
            calls: Arc::default(),
        }
    }
}

impl SimulationEngine for ScriptedEngine {
    fn run(&mut self, args: &EngineArgs) -> Result<ProcessOutcome, EngineError> {
        if self.fail_to_start {
            return Err(EngineError::Spawn {
                program: "scripted".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such engine"),
            });
        }
        self.calls.lock().unwrap().push(args.clone());

        let scenario = fs::read(&self.layout.scenario_path).unwrap();
        put_blob(&self.layout.working_store, "TFR", Some(&scenario));
        put_blob(&self.layout.working_store, "POP", Some(&[]));

        Ok(ProcessOutcome {
            exit_code: self.exit_code,
            stderr: self.stderr.clone(),
            progress_lines: 3,
            last_progress: Some(format!("Year {}", args.forecast_year)),
            elapsed: Duration::from_millis(1),
        })
    }
}

/// Converter stand-in that records the directories it was given
#[derive(Debug, Clone, Default)]
pub struct RecordingConverter {
    pub fail: bool,
    pub dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl FormatConverter for RecordingConverter {
    fn convert(&mut self, archive_dir: &Path) -> Result<ProcessOutcome, EngineError> {
        self.dirs.lock().unwrap().push(archive_dir.to_path_buf());
        if self.fail {
            return Err(EngineError::Exit {
                program: "converter".into(),
                status: "code 1".into(),
            });
        }
        Ok(ProcessOutcome {
            exit_code: Some(0),
            ..Default::default()
        })
    }
}

/// Open session `index` at `root` with a scripted engine
pub fn scripted_session(
    index: usize,
    root: &Path,
    settings: &SweepSettings,
    converter: Option<RecordingConverter>,
) -> WorkerSession {
    let engine = Box::new(ScriptedEngine::new(root, settings));
    let converter = converter.map(|c| Box::new(c) as Box<dyn FormatConverter>);
    WorkerSession::with_engine(index, root, settings, engine, converter).unwrap()
}

/// Read one coefficient value straight from a store file
pub fn stored_coefficient(path: &Path, function: &str, seq: u32, name: &str) -> f64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row(
        "SELECT Value FROM ifs_reg_coeff WHERE RegressionName = ?1 AND RegressionSeq = ?2 AND Name = ?3",
        params![function, seq, name],
        |row| row.get(0),
    )
    .unwrap()
}
