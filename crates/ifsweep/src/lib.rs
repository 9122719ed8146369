//! Command-line front-end for the ifsweep scheduler
//!
//! Loads a YAML sweep file, sets up file logging and runs or previews the
//! sweep through `ifsweep_core`.

pub mod commands;
pub mod logging;
pub mod sweep_file;

pub use logging::init_logging;
pub use sweep_file::{LoadedSweep, SweepFile, SweepFileError};
