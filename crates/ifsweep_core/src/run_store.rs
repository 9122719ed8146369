//! Access to the engine's SQLite run store.
//!
//! Two tables matter to the sweep:
//! - `ifs_reg_coeff(RegressionName, RegressionSeq, Name, Value)` holds the
//!   regression coefficients the engine reads at start-up;
//! - `ifs_var_blob(VariableName, Data)` holds one result blob per output
//!   variable after a run.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::error::RunError;
use crate::model::CoefficientValue;

pub const COEFFICIENT_TABLE: &str = "ifs_reg_coeff";
pub const BLOB_TABLE: &str = "ifs_var_blob";

/// Round a coefficient to the precision written into the store
pub fn store_precision(value: f64) -> f64 {
    (value * 1e5).round() / 1e5
}

/// Outcome of injecting one coefficient set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionReport {
    /// Coefficients whose row was found and updated
    pub updated: usize,
    /// Coefficient ids that matched no row
    pub unmatched: Vec<String>,
}

/// Handle on one run store file. Connections are opened per operation and
/// never create the file.
#[derive(Debug, Clone)]
pub struct RunStore {
    path: PathBuf,
}

impl RunStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, rusqlite::Error> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// Copy this store to `target`, replacing whatever is there.
    pub fn checkout(&self, target: &Path) -> Result<RunStore, RunError> {
        fs::copy(&self.path, target).map_err(|e| {
            RunError::io(
                format!(
                    "copying run store {} to {}",
                    self.path.display(),
                    target.display()
                ),
                e,
            )
        })?;
        Ok(RunStore::new(target))
    }

    /// Write each coefficient value into the coefficient table.
    ///
    /// Every update commits on its own; there is no enclosing transaction,
    /// so an interrupted injection leaves the earlier updates in place.
    pub fn inject_coefficients(
        &self,
        coefficients: &[CoefficientValue],
    ) -> Result<InjectionReport, RunError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "UPDATE [{COEFFICIENT_TABLE}] SET Value = ?1 \
             WHERE RegressionName = ?2 AND RegressionSeq = ?3 AND Name = ?4"
        ))?;

        let mut report = InjectionReport::default();
        for coef in coefficients {
            let rows = stmt.execute(params![
                store_precision(coef.value),
                coef.id.function(),
                coef.id.sequence(),
                coef.id.name(),
            ])?;
            if rows == 0 {
                report.unmatched.push(coef.id.to_string());
            } else {
                report.updated += 1;
            }
        }

        Ok(report)
    }

    /// Read the stored value of one coefficient
    pub fn coefficient(
        &self,
        function: &str,
        sequence: u32,
        name: &str,
    ) -> Result<Option<f64>, RunError> {
        let conn = self.open()?;
        let value = conn
            .query_row(
                &format!(
                    "SELECT Value FROM [{COEFFICIENT_TABLE}] \
                     WHERE RegressionName = ?1 AND RegressionSeq = ?2 AND Name = ?3"
                ),
                params![function, sequence, name],
                |row| row.get::<_, f64>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Fetch the result blob of one output variable.
    ///
    /// Returns `None` when the variable has no row or an empty/NULL blob.
    pub fn variable_blob(&self, variable: &str) -> Result<Option<Vec<u8>>, RunError> {
        let conn = self.open()?;
        let blob = conn
            .query_row(
                &format!("SELECT Data FROM [{BLOB_TABLE}] WHERE VariableName = ?1"),
                params![variable],
                |row| row.get::<_, Option<Vec<u8>>>(0),
            )
            .optional()?
            .flatten()
            .filter(|data| !data.is_empty());
        Ok(blob)
    }

    /// Write each non-empty variable blob to `<dir>/<variable>.<extension>`.
    ///
    /// Missing or empty variables are skipped. Returns the names written.
    pub fn export_variables(
        &self,
        variables: &[String],
        dir: &Path,
        extension: &str,
    ) -> Result<Vec<String>, RunError> {
        let mut written = Vec::new();
        for variable in variables {
            let Some(blob) = self.variable_blob(variable)? else {
                tracing::debug!(variable = %variable, "No data for output variable, skipping");
                continue;
            };
            let path = dir.join(format!("{variable}.{extension}"));
            fs::write(&path, &blob)
                .map_err(|e| RunError::io(format!("writing {}", path.display()), e))?;
            written.push(variable.clone());
        }
        Ok(written)
    }

    /// Delete the store file
    pub fn remove(self) -> Result<(), RunError> {
        fs::remove_file(&self.path)
            .map_err(|e| RunError::io(format!("removing {}", self.path.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_precision() {
        assert_eq!(store_precision(0.123456), 0.12346);
        assert_eq!(store_precision(0.1), 0.1);
        assert_eq!(store_precision(-1.000004), -1.0);
    }

    #[test]
    fn test_open_missing_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::new(dir.path().join("missing.run.db"));
        assert!(matches!(store.inject_coefficients(&[]), Err(RunError::Store(_))));
        assert!(!store.path().exists());
    }
}
