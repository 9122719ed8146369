//! Scenario file construction.
//!
//! A scenario file tells the engine which custom values and coefficients to
//! apply for one run:
//!
//! ```text
//! CUSTOM,TFR_adj,World,0.8,0.8,0.8
//! COMMENT,START
//! Coefficient,fert_1_beta,0.1
//! Scenario_ID:5f0c...
//! ```
//!
//! Every parameter value is repeated once per forecast year (a flat
//! trajectory). The id marker is the last line and has no newline.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{Combination, Dimension, ScenarioId};

/// Forecast horizon, both years inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horizon {
    pub start_year: i32,
    pub end_year: i32,
}

impl Horizon {
    pub fn new(start_year: i32, end_year: i32) -> Result<Self, ConfigError> {
        let horizon = Self {
            start_year,
            end_year,
        };
        horizon.validate()?;
        Ok(horizon)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end_year < self.start_year {
            return Err(ConfigError::InvertedHorizon {
                start: self.start_year,
                end: self.end_year,
            });
        }
        Ok(())
    }

    /// Number of values on each `CUSTOM` line
    pub fn year_count(&self) -> usize {
        let years = i64::from(self.end_year) - i64::from(self.start_year) + 1;
        usize::try_from(years).unwrap_or(0)
    }
}

/// Render a value for the scenario file.
///
/// Rounded to 6 decimals; a value that rounds to zero is written as `0`,
/// anything else as fixed-point with trailing zeros and a dangling decimal
/// point removed (`1.2300000` → `1.23`, `1.0` → `1`).
pub fn format_value(value: f64) -> String {
    let fixed = format!("{value:.6}");
    if fixed.chars().all(|c| matches!(c, '-' | '0' | '.')) {
        return "0".to_string();
    }
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Rendered scenario text for one combination
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSpec {
    id: ScenarioId,
    text: String,
}

impl ScenarioSpec {
    pub fn build(id: ScenarioId, combination: &Combination, horizon: &Horizon) -> Self {
        let years = horizon.year_count();
        let mut text = String::new();

        for param in &combination.parameters {
            let value = format_value(param.value);
            let _ = write!(text, "CUSTOM,{}", param.name);
            if param.dimension == Dimension::World {
                text.push_str(",World");
            }
            for _ in 0..years {
                text.push(',');
                text.push_str(&value);
            }
            text.push('\n');
        }

        text.push_str("COMMENT,START\n");
        for coef in &combination.coefficients {
            let _ = writeln!(text, "Coefficient,{},{}", coef.id, format_value(coef.value));
        }

        let _ = write!(text, "Scenario_ID:{id}");

        Self { id, text }
    }

    pub fn id(&self) -> ScenarioId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Write the scenario to `path`, replacing any stale file left there.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => tracing::trace!(path = %path.display(), "Removed stale scenario file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::write(path, &self.text)
    }
}
