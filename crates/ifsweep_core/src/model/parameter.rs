//! Tunable model parameters

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::linspace;

/// Scope of a parameter in the scenario file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Global scalar, written as `CUSTOM,<name>,<values>`
    Scalar,
    /// World-scoped, written as `CUSTOM,<name>,World,<values>`
    #[default]
    World,
}

/// A tunable parameter and its test grid. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: Arc<str>,
    default: f64,
    min: f64,
    max: f64,
    dimension: Dimension,
    test_values: Vec<f64>,
}

impl Parameter {
    pub fn new(
        name: impl Into<String>,
        default: f64,
        min: f64,
        max: f64,
        steps: usize,
        dimension: Dimension,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        super::check_name(&name)?;
        let test_values = linspace(min, max, steps).map_err(|source| ConfigError::Grid {
            name: name.clone(),
            source,
        })?;

        Ok(Self {
            name: name.into(),
            default,
            min,
            max,
            dimension,
            test_values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        self.name.clone()
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }

    /// Returns the (min, max) bounds of the grid
    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn steps(&self) -> usize {
        self.test_values.len()
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn test_values(&self) -> &[f64] {
        &self.test_values
    }
}
