//! Sweep Builder
//!
//! Fluent construction of a [`SweepSpace`]. `ParameterSpec` and `CoefficientSpec` double
//! as the serde shape of the `parameters` and `coefficients` sections of a sweep
//! file, so a hand-written sweep and a loaded one go through the same
//! validation.
//!
//! # Example
//!
//! ```ignore
//! use ifsweep_core::config::{CoefficientSpec, ParameterSpec, SweepBuilder};
//!
//! let space = SweepBuilder::new()
//!     // World-scoped fertility adjustment, 3 test values
//!     .parameter(ParameterSpec::world("TFR_adj").bounds(0.8, 1.0).steps(3))
//!     // Switched off: kept in the file, left out of the sweep
//!     .parameter(ParameterSpec::scalar("LIFEXP_adj").bounds(0.9, 1.1).off())
//!     .coefficient(
//!         CoefficientSpec::new("fert", 1, "beta")
//!             .regression("TFR", "GDPPC")
//!             .bounds(0.1, 0.2)
//!             .steps(2),
//!     )
//!     .build()?;
//!
//! assert_eq!(space.total_combinations(), 6);
//! ```

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::combinations::SweepSpace;
use crate::error::ConfigError;
use crate::model::{CoefId, Coefficient, Dimension, Parameter};

/// Test grid density used when none is given
pub const DEFAULT_STEPS: usize = 20;

fn default_steps() -> usize {
    DEFAULT_STEPS
}

// =============================================================================
// Switch
// =============================================================================

/// An on/off flag as it appears in sweep inputs.
///
/// Accepts booleans and the strings `on`/`off`, `true`/`false`, `yes`/`no`
/// in any case. Serializes as `on` or `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Switch {
    #[default]
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        self == Switch::On
    }
}

impl From<bool> for Switch {
    fn from(on: bool) -> Self {
        if on { Switch::On } else { Switch::Off }
    }
}

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Switch::On => "on",
            Switch::Off => "off",
        })
    }
}

impl Serialize for Switch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct SwitchVisitor;

impl Visitor<'_> for SwitchVisitor {
    type Value = Switch;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a boolean or one of on/off, true/false, yes/no")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Switch, E> {
        Ok(Switch::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Switch, E> {
        match v.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "yes" => Ok(Switch::On),
            "off" | "false" | "no" => Ok(Switch::Off),
            _ => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
        }
    }
}

impl<'de> Deserialize<'de> for Switch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SwitchVisitor)
    }
}

// =============================================================================
// Parameter spec
// =============================================================================

/// Declaration of one tunable parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    /// Value used outside the sweep. Falls back to `min`.
    #[serde(default)]
    pub default: Option<f64>,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default)]
    pub dimension: Dimension,
    #[serde(default)]
    pub tuning: Switch,
}

impl ParameterSpec {
    fn with_dimension(name: impl Into<String>, dimension: Dimension) -> Self {
        Self {
            name: name.into(),
            default: None,
            min: 0.0,
            max: 0.0,
            steps: DEFAULT_STEPS,
            dimension,
            tuning: Switch::On,
        }
    }

    /// A World-scoped parameter
    pub fn world(name: impl Into<String>) -> Self {
        Self::with_dimension(name, Dimension::World)
    }

    /// A global scalar parameter
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::with_dimension(name, Dimension::Scalar)
    }

    #[must_use]
    pub fn bounds(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    #[must_use]
    pub fn steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: f64) -> Self {
        self.default = Some(value);
        self
    }

    /// Keep the declaration but leave it out of the sweep
    #[must_use]
    pub fn off(mut self) -> Self {
        self.tuning = Switch::Off;
        self
    }

    pub fn into_parameter(self) -> Result<Parameter, ConfigError> {
        Parameter::new(
            self.name,
            self.default.unwrap_or(self.min),
            self.min,
            self.max,
            self.steps,
            self.dimension,
        )
    }
}

// =============================================================================
// Coefficient spec
// =============================================================================

/// Declaration of one regression coefficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSpec {
    /// Regression (function) name
    pub function: String,
    pub sequence: u32,
    /// Coefficient name within the regression
    pub coefficient: String,
    #[serde(default)]
    pub y_variable: Option<String>,
    #[serde(default)]
    pub x_variable: Option<String>,
    #[serde(default)]
    pub default: Option<f64>,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default)]
    pub tuning: Switch,
}

impl CoefficientSpec {
    pub fn new(function: impl Into<String>, sequence: u32, coefficient: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            sequence,
            coefficient: coefficient.into(),
            y_variable: None,
            x_variable: None,
            default: None,
            min: 0.0,
            max: 0.0,
            steps: DEFAULT_STEPS,
            tuning: Switch::On,
        }
    }

    /// Name the regression's dependent and explanatory variables
    #[must_use]
    pub fn regression(mut self, y_variable: impl Into<String>, x_variable: impl Into<String>) -> Self {
        self.y_variable = Some(y_variable.into());
        self.x_variable = Some(x_variable.into());
        self
    }

    #[must_use]
    pub fn bounds(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    #[must_use]
    pub fn steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: f64) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn off(mut self) -> Self {
        self.tuning = Switch::Off;
        self
    }

    pub fn into_coefficient(self) -> Result<Coefficient, ConfigError> {
        let id = CoefId::new(self.function, self.sequence, self.coefficient)?;
        let coefficient = Coefficient::new(
            id,
            self.default.unwrap_or(self.min),
            self.min,
            self.max,
            self.steps,
        )?;
        Ok(coefficient.with_variables(self.y_variable, self.x_variable))
    }
}

// =============================================================================
// Sweep builder
// =============================================================================

/// Collects parameter and coefficient declarations into a [`SweepSpace`]
#[derive(Debug, Clone, Default)]
pub struct SweepBuilder {
    parameters: Vec<ParameterSpec>,
    coefficients: Vec<CoefficientSpec>,
}

impl SweepBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(parameters: Vec<ParameterSpec>, coefficients: Vec<CoefficientSpec>) -> Self {
        Self {
            parameters,
            coefficients,
        }
    }

    #[must_use]
    pub fn parameter(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    #[must_use]
    pub fn coefficient(mut self, spec: CoefficientSpec) -> Self {
        self.coefficients.push(spec);
        self
    }

    /// Validate the declarations switched on for tuning and build the space.
    ///
    /// Entries switched off are dropped before validation, so a disabled
    /// entry with placeholder bounds never fails the build.
    pub fn build(self) -> Result<SweepSpace, ConfigError> {
        let parameters = self
            .parameters
            .into_iter()
            .filter(|spec| spec.tuning.is_on())
            .map(ParameterSpec::into_parameter)
            .collect::<Result<Vec<_>, _>>()?;
        let coefficients = self
            .coefficients
            .into_iter()
            .filter(|spec| spec.tuning.is_on())
            .map(CoefficientSpec::into_coefficient)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            parameters = parameters.len(),
            coefficients = coefficients.len(),
            "Building sweep space"
        );

        SweepSpace::new(parameters, coefficients)
    }
}
