//! Regression coefficients and their composite identity

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::grid::linspace;

/// Separator between the parts of a [`CoefId`]
pub const COEF_ID_DELIMITER: char = '_';

/// Composite identity `function_sequence_name` of a regression coefficient.
///
/// The textual form must split back into exactly three parts, so neither
/// the function nor the coefficient name may contain [`COEF_ID_DELIMITER`].
/// Construction rejects such names instead of producing an ambiguous id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoefId {
    function: String,
    sequence: u32,
    name: String,
}

impl CoefId {
    pub fn new(
        function: impl Into<String>,
        sequence: u32,
        name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let function = function.into();
        let name = name.into();
        for part in [&function, &name] {
            if part.is_empty() || part.contains(COEF_ID_DELIMITER) {
                return Err(ConfigError::InvalidComponent(part.clone()));
            }
            super::check_name(part)?;
        }
        Ok(Self {
            function,
            sequence,
            name,
        })
    }

    /// Regression (function) name, matched against `RegressionName`
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Position of the regression, matched against `RegressionSeq`
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Coefficient name, matched against `Name`
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for CoefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{COEF_ID_DELIMITER}{}{COEF_ID_DELIMITER}{}",
            self.function, self.sequence, self.name
        )
    }
}

impl FromStr for CoefId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedCoefId(s.to_string());
        let mut parts = s.split(COEF_ID_DELIMITER);
        let (Some(function), Some(sequence), Some(name), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        let sequence = sequence.parse::<u32>().map_err(|_| malformed())?;
        CoefId::new(function, sequence, name)
    }
}

/// A regression coefficient and its test grid. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficient {
    id: Arc<CoefId>,
    y_var: Option<String>,
    x_var: Option<String>,
    default: f64,
    min: f64,
    max: f64,
    test_values: Vec<f64>,
}

impl Coefficient {
    pub fn new(
        id: CoefId,
        default: f64,
        min: f64,
        max: f64,
        steps: usize,
    ) -> Result<Self, ConfigError> {
        let test_values = linspace(min, max, steps).map_err(|source| ConfigError::Grid {
            name: id.to_string(),
            source,
        })?;
        Ok(Self {
            id: Arc::new(id),
            y_var: None,
            x_var: None,
            default,
            min,
            max,
            test_values,
        })
    }

    /// Attach the regression's dependent and explanatory variable names.
    /// These are informational only.
    pub fn with_variables(mut self, y_var: Option<String>, x_var: Option<String>) -> Self {
        self.y_var = y_var;
        self.x_var = x_var;
        self
    }

    pub fn id(&self) -> &CoefId {
        &self.id
    }

    pub(crate) fn shared_id(&self) -> Arc<CoefId> {
        self.id.clone()
    }

    pub fn y_var(&self) -> Option<&str> {
        self.y_var.as_deref()
    }

    pub fn x_var(&self) -> Option<&str> {
        self.x_var.as_deref()
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn steps(&self) -> usize {
        self.test_values.len()
    }

    pub fn test_values(&self) -> &[f64] {
        &self.test_values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coef_id_round_trip() {
        let id = CoefId::new("fert", 1, "beta").unwrap();
        assert_eq!(id.to_string(), "fert_1_beta");

        let parsed: CoefId = "fert_1_beta".parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.function(), "fert");
        assert_eq!(parsed.sequence(), 1);
        assert_eq!(parsed.name(), "beta");
    }

    #[test]
    fn test_coef_id_rejects_delimiter_in_component() {
        assert_eq!(
            CoefId::new("life_exp", 2, "alpha"),
            Err(ConfigError::InvalidComponent("life_exp".to_string()))
        );
        assert!(CoefId::new("mort", 2, "").is_err());
    }

    #[test]
    fn test_coef_id_parse_malformed() {
        for bad in ["fert_1", "fert_x_beta", "fert_1_beta_extra", ""] {
            assert!(
                matches!(bad.parse::<CoefId>(), Err(ConfigError::MalformedCoefId(_))),
                "{bad} should be malformed"
            );
        }
    }

    #[test]
    fn test_coefficient_grid() {
        let coef = Coefficient::new(CoefId::new("fert", 1, "beta").unwrap(), 0.15, 0.1, 0.2, 2)
            .unwrap()
            .with_variables(Some("TFR".into()), Some("GDPPC".into()));
        assert_eq!(coef.test_values(), &[0.1, 0.2]);
        assert_eq!(coef.y_var(), Some("TFR"));
    }
}
