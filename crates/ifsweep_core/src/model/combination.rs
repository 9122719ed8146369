//! One concrete point of the sweep

use std::sync::Arc;

use super::{CoefId, Dimension};

/// Chosen value for one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValue {
    pub name: Arc<str>,
    pub dimension: Dimension,
    pub value: f64,
}

/// Chosen value for one coefficient
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientValue {
    pub id: Arc<CoefId>,
    pub value: f64,
}

/// A full assignment of values to every swept parameter and coefficient.
///
/// Entries keep the declaration order of the sweep space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Combination {
    pub parameters: Vec<ParameterValue>,
    pub coefficients: Vec<CoefficientValue>,
}

impl Combination {
    /// Value chosen for the named parameter
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters
            .iter()
            .find(|p| &*p.name == name)
            .map(|p| p.value)
    }

    /// Value chosen for the coefficient with the given textual id
    pub fn coefficient(&self, coef_id: &str) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|c| c.id.to_string() == coef_id)
            .map(|c| c.value)
    }
}
