mod coefficient;
mod combination;
mod ids;
mod parameter;

pub use coefficient::{COEF_ID_DELIMITER, CoefId, Coefficient};
pub use combination::{CoefficientValue, Combination, ParameterValue};
pub use ids::ScenarioId;
pub use parameter::{Dimension, Parameter};

use crate::error::ConfigError;

/// Names end up inside comma separated scenario lines, so they must be
/// non-empty and free of field or line separators.
pub(crate) fn check_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() || name.contains([',', '\n', '\r']) {
        return Err(ConfigError::Invalid(format!(
            "name `{name}` must be non-empty and contain no commas or line breaks"
        )));
    }
    Ok(())
}
