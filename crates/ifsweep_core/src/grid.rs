//! Linear test grids for sweep variables

use crate::error::GridError;

/// Produce `steps` evenly spaced values from `min` to `max`, both inclusive.
///
/// The first value is exactly `min` and the last is exactly `max`; interior
/// points are interpolated linearly. Equal bounds yield a constant grid.
pub fn linspace(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, GridError> {
    if steps < 2 {
        return Err(GridError::TooFewSteps(steps));
    }
    if !min.is_finite() || !max.is_finite() {
        return Err(GridError::NonFinite { min, max });
    }
    if min > max {
        return Err(GridError::Inverted { min, max });
    }

    let last = steps - 1;
    let span = max - min;
    let values = (0..steps)
        .map(|idx| match idx {
            0 => min,
            i if i == last => max,
            i => min + span * (i as f64) / (last as f64),
        })
        .collect();

    Ok(values)
}
