//! Lazy enumeration of the parameter × coefficient space.
//!
//! The space is the Cartesian product of every parameter grid crossed with
//! every coefficient grid. It grows multiplicatively with each variable, so
//! it is only ever walked as a stream and never collected.
//!
//! Ordering is that of nested loops: the parameter product is the outer
//! loop, the coefficient product the inner one, and within each product the
//! last declared variable varies fastest. For a fixed parameter assignment
//! all coefficient variants are therefore emitted back to back.

use std::collections::HashSet;
use std::iter::FusedIterator;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::model::{
    CoefId, Coefficient, CoefficientValue, Combination, Dimension, Parameter, ParameterValue,
};

/// The declared sweep variables, in declaration order
#[derive(Debug, Clone, Default)]
pub struct SweepSpace {
    parameters: Vec<Parameter>,
    coefficients: Vec<Coefficient>,
}

impl SweepSpace {
    /// Build a space from its variables, rejecting duplicate names.
    pub fn new(
        parameters: Vec<Parameter>,
        coefficients: Vec<Coefficient>,
    ) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for name in parameters.iter().map(|p| p.name().to_string()) {
            if !seen.insert(name.clone()) {
                return Err(ConfigError::Duplicate(name));
            }
        }
        let mut seen = HashSet::new();
        for id in coefficients.iter().map(|c| c.id().to_string()) {
            if !seen.insert(id.clone()) {
                return Err(ConfigError::Duplicate(id));
            }
        }

        Ok(Self {
            parameters,
            coefficients,
        })
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn coefficients(&self) -> &[Coefficient] {
        &self.coefficients
    }

    /// Number of distinct parameter assignments
    pub fn parameter_points(&self) -> u128 {
        grid_product(self.parameters.iter().map(Parameter::steps))
    }

    /// Number of coefficient assignments per parameter assignment
    pub fn coefficient_points(&self) -> u128 {
        grid_product(self.coefficients.iter().map(Coefficient::steps))
    }

    /// Total number of combinations the stream will yield.
    ///
    /// Saturates at `u128::MAX` rather than overflowing.
    pub fn total_combinations(&self) -> u128 {
        self.parameter_points()
            .saturating_mul(self.coefficient_points())
    }

    /// Start a fresh walk over the space.
    pub fn combinations(&self) -> CombinationStream {
        CombinationStream::new(self)
    }
}

fn grid_product(steps: impl Iterator<Item = usize>) -> u128 {
    steps.fold(1u128, |acc, n| acc.saturating_mul(n as u128))
}

#[derive(Debug)]
struct ParameterAxis {
    name: Arc<str>,
    dimension: Dimension,
    values: Vec<f64>,
}

#[derive(Debug)]
struct CoefficientAxis {
    id: Arc<CoefId>,
    values: Vec<f64>,
}

/// Iterator over every [`Combination`] of a [`SweepSpace`].
///
/// Keeps one index per variable (parameters first, then coefficients) and
/// advances them like an odometer, so memory use is independent of the
/// size of the space.
#[derive(Debug)]
pub struct CombinationStream {
    parameters: Vec<ParameterAxis>,
    coefficients: Vec<CoefficientAxis>,
    indices: Vec<usize>,
    lengths: Vec<usize>,
    remaining: u128,
    done: bool,
}

impl CombinationStream {
    fn new(space: &SweepSpace) -> Self {
        let parameters: Vec<ParameterAxis> = space
            .parameters
            .iter()
            .map(|p| ParameterAxis {
                name: p.shared_name(),
                dimension: p.dimension(),
                values: p.test_values().to_vec(),
            })
            .collect();
        let coefficients: Vec<CoefficientAxis> = space
            .coefficients
            .iter()
            .map(|c| CoefficientAxis {
                id: c.shared_id(),
                values: c.test_values().to_vec(),
            })
            .collect();

        let lengths: Vec<usize> = parameters
            .iter()
            .map(|a| a.values.len())
            .chain(coefficients.iter().map(|a| a.values.len()))
            .collect();
        let remaining = space.total_combinations();

        Self {
            parameters,
            coefficients,
            indices: vec![0; lengths.len()],
            done: remaining == 0,
            lengths,
            remaining,
        }
    }

    /// Number of combinations not yet yielded
    pub fn remaining(&self) -> u128 {
        self.remaining
    }

    fn current(&self) -> Combination {
        let (param_idx, coef_idx) = self.indices.split_at(self.parameters.len());

        let parameters = self
            .parameters
            .iter()
            .zip(param_idx)
            .map(|(axis, &i)| ParameterValue {
                name: axis.name.clone(),
                dimension: axis.dimension,
                value: axis.values[i],
            })
            .collect();
        let coefficients = self
            .coefficients
            .iter()
            .zip(coef_idx)
            .map(|(axis, &i)| CoefficientValue {
                id: axis.id.clone(),
                value: axis.values[i],
            })
            .collect();

        Combination {
            parameters,
            coefficients,
        }
    }

    /// Step the odometer; the last index turns fastest.
    fn advance(&mut self) {
        for (index, &len) in self.indices.iter_mut().zip(&self.lengths).rev() {
            *index += 1;
            if *index < len {
                return;
            }
            *index = 0;
        }
        // Every index wrapped around
        self.done = true;
    }
}

impl Iterator for CombinationStream {
    type Item = Combination;

    fn next(&mut self) -> Option<Combination> {
        if self.done {
            return None;
        }
        let combination = self.current();
        self.advance();
        self.remaining = self.remaining.saturating_sub(1);
        Some(combination)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl FusedIterator for CombinationStream {}
