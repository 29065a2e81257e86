use crate::estimate::DecompositionError;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// The `thr` parameter shared by the SVD reduction and the ridge penalties.
///
/// For SVD reduction a value below one is the fraction of singular value mass to
/// keep, a value of one or more is a literal component count. For ridge and q-ridge
/// the values are penalty weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    /// One value broadcast to both blocks.
    Scalar(f64),
    /// `[x block, y block]`.
    PerBlock([f64; 2]),
    /// One ridge weight per variable, `x` variables first.
    PerVariable(Vec<f64>),
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::Scalar(0.9)
    }
}

impl From<f64> for Threshold {
    fn from(value: f64) -> Self {
        Threshold::Scalar(value)
    }
}

impl From<[f64; 2]> for Threshold {
    fn from(values: [f64; 2]) -> Self {
        Threshold::PerBlock(values)
    }
}

impl Threshold {
    /// Classifies a raw list by length: one entry is a scalar, two are per block,
    /// anything longer is per variable.
    pub fn from_slice(values: &[f64]) -> Result<Self, DecompositionError> {
        match values {
            [] => Err(DecompositionError::MalformedThreshold {
                found: 0,
                expected: None,
            }),
            [value] => Ok(Threshold::Scalar(*value)),
            [x, y] => Ok(Threshold::PerBlock([*x, *y])),
            _ => Ok(Threshold::PerVariable(values.to_vec())),
        }
    }

    fn values(&self) -> &[f64] {
        match self {
            Threshold::Scalar(value) => std::slice::from_ref(value),
            Threshold::PerBlock(values) => values,
            Threshold::PerVariable(values) => values,
        }
    }

    fn check_finite(&self) -> Result<(), DecompositionError> {
        match self.values().iter().find(|value| !value.is_finite()) {
            Some(&bad) => Err(DecompositionError::NonFiniteThreshold(bad)),
            None => Ok(()),
        }
    }

    /// Expands the threshold into one ridge weight per variable of the working space.
    ///
    /// A per-variable list takes precedence over the per-block reading, so a two-entry
    /// list on a two-variable problem is used as is (both readings coincide).
    pub fn ridge_weights(&self, nx: usize, ny: usize) -> Result<Array1<f64>, DecompositionError> {
        self.check_finite()?;
        let total = nx + ny;
        let weights = match self {
            Threshold::Scalar(value) => Array1::from_elem(total, *value),
            Threshold::PerBlock([wx, wy]) => {
                Array1::from_shape_fn(total, |i| if i < nx { *wx } else { *wy })
            }
            Threshold::PerVariable(values) if values.len() == total => Array1::from(values.clone()),
            Threshold::PerVariable(values) if values.len() == 2 => {
                return Threshold::PerBlock([values[0], values[1]]).ridge_weights(nx, ny);
            }
            Threshold::PerVariable(values) => {
                return Err(DecompositionError::MalformedThreshold {
                    found: values.len(),
                    expected: Some(total),
                });
            }
        };
        Ok(weights)
    }

    /// The `[x, y]` thresholds used by the SVD reduction.
    pub fn block_thresholds(&self) -> Result<[f64; 2], DecompositionError> {
        self.check_finite()?;
        match self {
            Threshold::Scalar(value) => Ok([*value, *value]),
            Threshold::PerBlock(values) => Ok(*values),
            Threshold::PerVariable(values) => match values.as_slice() {
                [x, y] => Ok([*x, *y]),
                _ => Err(DecompositionError::PerVariableReduction(values.len())),
            },
        }
    }
}
