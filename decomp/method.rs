//! Structured decomposition methods.
//!
//! A method is a base family composed with an optional subspace reduction and an
//! optional penalty on the denominator matrix. Textual names such as `ccaridge`
//! or `mlrsvd` are parsed once at the boundary into a [`Method`].

use crate::estimate::DecompositionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The statistical family, which decides how the denominator matrix `B` is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Canonical correlation analysis: `B` keeps the within-block covariances.
    Cca,
    /// Partial least squares: `B` is the identity.
    Pls,
    /// Multivariate linear regression: `B` keeps `C(x,x)` and an identity for `y`.
    Mlr,
}

/// Optional dimensionality reduction applied before the eigenproblem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    #[default]
    None,
    /// Per-block truncated SVD of `B`.
    Svd,
}

/// Optional regularization added to `B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    #[default]
    None,
    /// Weighted identity.
    Ridge,
    /// Weighted first-difference smoothness penalty, one band per block.
    QRidge,
}

/// A fully specified decomposition method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Method {
    pub family: Family,
    pub reduction: Reduction,
    pub penalty: Penalty,
}

impl Method {
    pub const fn new(family: Family, reduction: Reduction, penalty: Penalty) -> Self {
        Self {
            family,
            reduction,
            penalty,
        }
    }

    /// The unmodified family, e.g. plain `cca`.
    pub const fn plain(family: Family) -> Self {
        Self::new(family, Reduction::None, Penalty::None)
    }

    pub fn with_reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn is_reduced(&self) -> bool {
        self.reduction == Reduction::Svd
    }

    pub fn is_penalized(&self) -> bool {
        self.penalty != Penalty::None
    }
}

impl Default for Method {
    fn default() -> Self {
        Self::plain(Family::Cca)
    }
}

impl Family {
    fn prefix(self) -> &'static str {
        match self {
            Family::Cca => "cca",
            Family::Pls => "pls",
            Family::Mlr => "mlr",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.family.prefix())?;
        match self.penalty {
            Penalty::None => {}
            Penalty::Ridge => f.write_str("ridge")?,
            Penalty::QRidge => f.write_str("qridge")?,
        }
        if self.reduction == Reduction::Svd {
            f.write_str("svd")?;
        }
        Ok(())
    }
}

/// Accepts `<family>[ridge|qridge][svd]`, case-insensitively.
impl FromStr for Method {
    type Err = DecompositionError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let lowered = name.trim().to_ascii_lowercase();
        let unknown = || DecompositionError::UnknownMethod(name.to_string());

        let family = match lowered.get(..3) {
            Some("cca") => Family::Cca,
            Some("pls") => Family::Pls,
            Some("mlr") => Family::Mlr,
            _ => return Err(unknown()),
        };

        let mut rest = &lowered[3..];
        let penalty = if let Some(tail) = rest.strip_prefix("qridge") {
            rest = tail;
            Penalty::QRidge
        } else if let Some(tail) = rest.strip_prefix("ridge") {
            rest = tail;
            Penalty::Ridge
        } else {
            Penalty::None
        };
        let reduction = match rest {
            "" => Reduction::None,
            "svd" => Reduction::Svd,
            _ => return Err(unknown()),
        };

        Ok(Method::new(family, reduction, penalty))
    }
}

impl TryFrom<String> for Method {
    type Error = DecompositionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.to_string()
    }
}
