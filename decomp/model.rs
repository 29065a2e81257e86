use crate::eigen::SolverBranch;
use crate::method::Method;
use crate::threshold::Threshold;
use ndarray::{Array1, Array2, ArrayView2, s};
use ndarray_linalg::c64;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use thiserror::Error;

// --- Public Data Structures ---

fn default_real_part() -> bool {
    true
}

/// Everything that parameterizes a decomposition besides the data itself.
///
/// Serialized to and from TOML, e.g.
///
/// ```toml
/// method = "ccaridge"
/// real_part = true
/// threshold = [0.5, 2.0]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionConfig {
    #[serde(default)]
    pub method: Method,
    /// Restrict the well-conditioned solve to real parts (the `realflag`).
    #[serde(default = "default_real_part")]
    pub real_part: bool,
    #[serde(default)]
    pub threshold: Threshold,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            method: Method::default(),
            real_part: true,
            threshold: Threshold::default(),
        }
    }
}

impl DecompositionConfig {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn with_threshold(mut self, threshold: impl Into<Threshold>) -> Self {
        self.threshold = threshold.into();
        self
    }

    pub fn with_real_part(mut self, real_part: bool) -> Self {
        self.real_part = real_part;
        self
    }

    /// Saves the configuration in TOML format.
    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    /// Loads a configuration from a TOML file. Missing keys take their defaults.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config = toml::from_str(&toml_string)?;
        Ok(config)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

/// The output of one decomposition.
///
/// `projection` is `E`, with rows in `[x, y]` order and one column per component.
/// `strengths` is `D`: eigenvalues for PLS and CCA, residual sums of squares for MLR.
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub method: Method,
    pub projection: Array2<c64>,
    pub strengths: Array1<c64>,
    pub nx: usize,
    pub ny: usize,
    pub solver: SolverBranch,
    /// `cond₂(B)` of the matrix handed to the eigensolver.
    pub condition_number: f64,
    /// `min(|x|, |y|)`; more than `n_components()` when the eigenproblem was too small.
    pub requested_components: usize,
    /// Components kept per block by the SVD reduction.
    pub retained: Option<[usize; 2]>,
    /// Per-block column norms divided out during normalization.
    pub norms: (Array1<f64>, Array1<f64>),
}

impl Decomposition {
    pub fn n_components(&self) -> usize {
        self.strengths.len()
    }

    /// Whether fewer components were available than `min(|x|, |y|)`.
    pub fn is_truncated(&self) -> bool {
        self.n_components() < self.requested_components
    }

    pub fn x_weights(&self) -> ArrayView2<'_, c64> {
        self.projection.slice(s![..self.nx, ..])
    }

    pub fn y_weights(&self) -> ArrayView2<'_, c64> {
        self.projection.slice(s![self.nx.., ..])
    }

    pub fn real_projection(&self) -> Array2<f64> {
        self.projection.mapv(|v| v.re)
    }

    pub fn real_strengths(&self) -> Array1<f64> {
        self.strengths.mapv(|v| v.re)
    }

    /// Largest imaginary magnitude across `E` and `D`; zero on the real-part path.
    pub fn max_imaginary(&self) -> f64 {
        self.projection
            .iter()
            .chain(self.strengths.iter())
            .fold(0.0_f64, |max, v| max.max(v.im.abs()))
    }
}
