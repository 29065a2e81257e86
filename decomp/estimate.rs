//! The decomposition entry points.
//!
//! `decompose` runs the full pipeline for one covariance matrix:
//! build `A`/`B`, penalize `B`, optionally reduce to an SVD subspace, solve the
//! generalized eigenproblem, then normalize per block (and for MLR convert to beta
//! weights and residual variances).

use crate::construction::{apply_penalty, build_block_system};
use crate::eigen::{
    normalize_blocks, rescale_beta_weights, residual_variance, solve_generalized,
};
use crate::linalg::Element;
use crate::method::Family;
use crate::model::{Decomposition, DecompositionConfig};
use crate::reduction::reduce_subspace;
use ndarray::{Array2, Array3, Axis, s};
use ndarray_linalg::c64;
use rayon::prelude::*;
use thiserror::Error;

/// Coarse classification of [`DecompositionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is malformed; nothing was computed.
    InvalidArgument,
    /// A dense linear algebra routine failed on the given data.
    NumericalFailure,
}

#[derive(Error, Debug)]
pub enum DecompositionError {
    #[error("Unsupported decomposition method '{0}'. Expected <cca|pls|mlr>[ridge|qridge][svd].")]
    UnknownMethod(String),

    #[error(
        "Threshold has {} entries; expected 1, 2{}.",
        .found,
        per_variable_hint(.expected)
    )]
    MalformedThreshold {
        found: usize,
        expected: Option<usize>,
    },

    #[error("Threshold value {0} is not finite.")]
    NonFiniteThreshold(f64),

    #[error("SVD reduction needs one threshold per block, but {0} per-variable values were given.")]
    PerVariableReduction(usize),

    #[error("Covariance matrix must be square, but has shape {rows}x{cols}.")]
    NotSquare { rows: usize, cols: usize },

    #[error("Block '{0}' is empty.")]
    EmptyBlock(&'static str),

    #[error("Index {index} is out of range for a {size}x{size} covariance matrix.")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("Index {index} appears more than once in block '{block}'.")]
    DuplicateIndex { index: usize, block: &'static str },

    #[error("Index {0} appears in both blocks.")]
    OverlappingBlocks(usize),

    #[error("Singular value decomposition failed: {0}")]
    SvdFailed(ndarray_linalg::error::LinalgError),

    #[error("Singular value decomposition returned no singular vectors.")]
    MissingSingularVectors,

    #[error("A linear system solve failed. The denominator matrix may be singular. Error: {0}")]
    LinearSystemSolveFailed(ndarray_linalg::error::LinalgError),

    #[error("Eigendecomposition failed: {0}")]
    EigendecompositionFailed(ndarray_linalg::error::LinalgError),
}

fn per_variable_hint(expected: &Option<usize>) -> String {
    match expected {
        Some(n) => format!(" or {n} (one per variable)"),
        None => String::new(),
    }
}

impl DecompositionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecompositionError::SvdFailed(_)
            | DecompositionError::MissingSingularVectors
            | DecompositionError::LinearSystemSolveFailed(_)
            | DecompositionError::EigendecompositionFailed(_) => ErrorKind::NumericalFailure,
            _ => ErrorKind::InvalidArgument,
        }
    }
}

/// Decomposes the `x`/`y` blocks of a covariance or cross-spectral matrix.
///
/// Indices are zero-based positions in `covariance`. The rows of the returned
/// projection follow the order `[x..., y...]`.
pub fn decompose<A: Element>(
    covariance: &Array2<A>,
    x: &[usize],
    y: &[usize],
    config: &DecompositionConfig,
) -> Result<Decomposition, DecompositionError> {
    let method = config.method;
    log::info!(
        "Starting {} decomposition: |x|={}, |y|={}, real_part={}",
        method,
        x.len(),
        y.len(),
        config.real_part
    );

    // 0. Resolve the threshold shapes up front so nothing is computed on bad input.
    let block_thresholds = if method.is_reduced() {
        Some(config.threshold.block_thresholds()?)
    } else {
        None
    };

    // 1. Matrix builder.
    let mut system = build_block_system(covariance, x, y, method.family)?;
    let (nx, ny) = (system.nx, system.ny);

    // 2. Regularizer.
    if method.is_penalized() {
        apply_penalty(&mut system, method.penalty, &config.threshold)?;
    }

    // 3. Subspace reducer.
    let subspace = match block_thresholds {
        Some(thresholds) => Some(reduce_subspace(&mut system, thresholds)?),
        None => None,
    };

    // 4. Eigensolver.
    let solution = solve_generalized(&system.a, &system.b, config.real_part)?;

    let requested = nx.min(ny);
    let n = requested.min(solution.values.len());
    if n < requested {
        log::warn!(
            "Only {} eigenvalues available; returning {} of {} requested components",
            solution.values.len(),
            n,
            requested
        );
    }
    let mut strengths = solution.values.slice(s![..n]).to_owned();
    let reduced_vectors = solution.vectors.slice(s![.., ..n]).to_owned();

    let mut projection = match &subspace {
        Some(subspace) => subspace.basis.mapv(|v| v.as_c()).dot(&reduced_vectors),
        None => reduced_vectors,
    };

    // 5. Per-block normalization and the regression post-processing.
    let (norm_x, norm_y) = normalize_blocks(&mut projection, nx);
    if method.family == Family::Mlr {
        rescale_beta_weights(&mut projection, nx, &strengths, &norm_x, &norm_y);
        strengths = residual_variance(&system.covariance, projection.view(), nx);
    }

    log::info!(
        "Finished {} decomposition: {} components via {:?} (cond = {:.3e})",
        method,
        n,
        solution.branch,
        solution.condition_number
    );

    Ok(Decomposition {
        method,
        projection,
        strengths,
        nx,
        ny,
        solver: solution.branch,
        condition_number: solution.condition_number,
        requested_components: requested,
        retained: subspace.map(|subspace| subspace.kept),
        norms: (norm_x, norm_y),
    })
}

/// Decomposes every frequency bin of a cross-spectral tensor in parallel.
///
/// `cross_spectra` has shape `[n_freqs, n, n]`. Bins are independent; the output
/// keeps their order, and the first failing bin aborts the batch.
pub fn decompose_spectrum(
    cross_spectra: &Array3<c64>,
    x: &[usize],
    y: &[usize],
    config: &DecompositionConfig,
) -> Result<Vec<Decomposition>, DecompositionError> {
    let n_freqs = cross_spectra.len_of(Axis(0));
    log::info!("Decomposing {} frequency bins with {}", n_freqs, config.method);
    cross_spectra
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(|bin| decompose(&bin.to_owned(), x, y, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use ndarray::array;

    fn covariance() -> Array2<f64> {
        array![
            [1.0, 0.2, 0.6, 0.1],
            [0.2, 1.0, 0.1, 0.3],
            [0.6, 0.1, 1.0, 0.2],
            [0.1, 0.3, 0.2, 1.0]
        ]
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            DecompositionError::UnknownMethod("x".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            DecompositionError::OverlappingBlocks(1).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            DecompositionError::MissingSingularVectors.kind(),
            ErrorKind::NumericalFailure
        );
    }

    #[test]
    fn test_malformed_threshold_message() {
        let err = DecompositionError::MalformedThreshold {
            found: 3,
            expected: Some(4),
        };
        assert_eq!(
            err.to_string(),
            "Threshold has 3 entries; expected 1, 2 or 4 (one per variable)."
        );
    }

    #[test]
    fn test_reduction_rejects_per_variable_threshold_before_computing() {
        let config = DecompositionConfig::new("ccasvd".parse().unwrap())
            .with_threshold(crate::threshold::Threshold::PerVariable(vec![1.0, 1.0, 1.0, 1.0]));
        let err = decompose(&covariance(), &[0, 1], &[2, 3], &config).unwrap_err();
        assert!(matches!(err, DecompositionError::PerVariableReduction(4)));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_unpenalized_method_ignores_ridge_threshold_shape() {
        let threshold = crate::threshold::Threshold::PerVariable(vec![1.0, 1.0, 1.0]);
        let plain = DecompositionConfig::new("pls".parse().unwrap()).with_threshold(threshold.clone());
        assert!(decompose(&covariance(), &[0, 1], &[2, 3], &plain).is_ok());

        let ridged = DecompositionConfig::new("plsridge".parse().unwrap()).with_threshold(threshold);
        let err = decompose(&covariance(), &[0, 1], &[2, 3], &ridged).unwrap_err();
        assert!(matches!(
            err,
            DecompositionError::MalformedThreshold { found: 3, expected: Some(4) }
        ));
    }

    #[test]
    fn test_diagnostics_are_populated() {
        let config = DecompositionConfig::new("plssvd".parse::<Method>().unwrap()).with_threshold(1.0);
        let result = decompose(&covariance(), &[0, 1], &[2, 3], &config).unwrap();
        assert_eq!(result.retained, Some([1, 1]));
        assert_eq!(result.requested_components, 2);
        assert_eq!(result.n_components(), 2);
        assert!(!result.is_truncated());
        assert_eq!(result.projection.dim(), (4, 2));
        assert_eq!(result.norms.0.len(), 2);
    }

    #[test]
    fn test_spectrum_preserves_bin_order() {
        let mut spectra = Array3::<c64>::zeros((3, 4, 4));
        for f in 0..3 {
            let scale = (f + 1) as f64;
            let mut bin = covariance().mapv(|v| c64::new(v, 0.0));
            bin[[0, 2]] = c64::new(0.2 * scale, 0.0);
            bin[[2, 0]] = c64::new(0.2 * scale, 0.0);
            spectra.index_axis_mut(Axis(0), f).assign(&bin);
        }
        let config = DecompositionConfig::default();
        let results = decompose_spectrum(&spectra, &[0, 1], &[2, 3], &config).unwrap();
        assert_eq!(results.len(), 3);
        let leading: Vec<f64> = results.iter().map(|r| r.strengths[0].re).collect();
        assert!(leading[0] < leading[1] && leading[1] < leading[2], "{leading:?}");
    }
}
