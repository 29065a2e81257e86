//! Generalized eigensolver, ordering, per-block normalization, and MLR post-processing.

use crate::estimate::DecompositionError;
use crate::linalg::{Element, condition_number, pseudo_inverse, solve_columns};
use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut2, Axis, s};
use ndarray_linalg::{Eig, c64};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Condition number of `B` above which the pseudo-inverse path is taken.
pub const CONDITION_LIMIT: f64 = 1e8;

/// Imaginary parts below this fraction of the largest modulus count as roundoff.
const IMAGINARY_TOLERANCE: f64 = 1e-10;

/// Which of the two solve paths produced the eigenpairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverBranch {
    /// `B⁻¹A` by LU solve. `real_part` records whether the operand and the
    /// eigenpairs were restricted to their real parts.
    Direct { real_part: bool },
    /// `pinv(B)·A`, taken when `cond(B)` exceeds [`CONDITION_LIMIT`]. The real-part
    /// restriction is never applied on this path.
    PseudoInverse,
}

/// Eigenpairs of the generalized problem, sorted by descending eigenvalue.
#[derive(Debug, Clone)]
pub struct EigenSolution {
    pub values: Array1<c64>,
    pub vectors: Array2<c64>,
    pub branch: SolverBranch,
    pub condition_number: f64,
}

/// Solves `B⁻¹A v = λ v`, falling back to the pseudo-inverse of `B` when it is
/// ill-conditioned.
pub fn solve_generalized<A: Element>(
    a: &Array2<A>,
    b: &Array2<A>,
    real_part: bool,
) -> Result<EigenSolution, DecompositionError> {
    let condition = condition_number(b)?;

    let (values, vectors, branch) = if condition > CONDITION_LIMIT {
        log::warn!(
            "Denominator matrix is ill-conditioned (cond = {:.3e}); using the pseudo-inverse",
            condition
        );
        let operand = pseudo_inverse(b)?.dot(a);
        let (values, vectors) = operand
            .eig()
            .map_err(DecompositionError::EigendecompositionFailed)?;
        (values, vectors, SolverBranch::PseudoInverse)
    } else {
        let operand = solve_columns(b, a)?;
        if real_part {
            let real_operand: Array2<f64> = operand.mapv(|v| v.re());
            let (values, vectors) = real_operand
                .eig()
                .map_err(DecompositionError::EigendecompositionFailed)?;
            (
                values.mapv(|v| c64::new(v.re, 0.0)),
                vectors.mapv(|v| c64::new(v.re, 0.0)),
                SolverBranch::Direct { real_part: true },
            )
        } else {
            let (values, vectors) = operand
                .eig()
                .map_err(DecompositionError::EigendecompositionFailed)?;
            (values, vectors, SolverBranch::Direct { real_part: false })
        }
    };

    log::debug!(
        "Generalized eigenproblem of size {} solved via {:?} (cond = {:.3e})",
        values.len(),
        branch,
        condition
    );

    let order = descending_order(&values);
    let values = values.select(Axis(0), &order);
    let vectors = vectors.select(Axis(1), &order);

    Ok(EigenSolution {
        values,
        vectors,
        branch,
        condition_number: condition,
    })
}

/// Stable descending ordering of eigenvalues.
///
/// A spectrum whose imaginary parts are all roundoff is ordered by real part.
/// Otherwise values are ordered by modulus, ties broken by argument. NaN sorts first.
pub fn descending_order(values: &Array1<c64>) -> Vec<usize> {
    let scale = values.iter().fold(0.0_f64, |max, v| max.max(v.norm()));
    let tolerance = IMAGINARY_TOLERANCE * scale;
    let is_real = values.iter().all(|v| v.im.abs() <= tolerance);
    let key = |v: &c64| -> (f64, f64) {
        if is_real { (v.re, 0.0) } else { (v.norm(), v.arg()) }
    };
    let compare = |a: f64, b: f64| -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        }
    };

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| {
        let (ki, kj) = (key(&values[i]), key(&values[j]));
        compare(ki.0, kj.0).then_with(|| compare(ki.1, kj.1))
    });
    order
}

/// Divides each column of `E` by its Euclidean norm over the x-rows and, separately,
/// over the y-rows. Returns the `(norm_x, norm_y)` vectors.
///
/// Columns whose block norm is zero are left as they are.
pub fn normalize_blocks(e: &mut Array2<c64>, nx: usize) -> (Array1<f64>, Array1<f64>) {
    let norm_x = normalize_rows(e.slice_mut(s![..nx, ..]));
    let norm_y = normalize_rows(e.slice_mut(s![nx.., ..]));
    (norm_x, norm_y)
}

fn normalize_rows(mut block: ArrayViewMut2<c64>) -> Array1<f64> {
    let mut norms = Array1::zeros(block.ncols());
    for (k, mut column) in block.columns_mut().into_iter().enumerate() {
        let norm = column.iter().map(|v| v.norm_sqr()).sum::<f64>().sqrt();
        norms[k] = norm;
        if norm > 0.0 {
            column.mapv_inplace(|v| v / norm);
        } else {
            log::warn!("Component {} has a zero-norm block; left unnormalized", k);
        }
    }
    norms
}

/// Rescales the x-block of each column into regression beta weights,
/// `E(x,k) *= λ_k · norm_x,k / norm_y,k`.
///
/// Columns with a zero `norm_y,k` are skipped.
pub fn rescale_beta_weights(
    e: &mut Array2<c64>,
    nx: usize,
    eigenvalues: &Array1<c64>,
    norm_x: &Array1<f64>,
    norm_y: &Array1<f64>,
) {
    let mut x_block = e.slice_mut(s![..nx, ..]);
    for (k, mut column) in x_block.columns_mut().into_iter().enumerate() {
        if norm_y[k] == 0.0 {
            log::warn!("Component {} has a zero-norm y block; beta weights left unscaled", k);
            continue;
        }
        let scale = eigenvalues[k] * (norm_x[k] / norm_y[k]);
        column.mapv_inplace(|v| v * scale);
    }
}

/// Residual sum of squares for each regression component:
/// `tr(C_yy) − (E_yᵀ C_yx E_x)² / (E_xᵀ C_xx E_x)`.
pub fn residual_variance<A: Element>(
    covariance: &Array2<A>,
    e: ArrayView2<c64>,
    nx: usize,
) -> Array1<c64> {
    let c = covariance.mapv(|v| v.as_c());
    let cxx = c.slice(s![..nx, ..nx]);
    let cyx = c.slice(s![nx.., ..nx]);
    let total: c64 = c.slice(s![nx.., nx..]).diag().sum();

    let ex = e.slice(s![..nx, ..]);
    let ey = e.slice(s![nx.., ..]);
    Array1::from_shape_fn(e.ncols(), |k| {
        let bx = ex.column(k);
        let by = ey.column(k);
        let explained = by.dot(&cyx).dot(&bx);
        let design = bx.dot(&cxx).dot(&bx);
        total - explained * explained / design
    })
}
