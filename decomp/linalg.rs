//! Thin dense linear algebra layer over `ndarray-linalg`.
//!
//! Every routine here is generic over [`Element`], so the same pipeline runs on
//! real covariance matrices and on complex cross-spectral matrices.

use crate::estimate::DecompositionError;
use ndarray::{Array2, ArrayBase, Data, Ix2, s};
use ndarray_linalg::{Factorize, Lapack, SVD, Scalar, Solve, c64};

/// Scalar types accepted as covariance entries: `f64` and `c64`.
pub trait Element: Scalar<Real = f64, Complex = c64> + Lapack {}

impl<T> Element for T where T: Scalar<Real = f64, Complex = c64> + Lapack {}

/// Conjugate transpose `Mᴴ`. For real matrices this is the plain transpose.
pub fn conj_transpose<A, S>(matrix: &ArrayBase<S, Ix2>) -> Array2<A>
where
    A: Element,
    S: Data<Elem = A>,
{
    matrix.t().mapv(|v| v.conj())
}

/// The Hermitian part `(M + Mᴴ) / 2`.
pub fn hermitian_part<A: Element>(matrix: &Array2<A>) -> Array2<A> {
    let half = A::from_real(0.5);
    (matrix + &conj_transpose(matrix)).mapv(|v| v * half)
}

/// Calculate the 2-norm condition number of a matrix from its singular values.
///
/// Returns `f64::INFINITY` when the smallest singular value is zero, i.e. when the
/// matrix is exactly singular in floating point.
pub fn condition_number<A: Element>(matrix: &Array2<A>) -> Result<f64, DecompositionError> {
    let (_, singular, _) = matrix
        .svd(false, false)
        .map_err(DecompositionError::SvdFailed)?;

    let max_sv = singular.iter().fold(0.0_f64, |max, &val| max.max(val));
    let min_sv = singular.iter().fold(f64::INFINITY, |min, &val| min.min(val));

    // NaN singular values count as singular.
    if min_sv.is_nan() || min_sv <= 0.0 {
        return Ok(f64::INFINITY);
    }

    Ok(max_sv / min_sv)
}

/// Moore-Penrose pseudo-inverse via SVD.
///
/// Singular values at or below `max(rows, cols) * σ_max * ε` are treated as zero.
pub fn pseudo_inverse<A: Element>(matrix: &Array2<A>) -> Result<Array2<A>, DecompositionError> {
    let (rows, cols) = matrix.dim();
    let (u, singular, vt) = matrix
        .svd(true, true)
        .map_err(DecompositionError::SvdFailed)?;
    let (Some(u), Some(vt)) = (u, vt) else {
        return Err(DecompositionError::MissingSingularVectors);
    };

    let max_sv = singular.iter().fold(0.0_f64, |max, &val| max.max(val));
    let cutoff = rows.max(cols) as f64 * max_sv * f64::EPSILON;
    let rank = singular.iter().take_while(|&&sv| sv > cutoff).count();

    // pinv = V_r Σ_r⁻¹ U_rᴴ
    let mut v_scaled = conj_transpose(&vt.slice(s![..rank, ..]));
    for (k, mut column) in v_scaled.columns_mut().into_iter().enumerate() {
        let inv = A::from_real(1.0 / singular[k]);
        column.mapv_inplace(|v| v * inv);
    }
    let u_rank_h = conj_transpose(&u.slice(s![.., ..rank]));

    Ok(v_scaled.dot(&u_rank_h))
}

/// Solves `B X = R` column by column with a single LU factorization of `B`.
pub fn solve_columns<A: Element>(
    lhs: &Array2<A>,
    rhs: &Array2<A>,
) -> Result<Array2<A>, DecompositionError> {
    let lu = lhs
        .factorize()
        .map_err(DecompositionError::LinearSystemSolveFailed)?;
    let mut solution = Array2::<A>::zeros(rhs.raw_dim());
    for (j, column) in rhs.columns().into_iter().enumerate() {
        let x = lu
            .solve(&column.to_owned())
            .map_err(DecompositionError::LinearSystemSolveFailed)?;
        solution.column_mut(j).assign(&x);
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_condition_number_of_identity_is_one() {
        let identity = Array2::<f64>::eye(4);
        assert_abs_diff_eq!(condition_number(&identity).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_condition_number_detects_singular_matrix() {
        let singular = array![[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [3.0, 6.0, 9.0]];
        let cond = condition_number(&singular).unwrap();
        assert!(cond > 1e8, "rank-one matrix should be ill-conditioned, got {cond:e}");
    }

    #[test]
    fn test_condition_number_of_diagonal_matrix() {
        let diag = array![[10.0, 0.0], [0.0, 0.5]];
        assert_abs_diff_eq!(condition_number(&diag).unwrap(), 20.0, epsilon = 1e-10);
    }

    #[test]
    fn test_pseudo_inverse_matches_inverse_for_full_rank() {
        let m = array![[4.0, 1.0], [2.0, 3.0]];
        let pinv = pseudo_inverse(&m).unwrap();
        let product = m.dot(&pinv);
        assert!(product.abs_diff_eq(&Array2::eye(2), 1e-12));
    }

    #[test]
    fn test_pseudo_inverse_of_rank_deficient_matrix() {
        let m = array![[1.0, 1.0], [1.0, 1.0]];
        let pinv = pseudo_inverse(&m).unwrap();
        assert!(pinv.abs_diff_eq(&array![[0.25, 0.25], [0.25, 0.25]], 1e-12));
        // Penrose condition A A⁺ A = A
        assert!(m.dot(&pinv).dot(&m).abs_diff_eq(&m, 1e-12));
    }

    #[test]
    fn test_complex_pseudo_inverse_satisfies_penrose_condition() {
        let m = array![
            [c64::new(2.0, 0.0), c64::new(0.0, 1.0)],
            [c64::new(0.0, -1.0), c64::new(2.0, 0.0)]
        ];
        let pinv = pseudo_inverse(&m).unwrap();
        let back = m.dot(&pinv).dot(&m);
        for (a, b) in back.iter().zip(m.iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_solve_columns_recovers_rhs() {
        let b = array![[3.0, 1.0, 0.0], [1.0, 4.0, 1.0], [0.0, 1.0, 5.0]];
        let x = array![[1.0, 0.0], [2.0, -1.0], [-1.0, 3.0]];
        let rhs = b.dot(&x);
        let solved = solve_columns(&b, &rhs).unwrap();
        assert!(solved.abs_diff_eq(&x, 1e-12));
    }

    #[test]
    fn test_hermitian_part_symmetrizes() {
        let m = array![
            [c64::new(1.0, 0.0), c64::new(2.0, 1.0)],
            [c64::new(0.0, 1.0), c64::new(3.0, 0.0)]
        ];
        let h = hermitian_part(&m);
        assert_eq!(h[(0, 1)], h[(1, 0)].conj());
        assert_eq!(h[(0, 1)], c64::new(1.0, 0.0));
    }
}
