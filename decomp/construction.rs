use crate::estimate::DecompositionError;
use crate::linalg::Element;
use crate::method::{Family, Penalty};
use crate::penalty::create_penalty_matrix;
use crate::threshold::Threshold;
use ndarray::{Array2, s};
use std::collections::HashSet;

/// The layout of the `[x, y]` working space and the generalized eigenproblem pair.
///
/// `covariance` is the input matrix restricted to `x ∪ y` and reordered so that the
/// `x` variables come first. `a` and `b` have the same shape and are mutated by the
/// later pipeline stages.
#[derive(Clone, Debug)]
pub struct BlockSystem<A: Element> {
    pub covariance: Array2<A>,
    pub a: Array2<A>,
    pub b: Array2<A>,
    pub nx: usize,
    pub ny: usize,
}

impl<A: Element> BlockSystem<A> {
    pub fn size(&self) -> usize {
        self.nx + self.ny
    }
}

/// Checks the index sets against an `n x n` matrix.
///
/// Both blocks must be non-empty, in range, free of duplicates, and disjoint.
pub fn validate_blocks(n: usize, x: &[usize], y: &[usize]) -> Result<(), DecompositionError> {
    if x.is_empty() {
        return Err(DecompositionError::EmptyBlock("x"));
    }
    if y.is_empty() {
        return Err(DecompositionError::EmptyBlock("y"));
    }

    let mut seen_x = HashSet::with_capacity(x.len());
    for &index in x {
        if index >= n {
            return Err(DecompositionError::IndexOutOfRange { index, size: n });
        }
        if !seen_x.insert(index) {
            return Err(DecompositionError::DuplicateIndex { index, block: "x" });
        }
    }

    let mut seen_y = HashSet::with_capacity(y.len());
    for &index in y {
        if index >= n {
            return Err(DecompositionError::IndexOutOfRange { index, size: n });
        }
        if seen_x.contains(&index) {
            return Err(DecompositionError::OverlappingBlocks(index));
        }
        if !seen_y.insert(index) {
            return Err(DecompositionError::DuplicateIndex { index, block: "y" });
        }
    }

    Ok(())
}

/// Builds `A` and `B` from the covariance matrix for the given family.
///
/// `A` holds the cross-block covariances only. `B` is the identity for PLS, the
/// within-block covariances for CCA, and `C(x,x)` next to an identity `y` block for MLR.
pub fn build_block_system<A: Element>(
    covariance: &Array2<A>,
    x: &[usize],
    y: &[usize],
    family: Family,
) -> Result<BlockSystem<A>, DecompositionError> {
    let (rows, cols) = covariance.dim();
    if rows != cols {
        return Err(DecompositionError::NotSquare { rows, cols });
    }
    validate_blocks(rows, x, y)?;

    let nx = x.len();
    let ny = y.len();
    let order: Vec<usize> = x.iter().chain(y.iter()).copied().collect();
    let restricted = Array2::from_shape_fn((nx + ny, nx + ny), |(i, j)| {
        covariance[[order[i], order[j]]]
    });

    let zero = A::from_real(0.0);

    let mut a = restricted.clone();
    a.slice_mut(s![..nx, ..nx]).fill(zero);
    a.slice_mut(s![nx.., nx..]).fill(zero);

    let b = match family {
        Family::Pls => Array2::<A>::eye(nx + ny),
        Family::Cca => {
            let mut b = restricted.clone();
            b.slice_mut(s![..nx, nx..]).fill(zero);
            b.slice_mut(s![nx.., ..nx]).fill(zero);
            b
        }
        Family::Mlr => {
            let mut b = Array2::<A>::zeros((nx + ny, nx + ny));
            b.slice_mut(s![..nx, ..nx])
                .assign(&restricted.slice(s![..nx, ..nx]));
            b.slice_mut(s![nx.., nx..]).assign(&Array2::<A>::eye(ny));
            b
        }
    };

    log::debug!(
        "Built {:?} block system: |x|={}, |y|={}, working size {}",
        family,
        nx,
        ny,
        nx + ny
    );

    Ok(BlockSystem {
        covariance: restricted,
        a,
        b,
        nx,
        ny,
    })
}

/// Adds the weighted ridge or q-ridge penalty to `B` in place.
pub fn apply_penalty<A: Element>(
    system: &mut BlockSystem<A>,
    penalty: Penalty,
    threshold: &Threshold,
) -> Result<(), DecompositionError> {
    if penalty == Penalty::None {
        return Ok(());
    }
    let weights = threshold.ridge_weights(system.nx, system.ny)?;
    let r = create_penalty_matrix(penalty, system.nx, system.ny, &weights);
    system.b.zip_mut_with(&r, |b, &p| *b += A::from_real(p));
    log::debug!(
        "Applied {:?} penalty with weights in [{:.3e}, {:.3e}]",
        penalty,
        weights.iter().cloned().fold(f64::INFINITY, f64::min),
        weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_covariance() -> Array2<f64> {
        array![
            [4.0, 0.5, 1.0, 0.2, 9.0],
            [0.5, 3.0, 0.3, 0.8, 9.0],
            [1.0, 0.3, 2.0, 0.1, 9.0],
            [0.2, 0.8, 0.1, 1.0, 9.0],
            [9.0, 9.0, 9.0, 9.0, 9.0]
        ]
    }

    #[test]
    fn test_cross_block_matrix_zeroes_auto_blocks() {
        let c = sample_covariance();
        let system = build_block_system(&c, &[0, 1], &[2, 3], Family::Cca).unwrap();
        let expected_a = array![
            [0.0, 0.0, 1.0, 0.2],
            [0.0, 0.0, 0.3, 0.8],
            [1.0, 0.3, 0.0, 0.0],
            [0.2, 0.8, 0.0, 0.0]
        ];
        assert_eq!(system.a, expected_a);
        let expected_b = array![
            [4.0, 0.5, 0.0, 0.0],
            [0.5, 3.0, 0.0, 0.0],
            [0.0, 0.0, 2.0, 0.1],
            [0.0, 0.0, 0.1, 1.0]
        ];
        assert_eq!(system.b, expected_b);
        // A and B partition the restricted covariance.
        assert_eq!(&system.a + &system.b, system.covariance);
    }

    #[test]
    fn test_pls_and_mlr_denominators() {
        let c = sample_covariance();
        let pls = build_block_system(&c, &[0, 1], &[2, 3], Family::Pls).unwrap();
        assert_eq!(pls.b, Array2::<f64>::eye(4));

        let mlr = build_block_system(&c, &[0, 1], &[2, 3], Family::Mlr).unwrap();
        let expected = array![
            [4.0, 0.5, 0.0, 0.0],
            [0.5, 3.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0]
        ];
        assert_eq!(mlr.b, expected);
    }

    #[test]
    fn test_working_space_follows_index_order() {
        let c = sample_covariance();
        let system = build_block_system(&c, &[3], &[1, 0], Family::Cca).unwrap();
        assert_eq!(system.covariance[[0, 0]], 1.0);
        assert_eq!(system.covariance[[0, 1]], 0.8);
        assert_eq!(system.covariance[[1, 2]], 0.5);
        assert_eq!(system.size(), 3);
    }

    #[test]
    fn test_invalid_blocks_are_rejected() {
        let c = sample_covariance();
        assert!(matches!(
            build_block_system(&c, &[0, 1], &[1, 2], Family::Cca),
            Err(DecompositionError::OverlappingBlocks(1))
        ));
        assert!(matches!(
            build_block_system(&c, &[0, 7], &[2], Family::Cca),
            Err(DecompositionError::IndexOutOfRange { index: 7, size: 5 })
        ));
        assert!(matches!(
            build_block_system(&c, &[0, 0], &[2], Family::Pls),
            Err(DecompositionError::DuplicateIndex { index: 0, block: "x" })
        ));
        assert!(matches!(
            build_block_system(&c, &[], &[2], Family::Mlr),
            Err(DecompositionError::EmptyBlock("x"))
        ));
        let rect = Array2::<f64>::zeros((3, 4));
        assert!(matches!(
            build_block_system(&rect, &[0], &[1], Family::Cca),
            Err(DecompositionError::NotSquare { rows: 3, cols: 4 })
        ));
    }

    #[test]
    fn test_ridge_penalty_adds_weighted_identity() {
        let c = sample_covariance();
        let mut system = build_block_system(&c, &[0, 1], &[2, 3], Family::Cca).unwrap();
        let before = system.b.clone();
        apply_penalty(&mut system, Penalty::Ridge, &Threshold::PerBlock([0.5, 2.0])).unwrap();
        let diff = &system.b - &before;
        assert_eq!(diff, Array2::from_diag(&array![0.5, 0.5, 2.0, 2.0]));
    }

    #[test]
    fn test_penalty_rejects_malformed_threshold() {
        let c = sample_covariance();
        let mut system = build_block_system(&c, &[0, 1], &[2, 3], Family::Pls).unwrap();
        let result = apply_penalty(
            &mut system,
            Penalty::QRidge,
            &Threshold::PerVariable(vec![1.0, 1.0, 1.0]),
        );
        assert!(matches!(
            result,
            Err(DecompositionError::MalformedThreshold { found: 3, expected: Some(4) })
        ));
    }
}
