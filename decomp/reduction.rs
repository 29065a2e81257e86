//! Per-block SVD subspace reduction of the eigenproblem pair.

use crate::construction::BlockSystem;
use crate::estimate::DecompositionError;
use crate::linalg::{Element, conj_transpose, hermitian_part};
use ndarray::{Array1, Array2, ArrayView1, s};
use ndarray_linalg::SVD;

/// The basis the reduced problem lives in, kept for expanding eigenvectors back.
#[derive(Clone, Debug)]
pub struct Subspace<A: Element> {
    /// Block-diagonal `(|x| + |y|) x (kx + ky)` matrix of kept left singular vectors.
    pub basis: Array2<A>,
    pub kept: [usize; 2],
}

/// Number of leading singular values to keep for one block.
///
/// A threshold below one is a fraction of the total singular value mass: the longest
/// prefix whose cumulative share stays at or below it is kept, and never fewer than
/// one component. A threshold of one or more is a literal count, capped at the block size.
pub fn kept_components(singular: ArrayView1<f64>, threshold: f64) -> usize {
    let n = singular.len();
    if n == 0 {
        return 0;
    }
    if threshold >= 1.0 {
        return (threshold.floor() as usize).min(n);
    }

    let total: f64 = singular.sum();
    let mut cumulative = 0.0;
    let within = singular
        .iter()
        .take_while(|&&sv| {
            cumulative += sv;
            cumulative / total <= threshold
        })
        .count();
    within.max(1)
}

fn block_basis<A: Element>(
    block: Array2<A>,
    threshold: f64,
) -> Result<(Array2<A>, Array1<f64>, usize), DecompositionError> {
    let (u, singular, _) = block.svd(true, false).map_err(DecompositionError::SvdFailed)?;
    let u = u.ok_or(DecompositionError::MissingSingularVectors)?;
    let kept = kept_components(singular.view(), threshold);
    Ok((u.slice(s![.., ..kept]).to_owned(), singular, kept))
}

/// Projects `A` and `B` onto the kept singular subspace of each auto-block of `B`.
///
/// After projection both matrices are replaced by their Hermitian parts to remove
/// the asymmetry introduced by floating point.
pub fn reduce_subspace<A: Element>(
    system: &mut BlockSystem<A>,
    thresholds: [f64; 2],
) -> Result<Subspace<A>, DecompositionError> {
    let (nx, ny) = (system.nx, system.ny);

    let bxx = system.b.slice(s![..nx, ..nx]).to_owned();
    let byy = system.b.slice(s![nx.., nx..]).to_owned();
    let (ux, sx, kx) = block_basis(bxx, thresholds[0])?;
    let (uy, sy, ky) = block_basis(byy, thresholds[1])?;

    log::debug!(
        "SVD reduction keeps {}/{} x components (leading sv {:.3e}) and {}/{} y components (leading sv {:.3e})",
        kx,
        nx,
        sx.get(0).copied().unwrap_or(0.0),
        ky,
        ny,
        sy.get(0).copied().unwrap_or(0.0)
    );

    let mut basis = Array2::<A>::zeros((nx + ny, kx + ky));
    basis.slice_mut(s![..nx, ..kx]).assign(&ux);
    basis.slice_mut(s![nx.., kx..]).assign(&uy);

    let basis_h = conj_transpose(&basis);
    system.a = hermitian_part(&basis_h.dot(&system.a).dot(&basis));
    system.b = hermitian_part(&basis_h.dot(&system.b).dot(&basis));

    Ok(Subspace {
        basis,
        kept: [kx, ky],
    })
}
