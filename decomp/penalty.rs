use crate::method::Penalty;
use ndarray::{Array1, Array2, s};

/// Creates the open-boundary smoothness penalty for one block of `n` variables.
///
/// The penalty is `S = D' * D` with `D` the first-difference operator, which gives
/// `2` on the interior diagonal, `-1` on the first off-diagonals and `1` at both
/// ends. A single-variable block is penalized by `[1]`.
pub fn create_qridge_block(n: usize) -> Array2<f64> {
    if n == 0 {
        return Array2::zeros((0, 0));
    }

    let eye = Array2::<f64>::eye(n);
    // Each row of `d` is the difference of two adjacent identity rows.
    let d = &eye.slice(s![1.., ..]) - &eye.slice(s![..-1, ..]);
    let mut penalty = d.t().dot(&d);

    penalty[[0, 0]] = 1.0;
    penalty[[n - 1, n - 1]] = 1.0;
    penalty
}

/// Builds the weighted penalty `R * diag(weights)` over the `[x, y]` working space.
///
/// `Penalty::None` yields a zero matrix. For q-ridge the two blocks are combined
/// block-diagonally, so there is no cross-block penalty.
pub fn create_penalty_matrix(
    penalty: Penalty,
    nx: usize,
    ny: usize,
    weights: &Array1<f64>,
) -> Array2<f64> {
    let total = nx + ny;
    let mut r = match penalty {
        Penalty::None => return Array2::zeros((total, total)),
        Penalty::Ridge => Array2::<f64>::eye(total),
        Penalty::QRidge => {
            let mut r = Array2::<f64>::zeros((total, total));
            r.slice_mut(s![..nx, ..nx]).assign(&create_qridge_block(nx));
            r.slice_mut(s![nx.., nx..]).assign(&create_qridge_block(ny));
            r
        }
    };

    // Right-multiplying by a diagonal matrix scales the columns.
    for (mut column, &w) in r.columns_mut().into_iter().zip(weights.iter()) {
        column *= w;
    }
    r
}
