#![deny(dead_code)]
#![deny(unused_imports)]

//! Two-block spectral decomposition (CCA, PLS, MLR) of covariance and
//! cross-spectral matrices, with ridge penalties and SVD subspace reduction.

pub mod construction;
pub mod eigen;
pub mod estimate;
pub mod io;
pub mod linalg;
pub mod method;
pub mod model;
pub mod penalty;
pub mod reduction;
pub mod threshold;

pub use eigen::SolverBranch;
pub use estimate::{DecompositionError, ErrorKind, decompose, decompose_spectrum};
pub use linalg::Element;
pub use method::{Family, Method, Penalty, Reduction};
pub use model::{Decomposition, DecompositionConfig};
pub use threshold::Threshold;
