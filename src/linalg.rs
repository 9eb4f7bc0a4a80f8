//! Dense linear algebra needed by the sampler: a lower Cholesky factorization, triangular
//! solves, and the empirical covariance of a chain's history.
//!
//! Factorizations and solves go through `nalgebra`; everything the sampler stores stays in
//! `ndarray`, so the two conversions below are the only crossing points.

use nalgebra as na;
use ndarray::prelude::*;
use ndarray_stats::CorrelationExt;

pub(crate) fn to_dmatrix(a: &ArrayView2<f64>) -> na::DMatrix<f64> {
    na::DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[(i, j)])
}

pub(crate) fn from_dmatrix(m: &na::DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Lower Cholesky factor `L` with `L Lᵀ = matrix`.
///
/// Returns `None` when `matrix` is not square or not (numerically) positive-definite,
/// including when any pivot is zero, negative or NaN. Only the lower triangle is read.
///
/// # Examples
///
/// ```rust
/// use haario_mcmc::linalg::cholesky_lower;
/// use ndarray::arr2;
///
/// let l = cholesky_lower(&arr2(&[[4.0, 2.0], [2.0, 3.0]]).view()).unwrap();
/// assert_eq!(l[(0, 0)], 2.0);
/// assert_eq!(l[(0, 1)], 0.0);
/// assert!(cholesky_lower(&arr2(&[[1.0, 1.0], [1.0, 1.0]]).view()).is_none());
/// ```
pub fn cholesky_lower(matrix: &ArrayView2<f64>) -> Option<Array2<f64>> {
    if !matrix.is_square() {
        return None;
    }
    na::Cholesky::new(to_dmatrix(matrix)).map(|chol| from_dmatrix(&chol.l()))
}

/// Solves `L y = b` for lower-triangular `L`.
///
/// `None` when `L` has a zero on its diagonal.
pub fn solve_lower(lower: &ArrayView2<f64>, b: &ArrayView1<f64>) -> Option<Array1<f64>> {
    let rhs = na::DVector::from_iterator(b.len(), b.iter().copied());
    to_dmatrix(lower)
        .solve_lower_triangular(&rhs)
        .map(|y| Array1::from_iter(y.iter().copied()))
}

/// Empirical covariance of the rows of `history` (one observation per row), with divisor
/// `N - 1`.
///
/// Fewer than two observations carry no spread, so the result is the zero matrix. That
/// matrix fails [`cholesky_lower`], which the sampler treats as a skipped proposal.
pub fn empirical_covariance(history: &ArrayView2<f64>) -> Array2<f64> {
    let dim = history.ncols();
    if history.nrows() < 2 {
        return Array2::zeros((dim, dim));
    }
    // `cov` treats rows as variables and columns as observations.
    history
        .t()
        .cov(1.0)
        .unwrap_or_else(|_| Array2::zeros((dim, dim)))
}

/// Running mean and co-moment matrix of a stream of observations.
///
/// Each [`RunningCovariance::push`] is `O(n²)`, so querying the covariance after every
/// observation costs `O(n²)` per step instead of re-reading the whole history. The update
/// is Welford's: it differs from [`empirical_covariance`] only by floating-point
/// summation order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningCovariance {
    count: usize,
    mean: Array1<f64>,
    comoment: Array2<f64>,
}

impl RunningCovariance {
    pub fn new(dim: usize) -> Self {
        Self {
            count: 0,
            mean: Array1::zeros(dim),
            comoment: Array2::zeros((dim, dim)),
        }
    }

    /// Number of observations pushed so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> ArrayView1<f64> {
        self.mean.view()
    }

    /// Adds one observation.
    pub fn push(&mut self, x: &ArrayView1<f64>) {
        self.count += 1;
        let n = self.count as f64;
        let delta_before = x - &self.mean;
        self.mean.scaled_add(1.0 / n, &delta_before);
        let delta_after = x - &self.mean;
        let outer = delta_before
            .view()
            .insert_axis(Axis(1))
            .dot(&delta_after.view().insert_axis(Axis(0)));
        self.comoment += &outer;
    }

    /// Sample covariance (divisor `N - 1`) of everything pushed so far; zero below two
    /// observations.
    pub fn covariance(&self) -> Array2<f64> {
        if self.count < 2 {
            return Array2::zeros(self.comoment.raw_dim());
        }
        let cov = &self.comoment / (self.count as f64 - 1.0);
        // The rank-one updates are not exactly symmetric in floating point.
        (&cov + &cov.t()) * 0.5
    }
}
