/*!
The multivariate normal target and its log-density.

The density is evaluated through the lower Cholesky factor of the covariance, which
`nalgebra` computes once when the target is built.

# Examples

```rust
use haario_mcmc::distributions::MultivariateGaussian;
use ndarray::{arr1, arr2};

let target = MultivariateGaussian::new(arr1(&[0.0, 1.0]), arr2(&[[4.0, 2.0], [2.0, 3.0]]))
    .expect("covariance is positive-definite");
let at_mean = target.log_prob(&arr1(&[0.0, 1.0]).view());
let off_mean = target.log_prob(&arr1(&[0.5, -0.5]).view());
assert!(off_mean < at_mean);
```
*/

use approx::relative_eq;
use nalgebra as na;
use ndarray::prelude::*;
use std::f64::consts::PI;

use crate::error::SamplerError;
use crate::linalg::{from_dmatrix, to_dmatrix};

/// Log-density of `N(mean, L Lᵀ)` at `x`, where `chol_lower` is the lower Cholesky factor
/// `L` of the covariance.
///
/// The log-determinant is accumulated from the diagonal of `L`, and the quadratic form is
/// evaluated as `‖L⁻¹(x - mean)‖²` with a triangular solve, so no inverse or determinant is
/// ever formed. NaN when `L` has a zero on its diagonal.
///
/// # Examples
///
/// ```rust
/// use haario_mcmc::distributions::log_density;
/// use ndarray::{arr1, arr2};
///
/// // Standard normal at 0.
/// let lp = log_density(&arr1(&[0.0]).view(), &arr1(&[0.0]).view(), &arr2(&[[1.0]]).view());
/// assert!((lp + 0.5 * (2.0 * std::f64::consts::PI).ln()).abs() < 1e-12);
/// ```
pub fn log_density(x: &ArrayView1<f64>, mean: &ArrayView1<f64>, chol_lower: &ArrayView2<f64>) -> f64 {
    gaussian_log_density(x, mean, &to_dmatrix(chol_lower))
}

fn gaussian_log_density(x: &ArrayView1<f64>, mean: &ArrayView1<f64>, lower: &na::DMatrix<f64>) -> f64 {
    let n = x.len() as f64;
    let log_det_half: f64 = lower.diagonal().iter().map(|d| d.ln()).sum();
    let diff = na::DVector::from_iterator(x.len(), x.iter().zip(mean.iter()).map(|(a, m)| a - m));
    match lower.solve_lower_triangular(&diff) {
        Some(y) => -0.5 * n * (2.0 * PI).ln() - log_det_half - 0.5 * y.norm_squared(),
        None => f64::NAN,
    }
}

/**
A multivariate normal distribution `N(mean, cov)` of any dimension.

`cov` must be symmetric, up to a relative tolerance of `1e-10`, and positive-definite. Its
lower Cholesky factor is computed once at construction; a covariance without one is
rejected with [`SamplerError::NumericalError`].

# Examples

```rust
use haario_mcmc::distributions::MultivariateGaussian;
use ndarray::{arr1, arr2};

let target = MultivariateGaussian::new(arr1(&[0.0]), arr2(&[[2.0]])).unwrap();
assert_eq!(target.dim(), 1);
assert!(MultivariateGaussian::new(arr1(&[0.0]), arr2(&[[-1.0]])).is_err());
assert!(MultivariateGaussian::new(arr1(&[0.0, 0.0]), arr2(&[[1.0, 0.5], [0.0, 1.0]])).is_err());
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct MultivariateGaussian {
    mean: Array1<f64>,
    cov: Array2<f64>,
    chol: Array2<f64>,
    lower: na::DMatrix<f64>,
}

impl MultivariateGaussian {
    pub fn new(mean: Array1<f64>, cov: Array2<f64>) -> Result<Self, SamplerError> {
        let n = mean.len();
        if n == 0 {
            return Err(SamplerError::invalid("mean must have at least one element"));
        }
        if cov.shape() != [n, n] {
            return Err(SamplerError::invalid(format!(
                "covariance has shape {:?}, expected [{n}, {n}] to match the mean",
                cov.shape()
            )));
        }
        if mean.iter().chain(cov.iter()).any(|v| !v.is_finite()) {
            return Err(SamplerError::invalid(
                "mean and covariance must only contain finite values",
            ));
        }
        if !relative_eq!(cov, cov.t(), epsilon = 1e-12, max_relative = 1e-10) {
            return Err(SamplerError::invalid("covariance must be symmetric"));
        }
        let lower = na::Cholesky::new(to_dmatrix(&cov.view()))
            .ok_or_else(|| {
                SamplerError::NumericalError(
                    "target covariance is not positive-definite".to_string(),
                )
            })?
            .unpack();
        Ok(Self {
            mean,
            cov,
            chol: from_dmatrix(&lower),
            lower,
        })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> ArrayView1<f64> {
        self.mean.view()
    }

    pub fn cov(&self) -> ArrayView2<f64> {
        self.cov.view()
    }

    /// Lower Cholesky factor of the covariance.
    pub fn chol(&self) -> ArrayView2<f64> {
        self.chol.view()
    }

    /// Normalized log-density at `theta`.
    pub fn log_prob(&self, theta: &ArrayView1<f64>) -> f64 {
        gaussian_log_density(theta, &self.mean.view(), &self.lower)
    }
}
