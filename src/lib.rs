//! # Haario MCMC
//!
//! Adaptive random-walk **Metropolis** sampling of multivariate normal targets. The
//! proposal covariance is learned from the chain's own history (Haario's adaptive
//! Metropolis), so no step size needs tuning by hand.
//!
//! ## Getting Started
//!
//! A single run returns one row per iteration:
//!
//! ```rust
//! use haario_mcmc::adaptive::adaptive_haario;
//! use ndarray::{arr1, arr2};
//!
//! let out = adaptive_haario(arr1(&[1.0, -1.0]), arr2(&[[2.0, 0.5], [0.5, 1.0]]), 2_000)
//!     .expect("covariance is positive-definite");
//! assert_eq!(out.params.shape(), &[2_000, 2]);
//! ```
//!
//! Several independent chains run in parallel, with burn-in discarded:
//!
//! ```rust
//! use haario_mcmc::adaptive::{AdaptationConfig, AdaptiveHaario, CovarianceEstimator};
//! use haario_mcmc::core::ChainRunner;
//! use haario_mcmc::stats::SampleSummary;
//! use ndarray::{arr1, arr2};
//!
//! let mut sampler = AdaptiveHaario::new(arr1(&[0.0, 0.0]), arr2(&[[1.0, 0.8], [0.8, 1.0]]), 4)
//!     .unwrap()
//!     .set_seed(42)
//!     .with_config(AdaptationConfig::default().estimator(CovarianceEstimator::Running))
//!     .unwrap();
//! let sample = sampler.run(2_000, 500).unwrap();
//! let summary = SampleSummary::pooled(sample.view()).unwrap();
//! println!("{summary}");
//! ```
//!
//! ## Features
//! - **Adaptive proposal** with the classical `2.38² / n` scaling and a small fixed-step
//!   fallback, configurable through [`adaptive::AdaptationConfig`]
//! - **Reproducible streams**: any [`rand::Rng`] or custom [`random::RandomSource`]
//! - **Parallel chains** with optional progress bars
//! - **Diagnostics**: acceptance rates, R-hat, pooled moments
//! - **Optional I/O** (CSV)

pub mod adaptive;
pub mod core;
pub mod distributions;
pub mod error;
pub mod io;
pub mod linalg;
pub mod random;
pub mod stats;

pub use adaptive::{adaptive_haario, AdaptationConfig, AdaptiveChain, AdaptiveHaario, HaarioOutput};
pub use error::SamplerError;
