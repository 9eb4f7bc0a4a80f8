//! Tracking and summarizing chains: acceptance probability, running moments, Potential
//! Scale Reduction (R-hat), and pooled sample moments.

use ndarray::prelude::*;
use ndarray_stats::{CorrelationExt, QuantileExt};
use num_traits::ToPrimitive;
use std::collections::VecDeque;
use std::error::Error;
use std::fmt;

use crate::error::SamplerError;

/// Number of recent steps the acceptance probability is averaged over.
const ACCEPT_WINDOW: usize = 100;

/// Tracks statistics of a single chain as it steps.
///
/// A step counts as accepted when the state changed. For a random-walk sampler a rejected
/// or skipped proposal repeats the previous state, so this is the acceptance rate.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTracker {
    n_params: usize,
    n: u64,
    accepted_in_window: usize,
    accept_queue: VecDeque<bool>,
    last_state: Array1<f64>,
    mean: Array1<f64>,    // n_params
    mean_sq: Array1<f64>, // n_params
}

/// Snapshot of a [`ChainTracker`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChainStats {
    pub n: u64,
    pub p_accept: f64,
    pub mean: Array1<f64>, // n_params
    pub sm2: Array1<f64>,  // n_params
}

fn to_f64_array<T: ToPrimitive>(n_params: usize, x: &[T]) -> Result<Array1<f64>, SamplerError> {
    if x.len() != n_params {
        return Err(SamplerError::invalid(format!(
            "state has {} elements, tracker expects {n_params}",
            x.len()
        )));
    }
    x.iter()
        .map(|v| {
            v.to_f64()
                .ok_or_else(|| SamplerError::invalid("state element is not representable as f64"))
        })
        .collect::<Result<Vec<f64>, _>>()
        .map(Array1::from)
}

impl ChainTracker {
    pub fn new<T: ToPrimitive>(n_params: usize, initial_state: &[T]) -> Result<Self, SamplerError> {
        Ok(Self {
            n_params,
            n: 0,
            accepted_in_window: 0,
            accept_queue: VecDeque::with_capacity(ACCEPT_WINDOW + 1),
            last_state: to_f64_array(n_params, initial_state)?,
            mean: Array1::zeros(n_params),
            mean_sq: Array1::zeros(n_params),
        })
    }

    /// Records the state reached by one more step.
    pub fn step<T: ToPrimitive>(&mut self, x: &[T]) -> Result<(), SamplerError> {
        let x_arr = to_f64_array(self.n_params, x)?;
        self.n += 1;

        let accepted = x_arr != self.last_state;
        self.accept_queue.push_back(accepted);
        self.accepted_in_window += accepted as usize;
        if self.accept_queue.len() > ACCEPT_WINDOW {
            let removed = self.accept_queue.pop_front().unwrap_or(false);
            self.accepted_in_window -= removed as usize;
        }

        let n = self.n as f64;
        self.mean = (&self.mean * (n - 1.0) + &x_arr) / n;
        self.mean_sq = (&self.mean_sq * (n - 1.0) + &x_arr.pow2()) / n;
        self.last_state = x_arr;
        Ok(())
    }

    /// Fraction of accepted steps among the most recent ones.
    pub fn p_accept(&self) -> f64 {
        if self.accept_queue.is_empty() {
            return 0.0;
        }
        self.accepted_in_window as f64 / self.accept_queue.len() as f64
    }

    /// Unbiased per-parameter variance of the states seen so far.
    pub fn sm2(&self) -> Array1<f64> {
        let n = self.n as f64;
        if self.n < 2 {
            return Array1::zeros(self.n_params);
        }
        (&self.mean_sq - &self.mean.pow2()) * n / (n - 1.0)
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            n: self.n,
            p_accept: self.p_accept(),
            mean: self.mean.clone(),
            sm2: self.sm2(),
        }
    }
}

/// Potential Scale Reduction Factor per parameter, from per-chain means and variances.
///
/// Values near 1 indicate the chains agree with each other.
pub fn collect_rhat(chain_stats: &[&ChainStats]) -> Array1<f64> {
    let means: Vec<ArrayView1<f64>> = chain_stats.iter().map(|x| x.mean.view()).collect();
    let means = ndarray::stack(Axis(0), &means).expect("Expected stacking means to succeed");
    let sm2s: Vec<ArrayView1<f64>> = chain_stats.iter().map(|x| x.sm2.view()).collect();
    let sm2s = ndarray::stack(Axis(0), &sm2s).expect("Expected stacking sm2 arrays to succeed");

    let within = sm2s
        .mean_axis(Axis(0))
        .expect("Expected computing within-chain variances to succeed");
    let global_means = means
        .mean_axis(Axis(0))
        .expect("Expected computing global means to succeed");
    let diffs = &means - &global_means.insert_axis(Axis(0));
    let between = diffs.pow2().sum_axis(Axis(0)) / (chain_stats.len() as f64 - 1.0);

    let n: f64 = chain_stats.iter().map(|x| x.n as f64).sum::<f64>() / chain_stats.len() as f64;
    ((between + &within * ((n - 1.0) / n)) / within).sqrt()
}

/// Largest R-hat over all parameters.
pub fn max_rhat(chain_stats: &[&ChainStats]) -> Result<f64, Box<dyn Error>> {
    if chain_stats.len() < 2 {
        return Err("R-hat needs at least two chains.".into());
    }
    let rhat = collect_rhat(chain_stats);
    Ok(*rhat.max()?)
}

/// Mean and covariance of a pooled sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSummary {
    pub n: usize,
    pub mean: Array1<f64>,
    pub cov: Array2<f64>,
}

impl SampleSummary {
    /// Summarizes draws stored one per row.
    pub fn from_rows(sample: ArrayView2<f64>) -> Result<Self, SamplerError> {
        if sample.nrows() < 2 {
            return Err(SamplerError::invalid(
                "a sample summary needs at least two draws",
            ));
        }
        let mean = sample
            .mean_axis(Axis(0))
            .ok_or_else(|| SamplerError::invalid("empty sample"))?;
        let cov = sample
            .t()
            .cov(1.0)
            .map_err(|e| SamplerError::invalid(e.to_string()))?;
        Ok(Self {
            n: sample.nrows(),
            mean,
            cov,
        })
    }

    /// Pools a `(chains, draws, dim)` sample and summarizes it.
    pub fn pooled(sample: ArrayView3<f64>) -> Result<Self, SamplerError> {
        let (chains, draws, dim) = sample.dim();
        let flat = sample
            .to_shape((chains * draws, dim))
            .map_err(|e| SamplerError::invalid(e.to_string()))?;
        Self::from_rows(flat.view())
    }
}

impl fmt::Display for SampleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n = {}\nmean = {:.3}\ncov =\n{:.3}", self.n, self.mean, self.cov)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn tracker_counts_changes_as_accepts() {
        let mut tracker = ChainTracker::new(2, &[0.0, 0.0]).unwrap();
        tracker.step(&[1.0, 0.0]).unwrap();
        tracker.step(&[1.0, 0.0]).unwrap();
        tracker.step(&[1.0, 2.0]).unwrap();
        tracker.step(&[1.0, 2.0]).unwrap();
        assert_abs_diff_eq!(tracker.p_accept(), 0.5);
        let stats = tracker.stats();
        assert_eq!(stats.n, 4);
        assert_abs_diff_eq!(stats.mean, arr1(&[1.0, 1.0]), epsilon = 1e-12);
        assert_abs_diff_eq!(stats.sm2, arr1(&[0.0, 4.0 / 3.0]), epsilon = 1e-12);
    }

    #[test]
    fn tracker_window_forgets_old_steps() {
        let mut tracker = ChainTracker::new(1, &[0.0]).unwrap();
        for i in 0..ACCEPT_WINDOW {
            tracker.step(&[i as f64 + 1.0]).unwrap();
        }
        assert_abs_diff_eq!(tracker.p_accept(), 1.0);
        for _ in 0..ACCEPT_WINDOW {
            tracker.step(&[0.5]).unwrap();
        }
        // Only the first of these moved.
        assert_abs_diff_eq!(tracker.p_accept(), 1.0 / ACCEPT_WINDOW as f64);
    }

    #[test]
    fn tracker_rejects_wrong_dimension() {
        let mut tracker = ChainTracker::new(2, &[0.0, 0.0]).unwrap();
        assert!(tracker.step(&[1.0]).is_err());
        assert!(ChainTracker::new(3, &[0.0]).is_err());
    }

    #[test]
    fn rhat_of_identical_chains_is_near_one() {
        let a = ChainStats {
            n: 1000,
            p_accept: 0.3,
            mean: arr1(&[0.0, 1.0]),
            sm2: arr1(&[1.0, 2.0]),
        };
        let b = a.clone();
        let rhat = collect_rhat(&[&a, &b]);
        assert_abs_diff_eq!(rhat, arr1(&[(999.0f64 / 1000.0).sqrt(); 2]), epsilon = 1e-12);
        assert!(max_rhat(&[&a]).is_err());
    }

    #[test]
    fn rhat_flags_disagreeing_chains() {
        let a = ChainStats {
            n: 100,
            p_accept: 0.3,
            mean: arr1(&[0.0]),
            sm2: arr1(&[1.0]),
        };
        let b = ChainStats {
            mean: arr1(&[5.0]),
            ..a.clone()
        };
        assert!(max_rhat(&[&a, &b]).unwrap() > 2.0);
    }

    #[test]
    fn summary_of_rows() {
        let sample = arr2(&[[1.0, 2.0], [3.0, 6.0], [5.0, 10.0]]);
        let summary = SampleSummary::from_rows(sample.view()).unwrap();
        assert_eq!(summary.n, 3);
        assert_abs_diff_eq!(summary.mean, arr1(&[3.0, 6.0]), epsilon = 1e-12);
        assert_abs_diff_eq!(summary.cov, arr2(&[[4.0, 8.0], [8.0, 16.0]]), epsilon = 1e-12);
        assert!(SampleSummary::from_rows(sample.slice(s![..1, ..])).is_err());
    }

    #[test]
    fn pooled_summary_flattens_chains() {
        let sample = Array3::from_shape_fn((2, 3, 1), |(c, t, _)| (c * 3 + t) as f64);
        let summary = SampleSummary::pooled(sample.view()).unwrap();
        assert_eq!(summary.n, 6);
        assert_abs_diff_eq!(summary.mean, arr1(&[2.5]), epsilon = 1e-12);
        assert_abs_diff_eq!(summary.cov, arr2(&[[3.5]]), epsilon = 1e-12);
    }
}
