/*!
# Adaptive (Haario) Metropolis Sampler

A random-walk Metropolis sampler for a multivariate normal target whose proposal
covariance is learned from the chain's own history.

Each iteration `i` (0-based, `n` = dimension):

1. Once `i ≥ 2n`, with probability 0.95 the proposal covariance is
   `(2.38² / n) · Cov(x₀ … x_{i-1})`, the empirical covariance of every recorded state.
   Otherwise it is the small isotropic step `(0.1² / n) · I_n`.
2. If the proposal covariance has no Cholesky factor (a rank-deficient history, for
   instance), the previous state is recorded again and the iteration ends.
3. The candidate `x + L z` with `z ~ N(0, I_n)` is accepted iff
   `log p(candidate) - log p(x) > ln u`, `u ~ Uniform(0, 1)`.
4. The post-decision state is appended to the history.

The chain starts at `mean / 3`. All constants live in [`AdaptationConfig`].

## Example Usage

```rust
use haario_mcmc::adaptive::adaptive_haario_with_rng;
use ndarray::{arr1, arr2};
use rand::rngs::SmallRng;
use rand::SeedableRng;

let out = adaptive_haario_with_rng(
    arr1(&[0.0, 1.0]),
    arr2(&[[4.0, 2.0], [2.0, 3.0]]),
    1_000,
    SmallRng::seed_from_u64(42),
)
.expect("target covariance is positive-definite");

// One row per iteration, one column per dimension.
assert_eq!(out.params.shape(), &[1_000, 2]);
```

Several independent chains are run through [`AdaptiveHaario`] and
[`ChainRunner`](crate::core::ChainRunner).
*/

use ndarray::prelude::*;
use rand::prelude::*;

use crate::core::{HasChains, MarkovChain};
use crate::distributions::MultivariateGaussian;
use crate::error::SamplerError;
use crate::linalg::{cholesky_lower, empirical_covariance, RunningCovariance};
use crate::random::RandomSource;

/// How the adapted proposal obtains the empirical covariance of the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CovarianceEstimator {
    /// Recompute from every recorded state at each adapted iteration, `O(n²·i)`.
    #[default]
    Recompute,
    /// Keep a running mean and co-moment matrix, `O(n²)` per iteration. Agrees with
    /// `Recompute` up to floating-point summation order.
    Running,
}

/**
Constants of the adaptation policy. [`Default`] gives the classical values.

# Examples

```rust
use haario_mcmc::adaptive::{AdaptationConfig, CovarianceEstimator};

let config = AdaptationConfig::default()
    .adaptation_probability(0.9)
    .estimator(CovarianceEstimator::Running);
assert!(config.validate().is_ok());
assert!(AdaptationConfig::default().scaling(-1.0).validate().is_err());
```
*/
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptationConfig {
    /// The chain starts at `mean / start_divisor`.
    pub start_divisor: f64,
    /// Adaptation is possible from iteration `adaptation_start_factor · n` on.
    pub adaptation_start_factor: usize,
    /// Probability of the adapted proposal once adaptation is possible.
    pub adaptation_probability: f64,
    /// The adapted covariance is scaled by `scaling² / n`.
    pub scaling: f64,
    /// The fallback covariance is `fallback_std² / n · I_n`.
    pub fallback_std: f64,
    pub estimator: CovarianceEstimator,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            start_divisor: 3.0,
            adaptation_start_factor: 2,
            adaptation_probability: 0.95,
            scaling: 2.38,
            fallback_std: 0.1,
            estimator: CovarianceEstimator::Recompute,
        }
    }
}

impl AdaptationConfig {
    pub fn start_divisor(mut self, start_divisor: f64) -> Self {
        self.start_divisor = start_divisor;
        self
    }

    pub fn adaptation_start_factor(mut self, factor: usize) -> Self {
        self.adaptation_start_factor = factor;
        self
    }

    pub fn adaptation_probability(mut self, probability: f64) -> Self {
        self.adaptation_probability = probability;
        self
    }

    pub fn scaling(mut self, scaling: f64) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn fallback_std(mut self, fallback_std: f64) -> Self {
        self.fallback_std = fallback_std;
        self
    }

    pub fn estimator(mut self, estimator: CovarianceEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Checks that every constant describes a usable policy.
    pub fn validate(&self) -> Result<(), SamplerError> {
        if !(self.start_divisor.is_finite() && self.start_divisor != 0.0) {
            return Err(SamplerError::invalid(format!(
                "start_divisor must be finite and non-zero, got {}",
                self.start_divisor
            )));
        }
        if !(0.0..=1.0).contains(&self.adaptation_probability) {
            return Err(SamplerError::invalid(format!(
                "adaptation_probability must lie in [0, 1], got {}",
                self.adaptation_probability
            )));
        }
        if !(self.scaling.is_finite() && self.scaling > 0.0) {
            return Err(SamplerError::invalid(format!(
                "scaling must be finite and positive, got {}",
                self.scaling
            )));
        }
        if !(self.fallback_std.is_finite() && self.fallback_std > 0.0) {
            return Err(SamplerError::invalid(format!(
                "fallback_std must be finite and positive, got {}",
                self.fallback_std
            )));
        }
        Ok(())
    }

    /// First iteration at which the adapted proposal may be used. Saturates, so a huge
    /// factor only means the window never opens.
    pub fn adaptation_start(&self, dim: usize) -> usize {
        self.adaptation_start_factor.saturating_mul(dim)
    }

    /// `fallback_std² / n · I_n`.
    pub fn fallback_covariance(&self, dim: usize) -> Array2<f64> {
        let var = self.fallback_std * self.fallback_std;
        Array2::from_diag_elem(dim, var / dim as f64)
    }

    /// `scaling² / n · cov`.
    pub fn adapted_covariance(&self, cov: Array2<f64>) -> Array2<f64> {
        let dim = cov.nrows() as f64;
        let scale_sq = self.scaling * self.scaling;
        cov.mapv_into(|c| scale_sq * c / dim)
    }
}

/// Which proposal an iteration used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalKind {
    Fallback,
    Adapted,
}

/// What happened to the chain in one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted,
    Rejected,
    /// The proposal covariance did not factorize; the previous state was kept.
    Skipped,
}

/// Per-chain tallies of proposals and decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainCounters {
    pub iterations: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub adapted: usize,
}

impl ChainCounters {
    fn record(&mut self, kind: ProposalKind, outcome: StepOutcome) {
        self.iterations += 1;
        if kind == ProposalKind::Adapted {
            self.adapted += 1;
        }
        match outcome {
            StepOutcome::Accepted => self.accepted += 1,
            StepOutcome::Rejected => self.rejected += 1,
            StepOutcome::Skipped => self.skipped += 1,
        }
    }
}

/**
A single adaptive Metropolis chain.

The chain owns its target, its random stream and its history. The history is an
append-only buffer with one row per iteration; [`AdaptiveChain::reserve`] sizes it up front
so a run of known length never reallocates.

# Examples

```rust
use haario_mcmc::adaptive::{AdaptationConfig, AdaptiveChain};
use haario_mcmc::distributions::MultivariateGaussian;
use ndarray::{arr1, arr2};

let target = MultivariateGaussian::new(arr1(&[3.0, 6.0]), arr2(&[[1.0, 0.0], [0.0, 1.0]])).unwrap();
let mut chain = AdaptiveChain::new(target, AdaptationConfig::default()).unwrap().set_seed(7);
assert_eq!(chain.current_state, vec![1.0, 2.0]);

let sample = chain.sample(500);
assert_eq!(sample.shape(), &[500, 2]);
assert_eq!(chain.history().nrows(), 500);
```
*/
#[derive(Debug, Clone)]
pub struct AdaptiveChain<R = SmallRng> {
    /// The target distribution to sample from.
    pub target: MultivariateGaussian,
    /// Adaptation constants.
    pub config: AdaptationConfig,
    /// The current state of the chain.
    pub current_state: Vec<f64>,
    /// The chain-specific random seed, when the stream was seeded by this crate.
    pub seed: u64,
    /// The random stream for this chain.
    pub rng: R,
    history: Vec<f64>,
    running: Option<RunningCovariance>,
    counters: ChainCounters,
}

impl AdaptiveChain<SmallRng> {
    /// Creates a chain with a freshly seeded [`SmallRng`].
    pub fn new(target: MultivariateGaussian, config: AdaptationConfig) -> Result<Self, SamplerError> {
        let seed = thread_rng().gen::<u64>();
        let mut chain = Self::with_rng(target, config, SmallRng::seed_from_u64(seed))?;
        chain.seed = seed;
        Ok(chain)
    }

    /// Reseeds the chain's random stream.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }
}

impl<R: RandomSource> AdaptiveChain<R> {
    /// Creates a chain drawing from `rng`.
    pub fn with_rng(
        target: MultivariateGaussian,
        config: AdaptationConfig,
        rng: R,
    ) -> Result<Self, SamplerError> {
        config.validate()?;
        let dim = target.dim();
        let start = target.mean().mapv(|m| m / config.start_divisor);
        let running = match config.estimator {
            CovarianceEstimator::Recompute => None,
            CovarianceEstimator::Running => Some(RunningCovariance::new(dim)),
        };
        Ok(Self {
            target,
            config,
            current_state: start.to_vec(),
            seed: 0,
            rng,
            history: Vec::new(),
            running,
            counters: ChainCounters::default(),
        })
    }

    pub fn dim(&self) -> usize {
        self.target.dim()
    }

    /// Index of the next iteration, i.e. the number of recorded states.
    pub fn iteration(&self) -> usize {
        self.history.len() / self.dim()
    }

    /// Pre-allocates room for `iterations` more recorded states.
    pub fn reserve(&mut self, iterations: usize) {
        self.history.reserve_exact(iterations * self.dim());
    }

    /// Every recorded state so far, one row per iteration.
    pub fn history(&self) -> ArrayView2<f64> {
        ArrayView2::from_shape((self.iteration(), self.dim()), &self.history)
            .expect("Expected history length to be a multiple of the dimension")
    }

    pub fn counters(&self) -> ChainCounters {
        self.counters
    }

    /// Fraction of iterations whose candidate was accepted.
    pub fn acceptance_rate(&self) -> f64 {
        if self.counters.iterations == 0 {
            return 0.0;
        }
        self.counters.accepted as f64 / self.counters.iterations as f64
    }

    /// Chooses the proposal covariance for the next iteration.
    ///
    /// Draws one uniform from the stream once the adaptation window is open, and nothing
    /// before it.
    pub fn proposal_covariance(&mut self) -> (ProposalKind, Array2<f64>) {
        let dim = self.dim();
        if self.iteration() >= self.config.adaptation_start(dim)
            && self.rng.uniform() < self.config.adaptation_probability
        {
            let cov = match &self.running {
                Some(running) => running.covariance(),
                None => empirical_covariance(&self.history()),
            };
            (ProposalKind::Adapted, self.config.adapted_covariance(cov))
        } else {
            (ProposalKind::Fallback, self.config.fallback_covariance(dim))
        }
    }

    /// Runs one iteration and reports what it did.
    pub fn step_with_outcome(&mut self) -> (ProposalKind, StepOutcome) {
        let (kind, proposal_cov) = self.proposal_covariance();
        let outcome = match cholesky_lower(&proposal_cov.view()) {
            None => {
                log::trace!(
                    "iteration {}: {:?} proposal covariance is not positive-definite, keeping state",
                    self.iteration(),
                    kind
                );
                StepOutcome::Skipped
            }
            Some(proposal_chol) => self.metropolis_update(&proposal_chol),
        };
        self.record();
        self.counters.record(kind, outcome);
        (kind, outcome)
    }

    fn metropolis_update(&mut self, proposal_chol: &Array2<f64>) -> StepOutcome {
        let z = self.rng.standard_normal(self.dim());
        let current = ArrayView1::from(&self.current_state[..]);
        let candidate = &current + &proposal_chol.dot(&z);
        let log_accept_ratio =
            self.target.log_prob(&candidate.view()) - self.target.log_prob(&current);
        let u = self.rng.uniform();
        if log_accept_ratio > u.ln() {
            self.current_state = candidate.to_vec();
            StepOutcome::Accepted
        } else {
            StepOutcome::Rejected
        }
    }

    fn record(&mut self) {
        self.history.extend_from_slice(&self.current_state);
        if let Some(running) = self.running.as_mut() {
            running.push(&ArrayView1::from(&self.current_state[..]));
        }
    }

    /// Runs `iterations` iterations into a pre-sized history and returns the states they
    /// recorded, one row per iteration.
    pub fn sample(&mut self, iterations: usize) -> Array2<f64> {
        let first = self.iteration();
        self.reserve(iterations);
        for _ in 0..iterations {
            self.step_with_outcome();
        }
        log::debug!(
            "chain finished {} iterations: {:?}, acceptance rate {:.3}",
            iterations,
            self.counters,
            self.acceptance_rate()
        );
        self.history().slice(s![first.., ..]).to_owned()
    }
}

impl<R: RandomSource> MarkovChain<f64> for AdaptiveChain<R> {
    fn step(&mut self) -> &Vec<f64> {
        self.step_with_outcome();
        &self.current_state
    }

    fn current_state(&self) -> &Vec<f64> {
        &self.current_state
    }

    fn reserve(&mut self, n_steps: usize) {
        AdaptiveChain::reserve(self, n_steps);
    }
}

/**
Runs several independent adaptive chains against the same target.

Chain `k` gets the seed `seed + k`; chains share nothing else and run in parallel through
[`ChainRunner`](crate::core::ChainRunner).

# Examples

```rust
use haario_mcmc::adaptive::AdaptiveHaario;
use haario_mcmc::core::ChainRunner;
use ndarray::{arr1, arr2};

let mut sampler = AdaptiveHaario::new(arr1(&[0.0, 0.0]), arr2(&[[1.0, 0.5], [0.5, 1.0]]), 2)
    .unwrap()
    .set_seed(42);
assert_eq!(sampler.chains[1].seed, 43);

let sample = sampler.run(300, 100).unwrap();
assert_eq!(sample.shape(), &[2, 300, 2]);
```
*/
#[derive(Debug, Clone)]
pub struct AdaptiveHaario {
    /// The target distribution shared by all chains.
    pub target: MultivariateGaussian,
    pub config: AdaptationConfig,
    /// The independent chains.
    pub chains: Vec<AdaptiveChain<SmallRng>>,
    /// The global random seed.
    pub seed: u64,
}

impl AdaptiveHaario {
    pub fn new(mean: Array1<f64>, cov: Array2<f64>, n_chains: usize) -> Result<Self, SamplerError> {
        if n_chains == 0 {
            return Err(SamplerError::invalid("n_chains must be at least 1"));
        }
        let target = MultivariateGaussian::new(mean, cov)?;
        let config = AdaptationConfig::default();
        let seed = thread_rng().gen::<u64>();
        let chains = Self::build_chains(&target, config, seed, n_chains)?;
        Ok(Self {
            target,
            config,
            chains,
            seed,
        })
    }

    /// Replaces the adaptation constants, restarting every chain from its seed.
    pub fn with_config(mut self, config: AdaptationConfig) -> Result<Self, SamplerError> {
        self.chains = Self::build_chains(&self.target, config, self.seed, self.chains.len())?;
        self.config = config;
        Ok(self)
    }

    /// Sets the global seed; chain `k` is reseeded with `seed + k`.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        for (i, chain) in self.chains.iter_mut().enumerate() {
            let chain_seed = seed.wrapping_add(i as u64);
            chain.seed = chain_seed;
            chain.rng = SmallRng::seed_from_u64(chain_seed);
        }
        self
    }

    fn build_chains(
        target: &MultivariateGaussian,
        config: AdaptationConfig,
        seed: u64,
        n_chains: usize,
    ) -> Result<Vec<AdaptiveChain<SmallRng>>, SamplerError> {
        (0..n_chains)
            .map(|i| {
                let chain_seed = seed.wrapping_add(i as u64);
                let mut chain = AdaptiveChain::with_rng(
                    target.clone(),
                    config,
                    SmallRng::seed_from_u64(chain_seed),
                )?;
                chain.seed = chain_seed;
                Ok(chain)
            })
            .collect()
    }
}

impl HasChains<f64> for AdaptiveHaario {
    type Chain = AdaptiveChain<SmallRng>;

    fn chains_mut(&mut self) -> &mut Vec<Self::Chain> {
        &mut self.chains
    }
}

/// Recorded states of a single run, one row per iteration and one column per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct HaarioOutput {
    pub params: Array2<f64>,
}

/// Runs one adaptive chain of `iterations` steps on `N(mean, cov)` with an
/// entropy-seeded stream.
///
/// # Errors
///
/// [`SamplerError::InvalidArgument`] for `iterations == 0`, an empty mean, mismatched
/// shapes or non-finite entries; [`SamplerError::NumericalError`] when `cov` is not
/// positive-definite.
pub fn adaptive_haario(
    mean: Array1<f64>,
    cov: Array2<f64>,
    iterations: usize,
) -> Result<HaarioOutput, SamplerError> {
    adaptive_haario_with_rng(mean, cov, iterations, SmallRng::from_entropy())
}

/// Like [`adaptive_haario`], drawing from `rng`. Equal streams give bit-identical outputs.
pub fn adaptive_haario_with_rng<R: RandomSource>(
    mean: Array1<f64>,
    cov: Array2<f64>,
    iterations: usize,
    rng: R,
) -> Result<HaarioOutput, SamplerError> {
    adaptive_haario_with_config(mean, cov, iterations, AdaptationConfig::default(), rng)
}

/// Like [`adaptive_haario_with_rng`] with custom adaptation constants.
pub fn adaptive_haario_with_config<R: RandomSource>(
    mean: Array1<f64>,
    cov: Array2<f64>,
    iterations: usize,
    config: AdaptationConfig,
    rng: R,
) -> Result<HaarioOutput, SamplerError> {
    if iterations == 0 {
        return Err(SamplerError::invalid("iterations must be at least 1"));
    }
    let target = MultivariateGaussian::new(mean, cov)?;
    let mut chain = AdaptiveChain::with_rng(target, config, rng)?;
    let params = chain.sample(iterations);
    Ok(HaarioOutput { params })
}
