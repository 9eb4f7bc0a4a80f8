//! Chain abstractions and the parallel runner shared by every sampler in the crate.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use ndarray::prelude::*;
use num_traits::{ToPrimitive, Zero};
use rayon::prelude::*;
use std::error::Error;

use crate::error::SamplerError;
use crate::stats::{collect_rhat, ChainStats, ChainTracker};

/// Steps between progress-bar refreshes.
const PROGRESS_EVERY: usize = 100;

pub trait MarkovChain<S> {
    /// Does one iteration of the chain, returning the new current state.
    fn step(&mut self) -> &Vec<S>;

    /// The current state, without stepping.
    fn current_state(&self) -> &Vec<S>;

    /// Hint that `n_steps` more steps are about to be taken.
    fn reserve(&mut self, _n_steps: usize) {}
}

/// Runs `n_discard + n_collect` steps and keeps the last `n_collect` states, one row each.
pub fn run_chain<S, M>(chain: &mut M, n_collect: usize, n_discard: usize) -> Array2<S>
where
    M: MarkovChain<S>,
    S: Clone + Zero,
{
    let dim = chain.current_state().len();
    let mut out = Array2::<S>::zeros((n_collect, dim));
    chain.reserve(n_discard + n_collect);

    for i in 0..(n_discard + n_collect) {
        let state = chain.step();
        if i >= n_discard {
            out.row_mut(i - n_discard)
                .assign(&ArrayView1::from(state.as_slice()));
        }
    }

    out
}

/// Like [`run_chain`], also advancing `pb` and tracking acceptance and moments of the
/// collected states.
pub fn run_chain_progress<S, M>(
    chain: &mut M,
    n_collect: usize,
    n_discard: usize,
    pb: &ProgressBar,
) -> Result<(Array2<S>, ChainStats), SamplerError>
where
    M: MarkovChain<S>,
    S: Clone + Zero + ToPrimitive,
{
    let dim = chain.current_state().len();
    let mut out = Array2::<S>::zeros((n_collect, dim));
    let mut tracker = ChainTracker::new(dim, chain.current_state())?;
    let total = n_discard + n_collect;
    chain.reserve(total);
    pb.set_length(total as u64);

    for i in 0..total {
        let state = chain.step();
        tracker.step(state)?;
        if i >= n_discard {
            out.row_mut(i - n_discard)
                .assign(&ArrayView1::from(state.as_slice()));
        }
        if (i + 1) % PROGRESS_EVERY == 0 || i + 1 == total {
            pb.set_position((i + 1) as u64);
            pb.set_message(format!("p(accept)≈{:.2}", tracker.p_accept()));
        }
    }

    Ok((out, tracker.stats()))
}

/// Anything that owns several independent Markov chains.
pub trait HasChains<S> {
    type Chain: MarkovChain<S> + Send;

    fn chains_mut(&mut self) -> &mut Vec<Self::Chain>;
}

pub trait ChainRunner<S>: HasChains<S>
where
    S: Clone + Zero + ToPrimitive + Send + 'static,
{
    /// Runs all chains in parallel for `n_discard + n_collect` steps each, discarding the
    /// first `n_discard`. The result has shape `(n_chains, n_collect, dim)`.
    fn run(&mut self, n_collect: usize, n_discard: usize) -> Result<Array3<S>, Box<dyn Error>> {
        let results: Vec<Array2<S>> = self
            .chains_mut()
            .par_iter_mut()
            .map(|chain| run_chain(chain, n_collect, n_discard))
            .collect();
        stack_chains(&results)
    }

    /// Like [`ChainRunner::run`], with one progress bar per chain. Logs the acceptance
    /// rates and R-hat of the collected states when done.
    fn run_progress(
        &mut self,
        n_collect: usize,
        n_discard: usize,
    ) -> Result<Array3<S>, Box<dyn Error>> {
        let multi = MultiProgress::new();
        let pb_style = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-");

        let results: Vec<(Array2<S>, ChainStats)> = self
            .chains_mut()
            .par_iter_mut()
            .enumerate()
            .map(|(i, chain)| {
                let pb = multi.add(ProgressBar::new((n_collect + n_discard) as u64));
                pb.set_prefix(format!("Chain {i}"));
                pb.set_style(pb_style.clone());
                let result = run_chain_progress(chain, n_collect, n_discard, &pb);
                pb.finish_with_message("Done!");
                result
            })
            .collect::<Result<_, SamplerError>>()?;

        let stats: Vec<&ChainStats> = results.iter().map(|(_, s)| s).collect();
        for (i, s) in stats.iter().enumerate() {
            log::info!("chain {i}: {} steps, p(accept)≈{:.3}", s.n, s.p_accept);
        }
        if stats.len() > 1 {
            log::info!("R-hat per dimension: {}", collect_rhat(&stats));
        }

        let samples: Vec<Array2<S>> = results.into_iter().map(|(s, _)| s).collect();
        stack_chains(&samples)
    }
}

fn stack_chains<S: Clone>(samples: &[Array2<S>]) -> Result<Array3<S>, Box<dyn Error>> {
    if samples.is_empty() {
        return Err(Box::new(SamplerError::invalid("no chains to run")));
    }
    let views: Vec<ArrayView2<S>> = samples.iter().map(|x| x.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}

impl<S, T> ChainRunner<S> for T
where
    S: Clone + Zero + ToPrimitive + Send + 'static,
    T: HasChains<S>,
{
}
