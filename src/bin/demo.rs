//! A small demo: adaptive Metropolis on a strongly correlated 2D Gaussian, with a summary
//! of the pooled sample. Set `RUST_LOG=info` to see per-chain acceptance and R-hat.

use haario_mcmc::adaptive::AdaptiveHaario;
use haario_mcmc::core::ChainRunner;
use haario_mcmc::stats::{max_rhat, ChainStats, ChainTracker, SampleSummary};
use ndarray::{arr1, arr2};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    const SAMPLE_SIZE: usize = 40_000;
    const BURNIN: usize = 2_000;
    const N_CHAINS: usize = 4;
    const SEED: u64 = 42;

    let mean = arr1(&[1.0, -2.0]);
    let cov = arr2(&[[2.0, 1.8], [1.8, 2.0]]);
    let mut sampler = AdaptiveHaario::new(mean.clone(), cov.clone(), N_CHAINS)?.set_seed(SEED);

    let sample = sampler.run_progress(SAMPLE_SIZE / N_CHAINS, BURNIN)?;
    let summary = SampleSummary::pooled(sample.view())?;

    println!("Target mean: {:.3}", mean);
    println!("Target cov:\n{:.3}", cov);
    println!("Pooled sample:\n{summary}");

    let mut chain_stats: Vec<ChainStats> = Vec::new();
    for chain in sample.outer_iter() {
        let mut tracker = ChainTracker::new(chain.ncols(), &chain.row(0).to_vec())?;
        for row in chain.rows() {
            tracker.step(&row.to_vec())?;
        }
        chain_stats.push(tracker.stats());
    }
    let refs: Vec<&ChainStats> = chain_stats.iter().collect();
    println!("Max R-hat: {:.4}", max_rhat(&refs)?);
    for (i, chain) in sampler.chains.iter().enumerate() {
        let c = chain.counters();
        println!(
            "Chain {i}: acceptance {:.3}, adapted proposals {}/{}, skipped {}",
            chain.acceptance_rate(),
            c.adapted,
            c.iterations,
            c.skipped
        );
    }

    #[cfg(feature = "csv")]
    {
        haario_mcmc::io::csv::save_csv(&sample, "/tmp/haario_demo.csv")?;
        println!("Saved chains to /tmp/haario_demo.csv");
    }

    Ok(())
}
