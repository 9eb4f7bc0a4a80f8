//! The random stream consumed by the sampler.
//!
//! Every chain draws from exactly one [`RandomSource`]. Any [`rand::Rng`] is a source, so a
//! seeded [`rand::rngs::SmallRng`] gives reproducible chains.

use ndarray::Array1;
use rand::Rng;
use rand_distr::StandardNormal;

/// Supplies `Uniform(0, 1)` draws and standard multivariate-normal vectors.
pub trait RandomSource {
    /// A draw from `Uniform[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// A vector of `n` independent `N(0, 1)` draws.
    fn standard_normal(&mut self, n: usize) -> Array1<f64>;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn uniform(&mut self) -> f64 {
        self.gen::<f64>()
    }

    fn standard_normal(&mut self, n: usize) -> Array1<f64> {
        Array1::from_shape_fn(n, |_| self.sample(StandardNormal))
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use super::RandomSource;
    use ndarray::Array1;
    use std::collections::VecDeque;

    /// Replays queued draws, then repeats the defaults once a queue runs dry.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct ScriptedSource {
        pub uniforms: VecDeque<f64>,
        pub normals: VecDeque<Array1<f64>>,
        pub default_uniform: f64,
        pub default_normal: f64,
        pub uniform_draws: usize,
        pub normal_draws: usize,
    }

    impl ScriptedSource {
        /// Every uniform draw returns `u`, every normal coordinate is `z`.
        pub(crate) fn constant(u: f64, z: f64) -> Self {
            Self {
                default_uniform: u,
                default_normal: z,
                ..Default::default()
            }
        }

        pub(crate) fn push_uniforms(mut self, us: &[f64]) -> Self {
            self.uniforms.extend(us.iter().copied());
            self
        }

        pub(crate) fn push_normal(mut self, z: Array1<f64>) -> Self {
            self.normals.push_back(z);
            self
        }
    }

    impl RandomSource for ScriptedSource {
        fn uniform(&mut self) -> f64 {
            self.uniform_draws += 1;
            self.uniforms.pop_front().unwrap_or(self.default_uniform)
        }

        fn standard_normal(&mut self, n: usize) -> Array1<f64> {
            self.normal_draws += 1;
            let z = self
                .normals
                .pop_front()
                .unwrap_or_else(|| Array1::from_elem(n, self.default_normal));
            assert_eq!(z.len(), n, "scripted normal vector has the wrong length");
            z
        }
    }
}
