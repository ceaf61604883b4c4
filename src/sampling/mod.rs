//! Correlated sampling of stochastic parameters.
//!
//! A `Sampler` is prepared once per batch: it validates the correlation
//! matrix and factors it. Each run then draws one independent standard-normal
//! vector, multiplies it by the Cholesky factor, and maps every correlated
//! normal through its parameter's own marginal.

mod correlation;
pub mod normal;
mod rng;
pub mod stats;

use indexmap::IndexMap;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::CorrelationMatrixError;
use crate::ir::{Distribution, Model, ParameterValue};

pub use correlation::{CholeskyFactor, CorrelationMatrix};
pub use rng::{run_rng, run_seed};

/// Draws one value per stochastic parameter.
#[derive(Debug, Clone)]
pub struct Sampler {
    names: Vec<String>,
    distributions: Vec<Distribution>,
    factor: CholeskyFactor,
}

impl Sampler {
    /// Builds the sampler for `model`'s stochastic parameters.
    ///
    /// Fails if the declared correlations do not form a valid matrix.
    pub fn prepare(model: &Model) -> Result<Self, CorrelationMatrixError> {
        let (names, matrix) = CorrelationMatrix::from_model(model)?;
        let factor = matrix.cholesky()?;
        let distributions = model
            .parameters
            .iter()
            .filter_map(|p| match &p.value {
                ParameterValue::Distribution { distribution, .. } => Some(*distribution),
                ParameterValue::Literal { .. } => None,
            })
            .collect();
        Ok(Self {
            names,
            distributions,
            factor,
        })
    }

    /// Number of sampled parameters.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.names.len()
    }

    /// Sampled parameter names in declaration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The Cholesky factor applied to each draw.
    #[must_use]
    pub const fn factor(&self) -> &CholeskyFactor {
        &self.factor
    }

    /// Draws one correlated sample.
    ///
    /// Always consumes exactly `dimension()` standard normals from `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> IndexMap<String, f64> {
        let z: Vec<f64> = (0..self.dimension())
            .map(|_| rng.sample(StandardNormal))
            .collect();
        let mut correlated = Vec::with_capacity(z.len());
        self.factor.apply(&z, &mut correlated);

        self.names
            .iter()
            .zip(&self.distributions)
            .zip(correlated)
            .map(|((name, dist), z)| (name.clone(), dist.from_standard_normal(z)))
            .collect()
    }
}
