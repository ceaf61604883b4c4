//! Probability distributions for stochastic parameters.

use serde::{Deserialize, Serialize};

use crate::sampling::normal::standard_normal_cdf;

/// A parameter's marginal distribution.
///
/// Every family maps a standard-normal draw into its own marginal through
/// `from_standard_normal`, which is what lets correlated normals carry their
/// rank correlation into non-normal marginals.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Distribution {
    Normal { mean: f64, std_dev: f64 },

    /// `exp(N(mu, sigma))`.
    LogNormal { mu: f64, sigma: f64 },

    Uniform { min: f64, max: f64 },

    Triangular { min: f64, mode: f64, max: f64 },

    Exponential { rate: f64 },

    /// Degenerate distribution; every draw is `value`.
    Fixed { value: f64 },
}

impl Distribution {
    /// Checks the family's parameter constraints.
    pub fn validate(&self) -> Result<(), String> {
        let finite = |name: &str, v: f64| {
            if v.is_finite() {
                Ok(())
            } else {
                Err(format!("{name} must be finite, got {v}"))
            }
        };
        match *self {
            Self::Normal { mean, std_dev } => {
                finite("mean", mean)?;
                finite("std_dev", std_dev)?;
                if std_dev < 0.0 {
                    return Err(format!("std_dev must be >= 0, got {std_dev}"));
                }
            }
            Self::LogNormal { mu, sigma } => {
                finite("mu", mu)?;
                finite("sigma", sigma)?;
                if sigma < 0.0 {
                    return Err(format!("sigma must be >= 0, got {sigma}"));
                }
            }
            Self::Uniform { min, max } => {
                finite("min", min)?;
                finite("max", max)?;
                if min >= max {
                    return Err(format!("min ({min}) must be < max ({max})"));
                }
            }
            Self::Triangular { min, mode, max } => {
                finite("min", min)?;
                finite("mode", mode)?;
                finite("max", max)?;
                if min >= max {
                    return Err(format!("min ({min}) must be < max ({max})"));
                }
                if !(min..=max).contains(&mode) {
                    return Err(format!("mode ({mode}) must lie in [{min}, {max}]"));
                }
            }
            Self::Exponential { rate } => {
                finite("rate", rate)?;
                if rate <= 0.0 {
                    return Err(format!("rate must be > 0, got {rate}"));
                }
            }
            Self::Fixed { value } => finite("value", value)?,
        }
        Ok(())
    }

    /// Expected value; the default point estimate in deterministic mode.
    #[must_use]
    pub fn mean(&self) -> f64 {
        match *self {
            Self::Normal { mean, .. } => mean,
            Self::LogNormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
            Self::Uniform { min, max } => (min + max) / 2.0,
            Self::Triangular { min, mode, max } => (min + mode + max) / 3.0,
            Self::Exponential { rate } => 1.0 / rate,
            Self::Fixed { value } => value,
        }
    }

    /// Maps a standard-normal draw `z` into this distribution.
    ///
    /// Normal and log-normal use the exact affine/exponential transform; the
    /// other families go through `u = Φ(z)` and their inverse CDF.
    #[must_use]
    pub fn from_standard_normal(&self, z: f64) -> f64 {
        match *self {
            Self::Normal { mean, std_dev } => mean + std_dev * z,
            Self::LogNormal { mu, sigma } => (mu + sigma * z).exp(),
            Self::Uniform { min, max } => min + (max - min) * standard_normal_cdf(z),
            Self::Triangular { min, mode, max } => {
                let u = standard_normal_cdf(z);
                let width = max - min;
                let split = (mode - min) / width;
                if u < split {
                    min + (u * width * (mode - min)).sqrt()
                } else {
                    max - ((1.0 - u) * width * (max - mode)).sqrt()
                }
            }
            // 1 - Φ(z) == Φ(-z), which keeps precision in the upper tail.
            Self::Exponential { rate } => -standard_normal_cdf(-z).ln() / rate,
            Self::Fixed { value } => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn normal_is_affine_in_z() {
        let d = Distribution::Normal {
            mean: 10.0,
            std_dev: 2.0,
        };
        assert_eq!(d.from_standard_normal(0.0), 10.0);
        assert_eq!(d.from_standard_normal(1.5), 13.0);
        assert_eq!(d.mean(), 10.0);
    }

    #[test]
    fn lognormal_median_is_exp_mu() {
        let d = Distribution::LogNormal { mu: 1.0, sigma: 0.5 };
        assert!(close(d.from_standard_normal(0.0), 1f64.exp(), 1e-12));
        assert!(close(d.mean(), (1.0f64 + 0.125).exp(), 1e-12));
    }

    #[test]
    fn uniform_maps_median_to_midpoint() {
        let d = Distribution::Uniform { min: 2.0, max: 6.0 };
        assert!(close(d.from_standard_normal(0.0), 4.0, 1e-6));
        let low = d.from_standard_normal(-8.0);
        let high = d.from_standard_normal(8.0);
        assert!(low >= 2.0 && low < 2.001);
        assert!(high <= 6.0 && high > 5.999);
    }

    #[test]
    fn triangular_stays_within_support() {
        let d = Distribution::Triangular {
            min: 0.0,
            mode: 1.0,
            max: 4.0,
        };
        for z in [-6.0, -1.0, 0.0, 0.3, 2.0, 6.0] {
            let x = d.from_standard_normal(z);
            assert!((0.0..=4.0).contains(&x), "z={z} -> {x}");
        }
        // CDF at the mode is (mode - min) / (max - min) = 0.25.
        let z_at_mode = -0.674_489_750_196_081_7;
        assert!(close(d.from_standard_normal(z_at_mode), 1.0, 1e-5));
    }

    #[test]
    fn exponential_median_is_ln2_over_rate() {
        let d = Distribution::Exponential { rate: 2.0 };
        assert!(close(d.from_standard_normal(0.0), 2f64.ln() / 2.0, 1e-6));
        assert!(d.from_standard_normal(-5.0) >= 0.0);
        assert!(close(d.mean(), 0.5, 1e-12));
    }

    #[test]
    fn fixed_ignores_draw() {
        let d = Distribution::Fixed { value: 0.3 };
        assert_eq!(d.from_standard_normal(-2.0), 0.3);
        assert_eq!(d.from_standard_normal(4.0), 0.3);
        assert_eq!(d.mean(), 0.3);
    }

    #[test]
    fn validate_rejects_bad_parameters() {
        assert!(Distribution::Normal { mean: 0.0, std_dev: -1.0 }.validate().is_err());
        assert!(Distribution::Uniform { min: 3.0, max: 3.0 }.validate().is_err());
        assert!(Distribution::Triangular { min: 0.0, mode: 5.0, max: 4.0 }.validate().is_err());
        assert!(Distribution::Exponential { rate: 0.0 }.validate().is_err());
        assert!(Distribution::LogNormal { mu: f64::NAN, sigma: 1.0 }.validate().is_err());
        assert!(Distribution::Fixed { value: f64::INFINITY }.validate().is_err());
        assert!(Distribution::Normal { mean: 1.0, std_dev: 0.0 }.validate().is_ok());
    }

    #[test]
    fn serialization_is_tagged_by_family() {
        let d = Distribution::Uniform { min: 0.0, max: 1.0 };
        let json = serde_json::to_value(d).unwrap();
        assert_eq!(json["family"], "uniform");
        let back: Distribution = serde_json::from_value(json).unwrap();
        assert_eq!(back, d);
    }
}
