//! Engine configuration and execution requests.

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::ir::DEFAULT_MAX_BLOCK_DEPTH;

/// What a zero divisor does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DivisionByZeroPolicy {
    /// Silently yield zero.
    #[default]
    Zero,

    /// Yield zero and record a `DivisionByZero` diagnostic.
    Warn,

    /// Fail the evaluation (the value is deferred, like any other failure).
    Error,
}

/// Limits and semantics knobs for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum fixed-point passes per timestep.
    pub max_fixed_point_iterations: usize,
    /// Zero-divisor handling.
    pub division_by_zero: DivisionByZeroPolicy,
    /// Maximum nesting depth of policy action blocks.
    pub max_block_depth: usize,
    /// Wall-clock budget per run, checked between timesteps.
    pub max_run_duration_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_fixed_point_iterations: 10,
            division_by_zero: DivisionByZeroPolicy::Zero,
            max_block_depth: DEFAULT_MAX_BLOCK_DEPTH,
            max_run_duration_ms: None,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration.
    ///
    /// This must be called before constructing an `Engine`.
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.max_fixed_point_iterations == 0 {
            return Err(ExecutionError::InvalidConfig {
                reason: "max_fixed_point_iterations must be > 0".to_string(),
            });
        }
        if self.max_block_depth == 0 {
            return Err(ExecutionError::InvalidConfig {
                reason: "max_block_depth must be > 0".to_string(),
            });
        }
        if self.max_run_duration_ms == Some(0) {
            return Err(ExecutionError::InvalidConfig {
                reason: "max_run_duration_ms must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Execution mode selected by the invoking surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One run, no sampling; distributions use their point estimate.
    Deterministic,

    /// `runs` independently seeded runs reduced into an aggregate.
    MonteCarlo {
        /// Number of runs.
        runs: usize,
    },
}

/// A request to execute a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Mode selector.
    #[serde(flatten)]
    pub mode: ExecutionMode,
    /// Base seed.
    #[serde(default)]
    pub seed: u64,
}

impl ExecutionRequest {
    /// Deterministic request.
    #[must_use]
    pub const fn deterministic(seed: u64) -> Self {
        Self {
            mode: ExecutionMode::Deterministic,
            seed,
        }
    }

    /// Monte Carlo request.
    #[must_use]
    pub const fn monte_carlo(runs: usize, seed: u64) -> Self {
        Self {
            mode: ExecutionMode::MonteCarlo { runs },
            seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_is_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_fixed_point_iterations, 10);
        assert_eq!(config.division_by_zero, DivisionByZeroPolicy::Zero);
    }

    #[test]
    fn config_rejects_zero_limits() {
        let mut c = EngineConfig::default();
        c.max_fixed_point_iterations = 0;
        assert!(c.validate().is_err());

        let mut c = EngineConfig::default();
        c.max_block_depth = 0;
        assert!(c.validate().is_err());

        let mut c = EngineConfig::default();
        c.max_run_duration_ms = Some(0);
        assert!(c.validate().is_err());
    }

    #[test]
    fn config_deserializes_partial_json() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"division_by_zero": "warn"}"#).unwrap();
        assert_eq!(config.division_by_zero, DivisionByZeroPolicy::Warn);
        assert_eq!(config.max_fixed_point_iterations, 10);
    }

    #[test]
    fn request_serialization() {
        let request = ExecutionRequest::monte_carlo(500, 42);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"mode":"monte_carlo","runs":500,"seed":42}"#);

        let decoded: ExecutionRequest =
            serde_json::from_str(r#"{"mode":"deterministic"}"#).unwrap();
        assert_eq!(decoded, ExecutionRequest::deterministic(0));
    }
}
