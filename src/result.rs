//! Per-run result artifact.
//!
//! A `RunResult` is fully determined by the model, the seed and the run
//! index: it carries no wall-clock data and all maps keep declaration order,
//! so the same inputs serialize to the same bytes.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::ir::Severity;
use crate::value::Value;

/// Namespace for deterministic run identifiers.
const RUN_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6563_6f6e_7369_6d00_8a1f_03c2_5d4e_9b71);

/// Reproducible identifier for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Derives the id of run `run_index` of model `fingerprint` under `seed`.
    #[must_use]
    pub fn derive(fingerprint: &str, seed: u64, run_index: Option<usize>) -> Self {
        let name = match run_index {
            Some(index) => format!("{fingerprint}:{seed}:{index}"),
            None => format!("{fingerprint}:{seed}:deterministic"),
        };
        Self(Uuid::new_v5(&RUN_ID_NAMESPACE, name.as_bytes()))
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Deterministic run identifier.
    pub run_id: RunId,
    /// Model name.
    pub model_name: String,
    /// Model content hash.
    pub model_fingerprint: String,
    /// Base seed of the run. In a Monte Carlo batch the run's stream is keyed
    /// by `sampling::run_seed(seed, run_index)`.
    pub seed: u64,
    /// Index within a Monte Carlo batch; `None` in deterministic mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_index: Option<usize>,
    /// Model horizon.
    pub horizon: usize,
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every timestep up to the horizon was evaluated.
    Completed,

    /// A fatal constraint halted the run at `timestep`.
    HaltedFatal {
        /// The halting timestep.
        timestep: usize,
    },
}

/// A recorded constraint violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Timestep at which the condition was false.
    pub timestep: usize,
    /// Constraint name.
    pub constraint: String,
    /// Constraint severity.
    pub severity: Severity,
    /// Rendered message template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Left operand of a comparison condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<f64>,
    /// Right operand of a comparison condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<f64>,
    /// Comparison operator symbol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Signed distance needed to satisfy the comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation_amount: Option<f64>,
}

/// An event emitted by a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedEvent {
    /// Event name.
    pub name: String,
    /// Evaluated arguments, in declaration order.
    pub args: IndexMap<String, Value>,
    /// Emitting timestep.
    pub timestep: usize,
    /// Emitting policy.
    pub policy: String,
}

/// A policy whose trigger held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFiring {
    /// Policy name.
    pub policy: String,
    /// Firing timestep.
    pub timestep: usize,
}

/// Current-timestep equations that did not converge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceWarning {
    /// Timestep of the failed resolution.
    pub timestep: usize,
    /// Passes performed.
    pub iterations: usize,
    /// Unresolved variables and the last failure for each.
    pub unresolved: IndexMap<String, String>,
}

/// Non-fatal run diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Fixed-point resolution hit its cap or stalled.
    Convergence(ConvergenceWarning),

    /// A zero divisor was replaced by zero (`DivisionByZeroPolicy::Warn`).
    DivisionByZero {
        /// Timestep.
        timestep: usize,
        /// Where the division happened.
        context: String,
    },

    /// A recurrence could not produce the next value.
    RecurrenceFailed {
        /// Timestep the recurrence was evaluated at.
        timestep: usize,
        /// Target variable.
        variable: String,
        /// Failure description.
        reason: String,
    },

    /// A constraint condition could not be evaluated.
    ConstraintSkipped {
        /// Timestep.
        timestep: usize,
        /// Constraint name.
        constraint: String,
        /// Failure description.
        reason: String,
    },

    /// A policy trigger or action failed.
    PolicyFailed {
        /// Timestep.
        timestep: usize,
        /// Policy name.
        policy: String,
        /// Failure description.
        reason: String,
    },
}

impl Diagnostic {
    /// Timestep the diagnostic refers to.
    #[must_use]
    pub const fn timestep(&self) -> usize {
        match self {
            Self::Convergence(w) => w.timestep,
            Self::DivisionByZero { timestep, .. }
            | Self::RecurrenceFailed { timestep, .. }
            | Self::ConstraintSkipped { timestep, .. }
            | Self::PolicyFailed { timestep, .. } => *timestep,
        }
    }
}

/// Everything a single run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Run identity.
    pub metadata: RunMetadata,
    /// Terminal status.
    pub status: RunStatus,
    /// Parameter values used by this run (sampled or literal).
    pub parameters: IndexMap<String, Value>,
    /// Scalar values computed for this run.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub scalars: IndexMap<String, Value>,
    /// Committed timeseries per variable.
    pub series: IndexMap<String, Vec<Value>>,
    /// Constraint violations in the order they were recorded.
    pub violations: Vec<Violation>,
    /// Emitted events in order.
    pub events: Vec<EmittedEvent>,
    /// Policy firings in order.
    pub firings: Vec<PolicyFiring>,
    /// Non-fatal diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

impl RunResult {
    /// Returns `true` if the run reached the horizon.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }

    /// The halting timestep of a `HaltedFatal` run.
    #[must_use]
    pub const fn halted_at(&self) -> Option<usize> {
        match self.status {
            RunStatus::HaltedFatal { timestep } => Some(timestep),
            RunStatus::Completed => None,
        }
    }

    /// Number of committed timesteps.
    #[must_use]
    pub fn timesteps(&self) -> usize {
        self.series.values().map(Vec::len).next().unwrap_or(0)
    }

    /// Timeseries of a variable.
    #[must_use]
    pub fn series(&self, variable: &str) -> Option<&[Value]> {
        self.series.get(variable).map(Vec::as_slice)
    }

    /// Value of a variable at a timestep.
    #[must_use]
    pub fn value(&self, variable: &str, timestep: usize) -> Option<&Value> {
        self.series.get(variable)?.get(timestep)
    }

    /// Numeric value of a variable at a timestep.
    #[must_use]
    pub fn number(&self, variable: &str, timestep: usize) -> Option<f64> {
        self.value(variable, timestep)?.as_number()
    }

    /// Convergence warnings in order.
    pub fn convergence_warnings(&self) -> impl Iterator<Item = &ConvergenceWarning> {
        self.diagnostics.iter().filter_map(|d| match d {
            Diagnostic::Convergence(w) => Some(w),
            _ => None,
        })
    }

    /// Fatal violations (at most one).
    pub fn fatal_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.severity.is_fatal())
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::internal(format!("serialize run result: {e}")))
    }

    /// Write the artifact as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        write_artifact(path.as_ref(), &self.to_json_pretty()?)
    }
}

pub(crate) fn write_artifact(path: &Path, json: &str) -> Result<(), EngineError> {
    std::fs::write(path, json)
        .map_err(|e| EngineError::internal(format!("write {}: {e}", path.display())))
}
