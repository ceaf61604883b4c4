//! Closed categories used by equations and constraints.

use serde::{Deserialize, Serialize};

/// Indexing category of an equation.
///
/// A variable has at most one equation per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquationKind {
    /// Value at t = 0. May reference parameters, scalars and other initial values.
    Initial,

    /// Value at the current timestep, resolved by fixed-point iteration.
    Current,

    /// Value at t + 1 computed from the settled state at t.
    Recurrence,

    /// Time-invariant derived value, computed once per run before t = 0.
    Scalar,
}

impl EquationKind {
    /// Lowercase name used in diagnostics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Current => "current",
            Self::Recurrence => "recurrence",
            Self::Scalar => "scalar",
        }
    }

    /// Returns `true` if this equation produces a timeseries entry.
    #[must_use]
    pub const fn is_time_indexed(&self) -> bool {
        !matches!(self, Self::Scalar)
    }
}

impl std::fmt::Display for EquationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraint severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Halts the run at the violating timestep.
    Fatal,

    /// Recorded; the run continues.
    #[default]
    Warning,
}

impl Severity {
    /// Returns `true` if this is `Fatal`.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }
}
