//! Error types for the simulation engine.
//!
//! All errors are strongly typed using thiserror. Structural errors
//! (`InvalidIrError`, `CorrelationMatrixError`) abort a batch before any
//! timestep runs; `EvalError` never leaves a run and instead drives deferral
//! or becomes a diagnostic on the `RunResult`.

use thiserror::Error;

/// Structural defects in a model's IR.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidIrError {
    #[error("Model name cannot be empty")]
    EmptyModelName,

    #[error("Horizon must be at least 1 timestep")]
    ZeroHorizon,

    #[error("{kind} name cannot be empty")]
    EmptyName {
        kind: &'static str,
    },

    #[error("Duplicate {kind} '{name}'")]
    DuplicateName {
        kind: &'static str,
        name: String,
    },

    #[error("Variable '{variable}' has more than one {kind} equation")]
    DuplicateEquation {
        variable: String,
        kind: &'static str,
    },

    #[error("'{name}' is declared as both a parameter and a variable")]
    NameCollision {
        name: String,
    },

    #[error("{context} references unknown identifier '{name}'")]
    UnknownIdentifier {
        context: String,
        name: String,
    },

    #[error("{context} uses time-indexed reference to '{name}', which is not a variable")]
    NotAVariable {
        context: String,
        name: String,
    },

    #[error("{context} calls unknown function '{function}'")]
    UnknownFunction {
        context: String,
        function: String,
    },

    #[error("Initial equation for '{variable}' references '{name}' at a lag; initial values may only use parameters and other initial values")]
    LaggedInitialReference {
        variable: String,
        name: String,
    },

    #[error("Variable '{variable}' has a recurrence but no initial or current equation, so it has no value at t=0")]
    MissingStartingValue {
        variable: String,
    },

    #[error("Policy '{policy}' assigns to '{target}', which is not a variable")]
    InvalidAssignTarget {
        policy: String,
        target: String,
    },

    #[error("Policy '{policy}' nests action blocks deeper than {max_depth}")]
    BlockTooDeep {
        policy: String,
        max_depth: usize,
    },

    #[error("Parameter '{parameter}' has an invalid distribution: {reason}")]
    InvalidDistribution {
        parameter: String,
        reason: String,
    },

    #[error("Initial values could not be computed for: {}", unresolved.join(", "))]
    UnresolvedInitialValues {
        unresolved: Vec<String>,
    },

    #[error("Scalar equations could not be computed for: {}", unresolved.join(", "))]
    UnresolvedScalars {
        unresolved: Vec<String>,
    },
}

/// Correlation matrix invariant failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CorrelationMatrixError {
    #[error("Correlation matrix is not square: row {row} has {len} entries, expected {expected}")]
    NotSquare {
        row: usize,
        len: usize,
        expected: usize,
    },

    #[error("Correlation coefficient {value} at ({row}, {col}) is outside [-1, 1]")]
    CoefficientOutOfRange {
        row: usize,
        col: usize,
        value: f64,
    },

    #[error("Correlation matrix is not symmetric at ({row}, {col})")]
    NotSymmetric {
        row: usize,
        col: usize,
    },

    #[error("Correlation matrix diagonal entry {index} is {value}, expected 1")]
    NonUnitDiagonal {
        index: usize,
        value: f64,
    },

    #[error("Correlation matrix is not positive semi-definite (pivot {pivot} at index {index})")]
    NotPositiveSemiDefinite {
        index: usize,
        pivot: f64,
    },

    #[error("Conflicting correlation coefficients for '{a}' and '{b}': {first} vs {second}")]
    ConflictingCoefficient {
        a: String,
        b: String,
        first: f64,
        second: f64,
    },

    #[error("Correlation references unknown parameter '{name}'")]
    UnknownParameter {
        name: String,
    },

    #[error("Correlation references '{name}', which has no distribution")]
    NotStochastic {
        name: String,
    },
}

/// Failures while evaluating a single expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("'{name}' has no value at timestep {timestep} yet")]
    MissingDependency {
        name: String,
        timestep: usize,
    },

    #[error("Unknown identifier '{name}'")]
    UnknownIdentifier {
        name: String,
    },

    #[error("Unknown function '{function}'")]
    UnknownFunction {
        function: String,
    },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Expression evaluated to a non-finite number ({value})")]
    NonFinite {
        value: f64,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("'{name}' referenced at timestep {requested}, before the start of the run")]
    TimeOutOfRange {
        name: String,
        requested: i64,
    },

    #[error("Function '{function}' failed: {reason}")]
    Function {
        function: String,
        reason: String,
    },

    #[error("Action blocks nested deeper than {max_depth}")]
    BlockDepthExceeded {
        max_depth: usize,
    },
}

impl EvalError {
    /// Returns true if the failure is caused by a value that is not available yet.
    #[must_use]
    pub const fn is_missing_dependency(&self) -> bool {
        matches!(self, Self::MissingDependency { .. })
    }
}

/// Errors raised while driving runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("Run {run_index} was cancelled at timestep {timestep}")]
    Cancelled {
        run_index: usize,
        timestep: usize,
    },

    #[error("Run {run_index} exceeded its budget of {budget_ms}ms at timestep {timestep}")]
    Timeout {
        run_index: usize,
        timestep: usize,
        budget_ms: u64,
    },

    #[error("Worker pool disconnected")]
    WorkerDisconnected,

    #[error("Invalid engine configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

impl ExecutionError {
    /// Returns true if the run was stopped cooperatively (cancel or timeout).
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::Timeout { .. })
    }
}

/// Top-level error type for the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Invalid IR: {0}")]
    InvalidIr(#[from] InvalidIrError),

    #[error("Correlation matrix error: {0}")]
    Correlation(#[from] CorrelationMatrixError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl EngineError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is an IR validation error.
    #[must_use]
    pub const fn is_invalid_ir(&self) -> bool {
        matches!(self, Self::InvalidIr(_))
    }

    /// Returns true if this is a correlation matrix error.
    #[must_use]
    pub const fn is_correlation(&self) -> bool {
        matches!(self, Self::Correlation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if the run was cancelled or timed out.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        match self {
            Self::Execution(e) => e.is_cancellation(),
            _ => false,
        }
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
