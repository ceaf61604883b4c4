//! # econsim - execution engine for compiled economic models
//!
//! econsim takes the intermediate representation of an economic model and
//! runs it over a discrete time horizon: equations are resolved every
//! timestep, business constraints are enforced, adaptive policies react to
//! the evolving state, and uncertain parameters are sampled with
//! cross-parameter correlation across many independent runs.
//!
//! ## Core Concepts
//!
//! - **Model**: parameters, equations, constraints, policies and a horizon
//! - **Run**: one pass over `t` in `[0, horizon)` producing a [`RunResult`]
//! - **Monte Carlo batch**: N independently seeded runs reduced into an
//!   [`AggregateResult`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use econsim::{Constraint, Engine, EngineConfig, Expr, ModelBuilder};
//!
//! let model = ModelBuilder::new("savings", 13)
//!     .parameter("rate", 0.08)
//!     .initial("balance", Expr::num(5000.0))
//!     .recurrence("balance", Expr::var("balance") * (Expr::num(1.0) + Expr::ident("rate")))
//!     .constraint(Constraint::fatal("solvent", Expr::ident("balance").ge(Expr::num(0.0))))
//!     .build()?;
//!
//! let run = Engine::new(model, EngineConfig::default())?.run_deterministic(42)?;
//! assert!(run.is_completed());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod config;
pub mod error;
pub mod ir;
pub mod result;
pub mod stdlib;
pub mod value;

// Evaluation pipeline
pub mod constraints;
pub mod eval;
pub mod policy;

// Sampling and orchestration
pub mod aggregate;
pub mod engine;
pub mod sampling;

// Re-export primary types at crate root for convenience
pub use aggregate::{AggregateResult, Summary};
pub use config::{DivisionByZeroPolicy, EngineConfig, ExecutionMode, ExecutionRequest};
pub use constraints::{ConstraintChecker, ConstraintReport};
pub use engine::{
    CancellationToken, Engine, ExecutionOutput, MonteCarloConfig, MonteCarloRunner,
};
pub use error::{
    CorrelationMatrixError, EngineError, EngineResult, EvalError, ExecutionError, InvalidIrError,
};
pub use ir::{
    Action, BinaryOp, Constraint, Distribution, Equation, EquationKind, Expr, Model,
    ModelBuilder, Parameter, ParameterValue, Policy, Severity, UnaryOp,
};
pub use policy::{PolicyEngine, PolicyReport};
pub use result::{
    ConvergenceWarning, Diagnostic, EmittedEvent, PolicyFiring, RunId, RunMetadata, RunResult,
    RunStatus, Violation,
};
pub use sampling::{CholeskyFactor, CorrelationMatrix, Sampler};
pub use stdlib::{FunctionRegistry, StdLib};
pub use value::Value;
