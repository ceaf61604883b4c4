//! Intermediate Representation (IR) of a compiled model.
//!
//! The IR is the hand-off format from the compiler: parameters, equations,
//! constraints, policies and correlations, plus a time horizon. It is loaded
//! once, validated once, and then shared read-only by every run.

mod builder;
mod distribution;
mod expr;
mod kinds;
mod model;
mod serialization;
mod validation;

pub use builder::ModelBuilder;
pub use distribution::Distribution;
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use kinds::{EquationKind, Severity};
pub use model::{
    Action, Constraint, CorrelationPartner, CorrelationSpec, Equation, Model, Parameter,
    ParameterValue, Policy,
};

pub use serialization::{from_json, to_json_pretty};
pub use validation::DEFAULT_MAX_BLOCK_DEPTH;
