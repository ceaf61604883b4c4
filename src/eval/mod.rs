//! Equation evaluation.
//!
//! `SimulationState` holds one run's timeseries, `EvalContext` evaluates an
//! expression tree against it, and `solve` drives the bounded fixed-point
//! passes used for current-timestep, initial and scalar equations.

mod context;
mod solver;
mod state;

pub use context::{EvalContext, RunEnv};
pub use solver::{solve, Resolution};
pub use state::SimulationState;
