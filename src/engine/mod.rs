//! Execution engine.
//!
//! An `Engine` owns one validated model and executes runs of it. Each run
//! walks `t` in `[0, horizon)` through the same pipeline:
//!
//! 1. cooperative cancellation / timeout checkpoint
//! 2. open the timestep (seeded from the previous recurrence or carried forward)
//! 3. fixed-point resolution of current-timestep equations
//! 4. constraints; a fatal violation commits the timestep and halts the run
//! 5. policies, in declaration order
//! 6. recurrences producing `t + 1`
//! 7. commit
//!
//! The model, registry and configuration are read-only after construction,
//! so one engine is shared by every worker of a Monte Carlo batch.

/// Monte Carlo worker pool and cancellation.
pub mod runtime;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tracing::{debug, info, trace, warn};

use crate::aggregate::AggregateResult;
use crate::config::{EngineConfig, ExecutionMode, ExecutionRequest};
use crate::constraints::ConstraintChecker;
use crate::error::{EngineResult, ExecutionError, InvalidIrError};
use crate::eval::{solve, EvalContext, Resolution, RunEnv, SimulationState};
use crate::ir::{Equation, EquationKind, Model, ParameterValue};
use crate::policy::PolicyEngine;
use crate::result::{
    ConvergenceWarning, Diagnostic, RunId, RunMetadata, RunResult, RunStatus,
};
use crate::sampling::{run_rng, Sampler};
use crate::stdlib::{FunctionRegistry, StdLib};
use crate::value::Value;

pub use runtime::{CancellationToken, MonteCarloConfig, MonteCarloRunner};

/// What `Engine::execute` produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutput {
    /// Deterministic mode.
    Single(Box<RunResult>),
    /// Monte Carlo mode.
    Batch(AggregateResult),
}

impl ExecutionOutput {
    /// The run of a deterministic execution.
    #[must_use]
    pub fn as_single(&self) -> Option<&RunResult> {
        match self {
            Self::Single(run) => Some(run.as_ref()),
            Self::Batch(_) => None,
        }
    }

    /// The aggregate of a Monte Carlo execution.
    #[must_use]
    pub const fn as_batch(&self) -> Option<&AggregateResult> {
        match self {
            Self::Batch(aggregate) => Some(aggregate),
            Self::Single(_) => None,
        }
    }
}

/// Executes runs of one model.
#[derive(Clone)]
pub struct Engine {
    model: Arc<Model>,
    functions: Arc<dyn FunctionRegistry>,
    config: EngineConfig,
    fingerprint: String,
    checker: ConstraintChecker,
    policies: PolicyEngine,
    variables: Vec<String>,
    current_defined: HashSet<String>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("model", &self.model.name)
            .field("fingerprint", &self.fingerprint)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine using the built-in stdlib.
    pub fn new(model: Model, config: EngineConfig) -> EngineResult<Self> {
        Self::with_registry(model, Arc::new(StdLib::new()), config)
    }

    /// Creates an engine with a custom function registry.
    ///
    /// The configuration and the model are validated once, here.
    pub fn with_registry(
        model: Model,
        functions: Arc<dyn FunctionRegistry>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        model.validate_with(functions.as_ref(), config.max_block_depth)?;

        let fingerprint = model.fingerprint()?;
        let variables = model.variables().into_iter().map(str::to_string).collect();
        let current_defined = model
            .equations_of(EquationKind::Current)
            .map(|eq| eq.variable.clone())
            .collect();

        info!(
            model = %model.name,
            horizon = model.horizon,
            parameters = model.parameters.len(),
            equations = model.equations.len(),
            fingerprint = %fingerprint,
            "engine ready"
        );

        Ok(Self {
            model: Arc::new(model),
            functions,
            config,
            fingerprint,
            checker: ConstraintChecker::new()?,
            policies: PolicyEngine::new(config.max_block_depth),
            variables,
            current_defined,
        })
    }

    /// The model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Content hash of the model.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Prepares the sampler for this model's stochastic parameters.
    pub fn sampler(&self) -> EngineResult<Sampler> {
        Ok(Sampler::prepare(&self.model)?)
    }

    /// Executes a request with the default worker-pool configuration.
    pub fn execute(&self, request: &ExecutionRequest) -> EngineResult<ExecutionOutput> {
        self.execute_with(request, MonteCarloConfig::default())
    }

    /// Executes a request.
    pub fn execute_with(
        &self,
        request: &ExecutionRequest,
        pool: MonteCarloConfig,
    ) -> EngineResult<ExecutionOutput> {
        match request.mode {
            ExecutionMode::Deterministic => Ok(ExecutionOutput::Single(Box::new(
                self.run_deterministic(request.seed)?,
            ))),
            ExecutionMode::MonteCarlo { runs } => {
                let runner = MonteCarloRunner::new(Arc::new(self.clone()), pool);
                Ok(ExecutionOutput::Batch(runner.run(runs, request.seed)?))
            }
        }
    }

    /// Executes one run without sampling; distributions use their point estimate.
    pub fn run_deterministic(&self, seed: u64) -> EngineResult<RunResult> {
        let parameters = self
            .model
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.point_value()))
            .collect();
        self.run_inner(parameters, seed, None, None)
    }

    /// Executes run `run_index` of a batch seeded with `base_seed`.
    ///
    /// The run's parameters are drawn from its own random stream, so the
    /// result depends only on the model, `base_seed` and `run_index`.
    pub fn run_single(
        &self,
        sampler: &Sampler,
        base_seed: u64,
        run_index: usize,
        cancel: &CancellationToken,
    ) -> EngineResult<RunResult> {
        let mut rng = run_rng(base_seed, run_index);
        let draws = sampler.sample(&mut rng);
        let parameters = self
            .model
            .parameters
            .iter()
            .map(|p| {
                let value = match &p.value {
                    ParameterValue::Literal { value } => value.clone(),
                    ParameterValue::Distribution { .. } => draws
                        .get(&p.name)
                        .map_or_else(|| p.point_value(), |v| Value::Number(*v)),
                };
                (p.name.clone(), value)
            })
            .collect();
        self.run_inner(parameters, base_seed, Some(run_index), Some(cancel))
    }

    /// Executes one run with explicit parameter values.
    ///
    /// Parameters missing from `overrides` take their point value.
    pub fn run_with_parameters(
        &self,
        overrides: &IndexMap<String, Value>,
        seed: u64,
    ) -> EngineResult<RunResult> {
        let parameters = self
            .model
            .parameters
            .iter()
            .map(|p| {
                let value = overrides
                    .get(&p.name)
                    .cloned()
                    .unwrap_or_else(|| p.point_value());
                (p.name.clone(), value)
            })
            .collect();
        self.run_inner(parameters, seed, None, None)
    }

    fn run_inner(
        &self,
        parameters: IndexMap<String, Value>,
        seed: u64,
        run_index: Option<usize>,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<RunResult> {
        let started = Instant::now();
        let model = &*self.model;
        debug!(model = %model.name, seed, run_index = ?run_index, "run started");

        let mut diagnostics = Vec::new();
        let scalars = self.solve_scalars(&parameters, &mut diagnostics)?;
        let env = RunEnv {
            parameters: &parameters,
            scalars: &scalars,
            functions: self.functions.as_ref(),
            division_by_zero: self.config.division_by_zero,
        };

        let mut state = SimulationState::new(self.variables.iter().map(String::as_str));
        let mut violations = Vec::new();
        let mut events = Vec::new();
        let mut firings = Vec::new();
        let mut next: IndexMap<String, Value> = IndexMap::new();
        let mut status = RunStatus::Completed;

        for t in 0..model.horizon {
            self.checkpoint(cancel, started, run_index.unwrap_or(0), t)?;

            state.open(|name, previous| {
                if t == 0 || self.current_defined.contains(name) {
                    Value::Undefined
                } else if let Some(value) = next.swap_remove(name) {
                    value
                } else {
                    previous.cloned().unwrap_or_default()
                }
            });
            next.clear();

            if t == 0 {
                self.solve_initial(env, &mut state, &mut diagnostics)?;
            } else {
                let pending = model.equations_of(EquationKind::Current).collect();
                let resolution = self.solve_timestep(
                    pending,
                    self.config.max_fixed_point_iterations,
                    env,
                    &mut state,
                    t,
                    &mut diagnostics,
                );
                record_convergence(&resolution, t, &mut diagnostics);
            }

            let ctx = EvalContext::new(env, &state, t);
            let report = self.checker.check(&model.constraints, &ctx);
            if ctx.take_division_by_zero() {
                diagnostics.push(Diagnostic::DivisionByZero {
                    timestep: t,
                    context: "constraints".to_string(),
                });
            }
            let fatal = report.is_fatal();
            violations.extend(report.violations);
            diagnostics.extend(report.diagnostics);
            if fatal {
                state.commit();
                status = RunStatus::HaltedFatal { timestep: t };
                info!(model = %model.name, run_index = ?run_index, timestep = t, "run halted by fatal constraint");
                break;
            }

            let report = self.policies.run(&model.policies, env, &mut state, t);
            firings.extend(report.firings);
            events.extend(report.events);
            diagnostics.extend(report.diagnostics);

            if t + 1 < model.horizon {
                self.evaluate_recurrences(env, &state, t, &mut next, &mut diagnostics);
            }

            state.commit();
            trace!(timestep = t, "timestep committed");
        }

        debug!(
            model = %model.name,
            run_index = ?run_index,
            status = ?status,
            violations = violations.len(),
            "run finished"
        );

        Ok(RunResult {
            metadata: RunMetadata {
                run_id: RunId::derive(&self.fingerprint, seed, run_index),
                model_name: model.name.clone(),
                model_fingerprint: self.fingerprint.clone(),
                seed,
                run_index,
                horizon: model.horizon,
            },
            status,
            parameters,
            scalars,
            series: state.into_series(),
            violations,
            events,
            firings,
            diagnostics,
        })
    }

    fn checkpoint(
        &self,
        cancel: Option<&CancellationToken>,
        started: Instant,
        run_index: usize,
        timestep: usize,
    ) -> Result<(), ExecutionError> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            debug!(run_index, timestep, "run cancelled");
            return Err(ExecutionError::Cancelled {
                run_index,
                timestep,
            });
        }
        if let Some(budget_ms) = self.config.max_run_duration_ms {
            if started.elapsed() > Duration::from_millis(budget_ms) {
                warn!(run_index, timestep, budget_ms, "run exceeded its time budget");
                return Err(ExecutionError::Timeout {
                    run_index,
                    timestep,
                    budget_ms,
                });
            }
        }
        Ok(())
    }

    /// Scalars are time-invariant and resolved once, before `t = 0`.
    fn solve_scalars(
        &self,
        parameters: &IndexMap<String, Value>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> EngineResult<IndexMap<String, Value>> {
        let pending: Vec<&Equation> = self.model.equations_of(EquationKind::Scalar).collect();
        if pending.is_empty() {
            return Ok(IndexMap::new());
        }

        let no_variables = SimulationState::new(Vec::<String>::new());
        let mut scalars = IndexMap::new();
        let cap = self.config.max_fixed_point_iterations.max(pending.len());
        let resolution = solve(pending, cap, |eq| {
            let env = RunEnv {
                parameters,
                scalars: &scalars,
                functions: self.functions.as_ref(),
                division_by_zero: self.config.division_by_zero,
            };
            let ctx = EvalContext::new(env, &no_variables, 0);
            let value = ctx.eval_finite(&eq.expr)?;
            if ctx.take_division_by_zero() {
                diagnostics.push(Diagnostic::DivisionByZero {
                    timestep: 0,
                    context: eq.context(),
                });
            }
            scalars.insert(eq.variable.clone(), value);
            Ok(())
        });

        if !resolution.is_converged() {
            return Err(InvalidIrError::UnresolvedScalars {
                unresolved: resolution.unresolved.keys().cloned().collect(),
            }
            .into());
        }
        Ok(scalars)
    }

    /// Initial values, plus current equations of variables without one.
    ///
    /// An initial equation that cannot be resolved means the IR is malformed.
    fn solve_initial(
        &self,
        env: RunEnv<'_>,
        state: &mut SimulationState,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> EngineResult<()> {
        let initial: HashSet<&str> = self
            .model
            .equations_of(EquationKind::Initial)
            .map(|eq| eq.variable.as_str())
            .collect();
        let pending: Vec<&Equation> = self
            .model
            .equations
            .iter()
            .filter(|eq| match eq.kind {
                EquationKind::Initial => true,
                EquationKind::Current => !initial.contains(eq.variable.as_str()),
                EquationKind::Recurrence | EquationKind::Scalar => false,
            })
            .collect();

        let cap = self.config.max_fixed_point_iterations.max(pending.len());
        let resolution = self.solve_timestep(pending, cap, env, state, 0, diagnostics);

        let failed_initial: Vec<String> = resolution
            .unresolved
            .keys()
            .filter(|name| initial.contains(name.as_str()))
            .cloned()
            .collect();
        if !failed_initial.is_empty() {
            warn!(unresolved = ?failed_initial, "initial values could not be computed");
            return Err(InvalidIrError::UnresolvedInitialValues {
                unresolved: failed_initial,
            }
            .into());
        }
        record_convergence(&resolution, 0, diagnostics);
        Ok(())
    }

    fn solve_timestep(
        &self,
        pending: Vec<&Equation>,
        max_iterations: usize,
        env: RunEnv<'_>,
        state: &mut SimulationState,
        timestep: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Resolution {
        solve(pending, max_iterations, |eq| {
            let ctx = EvalContext::new(env, &*state, timestep);
            let value = ctx.eval_finite(&eq.expr)?;
            if ctx.take_division_by_zero() {
                diagnostics.push(Diagnostic::DivisionByZero {
                    timestep,
                    context: eq.context(),
                });
            }
            state.set_current(&eq.variable, value)
        })
    }

    fn evaluate_recurrences(
        &self,
        env: RunEnv<'_>,
        state: &SimulationState,
        timestep: usize,
        next: &mut IndexMap<String, Value>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let ctx = EvalContext::new(env, state, timestep);
        for eq in self.model.equations_of(EquationKind::Recurrence) {
            let value = match ctx.eval_finite(&eq.expr) {
                Ok(value) => value,
                Err(err) => {
                    debug!(timestep, variable = %eq.variable, error = %err, "recurrence failed");
                    diagnostics.push(Diagnostic::RecurrenceFailed {
                        timestep,
                        variable: eq.variable.clone(),
                        reason: err.to_string(),
                    });
                    Value::Undefined
                }
            };
            if ctx.take_division_by_zero() {
                diagnostics.push(Diagnostic::DivisionByZero {
                    timestep,
                    context: eq.context(),
                });
            }
            next.insert(eq.variable.clone(), value);
        }
    }
}

fn record_convergence(resolution: &Resolution, timestep: usize, diagnostics: &mut Vec<Diagnostic>) {
    if resolution.is_converged() {
        return;
    }
    let unresolved: IndexMap<String, String> = resolution
        .unresolved
        .iter()
        .map(|(name, err)| (name.clone(), err.to_string()))
        .collect();
    warn!(
        timestep,
        iterations = resolution.iterations,
        unresolved = ?unresolved.keys().collect::<Vec<_>>(),
        "current-timestep equations did not converge"
    );
    diagnostics.push(Diagnostic::Convergence(ConvergenceWarning {
        timestep,
        iterations: resolution.iterations,
        unresolved,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DivisionByZeroPolicy;
    use crate::ir::{Action, Constraint, Distribution, Expr, ModelBuilder};

    fn engine(model: Model) -> Engine {
        Engine::new(model, EngineConfig::default()).unwrap()
    }

    #[test]
    fn initial_and_recurrence_produce_full_series() {
        let model = ModelBuilder::new("growth", 4)
            .parameter("rate", 0.5)
            .initial("x", Expr::num(2.0))
            .recurrence("x", Expr::var("x") * (Expr::num(1.0) + Expr::ident("rate")))
            .build()
            .unwrap();
        let run = engine(model).run_deterministic(0).unwrap();
        assert!(run.is_completed());
        assert_eq!(run.timesteps(), 4);
        let xs: Vec<f64> = (0..4).map(|t| run.number("x", t).unwrap()).collect();
        assert_eq!(xs, vec![2.0, 3.0, 4.5, 6.75]);
    }

    #[test]
    fn current_equations_resolve_out_of_order() {
        let model = ModelBuilder::new("chain", 3)
            .current("c", Expr::ident("b") + Expr::num(1.0))
            .current("b", Expr::ident("a") * Expr::num(2.0))
            .current("a", Expr::Time + Expr::num(1.0))
            .build()
            .unwrap();
        let run = engine(model).run_deterministic(0).unwrap();
        assert!(run.convergence_warnings().next().is_none());
        assert_eq!(run.number("c", 2), Some(7.0));
    }

    #[test]
    fn cycles_leave_undefined_and_warn() {
        let model = ModelBuilder::new("cycle", 2)
            .current("x", Expr::ident("y") + Expr::num(1.0))
            .current("y", Expr::ident("x") + Expr::num(1.0))
            .build()
            .unwrap();
        let run = engine(model).run_deterministic(0).unwrap();
        assert!(run.is_completed());
        assert_eq!(run.value("x", 1), Some(&Value::Undefined));
        assert_eq!(run.convergence_warnings().count(), 2);
    }

    #[test]
    fn variables_without_current_equation_carry_forward() {
        let model = ModelBuilder::new("stock", 3)
            .initial("headcount", Expr::num(10.0))
            .current("cost", Expr::ident("headcount") * Expr::num(2.0))
            .policy(
                "hire",
                Expr::Time.eq_to(Expr::num(1.0)),
                Action::assign("headcount", Expr::num(12.0)),
            )
            .build()
            .unwrap();
        let run = engine(model).run_deterministic(0).unwrap();
        let heads: Vec<f64> = (0..3).map(|t| run.number("headcount", t).unwrap()).collect();
        assert_eq!(heads, vec![10.0, 12.0, 12.0]);
        // The policy runs after equations, so cost at t=1 still sees 10.
        assert_eq!(run.number("cost", 1), Some(20.0));
        assert_eq!(run.number("cost", 2), Some(24.0));
    }

    #[test]
    fn fatal_constraint_halts_after_committing() {
        let model = ModelBuilder::new("burn", 10)
            .initial("cash", Expr::num(100.0))
            .recurrence("cash", Expr::var("cash") - Expr::num(40.0))
            .constraint(Constraint::fatal("solvent", Expr::ident("cash").ge(Expr::num(0.0))))
            .build()
            .unwrap();
        let run = engine(model).run_deterministic(0).unwrap();
        assert_eq!(run.halted_at(), Some(3));
        assert_eq!(run.timesteps(), 4);
        assert_eq!(run.number("cash", 3), Some(-20.0));
        assert_eq!(run.violations.len(), 1);
        assert_eq!(run.violations[0].violation_amount, Some(20.0));
    }

    #[test]
    fn unresolvable_initial_value_is_invalid_ir() {
        let model = ModelBuilder::new("bad", 2)
            .initial("a", Expr::ident("b"))
            .initial("b", Expr::ident("a"))
            .build()
            .unwrap();
        let err = engine(model).run_deterministic(0).unwrap_err();
        assert!(err.is_invalid_ir());
    }

    #[test]
    fn scalars_are_resolved_before_the_run() {
        let model = ModelBuilder::new("scalars", 2)
            .parameter("price", 4.0)
            .scalar("margin", Expr::ident("unit_price") - Expr::num(1.0))
            .scalar("unit_price", Expr::ident("price") * Expr::num(2.0))
            .current("profit", Expr::ident("margin") * Expr::num(10.0))
            .build()
            .unwrap();
        let run = engine(model).run_deterministic(0).unwrap();
        assert_eq!(run.scalars["margin"], Value::Number(7.0));
        assert_eq!(run.number("profit", 0), Some(70.0));
    }

    #[test]
    fn failed_recurrence_leaves_undefined() {
        let model = ModelBuilder::new("rec", 3)
            .initial("x", Expr::num(1.0))
            .recurrence("x", Expr::call("ln", vec![Expr::var("x") - Expr::num(1.0)]))
            .build()
            .unwrap();
        let run = engine(model).run_deterministic(0).unwrap();
        assert_eq!(run.value("x", 1), Some(&Value::Undefined));
        assert!(run
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::RecurrenceFailed { timestep: 0, .. })));
    }

    #[test]
    fn nan_function_argument_defers_instead_of_panicking() {
        let nan = Expr::num(10.0).pow(Expr::num(400.0)) - Expr::num(10.0).pow(Expr::num(400.0));
        let model = ModelBuilder::new("nan_bound", 2)
            .current("x", Expr::call("clamp", vec![Expr::num(1.0), nan, Expr::num(5.0)]))
            .current("y", Expr::num(3.0))
            .build()
            .unwrap();
        let run = engine(model).run_deterministic(0).unwrap();
        assert!(run.is_completed());
        assert_eq!(run.value("x", 1), Some(&Value::Undefined));
        assert_eq!(run.number("y", 1), Some(3.0));
        let w = run.convergence_warnings().next().unwrap();
        assert!(w.unresolved.contains_key("x"));
    }

    #[test]
    fn division_by_zero_policy_is_configurable() {
        let model = ModelBuilder::new("div", 1)
            .parameter("zero", 0.0)
            .current("ratio", Expr::num(1.0) / Expr::ident("zero"))
            .build()
            .unwrap();

        let run = engine(model.clone()).run_deterministic(0).unwrap();
        assert_eq!(run.number("ratio", 0), Some(0.0));
        assert!(run.diagnostics.is_empty());

        let config = EngineConfig {
            division_by_zero: DivisionByZeroPolicy::Warn,
            ..EngineConfig::default()
        };
        let run = Engine::new(model.clone(), config).unwrap().run_deterministic(0).unwrap();
        assert_eq!(run.number("ratio", 0), Some(0.0));
        assert!(matches!(run.diagnostics[0], Diagnostic::DivisionByZero { .. }));

        let config = EngineConfig {
            division_by_zero: DivisionByZeroPolicy::Error,
            ..EngineConfig::default()
        };
        let run = Engine::new(model, config).unwrap().run_deterministic(0).unwrap();
        assert_eq!(run.value("ratio", 0), Some(&Value::Undefined));
        assert_eq!(run.convergence_warnings().count(), 1);
    }

    #[test]
    fn deterministic_mode_uses_point_estimates() {
        let model = ModelBuilder::new("pe", 1)
            .stochastic("g", Distribution::Uniform { min: 0.0, max: 1.0 })
            .current("y", Expr::ident("g"))
            .build()
            .unwrap();
        let run = engine(model).run_deterministic(9).unwrap();
        assert_eq!(run.number("y", 0), Some(0.5));
        assert_eq!(run.metadata.seed, 9);
        assert_eq!(run.metadata.run_index, None);
    }

    #[test]
    fn run_with_parameters_overrides_values() {
        let model = ModelBuilder::new("what_if", 1)
            .parameter("price", 10.0)
            .current("revenue", Expr::ident("price") * Expr::num(3.0))
            .build()
            .unwrap();
        let mut overrides = IndexMap::new();
        overrides.insert("price".to_string(), Value::Number(20.0));
        let run = engine(model).run_with_parameters(&overrides, 0).unwrap();
        assert_eq!(run.number("revenue", 0), Some(60.0));
    }

    #[test]
    fn cancelled_token_stops_before_first_timestep() {
        let model = ModelBuilder::new("c", 5)
            .stochastic("g", Distribution::Normal { mean: 0.0, std_dev: 1.0 })
            .current("y", Expr::ident("g"))
            .build()
            .unwrap();
        let engine = engine(model);
        let sampler = engine.sampler().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = engine.run_single(&sampler, 1, 3, &token).unwrap_err();
        assert!(err.is_cancellation());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let model = ModelBuilder::new("m", 1).build().unwrap();
        let config = EngineConfig {
            max_fixed_point_iterations: 0,
            ..EngineConfig::default()
        };
        let err = Engine::new(model, config).unwrap_err();
        assert!(err.is_execution());
    }
}
