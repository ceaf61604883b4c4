//! Policy execution.
//!
//! Policies run after constraints, in declaration order, every timestep.
//! Assignments overwrite the open timestep immediately, so a later policy
//! observes the effects of an earlier one.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::EvalError;
use crate::eval::{EvalContext, RunEnv, SimulationState};
use crate::ir::{Action, Policy, DEFAULT_MAX_BLOCK_DEPTH};
use crate::result::{Diagnostic, EmittedEvent, PolicyFiring};

/// Everything the policies produced at one timestep.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyReport {
    /// Policies whose trigger held, in order.
    pub firings: Vec<PolicyFiring>,
    /// Emitted events, in order.
    pub events: Vec<EmittedEvent>,
    /// Trigger or action failures and division warnings.
    pub diagnostics: Vec<Diagnostic>,
}

/// Executes policy action trees against the open timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyEngine {
    max_block_depth: usize,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BLOCK_DEPTH)
    }
}

impl PolicyEngine {
    /// Creates an engine that refuses blocks nested deeper than `max_block_depth`.
    #[must_use]
    pub const fn new(max_block_depth: usize) -> Self {
        Self { max_block_depth }
    }

    /// Evaluates every policy at `timestep`.
    ///
    /// A failing action aborts the rest of that policy's action tree; effects
    /// already applied stay, and the next policy still runs.
    pub fn run(
        &self,
        policies: &[Policy],
        env: RunEnv<'_>,
        state: &mut SimulationState,
        timestep: usize,
    ) -> PolicyReport {
        let mut report = PolicyReport::default();

        for policy in policies {
            let fired = Execution {
                policy,
                env,
                state: &mut *state,
                timestep,
                report: &mut report,
            }
            .evaluate(|ctx| ctx.eval_bool(&policy.trigger));
            match fired {
                Ok(false) => continue,
                Ok(true) => {}
                Err(err) => {
                    warn!(timestep, policy = %policy.name, error = %err, "policy trigger failed");
                    report.diagnostics.push(Diagnostic::PolicyFailed {
                        timestep,
                        policy: policy.name.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            }

            debug!(timestep, policy = %policy.name, "policy fired");
            report.firings.push(PolicyFiring {
                policy: policy.name.clone(),
                timestep,
            });

            let mut exec = Execution {
                policy,
                env,
                state: &mut *state,
                timestep,
                report: &mut report,
            };
            if let Err(err) = self.apply(&policy.action, 0, &mut exec) {
                warn!(timestep, policy = %policy.name, error = %err, "policy action failed");
                report.diagnostics.push(Diagnostic::PolicyFailed {
                    timestep,
                    policy: policy.name.clone(),
                    reason: err.to_string(),
                });
            }
        }

        report
    }

    fn apply(&self, action: &Action, depth: usize, exec: &mut Execution<'_, '_>) -> Result<(), EvalError> {
        match action {
            Action::Assign { target, value } => {
                let value = exec.evaluate(|ctx| ctx.eval_finite(value))?;
                exec.state.set_current(target, value)
            }
            Action::Block { actions } => {
                if depth >= self.max_block_depth {
                    return Err(EvalError::BlockDepthExceeded {
                        max_depth: self.max_block_depth,
                    });
                }
                for nested in actions {
                    self.apply(nested, depth + 1, exec)?;
                }
                Ok(())
            }
            Action::EmitEvent { name, args } => {
                let args = exec.evaluate(|ctx| {
                    args.iter()
                        .map(|(key, expr)| ctx.eval_finite(expr).map(|v| (key.clone(), v)))
                        .collect::<Result<IndexMap<_, _>, EvalError>>()
                })?;
                exec.report.events.push(EmittedEvent {
                    name: name.clone(),
                    args,
                    timestep: exec.timestep,
                    policy: exec.policy.name.clone(),
                });
                Ok(())
            }
        }
    }
}

/// Mutable view of one policy's execution.
struct Execution<'p, 'a> {
    policy: &'p Policy,
    env: RunEnv<'a>,
    state: &'p mut SimulationState,
    timestep: usize,
    report: &'p mut PolicyReport,
}

impl Execution<'_, '_> {
    fn evaluate<T>(
        &mut self,
        f: impl FnOnce(&EvalContext<'_>) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        let ctx = EvalContext::new(self.env, &*self.state, self.timestep);
        let out = f(&ctx)?;
        if ctx.take_division_by_zero() {
            self.report.diagnostics.push(Diagnostic::DivisionByZero {
                timestep: self.timestep,
                context: format!("policy '{}'", self.policy.name),
            });
        }
        Ok(out)
    }
}
