//! Constraint checking.
//!
//! Constraints are evaluated after a timestep's equations settle. A false
//! condition becomes a [`Violation`]; when the condition is a direct
//! comparison both operands are evaluated again to fill in the diagnostic
//! fields.

use regex::Regex;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::eval::EvalContext;
use crate::ir::{BinaryOp, Constraint, Expr};
use crate::result::{Diagnostic, Violation};
use crate::value::Value;

/// Outcome of checking every constraint at one timestep.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstraintReport {
    /// Violations in declaration order; a fatal one is always last.
    pub violations: Vec<Violation>,
    /// Constraints that could not be evaluated.
    pub diagnostics: Vec<Diagnostic>,
}

impl ConstraintReport {
    /// Returns `true` if a fatal constraint was violated.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.violations.last().is_some_and(|v| v.severity.is_fatal())
    }
}

/// Evaluates constraints and renders their messages.
#[derive(Debug, Clone)]
pub struct ConstraintChecker {
    placeholder: Regex,
}

impl ConstraintChecker {
    /// Creates a checker.
    pub fn new() -> Result<Self, EngineError> {
        let placeholder = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| EngineError::internal(format!("message template regex: {e}")))?;
        Ok(Self { placeholder })
    }

    /// Checks `constraints` in declaration order.
    ///
    /// Checking stops at the first fatal violation.
    pub fn check(&self, constraints: &[Constraint], ctx: &EvalContext<'_>) -> ConstraintReport {
        let timestep = ctx.timestep();
        let mut report = ConstraintReport::default();

        for constraint in constraints {
            let holds = match ctx.eval_bool(&constraint.condition) {
                Ok(holds) => holds,
                Err(err) => {
                    debug!(timestep, constraint = %constraint.name, error = %err, "constraint skipped");
                    report.diagnostics.push(Diagnostic::ConstraintSkipped {
                        timestep,
                        constraint: constraint.name.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            if holds {
                continue;
            }

            let violation = self.violation(constraint, ctx);
            let fatal = violation.severity.is_fatal();
            warn!(
                timestep,
                constraint = %constraint.name,
                severity = ?constraint.severity,
                actual = ?violation.actual_value,
                expected = ?violation.expected_value,
                "constraint violated"
            );
            report.violations.push(violation);
            if fatal {
                break;
            }
        }

        report
    }

    fn violation(&self, constraint: &Constraint, ctx: &EvalContext<'_>) -> Violation {
        let mut violation = Violation {
            timestep: ctx.timestep(),
            constraint: constraint.name.clone(),
            severity: constraint.severity,
            message: constraint
                .message
                .as_deref()
                .map(|template| self.render(template, ctx)),
            actual_value: None,
            expected_value: None,
            operator: None,
            violation_amount: None,
        };

        if let Expr::Binary { op, lhs, rhs } = &constraint.condition {
            if op.is_comparison() {
                if let (Ok(actual), Ok(expected)) = (ctx.eval_number(lhs), ctx.eval_number(rhs)) {
                    violation.actual_value = Some(actual);
                    violation.expected_value = Some(expected);
                    violation.operator = Some(op.symbol().to_string());
                    violation.violation_amount = violation_amount(*op, actual, expected);
                }
            }
        }

        violation
    }

    /// Fills `{name}` placeholders from the evaluation context.
    ///
    /// `{t}` is the timestep. Names that cannot be resolved are left as written.
    #[must_use]
    pub fn render(&self, template: &str, ctx: &EvalContext<'_>) -> String {
        self.placeholder
            .replace_all(template, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                if name == "t" {
                    return ctx.timestep().to_string();
                }
                match ctx.eval(&Expr::ident(name)) {
                    Ok(Value::Number(n)) => format_number(n),
                    Ok(value) => value.to_string(),
                    Err(_) => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// Signed distance by which `actual` must move to satisfy `actual op expected`.
///
/// Positive means the comparison fails by that much; for `!=` no finite
/// distance exists and zero is reported.
#[must_use]
pub fn violation_amount(op: BinaryOp, actual: f64, expected: f64) -> Option<f64> {
    match op {
        BinaryOp::Gt | BinaryOp::Ge => Some(expected - actual),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Eq => Some(actual - expected),
        BinaryOp::Ne => Some(0.0),
        _ => None,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        format!("{n:.2}")
    }
}
