//! Expression evaluation against one run's state.

use std::cell::Cell;

use indexmap::IndexMap;

use crate::config::DivisionByZeroPolicy;
use crate::error::EvalError;
use crate::ir::{BinaryOp, Expr, UnaryOp};
use crate::stdlib::FunctionRegistry;
use crate::value::Value;

use super::state::SimulationState;

/// Run-invariant inputs to evaluation.
#[derive(Clone, Copy)]
pub struct RunEnv<'a> {
    /// Parameter values of this run.
    pub parameters: &'a IndexMap<String, Value>,
    /// Scalar values of this run.
    pub scalars: &'a IndexMap<String, Value>,
    /// Callable functions.
    pub functions: &'a dyn FunctionRegistry,
    /// Zero-divisor handling.
    pub division_by_zero: DivisionByZeroPolicy,
}

/// Evaluates expressions at one timestep.
///
/// Name resolution order for a bare identifier is parameters, scalars, then
/// the variable's value at the open timestep. An `Undefined` slot is a
/// missing dependency, never a value.
pub struct EvalContext<'a> {
    env: RunEnv<'a>,
    state: &'a SimulationState,
    timestep: usize,
    divided_by_zero: Cell<bool>,
}

impl<'a> EvalContext<'a> {
    /// Creates a context for `timestep`.
    #[must_use]
    pub fn new(env: RunEnv<'a>, state: &'a SimulationState, timestep: usize) -> Self {
        Self {
            env,
            state,
            timestep,
            divided_by_zero: Cell::new(false),
        }
    }

    /// The timestep being evaluated.
    #[must_use]
    pub const fn timestep(&self) -> usize {
        self.timestep
    }

    /// Returns `true` if a zero divisor was replaced since the last call, and
    /// clears the flag.
    pub fn take_division_by_zero(&self) -> bool {
        self.divided_by_zero.replace(false)
    }

    /// Evaluates `expr` and rejects non-finite numbers.
    ///
    /// This is the check applied wherever a value is about to be stored.
    pub fn eval_finite(&self, expr: &Expr) -> Result<Value, EvalError> {
        let value = self.eval(expr)?;
        match value {
            Value::Number(n) if !n.is_finite() => Err(EvalError::NonFinite { value: n }),
            other => Ok(other),
        }
    }

    /// Evaluates `expr` and requires a boolean.
    pub fn eval_bool(&self, expr: &Expr) -> Result<bool, EvalError> {
        let value = self.eval(expr)?;
        value.as_bool().ok_or(EvalError::TypeMismatch {
            expected: "bool",
            found: value.type_name(),
        })
    }

    /// Evaluates `expr` and requires a finite number.
    pub fn eval_number(&self, expr: &Expr) -> Result<f64, EvalError> {
        let value = self.eval_finite(expr)?;
        value.as_number().ok_or(EvalError::TypeMismatch {
            expected: "number",
            found: value.type_name(),
        })
    }

    /// Evaluates `expr`.
    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Number { value } => Ok(Value::Number(*value)),
            Expr::Bool { value } => Ok(Value::Bool(*value)),
            Expr::Text { value } => Ok(Value::Text(value.clone())),
            Expr::Time => Ok(Value::Number(self.timestep as f64)),
            Expr::Ident { name } => self.resolve(name),
            Expr::Var { name, lag } => self.lookup_lagged(name, *lag),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Neg => Ok(Value::Number(-number(&value)?)),
                    UnaryOp::Not => Ok(Value::Bool(!boolean(&value)?)),
                }
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval_bool(cond)? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call { function, args } => {
                // Registries only ever see finite numbers.
                let args = args
                    .iter()
                    .map(|arg| self.eval_finite(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.env.functions.call(function, &args)
            }
        }
    }

    fn resolve(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.env.parameters.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.env.scalars.get(name) {
            return Ok(value.clone());
        }
        self.lookup_lagged(name, 0)
    }

    fn lookup_lagged(&self, name: &str, lag: usize) -> Result<Value, EvalError> {
        if !self.state.has_variable(name) {
            return Err(EvalError::UnknownIdentifier {
                name: name.to_string(),
            });
        }
        let Some(at) = self.timestep.checked_sub(lag) else {
            return Err(EvalError::TimeOutOfRange {
                name: name.to_string(),
                requested: self.timestep as i64 - lag as i64,
            });
        };
        match self.state.value_at(name, at) {
            Some(value) if !value.is_undefined() => Ok(value.clone()),
            _ => Err(EvalError::MissingDependency {
                name: name.to_string(),
                timestep: at,
            }),
        }
    }

    fn eval_binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, EvalError> {
        // Logical operators short-circuit.
        match op {
            BinaryOp::And => {
                return Ok(Value::Bool(self.eval_bool(lhs)? && self.eval_bool(rhs)?));
            }
            BinaryOp::Or => {
                return Ok(Value::Bool(self.eval_bool(lhs)? || self.eval_bool(rhs)?));
            }
            _ => {}
        }

        let l = self.eval(lhs)?;
        let r = self.eval(rhs)?;

        match op {
            BinaryOp::Eq => return Ok(Value::Bool(values_equal(&l, &r))),
            BinaryOp::Ne => return Ok(Value::Bool(!values_equal(&l, &r))),
            _ => {}
        }

        let a = number(&l)?;
        let b = number(&r)?;
        let out = match op {
            BinaryOp::Add => Value::Number(a + b),
            BinaryOp::Sub => Value::Number(a - b),
            BinaryOp::Mul => Value::Number(a * b),
            BinaryOp::Div => Value::Number(self.divide(a, b, |a, b| a / b)?),
            BinaryOp::Rem => Value::Number(self.divide(a, b, |a, b| a % b)?),
            BinaryOp::Pow => Value::Number(a.powf(b)),
            BinaryOp::Lt => Value::Bool(a < b),
            BinaryOp::Le => Value::Bool(a <= b),
            BinaryOp::Gt => Value::Bool(a > b),
            BinaryOp::Ge => Value::Bool(a >= b),
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::And | BinaryOp::Or => {
                unreachable!("handled above")
            }
        };
        Ok(out)
    }

    fn divide(&self, a: f64, b: f64, f: impl Fn(f64, f64) -> f64) -> Result<f64, EvalError> {
        if b != 0.0 {
            return Ok(f(a, b));
        }
        match self.env.division_by_zero {
            DivisionByZeroPolicy::Zero => Ok(0.0),
            DivisionByZeroPolicy::Warn => {
                self.divided_by_zero.set(true);
                Ok(0.0)
            }
            DivisionByZeroPolicy::Error => Err(EvalError::DivisionByZero),
        }
    }
}

fn number(value: &Value) -> Result<f64, EvalError> {
    value.as_number().ok_or(EvalError::TypeMismatch {
        expected: "number",
        found: value.type_name(),
    })
}

fn boolean(value: &Value) -> Result<bool, EvalError> {
    value.as_bool().ok_or(EvalError::TypeMismatch {
        expected: "bool",
        found: value.type_name(),
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        _ => a == b,
    }
}
