//! Standard-library function registry.
//!
//! The engine treats stdlib functions as pure functions of their evaluated
//! arguments: it only checks that a name exists (at validation time) and
//! invokes it by name (at evaluation time).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::EvalError;
use crate::value::Value;

/// A pure function over evaluated arguments.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Named-function lookup used by the evaluator.
///
/// Implementations must be pure and thread-safe: one registry is shared by
/// every run of a Monte Carlo batch.
pub trait FunctionRegistry: Send + Sync {
    /// Returns `true` if `name` can be called.
    fn contains(&self, name: &str) -> bool;

    /// Calls `name` with already-evaluated arguments.
    fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError>;
}

/// The built-in numeric function catalogue.
#[derive(Clone)]
pub struct StdLib {
    functions: HashMap<String, NativeFn>,
}

impl fmt::Debug for StdLib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("StdLib").field("functions", &names).finish()
    }
}

impl Default for StdLib {
    fn default() -> Self {
        Self::new()
    }
}

impl StdLib {
    /// Creates a registry with every built-in function.
    #[must_use]
    pub fn new() -> Self {
        let mut lib = Self::empty();
        lib.register_math();
        lib.register_aggregates();
        lib.register_finance();
        lib
    }

    /// Creates a registry with no functions.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registers (or replaces) a function.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
    }

    /// Number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if no functions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_math(&mut self) {
        self.unary("abs", f64::abs);
        self.unary("floor", f64::floor);
        self.unary("ceil", f64::ceil);
        self.unary("exp", f64::exp);
        self.unary_checked("sqrt", |x| {
            if x < 0.0 {
                Err(format!("sqrt of negative number {x}"))
            } else {
                Ok(x.sqrt())
            }
        });
        self.unary_checked("ln", |x| {
            if x <= 0.0 {
                Err(format!("ln of non-positive number {x}"))
            } else {
                Ok(x.ln())
            }
        });
        self.unary_checked("log10", |x| {
            if x <= 0.0 {
                Err(format!("log10 of non-positive number {x}"))
            } else {
                Ok(x.log10())
            }
        });
        self.register("pow", |args| {
            let [base, exponent] = numbers::<2>("pow", args)?;
            Ok(Value::Number(base.powf(exponent)))
        });
        self.register("round", |args| match args.len() {
            1 => {
                let [x] = numbers::<1>("round", args)?;
                Ok(Value::Number(x.round()))
            }
            _ => {
                let [x, digits] = numbers::<2>("round", args)?;
                let scale = 10f64.powi(digits as i32);
                Ok(Value::Number((x * scale).round() / scale))
            }
        });
        self.register("clamp", |args| {
            let [x, lo, hi] = numbers::<3>("clamp", args)?;
            if lo > hi {
                return Err(format!("clamp bounds inverted: {lo} > {hi}"));
            }
            Ok(Value::Number(x.clamp(lo, hi)))
        });
    }

    fn register_aggregates(&mut self) {
        self.variadic("min", |xs| xs.iter().copied().fold(f64::INFINITY, f64::min));
        self.variadic("max", |xs| xs.iter().copied().fold(f64::NEG_INFINITY, f64::max));
        self.variadic("sum", |xs| xs.iter().sum());
        self.variadic("mean", |xs| xs.iter().sum::<f64>() / xs.len() as f64);
    }

    fn register_finance(&mut self) {
        // (1 + rate)^periods
        self.register("compound", |args| {
            let [rate, periods] = numbers::<2>("compound", args)?;
            Ok(Value::Number((1.0 + rate).powf(periods)))
        });
        // value / (1 + rate)^periods
        self.register("discount", |args| {
            let [value, rate, periods] = numbers::<3>("discount", args)?;
            Ok(Value::Number(value / (1.0 + rate).powf(periods)))
        });
    }

    fn unary(&mut self, name: &'static str, f: fn(f64) -> f64) {
        self.register(name, move |args| {
            let [x] = numbers::<1>(name, args)?;
            Ok(Value::Number(f(x)))
        });
    }

    fn unary_checked(&mut self, name: &'static str, f: fn(f64) -> Result<f64, String>) {
        self.register(name, move |args| {
            let [x] = numbers::<1>(name, args)?;
            f(x).map(Value::Number)
        });
    }

    fn variadic(&mut self, name: &'static str, f: fn(&[f64]) -> f64) {
        self.register(name, move |args| {
            if args.is_empty() {
                return Err(format!("{name} expects at least one argument"));
            }
            let xs = args
                .iter()
                .map(|v| number(name, v))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Number(f(&xs)))
        });
    }
}

impl FunctionRegistry for StdLib {
    fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let f = self
            .functions
            .get(name)
            .ok_or_else(|| EvalError::UnknownFunction {
                function: name.to_string(),
            })?;
        f(args).map_err(|reason| EvalError::Function {
            function: name.to_string(),
            reason,
        })
    }
}

fn number(function: &str, value: &Value) -> Result<f64, String> {
    let x = value
        .as_number()
        .ok_or_else(|| format!("{function} expects numbers, got {}", value.type_name()))?;
    if !x.is_finite() {
        return Err(format!("{function} expects finite numbers, got {x}"));
    }
    Ok(x)
}

fn numbers<const N: usize>(function: &str, args: &[Value]) -> Result<[f64; N], String> {
    if args.len() != N {
        return Err(format!(
            "{function} expects {N} argument(s), got {}",
            args.len()
        ));
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = number(function, arg)?;
    }
    Ok(out)
}
