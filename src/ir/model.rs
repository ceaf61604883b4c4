//! Model declarations: parameters, equations, constraints, policies and
//! correlations.
//!
//! A `Model` is loaded once and shared read-only by every run of a batch.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::value::Value;

use super::distribution::Distribution;
use super::expr::Expr;
use super::kinds::{EquationKind, Severity};

/// The compiled, type-checked model consumed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// IR format version (e.g., "1.0").
    #[serde(default = "default_version")]
    pub version: String,

    /// Model name.
    pub name: String,

    /// Number of timesteps; a run covers `t` in `[0, horizon)`.
    pub horizon: usize,

    /// Parameters in declaration order.
    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// Equations in declaration order.
    #[serde(default)]
    pub equations: Vec<Equation>,

    /// Constraints in declaration order.
    #[serde(default)]
    pub constraints: Vec<Constraint>,

    /// Policies in declaration (and evaluation) order.
    #[serde(default)]
    pub policies: Vec<Policy>,

    /// Pairwise correlations between stochastic parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correlations: Vec<CorrelationSpec>,
}

fn default_version() -> String {
    Model::CURRENT_VERSION.to_string()
}

impl Model {
    /// Current IR version.
    pub const CURRENT_VERSION: &'static str = "1.0";

    /// Creates an empty model.
    pub fn new(name: impl Into<String>, horizon: usize) -> Self {
        Self {
            version: Self::CURRENT_VERSION.to_string(),
            name: name.into(),
            horizon,
            parameters: Vec::new(),
            equations: Vec::new(),
            constraints: Vec::new(),
            policies: Vec::new(),
            correlations: Vec::new(),
        }
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Time-indexed variable names, in first-declaration order.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        let seen: IndexSet<&str> = self
            .equations
            .iter()
            .filter(|eq| eq.kind.is_time_indexed())
            .map(|eq| eq.variable.as_str())
            .collect();
        seen.into_iter().collect()
    }

    /// Scalar (time-invariant) names, in declaration order.
    #[must_use]
    pub fn scalars(&self) -> Vec<&str> {
        self.equations_of(EquationKind::Scalar)
            .map(|eq| eq.variable.as_str())
            .collect()
    }

    /// Equations of one category, in declaration order.
    pub fn equations_of(&self, kind: EquationKind) -> impl Iterator<Item = &Equation> {
        self.equations.iter().filter(move |eq| eq.kind == kind)
    }

    /// Returns `true` if `variable` has an equation of the given category.
    #[must_use]
    pub fn has_equation(&self, variable: &str, kind: EquationKind) -> bool {
        self.equations
            .iter()
            .any(|eq| eq.kind == kind && eq.variable == variable)
    }

    /// Returns `true` if any parameter is distribution-valued.
    #[must_use]
    pub fn is_stochastic(&self) -> bool {
        self.parameters.iter().any(Parameter::is_stochastic)
    }

    /// Stable content hash of the model (hex-encoded blake3 of the canonical JSON).
    pub fn fingerprint(&self) -> Result<String, EngineError> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| EngineError::internal(format!("serialize model: {e}")))?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

/// A model parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,

    /// Economic unit, opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Literal or distribution.
    pub value: ParameterValue,
}

impl Parameter {
    /// Literal-valued parameter.
    pub fn literal(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            unit: None,
            value: ParameterValue::Literal {
                value: value.into(),
            },
        }
    }

    /// Distribution-valued parameter.
    pub fn stochastic(name: impl Into<String>, distribution: Distribution) -> Self {
        Self {
            name: name.into(),
            unit: None,
            value: ParameterValue::Distribution {
                distribution,
                point_estimate: None,
                correlated_with: Vec::new(),
            },
        }
    }

    /// Sets the unit.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Returns `true` if this parameter is sampled in Monte Carlo mode.
    #[must_use]
    pub const fn is_stochastic(&self) -> bool {
        matches!(self.value, ParameterValue::Distribution { .. })
    }

    /// The value used when no sampling takes place.
    #[must_use]
    pub fn point_value(&self) -> Value {
        match &self.value {
            ParameterValue::Literal { value } => value.clone(),
            ParameterValue::Distribution {
                distribution,
                point_estimate,
                ..
            } => Value::Number(point_estimate.unwrap_or_else(|| distribution.mean())),
        }
    }
}

/// How a parameter gets its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterValue {
    /// Fixed value.
    Literal {
        /// The value.
        value: Value,
    },

    /// Sampled once per Monte Carlo run.
    Distribution {
        /// Marginal distribution.
        distribution: Distribution,

        /// Value used in deterministic mode; defaults to the distribution mean.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        point_estimate: Option<f64>,

        /// Correlation partners declared inline on the parameter.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        correlated_with: Vec<CorrelationPartner>,
    },
}

/// A correlation declared on a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPartner {
    /// The other parameter.
    pub parameter: String,
    /// Target correlation coefficient.
    pub coefficient: f64,
}

/// A model-level pairwise correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSpec {
    /// First parameter.
    pub a: String,
    /// Second parameter.
    pub b: String,
    /// Target correlation coefficient in `[-1, 1]`.
    pub coefficient: f64,
}

/// One definition of a variable (or scalar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equation {
    /// Target variable.
    pub variable: String,

    /// Indexing category.
    pub kind: EquationKind,

    /// Value expression.
    pub expr: Expr,

    /// Statically declared dependencies.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Equation {
    /// Creates an equation, deriving `dependencies` from the expression.
    pub fn new(variable: impl Into<String>, kind: EquationKind, expr: Expr) -> Self {
        let dependencies = expr.identifiers();
        Self {
            variable: variable.into(),
            kind,
            expr,
            dependencies,
        }
    }

    /// `variable[0] = expr`.
    pub fn initial(variable: impl Into<String>, expr: Expr) -> Self {
        Self::new(variable, EquationKind::Initial, expr)
    }

    /// `variable[t] = expr`.
    pub fn current(variable: impl Into<String>, expr: Expr) -> Self {
        Self::new(variable, EquationKind::Current, expr)
    }

    /// `variable[t + 1] = expr`.
    pub fn recurrence(variable: impl Into<String>, expr: Expr) -> Self {
        Self::new(variable, EquationKind::Recurrence, expr)
    }

    /// `variable = expr`, time-invariant.
    pub fn scalar(variable: impl Into<String>, expr: Expr) -> Self {
        Self::new(variable, EquationKind::Scalar, expr)
    }

    /// Human-readable location used in errors and diagnostics.
    #[must_use]
    pub fn context(&self) -> String {
        format!("{} equation '{}'", self.kind, self.variable)
    }
}

/// A business rule checked after each timestep settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Constraint name.
    pub name: String,

    /// Boolean condition that must hold.
    pub condition: Expr,

    /// What a violation does to the run.
    #[serde(default)]
    pub severity: Severity,

    /// Message template; `{name}` placeholders are filled from the state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Constraint {
    /// Fatal constraint.
    pub fn fatal(name: impl Into<String>, condition: Expr) -> Self {
        Self {
            name: name.into(),
            condition,
            severity: Severity::Fatal,
            message: None,
        }
    }

    /// Warning constraint.
    pub fn warning(name: impl Into<String>, condition: Expr) -> Self {
        Self {
            name: name.into(),
            condition,
            severity: Severity::Warning,
            message: None,
        }
    }

    /// Sets the message template.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// An adaptive decision rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy name.
    pub name: String,

    /// Boolean trigger condition.
    pub trigger: Expr,

    /// Action executed when the trigger holds.
    pub action: Action,
}

impl Policy {
    /// Creates a policy.
    pub fn new(name: impl Into<String>, trigger: Expr, action: Action) -> Self {
        Self {
            name: name.into(),
            trigger,
            action,
        }
    }
}

/// Side-effecting policy actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Overwrite the current, uncommitted value of `target`.
    Assign {
        /// Target variable.
        target: String,
        /// New value.
        value: Expr,
    },

    /// Execute nested actions in order.
    Block {
        /// Nested actions.
        actions: Vec<Action>,
    },

    /// Append a structured event to the run's event log.
    EmitEvent {
        /// Event name.
        name: String,
        /// Named argument expressions.
        #[serde(default)]
        args: IndexMap<String, Expr>,
    },
}

impl Action {
    /// `target = value`.
    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Self::Assign {
            target: target.into(),
            value,
        }
    }

    /// Ordered block of actions.
    #[must_use]
    pub fn block(actions: Vec<Action>) -> Self {
        Self::Block { actions }
    }

    /// Event emission.
    pub fn emit<N, I>(name: impl Into<String>, args: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Expr)>,
    {
        Self::EmitEvent {
            name: name.into(),
            args: args.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Block nesting depth; a bare `Assign`/`EmitEvent` has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Assign { .. } | Self::EmitEvent { .. } => 0,
            Self::Block { actions } => 1 + actions.iter().map(Action::depth).max().unwrap_or(0),
        }
    }

    /// Visits this action and every nested action, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Action)) {
        visit(self);
        if let Self::Block { actions } = self {
            for action in actions {
                action.walk(visit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn growth_model() -> Model {
        let mut model = Model::new("growth", 12);
        model.parameters.push(Parameter::literal("current_revenue", 5000.0));
        model.parameters.push(
            Parameter::stochastic(
                "growth_rate",
                Distribution::Normal {
                    mean: 0.08,
                    std_dev: 0.02,
                },
            )
            .with_unit("1/month"),
        );
        model
            .equations
            .push(Equation::initial("revenue", Expr::ident("current_revenue")));
        model.equations.push(Equation::recurrence(
            "revenue",
            Expr::var("revenue") * (Expr::num(1.0) + Expr::ident("growth_rate")),
        ));
        model
    }

    #[test]
    fn test_model_creation() {
        let model = growth_model();
        assert_eq!(model.version, Model::CURRENT_VERSION);
        assert_eq!(model.variables(), vec!["revenue"]);
        assert!(model.is_stochastic());
        assert!(model.has_equation("revenue", EquationKind::Recurrence));
        assert!(!model.has_equation("revenue", EquationKind::Current));
    }

    #[test]
    fn test_equation_derives_dependencies() {
        let eq = Equation::recurrence("cash", Expr::var("cash") - Expr::ident("burn"));
        assert_eq!(eq.dependencies, vec!["burn".to_string(), "cash".to_string()]);
        assert_eq!(eq.context(), "recurrence equation 'cash'");
    }

    #[test]
    fn test_point_value_prefers_estimate() {
        let mut p = Parameter::stochastic("x", Distribution::Uniform { min: 0.0, max: 10.0 });
        assert_eq!(p.point_value(), Value::Number(5.0));

        if let ParameterValue::Distribution { point_estimate, .. } = &mut p.value {
            *point_estimate = Some(7.0);
        }
        assert_eq!(p.point_value(), Value::Number(7.0));
    }

    #[test]
    fn test_action_depth() {
        let leaf = Action::assign("x", Expr::num(1.0));
        assert_eq!(leaf.depth(), 0);
        let nested = Action::block(vec![leaf.clone(), Action::block(vec![leaf])]);
        assert_eq!(nested.depth(), 2);

        let mut count = 0;
        nested.walk(&mut |_| count += 1);
        assert_eq!(count, 4);
    }

    #[test]
    fn test_model_serialization_roundtrip() {
        let model = growth_model();
        let json = serde_json::to_string_pretty(&model).unwrap();
        assert!(json.contains("\"kind\": \"recurrence\""));
        assert!(json.contains("\"family\": \"normal\""));
        let decoded: Model = serde_json::from_str(&json).unwrap();
        assert_eq!(model, decoded);
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let a = growth_model();
        let b = growth_model();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());

        let mut c = growth_model();
        c.horizon = 24;
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
    }

    #[test]
    fn test_event_action_preserves_argument_order() {
        let action = Action::emit(
            "hiring_paused",
            [("revenue", Expr::var("revenue")), ("at", Expr::Time)],
        );
        let Action::EmitEvent { args, .. } = action else {
            panic!("expected EmitEvent");
        };
        assert_eq!(args.keys().collect::<Vec<_>>(), vec!["revenue", "at"]);
    }
}
