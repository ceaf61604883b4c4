//! Fluent construction of models.
//!
//! The compiler normally hands the engine a JSON document; the builder is the
//! programmatic route used by embedders and tests.

use crate::error::InvalidIrError;
use crate::stdlib::{FunctionRegistry, StdLib};

use super::distribution::Distribution;
use super::expr::Expr;
use super::model::{
    Action, Constraint, CorrelationPartner, CorrelationSpec, Equation, Model, Parameter,
    ParameterValue, Policy,
};

/// Builder for [`Model`].
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    model: Model,
}

impl ModelBuilder {
    /// Start a model with a name and horizon.
    #[must_use]
    pub fn new(name: impl Into<String>, horizon: usize) -> Self {
        Self {
            model: Model::new(name, horizon),
        }
    }

    /// Add a literal parameter.
    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.model.parameters.push(Parameter::literal(name, value));
        self
    }

    /// Add a distribution-valued parameter.
    #[must_use]
    pub fn stochastic(mut self, name: impl Into<String>, distribution: Distribution) -> Self {
        self.model
            .parameters
            .push(Parameter::stochastic(name, distribution));
        self
    }

    /// Add a fully specified parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.model.parameters.push(parameter);
        self
    }

    /// Set the deterministic-mode value of the most recently added stochastic parameter.
    #[must_use]
    pub fn point_estimate(mut self, value: f64) -> Self {
        if let Some(Parameter {
            value: ParameterValue::Distribution { point_estimate, .. },
            ..
        }) = self.model.parameters.last_mut()
        {
            *point_estimate = Some(value);
        }
        self
    }

    /// Declare an inline correlation partner on the most recently added stochastic parameter.
    #[must_use]
    pub fn correlated_with(mut self, partner: impl Into<String>, coefficient: f64) -> Self {
        if let Some(Parameter {
            value: ParameterValue::Distribution { correlated_with, .. },
            ..
        }) = self.model.parameters.last_mut()
        {
            correlated_with.push(CorrelationPartner {
                parameter: partner.into(),
                coefficient,
            });
        }
        self
    }

    /// Declare a model-level correlation.
    #[must_use]
    pub fn correlation(mut self, a: impl Into<String>, b: impl Into<String>, coefficient: f64) -> Self {
        self.model.correlations.push(CorrelationSpec {
            a: a.into(),
            b: b.into(),
            coefficient,
        });
        self
    }

    /// `variable[0] = expr`.
    #[must_use]
    pub fn initial(mut self, variable: impl Into<String>, expr: Expr) -> Self {
        self.model.equations.push(Equation::initial(variable, expr));
        self
    }

    /// `variable[t] = expr`.
    #[must_use]
    pub fn current(mut self, variable: impl Into<String>, expr: Expr) -> Self {
        self.model.equations.push(Equation::current(variable, expr));
        self
    }

    /// `variable[t + 1] = expr`.
    #[must_use]
    pub fn recurrence(mut self, variable: impl Into<String>, expr: Expr) -> Self {
        self.model
            .equations
            .push(Equation::recurrence(variable, expr));
        self
    }

    /// `name = expr`, evaluated once per run.
    #[must_use]
    pub fn scalar(mut self, name: impl Into<String>, expr: Expr) -> Self {
        self.model.equations.push(Equation::scalar(name, expr));
        self
    }

    /// Add a constraint.
    #[must_use]
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.model.constraints.push(constraint);
        self
    }

    /// Add a policy.
    #[must_use]
    pub fn policy(mut self, name: impl Into<String>, trigger: Expr, action: Action) -> Self {
        self.model.policies.push(Policy::new(name, trigger, action));
        self
    }

    /// Build and validate against the built-in stdlib.
    pub fn build(self) -> Result<Model, InvalidIrError> {
        self.build_with(&StdLib::new())
    }

    /// Build and validate against a custom registry.
    pub fn build_with(self, functions: &dyn FunctionRegistry) -> Result<Model, InvalidIrError> {
        self.model.validate(functions)?;
        Ok(self.model)
    }

    /// Build without validation.
    #[must_use]
    pub fn build_unchecked(self) -> Model {
        self.model
    }
}
