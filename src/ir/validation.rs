//! IR validation.
//!
//! The compiler hands over well-typed IR, but a deserialized model is still
//! checked structurally before any timestep runs: names, duplicate
//! definitions, reference resolution, stdlib availability, action nesting and
//! distribution parameters. The first defect found is returned.

use std::collections::HashSet;

use crate::error::InvalidIrError;
use crate::stdlib::FunctionRegistry;

use super::expr::Expr;
use super::kinds::EquationKind;
use super::model::{Action, Model, ParameterValue};

/// Default maximum nesting depth of policy action blocks.
pub const DEFAULT_MAX_BLOCK_DEPTH: usize = 16;

fn validate_name(kind: &'static str, name: &str) -> Result<(), InvalidIrError> {
    if name.trim().is_empty() {
        return Err(InvalidIrError::EmptyName { kind });
    }
    Ok(())
}

fn validate_unique<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), InvalidIrError> {
    let mut seen = HashSet::new();
    for name in names {
        validate_name(kind, name)?;
        if !seen.insert(name) {
            return Err(InvalidIrError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Names visible to expressions, split by namespace.
struct Scope<'a> {
    parameters: HashSet<&'a str>,
    scalars: HashSet<&'a str>,
    variables: HashSet<&'a str>,
}

impl Scope<'_> {
    fn is_known(&self, name: &str) -> bool {
        self.parameters.contains(name) || self.scalars.contains(name) || self.variables.contains(name)
    }

    fn check_expr(
        &self,
        context: &str,
        expr: &Expr,
        functions: &dyn FunctionRegistry,
    ) -> Result<(), InvalidIrError> {
        let mut result = Ok(());
        expr.walk(&mut |node| {
            if result.is_err() {
                return;
            }
            result = match node {
                Expr::Ident { name } if !self.is_known(name) => {
                    Err(InvalidIrError::UnknownIdentifier {
                        context: context.to_string(),
                        name: name.clone(),
                    })
                }
                Expr::Var { name, .. } if !self.variables.contains(name.as_str()) => {
                    if self.is_known(name) {
                        Err(InvalidIrError::NotAVariable {
                            context: context.to_string(),
                            name: name.clone(),
                        })
                    } else {
                        Err(InvalidIrError::UnknownIdentifier {
                            context: context.to_string(),
                            name: name.clone(),
                        })
                    }
                }
                Expr::Call { function, .. } if !functions.contains(function) => {
                    Err(InvalidIrError::UnknownFunction {
                        context: context.to_string(),
                        function: function.clone(),
                    })
                }
                _ => Ok(()),
            };
        });
        result
    }
}

impl Model {
    /// Validates the model against a function registry using the default
    /// block-depth limit.
    pub fn validate(&self, functions: &dyn FunctionRegistry) -> Result<(), InvalidIrError> {
        self.validate_with(functions, DEFAULT_MAX_BLOCK_DEPTH)
    }

    /// Validates the model against a function registry.
    pub fn validate_with(
        &self,
        functions: &dyn FunctionRegistry,
        max_block_depth: usize,
    ) -> Result<(), InvalidIrError> {
        if self.name.trim().is_empty() {
            return Err(InvalidIrError::EmptyModelName);
        }
        if self.horizon == 0 {
            return Err(InvalidIrError::ZeroHorizon);
        }

        validate_unique("parameter", self.parameters.iter().map(|p| p.name.as_str()))?;
        validate_unique("constraint", self.constraints.iter().map(|c| c.name.as_str()))?;
        validate_unique("policy", self.policies.iter().map(|p| p.name.as_str()))?;

        for param in &self.parameters {
            if let ParameterValue::Distribution { distribution, .. } = &param.value {
                distribution
                    .validate()
                    .map_err(|reason| InvalidIrError::InvalidDistribution {
                        parameter: param.name.clone(),
                        reason,
                    })?;
            }
        }

        let scope = self.validate_equations()?;

        for eq in &self.equations {
            let context = eq.context();
            scope.check_expr(&context, &eq.expr, functions)?;
            for dep in &eq.dependencies {
                if !scope.is_known(dep) {
                    return Err(InvalidIrError::UnknownIdentifier {
                        context,
                        name: dep.clone(),
                    });
                }
            }
            if eq.kind == EquationKind::Initial {
                let mut lagged = None;
                eq.expr.walk(&mut |node| {
                    if let Expr::Var { name, lag } = node {
                        if *lag > 0 && lagged.is_none() {
                            lagged = Some(name.clone());
                        }
                    }
                });
                if let Some(name) = lagged {
                    return Err(InvalidIrError::LaggedInitialReference {
                        variable: eq.variable.clone(),
                        name,
                    });
                }
            }
        }

        for constraint in &self.constraints {
            let context = format!("constraint '{}'", constraint.name);
            scope.check_expr(&context, &constraint.condition, functions)?;
        }

        for policy in &self.policies {
            let context = format!("policy '{}'", policy.name);
            scope.check_expr(&context, &policy.trigger, functions)?;

            if policy.action.depth() > max_block_depth {
                return Err(InvalidIrError::BlockTooDeep {
                    policy: policy.name.clone(),
                    max_depth: max_block_depth,
                });
            }

            let mut result = Ok(());
            policy.action.walk(&mut |action| {
                if result.is_err() {
                    return;
                }
                result = match action {
                    Action::Assign { target, value } => {
                        if scope.variables.contains(target.as_str()) {
                            scope.check_expr(&context, value, functions)
                        } else {
                            Err(InvalidIrError::InvalidAssignTarget {
                                policy: policy.name.clone(),
                                target: target.clone(),
                            })
                        }
                    }
                    Action::EmitEvent { name, args } => validate_name("event", name).and_then(|()| {
                        args.values()
                            .try_for_each(|arg| scope.check_expr(&context, arg, functions))
                    }),
                    Action::Block { .. } => Ok(()),
                };
            });
            result?;
        }

        Ok(())
    }

    /// Checks equation targets and builds the reference scope.
    fn validate_equations(&self) -> Result<Scope<'_>, InvalidIrError> {
        let parameters: HashSet<&str> = self.parameters.iter().map(|p| p.name.as_str()).collect();
        let mut defined: HashSet<(&str, EquationKind)> = HashSet::new();
        let mut scalars = HashSet::new();
        let mut variables = HashSet::new();

        for eq in &self.equations {
            validate_name("variable", &eq.variable)?;
            let name = eq.variable.as_str();
            if parameters.contains(name) {
                return Err(InvalidIrError::NameCollision {
                    name: name.to_string(),
                });
            }
            if !defined.insert((name, eq.kind)) {
                return Err(InvalidIrError::DuplicateEquation {
                    variable: name.to_string(),
                    kind: eq.kind.as_str(),
                });
            }
            if eq.kind.is_time_indexed() {
                variables.insert(name);
            } else {
                scalars.insert(name);
            }
        }

        if let Some(eq) = self.equations.iter().find(|eq| {
            eq.kind == EquationKind::Recurrence
                && !defined.contains(&(eq.variable.as_str(), EquationKind::Initial))
                && !defined.contains(&(eq.variable.as_str(), EquationKind::Current))
        }) {
            return Err(InvalidIrError::MissingStartingValue {
                variable: eq.variable.clone(),
            });
        }

        if let Some(name) = scalars.intersection(&variables).next() {
            return Err(InvalidIrError::DuplicateEquation {
                variable: (*name).to_string(),
                kind: EquationKind::Scalar.as_str(),
            });
        }

        Ok(Scope {
            parameters,
            scalars,
            variables,
        })
    }
}
