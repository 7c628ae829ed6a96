//! Namespace validation
//!
//! Checks that every name referenced by an expression is a variable or an
//! in-scope parameter.

use crate::config::import::Namespace;
use crate::config::types::{Expression, Fragment, Recipe};
use crate::error::{ConfigError, ConfigResult};
use std::collections::HashSet;

/// Validate a merged namespace
pub fn validate_namespace(namespace: &Namespace) -> ConfigResult<()> {
    let variables: HashSet<&str> = namespace.variables.keys().map(String::as_str).collect();

    for variable in namespace.variables.values() {
        check_references(&variable.expression, &variables, &HashSet::new(), || {
            format!("variable '{}'", variable.name)
        })?;
    }

    for recipe in namespace.recipes.values() {
        validate_recipe(recipe, &variables)?;
    }

    Ok(())
}

/// Validate the expressions of a single recipe
pub fn validate_recipe(recipe: &Recipe, variables: &HashSet<&str>) -> ConfigResult<()> {
    // A default may only see the parameters before it
    let mut parameters = HashSet::new();
    for parameter in &recipe.parameters {
        if let Some(default) = &parameter.default {
            check_references(default, variables, &parameters, || {
                format!(
                    "default of parameter '{}' of recipe '{}'",
                    parameter.name, recipe.name
                )
            })?;
        }
        parameters.insert(parameter.name.as_str());
    }

    for dependency in &recipe.dependencies {
        for argument in &dependency.arguments {
            check_references(argument, variables, &parameters, || {
                format!(
                    "argument to dependency '{}' of recipe '{}'",
                    dependency.recipe, recipe.name
                )
            })?;
        }
    }

    for line in &recipe.body {
        for fragment in &line.fragments {
            if let Fragment::Interpolation(expression) = fragment {
                check_references(expression, variables, &parameters, || {
                    format!("recipe '{}' line {}", recipe.name, line.number)
                })?;
            }
        }
    }

    Ok(())
}

fn check_references(
    expression: &Expression,
    variables: &HashSet<&str>,
    parameters: &HashSet<&str>,
    context: impl Fn() -> String,
) -> ConfigResult<()> {
    for name in expression.references() {
        if !variables.contains(name) && !parameters.contains(name) {
            return Err(ConfigError::UndefinedReference {
                name: name.to_string(),
                context: context(),
            });
        }
    }
    Ok(())
}
