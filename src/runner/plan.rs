//! Run-plan construction
//!
//! A plan is a post-order walk of the dependency graph from the target:
//! every prerequisite comes before the recipe that needs it, and a recipe
//! reached through several paths is planned once. Parameters are bound while
//! walking, because dependency arguments may refer to the dependent
//! recipe's parameters.

use crate::config::{DedupPolicy, ParameterKind, Recipe};
use crate::error::{ConfigError, Result, RjustError};
use crate::runner::graph::{check_arity, Graph};
use crate::runner::{Evaluator, Scope};
use std::collections::HashSet;

/// Value bound to a parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoundValue {
    Single(String),
    /// Remaining arguments collected by a `*` or `+` parameter
    Variadic(Vec<String>),
}

impl BoundValue {
    /// Value as interpolated into a line: variadic values joined by spaces
    pub fn joined(&self) -> String {
        match self {
            BoundValue::Single(value) => value.clone(),
            BoundValue::Variadic(values) => values.join(" "),
        }
    }
}

/// A parameter with its bound value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub value: BoundValue,
    /// `$name` parameter
    pub export: bool,
}

/// One planned recipe invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Recipe index in the graph
    pub recipe: usize,
    /// Positional arguments it was invoked with
    pub arguments: Vec<String>,
    pub bindings: Vec<Binding>,
}

impl Step {
    /// Parameter names and values for interpolation
    pub fn scope(&self) -> Scope {
        self.bindings
            .iter()
            .map(|binding| (binding.name.clone(), binding.value.joined()))
            .collect()
    }
}

/// Ordered, deduplicated recipe invocations for one target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunPlan {
    pub steps: Vec<Step>,
}

impl RunPlan {
    /// Recipe names in execution order
    pub fn recipe_names<'g>(&self, graph: &'g Graph) -> Vec<&'g str> {
        self.steps
            .iter()
            .map(|step| graph.recipe(step.recipe).name.as_str())
            .collect()
    }
}

/// Compute the run plan for `target` invoked with `arguments`
pub fn plan(
    graph: &Graph,
    evaluator: &mut Evaluator<'_>,
    policy: DedupPolicy,
    target: &str,
    arguments: &[String],
) -> Result<RunPlan> {
    let index = graph
        .lookup(target)
        .ok_or_else(|| ConfigError::UnknownRecipe(target.to_string()))?;

    let mut planner = Planner {
        graph,
        evaluator,
        policy,
        planned: HashSet::new(),
        planned_with_arguments: HashSet::new(),
        steps: Vec::new(),
    };
    planner.visit(index, arguments)?;

    let plan = RunPlan {
        steps: planner.steps,
    };
    log::debug!("plan for `{}`: {:?}", target, plan.recipe_names(graph));
    Ok(plan)
}

struct Planner<'g, 'e, 'a> {
    graph: &'g Graph,
    evaluator: &'e mut Evaluator<'a>,
    policy: DedupPolicy,
    planned: HashSet<usize>,
    planned_with_arguments: HashSet<(usize, Vec<BoundValue>)>,
    steps: Vec<Step>,
}

impl Planner<'_, '_, '_> {
    fn visit(&mut self, index: usize, arguments: &[String]) -> Result<()> {
        let graph = self.graph;
        let recipe = graph.recipe(index);
        let always = recipe.attributes.always;

        if !always && self.policy == DedupPolicy::Recipe && self.planned.contains(&index) {
            return Ok(());
        }

        let bindings = bind(recipe, arguments, self.evaluator)?;
        let key = (index, bound_values(&bindings));
        if !always
            && self.policy == DedupPolicy::Arguments
            && self.planned_with_arguments.contains(&key)
        {
            return Ok(());
        }

        let scope = Step {
            recipe: index,
            arguments: Vec::new(),
            bindings: bindings.clone(),
        }
        .scope();

        for edge in graph.dependencies(index) {
            let mut values = Vec::with_capacity(edge.arguments.len());
            for argument in &edge.arguments {
                values.push(self.evaluator.evaluate(argument, &scope)?);
            }
            self.visit(edge.prerequisite, &values)?;
        }

        self.planned.insert(index);
        self.planned_with_arguments.insert(key);
        self.steps.push(Step {
            recipe: index,
            arguments: arguments.to_vec(),
            bindings,
        });
        Ok(())
    }
}

/// Dedup key under `set dedup := 'arguments'`: what the parameters are bound
/// to, so a defaulted argument matches the same value passed explicitly
fn bound_values(bindings: &[Binding]) -> Vec<BoundValue> {
    bindings.iter().map(|binding| binding.value.clone()).collect()
}

/// Bind positional `arguments` to a recipe's parameters
///
/// Defaults are evaluated in order, so a default may use earlier parameters.
pub fn bind(
    recipe: &Recipe,
    arguments: &[String],
    evaluator: &mut Evaluator<'_>,
) -> Result<Vec<Binding>> {
    if recipe
        .max_arguments()
        .is_some_and(|max| arguments.len() > max)
    {
        check_arity(recipe, arguments.len())?;
    }

    let mut scope = Scope::new();
    let mut bindings = Vec::with_capacity(recipe.parameters.len());
    let mut rest = arguments;

    for parameter in &recipe.parameters {
        let value = if parameter.kind.is_variadic() {
            if !rest.is_empty() {
                let values = rest.to_vec();
                rest = &[];
                BoundValue::Variadic(values)
            } else if let Some(default) = &parameter.default {
                BoundValue::Variadic(vec![evaluator.evaluate(default, &scope)?])
            } else if parameter.kind == ParameterKind::Plus {
                return Err(missing(recipe, &parameter.name));
            } else {
                BoundValue::Variadic(Vec::new())
            }
        } else if let Some((first, tail)) = rest.split_first() {
            rest = tail;
            BoundValue::Single(first.clone())
        } else if let Some(default) = &parameter.default {
            BoundValue::Single(evaluator.evaluate(default, &scope)?)
        } else {
            return Err(missing(recipe, &parameter.name));
        };

        scope.insert(parameter.name.clone(), value.joined());
        bindings.push(Binding {
            name: parameter.name.clone(),
            value,
            export: parameter.export,
        });
    }

    Ok(bindings)
}

fn missing(recipe: &Recipe, parameter: &str) -> RjustError {
    ConfigError::MissingArgument {
        recipe: recipe.name.clone(),
        parameter: parameter.to_string(),
        location: recipe.location(),
    }
    .into()
}
