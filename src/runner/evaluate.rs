//! Variable evaluation
//!
//! Variables are evaluated lazily, on first reference, and memoized for the
//! rest of the invocation. Each entry moves through
//! unresolved -> resolving -> resolved | failed; meeting an entry that is
//! still resolving means the definitions are circular.
//!
//! A backtick assigned to a variable therefore runs at most once per
//! invocation, however often (and from however many imported files) the
//! variable is referenced, and never if nothing references it.

use crate::config::{Expression, Function, Variable};
use crate::error::{ConfigError, ConfigResult, EvaluationError, EvaluationResult};
use crate::runner::{command, Context};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Names bound in addition to variables, i.e. recipe parameters
pub type Scope = HashMap<String, String>;

/// Resolution state of a variable that has been referenced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolving,
    Resolved(String),
    Failed(EvaluationError),
}

/// Lazy, memoizing evaluator over a namespace's variables
pub struct Evaluator<'a> {
    variables: &'a IndexMap<String, Variable>,
    context: &'a Context,
    overrides: HashMap<String, String>,
    states: HashMap<String, Resolution>,
    /// Variables currently being resolved, innermost last
    resolving: Vec<String>,
}

impl<'a> Evaluator<'a> {
    pub fn new(variables: &'a IndexMap<String, Variable>, context: &'a Context) -> Self {
        Evaluator {
            variables,
            context,
            overrides: HashMap::new(),
            states: HashMap::new(),
            resolving: Vec::new(),
        }
    }

    /// Replace variable values with literals given on the command line
    pub fn with_overrides(mut self, overrides: Vec<(String, String)>) -> ConfigResult<Self> {
        for (name, value) in overrides {
            if !self.variables.contains_key(&name) {
                return Err(ConfigError::UnknownOverride(name));
            }
            self.overrides.insert(name, value);
        }
        Ok(self)
    }

    pub fn context(&self) -> &'a Context {
        self.context
    }

    /// Resolution state of `name`; `None` while unresolved
    pub fn state(&self, name: &str) -> Option<&Resolution> {
        self.states.get(name)
    }

    /// Value of the variable `name`, evaluating it on first use
    pub fn variable(&mut self, name: &str) -> EvaluationResult<String> {
        if let Some(value) = self.overrides.get(name) {
            return Ok(value.clone());
        }

        match self.states.get(name) {
            Some(Resolution::Resolved(value)) => return Ok(value.clone()),
            Some(Resolution::Failed(error)) => return Err(error.clone()),
            Some(Resolution::Resolving) => {
                let start = self
                    .resolving
                    .iter()
                    .position(|n| n == name)
                    .unwrap_or_default();
                let mut cycle = self.resolving[start..].to_vec();
                cycle.push(name.to_string());
                return Err(EvaluationError::CircularVariable(cycle));
            }
            None => {}
        }

        let variables = self.variables;
        let variable = variables
            .get(name)
            .ok_or_else(|| EvaluationError::UndefinedVariable(name.to_string()))?;

        log::debug!("evaluating variable `{}`", name);
        self.states.insert(name.to_string(), Resolution::Resolving);
        self.resolving.push(name.to_string());

        let result = self.evaluate(&variable.expression, &Scope::new());

        self.resolving.pop();
        let state = match &result {
            Ok(value) => Resolution::Resolved(value.clone()),
            Err(error) => Resolution::Failed(error.clone()),
        };
        self.states.insert(name.to_string(), state);

        result
    }

    /// Evaluate an expression; names in `scope` shadow variables
    pub fn evaluate(&mut self, expression: &Expression, scope: &Scope) -> EvaluationResult<String> {
        match expression {
            Expression::Literal(text) => Ok(text.clone()),
            Expression::Variable(name) => match scope.get(name) {
                Some(value) => Ok(value.clone()),
                None => self.variable(name),
            },
            Expression::Backtick(cmd) => {
                log::debug!("running backtick `{}`", cmd);
                command::capture(self.context, cmd)
            }
            Expression::Call {
                function,
                arguments,
            } => {
                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument, scope)?);
                }
                self.call(*function, values)
            }
            Expression::Concat(lhs, rhs) => {
                let mut value = self.evaluate(lhs, scope)?;
                value.push_str(&self.evaluate(rhs, scope)?);
                Ok(value)
            }
        }
    }

    fn call(&self, function: Function, arguments: Vec<String>) -> EvaluationResult<String> {
        let mut arguments = arguments.into_iter();
        let mut argument = || arguments.next().unwrap_or_default();

        match function {
            Function::EnvVar => {
                let name = argument();
                self.context
                    .env_var(&name)
                    .ok_or(EvaluationError::EnvironmentVariable(name))
            }
            Function::EnvVarOrDefault => {
                let name = argument();
                let default = argument();
                Ok(self.context.env_var(&name).unwrap_or(default))
            }
            Function::InvocationDirectory => {
                Ok(self.context.invocation_dir.display().to_string())
            }
            Function::Os => Ok(std::env::consts::OS.to_string()),
            Function::Arch => Ok(std::env::consts::ARCH.to_string()),
        }
    }

    /// Evaluate every variable, in definition order
    pub fn evaluate_all(&mut self) -> EvaluationResult<Vec<(String, String)>> {
        let variables = self.variables;
        variables
            .keys()
            .map(|name| Ok((name.clone(), self.variable(name)?)))
            .collect()
    }

    /// Name and value of each variable exported to recipe lines
    pub fn exports(&mut self, export_all: bool) -> EvaluationResult<Vec<(String, String)>> {
        let variables = self.variables;
        variables
            .values()
            .filter(|variable| export_all || variable.export)
            .map(|variable| Ok((variable.name.clone(), self.variable(&variable.name)?)))
            .collect()
    }
}
