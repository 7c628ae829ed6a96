//! Recipe execution
//!
//! An invocation moves through
//! `Planning -> Interpolating -> Invoking -> Completed | Failed`.
//! Every line of every planned recipe is interpolated before the first one
//! runs.

use crate::config::{Fragment, Line, Recipe, Settings};
use crate::error::{EvaluationError, EvaluationResult, ExecutionError, Result};
use crate::runner::{command, plan, Evaluator, Graph, RunPlan, Scope};
use std::fmt;
use std::path::PathBuf;

/// Where an invocation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Planning,
    Interpolating,
    Invoking,
    Completed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Planning => "planning",
            RunState::Interpolating => "interpolating",
            RunState::Invoking => "invoking",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A line that exited non-zero without stopping the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToleratedFailure {
    pub recipe: String,
    pub line: usize,
    pub code: Option<i32>,
}

impl fmt::Display for ToleratedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(
                f,
                "recipe '{}' line {} exited with code {}",
                self.recipe, self.line, code
            ),
            None => write!(
                f,
                "recipe '{}' line {} was terminated by a signal",
                self.recipe, self.line
            ),
        }
    }
}

/// Outcome of a completed invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub state: RunState,
    /// Planned recipes, in execution order
    pub recipes: Vec<String>,
    /// Lines handed to the shell (zero in dry-run mode)
    pub commands_run: usize,
    pub tolerated: Vec<ToleratedFailure>,
}

/// A body line ready to run
#[derive(Debug, Clone)]
struct PreparedLine {
    number: usize,
    command: String,
    echo: bool,
    tolerate_failure: bool,
}

/// A planned recipe with all of its lines interpolated
#[derive(Debug, Clone)]
struct PreparedStep {
    recipe: String,
    /// File the recipe is defined in
    file: String,
    dir: PathBuf,
    env: Vec<(String, String)>,
    lines: Vec<PreparedLine>,
}

/// Runs a target recipe and its prerequisites
pub struct Executor<'g, 'a> {
    graph: &'g Graph,
    evaluator: Evaluator<'a>,
    settings: Settings,
    state: RunState,
}

impl<'g, 'a> Executor<'g, 'a> {
    pub fn new(graph: &'g Graph, evaluator: Evaluator<'a>, settings: Settings) -> Self {
        Executor {
            graph,
            evaluator,
            settings,
            state: RunState::Planning,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run `target` with positional `arguments`
    pub fn run(&mut self, target: &str, arguments: &[String]) -> Result<Report> {
        self.transition(RunState::Planning);
        let mut tolerated = Vec::new();

        match self.run_plan(target, arguments, &mut tolerated) {
            Ok((plan, commands_run)) => {
                self.transition(RunState::Completed);
                self.print_tolerated(&tolerated);
                Ok(Report {
                    state: self.state,
                    recipes: plan
                        .recipe_names(self.graph)
                        .into_iter()
                        .map(String::from)
                        .collect(),
                    commands_run,
                    tolerated,
                })
            }
            Err(error) => {
                self.transition(RunState::Failed);
                self.print_tolerated(&tolerated);
                Err(error)
            }
        }
    }

    fn run_plan(
        &mut self,
        target: &str,
        arguments: &[String],
        tolerated: &mut Vec<ToleratedFailure>,
    ) -> Result<(RunPlan, usize)> {
        let policy = self.settings.dedup.unwrap_or_default();
        let plan = plan(self.graph, &mut self.evaluator, policy, target, arguments)?;

        self.transition(RunState::Interpolating);
        let prepared = self.prepare(&plan)?;

        self.transition(RunState::Invoking);
        let mut commands_run = 0;
        for step in &prepared {
            commands_run += self.invoke(step, tolerated)?;
        }

        Ok((plan, commands_run))
    }

    fn transition(&mut self, state: RunState) {
        log::debug!("executor: {} -> {}", self.state, state);
        self.state = state;
    }

    /// Interpolate every line of every step
    fn prepare(&mut self, plan: &RunPlan) -> Result<Vec<PreparedStep>> {
        let export_all = self.settings.export.unwrap_or(false);
        let exports = self.evaluator.exports(export_all)?;
        let working_dir = self.evaluator.context().working_dir.clone();
        let graph = self.graph;

        let mut prepared = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            let recipe = graph.recipe(step.recipe);
            let scope = step.scope();

            let mut env = exports.clone();
            env.extend(
                step.bindings
                    .iter()
                    .filter(|binding| export_all || binding.export)
                    .map(|binding| (binding.name.clone(), binding.value.joined())),
            );

            let dir = match &recipe.attributes.working_directory {
                Some(dir) => working_dir.join(dir),
                None => working_dir.clone(),
            };

            let mut lines = Vec::with_capacity(recipe.body.len());
            for line in &recipe.body {
                let command = self.interpolate(recipe, line, &scope)?;
                if command.trim().is_empty() {
                    continue;
                }
                lines.push(PreparedLine {
                    number: line.number,
                    command,
                    echo: !(recipe.attributes.silent ^ line.echo_inverted),
                    tolerate_failure: line.tolerate_failure
                        || recipe.attributes.no_exit_on_error,
                });
            }

            prepared.push(PreparedStep {
                recipe: recipe.name.clone(),
                file: recipe.origin(),
                dir,
                env,
                lines,
            });
        }
        Ok(prepared)
    }

    fn interpolate(&mut self, recipe: &Recipe, line: &Line, scope: &Scope) -> EvaluationResult<String> {
        let mut command = String::new();
        for fragment in &line.fragments {
            match fragment {
                Fragment::Text(text) => command.push_str(text),
                Fragment::Interpolation(expression) => {
                    let value = self.evaluator.evaluate(expression, scope).map_err(|source| {
                        EvaluationError::InLine {
                            recipe: recipe.name.clone(),
                            line: line.number,
                            text: line.to_string(),
                            source: Box::new(source),
                        }
                    })?;
                    command.push_str(&value);
                }
            }
        }
        Ok(command)
    }

    /// Run one step's lines in order; returns how many reached the shell
    fn invoke(&self, step: &PreparedStep, tolerated: &mut Vec<ToleratedFailure>) -> Result<usize> {
        let ctx = self.evaluator.context();
        ctx.print_recipe_start(&step.recipe);

        if ctx.dry_run {
            for line in &step.lines {
                ctx.print_dry_run(&line.command);
            }
            return Ok(0);
        }

        let mut commands_run = 0;
        for line in &step.lines {
            if line.echo {
                ctx.print_command(&line.command);
            }
            log::debug!("running `{}` in {}", line.command, step.dir.display());

            let status = command::run_line(ctx, &line.command, &step.dir, &step.env).map_err(
                |e| ExecutionError::Spawn {
                    recipe: step.recipe.clone(),
                    error: e.to_string(),
                },
            )?;
            commands_run += 1;

            if status.success() {
                continue;
            }

            if line.tolerate_failure {
                let failure = ToleratedFailure {
                    recipe: step.recipe.clone(),
                    line: line.number,
                    code: status.code(),
                };
                ctx.print_warning(&format!("{} (ignored)", failure));
                tolerated.push(failure);
                continue;
            }

            return Err(ExecutionError::CommandFailed {
                recipe: step.recipe.clone(),
                file: step.file.clone(),
                line: line.number,
                code: status.code(),
            }
            .into());
        }
        Ok(commands_run)
    }

    fn print_tolerated(&self, tolerated: &[ToleratedFailure]) {
        if tolerated.is_empty() {
            return;
        }
        let ctx = self.evaluator.context();
        ctx.print_warning(&format!(
            "{} failed command(s) were tolerated:",
            tolerated.len()
        ));
        for failure in tolerated {
            ctx.print_warning(&format!("  {}", failure));
        }
    }
}
