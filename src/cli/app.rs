//! Main CLI application

use crate::config::{
    find_recipe_file_from, quote, resolve, validate_namespace, Namespace, Recipe,
};
use crate::error::{ConfigError, RjustError};
use crate::runner::{load_dotenv, Context, Evaluator, Executor, Graph, Verbosity};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use clap_complete::Shell;
use colored::Colorize;
use std::env;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

/// Options parsed from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub justfile: Option<PathBuf>,
    pub working_directory: Option<PathBuf>,
    pub recipe: Option<String>,
    pub arguments: Vec<String>,
    pub list: bool,
    pub dump: bool,
    pub dump_format: String,
    pub evaluate: bool,
    pub dry_run: bool,
    pub verbosity: Verbosity,
    pub color: String,
    pub overrides: Vec<(String, String)>,
    pub completions: Option<Shell>,
}

impl Options {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let overrides: Vec<(String, String)> = matches
            .get_occurrences::<String>("set")
            .map(|occurrences| {
                occurrences
                    .filter_map(|mut values| {
                        let name = values.next()?.clone();
                        let value = values.next()?.clone();
                        Some((name, value))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Options {
            justfile: matches.get_one::<PathBuf>("justfile").cloned(),
            working_directory: matches.get_one::<PathBuf>("working-directory").cloned(),
            recipe: matches.get_one::<String>("recipe").cloned(),
            arguments: matches
                .get_many::<String>("arguments")
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            list: matches.get_flag("list"),
            dump: matches.get_flag("dump"),
            dump_format: matches
                .get_one::<String>("dump-format")
                .cloned()
                .unwrap_or_else(|| "just".to_string()),
            evaluate: matches.get_flag("evaluate"),
            dry_run: matches.get_flag("dry-run"),
            verbosity: get_verbosity(matches),
            color: matches
                .get_one::<String>("color")
                .cloned()
                .unwrap_or_else(|| "auto".to_string()),
            overrides,
            completions: matches.get_one::<Shell>("completions").copied(),
        }
    }
}

/// CLI application over a loaded recipe namespace
pub struct App {
    options: Options,
    namespace: Namespace,
    graph: Graph,
    working_dir: PathBuf,
}

impl App {
    /// Discover, load and validate the recipe file named by `options`
    pub fn load(options: Options) -> Result<Self, RjustError> {
        let invocation_dir = env::current_dir()?;
        let path = match &options.justfile {
            Some(path) => path.clone(),
            None => find_recipe_file_from(match &options.working_directory {
                Some(dir) => invocation_dir.join(dir),
                None => invocation_dir.clone(),
            })?,
        };

        let namespace = resolve(&path)?;
        validate_namespace(&namespace)?;
        let graph = Graph::build(&namespace)?;

        let working_dir = match &options.working_directory {
            Some(dir) => invocation_dir.join(dir),
            None => namespace.root_directory(),
        };

        Ok(App {
            options,
            namespace,
            graph,
            working_dir,
        })
    }

    /// Run whatever the command line asked for
    pub fn run(self) -> Result<(), RjustError> {
        if self.options.list {
            self.list();
            return Ok(());
        }

        if self.options.dump {
            return self.dump();
        }

        let settings = &self.namespace.settings;
        let env = if settings.dotenv_load.unwrap_or(false) {
            load_dotenv(&self.namespace.root_directory().join(".env"))?
        } else {
            Vec::new()
        };

        let ctx = Context::new()
            .with_working_dir(self.working_dir.clone())
            .with_shell(settings.shell.clone())
            .with_env(env)
            .with_dry_run(self.options.dry_run)
            .with_verbosity(self.options.verbosity);

        let mut evaluator = Evaluator::new(&self.namespace.variables, &ctx)
            .with_overrides(self.options.overrides.clone())?;

        if self.options.evaluate {
            let values = evaluator.evaluate_all()?;
            let width = values.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
            for (name, value) in values {
                println!("{:width$} := {}", name, quote(&value), width = width);
            }
            return Ok(());
        }

        let target = match &self.options.recipe {
            Some(recipe) => recipe.clone(),
            None => self
                .namespace
                .default_recipe()
                .map(|recipe| recipe.name.clone())
                .ok_or(ConfigError::NoRecipes)?,
        };

        let mut executor = Executor::new(&self.graph, evaluator, settings.clone());
        let report = executor.run(&target, &self.options.arguments)?;
        log::debug!(
            "ran {} command(s) across {:?}",
            report.commands_run,
            report.recipes
        );

        Ok(())
    }

    /// Print public recipes with their parameters and docs
    fn list(&self) {
        let recipes: Vec<(usize, &Recipe)> = self
            .graph
            .recipes()
            .iter()
            .enumerate()
            .filter(|(_, recipe)| is_public(recipe))
            .collect();

        let signatures: Vec<String> = recipes.iter().map(|(_, r)| r.signature()).collect();
        let width = signatures.iter().map(String::len).max().unwrap_or(0);

        println!("Available recipes:");
        for ((index, recipe), signature) in recipes.iter().zip(&signatures) {
            let mut line = format!("    {}", signature);
            let aliases = self.graph.aliases_of(*index);

            if recipe.doc.is_some() || !aliases.is_empty() {
                line.push_str(&" ".repeat(width - signature.len()));
            }
            if let Some(doc) = &recipe.doc {
                line.push_str(&format!(" {}", format!("# {}", doc).blue()));
            }
            if !aliases.is_empty() {
                line.push_str(&format!(" [alias: {}]", aliases.join(", ")));
            }
            println!("{}", line);
        }
    }

    /// Print the merged namespace
    fn dump(&self) -> Result<(), RjustError> {
        let document = self.namespace.to_document();
        if self.options.dump_format == "yaml" {
            print!("{}", serde_yaml::to_string(&document)?);
        } else {
            print!("{}", document);
        }
        Ok(())
    }
}

fn is_public(recipe: &Recipe) -> bool {
    !recipe.attributes.private && !recipe.name.starts_with('_')
}

/// Build the clap command
pub fn build_command() -> Command {
    Command::new("rjust")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run recipes from a justfile")
        .arg(
            Arg::new("justfile")
                .short('f')
                .long("justfile")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Use FILE as the recipe file"),
        )
        .arg(
            Arg::new("working-directory")
                .short('d')
                .long("working-directory")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Run recipes in DIR"),
        )
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .help("List available recipes")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dump")
                .long("dump")
                .help("Print the recipe file with all imports merged")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dump-format")
                .long("dump-format")
                .value_name("FORMAT")
                .value_parser(["just", "yaml"])
                .default_value("just")
                .help("Format used by --dump"),
        )
        .arg(
            Arg::new("evaluate")
                .long("evaluate")
                .help("Evaluate and print all variables")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .short('n')
                .long("dry-run")
                .help("Print recipe lines without running them")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Do not echo recipe lines")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output besides what recipes print")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("color")
                .long("color")
                .value_name("WHEN")
                .value_parser(["auto", "always", "never"])
                .default_value("auto")
                .help("Colorize output"),
        )
        .arg(
            Arg::new("set")
                .long("set")
                .num_args(2)
                .value_names(["NAME", "VALUE"])
                .action(ArgAction::Append)
                .help("Override a variable with a value"),
        )
        .arg(
            Arg::new("completions")
                .long("completions")
                .value_name("SHELL")
                .value_parser(value_parser!(Shell))
                .help("Print a completion script for SHELL"),
        )
        .arg(Arg::new("recipe").value_name("RECIPE").help("Recipe to run"))
        .arg(
            Arg::new("arguments")
                .value_name("ARGS")
                .num_args(1..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true)
                .help("Arguments passed to the recipe"),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

fn set_color(when: &str) {
    match when {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::unset_override(),
    }
}

/// Run the CLI application with the process arguments
pub fn run() -> Result<(), RjustError> {
    run_from(env::args_os())
}

/// Run the CLI application with provided arguments
pub fn run_from<I, T>(args: I) -> Result<(), RjustError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command().get_matches_from(args);
    let options = Options::from_matches(&matches);
    set_color(&options.color);

    if let Some(shell) = options.completions {
        clap_complete::generate(shell, &mut build_command(), "rjust", &mut io::stdout());
        return Ok(());
    }

    App::load(options)?.run()
}
