//! Error types for rjust

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code used for configuration and evaluation errors (sysexits `EX_CONFIG`)
pub const CONFIGURATION_EXIT_CODE: i32 = 78;

/// Result type alias for rjust operations
pub type Result<T> = std::result::Result<T, RjustError>;

/// Main error type for rjust
#[derive(Error, Debug)]
pub enum RjustError {
    /// Recipe file, import, graph and argument binding errors
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Variable and expression evaluation errors
    #[error("{0}")]
    Evaluation(#[from] EvaluationError),

    /// Recipe line execution errors
    #[error("{0}")]
    Execution(#[from] ExecutionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML serialization errors (`--dump-format yaml`)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RjustError {
    /// Process exit code for this error
    ///
    /// Configuration and evaluation errors use a distinguished code so that they
    /// can be told apart from a failing recipe line, which propagates its own code.
    pub fn exit_code(&self) -> i32 {
        match self {
            RjustError::Execution(ExecutionError::CommandFailed { code, .. }) => code.unwrap_or(1),
            RjustError::Execution(ExecutionError::Spawn { .. }) => 1,
            RjustError::Io(_) => 1,
            RjustError::Config(_) | RjustError::Evaluation(_) | RjustError::Yaml(_) => {
                CONFIGURATION_EXIT_CODE
            }
        }
    }
}

/// A grammar violation, located in its file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub path: Option<PathBuf>,
    /// 1-based line number
    pub line: usize,
    /// 1-based column number
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        SyntaxError {
            path: None,
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(
                f,
                "{}:{}:{}: {}",
                path.display(),
                self.line,
                self.column,
                self.message
            ),
            None => write!(f, "line {}:{}: {}", self.line, self.column, self.message),
        }
    }
}

impl std::error::Error for SyntaxError {}

/// Configuration errors, all detected before any recipe line runs
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No recipe file found (searched: {0})")]
    NotFound(String),

    #[error("Syntax error at {0}")]
    Syntax(#[from] SyntaxError),

    #[error("Failed to read '{path}': {error}")]
    Read { path: PathBuf, error: String },

    #[error("Import '{path}' not found (imported from {importer})")]
    ImportNotFound { path: PathBuf, importer: PathBuf },

    #[error("Import cycle detected: {}", display_paths(.0))]
    ImportCycle(Vec<PathBuf>),

    #[error("Recipe '{name}' is defined in both {first} and {second}")]
    DuplicateRecipe {
        name: String,
        first: String,
        second: String,
    },

    #[error("Variable '{name}' is defined in both {first} and {second}")]
    DuplicateVariable {
        name: String,
        first: String,
        second: String,
    },

    #[error("Alias '{name}' is defined in both {first} and {second}")]
    DuplicateAlias {
        name: String,
        first: String,
        second: String,
    },

    #[error("Setting '{0}' is set in more than one file")]
    DuplicateSetting(String),

    #[error("Recipe '{0}' is not defined")]
    UnknownRecipe(String),

    #[error("Recipe '{recipe}' ({location}) depends on unknown recipe '{dependency}'")]
    UnknownDependency {
        recipe: String,
        dependency: String,
        location: String,
    },

    #[error("Alias '{alias}' refers to unknown recipe '{target}'")]
    UnknownAliasTarget { alias: String, target: String },

    #[error("Circular dependency detected: {} ({location})", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String>, location: String },

    #[error("Variable '{name}' referenced by {context} is not defined")]
    UndefinedReference { name: String, context: String },

    #[error("Recipe '{recipe}' ({location}) requires argument '{parameter}'")]
    MissingArgument {
        recipe: String,
        parameter: String,
        location: String,
    },

    #[error("Recipe '{recipe}' ({location}) takes {expected} argument(s) but got {found}")]
    Arity {
        recipe: String,
        expected: String,
        found: usize,
        location: String,
    },

    #[error("Cannot override undefined variable '{0}'")]
    UnknownOverride(String),

    #[error("Recipe file defines no recipes")]
    NoRecipes,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Variable and expression evaluation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("Circular variable reference: {}", .0.join(" -> "))]
    CircularVariable(Vec<String>),

    #[error("Variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("Backtick `{command}` failed with exit code {code:?}")]
    ShellFailed { command: String, code: Option<i32> },

    #[error("Backtick `{command}` could not be started: {error}")]
    ShellSpawn { command: String, error: String },

    #[error("Backtick `{command}` produced output that is not UTF-8")]
    ShellOutput { command: String },

    #[error("Environment variable '{0}' is not set")]
    EnvironmentVariable(String),

    #[error("Recipe '{recipe}' line {line} (`{text}`): {source}")]
    InLine {
        recipe: String,
        line: usize,
        text: String,
        source: Box<EvaluationError>,
    },
}

/// Recipe line execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Recipe '{recipe}' failed at {file}:{line} with exit code {code:?}")]
    CommandFailed {
        recipe: String,
        file: String,
        line: usize,
        code: Option<i32>,
    },

    #[error("Recipe '{recipe}' could not start its shell: {error}")]
    Spawn { recipe: String, error: String },
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for evaluation operations
pub type EvaluationResult<T> = std::result::Result<T, EvaluationError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
