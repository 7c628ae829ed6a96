//! Execution context for recipe running
//!
//! The context carries everything an invocation needs besides the recipes
//! themselves: where to run, which shell, extra environment and verbosity.

use crate::error::{ConfigError, ConfigResult};
use colored::Colorize;
use std::env;
use std::path::{Path, PathBuf};

/// Default command interpreter
pub const DEFAULT_SHELL: &[&str] = &["sh", "-cu"];

/// Execution context shared by the evaluator and the executor
#[derive(Debug, Clone)]
pub struct Context {
    /// Directory recipe lines run in (the root recipe file's directory by default)
    pub working_dir: PathBuf,

    /// Directory rjust was started from
    pub invocation_dir: PathBuf,

    /// Command interpreter, e.g. `["bash", "-c"]`
    pub shell: Vec<String>,

    /// Extra environment for recipe lines and backticks (from `.env`)
    pub env: Vec<(String, String)>,

    /// Print lines instead of running them
    pub dry_run: bool,

    /// Verbosity level
    pub verbosity: Verbosity,
}

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    Normal = 2,
    Verbose = 3,
}

impl Context {
    /// Create a new context with default settings
    pub fn new() -> Self {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Context {
            working_dir: cwd.clone(),
            invocation_dir: cwd,
            shell: DEFAULT_SHELL.iter().map(|s| s.to_string()).collect(),
            env: Vec::new(),
            dry_run: false,
            verbosity: Verbosity::Normal,
        }
    }

    /// Create a context with a specific working directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    /// Set the shell; `None` keeps the default
    pub fn with_shell(mut self, shell: Option<Vec<String>>) -> Self {
        if let Some(shell) = shell.filter(|s| !s.is_empty()) {
            self.shell = shell;
        }
        self
    }

    /// Set extra environment variables
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// Enable or disable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set verbosity level
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Look up a variable in the extra environment, then the process environment
    pub fn env_var(&self, name: &str) -> Option<String> {
        self.env
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .or_else(|| env::var(name).ok())
    }

    /// Print an echoed recipe line
    pub fn print_command(&self, command: &str) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{}", command.bold());
        }
    }

    /// Print a line that would run in dry-run mode
    pub fn print_dry_run(&self, command: &str) {
        if self.verbosity >= Verbosity::Quiet {
            eprintln!("{}", command);
        }
    }

    /// Print info message (verbose mode)
    pub fn print_info(&self, message: &str) {
        if self.verbosity >= Verbosity::Verbose {
            eprintln!("{} {}", "===>".cyan(), message);
        }
    }

    /// Print warning message
    pub fn print_warning(&self, message: &str) {
        if self.verbosity >= Verbosity::Quiet {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Print recipe start message
    pub fn print_recipe_start(&self, recipe: &str) {
        self.print_info(&format!("Running recipe `{}`...", recipe));
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a `.env` file; a missing file yields no variables
pub fn load_dotenv(path: &Path) -> ConfigResult<Vec<(String, String)>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }

    let entries = dotenvy::from_path_iter(path).map_err(|e| {
        ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e))
    })?;

    entries
        .map(|entry| {
            entry.map_err(|e| {
                ConfigError::Invalid(format!("Failed to parse {}: {}", path.display(), e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_context_new() {
        let ctx = Context::new();
        assert_eq!(ctx.verbosity, Verbosity::Normal);
        assert_eq!(ctx.shell, vec!["sh", "-cu"]);
        assert!(ctx.env.is_empty());
        assert!(!ctx.dry_run);
    }

    #[test]
    fn test_with_shell() {
        let ctx = Context::new().with_shell(Some(vec!["bash".to_string(), "-c".to_string()]));
        assert_eq!(ctx.shell, vec!["bash", "-c"]);

        let ctx = Context::new().with_shell(None);
        assert_eq!(ctx.shell, vec!["sh", "-cu"]);
    }

    #[test]
    fn test_env_var_prefers_context_env() {
        let ctx = Context::new().with_env(vec![
            ("RJUST_CONTEXT_TEST".to_string(), "first".to_string()),
            ("RJUST_CONTEXT_TEST".to_string(), "second".to_string()),
        ]);
        assert_eq!(ctx.env_var("RJUST_CONTEXT_TEST").as_deref(), Some("second"));
        assert_eq!(ctx.env_var("RJUST_CONTEXT_TEST_UNSET"), None);
    }

    #[test]
    fn test_verbosity_levels() {
        assert!(Verbosity::Verbose > Verbosity::Normal);
        assert!(Verbosity::Normal > Verbosity::Quiet);
        assert!(Verbosity::Quiet > Verbosity::Silent);
    }

    #[test]
    fn test_load_dotenv() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".env");
        assert!(load_dotenv(&path).unwrap().is_empty());

        fs::write(&path, "# comment\nDATABASE=postgres\nPORT=5432\n").unwrap();
        let vars = load_dotenv(&path).unwrap();
        assert_eq!(
            vars,
            vec![
                ("DATABASE".to_string(), "postgres".to_string()),
                ("PORT".to_string(), "5432".to_string())
            ]
        );
    }
}
