//! Common test utilities

#![allow(dead_code)]

use rjust::config::{resolve, validate_namespace, Namespace};
use rjust::runner::{Context, Evaluator, Executor, Graph, Report, Verbosity};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temporary directory with a justfile
pub fn create_test_justfile(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = write_file(temp_dir.path(), "justfile", content);
    (temp_dir, path)
}

/// Write `content` to `dir/name`, creating parent directories
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Resolve, validate and build the graph for a recipe file
pub fn load(path: &Path) -> rjust::Result<(Namespace, Graph)> {
    let namespace = resolve(path)?;
    validate_namespace(&namespace)?;
    let graph = Graph::build(&namespace)?;
    Ok((namespace, graph))
}

/// Run `target` from the recipe file at `path`, silently, in its directory
pub fn run_recipe(path: &Path, target: &str, args: &[&str]) -> rjust::Result<Report> {
    let (namespace, graph) = load(path)?;
    let ctx = Context::new()
        .with_working_dir(namespace.root_directory())
        .with_verbosity(Verbosity::Silent);
    let evaluator = Evaluator::new(&namespace.variables, &ctx);
    let mut executor = Executor::new(&graph, evaluator, namespace.settings.clone());
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    executor.run(target, &args)
}

/// Lines of a file written by recipe lines
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}
