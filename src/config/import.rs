//! Import resolution
//!
//! Loads the root recipe file and everything it imports, transitively, and
//! merges them into a single flat [`Namespace`].

use crate::config::parse::parse_file;
use crate::config::types::{Alias, Document, Recipe, Settings, Variable};
use crate::error::{ConfigError, ConfigResult};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};

/// All documents reachable from a root file, merged into one namespace
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    /// Canonical path of the root recipe file
    pub root: PathBuf,

    /// Every loaded file, root first, in depth-first import order
    pub files: Vec<PathBuf>,

    pub settings: Settings,
    pub aliases: IndexMap<String, Alias>,
    pub variables: IndexMap<String, Variable>,
    pub recipes: IndexMap<String, Recipe>,
}

impl Namespace {
    /// Build a namespace from a single in-memory document, without imports
    pub fn from_document(document: Document) -> ConfigResult<Self> {
        let root = document.path.clone().unwrap_or_default();
        let mut namespace = Namespace {
            root: root.clone(),
            files: vec![root],
            ..Namespace::default()
        };
        namespace.merge(document)?;
        Ok(namespace)
    }

    /// Directory containing the root recipe file
    pub fn root_directory(&self) -> PathBuf {
        self.root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// The recipe run when no recipe is named on the command line
    pub fn default_recipe(&self) -> Option<&Recipe> {
        self.recipes
            .values()
            .find(|recipe| recipe.path.as_deref() == Some(self.root.as_path()))
            .or_else(|| self.recipes.values().next())
    }

    /// Render the merged namespace as recipe-file text
    pub fn to_document(&self) -> Document {
        Document {
            path: Some(self.root.clone()),
            imports: Vec::new(),
            settings: self.settings.clone(),
            aliases: self.aliases.clone(),
            variables: self.variables.clone(),
            recipes: self.recipes.clone(),
        }
    }

    /// Merge one document's definitions, rejecting names defined elsewhere
    fn merge(&mut self, document: Document) -> ConfigResult<()> {
        let origin = |path: &Option<PathBuf>| {
            path.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<input>".to_string())
        };

        for (name, variable) in document.variables {
            if let Some(existing) = self.variables.get(&name) {
                return Err(ConfigError::DuplicateVariable {
                    name,
                    first: origin(&existing.path),
                    second: origin(&variable.path),
                });
            }
            self.variables.insert(name, variable);
        }

        for (name, recipe) in document.recipes {
            if let Some(existing) = self.recipes.get(&name) {
                return Err(ConfigError::DuplicateRecipe {
                    name,
                    first: origin(&existing.path),
                    second: origin(&recipe.path),
                });
            }
            if let Some(alias) = self.aliases.get(&name) {
                return Err(ConfigError::DuplicateRecipe {
                    name,
                    first: format!("alias in {}", origin(&alias.path)),
                    second: origin(&recipe.path),
                });
            }
            self.recipes.insert(name, recipe);
        }

        for (name, alias) in document.aliases {
            if let Some(existing) = self.aliases.get(&name) {
                return Err(ConfigError::DuplicateAlias {
                    name,
                    first: origin(&existing.path),
                    second: origin(&alias.path),
                });
            }
            if let Some(recipe) = self.recipes.get(&name) {
                return Err(ConfigError::DuplicateAlias {
                    name,
                    first: format!("recipe in {}", origin(&recipe.path)),
                    second: origin(&alias.path),
                });
            }
            self.aliases.insert(name, alias);
        }

        merge_setting(&mut self.settings.shell, document.settings.shell, "shell")?;
        merge_setting(
            &mut self.settings.dotenv_load,
            document.settings.dotenv_load,
            "dotenv-load",
        )?;
        merge_setting(&mut self.settings.export, document.settings.export, "export")?;
        merge_setting(&mut self.settings.dedup, document.settings.dedup, "dedup")?;

        Ok(())
    }
}

fn merge_setting<T>(slot: &mut Option<T>, value: Option<T>, name: &str) -> ConfigResult<()> {
    if let Some(value) = value {
        if slot.replace(value).is_some() {
            return Err(ConfigError::DuplicateSetting(name.to_string()));
        }
    }
    Ok(())
}

/// Load `root_path` and its imports, and merge them into one namespace
pub fn resolve(root_path: &Path) -> ConfigResult<Namespace> {
    let root = canonicalize(root_path, None)?;

    let mut loader = Loader::default();
    loader.load(&root)?;

    let mut namespace = Namespace {
        root,
        files: loader.documents.keys().cloned().collect(),
        ..Namespace::default()
    };

    for (_, document) in loader.documents {
        namespace.merge(document)?;
    }

    log::debug!(
        "resolved {} file(s): {} recipe(s), {} variable(s)",
        namespace.files.len(),
        namespace.recipes.len(),
        namespace.variables.len()
    );

    Ok(namespace)
}

/// Depth-first import traversal state
#[derive(Default)]
struct Loader {
    /// Parsed documents by canonical path, in first-visit order
    documents: IndexMap<PathBuf, Document>,
    /// Files currently being visited
    stack: Vec<PathBuf>,
}

impl Loader {
    fn load(&mut self, path: &Path) -> ConfigResult<()> {
        if let Some(position) = self.stack.iter().position(|p| p == path) {
            let mut cycle = self.stack[position..].to_vec();
            cycle.push(path.to_path_buf());
            return Err(ConfigError::ImportCycle(cycle));
        }

        if self.documents.contains_key(path) {
            log::debug!("{} already imported", path.display());
            return Ok(());
        }

        log::debug!("loading {}", path.display());
        let document = parse_file(path)?;
        let imports = document.imports.clone();
        self.documents.insert(path.to_path_buf(), document);

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        self.stack.push(path.to_path_buf());
        for import in imports {
            let import_path = base_dir.join(&import.path);
            if import.optional && !import_path.exists() {
                log::debug!("skipping missing optional import {}", import_path.display());
                continue;
            }
            let canonical = canonicalize(&import_path, Some(path))?;
            self.load(&canonical)?;
        }
        self.stack.pop();

        Ok(())
    }
}

fn canonicalize(path: &Path, importer: Option<&Path>) -> ConfigResult<PathBuf> {
    fs::canonicalize(path).map_err(|e| match importer {
        Some(importer) => ConfigError::ImportNotFound {
            path: path.to_path_buf(),
            importer: importer.to_path_buf(),
        },
        None => ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_resolve_merges_imports() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "justfile", "import 'lib/tools.just'\nroot:\n    echo root\n");
        write(&dir, "lib/tools.just", "tool := 'x'\ntool-recipe:\n    echo tool\n");

        let namespace = resolve(&root).unwrap();
        assert_eq!(namespace.files.len(), 2);
        assert!(namespace.recipes.contains_key("root"));
        assert!(namespace.recipes.contains_key("tool-recipe"));
        assert!(namespace.variables.contains_key("tool"));
        assert_eq!(namespace.default_recipe().unwrap().name, "root");
    }

    #[test]
    fn test_diamond_import_is_loaded_once() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "justfile", "import 'a.just'\nimport 'b.just'\nmain:\n");
        write(&dir, "a.just", "import 'common.just'\na:\n");
        write(&dir, "b.just", "import 'common.just'\nb:\n");
        write(&dir, "common.just", "shared := `echo once`\ncommon:\n");

        let namespace = resolve(&root).unwrap();
        assert_eq!(namespace.files.len(), 4);
        assert_eq!(namespace.recipes.len(), 4);
        assert_eq!(namespace.variables.len(), 1);
    }

    #[test]
    fn test_import_cycle() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "justfile", "import 'a.just'\n");
        write(&dir, "a.just", "import 'b.just'\n");
        write(&dir, "b.just", "import 'a.just'\n");

        match resolve(&root) {
            Err(ConfigError::ImportCycle(cycle)) => {
                assert_eq!(cycle.len(), 3);
                assert!(cycle[0].ends_with("a.just"));
                assert!(cycle[1].ends_with("b.just"));
                assert!(cycle[2].ends_with("a.just"));
            }
            other => panic!("expected import cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_import_is_a_cycle() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "justfile", "import 'justfile'\n");
        assert!(matches!(resolve(&root), Err(ConfigError::ImportCycle(_))));
    }

    #[test]
    fn test_duplicate_recipe_across_files() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "justfile", "import 'other.just'\nbuild:\n");
        write(&dir, "other.just", "build:\n");

        match resolve(&root) {
            Err(ConfigError::DuplicateRecipe { name, first, second }) => {
                assert_eq!(name, "build");
                assert!(first.ends_with("justfile"));
                assert!(second.ends_with("other.just"));
            }
            other => panic!("expected duplicate recipe, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_variable_and_setting_across_files() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "justfile", "import 'other.just'\nx := 'a'\n");
        write(&dir, "other.just", "x := 'b'\n");
        assert!(matches!(
            resolve(&root),
            Err(ConfigError::DuplicateVariable { .. })
        ));

        let dir = TempDir::new().unwrap();
        let root = write(&dir, "justfile", "import 'other.just'\nset export\n");
        write(&dir, "other.just", "set export := false\n");
        assert!(matches!(
            resolve(&root),
            Err(ConfigError::DuplicateSetting(_))
        ));
    }

    #[test]
    fn test_alias_may_not_shadow_recipe() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "justfile", "import 'other.just'\nalias b := build\nbuild:\n");
        write(&dir, "other.just", "b:\n");
        assert!(matches!(
            resolve(&root),
            Err(ConfigError::DuplicateRecipe { .. })
        ));
    }

    #[test]
    fn test_missing_imports() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "justfile", "import? 'absent.just'\nok:\n");
        assert!(resolve(&root).unwrap().recipes.contains_key("ok"));

        let root = write(&dir, "justfile", "import 'absent.just'\nok:\n");
        assert!(matches!(
            resolve(&root),
            Err(ConfigError::ImportNotFound { .. })
        ));
    }
}
