//! Recipe dependency graph
//!
//! Recipes live in an arena addressed by index. An edge from `a` to `b`
//! means `b` must run before `a`. Building the graph checks that every
//! dependency exists, that dependency arguments fit the prerequisite's
//! parameters, and that there are no cycles.

use crate::config::{Expression, Namespace, Recipe};
use crate::error::{ConfigError, ConfigResult};
use std::collections::HashMap;

/// A prerequisite of a recipe, with the arguments passed to it
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub prerequisite: usize,
    pub arguments: Vec<Expression>,
}

/// Validated, acyclic recipe graph
#[derive(Debug, Clone)]
pub struct Graph {
    recipes: Vec<Recipe>,
    index: HashMap<String, usize>,
    aliases: HashMap<String, usize>,
    edges: Vec<Vec<Edge>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

impl Graph {
    /// Build and validate the graph for a namespace
    pub fn build(namespace: &Namespace) -> ConfigResult<Self> {
        let recipes: Vec<Recipe> = namespace.recipes.values().cloned().collect();
        let index: HashMap<String, usize> = recipes
            .iter()
            .enumerate()
            .map(|(i, recipe)| (recipe.name.clone(), i))
            .collect();

        let mut aliases = HashMap::new();
        for alias in namespace.aliases.values() {
            let target = index.get(&alias.target).copied().ok_or_else(|| {
                ConfigError::UnknownAliasTarget {
                    alias: alias.name.clone(),
                    target: alias.target.clone(),
                }
            })?;
            aliases.insert(alias.name.clone(), target);
        }

        let mut graph = Graph {
            recipes,
            index,
            aliases,
            edges: Vec::new(),
        };

        for recipe in &graph.recipes {
            let mut edges = Vec::with_capacity(recipe.dependencies.len());
            for dependency in &recipe.dependencies {
                let prerequisite = graph.lookup(&dependency.recipe).ok_or_else(|| {
                    ConfigError::UnknownDependency {
                        recipe: recipe.name.clone(),
                        dependency: dependency.recipe.clone(),
                        location: recipe.location(),
                    }
                })?;
                check_arity(&graph.recipes[prerequisite], dependency.arguments.len())?;
                edges.push(Edge {
                    prerequisite,
                    arguments: dependency.arguments.clone(),
                });
            }
            graph.edges.push(edges);
        }

        graph.check_cycles()?;
        Ok(graph)
    }

    /// Index of a recipe by name or alias
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.index
            .get(name)
            .or_else(|| self.aliases.get(name))
            .copied()
    }

    pub fn recipe(&self, index: usize) -> &Recipe {
        &self.recipes[index]
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    /// Prerequisites of a recipe, in header order
    pub fn dependencies(&self, index: usize) -> &[Edge] {
        &self.edges[index]
    }

    /// Aliases pointing at a recipe
    pub fn aliases_of(&self, index: usize) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .aliases
            .iter()
            .filter(|(_, &target)| target == index)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Depth-first white/gray/black coloring; a gray successor is a back edge
    fn check_cycles(&self) -> ConfigResult<()> {
        let mut colors = vec![Color::White; self.recipes.len()];
        let mut path = Vec::new();

        for start in 0..self.recipes.len() {
            if colors[start] == Color::White {
                self.visit(start, &mut colors, &mut path)?;
            }
        }
        Ok(())
    }

    fn visit(&self, node: usize, colors: &mut [Color], path: &mut Vec<usize>) -> ConfigResult<()> {
        colors[node] = Color::Gray;
        path.push(node);

        for edge in &self.edges[node] {
            match colors[edge.prerequisite] {
                Color::Gray => {
                    let start = path
                        .iter()
                        .position(|&n| n == edge.prerequisite)
                        .unwrap_or_default();
                    let mut cycle: Vec<String> = path[start..]
                        .iter()
                        .map(|&n| self.recipes[n].name.clone())
                        .collect();
                    cycle.push(self.recipes[edge.prerequisite].name.clone());
                    return Err(ConfigError::CircularDependency {
                        cycle,
                        location: self.recipes[edge.prerequisite].location(),
                    });
                }
                Color::White => self.visit(edge.prerequisite, colors, path)?,
                Color::Black => {}
            }
        }

        path.pop();
        colors[node] = Color::Black;
        Ok(())
    }
}

/// Check that `found` positional arguments fit a recipe's parameters
pub fn check_arity(recipe: &Recipe, found: usize) -> ConfigResult<()> {
    let too_few = found < recipe.min_arguments();
    let too_many = recipe.max_arguments().is_some_and(|max| found > max);
    if too_few || too_many {
        return Err(ConfigError::Arity {
            recipe: recipe.name.clone(),
            expected: recipe.arity(),
            found,
            location: recipe.location(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_document;

    fn build(text: &str) -> ConfigResult<Graph> {
        let namespace = Namespace::from_document(parse_document(text, None).unwrap())?;
        Graph::build(&namespace)
    }

    #[test]
    fn test_build_edges() {
        let graph = build("a:\nb: a\nc: b (a)\n").unwrap();
        let c = graph.lookup("c").unwrap();
        let prerequisites: Vec<&str> = graph
            .dependencies(c)
            .iter()
            .map(|edge| graph.recipe(edge.prerequisite).name.as_str())
            .collect();
        assert_eq!(prerequisites, vec!["b", "a"]);
    }

    #[test]
    fn test_unknown_dependency() {
        match build("a: missing\n") {
            Err(ConfigError::UnknownDependency {
                recipe,
                dependency,
                location,
            }) => {
                assert_eq!(recipe, "a");
                assert_eq!(dependency, "missing");
                assert_eq!(location, "<input>:1");
            }
            other => panic!("expected unknown dependency, got {:?}", other),
        }
    }

    #[test]
    fn test_two_recipe_cycle_names_both() {
        match build("a: b\nb: a\n") {
            Err(ConfigError::CircularDependency { cycle, location }) => {
                assert_eq!(cycle, vec!["a", "b", "a"]);
                assert_eq!(location, "<input>:1");
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_longer_cycle_reports_full_path() {
        match build("start: a\na: b\nb: c\nc: a\n") {
            Err(ConfigError::CircularDependency { cycle, .. }) => {
                assert_eq!(cycle, vec!["a", "b", "c", "a"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency() {
        assert!(matches!(
            build("a: a\n"),
            Err(ConfigError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        assert!(build("top:\nleft: top\nright: top\nbottom: left right\n").is_ok());
    }

    #[test]
    fn test_aliases() {
        let graph = build("alias t := test\ntest:\nci: t\n").unwrap();
        assert_eq!(graph.lookup("t"), graph.lookup("test"));
        assert_eq!(graph.aliases_of(graph.lookup("test").unwrap()), vec!["t"]);

        assert!(matches!(
            build("alias t := nothing\n"),
            Err(ConfigError::UnknownAliasTarget { .. })
        ));
    }

    #[test]
    fn test_dependency_arity() {
        assert!(build("dep x y='1':\na: (dep 'one')\nb: (dep 'one' 'two')\n").is_ok());
        assert!(matches!(
            build("dep x:\na: dep\n"),
            Err(ConfigError::Arity { .. })
        ));
        assert!(matches!(
            build("dep x:\na: (dep 'one' 'two')\n"),
            Err(ConfigError::Arity { .. })
        ));
        assert!(build("dep *rest:\na: (dep 'one' 'two' 'three')\n").is_ok());
    }
}
