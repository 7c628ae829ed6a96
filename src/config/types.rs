//! Core recipe-file types
//!
//! This module defines the data structures that represent a parsed recipe file.
//! Every type implements `Display`, rendering it back as canonical recipe-file text.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One parsed recipe file
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Document {
    /// File the document was read from, if any
    #[serde(skip)]
    pub path: Option<PathBuf>,

    /// Import directives, in file order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Import>,

    /// `set` directives
    #[serde(default)]
    pub settings: Settings,

    /// Alternative names for recipes
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub aliases: IndexMap<String, Alias>,

    /// Variable definitions, in file order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, Variable>,

    /// Recipes, in file order (the first one is the default recipe)
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub recipes: IndexMap<String, Recipe>,
}

/// An `import` directive
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Import {
    /// Path as written, relative to the importing file
    pub path: String,

    /// `import?` - a missing file is silently skipped
    #[serde(default)]
    pub optional: bool,

    #[serde(skip)]
    pub line: usize,
}

/// `alias name := target`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Alias {
    pub name: String,
    pub target: String,
    #[serde(skip)]
    pub line: usize,
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

/// A variable definition: `[export] name := expression`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Variable {
    pub name: String,
    pub expression: Expression,

    /// Exported into the environment of every recipe line
    #[serde(default)]
    pub export: bool,

    #[serde(skip)]
    pub line: usize,
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

/// File-wide settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// Command interpreter, e.g. `["bash", "-c"]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<Vec<String>>,

    /// Load `.env` next to the root recipe file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dotenv_load: Option<bool>,

    /// Export every variable and parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<bool>,

    /// How a recipe reached through several dependency paths is deduplicated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup: Option<DedupPolicy>,
}

impl Settings {
    pub fn is_empty(&self) -> bool {
        self.shell.is_none()
            && self.dotenv_load.is_none()
            && self.export.is_none()
            && self.dedup.is_none()
    }
}

/// Run-plan deduplication policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupPolicy {
    /// A recipe runs at most once per invocation
    #[default]
    Recipe,
    /// A recipe runs at most once per distinct set of bound parameter values
    Arguments,
}

impl DedupPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "recipe" => Some(DedupPolicy::Recipe),
            "arguments" => Some(DedupPolicy::Arguments),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DedupPolicy::Recipe => "recipe",
            DedupPolicy::Arguments => "arguments",
        }
    }
}

/// A recipe definition
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Recipe {
    pub name: String,

    /// Comment directly above the recipe header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,

    #[serde(default)]
    pub attributes: Attributes,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<Line>,

    /// Line of the recipe header
    #[serde(skip)]
    pub line: usize,
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Recipe {
    /// Minimum number of positional arguments this recipe accepts
    pub fn min_arguments(&self) -> usize {
        self.parameters
            .iter()
            .filter(|p| p.default.is_none() && p.kind != ParameterKind::Star)
            .count()
    }

    /// Maximum number of positional arguments, `None` when variadic
    pub fn max_arguments(&self) -> Option<usize> {
        if self.parameters.iter().any(|p| p.kind.is_variadic()) {
            None
        } else {
            Some(self.parameters.len())
        }
    }

    /// File the recipe is defined in, `<input>` for text parsed without a path
    pub fn origin(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<input>".to_string())
    }

    /// `file:line` of the recipe header
    pub fn location(&self) -> String {
        format!("{}:{}", self.origin(), self.line)
    }

    /// Human readable arity, e.g. `1`, `1 to 2` or `at least 1`
    pub fn arity(&self) -> String {
        let min = self.min_arguments();
        match self.max_arguments() {
            None => format!("at least {}", min),
            Some(max) if max == min => min.to_string(),
            Some(max) => format!("{} to {}", min, max),
        }
    }

    /// Header without the leading `@` or trailing colon, as shown by `--list`
    pub fn signature(&self) -> String {
        let mut signature = self.name.clone();
        for parameter in &self.parameters {
            signature.push(' ');
            signature.push_str(&parameter.to_string());
        }
        signature
    }
}

/// Per-recipe attributes
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Attributes {
    /// Hidden from `--list`
    #[serde(default)]
    pub private: bool,

    /// Lines are not echoed (the `@` header prefix)
    #[serde(default)]
    pub silent: bool,

    /// A failing line is recorded and the recipe continues
    #[serde(default)]
    pub no_exit_on_error: bool,

    /// Exempt from run-plan deduplication
    #[serde(default)]
    pub always: bool,

    /// Working directory, relative to the invocation directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

/// A recipe parameter
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Parameter {
    pub name: String,

    #[serde(default)]
    pub kind: ParameterKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Expression>,

    /// `$name` - exported into the recipe's environment
    #[serde(default)]
    pub export: bool,
}

/// Whether a parameter binds one argument or the remaining ones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    #[default]
    Singular,
    /// `*name`: zero or more trailing arguments
    Star,
    /// `+name`: one or more trailing arguments
    Plus,
}

impl ParameterKind {
    pub fn is_variadic(self) -> bool {
        !matches!(self, ParameterKind::Singular)
    }
}

/// A dependency listed in a recipe header
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Dependency {
    pub recipe: String,

    /// Argument expressions, evaluated in the dependent recipe's scope
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Expression>,
}

/// One body line of a recipe
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Line {
    /// Source line number
    #[serde(skip)]
    pub number: usize,

    /// `@` prefix: invert the recipe's echo setting for this line
    #[serde(default)]
    pub echo_inverted: bool,

    /// `-` prefix: a non-zero exit is tolerated
    #[serde(default)]
    pub tolerate_failure: bool,

    pub fragments: Vec<Fragment>,
}

/// A piece of a body line
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Fragment {
    /// Verbatim text
    Text(String),
    /// `{{ expression }}`
    Interpolation(Expression),
}

/// An expression on the right side of `:=`, in a default or in `{{ }}`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    /// Quoted string, already unescaped
    Literal(String),
    /// Reference to a variable or parameter by name
    Variable(String),
    /// Shell-backed expression, evaluated by capturing standard output
    Backtick(String),
    /// Built-in function call
    Call {
        function: Function,
        arguments: Vec<Expression>,
    },
    /// `lhs + rhs`
    Concat(Box<Expression>, Box<Expression>),
}

impl Expression {
    /// Names of all variables or parameters this expression refers to
    pub fn references(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expression::Variable(name) => names.push(name),
            Expression::Call { arguments, .. } => {
                for argument in arguments {
                    argument.collect_references(names);
                }
            }
            Expression::Concat(lhs, rhs) => {
                lhs.collect_references(names);
                rhs.collect_references(names);
            }
            Expression::Literal(_) | Expression::Backtick(_) => {}
        }
    }

    /// Render as a `value` (parenthesized when it is a concatenation)
    pub fn as_value(&self) -> String {
        match self {
            Expression::Concat(..) => format!("({})", self),
            _ => self.to_string(),
        }
    }
}

/// Built-in functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    EnvVar,
    EnvVarOrDefault,
    InvocationDirectory,
    Os,
    Arch,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "env_var" => Some(Function::EnvVar),
            "env_var_or_default" => Some(Function::EnvVarOrDefault),
            "invocation_directory" => Some(Function::InvocationDirectory),
            "os" => Some(Function::Os),
            "arch" => Some(Function::Arch),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::EnvVar => "env_var",
            Function::EnvVarOrDefault => "env_var_or_default",
            Function::InvocationDirectory => "invocation_directory",
            Function::Os => "os",
            Function::Arch => "arch",
        }
    }

    /// Number of arguments the function takes
    pub fn arity(self) -> usize {
        match self {
            Function::EnvVar => 1,
            Function::EnvVarOrDefault => 2,
            Function::InvocationDirectory | Function::Os | Function::Arch => 0,
        }
    }
}

/// Quote a string so that the lexer reads it back unchanged
pub fn quote(s: &str) -> String {
    if !s.contains('\'') && !s.contains(['\n', '\r', '\t']) {
        return format!("'{}'", s);
    }

    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(s) => write!(f, "{}", quote(s)),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::Backtick(command) => write!(f, "`{}`", command),
            Expression::Call {
                function,
                arguments,
            } => {
                write!(f, "{}(", function.name())?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", argument)?;
                }
                write!(f, ")")
            }
            Expression::Concat(lhs, rhs) => match **rhs {
                Expression::Concat(..) => write!(f, "{} + ({})", lhs, rhs),
                _ => write!(f, "{} + {}", lhs, rhs),
            },
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.export {
            write!(f, "$")?;
        }
        match self.kind {
            ParameterKind::Singular => {}
            ParameterKind::Star => write!(f, "*")?,
            ParameterKind::Plus => write!(f, "+")?,
        }
        write!(f, "{}", self.name)?;
        if let Some(default) = &self.default {
            write!(f, "={}", default.as_value())?;
        }
        Ok(())
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arguments.is_empty() {
            return write!(f, "{}", self.recipe);
        }
        write!(f, "({}", self.recipe)?;
        for argument in &self.arguments {
            write!(f, " {}", argument.as_value())?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Text(text) => write!(f, "{}", text.replace("{{", "{{{{")),
            Fragment::Interpolation(expression) => write!(f, "{{{{{}}}}}", expression),
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.echo_inverted {
            write!(f, "@")?;
        }
        if self.tolerate_failure {
            write!(f, "-")?;
        }
        for fragment in &self.fragments {
            write!(f, "{}", fragment)?;
        }
        Ok(())
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(doc) = &self.doc {
            writeln!(f, "# {}", doc)?;
        }

        let attributes = &self.attributes;
        if attributes.private {
            writeln!(f, "[private]")?;
        }
        if attributes.no_exit_on_error {
            writeln!(f, "[no-exit-on-error]")?;
        }
        if attributes.always {
            writeln!(f, "[always]")?;
        }
        if let Some(dir) = &attributes.working_directory {
            writeln!(f, "[working-directory({})]", quote(dir))?;
        }

        if attributes.silent {
            write!(f, "@")?;
        }
        write!(f, "{}:", self.signature())?;
        for dependency in &self.dependencies {
            write!(f, " {}", dependency)?;
        }
        writeln!(f)?;

        for line in &self.body {
            writeln!(f, "    {}", line)?;
        }
        Ok(())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.export {
            write!(f, "export ")?;
        }
        write!(f, "{} := {}", self.name, self.expression)
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(shell) = &self.shell {
            let words: Vec<String> = shell.iter().map(|w| quote(w)).collect();
            writeln!(f, "set shell := [{}]", words.join(", "))?;
        }
        if let Some(dotenv_load) = self.dotenv_load {
            writeln!(f, "set dotenv-load := {}", dotenv_load)?;
        }
        if let Some(export) = self.export {
            writeln!(f, "set export := {}", export)?;
        }
        if let Some(dedup) = self.dedup {
            writeln!(f, "set dedup := {}", quote(dedup.name()))?;
        }
        Ok(())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sections: Vec<String> = Vec::new();

        if !self.imports.is_empty() {
            let mut section = String::new();
            for import in &self.imports {
                let keyword = if import.optional { "import?" } else { "import" };
                section.push_str(&format!("{} {}\n", keyword, quote(&import.path)));
            }
            sections.push(section);
        }

        if !self.settings.is_empty() {
            sections.push(self.settings.to_string());
        }

        if !self.aliases.is_empty() {
            let mut section = String::new();
            for alias in self.aliases.values() {
                section.push_str(&format!("alias {} := {}\n", alias.name, alias.target));
            }
            sections.push(section);
        }

        if !self.variables.is_empty() {
            let mut section = String::new();
            for variable in self.variables.values() {
                section.push_str(&format!("{}\n", variable));
            }
            sections.push(section);
        }

        for recipe in self.recipes.values() {
            sections.push(recipe.to_string());
        }

        write!(f, "{}", sections.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameter(name: &str, kind: ParameterKind, default: Option<Expression>) -> Parameter {
        Parameter {
            name: name.to_string(),
            kind,
            default,
            export: false,
        }
    }

    #[test]
    fn test_quote_prefers_raw_strings() {
        assert_eq!(quote("hello"), "'hello'");
        assert_eq!(quote("it's"), "\"it's\"");
        assert_eq!(quote("a\nb"), "\"a\\nb\"");
    }

    #[test]
    fn test_concat_display_keeps_grouping() {
        let expression = Expression::Concat(
            Box::new(Expression::Variable("a".into())),
            Box::new(Expression::Concat(
                Box::new(Expression::Literal("b".into())),
                Box::new(Expression::Backtick("date".into())),
            )),
        );
        assert_eq!(expression.to_string(), "a + ('b' + `date`)");
        assert_eq!(expression.as_value(), "(a + ('b' + `date`))");
        assert_eq!(expression.references(), vec!["a"]);
    }

    #[test]
    fn test_recipe_arity() {
        let recipe = Recipe {
            name: "build".into(),
            doc: None,
            attributes: Attributes::default(),
            parameters: vec![
                parameter("target", ParameterKind::Singular, None),
                parameter(
                    "mode",
                    ParameterKind::Singular,
                    Some(Expression::Literal("debug".into())),
                ),
                parameter("rest", ParameterKind::Star, None),
            ],
            dependencies: vec![],
            body: vec![],
            line: 1,
            path: None,
        };
        assert_eq!(recipe.min_arguments(), 1);
        assert_eq!(recipe.max_arguments(), None);
        assert_eq!(recipe.arity(), "at least 1");
        assert_eq!(recipe.signature(), "build target mode='debug' *rest");
    }

    #[test]
    fn test_fragment_escapes_braces() {
        let line = Line {
            number: 2,
            echo_inverted: true,
            tolerate_failure: true,
            fragments: vec![
                Fragment::Text("echo {{ ".into()),
                Fragment::Interpolation(Expression::Variable("name".into())),
            ],
        };
        assert_eq!(line.to_string(), "@-echo {{{{ {{name}}");
    }

    #[test]
    fn test_function_names_round_trip() {
        for function in [
            Function::EnvVar,
            Function::EnvVarOrDefault,
            Function::InvocationDirectory,
            Function::Os,
            Function::Arch,
        ] {
            assert_eq!(Function::from_name(function.name()), Some(function));
        }
        assert_eq!(Function::from_name("nope"), None);
    }
}
