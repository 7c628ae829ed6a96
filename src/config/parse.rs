//! Recipe file parsing and discovery

use crate::config::lexer::{tokenize, Token, TokenKind};
use crate::config::types::{
    Alias, Attributes, DedupPolicy, Dependency, Document, Expression, Fragment, Function, Import,
    Line, Parameter, ParameterKind, Recipe, Settings, Variable,
};
use crate::error::{ConfigError, ConfigResult, SyntaxError};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Recipe file names to search for, in order of preference
pub const RECIPE_FILE_NAMES: &[&str] = &["justfile", "Justfile", ".justfile"];

/// Find the recipe file by searching current and parent directories
pub fn find_recipe_file() -> ConfigResult<PathBuf> {
    find_recipe_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the recipe file starting from a specific directory
///
/// A relative `start_dir` is taken from the current directory. Falls back to
/// the per-user global recipe file when no directory up to the root contains
/// one.
pub fn find_recipe_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = if start_dir.is_relative() {
        env::current_dir()
            .map_err(|e| {
                ConfigError::Invalid(format!("Failed to get current directory: {}", e))
            })?
            .join(start_dir)
    } else {
        start_dir
    };
    let mut searched_paths = Vec::new();

    loop {
        for file_name in RECIPE_FILE_NAMES {
            let recipe_path = current_dir.join(file_name);
            searched_paths.push(recipe_path.display().to_string());

            if recipe_path.is_file() {
                return Ok(recipe_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(global) = global_recipe_file() {
        searched_paths.push(global.display().to_string());
        if global.is_file() {
            return Ok(global);
        }
    }

    Err(ConfigError::NotFound(searched_paths.join(", ")))
}

/// Location of the per-user recipe file, e.g. `~/.config/rjust/justfile`
pub fn global_recipe_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "rjust").map(|dirs| dirs.config_dir().join("justfile"))
}

/// Parse a recipe file from a path
pub fn parse_file(path: &Path) -> ConfigResult<Document> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    parse_document(&contents, Some(path)).map_err(ConfigError::from)
}

/// Parse recipe-file text
///
/// Pure function of its input. `path`, when given, is recorded on the
/// document and on every error.
pub fn parse_document(text: &str, path: Option<&Path>) -> Result<Document, SyntaxError> {
    let mut parser = Parser::new(text);
    let mut document = parser.parse().map_err(|mut e| {
        e.path = path.map(Path::to_path_buf);
        e
    })?;

    if let Some(path) = path {
        document.path = Some(path.to_path_buf());
        for variable in document.variables.values_mut() {
            variable.path = Some(path.to_path_buf());
        }
        for recipe in document.recipes.values_mut() {
            recipe.path = Some(path.to_path_buf());
        }
        for alias in document.aliases.values_mut() {
            alias.path = Some(path.to_path_buf());
        }
    }

    Ok(document)
}

/// Line-oriented parser state
struct Parser<'src> {
    lines: Vec<&'src str>,
    /// Index of the line being parsed
    index: usize,
}

impl<'src> Parser<'src> {
    fn new(text: &'src str) -> Self {
        Parser {
            lines: text.lines().collect(),
            index: 0,
        }
    }

    /// 1-based number of the current line
    fn line_number(&self) -> usize {
        self.index + 1
    }

    fn parse(&mut self) -> Result<Document, SyntaxError> {
        let mut document = Document::default();
        let mut doc_comment: Option<String> = None;
        let mut attributes: Option<(usize, Attributes)> = None;

        while self.index < self.lines.len() {
            let line = self.lines[self.index];
            let number = self.line_number();
            let trimmed = line.trim();

            if trimmed.is_empty() {
                doc_comment = None;
                self.index += 1;
                continue;
            }

            if line.starts_with([' ', '\t']) {
                return Err(SyntaxError::new(
                    number,
                    1,
                    "unexpected indentation outside of a recipe body",
                ));
            }

            if let Some(comment) = trimmed.strip_prefix('#') {
                let comment = comment.trim();
                doc_comment = (!comment.is_empty()).then(|| comment.to_string());
                self.index += 1;
                continue;
            }

            let mut tokens = Tokens::new(tokenize(line, number, 1)?, number);

            if tokens.peek_kind() == Some(TokenKind::BracketL) {
                let (_, current) = attributes.get_or_insert_with(|| (number, Attributes::default()));
                tokens.attributes(current)?;
                self.index += 1;
                continue;
            }

            let keyword = tokens.peek_name().unwrap_or_default().to_string();
            let second = tokens.peek_kind_at(1);

            if keyword == "import"
                && matches!(
                    second,
                    Some(TokenKind::Question | TokenKind::String | TokenKind::RawString)
                )
            {
                no_attributes(&attributes, "an import")?;
                tokens.next()?;
                let optional = tokens.accept(TokenKind::Question);
                let path = tokens.string()?;
                tokens.end()?;
                document.imports.push(Import {
                    path,
                    optional,
                    line: number,
                });
            } else if keyword == "set" && second == Some(TokenKind::Name) {
                no_attributes(&attributes, "a setting")?;
                tokens.next()?;
                tokens.setting(&mut document.settings)?;
            } else if keyword == "alias" && second == Some(TokenKind::Name) {
                no_attributes(&attributes, "an alias")?;
                tokens.next()?;
                let name = tokens.expect(TokenKind::Name)?;
                tokens.expect(TokenKind::ColonEquals)?;
                let target = tokens.expect(TokenKind::Name)?;
                tokens.end()?;
                if document.aliases.contains_key(&name.text) {
                    return Err(SyntaxError::new(
                        number,
                        name.column,
                        format!("alias '{}' is defined more than once", name.text),
                    ));
                }
                document.aliases.insert(
                    name.text.clone(),
                    Alias {
                        name: name.text,
                        target: target.text,
                        line: number,
                        path: None,
                    },
                );
            } else if (keyword == "export" && second == Some(TokenKind::Name))
                || second == Some(TokenKind::ColonEquals)
            {
                no_attributes(&attributes, "a variable")?;
                let export = keyword == "export" && second == Some(TokenKind::Name);
                if export {
                    tokens.next()?;
                }
                let name = tokens.expect(TokenKind::Name)?;
                tokens.expect(TokenKind::ColonEquals)?;
                let expression = tokens.expression()?;
                tokens.end()?;
                if document.variables.contains_key(&name.text) {
                    return Err(SyntaxError::new(
                        number,
                        name.column,
                        format!("variable '{}' is defined more than once", name.text),
                    ));
                }
                document.variables.insert(
                    name.text.clone(),
                    Variable {
                        name: name.text,
                        expression,
                        export,
                        line: number,
                        path: None,
                    },
                );
            } else {
                let attributes = attributes.take().map(|(_, a)| a).unwrap_or_default();
                let mut recipe = tokens.recipe_header(attributes)?;
                recipe.doc = doc_comment.take();
                self.index += 1;
                recipe.body = self.body()?;
                if document.recipes.contains_key(&recipe.name) {
                    return Err(SyntaxError::new(
                        number,
                        1,
                        format!("recipe '{}' is defined more than once", recipe.name),
                    ));
                }
                document.recipes.insert(recipe.name.clone(), recipe);
                continue;
            }

            doc_comment = None;
            self.index += 1;
        }

        if let Some((line, _)) = attributes {
            return Err(SyntaxError::new(
                line,
                1,
                "attributes must be followed by a recipe",
            ));
        }

        Ok(document)
    }

    /// Parse indented body lines following a recipe header
    fn body(&mut self) -> Result<Vec<Line>, SyntaxError> {
        let mut body = Vec::new();
        let mut indent: Option<&str> = None;

        while self.index < self.lines.len() {
            let line = self.lines[self.index];
            let number = self.line_number();

            if line.trim().is_empty() {
                self.index += 1;
                continue;
            }

            if !line.starts_with([' ', '\t']) {
                break;
            }

            let prefix = *indent.get_or_insert_with(|| {
                let width = line.len() - line.trim_start_matches([' ', '\t']).len();
                &line[..width]
            });

            let Some(text) = line.strip_prefix(prefix) else {
                return Err(SyntaxError::new(
                    number,
                    1,
                    "inconsistent indentation in recipe body",
                ));
            };

            body.push(parse_line(text, number, prefix.len() + 1)?);
            self.index += 1;
        }

        Ok(body)
    }
}

fn no_attributes(attributes: &Option<(usize, Attributes)>, item: &str) -> Result<(), SyntaxError> {
    match attributes {
        Some((line, _)) => Err(SyntaxError::new(
            *line,
            1,
            format!("attributes cannot be applied to {}", item),
        )),
        None => Ok(()),
    }
}

/// Split a body line into prefixes and fragments
fn parse_line(text: &str, number: usize, column: usize) -> Result<Line, SyntaxError> {
    let mut rest = text;
    let mut echo_inverted = false;
    let mut tolerate_failure = false;

    loop {
        if !echo_inverted && rest.starts_with('@') {
            echo_inverted = true;
        } else if !tolerate_failure && rest.starts_with('-') {
            tolerate_failure = true;
        } else {
            break;
        }
        rest = &rest[1..];
    }

    let mut fragments = Vec::new();
    let mut pending = String::new();

    while let Some(open) = rest.find("{{") {
        if rest[open..].starts_with("{{{{") {
            pending.push_str(&rest[..open]);
            pending.push_str("{{");
            rest = &rest[open + 4..];
            continue;
        }

        pending.push_str(&rest[..open]);
        if !pending.is_empty() {
            fragments.push(Fragment::Text(std::mem::take(&mut pending)));
        }

        let inner_column = column + (text.len() - rest.len()) + open + 2;
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            return Err(SyntaxError::new(
                number,
                inner_column - 2,
                "unterminated interpolation",
            ));
        };

        let mut tokens = Tokens::new(tokenize(&after[..close], number, inner_column)?, number);
        if tokens.is_empty() {
            return Err(SyntaxError::new(
                number,
                inner_column,
                "empty interpolation",
            ));
        }
        let expression = tokens.expression()?;
        tokens.end()?;
        fragments.push(Fragment::Interpolation(expression));

        rest = &after[close + 2..];
    }

    pending.push_str(rest);
    if !pending.is_empty() {
        fragments.push(Fragment::Text(pending));
    }

    Ok(Line {
        number,
        echo_inverted,
        tolerate_failure,
        fragments,
    })
}

/// Cursor over the tokens of one line
struct Tokens {
    tokens: Vec<Token>,
    position: usize,
    line: usize,
}

impl Tokens {
    fn new(tokens: Vec<Token>, line: usize) -> Self {
        Tokens {
            tokens,
            position: 0,
            line,
        }
    }

    fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek_kind_at(0)
    }

    fn peek_kind_at(&self, ahead: usize) -> Option<TokenKind> {
        self.tokens.get(self.position + ahead).map(|t| t.kind)
    }

    fn peek_name(&self) -> Option<&str> {
        self.peek()
            .filter(|t| t.kind == TokenKind::Name)
            .map(|t| t.text.as_str())
    }

    /// Column of the current token, or one past the last token
    fn column(&self) -> usize {
        match self.peek() {
            Some(token) => token.column,
            None => self
                .tokens
                .last()
                .map(|t| t.column + t.text.len() + 1)
                .unwrap_or(1),
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.line, self.column(), message)
    }

    fn next(&mut self) -> Result<Token, SyntaxError> {
        match self.tokens.get(self.position) {
            Some(token) => {
                self.position += 1;
                Ok(token.clone())
            }
            None => Err(self.error("unexpected end of line")),
        }
    }

    fn accept(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, SyntaxError> {
        match self.peek() {
            Some(token) if token.kind == kind => self.next(),
            Some(token) => Err(self.error(format!(
                "expected {}, found {}",
                kind.describe(),
                token.kind.describe()
            ))),
            None => Err(self.error(format!(
                "expected {}, found end of line",
                kind.describe()
            ))),
        }
    }

    fn end(&self) -> Result<(), SyntaxError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(self.error(format!(
                "unexpected {} '{}'",
                token.kind.describe(),
                token.text
            ))),
        }
    }

    fn string(&mut self) -> Result<String, SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::String | TokenKind::RawString) => Ok(self.next()?.text),
            _ => Err(self.error("expected string")),
        }
    }

    /// `expression := value ('+' value)*`
    fn expression(&mut self) -> Result<Expression, SyntaxError> {
        let mut lhs = self.value()?;
        while self.accept(TokenKind::Plus) {
            let rhs = self.value()?;
            lhs = Expression::Concat(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn value(&mut self) -> Result<Expression, SyntaxError> {
        let column = self.column();
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(self.error("expected expression, found end of line")),
        };

        match token.kind {
            TokenKind::String | TokenKind::RawString => {
                self.position += 1;
                Ok(Expression::Literal(token.text))
            }
            TokenKind::Backtick => {
                self.position += 1;
                Ok(Expression::Backtick(token.text))
            }
            TokenKind::Name => {
                self.position += 1;
                if !self.accept(TokenKind::ParenL) {
                    return Ok(Expression::Variable(token.text));
                }

                let function = Function::from_name(&token.text).ok_or_else(|| {
                    SyntaxError::new(
                        self.line,
                        column,
                        format!("unknown function '{}'", token.text),
                    )
                })?;

                let mut arguments = Vec::new();
                if !self.accept(TokenKind::ParenR) {
                    loop {
                        arguments.push(self.expression()?);
                        if self.accept(TokenKind::ParenR) {
                            break;
                        }
                        self.expect(TokenKind::Comma)?;
                    }
                }

                if arguments.len() != function.arity() {
                    return Err(SyntaxError::new(
                        self.line,
                        column,
                        format!(
                            "function '{}' takes {} argument(s) but got {}",
                            function.name(),
                            function.arity(),
                            arguments.len()
                        ),
                    ));
                }

                Ok(Expression::Call {
                    function,
                    arguments,
                })
            }
            TokenKind::ParenL => {
                self.position += 1;
                let expression = self.expression()?;
                self.expect(TokenKind::ParenR)?;
                Ok(expression)
            }
            other => Err(self.error(format!("expected expression, found {}", other.describe()))),
        }
    }

    /// `'[' attribute (',' attribute)* ']'`
    fn attributes(&mut self, attributes: &mut Attributes) -> Result<(), SyntaxError> {
        self.expect(TokenKind::BracketL)?;
        loop {
            let name = self.expect(TokenKind::Name)?;
            let argument = if self.accept(TokenKind::ParenL) {
                let argument = self.string()?;
                self.expect(TokenKind::ParenR)?;
                Some(argument)
            } else if self.accept(TokenKind::Colon) {
                Some(self.string()?)
            } else {
                None
            };

            match (name.text.as_str(), argument) {
                ("private", None) => attributes.private = true,
                ("silent", None) => attributes.silent = true,
                ("no-exit-on-error", None) => attributes.no_exit_on_error = true,
                ("always", None) => attributes.always = true,
                ("working-directory", Some(dir)) => attributes.working_directory = Some(dir),
                ("working-directory", None) => {
                    return Err(SyntaxError::new(
                        self.line,
                        name.column,
                        "attribute 'working-directory' requires a directory argument",
                    ))
                }
                (other, Some(_))
                    if matches!(other, "private" | "silent" | "no-exit-on-error" | "always") =>
                {
                    return Err(SyntaxError::new(
                        self.line,
                        name.column,
                        format!("attribute '{}' takes no argument", other),
                    ))
                }
                (other, _) => {
                    return Err(SyntaxError::new(
                        self.line,
                        name.column,
                        format!("unknown attribute '{}'", other),
                    ))
                }
            }

            if self.accept(TokenKind::BracketR) {
                break;
            }
            self.expect(TokenKind::Comma)?;
        }
        self.end()
    }

    /// `set NAME (':=' value)?`
    fn setting(&mut self, settings: &mut Settings) -> Result<(), SyntaxError> {
        let name = self.expect(TokenKind::Name)?;
        let line = self.line;
        let duplicate = || {
            SyntaxError::new(
                line,
                name.column,
                format!("setting '{}' is set more than once", name.text),
            )
        };

        match name.text.as_str() {
            "shell" => {
                self.expect(TokenKind::ColonEquals)?;
                self.expect(TokenKind::BracketL)?;
                let mut words = vec![self.string()?];
                while self.accept(TokenKind::Comma) {
                    if self.peek_kind() == Some(TokenKind::BracketR) {
                        break;
                    }
                    words.push(self.string()?);
                }
                self.expect(TokenKind::BracketR)?;
                if settings.shell.replace(words).is_some() {
                    return Err(duplicate());
                }
            }
            "dotenv-load" => {
                let value = self.boolean()?;
                if settings.dotenv_load.replace(value).is_some() {
                    return Err(duplicate());
                }
            }
            "export" => {
                let value = self.boolean()?;
                if settings.export.replace(value).is_some() {
                    return Err(duplicate());
                }
            }
            "dedup" => {
                self.expect(TokenKind::ColonEquals)?;
                let column = self.column();
                let value = self.string()?;
                let policy = DedupPolicy::from_name(&value).ok_or_else(|| {
                    SyntaxError::new(
                        self.line,
                        column,
                        format!("dedup must be 'recipe' or 'arguments', not '{}'", value),
                    )
                })?;
                if settings.dedup.replace(policy).is_some() {
                    return Err(duplicate());
                }
            }
            other => {
                return Err(SyntaxError::new(
                    self.line,
                    name.column,
                    format!("unknown setting '{}'", other),
                ))
            }
        }

        self.end()
    }

    /// Optional `:= true|false`; a bare boolean setting means `true`
    fn boolean(&mut self) -> Result<bool, SyntaxError> {
        if !self.accept(TokenKind::ColonEquals) {
            return Ok(true);
        }
        let value = self.expect(TokenKind::Name)?;
        match value.text.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(SyntaxError::new(
                self.line,
                value.column,
                format!("expected 'true' or 'false', found '{}'", other),
            )),
        }
    }

    /// `'@'? NAME parameter* ':' dependency*`
    fn recipe_header(&mut self, mut attributes: Attributes) -> Result<Recipe, SyntaxError> {
        if self.accept(TokenKind::At) {
            attributes.silent = true;
        }

        if self.peek_kind() == Some(TokenKind::Colon) {
            return Err(self.error("recipe name must not be empty"));
        }
        let name = self.expect(TokenKind::Name)?;

        let mut parameters: Vec<Parameter> = Vec::new();
        let mut names = HashSet::new();
        while self.peek_kind() != Some(TokenKind::Colon) {
            if self.peek().is_none() {
                return Err(self.error(format!(
                    "expected ':' after recipe '{}' header",
                    name.text
                )));
            }

            let column = self.column();
            let export = self.accept(TokenKind::Dollar);
            let kind = if self.accept(TokenKind::Star) {
                ParameterKind::Star
            } else if self.accept(TokenKind::Plus) {
                ParameterKind::Plus
            } else {
                ParameterKind::Singular
            };
            let parameter_name = self.expect(TokenKind::Name)?;
            let default = if self.accept(TokenKind::Equals) {
                Some(self.value()?)
            } else {
                None
            };

            if !names.insert(parameter_name.text.clone()) {
                return Err(SyntaxError::new(
                    self.line,
                    parameter_name.column,
                    format!(
                        "recipe '{}' has duplicate parameter '{}'",
                        name.text, parameter_name.text
                    ),
                ));
            }

            if let Some(previous) = parameters.last() {
                if previous.kind.is_variadic() {
                    return Err(SyntaxError::new(
                        self.line,
                        column,
                        format!(
                            "variadic parameter '{}' must be the last parameter of recipe '{}'",
                            previous.name, name.text
                        ),
                    ));
                }
                if previous.default.is_some() && default.is_none() && !kind.is_variadic() {
                    return Err(SyntaxError::new(
                        self.line,
                        column,
                        format!(
                            "required parameter '{}' follows a parameter with a default",
                            parameter_name.text
                        ),
                    ));
                }
            }

            parameters.push(Parameter {
                name: parameter_name.text,
                kind,
                default,
                export,
            });
        }
        self.expect(TokenKind::Colon)?;

        let mut dependencies = Vec::new();
        while let Some(kind) = self.peek_kind() {
            match kind {
                TokenKind::Name => {
                    let recipe = self.next()?.text;
                    dependencies.push(Dependency {
                        recipe,
                        arguments: Vec::new(),
                    });
                }
                TokenKind::ParenL => {
                    self.position += 1;
                    let recipe = self.expect(TokenKind::Name)?.text;
                    let mut arguments = Vec::new();
                    while !self.accept(TokenKind::ParenR) {
                        arguments.push(self.value()?);
                    }
                    dependencies.push(Dependency { recipe, arguments });
                }
                other => {
                    return Err(self.error(format!(
                        "expected dependency, found {}",
                        other.describe()
                    )))
                }
            }
        }

        Ok(Recipe {
            name: name.text,
            doc: None,
            attributes,
            parameters,
            dependencies,
            body: Vec::new(),
            line: self.line,
            path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(text: &str) -> Document {
        parse_document(text, None).unwrap()
    }

    fn parse_err(text: &str) -> SyntaxError {
        parse_document(text, None).unwrap_err()
    }

    #[test]
    fn test_parse_simple_recipe() {
        let document = parse("hello:\n    echo \"hello\"\n");
        assert_eq!(document.recipes.len(), 1);
        let recipe = &document.recipes["hello"];
        assert_eq!(recipe.body.len(), 1);
        assert_eq!(
            recipe.body[0].fragments,
            vec![Fragment::Text("echo \"hello\"".into())]
        );
        assert_eq!(recipe.body[0].number, 2);
    }

    #[test]
    fn test_parse_assignments_and_imports() {
        let document = parse(
            "import 'other.just'\nimport? \"maybe.just\"\ngreeting := \"hi\"\nexport who := greeting + ' there'\n",
        );
        assert_eq!(document.imports.len(), 2);
        assert!(!document.imports[0].optional);
        assert!(document.imports[1].optional);
        assert_eq!(document.imports[1].path, "maybe.just");
        assert_eq!(
            document.variables["greeting"].expression,
            Expression::Literal("hi".into())
        );
        let who = &document.variables["who"];
        assert!(who.export);
        assert_eq!(who.expression.references(), vec!["greeting"]);
    }

    #[test]
    fn test_parse_header() {
        let document = parse("@build $target mode='debug' *rest: lint (fmt 'check' mode)\n    cargo build\n");
        let recipe = &document.recipes["build"];
        assert!(recipe.attributes.silent);
        assert_eq!(recipe.parameters.len(), 3);
        assert!(recipe.parameters[0].export);
        assert_eq!(
            recipe.parameters[1].default,
            Some(Expression::Literal("debug".into()))
        );
        assert_eq!(recipe.parameters[2].kind, ParameterKind::Star);
        assert_eq!(recipe.dependencies.len(), 2);
        assert_eq!(recipe.dependencies[0].recipe, "lint");
        assert_eq!(
            recipe.dependencies[1].arguments,
            vec![
                Expression::Literal("check".into()),
                Expression::Variable("mode".into())
            ]
        );
    }

    #[test]
    fn test_parse_body_prefixes_and_interpolation() {
        let document = parse("greet name='world':\n    @-echo {{greeting}} {{ name }} {{{{literal}}\n");
        let line = &document.recipes["greet"].body[0];
        assert!(line.echo_inverted);
        assert!(line.tolerate_failure);
        assert_eq!(
            line.fragments,
            vec![
                Fragment::Text("echo ".into()),
                Fragment::Interpolation(Expression::Variable("greeting".into())),
                Fragment::Text(" ".into()),
                Fragment::Interpolation(Expression::Variable("name".into())),
                Fragment::Text(" {{literal}}".into()),
            ]
        );
    }

    #[test]
    fn test_body_ends_at_dedent_and_keeps_extra_indentation() {
        let document = parse("a:\n  one\n\n    two\nb:\n  three\n");
        let a = &document.recipes["a"];
        assert_eq!(a.body.len(), 2);
        assert_eq!(a.body[1].fragments, vec![Fragment::Text("  two".into())]);
        assert_eq!(document.recipes["b"].body.len(), 1);
    }

    #[test]
    fn test_inconsistent_indentation() {
        let err = parse_err("a:\n    one\n  two\n");
        assert_eq!(err.line, 3);
        assert!(err.message.contains("inconsistent indentation"));
    }

    #[test]
    fn test_doc_comments_and_attributes() {
        let document = parse(
            "# Build everything\n[private, always]\n[working-directory('sub')]\n[no-exit-on-error]\nbuild:\n    make\n\n# not attached\n\ntest:\n    true\n",
        );
        let build = &document.recipes["build"];
        assert_eq!(build.doc.as_deref(), Some("Build everything"));
        assert!(build.attributes.private);
        assert!(build.attributes.always);
        assert!(build.attributes.no_exit_on_error);
        assert_eq!(build.attributes.working_directory.as_deref(), Some("sub"));
        assert_eq!(document.recipes["test"].doc, None);
    }

    #[test]
    fn test_settings() {
        let document = parse(
            "set shell := ['bash', '-cu']\nset dotenv-load\nset export := false\nset dedup := 'arguments'\n",
        );
        assert_eq!(
            document.settings.shell,
            Some(vec!["bash".to_string(), "-cu".to_string()])
        );
        assert_eq!(document.settings.dotenv_load, Some(true));
        assert_eq!(document.settings.export, Some(false));
        assert_eq!(document.settings.dedup, Some(DedupPolicy::Arguments));

        assert!(parse_err("set colour := true\n").message.contains("unknown setting"));
        assert!(parse_err("set export\nset export\n").message.contains("more than once"));
    }

    #[test]
    fn test_functions() {
        let document = parse("home := env_var_or_default('HOME', '/') + os()\n");
        match &document.variables["home"].expression {
            Expression::Concat(lhs, _) => assert!(matches!(
                **lhs,
                Expression::Call {
                    function: Function::EnvVarOrDefault,
                    ..
                }
            )),
            other => panic!("unexpected expression {:?}", other),
        }

        assert!(parse_err("x := nope()\n").message.contains("unknown function"));
        assert!(parse_err("x := env_var()\n").message.contains("takes 1 argument"));
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(parse_err("a x x:\n").message.contains("duplicate parameter"));
        assert!(parse_err("a *rest x:\n").message.contains("must be the last"));
        assert!(parse_err("a *rest +more:\n").message.contains("must be the last"));
        assert!(parse_err("a x='1' y:\n").message.contains("follows a parameter with a default"));
        assert!(parse_document("a x='1' *rest:\n", None).is_ok());
    }

    #[test]
    fn test_rejects_empty_recipe_name() {
        let err = parse_err(": dep\n");
        assert!(err.message.contains("recipe name must not be empty"));
        let err = parse_err("@: dep\n");
        assert!(err.message.contains("recipe name must not be empty"));
    }

    #[test]
    fn test_rejects_duplicates_within_document() {
        assert!(parse_err("a:\na:\n").message.contains("recipe 'a' is defined more than once"));
        assert!(parse_err("x := 'a'\nx := 'b'\n").message.contains("more than once"));
    }

    #[test]
    fn test_misc_syntax_errors() {
        assert!(parse_err("  stray\n").message.contains("unexpected indentation"));
        assert!(parse_err("a b\n").message.contains("expected ':'"));
        assert!(parse_err("a:\n    echo {{ x\n").message.contains("unterminated interpolation"));
        assert!(parse_err("a:\n    echo {{ }}\n").message.contains("empty interpolation"));
        assert!(parse_err("[private]\n").message.contains("followed by a recipe"));
        assert!(parse_err("[bogus]\na:\n").message.contains("unknown attribute"));
        assert!(parse_err("[private]\nx := 'a'\n").message.contains("cannot be applied"));
    }

    #[test]
    fn test_keywords_usable_as_names() {
        let document = parse("import := 'x'\nset:\n    true\nalias:\n    true\n");
        assert!(document.variables.contains_key("import"));
        assert!(document.recipes.contains_key("set"));
        assert!(document.recipes.contains_key("alias"));
    }

    #[test]
    fn test_display_round_trip() {
        let text = r#"
import? 'extra.just'
set shell := ['bash', '-cu']
alias b := build

greeting := "hi"
export tag := `git describe` + "-" + env_var('USER')

# Build it
[working-directory('src')]
@build mode='debug' +targets: (lint mode) fmt
    echo {{greeting}} {{{{raw}}
    -@cargo build --{{mode}} {{targets}}

lint mode:
    echo {{ "it's" + mode }}

fmt:
"#;
        let first = parse(text);
        let rendered = first.to_string();
        let second = parse(&rendered);
        assert_eq!(second.to_string(), rendered);
        assert_eq!(second.recipes.keys().collect::<Vec<_>>(), vec!["build", "lint", "fmt"]);
        let rendered_body = |document: &Document| {
            document.recipes["build"]
                .body
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        };
        assert_eq!(rendered_body(&first), rendered_body(&second));
        assert_eq!(
            rendered_body(&second),
            vec!["echo {{greeting}} {{{{raw}}", "@-cargo build --{{mode}} {{targets}}"]
        );
    }

    #[test]
    fn test_find_recipe_file_in_current_dir() {
        let temp_dir = TempDir::new().unwrap();
        let recipe_path = temp_dir.path().join("justfile");
        fs::write(&recipe_path, "test:\n    echo test\n").unwrap();

        let found = find_recipe_file_from(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(found, recipe_path);
    }

    #[test]
    fn test_find_recipe_file_in_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let recipe_path = temp_dir.path().join("Justfile");
        let sub_dir = temp_dir.path().join("subdir");

        fs::create_dir(&sub_dir).unwrap();
        fs::write(&recipe_path, "test:\n    echo test\n").unwrap();

        let found = find_recipe_file_from(sub_dir).unwrap();
        assert_eq!(found, recipe_path);
    }

    #[test]
    fn test_find_recipe_file_from_relative_start_walks_absolute_parents() {
        let start = env::current_dir().unwrap().join("src");
        match find_recipe_file_from(PathBuf::from("src")) {
            Ok(found) => assert!(found.is_absolute()),
            Err(ConfigError::NotFound(searched)) => {
                assert!(searched.starts_with(&start.join("justfile").display().to_string()));
                assert!(searched.contains(&start.parent().unwrap().join("justfile").display().to_string()));
            }
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_file_records_path() {
        let temp_dir = TempDir::new().unwrap();
        let recipe_path = temp_dir.path().join("justfile");
        fs::write(&recipe_path, "x := 'a'\nbroken\n").unwrap();

        match parse_file(&recipe_path) {
            Err(ConfigError::Syntax(err)) => {
                assert_eq!(err.path.as_deref(), Some(recipe_path.as_path()));
                assert_eq!(err.line, 2);
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }
}
