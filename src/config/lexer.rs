//! Tokenizer for recipe headers, assignments, settings and expressions
//!
//! Recipe files are line oriented, so the lexer works on one line (or one
//! `{{ }}` interpolation) at a time. Body text is never tokenized.

use crate::error::SyntaxError;
use regex::Regex;
use std::sync::OnceLock;

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    /// `"..."`, escapes already processed
    String,
    /// `'...'`
    RawString,
    /// `` `...` ``
    Backtick,
    ColonEquals,
    Colon,
    Equals,
    Plus,
    Star,
    Dollar,
    At,
    Question,
    Comma,
    ParenL,
    ParenR,
    BracketL,
    BracketR,
}

impl TokenKind {
    /// Description used in error messages
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Name => "name",
            TokenKind::String | TokenKind::RawString => "string",
            TokenKind::Backtick => "backtick",
            TokenKind::ColonEquals => "':='",
            TokenKind::Colon => "':'",
            TokenKind::Equals => "'='",
            TokenKind::Plus => "'+'",
            TokenKind::Star => "'*'",
            TokenKind::Dollar => "'$'",
            TokenKind::At => "'@'",
            TokenKind::Question => "'?'",
            TokenKind::Comma => "','",
            TokenKind::ParenL => "'('",
            TokenKind::ParenR => "')'",
            TokenKind::BracketL => "'['",
            TokenKind::BracketR => "']'",
        }
    }
}

/// A lexed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Name, or the contents of a string or backtick
    pub text: String,
    /// 1-based column
    pub column: usize,
}

fn name_pattern() -> &'static Regex {
    static NAME: OnceLock<Regex> = OnceLock::new();
    NAME.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*").expect("name pattern is valid"))
}

/// Check whether `s` is a valid recipe, variable or parameter name
pub fn is_name(s: &str) -> bool {
    name_pattern()
        .find(s)
        .map(|m| m.end() == s.len())
        .unwrap_or(false)
}

/// Tokenize `text`, found on `line` starting at 1-based column `column`
///
/// A `#` outside of a string ends the line.
pub fn tokenize(text: &str, line: usize, column: usize) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut offset = 0;

    while offset < text.len() {
        let rest = &text[offset..];
        let col = column + offset;
        let Some(c) = rest.chars().next() else {
            break;
        };

        if c.is_whitespace() {
            offset += c.len_utf8();
            continue;
        }

        if c == '#' {
            break;
        }

        if let Some(m) = name_pattern().find(rest) {
            tokens.push(Token {
                kind: TokenKind::Name,
                text: m.as_str().to_string(),
                column: col,
            });
            offset += m.end();
            continue;
        }

        let (kind, len) = match c {
            ':' if rest.starts_with(":=") => (TokenKind::ColonEquals, 2),
            ':' => (TokenKind::Colon, 1),
            '=' => (TokenKind::Equals, 1),
            '+' => (TokenKind::Plus, 1),
            '*' => (TokenKind::Star, 1),
            '$' => (TokenKind::Dollar, 1),
            '@' => (TokenKind::At, 1),
            '?' => (TokenKind::Question, 1),
            ',' => (TokenKind::Comma, 1),
            '(' => (TokenKind::ParenL, 1),
            ')' => (TokenKind::ParenR, 1),
            '[' => (TokenKind::BracketL, 1),
            ']' => (TokenKind::BracketR, 1),
            '\'' => {
                let (contents, len) = delimited(rest, '\'', line, col, "string")?;
                tokens.push(Token {
                    kind: TokenKind::RawString,
                    text: contents.to_string(),
                    column: col,
                });
                offset += len;
                continue;
            }
            '`' => {
                let (contents, len) = delimited(rest, '`', line, col, "backtick")?;
                tokens.push(Token {
                    kind: TokenKind::Backtick,
                    text: contents.to_string(),
                    column: col,
                });
                offset += len;
                continue;
            }
            '"' => {
                let (contents, len) = cooked_string(rest, line, col)?;
                tokens.push(Token {
                    kind: TokenKind::String,
                    text: contents,
                    column: col,
                });
                offset += len;
                continue;
            }
            other => {
                return Err(SyntaxError::new(
                    line,
                    col,
                    format!("unexpected character '{}'", other),
                ))
            }
        };

        tokens.push(Token {
            kind,
            text: rest[..len].to_string(),
            column: col,
        });
        offset += len;
    }

    Ok(tokens)
}

/// Contents between a pair of `delimiter`s, and the consumed length
fn delimited<'a>(
    rest: &'a str,
    delimiter: char,
    line: usize,
    column: usize,
    what: &str,
) -> Result<(&'a str, usize), SyntaxError> {
    let body = &rest[1..];
    match body.find(delimiter) {
        Some(end) => Ok((&body[..end], end + 2)),
        None => Err(SyntaxError::new(
            line,
            column,
            format!("unterminated {}", what),
        )),
    }
}

/// Double-quoted string with escape processing
fn cooked_string(rest: &str, line: usize, column: usize) -> Result<(String, usize), SyntaxError> {
    let mut cooked = String::new();
    let mut chars = rest.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((cooked, i + 1)),
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                match escaped {
                    'n' => cooked.push('\n'),
                    't' => cooked.push('\t'),
                    'r' => cooked.push('\r'),
                    '"' => cooked.push('"'),
                    '\\' => cooked.push('\\'),
                    other => {
                        return Err(SyntaxError::new(
                            line,
                            column + i,
                            format!("unknown escape sequence '\\{}'", other),
                        ))
                    }
                }
            }
            c => cooked.push(c),
        }
    }

    Err(SyntaxError::new(line, column, "unterminated string"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text, 1, 1)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_assignment() {
        let tokens = tokenize("greeting := \"hi\" + name", 1, 1).unwrap();
        assert_eq!(tokens[0].text, "greeting");
        assert_eq!(tokens[1].kind, TokenKind::ColonEquals);
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[2].text, "hi");
        assert_eq!(tokens[3].kind, TokenKind::Plus);
        assert_eq!(tokens[4].column, 20);
    }

    #[test]
    fn test_tokenize_recipe_header() {
        assert_eq!(
            kinds("@build $target mode='x' *rest: (dep 'a') other"),
            vec![
                TokenKind::At,
                TokenKind::Name,
                TokenKind::Dollar,
                TokenKind::Name,
                TokenKind::Name,
                TokenKind::Equals,
                TokenKind::RawString,
                TokenKind::Star,
                TokenKind::Name,
                TokenKind::Colon,
                TokenKind::ParenL,
                TokenKind::Name,
                TokenKind::RawString,
                TokenKind::ParenR,
                TokenKind::Name,
            ]
        );
    }

    #[test]
    fn test_names_may_contain_dashes() {
        let tokens = tokenize("docker-build: lint", 1, 1).unwrap();
        assert_eq!(tokens[0].text, "docker-build");
        assert!(is_name("no-exit-on-error"));
        assert!(!is_name("1abc"));
        assert!(!is_name("a b"));
    }

    #[test]
    fn test_comment_ends_line() {
        assert_eq!(kinds("a := 'x' # trailing"), kinds("a := 'x'"));
        assert_eq!(tokenize("a := '#not a comment'", 1, 1).unwrap()[2].text, "#not a comment");
    }

    #[test]
    fn test_escapes() {
        let tokens = tokenize(r#""a\tb\n\"c\"\\""#, 1, 1).unwrap();
        assert_eq!(tokens[0].text, "a\tb\n\"c\"\\");

        let raw = tokenize(r"'a\tb'", 1, 1).unwrap();
        assert_eq!(raw[0].text, r"a\tb");
    }

    #[test]
    fn test_unterminated() {
        let err = tokenize("x := 'abc", 4, 1).unwrap_err();
        assert_eq!(err.line, 4);
        assert_eq!(err.column, 6);
        assert!(err.message.contains("unterminated string"));

        assert!(tokenize("x := `date", 1, 1).is_err());
        assert!(tokenize("x := \"abc", 1, 1).is_err());
        assert!(tokenize(r#"x := "\q""#, 1, 1).is_err());
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("a := ;", 1, 1).unwrap_err();
        assert!(err.message.contains("unexpected character ';'"));
    }
}
