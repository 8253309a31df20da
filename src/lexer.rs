//! Lexer module for chromebot - tokenizes source code before parsing
//!
//! This module provides the first half of a two-phase front end:
//! 1. Lexer: Source code → Token stream
//! 2. Parser: Token stream → AST
//!
//! Tokens keep their source positions because the `chrome`/`http`
//! statements split their arguments by line and by adjacency.

use anyhow::{anyhow, Result};
use pest::Parser;
use pest_derive::Parser;

use crate::error::ParseError;

#[derive(Parser)]
#[grammar = "lexer.pest"]
struct LexerParser;

/// Position information for a token
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// A token with its value and position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    /// Text of the token as used by the line-scoped argument tokenizer:
    /// string content with its quotes stripped, source text otherwise.
    pub fn literal(&self) -> String {
        match &self.kind {
            TokenKind::String(s) => s.clone(),
            _ => self.span.text.clone(),
        }
    }

    pub fn line(&self) -> usize {
        self.span.start.line
    }
}

/// Span of source text
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
    pub text: String,
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Var,
    If,
    Else,
    While,
    For,
    Switch,
    Case,
    Default,
    Return,
    Break,
    Continue,
    True,
    False,
    Null,
    Chrome,
    Http,

    // Literals
    Identifier(String),
    Integer(i64),
    Float(f64),
    String(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    EqualEqual,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AndAnd,
    OrOr,
    Bang,
    PlusPlus,
    MinusMinus,
    Arrow,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Semicolon,
    Colon,
    Dot,

    /// Any character the grammar has no token for. Free-form `chrome`
    /// arguments may contain these; expressions may not.
    Unknown(char),

    Eof,
}

/// Lexer for chromebot source code
pub struct Lexer<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            source,
            line_starts,
            tokens: Vec::new(),
        }
    }

    /// Tokenize the entire source, appending a trailing `Eof` token
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let pairs = LexerParser::parse(Rule::tokens, self.source)
            .map_err(|e| anyhow!("Lexer error: {}", e))?;

        for pair in pairs {
            if pair.as_rule() == Rule::tokens {
                for inner in pair.into_inner() {
                    if inner.as_rule() == Rule::token {
                        if let Some(token) = self.process_token(inner)? {
                            self.tokens.push(token);
                        }
                    }
                }
            }
        }

        let eof_pos = self.position_from_offset(self.source.len());
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span {
                start: eof_pos.clone(),
                end: eof_pos,
                text: String::new(),
            },
        });

        Ok(std::mem::take(&mut self.tokens))
    }

    /// Process a single token pair
    fn process_token(&self, pair: pest::iterators::Pair<Rule>) -> Result<Option<Token>> {
        let span = self.span_from_pair(&pair);

        for inner in pair.into_inner() {
            let kind = match inner.as_rule() {
                Rule::keyword_token => match inner.as_str() {
                    "var" => TokenKind::Var,
                    "if" => TokenKind::If,
                    "else" => TokenKind::Else,
                    "while" => TokenKind::While,
                    "for" => TokenKind::For,
                    "switch" => TokenKind::Switch,
                    "case" => TokenKind::Case,
                    "default" => TokenKind::Default,
                    "return" => TokenKind::Return,
                    "break" => TokenKind::Break,
                    "continue" => TokenKind::Continue,
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "null" => TokenKind::Null,
                    "chrome" => TokenKind::Chrome,
                    "http" => TokenKind::Http,
                    kw => return Err(anyhow!("Unknown keyword: {}", kw)),
                },

                Rule::identifier_token => TokenKind::Identifier(inner.as_str().to_string()),

                Rule::number_token => {
                    let text = inner.as_str();
                    if text.contains('.') {
                        let f: f64 = text
                            .parse()
                            .map_err(|_| anyhow!("Invalid float: {}", text))?;
                        TokenKind::Float(f)
                    } else {
                        let i: i64 = text.parse().map_err(|_| {
                            ParseError::new(
                                format!("integer literal out of range: {}", text),
                                span.start.line,
                                span.start.column,
                            )
                        })?;
                        TokenKind::Integer(i)
                    }
                }

                Rule::string_token => TokenKind::String(unquote(inner.as_str())),

                Rule::operator_token => match inner.as_str() {
                    "->" => TokenKind::Arrow,
                    "++" => TokenKind::PlusPlus,
                    "--" => TokenKind::MinusMinus,
                    "==" => TokenKind::EqualEqual,
                    "!=" => TokenKind::NotEqual,
                    "<=" => TokenKind::LessEqual,
                    ">=" => TokenKind::GreaterEqual,
                    "&&" => TokenKind::AndAnd,
                    "||" => TokenKind::OrOr,
                    "+" => TokenKind::Plus,
                    "-" => TokenKind::Minus,
                    "*" => TokenKind::Star,
                    "/" => TokenKind::Slash,
                    "%" => TokenKind::Percent,
                    "=" => TokenKind::Equal,
                    "<" => TokenKind::Less,
                    ">" => TokenKind::Greater,
                    "!" => TokenKind::Bang,
                    op => return Err(anyhow!("Unknown operator: {}", op)),
                },

                Rule::punctuation_token => match inner.as_str() {
                    "(" => TokenKind::LeftParen,
                    ")" => TokenKind::RightParen,
                    "[" => TokenKind::LeftBracket,
                    "]" => TokenKind::RightBracket,
                    "{" => TokenKind::LeftBrace,
                    "}" => TokenKind::RightBrace,
                    "," => TokenKind::Comma,
                    ";" => TokenKind::Semicolon,
                    ":" => TokenKind::Colon,
                    "." => TokenKind::Dot,
                    p => return Err(anyhow!("Unknown punctuation: {}", p)),
                },

                Rule::unknown_token => {
                    let c = inner.as_str().chars().next().unwrap_or('\0');
                    if matches!(c, '"' | '\'' | '`') {
                        return Err(ParseError::new(
                            "unterminated string literal",
                            span.start.line,
                            span.start.column,
                        )
                        .into());
                    }
                    TokenKind::Unknown(c)
                }

                _ => continue,
            };

            return Ok(Some(Token { kind, span }));
        }

        Ok(None)
    }

    /// Create a Span from a pest Pair
    fn span_from_pair(&self, pair: &pest::iterators::Pair<Rule>) -> Span {
        let pest_span = pair.as_span();
        Span {
            start: self.position_from_offset(pest_span.start()),
            end: self.position_from_offset(pest_span.end()),
            text: pair.as_str().to_string(),
        }
    }

    /// Calculate line and column from byte offset
    fn position_from_offset(&self, offset: usize) -> Position {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line_start = self.line_starts[line_idx];
        let column = self.source[line_start..offset].chars().count() + 1;

        Position {
            line: line_idx + 1,
            column,
            offset,
        }
    }
}

/// Strip the quotes from a string token. Backtick strings are raw,
/// the other two styles process escapes.
fn unquote(text: &str) -> String {
    let quote = text.chars().next().unwrap_or('"');
    let body = &text[quote.len_utf8()..text.len() - quote.len_utf8()];
    if quote == '`' {
        body.to_string()
    } else {
        unescape_string(body)
    }
}

/// Unescape a string (handle \n, \t, etc.)
fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('\\') => result.push('\\'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Convenience function to tokenize a string
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    lexer.tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_keywords() {
        let tokens = tokenize("var if else while").unwrap();
        assert_eq!(tokens.len(), 5); // 4 keywords + EOF
        assert!(matches!(tokens[0].kind, TokenKind::Var));
        assert!(matches!(tokens[1].kind, TokenKind::If));
        assert!(matches!(tokens[2].kind, TokenKind::Else));
        assert!(matches!(tokens[3].kind, TokenKind::While));
    }

    #[test]
    fn test_keyword_vs_identifier() {
        // "for" is a keyword, "format" is an identifier
        let tokens = tokenize("for format chromedriver").unwrap();
        assert_eq!(tokens.len(), 4);
        assert!(matches!(tokens[0].kind, TokenKind::For));
        assert!(matches!(&tokens[1].kind, TokenKind::Identifier(s) if s == "format"));
        assert!(matches!(&tokens[2].kind, TokenKind::Identifier(s) if s == "chromedriver"));
    }

    #[test]
    fn test_tokenize_numbers() {
        let tokens = tokenize("42 3.25 7").unwrap();
        assert!(matches!(tokens[0].kind, TokenKind::Integer(42)));
        assert!(matches!(tokens[1].kind, TokenKind::Float(f) if f == 3.25));
        assert!(matches!(tokens[2].kind, TokenKind::Integer(7)));
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        assert!(tokenize("99999999999999999999").is_err());
    }

    #[test]
    fn test_tokenize_string_styles() {
        let tokens = tokenize(r#""a\tb" 'it\'s' `//*[@id="kw"]`"#).unwrap();
        assert!(matches!(&tokens[0].kind, TokenKind::String(s) if s == "a\tb"));
        assert!(matches!(&tokens[1].kind, TokenKind::String(s) if s == "it's"));
        assert!(matches!(&tokens[2].kind, TokenKind::String(s) if s == r#"//*[@id="kw"]"#));
    }

    #[test]
    fn test_backtick_strings_are_raw() {
        let tokens = tokenize(r"`a\nb`").unwrap();
        assert!(matches!(&tokens[0].kind, TokenKind::String(s) if s == r"a\nb"));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("x = \"abc").is_err());
    }

    #[test]
    fn test_tokenize_operators() {
        let tokens = tokenize("+ - * / == != <= >= && || -> ++ --").unwrap();
        assert!(matches!(tokens[0].kind, TokenKind::Plus));
        assert!(matches!(tokens[1].kind, TokenKind::Minus));
        assert!(matches!(tokens[2].kind, TokenKind::Star));
        assert!(matches!(tokens[3].kind, TokenKind::Slash));
        assert!(matches!(tokens[4].kind, TokenKind::EqualEqual));
        assert!(matches!(tokens[5].kind, TokenKind::NotEqual));
        assert!(matches!(tokens[6].kind, TokenKind::LessEqual));
        assert!(matches!(tokens[7].kind, TokenKind::GreaterEqual));
        assert!(matches!(tokens[8].kind, TokenKind::AndAnd));
        assert!(matches!(tokens[9].kind, TokenKind::OrOr));
        assert!(matches!(tokens[10].kind, TokenKind::Arrow));
        assert!(matches!(tokens[11].kind, TokenKind::PlusPlus));
        assert!(matches!(tokens[12].kind, TokenKind::MinusMinus));
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = tokenize("x // trailing\n/* block\n */ y").unwrap();
        assert_eq!(tokens.len(), 3);
        assert!(matches!(&tokens[1].kind, TokenKind::Identifier(s) if s == "y"));
        assert_eq!(tokens[1].span.start.line, 3);
    }

    #[test]
    fn test_unknown_characters_become_tokens() {
        let tokens = tokenize("a@b").unwrap();
        assert!(matches!(tokens[1].kind, TokenKind::Unknown('@')));
    }

    #[test]
    fn test_position_tracking() {
        let tokens = tokenize("x\n  y").unwrap();
        assert_eq!(tokens[0].span.start.line, 1);
        assert_eq!(tokens[0].span.start.column, 1);
        assert_eq!(tokens[1].span.start.line, 2);
        assert_eq!(tokens[1].span.start.column, 3);
        assert_eq!(tokens[1].span.start.offset, 4);
    }

    #[test]
    fn test_literal_strips_quotes() {
        let tokens = tokenize(r#"userpath "D:/chrome""#).unwrap();
        assert_eq!(tokens[0].literal(), "userpath");
        assert_eq!(tokens[1].literal(), "D:/chrome");
    }
}
