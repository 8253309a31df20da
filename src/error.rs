//! Error types and formatting for chromebot
//!
//! Three error classes are kept apart:
//! - [`ParseError`]: collected by the parser; a script with any of them is not run
//! - [`Diagnostic`]: recoverable evaluation errors, the offending expression yields null
//! - [`FatalError`]: aborts the running script and returns control to the host

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::ast::SourceSpan;

/// A syntax error with the position of the offending token
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// All parse errors of one script
#[derive(Debug, Clone, PartialEq, Error)]
pub struct ParseErrors(pub Vec<ParseError>);

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("\n"))
    }
}

/// Errors that terminate the current script
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FatalError {
    #[error("line {line}: undefined variable '{name}'")]
    UndefinedVariable {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("line {line}: undefined function '{name}'")]
    UndefinedFunction {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("line {line}: undefined function or variable '{name}'")]
    UndefinedName {
        name: String,
        line: usize,
        column: usize,
    },
}

impl FatalError {
    pub fn undefined_variable(name: &str, span: SourceSpan) -> Self {
        FatalError::UndefinedVariable {
            name: name.to_string(),
            line: span.line,
            column: span.column,
        }
    }

    pub fn undefined_function(name: &str, span: SourceSpan) -> Self {
        FatalError::UndefinedFunction {
            name: name.to_string(),
            line: span.line,
            column: span.column,
        }
    }

    pub fn undefined_name(name: &str, span: SourceSpan) -> Self {
        FatalError::UndefinedName {
            name: name.to_string(),
            line: span.line,
            column: span.column,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            FatalError::UndefinedVariable { line, .. }
            | FatalError::UndefinedFunction { line, .. }
            | FatalError::UndefinedName { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            FatalError::UndefinedVariable { column, .. }
            | FatalError::UndefinedFunction { column, .. }
            | FatalError::UndefinedName { column, .. } => *column,
        }
    }
}

/// A recoverable evaluation error
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            line: span.line,
            column: span.column,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Format a parse error with context and helpful information
pub fn format_parse_error(error: &ParseError, input: &str) -> String {
    let mut output = format!("{} {}\n", "Parse error:".red().bold(), error.message);
    output.push_str(&source_excerpt(input, error.line, error.column));
    output.push_str(&get_error_hint(input.lines().nth(error.line.saturating_sub(1))));
    output
}

/// Format a fatal error the same way, pointing at the failing name
pub fn format_fatal_error(error: &FatalError, input: &str) -> String {
    let mut output = format!("{} {}\n", "Runtime error:".red().bold(), error);
    output.push_str(&source_excerpt(input, error.line(), error.column()));
    output
}

/// Format a recoverable diagnostic as a warning
pub fn format_diagnostic(diagnostic: &Diagnostic, input: &str) -> String {
    let mut output = format!("{} {}\n", "Warning:".yellow().bold(), diagnostic.message);
    output.push_str(&source_excerpt(input, diagnostic.line, diagnostic.column));
    output
}

/// Location arrow plus the offending line with one line of context each side
fn source_excerpt(input: &str, line: usize, col: usize) -> String {
    let mut output = format!(
        "  {} {}:{}\n",
        "-->".blue().bold(),
        "input".dimmed(),
        format!("{}:{}", line, col).cyan()
    );

    let lines: Vec<&str> = input.lines().collect();
    if line == 0 || line > lines.len() {
        return output;
    }
    let line_idx = line - 1;

    output.push_str(&format!("   {}\n", "|".blue()));

    if line_idx > 0 {
        output.push_str(&format!(
            " {} | {}\n",
            format!("{:3}", line - 1).blue().dimmed(),
            lines[line_idx - 1].dimmed()
        ));
    }

    output.push_str(&format!(
        " {} | {}\n",
        format!("{:3}", line).blue().bold(),
        lines[line_idx]
    ));

    let indicator = format!("{}^", " ".repeat(col.saturating_sub(1) + 3));
    output.push_str(&format!("   {} {}\n", "|".blue(), indicator.red().bold()));

    if line_idx + 1 < lines.len() {
        output.push_str(&format!(
            " {} | {}\n",
            format!("{:3}", line + 1).blue().dimmed(),
            lines[line_idx + 1].dimmed()
        ));
    }

    output.push_str(&format!("   {}\n", "|".blue()));
    output
}

/// Get a helpful hint based on the offending line
fn get_error_hint(line: Option<&str>) -> String {
    let Some(line) = line.map(str::trim) else {
        return String::new();
    };

    let hint = if line.matches('[').count() > line.matches(']').count() {
        "Missing closing bracket ']' for list"
    } else if line.matches('(').count() > line.matches(')').count() {
        "Missing closing parenthesis ')'"
    } else if (line.starts_with("if ") || line.starts_with("while ")) && !line.contains('{') {
        "The body of if/while must be a block: if condition { ... }"
    } else if line.starts_with("case ") && !line.contains(':') {
        "Case values end with a colon: case 1, 2:"
    } else {
        return String::new();
    };

    format!("\n  {} {}\n", "Hint:".yellow().bold(), hint)
}
