//! CLI utilities and helpers

use colored::*;

use crate::error::{format_diagnostic, format_fatal_error, format_parse_error, ParseErrors};
use crate::evaluator::{Abort, Outcome};
use crate::value::Value;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".cyan().bold(), msg);
}

/// Print every parse error with its source excerpt
pub fn report_parse_errors(errors: &ParseErrors, source: &str) {
    for error in &errors.0 {
        eprintln!("{}", format_parse_error(error, source));
    }
}

/// Print a run's diagnostics and, for a finished run, its value.
///
/// Returns false when the run was aborted.
pub fn report_run(result: &Result<Outcome, Abort>, source: &str) -> bool {
    match result {
        Ok(outcome) => {
            for diagnostic in &outcome.diagnostics {
                eprintln!("{}", format_diagnostic(diagnostic, source));
            }
            if let Some(value) = &outcome.value {
                println!("{}", format_value(value));
            }
            true
        }
        Err(abort) => {
            for diagnostic in &abort.diagnostics {
                eprintln!("{}", format_diagnostic(diagnostic, source));
            }
            eprintln!("{}", format_fatal_error(&abort.error, source));
            false
        }
    }
}

/// Colored rendering of a value for terminal output
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(_) => value.repr().yellow().to_string(),
        Value::Int(_) | Value::Float(_) => value.to_string().cyan().to_string(),
        Value::Bool(b) => b.to_string().magenta().to_string(),
        Value::Null => "null".dimmed().to_string(),
        Value::Callable(_) => value.to_string().blue().to_string(),
        Value::List(_) | Value::Dict(_) => value.repr(),
    }
}
