//! chromebot - a small scripting language for browser and HTTP automation
//!
//! Scripts are lexed with a pest grammar, parsed by a recursive-descent
//! parser into an AST and run by a tree-walking interpreter. `chrome` and
//! `http` lines are handed to host callables registered on the interpreter.
//!
//! ```no_run
//! use chromebot::{parse_str, Interpreter};
//!
//! let program = parse_str("x = \"ab\"->upper->repeat(2)").unwrap();
//! let mut interpreter = Interpreter::new();
//! interpreter.run(&program).unwrap();
//! assert_eq!(interpreter.get_var("x").unwrap().to_string(), "ABAB");
//! ```

pub mod args;
pub mod ast;
pub mod chrome;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod http;
pub mod lexer;
pub mod parser;
pub mod value;

// CLI-only modules
#[cfg(feature = "cli")]
pub mod repl;

// Re-export commonly used types
pub use ast::{Expression, Program, Statement};
pub use config::Config;
pub use context::CallContext;
pub use error::{Diagnostic, FatalError, ParseError, ParseErrors};
pub use evaluator::{Abort, Interpreter, Outcome};
pub use lexer::{Lexer, Token, TokenKind};
pub use value::{Callable, Value};

/// Parse a script from a string
pub fn parse_str(input: &str) -> std::result::Result<Program, ParseErrors> {
    parser::parse(input)
}

/// chromebot version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
