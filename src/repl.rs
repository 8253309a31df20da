//! REPL (Read-Eval-Print Loop) for chromebot
//!
//! Each entry runs against one long-lived interpreter, so top-level
//! variables carry over between entries. An entry continues onto further
//! lines while it has unclosed `{`, `(` or `[`.

use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::{history::FileHistory, CompletionType, Editor};

use crate::cli;
use crate::config::Config;
use crate::evaluator::Interpreter;
use crate::parser::parse;

const PROMPT: &str = ">>> ";
const CONTINUATION_PROMPT: &str = "... ";

/// Commands handled by the REPL itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quit,
    Help,
    Vars,
    Clear,
}

impl Command {
    fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "exit" | "quit" | ":q" | ":quit" => Some(Command::Quit),
            ":help" | ":h" => Some(Command::Help),
            ":vars" | ":v" => Some(Command::Vars),
            ":clear" | ":c" => Some(Command::Clear),
            _ => None,
        }
    }
}

/// Run the interactive REPL
pub fn run_repl(config: &Config) -> Result<()> {
    println!("{}", format!("chromebot v{}", crate::VERSION).cyan().bold());
    println!("{}", "Type :help for help, exit to quit".dimmed());
    println!();

    let editor_config = rustyline::Config::builder()
        .completion_type(CompletionType::List)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), FileHistory> = Editor::with_config(editor_config)?;

    let history_path = config.history_path();
    if let Some(path) = &history_path {
        // Missing on first start
        let _ = rl.load_history(path);
    }

    let mut interpreter = Interpreter::with_config(config);
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() {
            PROMPT.green().bold().to_string()
        } else {
            CONTINUATION_PROMPT.yellow().bold().to_string()
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                if buffer.is_empty() {
                    if let Some(command) = Command::parse(&line) {
                        match command {
                            Command::Quit => break,
                            Command::Help => print_help(&interpreter),
                            Command::Vars => print_variables(&interpreter),
                            Command::Clear => {
                                interpreter.clear_variables();
                                cli::success("Variables cleared");
                            }
                        }
                        continue;
                    }
                }

                buffer.push_str(&line);
                buffer.push('\n');
                if is_incomplete(&buffer) {
                    continue;
                }

                let input = std::mem::take(&mut buffer);
                if input.trim().is_empty() {
                    continue;
                }
                eval_entry(&mut interpreter, &input);
            }
            Err(ReadlineError::Interrupted) => {
                if !buffer.is_empty() {
                    buffer.clear();
                    continue;
                }
                println!("{}", "Use exit to quit".dimmed());
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                cli::error(&format!("{:?}", err));
                break;
            }
        }
    }

    if let Some(path) = history_path {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        let _ = rl.save_history(&path);
    }

    println!("{}", "Goodbye!".cyan());
    Ok(())
}

fn eval_entry(interpreter: &mut Interpreter, input: &str) {
    match parse(input) {
        Ok(program) => {
            let result = interpreter.run(&program);
            cli::report_run(&result, input);
        }
        Err(errors) => cli::report_parse_errors(&errors, input),
    }
}

/// Whether `input` still has unclosed brackets outside strings and comments
fn is_incomplete(input: &str) -> bool {
    let mut depth: i64 = 0;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => {
                            chars.next();
                        }
                        '\n' => break,
                        q if q == c => break,
                        _ => {}
                    }
                }
            }
            '`' => {
                for inner in chars.by_ref() {
                    if inner == '`' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            _ => {}
        }
    }

    depth > 0
}

fn print_help(interpreter: &Interpreter) {
    println!("{}", "REPL Commands:".cyan().bold());
    println!("  {}  - Show this help message", ":help, :h".green());
    println!("  {}  - Exit the REPL", "exit, quit, :q".green());
    println!("  {}  - Clear all variables", ":clear, :c".green());
    println!("  {}  - Show all variables", ":vars, :v".green());
    println!();
    println!("{}", "Functions:".cyan().bold());
    for line in interpreter.function_names().chunks(8) {
        println!("  {}", line.join(", "));
    }
    println!();
    println!("{}", "Examples:".cyan().bold());
    println!("  {}", "x = 40 + 2".dimmed());
    println!("  {}", "\"ab\"->upper->repeat(2)".dimmed());
    println!("  {}", "http get url=\"https://example.com\" to=res".dimmed());
    println!("  {}", "while i < 3 {".dimmed());
    println!("  {}", "    i++".dimmed());
    println!("  {}", "}".dimmed());
}

fn print_variables(interpreter: &Interpreter) {
    let globals = interpreter.globals();
    if globals.is_empty() {
        println!("{}", "No variables defined".dimmed());
        return;
    }

    println!("{}", "Variables:".cyan().bold());
    for (name, value) in globals {
        println!("  {} = {}", name.green(), cli::format_value(&value));
    }
}
