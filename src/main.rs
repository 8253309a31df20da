//! chromebot CLI - run, check and explore automation scripts

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use chromebot::cli;
use chromebot::config::Config;
use chromebot::evaluator::Interpreter;

#[derive(Parser)]
#[command(name = "chromebot")]
#[command(about = "Scripting language for browser automation and HTTP workflows", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Script to run; starts the REPL when omitted
    file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script
    Run {
        /// Path to the script
        path: PathBuf,
    },

    /// Parse a script and display its AST
    Parse {
        /// Path to the script
        path: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = AstFormat::Debug)]
        format: AstFormat,
    },

    /// Check that scripts parse, without running them
    Check {
        /// Paths to the scripts
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Start interactive REPL (Read-Eval-Print Loop)
    Repl,
}

#[derive(Clone, Copy, ValueEnum)]
enum AstFormat {
    Debug,
    Json,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            cli::error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    init_tracing(args.verbose, config.log_level.as_deref());

    let code = match (args.command, args.file) {
        (Some(Commands::Run { path }), _) | (None, Some(path)) => run_script(&path, &config)?,
        (Some(Commands::Parse { path, format }), _) => parse_script(&path, format)?,
        (Some(Commands::Check { paths }), _) => check_scripts(&paths),
        (Some(Commands::Repl), _) | (None, None) => {
            chromebot::repl::run_repl(&config)?;
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// `RUST_LOG` wins, then `--verbose`, then the configured level
fn init_tracing(verbose: bool, configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose {
            "debug"
        } else {
            configured.unwrap_or("warn")
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_script(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn run_script(path: &Path, config: &Config) -> Result<i32> {
    let source = read_script(path)?;

    let program = match chromebot::parse_str(&source) {
        Ok(program) => program,
        Err(errors) => {
            cli::report_parse_errors(&errors, &source);
            return Ok(1);
        }
    };

    let mut interpreter = Interpreter::with_config(config);
    let result = interpreter.run(&program);
    Ok(if cli::report_run(&result, &source) { 0 } else { 1 })
}

fn parse_script(path: &Path, format: AstFormat) -> Result<i32> {
    let source = read_script(path)?;

    match chromebot::parse_str(&source) {
        Ok(program) => {
            match format {
                AstFormat::Debug => println!("{:#?}", program),
                AstFormat::Json => println!("{}", serde_json::to_string_pretty(&program)?),
            }
            Ok(0)
        }
        Err(errors) => {
            cli::report_parse_errors(&errors, &source);
            Ok(1)
        }
    }
}

fn check_scripts(paths: &[PathBuf]) -> i32 {
    let mut failed = 0;

    for path in paths {
        let source = match read_script(path) {
            Ok(source) => source,
            Err(e) => {
                cli::error(&format!("{:#}", e));
                failed += 1;
                continue;
            }
        };

        match chromebot::parse_str(&source) {
            Ok(_) => cli::success(&path.display().to_string()),
            Err(errors) => {
                cli::error(&format!("{}: {} error(s)", path.display(), errors.0.len()));
                cli::report_parse_errors(&errors, &source);
                failed += 1;
            }
        }
    }

    if failed == 0 {
        cli::info(&format!("{} file(s) checked", paths.len()));
        0
    } else {
        1
    }
}
