//! Integration tests for the chromebot binary

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

/// Helper to create a temporary script
fn script(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".cbs")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp file");
    file
}

/// Run the binary with an empty config and logging silenced
fn chromebot(args: &[&str]) -> Output {
    let config = NamedTempFile::new().expect("Failed to create config file");
    Command::new(env!("CARGO_BIN_EXE_chromebot"))
        .arg("--config")
        .arg(config.path())
        .args(args)
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute chromebot")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_run_prints_returned_value() {
    let file = script("x = 40\nreturn x + 2\n");
    let output = chromebot(&[file.path().to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "42");
}

#[test]
fn test_run_subcommand_with_print() {
    let file = script("name = \"bot\"\nprintln(\"hello\", name)\n");
    let output = chromebot(&["run", file.path().to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "hello bot\n");
}

#[test]
fn test_run_reports_diagnostics_and_continues() {
    let file = script("a = 1 / 0\nreturn \"done\"\n");
    let output = chromebot(&["run", file.path().to_str().unwrap()]);

    assert!(output.status.success());
    assert!(stderr(&output).contains("division by zero"));
    assert!(stdout(&output).contains("\"done\""));
}

#[test]
fn test_fatal_error_exits_with_failure() {
    let file = script("x = 1\ny = nope\nprintln(\"unreachable\")\n");
    let output = chromebot(&["run", file.path().to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("undefined variable 'nope'"));
    assert!(!stdout(&output).contains("unreachable"));
}

#[test]
fn test_parse_errors_stop_the_script() {
    let file = script("println(\"side effect\")\nx = (1 +\n");
    let output = chromebot(&["run", file.path().to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Parse error"));
    assert!(!stdout(&output).contains("side effect"));
}

#[test]
fn test_parse_json_output() {
    let file = script("chrome init userpath=\"X\"\n");
    let output = chromebot(&["parse", "--format", "json", file.path().to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("valid JSON");
    let text = json.to_string();
    assert!(text.contains("\"Chrome\""));
    assert!(text.contains("\"userpath=X\""));
}

#[test]
fn test_check_multiple_files() {
    let good = script("x = 1\n");
    let bad = script("while {\n");

    let output = chromebot(&["check", good.path().to_str().unwrap()]);
    assert!(output.status.success());

    let output = chromebot(&[
        "check",
        good.path().to_str().unwrap(),
        bad.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("error(s)"));
}

#[test]
fn test_invalid_config_is_reported() {
    let mut config = NamedTempFile::new().unwrap();
    writeln!(config, "[http]\ntimeout_ms = \"soon\"").unwrap();
    let file = script("x = 1\n");

    let output = Command::new(env!("CARGO_BIN_EXE_chromebot"))
        .arg("--config")
        .arg(config.path())
        .arg(file.path())
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute chromebot");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("configuration"));
}

#[test]
fn test_missing_script_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.cbs");
    let output = chromebot(&[missing.to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to read"));
}
