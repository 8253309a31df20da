//! User configuration loaded from TOML

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "chromebot";
const CONFIG_FILE: &str = "config.toml";
const HISTORY_FILE: &str = "history.txt";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Tracing filter used when neither `RUST_LOG` nor `--verbose` is given
    pub log_level: Option<String>,
    /// REPL history location
    pub history_file: Option<PathBuf>,
    pub http: HttpConfig,
    pub chrome: ChromeConfig,
}

/// Defaults for `http` statements
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub proxy: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            proxy: None,
        }
    }
}

/// Defaults for `chrome init`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChromeConfig {
    pub userpath: Option<String>,
    /// Window size as `WIDTH*HEIGHT`
    pub size: Option<String>,
}

impl Config {
    /// Load from `path`, or from the default location when `path` is None.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        Self::from_toml(&data).with_context(|| format!("parsing configuration {}", path.display()))
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Configured history file, else one next to the default config file
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(HISTORY_FILE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http.timeout_ms, 30_000);
        assert!(config.log_level.is_none());
        assert!(config.chrome.userpath.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
log_level = "info"

[chrome]
size = "1280*800"
"#,
        )
        .unwrap();
        assert_eq!(config.log_level.as_deref(), Some("info"));
        assert_eq!(config.chrome.size.as_deref(), Some("1280*800"));
        assert_eq!(config.http.timeout_ms, 30_000);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_toml("[http]\ntimeout_ms = \"soon\"").is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http]\ntimeout_ms = 500\nproxy = \"http://127.0.0.1:8888\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.http.timeout_ms, 500);
        assert_eq!(config.http.proxy.as_deref(), Some("http://127.0.0.1:8888"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/chromebot.toml"))).is_err());
    }
}
