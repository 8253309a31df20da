//! The `chrome` statement
//!
//! Each `chrome` line carries one browser command plus optional post-actions:
//!
//! ```text
//! chrome init size=1280*800 userpath="/tmp/profile"
//! chrome req="https://example.test" to=page save="page.html"
//! chrome input="bot" xpath="//input[@name='q']"
//! chrome table=get to=tabs
//! chrome close
//! ```
//!
//! The callable only decodes arguments. Automation is delegated to a
//! [`BrowserDriver`]; the bundled [`LoggingDriver`] records and logs.

use anyhow::{anyhow, bail, Context as _, Result};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::info;

use crate::args::DomainArgs;
use crate::config::ChromeConfig;
use crate::context::CallContext;
use crate::evaluator::Interpreter;
use crate::value::Value;

const KNOWN_KEYS: &[&str] = &[
    "init", "close", "size", "proxy", "userpath", "table", "req", "click", "xpath", "input",
    "check", "wait", "scroll", "screenshot", "to", "save",
];

/// Commands that may appear as bare words
const BARE_COMMANDS: &[&str] = &["init", "close", "table", "screenshot"];

/// Address reported for a tab that has not navigated anywhere
const BLANK_PAGE: &str = "about:blank";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    /// Parse `WIDTH*HEIGHT` (or `WIDTHxHEIGHT`)
    pub fn parse(text: &str) -> Result<Self> {
        let (w, h) = text
            .split_once(|c| c == '*' || c == 'x' || c == 'X')
            .ok_or_else(|| anyhow!("size must look like WIDTH*HEIGHT, got '{}'", text))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| anyhow!("size must look like WIDTH*HEIGHT, got '{}'", text))
        };
        Ok(Self {
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*{}", self.width, self.height)
    }
}

/// Tab operation selected by `table`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabOp {
    /// `table` or `table=new`: open a tab and select it
    New,
    /// `table=<n>`: select the n-th tab, counting from 1
    Select(usize),
    /// `table=get`: the address of every open tab
    List,
    /// `table=selected`: position of the selected tab, counting from 1
    Selected,
}

impl TabOp {
    fn parse(value: Option<&str>) -> Result<Self> {
        let Some(text) = value else {
            return Ok(TabOp::New);
        };
        match text.trim().to_ascii_lowercase().as_str() {
            "" | "new" => Ok(TabOp::New),
            "get" => Ok(TabOp::List),
            "selected" => Ok(TabOp::Selected),
            "set" => bail!("table=set needs a tab number, write table=<n>"),
            other => match other.parse::<usize>() {
                Ok(n) if n >= 1 => Ok(TabOp::Select(n)),
                _ => bail!(
                    "table expects new, get, selected or a tab number from 1, got '{}'",
                    text
                ),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrowserCommand {
    Init {
        size: Option<WindowSize>,
        proxy: Option<String>,
        userpath: Option<String>,
    },
    Close,
    Tab { op: TabOp },
    Navigate { url: String },
    Click { xpath: String },
    /// Type `text`, into `xpath` when given, else the focused element
    Input { text: String, xpath: Option<String> },
    /// Whether an element matching `xpath` exists
    Check { xpath: String },
    Wait { ms: u64 },
    Scroll { pixels: i64 },
    Screenshot { path: Option<String> },
}

impl BrowserCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BrowserCommand::Init { .. } => "init",
            BrowserCommand::Close => "close",
            BrowserCommand::Tab { .. } => "table",
            BrowserCommand::Navigate { .. } => "req",
            BrowserCommand::Click { .. } => "click",
            BrowserCommand::Input { .. } => "input",
            BrowserCommand::Check { .. } => "check",
            BrowserCommand::Wait { .. } => "wait",
            BrowserCommand::Scroll { .. } => "scroll",
            BrowserCommand::Screenshot { .. } => "screenshot",
        }
    }
}

/// One decoded `chrome` line
#[derive(Debug, Clone, PartialEq)]
pub struct ChromeLine {
    pub command: Option<BrowserCommand>,
    /// Variable receiving the captured text
    pub to: Option<String>,
    /// File receiving the captured text
    pub save: Option<String>,
}

impl ChromeLine {
    pub fn decode(args: &DomainArgs) -> Result<Self> {
        args.check_keys(KNOWN_KEYS, "chrome")?;
        if let Some(word) = args
            .flags
            .iter()
            .find(|f| !BARE_COMMANDS.iter().any(|c| f.eq_ignore_ascii_case(c)))
        {
            bail!("unknown chrome command '{}'", word);
        }

        let line = Self {
            command: decode_command(args)?,
            to: args.get_str("to"),
            save: args.get_str("save"),
        };
        if line.command.is_none() && line.to.is_none() && line.save.is_none() {
            bail!("chrome needs a command");
        }
        Ok(line)
    }
}

/// Pick the line's command. Earlier entries win when several are given.
fn decode_command(args: &DomainArgs) -> Result<Option<BrowserCommand>> {
    let present = |key: &str| args.has_flag(key) || args.has(key);

    let command = if present("init") {
        BrowserCommand::Init {
            size: args.get_str("size").map(|s| WindowSize::parse(&s)).transpose()?,
            proxy: args.get_str("proxy"),
            userpath: args.get_str("userpath"),
        }
    } else if present("close") {
        BrowserCommand::Close
    } else if present("table") {
        BrowserCommand::Tab {
            op: TabOp::parse(args.get_str("table").as_deref())?,
        }
    } else if let Some(url) = args.get_str("req") {
        BrowserCommand::Navigate { url }
    } else if let Some(xpath) = args.get_str("click") {
        BrowserCommand::Click { xpath }
    } else if let Some(text) = args.get_str("input") {
        BrowserCommand::Input {
            text,
            xpath: args.get_str("xpath"),
        }
    } else if let Some(xpath) = args.get_str("check") {
        BrowserCommand::Check { xpath }
    } else if let Some(ms) = args.get_int("wait")? {
        if ms < 0 {
            bail!("wait must not be negative, got {}", ms);
        }
        BrowserCommand::Wait { ms: ms as u64 }
    } else if let Some(pixels) = args.get_int("scroll")? {
        BrowserCommand::Scroll { pixels }
    } else if present("screenshot") {
        BrowserCommand::Screenshot {
            path: args.get_str("screenshot"),
        }
    } else {
        return Ok(None);
    };

    Ok(Some(command))
}

/// Browser automation backend
pub trait BrowserDriver {
    /// Run one command; the value is what `to=` captures
    fn execute(&mut self, command: &BrowserCommand) -> Result<Value>;

    /// HTML of the current page, captured by a bare `to=`/`save=` line
    fn page_html(&mut self) -> Result<String>;
}

/// Driver that records commands and logs them instead of driving a browser
#[derive(Debug, Default)]
pub struct LoggingDriver {
    defaults: ChromeConfig,
    session: Option<Session>,
    history: Vec<BrowserCommand>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub size: Option<WindowSize>,
    pub userpath: Option<String>,
    pub proxy: Option<String>,
    /// Address of each open tab; `None` until it navigates
    pub tabs: Vec<Option<String>>,
    /// Index into `tabs`
    pub selected: usize,
}

impl Session {
    /// Address of the selected tab
    pub fn url(&self) -> Option<&str> {
        self.tabs.get(self.selected).and_then(|url| url.as_deref())
    }
}

impl LoggingDriver {
    pub fn new(defaults: ChromeConfig) -> Self {
        Self {
            defaults,
            session: None,
            history: Vec::new(),
        }
    }

    /// Commands that reached the browser, in order
    pub fn history(&self) -> &[BrowserCommand] {
        &self.history
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn session_mut(&mut self, command: &BrowserCommand) -> Result<&mut Session> {
        self.session.as_mut().ok_or_else(|| {
            anyhow!(
                "browser is not initialised; `chrome init` before `{}`",
                command.name()
            )
        })
    }
}

impl BrowserDriver for LoggingDriver {
    fn execute(&mut self, command: &BrowserCommand) -> Result<Value> {
        let result = match command {
            BrowserCommand::Init {
                size,
                proxy,
                userpath,
            } => {
                if self.session.is_some() {
                    info!("browser already initialised, ignoring init");
                    return Ok(Value::Null);
                }
                let size = match size {
                    Some(size) => Some(*size),
                    None => self
                        .defaults
                        .size
                        .as_deref()
                        .map(WindowSize::parse)
                        .transpose()
                        .context("invalid chrome.size in configuration")?,
                };
                let session = Session {
                    size,
                    userpath: userpath.clone().or_else(|| self.defaults.userpath.clone()),
                    proxy: proxy.clone(),
                    tabs: vec![None],
                    selected: 0,
                };
                info!(
                    size = ?session.size.map(|s| s.to_string()),
                    userpath = ?session.userpath,
                    "browser init"
                );
                self.session = Some(session);
                Value::Null
            }
            BrowserCommand::Close => {
                self.session_mut(command)?;
                info!("browser close");
                self.session = None;
                Value::Null
            }
            BrowserCommand::Tab { op } => {
                let session = self.session_mut(command)?;
                match op {
                    TabOp::New => {
                        session.tabs.push(None);
                        session.selected = session.tabs.len() - 1;
                        info!(tabs = session.tabs.len(), "browser new tab");
                        Value::Null
                    }
                    TabOp::Select(n) => {
                        if *n > session.tabs.len() {
                            bail!("tab {} does not exist, {} open", n, session.tabs.len());
                        }
                        session.selected = n - 1;
                        info!(tab = *n, "browser select tab");
                        Value::Null
                    }
                    TabOp::List => Value::list(
                        session
                            .tabs
                            .iter()
                            .map(|url| Value::from(url.as_deref().unwrap_or(BLANK_PAGE)))
                            .collect(),
                    ),
                    TabOp::Selected => Value::Int(session.selected as i64 + 1),
                }
            }
            BrowserCommand::Navigate { url } => {
                let session = self.session_mut(command)?;
                session.tabs[session.selected] = Some(url.clone());
                info!(%url, "browser navigate");
                Value::Null
            }
            BrowserCommand::Click { xpath } => {
                self.session_mut(command)?;
                info!(%xpath, "browser click");
                Value::Null
            }
            BrowserCommand::Input { text, xpath } => {
                self.session_mut(command)?;
                info!(%text, xpath = ?xpath, "browser input");
                Value::Null
            }
            BrowserCommand::Check { xpath } => {
                self.session_mut(command)?;
                info!(%xpath, "browser check");
                // Nothing is rendered, so nothing matches
                Value::Bool(false)
            }
            BrowserCommand::Wait { ms } => {
                self.session_mut(command)?;
                info!(ms, "browser wait");
                Value::Null
            }
            BrowserCommand::Scroll { pixels } => {
                self.session_mut(command)?;
                info!(pixels, "browser scroll");
                Value::Null
            }
            BrowserCommand::Screenshot { path } => {
                self.session_mut(command)?;
                info!(path = ?path, "browser screenshot");
                Value::Null
            }
        };
        self.history.push(command.clone());
        Ok(result)
    }

    fn page_html(&mut self) -> Result<String> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| anyhow!("browser is not initialised; no page to capture"))?;
        Ok(match session.url() {
            Some(url) => format!("<html><head><base href=\"{}\"></head><body></body></html>", url),
            None => "<html><head></head><body></body></html>".to_string(),
        })
    }
}

/// Run one decoded line: the command, then `to=`, then `save=`
fn execute<D: BrowserDriver>(
    driver: &mut D,
    ctx: &mut CallContext<'_>,
    line: &ChromeLine,
) -> Result<Value> {
    let mut result = Value::Null;
    if let Some(command) = &line.command {
        info!(line = ctx.line(), command = command.name(), "chrome");
        result = driver.execute(command)?;
    }

    if line.to.is_none() && line.save.is_none() {
        return Ok(result);
    }

    let captured = if result.is_null() {
        Value::String(driver.page_html()?)
    } else {
        result
    };
    if let Some(name) = &line.to {
        ctx.set_var(name, captured.clone());
    }
    if let Some(path) = &line.save {
        std::fs::write(path, captured.to_string())
            .with_context(|| format!("saving capture to {}", path))?;
    }
    Ok(captured)
}

/// Register the `chrome` callable over a shared driver
pub fn register<D: BrowserDriver + 'static>(interpreter: &mut Interpreter, driver: Rc<RefCell<D>>) {
    interpreter.register("chrome", move |ctx, args| {
        let args = DomainArgs::parse(ctx, &args, &["to"])?;
        let line = ChromeLine::decode(&args)?;
        let mut driver = driver.borrow_mut();
        execute(&mut *driver, ctx, &line)
    });
}
