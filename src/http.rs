//! The `http` statement
//!
//! ```text
//! http get url=target header=hdr timeout=3000 to=res
//! http post url="http://127.0.0.1:8080/api" body=payload ctype=json save="out.json"
//! ```
//!
//! The callable decodes its line arguments into an [`HttpRequest`], sends it
//! through an [`HttpTransport`] and hands back a result dict
//! `{code, body, header, req_time, err}`. Transport failures are reported in
//! `err` with `code` 0; malformed arguments are errors of the call itself.

use anyhow::{anyhow, bail, Context as _, Result};
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::args::DomainArgs;
use crate::config::HttpConfig;
use crate::context::CallContext;
use crate::evaluator::Interpreter;
use crate::functions::value_to_json;
use crate::value::Value;

const KNOWN_KEYS: &[&str] = &[
    "method", "url", "body", "header", "ctype", "cookie", "timeout", "proxy", "stress", "save",
    "to",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Options,
    Head,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
        }
    }
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            "delete" => Ok(Method::Delete),
            "options" => Ok(Method::Options),
            "head" => Ok(Method::Head),
            "patch" => Ok(Method::Patch),
            _ => bail!("unsupported http method '{}'", s),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
    pub proxy: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Sends one request. Shared across threads for `stress=N`.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Blocking transport over `ureq`
#[derive(Debug, Default)]
pub struct UreqTransport;

impl UreqTransport {
    pub fn new() -> Self {
        Self
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = ureq::AgentBuilder::new().timeout(request.timeout);
        if let Some(proxy) = &request.proxy {
            builder = builder.proxy(ureq::Proxy::new(proxy)?);
        }
        let agent = builder.build();

        let mut call = agent.request(request.method.as_str(), &request.url);
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }

        let result = match &request.body {
            Some(body) => call.send_string(body),
            None => call.call(),
        };
        // Error statuses are still responses
        let response = match result {
            Ok(response) | Err(ureq::Error::Status(_, response)) => response,
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        let headers = response
            .headers_names()
            .into_iter()
            .filter_map(|name| {
                let value = response.header(&name)?.to_string();
                Some((name, value))
            })
            .collect();
        let body = response.into_string()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Turns `http` line arguments into requests
pub struct HttpClient {
    transport: Arc<dyn HttpTransport>,
    default_timeout: Duration,
    default_proxy: Option<String>,
}

impl HttpClient {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &HttpConfig) -> Self {
        Self {
            transport,
            default_timeout: Duration::from_millis(config.timeout_ms),
            default_proxy: config.proxy.clone(),
        }
    }

    /// Entry point of the `http` callable
    pub fn execute(&self, ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value> {
        let args = DomainArgs::parse(ctx, &args, &["to", "method"])?;
        args.check_keys(KNOWN_KEYS, "http")?;

        let request = self.build_request(&args)?;

        if let Some(n) = args.get_int("stress")? {
            if n <= 0 {
                bail!("stress must be positive, got {}", n);
            }
            let summary = self.stress(&request, n as usize);
            if let Some(name) = args.get_str("to") {
                ctx.set_var(&name, summary.clone());
            }
            return Ok(summary);
        }

        info!(line = ctx.line(), method = %request.method, url = %request.url, "http request");
        let started = Instant::now();
        let result = self.transport.send(&request);
        let elapsed = started.elapsed().as_millis() as i64;

        let value = match &result {
            Ok(response) => {
                info!(status = response.status, ms = elapsed, "http response");
                Value::record([
                    ("code", Value::Int(response.status as i64)),
                    ("body", Value::from(response.body.as_str())),
                    ("header", headers_to_value(&response.headers)),
                    ("req_time", Value::Int(elapsed)),
                    ("err", Value::Null),
                ])
            }
            Err(e) => {
                info!(error = %e, ms = elapsed, "http request failed");
                Value::record([
                    ("code", Value::Int(0)),
                    ("body", Value::from("")),
                    ("header", Value::dict(Default::default())),
                    ("req_time", Value::Int(elapsed)),
                    ("err", Value::String(format!("{:#}", e))),
                ])
            }
        };

        if let Some(name) = args.get_str("to") {
            ctx.set_var(&name, value.clone());
        }

        if let (Some(path), Ok(response)) = (args.get_str("save"), &result) {
            std::fs::write(&path, &response.body)
                .with_context(|| format!("saving response body to {}", path))?;
        }

        Ok(value)
    }

    fn build_request(&self, args: &DomainArgs) -> Result<HttpRequest> {
        let method = match (args.flags.as_slice(), args.get_str("method")) {
            ([], Some(method)) | ([_], Some(method)) => method.parse()?,
            ([word], None) => word.parse()?,
            ([], None) => bail!("http needs a method, e.g. `http get url=...`"),
            (words, _) => bail!("unexpected http arguments: {}", words.join(" ")),
        };

        let url = match args.get("url") {
            Some(Value::String(url)) if !url.is_empty() => url.clone(),
            Some(other) => bail!("url must be a non-empty string, got {}", other.repr()),
            None => bail!("http needs url=..."),
        };

        let timeout = match args.get_int("timeout")? {
            Some(ms) if ms > 0 => Duration::from_millis(ms as u64),
            Some(ms) => bail!("timeout must be positive milliseconds, got {}", ms),
            None => self.default_timeout,
        };

        let mut request = HttpRequest {
            method,
            url,
            headers: Vec::new(),
            body: None,
            timeout,
            proxy: args.get_str("proxy").or_else(|| self.default_proxy.clone()),
        };

        if let Some(header) = args.get("header") {
            for (name, value) in decode_headers(header)? {
                request.set_header(&name, value);
            }
        }

        if let Some(body) = args.get("body") {
            request.body = Some(match body {
                Value::String(s) => s.clone(),
                Value::List(_) | Value::Dict(_) => {
                    if request.header("Content-Type").is_none() {
                        request.set_header("Content-Type", "application/json".to_string());
                    }
                    serde_json::to_string(&value_to_json(body)?)?
                }
                other => other.to_string(),
            });
        }

        if let Some(ctype) = args.get_str("ctype") {
            request.set_header("Content-Type", content_type(&ctype));
        }

        if let Some(cookie) = args.get("cookie") {
            request.set_header("Cookie", encode_cookie(cookie)?);
        }

        Ok(request)
    }

    /// Fire `n` copies of `request` in parallel and summarise the results
    fn stress(&self, request: &HttpRequest, n: usize) -> Value {
        info!(method = %request.method, url = %request.url, n, "http stress run");

        let timings: Vec<(bool, u128)> = (0..n)
            .into_par_iter()
            .map(|_| {
                let started = Instant::now();
                let ok = matches!(self.transport.send(request), Ok(r) if r.status < 400);
                (ok, started.elapsed().as_millis())
            })
            .collect();

        let success = timings.iter().filter(|(ok, _)| *ok).count();
        let total_ms: u128 = timings.iter().map(|(_, ms)| ms).sum();
        let avg_ms = if n == 0 { 0 } else { total_ms / n as u128 };

        Value::record([
            ("total", Value::Int(n as i64)),
            ("success", Value::Int(success as i64)),
            ("failed", Value::Int((n - success) as i64)),
            ("avg_ms", Value::Int(avg_ms as i64)),
        ])
    }
}

/// Register the `http` callable
pub fn register(interpreter: &mut Interpreter, client: HttpClient) {
    interpreter.register("http", move |ctx, args| client.execute(ctx, args));
}

fn content_type(ctype: &str) -> String {
    match ctype.to_ascii_lowercase().as_str() {
        "json" => "application/json".to_string(),
        "form" => "application/x-www-form-urlencoded".to_string(),
        "text" => "text/plain".to_string(),
        _ => ctype.to_string(),
    }
}

/// `header=` accepts a dict or a JSON object string
fn decode_headers(header: &Value) -> Result<Vec<(String, String)>> {
    match header {
        Value::Dict(entries) => Ok(entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.to_value().to_string(), v.to_string()))
            .collect()),
        Value::String(s) => {
            let json: serde_json::Value =
                serde_json::from_str(s).context("header must be a JSON object")?;
            let object = json
                .as_object()
                .ok_or_else(|| anyhow!("header must be a JSON object"))?;
            Ok(object
                .iter()
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) => (k.clone(), s.clone()),
                    other => (k.clone(), other.to_string()),
                })
                .collect())
        }
        other => bail!("header must be a dict or JSON string, got {}", other.type_name()),
    }
}

/// `cookie=` accepts `k=v; k2=v2`, a dict, or a list of `k=v` strings
fn encode_cookie(cookie: &Value) -> Result<String> {
    let pairs: Vec<String> = match cookie {
        Value::String(s) => s
            .split(';')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Dict(entries) => entries
            .borrow()
            .iter()
            .map(|(k, v)| format!("{}={}", k.to_value(), v))
            .collect(),
        Value::List(items) => items
            .borrow()
            .iter()
            .map(|item| {
                let pair = item.to_string();
                if pair.contains('=') {
                    Ok(pair)
                } else {
                    Err(anyhow!("cookie list items must look like k=v, got '{}'", pair))
                }
            })
            .collect::<Result<_>>()?,
        other => bail!("cookie must be a string, dict or list, got {}", other.type_name()),
    };
    Ok(pairs.join("; "))
}

fn headers_to_value(headers: &[(String, String)]) -> Value {
    Value::record(
        headers
            .iter()
            .map(|(k, v)| (k.as_str(), Value::from(v.as_str()))),
    )
}
