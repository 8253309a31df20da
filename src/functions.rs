//! Built-in functions for chromebot
//!
//! Every built-in is a plain `fn(&[Value]) -> Result<Value>` that checks its
//! own arity and argument kinds. Errors surface in scripts as recoverable
//! diagnostics and the call yields null.

use anyhow::{anyhow, bail, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Datelike, Local, NaiveTime, TimeZone};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::rc::Rc;

use crate::evaluator::Interpreter;
use crate::value::{DictKey, Value};

/// Longest string a built-in may produce, in bytes
pub const MAX_STRING_LEN: usize = 64 * 1024 * 1024;

/// Function signature
pub type BuiltinFunction = fn(&[Value]) -> Result<Value>;

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<String, BuiltinFunction>,
}

impl FunctionRegistry {
    /// Create a new function registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        // Core functions
        registry.register("print", fn_print);
        registry.register("println", fn_println);
        registry.register("int", fn_int);
        registry.register("float", fn_float);
        registry.register("str", fn_str);
        registry.register("len", fn_len);
        registry.register("type", fn_type);

        // Collection functions
        registry.register("keys", fn_keys);
        registry.register("values", fn_values);
        registry.register("items", fn_items);
        registry.register("has_key", fn_has_key);
        registry.register("delete", fn_delete);
        registry.register("append", fn_append);

        // String functions
        registry.register("upper", fn_upper);
        registry.register("lower", fn_lower);
        registry.register("trim", fn_trim);
        registry.register("split", fn_split);
        registry.register("repeat", fn_repeat);
        registry.register("contains", fn_contains);
        registry.register("replace", fn_replace);
        registry.register("join", fn_join);

        // Numeric functions
        registry.register("abs", fn_abs);
        registry.register("max", fn_max);
        registry.register("min", fn_min);

        // Encoding and hash functions
        registry.register("base64encode", fn_base64encode);
        registry.register("base64decode", fn_base64decode);
        registry.register("md5", fn_md5);
        registry.register("sha256", fn_sha256);
        registry.register("urlencode", fn_urlencode);
        registry.register("urldecode", fn_urldecode);
        registry.register("json_encode", fn_json_encode);
        registry.register("json_decode", fn_json_decode);

        // Regex functions
        registry.register("re_match", fn_re_match);
        registry.register("re_find", fn_re_find);

        // Date/Time functions
        registry.register("now", fn_now);
        registry.register("timestamp", fn_now); // Alias for now
        registry.register("timestamp_milli", fn_timestamp_milli);
        registry.register("sleep", fn_sleep);
        registry.register("date", fn_date);
        registry.register("timestamp_to_date", fn_timestamp_to_date);
        registry.register("begin_of_day", fn_begin_of_day);
        registry.register("end_of_day", fn_end_of_day);
        registry.register("minute_ago", fn_minute_ago);
        registry.register("hour_ago", fn_hour_ago);
        registry.register("day_ago", fn_day_ago);
        registry.register("day_diff", fn_day_diff);
        registry.register("now_to_end", fn_now_to_end);
        registry.register("is_today", fn_is_today);
        registry.register("weekday", fn_weekday);

        registry
    }

    /// Register a function
    pub fn register(&mut self, name: &str, func: BuiltinFunction) {
        self.functions.insert(name.to_string(), func);
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Global function registry using lazy_static
lazy_static::lazy_static! {
    static ref GLOBAL_REGISTRY: FunctionRegistry = FunctionRegistry::new();
}

/// Install every built-in into an interpreter's global scope
pub fn register_builtins(interpreter: &mut Interpreter) {
    for (name, func) in &GLOBAL_REGISTRY.functions {
        interpreter.register_builtin(name, *func);
    }
}

// =============================================================================
// CORE FUNCTIONS
// =============================================================================

fn fn_print(args: &[Value]) -> Result<Value> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", join_display(args))?;
    stdout.flush()?;
    Ok(Value::Null)
}

fn fn_println(args: &[Value]) -> Result<Value> {
    println!("{}", join_display(args));
    Ok(Value::Null)
}

fn join_display(args: &[Value]) -> String {
    args.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn fn_int(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "int")?;
    let i = match &args[0] {
        Value::Int(i) => *i,
        Value::Float(f) => *f as i64,
        Value::Bool(b) => *b as i64,
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => i,
                Err(_) => s
                    .parse::<f64>()
                    .map(|f| f as i64)
                    .map_err(|_| anyhow!("cannot convert {:?} to int", s))?,
            }
        }
        other => bail!("cannot convert {} to int", other.type_name()),
    };
    Ok(Value::Int(i))
}

fn fn_float(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "float")?;
    let f = match &args[0] {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Bool(b) => *b as i64 as f64,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| anyhow!("cannot convert {:?} to float", s))?,
        other => bail!("cannot convert {} to float", other.type_name()),
    };
    Ok(Value::Float(f))
}

fn fn_str(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "str")?;
    Ok(Value::String(args[0].to_string()))
}

fn fn_len(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "len")?;
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Dict(entries) => entries.borrow().len(),
        other => bail!("len() requires string, list, or dict, got {}", other.type_name()),
    };
    Ok(Value::Int(len as i64))
}

fn fn_type(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "type")?;
    Ok(Value::from(args[0].type_name()))
}

// =============================================================================
// COLLECTION FUNCTIONS
// =============================================================================

fn fn_keys(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "keys")?;
    let Value::Dict(entries) = &args[0] else {
        bail!("keys() requires a dict, got {}", args[0].type_name());
    };
    let keys = entries.borrow().keys().map(DictKey::to_value).collect();
    Ok(Value::list(keys))
}

fn fn_values(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "values")?;
    let Value::Dict(entries) = &args[0] else {
        bail!("values() requires a dict, got {}", args[0].type_name());
    };
    let values = entries.borrow().values().cloned().collect();
    Ok(Value::list(values))
}

fn fn_items(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "items")?;
    let Value::Dict(entries) = &args[0] else {
        bail!("items() requires a dict, got {}", args[0].type_name());
    };
    let items = entries
        .borrow()
        .iter()
        .map(|(k, v)| Value::list(vec![k.to_value(), v.clone()]))
        .collect();
    Ok(Value::list(items))
}

fn fn_has_key(args: &[Value]) -> Result<Value> {
    require_args(args, 2, "has_key")?;
    let Value::Dict(entries) = &args[0] else {
        bail!("has_key() requires a dict, got {}", args[0].type_name());
    };
    let key = DictKey::try_from(&args[1])?;
    let found = entries.borrow().contains_key(&key);
    Ok(Value::Bool(found))
}

fn fn_delete(args: &[Value]) -> Result<Value> {
    require_args(args, 2, "delete")?;
    let Value::Dict(entries) = &args[0] else {
        bail!("delete() requires a dict, got {}", args[0].type_name());
    };
    let key = DictKey::try_from(&args[1])?;
    let removed = entries.borrow_mut().remove(&key);
    Ok(removed.unwrap_or(Value::Null))
}

/// Appends in place, so every alias of the list sees the new elements
fn fn_append(args: &[Value]) -> Result<Value> {
    require_args_min(args, 1, "append")?;
    let Value::List(items) = &args[0] else {
        bail!("append() requires a list, got {}", args[0].type_name());
    };
    items.borrow_mut().extend(args[1..].iter().cloned());
    Ok(args[0].clone())
}

// =============================================================================
// STRING FUNCTIONS
// =============================================================================

fn fn_upper(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "upper")?;
    let s = as_string(&args[0])?;
    Ok(Value::String(s.to_uppercase()))
}

fn fn_lower(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "lower")?;
    let s = as_string(&args[0])?;
    Ok(Value::String(s.to_lowercase()))
}

fn fn_trim(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "trim")?;
    let s = as_string(&args[0])?;
    Ok(Value::String(s.trim().to_string()))
}

fn fn_split(args: &[Value]) -> Result<Value> {
    require_args(args, 2, "split")?;
    let s = as_string(&args[0])?;
    let sep = as_string(&args[1])?;
    let parts: Vec<Value> = if sep.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(sep).map(Value::from).collect()
    };
    Ok(Value::list(parts))
}

fn fn_repeat(args: &[Value]) -> Result<Value> {
    require_args(args, 2, "repeat")?;
    let s = as_string(&args[0])?;
    let n = as_int(&args[1])?;
    if n < 0 {
        bail!("repeat() count must not be negative, got {}", n);
    }
    match s.len().checked_mul(n as usize) {
        Some(len) if len <= MAX_STRING_LEN => Ok(Value::String(s.repeat(n as usize))),
        _ => bail!("repeat() result would exceed {} bytes", MAX_STRING_LEN),
    }
}

fn fn_contains(args: &[Value]) -> Result<Value> {
    require_args(args, 2, "contains")?;
    let result = match &args[0] {
        Value::String(s) => s.contains(as_string(&args[1])?),
        Value::List(items) => items.borrow().iter().any(|item| item.deep_eq(&args[1])),
        Value::Dict(entries) => {
            let key = DictKey::try_from(&args[1])?;
            entries.borrow().contains_key(&key)
        }
        other => bail!("contains() requires string, list, or dict, got {}", other.type_name()),
    };
    Ok(Value::Bool(result))
}

fn fn_replace(args: &[Value]) -> Result<Value> {
    require_args(args, 3, "replace")?;
    let s = as_string(&args[0])?;
    let old = as_string(&args[1])?;
    let new = as_string(&args[2])?;
    Ok(Value::String(s.replace(old, new)))
}

fn fn_join(args: &[Value]) -> Result<Value> {
    require_args(args, 2, "join")?;
    let Value::List(items) = &args[0] else {
        bail!("join() requires a list, got {}", args[0].type_name());
    };
    let sep = as_string(&args[1])?;
    let strings: Vec<String> = items.borrow().iter().map(|v| v.to_string()).collect();
    Ok(Value::String(strings.join(sep)))
}

// =============================================================================
// NUMERIC FUNCTIONS
// =============================================================================

fn fn_abs(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "abs")?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(i.wrapping_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => bail!("abs() requires a number, got {}", other.type_name()),
    }
}

fn fn_max(args: &[Value]) -> Result<Value> {
    extremum(args, "max", std::cmp::Ordering::Greater)
}

fn fn_min(args: &[Value]) -> Result<Value> {
    extremum(args, "min", std::cmp::Ordering::Less)
}

/// `max(1, 2.5)` or `max([1, 2.5])`; the winning value keeps its kind
fn extremum(args: &[Value], name: &str, wanted: std::cmp::Ordering) -> Result<Value> {
    require_args_min(args, 1, name)?;
    let values: Vec<Value> = match args {
        [Value::List(items)] => items.borrow().clone(),
        _ => args.to_vec(),
    };

    let mut best: Option<Value> = None;
    for value in values {
        if value.as_f64().is_none() {
            bail!("{}() requires numbers, got {}", name, value.type_name());
        }
        best = match best {
            Some(current) if value.compare(&current) != Some(wanted) => Some(current),
            _ => Some(value),
        };
    }
    best.ok_or_else(|| anyhow!("{}() requires at least one number", name))
}

// =============================================================================
// ENCODING AND HASH FUNCTIONS
// =============================================================================

fn fn_base64encode(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "base64encode")?;
    let s = as_string(&args[0])?;
    Ok(Value::String(STANDARD.encode(s)))
}

fn fn_base64decode(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "base64decode")?;
    let s = as_string(&args[0])?;
    let decoded = STANDARD.decode(s)?;
    Ok(Value::String(String::from_utf8(decoded)?))
}

fn fn_md5(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "md5")?;
    let s = as_string(&args[0])?;
    Ok(Value::String(format!("{:x}", md5::compute(s))))
}

fn fn_sha256(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "sha256")?;
    let s = as_string(&args[0])?;
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    Ok(Value::String(format!("{:x}", hasher.finalize())))
}

fn fn_urlencode(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "urlencode")?;
    let s = as_string(&args[0])?;
    Ok(Value::String(urlencoding::encode(s).to_string()))
}

fn fn_urldecode(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "urldecode")?;
    let s = as_string(&args[0])?;
    Ok(Value::String(urlencoding::decode(s)?.to_string()))
}

fn fn_json_encode(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "json_encode")?;
    let json = serde_json::to_string(&value_to_json(&args[0])?)?;
    Ok(Value::String(json))
}

fn fn_json_decode(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "json_decode")?;
    let s = as_string(&args[0])?;
    let json: serde_json::Value = serde_json::from_str(s)?;
    Ok(json_to_value(&json))
}

/// Convert a script value to JSON; non-string dict keys are stringified
pub fn value_to_json(value: &Value) -> Result<serde_json::Value> {
    json_within(value, &mut Vec::new())
}

/// `path` holds the containers being encoded; meeting one again is a cycle
fn json_within(value: &Value, path: &mut Vec<*const ()>) -> Result<serde_json::Value> {
    match value {
        Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        Value::Int(i) => Ok(serde_json::Value::Number((*i).into())),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| anyhow!("Invalid float value for JSON: {}", f)),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Null => Ok(serde_json::Value::Null),
        Value::List(items) => {
            let id = Rc::as_ptr(items) as *const ();
            if path.contains(&id) {
                bail!("Cannot convert a self-referencing list to JSON");
            }
            path.push(id);
            let json_items: Result<Vec<serde_json::Value>> = items
                .borrow()
                .iter()
                .map(|item| json_within(item, path))
                .collect();
            path.pop();
            Ok(serde_json::Value::Array(json_items?))
        }
        Value::Dict(entries) => {
            let id = Rc::as_ptr(entries) as *const ();
            if path.contains(&id) {
                bail!("Cannot convert a self-referencing dict to JSON");
            }
            path.push(id);
            let mut json_map = serde_json::Map::new();
            for (key, val) in entries.borrow().iter() {
                json_map.insert(key.to_value().to_string(), json_within(val, path)?);
            }
            path.pop();
            Ok(serde_json::Value::Object(json_map))
        }
        Value::Callable(c) => Err(anyhow!("Cannot convert function {} to JSON", c.name())),
    }
}

pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::list(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => Value::dict(
            map.iter()
                .map(|(k, v)| (DictKey::String(k.clone()), json_to_value(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

// =============================================================================
// REGEX FUNCTIONS
// =============================================================================

fn fn_re_match(args: &[Value]) -> Result<Value> {
    require_args(args, 2, "re_match")?;
    let re = Regex::new(as_string(&args[0])?)?;
    Ok(Value::Bool(re.is_match(as_string(&args[1])?)))
}

/// All matches; with a capture group, the first group of each match
fn fn_re_find(args: &[Value]) -> Result<Value> {
    require_args(args, 2, "re_find")?;
    let re = Regex::new(as_string(&args[0])?)?;
    let text = as_string(&args[1])?;
    let found = re
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
        .map(|m| Value::from(m.as_str()))
        .collect();
    Ok(Value::list(found))
}

// =============================================================================
// DATE/TIME FUNCTIONS
// =============================================================================

const DEFAULT_LAYOUT: &str = "YYYY-MM-DD HH:mm:ss";
const SECONDS_PER_DAY: i64 = 86_400;

lazy_static::lazy_static! {
    /// Layout tokens and their strftime equivalents, longest first
    static ref LAYOUT_TOKENS: Vec<(&'static str, &'static str)> = vec![
        ("YYYY", "%Y"),
        ("SSS", "%3f"),
        ("YY", "%y"),
        ("MM", "%m"),
        ("DD", "%d"),
        ("HH", "%H"),
        ("hh", "%I"),
        ("mm", "%M"),
        ("ss", "%S"),
    ];
}

/// Translate a `YYYY-MM-DD HH:mm:ss` style layout into a strftime string
pub fn layout_to_strftime(layout: &str) -> String {
    let mut out = String::new();
    let mut rest = layout;

    'scan: while let Some(c) = rest.chars().next() {
        for (token, strftime) in LAYOUT_TOKENS.iter() {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(strftime);
                rest = tail;
                continue 'scan;
            }
        }
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }

    out
}

fn fn_now(args: &[Value]) -> Result<Value> {
    require_args(args, 0, "now")?;
    Ok(Value::Int(Local::now().timestamp()))
}

fn fn_timestamp_milli(args: &[Value]) -> Result<Value> {
    require_args(args, 0, "timestamp_milli")?;
    Ok(Value::Int(Local::now().timestamp_millis()))
}

fn fn_sleep(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "sleep")?;
    let ms = as_int(&args[0])?;
    if ms > 0 {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }
    Ok(Value::Null)
}

fn fn_date(args: &[Value]) -> Result<Value> {
    let layout = optional_layout(args, 0, "date")?;
    Ok(Value::String(
        Local::now().format(&layout_to_strftime(&layout)).to_string(),
    ))
}

fn fn_timestamp_to_date(args: &[Value]) -> Result<Value> {
    require_args_min(args, 1, "timestamp_to_date")?;
    let dt = local_time(as_int(&args[0])?)?;
    let layout = optional_layout(args, 1, "timestamp_to_date")?;
    Ok(Value::String(
        dt.format(&layout_to_strftime(&layout)).to_string(),
    ))
}

fn fn_begin_of_day(args: &[Value]) -> Result<Value> {
    let dt = optional_time(args, "begin_of_day")?;
    let midnight = NaiveTime::from_hms_opt(0, 0, 0).ok_or_else(|| anyhow!("invalid time of day"))?;
    Ok(Value::Int(at_time_of_day(&dt, midnight)?))
}

fn fn_end_of_day(args: &[Value]) -> Result<Value> {
    let dt = optional_time(args, "end_of_day")?;
    Ok(Value::Int(end_of_day(&dt)?))
}

fn fn_minute_ago(args: &[Value]) -> Result<Value> {
    seconds_ago(args, "minute_ago", 60)
}

fn fn_hour_ago(args: &[Value]) -> Result<Value> {
    seconds_ago(args, "hour_ago", 3_600)
}

fn fn_day_ago(args: &[Value]) -> Result<Value> {
    seconds_ago(args, "day_ago", SECONDS_PER_DAY)
}

/// Whole days from the first timestamp to the second
fn fn_day_diff(args: &[Value]) -> Result<Value> {
    require_args(args, 2, "day_diff")?;
    let from = as_int(&args[0])?;
    let to = as_int(&args[1])?;
    Ok(Value::Int(to.saturating_sub(from) / SECONDS_PER_DAY))
}

fn fn_now_to_end(args: &[Value]) -> Result<Value> {
    require_args(args, 0, "now_to_end")?;
    let now = Local::now();
    Ok(Value::Int(end_of_day(&now)? - now.timestamp()))
}

fn fn_is_today(args: &[Value]) -> Result<Value> {
    require_args(args, 1, "is_today")?;
    let dt = local_time(as_int(&args[0])?)?;
    Ok(Value::Bool(dt.date_naive() == Local::now().date_naive()))
}

/// Day of the week, 0 = Sunday
fn fn_weekday(args: &[Value]) -> Result<Value> {
    let dt = optional_time(args, "weekday")?;
    Ok(Value::Int(dt.weekday().num_days_from_sunday() as i64))
}

fn seconds_ago(args: &[Value], name: &str, unit: i64) -> Result<Value> {
    require_args(args, 1, name)?;
    let n = as_int(&args[0])?;
    Ok(Value::Int(
        Local::now().timestamp() - n.saturating_mul(unit),
    ))
}

fn local_time(ts: i64) -> Result<DateTime<Local>> {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .ok_or_else(|| anyhow!("invalid timestamp: {}", ts))
}

/// The timestamp argument if given, else now
fn optional_time(args: &[Value], name: &str) -> Result<DateTime<Local>> {
    match args {
        [] => Ok(Local::now()),
        [ts] => local_time(as_int(ts)?),
        _ => bail!("{}() requires at most 1 argument(s), got {}", name, args.len()),
    }
}

fn optional_layout(args: &[Value], index: usize, name: &str) -> Result<String> {
    if args.len() > index + 1 {
        bail!(
            "{}() requires at most {} argument(s), got {}",
            name,
            index + 1,
            args.len()
        );
    }
    match args.get(index) {
        Some(layout) => Ok(as_string(layout)?.to_string()),
        None => Ok(DEFAULT_LAYOUT.to_string()),
    }
}

fn at_time_of_day(dt: &DateTime<Local>, time: NaiveTime) -> Result<i64> {
    let naive = dt.date_naive().and_time(time);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.timestamp())
        .ok_or_else(|| anyhow!("{} does not exist in the local time zone", naive))
}

fn end_of_day(dt: &DateTime<Local>) -> Result<i64> {
    let last_second =
        NaiveTime::from_hms_opt(23, 59, 59).ok_or_else(|| anyhow!("invalid time of day"))?;
    at_time_of_day(dt, last_second)
}

// =============================================================================
// HELPERS
// =============================================================================

fn require_args(args: &[Value], expected: usize, name: &str) -> Result<()> {
    if args.len() != expected {
        return Err(anyhow!(
            "{}() requires {} argument(s), got {}",
            name,
            expected,
            args.len()
        ));
    }
    Ok(())
}

fn require_args_min(args: &[Value], min: usize, name: &str) -> Result<()> {
    if args.len() < min {
        return Err(anyhow!(
            "{}() requires at least {} argument(s), got {}",
            name,
            min,
            args.len()
        ));
    }
    Ok(())
}

fn as_string(value: &Value) -> Result<&str> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(anyhow!("Expected string, got {}", value.type_name())),
    }
}

fn as_int(value: &Value) -> Result<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        _ => Err(anyhow!("Expected int, got {}", value.type_name())),
    }
}
