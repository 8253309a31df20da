//! Runtime values
//!
//! Lists and dicts are reference-shared: cloning a [`Value`] clones the
//! `Rc`, so every alias sees in-place mutation.

use anyhow::{anyhow, bail, Result};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::context::CallContext;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type DictRef = Rc<RefCell<BTreeMap<DictKey, Value>>>;

/// Signature of every host function reachable from scripts
pub type NativeFn = dyn Fn(&mut CallContext<'_>, Vec<Value>) -> Result<Value>;

#[derive(Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    List(ListRef),
    Dict(DictRef),
    Callable(Callable),
    Null,
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(entries: BTreeMap<DictKey, Value>) -> Value {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    /// Build a dict with string keys, for results handed back by built-ins
    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
        Value::dict(
            fields
                .into_iter()
                .map(|(k, v)| (DictKey::String(k.to_string()), v))
                .collect(),
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Callable(_) => "function",
            Value::Null => "null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Only null, false, zero numbers and the empty string are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Null => false,
            Value::List(_) | Value::Dict(_) | Value::Callable(_) => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Deep structural equality; ints and floats compare numerically.
    /// Self-referencing containers compare equal when their shapes agree.
    pub fn deep_eq(&self, other: &Value) -> bool {
        self.eq_within(other, &mut Vec::new())
    }

    /// `path` holds the container pairs currently being compared
    fn eq_within(&self, other: &Value, path: &mut Vec<(*const (), *const ())>) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ());
                if path.contains(&pair) {
                    return true;
                }
                path.push(pair);
                let (a, b) = (a.borrow(), b.borrow());
                let equal = a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.eq_within(y, path));
                path.pop();
                equal
            }
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ());
                if path.contains(&pair) {
                    return true;
                }
                path.push(pair);
                let (a, b) = (a.borrow(), b.borrow());
                let equal = a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.get(k).map(|w| v.eq_within(w, path)).unwrap_or(false)
                    });
                path.pop();
                equal
            }
            (Value::Callable(a), Value::Callable(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`: numbers (mixed freely) and strings
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Read `self[index]` for lists and dicts
    pub fn get_index(&self, index: &Value) -> Result<Value> {
        match self {
            Value::List(items) => {
                let items = items.borrow();
                let i = list_index(index, items.len())?;
                Ok(items[i].clone())
            }
            Value::Dict(entries) => {
                let key = DictKey::try_from(index)?;
                entries
                    .borrow()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| anyhow!("key not found: {}", index.repr()))
            }
            other => bail!("cannot index into {}", other.type_name()),
        }
    }

    /// Write `self[index] = value` in place
    pub fn set_index(&self, index: Value, value: Value) -> Result<()> {
        match self {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let i = list_index(&index, items.len())?;
                items[i] = value;
                Ok(())
            }
            Value::Dict(entries) => {
                let key = DictKey::try_from(&index)?;
                entries.borrow_mut().insert(key, value);
                Ok(())
            }
            other => bail!("cannot assign by index into {}", other.type_name()),
        }
    }

    /// Rendering used inside containers: strings are quoted
    pub fn repr(&self) -> String {
        self.render(true, &mut Vec::new())
    }

    /// `path` holds the containers being rendered; revisiting one prints
    /// `[...]` or `{...}` instead of recursing forever
    fn render(&self, quoted: bool, path: &mut Vec<*const ()>) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Float(x) => x.to_string(),
            Value::String(s) if quoted => format!("{:?}", s),
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::List(items) => {
                let id = Rc::as_ptr(items) as *const ();
                if path.contains(&id) {
                    return "[...]".to_string();
                }
                path.push(id);
                let items: Vec<String> = items
                    .borrow()
                    .iter()
                    .map(|item| item.render(true, path))
                    .collect();
                path.pop();
                format!("[{}]", items.join(", "))
            }
            Value::Dict(entries) => {
                let id = Rc::as_ptr(entries) as *const ();
                if path.contains(&id) {
                    return "{...}".to_string();
                }
                path.push(id);
                let entries: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.to_value().repr(), v.render(true, path)))
                    .collect();
                path.pop();
                format!("{{{}}}", entries.join(", "))
            }
            Value::Callable(c) => format!("<function {}>", c.name()),
        }
    }
}

fn list_index(index: &Value, len: usize) -> Result<usize> {
    let Value::Int(i) = index else {
        bail!("list index must be integer, got {}", index.type_name());
    };
    if *i < 0 || *i as usize >= len {
        bail!("index out of range: {} (length {})", i, len);
    }
    Ok(*i as usize)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false, &mut Vec::new()))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// The hashable subset of values that may be used as dict keys.
///
/// Keys keep their kind: `1` and `1.0` are distinct keys. Iteration order
/// groups keys by kind (bool, int, float, string) and sorts within a kind.
#[derive(Debug, Clone)]
pub enum DictKey {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl DictKey {
    pub fn to_value(&self) -> Value {
        match self {
            DictKey::Bool(b) => Value::Bool(*b),
            DictKey::Int(i) => Value::Int(*i),
            DictKey::Float(x) => Value::Float(*x),
            DictKey::String(s) => Value::String(s.clone()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            DictKey::Bool(_) => 0,
            DictKey::Int(_) => 1,
            DictKey::Float(_) => 2,
            DictKey::String(_) => 3,
        }
    }
}

impl TryFrom<&Value> for DictKey {
    type Error = anyhow::Error;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(DictKey::Bool(*b)),
            Value::Int(i) => Ok(DictKey::Int(*i)),
            // -0.0 and 0.0 are the same key
            Value::Float(x) => Ok(DictKey::Float(if *x == 0.0 { 0.0 } else { *x })),
            Value::String(s) => Ok(DictKey::String(s.clone())),
            other => bail!("dict key must be hashable, got {}", other.type_name()),
        }
    }
}

impl From<&str> for DictKey {
    fn from(s: &str) -> Self {
        DictKey::String(s.to_string())
    }
}

impl PartialEq for DictKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DictKey {}

impl PartialOrd for DictKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DictKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DictKey::Bool(a), DictKey::Bool(b)) => a.cmp(b),
            (DictKey::Int(a), DictKey::Int(b)) => a.cmp(b),
            (DictKey::Float(a), DictKey::Float(b)) => a.total_cmp(b),
            (DictKey::String(a), DictKey::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// A host function registered under a name
#[derive(Clone)]
pub struct Callable {
    name: Rc<str>,
    func: Rc<NativeFn>,
}

impl Callable {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&mut CallContext<'_>, Vec<Value>) -> Result<Value> + 'static,
    {
        Self {
            name: Rc::from(name),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, ctx: &mut CallContext<'_>, args: Vec<Value>) -> Result<Value> {
        (self.func)(ctx, args)
    }

    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}
