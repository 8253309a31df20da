//! Decoding of `chrome`/`http` line arguments
//!
//! The parser hands each domain statement a flat list of strings, each a
//! bare word (`init`, `get`) or a `key=value` pair split at the first `=`.
//! A value that names a bound variable is replaced by that variable's value,
//! except for keys that name a variable themselves (such as `to`).

use anyhow::{anyhow, bail, Result};

use crate::context::CallContext;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct DomainArgs {
    /// Bare words in source order
    pub flags: Vec<String>,
    /// `key=value` pairs in source order
    pub options: Vec<(String, Value)>,
}

impl DomainArgs {
    /// Decode `args`. Keys listed in `raw_keys` keep their text verbatim.
    pub fn parse(ctx: &CallContext<'_>, args: &[Value], raw_keys: &[&str]) -> Result<Self> {
        let mut decoded = Self::default();

        for arg in args {
            match arg {
                Value::String(text) => match text.split_once('=') {
                    Some(("", _)) => bail!("missing key in argument '{}'", text),
                    Some((key, value)) => {
                        let value = if raw_keys.contains(&key) {
                            Value::from(value)
                        } else {
                            ctx.get_var(value).unwrap_or_else(|| Value::from(value))
                        };
                        decoded.options.push((key.to_string(), value));
                    }
                    None => decoded.flags.push(text.clone()),
                },
                // A host may pass options as a dict instead of strings
                Value::Dict(entries) => {
                    for (key, value) in entries.borrow().iter() {
                        decoded
                            .options
                            .push((key.to_value().to_string(), value.clone()));
                    }
                }
                other => bail!(
                    "expected a word or key=value argument, got {}",
                    other.type_name()
                ),
            }
        }

        Ok(decoded)
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(name))
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Last value given for `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Value of `key` rendered as text
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    /// Value of `key` as an integer; numeric strings are accepted
    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Int(i)) => Ok(Some(*i)),
            Some(Value::Float(f)) => Ok(Some(*f as i64)),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| anyhow!("{} must be a number, got '{}'", key, s)),
            Some(other) => bail!("{} must be a number, got {}", key, other.type_name()),
        }
    }

    /// Reject keys outside `known`
    pub fn check_keys(&self, known: &[&str], what: &str) -> Result<()> {
        match self.options.iter().find(|(k, _)| !known.contains(&k.as_str())) {
            Some((key, _)) => bail!("unknown {} argument '{}'", what, key),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SourceSpan;
    use crate::context::Context;

    fn words(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::from(*s)).collect()
    }

    #[test]
    fn test_split_at_first_equals() {
        let mut context = Context::new();
        let ctx = CallContext::new(&mut context, SourceSpan::default());
        let args = DomainArgs::parse(&ctx, &words(&["input=a=b", "init"]), &[]).unwrap();
        assert_eq!(args.flags, vec!["init"]);
        assert_eq!(args.get_str("input").as_deref(), Some("a=b"));
    }

    #[test]
    fn test_variable_substitution() {
        let mut context = Context::new();
        context.declare("target", Value::from("http://example.test"));
        context.declare("res", Value::Int(1));
        let ctx = CallContext::new(&mut context, SourceSpan::default());

        let args = DomainArgs::parse(&ctx, &words(&["url=target", "to=res"]), &["to"]).unwrap();
        assert_eq!(args.get_str("url").as_deref(), Some("http://example.test"));
        assert_eq!(args.get_str("to").as_deref(), Some("res"));
    }

    #[test]
    fn test_numbers_and_unknown_keys() {
        let mut context = Context::new();
        let ctx = CallContext::new(&mut context, SourceSpan::default());
        let args = DomainArgs::parse(&ctx, &words(&["wait=250", "bogus=1"]), &[]).unwrap();
        assert_eq!(args.get_int("wait").unwrap(), Some(250));
        assert!(args.get_int("bogus").is_ok());
        assert!(args.check_keys(&["wait"], "chrome").is_err());

        let args = DomainArgs::parse(&ctx, &words(&["wait=soon"]), &[]).unwrap();
        assert!(args.get_int("wait").is_err());
    }

    #[test]
    fn test_rejects_missing_key_and_non_strings() {
        let mut context = Context::new();
        let ctx = CallContext::new(&mut context, SourceSpan::default());
        assert!(DomainArgs::parse(&ctx, &words(&["=x"]), &[]).is_err());
        assert!(DomainArgs::parse(&ctx, &[Value::Int(1)], &[]).is_err());
    }
}
