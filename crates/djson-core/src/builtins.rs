//! Global builtin registry: bare-name callables like `log(...)`.
//!
//! Registration is instance-local (no global singleton), so different
//! embedders can carry different extensions safely.

use crate::encode;
use crate::error::{Error, Result};
use crate::scope::Scope;
use crate::value::Value;
use std::collections::HashMap;

/// A global callable: receives the evaluated argument and the live scope.
pub type Builtin = fn(Value, &mut Scope) -> Result<Value>;

pub struct Builtins {
    entries: HashMap<String, Builtin>,
}

impl Builtins {
    /// Registry preloaded with the stock extension modules.
    pub fn new() -> Self {
        let mut entries: HashMap<String, Builtin> = HashMap::new();
        entries.insert("log".into(), builtin_log as Builtin);
        entries.insert("json".into(), builtin_json as Builtin);
        Self { entries }
    }

    /// Exact-case lookup first, then a case-insensitive fallback scan,
    /// matching the method dispatch leniency.
    pub fn get(&self, name: &str) -> Option<Builtin> {
        if let Some(b) = self.entries.get(name) {
            return Some(*b);
        }
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, b)| *b)
    }

    /// Register or replace a builtin, returning the previous handler.
    pub fn register(&mut self, name: impl Into<String>, builtin: Builtin) -> Option<Builtin> {
        self.entries.insert(name.into(), builtin)
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

/// `log(v)`: print the encoded value to stderr, pass the value through.
fn builtin_log(value: Value, _scope: &mut Scope) -> Result<Value> {
    eprintln!("[djson.log] {}", encode::encode(&value, "")?);
    Ok(value)
}

/// `json(s)`: parse a JSON string into a value tree.
fn builtin_json(value: Value, _scope: &mut Scope) -> Result<Value> {
    let Value::Str(text) = &value else {
        return Err(Error::type_mismatch(format!(
            "json expects a string argument, got {}",
            value.kind_name()
        )));
    };
    let parsed: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| Error::parse(format!("invalid JSON: {}", e)))?;
    Ok(Value::from(parsed))
}
