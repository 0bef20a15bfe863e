use crate::error::{Error, Result};
use crate::ident::Ident;
use serde_json::{Map, Number};
use std::cell::RefCell;
use std::rc::Rc;

/// Runtime representation of every datum in the language.
///
/// Envelopes are cheap to clone; `Str`, `Object` and `Array` payloads are
/// `Rc`-shared, so mutating a composite through one clone is visible through
/// every other clone of the same envelope.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Object(Rc<RefCell<Object>>),
    Array(Rc<RefCell<Vec<Value>>>),
    Range(Range),
    /// Deferred path reference; always dereferenced before operators apply.
    Ident(Ident),
}

/// Ordered key/value pairs with unique keys. Insertion order is preserved
/// and meaningful for encoding; `set` overwrites in place on collision.
#[derive(Debug, Clone, Default)]
pub struct Object {
    pairs: Vec<(Rc<str>, Value)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.pairs
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.clone())
    }

    pub fn set(&mut self, key: Rc<str>, value: Value) {
        if let Some(pair) = self.pairs.iter_mut().find(|(k, _)| *k == key) {
            pair.1 = value;
        } else {
            self.pairs.push((key, value));
        }
    }

    pub fn pair_at(&self, idx: usize) -> (Rc<str>, Value) {
        let (k, v) = &self.pairs[idx];
        (k.clone(), v.clone())
    }

    pub fn set_value_at(&mut self, idx: usize, value: Value) {
        self.pairs[idx].1 = value;
    }

    pub fn remove_at(&mut self, idx: usize) {
        self.pairs.remove(idx);
    }

    /// Replace the pair at `idx` with the pairs of `with`, the first one
    /// taking over the original order slot.
    pub fn replace_at(&mut self, idx: usize, with: &Object) {
        self.pairs.remove(idx);
        for (offset, (k, v)) in with.pairs.iter().enumerate() {
            self.pairs.insert(idx + offset, (k.clone(), v.clone()));
        }
    }

    pub fn pairs(&self) -> &[(Rc<str>, Value)] {
        &self.pairs
    }
}

/// Inclusive integer interval, iterated lazily. Conforms to array iteration
/// but rejects structural mutation; `map`/`filter` materialize real arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub from: i64,
    pub to: i64,
}

impl Range {
    pub fn len(&self) -> usize {
        if self.to < self.from {
            0
        } else {
            (self.to - self.from + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn at(&self, rank: usize) -> Option<i64> {
        if rank < self.len() {
            Some(self.from + rank as i64)
        } else {
            None
        }
    }
}

impl Value {
    pub fn object(obj: Object) -> Self {
        Value::Object(Rc::new(RefCell::new(obj)))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Range(_) => "range",
            Value::Ident(_) => "identifier",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Object(o) => !o.borrow().is_empty(),
            Value::Array(a) => !a.borrow().is_empty(),
            Value::Range(r) => !r.is_empty(),
            Value::Ident(_) => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) => Some(*f as i64),
            Value::Bool(b) => Some(if *b { 1 } else { 0 }),
            Value::Str(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    // === Arithmetic (capability-checked per kind) ===

    pub fn add(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => Ok(
                Value::Float(self.as_f64().unwrap_or(0.0) + other.as_f64().unwrap_or(0.0)),
            ),
            (Value::Str(a), Value::Str(b)) => {
                let mut out = String::with_capacity(a.len() + b.len());
                out.push_str(a);
                out.push_str(b);
                Ok(Value::str(out))
            }
            (Value::Object(a), Value::Object(b)) => {
                let mut merged = a.borrow().clone();
                for (k, v) in b.borrow().pairs() {
                    merged.set(k.clone(), v.clone());
                }
                Ok(Value::object(merged))
            }
            (Value::Array(a), Value::Array(b)) => {
                let mut out = a.borrow().clone();
                out.extend(b.borrow().iter().cloned());
                Ok(Value::array(out))
            }
            _ => Err(self.op_type_error("+", other)),
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => Ok(
                Value::Float(self.as_f64().unwrap_or(0.0) - other.as_f64().unwrap_or(0.0)),
            ),
            (Value::Str(a), Value::Str(b)) => {
                // Remove the first occurrence of the right operand.
                let out = match a.find(b.as_ref()) {
                    Some(pos) if !b.is_empty() => {
                        let mut s = String::with_capacity(a.len() - b.len());
                        s.push_str(&a[..pos]);
                        s.push_str(&a[pos + b.len()..]);
                        s
                    }
                    _ => a.to_string(),
                };
                Ok(Value::str(out))
            }
            _ => Err(self.op_type_error("-", other)),
        }
    }

    pub fn mul(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(*b))),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => Ok(
                Value::Float(self.as_f64().unwrap_or(0.0) * other.as_f64().unwrap_or(0.0)),
            ),
            _ => Err(self.op_type_error("*", other)),
        }
    }

    pub fn div(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let denom = other.as_f64().unwrap_or(0.0);
                if denom == 0.0 {
                    return Err(Error::type_mismatch("division by zero"));
                }
                if let (Value::Int(a), Value::Int(b)) = (self, other) {
                    if a % b == 0 {
                        return Ok(Value::Int(a / b));
                    }
                }
                Ok(Value::Float(self.as_f64().unwrap_or(0.0) / denom))
            }
            _ => Err(self.op_type_error("/", other)),
        }
    }

    // === Comparison ===

    /// Structural equality. Kinds must match, except int/float which compare
    /// numerically; any other cross-kind comparison is a type error.
    pub fn eq_value(&self, other: &Value) -> Result<bool> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(true),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Float(a), Value::Float(b)) => Ok(a == b),
            (Value::Int(a), Value::Float(b)) => Ok((*a as f64) == *b),
            (Value::Float(a), Value::Int(b)) => Ok(*a == (*b as f64)),
            (Value::Str(a), Value::Str(b)) => Ok(a == b),
            (Value::Range(a), Value::Range(b)) => Ok(a == b),
            (Value::Array(a), Value::Array(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.eq_value(y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Object(a), Value::Object(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (k, v) in a.pairs() {
                    match b.get(k) {
                        Some(bv) => {
                            if !v.eq_value(&bv)? {
                                return Ok(false);
                            }
                        }
                        None => return Ok(false),
                    }
                }
                Ok(true)
            }
            _ => Err(self.op_type_error("==", other)),
        }
    }

    /// Ordering for `>`/`>=`/`<`/`<=`: both sides numeric, or both strings.
    pub fn cmp_value(&self, other: &Value) -> Result<std::cmp::Ordering> {
        match (self, other) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let a = self.as_f64().unwrap_or(0.0);
                let b = other.as_f64().unwrap_or(0.0);
                a.partial_cmp(&b)
                    .ok_or_else(|| Error::type_mismatch("cannot order NaN"))
            }
            (Value::Str(a), Value::Str(b)) => Ok(a.as_ref().cmp(b.as_ref())),
            _ => Err(self.op_type_error("<", other)),
        }
    }

    fn op_type_error(&self, op: &str, other: &Value) -> Error {
        Error::type_mismatch(format!(
            "operator {} not defined for {} and {}",
            op,
            self.kind_name(),
            other.kind_name()
        ))
    }

    // === serde_json bridge ===

    /// Convert to a `serde_json::Value`. Ranges materialize into arrays;
    /// unresolved identifiers cannot be represented.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Int(n) => Ok(serde_json::Value::Number(Number::from(*n))),
            Value::Float(f) => Ok(Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null)),
            Value::Str(s) => Ok(serde_json::Value::String(s.to_string())),
            Value::Array(arr) => {
                let mut out = Vec::with_capacity(arr.borrow().len());
                for item in arr.borrow().iter() {
                    out.push(item.to_json()?);
                }
                Ok(serde_json::Value::Array(out))
            }
            Value::Object(obj) => {
                let mut map = Map::new();
                for (k, v) in obj.borrow().pairs() {
                    map.insert(k.to_string(), v.to_json()?);
                }
                Ok(serde_json::Value::Object(map))
            }
            Value::Range(r) => {
                let out = (0..r.len())
                    .map(|rank| serde_json::Value::Number(Number::from(r.from + rank as i64)))
                    .collect();
                Ok(serde_json::Value::Array(out))
            }
            Value::Ident(id) => Err(Error::encode(format!(
                "cannot serialize unresolved identifier '{}'",
                id
            ))),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Null
                }
            }
            serde_json::Value::String(s) => Value::str(s),
            serde_json::Value::Array(arr) => {
                Value::array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                let mut obj = Object::new();
                for (k, v) in map {
                    obj.set(Rc::from(k.as_str()), Value::from(v));
                }
                Value::object(obj)
            }
        }
    }
}

/// Decimal rendering with the trailing zero trimmed (`2.0` prints as `2`).
pub(crate) fn format_f64(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() {
        format!("{:.0}", f)
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        let v = Value::Int(5).add(&Value::Float(0.5)).expect("add");
        assert!(matches!(v, Value::Float(f) if f == 5.5));
        let v = Value::Int(7).div(&Value::Int(2)).expect("div");
        assert!(matches!(v, Value::Float(f) if f == 3.5));
        let v = Value::Int(8).div(&Value::Int(2)).expect("div");
        assert!(matches!(v, Value::Int(4)));
    }

    #[test]
    fn string_minus_removes_first_occurrence() {
        let v = Value::str("hello").sub(&Value::str("el")).expect("sub");
        assert_eq!(v.as_str(), Some("hlo"));
        // No occurrence: unchanged.
        let v = Value::str("hello").sub(&Value::str("xyz")).expect("sub");
        assert_eq!(v.as_str(), Some("hello"));
    }

    #[test]
    fn string_multiply_is_a_type_error() {
        let err = Value::str("a").mul(&Value::str("b")).expect_err("mul");
        assert_eq!(err.code, crate::error::codes::TYPE);
    }

    #[test]
    fn object_add_merges_with_right_override() {
        let mut a = Object::new();
        a.set(Rc::from("x"), Value::Int(1));
        a.set(Rc::from("y"), Value::Int(2));
        let mut b = Object::new();
        b.set(Rc::from("y"), Value::Int(20));
        b.set(Rc::from("z"), Value::Int(30));
        let merged = Value::object(a).add(&Value::object(b)).expect("merge");
        assert_eq!(
            merged.to_json().expect("json"),
            json!({"x": 1, "y": 20, "z": 30})
        );
    }

    #[test]
    fn cross_type_comparison_fails() {
        let err = Value::Int(1).eq_value(&Value::str("1")).expect_err("eq");
        assert_eq!(err.code, crate::error::codes::TYPE);
    }

    #[test]
    fn int_float_compare_numerically() {
        assert!(Value::Int(2).eq_value(&Value::Float(2.0)).expect("eq"));
        assert_eq!(
            Value::Int(1).cmp_value(&Value::Float(1.5)).expect("cmp"),
            std::cmp::Ordering::Less
        );
    }

    #[test]
    fn composite_mutation_is_visible_through_clones() {
        let arr = Value::array(vec![Value::Int(1)]);
        let alias = arr.clone();
        if let Value::Array(items) = &arr {
            items.borrow_mut().push(Value::Int(2));
        }
        assert_eq!(alias.to_json().expect("json"), json!([1, 2]));
    }

    #[test]
    fn json_round_trip_is_identity_on_the_json_subset() {
        let doc = json!({
            "name": "djson",
            "tags": ["a", "b"],
            "nested": {"n": 1, "f": 2.5, "ok": true, "nothing": null}
        });
        let value = Value::from(doc.clone());
        assert_eq!(value.to_json().expect("to_json"), doc);
    }

    #[test]
    fn range_materializes_through_the_bridge() {
        let v = Value::Range(Range { from: 1, to: 4 });
        assert_eq!(v.to_json().expect("json"), json!([1, 2, 3, 4]));
        assert!(Value::Range(Range { from: 5, to: 4 }).is_truthy() == false);
    }

    #[test]
    fn format_f64_trims_trailing_zero() {
        assert_eq!(format_f64(2.0), "2");
        assert_eq!(format_f64(2.5), "2.5");
    }
}
