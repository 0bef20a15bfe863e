//! Composite builtins: the method registries for object, array and range
//! receivers.
//!
//! Every method shares one pattern: the body's token range is captured once
//! (scanner offset at call entry), then for each element the scanner is
//! rewound to that offset, the per-iteration bindings (`k`/`i` and `v`) are
//! written into the scope, and the body is re-evaluated as a fresh guarded
//! statement. An empty collection still consumes the body tokens exactly
//! once so the scanner lands on the closing parenthesis either way. The
//! first element error aborts the whole method.
//!
//! Loops re-read the live length each pass: a body that mutates its own
//! receiver must not push the index past the end.

use crate::error::{Error, Result};
use crate::eval::Evaluator;
use crate::value::{Object, Value};

type Method = fn(&mut Evaluator<'_>, &Value) -> Result<Value>;

const OBJECT_METHODS: &[(&str, Method)] = &[
    ("set", object_set),
    ("replace", object_replace),
    ("del", object_del),
    ("filter", object_filter),
];

const ARRAY_METHODS: &[(&str, Method)] = &[
    ("set", array_set),
    ("map", array_map),
    ("del", array_del),
    ("filter", array_filter),
];

const RANGE_METHODS: &[(&str, Method)] = &[
    ("map", range_map),
    ("filter", range_filter),
    ("set", range_passthrough),
    ("del", range_passthrough),
];

/// Dispatch a method call on `receiver`. Exact-case lookup first, then a
/// case-insensitive fallback scan.
pub fn call(ev: &mut Evaluator<'_>, receiver: &Value, name: &str) -> Result<Value> {
    if let Some(method) = find(receiver, name, true).or_else(|| find(receiver, name, false)) {
        return method(ev, receiver);
    }
    Err(Error::method_not_found(format!(
        "no method '{}' on {}",
        name,
        receiver.kind_name()
    )))
}

fn find(receiver: &Value, name: &str, exact: bool) -> Option<Method> {
    let table = match receiver {
        Value::Object(_) => OBJECT_METHODS,
        Value::Array(_) => ARRAY_METHODS,
        Value::Range(_) => RANGE_METHODS,
        _ => return None,
    };
    table
        .iter()
        .find(|(n, _)| {
            if exact {
                *n == name
            } else {
                n.eq_ignore_ascii_case(name)
            }
        })
        .map(|(_, m)| *m)
}

// === Object methods ===

fn object_set(ev: &mut Evaluator<'_>, receiver: &Value) -> Result<Value> {
    let Value::Object(obj) = receiver else {
        return Err(Error::type_mismatch("set expects an object receiver"));
    };
    let body = ev.scanner.offset();
    let mut idx = 0;
    let mut replayed = false;
    while idx < obj.borrow().len() {
        let (key, value) = obj.borrow().pair_at(idx);
        ev.scanner.set_offset(body);
        let g = ev.guarded_with(&[("k", Value::Str(key)), ("v", value)])?;
        replayed = true;
        if g.bare || g.matched {
            obj.borrow_mut().set_value_at(idx, g.value);
        }
        idx += 1;
    }
    if !replayed {
        ev.skip_expr()?;
    }
    Ok(receiver.clone())
}

fn object_replace(ev: &mut Evaluator<'_>, receiver: &Value) -> Result<Value> {
    let Value::Object(obj) = receiver else {
        return Err(Error::type_mismatch("replace expects an object receiver"));
    };
    let body = ev.scanner.offset();
    let mut idx = 0;
    let mut replayed = false;
    while idx < obj.borrow().len() {
        let (key, value) = obj.borrow().pair_at(idx);
        ev.scanner.set_offset(body);
        let g = ev.guarded_with(&[("k", Value::Str(key)), ("v", value)])?;
        replayed = true;
        if g.bare || g.matched {
            let Value::Object(with) = &g.value else {
                return Err(Error::type_mismatch(
                    "replace body must yield an object for matching pairs",
                ));
            };
            let with = with.borrow().clone();
            obj.borrow_mut().replace_at(idx, &with);
            idx += with.len();
        } else {
            idx += 1;
        }
    }
    if !replayed {
        ev.skip_expr()?;
    }
    Ok(receiver.clone())
}

fn object_del(ev: &mut Evaluator<'_>, receiver: &Value) -> Result<Value> {
    let Value::Object(obj) = receiver else {
        return Err(Error::type_mismatch("del expects an object receiver"));
    };
    let body = ev.scanner.offset();
    let mut idx = 0;
    let mut replayed = false;
    while idx < obj.borrow().len() {
        let (key, value) = obj.borrow().pair_at(idx);
        ev.scanner.set_offset(body);
        let g = ev.guarded_with(&[("k", Value::Str(key)), ("v", value)])?;
        replayed = true;
        // Deletion-safe iteration: the next element slides into this slot,
        // so the index only advances on a miss.
        if hit(&g) {
            obj.borrow_mut().remove_at(idx);
        } else {
            idx += 1;
        }
    }
    if !replayed {
        ev.skip_expr()?;
    }
    Ok(receiver.clone())
}

fn object_filter(ev: &mut Evaluator<'_>, receiver: &Value) -> Result<Value> {
    let Value::Object(obj) = receiver else {
        return Err(Error::type_mismatch("filter expects an object receiver"));
    };
    let body = ev.scanner.offset();
    let mut out = Object::new();
    let mut idx = 0;
    let mut replayed = false;
    while idx < obj.borrow().len() {
        let (key, value) = obj.borrow().pair_at(idx);
        ev.scanner.set_offset(body);
        let g = ev.guarded_with(&[("k", Value::Str(key.clone())), ("v", value.clone())])?;
        replayed = true;
        if hit(&g) {
            out.set(key, value);
        }
        idx += 1;
    }
    if !replayed {
        ev.skip_expr()?;
    }
    Ok(Value::object(out))
}

// === Array methods ===

fn array_set(ev: &mut Evaluator<'_>, receiver: &Value) -> Result<Value> {
    let Value::Array(arr) = receiver else {
        return Err(Error::type_mismatch("set expects an array receiver"));
    };
    let body = ev.scanner.offset();
    let mut idx = 0;
    let mut replayed = false;
    while idx < arr.borrow().len() {
        let value = arr.borrow()[idx].clone();
        ev.scanner.set_offset(body);
        let g = ev.guarded_with(&[("i", Value::Int(idx as i64)), ("v", value)])?;
        replayed = true;
        if g.bare || g.matched {
            arr.borrow_mut()[idx] = g.value;
        }
        idx += 1;
    }
    if !replayed {
        ev.skip_expr()?;
    }
    Ok(receiver.clone())
}

fn array_map(ev: &mut Evaluator<'_>, receiver: &Value) -> Result<Value> {
    let Value::Array(arr) = receiver else {
        return Err(Error::type_mismatch("map expects an array receiver"));
    };
    let body = ev.scanner.offset();
    let mut out = Vec::with_capacity(arr.borrow().len());
    let mut idx = 0;
    let mut replayed = false;
    while idx < arr.borrow().len() {
        let value = arr.borrow()[idx].clone();
        ev.scanner.set_offset(body);
        let g = ev.guarded_with(&[("i", Value::Int(idx as i64)), ("v", value.clone())])?;
        replayed = true;
        // A guard miss passes the original element through unchanged.
        out.push(if g.bare || g.matched { g.value } else { value });
        idx += 1;
    }
    if !replayed {
        ev.skip_expr()?;
    }
    Ok(Value::array(out))
}

fn array_del(ev: &mut Evaluator<'_>, receiver: &Value) -> Result<Value> {
    let Value::Array(arr) = receiver else {
        return Err(Error::type_mismatch("del expects an array receiver"));
    };
    let body = ev.scanner.offset();
    let mut idx = 0;
    let mut replayed = false;
    while idx < arr.borrow().len() {
        let value = arr.borrow()[idx].clone();
        ev.scanner.set_offset(body);
        let g = ev.guarded_with(&[("i", Value::Int(idx as i64)), ("v", value)])?;
        replayed = true;
        if hit(&g) {
            arr.borrow_mut().remove(idx);
        } else {
            idx += 1;
        }
    }
    if !replayed {
        ev.skip_expr()?;
    }
    Ok(receiver.clone())
}

fn array_filter(ev: &mut Evaluator<'_>, receiver: &Value) -> Result<Value> {
    let Value::Array(arr) = receiver else {
        return Err(Error::type_mismatch("filter expects an array receiver"));
    };
    let body = ev.scanner.offset();
    let mut out = Vec::new();
    let mut idx = 0;
    let mut replayed = false;
    while idx < arr.borrow().len() {
        let value = arr.borrow()[idx].clone();
        ev.scanner.set_offset(body);
        let g = ev.guarded_with(&[("i", Value::Int(idx as i64)), ("v", value.clone())])?;
        replayed = true;
        if hit(&g) {
            out.push(value);
        }
        idx += 1;
    }
    if !replayed {
        ev.skip_expr()?;
    }
    Ok(Value::array(out))
}

// === Range methods ===

fn range_map(ev: &mut Evaluator<'_>, receiver: &Value) -> Result<Value> {
    let Value::Range(range) = receiver else {
        return Err(Error::type_mismatch("map expects a range receiver"));
    };
    let body = ev.scanner.offset();
    let len = range.len();
    let mut out = Vec::with_capacity(len);
    for rank in 0..len {
        let value = Value::Int(range.from + rank as i64);
        ev.scanner.set_offset(body);
        let g = ev.guarded_with(&[("i", Value::Int(rank as i64)), ("v", value.clone())])?;
        out.push(if g.bare || g.matched { g.value } else { value });
    }
    if len == 0 {
        ev.skip_expr()?;
    }
    Ok(Value::array(out))
}

fn range_filter(ev: &mut Evaluator<'_>, receiver: &Value) -> Result<Value> {
    let Value::Range(range) = receiver else {
        return Err(Error::type_mismatch("filter expects a range receiver"));
    };
    let body = ev.scanner.offset();
    let len = range.len();
    let mut out = Vec::new();
    for rank in 0..len {
        let value = Value::Int(range.from + rank as i64);
        ev.scanner.set_offset(body);
        let g = ev.guarded_with(&[("i", Value::Int(rank as i64)), ("v", value.clone())])?;
        if hit(&g) {
            out.push(value);
        }
    }
    if len == 0 {
        ev.skip_expr()?;
    }
    Ok(Value::array(out))
}

/// Ranges reject structural mutation: `set`/`del` consume their body and
/// hand the receiver back untouched.
fn range_passthrough(ev: &mut Evaluator<'_>, receiver: &Value) -> Result<Value> {
    ev.skip_expr()?;
    Ok(receiver.clone())
}

/// Truthiness decision shared by the predicate-style methods: a bare body
/// is its own predicate, a guarded body decides by its guard.
fn hit(g: &crate::eval::Guarded) -> bool {
    if g.bare {
        g.value.is_truthy()
    } else {
        g.matched
    }
}
