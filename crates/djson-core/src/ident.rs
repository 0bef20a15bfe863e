use crate::error::{Error, Result};
use crate::scope::Scope;
use crate::value::{Object, Value};
use std::fmt;
use std::rc::Rc;

/// One step of a dotted path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSeg {
    Key(Rc<str>),
    Index(i64),
    /// `*`: fans out over every element of the composite reached so far.
    Wildcard,
}

/// A deferred path reference.
///
/// The chain is an owned vector of segments accumulated while parsing a
/// dotted expression, root to leaf; `base` carries the concrete value the
/// path hangs off when the left side of the first `.` was not a bare name
/// (e.g. a literal under method call). Resolution happens only when the
/// identifier is evaluated.
#[derive(Debug, Clone)]
pub struct Ident {
    pub segments: Vec<PathSeg>,
    pub base: Option<Box<Value>>,
}

impl Ident {
    pub fn name(name: impl AsRef<str>) -> Self {
        Self {
            segments: vec![PathSeg::Key(Rc::from(name.as_ref()))],
            base: None,
        }
    }

    pub fn from_base(base: Value, seg: PathSeg) -> Self {
        Self {
            segments: vec![seg],
            base: Some(Box::new(base)),
        }
    }

    pub fn push(&mut self, seg: PathSeg) {
        self.segments.push(seg);
    }

    /// Is this a bare single name with nothing to hang off, the shape that
    /// dispatches to the global builtin registry when called.
    pub fn is_bare_name(&self) -> bool {
        self.base.is_none() && self.segments.len() == 1
    }

    /// Leaf name, when the last segment is a key. Method dispatch uses this.
    pub fn leaf_name(&self) -> Option<&str> {
        match self.segments.last() {
            Some(PathSeg::Key(name)) => Some(name.as_ref()),
            _ => None,
        }
    }

    /// Everything up to the leaf: the receiver of a method call.
    pub fn parent(&self) -> Ident {
        Ident {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
            base: self.base.clone(),
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 || self.base.is_some() {
                write!(f, ".")?;
            }
            match seg {
                PathSeg::Key(k) => write!(f, "{}", k)?,
                PathSeg::Index(n) => write!(f, "{}", n)?,
                PathSeg::Wildcard => write!(f, "*")?,
            }
        }
        Ok(())
    }
}

/// Resolve a deferred path against the variable context and the stack of
/// literals under construction (`me`, innermost last).
///
/// Only true root failure raises (`DJSON_E_LOOKUP`); a missing segment past
/// the root resolves to null.
pub fn resolve(id: &Ident, scope: &Scope, me: &[Value]) -> Result<Value> {
    if let Some(base) = &id.base {
        return resolve_from(base, &id.segments);
    }
    let Some((first, rest)) = id.segments.split_first() else {
        return Ok(Value::Null);
    };
    let PathSeg::Key(name) = first else {
        return Err(Error::lookup("path root must be a name"));
    };
    if name.as_ref() == "_me" {
        let Some(container) = me.last() else {
            return Err(Error::lookup("_me used outside an object or array literal"));
        };
        return resolve_from(&container.clone(), rest);
    }
    if let Some(found) = scope.get(name) {
        return resolve_from(&found, rest);
    }
    // Sibling keys of enclosing object literals, innermost first.
    for container in me.iter().rev() {
        if let Value::Object(obj) = container {
            let sibling = obj.borrow().get(name);
            if let Some(found) = sibling {
                return resolve_from(&found, rest);
            }
        }
    }
    Err(Error::lookup(format!("undefined variable '{}'", name)))
}

fn resolve_from(value: &Value, segs: &[PathSeg]) -> Result<Value> {
    let Some((first, rest)) = segs.split_first() else {
        return Ok(value.clone());
    };
    if *first == PathSeg::Wildcard {
        let Some(elements) = fanout(value) else {
            return Ok(Value::Null);
        };
        let mut out = Vec::with_capacity(elements.len());
        for element in elements {
            out.push(resolve_from(&element, rest)?);
        }
        return Ok(Value::array(out));
    }
    match step(value, first) {
        Some(next) => resolve_from(&next, rest),
        None => Ok(Value::Null),
    }
}

/// All elements of a composite in order; `None` for scalars.
fn fanout(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Object(obj) => Some(obj.borrow().pairs().iter().map(|(_, v)| v.clone()).collect()),
        Value::Array(arr) => Some(arr.borrow().clone()),
        Value::Range(r) => Some((0..r.len()).map(|i| Value::Int(r.from + i as i64)).collect()),
        _ => None,
    }
}

fn step(value: &Value, seg: &PathSeg) -> Option<Value> {
    match (value, seg) {
        (Value::Object(obj), PathSeg::Key(k)) => obj.borrow().get(k),
        (Value::Object(obj), PathSeg::Index(i)) => obj.borrow().get(&i.to_string()),
        (Value::Array(arr), PathSeg::Index(i)) => {
            if *i >= 0 {
                arr.borrow().get(*i as usize).cloned()
            } else {
                None
            }
        }
        (Value::Range(r), PathSeg::Index(i)) => {
            if *i >= 0 {
                r.at(*i as usize).map(Value::Int)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Path-based assignment. Intermediate objects are created on the way down
/// when missing (or when a scalar sits where a container is needed).
pub fn assign(id: &Ident, value: Value, scope: &mut Scope) -> Result<()> {
    if let Some(base) = &id.base {
        let (middle, last) = split_target(&id.segments)?;
        let container = descend(base.as_ref().clone(), middle)?;
        return set_on(&container, last, value);
    }
    let (middle, last) = split_target(&id.segments)?;
    if middle.is_empty() {
        if let PathSeg::Key(name) = last {
            if name.as_ref() == "_me" {
                return Err(Error::lookup("cannot assign to _me"));
            }
            scope.set(name.clone(), value);
            return Ok(());
        }
        return Err(Error::lookup("assignment target must start with a name"));
    }
    let PathSeg::Key(root_name) = &middle[0] else {
        return Err(Error::lookup("assignment target must start with a name"));
    };
    if root_name.as_ref() == "_me" {
        return Err(Error::lookup("cannot assign to _me"));
    }
    let root = match scope.get(root_name) {
        Some(existing @ (Value::Object(_) | Value::Array(_))) => existing,
        _ => {
            let fresh = Value::object(Object::new());
            scope.set(root_name.clone(), fresh.clone());
            fresh
        }
    };
    let container = descend(root, &middle[1..])?;
    set_on(&container, last, value)
}

fn split_target(segs: &[PathSeg]) -> Result<(&[PathSeg], &PathSeg)> {
    match segs.split_last() {
        Some((last, middle)) => Ok((middle, last)),
        None => Err(Error::lookup("empty assignment target")),
    }
}

fn descend(mut current: Value, middle: &[PathSeg]) -> Result<Value> {
    for seg in middle {
        current = match (&current, seg) {
            (Value::Object(obj), PathSeg::Key(_) | PathSeg::Index(_)) => {
                let key: Rc<str> = match seg {
                    PathSeg::Key(k) => k.clone(),
                    PathSeg::Index(i) => Rc::from(i.to_string().as_str()),
                    PathSeg::Wildcard => unreachable!(),
                };
                let existing = obj.borrow().get(&key);
                match existing {
                    Some(found @ (Value::Object(_) | Value::Array(_))) => found,
                    _ => {
                        let fresh = Value::object(Object::new());
                        obj.borrow_mut().set(key, fresh.clone());
                        fresh
                    }
                }
            }
            (Value::Array(arr), PathSeg::Index(i)) => {
                let idx = usize::try_from(*i)
                    .map_err(|_| Error::lookup(format!("negative index {}", i)))?;
                let existing = arr.borrow().get(idx).cloned();
                match existing {
                    Some(found @ (Value::Object(_) | Value::Array(_))) => found,
                    Some(_) => {
                        let fresh = Value::object(Object::new());
                        arr.borrow_mut()[idx] = fresh.clone();
                        fresh
                    }
                    None => {
                        return Err(Error::lookup(format!(
                            "index {} out of bounds in assignment",
                            idx
                        )))
                    }
                }
            }
            _ => {
                return Err(Error::lookup(format!(
                    "cannot descend into {} during assignment",
                    current.kind_name()
                )))
            }
        };
    }
    Ok(current)
}

fn set_on(container: &Value, seg: &PathSeg, value: Value) -> Result<()> {
    match (container, seg) {
        (Value::Object(obj), PathSeg::Key(k)) => {
            obj.borrow_mut().set(k.clone(), value);
            Ok(())
        }
        (Value::Object(obj), PathSeg::Index(i)) => {
            obj.borrow_mut().set(Rc::from(i.to_string().as_str()), value);
            Ok(())
        }
        (Value::Array(arr), PathSeg::Index(i)) => {
            let idx = usize::try_from(*i)
                .map_err(|_| Error::lookup(format!("negative index {}", i)))?;
            let len = arr.borrow().len();
            if idx < len {
                arr.borrow_mut()[idx] = value;
                Ok(())
            } else if idx == len {
                arr.borrow_mut().push(value);
                Ok(())
            } else {
                Err(Error::lookup(format!(
                    "index {} out of bounds in assignment",
                    idx
                )))
            }
        }
        (Value::Range(_), _) => Err(Error::type_mismatch("ranges are immutable")),
        _ => Err(Error::type_mismatch(format!(
            "cannot assign into {}",
            container.kind_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope_with(name: &str, value: Value) -> Scope {
        let mut scope = Scope::new();
        scope.set(Rc::from(name), value);
        scope
    }

    #[test]
    fn dotted_lookup_and_index() {
        let var1 = Value::from(json!({"val1": [1, 2, 3]}));
        let scope = scope_with("var1", var1);

        let mut id = Ident::name("var1");
        id.push(PathSeg::Key(Rc::from("val1")));
        id.push(PathSeg::Index(0));
        let got = resolve(&id, &scope, &[]).expect("resolve");
        assert_eq!(got.to_json().expect("json"), json!(1));
    }

    #[test]
    fn wildcard_fans_out_in_order() {
        let var1 = Value::from(json!({"val1": [1, 2, 3]}));
        let scope = scope_with("var1", var1);

        let mut id = Ident::name("var1");
        id.push(PathSeg::Key(Rc::from("val1")));
        id.push(PathSeg::Wildcard);
        let got = resolve(&id, &scope, &[]).expect("resolve");
        assert_eq!(got.to_json().expect("json"), json!([1, 2, 3]));
    }

    #[test]
    fn wildcard_continues_into_remaining_segments() {
        let rows = Value::from(json!({"rows": [{"n": 1}, {"n": 2}]}));
        let scope = scope_with("data", rows);

        let mut id = Ident::name("data");
        id.push(PathSeg::Key(Rc::from("rows")));
        id.push(PathSeg::Wildcard);
        id.push(PathSeg::Key(Rc::from("n")));
        let got = resolve(&id, &scope, &[]).expect("resolve");
        assert_eq!(got.to_json().expect("json"), json!([1, 2]));
    }

    #[test]
    fn missing_root_raises_but_missing_segment_is_null() {
        let scope = scope_with("a", Value::from(json!({"b": 1})));

        let err = resolve(&Ident::name("missing"), &scope, &[]).expect_err("root");
        assert_eq!(err.code, crate::error::codes::LOOKUP);

        let mut id = Ident::name("a");
        id.push(PathSeg::Key(Rc::from("nope")));
        id.push(PathSeg::Key(Rc::from("deeper")));
        let got = resolve(&id, &scope, &[]).expect("resolve");
        assert!(matches!(got, Value::Null));
    }

    #[test]
    fn assignment_creates_intermediate_objects() {
        let mut scope = Scope::new();
        let mut id = Ident::name("cfg");
        id.push(PathSeg::Key(Rc::from("server")));
        id.push(PathSeg::Key(Rc::from("port")));
        assign(&id, Value::Int(8080), &mut scope).expect("assign");
        let got = scope.get("cfg").expect("cfg bound");
        assert_eq!(
            got.to_json().expect("json"),
            json!({"server": {"port": 8080}})
        );
    }

    #[test]
    fn me_resolution_reads_the_innermost_literal() {
        let under_construction = Value::from(json!({"a": 5}));
        let scope = Scope::new();
        let me = vec![under_construction];

        let mut id = Ident::name("_me");
        id.push(PathSeg::Key(Rc::from("a")));
        let got = resolve(&id, &scope, &me).expect("resolve");
        assert_eq!(got.to_json().expect("json"), json!(5));

        // A bare sibling name falls back to the literal's keys too.
        let got = resolve(&Ident::name("a"), &scope, &me).expect("resolve");
        assert_eq!(got.to_json().expect("json"), json!(5));
    }
}
