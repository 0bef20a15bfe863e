use crate::value::Value;
use std::rc::Rc;

/// Ordered variable context. Names are unique: assignment overwrites the
/// existing binding in place rather than appending a duplicate.
#[derive(Debug, Default)]
pub struct Scope {
    vars: Vec<(Rc<str>, Value)>,
}

/// Receipt for a temporarily shadowed binding; hand it back to `restore`.
pub struct SavedBinding {
    name: Rc<str>,
    previous: Option<Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v.clone())
    }

    pub fn set(&mut self, name: Rc<str>, value: Value) {
        if let Some(slot) = self.vars.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.vars.push((name, value));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.vars.iter().position(|(n, _)| n.as_ref() == name)?;
        Some(self.vars.remove(idx).1)
    }

    /// Bind `name`, remembering what it shadowed. Composite builtins use
    /// this for the per-iteration `k`/`i`/`v` bindings and restore the old
    /// binding after the loop, even when an element fails.
    pub fn bind_saving(&mut self, name: &str, value: Value) -> SavedBinding {
        let name: Rc<str> = Rc::from(name);
        let previous = self.get(&name);
        self.set(name.clone(), value);
        SavedBinding { name, previous }
    }

    pub fn restore(&mut self, saved: SavedBinding) {
        match saved.previous {
            Some(value) => self.set(saved.name, value),
            None => {
                self.remove(&saved.name);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_instead_of_duplicating() {
        let mut scope = Scope::new();
        scope.set(Rc::from("a"), Value::Int(1));
        scope.set(Rc::from("a"), Value::Int(2));
        assert_eq!(scope.len(), 1);
        assert!(matches!(scope.get("a"), Some(Value::Int(2))));
    }

    #[test]
    fn bind_saving_round_trips() {
        let mut scope = Scope::new();
        scope.set(Rc::from("v"), Value::Int(1));

        let saved = scope.bind_saving("v", Value::Int(99));
        assert!(matches!(scope.get("v"), Some(Value::Int(99))));
        scope.restore(saved);
        assert!(matches!(scope.get("v"), Some(Value::Int(1))));

        // A binding that shadowed nothing disappears on restore.
        let saved = scope.bind_saving("fresh", Value::Int(7));
        scope.restore(saved);
        assert!(scope.get("fresh").is_none());
    }
}
