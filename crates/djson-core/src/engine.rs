use crate::builtins::{Builtin, Builtins};
use crate::error::Result;
use crate::eval::Evaluator;
use crate::lexer::Lexer;
use crate::scanner::TokenScanner;
use crate::scope::Scope;
use crate::value::Value;
use std::io::Read;

/// Embedder-facing execution surface.
///
/// Keeps builtin registration instance-local (no global singleton), so
/// different embedders can carry different extensions safely.
#[derive(Default)]
pub struct Engine {
    builtins: Builtins,
}

impl Engine {
    /// New engine with the stock builtins (`log`, `json`) preloaded.
    pub fn new() -> Self {
        Self {
            builtins: Builtins::new(),
        }
    }

    /// Register or replace a global builtin.
    pub fn register(&mut self, name: impl Into<String>, builtin: Builtin) -> Option<Builtin> {
        self.builtins.register(name, builtin)
    }

    /// Evaluate a source string in a fresh variable context.
    pub fn eval(&self, source: &str) -> Result<Value> {
        let mut scope = Scope::new();
        self.eval_with_scope(source, &mut scope)
    }

    /// Evaluate against a caller-managed variable context, so bindings
    /// survive across invocations.
    pub fn eval_with_scope(&self, source: &str, scope: &mut Scope) -> Result<Value> {
        let mut scanner = TokenScanner::from_source(source);
        Evaluator::new(&mut scanner, scope, &self.builtins).run_program()
    }

    /// Evaluate from a byte stream with an explicit read-buffer size, the
    /// CLI's file/stdin path.
    pub fn eval_reader(&self, source: Box<dyn Read>, buffer_size: usize) -> Result<Value> {
        let mut scope = Scope::new();
        self.eval_reader_with_scope(source, buffer_size, &mut scope)
    }

    /// Stream variant of [`eval_with_scope`](Engine::eval_with_scope).
    pub fn eval_reader_with_scope(
        &self,
        source: Box<dyn Read>,
        buffer_size: usize,
        scope: &mut Scope,
    ) -> Result<Value> {
        let mut scanner = TokenScanner::new(Lexer::new(source, buffer_size));
        Evaluator::new(&mut scanner, scope, &self.builtins).run_program()
    }

    /// Access the builtin registry (read-only).
    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::scope::Scope;
    use serde_json::json;

    #[test]
    fn eval_runs_a_whole_program() {
        let engine = Engine::new();
        let out = engine
            .eval("a = {\"n\": 2}; a.n * 21")
            .expect("program evaluates");
        assert_eq!(out.to_json().expect("json"), json!(42));
    }

    #[test]
    fn scope_survives_across_invocations() {
        let engine = Engine::new();
        let mut scope = Scope::new();
        engine
            .eval_with_scope("counter = 1", &mut scope)
            .expect("first");
        let out = engine
            .eval_with_scope("counter = counter + 1; counter", &mut scope)
            .expect("second");
        assert_eq!(out.to_json().expect("json"), json!(2));
    }

    #[test]
    fn eval_reader_matches_eval() {
        let engine = Engine::new();
        let source = "x = [1...3]; x.map(v * v)";
        let from_str = engine.eval(source).expect("str").to_json().expect("json");
        let reader: Box<dyn std::io::Read> =
            Box::new(std::io::Cursor::new(source.as_bytes().to_vec()));
        let from_reader = engine
            .eval_reader(reader, 8)
            .expect("reader")
            .to_json()
            .expect("json");
        assert_eq!(from_str, from_reader);
        assert_eq!(from_str, json!([1, 4, 9]));
    }

    #[test]
    fn registered_builtins_are_callable() {
        fn double(value: Value, _scope: &mut Scope) -> Result<Value> {
            match value {
                Value::Int(n) => Ok(Value::Int(n * 2)),
                other => Err(Error::type_mismatch(format!(
                    "double expects an int, got {}",
                    other.kind_name()
                ))),
            }
        }
        let mut engine = Engine::new();
        engine.register("double", double);
        let out = engine.eval("double(21)").expect("builtin call");
        assert_eq!(out.to_json().expect("json"), json!(42));
    }
}
