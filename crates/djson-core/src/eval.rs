//! Statement/expression evaluator.
//!
//! A recursive-descent, precedence-climbing walk over the token scanner that
//! produces values directly, with no AST or bytecode in between. Every
//! grammar tier consumes the operators of its precedence and recurses into
//! the next tier for operands, strictly left to right.
//!
//! Sub-grammars (parenthesized expressions, literals, method bodies) share
//! this one implementation: each pushes its terminating tokens onto the
//! scanner's end-set stack on entry and pops them on exit, so nested
//! constructs read from the same token stream while independently declaring
//! where they stop.
//!
//! `&&` and `||` evaluate both operands; `=>` is the only short-circuiting
//! form: a falsy guard skips the right side's tokens without parsing them.

use crate::builtins::Builtins;
use crate::error::{Error, Result};
use crate::ident::{self, Ident, PathSeg};
use crate::lexer::{Token, TokenKind};
use crate::methods;
use crate::scanner::TokenScanner;
use crate::scope::Scope;
use crate::value::{Object, Range, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Outcome of a method-body evaluation: `pred => value` sets `matched` from
/// the guard; a bare body reports its own truthiness and `bare = true`.
pub(crate) struct Guarded {
    pub matched: bool,
    pub value: Value,
    pub bare: bool,
}

pub struct Evaluator<'a> {
    pub(crate) scanner: &'a mut TokenScanner,
    pub(crate) scope: &'a mut Scope,
    builtins: &'a Builtins,
    /// Literal containers under construction, innermost last. Pushed and
    /// popped by the literal executors on every exit path.
    me: Vec<Value>,
}

impl<'a> Evaluator<'a> {
    pub fn new(scanner: &'a mut TokenScanner, scope: &'a mut Scope, builtins: &'a Builtins) -> Self {
        Self {
            scanner,
            scope,
            builtins,
            me: Vec::new(),
        }
    }

    /// Evaluate a whole program: `;`-separated statements, the last one's
    /// value being the program's result.
    pub fn run_program(&mut self) -> Result<Value> {
        self.scanner.push_ends(&[TokenKind::Semicolon]);
        let result = self.run_statements();
        self.scanner.pop_ends(1);
        result
    }

    fn run_statements(&mut self) -> Result<Value> {
        let mut last = Value::Null;
        loop {
            if self.scanner.scan()? {
                if self.scanner.current().kind == TokenKind::Eof {
                    break;
                }
                // Separator semicolon.
                self.scanner.forward();
                continue;
            }
            let value = self.eval_stmt()?;
            last = self.real(value)?;
        }
        Ok(last)
    }

    /// Dereference an identifier to its current value; anything else passes
    /// through. Operators always apply to real values.
    pub(crate) fn real(&self, value: Value) -> Result<Value> {
        match value {
            Value::Ident(id) => ident::resolve(&id, self.scope, &self.me),
            other => Ok(other),
        }
    }

    // === Grammar tiers, highest first ===

    /// assignation -> assignation '=' reduction | reduction
    pub(crate) fn eval_stmt(&mut self) -> Result<Value> {
        let mut lhs = self.eval_reduction()?;
        loop {
            if self.scanner.scan()? || self.scanner.current().kind != TokenKind::Assign {
                break;
            }
            self.scanner.forward();
            let rhs = self.eval_reduction()?;
            let rhs = self.real(rhs)?;
            match &lhs {
                Value::Ident(id) => ident::assign(id, rhs.clone(), self.scope)?,
                _ => return Err(self.unexpected("left side of = is not assignable")),
            }
            lhs = rhs;
        }
        Ok(lhs)
    }

    /// reduction -> reduction '=>' or | or
    ///
    /// A falsy guard yields null and skips the right side's tokens entirely,
    /// so a malformed expression behind a false guard never raises.
    fn eval_reduction(&mut self) -> Result<Value> {
        let mut lhs = self.eval_or()?;
        loop {
            if self.scanner.scan()? || self.scanner.current().kind != TokenKind::Arrow {
                break;
            }
            self.scanner.forward();
            let cond = self.real(lhs)?;
            if cond.is_truthy() {
                let rhs = self.eval_or()?;
                lhs = self.real(rhs)?;
            } else {
                self.skip_expr()?;
                lhs = Value::Null;
            }
        }
        Ok(lhs)
    }

    fn eval_or(&mut self) -> Result<Value> {
        let mut lhs = self.eval_and()?;
        loop {
            if self.scanner.scan()? || self.scanner.current().kind != TokenKind::Or {
                break;
            }
            self.scanner.forward();
            let rhs = self.eval_and()?;
            let a = self.real(lhs)?.is_truthy();
            let b = self.real(rhs)?.is_truthy();
            lhs = Value::Bool(a || b);
        }
        Ok(lhs)
    }

    fn eval_and(&mut self) -> Result<Value> {
        let mut lhs = self.eval_compare()?;
        loop {
            if self.scanner.scan()? || self.scanner.current().kind != TokenKind::And {
                break;
            }
            self.scanner.forward();
            let rhs = self.eval_compare()?;
            let a = self.real(lhs)?.is_truthy();
            let b = self.real(rhs)?.is_truthy();
            lhs = Value::Bool(a && b);
        }
        Ok(lhs)
    }

    fn eval_compare(&mut self) -> Result<Value> {
        let mut lhs = self.eval_expr()?;
        loop {
            if self.scanner.scan()? {
                break;
            }
            let op = self.scanner.current().kind;
            if !matches!(
                op,
                TokenKind::Eq
                    | TokenKind::Neq
                    | TokenKind::Gt
                    | TokenKind::Gte
                    | TokenKind::Lt
                    | TokenKind::Lte
            ) {
                break;
            }
            self.scanner.forward();
            let rhs = self.eval_expr()?;
            let a = self.real(lhs)?;
            let b = self.real(rhs)?;
            let out = match op {
                TokenKind::Eq => a.eq_value(&b)?,
                TokenKind::Neq => !a.eq_value(&b)?,
                TokenKind::Gt => a.cmp_value(&b)?.is_gt(),
                TokenKind::Gte => !a.cmp_value(&b)?.is_lt(),
                TokenKind::Lt => a.cmp_value(&b)?.is_lt(),
                _ => !a.cmp_value(&b)?.is_gt(),
            };
            lhs = Value::Bool(out);
        }
        Ok(lhs)
    }

    fn eval_expr(&mut self) -> Result<Value> {
        let mut lhs = self.eval_term()?;
        loop {
            if self.scanner.scan()? {
                break;
            }
            let op = self.scanner.current().kind;
            if !matches!(op, TokenKind::Plus | TokenKind::Minus) {
                break;
            }
            self.scanner.forward();
            let rhs = self.eval_term()?;
            let a = self.real(lhs)?;
            let b = self.real(rhs)?;
            lhs = if op == TokenKind::Plus {
                a.add(&b)?
            } else {
                a.sub(&b)?
            };
        }
        Ok(lhs)
    }

    fn eval_term(&mut self) -> Result<Value> {
        let mut lhs = self.eval_postfix()?;
        loop {
            if self.scanner.scan()? {
                break;
            }
            let op = self.scanner.current().kind;
            if !matches!(op, TokenKind::Star | TokenKind::Slash) {
                break;
            }
            self.scanner.forward();
            let rhs = self.eval_postfix()?;
            let a = self.real(lhs)?;
            let b = self.real(rhs)?;
            lhs = if op == TokenKind::Star {
                a.mul(&b)?
            } else {
                a.div(&b)?
            };
        }
        Ok(lhs)
    }

    /// dot/call chaining: `a.b.0.*` extends a deferred path segment by
    /// segment; `x(...)` fires as soon as the chain head is an identifier
    /// followed by an opening parenthesis.
    fn eval_postfix(&mut self) -> Result<Value> {
        let mut value = self.eval_factor()?;
        loop {
            if self.scanner.scan()? {
                break;
            }
            match self.scanner.current().kind {
                TokenKind::Dot => {
                    self.scanner.forward();
                    let seg = self.parse_path_segment()?;
                    value = match value {
                        Value::Ident(mut id) => {
                            id.push(seg);
                            Value::Ident(id)
                        }
                        other => Value::Ident(Ident::from_base(other, seg)),
                    };
                }
                TokenKind::OpenParen => {
                    let Value::Ident(id) = value else {
                        return Err(self.unexpected("only identifiers are callable"));
                    };
                    value = self.eval_call(id)?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_path_segment(&mut self) -> Result<PathSeg> {
        if self.scanner.scan()? {
            return Err(self.unexpected("expected path segment after ."));
        }
        let token = self.scanner.current().clone();
        let seg = match token.kind {
            TokenKind::Ident => PathSeg::Key(Rc::from(token.raw.as_str())),
            TokenKind::Number => {
                let idx: i64 = token.raw.parse().map_err(|_| {
                    Error::parse(format!("path index {:?} is not an integer", token.raw))
                        .at(token.row, token.col)
                })?;
                PathSeg::Index(idx)
            }
            TokenKind::Star => PathSeg::Wildcard,
            _ => return Err(self.unexpected("expected path segment after .")),
        };
        self.scanner.forward();
        Ok(seg)
    }

    fn eval_call(&mut self, id: Ident) -> Result<Value> {
        // Cursor sits on '('.
        self.scanner.forward();
        self.scanner.push_ends(&[TokenKind::CloseParen]);
        let result = self.dispatch_call(&id);
        let closed = result.and_then(|value| {
            self.expect(TokenKind::CloseParen, "expected ) to close call")?;
            Ok(value)
        });
        self.scanner.pop_ends(1);
        let value = closed?;
        self.scanner.forward();
        Ok(value)
    }

    fn dispatch_call(&mut self, id: &Ident) -> Result<Value> {
        let Some(name) = id.leaf_name() else {
            return Err(Error::parse("call target must end in a name"));
        };
        if id.is_bare_name() {
            let Some(builtin) = self.builtins.get(name) else {
                return Err(Error::method_not_found(format!(
                    "unknown builtin '{}'",
                    name
                )));
            };
            let arg = self.eval_stmt()?;
            let arg = self.real(arg)?;
            return builtin(arg, self.scope);
        }
        let receiver = self.real(Value::Ident(id.parent()))?;
        methods::call(self, &receiver, name)
    }

    /// factor -> literal | identifier | '(' stmt ')' | array | object
    fn eval_factor(&mut self) -> Result<Value> {
        if self.scanner.scan()? {
            return Err(self.unexpected("expected expression"));
        }
        let token = self.scanner.current().clone();
        match token.kind {
            TokenKind::Number => {
                self.scanner.forward();
                parse_number(&token)
            }
            TokenKind::Str => {
                self.scanner.forward();
                Ok(Value::str(token.string_payload()))
            }
            TokenKind::True => {
                self.scanner.forward();
                Ok(Value::Bool(true))
            }
            TokenKind::False => {
                self.scanner.forward();
                Ok(Value::Bool(false))
            }
            TokenKind::Null => {
                self.scanner.forward();
                Ok(Value::Null)
            }
            TokenKind::Ident => {
                self.scanner.forward();
                Ok(Value::Ident(Ident::name(&token.raw)))
            }
            TokenKind::OpenParen => {
                self.scanner.forward();
                self.scanner.push_ends(&[TokenKind::CloseParen]);
                let result = self.eval_stmt().and_then(|value| {
                    self.expect(TokenKind::CloseParen, "expected ) to close group")?;
                    Ok(value)
                });
                self.scanner.pop_ends(1);
                let value = result?;
                self.scanner.forward();
                Ok(value)
            }
            TokenKind::OpenBracket => self.eval_array_literal(),
            TokenKind::OpenBrace => self.eval_object_literal(),
            _ => Err(self.unexpected("expected expression")),
        }
    }

    // === Literal executors ===
    //
    // Both push the in-progress container onto `me` so expressions inside
    // the literal can reach it (`_me`, or a sibling key by bare name), then
    // drive the shared statement grammar element by element.

    fn eval_array_literal(&mut self) -> Result<Value> {
        self.scanner.forward();
        let arr: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
        self.me.push(Value::Array(arr.clone()));
        self.scanner
            .push_ends(&[TokenKind::Comma, TokenKind::CloseBracket]);
        let result = self.array_literal_body(&arr);
        self.scanner.pop_ends(1);
        self.me.pop();
        result
    }

    fn array_literal_body(&mut self, arr: &Rc<RefCell<Vec<Value>>>) -> Result<Value> {
        loop {
            if self.scanner.scan()? {
                match self.scanner.current().kind {
                    TokenKind::CloseBracket => {
                        self.scanner.forward();
                        return Ok(Value::Array(arr.clone()));
                    }
                    TokenKind::Comma => {
                        self.scanner.forward();
                        continue;
                    }
                    _ => return Err(self.unexpected("unterminated array literal")),
                }
            }
            let element = self.eval_stmt()?;
            let element = self.real(element)?;

            // Range literal: '[' INT '...' INT ']'
            if !self.scanner.scan()? && self.scanner.current().kind == TokenKind::Range {
                if !arr.borrow().is_empty() {
                    return Err(self.unexpected("range endpoints cannot follow other elements"));
                }
                self.scanner.forward();
                let to = self.eval_stmt()?;
                let to = self.real(to)?;
                self.expect(TokenKind::CloseBracket, "expected ] to close range")?;
                self.scanner.forward();
                let (Value::Int(from), Value::Int(to)) = (&element, &to) else {
                    return Err(Error::type_mismatch("range endpoints must be integers"));
                };
                return Ok(Value::Range(Range {
                    from: *from,
                    to: *to,
                }));
            }

            arr.borrow_mut().push(element);
            if self.scanner.scan()? {
                continue;
            }
            return Err(self.unexpected("expected , or ] in array literal"));
        }
    }

    fn eval_object_literal(&mut self) -> Result<Value> {
        self.scanner.forward();
        let obj: Rc<RefCell<Object>> = Rc::new(RefCell::new(Object::new()));
        self.me.push(Value::Object(obj.clone()));
        self.scanner
            .push_ends(&[TokenKind::Comma, TokenKind::CloseBrace]);
        let result = self.object_literal_body(&obj);
        self.scanner.pop_ends(1);
        self.me.pop();
        result
    }

    fn object_literal_body(&mut self, obj: &Rc<RefCell<Object>>) -> Result<Value> {
        loop {
            if self.scanner.scan()? {
                match self.scanner.current().kind {
                    TokenKind::CloseBrace => {
                        self.scanner.forward();
                        return Ok(Value::Object(obj.clone()));
                    }
                    TokenKind::Comma => {
                        self.scanner.forward();
                        continue;
                    }
                    _ => return Err(self.unexpected("unterminated object literal")),
                }
            }
            let token = self.scanner.current().clone();
            let key: Rc<str> = match token.kind {
                TokenKind::Str => Rc::from(token.string_payload().as_str()),
                // Integer keys arrive from the array-indexed-as-object form
                // `{0:1, 1:2}`; they live as their decimal spelling.
                TokenKind::Number if !token.raw.contains('.') => Rc::from(token.raw.as_str()),
                _ => {
                    return Err(Error::type_mismatch(format!(
                        "object key must be a string, got {:?}",
                        token.raw
                    ))
                    .at(token.row, token.col))
                }
            };
            self.scanner.forward();
            self.expect(TokenKind::Colon, "expected : after object key")?;
            self.scanner.forward();
            let value = self.eval_stmt()?;
            let value = self.real(value)?;
            obj.borrow_mut().set(key, value);
            if self.scanner.scan()? {
                continue;
            }
            return Err(self.unexpected("expected , or } in object literal"));
        }
    }

    // === Method-body support ===

    /// Evaluate a method body as `pred => value` or a bare body.
    pub(crate) fn eval_guarded(&mut self) -> Result<Guarded> {
        let lhs = self.eval_or()?;
        if self.scanner.scan()? || self.scanner.current().kind != TokenKind::Arrow {
            let value = self.real(lhs)?;
            return Ok(Guarded {
                matched: value.is_truthy(),
                value,
                bare: true,
            });
        }
        self.scanner.forward();
        let matched = self.real(lhs)?.is_truthy();
        let mut value = if matched {
            let rhs = self.eval_or()?;
            self.real(rhs)?
        } else {
            self.skip_expr()?;
            Value::Null
        };
        // Any further arrows chain with plain reduction semantics.
        loop {
            if self.scanner.scan()? || self.scanner.current().kind != TokenKind::Arrow {
                break;
            }
            self.scanner.forward();
            if value.is_truthy() {
                let rhs = self.eval_or()?;
                value = self.real(rhs)?;
            } else {
                self.skip_expr()?;
                value = Value::Null;
            }
        }
        Ok(Guarded {
            matched,
            value,
            bare: false,
        })
    }

    /// Evaluate the body with per-iteration bindings in place, restoring
    /// whatever they shadowed afterwards, also on the error path.
    pub(crate) fn guarded_with(&mut self, bindings: &[(&str, Value)]) -> Result<Guarded> {
        let mut saved = Vec::with_capacity(bindings.len());
        for (name, value) in bindings {
            saved.push(self.scope.bind_saving(name, value.clone()));
        }
        let result = self.eval_guarded();
        for binding in saved.into_iter().rev() {
            self.scope.restore(binding);
        }
        result
    }

    /// Consume the tokens of one expression without evaluating anything,
    /// balancing nested brackets, stopping before the active end-set, a
    /// chain operator, or an unmatched closer.
    pub(crate) fn skip_expr(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            let ended = self.scanner.scan()?;
            let kind = self.scanner.current().kind;
            if kind == TokenKind::Eof {
                return Ok(());
            }
            if depth == 0 && (ended || matches!(kind, TokenKind::Arrow | TokenKind::Assign)) {
                return Ok(());
            }
            match kind {
                TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => depth += 1,
                TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.scanner.forward();
        }
    }

    // === Diagnostics helpers ===

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<()> {
        self.scanner.scan()?;
        if self.scanner.current().kind != kind {
            return Err(self.unexpected(what));
        }
        Ok(())
    }

    fn unexpected(&self, what: &str) -> Error {
        let token = self.scanner.current();
        if token.kind == TokenKind::Eof {
            Error::parse(format!("unexpected end of input: {}", what))
        } else {
            Error::parse(format!("unexpected token {:?}: {}", token.raw, what))
                .at(token.row, token.col)
        }
    }
}

fn parse_number(token: &Token) -> Result<Value> {
    if token.raw.contains('.') {
        token
            .raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| malformed_number(token))
    } else {
        token
            .raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| malformed_number(token))
    }
}

fn malformed_number(token: &Token) -> Error {
    Error::parse(format!("malformed number {:?}", token.raw)).at(token.row, token.col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(source: &str) -> Result<Value> {
        let builtins = Builtins::new();
        let mut scope = Scope::new();
        let mut scanner = TokenScanner::from_source(source);
        Evaluator::new(&mut scanner, &mut scope, &builtins).run_program()
    }

    fn eval_json(source: &str) -> serde_json::Value {
        eval(source)
            .expect("evaluation succeeds")
            .to_json()
            .expect("result is encodable")
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval_json("5 + 2 - 1"), json!(6));
        assert_eq!(eval_json("5 + 2 * 3"), json!(11));
        assert_eq!(eval_json("(5 + 2) * 3"), json!(21));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(eval_json("\"hello\" + \"world\""), json!("helloworld"));
        assert_eq!(eval_json("\"hello\" - \"el\""), json!("hlo"));
    }

    #[test]
    fn conditional_reduction() {
        assert_eq!(eval_json("true => 5 + 3"), json!(8));
        assert_eq!(eval_json("false => 5 + 3"), json!(null));
    }

    #[test]
    fn false_guard_skips_a_malformed_right_side() {
        // The right side would be a parse error if touched.
        assert_eq!(eval_json("false => 5 + * 3"), json!(null));
        assert_eq!(eval_json("false => {\"broken\": }"), json!(null));
    }

    #[test]
    fn assignment_round_trip() {
        assert_eq!(eval_json("a = 5 + 3; a"), json!(8));
        assert_eq!(eval_json("a = 2; b = a * 3; b"), json!(6));
    }

    #[test]
    fn dotted_assignment_creates_intermediates() {
        assert_eq!(
            eval_json("cfg.server.port = 8080; cfg"),
            json!({"server": {"port": 8080}})
        );
    }

    #[test]
    fn boolean_operators_do_not_short_circuit_but_still_combine() {
        assert_eq!(eval_json("true && false"), json!(false));
        assert_eq!(eval_json("true && 1"), json!(true));
        assert_eq!(eval_json("false || \"x\""), json!(true));
        assert_eq!(eval_json("false || 0"), json!(false));
    }

    #[test]
    fn comparison_chain_tiers() {
        assert_eq!(eval_json("1 + 1 == 2"), json!(true));
        assert_eq!(eval_json("2 * 3 > 5"), json!(true));
        assert_eq!(eval_json("\"a\" < \"b\""), json!(true));
        let err = eval("1 == \"1\"").expect_err("cross-type comparison");
        assert_eq!(err.code, crate::error::codes::TYPE);
    }

    #[test]
    fn object_and_array_literals() {
        assert_eq!(
            eval_json("{\"a\": 1 + 1, \"b\": [1, 2, 3]}"),
            json!({"a": 2, "b": [1, 2, 3]})
        );
        assert_eq!(eval_json("[]"), json!([]));
        assert_eq!(eval_json("{}"), json!({}));
    }

    #[test]
    fn integer_object_keys_become_strings() {
        assert_eq!(eval_json("{0: 1, 1: 2}"), json!({"0": 1, "1": 2}));
    }

    #[test]
    fn nested_literal_self_reference() {
        assert_eq!(
            eval_json("{\"a\": 5, \"b\": _me.a + 1}"),
            json!({"a": 5, "b": 6})
        );
        // A bare sibling name resolves too.
        assert_eq!(eval_json("{\"a\": 5, \"b\": a + 1}"), json!({"a": 5, "b": 6}));
    }

    #[test]
    fn dotted_lookup_and_wildcard() {
        assert_eq!(
            eval_json("var1 = {\"val1\": [1, 2, 3]}; var1.val1.0"),
            json!(1)
        );
        assert_eq!(
            eval_json("var1 = {\"val1\": [1, 2, 3]}; var1.val1.*"),
            json!([1, 2, 3])
        );
    }

    #[test]
    fn missing_segment_is_null_but_missing_root_raises() {
        assert_eq!(eval_json("a = {\"b\": 1}; a.nope"), json!(null));
        let err = eval("nope.deep").expect_err("unbound root");
        assert_eq!(err.code, crate::error::codes::LOOKUP);
    }

    #[test]
    fn range_literal_and_lookup() {
        assert_eq!(eval_json("[1...4]"), json!([1, 2, 3, 4]));
        assert_eq!(eval_json("r = [1...10]; r.3"), json!(4));
        let err = eval("[1...\"x\"]").expect_err("bad endpoint");
        assert_eq!(err.code, crate::error::codes::TYPE);
    }

    #[test]
    fn object_method_set_overwrites_matching_pairs() {
        assert_eq!(
            eval_json("o = {\"hello\": \"world\"}; o.set(k == \"hello\" => v + \" ^_^\")"),
            json!({"hello": "world ^_^"})
        );
        assert_eq!(
            eval_json("o = {0: 1, 1: 2, 2: 3}; o.set(k == \"0\" => v * 10); o"),
            json!({"0": 10, "1": 2, "2": 3})
        );
    }

    #[test]
    fn bare_body_set_overwrites_every_element() {
        assert_eq!(
            eval_json("o = {\"a\": 1, \"b\": 2}; o.set(v + 10); o"),
            json!({"a": 11, "b": 12})
        );
    }

    #[test]
    fn object_del_boundaries() {
        assert_eq!(
            eval_json("o = {0: 1, 1: 2, 2: 3}; o.del(k == \"0\"); o"),
            json!({"1": 2, "2": 3})
        );
        assert_eq!(
            eval_json("o = {0: 1, 1: 2, 2: 3}; o.del(k == \"2\"); o"),
            json!({"0": 1, "1": 2})
        );
        // Deleting everything must not skip neighbours after the shift.
        assert_eq!(eval_json("o = {0: 1, 1: 2, 2: 3}; o.del(true); o"), json!({}));
    }

    #[test]
    fn range_map_binds_rank_and_value() {
        assert_eq!(
            eval_json("[1...10].map(i + v)"),
            json!([1, 3, 5, 7, 9, 11, 13, 15, 17, 19])
        );
    }

    #[test]
    fn map_guarded_form_keeps_non_matching_elements() {
        assert_eq!(
            eval_json("[1, 2, 3, 4].map(v > 2 => v * 100)"),
            json!([1, 2, 300, 400])
        );
    }

    #[test]
    fn filter_builds_a_new_container() {
        assert_eq!(
            eval_json("a = [1, 2, 3, 4]; b = a.filter(v > 2); a + b"),
            json!([1, 2, 3, 4, 3, 4])
        );
        assert_eq!(
            eval_json("o = {\"a\": 1, \"b\": 0}; o.filter(v)"),
            json!({"a": 1})
        );
    }

    #[test]
    fn method_names_fall_back_case_insensitively() {
        assert_eq!(
            eval_json("[1, 2].Map(v * 2)"),
            json!([2, 4])
        );
        let err = eval("[1].frobnicate(v)").expect_err("unknown method");
        assert_eq!(err.code, crate::error::codes::METHOD);
    }

    #[test]
    fn range_rejects_mutation_as_a_no_op() {
        assert_eq!(eval_json("[1...3].set(v * 10)"), json!([1, 2, 3]));
        assert_eq!(eval_json("[1...3].del(true)"), json!([1, 2, 3]));
        assert_eq!(eval_json("[1...5].filter(v > 3)"), json!([4, 5]));
    }

    #[test]
    fn replace_renames_matching_pairs() {
        assert_eq!(
            eval_json("o = {\"a\": 1, \"b\": 2}; o.replace(k == \"a\" => {\"z\": v}); o"),
            json!({"z": 1, "b": 2})
        );
    }

    #[test]
    fn method_on_empty_collection_still_consumes_its_body() {
        assert_eq!(eval_json("o = {}; o.set(v + 1); o"), json!({}));
        assert_eq!(eval_json("[].map(v * 2) + [9]"), json!([9]));
    }

    #[test]
    fn first_element_error_aborts_the_method() {
        let err = eval("[1, \"two\", 3].map(v * 2)").expect_err("type error mid-loop");
        assert_eq!(err.code, crate::error::codes::TYPE);
    }

    #[test]
    fn composite_mutation_is_shared_across_bindings() {
        assert_eq!(
            eval_json("a = [1]; b = a; b.set(v * 5); a"),
            json!([5])
        );
    }

    #[test]
    fn log_builtin_passes_its_value_through() {
        assert_eq!(eval_json("log(5 + 3)"), json!(8));
    }

    #[test]
    fn json_builtin_parses_text() {
        assert_eq!(
            eval_json("json(\"{\\\"a\\\": [1, 2]}\")"),
            json!({"a": [1, 2]})
        );
        let err = eval("json(5)").expect_err("non-string argument");
        assert_eq!(err.code, crate::error::codes::TYPE);
        let err = eval("json(\"{oops\")").expect_err("invalid JSON text");
        assert_eq!(err.code, crate::error::codes::PARSE);
        let err = eval("frobnicate(1)").expect_err("unknown builtin");
        assert_eq!(err.code, crate::error::codes::METHOD);
    }

    #[test]
    fn statements_yield_the_last_value() {
        assert_eq!(eval_json("1; 2; 3"), json!(3));
        assert_eq!(eval_json("a = 1; a = a + 1; a;"), json!(2));
    }

    #[test]
    fn unexpected_token_is_a_parse_error() {
        let err = eval("5 +").expect_err("dangling operator");
        assert_eq!(err.code, crate::error::codes::PARSE);
        let err = eval("5 + * 3").expect_err("doubled operator");
        assert_eq!(err.code, crate::error::codes::PARSE);
    }

    #[test]
    fn object_add_merges_right_over_left() {
        assert_eq!(
            eval_json("{\"x\": 1, \"y\": 2} + {\"y\": 20, \"z\": 30}"),
            json!({"x": 1, "y": 20, "z": 30})
        );
    }
}
