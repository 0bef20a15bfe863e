//! djson core crate.
//!
//! djson is a superset of JSON with variables, arithmetic/logical
//! expressions, conditional reduction (`cond => value`), and method calls
//! on composite values. Source text evaluates straight to a value tree;
//! there is no AST or bytecode tier.
//!
//! The crate separates the pipeline into layers:
//!
//! - `buffer` + `matcher` + `lexer`: byte stream → tokens, via a set of
//!   per-character-class state machines competing under longest-match.
//! - `scanner`: the token cache with a rewindable cursor and the stack of
//!   end-token sets that lets nested grammars share one token stream.
//! - `value` + `ident` + `scope`: the dynamically-typed value model,
//!   deferred path references, and the ordered variable context.
//! - `eval` + `methods` + `builtins`: the recursive-descent evaluator, the
//!   per-type method registries (replay-per-element), and the global
//!   builtin registry.
//! - `encode`: the indented JSON serializer over the value surface.
//! - `engine`: the embedder facade tying the layers together.

pub mod buffer;
pub mod builtins;
pub mod encode;
pub mod engine;
pub mod error;
pub mod eval;
pub mod ident;
pub mod lexer;
pub mod matcher;
pub mod methods;
pub mod scanner;
pub mod scope;
pub mod value;

pub use builtins::{Builtin, Builtins};
pub use encode::encode;
pub use engine::Engine;
pub use error::{codes, Error, Result};
pub use eval::Evaluator;
pub use ident::{Ident, PathSeg};
pub use lexer::{Lexer, Token, TokenKind};
pub use scanner::TokenScanner;
pub use scope::Scope;
pub use value::{Object, Range, Value};
