use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured evaluation error carried through every core layer.
///
/// `code` is a stable machine-readable identifier (`DJSON_E_*`); `row`/`col`
/// point at the offending source position when one is known (1-based, 0 when
/// unknown).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Error {
    pub code: String,
    pub message: String,
    pub row: usize,
    pub col: usize,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            row: 0,
            col: 0,
        }
    }

    pub fn at(mut self, row: usize, col: usize) -> Self {
        self.row = row;
        self.col = col;
        self
    }

    /// Unrecognized byte sequence or unterminated string.
    pub fn lex(message: impl Into<String>, row: usize, col: usize) -> Self {
        Self::new(codes::LEX, message).at(row, col)
    }

    /// Grammar violation: unexpected token or unexpected end of input.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(codes::PARSE, message)
    }

    /// Operator applied to incompatible dynamic kinds.
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(codes::TYPE, message)
    }

    /// Identifier path-root resolution failure.
    pub fn lookup(message: impl Into<String>) -> Self {
        Self::new(codes::LOOKUP, message)
    }

    /// No registered handler for the requested method name.
    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::new(codes::METHOD, message)
    }

    /// Value that cannot be serialized (unresolved identifier).
    pub fn encode(message: impl Into<String>) -> Self {
        Self::new(codes::ENCODE, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.row > 0 {
            write!(
                f,
                "[{}] {} (line {}, col {})",
                self.code, self.message, self.row, self.col
            )
        } else {
            write!(f, "[{}] {}", self.code, self.message)
        }
    }
}

impl std::error::Error for Error {}

/// Stable error codes asserted by tests and CLI consumers.
pub mod codes {
    pub const LEX: &str = "DJSON_E_LEX";
    pub const PARSE: &str = "DJSON_E_PARSE";
    pub const TYPE: &str = "DJSON_E_TYPE";
    pub const LOOKUP: &str = "DJSON_E_LOOKUP";
    pub const METHOD: &str = "DJSON_E_METHOD";
    pub const ENCODE: &str = "DJSON_E_ENCODE";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position_when_known() {
        let err = Error::lex("stray byte 0x01", 3, 7);
        assert_eq!(err.to_string(), "[DJSON_E_LEX] stray byte 0x01 (line 3, col 7)");
    }

    #[test]
    fn display_omits_position_when_unknown() {
        let err = Error::type_mismatch("cannot multiply string by string");
        assert_eq!(
            err.to_string(),
            "[DJSON_E_TYPE] cannot multiply string by string"
        );
    }
}
