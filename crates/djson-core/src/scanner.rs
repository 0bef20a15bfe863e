use crate::error::Result;
use crate::lexer::{Lexer, Token, TokenKind};

/// Buffered token source with an addressable cursor.
///
/// Tokens pulled from the lexer are cached forever, so callers can save the
/// offset, evaluate a sub-expression, rewind, and replay it. This is the mechanism
/// composite builtins use to run one body once per collection element.
/// Whitespace and comment tokens are dropped at admission.
///
/// `ends` is a stack of token-kind sets. Only the top set is consulted:
/// nested grammars push their own terminators on entry and pop them on exit,
/// sharing one token stream while independently declaring where they stop.
pub struct TokenScanner {
    lexer: Lexer,
    tokens: Vec<Token>,
    offset: usize,
    ends: Vec<Vec<TokenKind>>,
}

impl TokenScanner {
    pub fn new(lexer: Lexer) -> Self {
        Self {
            lexer,
            tokens: Vec::new(),
            offset: 0,
            ends: Vec::new(),
        }
    }

    pub fn from_source(source: &str) -> Self {
        Self::new(Lexer::from_source(source))
    }

    /// Make sure the token at the cursor is available, reporting whether it
    /// terminates the current grammar scope: a member of the active end-set,
    /// or end of input (which unconditionally ends every scope).
    pub fn scan(&mut self) -> Result<bool> {
        self.fill_to(self.offset)?;
        let token = self.at(self.offset);
        if token.kind == TokenKind::Eof {
            return Ok(true);
        }
        let kind = token.kind;
        Ok(self
            .ends
            .last()
            .is_some_and(|set| set.contains(&kind)))
    }

    /// The token at the cursor. Call `scan` first so the cache is filled.
    pub fn current(&self) -> &Token {
        self.at(self.offset)
    }

    pub fn forward(&mut self) {
        self.offset += 1;
    }

    pub fn push_ends(&mut self, kinds: &[TokenKind]) {
        self.ends.push(kinds.to_vec());
    }

    pub fn pop_ends(&mut self, n: usize) {
        for _ in 0..n {
            self.ends.pop();
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    fn fill_to(&mut self, offset: usize) -> Result<()> {
        while self.tokens.len() <= offset {
            if self
                .tokens
                .last()
                .is_some_and(|t| t.kind == TokenKind::Eof)
            {
                break;
            }
            let token = self.lexer.next_token()?;
            if matches!(token.kind, TokenKind::Whitespace | TokenKind::Comment) {
                continue;
            }
            self.tokens.push(token);
        }
        Ok(())
    }

    fn at(&self, offset: usize) -> &Token {
        // Past end of input the cursor clamps onto the final Eof token.
        let idx = offset.min(self.tokens.len().saturating_sub(1));
        &self.tokens[idx]
    }
}
