use crate::buffer::{Buffer, Stash, EOF_BYTE};
use crate::error::{Error, Result};
use crate::matcher::{all_matchers, MatchStatus, Matcher};
use std::collections::VecDeque;
use std::io::Read;

/// Default read-chunk size for the underlying byte buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // structural
    Semicolon,
    Comma,
    Colon,
    Dot,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    // operators
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    And,
    Or,
    Arrow,
    Range,
    // literals
    Number,
    Str,
    True,
    False,
    Null,
    // everything else
    Ident,
    Comment,
    Whitespace,
    Eof,
}

/// One lexed token. `raw` is the exact accepted source text (for strings,
/// including the delimiting quotes); `row`/`col` are 1-based and point at
/// the first byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub raw: String,
    pub row: usize,
    pub col: usize,
}

impl Token {
    /// String literal payload: the bytes between the quotes with `\"`
    /// collapsed; this is the only escape the language recognizes.
    pub fn string_payload(&self) -> String {
        let inner = &self.raw[1..self.raw.len() - 1];
        inner.replace("\\\"", "\"")
    }
}

/// Hand-written single-pass lexer: drives the byte buffer and stash through
/// the matcher set, producing one token per call.
///
/// Candidate selection is longest-accepted-wins; on a tie the non-identifier
/// interpretation wins, which is how `true` lexes as a keyword while
/// `trueXYZ` stays an identifier.
pub struct Lexer {
    buffer: Buffer<Box<dyn Read>>,
    stash: Stash,
    matchers: Vec<Box<dyn Matcher>>,
    pending: VecDeque<u8>,
    row: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: Box<dyn Read>, buffer_size: usize) -> Self {
        Self {
            buffer: Buffer::new(source, buffer_size),
            stash: Stash::new(),
            matchers: all_matchers(),
            pending: VecDeque::new(),
            row: 1,
            col: 1,
        }
    }

    pub fn from_source(source: &str) -> Self {
        let owned: Vec<u8> = source.as_bytes().to_vec();
        Self::new(Box::new(std::io::Cursor::new(owned)), DEFAULT_BUFFER_SIZE)
    }

    /// Lex the next token. Whitespace and comments come out as ordinary
    /// tokens; the scanner filters them. Past end of input this returns
    /// `Eof` tokens forever.
    pub fn next_token(&mut self) -> Result<Token> {
        self.stash.clear();
        for m in &mut self.matchers {
            m.reset();
        }

        let start_row = self.row;
        let start_col = self.col;
        // (row, col) of each stash byte, so backoff can rewind the cursor.
        let mut positions: Vec<(usize, usize)> = Vec::new();
        let mut alive: Vec<bool> = vec![true; self.matchers.len()];
        let mut alive_count = self.matchers.len();
        // (matcher index, accepted length)
        let mut candidates: Vec<(usize, usize)> = Vec::new();

        while alive_count > 0 {
            let byte = self.read_byte();
            positions.push((self.row, self.col));
            self.advance_position(byte);
            self.stash.push(byte);

            for (idx, m) in self.matchers.iter_mut().enumerate() {
                if !alive[idx] {
                    continue;
                }
                match m.feed(byte) {
                    MatchStatus::Matching => {}
                    MatchStatus::Matched | MatchStatus::MatchedUntilThisTry => {
                        alive[idx] = false;
                        alive_count -= 1;
                        if m.accepted() > 0 {
                            candidates.push((idx, m.accepted()));
                        }
                    }
                    MatchStatus::NotMatch => {
                        alive[idx] = false;
                        alive_count -= 1;
                    }
                }
            }
        }

        let Some(&(winner_idx, winner_len)) = candidates.iter().max_by(|a, b| {
            a.1.cmp(&b.1).then_with(|| {
                // Equal length: prefer the non-identifier interpretation.
                let a_ident = self.matchers[a.0].kind() == TokenKind::Ident;
                let b_ident = self.matchers[b.0].kind() == TokenKind::Ident;
                b_ident.cmp(&a_ident)
            })
        }) else {
            let bytes = self.stash.take();
            let shown = String::from_utf8_lossy(&bytes).into_owned();
            return Err(Error::lex(
                format!("unrecognized input {:?}", shown),
                start_row,
                start_col,
            ));
        };

        // Push the unused tail back and rewind the cursor to its first byte.
        let excess = self.stash.truncate(winner_len);
        if !excess.is_empty() {
            (self.row, self.col) = positions[winner_len];
            if excess.len() == 1 && self.pending.is_empty() {
                self.buffer.put_back(excess[0]);
            } else {
                for b in excess.into_iter().rev() {
                    self.pending.push_front(b);
                }
            }
        }

        let kind = self.matchers[winner_idx].kind();
        let raw = if kind == TokenKind::Eof {
            String::new()
        } else {
            String::from_utf8_lossy(&self.stash.take()).into_owned()
        };
        Ok(Token {
            kind,
            raw,
            row: start_row,
            col: start_col,
        })
    }

    fn read_byte(&mut self) -> u8 {
        if let Some(b) = self.pending.pop_front() {
            b
        } else {
            self.buffer.next_byte()
        }
    }

    fn advance_position(&mut self, byte: u8) {
        if byte == b'\n' {
            self.row += 1;
            self.col = 1;
        } else if byte != EOF_BYTE {
            self.col += 1;
        }
    }
}
