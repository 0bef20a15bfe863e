use crate::lexer::TokenKind;

/// Outcome of feeding one byte to a matcher.
///
/// `Matched` accepts the stash including the current byte;
/// `MatchedUntilThisTry` accepts a prefix only (the matcher reports how much
/// through [`Matcher::accepted`]) and the lexer pushes the rest back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Matching,
    Matched,
    NotMatch,
    MatchedUntilThisTry,
}

/// A per-character-class token recognizer. Each implementation is a micro
/// state machine fed one byte per `feed` call; `reset` rearms it for the
/// next token.
pub trait Matcher {
    fn kind(&self) -> TokenKind;
    fn feed(&mut self, byte: u8) -> MatchStatus;
    /// Number of stash bytes accepted; meaningful on a terminal status.
    fn accepted(&self) -> usize;
    fn reset(&mut self);
}

/// Builds the full matcher set in priority-neutral order; the lexer picks
/// winners by accepted length, preferring non-identifier kinds on ties.
pub fn all_matchers() -> Vec<Box<dyn Matcher>> {
    let mut set: Vec<Box<dyn Matcher>> = Vec::new();
    for (pat, kind) in EXACT_TOKENS {
        set.push(Box::new(ExactMatcher::new(pat, *kind)));
    }
    set.push(Box::new(IdentMatcher::new()));
    set.push(Box::new(NumberMatcher::new()));
    set.push(Box::new(StringMatcher::new()));
    set.push(Box::new(WhitespaceMatcher::new()));
    set.push(Box::new(CommentMatcher::new()));
    set.push(Box::new(EofMatcher::new()));
    set
}

const EXACT_TOKENS: &[(&[u8], TokenKind)] = &[
    (b";", TokenKind::Semicolon),
    (b",", TokenKind::Comma),
    (b":", TokenKind::Colon),
    (b".", TokenKind::Dot),
    (b"...", TokenKind::Range),
    (b"(", TokenKind::OpenParen),
    (b")", TokenKind::CloseParen),
    (b"[", TokenKind::OpenBracket),
    (b"]", TokenKind::CloseBracket),
    (b"{", TokenKind::OpenBrace),
    (b"}", TokenKind::CloseBrace),
    (b"=", TokenKind::Assign),
    (b"==", TokenKind::Eq),
    (b"!=", TokenKind::Neq),
    (b">", TokenKind::Gt),
    (b">=", TokenKind::Gte),
    (b"<", TokenKind::Lt),
    (b"<=", TokenKind::Lte),
    (b"+", TokenKind::Plus),
    (b"-", TokenKind::Minus),
    (b"*", TokenKind::Star),
    (b"/", TokenKind::Slash),
    (b"&&", TokenKind::And),
    (b"||", TokenKind::Or),
    (b"=>", TokenKind::Arrow),
    (b"true", TokenKind::True),
    (b"false", TokenKind::False),
    (b"null", TokenKind::Null),
];

// === Exact strings: punctuation, operators, keywords ===

struct ExactMatcher {
    pattern: &'static [u8],
    kind: TokenKind,
    pos: usize,
    done: bool,
}

impl ExactMatcher {
    fn new(pattern: &'static [u8], kind: TokenKind) -> Self {
        Self {
            pattern,
            kind,
            pos: 0,
            done: false,
        }
    }
}

impl Matcher for ExactMatcher {
    fn kind(&self) -> TokenKind {
        self.kind
    }

    fn feed(&mut self, byte: u8) -> MatchStatus {
        if self.done || self.pos >= self.pattern.len() || byte != self.pattern[self.pos] {
            self.done = true;
            return MatchStatus::NotMatch;
        }
        self.pos += 1;
        if self.pos == self.pattern.len() {
            self.done = true;
            MatchStatus::Matched
        } else {
            MatchStatus::Matching
        }
    }

    fn accepted(&self) -> usize {
        if self.pos == self.pattern.len() {
            self.pos
        } else {
            0
        }
    }

    fn reset(&mut self) {
        self.pos = 0;
        self.done = false;
    }
}

// === Identifier: [A-Za-z_][A-Za-z0-9_]* ===

struct IdentMatcher {
    count: usize,
}

impl IdentMatcher {
    fn new() -> Self {
        Self { count: 0 }
    }
}

impl Matcher for IdentMatcher {
    fn kind(&self) -> TokenKind {
        TokenKind::Ident
    }

    fn feed(&mut self, byte: u8) -> MatchStatus {
        let head = byte.is_ascii_alphabetic() || byte == b'_';
        let tail = head || byte.is_ascii_digit();
        let ok = if self.count == 0 { head } else { tail };
        if ok {
            self.count += 1;
            MatchStatus::Matching
        } else if self.count > 0 {
            MatchStatus::MatchedUntilThisTry
        } else {
            MatchStatus::NotMatch
        }
    }

    fn accepted(&self) -> usize {
        self.count
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

// === Number: decimal digits, at most one '.' ===
//
// A trailing dot is never part of the number: `accepted` only advances when
// a digit lands, so `1...10` backs off to the integer `1` and leaves the
// range operator intact.

struct NumberMatcher {
    consumed: usize,
    accepted: usize,
    seen_dot: bool,
}

impl NumberMatcher {
    fn new() -> Self {
        Self {
            consumed: 0,
            accepted: 0,
            seen_dot: false,
        }
    }
}

impl Matcher for NumberMatcher {
    fn kind(&self) -> TokenKind {
        TokenKind::Number
    }

    fn feed(&mut self, byte: u8) -> MatchStatus {
        if byte.is_ascii_digit() {
            self.consumed += 1;
            self.accepted = self.consumed;
            return MatchStatus::Matching;
        }
        if byte == b'.' && !self.seen_dot && self.accepted > 0 {
            self.seen_dot = true;
            self.consumed += 1;
            return MatchStatus::Matching;
        }
        if self.accepted > 0 {
            MatchStatus::MatchedUntilThisTry
        } else {
            MatchStatus::NotMatch
        }
    }

    fn accepted(&self) -> usize {
        self.accepted
    }

    fn reset(&mut self) {
        self.consumed = 0;
        self.accepted = 0;
        self.seen_dot = false;
    }
}

// === String: '"' delimited, `\"` the only escape ===

struct StringMatcher {
    consumed: usize,
    open: bool,
    escaped: bool,
    closed: bool,
}

impl StringMatcher {
    fn new() -> Self {
        Self {
            consumed: 0,
            open: false,
            escaped: false,
            closed: false,
        }
    }
}

impl Matcher for StringMatcher {
    fn kind(&self) -> TokenKind {
        TokenKind::Str
    }

    fn feed(&mut self, byte: u8) -> MatchStatus {
        if self.closed {
            return MatchStatus::NotMatch;
        }
        if !self.open {
            if byte == b'"' {
                self.open = true;
                self.consumed = 1;
                return MatchStatus::Matching;
            }
            return MatchStatus::NotMatch;
        }
        if byte == crate::buffer::EOF_BYTE {
            // Unterminated: no acceptance, the lexer reports DJSON_E_LEX.
            return MatchStatus::NotMatch;
        }
        self.consumed += 1;
        if self.escaped {
            self.escaped = false;
            return MatchStatus::Matching;
        }
        match byte {
            b'\\' => {
                self.escaped = true;
                MatchStatus::Matching
            }
            b'"' => {
                self.closed = true;
                MatchStatus::Matched
            }
            _ => MatchStatus::Matching,
        }
    }

    fn accepted(&self) -> usize {
        if self.closed {
            self.consumed
        } else {
            0
        }
    }

    fn reset(&mut self) {
        self.consumed = 0;
        self.open = false;
        self.escaped = false;
        self.closed = false;
    }
}

// === Whitespace run ===

struct WhitespaceMatcher {
    count: usize,
}

impl WhitespaceMatcher {
    fn new() -> Self {
        Self { count: 0 }
    }
}

impl Matcher for WhitespaceMatcher {
    fn kind(&self) -> TokenKind {
        TokenKind::Whitespace
    }

    fn feed(&mut self, byte: u8) -> MatchStatus {
        if matches!(byte, b' ' | b'\t' | b'\r' | b'\n') {
            self.count += 1;
            MatchStatus::Matching
        } else if self.count > 0 {
            MatchStatus::MatchedUntilThisTry
        } else {
            MatchStatus::NotMatch
        }
    }

    fn accepted(&self) -> usize {
        self.count
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

// === Comment: '#' to end of line (newline excluded) ===

struct CommentMatcher {
    count: usize,
}

impl CommentMatcher {
    fn new() -> Self {
        Self { count: 0 }
    }
}

impl Matcher for CommentMatcher {
    fn kind(&self) -> TokenKind {
        TokenKind::Comment
    }

    fn feed(&mut self, byte: u8) -> MatchStatus {
        if self.count == 0 {
            if byte == b'#' {
                self.count = 1;
                return MatchStatus::Matching;
            }
            return MatchStatus::NotMatch;
        }
        if byte == b'\n' || byte == crate::buffer::EOF_BYTE {
            return MatchStatus::MatchedUntilThisTry;
        }
        self.count += 1;
        MatchStatus::Matching
    }

    fn accepted(&self) -> usize {
        self.count
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

// === End of input: a single synthetic NUL ===

struct EofMatcher {
    matched: bool,
    dead: bool,
}

impl EofMatcher {
    fn new() -> Self {
        Self {
            matched: false,
            dead: false,
        }
    }
}

impl Matcher for EofMatcher {
    fn kind(&self) -> TokenKind {
        TokenKind::Eof
    }

    fn feed(&mut self, byte: u8) -> MatchStatus {
        if self.dead {
            return MatchStatus::NotMatch;
        }
        self.dead = true;
        if byte == crate::buffer::EOF_BYTE {
            self.matched = true;
            MatchStatus::Matched
        } else {
            MatchStatus::NotMatch
        }
    }

    fn accepted(&self) -> usize {
        if self.matched {
            1
        } else {
            0
        }
    }

    fn reset(&mut self) {
        self.matched = false;
        self.dead = false;
    }
}
