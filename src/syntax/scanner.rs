//! The lexer (or scanner) for blang.

use std::fmt;

use crate::diagnostics::{AsStr, Diagnostic, Location, Span};
use crate::syntax::token::{Token, TokenKind};

/// Represents the type of lexical errors that can occur during tokenization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    UnexpectedChar(char),
    UnterminatedString,
    UnterminatedComment,
}

impl AsStr for LexErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            LexErrorKind::UnexpectedChar(_) => "unexpected character",
            LexErrorKind::UnterminatedString => "unterminated string literal",
            LexErrorKind::UnterminatedComment => "unterminated block comment",
        }
    }
}

/// A lexical error, positioned at the character that started the problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
    pub line: usize,
    pub column: usize,
}

impl LexError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(
            "syntax",
            self.to_string(),
            Location::LineColumn { line: self.line, column: self.column },
        )
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LexErrorKind::UnexpectedChar(ch) => write!(f, "{} '{ch}'", self.kind.as_str()),
            kind => f.write_str(kind.as_str()),
        }
    }
}

impl std::error::Error for LexError {}

pub type LexResult<T> = Result<T, LexError>;

/// Tokenizes `src` in one pass, failing on the first lexical error.
pub fn analyze(src: &str) -> LexResult<Vec<Token<'_>>> {
    Lexer::new(src).collect_tokens()
}

/// Our lexical analyzer that breaks source text into tokens
///
/// We use a byte-based scanner; every token boundary falls on an ASCII byte,
/// so slicing the source at those offsets is always valid UTF-8.
pub struct Lexer<'input> {
    src: &'input str,
    /// Added to every span, so sources parsed into one arena never overlap.
    base: usize,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'input> Lexer<'input> {
    #[inline]
    pub fn new(src: &'input str) -> Self {
        Self::with_base(src, 0)
    }

    /// Scanner whose spans start at `base` instead of zero.
    #[inline]
    pub fn with_base(src: &'input str, base: usize) -> Self {
        Lexer { src, base, pos: 0, line: 1, column: 1 }
    }

    /// Runs the scanner to completion, ending with an `Eof` token.
    pub fn collect_tokens(mut self) -> LexResult<Vec<Token<'input>>> {
        let mut tokens = Vec::with_capacity(self.src.len() / 4 + 1);
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Returns the next token from the input.
    ///
    /// Comments and whitespace are consumed first, then the byte under the
    /// cursor decides which scanner runs.
    pub fn next_token(&mut self) -> LexResult<Token<'input>> {
        self.skip_trivia()?;

        let start = self.mark();
        let b = self.peek();
        if b == 0 && self.pos >= self.src.len() {
            return Ok(self.token(TokenKind::Eof, start, start.0, start.0));
        }

        if let Some(kind) = TokenKind::operator(b, self.peek_at(1)) {
            self.bump();
            self.bump();
            return Ok(self.token(kind, start, start.0, self.pos));
        }
        if let Some(kind) = TokenKind::punctuation(b) {
            self.bump();
            return Ok(self.token(kind, start, start.0, self.pos));
        }
        if b == b'"' || b == b'\'' {
            return self.scan_string(start, b);
        }
        if b.is_ascii_digit() {
            self.eat_while(|b| b.is_ascii_digit());
            return Ok(self.token(TokenKind::Integer, start, start.0, self.pos));
        }
        if Self::is_ident_start(b) {
            self.eat_while(Self::is_ident_continue);
            let text = &self.src[start.0..self.pos];
            let kind = TokenKind::keyword(text).unwrap_or(TokenKind::Identifier);
            return Ok(self.token(kind, start, start.0, self.pos));
        }

        let ch = self.src[self.pos..].chars().next().unwrap_or('\0');
        Err(self.error(LexErrorKind::UnexpectedChar(ch), start, start.0 + ch.len_utf8()))
    }

    /// Skips whitespace, `// line` and `/* block */` comments.
    fn skip_trivia(&mut self) -> LexResult<()> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (b'/', b'/') => self.eat_while(|b| b != b'\n' && b != b'\r'),
                (b'/', b'*') => {
                    let start = self.mark();
                    self.bump();
                    self.bump();
                    loop {
                        if self.pos >= self.src.len() {
                            return Err(self.error(
                                LexErrorKind::UnterminatedComment,
                                start,
                                start.0 + 2,
                            ));
                        }
                        if self.peek() == b'*' && self.peek_at(1) == b'/' {
                            self.bump();
                            self.bump();
                            break;
                        }
                        self.bump();
                    }
                }
                (b, _) if b.is_ascii_whitespace() => self.bump(),
                _ => return Ok(()),
            }
        }
    }

    fn scan_string(&mut self, start: (usize, usize, usize), quote: u8) -> LexResult<Token<'input>> {
        self.bump();
        let body_start = self.pos;
        while self.pos < self.src.len() && self.peek() != quote {
            self.bump();
        }
        if self.pos >= self.src.len() {
            return Err(self.error(LexErrorKind::UnterminatedString, start, start.0 + 1));
        }
        let body_end = self.pos;
        self.bump();
        Ok(self.token(TokenKind::Str, start, body_start, body_end))
    }

    #[inline]
    fn token(
        &self,
        kind: TokenKind,
        start: (usize, usize, usize),
        text_start: usize,
        text_end: usize,
    ) -> Token<'input> {
        let (pos, line, column) = start;
        Token {
            kind,
            text: &self.src[text_start..text_end],
            span: Span::new(self.base + pos, self.base + self.pos),
            line_start: line,
            line_end: self.line,
            column_start: column,
            column_end: self.column,
        }
    }

    #[cold]
    fn error(&self, kind: LexErrorKind, start: (usize, usize, usize), end: usize) -> LexError {
        let (pos, line, column) = start;
        LexError { kind, span: Span::new(self.base + pos, self.base + end), line, column }
    }

    #[inline]
    fn mark(&self) -> (usize, usize, usize) {
        (self.pos, self.line, self.column)
    }

    /// Looks at the current byte without advancing position
    ///
    /// Returns 0 (NUL byte) if we're at the end of input.
    #[inline(always)]
    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    #[inline(always)]
    fn peek_at(&self, offset: usize) -> u8 {
        *self.src.as_bytes().get(self.pos + offset).unwrap_or(&0)
    }

    /// Moves forward one byte, keeping line and column in step.
    #[inline]
    fn bump(&mut self) {
        let Some(&b) = self.src.as_bytes().get(self.pos) else {
            return;
        };
        self.pos += 1;
        match b {
            b'\n' => self.newline(),
            b'\r' if self.peek() != b'\n' => self.newline(),
            b'\r' => {}
            // UTF-8 continuation bytes belong to the previous character.
            b if b & 0xC0 == 0x80 => {}
            _ => self.column += 1,
        }
    }

    #[inline]
    fn newline(&mut self) {
        self.line += 1;
        self.column = 1;
    }

    #[inline]
    fn eat_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.pos < self.src.len() && pred(self.peek()) {
            self.bump();
        }
    }

    #[inline(always)]
    const fn is_ident_start(b: u8) -> bool {
        b.is_ascii_alphabetic() || b == b'_'
    }

    #[inline(always)]
    const fn is_ident_continue(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_'
    }
}

impl<'input> Iterator for Lexer<'input> {
    type Item = LexResult<Token<'input>>;

    /// Yields tokens up to and including `Eof`, then stops.
    fn next(&mut self) -> Option<Self::Item> {
        if self.pos > self.src.len() {
            return None;
        }
        let token = self.next_token();
        if matches!(token, Ok(Token { kind: TokenKind::Eof, .. }) | Err(_)) {
            // Park past the end so the iterator is fused.
            self.pos = self.src.len() + 1;
        }
        Some(token)
    }
}
