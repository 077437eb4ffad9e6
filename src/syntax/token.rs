use std::fmt;

use crate::diagnostics::Span;

/// All possible token kinds in blang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Keywords
    Var,      // "var" - mutable declaration
    Const,    // "const" - constant declaration
    Function, // "function" - named or anonymous function
    Fn,       // "fn" - arrow lambda
    True,
    False,
    Null,

    // Punctuation
    Semicolon, // ";"
    LParen,    // "("
    RParen,    // ")"
    LBrace,    // "{"
    RBrace,    // "}"
    LBracket,  // "["
    RBracket,  // "]"
    Comma,     // ","

    // Operators
    Plus,      // "+"
    Minus,     // "-"
    Star,      // "*"
    Slash,     // "/"
    Percent,   // "%"
    Assign,    // "="
    Bang,      // "!"
    Less,      // "<"
    Greater,   // ">"
    EqEq,      // "=="
    NotEq,     // "!="
    LessEq,    // "<="
    GreaterEq, // ">="
    Arrow,     // "=>"

    // Variable length tokens
    Identifier,
    Integer,
    Str,

    Eof,
}

impl TokenKind {
    /// Looks up a keyword once the whole identifier has been read.
    #[inline]
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        KEYWORDS.iter().find(|(kw, _)| *kw == ident).map(|(_, kind)| *kind)
    }

    /// Single-byte punctuation, indexed by ASCII value.
    #[inline]
    pub fn punctuation(b: u8) -> Option<TokenKind> {
        PUNCTUATION.get(b as usize).copied().flatten()
    }

    /// Two-byte operators, checked before the single-byte table.
    #[inline]
    pub fn operator(first: u8, second: u8) -> Option<TokenKind> {
        match (first, second) {
            (b'=', b'=') => Some(TokenKind::EqEq),
            (b'!', b'=') => Some(TokenKind::NotEq),
            (b'<', b'=') => Some(TokenKind::LessEq),
            (b'>', b'=') => Some(TokenKind::GreaterEq),
            (b'=', b'>') => Some(TokenKind::Arrow),
            _ => None,
        }
    }

    pub const fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Var
                | TokenKind::Const
                | TokenKind::Function
                | TokenKind::Fn
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        )
    }
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("var", TokenKind::Var),
    ("const", TokenKind::Const),
    ("function", TokenKind::Function),
    ("fn", TokenKind::Fn),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("null", TokenKind::Null),
];

const PUNCTUATION: [Option<TokenKind>; 128] = {
    let mut table = [None; 128];
    table[b';' as usize] = Some(TokenKind::Semicolon);
    table[b'(' as usize] = Some(TokenKind::LParen);
    table[b')' as usize] = Some(TokenKind::RParen);
    table[b'{' as usize] = Some(TokenKind::LBrace);
    table[b'}' as usize] = Some(TokenKind::RBrace);
    table[b'[' as usize] = Some(TokenKind::LBracket);
    table[b']' as usize] = Some(TokenKind::RBracket);
    table[b',' as usize] = Some(TokenKind::Comma);
    table[b'+' as usize] = Some(TokenKind::Plus);
    table[b'-' as usize] = Some(TokenKind::Minus);
    table[b'*' as usize] = Some(TokenKind::Star);
    table[b'/' as usize] = Some(TokenKind::Slash);
    table[b'%' as usize] = Some(TokenKind::Percent);
    table[b'=' as usize] = Some(TokenKind::Assign);
    table[b'!' as usize] = Some(TokenKind::Bang);
    table[b'<' as usize] = Some(TokenKind::Less);
    table[b'>' as usize] = Some(TokenKind::Greater);
    table
};

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Var => "var",
            TokenKind::Const => "const",
            TokenKind::Function => "function",
            TokenKind::Fn => "fn",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::Semicolon => ";",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Assign => "=",
            TokenKind::Bang => "!",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::LessEq => "<=",
            TokenKind::GreaterEq => ">=",
            TokenKind::Arrow => "=>",
            TokenKind::Identifier => "identifier",
            TokenKind::Integer => "integer",
            TokenKind::Str => "string",
            TokenKind::Eof => "end of input",
        };
        f.write_str(s)
    }
}

/// A token along with its location in the original source text.
///
/// `text` borrows the exact source slice; for strings it excludes the quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'input> {
    pub kind: TokenKind,
    pub text: &'input str,
    pub span: Span,
    pub line_start: usize,
    pub line_end: usize,
    pub column_start: usize,
    pub column_end: usize,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Identifier | TokenKind::Integer => write!(f, "`{}`", self.text),
            TokenKind::Str => write!(f, "string \"{}\"", self.text),
            TokenKind::Eof => write!(f, "end of input"),
            kind => write!(f, "`{kind}`"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup_is_exact() {
        assert_eq!(TokenKind::keyword("var"), Some(TokenKind::Var));
        assert_eq!(TokenKind::keyword("function"), Some(TokenKind::Function));
        assert_eq!(TokenKind::keyword("variable"), None);
        assert_eq!(TokenKind::keyword("func"), None);
    }

    #[test]
    fn test_punctuation_table() {
        for (b, kind) in [(b';', TokenKind::Semicolon), (b'%', TokenKind::Percent), (b'}', TokenKind::RBrace)] {
            assert_eq!(TokenKind::punctuation(b), Some(kind));
        }
        assert_eq!(TokenKind::punctuation(b'@'), None);
        assert_eq!(TokenKind::punctuation(0xff), None);
    }
}
