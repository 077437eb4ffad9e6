//! The syntax parser for blang.

use std::fmt;
use std::rc::Rc;

use crate::diagnostics::{AsStr, Diagnostic, Location, Span};
use crate::syntax::ast::*;
use crate::syntax::scanner::Lexer;
use crate::syntax::token::{Token, TokenKind};

/// What went wrong while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Found a token that cannot appear here; `expected` says what could.
    UnexpectedToken { expected: &'static str },
    /// Integer literal that does not fit in 64 bits.
    InvalidInteger,
}

impl AsStr for ParseErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            ParseErrorKind::UnexpectedToken { .. } => "unexpected token",
            ParseErrorKind::InvalidInteger => "integer literal out of range",
        }
    }
}

/// A syntax error, pointing at the offending token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Display form of the offending token.
    pub found: String,
    pub span: Span,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    fn new(kind: ParseErrorKind, token: &Token<'_>) -> Self {
        ParseError {
            kind,
            found: token.to_string(),
            span: token.span,
            line: token.line_start,
            column: token.column_start,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(
            "syntax",
            self.to_string(),
            Location::LineColumn { line: self.line, column: self.column },
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::UnexpectedToken { expected } => {
                write!(f, "{} {}, expecting {expected}", self.kind.as_str(), self.found)
            }
            ParseErrorKind::InvalidInteger => write!(f, "{} {}", self.kind.as_str(), self.found),
        }
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Recursive descent parser over a finished token sequence.
///
/// Operator precedence is encoded by call depth: each binary level calls the
/// next tighter one for its operands and folds repetitions to the left.
/// Nodes are appended to a caller-owned [`Ast`], so a REPL can keep parsing
/// new lines into the same tree.
pub struct Parser<'t, 'input> {
    tokens: &'t [Token<'input>],
    pos: usize,
    pub ast: &'t mut Ast,
}

impl<'t, 'input> Parser<'t, 'input> {
    /// `tokens` must end with an `Eof` token, as produced by the scanner.
    pub fn new(tokens: &'t [Token<'input>], ast: &'t mut Ast) -> Self {
        debug_assert!(matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof));
        Parser { tokens, pos: 0, ast }
    }

    /// Parses a whole program into a root block.
    pub fn parse_program(&mut self) -> ParseResult<BlockId> {
        let start = self.peek().span;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::Eof) {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            stmts.push(self.parse_statement()?);
        }
        let span = start.to(self.peek().span);
        Ok(self.ast.alloc_block(Block { stmts, span }))
    }

    fn parse_statement(&mut self) -> ParseResult<StmtId> {
        let token = *self.peek();
        let stmt = match token.kind {
            TokenKind::Var | TokenKind::Const => self.parse_declaration()?,
            TokenKind::Function if self.peek_at(1).kind == TokenKind::Identifier => {
                self.parse_function_declaration()?
            }
            TokenKind::LBrace => Stmt::Block(self.parse_block()?),
            TokenKind::Identifier if self.peek_at(1).kind == TokenKind::Assign => {
                self.parse_assignment()?
            }
            _ => {
                let expr = self.parse_expression()?;
                self.eat(TokenKind::Semicolon);
                Stmt::Expr(expr)
            }
        };
        Ok(self.ast.alloc_stmt(stmt))
    }

    // var x = expr;  /  const x = expr;
    fn parse_declaration(&mut self) -> ParseResult<Stmt> {
        let keyword = self.advance();
        let is_const = keyword.kind == TokenKind::Const;
        let name = self.expect(TokenKind::Identifier, "an identifier")?;
        self.expect(TokenKind::Assign, "=")?;
        let value = self.parse_expression()?;
        let span = keyword.span.to(self.ast.expr(value).span());
        self.eat(TokenKind::Semicolon);
        Ok(Stmt::Declare { name: Rc::from(name.text), value, is_const, span })
    }

    // x = expr;
    fn parse_assignment(&mut self) -> ParseResult<Stmt> {
        let name = self.advance();
        self.expect(TokenKind::Assign, "=")?;
        let value = self.parse_expression()?;
        let span = name.span.to(self.ast.expr(value).span());
        self.eat(TokenKind::Semicolon);
        Ok(Stmt::Assign { name: Rc::from(name.text), value, span })
    }

    // function name(a, b) { ... }
    fn parse_function_declaration(&mut self) -> ParseResult<Stmt> {
        let keyword = self.advance();
        let name = self.expect(TokenKind::Identifier, "a function name")?;
        let name: Name = Rc::from(name.text);
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        let span = keyword.span.to(self.ast.block(body).span);
        let func = self.ast.alloc_func(FuncDef {
            name: Some(name.clone()),
            params,
            body: FuncBody::Block(body),
            span,
        });
        Ok(Stmt::Function { name, func, span })
    }

    fn parse_block(&mut self) -> ParseResult<BlockId> {
        let open = self.expect(TokenKind::LBrace, "{")?;
        let mut stmts = Vec::new();
        loop {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            if self.check(TokenKind::RBrace) {
                break;
            }
            if self.check(TokenKind::Eof) {
                return Err(self.unexpected("}"));
            }
            stmts.push(self.parse_statement()?);
        }
        let close = self.advance();
        Ok(self.ast.alloc_block(Block { stmts, span: open.span.to(close.span) }))
    }

    // '(' (IDENT (',' IDENT)*)? ')'
    fn parse_params(&mut self) -> ParseResult<Vec<Name>> {
        self.expect(TokenKind::LParen, "(")?;
        let mut params = Vec::new();
        if !self.eat(TokenKind::RParen) {
            loop {
                let param = self.expect(TokenKind::Identifier, "a parameter name")?;
                params.push(Rc::from(param.text));
                if self.eat(TokenKind::RParen) {
                    break;
                }
                self.expect(TokenKind::Comma, ", or )")?;
            }
        }
        Ok(params)
    }

    /// Parses a full expression.
    #[inline]
    pub fn parse_expression(&mut self) -> ParseResult<ExprId> {
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> ParseResult<ExprId> {
        self.parse_left_assoc(Self::parse_comparison, |kind| match kind {
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::NotEq),
            _ => None,
        })
    }

    fn parse_comparison(&mut self) -> ParseResult<ExprId> {
        self.parse_left_assoc(Self::parse_additive, |kind| match kind {
            TokenKind::Less => Some(BinaryOp::Less),
            TokenKind::LessEq => Some(BinaryOp::LessEq),
            TokenKind::Greater => Some(BinaryOp::Greater),
            TokenKind::GreaterEq => Some(BinaryOp::GreaterEq),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> ParseResult<ExprId> {
        self.parse_left_assoc(Self::parse_multiplicative, |kind| match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> ParseResult<ExprId> {
        self.parse_left_assoc(Self::parse_unary, |kind| match kind {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Mod),
            _ => None,
        })
    }

    /// One precedence level: `operand (op operand)*`, each repetition wrapping
    /// what was built so far as the new left child.
    #[inline]
    fn parse_left_assoc(
        &mut self,
        operand: fn(&mut Self) -> ParseResult<ExprId>,
        op_for: fn(TokenKind) -> Option<BinaryOp>,
    ) -> ParseResult<ExprId> {
        let mut lhs = operand(self)?;
        while let Some(op) = op_for(self.peek().kind) {
            self.advance();
            let rhs = operand(self)?;
            let span = self.ast.expr(lhs).span().to(self.ast.expr(rhs).span());
            lhs = self.ast.alloc_expr(Expr::Binary { op, lhs, rhs, span });
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<ExprId> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let token = self.advance();
        let operand = self.parse_unary()?;
        let span = token.span.to(self.ast.expr(operand).span());
        Ok(self.ast.alloc_expr(Expr::Unary { op, operand, span }))
    }

    // primary ( '(' args ')' | '[' expr ']' )*
    fn parse_postfix(&mut self) -> ParseResult<ExprId> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(TokenKind::LParen) {
                let args = self.parse_args(TokenKind::RParen, ")")?;
                let close = self.tokens[self.pos - 1].span;
                let span = self.ast.expr(expr).span().to(close);
                expr = self.ast.alloc_expr(Expr::Call { callee: expr, args, span });
            } else if self.eat(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                let close = self.expect(TokenKind::RBracket, "]")?;
                let span = self.ast.expr(expr).span().to(close.span);
                expr = self.ast.alloc_expr(Expr::Index { target: expr, index, span });
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma separated expressions up to `close`; the opening token is
    /// already consumed. A trailing comma is accepted.
    fn parse_args(&mut self, close: TokenKind, what: &'static str) -> ParseResult<Vec<ExprId>> {
        let mut args = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(args);
            }
            args.push(self.parse_expression()?);
            if self.eat(close) {
                return Ok(args);
            }
            if !self.eat(TokenKind::Comma) {
                return Err(self.unexpected(what));
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<ExprId> {
        let token = *self.peek();
        let expr = match token.kind {
            TokenKind::Integer => {
                self.advance();
                let n = token
                    .text
                    .parse::<i64>()
                    .map_err(|_| ParseError::new(ParseErrorKind::InvalidInteger, &token))?;
                Expr::Integer(n, token.span)
            }
            TokenKind::Str => {
                self.advance();
                Expr::Str(token.text.to_owned(), token.span)
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Expr::Bool(token.kind == TokenKind::True, token.span)
            }
            TokenKind::Null => {
                self.advance();
                Expr::Null(token.span)
            }
            TokenKind::Identifier => {
                self.advance();
                Expr::Identifier(Rc::from(token.text), token.span)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen, ")")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.parse_args(TokenKind::RBracket, "]")?;
                let close = self.tokens[self.pos - 1].span;
                Expr::Array(items, token.span.to(close))
            }
            TokenKind::Fn => return self.parse_lambda(),
            TokenKind::Function => return self.parse_function_expression(),
            _ => return Err(self.unexpected("an expression")),
        };
        Ok(self.ast.alloc_expr(expr))
    }

    // fn (a, b) => expr
    fn parse_lambda(&mut self) -> ParseResult<ExprId> {
        let keyword = self.advance();
        let params = self.parse_params()?;
        self.expect(TokenKind::Arrow, "=>")?;
        let body = self.parse_expression()?;
        let span = keyword.span.to(self.ast.expr(body).span());
        let func =
            self.ast.alloc_func(FuncDef { name: None, params, body: FuncBody::Expr(body), span });
        Ok(self.ast.alloc_expr(Expr::Function(func, span)))
    }

    // function (a, b) { ... }
    fn parse_function_expression(&mut self) -> ParseResult<ExprId> {
        let keyword = self.advance();
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        let span = keyword.span.to(self.ast.block(body).span);
        let func =
            self.ast.alloc_func(FuncDef { name: None, params, body: FuncBody::Block(body), span });
        Ok(self.ast.alloc_expr(Expr::Function(func, span)))
    }

    #[inline]
    fn peek(&self) -> &Token<'input> {
        self.peek_at(0)
    }

    /// Never runs past `Eof`: lookahead beyond the end yields the final token.
    #[inline]
    fn peek_at(&self, offset: usize) -> &Token<'input> {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    #[inline]
    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    #[inline]
    fn advance(&mut self) -> Token<'input> {
        let token = *self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    #[inline]
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> ParseResult<Token<'input>> {
        if self.check(kind) { Ok(self.advance()) } else { Err(self.unexpected(expected)) }
    }

    #[cold]
    fn unexpected(&self, expected: &'static str) -> ParseError {
        ParseError::new(ParseErrorKind::UnexpectedToken { expected }, self.peek())
    }
}

/// Scans and parses `src` into `ast`, returning the new root block. Spans
/// start at [`Ast::source_end`].
pub fn parse_source(src: &str, ast: &mut Ast) -> Result<BlockId, crate::Error> {
    let base = ast.begin_source(src.len());
    let tokens = Lexer::with_base(src, base).collect_tokens()?;
    let root = Parser::new(&tokens, ast).parse_program()?;
    Ok(root)
}
