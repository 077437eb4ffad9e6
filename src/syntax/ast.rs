//! The abstract syntax tree (AST) representation for blang.
//!
//! Nodes are stored in per-family arenas and refer to each other by index.
//! Arenas give us better cache locality, no reference cycles, and most
//! importantly stable ids: a closure keeps a [`FuncId`] instead of copying its
//! body, and the ids stay valid for as long as the [`Ast`] lives.

use std::fmt;
use std::rc::Rc;

use crate::diagnostics::Span;

/// Identifier text shared between the AST and the symbol tables.
pub type Name = Rc<str>;

/// Append-only storage for one node family.
#[derive(Debug)]
pub struct Arena<T> {
    pub nodes: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena { nodes: Vec::new() }
    }
}

impl<T> Arena<T> {
    #[inline(always)]
    pub const fn new() -> Self {
        Arena { nodes: Vec::new() }
    }

    /// Stores a node and returns its index.
    #[inline(always)]
    pub fn alloc(&mut self, node: T) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(node);
        idx
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

macro_rules! node_id {
    ($($(#[$meta:meta])* $name:ident;)*) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub usize);
    )*};
}

node_id! {
    /// Index of a [`Stmt`] in [`Ast::stmts`].
    StmtId;
    /// Index of an [`Expr`] in [`Ast::exprs`].
    ExprId;
    /// Index of a [`Block`] in [`Ast::blocks`].
    BlockId;
    /// Index of a [`FuncDef`] in [`Ast::funcs`].
    FuncId;
}

/// Binary operators, lowest precedence last in the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl BinaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Expression evaluated for its value, e.g. `x + 1;`.
    Expr(ExprId),
    /// `var x = e;` or `const x = e;`.
    Declare { name: Name, value: ExprId, is_const: bool, span: Span },
    /// `x = e;`, writes through to the declaring scope.
    Assign { name: Name, value: ExprId, span: Span },
    /// `function f(a, b) { ... }`.
    Function { name: Name, func: FuncId, span: Span },
    /// Nested `{ ... }` with its own scope.
    Block(BlockId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer(i64, Span),
    Str(String, Span),
    Bool(bool, Span),
    Null(Span),
    Identifier(Name, Span),
    Binary { op: BinaryOp, lhs: ExprId, rhs: ExprId, span: Span },
    Unary { op: UnaryOp, operand: ExprId, span: Span },
    Call { callee: ExprId, args: Vec<ExprId>, span: Span },
    Array(Vec<ExprId>, Span),
    Index { target: ExprId, index: ExprId, span: Span },
    /// Anonymous `function (..) { .. }` or `fn (..) => ..`.
    Function(FuncId, Span),
}

/// A sequence of statements; the program root is a block too.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<StmtId>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FuncBody {
    Block(BlockId),
    Expr(ExprId),
}

/// Everything a closure needs from the syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub name: Option<Name>,
    pub params: Vec<Name>,
    pub body: FuncBody,
    pub span: Span,
}

/// Owner of every node produced by the parser.
///
/// Spans are offsets into the concatenation of every source parsed into the
/// arena, one byte apart, so a span names both the source and the position.
#[derive(Debug, Default)]
pub struct Ast {
    pub stmts: Arena<Stmt>,
    pub exprs: Arena<Expr>,
    pub blocks: Arena<Block>,
    pub funcs: Arena<FuncDef>,
    source_end: usize,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Span offset the next source will start at.
    #[inline]
    pub fn source_end(&self) -> usize {
        self.source_end
    }

    /// Reserves span offsets for a source of `len` bytes and returns its base.
    pub fn begin_source(&mut self, len: usize) -> usize {
        let base = self.source_end;
        self.source_end = base + len + 1;
        base
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts.nodes[id.0]
    }

    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs.nodes[id.0]
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks.nodes[id.0]
    }

    #[inline]
    pub fn func(&self, id: FuncId) -> &FuncDef {
        &self.funcs.nodes[id.0]
    }

    #[inline]
    pub fn alloc_stmt(&mut self, stmt: Stmt) -> StmtId {
        StmtId(self.stmts.alloc(stmt))
    }

    #[inline]
    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        ExprId(self.exprs.alloc(expr))
    }

    #[inline]
    pub fn alloc_block(&mut self, block: Block) -> BlockId {
        BlockId(self.blocks.alloc(block))
    }

    #[inline]
    pub fn alloc_func(&mut self, func: FuncDef) -> FuncId {
        FuncId(self.funcs.alloc(func))
    }

    pub fn stmt_span(&self, id: StmtId) -> Span {
        match self.stmt(id) {
            Stmt::Expr(expr) => self.expr(*expr).span(),
            Stmt::Declare { span, .. } | Stmt::Assign { span, .. } | Stmt::Function { span, .. } => {
                *span
            }
            Stmt::Block(block) => self.block(*block).span,
        }
    }

    /// Renders an expression back to source-like text, fully parenthesized.
    /// Handy in tests to check how the parser grouped things.
    pub fn display_expr(&self, id: ExprId) -> String {
        let mut out = String::new();
        self.write_expr(id, &mut out);
        out
    }

    fn write_expr(&self, id: ExprId, out: &mut String) {
        use std::fmt::Write;

        match self.expr(id) {
            Expr::Integer(n, _) => {
                let _ = write!(out, "{n}");
            }
            Expr::Str(s, _) => {
                let _ = write!(out, "\"{s}\"");
            }
            Expr::Bool(b, _) => {
                let _ = write!(out, "{b}");
            }
            Expr::Null(_) => out.push_str("null"),
            Expr::Identifier(name, _) => out.push_str(name),
            Expr::Binary { op, lhs, rhs, .. } => {
                out.push('(');
                self.write_expr(*lhs, out);
                let _ = write!(out, " {op} ");
                self.write_expr(*rhs, out);
                out.push(')');
            }
            Expr::Unary { op, operand, .. } => {
                let _ = write!(out, "({op}");
                self.write_expr(*operand, out);
                out.push(')');
            }
            Expr::Call { callee, args, .. } => {
                self.write_expr(*callee, out);
                self.write_list('(', args, ')', out);
            }
            Expr::Array(items, _) => self.write_list('[', items, ']', out),
            Expr::Index { target, index, .. } => {
                self.write_expr(*target, out);
                out.push('[');
                self.write_expr(*index, out);
                out.push(']');
            }
            Expr::Function(func, _) => {
                let def = self.func(*func);
                out.push_str("fn(");
                out.push_str(&def.params.join(", "));
                out.push(')');
            }
        }
    }

    fn write_list(&self, open: char, items: &[ExprId], close: char, out: &mut String) {
        out.push(open);
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_expr(*item, out);
        }
        out.push(close);
    }
}

/// Trait for types that can provide a span, which is a range of source code positions.
pub trait Spanned {
    fn span(&self) -> Span;
}

impl Spanned for Expr {
    fn span(&self) -> Span {
        match self {
            Expr::Integer(_, span)
            | Expr::Str(_, span)
            | Expr::Bool(_, span)
            | Expr::Null(span)
            | Expr::Identifier(_, span)
            | Expr::Array(_, span)
            | Expr::Function(_, span) => *span,
            Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Index { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_stable_across_appends() {
        let mut ast = Ast::new();
        let one = ast.alloc_expr(Expr::Integer(1, Span::default()));
        let two = ast.alloc_expr(Expr::Integer(2, Span::default()));
        let sum = ast.alloc_expr(Expr::Binary { op: BinaryOp::Add, lhs: one, rhs: two, span: Span::default() });
        for i in 0..100 {
            ast.alloc_expr(Expr::Integer(i, Span::default()));
        }
        assert_eq!(ast.display_expr(sum), "(1 + 2)");
    }
}
