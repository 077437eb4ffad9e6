#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::rc::Rc;

use blang::runtime::{Interpreter, Options};
use blang::syntax::ast::{Ast, BlockId};
use blang::syntax::parser::{ParseResult, Parser};
use blang::syntax::scanner::analyze;

/// Output sink the test keeps a handle to after the interpreter takes its copy.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Interpreter reading `input` as stdin and writing into the returned buffer.
pub fn interpreter_with_input(input: &str) -> (Interpreter, SharedBuf) {
    let out = SharedBuf::default();
    let itp = Interpreter::with_io(
        Options::default(),
        Box::new(out.clone()),
        Box::new(Cursor::new(input.as_bytes().to_vec())),
    );
    (itp, out)
}

pub fn parse_from_source(src: &str, ast: &mut Ast) -> ParseResult<BlockId> {
    let tokens = analyze(src).unwrap_or_else(|err| panic!("lexing {src:?} failed: {err}"));
    Parser::new(&tokens, ast).parse_program()
}
