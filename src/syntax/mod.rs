pub mod ast;
pub mod parser;
pub mod scanner;
pub mod token;
