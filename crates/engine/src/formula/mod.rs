// Formula parsing and evaluation

pub mod ast;
pub mod eval;
pub mod functions;
pub mod parser;
pub mod refs;
