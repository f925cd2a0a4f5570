pub mod eval;
pub mod lexer;
pub mod registry;
