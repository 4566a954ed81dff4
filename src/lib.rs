pub mod ast;
pub mod cli;
pub mod environment;
pub mod error;
pub mod parser;
pub mod repl;
pub mod runtime;
mod stack;
pub mod stdlib;
pub mod tokenizer;
pub mod value;
