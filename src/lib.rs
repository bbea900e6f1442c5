// ABOUTME: Cirno — an embeddable scripting language with a tree-walking evaluator

pub mod ast;
pub mod builtins;
pub mod config;
pub mod error;
mod eval;
pub mod heap;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod value;

pub use error::{CirnoError, EvalError, SyntaxError};
pub use interp::{Interp, NativeCtx, NativeFn};
pub use value::{Data, Type, Value};
