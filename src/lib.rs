pub mod chunk;
pub mod compiler;
pub mod debug;
pub mod lexer;
pub mod table;
pub mod world;

pub use chunk::{Chunk, OpCode};
pub use compiler::{compile, Compilation, CompileError, Options};
pub use lexer::{Scanner, Token, TokenKind};
pub use table::Table;
pub use world::{value::Value, Symbol, World};
