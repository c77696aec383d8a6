//! A World holds everything that outlives a single compilation: the string interner shared by
//! the compiler and the runtime, and the table backing global variables.

use core::fmt;

use lasso::{Rodeo, Spur};

use crate::{
    compiler::{self, Compilation},
    table::Table,
};

pub mod value;

use value::Value;

/// An interned string.
///
/// Two symbols are equal exactly when they were produced from the same text by the same
/// [`World`], so comparing them never touches the characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    spur: Spur,
    hash: u32,
}

impl Symbol {
    /// FNV-1a hash of the interned text, used to place the symbol in a [`Table`].
    pub fn hash_code(self) -> u32 {
        self.hash
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?}, {:#010x})", self.spur, self.hash)
    }
}

fn hash_str(text: &str) -> u32 {
    text.bytes().fold(2_166_136_261u32, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(16_777_619)
    })
}

#[derive(Default)]
pub struct World {
    /// interner
    rodeo: Rodeo,
    /// global variable storage, written by the runtime
    globals: Table<Value>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, text: impl AsRef<str>) -> Symbol {
        let text = text.as_ref();
        Symbol {
            spur: self.rodeo.get_or_intern(text),
            hash: hash_str(text),
        }
    }

    /// Looks a string up without interning it.
    pub fn get(&self, text: impl AsRef<str>) -> Option<Symbol> {
        let text = text.as_ref();
        self.rodeo.get(text).map(|spur| Symbol {
            spur,
            hash: hash_str(text),
        })
    }

    pub fn resolve(&self, symbol: Symbol) -> &str {
        self.rodeo.resolve(&symbol.spur)
    }

    pub fn globals(&self) -> &Table<Value> {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut Table<Value> {
        &mut self.globals
    }

    /// Copies every binding of `other` into the global table, overwriting existing ones.
    pub fn import_globals(&mut self, other: &Table<Value>) {
        self.globals.merge(other);
    }

    pub fn compile(&mut self, source: &str) -> Compilation {
        compiler::compile(self, source)
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("interned", &self.rodeo.len())
            .field("globals", &self.globals.len())
            .finish()
    }
}
