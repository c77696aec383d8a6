//! The compiler's output: instruction bytes, a parallel line table, and the constant pool.

use crate::world::value::Value;

macro_rules! opcodes {
    ($($(#[$meta:meta])* $name:ident = $mnemonic:literal, $operands:literal;)*) => {
        /// One instruction byte. Operand bytes follow the opcode in the chunk.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum OpCode {
            $($(#[$meta])* $name,)*
        }

        impl OpCode {
            const ALL: &'static [OpCode] = &[$(OpCode::$name,)*];

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$name => $mnemonic,)*
                }
            }

            /// How many operand bytes follow this opcode.
            pub fn operand_len(self) -> usize {
                match self {
                    $(Self::$name => $operands,)*
                }
            }
        }
    };
}

opcodes! {
    /// operand: constant pool index
    Constant = "OP_CONSTANT", 1;
    Nil = "OP_NIL", 0;
    True = "OP_TRUE", 0;
    False = "OP_FALSE", 0;
    Pop = "OP_POP", 0;
    /// operand: stack slot
    GetLocal = "OP_GET_LOCAL", 1;
    /// operand: stack slot
    SetLocal = "OP_SET_LOCAL", 1;
    /// operand: pool index of the interned name
    GetGlobal = "OP_GET_GLOBAL", 1;
    /// operand: pool index of the interned name
    DefineGlobal = "OP_DEFINE_GLOBAL", 1;
    /// operand: pool index of the interned name
    SetGlobal = "OP_SET_GLOBAL", 1;
    Equal = "OP_EQUAL", 0;
    Greater = "OP_GREATER", 0;
    Less = "OP_LESS", 0;
    Add = "OP_ADD", 0;
    Subtract = "OP_SUBTRACT", 0;
    Multiply = "OP_MULTIPLY", 0;
    Divide = "OP_DIVIDE", 0;
    Not = "OP_NOT", 0;
    Negate = "OP_NEGATE", 0;
    Print = "OP_PRINT", 0;
    /// operand: big-endian forward offset
    Jump = "OP_JUMP", 2;
    /// operand: big-endian forward offset, taken when the top of stack is falsey (not popped)
    JumpIfFalse = "OP_JUMP_IF_FALSE", 2;
    /// operand: big-endian backward offset
    Loop = "OP_LOOP", 2;
    Return = "OP_RETURN", 0;
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown opcode {0}")]
pub struct UnknownOpCode(pub u8);

impl TryFrom<u8> for OpCode {
    type Error = UnknownOpCode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(byte))
            .copied()
            .ok_or(UnknownOpCode(byte))
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op as u8
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot patch 2 bytes at offset {offset} of a {len}-byte chunk")]
pub struct PatchError {
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    code: Vec<u8>,
    /// source line of every byte in `code`
    lines: Vec<u32>,
    constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.write(op.into(), line);
    }

    /// Appends to the constant pool without deduplicating, returning the new index.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Overwrites the two bytes at `offset` with `value` in big-endian order.
    pub fn patch_u16(&mut self, offset: usize, value: u16) -> Result<(), PatchError> {
        let len = self.code.len();
        let slot = offset
            .checked_add(2)
            .filter(|end| *end <= len)
            .map(|end| &mut self.code[offset..end])
            .ok_or(PatchError { offset, len })?;
        slot.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn lines(&self) -> &[u32] {
        &self.lines
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn line(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    /// Reads a big-endian operand starting at `offset`.
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        match self.code.get(offset..offset.checked_add(2)?)? {
            [hi, lo] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}
