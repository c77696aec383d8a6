//! Human-readable listings of compiled chunks.
//!
//! ```text
//! == code ==
//! 0000    1 OP_CONSTANT         0 '1'
//! 0002    | OP_PRINT
//! 0003    2 OP_RETURN
//! ```
//!
//! Each line shows the byte offset, the source line (or `|` when it repeats the previous
//! instruction's), the mnemonic and its operands.

use crate::{
    chunk::{Chunk, OpCode},
    world::World,
};

pub fn disassemble_chunk(chunk: &Chunk, name: &str, world: &World) -> String {
    let mut out = format!("== {name} ==\n");
    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset, world, &mut out);
    }
    out
}

/// Appends the instruction at `offset` to `out` and returns the offset of the next one.
pub fn disassemble_instruction(
    chunk: &Chunk,
    offset: usize,
    world: &World,
    out: &mut String,
) -> usize {
    out.push_str(&format!("{offset:04} "));
    let line = chunk.line(offset);
    if offset > 0 && line == chunk.line(offset - 1) {
        out.push_str("   | ");
    } else {
        out.push_str(&format!("{:4} ", line.unwrap_or_default()));
    }

    let Some(&byte) = chunk.code().get(offset) else {
        out.push_str("<end of chunk>\n");
        return chunk.len().max(offset + 1);
    };
    let op = match OpCode::try_from(byte) {
        Ok(op) => op,
        Err(_) => {
            out.push_str(&format!("Unknown opcode {byte}\n"));
            return offset + 1;
        }
    };

    let name = op.mnemonic();
    match op {
        OpCode::Constant | OpCode::GetGlobal | OpCode::DefineGlobal | OpCode::SetGlobal => {
            constant_instruction(name, chunk, offset, world, out)
        }
        OpCode::GetLocal | OpCode::SetLocal => byte_instruction(name, chunk, offset, out),
        OpCode::Jump | OpCode::JumpIfFalse => jump_instruction(name, 1, chunk, offset, out),
        OpCode::Loop => jump_instruction(name, -1, chunk, offset, out),
        _ => {
            out.push_str(name);
            out.push('\n');
            offset + 1
        }
    }
}

fn truncated(name: &str, chunk: &Chunk, out: &mut String) -> usize {
    out.push_str(&format!("{name:<16} <truncated>\n"));
    chunk.len()
}

fn constant_instruction(
    name: &str,
    chunk: &Chunk,
    offset: usize,
    world: &World,
    out: &mut String,
) -> usize {
    let Some(&index) = chunk.code().get(offset + 1) else {
        return truncated(name, chunk, out);
    };
    match chunk.constants().get(usize::from(index)) {
        Some(value) => out.push_str(&format!("{name:<16} {index:4} '{}'\n", value.display(world))),
        None => out.push_str(&format!("{name:<16} {index:4} <missing>\n")),
    }
    offset + 2
}

fn byte_instruction(name: &str, chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let Some(&slot) = chunk.code().get(offset + 1) else {
        return truncated(name, chunk, out);
    };
    out.push_str(&format!("{name:<16} {slot:4}\n"));
    offset + 2
}

fn jump_instruction(name: &str, sign: i64, chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let Some(jump) = chunk.read_u16(offset + 1) else {
        return truncated(name, chunk, out);
    };
    let target = offset as i64 + 3 + sign * i64::from(jump);
    out.push_str(&format!("{name:<16} {offset:4} -> {target}\n"));
    offset + 3
}
