//! A small stack machine, just enough to check what compiled chunks do when executed.

use loxc::{Chunk, OpCode, Value, World};

#[derive(Debug)]
pub enum Failure {
    Compile(Vec<String>),
    Runtime(String),
}

/// Compiles `source` into `world` and runs it, returning everything it printed.
pub fn run(world: &mut World, source: &str) -> Result<Vec<String>, Failure> {
    let compiled = world.compile(source);
    if !compiled.is_success() {
        return Err(Failure::Compile(
            compiled.errors.iter().map(ToString::to_string).collect(),
        ));
    }
    Vm {
        world,
        chunk: &compiled.chunk,
        stack: Vec::new(),
        output: Vec::new(),
    }
    .execute()
    .map_err(Failure::Runtime)
}

pub fn run_fresh(source: &str) -> Result<Vec<String>, Failure> {
    run(&mut World::new(), source)
}

struct Vm<'a> {
    world: &'a mut World,
    chunk: &'a Chunk,
    stack: Vec<Value>,
    output: Vec<String>,
}

impl Vm<'_> {
    fn pop(&mut self) -> Result<Value, String> {
        self.stack.pop().ok_or_else(|| "stack underflow".to_string())
    }

    fn peek(&self) -> Result<Value, String> {
        self.stack.last().copied().ok_or_else(|| "empty stack".to_string())
    }

    fn numbers(&mut self) -> Result<(f64, f64), String> {
        let b = self.pop()?;
        let a = self.pop()?;
        match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err("Operands must be numbers.".to_string()),
        }
    }

    fn execute(mut self) -> Result<Vec<String>, String> {
        let chunk = self.chunk;
        let code = chunk.code();
        let mut ip = 0;
        loop {
            let op = OpCode::try_from(code[ip]).map_err(|err| err.to_string())?;
            let operand = code.get(ip + 1).copied().unwrap_or_default();
            let jump = usize::from(chunk.read_u16(ip + 1).unwrap_or_default());
            ip += 1 + op.operand_len();

            match op {
                OpCode::Constant => self.stack.push(chunk.constants()[usize::from(operand)]),
                OpCode::Nil => self.stack.push(Value::Nil),
                OpCode::True => self.stack.push(Value::Bool(true)),
                OpCode::False => self.stack.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop()?;
                }
                OpCode::GetLocal => self.stack.push(self.stack[usize::from(operand)]),
                OpCode::SetLocal => {
                    let value = self.peek()?;
                    self.stack[usize::from(operand)] = value;
                }
                OpCode::GetGlobal => {
                    let name = self.global_name(operand)?;
                    let value = self.world.globals().get(&name).copied().ok_or_else(|| {
                        format!("Undefined variable '{}'.", self.world.resolve(name))
                    })?;
                    self.stack.push(value);
                }
                OpCode::DefineGlobal => {
                    let name = self.global_name(operand)?;
                    let value = self.pop()?;
                    self.world.globals_mut().set(name, value);
                }
                OpCode::SetGlobal => {
                    let name = self.global_name(operand)?;
                    let value = self.peek()?;
                    if !self.world.globals().contains_key(&name) {
                        return Err(format!("Undefined variable '{}'.", self.world.resolve(name)));
                    }
                    if let Some(slot) = self.world.globals_mut().get_mut(&name) {
                        *slot = value;
                    }
                }
                OpCode::Equal => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(Value::Bool(a == b));
                }
                OpCode::Greater => {
                    let (a, b) = self.numbers()?;
                    self.stack.push(Value::Bool(a > b));
                }
                OpCode::Less => {
                    let (a, b) = self.numbers()?;
                    self.stack.push(Value::Bool(a < b));
                }
                OpCode::Add => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let sum = match (a, b) {
                        (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                        (Value::String(a), Value::String(b)) => {
                            let joined = format!("{}{}", self.world.resolve(a), self.world.resolve(b));
                            Value::String(self.world.intern(joined))
                        }
                        _ => return Err("Operands must be two numbers or two strings.".to_string()),
                    };
                    self.stack.push(sum);
                }
                OpCode::Subtract => {
                    let (a, b) = self.numbers()?;
                    self.stack.push(Value::Number(a - b));
                }
                OpCode::Multiply => {
                    let (a, b) = self.numbers()?;
                    self.stack.push(Value::Number(a * b));
                }
                OpCode::Divide => {
                    let (a, b) = self.numbers()?;
                    self.stack.push(Value::Number(a / b));
                }
                OpCode::Not => {
                    let value = self.pop()?;
                    self.stack.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => {
                    let value = self.pop()?.as_number().ok_or("Operand must be a number.")?;
                    self.stack.push(Value::Number(-value));
                }
                OpCode::Print => {
                    let value = self.pop()?;
                    self.output.push(value.display(self.world).to_string());
                }
                OpCode::Jump => ip += jump,
                OpCode::JumpIfFalse => {
                    if self.peek()?.is_falsey() {
                        ip += jump;
                    }
                }
                OpCode::Loop => ip -= jump,
                OpCode::Return => {
                    if !self.stack.is_empty() {
                        return Err(format!("{} values left on the stack", self.stack.len()));
                    }
                    return Ok(self.output);
                }
            }
        }
    }

    fn global_name(&self, operand: u8) -> Result<loxc::Symbol, String> {
        self.chunk.constants()[usize::from(operand)]
            .as_symbol()
            .ok_or_else(|| "global name is not a string".to_string())
    }
}
