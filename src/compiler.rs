//! Compile Lox source straight into bytecode, in a single pass and without an AST.
//!
//! For example:
//!
//! ```text
//! var a = 1;
//! if (a > 0) print "positive"; else print "other";
//! ```
//!
//! compiles to
//!
//! ```text
//! OP_CONSTANT 1 '1'
//! OP_DEFINE_GLOBAL 0 'a'
//! OP_GET_GLOBAL 0 'a'
//! OP_CONSTANT 2 '0'
//! OP_GREATER
//! OP_JUMP_IF_FALSE -> else   ; placeholder, patched once the then-branch is compiled
//! OP_POP
//! OP_CONSTANT 3 'positive'
//! OP_PRINT
//! OP_JUMP -> end             ; skips the else-branch
//! else: OP_POP
//! OP_CONSTANT 4 'other'
//! OP_PRINT
//! end: OP_RETURN
//! ```
//!
//! Statements are handled by recursive descent in this module, expressions by the
//! precedence-climbing parser in [`expression`], and locals by [`scope::ScopeTracker`].

use core::fmt;

use crate::{
    chunk::{Chunk, OpCode, PatchError},
    lexer::{LexerError, Scanner, Span, Token, TokenKind},
    table::Table,
    world::{value::Value, World},
};

pub mod expression;
pub mod scope;

use expression::Precedence;
use scope::{ScopeError, ScopeTracker};

/// Limits applied while compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Locals alive at once. Never more than 256, slots are one byte.
    pub max_locals: usize,
    /// How deeply expressions, blocks and statement bodies may nest before compilation gives up
    /// on them.
    pub max_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_locals: 256,
            max_depth: 256,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error(transparent)]
    Lexical(#[from] LexerError),
    #[error("Expect {0}.")]
    Expect(&'static str),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error("Too many constants in one chunk.")]
    TooManyConstants,
    #[error("Too much code to jump over.")]
    JumpTooLarge,
    #[error("Loop body too large.")]
    LoopTooLarge,
    #[error("Invalid assignment target.")]
    InvalidAssignmentTarget,
    #[error("Expression nested too deeply.")]
    NestingTooDeep,
    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// Where on its line an error was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    At(Box<str>),
    End,
    /// lexical errors, whose token text is not meaningful
    Unlocated,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(lexeme) => write!(f, " at '{lexeme}'"),
            Self::End => f.write_str(" at end"),
            Self::Unlocated => Ok(()),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("[line {line}] Error{location}: {kind}")]
pub struct CompileError {
    pub line: u32,
    pub location: Location,
    /// byte range of the offending token in the source
    pub span: Span,
    pub kind: ErrorKind,
}

impl CompileError {
    fn at(token: &Token, kind: ErrorKind) -> Self {
        let location = match token.kind {
            TokenKind::Eof => Location::End,
            TokenKind::Error => Location::Unlocated,
            _ => Location::At(Box::from(token.lexeme)),
        };
        Self {
            line: token.line,
            location,
            span: token.span.clone(),
            kind,
        }
    }
}

/// The result of compiling one source text.
///
/// A chunk whose compilation reported errors must not be executed.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub chunk: Chunk,
    pub errors: Vec<CompileError>,
}

impl Compilation {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_parts(self) -> (Chunk, bool) {
        let success = self.is_success();
        (self.chunk, success)
    }
}

pub fn compile(world: &mut World, source: &str) -> Compilation {
    Compiler::new(world, source).compile()
}

/// Parser state threaded through every compiling call.
pub struct Compiler<'src, 'w> {
    world: &'w mut World,
    scanner: Scanner<'src>,
    current: Token<'src>,
    previous: Token<'src>,
    panic_mode: bool,
    errors: Vec<CompileError>,
    chunk: Chunk,
    scope: ScopeTracker<'src>,
    /// interned string -> constant pool index, so each string is stored once per chunk
    strings: Table<u8>,
    /// current expression/block/statement nesting
    nesting: usize,
    options: Options,
}

impl<'src, 'w> Compiler<'src, 'w> {
    pub fn new(world: &'w mut World, source: &'src str) -> Self {
        Self::with_options(world, source, Options::default())
    }

    pub fn with_options(world: &'w mut World, source: &'src str, options: Options) -> Self {
        Self {
            world,
            scanner: Scanner::new(source),
            current: Token::synthetic(1),
            previous: Token::synthetic(1),
            panic_mode: false,
            errors: Vec::new(),
            chunk: Chunk::new(),
            scope: ScopeTracker::new(options.max_locals),
            strings: Table::new(),
            nesting: 0,
            options,
        }
    }

    pub fn compile(mut self) -> Compilation {
        self.advance();
        while !self.matches(TokenKind::Eof) {
            self.declaration();
        }
        self.emit_op(OpCode::Return);

        tracing::debug!(
            bytes = self.chunk.len(),
            constants = self.chunk.constants().len(),
            errors = self.errors.len(),
            "compiled source"
        );
        Compilation {
            chunk: self.chunk,
            errors: self.errors,
        }
    }

    // ---- token plumbing ----

    fn advance(&mut self) {
        let next = self.scanner.next_token();
        self.previous = std::mem::replace(&mut self.current, next);
        while self.current.kind == TokenKind::Error {
            let err = self.current.error.unwrap_or_default();
            self.error_at_current(err.into());
            self.current = self.scanner.next_token();
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, expected: &'static str) {
        if self.check(kind) {
            self.advance();
        } else {
            self.error_at_current(ErrorKind::Expect(expected));
        }
    }

    // ---- diagnostics ----

    fn error(&mut self, kind: ErrorKind) {
        if self.panic_mode {
            return;
        }
        let error = CompileError::at(&self.previous, kind);
        self.report(error);
    }

    fn error_at_current(&mut self, kind: ErrorKind) {
        if self.panic_mode {
            return;
        }
        let error = CompileError::at(&self.current, kind);
        self.report(error);
    }

    fn report(&mut self, error: CompileError) {
        self.panic_mode = true;
        tracing::trace!(%error, "reporting compile error");
        self.errors.push(error);
    }

    /// Skips tokens until something that looks like the start of a declaration.
    fn synchronize(&mut self) {
        self.panic_mode = false;
        while !self.check(TokenKind::Eof) {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => self.advance(),
            }
        }
    }

    // ---- emitting ----

    fn emit_byte(&mut self, byte: u8) {
        self.chunk.write(byte, self.previous.line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.chunk.write_op(op, self.previous.line);
    }

    fn emit_op_byte(&mut self, op: OpCode, operand: u8) {
        self.emit_op(op);
        self.emit_byte(operand);
    }

    /// Emits `op` with a placeholder offset and returns where the placeholder starts.
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.chunk.len() - 2
    }

    /// Points the jump whose placeholder starts at `offset` to the next byte to be emitted.
    fn patch_jump(&mut self, offset: usize) {
        let distance = self.chunk.len() - offset - 2;
        let Ok(distance) = u16::try_from(distance) else {
            self.error(ErrorKind::JumpTooLarge);
            return;
        };
        if let Err(err) = self.chunk.patch_u16(offset, distance) {
            self.error(err.into());
        }
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);
        // +2 for the operand itself
        let distance = self.chunk.len() - loop_start + 2;
        let distance = u16::try_from(distance).unwrap_or_else(|_| {
            self.error(ErrorKind::LoopTooLarge);
            u16::MAX
        });
        let [hi, lo] = distance.to_be_bytes();
        self.emit_byte(hi);
        self.emit_byte(lo);
    }

    /// Adds `value` to the pool, or reports an error and returns `None` once the pool is full.
    fn make_constant(&mut self, value: Value) -> Option<u8> {
        let Ok(index) = u8::try_from(self.chunk.constants().len()) else {
            self.error(ErrorKind::TooManyConstants);
            return None;
        };
        self.chunk.add_constant(value);
        Some(index)
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value).unwrap_or_default();
        self.emit_op_byte(OpCode::Constant, index);
    }

    /// Pool index of the string `text`, adding it the first time it is seen.
    ///
    /// Reports an error and returns 0 when the pool is full. The chunk is never run then.
    fn string_constant(&mut self, text: &str) -> u8 {
        let symbol = self.world.intern(text);
        if let Some(index) = self.strings.get(&symbol) {
            return *index;
        }
        let Some(index) = self.make_constant(Value::String(symbol)) else {
            return 0;
        };
        self.strings.set(symbol, index);
        index
    }

    // ---- declarations ----

    fn declaration(&mut self) {
        if self.matches(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("variable name");

        if self.matches(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenKind::Semicolon, "';' after variable declaration");

        self.define_variable(global);
    }

    /// Consumes a variable name. For globals returns the name's pool index, for locals 0.
    fn parse_variable(&mut self, expected: &'static str) -> u8 {
        self.consume(TokenKind::Identifier, expected);

        self.declare_variable();
        if !self.scope.is_global() {
            return 0;
        }

        let name = self.previous.lexeme;
        self.string_constant(name)
    }

    fn declare_variable(&mut self) {
        if self.scope.is_global() {
            return;
        }
        let name = self.previous.lexeme;
        if let Err(err) = self.scope.declare(name) {
            self.error(err.into());
        }
    }

    fn define_variable(&mut self, global: u8) {
        if !self.scope.is_global() {
            self.scope.mark_initialized();
            return;
        }
        self.emit_op_byte(OpCode::DefineGlobal, global);
    }

    // ---- statements ----

    fn statement(&mut self) {
        if self.matches(TokenKind::Print) {
            self.print_statement();
        } else if self.matches(TokenKind::If) {
            self.nested_statement(Self::if_statement);
        } else if self.matches(TokenKind::While) {
            self.nested_statement(Self::while_statement);
        } else if self.matches(TokenKind::For) {
            self.nested_statement(Self::for_statement);
        } else if self.matches(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    /// Compiles a statement with a statement body, unless that would nest past `max_depth`.
    ///
    /// One level is kept free for the statement's own clauses, so a too-deep chain is reported at
    /// its keyword and skipped whole.
    fn nested_statement(&mut self, compile: fn(&mut Self)) {
        if self.nesting + 1 >= self.options.max_depth {
            let panicking = self.panic_mode;
            self.error(ErrorKind::NestingTooDeep);
            self.skip_statement();
            self.panic_mode = panicking;
            return;
        }

        self.nesting += 1;
        compile(self);
        self.nesting -= 1;
    }

    fn begin_scope(&mut self) {
        self.scope.begin_scope();
    }

    fn end_scope(&mut self) {
        for _ in 0..self.scope.end_scope() {
            self.emit_op(OpCode::Pop);
        }
    }

    fn block(&mut self) {
        if self.nesting >= self.options.max_depth {
            let panicking = self.panic_mode;
            self.error(ErrorKind::NestingTooDeep);
            self.skip_block();
            // the skip already resynchronized on the closing brace
            self.panic_mode = panicking;
            return;
        }

        self.nesting += 1;
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "'}' after block");
        self.nesting -= 1;
    }

    /// Discards the rest of a block whose `{` was already consumed, up to its matching `}`.
    fn skip_block(&mut self) {
        let mut open = 1usize;
        while !self.check(TokenKind::Eof) {
            match self.current.kind {
                TokenKind::LeftBrace => open += 1,
                TokenKind::RightBrace => open -= 1,
                _ => {}
            }
            self.advance();
            if open == 0 {
                break;
            }
        }
    }

    /// Discards the rest of a statement whose first token was already consumed, along with the
    /// `else` branches that follow it. Stops before a `}` closing an enclosing block.
    fn skip_statement(&mut self) {
        let mut parens = 0usize;
        let mut braces = 0usize;
        loop {
            let kind = self.current.kind;
            match kind {
                TokenKind::Eof => return,
                TokenKind::RightBrace if braces == 0 => return,
                TokenKind::RightBrace => braces -= 1,
                TokenKind::LeftBrace => braces += 1,
                TokenKind::LeftParen => parens += 1,
                TokenKind::RightParen => parens = parens.saturating_sub(1),
                _ => {}
            }
            self.advance();

            let ended = parens == 0
                && braces == 0
                && matches!(kind, TokenKind::Semicolon | TokenKind::RightBrace);
            if ended && !self.matches(TokenKind::Else) {
                return;
            }
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "';' after value");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "';' after expression");
        self.emit_op(OpCode::Pop);
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "'(' after 'if'");
        self.expression();
        self.consume(TokenKind::RightParen, "')' after condition");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();

        // emitted even without an else-branch: the false path still has to pop the condition
        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);

        if self.matches(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.chunk.len();
        self.consume(TokenKind::LeftParen, "'(' after 'while'");
        self.expression();
        self.consume(TokenKind::RightParen, "')' after condition");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LeftParen, "'(' after 'for'");
        if self.matches(TokenKind::Semicolon) {
            // no initializer
        } else if self.matches(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.chunk.len();
        let mut exit_jump = None;
        if !self.matches(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "';' after loop condition");

            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        if !self.matches(TokenKind::RightParen) {
            // the increment runs after the body, so jump over it now and loop back to it later
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.chunk.len();
            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenKind::RightParen, "')' after for clauses");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_op(OpCode::Pop);
        }

        self.end_scope();
    }

    // ---- expressions (see `expression` for the handlers) ----

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }
}
