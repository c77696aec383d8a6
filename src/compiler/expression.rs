//! Expressions, compiled by precedence climbing.
//!
//! Every token kind maps to a [`ParseRule`]: what to do when the token starts an expression,
//! what to do when it follows a complete left operand, and how tightly it binds in that second
//! position. [`Compiler::parse_precedence`] drives the table.

use super::{Compiler, ErrorKind};
use crate::{chunk::OpCode, lexer::TokenKind, world::value::Value};

/// Binding power, from loosest to tightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    /// One level tighter. Binary operators parse their right operand at this level so that they
    /// associate to the left.
    pub fn next(self) -> Self {
        match self {
            Self::None => Self::Assignment,
            Self::Assignment => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Equality,
            Self::Equality => Self::Comparison,
            Self::Comparison => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Unary,
            Self::Unary => Self::Call,
            Self::Call | Self::Primary => Self::Primary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Grouping,
    Unary,
    Number,
    String,
    Literal,
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Infix {
    Binary,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseRule {
    pub prefix: Option<Prefix>,
    pub infix: Option<Infix>,
    pub precedence: Precedence,
}

impl ParseRule {
    const NONE: Self = Self::new(None, None, Precedence::None);

    const fn new(prefix: Option<Prefix>, infix: Option<Infix>, precedence: Precedence) -> Self {
        Self {
            prefix,
            infix,
            precedence,
        }
    }
}

pub const fn rule(kind: TokenKind) -> ParseRule {
    use Precedence as P;
    use TokenKind as T;

    match kind {
        T::LeftParen => ParseRule::new(Some(Prefix::Grouping), None, P::None),
        T::Minus => ParseRule::new(Some(Prefix::Unary), Some(Infix::Binary), P::Term),
        T::Plus => ParseRule::new(None, Some(Infix::Binary), P::Term),
        T::Slash | T::Star => ParseRule::new(None, Some(Infix::Binary), P::Factor),
        T::Bang => ParseRule::new(Some(Prefix::Unary), None, P::None),
        T::BangEqual | T::EqualEqual => ParseRule::new(None, Some(Infix::Binary), P::Equality),
        T::Greater | T::GreaterEqual | T::Less | T::LessEqual => {
            ParseRule::new(None, Some(Infix::Binary), P::Comparison)
        }
        T::Identifier => ParseRule::new(Some(Prefix::Variable), None, P::None),
        T::String => ParseRule::new(Some(Prefix::String), None, P::None),
        T::Number => ParseRule::new(Some(Prefix::Number), None, P::None),
        T::And => ParseRule::new(None, Some(Infix::And), P::And),
        T::Or => ParseRule::new(None, Some(Infix::Or), P::Or),
        T::False | T::True | T::Nil => ParseRule::new(Some(Prefix::Literal), None, P::None),
        _ => ParseRule::NONE,
    }
}

impl<'src, 'w> Compiler<'src, 'w> {
    /// Compiles one expression whose operators all bind at least as tightly as `precedence`.
    pub(super) fn parse_precedence(&mut self, precedence: Precedence) {
        if self.nesting >= self.options.max_depth {
            self.error_at_current(ErrorKind::NestingTooDeep);
            return;
        }
        self.nesting += 1;

        self.advance();
        match rule(self.previous.kind).prefix {
            Some(prefix) => {
                // only the loosest level may consume a following `=`
                let can_assign = precedence <= Precedence::Assignment;
                self.prefix(prefix, can_assign);

                while precedence <= rule(self.current.kind).precedence {
                    self.advance();
                    if let Some(infix) = rule(self.previous.kind).infix {
                        self.infix(infix);
                    }
                }

                if can_assign && self.matches(TokenKind::Equal) {
                    self.error(ErrorKind::InvalidAssignmentTarget);
                }
            }
            None => self.error(ErrorKind::Expect("expression")),
        }

        self.nesting -= 1;
    }

    fn prefix(&mut self, prefix: Prefix, can_assign: bool) {
        match prefix {
            Prefix::Grouping => self.grouping(),
            Prefix::Unary => self.unary(),
            Prefix::Number => self.number(),
            Prefix::String => self.string(),
            Prefix::Literal => self.literal(),
            Prefix::Variable => self.variable(can_assign),
        }
    }

    fn infix(&mut self, infix: Infix) {
        match infix {
            Infix::Binary => self.binary(),
            Infix::And => self.and(),
            Infix::Or => self.or(),
        }
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenKind::RightParen, "')' after expression");
    }

    fn unary(&mut self) {
        let operator = self.previous.kind;
        self.parse_precedence(Precedence::Unary);

        match operator {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => {}
        }
    }

    fn binary(&mut self) {
        let operator = self.previous.kind;
        self.parse_precedence(rule(operator).precedence.next());

        match operator {
            TokenKind::BangEqual => {
                self.emit_op(OpCode::Equal);
                self.emit_op(OpCode::Not);
            }
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => {
                self.emit_op(OpCode::Less);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => {
                self.emit_op(OpCode::Greater);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            _ => {}
        }
    }

    fn number(&mut self) {
        // the lexer only produces digit runs with an optional fraction, which always parse
        let value = self.previous.lexeme.parse().unwrap_or(f64::NAN);
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self) {
        let lexeme = self.previous.lexeme;
        let text = lexeme
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap_or(lexeme);
        let index = self.string_constant(text);
        self.emit_op_byte(OpCode::Constant, index);
    }

    fn literal(&mut self) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            _ => {}
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme;
        self.named_variable(name, can_assign);
    }

    fn named_variable(&mut self, name: &'src str, can_assign: bool) {
        let (get, set, operand) = match self.scope.resolve(name) {
            Ok(Some(slot)) => (OpCode::GetLocal, OpCode::SetLocal, slot),
            Ok(None) => {
                let index = self.string_constant(name);
                (OpCode::GetGlobal, OpCode::SetGlobal, index)
            }
            Err(err) => {
                self.error(err.into());
                return;
            }
        };

        if can_assign && self.matches(TokenKind::Equal) {
            self.expression();
            self.emit_op_byte(set, operand);
        } else {
            self.emit_op_byte(get, operand);
        }
    }

    /// `a and b`: if `a` is falsey it stays on the stack as the result, otherwise it is popped
    /// and `b` is evaluated.
    fn and(&mut self) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or(&mut self) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);

        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);

        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }
}
