//! Constant values that the compiler places in a chunk's pool.
use core::fmt;

use super::{Symbol, World};

#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    // always interned through the owning World
    String(Symbol),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(num) => Some(*num),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Self::String(sym) => Some(*sym),
            _ => None,
        }
    }

    /// `nil` and `false` are falsey, everything else is truthy.
    pub fn is_falsey(&self) -> bool {
        matches!(self, Self::Nil | Self::Bool(false))
    }

    /// Strings can only be shown with the world that interned them.
    pub fn display<'a>(&'a self, world: &'a World) -> impl fmt::Display + 'a {
        ValueDisplay { value: self, world }
    }
}

struct ValueDisplay<'a> {
    value: &'a Value,
    world: &'a World,
}

impl fmt::Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(num) => write!(f, "{}", NumberDisplay(*num)),
            Value::String(sym) => f.write_str(self.world.resolve(*sym)),
        }
    }
}

/// Integral numbers print without a fractional part, the way C's `%g` does.
pub struct NumberDisplay(pub f64);

impl fmt::Display for NumberDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let num = self.0;
        if num.is_nan() {
            f.write_str("nan")
        } else if num.is_infinite() {
            f.write_str(if num.is_sign_negative() { "-inf" } else { "inf" })
        } else if num.fract() == 0.0 && num.abs() < 1e15 {
            if num == 0.0 && num.is_sign_negative() {
                f.write_str("-0")
            } else {
                write!(f, "{}", num as i64)
            }
        } else {
            write!(f, "{num}")
        }
    }
}
