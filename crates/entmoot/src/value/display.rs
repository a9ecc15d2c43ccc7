//! Display and Debug implementations for Value
//!
//! `Debug` prints a readable form (strings quoted); `Display` prints
//! strings and characters raw, the way `str` and `println` want them.

use std::fmt;

use super::*;

fn write_seq<'a>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: impl Iterator<Item = &'a Value>,
    close: &str,
) -> fmt::Result {
    write!(f, "{}", open)?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{:?}", item)?;
    }
    write!(f, "{}", close)
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.is_finite() && n.fract() == 0.0 {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Char(c) => match c {
                ' ' => write!(f, "\\space"),
                '\n' => write!(f, "\\newline"),
                '\t' => write!(f, "\\tab"),
                _ => write!(f, "\\{}", c),
            },
            Value::String(s) => write!(f, "{:?}", s.as_ref()),
            Value::Symbol(sym) => write!(f, "{}", sym),
            Value::Keyword(kw) => write!(f, "{}", kw),

            Value::List(list) => write_seq(f, "(", list.iter(), ")"),
            Value::Vector(items) => write_seq(f, "[", items.iter(), "]"),
            Value::Set(items) => write_seq(f, "#{", items.iter(), "}"),
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?} {:?}", k, v)?;
                }
                write!(f, "}}")
            }

            Value::Function(Function::Builtin(builtin)) => write!(f, "#<builtin {}>", builtin.name),
            Value::Function(Function::Closure(closure)) => write!(f, "#<{:?}>", closure),
            Value::Expander(expander) => write!(f, "#<{:?}>", expander),
            Value::Node(node) => write!(f, "#<node {:?}>", node),
            Value::Type(ty) => write!(f, "{}", ty.name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Char(c) => write!(f, "{}", c),
            _ => fmt::Debug::fmt(self, f),
        }
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_seq(f, "(", self.iter(), ")")
    }
}
