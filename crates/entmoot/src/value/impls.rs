//! Value trait implementations: constructors, predicates, extractors, From traits

use std::sync::Arc;

use super::*;
use crate::symbol::{Keyword, Symbol};

// ═══════════════════════════════════════════════════════════════════
// Convenience Constructors
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Create a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// Create a symbol value, parsing `ns/name`
    pub fn symbol(text: &str) -> Self {
        Value::Symbol(Symbol::parse(text))
    }

    /// Create a keyword value (without the colon)
    pub fn keyword(text: &str) -> Self {
        Value::Keyword(Keyword::parse(text))
    }

    /// Create a list value
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(List::new(items.into_iter().collect()))
    }

    /// Create a list value that remembers where it was read from
    pub fn list_at(items: Vec<Value>, location: SourceLocation) -> Self {
        Value::List(List::new(items.into_iter().collect()).with_source(location))
    }

    /// Create a vector value
    pub fn vector(items: Vec<Value>) -> Self {
        Value::Vector(items.into_iter().collect())
    }

    /// Create a map value from key/value pairs
    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        Value::Map(entries.into_iter().collect())
    }

    /// Create a set value
    pub fn set(items: Vec<Value>) -> Self {
        Value::Set(items.into_iter().collect())
    }

    /// `true` for a true condition, `nil` otherwise
    pub fn truth(condition: bool) -> Self {
        if condition {
            Value::Bool(true)
        } else {
            Value::Nil
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Predicates
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Everything except `nil` is true in a conditional
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil)
    }

    /// Check if this is nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Check if this is a number
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }
}

// ═══════════════════════════════════════════════════════════════════
// Extractors
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Try to get as a symbol
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(sym) => Some(sym),
            _ => None,
        }
    }

    /// Try to get as a list form
    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Try to get as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get as a float, widening integers
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Elements of a list, vector or set; `nil` is empty
    pub fn as_seq(&self) -> Option<Vector> {
        match self {
            Value::Nil => Some(Vector::new()),
            Value::List(list) => Some(list.items().clone()),
            Value::Vector(items) => Some(items.clone()),
            Value::Set(items) => Some(items.iter().cloned().collect()),
            Value::Map(map) => Some(
                map.iter()
                    .map(|(k, v)| Value::vector(vec![k.clone(), v.clone()]))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Where this form was read from, if it is a list with a location
    pub fn source_location(&self) -> Option<SourceLocation> {
        match self {
            Value::List(list) => list.source().cloned(),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Symbol> for Value {
    fn from(sym: Symbol) -> Self {
        Value::Symbol(sym)
    }
}

impl From<Function> for Value {
    fn from(func: Function) -> Self {
        Value::Function(func)
    }
}

impl From<BuiltinFn> for Value {
    fn from(builtin: BuiltinFn) -> Self {
        Value::Function(Function::Builtin(builtin))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::vector(items)
    }
}
