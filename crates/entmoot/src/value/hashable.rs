//! Equality and hashing, so values can key maps and sets
//!
//! Lists and vectors with equal elements compare equal. Floats compare by
//! bit pattern. Callables, expanders and nodes compare by identity.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::*;

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,

            (Value::List(a), Value::List(b)) => a.items() == b.items(),
            (Value::List(a), Value::Vector(b)) => a.items() == b,
            (Value::Vector(a), Value::List(b)) => a == b.items(),
            (Value::Vector(a), Value::Vector(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,

            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Expander(a), Value::Expander(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a.ptr_eq(b),
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.items() == other.items()
    }
}

impl Eq for List {}

// Unordered collections combine per-entry hashes with a commutative fold,
// since iteration order depends on each collection's hasher.
fn unordered_hash<T: Hash>(items: impl Iterator<Item = T>) -> u64 {
    items.fold(0u64, |acc, item| {
        let mut hasher = DefaultHasher::new();
        item.hash(&mut hasher);
        acc.wrapping_add(hasher.finish())
    })
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Nil => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Int(n) => {
                2u8.hash(state);
                n.hash(state);
            }
            Value::Float(n) => {
                3u8.hash(state);
                n.to_bits().hash(state);
            }
            Value::Char(c) => {
                4u8.hash(state);
                c.hash(state);
            }
            Value::String(s) => {
                5u8.hash(state);
                s.hash(state);
            }
            Value::Symbol(sym) => {
                6u8.hash(state);
                sym.hash(state);
            }
            Value::Keyword(kw) => {
                7u8.hash(state);
                kw.hash(state);
            }
            Value::List(list) => hash_seq(list.items(), state),
            Value::Vector(items) => hash_seq(items, state),
            Value::Map(map) => {
                9u8.hash(state);
                map.len().hash(state);
                unordered_hash(map.iter()).hash(state);
            }
            Value::Set(set) => {
                10u8.hash(state);
                set.len().hash(state);
                unordered_hash(set.iter()).hash(state);
            }
            Value::Function(func) => {
                11u8.hash(state);
                func.addr().hash(state);
            }
            Value::Expander(expander) => {
                12u8.hash(state);
                expander.identity().hash(state);
            }
            Value::Node(node) => {
                13u8.hash(state);
                node.addr().hash(state);
            }
            Value::Type(ty) => {
                14u8.hash(state);
                ty.hash(state);
            }
        }
    }
}

fn hash_seq<H: Hasher>(items: &Vector, state: &mut H) {
    8u8.hash(state);
    items.len().hash(state);
    for item in items.iter() {
        item.hash(state);
    }
}
