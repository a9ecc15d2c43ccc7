//! Default host: a table of native types with members written in Rust

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use dashmap::DashMap;
use indexmap::IndexMap;
use tracing::trace;

use super::{Interop, TypeRef};
use crate::error::{type_name, EvalError, Result};
use crate::value::{BuiltinFn, Value};

type MemberResult = std::result::Result<Value, String>;

/// A native type: a membership predicate plus instance and static members.
///
/// Instance members receive the target as their first argument.
pub struct HostType {
    name: String,
    predicate: fn(&Value) -> bool,
    instance_members: IndexMap<String, Vec<BuiltinFn>>,
    static_members: IndexMap<String, Vec<BuiltinFn>>,
}

impl HostType {
    /// A type whose instances are the values accepted by `predicate`.
    pub fn new(name: impl Into<String>, predicate: fn(&Value) -> bool) -> Self {
        HostType {
            name: name.into(),
            predicate,
            instance_members: IndexMap::new(),
            static_members: IndexMap::new(),
        }
    }

    /// Add an instance member taking `arity` arguments besides the target
    /// (-1 for variadic).
    pub fn with_instance<F>(mut self, name: &str, arity: i32, func: F) -> Self
    where
        F: Fn(&[Value]) -> MemberResult + Send + Sync + 'static,
    {
        let arity = if arity < 0 { -1 } else { arity + 1 };
        self.instance_members
            .entry(name.to_string())
            .or_default()
            .push(BuiltinFn::new(format!("{}.{}", self.name, name), arity, func));
        self
    }

    /// Add a static member taking `arity` arguments (-1 for variadic).
    pub fn with_static<F>(mut self, name: &str, arity: i32, func: F) -> Self
    where
        F: Fn(&[Value]) -> MemberResult + Send + Sync + 'static,
    {
        self.static_members
            .entry(name.to_string())
            .or_default()
            .push(BuiltinFn::new(format!("{}/{}", self.name, name), arity, func));
        self
    }

    /// The type's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `value` is an instance of this type.
    pub fn matches(&self, value: &Value) -> bool {
        (self.predicate)(value)
    }
}

fn select(overloads: Option<&Vec<BuiltinFn>>, argc: usize) -> Option<BuiltinFn> {
    let overloads = overloads?;
    overloads
        .iter()
        .find(|f| f.arity >= 0 && f.arity as usize == argc)
        .or_else(|| overloads.iter().find(|f| f.arity < 0))
        .cloned()
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Dispatch {
    Static,
    Instance,
}

type MemberKey = (String, String, usize, Dispatch);

const OBJECT: &str = "Object";

/// Interop over a fixed table of native types.
///
/// Resolved members are cached per (type, member, argument count).
pub struct HostInterop {
    types: IndexMap<String, HostType>,
    cache: DashMap<MemberKey, BuiltinFn>,
}

impl Default for HostInterop {
    fn default() -> Self {
        Self::new()
    }
}

impl HostInterop {
    /// A host with the standard types registered.
    pub fn new() -> Self {
        let mut host = Self::empty();
        for ty in standard_types() {
            host.register_type(ty);
        }
        host
    }

    /// A host with no types at all.
    pub fn empty() -> Self {
        HostInterop {
            types: IndexMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Add or replace a type. Types are matched in registration order, with
    /// `Object` always tried last.
    pub fn register_type(&mut self, ty: HostType) {
        self.cache.clear();
        self.types.insert(ty.name.clone(), ty);
    }

    /// Names of the registered types.
    pub fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    fn type_of(&self, value: &Value) -> Option<&HostType> {
        self.types
            .values()
            .find(|ty| ty.name != OBJECT && ty.matches(value))
            .or_else(|| self.types.get(OBJECT).filter(|ty| ty.matches(value)))
    }

    fn resolve_member(
        &self,
        ty: &HostType,
        member: &str,
        argc: usize,
        dispatch: Dispatch,
    ) -> Option<BuiltinFn> {
        let key = (ty.name.clone(), member.to_string(), argc, dispatch);
        if let Some(found) = self.cache.get(&key) {
            return Some(found.value().clone());
        }
        let found = match dispatch {
            Dispatch::Static => select(ty.static_members.get(member), argc),
            Dispatch::Instance => select(ty.instance_members.get(member), argc).or_else(|| {
                self.types
                    .get(OBJECT)
                    .and_then(|object| select(object.instance_members.get(member), argc))
            }),
        }?;
        trace!(ty = %ty.name, member, argc, "resolved host member");
        self.cache.insert(key, found.clone());
        Some(found)
    }
}

impl Interop for HostInterop {
    fn resolve_type(&self, name: &str) -> Option<TypeRef> {
        self.types.get(name).map(|ty| TypeRef::new(&ty.name))
    }

    fn invoke_static(&self, ty: &TypeRef, member: &str, args: &[Value]) -> Result<Value> {
        let host_type = self
            .types
            .get(ty.name())
            .ok_or_else(|| EvalError::invocation(format!("unknown type {}", ty.name())))?;
        let func = self
            .resolve_member(host_type, member, args.len(), Dispatch::Static)
            .ok_or_else(|| {
                EvalError::invocation(format!(
                    "no static member {}/{} taking {} argument(s)",
                    ty.name(),
                    member,
                    args.len()
                ))
            })?;
        func.call(args)
    }

    fn invoke_instance(&self, target: &Value, member: &str, args: &[Value]) -> Result<Value> {
        let host_type = self.type_of(target).ok_or_else(|| {
            EvalError::invocation(format!(
                "cannot invoke {} on {}",
                member,
                type_name(target)
            ))
        })?;
        let func = self
            .resolve_member(host_type, member, args.len() + 1, Dispatch::Instance)
            .ok_or_else(|| {
                EvalError::invocation(format!(
                    "no member {} on {} taking {} argument(s)",
                    member,
                    host_type.name,
                    args.len()
                ))
            })?;
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(target.clone());
        full.extend_from_slice(args);
        func.call(&full)
    }

    fn instance_of(&self, ty: &TypeRef, value: &Value) -> bool {
        self.types
            .get(ty.name())
            .map(|host_type| host_type.matches(value))
            .unwrap_or(false)
    }

    fn cast(&self, ty: &TypeRef, value: Value) -> Result<Value> {
        if self.instance_of(ty, &value) {
            return Ok(value);
        }
        let converted = match (ty.name(), &value) {
            ("Long", Value::Float(n)) => Some(Value::Int(*n as i64)),
            ("Long", Value::Char(c)) => Some(Value::Int(*c as i64)),
            ("Double", Value::Int(n)) => Some(Value::Float(*n as f64)),
            ("Character", Value::Int(n)) => u32::try_from(*n)
                .ok()
                .and_then(char::from_u32)
                .map(Value::Char),
            _ => None,
        };
        converted.ok_or_else(|| EvalError::type_error(ty.name(), &value))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Standard Types
// ═══════════════════════════════════════════════════════════════════════

fn text(value: &Value) -> std::result::Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected string, got {}", type_name(value)))
}

fn index(value: &Value) -> std::result::Result<usize, String> {
    match value {
        Value::Int(n) if *n >= 0 => Ok(*n as usize),
        other => Err(format!("expected index, got {:?}", other)),
    }
}

fn number(value: &Value) -> std::result::Result<f64, String> {
    value
        .as_float()
        .ok_or_else(|| format!("expected number, got {}", type_name(value)))
}

fn seq_len(value: &Value) -> MemberResult {
    match value {
        Value::List(list) => Ok(Value::Int(list.len() as i64)),
        Value::Vector(items) => Ok(Value::Int(items.len() as i64)),
        Value::Map(map) => Ok(Value::Int(map.len() as i64)),
        Value::Set(set) => Ok(Value::Int(set.len() as i64)),
        other => Err(format!("{} has no size", type_name(other))),
    }
}

fn seq_get(target: &Value, i: &Value) -> MemberResult {
    let i = index(i)?;
    let item = match target {
        Value::List(list) => list.get(i),
        Value::Vector(items) => items.get(i),
        other => return Err(format!("{} is not indexed", type_name(other))),
    };
    item.cloned()
        .ok_or_else(|| format!("index {} out of bounds", i))
}

fn pick(args: &[Value], prefer_first: fn(f64, f64) -> bool) -> MemberResult {
    match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(if prefer_first(*a as f64, *b as f64) {
            *a
        } else {
            *b
        })),
        (a, b) => {
            let (a, b) = (number(a)?, number(b)?);
            Ok(Value::Float(if prefer_first(a, b) { a } else { b }))
        }
    }
}

fn substring(s: &str, start: usize, end: Option<usize>) -> MemberResult {
    let chars: Vec<char> = s.chars().collect();
    let end = end.unwrap_or(chars.len());
    if start > end || end > chars.len() {
        return Err(format!("range {}..{} out of bounds", start, end));
    }
    Ok(Value::string(chars[start..end].iter().collect::<String>()))
}

fn string_type() -> HostType {
    HostType::new("String", |v| matches!(v, Value::String(_)))
        .with_instance("length", 0, |a| Ok(Value::Int(text(&a[0])?.chars().count() as i64)))
        .with_instance("isEmpty", 0, |a| Ok(Value::Bool(text(&a[0])?.is_empty())))
        .with_instance("toUpperCase", 0, |a| Ok(Value::string(text(&a[0])?.to_uppercase())))
        .with_instance("toLowerCase", 0, |a| Ok(Value::string(text(&a[0])?.to_lowercase())))
        .with_instance("trim", 0, |a| Ok(Value::string(text(&a[0])?.trim())))
        .with_instance("substring", 1, |a| substring(text(&a[0])?, index(&a[1])?, None))
        .with_instance("substring", 2, |a| {
            substring(text(&a[0])?, index(&a[1])?, Some(index(&a[2])?))
        })
        .with_instance("charAt", 1, |a| {
            let i = index(&a[1])?;
            text(&a[0])?
                .chars()
                .nth(i)
                .map(Value::Char)
                .ok_or_else(|| format!("index {} out of bounds", i))
        })
        .with_instance("contains", 1, |a| {
            Ok(Value::Bool(text(&a[0])?.contains(text(&a[1])?)))
        })
        .with_instance("startsWith", 1, |a| {
            Ok(Value::Bool(text(&a[0])?.starts_with(text(&a[1])?)))
        })
        .with_instance("endsWith", 1, |a| {
            Ok(Value::Bool(text(&a[0])?.ends_with(text(&a[1])?)))
        })
        .with_instance("indexOf", 1, |a| {
            let haystack = text(&a[0])?;
            let found = haystack
                .find(text(&a[1])?)
                .map(|byte| haystack[..byte].chars().count() as i64)
                .unwrap_or(-1);
            Ok(Value::Int(found))
        })
        .with_instance("concat", 1, |a| {
            Ok(Value::string(format!("{}{}", text(&a[0])?, text(&a[1])?)))
        })
        .with_static("valueOf", 1, |a| Ok(Value::string(a[0].to_string())))
}

fn long_type() -> HostType {
    HostType::new("Long", |v| matches!(v, Value::Int(_)))
        .with_instance("doubleValue", 0, |a| Ok(Value::Float(number(&a[0])?)))
        .with_static("parseLong", 1, |a| {
            text(&a[0])?
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| e.to_string())
        })
        .with_static("valueOf", 1, |a| match &a[0] {
            Value::Int(n) => Ok(Value::Int(*n)),
            other => text(other)?
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| e.to_string()),
        })
}

fn double_type() -> HostType {
    HostType::new("Double", |v| matches!(v, Value::Float(_)))
        .with_instance("longValue", 0, |a| Ok(Value::Int(number(&a[0])? as i64)))
        .with_instance("isNaN", 0, |a| Ok(Value::Bool(number(&a[0])?.is_nan())))
        .with_static("parseDouble", 1, |a| {
            text(&a[0])?
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| e.to_string())
        })
}

fn character_type() -> HostType {
    fn ch(value: &Value) -> std::result::Result<char, String> {
        match value {
            Value::Char(c) => Ok(*c),
            other => Err(format!("expected char, got {}", type_name(other))),
        }
    }
    HostType::new("Character", |v| matches!(v, Value::Char(_)))
        .with_static("isDigit", 1, |a| Ok(Value::Bool(ch(&a[0])?.is_ascii_digit())))
        .with_static("isLetter", 1, |a| Ok(Value::Bool(ch(&a[0])?.is_alphabetic())))
        .with_static("isWhitespace", 1, |a| Ok(Value::Bool(ch(&a[0])?.is_whitespace())))
}

fn identifier_type(name: &str, predicate: fn(&Value) -> bool) -> HostType {
    fn parts(value: &Value) -> std::result::Result<(Option<String>, String), String> {
        match value {
            Value::Symbol(sym) => Ok((sym.namespace().map(String::from), sym.name().to_string())),
            Value::Keyword(kw) => Ok((kw.namespace().map(String::from), kw.name().to_string())),
            other => Err(format!("expected identifier, got {}", type_name(other))),
        }
    }
    HostType::new(name, predicate)
        .with_instance("getName", 0, |a| Ok(Value::string(parts(&a[0])?.1)))
        .with_instance("getNamespace", 0, |a| {
            Ok(parts(&a[0])?.0.map(Value::string).unwrap_or(Value::Nil))
        })
}

fn sequential_type(name: &str, predicate: fn(&Value) -> bool) -> HostType {
    HostType::new(name, predicate)
        .with_instance("size", 0, |a| seq_len(&a[0]))
        .with_instance("isEmpty", 0, |a| Ok(Value::Bool(seq_len(&a[0])? == Value::Int(0))))
        .with_instance("get", 1, |a| seq_get(&a[0], &a[1]))
        .with_instance("contains", 1, |a| {
            let items = a[0].as_seq().unwrap_or_default();
            Ok(Value::Bool(items.iter().any(|item| item == &a[1])))
        })
}

fn map_type() -> HostType {
    HostType::new("Map", |v| matches!(v, Value::Map(_)))
        .with_instance("size", 0, |a| seq_len(&a[0]))
        .with_instance("isEmpty", 0, |a| Ok(Value::Bool(seq_len(&a[0])? == Value::Int(0))))
        .with_instance("get", 1, |a| match &a[0] {
            Value::Map(map) => Ok(map.get(&a[1]).cloned().unwrap_or(Value::Nil)),
            other => Err(format!("expected map, got {}", type_name(other))),
        })
        .with_instance("containsKey", 1, |a| match &a[0] {
            Value::Map(map) => Ok(Value::Bool(map.contains_key(&a[1]))),
            other => Err(format!("expected map, got {}", type_name(other))),
        })
}

fn set_type() -> HostType {
    HostType::new("Set", |v| matches!(v, Value::Set(_)))
        .with_instance("size", 0, |a| seq_len(&a[0]))
        .with_instance("isEmpty", 0, |a| Ok(Value::Bool(seq_len(&a[0])? == Value::Int(0))))
        .with_instance("contains", 1, |a| match &a[0] {
            Value::Set(set) => Ok(Value::Bool(set.contains(&a[1]))),
            other => Err(format!("expected set, got {}", type_name(other))),
        })
}

fn math_type() -> HostType {
    HostType::new("Math", |_| false)
        .with_static("abs", 1, |a| match &a[0] {
            Value::Int(n) => n
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| "integer overflow".to_string()),
            other => Ok(Value::Float(number(other)?.abs())),
        })
        .with_static("max", 2, |a| pick(a, |x, y| x >= y))
        .with_static("min", 2, |a| pick(a, |x, y| x <= y))
        .with_static("sqrt", 1, |a| Ok(Value::Float(number(&a[0])?.sqrt())))
        .with_static("pow", 2, |a| Ok(Value::Float(number(&a[0])?.powf(number(&a[1])?))))
        .with_static("floor", 1, |a| Ok(Value::Float(number(&a[0])?.floor())))
        .with_static("ceil", 1, |a| Ok(Value::Float(number(&a[0])?.ceil())))
}

fn object_type() -> HostType {
    HostType::new(OBJECT, |v| !v.is_nil())
        .with_instance("toString", 0, |a| Ok(Value::string(a[0].to_string())))
        .with_instance("equals", 1, |a| Ok(Value::Bool(a[0] == a[1])))
        .with_instance("hashCode", 0, |a| {
            let mut hasher = DefaultHasher::new();
            a[0].hash(&mut hasher);
            Ok(Value::Int(hasher.finish() as i64))
        })
}

fn standard_types() -> Vec<HostType> {
    vec![
        string_type(),
        long_type(),
        double_type(),
        HostType::new("Boolean", |v| matches!(v, Value::Bool(_))),
        character_type(),
        identifier_type("Symbol", |v| matches!(v, Value::Symbol(_))),
        identifier_type("Keyword", |v| matches!(v, Value::Keyword(_))),
        sequential_type("Vector", |v| matches!(v, Value::Vector(_))),
        sequential_type("List", |v| matches!(v, Value::List(_))),
        map_type(),
        set_type(),
        math_type(),
        object_type(),
    ]
}
