//! Bootstrap contexts and the primitive functions they define

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{error, info};

use super::Context;
use crate::analyser;
use crate::compiler::Compiler;
use crate::error::{self, type_name};
use crate::expander::{Expander, SpecialForm};
use crate::interop::{HostInterop, Interop};
use crate::node::Node;
use crate::symbol::{Keyword, Symbol, CORE_NS, NS_SLOT};
use crate::value::{BuiltinFn, Function, List, Value, Vector};

// Loaded through the analyser, so only def/fn/if/let/do/quote are available.
const BOOTSTRAP: &str = r#"
(def identity (fn [x] x))
(def constantly (fn [x] (fn [& _] x)))
(def second (fn [coll] (first (rest coll))))
(def list? (fn [x] (= (type-of x) "list")))
(def vector? (fn [x] (= (type-of x) "vector")))
(def empty? (fn [coll] (= (count coll) 0)))
(def complement (fn [f] (fn [& args] (not (apply f args)))))
"#;

const CORE: &str = include_str!("core.ent");

/// The bootstrap context with the default host: special forms, primitives
/// and a handful of helper definitions, all in `entmoot.core`.
pub fn bootstrap() -> error::Result<Context> {
    bootstrap_with_host(Arc::new(HostInterop::new()))
}

/// The bootstrap context using `host` for interop.
pub fn bootstrap_with_host(host: Arc<dyn Interop>) -> error::Result<Context> {
    let mut context = Context::with_host(host).define(
        &NS_SLOT,
        Node::constant(Value::string(CORE_NS)),
    );
    for special in SpecialForm::ALL {
        context = context.define(
            &special.symbol().qualify(CORE_NS),
            Node::constant(Value::Expander(Expander::Builtin(special))),
        );
    }
    for builtin in primitives() {
        let symbol = Symbol::qualified(CORE_NS, &builtin.name);
        context = context.define(&symbol, Node::constant(Value::from(builtin)));
    }
    let result = analyser::load(&context, BOOTSTRAP).map_err(|err| {
        error!(error = %err, "bootstrap definitions failed to load");
        err
    })?;
    Ok(result.context)
}

/// The bootstrap context with the expander-based core prelude compiled on
/// top (`when`, `when-not`, `comp`, `partial`, `map`, `filter`, `reduce`).
pub fn initial_context() -> error::Result<Context> {
    let result = Compiler::default().eval_named(&bootstrap()?, CORE, "core.ent")?;
    info!(symbols = result.context.symbols().len(), "core prelude loaded");
    Ok(result.context)
}

/// Every primitive function defined by [`bootstrap`].
pub fn primitives() -> Vec<BuiltinFn> {
    vec![
        // Arithmetic
        BuiltinFn::new("+", -1, builtin_add),
        BuiltinFn::new("-", -1, builtin_sub),
        BuiltinFn::new("*", -1, builtin_mul),
        BuiltinFn::new("/", -1, builtin_div),
        BuiltinFn::new("inc", 1, |args| add(&args[0], &Value::Int(1))),
        BuiltinFn::new("dec", 1, |args| subtract(&args[0], &Value::Int(1))),
        // Comparison
        BuiltinFn::new("=", -1, builtin_eq),
        BuiltinFn::new("<", -1, |args| compare_chain(args, Ordering::is_lt)),
        BuiltinFn::new("<=", -1, |args| compare_chain(args, Ordering::is_le)),
        BuiltinFn::new(">", -1, |args| compare_chain(args, Ordering::is_gt)),
        BuiltinFn::new(">=", -1, |args| compare_chain(args, Ordering::is_ge)),
        BuiltinFn::new("not", 1, |args| Ok(Value::truth(!args[0].is_truthy()))),
        BuiltinFn::new("nil?", 1, |args| Ok(Value::truth(args[0].is_nil()))),
        // Strings and printing
        BuiltinFn::new("str", -1, builtin_str),
        BuiltinFn::new("print", -1, builtin_print),
        BuiltinFn::new("println", -1, builtin_println),
        BuiltinFn::new("symbol", -1, builtin_symbol),
        BuiltinFn::new("keyword", -1, builtin_keyword),
        BuiltinFn::new("type-of", 1, |args| Ok(Value::string(type_name(&args[0])))),
        // Collections
        BuiltinFn::new("count", 1, builtin_count),
        BuiltinFn::new("first", 1, builtin_first),
        BuiltinFn::new("rest", 1, builtin_rest),
        BuiltinFn::new("nth", 2, builtin_nth),
        BuiltinFn::new("cons", 2, builtin_cons),
        BuiltinFn::new("conj", -1, builtin_conj),
        BuiltinFn::new("concat", -1, builtin_concat),
        BuiltinFn::new("get", -1, builtin_get),
        BuiltinFn::new("assoc", 3, builtin_assoc),
        BuiltinFn::new("vec", 1, |args| seq(&args[0]).map(Value::Vector)),
        // Functions
        BuiltinFn::new("apply", -1, builtin_apply),
    ]
}

// ═══════════════════════════════════════════════════════════════════════
// Arithmetic
// ═══════════════════════════════════════════════════════════════════════

fn number(value: &Value) -> Result<&Value, String> {
    if value.is_number() {
        Ok(value)
    } else {
        Err(format!("expected a number, got {}", type_name(value)))
    }
}

// Integer arithmetic while both sides are integers, float otherwise.
fn numeric(
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, String> {
    match (number(a)?, number(b)?) {
        (Value::Int(x), Value::Int(y)) => int_op(*x, *y)
            .map(Value::Int)
            .ok_or_else(|| "integer overflow".to_string()),
        (x, y) => match (x.as_float(), y.as_float()) {
            (Some(x), Some(y)) => Ok(Value::Float(float_op(x, y))),
            _ => Err("expected numbers".to_string()),
        },
    }
}

fn add(a: &Value, b: &Value) -> Result<Value, String> {
    numeric(a, b, i64::checked_add, |x, y| x + y)
}

fn subtract(a: &Value, b: &Value) -> Result<Value, String> {
    numeric(a, b, i64::checked_sub, |x, y| x - y)
}

fn multiply(a: &Value, b: &Value) -> Result<Value, String> {
    numeric(a, b, i64::checked_mul, |x, y| x * y)
}

// Exact integer quotients stay integers.
fn divide(a: &Value, b: &Value) -> Result<Value, String> {
    match (number(a)?, number(b)?) {
        (_, Value::Int(0)) => Err("divide by zero".to_string()),
        (Value::Int(x), Value::Int(y)) if x.checked_rem(*y) == Some(0) => x
            .checked_div(*y)
            .map(Value::Int)
            .ok_or_else(|| "integer overflow".to_string()),
        (x, y) => match (x.as_float(), y.as_float()) {
            (Some(_), Some(d)) if d == 0.0 => Err("divide by zero".to_string()),
            (Some(n), Some(d)) => Ok(Value::Float(n / d)),
            _ => Err("expected numbers".to_string()),
        },
    }
}

fn fold(
    args: &[Value],
    op: fn(&Value, &Value) -> Result<Value, String>,
) -> Result<Value, String> {
    let (first, rest) = args
        .split_first()
        .ok_or_else(|| "expects at least 1 argument, got 0".to_string())?;
    rest.iter()
        .try_fold(number(first)?.clone(), |acc, next| op(&acc, next))
}

fn builtin_add(args: &[Value]) -> Result<Value, String> {
    if args.is_empty() {
        return Ok(Value::Int(0));
    }
    fold(args, add)
}

fn builtin_sub(args: &[Value]) -> Result<Value, String> {
    match args {
        [only] => subtract(&Value::Int(0), only),
        _ => fold(args, subtract),
    }
}

fn builtin_mul(args: &[Value]) -> Result<Value, String> {
    if args.is_empty() {
        return Ok(Value::Int(1));
    }
    fold(args, multiply)
}

fn builtin_div(args: &[Value]) -> Result<Value, String> {
    match args {
        [only] => divide(&Value::Int(1), only),
        _ => fold(args, divide),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Comparison
// ═══════════════════════════════════════════════════════════════════════

// Numbers compare by value across integer and float.
fn equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => *x as f64 == *y,
        _ => a == b,
    }
}

fn builtin_eq(args: &[Value]) -> Result<Value, String> {
    if args.is_empty() {
        return Err("expects at least 1 argument, got 0".to_string());
    }
    Ok(Value::truth(
        args.windows(2).all(|pair| equivalent(&pair[0], &pair[1])),
    ))
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, String> {
    match (number(a)?, number(b)?) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (x, y) => x
            .as_float()
            .zip(y.as_float())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .ok_or_else(|| "cannot compare NaN".to_string()),
    }
}

fn compare_chain(args: &[Value], holds: fn(Ordering) -> bool) -> Result<Value, String> {
    if args.is_empty() {
        return Err("expects at least 1 argument, got 0".to_string());
    }
    if let [only] = args {
        number(only)?;
    }
    for pair in args.windows(2) {
        if !holds(compare(&pair[0], &pair[1])?) {
            return Ok(Value::Nil);
        }
    }
    Ok(Value::Bool(true))
}

// ═══════════════════════════════════════════════════════════════════════
// Strings and printing
// ═══════════════════════════════════════════════════════════════════════

fn builtin_str(args: &[Value]) -> Result<Value, String> {
    let mut out = String::new();
    for arg in args {
        if !arg.is_nil() {
            out.push_str(&arg.to_string());
        }
    }
    Ok(Value::string(out))
}

fn builtin_print(args: &[Value]) -> Result<Value, String> {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            print!(" ");
        }
        print!("{}", arg);
    }
    Ok(Value::Nil)
}

fn builtin_println(args: &[Value]) -> Result<Value, String> {
    builtin_print(args)?;
    println!();
    Ok(Value::Nil)
}

fn name_parts(args: &[Value]) -> Result<(Option<&str>, &str), String> {
    match args {
        [Value::String(name)] => Ok((None, name.as_ref())),
        [Value::String(ns), Value::String(name)] => Ok((Some(ns.as_ref()), name.as_ref())),
        [_] | [_, _] => Err("expected string arguments".to_string()),
        _ => Err(format!("expects 1 or 2 arguments, got {}", args.len())),
    }
}

fn builtin_symbol(args: &[Value]) -> Result<Value, String> {
    if let [Value::Symbol(sym)] = args {
        return Ok(Value::Symbol(sym.clone()));
    }
    Ok(Value::Symbol(match name_parts(args)? {
        (Some(ns), name) => Symbol::qualified(ns, name),
        (None, name) => Symbol::parse(name),
    }))
}

fn builtin_keyword(args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Keyword(kw)] => return Ok(Value::Keyword(kw.clone())),
        [Value::Symbol(sym)] => return Ok(Value::Keyword(Keyword::from(sym.clone()))),
        _ => {}
    }
    Ok(Value::Keyword(match name_parts(args)? {
        (Some(ns), name) => Keyword::from(Symbol::qualified(ns, name)),
        (None, name) => Keyword::parse(name),
    }))
}

// ═══════════════════════════════════════════════════════════════════════
// Collections
// ═══════════════════════════════════════════════════════════════════════

fn seq(value: &Value) -> Result<Vector, String> {
    value
        .as_seq()
        .ok_or_else(|| format!("expected a collection, got {}", type_name(value)))
}

fn list_of(items: Vector) -> Value {
    Value::List(List::new(items))
}

fn builtin_count(args: &[Value]) -> Result<Value, String> {
    let count = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Map(map) => map.len(),
        Value::Set(items) => items.len(),
        other => seq(other)?.len(),
    };
    Ok(Value::Int(count as i64))
}

fn builtin_first(args: &[Value]) -> Result<Value, String> {
    Ok(seq(&args[0])?.front().cloned().unwrap_or(Value::Nil))
}

fn builtin_rest(args: &[Value]) -> Result<Value, String> {
    let items = seq(&args[0])?;
    if items.is_empty() {
        return Ok(list_of(items));
    }
    Ok(list_of(items.skip(1)))
}

fn builtin_nth(args: &[Value]) -> Result<Value, String> {
    let items = seq(&args[0])?;
    let index = args[1]
        .as_int()
        .ok_or_else(|| format!("index must be a long, got {}", type_name(&args[1])))?;
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i).cloned())
        .ok_or_else(|| format!("index {} out of bounds for count {}", index, items.len()))
}

fn builtin_cons(args: &[Value]) -> Result<Value, String> {
    let mut items = seq(&args[1])?;
    items.push_front(args[0].clone());
    Ok(list_of(items))
}

fn builtin_conj(args: &[Value]) -> Result<Value, String> {
    let (coll, additions) = args
        .split_first()
        .ok_or_else(|| "expects at least 1 argument, got 0".to_string())?;
    let mut result = coll.clone();
    for item in additions {
        result = match result {
            Value::Nil => list_of(Vector::unit(item.clone())),
            Value::List(list) => {
                let mut items = list.items().clone();
                items.push_front(item.clone());
                list_of(items)
            }
            Value::Vector(mut items) => {
                items.push_back(item.clone());
                Value::Vector(items)
            }
            Value::Set(items) => Value::Set(items.update(item.clone())),
            Value::Map(map) => match item.as_seq() {
                Some(pair) if pair.len() == 2 => {
                    Value::Map(map.update(pair[0].clone(), pair[1].clone()))
                }
                _ => return Err("map entries must be [key value] pairs".to_string()),
            },
            other => return Err(format!("cannot conj onto {}", type_name(&other))),
        };
    }
    Ok(result)
}

fn builtin_concat(args: &[Value]) -> Result<Value, String> {
    let mut items = Vector::new();
    for arg in args {
        items.append(seq(arg)?);
    }
    Ok(list_of(items))
}

fn builtin_get(args: &[Value]) -> Result<Value, String> {
    let (coll, key, default) = match args {
        [coll, key] => (coll, key, Value::Nil),
        [coll, key, default] => (coll, key, default.clone()),
        _ => return Err(format!("expects 2 or 3 arguments, got {}", args.len())),
    };
    let found = match coll {
        Value::Map(map) => map.get(key).cloned(),
        Value::Vector(items) => key
            .as_int()
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| items.get(i).cloned()),
        Value::Set(items) => items.contains(key).then(|| key.clone()),
        _ => None,
    };
    Ok(found.unwrap_or(default))
}

fn builtin_assoc(args: &[Value]) -> Result<Value, String> {
    let (key, value) = (args[1].clone(), args[2].clone());
    match &args[0] {
        Value::Nil => Ok(Value::map(vec![(key, value)])),
        Value::Map(map) => Ok(Value::Map(map.update(key, value))),
        Value::Vector(items) => {
            let index = key
                .as_int()
                .and_then(|i| usize::try_from(i).ok())
                .filter(|i| *i <= items.len())
                .ok_or_else(|| format!("index {:?} out of bounds for count {}", key, items.len()))?;
            let mut items = items.clone();
            if index == items.len() {
                items.push_back(value);
            } else {
                items.set(index, value);
            }
            Ok(Value::Vector(items))
        }
        other => Err(format!("cannot assoc into {}", type_name(other))),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Functions
// ═══════════════════════════════════════════════════════════════════════

// (apply f a b [c d]) calls (f a b c d).
fn builtin_apply(args: &[Value]) -> Result<Value, String> {
    let (function, spread) = match args {
        [Value::Function(function), middle @ .., last] => {
            let mut spread: Vec<Value> = middle.to_vec();
            spread.extend(seq(last)?);
            (function, spread)
        }
        [other, _, ..] => return Err(format!("cannot apply {}", type_name(other))),
        _ => return Err(format!("expects at least 2 arguments, got {}", args.len())),
    };
    call(function, spread)
}

fn call(function: &Function, args: Vec<Value>) -> Result<Value, String> {
    function.call(args).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::eval;

    fn builtin(name: &str) -> BuiltinFn {
        primitives()
            .into_iter()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("no primitive {}", name))
    }

    fn call_builtin(name: &str, args: Vec<Value>) -> error::Result<Value> {
        builtin(name).call(&args)
    }

    fn run(source: &str) -> Value {
        eval(&bootstrap().unwrap(), source).unwrap().value
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(call_builtin("+", vec![]).unwrap(), Value::Int(0));
        assert_eq!(
            call_builtin("+", vec![Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap(),
            Value::Int(6)
        );
        assert_eq!(call_builtin("-", vec![Value::Int(4)]).unwrap(), Value::Int(-4));
        assert_eq!(
            call_builtin("*", vec![Value::Int(4), Value::Int(5)]).unwrap(),
            Value::Int(20)
        );
    }

    #[test]
    fn test_mixed_arithmetic_is_float() {
        assert_eq!(
            call_builtin("+", vec![Value::Int(1), Value::Float(0.5)]).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn test_division() {
        assert_eq!(
            call_builtin("/", vec![Value::Int(6), Value::Int(3)]).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            call_builtin("/", vec![Value::Int(1), Value::Int(2)]).unwrap(),
            Value::Float(0.5)
        );
        assert!(call_builtin("/", vec![Value::Int(1), Value::Int(0)]).is_err());
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(call_builtin("+", vec![Value::Int(i64::MAX), Value::Int(1)]).is_err());
    }

    #[test]
    fn test_non_number_is_an_error() {
        let err = call_builtin("+", vec![Value::Int(1), Value::string("a")]).unwrap_err();
        assert!(err.to_string().contains("expected a number"));
    }

    #[test]
    fn test_comparisons_return_true_or_nil() {
        assert_eq!(
            call_builtin("<", vec![Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call_builtin(">", vec![Value::Int(1), Value::Int(2)]).unwrap(),
            Value::Nil
        );
        assert_eq!(
            call_builtin("=", vec![Value::Int(1), Value::Float(1.0)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call_builtin("=", vec![Value::string("a"), Value::string("b")]).unwrap(),
            Value::Nil
        );
    }

    #[test]
    fn test_str_skips_nil() {
        assert_eq!(
            call_builtin("str", vec![Value::string("a"), Value::Nil, Value::Int(1)]).unwrap(),
            Value::string("a1")
        );
    }

    #[test]
    fn test_symbol_and_keyword() {
        assert_eq!(
            call_builtin("symbol", vec![Value::string("foo"), Value::string("bar")]).unwrap(),
            Value::symbol("foo/bar")
        );
        assert_eq!(
            call_builtin("keyword", vec![Value::string("k")]).unwrap(),
            Value::keyword("k")
        );
    }

    #[test]
    fn test_sequence_functions() {
        let v = Value::vector(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(call_builtin("count", vec![v.clone()]).unwrap(), Value::Int(3));
        assert_eq!(call_builtin("first", vec![v.clone()]).unwrap(), Value::Int(1));
        assert_eq!(
            call_builtin("rest", vec![v.clone()]).unwrap(),
            Value::list(vec![Value::Int(2), Value::Int(3)])
        );
        assert_eq!(call_builtin("first", vec![Value::Nil]).unwrap(), Value::Nil);
        assert_eq!(
            call_builtin("nth", vec![v.clone(), Value::Int(2)]).unwrap(),
            Value::Int(3)
        );
        assert!(call_builtin("nth", vec![v, Value::Int(5)]).is_err());
    }

    #[test]
    fn test_conj_depends_on_collection() {
        let onto_vector =
            call_builtin("conj", vec![Value::vector(vec![Value::Int(1)]), Value::Int(2)]).unwrap();
        assert_eq!(onto_vector, Value::vector(vec![Value::Int(1), Value::Int(2)]));
        let onto_list =
            call_builtin("conj", vec![Value::list(vec![Value::Int(1)]), Value::Int(2)]).unwrap();
        assert_eq!(onto_list, Value::list(vec![Value::Int(2), Value::Int(1)]));
    }

    #[test]
    fn test_get_and_assoc() {
        let map = call_builtin("assoc", vec![Value::Nil, Value::keyword("a"), Value::Int(1)]).unwrap();
        assert_eq!(
            call_builtin("get", vec![map.clone(), Value::keyword("a")]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            call_builtin("get", vec![map, Value::keyword("b"), Value::Int(0)]).unwrap(),
            Value::Int(0)
        );
    }

    #[test]
    fn test_fixed_arity_checked() {
        assert!(matches!(
            call_builtin("inc", vec![]),
            Err(crate::error::EvalError::Arity { .. })
        ));
    }

    #[test]
    fn test_bootstrap_defines_core() {
        let context = bootstrap().unwrap();
        assert_eq!(context.namespace(), CORE_NS);
        for name in [
            "def", "fn", "+", "identity", "constantly", "second", "list?", "vector?", "empty?",
            "complement",
        ] {
            assert!(
                context.get_slot(&Symbol::new(name)).is_some(),
                "missing {}",
                name
            );
        }
    }

    #[test]
    fn test_bootstrap_helpers() {
        assert_eq!(run("(second [1 2 3])"), Value::Int(2));
        assert_eq!(run("(empty? [])"), Value::Bool(true));
        assert_eq!(run("(vector? [])"), Value::Bool(true));
        assert_eq!(run("(list? [])"), Value::Nil);
        assert_eq!(run("((complement nil?) 1)"), Value::Bool(true));
        assert_eq!(run("(apply + 1 [2 3])"), Value::Int(6));
    }

    #[test]
    fn test_initial_context_loads_core() {
        let context = initial_context().unwrap();
        let result = eval(&context, "(reduce + 0 (map inc [1 2 3]))").unwrap();
        assert_eq!(result.value, Value::Int(9));
    }
}
