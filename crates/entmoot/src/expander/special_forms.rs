//! Built-in special forms
//!
//! Each special form is an expander bound in `entmoot.core`. Shape errors
//! (wrong number of elements) are expansion errors; a non-symbol where a
//! name is required, or a non-vector where a parameter vector is required,
//! is an analysis error.

use std::sync::Arc;

use super::{expand_all, Expander, MacroExpander};
use crate::context::Context;
use crate::error::{EvalError, Result};
use crate::interop::{maybe_type_name, TypeRef};
use crate::node::{Bindings, Node};
use crate::symbol::{self, Symbol, NS_SLOT};
use crate::value::{List, Map, Set, Value, Vector};

/// The built-in special forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpecialForm {
    /// `(def name expr)`
    Def,
    /// `(defn name [params] body...)`
    Defn,
    /// `(fn [params] body...)`
    Fn,
    /// `(do forms...)`
    Do,
    /// `(if test then else?)`
    If,
    /// `(let [name expr ...] body...)`
    Let,
    /// `(quote form)`
    Quote,
    /// `(syntax-quote form)`
    SyntaxQuote,
    /// `(unquote form)`
    Unquote,
    /// `(macro [params] body...)`
    Macro,
    /// `(defmacro name [params] body...)`
    Defmacro,
    /// `(expander [ex [params]] body...)`
    Expander,
    /// `(. target member args...)`
    Dot,
    /// `(cast Type expr)`
    Cast,
    /// `(instance? Type expr)`
    InstanceOf,
    /// `(vector forms...)`
    Vector,
    /// `(list forms...)`
    List,
    /// `(set forms...)`
    Set,
    /// `(hashmap k v ...)`
    HashMap,
    /// `(ns name)`
    Ns,
}

impl SpecialForm {
    /// Every special form, in definition order.
    pub const ALL: [SpecialForm; 20] = [
        SpecialForm::Def,
        SpecialForm::Defn,
        SpecialForm::Fn,
        SpecialForm::Do,
        SpecialForm::If,
        SpecialForm::Let,
        SpecialForm::Quote,
        SpecialForm::SyntaxQuote,
        SpecialForm::Unquote,
        SpecialForm::Macro,
        SpecialForm::Defmacro,
        SpecialForm::Expander,
        SpecialForm::Dot,
        SpecialForm::Cast,
        SpecialForm::InstanceOf,
        SpecialForm::Vector,
        SpecialForm::List,
        SpecialForm::Set,
        SpecialForm::HashMap,
        SpecialForm::Ns,
    ];

    /// The symbol the form is bound to.
    pub fn symbol(self) -> Symbol {
        let sym: &Symbol = match self {
            SpecialForm::Def => &symbol::DEF,
            SpecialForm::Defn => &symbol::DEFN,
            SpecialForm::Fn => &symbol::FN,
            SpecialForm::Do => &symbol::DO,
            SpecialForm::If => &symbol::IF,
            SpecialForm::Let => &symbol::LET,
            SpecialForm::Quote => &symbol::QUOTE,
            SpecialForm::SyntaxQuote => &symbol::SYNTAX_QUOTE,
            SpecialForm::Unquote => &symbol::UNQUOTE,
            SpecialForm::Macro => &symbol::MACRO,
            SpecialForm::Defmacro => &symbol::DEFMACRO,
            SpecialForm::Expander => &symbol::EXPANDER,
            SpecialForm::Dot => &symbol::DOT,
            SpecialForm::Cast => &symbol::CAST,
            SpecialForm::InstanceOf => &symbol::INSTANCE,
            SpecialForm::Vector => &symbol::VECTOR,
            SpecialForm::List => &symbol::LIST,
            SpecialForm::Set => &symbol::SET,
            SpecialForm::HashMap => &symbol::HASHMAP,
            SpecialForm::Ns => &symbol::NS,
        };
        sym.clone()
    }

    /// The form's name.
    pub fn name(self) -> String {
        self.symbol().name().to_string()
    }

    /// Expand a form whose head is this special form.
    pub fn expand(self, context: &Context, form: &Value, ex: &Expander) -> Result<Node> {
        let list = form
            .as_list()
            .ok_or_else(|| EvalError::expansion("special form applied to a non-list", form))?;
        let node = match self {
            SpecialForm::Def => expand_def(context, form, list, ex),
            SpecialForm::Defn => expand_defn(context, form, list, ex),
            SpecialForm::Fn => expand_fn(context, form, list, ex),
            SpecialForm::Do => Ok(Node::sequence(expand_all(context, list.iter().skip(1), ex)?)),
            SpecialForm::If => expand_if(context, form, list, ex),
            SpecialForm::Let => expand_let(context, form, list, ex),
            SpecialForm::Quote => expand_quote(context, form, list, ex, false),
            SpecialForm::SyntaxQuote => expand_quote(context, form, list, ex, true),
            SpecialForm::Unquote => expand_unquote(context, form, list, ex),
            SpecialForm::Macro => expand_macro(context, form, list, ex),
            SpecialForm::Defmacro => expand_defmacro(context, form, list, ex),
            SpecialForm::Expander => expand_expander(context, form, list, ex),
            SpecialForm::Dot => expand_dot(context, form, list, ex),
            SpecialForm::Cast => expand_cast(context, form, list, ex),
            SpecialForm::InstanceOf => expand_instance_of(context, form, list, ex),
            SpecialForm::Vector => Ok(Node::vector(expand_all(context, list.iter().skip(1), ex)?)),
            SpecialForm::List => Ok(Node::list(expand_all(context, list.iter().skip(1), ex)?)),
            SpecialForm::Set => Ok(Node::set(expand_all(context, list.iter().skip(1), ex)?)),
            SpecialForm::HashMap => expand_hashmap(context, form, list, ex),
            SpecialForm::Ns => expand_ns(form, list),
        }?;
        Ok(node.with_source(list.source()))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════

static NIL: Value = Value::Nil;

// Callers check the list length first; a missing element reads as nil.
fn arg(list: &List, index: usize) -> &Value {
    list.get(index).unwrap_or(&NIL)
}

fn is_unquote(list: &List) -> bool {
    list.len() == 2 && matches!(list.head(), Some(Value::Symbol(sym)) if *sym == *symbol::UNQUOTE)
}

// Expand and evaluate a form right now, at expansion time.
fn evaluate_now(context: &Context, form: &Value, ex: &Expander) -> Result<Value> {
    ex.expand(context, form, ex)?
        .compute(context, &Bindings::new())
}

// A symbol, or `(unquote expr)` evaluating to one.
fn binding_symbol(context: &Context, form: &Value, ex: &Expander, what: &str) -> Result<Symbol> {
    match form {
        Value::Symbol(sym) => Ok(sym.clone()),
        Value::List(list) if is_unquote(list) => match evaluate_now(context, arg(list, 1), ex)? {
            Value::Symbol(sym) => Ok(sym),
            other => Err(EvalError::analysis(
                format!("{} must be a symbol, got {:?}", what, other),
                form,
            )),
        },
        other => Err(EvalError::analysis(format!("{} must be a symbol", what), other)),
    }
}

// `[a b & rest]`
fn parse_params(
    context: &Context,
    form: &Value,
    ex: &Expander,
) -> Result<(Vec<Symbol>, Option<Symbol>)> {
    let items = match form {
        Value::Vector(items) => items,
        other => return Err(EvalError::analysis("parameters must be a vector", other)),
    };
    let mut params = Vec::new();
    let mut rest = None;
    let mut iter = items.iter();
    while let Some(item) = iter.next() {
        if matches!(item, Value::Symbol(sym) if *sym == *symbol::AMPERSAND) {
            let name = iter
                .next()
                .ok_or_else(|| EvalError::expansion("& must be followed by a parameter", form))?;
            rest = Some(binding_symbol(context, name, ex, "rest parameter")?);
            if iter.next().is_some() {
                return Err(EvalError::expansion(
                    "only one parameter may follow &",
                    form,
                ));
            }
            break;
        }
        params.push(binding_symbol(context, item, ex, "parameter")?);
    }
    Ok((params, rest))
}

fn sequence_of(mut body: Vec<Node>) -> Node {
    if body.len() == 1 {
        body.remove(0)
    } else {
        Node::sequence(body)
    }
}

fn rewrite(head: &Symbol, list: &List, rest: Vec<Value>) -> Value {
    let items = std::iter::once(Value::Symbol(head.clone())).chain(rest).collect();
    match list.source() {
        Some(loc) => Value::List(List::new(items).with_source(loc.clone())),
        None => Value::List(List::new(items)),
    }
}

// A type named by an unqualified, type-like symbol that nothing in the
// context shadows.
fn named_type(context: &Context, form: &Value) -> Option<TypeRef> {
    match form {
        Value::Symbol(sym)
            if !sym.is_qualified()
                && maybe_type_name(sym.name())
                && context.get_slot(sym).is_none() =>
        {
            context.host().resolve_type(sym.name())
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Definitions and functions
// ═══════════════════════════════════════════════════════════════════════

fn expand_def(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    if list.len() != 3 {
        return Err(EvalError::expansion(
            "def requires a name and a value: (def name expr)",
            form,
        ));
    }
    let name = binding_symbol(context, arg(list, 1), ex, "def name")?;
    let expr = ex.expand(context, arg(list, 2), ex)?;
    Ok(Node::define(name, expr))
}

// (defn name params body...) => (def name (fn params body...))
fn expand_defn(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    if list.len() < 3 {
        return Err(EvalError::expansion(
            "defn requires a name and a parameter vector",
            form,
        ));
    }
    let lambda = rewrite(&symbol::FN, list, list.iter().skip(2).cloned().collect());
    let def = rewrite(&symbol::DEF, list, vec![arg(list, 1).clone(), lambda]);
    ex.expand(context, &def, ex)
}

fn expand_fn(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    if list.len() < 2 {
        return Err(EvalError::expansion("fn requires a parameter vector", form));
    }
    let (params, rest) = parse_params(context, arg(list, 1), ex)?;
    let body = expand_all(context, list.iter().skip(2), ex)?;
    Ok(Node::lambda(params, rest, sequence_of(body)))
}

fn expand_if(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    if list.len() != 3 && list.len() != 4 {
        return Err(EvalError::expansion(
            "if requires a test, a then branch and an optional else branch",
            form,
        ));
    }
    let test = ex.expand(context, arg(list, 1), ex)?;
    let then = ex.expand(context, arg(list, 2), ex)?;
    let otherwise = match list.get(3) {
        Some(branch) => ex.expand(context, branch, ex)?,
        None => Node::constant(Value::Nil),
    };
    Ok(Node::conditional(test, then, otherwise))
}

fn expand_let(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    if list.len() < 2 {
        return Err(EvalError::expansion("let requires a binding vector", form));
    }
    let pairs = match arg(list, 1) {
        Value::Vector(items) => items,
        other => return Err(EvalError::analysis("let bindings must be a vector", other)),
    };
    if pairs.len() % 2 != 0 {
        return Err(EvalError::expansion(
            "let binding vector must have an even number of forms",
            form,
        ));
    }
    let mut bindings = Vec::with_capacity(pairs.len() / 2);
    let mut iter = pairs.iter();
    while let (Some(name), Some(expr)) = (iter.next(), iter.next()) {
        let name = binding_symbol(context, name, ex, "let binding")?;
        bindings.push((name, ex.expand(context, expr, ex)?));
    }
    let body = expand_all(context, list.iter().skip(2), ex)?;
    Ok(Node::let_block(bindings, sequence_of(body)))
}

// ═══════════════════════════════════════════════════════════════════════
// Quoting
// ═══════════════════════════════════════════════════════════════════════

fn expand_quote(
    context: &Context,
    form: &Value,
    list: &List,
    ex: &Expander,
    syntax: bool,
) -> Result<Node> {
    if list.len() != 2 {
        return Err(EvalError::expansion("quote requires exactly one form", form));
    }
    let quoted = substitute_unquotes(context, arg(list, 1), ex)?;
    Ok(Node::quote(quoted, syntax))
}

// Replace every `(unquote x)` inside a quoted form by the value of `x`.
fn substitute_unquotes(context: &Context, form: &Value, ex: &Expander) -> Result<Value> {
    match form {
        Value::List(list) if is_unquote(list) => evaluate_now(context, arg(list, 1), ex),
        Value::List(list) => {
            let items: Vector = list
                .iter()
                .map(|item| substitute_unquotes(context, item, ex))
                .collect::<Result<_>>()?;
            let rebuilt = List::new(items);
            Ok(Value::List(match list.source() {
                Some(loc) => rebuilt.with_source(loc.clone()),
                None => rebuilt,
            }))
        }
        Value::Vector(items) => Ok(Value::Vector(
            items
                .iter()
                .map(|item| substitute_unquotes(context, item, ex))
                .collect::<Result<_>>()?,
        )),
        Value::Set(items) => Ok(Value::Set(
            items
                .iter()
                .map(|item| substitute_unquotes(context, item, ex))
                .collect::<Result<Set>>()?,
        )),
        Value::Map(map) => {
            let mut out = Map::new();
            for (key, value) in map.iter() {
                out.insert(
                    substitute_unquotes(context, key, ex)?,
                    substitute_unquotes(context, value, ex)?,
                );
            }
            Ok(Value::Map(out))
        }
        other => Ok(other.clone()),
    }
}

fn expand_unquote(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    if list.len() != 2 {
        return Err(EvalError::expansion("unquote requires exactly one form", form));
    }
    Ok(Node::constant(evaluate_now(context, arg(list, 1), ex)?))
}

// ═══════════════════════════════════════════════════════════════════════
// Macros and expanders
// ═══════════════════════════════════════════════════════════════════════

fn expand_macro(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    if list.len() < 3 {
        return Err(EvalError::expansion(
            "macro requires a parameter vector and a body",
            form,
        ));
    }
    let (params, rest) = parse_params(context, arg(list, 1), ex)?;
    let body = expand_all(context, list.iter().skip(2), ex)?;
    let lambda = Node::lambda(params, rest, sequence_of(body));
    let function = match lambda.compute(context, &Bindings::new())? {
        Value::Function(function) => function,
        other => return Err(EvalError::type_error("function", &other)),
    };
    let expander = Expander::Macro(Arc::new(MacroExpander { function }));
    Ok(Node::constant(Value::Expander(expander)))
}

// (defmacro name params body...) => (def name (macro params body...))
fn expand_defmacro(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    if list.len() < 4 {
        return Err(EvalError::expansion(
            "defmacro requires a name, a parameter vector and a body",
            form,
        ));
    }
    let mac = rewrite(&symbol::MACRO, list, list.iter().skip(2).cloned().collect());
    let def = rewrite(&symbol::DEF, list, vec![arg(list, 1).clone(), mac]);
    ex.expand(context, &def, ex)
}

fn expand_expander(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    if list.len() < 2 {
        return Err(EvalError::expansion(
            "expander requires [continuation [params]]",
            form,
        ));
    }
    let header = match arg(list, 1) {
        Value::Vector(items) if items.len() == 2 => items,
        other => {
            return Err(EvalError::analysis(
                "expander header must be [continuation [params]]",
                other,
            ))
        }
    };
    let continuation = binding_symbol(context, &header[0], ex, "continuation")?;
    let (params, rest) = parse_params(context, &header[1], ex)?;
    if rest.is_some() {
        return Err(EvalError::analysis(
            "expander parameters cannot include a rest parameter",
            &header[1],
        ));
    }
    let body = expand_all(context, list.iter().skip(2), ex)?;
    Ok(Node::expander(continuation, params, sequence_of(body)))
}

// ═══════════════════════════════════════════════════════════════════════
// Interop
// ═══════════════════════════════════════════════════════════════════════

// (. target member args...) or (. target (member args...))
fn expand_dot(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    if list.len() < 3 {
        return Err(EvalError::expansion(
            "(. target member args...) requires a target and a member",
            form,
        ));
    }
    let call: Vec<Value> = match (list.len(), arg(list, 2)) {
        (3, Value::List(inner)) => inner.iter().cloned().collect(),
        _ => list.iter().skip(2).cloned().collect(),
    };
    let member = match call.first() {
        Some(Value::Symbol(sym)) => sym.clone(),
        Some(other) => return Err(EvalError::analysis("member name must be a symbol", other)),
        None => return Err(EvalError::expansion("missing member name", form)),
    };
    let args = expand_all(context, call.iter().skip(1), ex)?;

    let target = arg(list, 1);
    if let Some(ty) = named_type(context, target) {
        return Ok(Node::invoke_static(ty, member, args));
    }
    let target = ex.expand(context, target, ex)?;
    Ok(Node::invoke_instance(target, member, args))
}

fn expand_cast(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    if list.len() != 3 {
        return Err(EvalError::expansion("cast requires a type and a value", form));
    }
    let ty = match named_type(context, arg(list, 1)) {
        Some(ty) => ty,
        None => match evaluate_now(context, arg(list, 1), ex)? {
            Value::Type(ty) => ty,
            _ => return Err(EvalError::analysis("cast requires a type", arg(list, 1))),
        },
    };
    let expr = ex.expand(context, arg(list, 2), ex)?;
    Ok(Node::cast(ty, expr))
}

fn expand_instance_of(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    if list.len() != 3 {
        return Err(EvalError::expansion(
            "instance? requires a type and a value",
            form,
        ));
    }
    let ty = match named_type(context, arg(list, 1)) {
        Some(ty) => Node::constant(Value::Type(ty)),
        None => ex.expand(context, arg(list, 1), ex)?,
    };
    let expr = ex.expand(context, arg(list, 2), ex)?;
    Ok(Node::instance_of(ty, expr))
}

// ═══════════════════════════════════════════════════════════════════════
// Collections and namespaces
// ═══════════════════════════════════════════════════════════════════════

fn expand_hashmap(context: &Context, form: &Value, list: &List, ex: &Expander) -> Result<Node> {
    if (list.len() - 1) % 2 != 0 {
        return Err(EvalError::expansion(
            "hashmap requires an even number of forms",
            form,
        ));
    }
    Ok(Node::hash_map(expand_all(context, list.iter().skip(1), ex)?))
}

fn expand_ns(form: &Value, list: &List) -> Result<Node> {
    if list.len() != 2 {
        return Err(EvalError::expansion("ns requires a namespace name", form));
    }
    let name = match arg(list, 1) {
        Value::Symbol(sym) if !sym.is_qualified() => sym.name().to_string(),
        other => return Err(EvalError::analysis("namespace name must be a symbol", other)),
    };
    Ok(Node::define(
        NS_SLOT.clone(),
        Node::constant(Value::string(name)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn context() -> Context {
        SpecialForm::ALL.iter().fold(Context::empty(), |ctx, special| {
            ctx.define(
                &special.symbol().qualify(symbol::CORE_NS),
                Node::constant(Value::Expander(Expander::Builtin(*special))),
            )
        })
    }

    fn expand(source: Value) -> Result<Node> {
        let ex = Expander::initial();
        ex.expand(&context(), &source, &ex)
    }

    fn list(items: Vec<Value>) -> Value {
        Value::list(items)
    }

    #[test]
    fn test_def_shape_errors() {
        let err = expand(list(vec![Value::symbol("def"), Value::symbol("a")])).unwrap_err();
        assert!(matches!(err, EvalError::Expansion { .. }));

        let err = expand(list(vec![Value::symbol("def"), Value::Int(1), Value::Int(2)]))
            .unwrap_err();
        assert!(matches!(err, EvalError::Analysis { .. }));
    }

    #[test]
    fn test_def_records_head_dependency() {
        let node = expand(list(vec![Value::symbol("def"), Value::symbol("a"), Value::Int(1)]))
            .unwrap();
        assert!(matches!(node.kind(), NodeKind::Define { .. }));
        assert!(node.dependencies().contains(&Symbol::new("def")));
    }

    #[test]
    fn test_if_without_else() {
        let node = expand(list(vec![Value::symbol("if"), Value::Nil, Value::Int(1)])).unwrap();
        match node.kind() {
            NodeKind::If { otherwise, .. } => {
                assert_eq!(otherwise.constant_value(), Some(&Value::Nil))
            }
            _ => panic!("expected If, got {:?}", node),
        }
    }

    #[test]
    fn test_let_odd_bindings() {
        let form = list(vec![
            Value::symbol("let"),
            Value::vector(vec![Value::symbol("a")]),
            Value::symbol("a"),
        ]);
        assert!(matches!(expand(form), Err(EvalError::Expansion { .. })));
    }

    #[test]
    fn test_fn_params_must_be_vector() {
        let form = list(vec![Value::symbol("fn"), Value::symbol("x"), Value::Int(1)]);
        assert!(matches!(expand(form), Err(EvalError::Analysis { .. })));
    }

    #[test]
    fn test_fn_rest_parameter() {
        let form = list(vec![
            Value::symbol("fn"),
            Value::vector(vec![Value::symbol("a"), Value::symbol("&"), Value::symbol("more")]),
            Value::symbol("more"),
        ]);
        match expand(form).unwrap().kind() {
            NodeKind::Lambda { params, rest, .. } => {
                assert_eq!(params, &vec![Symbol::new("a")]);
                assert_eq!(rest, &Some(Symbol::new("more")));
            }
            _ => panic!("expected Lambda"),
        }
    }

    #[test]
    fn test_dot_static_and_instance() {
        let node = expand(list(vec![
            Value::symbol("."),
            Value::symbol("Math"),
            Value::symbol("abs"),
            Value::Int(-1),
        ]))
        .unwrap();
        assert!(matches!(node.kind(), NodeKind::InvokeStatic { .. }));

        let node = expand(list(vec![
            Value::symbol("."),
            Value::string("foo"),
            Value::list(vec![Value::symbol("length")]),
        ]))
        .unwrap();
        assert!(matches!(node.kind(), NodeKind::InvokeInstance { .. }));
    }

    #[test]
    fn test_hashmap_needs_pairs() {
        let form = list(vec![Value::symbol("hashmap"), Value::keyword("a")]);
        assert!(matches!(expand(form), Err(EvalError::Expansion { .. })));
    }

    #[test]
    fn test_ns_defines_namespace_slot() {
        let node = expand(list(vec![Value::symbol("ns"), Value::symbol("foo.bar")])).unwrap();
        match node.kind() {
            NodeKind::Define { symbol, expr } => {
                assert_eq!(symbol, &*NS_SLOT);
                assert_eq!(expr.constant_value(), Some(&Value::string("foo.bar")));
            }
            _ => panic!("expected Define"),
        }
    }
}
