//! Minimal form-to-node translator for bootstrapping
//!
//! The analyser knows a fixed set of special forms by name (`def`, `fn`,
//! `quote`, `do`, `if`, `let`) and does not consult the context for
//! expanders, so it can load definitions before any expander exists.
//! Everything else is an application, a lookup or a constant.

use crate::context::Context;
use crate::error::{EvalError, Result};
use crate::node::{EvalResult, Node};
use crate::reader::Reader;
use crate::symbol::{self, Symbol};
use crate::value::{List, Value};

/// Translate one form into a node.
pub fn analyse(form: &Value) -> Result<Node> {
    match form {
        Value::List(list) => analyse_list(form, list),
        Value::Vector(items) => Ok(Node::vector(analyse_all(items.iter())?)),
        Value::Map(map) => {
            let mut nodes = Vec::with_capacity(map.len() * 2);
            for (key, value) in map.iter() {
                nodes.push(analyse(key)?);
                nodes.push(analyse(value)?);
            }
            Ok(Node::hash_map(nodes))
        }
        Value::Set(items) => Ok(Node::set(analyse_all(items.iter())?)),
        Value::Symbol(sym) => Ok(Node::lookup(sym.clone())),
        other => Ok(Node::constant(other.clone())),
    }
}

/// Read, analyse and evaluate every form in `source`, threading the
/// context.
pub fn load(context: &Context, source: &str) -> Result<EvalResult> {
    let mut reader = Reader::new(source);
    let mut result = EvalResult::new(Value::Nil, context.clone());
    while let Some(form) = reader.read_next()? {
        let node = analyse(&form)?;
        result = node.eval(&result.context, &Default::default())?;
    }
    Ok(result)
}

fn analyse_all<'a>(forms: impl Iterator<Item = &'a Value>) -> Result<Vec<Node>> {
    forms.map(analyse).collect()
}

fn analyse_list(form: &Value, list: &List) -> Result<Node> {
    let head = match list.head() {
        Some(head) => head,
        None => return Ok(Node::constant(form.clone())),
    };
    let rest: Vec<&Value> = list.iter().skip(1).collect();

    if let Value::Symbol(sym) = head {
        if *sym == *symbol::DEF {
            return analyse_def(form, &rest);
        }
        if *sym == *symbol::FN {
            return analyse_fn(form, &rest);
        }
        if *sym == *symbol::QUOTE {
            return match rest.as_slice() {
                [quoted] => Ok(Node::quote((*quoted).clone(), false)),
                _ => Err(EvalError::expansion("quote requires exactly one form", form)),
            };
        }
        if *sym == *symbol::DO {
            return Ok(Node::sequence(analyse_all(rest.into_iter())?));
        }
        if *sym == *symbol::IF {
            return analyse_if(form, &rest);
        }
        if *sym == *symbol::LET {
            return analyse_let(form, &rest);
        }
    }

    let function = analyse(head)?;
    let args = analyse_all(rest.into_iter())?;
    Ok(Node::apply(function, args).with_source(list.source()))
}

fn analyse_def(form: &Value, rest: &[&Value]) -> Result<Node> {
    match rest {
        [Value::Symbol(name), expr] => Ok(Node::define(name.clone(), analyse(expr)?)),
        [other, _] => Err(EvalError::analysis("def name must be a symbol", other)),
        _ => Err(EvalError::expansion(
            "def requires a name and a value: (def name expr)",
            form,
        )),
    }
}

fn analyse_fn(form: &Value, rest: &[&Value]) -> Result<Node> {
    let (params, body) = match rest.split_first() {
        Some((Value::Vector(params), body)) => (params, body),
        Some((other, _)) => return Err(EvalError::analysis("parameters must be a vector", other)),
        None => return Err(EvalError::expansion("fn requires a parameter vector", form)),
    };

    let mut names = Vec::new();
    let mut rest_param = None;
    let mut iter = params.iter();
    while let Some(param) = iter.next() {
        let name = param
            .as_symbol()
            .ok_or_else(|| EvalError::analysis("parameter must be a symbol", param))?;
        if *name == *symbol::AMPERSAND {
            let last = iter
                .next()
                .and_then(Value::as_symbol)
                .ok_or_else(|| EvalError::expansion("& must be followed by a symbol", form))?;
            rest_param = Some(last.clone());
            break;
        }
        names.push(name.clone());
    }

    let body = analyse_all(body.iter().copied())?;
    Ok(Node::lambda(names, rest_param, Node::sequence(body)))
}

fn analyse_if(form: &Value, rest: &[&Value]) -> Result<Node> {
    match rest {
        [test, then] => Ok(Node::conditional(
            analyse(test)?,
            analyse(then)?,
            Node::constant(Value::Nil),
        )),
        [test, then, otherwise] => Ok(Node::conditional(
            analyse(test)?,
            analyse(then)?,
            analyse(otherwise)?,
        )),
        _ => Err(EvalError::expansion(
            "if requires a test, a then branch and an optional else branch",
            form,
        )),
    }
}

fn analyse_let(form: &Value, rest: &[&Value]) -> Result<Node> {
    let (pairs, body) = match rest.split_first() {
        Some((Value::Vector(pairs), body)) => (pairs, body),
        Some((other, _)) => return Err(EvalError::analysis("let bindings must be a vector", other)),
        None => return Err(EvalError::expansion("let requires a binding vector", form)),
    };
    if pairs.len() % 2 != 0 {
        return Err(EvalError::expansion(
            "let binding vector must have an even number of forms",
            form,
        ));
    }
    let mut bindings: Vec<(Symbol, Node)> = Vec::with_capacity(pairs.len() / 2);
    let mut iter = pairs.iter();
    while let (Some(name), Some(expr)) = (iter.next(), iter.next()) {
        let name = name
            .as_symbol()
            .ok_or_else(|| EvalError::analysis("let binding must be a symbol", name))?;
        bindings.push((name.clone(), analyse(expr)?));
    }
    let body = analyse_all(body.iter().copied())?;
    Ok(Node::let_block(bindings, Node::sequence(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::reader::read_str;

    fn analyse_str(source: &str) -> Result<Node> {
        let forms = read_str(source)?;
        analyse(&forms[0])
    }

    #[test]
    fn test_def_and_fn() {
        let node = analyse_str("(def id (fn [x] x))").unwrap();
        match node.kind() {
            NodeKind::Define { symbol, expr } => {
                assert_eq!(symbol, &Symbol::new("id"));
                assert!(matches!(expr.kind(), NodeKind::Lambda { .. }));
            }
            _ => panic!("expected Define"),
        }
    }

    #[test]
    fn test_quote() {
        let node = analyse_str("'(a b)").unwrap();
        assert!(matches!(node.kind(), NodeKind::Quote { .. }));
    }

    #[test]
    fn test_unknown_head_is_application() {
        let node = analyse_str("(when x y)").unwrap();
        assert!(matches!(node.kind(), NodeKind::Apply { .. }));
    }

    #[test]
    fn test_def_errors() {
        assert!(matches!(
            analyse_str("(def 1 2)"),
            Err(EvalError::Analysis { .. })
        ));
        assert!(matches!(
            analyse_str("(def a)"),
            Err(EvalError::Expansion { .. })
        ));
    }

    #[test]
    fn test_load_threads_context() {
        let result = load(&Context::empty(), "(def a 1) (def b (fn [] a)) (b)").unwrap();
        assert_eq!(result.value, Value::Int(1));
    }
}
