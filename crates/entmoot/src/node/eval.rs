//! Node evaluation
//!
//! Evaluation is a pure function of (node, context, bindings). Only
//! `Define` produces a new context; `Do`, `If`, `Let` and `Define` thread
//! the context through their children, the other variants return the
//! input context unchanged.

use std::sync::Arc;

use tracing::trace;

use super::{Bindings, EvalResult, Node, NodeKind};
use crate::context::Context;
use crate::error::{EvalError, Result};
use crate::expander::{Expander, UserExpander};
use crate::value::{Closure, Function, Map, Set, Value, Vector};

impl Node {
    /// Evaluate against a context and lexical bindings.
    pub fn eval(&self, context: &Context, bindings: &Bindings) -> Result<EvalResult> {
        match self.kind() {
            NodeKind::Constant(value) => Ok(EvalResult::new(value.clone(), context.clone())),

            NodeKind::Lookup(symbol) => {
                let value = match bindings.get(symbol) {
                    Some(value) if !symbol.is_qualified() => value.clone(),
                    _ => context.get_value(symbol)?,
                };
                Ok(EvalResult::new(value, context.clone()))
            }

            NodeKind::Apply { function, args } => {
                let callee = function.compute(context, bindings)?;
                let args = compute_all(args, context, bindings)?;
                trace!(callee = ?callee, argc = args.len(), "apply");
                let value = apply(&callee, args, context)?;
                Ok(EvalResult::new(value, context.clone()))
            }

            NodeKind::Define { symbol, expr } => {
                let expr = expr.specialize(bindings);
                let context = context.define_with_bindings(symbol, expr, bindings.clone());
                Ok(EvalResult::new(Value::Nil, context))
            }

            NodeKind::Do(body) => {
                let mut result = EvalResult::new(Value::Nil, context.clone());
                for node in body {
                    result = node.eval(&result.context, bindings)?;
                }
                Ok(result)
            }

            NodeKind::If {
                test,
                then,
                otherwise,
            } => {
                let tested = test.eval(context, bindings)?;
                let branch = if tested.value.is_truthy() {
                    then
                } else {
                    otherwise
                };
                branch.eval(&tested.context, bindings)
            }

            NodeKind::Let {
                bindings: pairs,
                body,
            } => {
                let mut scope = bindings.clone();
                let mut context = context.clone();
                for (symbol, expr) in pairs {
                    let result = expr.eval(&context, bindings)?;
                    scope.insert(symbol.clone(), result.value);
                    context = result.context;
                }
                body.eval(&context, &scope)
            }

            NodeKind::Lambda { params, rest, body } => {
                let captured = params
                    .iter()
                    .chain(rest.iter())
                    .fold(bindings.clone(), |acc, sym| acc.without(sym));
                let closure = Closure {
                    params: params.clone(),
                    rest: rest.clone(),
                    body: body.specialize(&captured),
                    captured,
                    context: context.clone(),
                };
                Ok(EvalResult::new(
                    Value::Function(Function::Closure(Arc::new(closure))),
                    context.clone(),
                ))
            }

            NodeKind::Expander {
                continuation,
                params,
                body,
            } => {
                let captured = params
                    .iter()
                    .chain(std::iter::once(continuation))
                    .fold(bindings.clone(), |acc, sym| acc.without(sym));
                let expander = UserExpander {
                    continuation: continuation.clone(),
                    params: params.clone(),
                    body: body.specialize(&captured),
                    captured,
                };
                Ok(EvalResult::new(
                    Value::Expander(Expander::User(Arc::new(expander))),
                    context.clone(),
                ))
            }

            NodeKind::Quote { form, .. } => Ok(EvalResult::new(form.clone(), context.clone())),

            NodeKind::Vector(items) => {
                let values: Vector = compute_all(items, context, bindings)?.into_iter().collect();
                Ok(EvalResult::new(Value::Vector(values), context.clone()))
            }

            NodeKind::List(items) => {
                let values = compute_all(items, context, bindings)?;
                Ok(EvalResult::new(Value::list(values), context.clone()))
            }

            NodeKind::HashMap(items) => {
                let values = compute_all(items, context, bindings)?;
                Ok(EvalResult::new(build_map(values)?, context.clone()))
            }

            NodeKind::Set(items) => {
                let values: Set = compute_all(items, context, bindings)?.into_iter().collect();
                Ok(EvalResult::new(Value::Set(values), context.clone()))
            }

            NodeKind::InvokeInstance {
                target,
                member,
                args,
            } => {
                let target = target.compute(context, bindings)?;
                let args = compute_all(args, context, bindings)?;
                let value = context.host().invoke_instance(&target, member.name(), &args)?;
                Ok(EvalResult::new(value, context.clone()))
            }

            NodeKind::InvokeStatic { ty, member, args } => {
                let args = compute_all(args, context, bindings)?;
                let value = context.host().invoke_static(ty, member.name(), &args)?;
                Ok(EvalResult::new(value, context.clone()))
            }

            NodeKind::Cast { ty, expr } => {
                let value = expr.compute(context, bindings)?;
                let value = context.host().cast(ty, value)?;
                Ok(EvalResult::new(value, context.clone()))
            }

            NodeKind::InstanceOf { ty, expr } => {
                let ty = match ty.compute(context, bindings)? {
                    Value::Type(ty) => ty,
                    other => return Err(EvalError::type_error("type", &other)),
                };
                let value = expr.compute(context, bindings)?;
                let is_instance = context.host().instance_of(&ty, &value);
                Ok(EvalResult::new(Value::truth(is_instance), context.clone()))
            }
        }
    }

    /// Evaluate and keep only the value.
    pub fn compute(&self, context: &Context, bindings: &Bindings) -> Result<Value> {
        Ok(self.eval(context, bindings)?.value)
    }
}

fn compute_all(nodes: &[Node], context: &Context, bindings: &Bindings) -> Result<Vec<Value>> {
    nodes
        .iter()
        .map(|node| node.compute(context, bindings))
        .collect()
}

pub(crate) fn build_map(values: Vec<Value>) -> Result<Value> {
    if values.len() % 2 != 0 {
        return Err(EvalError::invocation(
            "hashmap requires an even number of forms",
        ));
    }
    let mut map = Map::new();
    let mut values = values.into_iter();
    while let (Some(key), Some(value)) = (values.next(), values.next()) {
        map.insert(key, value);
    }
    Ok(Value::Map(map))
}

/// Call a function value on evaluated arguments.
///
/// Functions run their body; expanders given a single form return the node
/// it expands to.
pub fn apply(callee: &Value, args: Vec<Value>, context: &Context) -> Result<Value> {
    match callee {
        Value::Function(function) => function.call(args),
        Value::Expander(expander) => expander.call(context, args),
        other => Err(EvalError::type_error("function", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::symbol::Symbol;

    fn sym(name: &str) -> Symbol {
        Symbol::parse(name)
    }

    #[test]
    fn test_do_of_nothing_is_nil() {
        let context = Context::empty();
        let result = Node::sequence(vec![]).eval(&context, &Bindings::new()).unwrap();
        assert_eq!(result.value, Value::Nil);
    }

    #[test]
    fn test_lookup_prefers_lexical_binding() {
        let context = Context::empty().define(&sym("a"), Node::constant(Value::Int(1)));
        let bindings = Bindings::unit(sym("a"), Value::Int(2));
        let value = Node::lookup(sym("a")).compute(&context, &bindings).unwrap();
        assert_eq!(value, Value::Int(2));
    }

    #[test]
    fn test_false_is_truthy() {
        let context = Context::empty();
        let node = Node::conditional(
            Node::constant(Value::Bool(false)),
            Node::constant(Value::Int(1)),
            Node::constant(Value::Int(2)),
        );
        assert_eq!(node.compute(&context, &Bindings::new()).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_let_binds_in_parallel() {
        let context = Context::empty().define(&sym("a"), Node::constant(Value::Int(10)));
        // (let [a 1 b a] b) sees the outer a
        let node = Node::let_block(
            vec![
                (sym("a"), Node::constant(Value::Int(1))),
                (sym("b"), Node::lookup(sym("a"))),
            ],
            Node::lookup(sym("b")),
        );
        assert_eq!(node.compute(&context, &Bindings::new()).unwrap(), Value::Int(10));
    }

    #[test]
    fn test_define_threads_through_do() {
        let context = Context::empty();
        let node = Node::sequence(vec![
            Node::define(sym("a"), Node::constant(Value::Int(1))),
            Node::lookup(sym("a")),
        ]);
        let result = node.eval(&context, &Bindings::new()).unwrap();
        assert_eq!(result.value, Value::Int(1));
        assert!(context.get_slot(&sym("a")).is_none());
    }

    #[test]
    fn test_apply_non_function_is_type_error() {
        let context = Context::empty();
        let err = apply(&Value::Int(1), vec![], &context).unwrap_err();
        assert!(matches!(err, EvalError::Type { .. }));
    }
}
