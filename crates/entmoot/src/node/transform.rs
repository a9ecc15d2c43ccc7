//! Context-free node rewrites: specialization and optimization
//!
//! Both return `self` (the same `Arc`) when nothing changes, which keeps
//! repeated closure calls from reallocating unchanged bodies.

use super::{Bindings, Node, NodeKind};
use crate::symbol::Symbol;
use crate::value::{Set, Value, Vector};

fn map_nodes(nodes: &[Node], f: impl Fn(&Node) -> Node) -> (Vec<Node>, bool) {
    let mapped: Vec<Node> = nodes.iter().map(f).collect();
    let changed = mapped.iter().zip(nodes).any(|(new, old)| !new.ptr_eq(old));
    (mapped, changed)
}

fn shadow<'a>(bindings: &Bindings, symbols: impl IntoIterator<Item = &'a Symbol>) -> Bindings {
    symbols
        .into_iter()
        .fold(bindings.clone(), |acc, sym| acc.without(sym))
}

impl Node {
    /// Substitute lexical values for lookups of bound symbols.
    ///
    /// Binding constructs inside the node shadow the substitution for their
    /// own names. Interop nodes are passed through unchanged; their lookups
    /// are satisfied by the bindings handed to `eval`.
    pub fn specialize(&self, bindings: &Bindings) -> Node {
        if bindings.is_empty()
            || !self
                .dependencies()
                .iter()
                .any(|sym| bindings.contains_key(sym))
        {
            return self.clone();
        }

        match self.kind() {
            NodeKind::Constant(_) | NodeKind::Quote { .. } => self.clone(),

            NodeKind::Lookup(symbol) => match bindings.get(symbol) {
                Some(value) if !symbol.is_qualified() => {
                    self.replace_with(Node::constant(value.clone()).with_source(self.source()))
                }
                _ => self.clone(),
            },

            NodeKind::Apply { function, args } => {
                let new_function = function.specialize(bindings);
                let (new_args, changed) = map_nodes(args, |n| n.specialize(bindings));
                if !changed && new_function.ptr_eq(function) {
                    return self.clone();
                }
                self.rebuild(NodeKind::Apply {
                    function: new_function,
                    args: new_args,
                })
            }

            NodeKind::Define { symbol, expr } => {
                let new_expr = expr.specialize(bindings);
                if new_expr.ptr_eq(expr) {
                    return self.clone();
                }
                self.rebuild(NodeKind::Define {
                    symbol: symbol.clone(),
                    expr: new_expr,
                })
            }

            NodeKind::Do(body) => {
                let (new_body, changed) = map_nodes(body, |n| n.specialize(bindings));
                if !changed {
                    return self.clone();
                }
                self.rebuild(NodeKind::Do(new_body))
            }

            NodeKind::If {
                test,
                then,
                otherwise,
            } => {
                let (parts, changed) =
                    map_nodes(&[test.clone(), then.clone(), otherwise.clone()], |n| {
                        n.specialize(bindings)
                    });
                if !changed {
                    return self.clone();
                }
                let [test, then, otherwise]: [Node; 3] = match parts.try_into() {
                    Ok(parts) => parts,
                    Err(_) => return self.clone(),
                };
                self.rebuild(NodeKind::If {
                    test,
                    then,
                    otherwise,
                })
            }

            NodeKind::Let {
                bindings: pairs,
                body,
            } => {
                let new_pairs: Vec<(Symbol, Node)> = pairs
                    .iter()
                    .map(|(sym, expr)| (sym.clone(), expr.specialize(bindings)))
                    .collect();
                let inner = shadow(bindings, pairs.iter().map(|(sym, _)| sym));
                let new_body = body.specialize(&inner);
                let changed = !new_body.ptr_eq(body)
                    || new_pairs
                        .iter()
                        .zip(pairs)
                        .any(|((_, new), (_, old))| !new.ptr_eq(old));
                if !changed {
                    return self.clone();
                }
                self.rebuild(NodeKind::Let {
                    bindings: new_pairs,
                    body: new_body,
                })
            }

            NodeKind::Lambda { params, rest, body } => {
                let inner = shadow(bindings, params.iter().chain(rest.iter()));
                let new_body = body.specialize(&inner);
                if new_body.ptr_eq(body) {
                    return self.clone();
                }
                self.rebuild(NodeKind::Lambda {
                    params: params.clone(),
                    rest: rest.clone(),
                    body: new_body,
                })
            }

            NodeKind::Expander {
                continuation,
                params,
                body,
            } => {
                let inner = shadow(bindings, params.iter().chain(std::iter::once(continuation)));
                let new_body = body.specialize(&inner);
                if new_body.ptr_eq(body) {
                    return self.clone();
                }
                self.rebuild(NodeKind::Expander {
                    continuation: continuation.clone(),
                    params: params.clone(),
                    body: new_body,
                })
            }

            NodeKind::Vector(items) => self.specialize_items(items, bindings, NodeKind::Vector),
            NodeKind::List(items) => self.specialize_items(items, bindings, NodeKind::List),
            NodeKind::HashMap(items) => self.specialize_items(items, bindings, NodeKind::HashMap),
            NodeKind::Set(items) => self.specialize_items(items, bindings, NodeKind::Set),

            NodeKind::InvokeInstance { .. }
            | NodeKind::InvokeStatic { .. }
            | NodeKind::Cast { .. }
            | NodeKind::InstanceOf { .. } => self.clone(),
        }
    }

    fn specialize_items(
        &self,
        items: &[Node],
        bindings: &Bindings,
        make: fn(Vec<Node>) -> NodeKind,
    ) -> Node {
        let (new_items, changed) = map_nodes(items, |n| n.specialize(bindings));
        if !changed {
            return self.clone();
        }
        self.rebuild(make(new_items))
    }

    /// Rewrite without consulting a context: fold constant collections and
    /// conditionals, drop needless sequencing, turn quotes into constants.
    pub fn optimize(&self) -> Node {
        match self.kind() {
            NodeKind::Constant(_) | NodeKind::Lookup(_) => self.clone(),

            NodeKind::Quote { form, .. } => {
                self.replace_with(Node::constant(form.clone()).with_source(self.source()))
            }

            NodeKind::Apply { function, args } => {
                let new_function = function.optimize();
                let (new_args, changed) = map_nodes(args, Node::optimize);
                if !changed && new_function.ptr_eq(function) {
                    return self.clone();
                }
                self.rebuild(NodeKind::Apply {
                    function: new_function,
                    args: new_args,
                })
            }

            NodeKind::Define { symbol, expr } => {
                let new_expr = expr.optimize();
                if new_expr.ptr_eq(expr) {
                    return self.clone();
                }
                self.rebuild(NodeKind::Define {
                    symbol: symbol.clone(),
                    expr: new_expr,
                })
            }

            NodeKind::Do(body) => {
                let optimized: Vec<Node> = body.iter().map(Node::optimize).collect();
                let last = optimized.len().saturating_sub(1);
                // constants before the last form have no effect
                let kept: Vec<Node> = optimized
                    .into_iter()
                    .enumerate()
                    .filter(|(i, node)| *i == last || !node.is_constant())
                    .map(|(_, node)| node)
                    .collect();
                match kept.len() {
                    0 => self.replace_with(Node::constant(Value::Nil)),
                    1 => self.replace_with(
                        kept.into_iter().next().unwrap_or_else(|| Node::constant(Value::Nil)),
                    ),
                    _ => self.rebuild(NodeKind::Do(kept)),
                }
            }

            NodeKind::If {
                test,
                then,
                otherwise,
            } => {
                let test = test.optimize();
                let then = then.optimize();
                let otherwise = otherwise.optimize();
                match test.constant_value() {
                    Some(value) if value.is_truthy() => self.replace_with(then),
                    Some(_) => self.replace_with(otherwise),
                    None => self.rebuild(NodeKind::If {
                        test,
                        then,
                        otherwise,
                    }),
                }
            }

            NodeKind::Let {
                bindings: pairs,
                body,
            } => {
                if pairs.is_empty() {
                    return self.replace_with(body.optimize());
                }
                self.rebuild(NodeKind::Let {
                    bindings: pairs
                        .iter()
                        .map(|(sym, expr)| (sym.clone(), expr.optimize()))
                        .collect(),
                    body: body.optimize(),
                })
            }

            NodeKind::Lambda { params, rest, body } => {
                let new_body = body.optimize();
                if new_body.ptr_eq(body) {
                    return self.clone();
                }
                self.rebuild(NodeKind::Lambda {
                    params: params.clone(),
                    rest: rest.clone(),
                    body: new_body,
                })
            }

            NodeKind::Expander {
                continuation,
                params,
                body,
            } => {
                let new_body = body.optimize();
                if new_body.ptr_eq(body) {
                    return self.clone();
                }
                self.rebuild(NodeKind::Expander {
                    continuation: continuation.clone(),
                    params: params.clone(),
                    body: new_body,
                })
            }

            NodeKind::Vector(items) => self.fold_collection(items, NodeKind::Vector, |values| {
                Some(Value::Vector(values.into_iter().collect::<Vector>()))
            }),
            NodeKind::List(items) => {
                self.fold_collection(items, NodeKind::List, |values| Some(Value::list(values)))
            }
            NodeKind::HashMap(items) => self.fold_collection(items, NodeKind::HashMap, |values| {
                super::eval::build_map(values).ok()
            }),
            NodeKind::Set(items) => self.fold_collection(items, NodeKind::Set, |values| {
                Some(Value::Set(values.into_iter().collect::<Set>()))
            }),

            NodeKind::InvokeInstance { .. }
            | NodeKind::InvokeStatic { .. }
            | NodeKind::Cast { .. }
            | NodeKind::InstanceOf { .. } => self.clone(),
        }
    }

    // Optimize elements; when every element is constant, build the value.
    fn fold_collection(
        &self,
        items: &[Node],
        make: fn(Vec<Node>) -> NodeKind,
        build: impl Fn(Vec<Value>) -> Option<Value>,
    ) -> Node {
        let (optimized, changed) = map_nodes(items, Node::optimize);
        let constants: Option<Vec<Value>> = optimized
            .iter()
            .map(|node| node.constant_value().cloned())
            .collect();
        if let Some(value) = constants.and_then(build) {
            return self.replace_with(Node::constant(value).with_source(self.source()));
        }
        if !changed {
            return self.clone();
        }
        self.rebuild(make(optimized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Symbol {
        Symbol::parse(name)
    }

    fn int(n: i64) -> Node {
        Node::constant(Value::Int(n))
    }

    #[test]
    fn test_specialize_replaces_bound_lookup() {
        let node = Node::apply(Node::lookup(sym("+")), vec![Node::lookup(sym("x")), int(1)]);
        let bindings = Bindings::unit(sym("x"), Value::Int(41));
        let specialized = node.specialize(&bindings);
        assert!(!specialized.dependencies().contains(&sym("x")));
        assert!(specialized.dependencies().contains(&sym("+")));
    }

    #[test]
    fn test_specialize_unchanged_returns_same_node() {
        let node = Node::apply(Node::lookup(sym("f")), vec![int(1)]);
        let bindings = Bindings::unit(sym("x"), Value::Int(1));
        assert!(node.specialize(&bindings).ptr_eq(&node));
    }

    #[test]
    fn test_specialize_respects_lambda_shadowing() {
        let lambda = Node::lambda(vec![sym("x")], None, Node::lookup(sym("x")));
        let bindings = Bindings::unit(sym("x"), Value::Int(1));
        assert!(lambda.specialize(&bindings).ptr_eq(&lambda));
    }

    #[test]
    fn test_specialize_keeps_included_dependencies() {
        let node = Node::apply(Node::lookup(sym("f")), vec![Node::lookup(sym("x"))])
            .include_dependency(&sym("when"));
        let bindings = Bindings::unit(sym("x"), Value::Int(1));
        let specialized = node.specialize(&bindings);
        assert!(specialized.dependencies().contains(&sym("when")));
        assert!(!specialized.dependencies().contains(&sym("x")));
    }

    #[test]
    fn test_optimize_folds_constant_vector() {
        let node = Node::vector(vec![int(1), int(2), int(3)]);
        let optimized = node.optimize();
        assert_eq!(
            optimized.constant_value(),
            Some(&Value::vector(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        );
        assert!(optimized.dependencies().is_empty());
    }

    #[test]
    fn test_optimize_keeps_non_constant_vector() {
        let node = Node::vector(vec![int(1), Node::lookup(sym("a"))]);
        assert!(!node.optimize().is_constant());
    }

    #[test]
    fn test_optimize_do() {
        assert_eq!(
            Node::sequence(vec![]).optimize().constant_value(),
            Some(&Value::Nil)
        );
        let single = Node::lookup(sym("a"));
        assert!(Node::sequence(vec![single.clone()]).optimize().ptr_eq(&single));
    }

    #[test]
    fn test_optimize_if_with_constant_test() {
        let node = Node::conditional(
            Node::constant(Value::Nil),
            Node::lookup(sym("a")),
            Node::lookup(sym("b")),
        );
        match node.optimize().kind() {
            NodeKind::Lookup(s) => assert_eq!(s, &sym("b")),
            _ => panic!("expected the else branch"),
        }
    }

    #[test]
    fn test_optimize_quote() {
        let node = Node::quote(Value::symbol("a"), false);
        assert_eq!(node.optimize().constant_value(), Some(&Value::symbol("a")));
    }
}
