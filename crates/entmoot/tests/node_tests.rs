//! Node evaluation, specialization and optimization tests

use entmoot::*;

fn sym(name: &str) -> Symbol {
    Symbol::new(name)
}

fn int(n: i64) -> Node {
    Node::constant(Value::Int(n))
}

fn lookup(name: &str) -> Node {
    Node::lookup(sym(name))
}

fn bind(pairs: &[(&str, Value)]) -> Bindings {
    pairs
        .iter()
        .map(|(name, value)| (sym(name), value.clone()))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Dependencies
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_binding_forms_hide_their_names() {
    let lambda = Node::lambda(
        vec![sym("x")],
        Some(sym("more")),
        Node::apply(lookup("f"), vec![lookup("x"), lookup("more")]),
    );
    let deps = lambda.dependencies();
    assert!(deps.contains(&sym("f")));
    assert!(!deps.contains(&sym("x")));
    assert!(!deps.contains(&sym("more")));

    let let_node = Node::let_block(vec![(sym("y"), lookup("z"))], lookup("y"));
    assert!(let_node.dependencies().contains(&sym("z")));
    assert!(!let_node.dependencies().contains(&sym("y")));
}

#[test]
fn test_included_dependency_survives_optimization() {
    let node = Node::sequence(vec![int(1), int(2)]).include_dependency(&sym("when"));
    assert!(node.dependencies().contains(&sym("when")));
    assert!(node.optimize().dependencies().contains(&sym("when")));
}

// ═══════════════════════════════════════════════════════════════════════
// Specialization
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_specialize_substitutes_bound_lookups() {
    let node = Node::apply(lookup("f"), vec![lookup("a")]);
    let specialized = node.specialize(&bind(&[("a", Value::Int(3))]));
    match specialized.kind() {
        NodeKind::Apply { args, .. } => assert_eq!(args[0].constant_value(), Some(&Value::Int(3))),
        other => panic!("expected Apply, got {:?}", other),
    }
    assert!(!specialized.dependencies().contains(&sym("a")));
}

#[test]
fn test_specialize_leaves_qualified_lookups() {
    let node = Node::lookup(Symbol::qualified("user", "a"));
    let specialized = node.specialize(&bind(&[("a", Value::Int(1))]));
    assert!(!specialized.is_constant());
}

// ═══════════════════════════════════════════════════════════════════════
// Optimization
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_optimize_folds_constant_sets_and_maps() {
    let set = Node::set(vec![int(1), int(1)]).optimize();
    assert_eq!(set.constant_value(), Some(&Value::set(vec![Value::Int(1)])));

    let map = Node::hash_map(vec![Node::constant(Value::keyword("a")), int(1)]).optimize();
    assert_eq!(
        map.constant_value(),
        Some(&Value::map(vec![(Value::keyword("a"), Value::Int(1))]))
    );
}

#[test]
fn test_optimize_folds_constant_conditionals() {
    let node = Node::conditional(Node::constant(Value::Nil), lookup("a"), lookup("b")).optimize();
    assert!(matches!(node.kind(), NodeKind::Lookup(s) if *s == sym("b")));

    let node = Node::conditional(int(0), lookup("a"), lookup("b")).optimize();
    assert!(matches!(node.kind(), NodeKind::Lookup(s) if *s == sym("a")));
}

#[test]
fn test_optimize_drops_constant_statements() {
    let node = Node::sequence(vec![int(1), lookup("a"), int(2), lookup("b")]).optimize();
    match node.kind() {
        NodeKind::Do(body) => assert_eq!(body.len(), 2),
        other => panic!("expected Do, got {:?}", other),
    }
    assert_eq!(Node::sequence(vec![]).optimize().constant_value(), Some(&Value::Nil));
}

#[test]
fn test_optimize_quote_becomes_constant() {
    let form = Value::list(vec![Value::symbol("a")]);
    let node = Node::quote(form.clone(), false).optimize();
    assert_eq!(node.constant_value(), Some(&form));
}

#[test]
fn test_optimize_unchanged_returns_same_node() {
    let node = Node::apply(lookup("f"), vec![lookup("a")]);
    assert!(node.optimize().ptr_eq(&node));
}

// ═══════════════════════════════════════════════════════════════════════
// Evaluation
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_define_returns_new_context() {
    let context = bootstrap().unwrap();
    let node = Node::define(sym("a"), int(1));
    let result = node.eval(&context, &Bindings::new()).unwrap();
    assert_eq!(result.value, Value::Nil);
    assert!(context.get_slot(&sym("a")).is_none());
    assert_eq!(result.context.get_value(&sym("a")).unwrap(), Value::Int(1));
}

#[test]
fn test_conditional_evaluates_one_branch() {
    let node = Node::conditional(
        Node::constant(Value::Nil),
        Node::define(sym("a"), int(1)),
        Node::define(sym("b"), int(2)),
    );
    let result = node.eval(&bootstrap().unwrap(), &Bindings::new()).unwrap();
    assert!(result.context.get_slot(&sym("a")).is_none());
    assert!(result.context.get_slot(&sym("b")).is_some());
}

#[test]
fn test_lambda_closes_over_bindings() {
    let lambda = Node::lambda(
        vec![sym("x")],
        None,
        Node::apply(lookup("+"), vec![lookup("x"), lookup("n")]),
    );
    let function = lambda
        .compute(&bootstrap().unwrap(), &bind(&[("n", Value::Int(10))]))
        .unwrap();
    let value = apply(&function, vec![Value::Int(5)], &bootstrap().unwrap()).unwrap();
    assert_eq!(value, Value::Int(15));
}

#[test]
fn test_lookup_of_missing_symbol() {
    let err = lookup("nope").compute(&bootstrap().unwrap(), &Bindings::new()).unwrap_err();
    assert_eq!(err.unresolved_symbol(), Some(&Symbol::qualified(CORE_NS, "nope")));
}

#[test]
fn test_hash_map_node() {
    let node = Node::hash_map(vec![Node::constant(Value::keyword("a")), lookup("x")]);
    let value = node
        .compute(&bootstrap().unwrap(), &bind(&[("x", Value::Int(1))]))
        .unwrap();
    assert_eq!(value, Value::map(vec![(Value::keyword("a"), Value::Int(1))]));
}
