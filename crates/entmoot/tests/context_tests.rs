//! Context and slot tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use entmoot::*;
use pretty_assertions::assert_eq;

fn sym(name: &str) -> Symbol {
    Symbol::parse(name)
}

fn core_sym(name: &str) -> Symbol {
    Symbol::qualified(CORE_NS, name)
}

fn compile(context: &Context, source: &str) -> Context {
    eval(context, source).unwrap().context
}

// Defines a zero-argument `tick` that counts its calls.
fn with_counter(context: &Context) -> (Context, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let tick = BuiltinFn::new("tick", 0, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Int(42))
    });
    let context = context.define(&core_sym("tick"), Node::constant(Value::from(tick)));
    (context, calls)
}

// ═══════════════════════════════════════════════════════════════════════
// Immutability
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_define_leaves_original_untouched() {
    let base = bootstrap().unwrap();
    let before = base.symbols();
    let extended = compile(&base, "(def a 1)");

    assert_eq!(base.symbols(), before);
    assert!(base.get_slot(&sym("a")).is_none());
    assert_eq!(extended.get_value(&sym("a")).unwrap(), Value::Int(1));
}

#[test]
fn test_branches_are_independent() {
    let base = compile(&bootstrap().unwrap(), "(def a 1) (defn f [] a)");
    let left = compile(&base, "(def a 10)");
    let right = compile(&base, "(def a 20)");

    assert_eq!(eval(&left, "(f)").unwrap().value, Value::Int(10));
    assert_eq!(eval(&right, "(f)").unwrap().value, Value::Int(20));
    assert_eq!(eval(&base, "(f)").unwrap().value, Value::Int(1));
}

// ═══════════════════════════════════════════════════════════════════════
// Laziness
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_forward_reference_is_lazy() {
    let context = compile(&bootstrap().unwrap(), "(def g (h 1))");
    assert!(context.get_slot(&sym("g")).is_some());

    let err = context.get_value(&sym("g")).unwrap_err();
    assert_eq!(err.unresolved_symbol(), Some(&core_sym("h")));
}

#[test]
fn test_forward_reference_resolves_after_definition() {
    let context = compile(&bootstrap().unwrap(), "(def g (h 1)) (defn h [x] (+ x 1))");
    assert_eq!(context.get_value(&sym("g")).unwrap(), Value::Int(2));
}

#[test]
fn test_slot_computed_at_most_once() {
    let (context, calls) = with_counter(&bootstrap().unwrap());
    let context = compile(&context, "(def v (tick))");
    let slot = context.get_slot(&sym("v")).unwrap();
    assert!(!slot.is_computed());

    assert_eq!(context.get_value(&sym("v")).unwrap(), Value::Int(42));
    assert_eq!(context.get_value(&sym("v")).unwrap(), Value::Int(42));
    assert!(slot.is_computed());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_forcing_computes_once() {
    let (context, calls) = with_counter(&bootstrap().unwrap());
    let context = compile(&context, "(def v (tick))");

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| context.get_value(&sym("v")).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Value::Int(42));
        }
    });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_self_reference_is_cyclic() {
    let context = compile(&bootstrap().unwrap(), "(def a (+ a 1))");
    let err = context.get_value(&sym("a")).unwrap_err();
    assert!(
        matches!(err, EvalError::CyclicDependency { .. }),
        "expected cyclic dependency, got {:?}",
        err
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Dependency Tracking
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_redefinition_invalidates_dependents() {
    let context = compile(&bootstrap().unwrap(), "(def a 1) (defn f [] a) (def g (f))");
    assert_eq!(context.get_value(&sym("g")).unwrap(), Value::Int(1));

    let context = compile(&context, "(def a 2)");
    assert_eq!(context.get_value(&sym("g")).unwrap(), Value::Int(2));

    let dependents = context.calc_dependents(&sym("a"));
    assert!(dependents.contains(&core_sym("f")));
    assert!(dependents.contains(&core_sym("g")));
}

#[test]
fn test_unrelated_slots_keep_their_values() {
    let (context, calls) = with_counter(&bootstrap().unwrap());
    let context = compile(&context, "(def a 1) (def v (tick))");
    context.get_value(&sym("v")).unwrap();

    let context = compile(&context, "(def a 2)");
    context.get_value(&sym("v")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_invalidated_slot_recomputes() {
    let (context, calls) = with_counter(&bootstrap().unwrap());
    let context = compile(&context, "(def a 1) (def v (do a (tick)))");
    context.get_value(&sym("v")).unwrap();

    let context = compile(&context, "(def a 2)");
    assert!(!context.get_slot(&sym("v")).unwrap().is_computed());
    context.get_value(&sym("v")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_direct_dependencies() {
    let context = compile(&bootstrap().unwrap(), "(def b (+ a 1))");
    let deps = context.get_dependencies(&sym("b"));
    assert!(deps.contains(&sym("a")));
    assert!(deps.contains(&sym("+")));
    assert!(deps.contains(&core_sym("a")));

    assert!(context.get_dependents(&sym("a")).contains(&core_sym("b")));
    assert!(context.get_dependents(&core_sym("a")).contains(&core_sym("b")));
}

#[test]
fn test_redefinition_drops_stale_edges() {
    let context = compile(&bootstrap().unwrap(), "(def b a) (def b 1)");
    assert!(context.get_dependents(&sym("a")).is_empty());
    assert!(context.get_dependencies(&sym("b")).is_empty());
}

#[test]
fn test_dependents_across_namespaces() {
    let context = compile(&bootstrap().unwrap(), "(ns user) (def a 1) (def b a)");
    assert!(context
        .calc_dependents(&sym("a"))
        .contains(&Symbol::qualified("user", "b")));

    let context = compile(&context, "(def a 5)");
    assert_eq!(context.get_value(&sym("b")).unwrap(), Value::Int(5));
}

// ═══════════════════════════════════════════════════════════════════════
// Introspection
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_get_node_is_unevaluated() {
    let context = compile(&bootstrap().unwrap(), "(def b (+ 1 2))");
    let node = context.get_node(&sym("b")).unwrap();
    assert!(matches!(node.kind(), NodeKind::Apply { .. }));
}

#[test]
fn test_symbols_are_sorted_and_qualified() {
    let context = compile(&bootstrap().unwrap(), "(def zz 1) (def aa 2)");
    let symbols = context.symbols();
    let mut sorted = symbols.clone();
    sorted.sort();
    assert_eq!(symbols, sorted);
    assert!(symbols.contains(&core_sym("aa")));
    assert!(symbols.iter().all(Symbol::is_qualified));
}

#[test]
fn test_slot_survives_dropped_owner() {
    let (extended, slot) = {
        let owner = compile(&bootstrap().unwrap(), "(def a 1) (def b (+ a 1))");
        let extended = compile(&owner, "(def c 3)");
        (extended, owner.get_slot(&sym("b")).unwrap())
    };
    assert!(slot.value().is_err());
    assert!(Arc::ptr_eq(&slot, &extended.get_slot(&sym("b")).unwrap()));
    assert_eq!(extended.get_value(&sym("b")).unwrap(), Value::Int(2));
    assert!(slot.is_computed());
}

// ═══════════════════════════════════════════════════════════════════════
// Namespaces
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_invalidated_slot_keeps_its_namespace() {
    let context = compile(&bootstrap().unwrap(), "(ns foo) (def a 1) (def b a)");
    assert_eq!(context.get_value(&sym("foo/b")).unwrap(), Value::Int(1));

    let context = compile(&context, "(ns bar) (def foo/a 2)");
    assert_eq!(context.namespace(), "bar");
    assert!(!context.get_slot(&sym("foo/b")).unwrap().is_computed());
    assert_eq!(context.get_value(&sym("foo/b")).unwrap(), Value::Int(2));
}

#[test]
fn test_redefinition_from_other_namespace_in_one_unit() {
    let source = "(ns foo) (def a 1) (def b a) b (ns bar) (def foo/a 2) foo/b";
    assert_eq!(eval(&bootstrap().unwrap(), source).unwrap().value, Value::Int(2));
}

#[test]
fn test_invalidated_function_resolves_in_its_namespace() {
    let context = compile(
        &bootstrap().unwrap(),
        "(ns foo) (def a 1) (defn f [] a) (def g (f)) (ns bar) (def a 100) (def foo/a 2)",
    );
    assert_eq!(context.get_value(&sym("foo/g")).unwrap(), Value::Int(2));
}
