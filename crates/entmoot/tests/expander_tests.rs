//! Expander and macro tests

use entmoot::*;

fn core() -> Context {
    initial_context().unwrap()
}

fn run(source: &str) -> Value {
    eval(&core(), source).unwrap().value
}

fn form(source: &str) -> Value {
    read_str(source).unwrap().remove(0)
}

// ═══════════════════════════════════════════════════════════════════════
// User Expanders
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_expander_returns_form() {
    let source = "
        (def twice (expander [ex [x]] (list 'do x x)))
        (twice 3)";
    assert_eq!(run(source), Value::Int(3));
}

#[test]
fn test_expander_uses_continuation() {
    let source = "
        (def first-only (expander [ex [a b]] (ex a)))
        (first-only (+ 1 2) (undefined-fn))";
    assert_eq!(run(source), Value::Int(3));
}

#[test]
fn test_expander_arity_checked() {
    let err = eval(&core(), "(def one (expander [ex [x]] x)) (one 1 2)").unwrap_err();
    assert!(matches!(err, EvalError::Arity { .. }), "{:?}", err);
}

#[test]
fn test_expander_captures_definition_scope() {
    let source = "
        (def add-x (let [x 10] (expander [ex [y]] (list '+ x y))))
        (let [x 1] (add-x 5))";
    assert_eq!(run(source), Value::Int(15));
}

#[test]
fn test_computed_definition_recognized_as_expander() {
    let source = "
        (def twice (identity (expander [ex [x]] (list 'do x x))))
        (twice 7)";
    assert_eq!(run(source), Value::Int(7));
}

#[test]
fn test_head_definition_failure_is_reported() {
    let err = eval(&core(), "(def m (undefined-thing 1)) (m 2)").unwrap_err();
    assert_eq!(
        err.unresolved_symbol(),
        Some(&Symbol::qualified(CORE_NS, "undefined-thing"))
    );
}

#[test]
fn test_expander_rest_parameter_rejected() {
    let err = eval(&core(), "(expander [ex [& xs]] xs)").unwrap_err();
    assert!(matches!(err, EvalError::Analysis { .. }), "{:?}", err);
}

#[test]
fn test_expander_called_as_function() {
    let value = run("((expander [ex [x]] (list 'inc x)) '(f 1))");
    match value {
        Value::Node(node) => assert!(matches!(node.kind(), NodeKind::Apply { .. })),
        other => panic!("expected a node, got {:?}", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Macros
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_defmacro() {
    let source = "
        (defmacro unless [test then else] (list 'if test else then))
        (unless nil 1 2)";
    assert_eq!(run(source), Value::Int(1));
}

#[test]
fn test_macro_receives_unevaluated_forms() {
    let source = "
        (defmacro quoted [x] (list 'quote x))
        (quoted (no such call))";
    assert_eq!(
        run(source),
        Value::list(vec![
            Value::symbol("no"),
            Value::symbol("such"),
            Value::symbol("call")
        ])
    );
}

#[test]
fn test_macro_use_records_dependency() {
    let context = eval(&core(), "(def a (when 1 2))").unwrap().context;
    assert!(context
        .get_dependencies(&Symbol::new("a"))
        .contains(&Symbol::new("when")));
}

#[test]
fn test_runaway_expansion_is_bounded() {
    let compiler = Compiler::new(CompilerConfig::new().with_max_expansion_depth(16));
    let err = compiler
        .eval(&core(), "(defmacro forever [] (list 'forever)) (forever)")
        .unwrap_err();
    match err {
        EvalError::Expansion { message, .. } => {
            assert!(message.contains("maximum expansion depth"))
        }
        other => panic!("expected expansion error, got {:?}", other),
    }
}

#[test]
fn test_nested_macros_within_bound() {
    let compiler = Compiler::new(CompilerConfig::new().with_max_expansion_depth(4));
    let value = compiler
        .eval(&core(), "(when 1 (when 2 (when 3 4)))")
        .unwrap()
        .value;
    assert_eq!(value, Value::Int(4));
}

// ═══════════════════════════════════════════════════════════════════════
// Expansion Results
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_constant_vector_folds() {
    let node = Compiler::default().expand(&core(), &form("[1 2 3]")).unwrap();
    assert_eq!(
        node.constant_value(),
        Some(&Value::vector(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
    );
    assert!(node.dependencies().is_empty());
}

#[test]
fn test_vector_with_lookup_does_not_fold() {
    let node = Compiler::default().expand(&core(), &form("[1 x]")).unwrap();
    assert!(!node.is_constant());
    assert!(node.dependencies().contains(&Symbol::new("x")));
}

#[test]
fn test_special_form_shadowed_by_local_definition() {
    let source = "(ns user) (def if (fn [a b c] c)) (if 1 2 3)";
    assert_eq!(run(source), Value::Int(3));
    assert_eq!(run("(ns user) (if 1 2 3)"), Value::Int(2));
}

#[test]
fn test_member_call_sugar() {
    let node = Compiler::default()
        .expand(&core(), &form("(.length s)"))
        .unwrap();
    match node.kind() {
        NodeKind::InvokeInstance { member, args, .. } => {
            assert_eq!(member.name(), "length");
            assert!(args.is_empty());
        }
        other => panic!("expected instance call, got {:?}", other),
    }
}

#[test]
fn test_expansion_error_for_bad_def() {
    let err = eval(&core(), "(def a 1 2)").unwrap_err();
    assert!(matches!(err, EvalError::Expansion { .. }));
}
