mod common;

use std::collections::BTreeMap;

use opspec::expr::eval::{evaluate, EvalContext};
use opspec::expr::parse_expression;
use opspec::reflect::{ObjectRef, Reflection, Value};
use opspec::OpSpecError;

fn eval_with(
    expr_src: &str,
    bindings: &BTreeMap<String, Value>,
    reflection: Option<&dyn Reflection>,
) -> Result<Value, OpSpecError> {
    let expr = parse_expression(expr_src).unwrap();
    let ctx = EvalContext {
        bindings,
        reflection,
    };
    evaluate(&expr, &ctx)
}

fn eval(expr_src: &str) -> Result<Value, OpSpecError> {
    eval_with(expr_src, &BTreeMap::new(), None)
}

fn bindings(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

#[test]
fn evaluates_arithmetic_precedence() {
    assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Long(7));
    assert_eq!(eval("(1 + 2) * 3").unwrap(), Value::Long(9));
    assert_eq!(eval("7 / 2").unwrap(), Value::Long(3));
    assert_eq!(eval("7.0 / 2").unwrap(), Value::Double(3.5));
}

#[test]
fn evaluates_parentheses_and_unary() {
    assert_eq!(eval("-(1 + 2)").unwrap(), Value::Long(-3));
    assert_eq!(eval("!false").unwrap(), Value::Boolean(true));
}

#[test]
fn evaluates_boolean_logic_precedence() {
    assert_eq!(eval("true || false && false").unwrap(), Value::Boolean(true));
    assert_eq!(eval("1 < 2 == true").unwrap(), Value::Boolean(true));
}

#[test]
fn short_circuit_skips_failing_operands() {
    let env = bindings(&[("s", Value::Null)]);
    assert_eq!(
        eval_with("s == null || s.length() > 0", &env, None).unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(
        eval_with("s != null && s.length() > 0", &env, None).unwrap(),
        Value::Boolean(false)
    );
    assert!(matches!(
        eval_with("s.length() > 0", &env, None),
        Err(OpSpecError::Evaluation(_))
    ));
}

#[test]
fn integer_division_by_zero_is_an_error() {
    assert!(matches!(eval("1 / 0"), Err(OpSpecError::Evaluation(_))));
    assert!(matches!(eval("5 % 0"), Err(OpSpecError::Evaluation(_))));
}

#[test]
fn numeric_equality_ignores_width() {
    let env = bindings(&[("b", Value::Byte(3)), ("l", Value::Long(3))]);
    assert_eq!(eval_with("b == l", &env, None).unwrap(), Value::Boolean(true));
    assert_eq!(eval_with("b == 3.0", &env, None).unwrap(), Value::Boolean(true));
}

#[test]
fn string_methods_and_math_helpers() {
    let env = bindings(&[("s", Value::from("Hello"))]);
    assert_eq!(
        eval_with("s.startsWith(\"He\") && s.length() == 5", &env, None).unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(
        eval_with("s.equalsIgnoreCase(\"hello\")", &env, None).unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(eval("Math.max(2, Math.abs(-9))").unwrap(), Value::Long(9));
}

#[test]
fn object_fields_and_methods_resolve_through_reflection() {
    let cp = common::classpath();
    let conn = ObjectRef::with_fields(
        "net.Connection",
        [("open", Value::Boolean(true)), ("last", Value::Int(4))],
    );
    let env = bindings(&[("c", Value::Object(conn))]);

    assert_eq!(eval_with("c.open", &env, None).unwrap(), Value::Boolean(true));
    assert_eq!(
        eval_with("c.lastSent() * 2", &env, Some(&cp)).unwrap(),
        Value::Long(8)
    );
    assert!(matches!(
        eval_with("c.lastSent()", &env, None),
        Err(OpSpecError::Evaluation(_))
    ));
}

#[test]
fn referenced_identifiers_exclude_members() {
    let expr = parse_expression("a.size() > b && Math.abs(c) == d.length").unwrap();
    let names: Vec<String> = expr.referenced_identifiers().into_iter().collect();
    assert_eq!(names, vec!["a", "b", "c", "d"]);
}

#[test]
fn rejects_malformed_expressions() {
    for src in ["1 +", "(a", "a b", "'ab'"] {
        assert!(
            matches!(parse_expression(src), Err(OpSpecError::Expression(_))),
            "{src}"
        );
    }
}

#[test]
fn string_length_and_char_at_agree_on_supplementary_characters() {
    let env = bindings(&[("s", Value::from("a\u{1F600}b"))]);
    assert_eq!(eval_with("s.length()", &env, None).unwrap(), Value::Int(4));
    assert_eq!(eval_with("s.charAt(3)", &env, None).unwrap(), Value::Char('b'));
    assert!(matches!(
        eval_with("s.charAt(4)", &env, None),
        Err(OpSpecError::Evaluation(_))
    ));
}

#[test]
fn reflective_calls_pick_the_overload_accepting_the_arguments() {
    let cp = common::classpath();
    let env = bindings(&[
        ("g", Value::Object(ObjectRef::new("p.Gadget"))),
        ("s", Value::from("hi")),
        ("i", Value::Int(2)),
    ]);
    assert_eq!(
        eval_with("g.label(s)", &env, Some(&cp)).unwrap(),
        Value::from("text")
    );
    assert_eq!(
        eval_with("g.label(i)", &env, Some(&cp)).unwrap(),
        Value::from("number")
    );
    assert_eq!(
        eval_with("g.label(7)", &env, Some(&cp)).unwrap(),
        Value::from("number")
    );
}

#[test]
fn panicking_method_bodies_become_evaluation_errors() {
    let cp = common::classpath();
    let env = bindings(&[("g", Value::Object(ObjectRef::new("p.Gadget")))]);
    match eval_with("g.fragile()", &env, Some(&cp)) {
        Err(OpSpecError::Evaluation(message)) => {
            assert!(message.contains("fragile body"), "{message}")
        }
        other => panic!("unexpected result {other:?}"),
    }
}
