use std::rc::Rc;

use vau::error::{Diagnostic, Error};
use vau::runtime::Runtime;
use vau::value::{eq_values, Value};

fn eval(runtime: &Rc<Runtime>, form: &str) -> Value {
    runtime
        .rep(form)
        .unwrap_or_else(|err| panic!("failed to eval `{}`: {}", form, err.format_error()))
}

fn eval_err(runtime: &Rc<Runtime>, form: &str) -> Error {
    match runtime.rep(form) {
        Ok(value) => panic!("expected `{}` to fail, got {}", form, value),
        Err(Diagnostic::Eval(error)) => error,
        Err(other) => panic!("expected an eval error, got {}", other.format_error()),
    }
}

fn assert_int(value: &Value, expected: i64) {
    match value {
        Value::Int(n) => assert_eq!(*n, expected),
        other => panic!("expected Int({}), got {}", expected, other),
    }
}

#[test]
fn self_evaluating_values_evaluate_to_themselves() {
    let runtime = Runtime::new();
    for value in [
        Value::Int(42),
        Value::Bool(true),
        Value::Bool(false),
        Value::Inert,
        Value::Ignore,
        Value::Char('q'),
        Value::Nil,
        Value::string("hello"),
    ] {
        let result = runtime.eval(&value).unwrap();
        assert!(
            eq_values(&result, &value) || result.to_string() == value.to_string(),
            "expected {} to self-evaluate, got {}",
            value,
            result
        );
    }
}

#[test]
fn combiners_and_environments_self_evaluate() {
    let runtime = Runtime::new();
    let combiner = eval(&runtime, "list");
    let result = runtime.eval(&combiner).unwrap();
    assert!(eq_values(&result, &combiner));
}

#[test]
fn symbol_lookup_walks_the_environment_chain() {
    let runtime = Runtime::new();
    // `+` lives in the ground environment, a parent of the user environment.
    let result = eval(&runtime, "(+ 1 2)");
    assert_int(&result, 3);
}

#[test]
fn unbound_symbol_reports_its_name() {
    let runtime = Runtime::new();
    match eval_err(&runtime, "no-such-binding") {
        Error::UnboundSymbol { name } => assert_eq!(name, "no-such-binding"),
        other => panic!("expected UnboundSymbol, got {}", other),
    }
}

#[test]
fn unbound_symbol_inside_operand_evaluation() {
    let runtime = Runtime::new();
    assert!(matches!(
        eval_err(&runtime, "(+ 1 no-such-binding)"),
        Error::UnboundSymbol { .. }
    ));
}

#[test]
fn non_combiner_in_operator_position_is_an_error() {
    let runtime = Runtime::new();
    assert!(matches!(eval_err(&runtime, "(1 2 3)"), Error::NotACombiner { .. }));
}

#[test]
fn dotted_operand_tree_on_an_applicative_is_an_error() {
    let runtime = Runtime::new();
    assert!(matches!(eval_err(&runtime, "(+ 1 . 2)"), Error::BadOperandList { .. }));
}

#[test]
fn zero_operand_combination_skips_operand_evaluation() {
    let runtime = Runtime::new();
    let result = eval(&runtime, "(list)");
    assert!(result.is_nil());
}

// Operand evaluation for applicatives runs right-to-left while the result
// list keeps left-to-right positions. Consing each noted value means the
// log ends up (1 2 3) exactly when 3 was noted first; a left-to-right
// evaluator would leave (3 2 1).
#[test]
fn applicative_effect_order_is_right_to_left_with_positional_results() {
    let runtime = Runtime::new();
    let result = eval(
        &runtime,
        "
        ($sequence
            ($define! get-current-environment (wrap ($vau () e e)))
            ($define! here (get-current-environment))
            ($define! log ())
            ($define! note
                ($lambda (x) ($sequence ($set! here log (cons x log)) x)))
            ($define! result (list (note 1) (note 2) (note 3)))
            (list log result))
        ",
    );
    assert_eq!(result.to_string(), "((1 2 3) (1 2 3))");
}

// Rebinding `big` makes the million-element list garbage; reclaiming it must
// not tear the chain down with recursive destructors.
#[test]
fn rebinding_a_large_list_reclaims_it_without_overflow() {
    let runtime = Runtime::new();
    let result = eval(
        &runtime,
        "
        ($sequence
            ($define! build
                ($lambda (n acc) ($if (=? n 0) acc (build (- n 1) (cons n acc)))))
            ($define! big (build 1000000 ()))
            ($define! big ())
            big)
        ",
    );
    assert!(result.is_nil());
}

#[test]
fn nested_combinations_evaluate_inside_out() {
    let runtime = Runtime::new();
    let result = eval(&runtime, "(+ (+ 1 2) (- 10 (+ 3 4)))");
    assert_int(&result, 6);
}

#[test]
fn eval_applicative_evaluates_in_the_given_environment() {
    let runtime = Runtime::new();
    let result = eval(
        &runtime,
        "
        ($sequence
            ($define! get-current-environment (wrap ($vau () e e)))
            ($define! $quote ($vau (x) #ignore x))
            ($define! x 9)
            (eval ($quote x) (make-environment (get-current-environment))))
        ",
    );
    assert_int(&result, 9);
}

#[test]
fn eval_applicative_rejects_a_non_environment() {
    let runtime = Runtime::new();
    assert!(matches!(
        eval_err(&runtime, "(eval 1 2)"),
        Error::ArityOrTypeMismatch { who: "eval", .. }
    ));
}
