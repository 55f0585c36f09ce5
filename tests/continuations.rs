use std::rc::Rc;

use vau::error::{Diagnostic, Error};
use vau::runtime::Runtime;
use vau::value::Value;

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

//===----------------------------------------------------------------------===//
// call/cc
//===----------------------------------------------------------------------===//

#[test]
fn call_cc_returns_normally_when_the_continuation_is_unused() {
    let runtime = Runtime::new();
    assert_int(&eval(&runtime, "(call/cc ($lambda (k) 5))"), 5);
}

#[test]
fn invoking_the_continuation_resumes_the_pending_computation() {
    let runtime = Runtime::new();
    assert_int(&eval(&runtime, "(+ 1 (call/cc ($lambda (k) (k 41))))"), 42);
}

#[test]
fn invoking_the_continuation_abandons_work_inside_the_receiver() {
    let runtime = Runtime::new();
    // The (+ 100 _) around the invocation never completes.
    assert_int(
        &eval(&runtime, "(+ 1 (call/cc ($lambda (k) (+ 100 (k 41)))))"),
        42,
    );
}

#[test]
fn continuations_may_be_reentered_after_the_call_returns() {
    let runtime = Runtime::new();
    let result = eval(
        &runtime,
        "
        ($sequence
            ($define! get-current-environment (wrap ($vau () e e)))
            ($define! here (get-current-environment))
            ($define! count 0)
            ($define! k #inert)
            ($define! r (+ 1 (call/cc
                ($lambda (c) ($sequence ($set! here k c) 1)))))
            ($set! here count (+ count 1))
            ($if (=? count 1)
                 (k 41)
                 (list r count)))
        ",
    );
    // Second pass through the suffix: r rebound to 42, count bumped to 2.
    assert_eq!(result.to_string(), "(42 2)");
}

#[test]
fn a_saved_continuation_outlives_its_run() {
    let runtime = Runtime::new();
    eval(
        &runtime,
        "
        ($sequence
            ($define! get-current-environment (wrap ($vau () e e)))
            ($define! here (get-current-environment))
            ($define! k #inert)
            (+ 1 (call/cc ($lambda (c) ($sequence ($set! here k c) 0)))))
        ",
    );
    // Re-entering from a later evaluation replays the (+ 1 _) suffix.
    assert_int(&eval(&runtime, "(k 41)"), 42);
    assert_int(&eval(&runtime, "(k 1)"), 2);
}

#[test]
fn call_cc_requires_exactly_one_operand() {
    let runtime = Runtime::new();
    assert!(matches!(
        eval_err(&runtime, "(call/cc)"),
        Error::ArityOrTypeMismatch { who: "call/cc", .. }
    ));
}

//===----------------------------------------------------------------------===//
// $let/cc and apply-continuation
//===----------------------------------------------------------------------===//

#[test]
fn let_cc_escape_discards_the_surrounding_expression() {
    let runtime = Runtime::new();
    assert_int(
        &eval(&runtime, "($let/cc k (+ 1 (apply-continuation k 41)))"),
        41,
    );
}

#[test]
fn let_cc_falls_through_when_the_continuation_is_unused() {
    let runtime = Runtime::new();
    assert_int(&eval(&runtime, "($let/cc k 1 2 3)"), 3);
    assert_int(&eval(&runtime, "($let/cc #ignore 7)"), 7);
}

#[test]
fn escape_skips_effects_after_the_invocation() {
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
            ($define! r ($let/cc out
                ($sequence (note 1) (apply-continuation out 9) (note 2))))
            (list r log))
        ",
    );
    assert_eq!(result.to_string(), "(9 (1))");
}

#[test]
fn apply_continuation_requires_a_continuation() {
    let runtime = Runtime::new();
    assert!(matches!(
        eval_err(&runtime, "(apply-continuation 1 2)"),
        Error::ArityOrTypeMismatch { who: "apply-continuation", .. }
    ));
}

#[test]
fn continuation_to_applicative_builds_a_callable() {
    let runtime = Runtime::new();
    assert_int(
        &eval(
            &runtime,
            "(+ 1 ($let/cc k ((continuation->applicative k) 41)))",
        ),
        42,
    );
}

//===----------------------------------------------------------------------===//
// Boolean-context capture
//===----------------------------------------------------------------------===//

// A continuation captured in the test position of `$if` must reject
// non-boolean values on re-entry, whether or not its own check frame was
// merged with the enclosing one.

#[test]
fn captured_test_continuation_still_checks_booleans() {
    let runtime = Runtime::new();
    let result = eval(
        &runtime,
        "
        ($sequence
            ($define! get-current-environment (wrap ($vau () e e)))
            ($define! here (get-current-environment))
            ($define! k #inert)
            ($if ($and? (call/cc ($lambda (c) ($sequence ($set! here k c) #f))))
                 1
                 2))
        ",
    );
    assert_int(&result, 2);
    assert!(matches!(
        eval_err(&runtime, "(k 5)"),
        Error::NonBooleanTest { .. }
    ));
    assert_int(&eval(&runtime, "(k #t)"), 1);
}

#[test]
fn captured_operand_continuation_checks_booleans_outside_a_test() {
    let runtime = Runtime::new();
    let result = eval(
        &runtime,
        "
        ($sequence
            ($define! get-current-environment (wrap ($vau () e e)))
            ($define! here (get-current-environment))
            ($define! k #inert)
            ($define! r
                ($and? (call/cc ($lambda (c) ($sequence ($set! here k c) #f)))))
            r)
        ",
    );
    assert!(matches!(result, Value::Bool(false)));
    assert!(matches!(
        eval_err(&runtime, "(k 5)"),
        Error::NonBooleanTest { .. }
    ));
    assert!(matches!(eval(&runtime, "(k #t)"), Value::Bool(true)));
}

//===----------------------------------------------------------------------===//
// Tail calls
//===----------------------------------------------------------------------===//

#[test]
fn deep_tail_recursion_runs_in_constant_stack() {
    let runtime = Runtime::new();
    let result = eval(
        &runtime,
        "
        ($sequence
            ($define! countdown
                ($lambda (n) ($if (=? n 0) 0 (countdown (- n 1)))))
            (countdown 1000000))
        ",
    );
    assert_int(&result, 0);
}

#[test]
fn mutual_tail_calls_do_not_grow_the_stack() {
    let runtime = Runtime::new();
    let result = eval(
        &runtime,
        "
        ($sequence
            ($define! even? ($lambda (n) ($if (=? n 0) #t (odd? (- n 1)))))
            ($define! odd? ($lambda (n) ($if (=? n 0) #f (even? (- n 1)))))
            (even? 100001))
        ",
    );
    assert!(matches!(result, Value::Bool(false)));
}
