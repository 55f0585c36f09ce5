use std::rc::Rc;

use vau::error::Error;
use vau::lists::{encycle, list_metrics, ListMetrics};
use vau::runtime::Runtime;
use vau::value::Value;

fn eval(runtime: &Rc<Runtime>, form: &str) -> Value {
    runtime
        .rep(form)
        .unwrap_or_else(|err| panic!("failed to eval `{}`: {}", form, err.format_error()))
}

/// A fresh mutable list whose last `cycle` pairs loop back on themselves.
fn cyclic_list(items: Vec<Value>, acyclic: usize, cycle: usize) -> Value {
    let list = Value::list_from_vec(items);
    encycle(&list, acyclic, cycle);
    list
}

#[test]
fn applicatives_accept_cyclic_operand_lists() {
    let runtime = Runtime::new();
    let list_comb = eval(&runtime, "list");

    let operands = cyclic_list(vec![Value::Int(1), Value::Int(2)], 0, 2);
    let result = runtime.apply(&list_comb, &operands).unwrap();

    // Same shape as the input, freshly evaluated elements.
    assert_eq!(
        list_metrics(&result),
        ListMetrics { acyclic: 0, cycle: 2, nil_terminated: false }
    );
    assert_eq!(result.to_string(), "#0=(1 2 . #0#)");
}

#[test]
fn partial_cycles_keep_their_prefix_and_cycle_lengths() {
    let runtime = Runtime::new();
    let list_comb = eval(&runtime, "list");

    let operands = cyclic_list(
        vec![Value::Int(10), Value::Int(20), Value::Int(30), Value::Int(40)],
        2,
        2,
    );
    let result = runtime.apply(&list_comb, &operands).unwrap();

    assert_eq!(
        list_metrics(&result),
        ListMetrics { acyclic: 2, cycle: 2, nil_terminated: false }
    );
    assert_eq!(result.to_string(), "(10 20 . #0=(30 40 . #0#))");
}

#[test]
fn each_cycle_position_is_evaluated_exactly_once() {
    let runtime = Runtime::new();
    eval(
        &runtime,
        "
        ($sequence
            ($define! get-current-environment (wrap ($vau () e e)))
            ($define! here (get-current-environment))
            ($define! hits 0)
            ($define! tick
                ($lambda () ($sequence ($set! here hits (+ hits 1)) hits))))
        ",
    );
    let list_comb = eval(&runtime, "list");

    // ((tick) (tick)) closed into a pure 2-cycle: two element positions,
    // so exactly two invocations even though the chain is endless.
    let call = Value::list_from_vec(vec![eval(&runtime, "tick")]);
    let operands = cyclic_list(vec![call.clone(), call], 0, 2);
    let result = runtime.apply(&list_comb, &operands).unwrap();

    assert_eq!(list_metrics(&result).elements(), 2);
    let hits = eval(&runtime, "hits");
    assert_eq!(hits.to_string(), "2");
}

#[test]
fn cyclic_results_print_with_shared_labels() {
    let runtime = Runtime::new();
    let list_comb = eval(&runtime, "list");

    let operands = cyclic_list(vec![Value::Int(7)], 0, 1);
    let result = runtime.apply(&list_comb, &operands).unwrap();
    assert_eq!(result.to_string(), "#0=(7 . #0#)");
}

#[test]
fn operatives_receive_cyclic_trees_untouched() {
    let runtime = Runtime::new();
    let opq = eval(&runtime, "($vau tree #ignore tree)");

    let operands = cyclic_list(vec![Value::Int(1), Value::Int(2)], 0, 2);
    let result = runtime.apply(&opq, &operands).unwrap();

    // The operand tree flows through unevaluated and uncopied.
    match (&operands, &result) {
        (Value::Pair(a), Value::Pair(b)) => assert!(Rc::ptr_eq(a, b)),
        _ => panic!("expected the original pair back, got {}", result),
    }
}

#[test]
fn cyclic_combinations_evaluate_through_the_reader_entry_point() {
    let runtime = Runtime::new();

    // (list 1 2 ...) with the operand chain looped: built by hand, since the
    // reader has no cycle syntax.
    let operands = cyclic_list(vec![Value::Int(1), Value::Int(2)], 0, 2);
    let combination = Value::cons(Value::symbol("list"), operands);
    let result = runtime.eval(&combination).unwrap();
    assert_eq!(
        list_metrics(&result),
        ListMetrics { acyclic: 0, cycle: 2, nil_terminated: false }
    );
}

#[test]
fn cyclic_parameter_trees_are_rejected() {
    let runtime = Runtime::new();
    let vau = eval(&runtime, "$vau");

    let ptree = cyclic_list(
        vec![Value::symbol("a"), Value::symbol("b")],
        0,
        2,
    );
    let operands = Value::list_from_vec(vec![ptree, Value::Ignore, Value::symbol("a")]);
    match runtime.apply(&vau, &operands) {
        Err(Error::PatternError { .. }) => {}
        Err(other) => panic!("expected a pattern error, got {}", other),
        Ok(value) => panic!("expected a pattern error, got {}", value),
    }
}

#[test]
fn let_rejects_cyclic_binding_lists() {
    let runtime = Runtime::new();
    let let_op = eval(&runtime, "$let");

    // (($let ((x 1) (x 1) ...)) x) with the bindings chain looped onto
    // itself: the walk has to stop instead of collecting forever.
    let binding = Value::list_from_vec(vec![Value::symbol("x"), Value::Int(1)]);
    let bindings = cyclic_list(vec![binding], 0, 1);
    let operands = Value::list_from_vec(vec![bindings, Value::symbol("x")]);
    match runtime.apply(&let_op, &operands) {
        Err(Error::ArityOrTypeMismatch { who: "$let", .. }) => {}
        Err(other) => panic!("expected an arity/type error, got {}", other),
        Ok(value) => panic!("expected an arity/type error, got {}", value),
    }
}

#[test]
fn partially_cyclic_trees_flow_through_compound_operatives() {
    let runtime = Runtime::new();
    let opq = eval(&runtime, "($vau tree #ignore tree)");

    // The echoed operand tree keeps its prefix/cycle shape after flowing
    // through ptree matching and the compound body.
    let operands = cyclic_list(
        vec![Value::symbol("x"), Value::symbol("y"), Value::symbol("z")],
        1,
        2,
    );
    let result = runtime.apply(&opq, &operands).unwrap();
    assert_eq!(
        list_metrics(&result),
        ListMetrics { acyclic: 1, cycle: 2, nil_terminated: false }
    );
}
