use std::rc::Rc;

use crate::combiner::{as_combiner, Combiner};
use crate::cont::ContFlags;
use crate::env::Environment;
use crate::error::Error;
use crate::interner;
use crate::lists::{encycle, list_metrics, reverse_copy};
use crate::machine::Machine;
use crate::value::Value;

//===----------------------------------------------------------------------===//
// eval
//
// Dispatch on expression shape: symbols are looked up, pairs start a
// combination, everything else is self-evaluating. `eval` is itself an
// operative so "calling eval" and "resuming a continuation" go through the
// same register protocol.
//===----------------------------------------------------------------------===//

/// The `eval` operative every machine schedules through `tail_eval`.
pub fn eval_combiner() -> Rc<Combiner> {
    Combiner::operative(op_eval, vec![], Some(interner::intern_sym("eval")))
}

fn op_eval(
    machine: &mut Machine,
    _captured: &[Value],
    expr: Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    match expr {
        Value::Symbol(sym) => {
            let value = env.lookup(sym)?;
            machine.resume(value);
            Ok(())
        }
        Value::Pair(p) => {
            let operands = p.cdr();
            machine.push_cont(
                resume_combine,
                vec![operands, Value::Env(env.clone())],
                ContFlags::default(),
                "eval-operator",
            );
            machine.tail_eval(p.car(), env.clone());
            Ok(())
        }
        self_evaluating => {
            machine.resume(self_evaluating);
            Ok(())
        }
    }
}

/// Receives the evaluated operator and hands off to the combination
/// protocol with the still-unevaluated operand tree.
fn resume_combine(
    machine: &mut Machine,
    captured: &[Value],
    combiner: Value,
) -> Result<(), Error> {
    let operands = captured[0].clone();
    let env = captured_env(captured, 1);
    combine(machine, combiner, operands, env)
}

//===----------------------------------------------------------------------===//
// Combination protocol
//===----------------------------------------------------------------------===//

/// Apply combiner `C` to operand tree `T` in dynamic environment `D`.
///
/// Operatives receive `T` untouched. Applicatives evaluate every element of
/// `T` (which must be a list, possibly cyclic) and combine the underlying
/// combiner with a structurally isomorphic list of the results: the result
/// list keeps the original left-to-right positions, while side effects of
/// the evaluations are observed right-to-left. That ordering is a contract,
/// not an accident (see the operand-order tests).
pub fn combine(
    machine: &mut Machine,
    combiner: Value,
    operands: Value,
    env: Rc<Environment>,
) -> Result<(), Error> {
    let mut comb = as_combiner(&combiner)?;
    loop {
        let underlying = match &*comb {
            Combiner::Operative { .. } => {
                machine.tail_call(comb, operands, env);
                return Ok(());
            }
            Combiner::Applicative { underlying } => underlying.clone(),
        };

        let metrics = list_metrics(&operands);
        if !metrics.is_list() {
            return Err(Error::BadOperandList {
                reason: format!("applicative combination requires a list, got {}", operands),
            });
        }
        if metrics.elements() == 0 {
            // Nothing to evaluate at any wrapping layer, so peel the chain
            // right here instead of re-entering per layer; wrap chains are
            // user-constructible and may be arbitrarily deep.
            comb = underlying;
            continue;
        }

        // Reverse-copy the operand list so walking the copy front to back
        // evaluates the original back to front; consing each result restores
        // the original element order. The copy is acyclic; the input's cycle
        // shape is re-established on the result.
        let reversed = reverse_copy(&operands, metrics.elements());
        let (first, rest) = match &reversed {
            Value::Pair(p) => (p.car(), p.cdr()),
            _ => unreachable!("reverse_copy of a non-empty list yields a pair"),
        };
        machine.push_cont(
            resume_operands,
            vec![
                rest,
                Value::Nil,
                Value::Env(env.clone()),
                Value::Combiner(underlying),
                Value::Int(metrics.acyclic as i64),
                Value::Int(metrics.cycle as i64),
            ],
            ContFlags::default(),
            "eval-operands",
        );
        machine.tail_eval(first, env);
        return Ok(());
    }
}

/// One evaluated operand arrives; cons it on and schedule the next, or
/// re-encycle the finished list and combine the underlying combiner.
fn resume_operands(
    machine: &mut Machine,
    captured: &[Value],
    value: Value,
) -> Result<(), Error> {
    let remaining = captured[0].clone();
    let acc = Value::cons(value, captured[1].clone());
    let env = captured_env(captured, 2);
    match remaining {
        Value::Nil => {
            let (acyclic, cycle) = (captured_count(captured, 4), captured_count(captured, 5));
            encycle(&acc, acyclic, cycle);
            combine(machine, captured[3].clone(), acc, env)
        }
        Value::Pair(p) => {
            machine.push_cont(
                resume_operands,
                vec![
                    p.cdr(),
                    acc,
                    captured[2].clone(),
                    captured[3].clone(),
                    captured[4].clone(),
                    captured[5].clone(),
                ],
                ContFlags::default(),
                "eval-operands",
            );
            machine.tail_eval(p.car(), env);
            Ok(())
        }
        _ => unreachable!("operand walk runs over a fresh proper list"),
    }
}

//===----------------------------------------------------------------------===//
// Captured-value accessors
//
// Continuations capture plain Values; these decode the slots our own resume
// functions stored. A mismatch is a core bug, not a user error.
//===----------------------------------------------------------------------===//

pub fn captured_env(captured: &[Value], index: usize) -> Rc<Environment> {
    match &captured[index] {
        Value::Env(env) => env.clone(),
        other => unreachable!("captured slot {} is not an environment: {}", index, other),
    }
}

pub fn captured_count(captured: &[Value], index: usize) -> usize {
    match &captured[index] {
        Value::Int(n) => *n as usize,
        other => unreachable!("captured slot {} is not a count: {}", index, other),
    }
}
