use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::combiner::{as_combiner, Combiner};
use crate::cont::ContFlags;
use crate::env::Environment;
use crate::error::Error;
use crate::eval::{captured_env, combine};
use crate::interner::{self, SymId};
use crate::list;
use crate::lists::{copy_es_immutable, exact_operands, list_metrics, split_operands};
use crate::machine::Machine;
use crate::value::{Pair, Value};

//===----------------------------------------------------------------------===//
// Sequencing
//===----------------------------------------------------------------------===//

/// Evaluates a list of expressions for effect, except the last, which runs
/// in tail position against the caller's continuation. The empty sequence
/// yields `#inert`. A cyclic sequence loops forever, as the language allows.
pub fn tail_sequence(
    machine: &mut Machine,
    body: Value,
    env: Rc<Environment>,
) -> Result<(), Error> {
    match body {
        Value::Nil => {
            machine.resume(Value::Inert);
            Ok(())
        }
        Value::Pair(p) => {
            let rest = p.cdr();
            if rest.is_nil() {
                machine.tail_eval(p.car(), env);
            } else {
                machine.push_cont(
                    resume_sequence,
                    vec![rest, Value::Env(env.clone())],
                    ContFlags::default(),
                    "sequence",
                );
                machine.tail_eval(p.car(), env);
            }
            Ok(())
        }
        other => Err(Error::BadOperandList {
            reason: format!("expression sequence must be a list, got {}", other),
        }),
    }
}

fn resume_sequence(
    machine: &mut Machine,
    captured: &[Value],
    _effect_value: Value,
) -> Result<(), Error> {
    let env = captured_env(captured, 1);
    tail_sequence(machine, captured[0].clone(), env)
}

pub fn op_sequence(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    tail_sequence(machine, operands, env.clone())
}

//===----------------------------------------------------------------------===//
// Parameter trees
//===----------------------------------------------------------------------===//

/// Checks a parameter tree once, at closure-construction time: every leaf
/// must be a symbol, `#ignore`, or `()`; no symbol may repeat (the optional
/// `extra` slot folds the environment parameter into the same check); the
/// tree must be acyclic. Iterative, since the tree is user data.
pub fn validate_ptree(ptree: &Value, extra: Option<SymId>) -> Result<(), Error> {
    let mut seen: FxHashSet<SymId> = FxHashSet::default();
    if let Some(sym) = extra {
        seen.insert(sym);
    }
    let mut visited: FxHashSet<*const Pair> = FxHashSet::default();
    let mut stack = vec![ptree.clone()];

    while let Some(part) = stack.pop() {
        match part {
            Value::Nil | Value::Ignore => {}
            Value::Symbol(sym) => {
                if !seen.insert(sym) {
                    return Err(Error::PatternError {
                        reason: format!(
                            "repeated symbol {} in parameter tree",
                            interner::sym_to_str(sym)
                        ),
                    });
                }
            }
            Value::Pair(p) => {
                if !visited.insert(Rc::as_ptr(&p)) {
                    return Err(Error::PatternError {
                        reason: "parameter tree is cyclic or shares structure"
                            .to_string(),
                    });
                }
                stack.push(p.car());
                stack.push(p.cdr());
            }
            other => {
                return Err(Error::PatternError {
                    reason: format!("cannot bind {} in a parameter tree", other),
                });
            }
        }
    }
    Ok(())
}

/// Destructures `operands` against a validated parameter tree, binding into
/// `env`. Driven by the (finite) tree, so a cyclic operand tree terminates.
pub fn match_ptree(
    ptree: &Value,
    operands: &Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    let mut stack = vec![(ptree.clone(), operands.clone())];

    while let Some((pattern, operand)) = stack.pop() {
        match pattern {
            Value::Ignore => {}
            Value::Symbol(sym) => env.define(sym, operand),
            Value::Nil => {
                if !operand.is_nil() {
                    return Err(Error::BadOperandList {
                        reason: format!("too many operands: {} left over", operand),
                    });
                }
            }
            Value::Pair(p) => match operand {
                Value::Pair(o) => {
                    stack.push((p.cdr(), o.cdr()));
                    stack.push((p.car(), o.car()));
                }
                other => {
                    return Err(Error::BadOperandList {
                        reason: format!(
                            "operand tree too short: expected a pair, got {}",
                            other
                        ),
                    });
                }
            },
            other => {
                return Err(Error::PatternError {
                    reason: format!("cannot bind {} in a parameter tree", other),
                });
            }
        }
    }
    Ok(())
}

//===----------------------------------------------------------------------===//
// $vau / $lambda
//===----------------------------------------------------------------------===//

/// Builds the compound-operative closure record: the parameter tree and body
/// are deep-copied to immutable structure so later mutation of the literal
/// syntax cannot reach into the closure.
fn make_compound(
    ptree: &Value,
    penv: &Value,
    body: &Value,
    static_env: &Rc<Environment>,
    who: &'static str,
) -> Result<Rc<Combiner>, Error> {
    let penv_sym = match penv {
        Value::Symbol(sym) => Some(*sym),
        Value::Ignore => None,
        other => {
            return Err(Error::ArityOrTypeMismatch {
                who,
                reason: format!(
                    "environment parameter must be a symbol or #ignore, got {}",
                    other
                ),
            });
        }
    };
    if !list_metrics(body).is_list() {
        return Err(Error::ArityOrTypeMismatch {
            who,
            reason: format!("body must be a list of expressions, got {}", body),
        });
    }

    let ptree = copy_es_immutable(ptree);
    validate_ptree(&ptree, penv_sym)?;
    let body = copy_es_immutable(body);

    Ok(Combiner::operative(
        op_compound,
        vec![ptree, penv.clone(), body, Value::Env(static_env.clone())],
        None,
    ))
}

/// `($vau ptree penv . body)`: the constructor of all compound combiners.
pub fn op_vau(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    let (items, body) = split_operands(&operands, 2, "$vau")?;
    let closure = make_compound(&items[0], &items[1], &body, env, "$vau")?;
    machine.resume(Value::Combiner(closure));
    Ok(())
}

/// `($lambda ptree . body)` ≡ `(wrap ($vau ptree #ignore . body))`.
pub fn op_lambda(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    let (items, body) = split_operands(&operands, 1, "$lambda")?;
    let closure = make_compound(&items[0], &Value::Ignore, &body, env, "$lambda")?;
    machine.resume(Value::Combiner(Combiner::applicative(closure)));
    Ok(())
}

/// Application of a compound operative: a fresh child of the static
/// environment, the operand tree matched in, the dynamic environment bound
/// if requested, then the body as a tail sequence.
fn op_compound(
    machine: &mut Machine,
    captured: &[Value],
    operands: Value,
    dynamic_env: &Rc<Environment>,
) -> Result<(), Error> {
    let static_env = captured_env(captured, 3);
    let local = Environment::child(&static_env);
    match_ptree(&captured[0], &operands, &local)?;
    if let Value::Symbol(sym) = &captured[1] {
        local.define(*sym, Value::Env(dynamic_env.clone()));
    }
    tail_sequence(machine, captured[2].clone(), local)
}

//===----------------------------------------------------------------------===//
// Boolean forms
//===----------------------------------------------------------------------===//

const BOOL_CHECK: ContFlags =
    ContFlags { bool_check: true, extent_outer: false, extent_inner: false };

/// `($if test consequent alternative)`.
pub fn op_if(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 3, "$if")?;
    machine.push_cont(
        resume_if,
        vec![items[1].clone(), items[2].clone(), Value::Env(env.clone())],
        BOOL_CHECK,
        "$if",
    );
    machine.tail_eval(items[0].clone(), env.clone());
    Ok(())
}

fn resume_if(machine: &mut Machine, captured: &[Value], test: Value) -> Result<(), Error> {
    let env = captured_env(captured, 2);
    match test {
        Value::Bool(true) => machine.tail_eval(captured[0].clone(), env),
        Value::Bool(false) => machine.tail_eval(captured[1].clone(), env),
        other => return Err(Error::NonBooleanTest { found: other.to_string() }),
    }
    Ok(())
}

/// `($cond (test . body) ...)`: first true test wins; none yields `#inert`.
pub fn op_cond(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    cond_step(machine, operands, env.clone())
}

fn cond_step(
    machine: &mut Machine,
    clauses: Value,
    env: Rc<Environment>,
) -> Result<(), Error> {
    match clauses {
        Value::Nil => {
            machine.resume(Value::Inert);
            Ok(())
        }
        Value::Pair(p) => {
            let clause = p.car();
            let rest = p.cdr();
            match clause {
                Value::Pair(c) => {
                    machine.push_cont(
                        resume_cond,
                        vec![c.cdr(), rest, Value::Env(env.clone())],
                        BOOL_CHECK,
                        "$cond",
                    );
                    machine.tail_eval(c.car(), env);
                    Ok(())
                }
                other => Err(Error::ArityOrTypeMismatch {
                    who: "$cond",
                    reason: format!("clause must be a (test . body) pair, got {}", other),
                }),
            }
        }
        other => Err(Error::BadOperandList {
            reason: format!("$cond clauses must form a list, got {}", other),
        }),
    }
}

fn resume_cond(machine: &mut Machine, captured: &[Value], test: Value) -> Result<(), Error> {
    let env = captured_env(captured, 2);
    match test {
        Value::Bool(true) => tail_sequence(machine, captured[0].clone(), env),
        Value::Bool(false) => cond_step(machine, captured[1].clone(), env),
        other => Err(Error::NonBooleanTest { found: other.to_string() }),
    }
}

/// Shared chain for `$and?` / `$or?`: left-to-right short circuit, every
/// operand checked to be a boolean.
fn bool_chain(
    machine: &mut Machine,
    remaining: Value,
    env: Rc<Environment>,
    is_and: bool,
) -> Result<(), Error> {
    match remaining {
        Value::Nil => {
            machine.resume(Value::Bool(is_and));
            Ok(())
        }
        Value::Pair(p) => {
            let rest = p.cdr();
            if rest.is_nil() {
                // Tail position. If the current continuation already demands
                // a boolean, reuse it instead of allocating a pass-through
                // frame; otherwise the check frame keeps the "operand must be
                // boolean" contract. Either way the observable semantics are
                // identical.
                if !machine.current_flags().bool_check {
                    machine.push_cont(
                        resume_bool_check,
                        vec![],
                        BOOL_CHECK,
                        "bool-check",
                    );
                }
                machine.tail_eval(p.car(), env);
            } else {
                machine.push_cont(
                    if is_and { resume_and } else { resume_or },
                    vec![rest, Value::Env(env.clone())],
                    BOOL_CHECK,
                    if is_and { "$and?" } else { "$or?" },
                );
                machine.tail_eval(p.car(), env);
            }
            Ok(())
        }
        other => Err(Error::BadOperandList {
            reason: format!("boolean form operands must form a list, got {}", other),
        }),
    }
}

fn resume_bool_check(
    machine: &mut Machine,
    _captured: &[Value],
    value: Value,
) -> Result<(), Error> {
    match value {
        Value::Bool(_) => {
            machine.resume(value);
            Ok(())
        }
        other => Err(Error::NonBooleanTest { found: other.to_string() }),
    }
}

fn resume_and(machine: &mut Machine, captured: &[Value], value: Value) -> Result<(), Error> {
    let env = captured_env(captured, 1);
    match value {
        Value::Bool(true) => bool_chain(machine, captured[0].clone(), env, true),
        Value::Bool(false) => {
            machine.resume(Value::Bool(false));
            Ok(())
        }
        other => Err(Error::NonBooleanTest { found: other.to_string() }),
    }
}

fn resume_or(machine: &mut Machine, captured: &[Value], value: Value) -> Result<(), Error> {
    let env = captured_env(captured, 1);
    match value {
        Value::Bool(false) => bool_chain(machine, captured[0].clone(), env, false),
        Value::Bool(true) => {
            machine.resume(Value::Bool(true));
            Ok(())
        }
        other => Err(Error::NonBooleanTest { found: other.to_string() }),
    }
}

pub fn op_and(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    bool_chain(machine, operands, env.clone(), true)
}

pub fn op_or(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    bool_chain(machine, operands, env.clone(), false)
}

//===----------------------------------------------------------------------===//
// Binding forms
//===----------------------------------------------------------------------===//

/// `($define! ptree expr)` evaluates `expr` in the dynamic environment and
/// matches the result into that same environment.
pub fn op_define(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 2, "$define!")?;
    validate_ptree(&items[0], None)?;
    machine.push_cont(
        resume_define,
        vec![items[0].clone(), Value::Env(env.clone())],
        ContFlags::default(),
        "$define!",
    );
    machine.tail_eval(items[1].clone(), env.clone());
    Ok(())
}

fn resume_define(
    machine: &mut Machine,
    captured: &[Value],
    value: Value,
) -> Result<(), Error> {
    let env = captured_env(captured, 1);
    match_ptree(&captured[0], &value, &env)?;
    machine.resume(Value::Inert);
    Ok(())
}

/// `($set! env-expr ptree expr)` is like `$define!`, but the binding lands in
/// the environment `env-expr` evaluates to (which may be an ancestor, a
/// sibling, anything the caller holds).
pub fn op_set(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 3, "$set!")?;
    validate_ptree(&items[1], None)?;
    machine.push_cont(
        resume_set_env,
        vec![items[1].clone(), items[2].clone(), Value::Env(env.clone())],
        ContFlags::default(),
        "$set!",
    );
    machine.tail_eval(items[0].clone(), env.clone());
    Ok(())
}

fn resume_set_env(
    machine: &mut Machine,
    captured: &[Value],
    target: Value,
) -> Result<(), Error> {
    let target = match target {
        Value::Env(e) => e,
        other => {
            return Err(Error::ArityOrTypeMismatch {
                who: "$set!",
                reason: format!(
                    "first operand must evaluate to an environment, got {}",
                    other
                ),
            });
        }
    };
    let dynamic_env = captured_env(captured, 2);
    machine.push_cont(
        resume_set_value,
        vec![captured[0].clone(), Value::Env(target)],
        ContFlags::default(),
        "$set!",
    );
    machine.tail_eval(captured[1].clone(), dynamic_env);
    Ok(())
}

fn resume_set_value(
    machine: &mut Machine,
    captured: &[Value],
    value: Value,
) -> Result<(), Error> {
    let target = captured_env(captured, 1);
    match_ptree(&captured[0], &value, &target)?;
    machine.resume(Value::Inert);
    Ok(())
}

/// `($let ((ptree expr) ...) . body)` is assembled as the equivalent
/// applicative combination, so the initializers follow the standard operand
/// evaluation order.
pub fn op_let(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    let (items, body) = split_operands(&operands, 1, "$let")?;

    // The bindings have one pattern and one initializer per position, so a
    // cyclic chain could never match; bounding the walk up front keeps it
    // from collecting forever.
    if !list_metrics(&items[0]).nil_terminated {
        return Err(Error::ArityOrTypeMismatch {
            who: "$let",
            reason: format!("bindings must be a finite list, got {}", items[0]),
        });
    }

    let mut ptrees = Vec::new();
    let mut exprs = Vec::new();
    let mut current = items[0].clone();
    while let Value::Pair(p) = current {
        let binding = exact_operands(&p.car(), 2, "$let")?;
        ptrees.push(binding[0].clone());
        exprs.push(binding[1].clone());
        current = p.cdr();
    }

    let ptree = Value::list_from_vec(ptrees);
    let closure = make_compound(&ptree, &Value::Ignore, &body, env, "$let")?;
    combine(
        machine,
        Value::Combiner(Combiner::applicative(closure)),
        Value::list_from_vec(exprs),
        env.clone(),
    )
}

/// `(make-environment [parent])`.
pub fn op_make_environment(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let fresh = match &operands {
        Value::Nil => Environment::new(),
        _ => {
            let items = exact_operands(&operands, 1, "make-environment")?;
            match &items[0] {
                Value::Env(parent) => Environment::child(parent),
                other => {
                    return Err(Error::ArityOrTypeMismatch {
                        who: "make-environment",
                        reason: format!("parent must be an environment, got {}", other),
                    });
                }
            }
        }
    };
    machine.resume(Value::Env(fresh));
    Ok(())
}

//===----------------------------------------------------------------------===//
// Continuations
//===----------------------------------------------------------------------===//

/// `(call/cc comb)` applies `comb` to the continuation active at the
/// call/cc site, delivered as an applicative so it can sit in operator
/// position; the raw continuation is reachable through `apply-continuation`
/// and `$let/cc`.
pub fn op_call_cc(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 1, "call/cc")?;
    let k = Value::Continuation(machine.current_continuation());
    let reentry = continuation_applicative(&k);
    combine(machine, items[0].clone(), list![reentry], env.clone())
}

/// `($let/cc symbol . body)` binds the current continuation and runs the
/// body in a fresh child environment.
pub fn op_let_cc(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    env: &Rc<Environment>,
) -> Result<(), Error> {
    let (items, body) = split_operands(&operands, 1, "$let/cc")?;
    let local = Environment::child(env);
    match &items[0] {
        Value::Symbol(sym) => {
            local.define(*sym, Value::Continuation(machine.current_continuation()));
        }
        Value::Ignore => {}
        other => {
            return Err(Error::ArityOrTypeMismatch {
                who: "$let/cc",
                reason: format!("expected a symbol or #ignore, got {}", other),
            });
        }
    }
    tail_sequence(machine, body, local)
}

/// `(apply-continuation k value)` is the direct escape: it abandons the current
/// extent and delivers `value` to `k`, wherever and whenever `k` was
/// captured.
pub fn op_apply_continuation(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 2, "apply-continuation")?;
    match &items[0] {
        Value::Continuation(k) => {
            machine.invoke(k.clone(), items[1].clone());
            Ok(())
        }
        other => Err(Error::ArityOrTypeMismatch {
            who: "apply-continuation",
            reason: format!("expected a continuation, got {}", other),
        }),
    }
}

/// `(continuation->applicative k)`.
pub fn op_continuation_to_applicative(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 1, "continuation->applicative")?;
    match &items[0] {
        Value::Continuation(_) => {
            machine.resume(continuation_applicative(&items[0]));
            Ok(())
        }
        other => Err(Error::ArityOrTypeMismatch {
            who: "continuation->applicative",
            reason: format!("expected a continuation, got {}", other),
        }),
    }
}

fn continuation_applicative(k: &Value) -> Value {
    Value::Combiner(Combiner::applicative(Combiner::operative(
        op_invoke_captured,
        vec![k.clone()],
        None,
    )))
}

/// The underlying operative of an applicative-wrapped continuation: one
/// evaluated operand, delivered by escape.
fn op_invoke_captured(
    machine: &mut Machine,
    captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 1, "continuation")?;
    match &captured[0] {
        Value::Continuation(k) => {
            machine.invoke(k.clone(), items[0].clone());
            Ok(())
        }
        _ => unreachable!("continuation applicative captured a non-continuation"),
    }
}

//===----------------------------------------------------------------------===//
// eval / apply / wrap / unwrap
//===----------------------------------------------------------------------===//

/// `(eval expr env)`: the applicative face of the evaluator.
pub fn op_eval_applicative(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 2, "eval")?;
    match &items[1] {
        Value::Env(env) => {
            machine.tail_eval(items[0].clone(), env.clone());
            Ok(())
        }
        other => Err(Error::ArityOrTypeMismatch {
            who: "eval",
            reason: format!("second operand must be an environment, got {}", other),
        }),
    }
}

/// `(apply applicative operand-tree [env])` combines the underlying
/// combiner with the tree, in `env` or a fresh empty environment.
pub fn op_apply(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let (items, rest) = split_operands(&operands, 2, "apply")?;
    let env = match rest {
        Value::Nil => Environment::new(),
        Value::Pair(p) => {
            if !p.cdr().is_nil() {
                return Err(Error::ArityOrTypeMismatch {
                    who: "apply",
                    reason: "expected at most 3 operands".to_string(),
                });
            }
            match p.car() {
                Value::Env(env) => env,
                other => {
                    return Err(Error::ArityOrTypeMismatch {
                        who: "apply",
                        reason: format!(
                            "third operand must be an environment, got {}",
                            other
                        ),
                    });
                }
            }
        }
        other => {
            return Err(Error::BadOperandList {
                reason: format!("apply operands must form a list, got {}", other),
            });
        }
    };

    let comb = as_combiner(&items[0])?;
    let underlying = comb.unwrap_applicative().map_err(|_| Error::ArityOrTypeMismatch {
        who: "apply",
        reason: format!("first operand must be an applicative, got {}", items[0]),
    })?;
    combine(machine, Value::Combiner(underlying), items[1].clone(), env)
}

pub fn op_wrap(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 1, "wrap")?;
    let comb = as_combiner(&items[0])?;
    machine.resume(Value::Combiner(Combiner::applicative(comb)));
    Ok(())
}

pub fn op_unwrap(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 1, "unwrap")?;
    let comb = as_combiner(&items[0])?;
    machine.resume(Value::Combiner(comb.unwrap_applicative()?));
    Ok(())
}
