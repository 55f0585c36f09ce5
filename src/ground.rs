use std::rc::Rc;

use crate::combiner::{Combiner, OperativeFn};
use crate::env::Environment;
use crate::error::Error;
use crate::interner;
use crate::lists::{exact_operands, list_metrics};
use crate::machine::Machine;
use crate::operatives;
use crate::value::{eq_values, Value};

//===----------------------------------------------------------------------===//
// Ground environment
//
// The primitive vocabulary. Everything else the language offers is meant to
// be a library built from these through the same two entry points everyone
// uses: eval and apply.
//===----------------------------------------------------------------------===//

fn bind_operative(env: &Rc<Environment>, name: &str, f: OperativeFn) {
    let sym = interner::intern_sym(name);
    env.define(sym, Value::Combiner(Combiner::operative(f, vec![], Some(sym))));
}

fn bind_applicative(env: &Rc<Environment>, name: &str, f: OperativeFn) {
    let sym = interner::intern_sym(name);
    let operative = Combiner::operative(f, vec![], Some(sym));
    env.define(sym, Value::Combiner(Combiner::applicative(operative)));
}

pub fn ground_environment() -> Rc<Environment> {
    let env = Environment::new();

    // Core syntax.
    bind_operative(&env, "$vau", operatives::op_vau);
    bind_operative(&env, "$lambda", operatives::op_lambda);
    bind_operative(&env, "$if", operatives::op_if);
    bind_operative(&env, "$sequence", operatives::op_sequence);
    bind_operative(&env, "$cond", operatives::op_cond);
    bind_operative(&env, "$and?", operatives::op_and);
    bind_operative(&env, "$or?", operatives::op_or);
    bind_operative(&env, "$define!", operatives::op_define);
    bind_operative(&env, "$set!", operatives::op_set);
    bind_operative(&env, "$let", operatives::op_let);
    bind_operative(&env, "$let/cc", operatives::op_let_cc);

    // Combiner and continuation plumbing.
    bind_applicative(&env, "wrap", operatives::op_wrap);
    bind_applicative(&env, "unwrap", operatives::op_unwrap);
    bind_applicative(&env, "eval", operatives::op_eval_applicative);
    bind_applicative(&env, "apply", operatives::op_apply);
    bind_applicative(&env, "call/cc", operatives::op_call_cc);
    bind_applicative(&env, "apply-continuation", operatives::op_apply_continuation);
    bind_applicative(
        &env,
        "continuation->applicative",
        operatives::op_continuation_to_applicative,
    );
    bind_applicative(&env, "make-environment", operatives::op_make_environment);

    // The minimal library the properties of the core are exercised with.
    bind_applicative(&env, "cons", app_cons);
    bind_applicative(&env, "car", app_car);
    bind_applicative(&env, "cdr", app_cdr);
    bind_applicative(&env, "list", app_list);
    bind_applicative(&env, "eq?", app_eq);
    bind_applicative(&env, "+", app_add);
    bind_applicative(&env, "-", app_sub);
    bind_applicative(&env, "=?", app_num_eq);
    bind_applicative(&env, "<?", app_num_lt);

    env
}

//===----------------------------------------------------------------------===//
// Library applicatives
//===----------------------------------------------------------------------===//

fn app_cons(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 2, "cons")?;
    machine.resume(Value::cons(items[0].clone(), items[1].clone()));
    Ok(())
}

fn app_car(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 1, "car")?;
    match items[0].as_pair() {
        Some(p) => {
            machine.resume(p.car());
            Ok(())
        }
        None => Err(Error::ArityOrTypeMismatch {
            who: "car",
            reason: format!("expected a pair, got {}", items[0]),
        }),
    }
}

fn app_cdr(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 1, "cdr")?;
    match items[0].as_pair() {
        Some(p) => {
            machine.resume(p.cdr());
            Ok(())
        }
        None => Err(Error::ArityOrTypeMismatch {
            who: "cdr",
            reason: format!("expected a pair, got {}", items[0]),
        }),
    }
}

/// The evaluated operand list is already the answer.
fn app_list(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    machine.resume(operands);
    Ok(())
}

fn app_eq(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let items = exact_operands(&operands, 2, "eq?")?;
    machine.resume(Value::Bool(eq_values(&items[0], &items[1])));
    Ok(())
}

fn int_operands(operands: &Value, who: &'static str) -> Result<Vec<i64>, Error> {
    let metrics = list_metrics(operands);
    if !metrics.nil_terminated {
        return Err(Error::BadOperandList {
            reason: format!("{} requires a finite operand list", who),
        });
    }
    let mut numbers = Vec::with_capacity(metrics.acyclic);
    let mut current = operands.clone();
    while let Value::Pair(p) = current {
        match p.car() {
            Value::Int(n) => numbers.push(n),
            other => {
                return Err(Error::ArityOrTypeMismatch {
                    who,
                    reason: format!("expected an integer, got {}", other),
                });
            }
        }
        current = p.cdr();
    }
    Ok(numbers)
}

fn app_add(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let numbers = int_operands(&operands, "+")?;
    let mut sum = 0i64;
    for n in numbers {
        sum = sum.checked_add(n).ok_or_else(|| Error::ArityOrTypeMismatch {
            who: "+",
            reason: "integer overflow".to_string(),
        })?;
    }
    machine.resume(Value::Int(sum));
    Ok(())
}

fn app_sub(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let numbers = int_operands(&operands, "-")?;
    let (first, rest) = match numbers.split_first() {
        Some(split) => split,
        None => {
            return Err(Error::ArityOrTypeMismatch {
                who: "-",
                reason: "expected at least 1 operand".to_string(),
            });
        }
    };
    let result = if rest.is_empty() {
        first.checked_neg()
    } else {
        rest.iter().try_fold(*first, |acc, n| acc.checked_sub(*n))
    };
    match result {
        Some(n) => {
            machine.resume(Value::Int(n));
            Ok(())
        }
        None => Err(Error::ArityOrTypeMismatch {
            who: "-",
            reason: "integer overflow".to_string(),
        }),
    }
}

fn app_num_eq(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let numbers = int_operands(&operands, "=?")?;
    if numbers.len() < 2 {
        return Err(Error::ArityOrTypeMismatch {
            who: "=?",
            reason: "expected at least 2 operands".to_string(),
        });
    }
    machine.resume(Value::Bool(numbers.windows(2).all(|w| w[0] == w[1])));
    Ok(())
}

fn app_num_lt(
    machine: &mut Machine,
    _captured: &[Value],
    operands: Value,
    _env: &Rc<Environment>,
) -> Result<(), Error> {
    let numbers = int_operands(&operands, "<?")?;
    if numbers.len() < 2 {
        return Err(Error::ArityOrTypeMismatch {
            who: "<?",
            reason: "expected at least 2 operands".to_string(),
        });
    }
    machine.resume(Value::Bool(numbers.windows(2).all(|w| w[0] < w[1])));
    Ok(())
}
