use std::rc::Rc;

use crate::combiner::Combiner;
use crate::cont::{ContFlags, Continuation, ResumeFn};
use crate::env::Environment;
use crate::error::Error;
use crate::eval;
use crate::value::Value;

//===----------------------------------------------------------------------===//
// Trampoline
//
// The single driving loop of the interpreter. Every step function sets the
// next-step registers and returns immediately; nothing below the driver ever
// calls back into it, which is what bounds native-stack growth regardless of
// how deep the language-level recursion goes. Errors travel as the `Err`
// variant of each step's result and are caught only here, where they are
// rerouted to the machine's error continuation.
//===----------------------------------------------------------------------===//

/// The register file between two driver iterations. `Resume` is "apply a
/// continuation to a value" (environment absent); `Tail` is "tail-call an
/// operative on an operand tree in an environment".
pub enum Step {
    Resume { cont: Rc<Continuation>, value: Value },
    Tail { op: Rc<Combiner>, operands: Value, env: Rc<Environment> },
}

/// One evaluation context. It is an explicit struct rather than global state
/// so independent evaluations never share registers.
pub struct Machine {
    next: Option<Step>,
    cont: Rc<Continuation>,
    error_cont: Rc<Continuation>,
    eval_op: Rc<Combiner>,
    result: Option<Result<Value, Error>>,
}

fn resume_root(machine: &mut Machine, _captured: &[Value], value: Value) -> Result<(), Error> {
    machine.result = Some(Ok(value));
    Ok(())
}

fn resume_error_root(
    machine: &mut Machine,
    _captured: &[Value],
    value: Value,
) -> Result<(), Error> {
    let error = match value {
        Value::Error(e) => (*e).clone(),
        other => Error::ArityOrTypeMismatch {
            who: "error-continuation",
            reason: format!("raised a non-error value: {}", other),
        },
    };
    machine.result = Some(Err(error));
    Ok(())
}

impl Machine {
    pub fn new() -> Self {
        let root = Continuation::base(
            resume_root,
            ContFlags { extent_outer: true, ..ContFlags::default() },
            "root",
        );
        let error_cont = Continuation::base(
            resume_error_root,
            ContFlags { extent_inner: true, ..ContFlags::default() },
            "error",
        );
        Self {
            next: None,
            cont: root,
            error_cont,
            eval_op: eval::eval_combiner(),
            result: None,
        }
    }

    /// The continuation that receives the value of whatever is being
    /// scheduled right now. Capturing it (`call/cc`, `$let/cc`) is just this
    /// reference copy.
    pub fn current_continuation(&self) -> Rc<Continuation> {
        self.cont.clone()
    }

    pub fn current_flags(&self) -> ContFlags {
        self.cont.flags
    }

    pub fn error_continuation(&self) -> Rc<Continuation> {
        self.error_cont.clone()
    }

    /// Chains a new continuation onto the current one. The new record is
    /// immutable; re-entry later reuses it as-is.
    pub fn push_cont(
        &mut self,
        resume: ResumeFn,
        captured: Vec<Value>,
        flags: ContFlags,
        name: &'static str,
    ) {
        self.cont = Continuation::new(self.cont.clone(), resume, captured, flags, name);
    }

    /// Resume along the current extent: schedule the current continuation on
    /// `value`. This is how every primitive "returns" a result.
    pub fn resume(&mut self, value: Value) {
        self.next = Some(Step::Resume { cont: self.cont.clone(), value });
    }

    /// Direct invoke / escape: abandon the current extent and transfer to
    /// `target`. All pending work scheduled since `target` was captured is
    /// simply never reached again; this is the only non-local mechanism.
    pub fn invoke(&mut self, target: Rc<Continuation>, value: Value) {
        self.cont = target.clone();
        self.next = Some(Step::Resume { cont: target, value });
    }

    /// Schedule a tail call of an operative combiner.
    pub fn tail_call(&mut self, op: Rc<Combiner>, operands: Value, env: Rc<Environment>) {
        self.next = Some(Step::Tail { op, operands, env });
    }

    /// Schedule `eval(expr, env)`. Evaluation is itself an operative invoked
    /// through the same register protocol as any other combiner.
    pub fn tail_eval(&mut self, expr: Value, env: Rc<Environment>) {
        self.tail_call(self.eval_op.clone(), expr, env);
    }

    /// Runs steps until no next step remains, then yields the value (or
    /// error) delivered to the root. Invariant: only the root and error
    /// continuations stop the loop, and both set the result.
    ///
    /// A step must be scheduled (`tail_eval`, `tail_call`, `invoke`, or
    /// `resume`) before running; a fresh machine has nothing to deliver and
    /// running it is a usage error that panics.
    pub fn run(&mut self) -> Result<Value, Error> {
        debug_assert!(
            self.next.is_some() || self.result.is_some(),
            "run() on a machine with nothing scheduled"
        );
        while let Some(step) = self.next.take() {
            let outcome = match step {
                Step::Resume { cont, value } => {
                    if let Some(parent) = &cont.parent {
                        self.cont = parent.clone();
                    }
                    (cont.resume)(self, &cont.captured, value)
                }
                Step::Tail { op, operands, env } => match &*op {
                    Combiner::Operative { f, captured, .. } => {
                        let (f, captured) = (*f, captured.clone());
                        f(self, &captured, operands, &env)
                    }
                    Combiner::Applicative { .. } => {
                        Err(Error::NotACombiner { found: op.to_string() })
                    }
                },
            };
            if let Err(error) = outcome {
                let target = self.error_cont.clone();
                self.invoke(target, Value::Error(Rc::new(error)));
            }
        }
        self.result.take().expect("run() on a machine with nothing scheduled")
    }
}

//===----------------------------------------------------------------------===//
// Entry points
//
// The exactly-two public operations the rest of an interpreter is allowed to
// call into the core.
//===----------------------------------------------------------------------===//

/// Evaluate `expr` in `env` to completion.
pub fn evaluate(expr: &Value, env: &Rc<Environment>) -> Result<Value, Error> {
    let mut machine = Machine::new();
    machine.tail_eval(expr.clone(), env.clone());
    machine.run()
}

/// Apply a combiner to an operand tree in `env` to completion.
pub fn apply(
    combiner: &Value,
    operands: &Value,
    env: &Rc<Environment>,
) -> Result<Value, Error> {
    let mut machine = Machine::new();
    eval::combine(&mut machine, combiner.clone(), operands.clone(), env.clone())?;
    machine.run()
}
