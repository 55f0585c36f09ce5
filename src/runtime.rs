use std::rc::Rc;

use crate::env::Environment;
use crate::error::{Diagnostic, Error};
use crate::ground::ground_environment;
use crate::machine;
use crate::reader;
use crate::value::Value;

/// The façade collaborators talk to: a ground environment of primitives plus
/// a persistent user environment layered on top. The core itself exposes
/// exactly two operations, `eval` and `apply`; everything here routes into
/// those.
pub struct Runtime {
    ground: Rc<Environment>,
    user: Rc<Environment>,
}

impl Runtime {
    pub fn new() -> Rc<Self> {
        let ground = ground_environment();
        let user = Environment::child(&ground);
        Rc::new(Self { ground, user })
    }

    pub fn ground(&self) -> &Rc<Environment> {
        &self.ground
    }

    /// The environment REPL definitions land in.
    pub fn user_env(&self) -> &Rc<Environment> {
        &self.user
    }

    /// Evaluates an expression in the user environment.
    pub fn eval(&self, expr: &Value) -> Result<Value, Error> {
        machine::evaluate(expr, &self.user)
    }

    /// Applies a combiner to an (unevaluated) operand tree in the user
    /// environment.
    pub fn apply(&self, combiner: &Value, operands: &Value) -> Result<Value, Error> {
        machine::apply(combiner, operands, &self.user)
    }

    /// Reads and evaluates every form in the input, returning the value of
    /// the last one (`#inert` for empty input).
    pub fn rep(&self, input: &str) -> Result<Value, Diagnostic> {
        let forms = reader::read_all(input).map_err(Diagnostic::Syntax)?;
        let mut last = Value::Inert;
        for form in &forms {
            last = self.eval(form).map_err(Diagnostic::Eval)?;
        }
        Ok(last)
    }
}
