use std::fmt;
use std::rc::Rc;

use crate::env::Environment;
use crate::error::Error;
use crate::interner::{self, SymId};
use crate::machine::Machine;
use crate::value::Value;

/// The tail-call half of the register protocol: invoked by the driver with
/// the operative's captured values, the (unevaluated) operand tree, and the
/// dynamic environment. Like a `ResumeFn` it schedules and returns.
pub type OperativeFn =
    fn(&mut Machine, &[Value], Value, &Rc<Environment>) -> Result<(), Error>;

/// Anything that can sit in operator position. An applicative wraps another
/// combiner; unwrapping repeatedly always bottoms out at an operative.
pub enum Combiner {
    Operative {
        f: OperativeFn,
        captured: Rc<[Value]>,
        name: Option<SymId>,
    },
    Applicative {
        underlying: Rc<Combiner>,
    },
}

impl Combiner {
    pub fn operative(
        f: OperativeFn,
        captured: Vec<Value>,
        name: Option<SymId>,
    ) -> Rc<Self> {
        Rc::new(Combiner::Operative { f, captured: Rc::from(captured), name })
    }

    /// `wrap`: induce operand evaluation around an existing combiner.
    pub fn applicative(underlying: Rc<Combiner>) -> Rc<Self> {
        Rc::new(Combiner::Applicative { underlying })
    }

    /// `unwrap`: one layer only, errors on an operative.
    pub fn unwrap_applicative(self: &Rc<Self>) -> Result<Rc<Combiner>, Error> {
        match &**self {
            Combiner::Applicative { underlying } => Ok(underlying.clone()),
            Combiner::Operative { .. } => Err(Error::ArityOrTypeMismatch {
                who: "unwrap",
                reason: "expected an applicative, got an operative".to_string(),
            }),
        }
    }

    pub fn name(&self) -> Option<SymId> {
        match self {
            Combiner::Operative { name, .. } => *name,
            Combiner::Applicative { underlying } => underlying.name(),
        }
    }
}

impl fmt::Display for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Combiner::Operative { .. } => "operative",
            Combiner::Applicative { .. } => "applicative",
        };
        match self.name() {
            Some(sym) => write!(f, "#[{} {}]", label, interner::sym_to_str(sym)),
            None => write!(f, "#[{}]", label),
        }
    }
}

impl fmt::Debug for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Pulls the combiner out of a value in operator position.
pub fn as_combiner(value: &Value) -> Result<Rc<Combiner>, Error> {
    match value {
        Value::Combiner(c) => Ok(c.clone()),
        other => Err(Error::NotACombiner { found: other.to_string() }),
    }
}
