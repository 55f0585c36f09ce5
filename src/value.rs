use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::combiner::Combiner;
use crate::cont::Continuation;
use crate::env::Environment;
use crate::error::Error;
use crate::interner::{self, SymId};

//===----------------------------------------------------------------------===//
// Value
//
// There is no distinguished AST type: the reader produces Values, the
// evaluator consumes Values, and combiners receive their operand trees as
// Values. Pairs may form improper (dotted) and cyclic structures; nothing in
// the core may traverse them with unbounded native recursion.
//===----------------------------------------------------------------------===//

#[derive(Clone)]
pub enum Value {
    Nil,
    Inert,
    Ignore,
    Bool(bool),
    Int(i64),
    Char(char),
    String(Rc<String>),
    Symbol(SymId),
    Pair(Rc<Pair>),
    Env(Rc<Environment>),
    Combiner(Rc<Combiner>),
    Continuation(Rc<Continuation>),
    Error(Rc<Error>),
}

/// A cons cell. `mutable` distinguishes literal structure (the reader and
/// `copy_es_immutable` produce immutable pairs) from freshly built lists the
/// core is allowed to splice, e.g. when re-establishing a cycle on an
/// evaluated operand list.
///
/// `set_car`/`set_cdr` do not consult the flag themselves: any pair mutator
/// exposed to the language must check `is_mutable` before writing. The core
/// writes to immutable pairs in exactly one place, the construction-time
/// wiring inside `copy_es_immutable`, where the shells are not yet shared.
pub struct Pair {
    car: RefCell<Value>,
    cdr: RefCell<Value>,
    mutable: bool,
}

impl Pair {
    pub fn new(car: Value, cdr: Value) -> Rc<Self> {
        Rc::new(Self { car: RefCell::new(car), cdr: RefCell::new(cdr), mutable: true })
    }

    pub fn new_immutable(car: Value, cdr: Value) -> Rc<Self> {
        Rc::new(Self {
            car: RefCell::new(car),
            cdr: RefCell::new(cdr),
            mutable: false,
        })
    }

    pub fn car(&self) -> Value {
        self.car.borrow().clone()
    }

    pub fn cdr(&self) -> Value {
        self.cdr.borrow().clone()
    }

    pub fn set_car(&self, value: Value) {
        *self.car.borrow_mut() = value;
    }

    pub fn set_cdr(&self, value: Value) {
        *self.cdr.borrow_mut() = value;
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }
}

// The derived teardown would recurse through Rc and RefCell destructors, so
// a long cdr (or car) chain becoming garbage would exhaust the native stack.
// Like every other traversal of user data, reclamation walks iteratively:
// take the fields out, and keep unwrapping pairs while they are uniquely
// owned. Shared pairs just lose one reference; cycles never reach a unique
// owner and stay with the Rc leak they already were.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut pending: Vec<Rc<Pair>> = Vec::new();
        for slot in [&self.car, &self.cdr] {
            if let Value::Pair(p) = slot.replace(Value::Nil) {
                pending.push(p);
            }
        }
        while let Some(p) = pending.pop() {
            if let Ok(inner) = Rc::try_unwrap(p) {
                for slot in [&inner.car, &inner.cdr] {
                    if let Value::Pair(p) = slot.replace(Value::Nil) {
                        pending.push(p);
                    }
                }
            }
        }
    }
}

impl Value {
    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Pair(Pair::new(car, cdr))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(interner::intern_sym(name))
    }

    pub fn string(s: &str) -> Value {
        Value::String(Rc::new(s.to_owned()))
    }

    /// Builds a mutable nil-terminated list from a vector of elements.
    pub fn list_from_vec(items: Vec<Value>) -> Value {
        let mut acc = Value::Nil;
        for item in items.into_iter().rev() {
            acc = Value::cons(item, acc);
        }
        acc
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_pair(&self) -> Option<&Rc<Pair>> {
        match self {
            Value::Pair(p) => Some(p),
            _ => None,
        }
    }

    /// The name used in error messages. Not a type system, just reporting.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "()",
            Value::Inert => "#inert",
            Value::Ignore => "#ignore",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Char(_) => "character",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Pair(_) => "pair",
            Value::Env(_) => "environment",
            Value::Combiner(_) => "combiner",
            Value::Continuation(_) => "continuation",
            Value::Error(_) => "error",
        }
    }
}

/// Identity equality, the `eq?` of the language: atoms by value, everything
/// heap-allocated by reference.
pub fn eq_values(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Inert, Value::Inert) => true,
        (Value::Ignore, Value::Ignore) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Char(x), Value::Char(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x == y,
        (Value::String(x), Value::String(y)) => Rc::ptr_eq(x, y),
        (Value::Pair(x), Value::Pair(y)) => Rc::ptr_eq(x, y),
        (Value::Env(x), Value::Env(y)) => Rc::ptr_eq(x, y),
        (Value::Combiner(x), Value::Combiner(y)) => Rc::ptr_eq(x, y),
        (Value::Continuation(x), Value::Continuation(y)) => Rc::ptr_eq(x, y),
        (Value::Error(x), Value::Error(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

//===----------------------------------------------------------------------===//
// Printer
//
// Cycle-safe: pairs reachable more than once get `#n=`/`#n#` datum labels.
// Both passes are iterative; printing is never allowed to recurse into user
// data, which may be adversarially deep or cyclic.
//===----------------------------------------------------------------------===//

fn collect_shared(root: &Value) -> FxHashMap<*const Pair, usize> {
    let mut visited: FxHashSet<*const Pair> = FxHashSet::default();
    let mut shared: FxHashMap<*const Pair, usize> = FxHashMap::default();
    let mut stack = vec![root.clone()];

    while let Some(value) = stack.pop() {
        if let Value::Pair(p) = value {
            let key = Rc::as_ptr(&p);
            if visited.contains(&key) {
                let next = shared.len();
                shared.entry(key).or_insert(next);
                continue;
            }
            visited.insert(key);
            stack.push(p.car());
            stack.push(p.cdr());
        }
    }

    shared
}

enum PrintTask {
    Datum(Value),
    Tail(Value),
    Text(&'static str),
}

fn write_value(f: &mut fmt::Formatter, root: &Value) -> fmt::Result {
    let labels = collect_shared(root);
    let mut printed: FxHashSet<*const Pair> = FxHashSet::default();
    let mut stack = vec![PrintTask::Datum(root.clone())];

    while let Some(task) = stack.pop() {
        match task {
            PrintTask::Text(s) => write!(f, "{}", s)?,
            PrintTask::Datum(value) => match value {
                Value::Pair(p) => {
                    let key = Rc::as_ptr(&p);
                    if let Some(&label) = labels.get(&key) {
                        if printed.contains(&key) {
                            write!(f, "#{}#", label)?;
                            continue;
                        }
                        printed.insert(key);
                        write!(f, "#{}=", label)?;
                    }
                    write!(f, "(")?;
                    stack.push(PrintTask::Tail(p.cdr()));
                    stack.push(PrintTask::Datum(p.car()));
                }
                atom => write_atom(f, &atom)?,
            },
            PrintTask::Tail(value) => match value {
                Value::Nil => write!(f, ")")?,
                Value::Pair(p) => {
                    let key = Rc::as_ptr(&p);
                    if labels.contains_key(&key) {
                        // A labeled pair in tail position has to be printed
                        // as a dotted datum so its label stays attached.
                        stack.push(PrintTask::Text(")"));
                        stack.push(PrintTask::Datum(Value::Pair(p)));
                        stack.push(PrintTask::Text(" . "));
                    } else {
                        write!(f, " ")?;
                        stack.push(PrintTask::Tail(p.cdr()));
                        stack.push(PrintTask::Datum(p.car()));
                    }
                }
                atom => {
                    stack.push(PrintTask::Text(")"));
                    stack.push(PrintTask::Datum(atom));
                    stack.push(PrintTask::Text(" . "));
                }
            },
        }
    }

    Ok(())
}

fn write_atom(f: &mut fmt::Formatter, value: &Value) -> fmt::Result {
    match value {
        Value::Nil => write!(f, "()"),
        Value::Inert => write!(f, "#inert"),
        Value::Ignore => write!(f, "#ignore"),
        Value::Bool(true) => write!(f, "#t"),
        Value::Bool(false) => write!(f, "#f"),
        Value::Int(n) => write!(f, "{}", n),
        Value::Char(c) => write!(f, "#\\{}", c),
        Value::String(s) => write!(f, "\"{}\"", s),
        Value::Symbol(sym) => write!(f, "{}", interner::sym_to_str(*sym)),
        Value::Env(_) => write!(f, "#[environment]"),
        Value::Combiner(c) => write!(f, "{}", c),
        Value::Continuation(_) => write!(f, "#[continuation]"),
        Value::Error(e) => write!(f, "#[error {}]", e),
        Value::Pair(_) => unreachable!("pairs are printed structurally"),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_value(f, self)
    }
}

// Values routinely contain cycles, so Debug has to dispatch through the
// label-aware printer rather than recursing structurally.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_value(f, self)
    }
}

impl fmt::Debug for Pair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pair")
    }
}

//===----------------------------------------------------------------------===//
// Macros
//===----------------------------------------------------------------------===//

#[macro_export]
macro_rules! list {
    () => (
        $crate::value::Value::Nil
    );
    ($($args:expr),*) => {{
        let v: Vec<$crate::value::Value> = vec![$($args),*];
        $crate::value::Value::list_from_vec(v)
    }};
}
