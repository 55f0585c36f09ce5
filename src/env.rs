use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::interner::{self, SymId};
use crate::value::Value;

/// A first-class environment: a mutable symbol table with a single optional
/// parent. Environments are shared values, jointly owned by every closure
/// and continuation that captured them.
pub struct Environment {
    parent: Option<Rc<Environment>>,
    bindings: RefCell<FxHashMap<SymId, Value>>,
}

impl Environment {
    pub fn new() -> Rc<Self> {
        Rc::new(Self { parent: None, bindings: RefCell::new(FxHashMap::default()) })
    }

    pub fn child(parent: &Rc<Environment>) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(parent.clone()),
            bindings: RefCell::new(FxHashMap::default()),
        })
    }

    /// Walks the parent chain until the symbol is found. A miss anywhere on
    /// the chain is an UnboundSymbol error.
    pub fn lookup(self: &Rc<Self>, key: SymId) -> Result<Value, Error> {
        let mut current = self;
        loop {
            if let Some(value) = current.bindings.borrow().get(&key) {
                return Ok(value.clone());
            }
            match &current.parent {
                Some(parent) => current = parent,
                None => {
                    return Err(Error::UnboundSymbol {
                        name: interner::sym_to_str(key),
                    });
                }
            }
        }
    }

    /// Adds or rewrites a binding in exactly this environment, never in an
    /// ancestor.
    pub fn define(&self, key: SymId, value: Value) {
        self.bindings.borrow_mut().insert(key, value);
    }
}

// Bindings routinely point back at combiners that captured this environment,
// so a structural Debug would never terminate.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.bindings.borrow().len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_the_parent_chain() {
        let root = Environment::new();
        let sym = interner::intern_sym("x");
        root.define(sym, Value::Int(7));

        let child = Environment::child(&root);
        assert!(matches!(child.lookup(sym), Ok(Value::Int(7))));
    }

    #[test]
    fn define_shadows_without_touching_the_parent() {
        let root = Environment::new();
        let sym = interner::intern_sym("y");
        root.define(sym, Value::Int(1));

        let child = Environment::child(&root);
        child.define(sym, Value::Int(2));

        assert!(matches!(child.lookup(sym), Ok(Value::Int(2))));
        assert!(matches!(root.lookup(sym), Ok(Value::Int(1))));
    }

    #[test]
    fn missing_symbol_is_an_unbound_error() {
        let root = Environment::new();
        let sym = interner::intern_sym("nope");
        assert!(matches!(root.lookup(sym), Err(Error::UnboundSymbol { .. })));
    }
}
