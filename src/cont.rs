use std::fmt;
use std::rc::Rc;

use crate::error::Error;
use crate::machine::Machine;
use crate::value::Value;

/// The resume half of a continuation: invoked by the trampoline driver with
/// the continuation's captured values and the value being delivered. It must
/// schedule the next step on the machine's registers and return; it never
/// calls the driver or another step function directly.
pub type ResumeFn = fn(&mut Machine, &[Value], Value) -> Result<(), Error>;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContFlags {
    /// The value delivered to this continuation must be a boolean. Chained
    /// boolean forms in tail position reuse such a continuation instead of
    /// allocating a pass-through check of their own.
    pub bool_check: bool,
    /// Marks the outer/inner ends of a dynamic extent. The guard machinery
    /// that consumes these lives above the core; the root and error
    /// continuations carry them by convention.
    pub extent_outer: bool,
    pub extent_inner: bool,
}

/// An immutable, parent-linked, first-class "what happens next". Capturing
/// the current continuation is a reference copy; invoking one is unrestricted
/// in time and count.
pub struct Continuation {
    pub parent: Option<Rc<Continuation>>,
    pub resume: ResumeFn,
    pub captured: Vec<Value>,
    pub flags: ContFlags,
    /// For trace output only.
    pub name: &'static str,
}

impl Continuation {
    pub fn new(
        parent: Rc<Continuation>,
        resume: ResumeFn,
        captured: Vec<Value>,
        flags: ContFlags,
        name: &'static str,
    ) -> Rc<Self> {
        Rc::new(Self { parent: Some(parent), resume, captured, flags, name })
    }

    /// A chain end: only the root and error continuations of a machine have
    /// no parent.
    pub fn base(
        resume: ResumeFn,
        flags: ContFlags,
        name: &'static str,
    ) -> Rc<Self> {
        Rc::new(Self { parent: None, resume, captured: Vec::new(), flags, name })
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("captured", &self.captured.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
