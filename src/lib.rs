//! Evaluation core of a Kernel-family language.
//!
//! The central abstraction is the first-class, unhygienic operative: a
//! combiner that receives its operand tree unevaluated together with the
//! caller's dynamic environment. Applicatives, `$lambda`, `$if`, `call/cc`
//! and the rest are derived from it.
//!
//! Control flow never leans on the Rust call stack: a trampoline driver
//! ([`machine::Machine`]) executes one step at a time from an explicit
//! register file, every "return" is the application of a heap-allocated,
//! parent-linked [`cont::Continuation`], and non-local escape is just
//! applying a continuation captured earlier. That gives unbounded tail calls
//! and fully re-entrant first-class continuations for free.
//!
//! The core exposes exactly two entry points to collaborators:
//! [`machine::evaluate`] and [`machine::apply`]. [`runtime::Runtime`] is the
//! convenience façade over both, used by the REPL and the tests.

pub mod combiner;
pub mod cont;
pub mod env;
pub mod error;
pub mod eval;
pub mod ground;
pub mod interner;
pub mod lists;
pub mod machine;
pub mod operatives;
pub mod reader;
pub mod repl;
pub mod runtime;
pub mod value;
