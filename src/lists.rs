use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::value::{Pair, Value};

//===----------------------------------------------------------------------===//
// List structure algorithms
//
// Everything here is iterative and bounded by computed pair counts, never by
// liveness checks: operand trees and parameter trees are user data and may be
// cyclic or adversarially deep.
//===----------------------------------------------------------------------===//

/// Shape of a chain of cdrs: `acyclic` pairs before the cycle starts and
/// `cycle` pairs in the cycle (`0` if the chain is acyclic).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListMetrics {
    pub acyclic: usize,
    pub cycle: usize,
    pub nil_terminated: bool,
}

impl ListMetrics {
    /// A list is either nil-terminated or closes into a cycle.
    pub fn is_list(&self) -> bool {
        self.cycle > 0 || self.nil_terminated
    }

    /// Number of element positions (each cycle element counts once).
    pub fn elements(&self) -> usize {
        self.acyclic + self.cycle
    }
}

/// Classifies a cdr chain by walking it once with a pair-identity map.
pub fn list_metrics(value: &Value) -> ListMetrics {
    let mut seen: FxHashMap<*const Pair, usize> = FxHashMap::default();
    let mut current = value.clone();
    let mut index = 0usize;

    loop {
        match current {
            Value::Pair(p) => {
                let key = Rc::as_ptr(&p);
                if let Some(&start) = seen.get(&key) {
                    return ListMetrics {
                        acyclic: start,
                        cycle: index - start,
                        nil_terminated: false,
                    };
                }
                seen.insert(key, index);
                index += 1;
                current = p.cdr();
            }
            Value::Nil => {
                return ListMetrics { acyclic: index, cycle: 0, nil_terminated: true };
            }
            _ => {
                return ListMetrics {
                    acyclic: index,
                    cycle: 0,
                    nil_terminated: false,
                };
            }
        }
    }
}

/// A fresh mutable, acyclic, reversed copy of the first `n` elements.
pub fn reverse_copy(list: &Value, n: usize) -> Value {
    let mut acc = Value::Nil;
    let mut current = list.clone();
    for _ in 0..n {
        match current {
            Value::Pair(p) => {
                acc = Value::cons(p.car(), acc);
                current = p.cdr();
            }
            _ => break,
        }
    }
    acc
}

/// Re-establishes a cycle on a fresh nil-terminated list: the pair at index
/// `acyclic + cycle - 1` gets its cdr pointed back at the pair at index
/// `acyclic`. No-op when `cycle` is zero.
pub fn encycle(list: &Value, acyclic: usize, cycle: usize) {
    if cycle == 0 {
        return;
    }

    let mut current = list.clone();
    let mut cycle_start: Option<Rc<Pair>> = None;
    let mut index = 0usize;

    while let Value::Pair(p) = current {
        if index == acyclic {
            cycle_start = Some(p.clone());
        }
        if index == acyclic + cycle - 1 {
            if let Some(start) = cycle_start {
                p.set_cdr(Value::Pair(start));
            }
            return;
        }
        index += 1;
        current = p.cdr();
    }
}

/// Deep-copies an expression into immutable pairs, preserving sharing and
/// cycles; non-pair leaves are shared as-is. Used at `$vau` time to shield a
/// closure's parameter tree and body from later mutation of the literal
/// syntax objects.
pub fn copy_es_immutable(value: &Value) -> Value {
    let root = match value {
        Value::Pair(p) => p.clone(),
        other => return other.clone(),
    };

    // First pass allocates one immutable shell per reachable pair.
    let mut index: FxHashMap<*const Pair, usize> = FxHashMap::default();
    let mut pairs: Vec<(Rc<Pair>, Rc<Pair>)> = Vec::new();
    let mut stack = vec![root.clone()];

    while let Some(p) = stack.pop() {
        let key = Rc::as_ptr(&p);
        if index.contains_key(&key) {
            continue;
        }
        index.insert(key, pairs.len());
        pairs.push((p.clone(), Pair::new_immutable(Value::Nil, Value::Nil)));
        if let Value::Pair(car) = p.car() {
            stack.push(car);
        }
        if let Value::Pair(cdr) = p.cdr() {
            stack.push(cdr);
        }
    }

    // Second pass wires the shells together along the original edges.
    let translate = |v: Value| -> Value {
        match v {
            Value::Pair(p) => {
                let i = index[&Rc::as_ptr(&p)];
                Value::Pair(pairs[i].1.clone())
            }
            other => other,
        }
    };

    for (original, copy) in &pairs {
        copy.set_car(translate(original.car()));
        copy.set_cdr(translate(original.cdr()));
    }

    Value::Pair(pairs[index[&Rc::as_ptr(&root)]].1.clone())
}

//===----------------------------------------------------------------------===//
// Operand-shape helpers for primitive operatives
//===----------------------------------------------------------------------===//

/// Requires `operands` to be a finite list of exactly `n` elements.
pub fn exact_operands(
    operands: &Value,
    n: usize,
    who: &'static str,
) -> Result<Vec<Value>, Error> {
    let (items, rest) = split_operands(operands, n, who)?;
    if !rest.is_nil() {
        return Err(Error::ArityOrTypeMismatch {
            who,
            reason: format!("expected {} operands, got extra: {}", n, rest),
        });
    }
    Ok(items)
}

/// Takes the first `n` elements and returns them with the remaining tail.
pub fn split_operands(
    operands: &Value,
    n: usize,
    who: &'static str,
) -> Result<(Vec<Value>, Value), Error> {
    let mut items = Vec::with_capacity(n);
    let mut current = operands.clone();
    for _ in 0..n {
        match current {
            Value::Pair(p) => {
                items.push(p.car());
                current = p.cdr();
            }
            _ => {
                return Err(Error::ArityOrTypeMismatch {
                    who,
                    reason: format!(
                        "expected at least {} operands, got {}",
                        n,
                        items.len()
                    ),
                });
            }
        }
    }
    Ok((items, current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list;

    fn two_cycle() -> Value {
        let second = Pair::new(Value::Int(2), Value::Nil);
        let first = Pair::new(Value::Int(1), Value::Pair(second.clone()));
        second.set_cdr(Value::Pair(first.clone()));
        Value::Pair(first)
    }

    #[test]
    fn metrics_of_proper_list() {
        let m = list_metrics(&list![Value::Int(1), Value::Int(2)]);
        assert_eq!(m, ListMetrics { acyclic: 2, cycle: 0, nil_terminated: true });
        assert!(m.is_list());
    }

    #[test]
    fn metrics_of_dotted_list() {
        let m = list_metrics(&Value::cons(Value::Int(1), Value::Int(2)));
        assert_eq!(m, ListMetrics { acyclic: 1, cycle: 0, nil_terminated: false });
        assert!(!m.is_list());
    }

    #[test]
    fn metrics_of_pure_cycle() {
        let m = list_metrics(&two_cycle());
        assert_eq!(m, ListMetrics { acyclic: 0, cycle: 2, nil_terminated: false });
        assert!(m.is_list());
        assert_eq!(m.elements(), 2);
    }

    #[test]
    fn reverse_copy_reverses_elements() {
        let copy = reverse_copy(&list![Value::Int(1), Value::Int(2), Value::Int(3)], 3);
        assert_eq!(copy.to_string(), "(3 2 1)");
    }

    #[test]
    fn reverse_copy_of_cycle_is_acyclic() {
        let copy = reverse_copy(&two_cycle(), 2);
        assert_eq!(copy.to_string(), "(2 1)");
    }

    #[test]
    fn encycle_restores_the_input_shape() {
        let fresh = list![Value::Int(1), Value::Int(2), Value::Int(3)];
        encycle(&fresh, 1, 2);
        let m = list_metrics(&fresh);
        assert_eq!(m, ListMetrics { acyclic: 1, cycle: 2, nil_terminated: false });
    }

    #[test]
    fn copy_es_immutable_preserves_cycles() {
        let original = two_cycle();
        let copy = copy_es_immutable(&original);

        let m = list_metrics(&copy);
        assert_eq!(m, ListMetrics { acyclic: 0, cycle: 2, nil_terminated: false });

        // Fresh structure, not the original pairs.
        let (a, b) = (original.as_pair().unwrap(), copy.as_pair().unwrap());
        assert!(!Rc::ptr_eq(a, b));
        assert!(!b.is_mutable());
    }
}
