//! Enumeration of satisfying assignments.
//!
//! [`Bdd::all_sat`] walks every path to TRUE and yields it as a partial
//! assignment indexed by variable: variables not tested on the path are
//! `None` (don't care). [`Bdd::minterms`] expands those don't-cares over a
//! variable set, yielding every full assignment of the set exactly once.
//!
//! # Example
//!
//! ```
//! use bdd_kernel::bdd::Bdd;
//!
//! let mut bdd = Bdd::with_vars(2).unwrap();
//! let x = bdd.ith_var(0).unwrap();
//! let y = bdd.ith_var(1).unwrap();
//! let f = bdd.apply_or(x, y).unwrap();
//!
//! let paths: Vec<_> = bdd.all_sat(f).unwrap().collect();
//! assert_eq!(paths, vec![vec![Some(false), Some(true)], vec![Some(true), None]]);
//! ```
//!
//! Note: the number of paths can be exponential in the number of variables.

use std::collections::HashSet;

use crate::bdd::Bdd;
use crate::error::{BddError, Result};
use crate::reference::Ref;

impl Bdd {
    /// Iterator over all paths to TRUE in `f`, low branches first.
    pub fn all_sat(&self, f: Ref) -> Result<AllSat<'_>> {
        let f = self.check(f)?;
        Ok(AllSat::new(self, f))
    }

    /// Iterator over all assignments of the variables in `varset` that
    /// satisfy `f`. Entries for variables outside `varset` are `None`.
    ///
    /// Fails with [`BddError::VarSet`] when `f` depends on a variable outside
    /// `varset`.
    pub fn minterms(&self, f: Ref, varset: Ref) -> Result<Minterms<'_>> {
        let (f, varset) = (self.check(f)?, self.check(varset)?);
        let mut in_set = vec![false; self.var_num as usize];
        let mut vars = Vec::new();
        let mut n = varset;
        while n > 1 {
            in_set[self.var_of(n) as usize] = true;
            vars.push(self.var_of(n));
            n = self.hi(n);
        }

        let mut seen = HashSet::new();
        let mut stack = vec![f];
        while let Some(n) = stack.pop() {
            if n < 2 || !seen.insert(n) {
                continue;
            }
            if !in_set[self.var_of(n) as usize] {
                return Err(BddError::VarSet);
            }
            stack.push(self.lo(n));
            stack.push(self.hi(n));
        }

        Ok(Minterms {
            paths: AllSat::new(self, f),
            vars,
            current: None,
            free: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Branch {
    Low,
    High,
}

#[derive(Debug)]
struct StackFrame {
    node: u32,
    /// Next branch to explore, `None` once both are done.
    next_branch: Option<Branch>,
}

/// Iterator over the paths to TRUE of a diagram.
///
/// Created by [`Bdd::all_sat`]. Depth-first with backtracking; the current
/// assignment is a single vector updated in place.
pub struct AllSat<'a> {
    bdd: &'a Bdd,
    stack: Vec<StackFrame>,
    assignment: Vec<Option<bool>>,
}

impl<'a> AllSat<'a> {
    fn new(bdd: &'a Bdd, f: u32) -> Self {
        AllSat {
            bdd,
            stack: vec![StackFrame {
                node: f,
                next_branch: Some(Branch::Low),
            }],
            assignment: vec![None; bdd.var_num as usize],
        }
    }
}

impl Iterator for AllSat<'_> {
    type Item = Vec<Option<bool>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let node = frame.node;

            if node == 1 {
                self.stack.pop();
                return Some(self.assignment.clone());
            }
            if node == 0 {
                self.stack.pop();
                continue;
            }

            let var = self.bdd.var_of(node) as usize;
            let (child, value) = match frame.next_branch {
                Some(Branch::Low) => {
                    frame.next_branch = Some(Branch::High);
                    (self.bdd.lo(node), false)
                }
                Some(Branch::High) => {
                    frame.next_branch = None;
                    (self.bdd.hi(node), true)
                }
                None => {
                    self.assignment[var] = None;
                    self.stack.pop();
                    continue;
                }
            };
            self.assignment[var] = Some(value);
            self.stack.push(StackFrame {
                node: child,
                next_branch: Some(Branch::Low),
            });
        }
    }
}

/// Iterator over the full assignments of a variable set satisfying a diagram.
///
/// Created by [`Bdd::minterms`].
pub struct Minterms<'a> {
    paths: AllSat<'a>,
    vars: Vec<u32>,
    /// Path being expanded.
    current: Option<Vec<Option<bool>>>,
    /// Don't-care variables of the current path.
    free: Vec<u32>,
}

impl Minterms<'_> {
    /// Advance the don't-care counter; `false` when it wraps around.
    fn increment(&mut self) -> bool {
        let Some(current) = self.current.as_mut() else {
            return false;
        };
        for &var in &self.free {
            let slot = &mut current[var as usize];
            if *slot == Some(false) {
                *slot = Some(true);
                return true;
            }
            *slot = Some(false);
        }
        false
    }
}

impl Iterator for Minterms<'_> {
    type Item = Vec<Option<bool>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_some() && self.increment() {
            return self.current.clone();
        }
        let mut path = self.paths.next()?;
        self.free = self.vars.iter().copied().filter(|&v| path[v as usize].is_none()).collect();
        for &var in &self.free {
            path[var as usize] = Some(false);
        }
        self.current = Some(path);
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn setup(n: u32) -> (Bdd, Vec<Ref>) {
        let mut bdd = Bdd::with_vars(n).unwrap();
        let vars = (0..n).map(|v| bdd.ith_var(v).unwrap()).collect();
        (bdd, vars)
    }

    #[test]
    fn test_paths_constant() {
        let (bdd, _) = setup(2);
        let paths: Vec<_> = bdd.all_sat(bdd.one()).unwrap().collect();
        assert_eq!(paths, vec![vec![None, None]]);
        assert_eq!(bdd.all_sat(bdd.zero()).unwrap().count(), 0);
    }

    #[test]
    fn test_paths_xor() {
        let (mut bdd, x) = setup(2);
        let f = bdd.apply_xor(x[0], x[1]).unwrap();
        let paths: Vec<_> = bdd.all_sat(f).unwrap().collect();
        assert_eq!(
            paths,
            vec![vec![Some(false), Some(true)], vec![Some(true), Some(false)]]
        );
    }

    #[test]
    fn test_paths_cover_sat_count() {
        let (mut bdd, x) = setup(4);
        let a = bdd.apply_and(x[0], x[2]).unwrap();
        let f = bdd.apply_or(a, x[3]).unwrap();
        let total: f64 = bdd
            .all_sat(f)
            .unwrap()
            .map(|p| 2f64.powi(p.iter().filter(|v| v.is_none()).count() as i32))
            .sum();
        assert_eq!(total, bdd.sat_count(f).unwrap());
        assert_eq!(bdd.all_sat(f).unwrap().count() as f64, bdd.path_count(f).unwrap());
    }

    #[test]
    fn test_minterms() {
        let (mut bdd, x) = setup(3);
        let f = bdd.apply_or(x[0], x[1]).unwrap();
        let set = bdd.make_set(&[0, 1]).unwrap();
        let minterms: Vec<_> = bdd.minterms(f, set).unwrap().collect();
        assert_eq!(minterms.len(), 3);
        for m in &minterms {
            assert_eq!(m[2], None);
            assert!(m[0] == Some(true) || m[1] == Some(true));
        }

        let set = bdd.make_set(&[0, 1, 2]).unwrap();
        assert_eq!(bdd.minterms(f, set).unwrap().count(), 6);
        assert_eq!(bdd.minterms(bdd.zero(), set).unwrap().count(), 0);
    }

    #[test]
    fn test_minterms_outside_set() {
        let (mut bdd, x) = setup(3);
        let f = bdd.apply_or(x[0], x[2]).unwrap();
        let set = bdd.make_set(&[0]).unwrap();
        assert!(matches!(bdd.minterms(f, set), Err(BddError::VarSet)));
    }
}
