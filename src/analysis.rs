//! Structural queries: node counts, support, variable sets, evaluation and a
//! consistency check of the whole node table.

use std::collections::HashSet;

use log::debug;

use crate::bdd::Bdd;
use crate::engine::Step;
use crate::error::{BddError, Result};
use crate::reference::Ref;

impl Bdd {
    /// Visit every non-terminal node reachable from `roots` once.
    fn descendants(&self, roots: impl IntoIterator<Item = u32>) -> HashSet<u32> {
        let mut seen = HashSet::new();
        let mut stack: Vec<u32> = roots.into_iter().collect();
        while let Some(n) = stack.pop() {
            if n < 2 || !seen.insert(n) {
                continue;
            }
            stack.push(self.lo(n));
            stack.push(self.hi(n));
        }
        seen
    }

    /// Number of decision nodes in `f`; terminals are not counted.
    pub fn node_count(&self, f: Ref) -> Result<usize> {
        let f = self.check(f)?;
        Ok(self.descendants([f]).len())
    }

    /// Number of distinct decision nodes shared by all of `fs`.
    pub fn node_count_many(&self, fs: &[Ref]) -> Result<usize> {
        let roots = fs.iter().map(|&f| self.check(f)).collect::<Result<Vec<_>>>()?;
        Ok(self.descendants(roots).len())
    }

    /// Number of nodes of `f` labelled with each variable.
    pub fn var_profile(&self, f: Ref) -> Result<Vec<usize>> {
        let f = self.check(f)?;
        let mut profile = vec![0; self.var_num as usize];
        for n in self.descendants([f]) {
            profile[self.var_of(n) as usize] += 1;
        }
        Ok(profile)
    }

    /// Build the variable set of `vars`, sorted by level, bottom-up.
    fn build_set(&mut self, mut vars: Vec<u32>) -> Step<u32> {
        vars.sort_by_key(|&v| std::cmp::Reverse(self.var2level[v as usize]));
        vars.dedup();
        let mut res = 1;
        for var in vars {
            res = self.make_node(var, 0, res)?;
            self.stack.push(res);
        }
        Ok(res)
    }

    /// The variable set (positive cube) of `vars`.
    pub fn make_set(&mut self, vars: &[u32]) -> Result<Ref> {
        for &v in vars {
            self.check_var(v)?;
        }
        let vars = vars.to_vec();
        self.run_op(&[], |bdd| bdd.build_set(vars.clone()))
    }

    /// Variables of a variable set, top to bottom.
    pub fn var_set_to_vars(&self, varset: Ref) -> Result<Vec<u32>> {
        let mut n = self.check(varset)?;
        if n == 0 {
            return Err(BddError::VarSet);
        }
        let mut vars = Vec::new();
        while n > 1 {
            if self.lo(n) != 0 {
                return Err(BddError::VarSet);
            }
            vars.push(self.var_of(n));
            n = self.hi(n);
        }
        Ok(vars)
    }

    /// The set of variables `f` depends on. Constants have the empty set.
    pub fn support(&mut self, f: Ref) -> Result<Ref> {
        debug!("support(f = {})", f);
        let f = self.check(f)?;
        self.run_op(&[f], |bdd| {
            let mut vars: Vec<u32> = bdd.descendants([f]).into_iter().map(|n| bdd.var_of(n)).collect();
            vars.sort_unstable();
            vars.dedup();
            bdd.build_set(vars)
        })
    }

    /// Value of `f` under `assignment`, indexed by variable.
    pub fn eval(&self, f: Ref, assignment: &[bool]) -> Result<bool> {
        let mut n = self.check(f)?;
        if assignment.len() < self.var_num as usize {
            return Err(BddError::VarNum {
                expected: self.var_num as usize,
                actual: assignment.len(),
            });
        }
        while n > 1 {
            n = if assignment[self.var_of(n) as usize] {
                self.hi(n)
            } else {
                self.lo(n)
            };
        }
        Ok(n == 1)
    }

    /// Check reducedness, ordering and unique-table consistency of every
    /// live node.
    pub fn validate(&self) -> Result<()> {
        for n in self.table.live() {
            let node = *self.table.node(n);
            if node.var >= self.var_num {
                return Err(BddError::Nodes(format!("node {} has unknown variable {}", n, node.var)));
            }
            if node.low == node.high {
                return Err(BddError::Nodes(format!("node {} is redundant", n)));
            }
            for child in [node.low, node.high] {
                if !self.table.is_live(child) && child >= 2 {
                    return Err(BddError::Nodes(format!("node {} points to free slot {}", n, child)));
                }
                if self.lvl(child) <= self.lvl(n) {
                    return Err(BddError::Order(format!(
                        "node {} at level {} has child {} at level {}",
                        n,
                        self.lvl(n),
                        child,
                        self.lvl(child)
                    )));
                }
            }
            if self.table.find(&node) != Some(n) {
                return Err(BddError::Nodes(format!("node {} is missing from the unique table", n)));
            }
        }
        Ok(())
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
    fn test_node_count() {
        let (mut bdd, x) = setup(3);
        assert_eq!(bdd.node_count(bdd.one()).unwrap(), 0);
        assert_eq!(bdd.node_count(x[0]).unwrap(), 1);
        let f = bdd.apply_xor(x[0], x[1]).unwrap();
        assert_eq!(bdd.node_count(f).unwrap(), 3);
        let g = bdd.apply_and(x[1], x[2]).unwrap();
        assert_eq!(bdd.node_count_many(&[f, g]).unwrap(), 5);
        assert_eq!(bdd.var_profile(f).unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn test_make_set() {
        let (mut bdd, x) = setup(3);
        let set = bdd.make_set(&[2, 0, 2]).unwrap();
        assert_eq!(set, bdd.apply_and(x[0], x[2]).unwrap());
        assert_eq!(bdd.var_set_to_vars(set).unwrap(), vec![0, 2]);
        assert_eq!(bdd.make_set(&[]).unwrap(), bdd.one());
        assert!(matches!(bdd.make_set(&[3]), Err(BddError::UnknownVar { .. })));

        let f = bdd.apply_or(x[0], x[1]).unwrap();
        assert!(matches!(bdd.var_set_to_vars(f), Err(BddError::VarSet)));
    }

    #[test]
    fn test_support() {
        let (mut bdd, x) = setup(4);
        let f = bdd.apply_xor(x[3], x[1]).unwrap();
        let support = bdd.support(f).unwrap();
        assert_eq!(bdd.var_set_to_vars(support).unwrap(), vec![1, 3]);
        assert_eq!(bdd.support(bdd.one()).unwrap(), bdd.one());
        assert_eq!(bdd.support(bdd.zero()).unwrap(), bdd.one());
    }

    #[test]
    fn test_eval() {
        let (mut bdd, x) = setup(2);
        let f = bdd.apply_imp(x[0], x[1]).unwrap();
        assert!(bdd.eval(f, &[false, false]).unwrap());
        assert!(!bdd.eval(f, &[true, false]).unwrap());
        assert!(matches!(bdd.eval(f, &[true]), Err(BddError::VarNum { .. })));
    }

    #[test]
    fn test_validate() {
        let (mut bdd, x) = setup(3);
        let a = bdd.apply_or(x[0], x[1]).unwrap();
        bdd.apply_xor(a, x[2]).unwrap();
        assert!(bdd.validate().is_ok());
    }
}
