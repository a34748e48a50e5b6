//! Model counting and satisfying assignments.
//!
//! Counts are computed bottom-up over the diagram with an explicit stack. A
//! node at level `l` whose child sits at level `l'` skips `l' - l - 1`
//! levels, each of which doubles the number of models through that edge.

use std::collections::HashMap;

use log::debug;
use num_bigint::BigUint;

use crate::bdd::Bdd;
use crate::cache::kind;
use crate::engine::Step;
use crate::error::Result;
use crate::reference::Ref;

impl Bdd {
    /// Post-order fold over the nodes below `root`.
    ///
    /// `lookup` and `store` give access to an outer memo (the count cache);
    /// results are also kept locally for the duration of the fold.
    fn fold<T: Clone>(
        &mut self,
        root: u32,
        leaf: impl Fn(u32) -> T,
        node: impl Fn(&Bdd, u32, T, T) -> T,
        mut lookup: impl FnMut(&mut Bdd, u32) -> Option<T>,
        mut store: impl FnMut(&mut Bdd, u32, &T),
    ) -> T {
        let mut memo: HashMap<u32, T> = HashMap::new();
        let mut stack = vec![(root, false)];
        while let Some((n, expanded)) = stack.pop() {
            if n < 2 || (!expanded && memo.contains_key(&n)) {
                continue;
            }
            if expanded {
                let (lo, hi) = (self.lo(n), self.hi(n));
                let value_lo = if lo < 2 { leaf(lo) } else { memo[&lo].clone() };
                let value_hi = if hi < 2 { leaf(hi) } else { memo[&hi].clone() };
                let value = node(self, n, value_lo, value_hi);
                store(self, n, &value);
                memo.insert(n, value);
            } else if let Some(value) = lookup(self, n) {
                memo.insert(n, value);
            } else {
                stack.push((n, true));
                stack.push((self.hi(n), false));
                stack.push((self.lo(n), false));
            }
        }
        if root < 2 {
            leaf(root)
        } else {
            memo.remove(&root).unwrap_or_else(|| leaf(0))
        }
    }

    fn fold_cached(
        &mut self,
        root: u32,
        tag: u32,
        leaf: impl Fn(u32) -> f64,
        node: impl Fn(&Bdd, u32, f64, f64) -> f64,
    ) -> f64 {
        self.fold(
            root,
            leaf,
            node,
            |bdd, n| bdd.caches.count().get(&[n, tag]),
            |bdd, n, value: &f64| bdd.caches.count().insert([n, tag], *value),
        )
    }

    /// Number of levels skipped along the edge from `n` to `child`.
    fn gap(&self, n: u32, child: u32) -> i32 {
        self.lvl(child) as i32 - self.lvl(n) as i32 - 1
    }

    fn sat_count_raw(&mut self, f: u32) -> f64 {
        let scale = 2f64.powi(self.lvl(f) as i32);
        let count = self.fold_cached(
            f,
            kind::SATCOUNT,
            |t| t as f64,
            |bdd, n, lo, hi| {
                2f64.powi(bdd.gap(n, bdd.lo(n))) * lo + 2f64.powi(bdd.gap(n, bdd.hi(n))) * hi
            },
        );
        scale * count
    }

    /// Number of satisfying assignments over all declared variables.
    pub fn sat_count(&mut self, f: Ref) -> Result<f64> {
        let f = self.check(f)?;
        Ok(self.sat_count_raw(f))
    }

    /// Number of satisfying assignments over the variables of `varset`.
    ///
    /// Assumes the support of `f` lies within `varset`. Returns 0 for an
    /// empty set or a false `f`, and never less than 1 otherwise.
    pub fn sat_count_set(&mut self, f: Ref, varset: Ref) -> Result<f64> {
        let (f, varset) = (self.check(f)?, self.check(varset)?);
        if varset < 2 || f == 0 {
            return Ok(0.0);
        }
        let mut unused = self.var_num as i32;
        let mut n = varset;
        while n > 1 {
            unused -= 1;
            n = self.hi(n);
        }
        let count = self.sat_count_raw(f) / 2f64.powi(unused);
        Ok(count.max(1.0))
    }

    /// Exact number of satisfying assignments over all declared variables.
    pub fn sat_count_exact(&mut self, f: Ref) -> Result<BigUint> {
        let f = self.check(f)?;
        let count = self.fold(
            f,
            |t: u32| BigUint::from(t),
            |bdd: &Bdd, n, lo: BigUint, hi: BigUint| {
                (lo << bdd.gap(n, bdd.lo(n)) as usize) + (hi << bdd.gap(n, bdd.hi(n)) as usize)
            },
            |_: &mut Bdd, _| None,
            |_: &mut Bdd, _, _: &BigUint| {},
        );
        Ok(count << self.lvl(f) as usize)
    }

    /// Base-2 logarithm of [`sat_count`](Bdd::sat_count), without overflow.
    ///
    /// The false function gives negative infinity.
    pub fn sat_count_ln(&mut self, f: Ref) -> Result<f64> {
        let f = self.check(f)?;
        let log = self.fold_cached(
            f,
            kind::SATCOUNT_LN,
            |t| if t == 0 { f64::NEG_INFINITY } else { 0.0 },
            |bdd, n, lo, hi| {
                let lo = lo + bdd.gap(n, bdd.lo(n)) as f64;
                let hi = hi + bdd.gap(n, bdd.hi(n)) as f64;
                log2_sum(lo, hi)
            },
        );
        Ok(log + self.lvl(f) as f64)
    }

    /// Number of paths from `f` to the true terminal.
    pub fn path_count(&mut self, f: Ref) -> Result<f64> {
        let f = self.check(f)?;
        Ok(self.fold_cached(f, kind::PATHCOUNT, |t| t as f64, |_, _, lo, hi| lo + hi))
    }

    /// Build the conjunction of `literals` (`(var, value)`, top to bottom)
    /// above `base`. Every intermediate result stays on the operation stack.
    fn build_cube(&mut self, literals: &[(u32, bool)], base: u32) -> Step<u32> {
        let mut res = base;
        for &(var, value) in literals.iter().rev() {
            res = if value {
                self.make_node(var, 0, res)?
            } else {
                self.make_node(var, res, 0)?
            };
            self.stack.push(res);
        }
        Ok(res)
    }

    /// One satisfying assignment of `f`, as a cube over the variables on the
    /// chosen path. Low branches are preferred.
    pub fn sat_one(&mut self, f: Ref) -> Result<Ref> {
        debug!("sat_one(f = {})", f);
        let f = self.check(f)?;
        if f < 2 {
            return Ok(self.output(f));
        }
        self.run_op(&[f], |bdd| {
            let mut literals = Vec::new();
            let mut n = f;
            while n > 1 {
                if bdd.lo(n) == 0 {
                    literals.push((bdd.var_of(n), true));
                    n = bdd.hi(n);
                } else {
                    literals.push((bdd.var_of(n), false));
                    n = bdd.lo(n);
                }
            }
            bdd.build_cube(&literals, n)
        })
    }

    /// Like [`sat_one`](Bdd::sat_one), but every variable of `varset` appears
    /// in the cube; those not fixed by the path get polarity `pol`.
    pub fn sat_one_set(&mut self, f: Ref, varset: Ref, pol: bool) -> Result<Ref> {
        debug!("sat_one_set(f = {}, varset = {}, pol = {})", f, varset, pol);
        let (f, varset) = (self.check(f)?, self.check(varset)?);
        if f == 0 {
            return Ok(self.output(f));
        }
        self.run_op(&[f, varset], |bdd| {
            let mut literals = Vec::new();
            let (mut r, mut v) = (f, varset);
            while r > 1 || v > 1 {
                let (level_r, level_v) = (bdd.lvl(r), bdd.lvl(v));
                if level_v < level_r {
                    literals.push((bdd.var_of(v), pol));
                    v = bdd.hi(v);
                    continue;
                }
                if level_r == level_v {
                    v = bdd.hi(v);
                }
                if bdd.lo(r) == 0 {
                    literals.push((bdd.var_of(r), true));
                    r = bdd.hi(r);
                } else {
                    literals.push((bdd.var_of(r), false));
                    r = bdd.lo(r);
                }
            }
            bdd.build_cube(&literals, r)
        })
    }

    /// One satisfying assignment of `f` over all declared variables, as a
    /// minterm. Variables not on the chosen path are false.
    pub fn full_sat_one(&mut self, f: Ref) -> Result<Ref> {
        debug!("full_sat_one(f = {})", f);
        let f = self.check(f)?;
        if f == 0 {
            return Ok(self.output(f));
        }
        self.run_op(&[f], |bdd| {
            let mut values = vec![false; bdd.var_num as usize];
            let mut n = f;
            while n > 1 {
                let level = bdd.lvl(n) as usize;
                if bdd.lo(n) != 0 {
                    n = bdd.lo(n);
                } else {
                    values[level] = true;
                    n = bdd.hi(n);
                }
            }
            let literals: Vec<(u32, bool)> = values
                .iter()
                .enumerate()
                .map(|(level, &value)| (bdd.level2var[level], value))
                .collect();
            bdd.build_cube(&literals, 1)
        })
    }
}

/// `log2(2^a + 2^b)`.
fn log2_sum(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (1.0 + 2f64.powf(lo - hi)).log2()
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
    fn test_sat_count_terminal() {
        let (mut bdd, _) = setup(3);
        assert_eq!(bdd.sat_count(bdd.zero()).unwrap(), 0.0);
        assert_eq!(bdd.sat_count(bdd.one()).unwrap(), 8.0);
        assert_eq!(bdd.sat_count_exact(bdd.one()).unwrap(), BigUint::from(8u32));
        assert_eq!(bdd.sat_count_exact(bdd.zero()).unwrap(), BigUint::from(0u32));
    }

    #[test]
    fn test_sat_count_var() {
        let (mut bdd, x) = setup(3);
        for &v in &x {
            assert_eq!(bdd.sat_count(v).unwrap(), 4.0);
        }
        let f = bdd.apply_or(x[0], x[2]).unwrap();
        assert_eq!(bdd.sat_count(f).unwrap(), 6.0);
        assert_eq!(bdd.sat_count_exact(f).unwrap(), BigUint::from(6u32));
        assert_eq!(bdd.path_count(f).unwrap(), 2.0);
    }

    #[test]
    fn test_sat_count_set() {
        let (mut bdd, x) = setup(4);
        let f = bdd.apply_and(x[1], x[2]).unwrap();
        let set = bdd.make_set(&[1, 2]).unwrap();
        assert_eq!(bdd.sat_count_set(f, set).unwrap(), 1.0);
        let set = bdd.make_set(&[0, 1, 2]).unwrap();
        assert_eq!(bdd.sat_count_set(f, set).unwrap(), 2.0);
        assert_eq!(bdd.sat_count_set(f, bdd.one()).unwrap(), 0.0);
        assert_eq!(bdd.sat_count_set(bdd.zero(), set).unwrap(), 0.0);

        // Adding variables does not change a count relative to a set.
        bdd.set_var_num(20).unwrap();
        assert_eq!(bdd.sat_count_set(f, set).unwrap(), 2.0);
    }

    #[test]
    fn test_sat_count_ln() {
        let (mut bdd, x) = setup(10);
        let f = bdd.apply_or_many(x.iter().copied()).unwrap();
        let ln = bdd.sat_count_ln(f).unwrap();
        assert!((ln - 1023f64.log2()).abs() < 1e-9);
        assert_eq!(bdd.sat_count_ln(bdd.zero()).unwrap(), f64::NEG_INFINITY);
        assert_eq!(bdd.sat_count_ln(bdd.one()).unwrap(), 10.0);
    }

    #[test]
    fn test_sat_count_large() {
        let (mut bdd, x) = setup(100);
        let f = bdd.apply_xor(x[0], x[99]).unwrap();
        let exact = bdd.sat_count_exact(f).unwrap();
        assert_eq!(exact, BigUint::from(1u32) << 99usize);
        assert_eq!(bdd.sat_count(f).unwrap(), 2f64.powi(99));
    }

    #[test]
    fn test_sat_one() {
        let (mut bdd, x) = setup(3);
        let nx1 = bdd.nith_var(1).unwrap();
        let a = bdd.apply_and(x[0], nx1).unwrap();
        let f = bdd.apply_and(a, x[2]).unwrap();
        assert_eq!(bdd.sat_one(f).unwrap(), f);

        let g = bdd.apply_or(x[0], x[1]).unwrap();
        let m = bdd.sat_one(g).unwrap();
        // Low branch first: ¬x0 ∧ x1.
        let nx0 = bdd.nith_var(0).unwrap();
        assert_eq!(m, bdd.apply_and(nx0, x[1]).unwrap());

        assert_eq!(bdd.sat_one(bdd.zero()).unwrap(), bdd.zero());
    }

    #[test]
    fn test_sat_one_set() {
        let (mut bdd, x) = setup(3);
        let set = bdd.make_set(&[0, 2]).unwrap();
        let m = bdd.sat_one_set(x[1], set, true).unwrap();
        let expected = bdd.apply_and_many([x[0], x[1], x[2]]).unwrap();
        assert_eq!(m, expected);

        let m = bdd.sat_one_set(x[1], set, false).unwrap();
        assert_eq!(bdd.sat_count(m).unwrap(), 1.0);
        assert!(bdd.eval(m, &[false, true, false]).unwrap());
    }

    #[test]
    fn test_full_sat_one() {
        let (mut bdd, x) = setup(4);
        let f = bdd.apply_or(x[1], x[3]).unwrap();
        let m = bdd.full_sat_one(f).unwrap();
        assert_eq!(bdd.sat_count(m).unwrap(), 1.0);
        assert!(bdd.eval(m, &[false, false, false, true]).unwrap());
        let implied = bdd.apply_imp(m, f).unwrap();
        assert_eq!(implied, bdd.one());
    }
}
