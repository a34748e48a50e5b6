//! Substitution: functional composition and variable replacement.
//!
//! - [`Bdd::compose`] substitutes one function for one variable.
//! - [`Bdd::vec_compose`] substitutes simultaneously along a pairing.
//! - [`Bdd::replace`] renames variables along a pairing. The replacement
//!   level of a node may lie below its children, so every rebuilt node goes
//!   through a "correctify" step that sinks the variable to its place.

use log::debug;

use crate::bdd::Bdd;
use crate::cache::kind;
use crate::engine::{Expansion, Recursion, Step};
use crate::error::{BddError, Result};
use crate::pairing::PairId;
use crate::reference::Ref;

struct ComposeRec {
    level: u32,
}

impl ComposeRec {
    fn tag(&self) -> u32 {
        (self.level << 2) | kind::COMPOSE
    }
}

impl Recursion for ComposeRec {
    type Key = (u32, u32);

    fn expand(&mut self, bdd: &mut Bdd, (f, g): (u32, u32)) -> Step<Expansion<(u32, u32)>> {
        let level_f = bdd.lvl(f);
        if level_f > self.level {
            return Ok(Expansion::Done(f));
        }
        if let Some(res) = bdd.caches.misc().get(&[f, g, self.tag()]) {
            return Ok(Expansion::Done(res));
        }

        if level_f == self.level {
            let res = bdd.ite_rec(g, bdd.hi(f), bdd.lo(f))?;
            bdd.caches.misc().insert([f, g, self.tag()], res);
            return Ok(Expansion::Done(res));
        }

        let level_g = bdd.lvl(g);
        Ok(if level_f == level_g {
            Expansion::Branch {
                var: bdd.var_of(f),
                low: (bdd.lo(f), bdd.lo(g)),
                high: (bdd.hi(f), bdd.hi(g)),
            }
        } else if level_f < level_g {
            Expansion::Branch {
                var: bdd.var_of(f),
                low: (bdd.lo(f), g),
                high: (bdd.hi(f), g),
            }
        } else {
            Expansion::Branch {
                var: bdd.var_of(g),
                low: (f, bdd.lo(g)),
                high: (f, bdd.hi(g)),
            }
        })
    }

    fn store(&mut self, bdd: &mut Bdd, (f, g): (u32, u32), result: u32) {
        bdd.caches.misc().insert([f, g, self.tag()], result);
    }
}

struct VecComposeRec {
    result: Vec<u32>,
    last: i32,
    tag: u32,
}

impl Recursion for VecComposeRec {
    type Key = u32;

    fn expand(&mut self, bdd: &mut Bdd, f: u32) -> Step<Expansion<u32>> {
        if bdd.lvl(f) as i32 > self.last {
            return Ok(Expansion::Done(f));
        }
        if let Some(res) = bdd.caches.replace().get(&[f, self.tag, kind::VECCOMPOSE]) {
            return Ok(Expansion::Done(res));
        }
        Ok(Expansion::Branch {
            var: bdd.var_of(f),
            low: bdd.lo(f),
            high: bdd.hi(f),
        })
    }

    fn combine(&mut self, bdd: &mut Bdd, _f: u32, var: u32, low: u32, high: u32) -> Step<u32> {
        let level = bdd.var2level[var as usize];
        bdd.ite_rec(self.result[level as usize], high, low)
    }

    fn store(&mut self, bdd: &mut Bdd, f: u32, result: u32) {
        bdd.caches.replace().insert([f, self.tag, kind::VECCOMPOSE], result);
    }
}

struct ReplaceRec {
    result: Vec<u32>,
    last: i32,
    tag: u32,
}

impl Recursion for ReplaceRec {
    type Key = u32;

    fn expand(&mut self, bdd: &mut Bdd, r: u32) -> Step<Expansion<u32>> {
        if r < 2 || bdd.lvl(r) as i32 > self.last {
            return Ok(Expansion::Done(r));
        }
        if let Some(res) = bdd.caches.replace().get(&[r, self.tag, kind::REPLACE]) {
            return Ok(Expansion::Done(res));
        }
        Ok(Expansion::Branch {
            var: bdd.var_of(r),
            low: bdd.lo(r),
            high: bdd.hi(r),
        })
    }

    fn combine(&mut self, bdd: &mut Bdd, _r: u32, var: u32, low: u32, high: u32) -> Step<u32> {
        let level = bdd.var2level[var as usize];
        let target = self.result[level as usize];
        if target < 2 {
            return Err(BddError::Replace { level }.into());
        }
        let level = bdd.lvl(target);
        bdd.evaluate(&mut CorrectifyRec { level }, (low, high))
    }

    fn store(&mut self, bdd: &mut Bdd, r: u32, result: u32) {
        bdd.caches.replace().insert([r, self.tag, kind::REPLACE], result);
    }
}

/// Builds `(level ? high : low)` when `level` may lie below the roots of
/// `low` and `high`.
struct CorrectifyRec {
    level: u32,
}

impl Recursion for CorrectifyRec {
    type Key = (u32, u32);

    fn expand(&mut self, bdd: &mut Bdd, (l, r): (u32, u32)) -> Step<Expansion<(u32, u32)>> {
        let (level_l, level_r) = (bdd.lvl(l), bdd.lvl(r));
        if self.level < level_l && self.level < level_r {
            let var = bdd.level2var[self.level as usize];
            return Ok(Expansion::Done(bdd.make_node(var, l, r)?));
        }
        if self.level == level_l || self.level == level_r {
            return Err(BddError::Replace { level: self.level }.into());
        }
        Ok(if level_l == level_r {
            Expansion::Branch {
                var: bdd.var_of(l),
                low: (bdd.lo(l), bdd.lo(r)),
                high: (bdd.hi(l), bdd.hi(r)),
            }
        } else if level_l < level_r {
            Expansion::Branch {
                var: bdd.var_of(l),
                low: (bdd.lo(l), r),
                high: (bdd.hi(l), r),
            }
        } else {
            Expansion::Branch {
                var: bdd.var_of(r),
                low: (l, bdd.lo(r)),
                high: (l, bdd.hi(r)),
            }
        })
    }

    fn store(&mut self, _bdd: &mut Bdd, _key: (u32, u32), _result: u32) {}
}

impl Bdd {
    /// Substitute `g` for variable `var` in `f`.
    pub fn compose(&mut self, f: Ref, g: Ref, var: u32) -> Result<Ref> {
        debug!("compose(f = {}, g = {}, var = {})", f, g, var);
        let (f, g) = (self.check(f)?, self.check(g)?);
        self.check_var(var)?;
        self.run_op(&[f, g], |bdd| {
            let level = bdd.var2level[var as usize];
            bdd.evaluate(&mut ComposeRec { level }, (f, g))
        })
    }

    /// Simultaneously substitute every variable of `f` by its function in `pair`.
    pub fn vec_compose(&mut self, f: Ref, pair: PairId) -> Result<Ref> {
        debug!("vec_compose(f = {}, pair = {})", f, pair);
        let f = self.check(f)?;
        self.pair(pair)?;
        self.run_op(&[f], |bdd| {
            let mut rec = match bdd.pair(pair) {
                Ok(p) => VecComposeRec {
                    result: p.result.clone(),
                    last: p.last,
                    tag: p.id,
                },
                Err(e) => return Err(e.into()),
            };
            bdd.evaluate(&mut rec, f)
        })
    }

    /// Rename the variables of `f` along `pair`.
    ///
    /// Fails with [`BddError::Replace`] when a new variable collides with a
    /// variable already present below it.
    pub fn replace(&mut self, f: Ref, pair: PairId) -> Result<Ref> {
        debug!("replace(f = {}, pair = {})", f, pair);
        let f = self.check(f)?;
        self.pair(pair)?;
        self.run_op(&[f], |bdd| {
            let mut rec = match bdd.pair(pair) {
                Ok(p) => ReplaceRec {
                    result: p.result.clone(),
                    last: p.last,
                    tag: p.id,
                },
                Err(e) => return Err(e.into()),
            };
            bdd.evaluate(&mut rec, f)
        })
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
    fn test_compose() {
        let (mut bdd, x) = setup(3);
        let f = bdd.apply_and(x[0], x[1]).unwrap();
        let g = bdd.apply_or(x[1], x[2]).unwrap();
        // (x0 ∧ x1)[x0 := x1 ∨ x2] = x1
        let h = bdd.compose(f, g, 0).unwrap();
        assert_eq!(h, x[1]);
        // Composing a variable that does not occur is the identity.
        assert_eq!(bdd.compose(f, g, 2).unwrap(), f);
        assert!(matches!(bdd.compose(f, g, 3), Err(BddError::UnknownVar { .. })));
    }

    #[test]
    fn test_compose_above() {
        let (mut bdd, x) = setup(3);
        let f = bdd.apply_xor(x[1], x[2]).unwrap();
        // g's root lies above f's root.
        let h = bdd.compose(f, x[0], 2).unwrap();
        let expected = bdd.apply_xor(x[1], x[0]).unwrap();
        assert_eq!(h, expected);
    }

    #[test]
    fn test_replace() {
        let (mut bdd, x) = setup(4);
        let f = bdd.apply_and(x[0], x[1]).unwrap();
        let p = bdd.make_pair();
        bdd.set_pairs(p, &[0, 1], &[2, 3]).unwrap();
        let g = bdd.replace(f, p).unwrap();
        assert_eq!(g, bdd.apply_and(x[2], x[3]).unwrap());
    }

    #[test]
    fn test_replace_swap() {
        let (mut bdd, x) = setup(2);
        let nx1 = bdd.nith_var(1).unwrap();
        let f = bdd.apply_and(x[0], nx1).unwrap();
        let p = bdd.make_pair();
        bdd.set_pairs(p, &[0, 1], &[1, 0]).unwrap();
        let g = bdd.replace(f, p).unwrap();
        let nx0 = bdd.nith_var(0).unwrap();
        assert_eq!(g, bdd.apply_and(x[1], nx0).unwrap());
    }

    #[test]
    fn test_replace_collision() {
        let (mut bdd, x) = setup(2);
        let f = bdd.apply_and(x[0], x[1]).unwrap();
        let p = bdd.make_pair();
        bdd.set_pair(p, 0, 1).unwrap();
        assert!(matches!(bdd.replace(f, p), Err(BddError::Replace { .. })));
    }

    #[test]
    fn test_vec_compose() {
        let (mut bdd, x) = setup(3);
        let f = bdd.apply_xor(x[0], x[1]).unwrap();
        let g = bdd.apply_and(x[1], x[2]).unwrap();
        let p = bdd.make_pair();
        bdd.set_bdd_pair(p, 0, g).unwrap();
        bdd.set_bdd_pair(p, 1, x[2]).unwrap();
        // (x0 ⊕ x1)[x0 := x1 ∧ x2, x1 := x2] = (x1 ∧ x2) ⊕ x2 = ¬x1 ∧ x2
        let h = bdd.vec_compose(f, p).unwrap();
        let nx1 = bdd.nith_var(1).unwrap();
        assert_eq!(h, bdd.apply_and(nx1, x[2]).unwrap());
    }
}
