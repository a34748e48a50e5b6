//! Quantification: `exist`, `forall`, `unique`, and the fused
//! apply-then-quantify operations (`app_ex`, `app_all`, `app_uni`, `rel_prod`).
//!
//! Before a quantification the variable set is unpacked into a level-indexed
//! table (`QuantState`), so membership tests during the recursion are O(1).
//! Each unpacking gets a fresh id, which makes clearing the table unnecessary.

use log::debug;

use crate::apply::BddOp;
use crate::bdd::Bdd;
use crate::cache::kind;
use crate::engine::{Expansion, Recursion, Step};
use crate::error::Result;
use crate::reference::Ref;

#[derive(Debug)]
pub(crate) struct QuantState {
    /// Per level: `id` or `-id` (negative literal in a cube) when the level is
    /// part of the current set.
    set: Vec<i32>,
    id: i32,
    /// Deepest level of the current set, `-1` when empty.
    pub last: i32,
}

impl Default for QuantState {
    fn default() -> Self {
        Self {
            set: Vec::new(),
            id: 0,
            last: -1,
        }
    }
}

impl QuantState {
    pub fn resize(&mut self, levels: usize) {
        self.set.clear();
        self.set.resize(levels, 0);
        self.id = 0;
        self.last = -1;
    }

    fn next_id(&mut self) {
        if self.id == i32::MAX {
            self.set.fill(0);
            self.id = 0;
        }
        self.id += 1;
        self.last = -1;
    }

    fn insert(&mut self, level: u32, positive: bool) {
        self.set[level as usize] = if positive { self.id } else { -self.id };
        self.last = self.last.max(level as i32);
    }

    /// Whether `level` lies below every level of the current set.
    pub fn is_below(&self, level: u32) -> bool {
        level as i32 > self.last
    }

    pub fn contains(&self, level: u32) -> bool {
        self.set[level as usize].abs() == self.id
    }

    /// Polarity of `level` in the current cube, if present.
    pub fn polarity(&self, level: u32) -> Option<bool> {
        let v = self.set[level as usize];
        if v == self.id {
            Some(true)
        } else if v == -self.id {
            Some(false)
        } else {
            None
        }
    }
}

impl Bdd {
    /// Unpack a variable set: every node along the high-edge chain.
    pub(crate) fn prepare_varset(&mut self, varset: u32) {
        self.quant.next_id();
        let mut n = varset;
        while n > 1 {
            let level = self.lvl(n);
            self.quant.insert(level, true);
            n = self.hi(n);
        }
    }

    /// Unpack a cube of literals: a node with a false low edge is a positive
    /// literal, otherwise a negative one.
    pub(crate) fn prepare_cube(&mut self, cube: u32) {
        self.quant.next_id();
        let mut n = cube;
        while n > 1 {
            let level = self.lvl(n);
            if self.lo(n) == 0 {
                self.quant.insert(level, true);
                n = self.hi(n);
            } else {
                self.quant.insert(level, false);
                n = self.lo(n);
            }
        }
    }
}

#[derive(Copy, Clone)]
pub(crate) struct QuantRec {
    /// Combines the two cofactors of a quantified variable.
    pub op: BddOp,
    pub kind: u32,
    pub varset: u32,
}

impl Recursion for QuantRec {
    type Key = u32;

    fn expand(&mut self, bdd: &mut Bdd, r: u32) -> Step<Expansion<u32>> {
        if r < 2 || bdd.quant.is_below(bdd.lvl(r)) {
            return Ok(Expansion::Done(r));
        }
        if let Some(res) = bdd.caches.quant().get(&[r, self.varset, self.kind]) {
            return Ok(Expansion::Done(res));
        }
        Ok(Expansion::Branch {
            var: bdd.var_of(r),
            low: bdd.lo(r),
            high: bdd.hi(r),
        })
    }

    fn combine(&mut self, bdd: &mut Bdd, _r: u32, var: u32, low: u32, high: u32) -> Step<u32> {
        if bdd.quant.contains(bdd.var2level[var as usize]) {
            bdd.apply_rec(self.op, low, high)
        } else {
            bdd.make_node(var, low, high)
        }
    }

    fn store(&mut self, bdd: &mut Bdd, r: u32, result: u32) {
        bdd.caches.quant().insert([r, self.varset, self.kind], result);
    }
}

struct AppQuantRec {
    app: BddOp,
    quant: QuantRec,
}

impl AppQuantRec {
    fn quant(&self, bdd: &mut Bdd, r: u32) -> Step<Expansion<(u32, u32)>> {
        let mut rec = self.quant;
        Ok(Expansion::Done(bdd.evaluate(&mut rec, r)?))
    }

    fn key(&self, l: u32, r: u32) -> [u32; 4] {
        [l, r, self.quant.varset, (self.quant.kind << 4) | self.app.id()]
    }
}

impl Recursion for AppQuantRec {
    type Key = (u32, u32);

    fn expand(&mut self, bdd: &mut Bdd, (l, r): (u32, u32)) -> Step<Expansion<(u32, u32)>> {
        match self.app {
            BddOp::And => {
                if l == 0 || r == 0 {
                    return Ok(Expansion::Done(0));
                }
                if l == r || r == 1 {
                    return self.quant(bdd, l);
                }
                if l == 1 {
                    return self.quant(bdd, r);
                }
            }
            BddOp::Or => {
                if l == 1 || r == 1 {
                    return Ok(Expansion::Done(1));
                }
                if l == r || r == 0 {
                    return self.quant(bdd, l);
                }
                if l == 0 {
                    return self.quant(bdd, r);
                }
            }
            BddOp::Xor => {
                if l == r {
                    return Ok(Expansion::Done(0));
                }
                if l == 0 {
                    return self.quant(bdd, r);
                }
                if r == 0 {
                    return self.quant(bdd, l);
                }
            }
            BddOp::Nand => {
                if l == 0 || r == 0 {
                    return Ok(Expansion::Done(1));
                }
            }
            BddOp::Nor => {
                if l == 1 || r == 1 {
                    return Ok(Expansion::Done(0));
                }
            }
            _ => {}
        }
        if l < 2 && r < 2 {
            if let Some(res) = self.app.shortcut(l, r) {
                return Ok(Expansion::Done(res));
            }
        }

        let (level_l, level_r) = (bdd.lvl(l), bdd.lvl(r));
        if bdd.quant.is_below(level_l) && bdd.quant.is_below(level_r) {
            return Ok(Expansion::Done(bdd.apply_rec(self.app, l, r)?));
        }
        if let Some(res) = bdd.caches.appex().get(&self.key(l, r)) {
            return Ok(Expansion::Done(res));
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

    fn combine(&mut self, bdd: &mut Bdd, key: (u32, u32), var: u32, low: u32, high: u32) -> Step<u32> {
        self.quant.combine(bdd, key.0, var, low, high)
    }

    fn store(&mut self, bdd: &mut Bdd, (l, r): (u32, u32), result: u32) {
        bdd.caches.appex().insert(self.key(l, r), result);
    }
}

impl Bdd {
    fn quantify(&mut self, f: Ref, varset: Ref, op: BddOp, kind: u32) -> Result<Ref> {
        let (f, varset) = (self.check(f)?, self.check(varset)?);
        if varset < 2 {
            return Ok(self.output(f));
        }
        self.run_op(&[f, varset], |bdd| {
            bdd.prepare_varset(varset);
            bdd.evaluate(&mut QuantRec { op, kind, varset }, f)
        })
    }

    /// Existential quantification of the variables in `varset`.
    pub fn exist(&mut self, f: Ref, varset: Ref) -> Result<Ref> {
        debug!("exist(f = {}, varset = {})", f, varset);
        self.quantify(f, varset, BddOp::Or, kind::EXIST)
    }

    /// Universal quantification of the variables in `varset`.
    pub fn forall(&mut self, f: Ref, varset: Ref) -> Result<Ref> {
        debug!("forall(f = {}, varset = {})", f, varset);
        self.quantify(f, varset, BddOp::And, kind::FORALL)
    }

    /// Unique quantification: `f[x := 0] ⊕ f[x := 1]` for every `x` in `varset`.
    pub fn unique(&mut self, f: Ref, varset: Ref) -> Result<Ref> {
        debug!("unique(f = {}, varset = {})", f, varset);
        self.quantify(f, varset, BddOp::Xor, kind::UNIQUE)
    }

    fn app_quantify(&mut self, l: Ref, r: Ref, app: BddOp, varset: Ref, op: BddOp, kind: u32) -> Result<Ref> {
        let (l, r, varset) = (self.check(l)?, self.check(r)?, self.check(varset)?);
        if varset < 2 {
            return self.run_op(&[l, r], |bdd| bdd.apply_rec(app, l, r));
        }
        self.run_op(&[l, r, varset], |bdd| {
            bdd.prepare_varset(varset);
            let quant = QuantRec { op, kind, varset };
            bdd.evaluate(&mut AppQuantRec { app, quant }, (l, r))
        })
    }

    /// `exist(apply(l, r, op), varset)`, without building the intermediate result.
    pub fn app_ex(&mut self, l: Ref, r: Ref, op: BddOp, varset: Ref) -> Result<Ref> {
        debug!("app_ex(l = {}, r = {}, op = {}, varset = {})", l, r, op, varset);
        self.app_quantify(l, r, op, varset, BddOp::Or, kind::EXIST)
    }

    /// `forall(apply(l, r, op), varset)`.
    pub fn app_all(&mut self, l: Ref, r: Ref, op: BddOp, varset: Ref) -> Result<Ref> {
        debug!("app_all(l = {}, r = {}, op = {}, varset = {})", l, r, op, varset);
        self.app_quantify(l, r, op, varset, BddOp::And, kind::FORALL)
    }

    /// `unique(apply(l, r, op), varset)`.
    pub fn app_uni(&mut self, l: Ref, r: Ref, op: BddOp, varset: Ref) -> Result<Ref> {
        debug!("app_uni(l = {}, r = {}, op = {}, varset = {})", l, r, op, varset);
        self.app_quantify(l, r, op, varset, BddOp::Xor, kind::UNIQUE)
    }

    /// Relational product: `exist(l ∧ r, varset)`.
    pub fn rel_prod(&mut self, l: Ref, r: Ref, varset: Ref) -> Result<Ref> {
        self.app_ex(l, r, BddOp::And, varset)
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
    fn test_exist() {
        let (mut bdd, x) = setup(2);
        let f = bdd.apply_and(x[0], x[1]).unwrap();
        let set = bdd.make_set(&[0]).unwrap();
        assert_eq!(bdd.exist(f, set).unwrap(), x[1]);
        assert_eq!(bdd.sat_count(f).unwrap(), 1.0);
    }

    #[test]
    fn test_forall() {
        let (mut bdd, x) = setup(2);
        let f = bdd.apply_or(x[0], x[1]).unwrap();
        let set = bdd.make_set(&[0]).unwrap();
        assert_eq!(bdd.forall(f, set).unwrap(), x[1]);
        let all = bdd.make_set(&[0, 1]).unwrap();
        assert_eq!(bdd.forall(f, all).unwrap(), bdd.zero());
        assert_eq!(bdd.exist(f, all).unwrap(), bdd.one());
    }

    #[test]
    fn test_unique() {
        let (mut bdd, x) = setup(2);
        let f = bdd.apply_or(x[0], x[1]).unwrap();
        let set = bdd.make_set(&[0]).unwrap();
        let nx1 = bdd.nith_var(1).unwrap();
        assert_eq!(bdd.unique(f, set).unwrap(), nx1);
    }

    #[test]
    fn test_empty_set() {
        let (mut bdd, x) = setup(2);
        let f = bdd.apply_xor(x[0], x[1]).unwrap();
        assert_eq!(bdd.exist(f, bdd.one()).unwrap(), f);
        assert_eq!(bdd.rel_prod(x[0], x[1], bdd.one()).unwrap(), bdd.apply_and(x[0], x[1]).unwrap());
    }

    #[test]
    fn test_app_ex_matches_two_steps() {
        let (mut bdd, x) = setup(4);
        let a = bdd.apply_xor(x[0], x[2]).unwrap();
        let b = bdd.apply_or(x[1], x[3]).unwrap();
        let set = bdd.make_set(&[2, 3]).unwrap();
        for op in BddOp::ALL {
            let fused = bdd.app_ex(a, b, op, set).unwrap();
            let tmp = bdd.apply(a, b, op).unwrap();
            let expected = bdd.exist(tmp, set).unwrap();
            assert_eq!(fused, expected, "app_ex with {}", op);

            let fused = bdd.app_all(a, b, op, set).unwrap();
            let expected = bdd.forall(tmp, set).unwrap();
            assert_eq!(fused, expected, "app_all with {}", op);
        }
    }

    #[test]
    fn test_app_uni_quantifies_in_one_pass() {
        // (x0 ⊕ x2) → (x1 ∨ x3) is true on 3 of the 4 (x2, x3) assignments
        // when x1 is false and on all 4 when x1 is true.
        let (mut bdd, x) = setup(4);
        let a = bdd.apply_xor(x[0], x[2]).unwrap();
        let b = bdd.apply_or(x[1], x[3]).unwrap();
        let set = bdd.make_set(&[2, 3]).unwrap();
        let f = bdd.app_uni(a, b, BddOp::Imp, set).unwrap();
        assert_eq!(f, bdd.nith_var(1).unwrap());
    }

    #[test]
    fn test_app_uni() {
        let (mut bdd, x) = setup(2);
        let set = bdd.make_set(&[0]).unwrap();
        let f = bdd.app_uni(x[0], x[1], BddOp::Or, set).unwrap();
        assert_eq!(f, bdd.nith_var(1).unwrap());
    }

    #[test]
    fn test_rel_prod() {
        // Image of {x0} under the relation x0' = ¬x0, with x1 as the next-state copy.
        let (mut bdd, x) = setup(2);
        let nx1 = bdd.nith_var(1).unwrap();
        let rel = bdd.apply_biimp(x[0], nx1).unwrap();
        let set = bdd.make_set(&[0]).unwrap();
        let image = bdd.rel_prod(x[0], rel, set).unwrap();
        assert_eq!(image, nx1);
    }
}
