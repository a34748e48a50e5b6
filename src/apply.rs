//! Negation, binary operators and if-then-else.

use std::fmt::{Display, Formatter};

use log::debug;

use crate::bdd::Bdd;
use crate::engine::{Expansion, Recursion, Step};
use crate::error::{BddError, Result};
use crate::reference::Ref;

/// The ten binary Boolean operators.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BddOp {
    And,
    Xor,
    Or,
    Nand,
    Nor,
    Imp,
    Biimp,
    Diff,
    Less,
    InvImp,
}

impl BddOp {
    pub const ALL: [BddOp; 10] = [
        BddOp::And,
        BddOp::Xor,
        BddOp::Or,
        BddOp::Nand,
        BddOp::Nor,
        BddOp::Imp,
        BddOp::Biimp,
        BddOp::Diff,
        BddOp::Less,
        BddOp::InvImp,
    ];

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Result<BddOp> {
        BddOp::ALL
            .get(id as usize)
            .copied()
            .ok_or(BddError::UnknownOperator(id))
    }

    /// Truth table, indexed by `(l << 1) | r`.
    fn table(self) -> [u32; 4] {
        match self {
            BddOp::And => [0, 0, 0, 1],
            BddOp::Xor => [0, 1, 1, 0],
            BddOp::Or => [0, 1, 1, 1],
            BddOp::Nand => [1, 1, 1, 0],
            BddOp::Nor => [1, 0, 0, 0],
            BddOp::Imp => [1, 1, 0, 1],
            BddOp::Biimp => [1, 0, 0, 1],
            BddOp::Diff => [0, 0, 1, 0],
            BddOp::Less => [0, 1, 0, 0],
            BddOp::InvImp => [1, 0, 1, 1],
        }
    }

    pub fn eval(self, l: bool, r: bool) -> bool {
        self.table()[((l as usize) << 1) | r as usize] == 1
    }

    fn is_commutative(self) -> bool {
        matches!(
            self,
            BddOp::And | BddOp::Xor | BddOp::Or | BddOp::Nand | BddOp::Nor | BddOp::Biimp
        )
    }

    /// Result when it follows from the operands without recursion.
    pub(crate) fn shortcut(self, l: u32, r: u32) -> Option<u32> {
        match self {
            BddOp::And => {
                if l == r {
                    return Some(l);
                }
                if l == 0 || r == 0 {
                    return Some(0);
                }
                if l == 1 {
                    return Some(r);
                }
                if r == 1 {
                    return Some(l);
                }
            }
            BddOp::Or => {
                if l == r {
                    return Some(l);
                }
                if l == 1 || r == 1 {
                    return Some(1);
                }
                if l == 0 {
                    return Some(r);
                }
                if r == 0 {
                    return Some(l);
                }
            }
            BddOp::Xor => {
                if l == r {
                    return Some(0);
                }
                if l == 0 {
                    return Some(r);
                }
                if r == 0 {
                    return Some(l);
                }
            }
            BddOp::Nand => {
                if l == 0 || r == 0 {
                    return Some(1);
                }
            }
            BddOp::Nor => {
                if l == 1 || r == 1 {
                    return Some(0);
                }
            }
            BddOp::Imp => {
                if l == 0 {
                    return Some(1);
                }
                if l == 1 {
                    return Some(r);
                }
                if r == 1 {
                    return Some(1);
                }
            }
            _ => {}
        }
        if l < 2 && r < 2 {
            return Some(self.table()[((l << 1) | r) as usize]);
        }
        None
    }
}

impl Display for BddOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BddOp::And => "and",
            BddOp::Xor => "xor",
            BddOp::Or => "or",
            BddOp::Nand => "nand",
            BddOp::Nor => "nor",
            BddOp::Imp => "imp",
            BddOp::Biimp => "biimp",
            BddOp::Diff => "diff",
            BddOp::Less => "less",
            BddOp::InvImp => "invimp",
        };
        write!(f, "{}", name)
    }
}

struct NotRec;

impl Recursion for NotRec {
    type Key = u32;

    fn expand(&mut self, bdd: &mut Bdd, f: u32) -> Step<Expansion<u32>> {
        if f < 2 {
            return Ok(Expansion::Done(f ^ 1));
        }
        if let Some(res) = bdd.caches.not().get(&[f]) {
            return Ok(Expansion::Done(res));
        }
        Ok(Expansion::Branch {
            var: bdd.var_of(f),
            low: bdd.lo(f),
            high: bdd.hi(f),
        })
    }

    fn store(&mut self, bdd: &mut Bdd, f: u32, result: u32) {
        bdd.caches.not().insert([f], result);
    }
}

pub(crate) struct ApplyRec {
    pub op: BddOp,
}

impl ApplyRec {
    fn key(&self, l: u32, r: u32) -> (u32, u32) {
        if self.op.is_commutative() && l < r {
            (r, l)
        } else {
            (l, r)
        }
    }

    fn lookup(&self, bdd: &mut Bdd, l: u32, r: u32) -> Option<u32> {
        let (l, r) = self.key(l, r);
        match self.op {
            BddOp::And => bdd.caches.and().get(&[l, r]),
            BddOp::Or => bdd.caches.or().get(&[l, r]),
            op => bdd.caches.apply().get(&[l, r, op.id()]),
        }
    }
}

impl Recursion for ApplyRec {
    type Key = (u32, u32);

    fn expand(&mut self, bdd: &mut Bdd, (l, r): (u32, u32)) -> Step<Expansion<(u32, u32)>> {
        if let Some(res) = self.op.shortcut(l, r) {
            return Ok(Expansion::Done(res));
        }
        if let Some(res) = self.lookup(bdd, l, r) {
            return Ok(Expansion::Done(res));
        }
        let (level_l, level_r) = (bdd.lvl(l), bdd.lvl(r));
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

    fn store(&mut self, bdd: &mut Bdd, (l, r): (u32, u32), result: u32) {
        let (l, r) = self.key(l, r);
        match self.op {
            BddOp::And => bdd.caches.and().insert([l, r], result),
            BddOp::Or => bdd.caches.or().insert([l, r], result),
            op => bdd.caches.apply().insert([l, r, op.id()], result),
        }
    }
}

struct IteRec;

impl IteRec {
    fn cofactors(bdd: &Bdd, f: u32, level: u32) -> (u32, u32) {
        if bdd.lvl(f) == level {
            (bdd.lo(f), bdd.hi(f))
        } else {
            (f, f)
        }
    }
}

impl Recursion for IteRec {
    type Key = (u32, u32, u32);

    fn expand(&mut self, bdd: &mut Bdd, (f, g, h): Self::Key) -> Step<Expansion<Self::Key>> {
        // ite(1,G,H) => G
        // ite(0,G,H) => H
        // ite(F,G,G) => G
        // ite(F,1,0) => F
        // ite(F,0,1) => ~F
        if f == 1 {
            return Ok(Expansion::Done(g));
        }
        if f == 0 {
            return Ok(Expansion::Done(h));
        }
        if g == h {
            return Ok(Expansion::Done(g));
        }
        if g == 1 && h == 0 {
            return Ok(Expansion::Done(f));
        }
        if g == 0 && h == 1 {
            return Ok(Expansion::Done(bdd.not_rec(f)?));
        }
        if let Some(res) = bdd.caches.ite().get(&[f, g, h]) {
            return Ok(Expansion::Done(res));
        }

        let level = bdd.lvl(f).min(bdd.lvl(g)).min(bdd.lvl(h));
        let (f0, f1) = Self::cofactors(bdd, f, level);
        let (g0, g1) = Self::cofactors(bdd, g, level);
        let (h0, h1) = Self::cofactors(bdd, h, level);
        Ok(Expansion::Branch {
            var: bdd.level2var[level as usize],
            low: (f0, g0, h0),
            high: (f1, g1, h1),
        })
    }

    fn store(&mut self, bdd: &mut Bdd, (f, g, h): Self::Key, result: u32) {
        bdd.caches.ite().insert([f, g, h], result);
    }
}

impl Bdd {
    pub(crate) fn not_rec(&mut self, f: u32) -> Step<u32> {
        self.evaluate(&mut NotRec, f)
    }

    pub(crate) fn apply_rec(&mut self, op: BddOp, l: u32, r: u32) -> Step<u32> {
        self.evaluate(&mut ApplyRec { op }, (l, r))
    }

    pub(crate) fn ite_rec(&mut self, f: u32, g: u32, h: u32) -> Step<u32> {
        self.evaluate(&mut IteRec, (f, g, h))
    }

    pub fn apply_not(&mut self, f: Ref) -> Result<Ref> {
        debug!("apply_not(f = {})", f);
        let f = self.check(f)?;
        self.run_op(&[f], |bdd| bdd.not_rec(f))
    }

    /// Combine `l` and `r` with a binary operator.
    pub fn apply(&mut self, l: Ref, r: Ref, op: BddOp) -> Result<Ref> {
        debug!("apply_{}(l = {}, r = {})", op, l, r);
        let (l, r) = (self.check(l)?, self.check(r)?);
        self.run_op(&[l, r], |bdd| bdd.apply_rec(op, l, r))
    }

    pub fn apply_and(&mut self, l: Ref, r: Ref) -> Result<Ref> {
        self.apply(l, r, BddOp::And)
    }
    pub fn apply_or(&mut self, l: Ref, r: Ref) -> Result<Ref> {
        self.apply(l, r, BddOp::Or)
    }
    pub fn apply_xor(&mut self, l: Ref, r: Ref) -> Result<Ref> {
        self.apply(l, r, BddOp::Xor)
    }
    pub fn apply_imp(&mut self, l: Ref, r: Ref) -> Result<Ref> {
        self.apply(l, r, BddOp::Imp)
    }
    pub fn apply_biimp(&mut self, l: Ref, r: Ref) -> Result<Ref> {
        self.apply(l, r, BddOp::Biimp)
    }
    pub fn apply_diff(&mut self, l: Ref, r: Ref) -> Result<Ref> {
        self.apply(l, r, BddOp::Diff)
    }

    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(f, g, h) = (f ∧ g) ∨ (¬f ∧ h)
    /// ```
    pub fn apply_ite(&mut self, f: Ref, g: Ref, h: Ref) -> Result<Ref> {
        debug!("apply_ite(f = {}, g = {}, h = {})", f, g, h);
        let (f, g, h) = (self.check(f)?, self.check(g)?, self.check(h)?);
        self.run_op(&[f, g, h], |bdd| bdd.ite_rec(f, g, h))
    }

    /// Fold `nodes` with `op`, starting from `init`.
    ///
    /// The operands keep their references; only the result carries a new one.
    pub fn apply_many(&mut self, op: BddOp, init: Ref, nodes: impl IntoIterator<Item = Ref>) -> Result<Ref> {
        let mut acc = self.add_ref(init)?;
        for f in nodes {
            let next = self.apply(acc, f, op);
            self.del_ref(acc)?;
            acc = next?;
        }
        Ok(acc)
    }

    pub fn apply_and_many(&mut self, nodes: impl IntoIterator<Item = Ref>) -> Result<Ref> {
        self.apply_many(BddOp::And, Ref::ONE, nodes)
    }

    pub fn apply_or_many(&mut self, nodes: impl IntoIterator<Item = Ref>) -> Result<Ref> {
        self.apply_many(BddOp::Or, Ref::ZERO, nodes)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_op_ids() {
        for op in BddOp::ALL {
            assert_eq!(BddOp::from_id(op.id()).unwrap(), op);
        }
        assert!(matches!(BddOp::from_id(10), Err(BddError::UnknownOperator(10))));
        assert!(BddOp::Imp.eval(false, true));
        assert!(!BddOp::Imp.eval(true, false));
        assert!(BddOp::InvImp.eval(true, false));
    }

    #[test]
    fn test_de_morgan_and() {
        let mut bdd = Bdd::with_vars(2).unwrap();

        let x = bdd.ith_var(0).unwrap();
        let y = bdd.ith_var(1).unwrap();

        let xy = bdd.apply_and(x, y).unwrap();
        let f = bdd.apply_not(xy).unwrap();
        let nx = bdd.apply_not(x).unwrap();
        let ny = bdd.apply_not(y).unwrap();
        let g = bdd.apply_or(nx, ny).unwrap();
        assert_eq!(f, g);
        assert_eq!(f, bdd.apply(x, y, BddOp::Nand).unwrap());
    }

    #[test]
    fn test_xor_itself() {
        let mut bdd = Bdd::with_vars(2).unwrap();
        let x = bdd.ith_var(0).unwrap();
        assert_eq!(bdd.apply_xor(x, x).unwrap(), bdd.zero());
        let nx = bdd.nith_var(0).unwrap();
        assert_eq!(bdd.apply_xor(x, nx).unwrap(), bdd.one());
    }

    #[test]
    fn test_and_of_two_vars() {
        let mut bdd = Bdd::with_vars(2).unwrap();
        let x0 = bdd.ith_var(0).unwrap();
        let x1 = bdd.ith_var(1).unwrap();
        let f = bdd.apply_and(x0, x1).unwrap();

        assert_eq!(bdd.node_count(f).unwrap(), 2);
        assert_eq!(bdd.var(f).unwrap(), 0);
        assert_eq!(bdd.low(f).unwrap(), bdd.zero());
        assert_eq!(bdd.high(f).unwrap(), x1);
    }

    #[test]
    fn test_all_ops_truth_tables() {
        let mut bdd = Bdd::with_vars(2).unwrap();
        let x = bdd.ith_var(0).unwrap();
        let y = bdd.ith_var(1).unwrap();
        for op in BddOp::ALL {
            let f = bdd.apply(x, y, op).unwrap();
            for a in [false, true] {
                for b in [false, true] {
                    assert_eq!(bdd.eval(f, &[a, b]).unwrap(), op.eval(a, b), "{} on {} {}", op, a, b);
                }
            }
        }
    }

    #[test]
    fn test_apply_ite() {
        let mut bdd = Bdd::with_vars(3).unwrap();
        let x = bdd.ith_var(0).unwrap();
        let y = bdd.ith_var(1).unwrap();
        let z = bdd.ith_var(2).unwrap();
        let f = bdd.apply_ite(x, y, z).unwrap();

        let xy = bdd.apply_and(x, y).unwrap();
        let nx = bdd.apply_not(x).unwrap();
        let nxz = bdd.apply_and(nx, z).unwrap();
        assert_eq!(f, bdd.apply_or(xy, nxz).unwrap());

        assert_eq!(bdd.apply_ite(bdd.one(), y, z).unwrap(), y);
        assert_eq!(bdd.apply_ite(bdd.zero(), y, z).unwrap(), z);
        assert_eq!(bdd.apply_ite(x, bdd.zero(), bdd.one()).unwrap(), nx);
    }

    #[test]
    fn test_apply_many() {
        let mut bdd = Bdd::with_vars(3).unwrap();
        let vars: Vec<Ref> = (0..3).map(|v| bdd.ith_var(v).unwrap()).collect();
        let all = bdd.apply_and_many(vars.iter().copied()).unwrap();
        assert_eq!(bdd.sat_count(all).unwrap(), 1.0);
        let any = bdd.apply_or_many(vars.iter().copied()).unwrap();
        assert_eq!(bdd.sat_count(any).unwrap(), 7.0);
        assert_eq!(bdd.apply_and_many([]).unwrap(), bdd.one());
    }

    #[test]
    fn test_stale_operand() {
        let mut bdd = Bdd::with_vars(2).unwrap();
        let x = bdd.ith_var(0).unwrap();
        let y = bdd.ith_var(1).unwrap();
        let f = bdd.apply_or(x, y).unwrap();
        bdd.del_ref(f).unwrap();
        bdd.gc();
        assert!(matches!(bdd.apply_and(f, x), Err(BddError::InvalidNode(_))));
    }
}
