//! Cofactoring and don't-care minimization.
//!
//! - [`Bdd::restrict`] fixes the literals of a cube.
//! - [`Bdd::constrain`] is the generalized cofactor `f ↓ c` of Coudert and Madre.
//! - [`Bdd::simplify`] is the restrict operator of the same authors: it may
//!   change `f` wherever the domain `d` is false.

use log::debug;

use crate::apply::BddOp;
use crate::bdd::Bdd;
use crate::cache::kind;
use crate::engine::{Expansion, Recursion, Step};
use crate::error::Result;
use crate::reference::Ref;

struct RestrictRec {
    cube: u32,
}

impl Recursion for RestrictRec {
    type Key = u32;

    fn expand(&mut self, bdd: &mut Bdd, r: u32) -> Step<Expansion<u32>> {
        if r < 2 || bdd.quant.is_below(bdd.lvl(r)) {
            return Ok(Expansion::Done(r));
        }
        if let Some(res) = bdd.caches.misc().get(&[r, self.cube, kind::RESTRICT]) {
            return Ok(Expansion::Done(res));
        }
        Ok(match bdd.quant.polarity(bdd.lvl(r)) {
            Some(true) => Expansion::Forward {
                next: bdd.hi(r),
                guard: None,
            },
            Some(false) => Expansion::Forward {
                next: bdd.lo(r),
                guard: None,
            },
            None => Expansion::Branch {
                var: bdd.var_of(r),
                low: bdd.lo(r),
                high: bdd.hi(r),
            },
        })
    }

    fn store(&mut self, bdd: &mut Bdd, r: u32, result: u32) {
        bdd.caches.misc().insert([r, self.cube, kind::RESTRICT], result);
    }
}

struct ConstrainRec;

impl Recursion for ConstrainRec {
    type Key = (u32, u32);

    fn expand(&mut self, bdd: &mut Bdd, (f, c): (u32, u32)) -> Step<Expansion<(u32, u32)>> {
        if c == 1 || f < 2 {
            return Ok(Expansion::Done(f));
        }
        if c == f {
            return Ok(Expansion::Done(1));
        }
        if c == 0 {
            return Ok(Expansion::Done(0));
        }
        if let Some(res) = bdd.caches.misc().get(&[f, c, kind::CONSTRAIN]) {
            return Ok(Expansion::Done(res));
        }

        let (level_f, level_c) = (bdd.lvl(f), bdd.lvl(c));
        let forward = |next| Expansion::Forward { next, guard: None };
        Ok(if level_f == level_c {
            if bdd.lo(c) == 0 {
                forward((bdd.hi(f), bdd.hi(c)))
            } else if bdd.hi(c) == 0 {
                forward((bdd.lo(f), bdd.lo(c)))
            } else {
                Expansion::Branch {
                    var: bdd.var_of(f),
                    low: (bdd.lo(f), bdd.lo(c)),
                    high: (bdd.hi(f), bdd.hi(c)),
                }
            }
        } else if level_f < level_c {
            Expansion::Branch {
                var: bdd.var_of(f),
                low: (bdd.lo(f), c),
                high: (bdd.hi(f), c),
            }
        } else if bdd.lo(c) == 0 {
            forward((f, bdd.hi(c)))
        } else if bdd.hi(c) == 0 {
            forward((f, bdd.lo(c)))
        } else {
            Expansion::Branch {
                var: bdd.var_of(c),
                low: (f, bdd.lo(c)),
                high: (f, bdd.hi(c)),
            }
        })
    }

    fn store(&mut self, bdd: &mut Bdd, (f, c): (u32, u32), result: u32) {
        bdd.caches.misc().insert([f, c, kind::CONSTRAIN], result);
    }
}

struct SimplifyRec;

impl Recursion for SimplifyRec {
    type Key = (u32, u32);

    fn expand(&mut self, bdd: &mut Bdd, (f, d): (u32, u32)) -> Step<Expansion<(u32, u32)>> {
        if d == 1 || f < 2 {
            return Ok(Expansion::Done(f));
        }
        if d == f {
            return Ok(Expansion::Done(1));
        }
        if d == 0 {
            return Ok(Expansion::Done(0));
        }
        if let Some(res) = bdd.caches.misc().get(&[f, d, kind::SIMPLIFY]) {
            return Ok(Expansion::Done(res));
        }

        let (level_f, level_d) = (bdd.lvl(f), bdd.lvl(d));
        Ok(if level_f == level_d {
            if bdd.lo(d) == 0 {
                Expansion::Forward {
                    next: (bdd.hi(f), bdd.hi(d)),
                    guard: None,
                }
            } else if bdd.hi(d) == 0 {
                Expansion::Forward {
                    next: (bdd.lo(f), bdd.lo(d)),
                    guard: None,
                }
            } else {
                Expansion::Branch {
                    var: bdd.var_of(f),
                    low: (bdd.lo(f), bdd.lo(d)),
                    high: (bdd.hi(f), bdd.hi(d)),
                }
            }
        } else if level_f < level_d {
            Expansion::Branch {
                var: bdd.var_of(f),
                low: (bdd.lo(f), d),
                high: (bdd.hi(f), d),
            }
        } else {
            // The top variable of d does not occur in f: quantify it away.
            let g = bdd.apply_rec(BddOp::Or, bdd.lo(d), bdd.hi(d))?;
            Expansion::Forward {
                next: (f, g),
                guard: Some(g),
            }
        })
    }

    fn store(&mut self, bdd: &mut Bdd, (f, d): (u32, u32), result: u32) {
        bdd.caches.misc().insert([f, d, kind::SIMPLIFY], result);
    }
}

impl Bdd {
    /// Cofactor of `f` by the literals of `cube`.
    ///
    /// A cube node with a false low edge is a positive literal, any other node
    /// a negative one.
    pub fn restrict(&mut self, f: Ref, cube: Ref) -> Result<Ref> {
        debug!("restrict(f = {}, cube = {})", f, cube);
        let (f, cube) = (self.check(f)?, self.check(cube)?);
        if cube < 2 {
            return Ok(self.output(f));
        }
        self.run_op(&[f, cube], |bdd| {
            bdd.prepare_cube(cube);
            bdd.evaluate(&mut RestrictRec { cube }, f)
        })
    }

    /// Generalized cofactor: agrees with `f` wherever `c` holds.
    pub fn constrain(&mut self, f: Ref, c: Ref) -> Result<Ref> {
        debug!("constrain(f = {}, c = {})", f, c);
        let (f, c) = (self.check(f)?, self.check(c)?);
        self.run_op(&[f, c], |bdd| bdd.evaluate(&mut ConstrainRec, (f, c)))
    }

    /// Coudert–Madre restrict: a usually smaller function agreeing with `f` on `d`.
    pub fn simplify(&mut self, f: Ref, d: Ref) -> Result<Ref> {
        debug!("simplify(f = {}, d = {})", f, d);
        let (f, d) = (self.check(f)?, self.check(d)?);
        self.run_op(&[f, d], |bdd| bdd.evaluate(&mut SimplifyRec, (f, d)))
    }
}
