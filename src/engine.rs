//! Explicit-stack evaluator shared by the recursive BDD algorithms.
//!
//! Every algorithm is described by a [`Recursion`]: how a subproblem is
//! solved or split ([`Recursion::expand`]), how the two sub-results are
//! combined ([`Recursion::combine`]) and how a result is memoized
//! ([`Recursion::store`]). The evaluator drives it with a task stack instead of
//! native recursion, so deep diagrams cannot overflow the call stack.
//!
//! Intermediate results live on the manager's operation stack (`Bdd::stack`),
//! which the garbage collector treats as roots. This keeps them alive when
//! `make_node` has to collect in the middle of an operation.
//!
//! ```text
//!   tasks: [.. Build(k) Visit(hi) Visit(lo)]     values: [.. r_lo r_hi]
//!                                    ^ top                         ^ top
//! ```

use crate::bdd::Bdd;
use crate::error::BddError;

/// Why an operation stopped before producing its result.
#[derive(Debug)]
pub(crate) enum Interrupt {
    /// Automatic reordering must run; the operation is restarted afterwards.
    Reorder,
    Error(BddError),
}

impl From<BddError> for Interrupt {
    fn from(e: BddError) -> Self {
        Interrupt::Error(e)
    }
}

pub(crate) type Step<T> = std::result::Result<T, Interrupt>;

pub(crate) enum Expansion<K> {
    /// The result is known (terminal case or cache hit).
    Done(u32),
    /// Solve `low` and `high`, then combine them under `var`.
    Branch { var: u32, low: K, high: K },
    /// The result is the result of `next`. The optional `guard` node is kept
    /// alive while `next` is evaluated.
    Forward { next: K, guard: Option<u32> },
}

pub(crate) trait Recursion {
    type Key: Copy;

    fn expand(&mut self, bdd: &mut Bdd, key: Self::Key) -> Step<Expansion<Self::Key>>;

    fn combine(&mut self, bdd: &mut Bdd, key: Self::Key, var: u32, low: u32, high: u32) -> Step<u32> {
        let _ = key;
        bdd.make_node(var, low, high)
    }

    fn store(&mut self, bdd: &mut Bdd, key: Self::Key, result: u32);
}

enum Task<K> {
    Visit(K),
    Build { key: K, var: u32 },
    Finish { key: K, guarded: bool },
}

impl Bdd {
    /// Evaluate `rec` on `root`.
    ///
    /// Re-entrant: `expand` and `combine` may evaluate other recursions.
    /// The returned node is not protected; callers that allocate before
    /// storing it must push it on the operation stack.
    pub(crate) fn evaluate<R: Recursion>(&mut self, rec: &mut R, root: R::Key) -> Step<u32> {
        let base = self.stack.len();
        let mut tasks = vec![Task::Visit(root)];

        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit(key) => match rec.expand(self, key)? {
                    Expansion::Done(result) => self.stack.push(result),
                    Expansion::Branch { var, low, high } => {
                        tasks.push(Task::Build { key, var });
                        tasks.push(Task::Visit(high));
                        tasks.push(Task::Visit(low));
                    }
                    Expansion::Forward { next, guard } => {
                        if let Some(g) = guard {
                            self.stack.push(g);
                        }
                        tasks.push(Task::Finish {
                            key,
                            guarded: guard.is_some(),
                        });
                        tasks.push(Task::Visit(next));
                    }
                },
                Task::Build { key, var } => {
                    let n = self.stack.len();
                    let (low, high) = (self.stack[n - 2], self.stack[n - 1]);
                    let result = rec.combine(self, key, var, low, high)?;
                    self.stack.truncate(n - 2);
                    self.stack.push(result);
                    rec.store(self, key, result);
                }
                Task::Finish { key, guarded } => {
                    let n = self.stack.len();
                    let result = self.stack[n - 1];
                    let keep = if guarded { n - 2 } else { n - 1 };
                    self.stack.truncate(keep);
                    self.stack.push(result);
                    rec.store(self, key, result);
                }
            }
        }

        debug_assert_eq!(self.stack.len(), base + 1);
        let result = self.stack[base];
        self.stack.truncate(base);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::reference::Ref;

    /// Rebuilds a diagram node by node; exercises the evaluator alone.
    struct Rebuild;

    impl Recursion for Rebuild {
        type Key = u32;

        fn expand(&mut self, bdd: &mut Bdd, key: u32) -> Step<Expansion<u32>> {
            if key < 2 {
                return Ok(Expansion::Done(key));
            }
            let node = *bdd.table.node(key);
            Ok(Expansion::Branch {
                var: node.var,
                low: node.low,
                high: node.high,
            })
        }

        fn store(&mut self, _bdd: &mut Bdd, _key: u32, _result: u32) {}
    }

    /// Follows the high edges to the bottom, guarding each step.
    struct Chase;

    impl Recursion for Chase {
        type Key = u32;

        fn expand(&mut self, bdd: &mut Bdd, key: u32) -> Step<Expansion<u32>> {
            if key < 2 {
                return Ok(Expansion::Done(key));
            }
            Ok(Expansion::Forward {
                next: bdd.table.node(key).high,
                guard: Some(key),
            })
        }

        fn store(&mut self, _bdd: &mut Bdd, _key: u32, _result: u32) {}
    }

    #[test]
    fn test_copy_is_identity() {
        let mut bdd = Bdd::with_vars(4).unwrap();
        let a = bdd.ith_var(0).unwrap();
        let b = bdd.ith_var(2).unwrap();
        let f = bdd.apply_xor(a, b).unwrap();
        let r = bdd.evaluate(&mut Rebuild, f.index()).unwrap();
        assert_eq!(r, f.index());
        assert!(bdd.stack.is_empty());
    }

    #[test]
    fn test_forward_pops_guard() {
        let mut bdd = Bdd::with_vars(3).unwrap();
        let a = bdd.ith_var(0).unwrap();
        let b = bdd.ith_var(1).unwrap();
        let f = bdd.apply_and(a, b).unwrap();
        let r = bdd.evaluate(&mut Chase, f.index()).unwrap();
        assert_eq!(r, Ref::ONE.index());
        assert!(bdd.stack.is_empty());
    }
}
