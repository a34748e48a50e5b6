//! Variable pairings: the substitutions used by [`Bdd::replace`] and
//! [`Bdd::vec_compose`].
//!
//! A pairing maps every level to a replacement function. Unset levels map to
//! their own variable. The manager keeps all live pairings, so it can extend
//! them when variables are added and swap their entries when levels move
//! during reordering.

use std::fmt::{Display, Formatter};

use crate::bdd::Bdd;
use crate::error::{BddError, Result};
use crate::reference::Ref;

/// Handle of a pairing owned by a [`Bdd`] manager.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PairId {
    index: u32,
    generation: u32,
}

impl Display for PairId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "pair#{}", self.index)
    }
}

const MAX_PAIR_ID: u32 = u32::MAX >> 2;

#[derive(Debug, Clone)]
pub(crate) struct Pair {
    /// Replacement per level; every entry holds a reference.
    pub result: Vec<u32>,
    /// Deepest level with an explicit replacement, `-1` when none.
    pub last: i32,
    /// Tag for the replace cache, renewed on every change.
    pub id: u32,
}

#[derive(Debug, Default)]
struct PairSlot {
    generation: u32,
    pair: Option<Pair>,
}

#[derive(Debug, Default)]
pub(crate) struct PairTable {
    slots: Vec<PairSlot>,
    free: Vec<u32>,
    last_id: u32,
}

impl PairTable {
    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pair> {
        self.slots.iter_mut().filter_map(|s| s.pair.as_mut())
    }

    fn get(&self, id: PairId) -> Result<&Pair> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.pair.as_ref())
            .ok_or_else(|| BddError::Range(format!("unknown pairing {}", id)))
    }

    fn get_mut(&mut self, id: PairId) -> Result<&mut Pair> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.pair.as_mut())
            .ok_or_else(|| BddError::Range(format!("unknown pairing {}", id)))
    }

    /// Next cache tag. On overflow all pairings are renumbered and `true` is
    /// returned: the replace cache must then be cleared.
    fn next_id(&mut self) -> (u32, bool) {
        self.last_id += 1;
        if self.last_id < MAX_PAIR_ID {
            return (self.last_id, false);
        }
        let mut id = 0;
        for pair in self.iter_mut() {
            pair.id = id;
            id += 1;
        }
        self.last_id = id;
        (self.last_id, true)
    }

    fn insert(&mut self, pair: Pair) -> PairId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.pair = Some(pair);
                PairId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(PairSlot {
                    generation: 0,
                    pair: Some(pair),
                });
                PairId {
                    index: self.slots.len() as u32 - 1,
                    generation: 0,
                }
            }
        }
    }

    fn remove(&mut self, id: PairId) -> Result<Pair> {
        self.get(id)?;
        let slot = &mut self.slots[id.index as usize];
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        slot.pair
            .take()
            .ok_or_else(|| BddError::Range(format!("unknown pairing {}", id)))
    }
}

impl Bdd {
    fn pair_id(&mut self) -> u32 {
        let (id, renumbered) = self.pairs.next_id();
        if renumbered {
            self.caches.replace().clear();
        }
        id
    }

    pub(crate) fn pair(&self, id: PairId) -> Result<&Pair> {
        self.pairs.get(id)
    }

    /// Create an identity pairing.
    pub fn make_pair(&mut self) -> PairId {
        let result = (0..self.var_num)
            .map(|level| self.var_nodes[self.level2var[level as usize] as usize][0])
            .collect();
        let id = self.pair_id();
        self.pairs.insert(Pair { result, last: -1, id })
    }

    /// Release a pairing and the functions it holds.
    pub fn free_pair(&mut self, pair: PairId) -> Result<()> {
        let removed = self.pairs.remove(pair)?;
        for n in removed.result {
            self.dec_ref(n);
        }
        Ok(())
    }

    fn set_pair_node(&mut self, pair: PairId, old_var: u32, node: u32) -> Result<()> {
        self.check_var(old_var)?;
        self.pairs.get(pair)?;
        let level = self.var2level[old_var as usize];
        let id = self.pair_id();
        self.inc_ref(node);
        let p = self.pairs.get_mut(pair)?;
        let previous = std::mem::replace(&mut p.result[level as usize], node);
        p.id = id;
        p.last = p.last.max(level as i32);
        self.dec_ref(previous);
        Ok(())
    }

    /// Replace variable `old_var` by variable `new_var`.
    pub fn set_pair(&mut self, pair: PairId, old_var: u32, new_var: u32) -> Result<()> {
        self.check_var(new_var)?;
        self.set_pair_node(pair, old_var, self.var_nodes[new_var as usize][0])
    }

    /// Replace variable `old_var` by the function `f`.
    pub fn set_bdd_pair(&mut self, pair: PairId, old_var: u32, f: Ref) -> Result<()> {
        let node = self.check(f)?;
        self.set_pair_node(pair, old_var, node)
    }

    pub fn set_pairs(&mut self, pair: PairId, old_vars: &[u32], new_vars: &[u32]) -> Result<()> {
        if old_vars.len() != new_vars.len() {
            return Err(BddError::VarNum {
                expected: old_vars.len(),
                actual: new_vars.len(),
            });
        }
        for (&old, &new) in old_vars.iter().zip(new_vars) {
            self.set_pair(pair, old, new)?;
        }
        Ok(())
    }

    pub fn set_bdd_pairs(&mut self, pair: PairId, old_vars: &[u32], funcs: &[Ref]) -> Result<()> {
        if old_vars.len() != funcs.len() {
            return Err(BddError::VarNum {
                expected: old_vars.len(),
                actual: funcs.len(),
            });
        }
        for (&old, &f) in old_vars.iter().zip(funcs) {
            self.set_bdd_pair(pair, old, f)?;
        }
        Ok(())
    }

    /// Make `pair` the identity again.
    pub fn reset_pair(&mut self, pair: PairId) -> Result<()> {
        let identity: Vec<u32> = (0..self.var_num)
            .map(|level| self.var_nodes[self.level2var[level as usize] as usize][0])
            .collect();
        let id = self.pair_id();
        let p = self.pairs.get_mut(pair)?;
        let previous = std::mem::replace(&mut p.result, identity);
        p.last = -1;
        p.id = id;
        for n in previous {
            self.dec_ref(n);
        }
        Ok(())
    }

    /// Variables with an explicit replacement, with the replacing function.
    pub fn pair_entries(&mut self, pair: PairId) -> Result<Vec<(u32, Ref)>> {
        let p = self.pairs.get(pair)?;
        let entries: Vec<(u32, u32)> = p
            .result
            .iter()
            .enumerate()
            .map(|(level, &n)| (self.level2var[level], n))
            .filter(|&(var, n)| n != self.var_nodes[var as usize][0])
            .collect();
        Ok(entries.into_iter().map(|(var, n)| (var, self.output(n))).collect())
    }

    /// Extend every pairing with identity entries for new levels.
    pub(crate) fn pairs_resize(&mut self, old: u32, new: u32) {
        let extra: Vec<u32> = (old..new)
            .map(|level| self.var_nodes[self.level2var[level as usize] as usize][0])
            .collect();
        for pair in self.pairs.iter_mut() {
            pair.result.truncate(old as usize);
            pair.result.extend_from_slice(&extra);
        }
    }

    /// Follow the swap of `level` and `level + 1`.
    pub(crate) fn pairs_vardown(&mut self, level: u32) {
        let level = level as usize;
        for pair in self.pairs.iter_mut() {
            pair.result.swap(level, level + 1);
            if pair.last == level as i32 {
                pair.last += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_make_and_set() {
        let mut bdd = Bdd::with_vars(4).unwrap();
        let p = bdd.make_pair();
        assert_eq!(bdd.pair(p).unwrap().last, -1);
        assert!(bdd.pair_entries(p).unwrap().is_empty());

        bdd.set_pair(p, 1, 3).unwrap();
        let x3 = bdd.ith_var(3).unwrap();
        assert_eq!(bdd.pair_entries(p).unwrap(), vec![(1, x3)]);
        assert_eq!(bdd.pair(p).unwrap().last, 1);

        assert!(matches!(bdd.set_pair(p, 4, 0), Err(BddError::UnknownVar { .. })));
        assert!(matches!(
            bdd.set_pairs(p, &[0, 1], &[2]),
            Err(BddError::VarNum { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_ids_change() {
        let mut bdd = Bdd::with_vars(2).unwrap();
        let p = bdd.make_pair();
        let q = bdd.make_pair();
        let before = bdd.pair(p).unwrap().id;
        assert_ne!(before, bdd.pair(q).unwrap().id);
        bdd.set_pair(p, 0, 1).unwrap();
        assert_ne!(bdd.pair(p).unwrap().id, before);
    }

    #[test]
    fn test_bdd_pair_holds_reference() {
        let mut bdd = Bdd::with_vars(3).unwrap();
        let x = bdd.ith_var(1).unwrap();
        let y = bdd.ith_var(2).unwrap();
        let f = bdd.apply_or(x, y).unwrap();
        let p = bdd.make_pair();
        bdd.set_bdd_pair(p, 0, f).unwrap();
        bdd.del_ref(f).unwrap();
        bdd.gc();
        assert_eq!(bdd.ref_count(f).unwrap(), 1);

        bdd.free_pair(p).unwrap();
        bdd.gc();
        assert!(bdd.check(f).is_err());
        assert!(bdd.set_pair(p, 0, 1).is_err());
    }

    #[test]
    fn test_reset_and_resize() {
        let mut bdd = Bdd::with_vars(2).unwrap();
        let p = bdd.make_pair();
        bdd.set_pair(p, 0, 1).unwrap();
        bdd.reset_pair(p).unwrap();
        assert!(bdd.pair_entries(p).unwrap().is_empty());
        assert_eq!(bdd.pair(p).unwrap().last, -1);

        bdd.set_var_num(5).unwrap();
        assert_eq!(bdd.pair(p).unwrap().result.len(), 5);
        bdd.set_pair(p, 4, 0).unwrap();
        assert_eq!(bdd.pair(p).unwrap().last, 4);
    }

    #[test]
    fn test_slot_reuse() {
        let mut bdd = Bdd::with_vars(2).unwrap();
        let p = bdd.make_pair();
        bdd.free_pair(p).unwrap();
        let q = bdd.make_pair();
        assert_ne!(p, q);
        assert!(bdd.pair(p).is_err());
        assert_eq!(bdd.pairs.slots.len(), 1);
    }
}
