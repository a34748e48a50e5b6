//! Variable blocks.
//!
//! Blocks group variables that reordering must keep together. A block is a
//! range `first..=last` of variable indices whose levels are adjacent; it
//! moves as a unit. Blocks nest into a tree: the children of a block may be
//! reordered among themselves unless the block is `fixed`.
//!
//! Variables outside every user block behave like free singleton blocks, so
//! reordering works without declaring any block at all.

use log::debug;

use crate::bdd::Bdd;
use crate::error::{BddError, Result};
use crate::reference::Ref;

#[derive(Debug, Clone)]
pub(crate) struct Block {
    pub first: u32,
    pub last: u32,
    /// Children keep their relative order.
    pub fixed: bool,
    /// `None` for implicit singleton blocks.
    pub id: Option<usize>,
    /// Variables of the block, top to bottom in the current order.
    pub seq: Vec<u32>,
    pub children: Vec<Block>,
}

impl Block {
    fn new(first: u32, last: u32, fixed: bool, id: Option<usize>) -> Self {
        Self {
            first,
            last,
            fixed,
            id,
            seq: (first..=last).collect(),
            children: Vec::new(),
        }
    }

    fn contains(&self, first: u32, last: u32) -> bool {
        self.first <= first && last <= self.last
    }

    fn overlaps(&self, first: u32, last: u32) -> bool {
        self.first <= last && first <= self.last
    }

    /// Re-sort `seq` by current level.
    pub fn sort_seq(&mut self, var2level: &[u32]) {
        self.seq.sort_by_key(|&v| var2level[v as usize]);
    }

    /// Re-sort every sequence and sibling list of the subtree by level.
    pub fn refresh(&mut self, var2level: &[u32]) {
        self.sort_seq(var2level);
        for child in self.children.iter_mut() {
            child.refresh(var2level);
        }
        self.children.sort_by_key(|c| var2level[c.seq[0] as usize]);
    }

    /// Give every variable of a block with sub-blocks its own implicit
    /// singleton when no sub-block covers it.
    fn fill_gaps(&mut self, force: bool) {
        if force || !self.children.is_empty() {
            let mut covered = vec![false; (self.last - self.first + 1) as usize];
            for c in &self.children {
                for v in c.first..=c.last {
                    covered[(v - self.first) as usize] = true;
                }
            }
            for v in self.first..=self.last {
                if !covered[(v - self.first) as usize] {
                    self.children.push(Block::new(v, v, true, None));
                }
            }
        }
        for child in self.children.iter_mut() {
            child.fill_gaps(false);
        }
    }
}

/// The user-declared block forest.
#[derive(Debug, Default)]
pub(crate) struct BlockTree {
    roots: Vec<Block>,
    next_id: usize,
}

impl BlockTree {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn clear(&mut self) {
        self.roots.clear();
        self.next_id = 0;
    }

    /// Number of declared blocks, nested ones included.
    pub fn count(&self) -> usize {
        fn rec(blocks: &[Block]) -> usize {
            blocks.iter().map(|b| 1 + rec(&b.children)).sum()
        }
        rec(&self.roots)
    }

    fn insert(&mut self, first: u32, last: u32, fixed: bool) -> Result<usize> {
        let id = self.next_id;
        let id = insert_rec(&mut self.roots, Block::new(first, last, fixed, Some(id)))?;
        if id == self.next_id {
            self.next_id += 1;
        }
        Ok(id)
    }

    /// Root block of a reordering session: all variables, with the user
    /// blocks as children and implicit singletons filling the gaps.
    pub fn session_root(&self, var_num: u32, var2level: &[u32]) -> Block {
        let mut top = Block::new(0, var_num - 1, false, None);
        top.children = self.roots.clone();
        top.fill_gaps(true);
        top.refresh(var2level);
        top
    }

    /// Take back the user blocks after a session.
    pub fn restore(&mut self, top: Block) {
        fn strip(blocks: Vec<Block>) -> Vec<Block> {
            blocks
                .into_iter()
                .filter(|b| b.id.is_some())
                .map(|mut b| {
                    b.children = strip(std::mem::take(&mut b.children));
                    b
                })
                .collect()
        }
        self.roots = strip(top.children);
    }
}

fn insert_rec(siblings: &mut Vec<Block>, block: Block) -> Result<usize> {
    let (first, last) = (block.first, block.last);
    for s in siblings.iter_mut() {
        if s.first == first && s.last == last {
            s.fixed = block.fixed;
            return Ok(s.id.unwrap_or_default());
        }
        if s.contains(first, last) {
            return insert_rec(&mut s.children, block);
        }
    }
    if let Some(s) = siblings.iter().find(|s| s.overlaps(first, last) && !block.contains(s.first, s.last)) {
        return Err(BddError::VarBlock(format!(
            "{}..={} partially overlaps {}..={}",
            first, last, s.first, s.last
        )));
    }

    let id = block.id.unwrap_or_default();
    let (inner, mut rest): (Vec<Block>, Vec<Block>) =
        siblings.drain(..).partition(|s| block.contains(s.first, s.last));
    let mut block = block;
    block.children = inner;
    block.children.sort_by_key(|b| b.first);
    rest.push(block);
    rest.sort_by_key(|b| b.first);
    *siblings = rest;
    Ok(id)
}

impl Bdd {
    /// Declare the variables `first..=last` as a block. Returns the block id.
    ///
    /// The variables must be adjacent in the current order. A block may
    /// contain or be contained in other blocks, but not partially overlap one.
    /// When `fixed`, the sub-blocks of this block keep their relative order.
    /// Declaring an existing range again only updates its `fixed` flag.
    pub fn add_var_block(&mut self, first: u32, last: u32, fixed: bool) -> Result<usize> {
        debug!("add_var_block(first = {}, last = {}, fixed = {})", first, last, fixed);
        self.check_var(first)?;
        self.check_var(last)?;
        if first > last {
            return Err(BddError::VarBlock(format!("empty range {}..={}", first, last)));
        }

        let levels = (first..=last).map(|v| self.var2level[v as usize]);
        let (min, max) = levels.fold((u32::MAX, 0), |(lo, hi), l| (lo.min(l), hi.max(l)));
        if max - min != last - first {
            return Err(BddError::VarBlock(format!(
                "variables {}..={} are not adjacent in the current order",
                first, last
            )));
        }

        self.reorder.blocks.insert(first, last, fixed)
    }

    /// Declare the variables of `varset` as a block.
    pub fn add_var_block_set(&mut self, varset: Ref, fixed: bool) -> Result<usize> {
        let vars = self.var_set_to_vars(varset)?;
        let (Some(&first), Some(&last)) = (vars.iter().min(), vars.iter().max()) else {
            return Err(BddError::VarSet);
        };
        self.add_var_block(first, last, fixed)
    }

    /// Make every variable a fixed singleton block.
    pub fn var_block_all(&mut self) -> Result<()> {
        for v in 0..self.var_num {
            self.add_var_block(v, v, true)?;
        }
        Ok(())
    }

    pub fn clear_var_blocks(&mut self) {
        self.reorder.blocks.clear();
    }

    pub fn var_block_count(&self) -> usize {
        self.reorder.blocks.count()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_nesting() {
        let mut bdd = Bdd::with_vars(6).unwrap();
        let a = bdd.add_var_block(1, 2, false).unwrap();
        let b = bdd.add_var_block(0, 3, true).unwrap();
        assert_ne!(a, b);
        // Inside an existing block.
        bdd.add_var_block(2, 2, true).unwrap();
        // Identity returns the existing id and takes the new flag.
        assert!(!bdd.reorder.blocks.roots[0].children[0].fixed);
        assert_eq!(bdd.add_var_block(1, 2, true).unwrap(), a);
        assert!(bdd.reorder.blocks.roots[0].children[0].fixed);
        assert_eq!(bdd.var_block_count(), 3);

        let top = bdd.reorder.blocks.session_root(6, &bdd.var2level);
        // Block 0..=3 plus singletons for x4 and x5.
        assert_eq!(top.children.len(), 3);
        // x0, block 1..=2, x3
        assert_eq!(top.children[0].children.len(), 3);
        // block 2..=2 and x1, sorted by level
        let inner = &top.children[0].children[1];
        assert_eq!(inner.children.len(), 2);
        assert_eq!(inner.children[0].seq, vec![1]);

        let mut blocks = BlockTree::default();
        blocks.restore(top);
        assert_eq!(blocks.count(), 3);
    }

    #[test]
    fn test_partial_overlap() {
        let mut bdd = Bdd::with_vars(6).unwrap();
        bdd.add_var_block(1, 3, false).unwrap();
        assert!(matches!(bdd.add_var_block(2, 4, false), Err(BddError::VarBlock(_))));
        assert!(matches!(bdd.add_var_block(3, 2, false), Err(BddError::VarBlock(_))));
        assert!(matches!(bdd.add_var_block(0, 6, false), Err(BddError::UnknownVar { .. })));
    }

    #[test]
    fn test_not_adjacent() {
        let mut bdd = Bdd::with_vars(4).unwrap();
        bdd.set_var_order(&[0, 2, 1, 3]).unwrap();
        assert!(matches!(bdd.add_var_block(0, 1, false), Err(BddError::VarBlock(_))));
        assert!(bdd.add_var_block(1, 2, false).is_ok());
    }

    #[test]
    fn test_block_all_and_clear() {
        let mut bdd = Bdd::with_vars(4).unwrap();
        bdd.var_block_all().unwrap();
        assert_eq!(bdd.var_block_count(), 4);
        bdd.clear_var_blocks();
        assert_eq!(bdd.var_block_count(), 0);
    }

    #[test]
    fn test_block_from_set() {
        let mut bdd = Bdd::with_vars(4).unwrap();
        let set = bdd.make_set(&[1, 2]).unwrap();
        bdd.add_var_block_set(set, false).unwrap();
        assert_eq!(bdd.var_block_count(), 1);
        assert!(bdd.add_var_block_set(bdd.zero(), false).is_err());
    }
}
