use crate::utils::{pairing3, MyHash};

/// Marks a free slot (in place of the low child).
pub(crate) const INVALID: u32 = u32::MAX;

/// Saturation value of the reference counter; a node at this count is pinned.
pub(crate) const MAX_REF: u16 = u16::MAX;

/// A decision node: `if var then high else low`.
///
/// Nodes store the variable, not the level, so reordering only touches the
/// `var2level`/`level2var` maps and the nodes of the two swapped variables.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Node {
    pub var: u32,
    pub low: u32,
    pub high: u32,
}

impl MyHash for Node {
    fn hash(&self) -> u64 {
        pairing3(self.var as u64, self.low as u64, self.high as u64)
    }
}

/// One cell of the node table.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub node: Node,
    /// Chain link: unique-table bucket chain or the free list.
    pub next: u32,
    pub refs: u16,
    pub mark: bool,
    pub generation: u32,
}

impl Slot {
    pub fn free(next: u32) -> Self {
        Self {
            node: Node {
                var: 0,
                low: INVALID,
                high: INVALID,
            },
            next,
            refs: 0,
            mark: false,
            generation: 0,
        }
    }

    pub fn is_free(&self) -> bool {
        self.node.low == INVALID
    }

    /// Turn this slot into a free one; outstanding handles become stale.
    pub fn release(&mut self, next: u32) {
        self.node.low = INVALID;
        self.node.high = INVALID;
        self.refs = 0;
        self.mark = false;
        self.generation = self.generation.wrapping_add(1);
        self.next = next;
    }

    pub fn inc_ref(&mut self) {
        if self.refs != MAX_REF {
            self.refs += 1;
        }
    }

    /// Returns `false` on underflow.
    pub fn dec_ref(&mut self) -> bool {
        match self.refs {
            MAX_REF => true,
            0 => false,
            _ => {
                self.refs -= 1;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refs_saturate() {
        let mut slot = Slot::free(0);
        slot.refs = MAX_REF - 1;
        slot.inc_ref();
        assert_eq!(slot.refs, MAX_REF);
        slot.inc_ref();
        assert_eq!(slot.refs, MAX_REF);
        assert!(slot.dec_ref());
        assert_eq!(slot.refs, MAX_REF);
    }

    #[test]
    fn test_underflow() {
        let mut slot = Slot::free(0);
        assert!(!slot.dec_ref());
        slot.inc_ref();
        assert!(slot.dec_ref());
        assert_eq!(slot.refs, 0);
    }

    #[test]
    fn test_release_bumps_generation() {
        let mut slot = Slot::free(0);
        slot.node = Node { var: 1, low: 0, high: 1 };
        assert!(!slot.is_free());
        slot.release(7);
        assert!(slot.is_free());
        assert_eq!(slot.generation, 1);
        assert_eq!(slot.next, 7);
    }
}
