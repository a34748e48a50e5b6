//! Node table: the node arena together with the unique table.
//!
//! ```text
//! buckets: [ 7 | 0 | 3 | ... ]        slots: 0 1 | 2 3 4 5 6 7 ...
//!            |       |                       ^^^   terminals (pinned)
//!            v       v
//!           (7) --> (4) --> 0         chains go through `Slot::next`,
//!                   (3) --> 0         0 terminates (terminals are never chained)
//! ```
//!
//! Free slots are linked through the same `next` field, starting at
//! `free_pos`. The bucket array has the same (prime) length as the arena.

use crate::node::{Node, Slot, MAX_REF};
use crate::utils::MyHash;

pub(crate) struct NodeTable {
    slots: Vec<Slot>,
    buckets: Vec<u32>,
    /// Head of the free list, 0 when empty.
    free_pos: u32,
    free_num: usize,
    /// Number of nodes ever created.
    produced: u64,
}

impl NodeTable {
    /// Create a table with `size` slots (at least the two terminals).
    pub fn new(size: usize, terminal_var: u32) -> Self {
        let size = size.max(3);
        let mut slots = Vec::with_capacity(size);
        for i in 0..2u32 {
            let mut slot = Slot::free(0);
            slot.node = Node {
                var: terminal_var,
                low: i,
                high: i,
            };
            slot.refs = MAX_REF;
            slots.push(slot);
        }
        let mut table = Self {
            slots,
            buckets: Vec::new(),
            free_pos: 0,
            free_num: 0,
            produced: 0,
        };
        table.extend(size);
        table.rehash();
        table
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
    pub fn free_num(&self) -> usize {
        self.free_num
    }
    /// Number of slots in use, terminals included.
    pub fn used(&self) -> usize {
        self.capacity() - self.free_num
    }
    pub fn produced(&self) -> u64 {
        self.produced
    }
    pub fn has_free(&self) -> bool {
        self.free_pos != 0
    }

    pub fn slot(&self, index: u32) -> &Slot {
        &self.slots[index as usize]
    }
    pub fn slot_mut(&mut self, index: u32) -> &mut Slot {
        &mut self.slots[index as usize]
    }
    pub fn node(&self, index: u32) -> &Node {
        &self.slots[index as usize].node
    }

    /// Check whether `index` names an allocated slot.
    pub fn is_live(&self, index: u32) -> bool {
        (index as usize) < self.slots.len() && !self.slots[index as usize].is_free()
    }

    /// Indices of all allocated non-terminal slots.
    pub fn live(&self) -> impl Iterator<Item = u32> + '_ {
        (2..self.slots.len() as u32).filter(move |&i| !self.slots[i as usize].is_free())
    }

    pub fn set_terminal_var(&mut self, var: u32) {
        self.slots[0].node.var = var;
        self.slots[1].node.var = var;
    }

    fn bucket_index(&self, node: &Node) -> usize {
        (node.hash() % self.buckets.len() as u64) as usize
    }

    /// Look up a node in the unique table.
    pub fn find(&self, node: &Node) -> Option<u32> {
        let mut index = self.buckets[self.bucket_index(node)];
        while index != 0 {
            let slot = &self.slots[index as usize];
            if &slot.node == node {
                return Some(index);
            }
            index = slot.next;
        }
        None
    }

    /// Take a slot from the free list.
    pub fn pop_free(&mut self) -> Option<u32> {
        if self.free_pos == 0 {
            return None;
        }
        let index = self.free_pos;
        self.free_pos = self.slots[index as usize].next;
        self.free_num -= 1;
        self.produced += 1;
        Some(index)
    }

    /// Put a slot (back) onto the free list.
    pub fn push_free(&mut self, index: u32) {
        let next = self.free_pos;
        self.slots[index as usize].release(next);
        self.free_pos = index;
        self.free_num += 1;
    }

    /// Allocate a fresh node without linking it into the unique table.
    pub fn alloc(&mut self, node: Node) -> Option<u32> {
        let index = self.pop_free()?;
        let slot = &mut self.slots[index as usize];
        slot.node = node;
        slot.refs = 0;
        slot.mark = false;
        slot.next = 0;
        Some(index)
    }

    /// Allocate a fresh node and link it into the unique table.
    ///
    /// The caller has checked that the node does not exist yet.
    pub fn insert_new(&mut self, node: Node) -> Option<u32> {
        let index = self.alloc(node)?;
        let bucket = self.bucket_index(&node);
        self.slots[index as usize].next = self.buckets[bucket];
        self.buckets[bucket] = index;
        Some(index)
    }

    /// Grow the arena to `new_size` slots. New slots go to the front of the
    /// free list. Bucket chains are left alone; see [`NodeTable::rehash`].
    pub fn extend(&mut self, new_size: usize) {
        let old_size = self.slots.len();
        if new_size <= old_size {
            return;
        }
        for i in old_size..new_size {
            let next = if i + 1 < new_size {
                (i + 1) as u32
            } else {
                self.free_pos
            };
            self.slots.push(Slot::free(next));
        }
        self.free_pos = old_size as u32;
        self.free_num += new_size - old_size;
    }

    /// Rebuild all bucket chains from the allocated slots.
    pub fn rehash(&mut self) {
        self.buckets.clear();
        self.buckets.resize(self.slots.len(), 0);
        for index in (2..self.slots.len() as u32).rev() {
            if self.slots[index as usize].is_free() {
                continue;
            }
            let bucket = self.bucket_index(&self.slots[index as usize].node);
            self.slots[index as usize].next = self.buckets[bucket];
            self.buckets[bucket] = index;
        }
    }

    /// Mark every node reachable from `roots`, using an explicit stack.
    pub fn mark_from(&mut self, roots: impl IntoIterator<Item = u32>) {
        let mut stack: Vec<u32> = roots.into_iter().collect();
        while let Some(index) = stack.pop() {
            if index < 2 {
                continue;
            }
            let slot = &mut self.slots[index as usize];
            if slot.mark || slot.is_free() {
                continue;
            }
            slot.mark = true;
            stack.push(slot.node.low);
            stack.push(slot.node.high);
        }
    }

    /// Free every unmarked node, clear the marks and rebuild the unique table
    /// and the free list. Returns the number of nodes freed.
    pub fn sweep(&mut self) -> usize {
        self.buckets.clear();
        self.buckets.resize(self.slots.len(), 0);
        self.free_pos = 0;
        self.free_num = 0;
        let mut freed = 0;
        for index in (2..self.slots.len() as u32).rev() {
            let slot = &mut self.slots[index as usize];
            if slot.mark && !slot.is_free() {
                slot.mark = false;
                let bucket = (slot.node.hash() % self.buckets.len() as u64) as usize;
                slot.next = self.buckets[bucket];
                self.buckets[bucket] = index;
            } else {
                if !slot.is_free() {
                    freed += 1;
                    slot.release(self.free_pos);
                } else {
                    slot.mark = false;
                    slot.next = self.free_pos;
                }
                self.free_pos = index;
                self.free_num += 1;
            }
        }
        freed
    }
}
