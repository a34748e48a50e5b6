//! Per-variable subtable used during a reordering session.
//!
//! While variables are being swapped, the global unique table is not kept up
//! to date. Instead, every variable gets its own table:
//!
//! ```text
//! subtables[0] → nodes labelled x0, keyed by (low, high)
//! subtables[1] → nodes labelled x1, keyed by (low, high)
//! ...
//! ```
//!
//! Since all nodes in a subtable share the variable, it is not part of the
//! key. Swapping two adjacent variables only touches their two subtables,
//! and a local collection only scans the lower one. The global table is
//! rebuilt by the collection that ends the session.

use std::collections::HashMap;

/// Nodes of a single variable, keyed by their children.
#[derive(Debug, Clone)]
pub(crate) struct Subtable {
    /// The variable of all nodes in this subtable.
    pub var: u32,
    nodes: HashMap<(u32, u32), u32>,
}

impl Subtable {
    pub fn new(var: u32) -> Self {
        Self {
            var,
            nodes: HashMap::new(),
        }
    }

    /// Look up a node by its children.
    pub fn find(&self, low: u32, high: u32) -> Option<u32> {
        self.nodes.get(&(low, high)).copied()
    }

    pub fn insert(&mut self, low: u32, high: u32, index: u32) {
        self.nodes.insert((low, high), index);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All `(low, high, index)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        self.nodes.iter().map(|(&(low, high), &index)| (low, high, index))
    }

    /// Remove and return every entry matching `pred`.
    pub fn extract(&mut self, mut pred: impl FnMut(u32, u32, u32) -> bool) -> Vec<(u32, u32, u32)> {
        let taken: Vec<(u32, u32, u32)> = self.iter().filter(|&(l, h, i)| pred(l, h, i)).collect();
        for &(low, high, _) in &taken {
            self.nodes.remove(&(low, high));
        }
        taken
    }
}
