//! Dynamic variable reordering.
//!
//! # Why ordering matters
//!
//! The size of a BDD is highly sensitive to the variable order. For
//! `f = (x₁ ∧ y₁) ∨ (x₂ ∧ y₂) ∨ ... ∨ (xₙ ∧ yₙ)`:
//!
//! - with the order x₁, y₁, x₂, y₂, ..., xₙ, yₙ it has O(n) nodes;
//! - with the order x₁, x₂, ..., xₙ, y₁, ..., yₙ it has O(2ⁿ) nodes.
//!
//! Finding the optimal order is NP-complete, so the engine offers heuristics
//! built from one primitive: the exchange of two adjacent levels.
//!
//! # Sessions
//!
//! Every reordering runs as a session:
//!
//! 1. External reference counts are saved; dead nodes are freed. Each node's
//!    count becomes its external count plus the number of its parents.
//! 2. The variable interaction matrix is built: two variables interact when
//!    some root depends on both. Swapping non-interacting neighbours only
//!    exchanges the var/level maps.
//! 3. The nodes are distributed into per-variable [`Subtable`]s.
//! 4. The block tree is walked and the strategy is applied to the children of
//!    every free block.
//! 5. The saved counts come back and a full collection rebuilds the unique
//!    table.
//!
//! Nodes store variables, not levels, so an exchange of levels `l` and `l+1`
//! only rewrites the nodes of the upper variable that have a child labelled
//! with the lower one. Such a node keeps its index (and function): it is
//! relabelled in place and gets two new children. Lower-variable nodes that
//! lost their last parent are freed right away by a local collection.
//!
//! # Strategies
//!
//! - **Window permutation** ([`ReorderMethod::Win2`], [`ReorderMethod::Win3`]):
//!   slide a window of 2 or 3 blocks over the order and keep the best
//!   permutation of each window. The `Ite` variants repeat until a pass
//!   brings no improvement.
//! - **Sifting** ([`ReorderMethod::Sift`]): move each block, biggest first,
//!   through all positions and park it where the diagram was smallest. A
//!   block stops moving once the size exceeds the best seen by 20%.
//! - **Random** ([`ReorderMethod::Random`]): random adjacent exchanges, mostly
//!   useful for testing.
//!
//! # References
//!
//! - R. Rudell. "Dynamic variable ordering for ordered binary decision diagrams."
//!   ICCAD 1993. DOI: 10.1109/ICCAD.1993.580054
//!
//! - M. Fujita, Y. Matsunaga, T. Kakuda. "On variable ordering of binary
//!   decision diagrams for the application of multi-level logic synthesis."
//!   EDAC 1991.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bdd::Bdd;
use crate::bitset::BitSet;
use crate::block::{Block, BlockTree};
use crate::config::BddConfig;
use crate::error::{BddError, Result};
use crate::node::Node;
use crate::subtable::Subtable;

/// Seed of the generator behind [`ReorderMethod::Random`].
const DEFAULT_SEED: u64 = 0x00b0_dd5e;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ReorderMethod {
    None,
    Win2,
    Win2Ite,
    Win3,
    Win3Ite,
    Sift,
    SiftIte,
    Random,
}

impl ReorderMethod {
    pub const ALL: [ReorderMethod; 8] = [
        ReorderMethod::None,
        ReorderMethod::Win2,
        ReorderMethod::Win2Ite,
        ReorderMethod::Win3,
        ReorderMethod::Win3Ite,
        ReorderMethod::Sift,
        ReorderMethod::SiftIte,
        ReorderMethod::Random,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ReorderMethod::None => "none",
            ReorderMethod::Win2 => "win2",
            ReorderMethod::Win2Ite => "win2ite",
            ReorderMethod::Win3 => "win3",
            ReorderMethod::Win3Ite => "win3ite",
            ReorderMethod::Sift => "sift",
            ReorderMethod::SiftIte => "siftite",
            ReorderMethod::Random => "random",
        }
    }
}

impl Display for ReorderMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ReorderMethod {
    type Err = BddError;

    fn from_str(s: &str) -> Result<Self> {
        ReorderMethod::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| BddError::Range(format!("unknown reordering method '{}'", s)))
    }
}

/// Statistics of the reordering sessions, passed to the reorder handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderStats {
    /// Method of the last session.
    pub method: ReorderMethod,
    /// Number of adjacent level exchanges in the last session.
    pub swaps: usize,
    /// Live nodes at the start of the last session.
    pub initial_size: usize,
    /// Live nodes at the end of the last session.
    pub final_size: usize,
    pub time: Duration,
    pub sum_time: Duration,
    /// Number of sessions so far.
    pub num: usize,
}

impl Default for ReorderStats {
    fn default() -> Self {
        Self {
            method: ReorderMethod::None,
            swaps: 0,
            initial_size: 0,
            final_size: 0,
            time: Duration::ZERO,
            sum_time: Duration::ZERO,
            num: 0,
        }
    }
}

impl ReorderStats {
    /// Relative size reduction of the last session.
    pub fn reduction_ratio(&self) -> f64 {
        if self.initial_size == 0 {
            return 0.0;
        }
        1.0 - (self.final_size as f64 / self.initial_size as f64)
    }

    pub fn reduction_percent(&self) -> f64 {
        self.reduction_ratio() * 100.0
    }
}

/// Reordering settings and bookkeeping of a manager.
#[derive(Debug)]
pub(crate) struct ReorderState {
    /// Method used by automatic reordering.
    pub method: ReorderMethod,
    /// Automatic reorderings left; `-1` means unlimited.
    pub times: i32,
    pub disabled: bool,
    /// Automatic reordering is considered once this many nodes are in use.
    pub next_trigger: usize,
    pub blocks: BlockTree,
    pub stats: ReorderStats,
    rng: StdRng,
}

impl ReorderState {
    pub fn new(config: &BddConfig, node_size: usize) -> Self {
        Self {
            method: config.reorder_method,
            times: config.reorder_times,
            disabled: false,
            next_trigger: node_size,
            blocks: BlockTree::default(),
            stats: ReorderStats::default(),
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
        }
    }
}

/// Working state of one reordering session.
struct Session {
    /// External reference counts at the start of the session.
    ext_refs: Vec<(u32, u16)>,
    /// Number of nodes per variable.
    nodenum: Vec<usize>,
    /// `imatrix[a]` contains `b` when variables `a` and `b` interact.
    imatrix: Vec<BitSet>,
    subtables: Vec<Subtable>,
    swaps: usize,
}

// Sessions and the level exchange.
impl Bdd {
    fn begin_session(&mut self) -> Session {
        debug_assert!(self.stack.is_empty());
        self.caches.clear();

        let ext_refs: Vec<(u32, u16)> = self
            .table
            .live()
            .map(|n| (n, self.table.slot(n).refs))
            .filter(|&(_, refs)| refs > 0)
            .collect();
        self.table.mark_from(ext_refs.iter().map(|&(n, _)| n));
        let freed = self.table.sweep();
        trace!("reorder session: {} dead nodes freed", freed);

        let var_num = self.var_num as usize;
        let mut nodenum = vec![0; var_num];
        let mut subtables: Vec<Subtable> = (0..self.var_num).map(Subtable::new).collect();
        let live: Vec<u32> = self.table.live().collect();
        for n in live {
            let Node { var, low, high } = *self.table.node(n);
            self.inc_ref(low);
            self.inc_ref(high);
            nodenum[var as usize] += 1;
            subtables[var as usize].insert(low, high, n);
        }

        let imatrix = self.interaction_matrix(&ext_refs);
        trace!(
            "session: {} roots, {} interaction entries",
            ext_refs.len(),
            imatrix.iter().map(BitSet::len).sum::<usize>()
        );
        Session {
            ext_refs,
            nodenum,
            imatrix,
            subtables,
            swaps: 0,
        }
    }

    /// Mark every pair of variables that occur together under some root.
    ///
    /// Roots are visited with a shared visited set; reaching a node already
    /// seen from an earlier root adds the recorded interactions of its
    /// variable instead of walking the subgraph again.
    fn interaction_matrix(&self, roots: &[(u32, u16)]) -> Vec<BitSet> {
        let var_num = self.var_num as usize;
        let mut imatrix = vec![BitSet::new(var_num); var_num];
        let mut visited = BitSet::new(self.table.capacity());

        for &(root, _) in roots {
            let mut dep = BitSet::new(var_num);
            let mut stack = vec![root];
            while let Some(n) = stack.pop() {
                if n < 2 {
                    continue;
                }
                let var = self.var_of(n) as usize;
                if visited.insert(n as usize) {
                    dep.insert(var);
                    stack.push(self.lo(n));
                    stack.push(self.hi(n));
                } else {
                    dep.union_with(&imatrix[var]);
                }
            }
            for v in dep.iter() {
                imatrix[v].union_with(&dep);
            }
        }
        imatrix
    }

    fn end_session(&mut self, session: Session) {
        let live: Vec<u32> = self.table.live().collect();
        for n in live {
            self.table.slot_mut(n).refs = 0;
        }
        for (n, refs) in session.ext_refs {
            self.table.slot_mut(n).refs = refs;
        }
        self.collect();
        self.caches.clear();
    }

    /// Run `body` inside a session and record its statistics.
    fn reorder_session(
        &mut self,
        method: ReorderMethod,
        body: impl FnOnce(&mut Bdd, &mut Session) -> Result<()>,
    ) -> Result<()> {
        if let Some(handler) = self.handlers.reorder.as_mut() {
            handler(true, &self.reorder.stats);
        }
        let start = Instant::now();

        let mut session = self.begin_session();
        let initial_size = self.table.used();
        let result = body(self, &mut session);
        let swaps = session.swaps;
        self.end_session(session);

        let time = start.elapsed();
        let stats = &mut self.reorder.stats;
        stats.method = method;
        stats.swaps = swaps;
        stats.initial_size = initial_size;
        stats.final_size = self.table.used();
        stats.time = time;
        stats.sum_time += time;
        stats.num += 1;
        info!(
            "reorder #{} ({}): {} -> {} nodes, {} swaps, {:?}",
            stats.num, method, stats.initial_size, stats.final_size, swaps, time
        );

        if let Some(handler) = self.handlers.reorder.as_mut() {
            handler(false, &self.reorder.stats);
        }
        result
    }

    /// Grow the arena until `needed` slots are free, without rehashing.
    fn reserve_nodes(&mut self, needed: usize) -> Result<()> {
        while self.table.free_num() < needed {
            match self.next_table_size() {
                Some(size) => self.resize_table(size, false),
                None => return Err(BddError::NodeLimit),
            }
        }
        Ok(())
    }

    /// Find or create `(var, low, high)` in the session tables. The result
    /// carries one new reference.
    fn reorder_make_node(&mut self, session: &mut Session, var: u32, low: u32, high: u32) -> Result<u32> {
        if low == high {
            self.inc_ref(low);
            return Ok(low);
        }
        if let Some(n) = session.subtables[var as usize].find(low, high) {
            self.inc_ref(n);
            return Ok(n);
        }

        let n = self.table.alloc(Node { var, low, high }).ok_or(BddError::NodeLimit)?;
        self.inc_ref(n);
        self.inc_ref(low);
        self.inc_ref(high);
        session.subtables[var as usize].insert(low, high, n);
        session.nodenum[var as usize] += 1;
        Ok(n)
    }

    /// Move `var0` one level down, exchanging it with the variable below.
    fn var_down(&mut self, session: &mut Session, var0: u32) -> Result<()> {
        let level = self.var2level[var0 as usize];
        if level + 1 >= self.var_num {
            return Ok(());
        }
        let var1 = self.level2var[level as usize + 1];

        if session.imatrix[var0 as usize].contains(var1 as usize) {
            let table = &self.table;
            let moved = session.subtables[var0 as usize]
                .extract(|low, high, _| table.node(low).var == var1 || table.node(high).var == var1);

            if let Err(e) = self.reserve_nodes(2 * moved.len()) {
                for &(low, high, n) in &moved {
                    session.subtables[var0 as usize].insert(low, high, n);
                }
                return Err(e);
            }
            session.nodenum[var0 as usize] -= moved.len();
            trace!("var_down: x{} <-> x{}, {} nodes rewritten", var0, var1, moved.len());

            for (f0, f1, t) in moved {
                let (f00, f01) = if self.var_of(f0) == var1 {
                    (self.lo(f0), self.hi(f0))
                } else {
                    (f0, f0)
                };
                let (f10, f11) = if self.var_of(f1) == var1 {
                    (self.lo(f1), self.hi(f1))
                } else {
                    (f1, f1)
                };

                let low = self.reorder_make_node(session, var0, f00, f10)?;
                let high = self.reorder_make_node(session, var0, f01, f11)?;

                // The old children may be needed again; they are only
                // released by the local collection below.
                self.dec_ref(f0);
                self.dec_ref(f1);

                self.table.slot_mut(t).node = Node { var: var1, low, high };
                session.subtables[var1 as usize].insert(low, high, t);
                session.nodenum[var1 as usize] += 1;
            }

            self.local_gc(session, var1);
        }

        let level = level as usize;
        self.level2var.swap(level, level + 1);
        self.var2level[var0 as usize] = level as u32 + 1;
        self.var2level[var1 as usize] = level as u32;
        self.pairs_vardown(level as u32);
        session.swaps += 1;
        Ok(())
    }

    fn var_up(&mut self, session: &mut Session, var: u32) -> Result<()> {
        let level = self.var2level[var as usize];
        if level == 0 {
            return Ok(());
        }
        let above = self.level2var[level as usize - 1];
        self.var_down(session, above)
    }

    /// Free the unreferenced nodes of `var`.
    fn local_gc(&mut self, session: &mut Session, var: u32) {
        let table = &self.table;
        let dead = session.subtables[var as usize].extract(|_, _, n| table.slot(n).refs == 0);
        trace!("local gc of x{}: {} nodes freed", var, dead.len());
        for (low, high, n) in dead {
            self.dec_ref(low);
            self.dec_ref(high);
            self.table.push_free(n);
            session.nodenum[var as usize] -= 1;
        }
        let sub = &session.subtables[var as usize];
        debug_assert_eq!(sub.var, var);
        debug_assert_eq!(sub.len(), session.nodenum[var as usize]);
        debug_assert_eq!(sub.is_empty(), session.nodenum[var as usize] == 0);
    }
}

// Block moves and strategies.
impl Bdd {
    fn level_of(&self, var: u32) -> u32 {
        self.var2level[var as usize]
    }

    /// Exchange the adjacent blocks `blocks[i]` and `blocks[i + 1]`.
    fn block_down(&mut self, session: &mut Session, blocks: &mut [Block], i: usize) -> Result<()> {
        let left = blocks[i].seq.clone();
        let right = blocks[i + 1].seq.clone();
        let (Some(&left_last), Some(&right_last)) = (left.last(), right.last()) else {
            return Ok(());
        };
        let left_start = self.level_of(left[0]);

        // Move the left block past the right one...
        while self.level_of(left[0]) < self.level_of(right_last) {
            for w in left.windows(2) {
                if self.level_of(w[0]) + 1 != self.level_of(w[1]) && self.level_of(w[0]) < self.level_of(right_last) {
                    self.var_down(session, w[0])?;
                }
            }
            if self.level_of(left_last) < self.level_of(right_last) {
                self.var_down(session, left_last)?;
            }
        }

        // ...and the right block up to where the left one started.
        while self.level_of(right[0]) > left_start {
            for w in right.windows(2).rev() {
                if self.level_of(w[0]) + 1 != self.level_of(w[1]) && self.level_of(w[1]) > left_start {
                    self.var_up(session, w[1])?;
                }
            }
            if self.level_of(right[0]) > left_start {
                self.var_up(session, right[0])?;
            }
        }

        blocks.swap(i, i + 1);
        Ok(())
    }

    /// Apply `method` to the children of `block` (unless fixed), then recurse.
    fn reorder_block(&mut self, session: &mut Session, block: &mut Block, method: ReorderMethod) -> Result<()> {
        if !block.fixed && block.children.len() > 1 {
            let blocks = &mut block.children;
            match method {
                ReorderMethod::None => {}
                ReorderMethod::Win2 => self.reorder_win2(session, blocks)?,
                ReorderMethod::Win2Ite => self.until_stable(|bdd| bdd.reorder_win2(session, blocks))?,
                ReorderMethod::Win3 => self.reorder_win3(session, blocks)?,
                ReorderMethod::Win3Ite => self.until_stable(|bdd| bdd.reorder_win3_pass(session, blocks))?,
                ReorderMethod::Sift => self.reorder_sift(session, blocks)?,
                ReorderMethod::SiftIte => self.until_stable(|bdd| bdd.reorder_sift(session, blocks))?,
                ReorderMethod::Random => self.reorder_random(session, blocks)?,
            }
        }

        for child in block.children.iter_mut() {
            self.reorder_block(session, child, method)?;
        }
        block.sort_seq(&self.var2level);
        Ok(())
    }

    /// Repeat `pass` until the number of used nodes stops changing.
    fn until_stable(&mut self, mut pass: impl FnMut(&mut Bdd) -> Result<()>) -> Result<()> {
        loop {
            let last = self.table.used();
            pass(self)?;
            if self.table.used() == last {
                return Ok(());
            }
        }
    }

    /// Try moving `blocks[i]` one position down; undo when it got worse.
    fn win2_step(&mut self, session: &mut Session, blocks: &mut [Block], i: usize) -> Result<()> {
        let best = self.table.used();
        self.block_down(session, blocks, i)?;
        if best < self.table.used() {
            self.block_down(session, blocks, i)?;
        }
        Ok(())
    }

    fn reorder_win2(&mut self, session: &mut Session, blocks: &mut [Block]) -> Result<()> {
        for i in 0..blocks.len() - 1 {
            self.win2_step(session, blocks, i)?;
        }
        debug!("win2: {} nodes", self.table.used());
        Ok(())
    }

    /// Visit all six orders of `blocks[i..i + 3]` and settle on the smallest.
    ///
    /// Alternating exchanges at `i` and `i + 1` cycle through the six
    /// permutations and back to the start, so the best one is reached by
    /// continuing the cycle.
    fn win3_step(&mut self, session: &mut Session, blocks: &mut [Block], i: usize) -> Result<()> {
        let mut best = self.table.used();
        let mut best_state = 0;
        for step in 0..5 {
            self.block_down(session, blocks, i + step % 2)?;
            if self.table.used() < best {
                best = self.table.used();
                best_state = step + 1;
            }
        }
        if best_state != 5 {
            for step in 5..6 + best_state {
                self.block_down(session, blocks, i + step % 2)?;
            }
        }
        Ok(())
    }

    fn reorder_win3(&mut self, session: &mut Session, blocks: &mut [Block]) -> Result<()> {
        let mut i = 0;
        while i + 1 < blocks.len() {
            if i + 2 >= blocks.len() {
                self.win2_step(session, blocks, i)?;
                break;
            }
            self.win3_step(session, blocks, i)?;
            i += 1;
        }
        debug!("win3: {} nodes", self.table.used());
        Ok(())
    }

    fn reorder_win3_pass(&mut self, session: &mut Session, blocks: &mut [Block]) -> Result<()> {
        let mut i = 0;
        while i + 2 < blocks.len() {
            self.win3_step(session, blocks, i)?;
            i += 1;
        }
        debug!("win3ite pass: {} nodes", self.table.used());
        Ok(())
    }

    /// Size bound while sifting: 20% above the best, and below the node limit.
    fn sift_limit(&self, best: usize) -> usize {
        let limit = best + best / 5;
        let max = self.config.max_node_num;
        if max > 0 {
            limit.min(max.saturating_sub(self.config.max_increase).saturating_sub(2))
        } else {
            limit
        }
    }

    fn reorder_sift(&mut self, session: &mut Session, blocks: &mut [Block]) -> Result<()> {
        // Blocks are identified by their first variable, biggest first.
        let mut order: Vec<(usize, u32)> = blocks
            .iter()
            .map(|b| (b.seq.iter().map(|&v| session.nodenum[v as usize]).sum(), b.first))
            .collect();
        order.sort_by(|a, b| b.0.cmp(&a.0));

        let middle = blocks.len() / 2;
        for (size, first) in order {
            trace!("sifting block x{} ({} nodes)", first, size);
            self.sift_block(session, blocks, first, middle)?;
        }
        debug!("sift: {} nodes", self.table.used());
        Ok(())
    }

    fn sift_block(&mut self, session: &mut Session, blocks: &mut [Block], first: u32, middle: usize) -> Result<()> {
        let Some(mut idx) = blocks.iter().position(|b| b.first == first) else {
            return Ok(());
        };
        let mut best = self.table.used();
        let mut limit = self.sift_limit(best);
        // Offset from the best position seen so far.
        let mut bestpos: isize = 0;
        let mut up = idx <= middle;

        for _ in 0..2 {
            let mut first_move = true;
            loop {
                let can_move = if up { idx > 0 } else { idx + 1 < blocks.len() };
                if !can_move || !(first_move || self.table.used() <= limit) {
                    break;
                }
                first_move = false;
                if up {
                    self.block_down(session, blocks, idx - 1)?;
                    idx -= 1;
                    bestpos -= 1;
                } else {
                    self.block_down(session, blocks, idx)?;
                    idx += 1;
                    bestpos += 1;
                }

                if self.table.used() < best {
                    best = self.table.used();
                    bestpos = 0;
                    limit = self.sift_limit(best);
                }
            }
            up = !up;
        }

        while bestpos < 0 {
            self.block_down(session, blocks, idx)?;
            idx += 1;
            bestpos += 1;
        }
        while bestpos > 0 {
            self.block_down(session, blocks, idx - 1)?;
            idx -= 1;
            bestpos -= 1;
        }
        Ok(())
    }

    fn reorder_random(&mut self, session: &mut Session, blocks: &mut [Block]) -> Result<()> {
        let num = blocks.len();
        let firsts: Vec<u32> = blocks.iter().map(|b| b.first).collect();
        for _ in 0..4 * num {
            let pick = firsts[self.reorder.rng.gen_range(0..num)];
            if let Some(idx) = blocks.iter().position(|b| b.first == pick) {
                if idx + 1 < num {
                    self.block_down(session, blocks, idx)?;
                }
            }
        }
        debug!("random: {} nodes", self.table.used());
        Ok(())
    }
}

// Public interface.
impl Bdd {
    /// Reorder the variables with `method`, respecting the variable blocks.
    pub fn reorder(&mut self, method: ReorderMethod) -> Result<()> {
        debug!("reorder(method = {})", method);
        if method == ReorderMethod::None || self.var_num < 2 {
            return Ok(());
        }

        let mut top = self.reorder.blocks.session_root(self.var_num, &self.var2level);
        let result = self.reorder_session(method, |bdd, session| bdd.reorder_block(session, &mut top, method));
        self.reorder.blocks.restore(top);
        result
    }

    /// Whether an automatic reordering may run now.
    pub(crate) fn reorder_ready(&self) -> bool {
        self.reorder.method != ReorderMethod::None
            && self.reorder.times != 0
            && !self.reorder.disabled
            && self.var_num > 1
    }

    /// Run the automatic reordering, then set the next trigger: twice the
    /// nodes in use, more when the last reordering gained little.
    pub(crate) fn check_reorder(&mut self) {
        if self.reorder_ready() {
            let method = self.reorder.method;
            if let Err(e) = self.reorder(method) {
                warn!("automatic reordering failed: {}", e);
            }
            if self.reorder.times > 0 {
                self.reorder.times -= 1;
            }
        }

        let mut next = 2 * self.table.used();
        let gain = self.reorder_gain();
        if gain < 20 {
            next += next * (20 - gain) as usize / 20;
        }
        self.reorder.next_trigger = next;
        debug!("next automatic reordering at {} nodes", next);
    }

    /// Size reduction of the last reordering, in percent (negative when the
    /// diagram grew).
    pub fn reorder_gain(&self) -> i32 {
        let stats = &self.reorder.stats;
        if stats.initial_size == 0 {
            return 0;
        }
        let before = stats.initial_size as i64;
        let after = stats.final_size as i64;
        (100 * (before - after) / before) as i32
    }

    /// Enable automatic reordering with `method`, at most `times` times
    /// (`-1` means unlimited). Returns the previous method.
    pub fn set_auto_reorder(&mut self, method: ReorderMethod, times: i32) -> Result<ReorderMethod> {
        if times < -1 {
            return Err(BddError::Range(format!("reorder times must be -1 or non-negative, got {}", times)));
        }
        self.reorder.times = times;
        Ok(std::mem::replace(&mut self.reorder.method, method))
    }

    pub fn auto_reorder_method(&self) -> ReorderMethod {
        self.reorder.method
    }

    pub fn auto_reorder_times(&self) -> i32 {
        self.reorder.times
    }

    /// Suspend automatic reordering until [`Bdd::enable_reorder`].
    pub fn disable_reorder(&mut self) {
        self.reorder.disabled = true;
    }

    pub fn enable_reorder(&mut self) {
        self.reorder.disabled = false;
    }

    /// Seed the generator of [`ReorderMethod::Random`].
    pub fn set_reorder_seed(&mut self, seed: u64) {
        self.reorder.rng = StdRng::seed_from_u64(seed);
    }

    pub fn reorder_stats(&self) -> &ReorderStats {
        &self.reorder.stats
    }

    /// Variables from the top level to the bottom one.
    pub fn var_order(&self) -> Vec<u32> {
        self.level2var[..self.var_num as usize].to_vec()
    }

    /// Install the order `order[0]` (top) to `order[n - 1]` (bottom).
    ///
    /// Not allowed while variable blocks are defined.
    pub fn set_var_order(&mut self, order: &[u32]) -> Result<()> {
        debug!("set_var_order(order = {:?})", order);
        if !self.reorder.blocks.is_empty() {
            return Err(BddError::VarBlock("cannot set the order while blocks are defined".into()));
        }
        if order.len() != self.var_num as usize {
            return Err(BddError::VarNum {
                expected: self.var_num as usize,
                actual: order.len(),
            });
        }
        let mut seen = vec![false; order.len()];
        for &v in order {
            if v >= self.var_num || std::mem::replace(&mut seen[v as usize], true) {
                return Err(BddError::Order(format!("{:?} is not a permutation of the variables", order)));
            }
        }

        let order = order.to_vec();
        self.reorder_session(ReorderMethod::None, |bdd, session| {
            for (level, &var) in order.iter().enumerate() {
                while bdd.level_of(var) > level as u32 {
                    bdd.var_up(session, var)?;
                }
            }
            Ok(())
        })
    }

    /// Exchange the positions of `v1` and `v2` in the order.
    ///
    /// Not allowed while variable blocks are defined.
    pub fn swap_var(&mut self, v1: u32, v2: u32) -> Result<()> {
        debug!("swap_var(v1 = {}, v2 = {})", v1, v2);
        if !self.reorder.blocks.is_empty() {
            return Err(BddError::VarBlock("cannot swap variables while blocks are defined".into()));
        }
        self.check_var(v1)?;
        self.check_var(v2)?;
        if v1 == v2 {
            return Ok(());
        }

        let (v1, v2) = if self.level_of(v1) < self.level_of(v2) { (v1, v2) } else { (v2, v1) };
        let (l1, l2) = (self.level_of(v1), self.level_of(v2));
        self.reorder_session(ReorderMethod::None, |bdd, session| {
            while bdd.level_of(v1) < l2 {
                bdd.var_down(session, v1)?;
            }
            while bdd.level_of(v2) > l1 {
                bdd.var_up(session, v2)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use test_log::test;

    use super::*;
    use crate::reference::Ref;

    fn setup(n: u32) -> (Bdd, Vec<Ref>) {
        let mut bdd = Bdd::with_vars(n).unwrap();
        let vars = (0..n).map(|v| bdd.ith_var(v).unwrap()).collect();
        (bdd, vars)
    }

    /// `(x0 ∧ x_n) ∨ (x1 ∧ x_{n+1}) ∨ ...`, exponential in the identity order.
    fn pairs_function(bdd: &mut Bdd, x: &[Ref]) -> Ref {
        let n = x.len() / 2;
        let mut f = bdd.zero();
        for i in 0..n {
            let t = bdd.apply_and(x[i], x[i + n]).unwrap();
            f = bdd.apply_or(f, t).unwrap();
        }
        f
    }

    fn truth_table(bdd: &Bdd, f: Ref) -> Vec<bool> {
        let n = bdd.var_num() as usize;
        (0..1u32 << n)
            .map(|bits| {
                let assignment: Vec<bool> = (0..n).map(|i| bits >> i & 1 == 1).collect();
                bdd.eval(f, &assignment).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_method_names() {
        for m in ReorderMethod::ALL {
            assert_eq!(m.to_string().parse::<ReorderMethod>().unwrap(), m);
        }
        assert_eq!("SIFT".parse::<ReorderMethod>().unwrap(), ReorderMethod::Sift);
        assert!("bubble".parse::<ReorderMethod>().is_err());
    }

    #[test]
    fn test_swap_var() {
        let (mut bdd, x) = setup(3);
        let nx2 = bdd.nith_var(2).unwrap();
        let a = bdd.apply_and(x[0], nx2).unwrap();
        let f = bdd.apply_or(a, x[1]).unwrap();
        let table = truth_table(&bdd, f);

        bdd.swap_var(0, 2).unwrap();
        assert_eq!(bdd.var_order(), vec![2, 1, 0]);
        assert_eq!(bdd.var_to_level(0).unwrap(), 2);
        assert_eq!(truth_table(&bdd, f), table);
        assert_eq!(bdd.ref_count(f).unwrap(), 1);
        bdd.validate().unwrap();

        // The unique table is consistent again: rebuilding finds the same node.
        let b = bdd.apply_and(x[0], nx2).unwrap();
        assert_eq!(bdd.apply_or(b, x[1]).unwrap(), f);
    }

    #[test]
    fn test_set_var_order() {
        let (mut bdd, x) = setup(6);
        let f = pairs_function(&mut bdd, &x);
        let table = truth_table(&bdd, f);
        let bad = bdd.node_count(f).unwrap();

        bdd.set_var_order(&[0, 3, 1, 4, 2, 5]).unwrap();
        assert_eq!(bdd.var_order(), vec![0, 3, 1, 4, 2, 5]);
        let good = bdd.node_count(f).unwrap();
        assert_eq!(good, 6);
        assert!(good < bad);
        assert_eq!(truth_table(&bdd, f), table);
        bdd.validate().unwrap();
    }

    #[test]
    fn test_set_var_order_errors() {
        let (mut bdd, _) = setup(3);
        assert!(matches!(bdd.set_var_order(&[0, 1]), Err(BddError::VarNum { .. })));
        assert!(matches!(bdd.set_var_order(&[0, 1, 1]), Err(BddError::Order(_))));
        assert!(matches!(bdd.set_var_order(&[0, 1, 3]), Err(BddError::Order(_))));
        bdd.add_var_block(0, 1, false).unwrap();
        assert!(matches!(bdd.set_var_order(&[2, 1, 0]), Err(BddError::VarBlock(_))));
        assert!(matches!(bdd.swap_var(0, 2), Err(BddError::VarBlock(_))));
    }

    #[test]
    fn test_all_methods_preserve_functions() {
        for method in ReorderMethod::ALL {
            let (mut bdd, x) = setup(8);
            let f = pairs_function(&mut bdd, &x);
            let g = bdd.apply_xor(x[1], x[6]).unwrap();
            let (tf, tg) = (truth_table(&bdd, f), truth_table(&bdd, g));

            bdd.reorder(method).unwrap();
            assert_eq!(truth_table(&bdd, f), tf, "{}", method);
            assert_eq!(truth_table(&bdd, g), tg, "{}", method);
            bdd.validate().unwrap();

            let mut order = bdd.var_order();
            order.sort_unstable();
            assert_eq!(order, (0..8).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_sift_shrinks() {
        let (mut bdd, x) = setup(8);
        let f = pairs_function(&mut bdd, &x);
        let before = bdd.node_count(f).unwrap();

        bdd.reorder(ReorderMethod::Sift).unwrap();
        let after = bdd.node_count(f).unwrap();
        assert!(after < before, "{} -> {}", before, after);

        let stats = bdd.reorder_stats();
        assert_eq!(stats.num, 1);
        assert_eq!(stats.method, ReorderMethod::Sift);
        assert!(stats.swaps > 0);
        assert!(bdd.reorder_gain() > 0);
    }

    #[test]
    fn test_blocks_stay_together() {
        let (mut bdd, x) = setup(6);
        bdd.add_var_block(0, 1, true).unwrap();
        bdd.add_var_block(4, 5, false).unwrap();
        let f = pairs_function(&mut bdd, &x);
        let table = truth_table(&bdd, f);

        bdd.reorder(ReorderMethod::Sift).unwrap();
        assert_eq!(truth_table(&bdd, f), table);
        let l = |bdd: &Bdd, v| bdd.var_to_level(v).unwrap() as i64;
        assert_eq!((l(&bdd, 0) - l(&bdd, 1)).abs(), 1);
        // Fixed block keeps its internal order.
        assert!(l(&bdd, 0) < l(&bdd, 1));
        assert_eq!((l(&bdd, 4) - l(&bdd, 5)).abs(), 1);
        assert_eq!(bdd.var_block_count(), 2);
    }

    #[test]
    fn test_pairs_follow_reordering() {
        let (mut bdd, x) = setup(3);
        let nx1 = bdd.nith_var(1).unwrap();
        let f = bdd.apply_and(x[0], nx1).unwrap();
        let p = bdd.make_pair();
        bdd.set_pair(p, 0, 2).unwrap();

        bdd.set_var_order(&[2, 1, 0]).unwrap();
        let g = bdd.replace(f, p).unwrap();
        assert_eq!(g, bdd.apply_and(x[2], nx1).unwrap());
    }

    #[test]
    fn test_auto_reorder() {
        let config = BddConfig {
            node_size: 100,
            ..Default::default()
        };
        let mut bdd = Bdd::new(config).unwrap();
        bdd.set_var_num(12).unwrap();
        assert_eq!(bdd.set_auto_reorder(ReorderMethod::Sift, 1).unwrap(), ReorderMethod::None);

        let events = Rc::new(RefCell::new(Vec::new()));
        let log = events.clone();
        bdd.on_reorder(move |pre, stats| log.borrow_mut().push((pre, stats.num)));

        let x: Vec<Ref> = (0..12).map(|v| bdd.ith_var(v).unwrap()).collect();
        let f = pairs_function(&mut bdd, &x);

        assert_eq!(bdd.reorder_stats().num, 1);
        assert_eq!(*events.borrow(), vec![(true, 0), (false, 1)]);
        assert_eq!(bdd.auto_reorder_times(), 0);
        // 3^6 of the 4096 assignments falsify every pair.
        assert_eq!(bdd.sat_count(f).unwrap(), 4096.0 - 729.0);
        bdd.validate().unwrap();
    }

    #[test]
    fn test_disable_reorder() {
        let config = BddConfig {
            node_size: 100,
            ..Default::default()
        };
        let mut bdd = Bdd::new(config).unwrap();
        bdd.set_var_num(12).unwrap();
        bdd.set_auto_reorder(ReorderMethod::Win2, -1).unwrap();
        bdd.disable_reorder();

        let x: Vec<Ref> = (0..12).map(|v| bdd.ith_var(v).unwrap()).collect();
        pairs_function(&mut bdd, &x);
        assert_eq!(bdd.reorder_stats().num, 0);
        assert_eq!(bdd.var_order(), (0..12).collect::<Vec<_>>());

        bdd.enable_reorder();
        assert!(bdd.reorder_ready());
        assert!(bdd.set_auto_reorder(ReorderMethod::Sift, -2).is_err());
    }

    #[test]
    fn test_random_is_seeded() {
        let run = |seed| {
            let (mut bdd, x) = setup(6);
            bdd.set_reorder_seed(seed);
            pairs_function(&mut bdd, &x);
            bdd.reorder(ReorderMethod::Random).unwrap();
            bdd.var_order()
        };
        assert_eq!(run(7), run(7));
    }
}
