//! The BDD manager.
//!
//! A [`Bdd`] owns the node table, the operator caches, the variable order and
//! every piece of state the algorithms need. All operations go through it and
//! take `&mut self`, so operations cannot interleave.
//!
//! # Handles and reference counting
//!
//! Operations return [`Ref`] handles that carry one external reference owned by
//! the caller. A node with a positive count (or reachable from one) survives
//! garbage collection; [`Bdd::del_ref`] gives the reference back. Handles are
//! generational: using one whose node has been collected fails with
//! [`BddError::InvalidNode`] instead of reading a recycled slot.
//!
//! References can also be released from other threads through a
//! [`DeferredRelease`] queue, drained at the start of the next collection.
//!
//! # Node allocation
//!
//! [`make_node`](Bdd::make_node) keeps the diagram reduced and canonical. When
//! the table is full it collects garbage, may ask for an automatic reordering
//! (the running operation is then restarted once), and grows the table when
//! too few slots were freed.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};
use parking_lot::Mutex;

use crate::cache::{CacheStats, Caches};
use crate::config::BddConfig;
use crate::domain::DomainTable;
use crate::engine::{Interrupt, Step};
use crate::error::{BddError, Result};
use crate::node::{Node, MAX_REF};
use crate::pairing::PairTable;
use crate::quant::QuantState;
use crate::reference::Ref;
use crate::reorder::{ReorderState, ReorderStats};
use crate::table::NodeTable;
use crate::utils::{prime_gte, prime_lte};

/// Largest number of variables a manager can hold.
pub const MAX_VAR: u32 = (1 << 21) - 1;

pub type GcHandler = Box<dyn FnMut(bool, &GcStats)>;
pub type ResizeHandler = Box<dyn FnMut(usize, usize)>;
pub type ReorderHandler = Box<dyn FnMut(bool, &ReorderStats)>;

/// Garbage collection statistics, passed to the GC handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GcStats {
    /// Size of the node table.
    pub nodes: usize,
    /// Free slots after the last collection.
    pub free_nodes: usize,
    /// Nodes freed by the last collection.
    pub freed: usize,
    pub time: Duration,
    pub sum_time: Duration,
    /// Number of collections so far.
    pub num: usize,
}

/// Snapshot of the manager's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct BddStats {
    pub produced: u64,
    pub node_num: usize,
    pub alloc_num: usize,
    pub max_node_num: usize,
    pub free_nodes: usize,
    pub min_free_nodes: u32,
    pub var_num: u32,
    pub cache_size: usize,
    pub gc_num: usize,
}

/// Queue of pending reference releases.
///
/// Clonable and `Send`: any thread may schedule a release, which the manager
/// applies at the start of its next garbage collection.
#[derive(Debug, Clone, Default)]
pub struct DeferredRelease {
    queue: Arc<Mutex<Vec<Ref>>>,
}

impl DeferredRelease {
    pub fn release(&self, r: Ref) {
        self.queue.lock().push(r);
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    fn take(&self) -> Vec<Ref> {
        std::mem::take(&mut *self.queue.lock())
    }
}

#[derive(Default)]
pub(crate) struct Handlers {
    pub gc: Option<GcHandler>,
    pub resize: Option<ResizeHandler>,
    pub reorder: Option<ReorderHandler>,
}

pub struct Bdd {
    pub(crate) table: NodeTable,
    pub(crate) caches: Caches,
    /// Operation stack: intermediate results, treated as GC roots.
    pub(crate) stack: Vec<u32>,
    pub(crate) config: BddConfig,

    pub(crate) var_num: u32,
    /// `var2level[var_num] == var_num` is the terminals' sentinel.
    pub(crate) var2level: Vec<u32>,
    pub(crate) level2var: Vec<u32>,
    /// `[ith_var, nith_var]` per variable, pinned.
    pub(crate) var_nodes: Vec<[u32; 2]>,

    pub(crate) quant: QuantState,
    pub(crate) pairs: PairTable,
    pub(crate) domains: DomainTable,
    pub(crate) reorder: ReorderState,

    pub(crate) gc_stats: GcStats,
    pub(crate) handlers: Handlers,
    deferred: DeferredRelease,
}

impl Bdd {
    pub fn new(config: BddConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create a manager with `var_num` variables and default settings.
    pub fn with_vars(var_num: u32) -> Result<Self> {
        let mut bdd = Bdd::default();
        bdd.set_var_num(var_num)?;
        Ok(bdd)
    }

    fn build(config: BddConfig) -> Self {
        let table = NodeTable::new(prime_gte(config.node_size), 0);
        let caches = Caches::new(match config.cache_ratio {
            Some(ratio) => (table.capacity() / ratio as usize).max(1),
            None => config.cache_size,
        });
        let reorder = ReorderState::new(&config, table.capacity());
        Self {
            table,
            caches,
            stack: Vec::new(),
            config,
            var_num: 0,
            var2level: vec![0],
            level2var: vec![0],
            var_nodes: Vec::new(),
            quant: QuantState::default(),
            pairs: PairTable::default(),
            domains: DomainTable::default(),
            reorder,
            gc_stats: GcStats::default(),
            handlers: Handlers::default(),
            deferred: DeferredRelease::default(),
        }
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::build(BddConfig::default())
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bdd")
            .field("var_num", &self.var_num)
            .field("capacity", &self.table.capacity())
            .field("free", &self.table.free_num())
            .field("produced", &self.table.produced())
            .finish()
    }
}

// Handles and reference counting.
impl Bdd {
    /// Validate a handle and return its node index.
    pub(crate) fn check(&self, r: Ref) -> Result<u32> {
        let index = r.index();
        if !self.table.is_live(index) || self.table.slot(index).generation != r.generation() {
            return Err(BddError::InvalidNode(r));
        }
        Ok(index)
    }

    /// Handle for a node, without touching its reference count.
    pub(crate) fn handle(&self, index: u32) -> Ref {
        Ref::new(index, self.table.slot(index).generation)
    }

    /// Handle for a node, carrying a new external reference.
    pub(crate) fn output(&mut self, index: u32) -> Ref {
        self.table.slot_mut(index).inc_ref();
        self.handle(index)
    }

    pub(crate) fn inc_ref(&mut self, index: u32) {
        self.table.slot_mut(index).inc_ref();
    }

    pub(crate) fn dec_ref(&mut self, index: u32) {
        if !self.table.slot_mut(index).dec_ref() {
            warn!("reference count underflow on internal node {}", index);
        }
    }

    /// Take an additional external reference on `f`.
    pub fn add_ref(&mut self, f: Ref) -> Result<Ref> {
        let index = self.check(f)?;
        self.inc_ref(index);
        Ok(f)
    }

    /// Give back one external reference on `f`.
    pub fn del_ref(&mut self, f: Ref) -> Result<()> {
        let index = self.check(f)?;
        if !self.table.slot_mut(index).dec_ref() {
            return Err(BddError::RefUnderflow(f));
        }
        Ok(())
    }

    pub fn ref_count(&self, f: Ref) -> Result<u32> {
        let index = self.check(f)?;
        Ok(self.table.slot(index).refs as u32)
    }

    /// Queue through which other threads may release references.
    pub fn deferred_release(&self) -> DeferredRelease {
        self.deferred.clone()
    }
}

// Node access.
impl Bdd {
    pub fn zero(&self) -> Ref {
        Ref::ZERO
    }
    pub fn one(&self) -> Ref {
        Ref::ONE
    }
    pub fn constant(&self, value: bool) -> Ref {
        if value {
            Ref::ONE
        } else {
            Ref::ZERO
        }
    }

    pub fn is_zero(&self, f: Ref) -> bool {
        f.is_zero()
    }
    pub fn is_one(&self, f: Ref) -> bool {
        f.is_one()
    }
    pub fn is_terminal(&self, f: Ref) -> bool {
        f.is_terminal()
    }

    pub(crate) fn var_of(&self, n: u32) -> u32 {
        self.table.node(n).var
    }
    pub(crate) fn lvl(&self, n: u32) -> u32 {
        self.var2level[self.table.node(n).var as usize]
    }
    pub(crate) fn lo(&self, n: u32) -> u32 {
        self.table.node(n).low
    }
    pub(crate) fn hi(&self, n: u32) -> u32 {
        self.table.node(n).high
    }

    pub(crate) fn check_var(&self, var: u32) -> Result<()> {
        if var >= self.var_num {
            return Err(BddError::UnknownVar {
                var,
                var_num: self.var_num,
            });
        }
        Ok(())
    }

    fn check_inner(&self, f: Ref) -> Result<u32> {
        let index = self.check(f)?;
        if index < 2 {
            return Err(BddError::Range(format!("{} is a constant", f)));
        }
        Ok(index)
    }

    /// The function `x_var`.
    pub fn ith_var(&mut self, var: u32) -> Result<Ref> {
        self.check_var(var)?;
        Ok(self.output(self.var_nodes[var as usize][0]))
    }

    /// The function `¬x_var`.
    pub fn nith_var(&mut self, var: u32) -> Result<Ref> {
        self.check_var(var)?;
        Ok(self.output(self.var_nodes[var as usize][1]))
    }

    /// Decision variable of the root of `f`.
    pub fn var(&self, f: Ref) -> Result<u32> {
        let index = self.check_inner(f)?;
        Ok(self.var_of(index))
    }

    /// Level of the root of `f` in the current order.
    pub fn level(&self, f: Ref) -> Result<u32> {
        let index = self.check_inner(f)?;
        Ok(self.lvl(index))
    }

    pub fn low(&mut self, f: Ref) -> Result<Ref> {
        let index = self.check_inner(f)?;
        Ok(self.output(self.lo(index)))
    }

    pub fn high(&mut self, f: Ref) -> Result<Ref> {
        let index = self.check_inner(f)?;
        Ok(self.output(self.hi(index)))
    }

    pub fn var_to_level(&self, var: u32) -> Result<u32> {
        self.check_var(var)?;
        Ok(self.var2level[var as usize])
    }

    pub fn level_to_var(&self, level: u32) -> Result<u32> {
        if level >= self.var_num {
            return Err(BddError::Range(format!(
                "level {} (only {} levels)",
                level, self.var_num
            )));
        }
        Ok(self.level2var[level as usize])
    }

    pub fn var_num(&self) -> u32 {
        self.var_num
    }

    /// Add `num` variables; returns the index of the first new one.
    pub fn ext_var_num(&mut self, num: u32) -> Result<u32> {
        let start = self.var_num;
        if num > MAX_VAR || start + num > MAX_VAR {
            return Err(BddError::Range(format!("cannot add {} variables", num)));
        }
        if num > 0 {
            self.set_var_num(start + num)?;
        }
        Ok(start)
    }
}

// Node allocation, collection and growth.
impl Bdd {
    /// Find or create the node `(var, low, high)`.
    pub(crate) fn make_node(&mut self, var: u32, low: u32, high: u32) -> Step<u32> {
        if low == high {
            return Ok(low);
        }
        let node = Node { var, low, high };
        if let Some(index) = self.table.find(&node) {
            return Ok(index);
        }

        if !self.table.has_free() {
            self.collect();

            if self.table.used() >= self.reorder.next_trigger && self.reorder_ready() {
                return Err(Interrupt::Reorder);
            }

            let free_percent = self.table.free_num() * 100 / self.table.capacity();
            if free_percent <= self.config.min_free_nodes as usize {
                self.grow();
            }
        }

        self.table
            .insert_new(node)
            .ok_or(Interrupt::Error(BddError::NodeLimit))
    }

    /// Run a garbage collection.
    pub fn gc(&mut self) {
        self.collect();
    }

    pub(crate) fn collect(&mut self) {
        for r in self.deferred.take() {
            if let Err(e) = self.del_ref(r) {
                warn!("deferred release of {} failed: {}", r, e);
            }
        }

        if let Some(handler) = self.handlers.gc.as_mut() {
            handler(true, &self.gc_stats);
        }
        let start = Instant::now();

        let roots: Vec<u32> = self
            .stack
            .iter()
            .copied()
            .chain(self.table.live().filter(|&i| self.table.slot(i).refs > 0))
            .collect();
        self.table.mark_from(roots);
        let freed = self.table.sweep();

        if self.config.flush_cache_on_gc {
            self.caches.clear();
        } else {
            let table = &self.table;
            self.caches.scrub(|n| table.is_live(n));
        }

        let time = start.elapsed();
        self.gc_stats.nodes = self.table.capacity();
        self.gc_stats.free_nodes = self.table.free_num();
        self.gc_stats.freed = freed;
        self.gc_stats.time = time;
        self.gc_stats.sum_time += time;
        self.gc_stats.num += 1;
        info!(
            "gc #{}: {} nodes, {} free, {} freed, {:?}",
            self.gc_stats.num, self.gc_stats.nodes, self.gc_stats.free_nodes, freed, time
        );

        if let Some(handler) = self.handlers.gc.as_mut() {
            handler(false, &self.gc_stats);
        }
    }

    /// Grow the node table by one step. Returns `false` when it cannot grow.
    pub(crate) fn grow(&mut self) -> bool {
        match self.next_table_size() {
            Some(new_size) => {
                self.resize_table(new_size, true);
                true
            }
            None => false,
        }
    }

    /// Size of the next growth step, `None` when the limit is reached.
    pub(crate) fn next_table_size(&self) -> Option<usize> {
        let old_size = self.table.capacity();
        let max = self.config.max_node_num;
        if max > 0 && old_size >= max {
            return None;
        }

        let mut new_size = if self.config.increase_factor > 0.0 {
            old_size + (old_size as f64 * self.config.increase_factor) as usize
        } else {
            old_size * 2
        };
        let max_increase = self.config.max_increase;
        if max_increase > 0 && new_size > old_size + max_increase {
            new_size = old_size + max_increase;
        }
        if max > 0 && new_size > max {
            new_size = max;
        }
        let new_size = prime_lte(new_size);
        (new_size > old_size).then_some(new_size)
    }

    /// Grow the arena to `new_size` slots. Without `rehash` the unique table
    /// is stale until the next collection rebuilds it.
    pub(crate) fn resize_table(&mut self, new_size: usize, rehash: bool) {
        let old_size = self.table.capacity();
        self.table.extend(new_size);
        if rehash {
            self.table.rehash();
        }
        if let Some(ratio) = self.config.cache_ratio {
            self.caches.resize((new_size / ratio as usize).max(1));
        }
        info!("resized node table: {} -> {}", old_size, new_size);
        if let Some(handler) = self.handlers.resize.as_mut() {
            handler(old_size, new_size);
        }
    }

    /// Run `op` as one public operation and hand its result to the caller.
    ///
    /// `operands` are kept referenced for the whole operation. If `op` asks for
    /// an automatic reordering, the reordering runs and `op` is restarted once
    /// with automatic reordering disabled.
    pub(crate) fn run_op(&mut self, operands: &[u32], mut op: impl FnMut(&mut Bdd) -> Step<u32>) -> Result<Ref> {
        for &n in operands {
            self.inc_ref(n);
        }

        self.stack.clear();
        let mut result = op(self);
        self.stack.clear();

        if let Err(Interrupt::Reorder) = result {
            self.check_reorder();
            let disabled = std::mem::replace(&mut self.reorder.disabled, true);
            result = op(self);
            self.stack.clear();
            self.reorder.disabled = disabled;
        }

        for &n in operands {
            self.dec_ref(n);
        }

        match result {
            Ok(n) => Ok(self.output(n)),
            Err(Interrupt::Error(e)) => Err(e),
            Err(Interrupt::Reorder) => Err(BddError::NodeLimit),
        }
    }

    /// Grow the number of variables to `num`.
    ///
    /// New variables are placed below the existing ones in the order.
    pub fn set_var_num(&mut self, num: u32) -> Result<()> {
        if num < 1 || num > MAX_VAR {
            return Err(BddError::Range(format!(
                "number of variables must be in 1..={}, got {}",
                MAX_VAR, num
            )));
        }
        if num < self.var_num {
            return Err(BddError::DecreaseVarNum {
                current: self.var_num,
                requested: num,
            });
        }
        if num == self.var_num {
            return Ok(());
        }
        info!("set_var_num: {} -> {}", self.var_num, num);

        let old = self.var_num;
        self.set_sentinel(num);

        let disabled = std::mem::replace(&mut self.reorder.disabled, true);
        let mut created = old;
        let mut failure = None;
        for var in old..num {
            match self.make_var_nodes(var) {
                Ok(nodes) => {
                    self.var_nodes.push(nodes);
                    created += 1;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.reorder.disabled = disabled;

        if created != num {
            self.set_sentinel(created);
        }
        self.var_num = created;
        self.quant.resize(created as usize);
        self.pairs_resize(old, created);
        self.caches.count().clear();

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn make_var_nodes(&mut self, var: u32) -> Result<[u32; 2]> {
        let step = |bdd: &mut Bdd, low, high| match bdd.make_node(var, low, high) {
            Ok(n) => {
                bdd.table.slot_mut(n).refs = MAX_REF;
                Ok(n)
            }
            Err(Interrupt::Error(e)) => Err(e),
            Err(Interrupt::Reorder) => Err(BddError::NodeLimit),
        };
        let pos = step(self, 0, 1)?;
        let neg = step(self, 1, 0)?;
        Ok([pos, neg])
    }

    /// Resize the var/level maps to `num` variables, identity on new ones.
    fn set_sentinel(&mut self, num: u32) {
        let len = num as usize + 1;
        let old_len = self.var2level.len();
        self.var2level.resize(len, 0);
        self.level2var.resize(len, 0);
        for v in old_len.saturating_sub(1)..len {
            self.var2level[v] = v as u32;
            self.level2var[v] = v as u32;
        }
        self.table.set_terminal_var(num);
    }
}

// Statistics, handlers and settings.
impl Bdd {
    /// Number of slots in use, terminals included.
    pub fn node_num(&self) -> usize {
        self.table.used()
    }

    /// Size of the node table.
    pub fn alloc_num(&self) -> usize {
        self.table.capacity()
    }

    pub fn stats(&self) -> BddStats {
        BddStats {
            produced: self.table.produced(),
            node_num: self.table.used(),
            alloc_num: self.table.capacity(),
            max_node_num: self.config.max_node_num,
            free_nodes: self.table.free_num(),
            min_free_nodes: self.config.min_free_nodes,
            var_num: self.var_num,
            cache_size: self.caches.size(),
            gc_num: self.gc_stats.num,
        }
    }

    pub fn gc_stats(&self) -> &GcStats {
        &self.gc_stats
    }

    pub fn cache_stats(&self) -> Vec<CacheStats> {
        self.caches.stats()
    }

    pub fn config(&self) -> &BddConfig {
        &self.config
    }

    /// Called before (`true`) and after (`false`) each garbage collection.
    pub fn on_gc(&mut self, handler: impl FnMut(bool, &GcStats) + 'static) {
        self.handlers.gc = Some(Box::new(handler));
    }

    /// Called with the old and new size after each node table growth.
    pub fn on_resize(&mut self, handler: impl FnMut(usize, usize) + 'static) {
        self.handlers.resize = Some(Box::new(handler));
    }

    /// Called before (`true`) and after (`false`) each reordering.
    pub fn on_reorder(&mut self, handler: impl FnMut(bool, &ReorderStats) + 'static) {
        self.handlers.reorder = Some(Box::new(handler));
    }

    pub fn set_max_node_num(&mut self, max: usize) -> Result<usize> {
        if max > 0 && max < self.table.capacity() {
            return Err(BddError::Nodes(format!(
                "limit {} is below the allocated {} nodes",
                max,
                self.table.capacity()
            )));
        }
        Ok(std::mem::replace(&mut self.config.max_node_num, max))
    }

    pub fn set_min_free_nodes(&mut self, percent: u32) -> Result<u32> {
        if percent > 100 {
            return Err(BddError::Range(format!("{}% free nodes", percent)));
        }
        Ok(std::mem::replace(&mut self.config.min_free_nodes, percent))
    }

    pub fn set_max_increase(&mut self, max: usize) -> usize {
        std::mem::replace(&mut self.config.max_increase, max)
    }

    pub fn set_increase_factor(&mut self, factor: f64) -> Result<f64> {
        if !(factor >= 0.0) {
            return Err(BddError::Range(format!("increase factor {}", factor)));
        }
        Ok(std::mem::replace(&mut self.config.increase_factor, factor))
    }

    pub fn set_cache_ratio(&mut self, ratio: Option<u32>) -> Result<Option<u32>> {
        if ratio == Some(0) {
            return Err(BddError::Range("cache ratio must be positive".into()));
        }
        if let Some(ratio) = ratio {
            self.caches.resize((self.table.capacity() / ratio as usize).max(1));
        }
        Ok(std::mem::replace(&mut self.config.cache_ratio, ratio))
    }

    pub fn set_cache_size(&mut self, size: usize) -> Result<usize> {
        if size == 0 {
            return Err(BddError::Size("cache size must be positive".into()));
        }
        self.caches.resize(size);
        Ok(std::mem::replace(&mut self.config.cache_size, size))
    }

    /// Grow the node table to at least `size` slots; returns the old size.
    pub fn set_node_table_size(&mut self, size: usize) -> Result<usize> {
        let max = self.config.max_node_num;
        if max > 0 && size > max {
            return Err(BddError::Nodes(format!("size {} exceeds the limit {}", size, max)));
        }
        let old_size = self.table.capacity();
        if size > old_size {
            self.resize_table(prime_gte(size), true);
        }
        Ok(old_size)
    }

    pub fn set_flush_cache_on_gc(&mut self, flush: bool) -> bool {
        std::mem::replace(&mut self.config.flush_cache_on_gc, flush)
    }
}
