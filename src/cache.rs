//! Operator caches (computed tables).
//!
//! # Characteristics
//!
//! - Direct-mapped: one entry per slot, a colliding insert evicts.
//! - Full keys are stored, so a hit is never a false positive.
//! - Allocated lazily, on the first use of an operator family.
//! - Entries hold no references: they are flushed (or scrubbed of dead
//!   nodes) on every garbage collection and after reordering.

use crate::utils::{prime_gte, MyHash};

/// Discriminators stored in the last key component of shared families.
pub(crate) mod kind {
    pub const EXIST: u32 = 0;
    pub const FORALL: u32 = 1;
    pub const UNIQUE: u32 = 2;

    pub const REPLACE: u32 = 0;
    pub const VECCOMPOSE: u32 = 1;

    pub const RESTRICT: u32 = 0;
    pub const CONSTRAIN: u32 = 1;
    pub const SIMPLIFY: u32 = 2;
    /// Shifted left by 2, or-ed with the composed level.
    pub const COMPOSE: u32 = 3;

    pub const SATCOUNT: u32 = 0;
    pub const PATHCOUNT: u32 = 1;
    pub const SATCOUNT_LN: u32 = 2;
}

pub(crate) struct OpCache<K, V> {
    data: Vec<Option<(K, V)>>,
    hits: usize,
    misses: usize,
}

impl<K, V> OpCache<K, V>
where
    K: MyHash + Eq + Copy,
    V: Copy,
{
    /// Create a cache with a prime number of slots, at least `size`.
    pub fn new(size: usize) -> Self {
        let size = prime_gte(size);
        Self {
            data: std::iter::repeat_with(|| None).take(size).collect(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
    pub fn hits(&self) -> usize {
        self.hits
    }
    pub fn misses(&self) -> usize {
        self.misses
    }

    fn index(&self, key: &K) -> usize {
        (key.hash() % self.data.len() as u64) as usize
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        let index = self.index(key);
        match &self.data[index] {
            Some((k, v)) if k == key => {
                self.hits += 1;
                Some(*v)
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        let index = self.index(&key);
        self.data[index] = Some((key, value));
    }

    pub fn clear(&mut self) {
        self.data.fill_with(|| None);
    }

    /// Drop all entries and change the number of slots.
    pub fn resize(&mut self, size: usize) {
        let size = prime_gte(size);
        self.data.clear();
        self.data.resize_with(size, || None);
    }

    /// Keep only the entries for which `f` holds.
    pub fn retain(&mut self, mut f: impl FnMut(&K, &V) -> bool) {
        for entry in self.data.iter_mut() {
            if let Some((k, v)) = entry {
                if !f(k, v) {
                    *entry = None;
                }
            }
        }
    }
}

/// Hit/miss counters of one operator family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub family: &'static str,
    pub size: usize,
    pub hits: usize,
    pub misses: usize,
}

macro_rules! families {
    ($($name:ident : [$n:literal] => $v:ty, nodes $nodes:literal, result $res:literal;)*) => {
        /// All operator cache families of a manager.
        pub(crate) struct Caches {
            size: usize,
            $($name: Option<OpCache<[u32; $n], $v>>,)*
        }

        impl Caches {
            pub fn new(size: usize) -> Self {
                Self {
                    size,
                    $($name: None,)*
                }
            }

            $(
                pub fn $name(&mut self) -> &mut OpCache<[u32; $n], $v> {
                    let size = self.size;
                    self.$name.get_or_insert_with(|| OpCache::new(size))
                }
            )*

            pub fn clear(&mut self) {
                $(if let Some(c) = self.$name.as_mut() { c.clear(); })*
            }

            pub fn size(&self) -> usize {
                self.size
            }

            pub fn resize(&mut self, size: usize) {
                self.size = size;
                $(if let Some(c) = self.$name.as_mut() { c.resize(size); })*
            }

            /// Drop entries whose first `nodes` key components, or whose node
            /// result, are not alive.
            pub fn scrub(&mut self, live: impl Fn(u32) -> bool) {
                $(
                    if let Some(c) = self.$name.as_mut() {
                        c.retain(|k, v| {
                            k[..$nodes].iter().all(|&n| live(n)) && (!$res || live(result_node(v)))
                        });
                    }
                )*
            }

            pub fn stats(&self) -> Vec<CacheStats> {
                let mut stats = Vec::new();
                $(
                    if let Some(c) = self.$name.as_ref() {
                        stats.push(CacheStats {
                            family: stringify!($name),
                            size: c.size(),
                            hits: c.hits(),
                            misses: c.misses(),
                        });
                    }
                )*
                stats
            }
        }
    };
}

trait ResultNode {
    fn node(&self) -> u32;
}

impl ResultNode for u32 {
    fn node(&self) -> u32 {
        *self
    }
}

impl ResultNode for f64 {
    fn node(&self) -> u32 {
        1
    }
}

fn result_node<V: ResultNode>(v: &V) -> u32 {
    v.node()
}

families! {
    not: [1] => u32, nodes 1, result true;
    and: [2] => u32, nodes 2, result true;
    or: [2] => u32, nodes 2, result true;
    apply: [3] => u32, nodes 2, result true;
    ite: [3] => u32, nodes 3, result true;
    quant: [3] => u32, nodes 2, result true;
    appex: [4] => u32, nodes 3, result true;
    replace: [3] => u32, nodes 1, result true;
    misc: [3] => u32, nodes 2, result true;
    count: [2] => f64, nodes 1, result false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache() {
        let mut cache = OpCache::<[u32; 2], u32>::new(7);

        cache.insert([1, 2], 3);
        cache.insert([2, 3], 1);
        cache.insert([1, 3], 2);

        assert_eq!(cache.get(&[1, 2]), Some(3));
        assert_eq!(cache.get(&[2, 3]), Some(1));
        assert_eq!(cache.get(&[1, 3]), Some(2));
        assert_eq!(cache.get(&[2, 1]), None);
        assert_eq!(cache.get(&[3, 3]), None);
        assert_eq!(cache.hits(), 3);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_collision_evicts() {
        let mut cache = OpCache::<[u32; 1], u32>::new(2);
        assert_eq!(cache.size(), 2);
        cache.insert([0], 10);
        cache.insert([2], 20);
        assert_eq!(cache.get(&[0]), None);
        assert_eq!(cache.get(&[2]), Some(20));
    }

    #[test]
    fn test_retain() {
        let mut cache = OpCache::<[u32; 1], u32>::new(11);
        cache.insert([3], 4);
        cache.insert([5], 6);
        cache.retain(|k, _| k[0] != 3);
        assert_eq!(cache.get(&[3]), None);
        assert_eq!(cache.get(&[5]), Some(6));
    }

    #[test]
    fn test_lazy_families() {
        let mut caches = Caches::new(100);
        assert!(caches.stats().is_empty());
        caches.not().insert([5], 6);
        caches.ite().insert([2, 3, 4], 7);
        let stats = caches.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].family, "not");
        assert_eq!(stats[0].size, 101);

        caches.scrub(|n| n != 7);
        assert_eq!(caches.not().get(&[5]), Some(6));
        assert_eq!(caches.ite().get(&[2, 3, 4]), None);

        caches.clear();
        assert_eq!(caches.not().get(&[5]), None);
    }
}
