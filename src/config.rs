use crate::error::{BddError, Result};
use crate::reorder::ReorderMethod;

/// Tuning knobs of a [`Bdd`][crate::bdd::Bdd] manager.
///
/// All of them can also be changed later through the corresponding setters
/// on the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct BddConfig {
    /// Initial number of node slots (rounded up to a prime).
    pub node_size: usize,
    /// Initial number of entries per operator cache (rounded up to a prime).
    pub cache_size: usize,
    /// When set, caches are resized to `nodes / ratio` on every table growth.
    pub cache_ratio: Option<u32>,
    /// Grow the table when less than this percentage is free after a collection.
    pub min_free_nodes: u32,
    /// Maximum number of slots added by a single growth (0 means no limit).
    pub max_increase: usize,
    /// Growth factor; 0 means doubling.
    pub increase_factor: f64,
    /// Hard limit on the number of slots (0 means no limit).
    pub max_node_num: usize,
    /// Method used by automatic reordering.
    pub reorder_method: ReorderMethod,
    /// Number of automatic reorderings allowed (`-1` means unlimited).
    pub reorder_times: i32,
    /// Flush caches on collection; when false, only dead entries are dropped.
    pub flush_cache_on_gc: bool,
}

impl Default for BddConfig {
    fn default() -> Self {
        Self {
            node_size: 1000,
            cache_size: 1000,
            cache_ratio: None,
            min_free_nodes: 20,
            max_increase: 10_000_000,
            increase_factor: 0.0,
            max_node_num: 0,
            reorder_method: ReorderMethod::None,
            reorder_times: 0,
            flush_cache_on_gc: true,
        }
    }
}

impl BddConfig {
    pub fn validate(&self) -> Result<()> {
        if self.node_size == 0 {
            return Err(BddError::Size("node_size must be positive".into()));
        }
        if self.cache_size == 0 {
            return Err(BddError::Size("cache_size must be positive".into()));
        }
        if self.cache_ratio == Some(0) {
            return Err(BddError::Range("cache_ratio must be positive".into()));
        }
        if self.min_free_nodes > 100 {
            return Err(BddError::Range(format!(
                "min_free_nodes is a percentage, got {}",
                self.min_free_nodes
            )));
        }
        if !(self.increase_factor >= 0.0) {
            return Err(BddError::Range(format!(
                "increase_factor must be non-negative, got {}",
                self.increase_factor
            )));
        }
        if self.max_node_num > 0 && self.max_node_num < self.node_size {
            return Err(BddError::Nodes(format!(
                "max_node_num {} is below node_size {}",
                self.max_node_num, self.node_size
            )));
        }
        if self.reorder_times < -1 {
            return Err(BddError::Range(format!(
                "reorder_times must be -1 or non-negative, got {}",
                self.reorder_times
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(BddConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid() {
        let config = BddConfig {
            min_free_nodes: 101,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BddError::Range(_))));

        let config = BddConfig {
            cache_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BddError::Size(_))));

        let config = BddConfig {
            max_node_num: 10,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BddError::Nodes(_))));

        let config = BddConfig {
            increase_factor: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
