//! Finite domains encoded in binary.
//!
//! A domain of size `n` is a block of `⌈log₂ n⌉` variables (at least one)
//! holding a value in `0..n`, least significant bit first. Domains created by
//! one [`Bdd::ext_domain`] call are interleaved bit by bit, which keeps
//! relations between them small.

use std::cmp::Reverse;
use std::fmt::{Display, Formatter};

use log::{debug, warn};

use crate::apply::BddOp;
use crate::bdd::Bdd;
use crate::engine::Step;
use crate::error::{BddError, Result};
use crate::pairing::PairId;
use crate::reference::Ref;

/// Handle of a finite domain of a [`Bdd`] manager.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct DomainId(usize);

impl DomainId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for DomainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "D{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Domain {
    pub name: String,
    pub size: u64,
    /// Encoding variables, least significant bit first.
    pub vars: Vec<u32>,
    /// Variable set of `vars`; holds a reference.
    pub var_set: Ref,
}

#[derive(Debug, Default)]
pub(crate) struct DomainTable {
    domains: Vec<Domain>,
    /// First variable not used by a domain yet.
    next_var: u32,
}

impl DomainTable {
    fn get(&self, d: DomainId) -> Result<&Domain> {
        self.domains
            .get(d.0)
            .ok_or_else(|| BddError::Range(format!("unknown domain {}", d)))
    }

    fn get_mut(&mut self, d: DomainId) -> Result<&mut Domain> {
        self.domains
            .get_mut(d.0)
            .ok_or_else(|| BddError::Range(format!("unknown domain {}", d)))
    }
}

/// Number of bits needed to encode the values `0..size`.
fn bits_for(size: u64) -> u32 {
    (u64::BITS - (size - 1).leading_zeros()).max(1)
}

/// Split `lo..=hi` into aligned blocks of `2^k` values. Each block is the
/// list of `(bit, value)` assignments to the bits at and above `k`.
fn aligned_blocks(lo: u64, hi: u64, bits: u32) -> Vec<Vec<(u32, bool)>> {
    let mut blocks = Vec::new();
    let mut v = lo as u128;
    let end = hi as u128 + 1;
    while v < end {
        let mut k = if v == 0 { bits } else { v.trailing_zeros().min(bits) };
        while v + (1u128 << k) > end {
            k -= 1;
        }
        blocks.push((k..bits).map(|j| (j, v >> j & 1 == 1)).collect());
        v += 1u128 << k;
    }
    blocks
}

impl Bdd {
    /// Conjunction of the literals `(var, value)`.
    fn domain_cube(&mut self, mut literals: Vec<(u32, bool)>) -> Step<u32> {
        literals.sort_by_key(|&(v, _)| Reverse(self.var2level[v as usize]));
        let mut res = 1;
        for (var, value) in literals {
            res = if value {
                self.make_node(var, 0, res)?
            } else {
                self.make_node(var, res, 0)?
            };
            self.stack.push(res);
        }
        Ok(res)
    }

    /// Create one domain per entry of `sizes`, with interleaved variables.
    ///
    /// Variables are allocated after those of earlier domains, and the
    /// number of variables grows when needed.
    pub fn ext_domain(&mut self, sizes: &[u64]) -> Result<Vec<DomainId>> {
        debug!("ext_domain(sizes = {:?})", sizes);
        if let Some(pos) = sizes.iter().position(|&s| s == 0) {
            return Err(BddError::Range(format!("domain #{} has size 0", pos)));
        }

        let widths: Vec<u32> = sizes.iter().map(|&s| bits_for(s)).collect();
        let extra: u32 = widths.iter().sum();
        let first = self.domains.next_var;
        if first + extra > self.var_num {
            self.set_var_num(first + extra)?;
        }

        let mut vars: Vec<Vec<u32>> = widths.iter().map(|&w| Vec::with_capacity(w as usize)).collect();
        let mut next = first;
        let max_width = widths.iter().copied().max().unwrap_or(0);
        for bit in 0..max_width {
            for (d, &width) in widths.iter().enumerate() {
                if bit < width {
                    vars[d].push(next);
                    next += 1;
                }
            }
        }

        let mut ids = Vec::with_capacity(sizes.len());
        for (&size, vars) in sizes.iter().zip(vars) {
            let var_set = self.make_set(&vars)?;
            let id = DomainId(self.domains.domains.len());
            self.domains.domains.push(Domain {
                name: id.to_string(),
                size,
                vars,
                var_set,
            });
            ids.push(id);
        }
        self.domains.next_var = next;
        Ok(ids)
    }

    /// The `i`-th domain, in creation order.
    pub fn domain(&self, i: usize) -> Result<DomainId> {
        if i >= self.domains.domains.len() {
            return Err(BddError::Range(format!(
                "domain #{} (only {} domains)",
                i,
                self.domains.domains.len()
            )));
        }
        Ok(DomainId(i))
    }

    pub fn num_domains(&self) -> usize {
        self.domains.domains.len()
    }

    /// Forget all domains. Their variables stay declared.
    pub fn clear_domains(&mut self) {
        let table = std::mem::take(&mut self.domains);
        for d in table.domains {
            if let Err(e) = self.del_ref(d.var_set) {
                warn!("releasing the variable set of {} failed: {}", d.name, e);
            }
        }
    }

    pub fn domain_size(&self, d: DomainId) -> Result<u64> {
        Ok(self.domains.get(d)?.size)
    }

    /// Encoding variables of `d`, least significant bit first.
    pub fn domain_vars(&self, d: DomainId) -> Result<Vec<u32>> {
        Ok(self.domains.get(d)?.vars.clone())
    }

    /// Variable set of the encoding variables of `d`.
    pub fn domain_var_set(&mut self, d: DomainId) -> Result<Ref> {
        let set = self.domains.get(d)?.var_set;
        self.add_ref(set)
    }

    pub fn domain_name(&self, d: DomainId) -> Result<&str> {
        Ok(&self.domains.get(d)?.name)
    }

    pub fn set_domain_name(&mut self, d: DomainId, name: impl Into<String>) -> Result<()> {
        self.domains.get_mut(d)?.name = name.into();
        Ok(())
    }

    /// The function "`d` equals `value`".
    pub fn ith_value(&mut self, d: DomainId, value: u64) -> Result<Ref> {
        let domain = self.domains.get(d)?;
        if value >= domain.size {
            return Err(BddError::Range(format!(
                "value {} outside {} of size {}",
                value, domain.name, domain.size
            )));
        }
        let literals: Vec<(u32, bool)> = domain
            .vars
            .iter()
            .enumerate()
            .map(|(bit, &var)| (var, value >> bit & 1 == 1))
            .collect();
        self.run_op(&[], |bdd| bdd.domain_cube(literals.clone()))
    }

    /// The function "`d` holds a value of its domain".
    pub fn domain_bdd(&mut self, d: DomainId) -> Result<Ref> {
        let size = self.domains.get(d)?.size;
        self.var_range(d, 0, size - 1)
    }

    /// The function "`lo <= d <= hi`", over all values the encoding variables
    /// can hold (not only those below the domain size).
    pub fn var_range(&mut self, d: DomainId, lo: u64, hi: u64) -> Result<Ref> {
        debug!("var_range(d = {}, lo = {}, hi = {})", d, lo, hi);
        let domain = self.domains.get(d)?;
        let bits = domain.vars.len() as u32;
        if bits < u64::BITS && hi >> bits != 0 {
            return Err(BddError::Range(format!(
                "{} does not fit into the {} bits of {}",
                hi, bits, domain.name
            )));
        }
        if lo > hi {
            return Ok(self.zero());
        }

        let vars = domain.vars.clone();
        let cubes: Vec<Vec<(u32, bool)>> = aligned_blocks(lo, hi, bits)
            .into_iter()
            .map(|block| block.into_iter().map(|(bit, value)| (vars[bit as usize], value)).collect())
            .collect();
        self.run_op(&[], |bdd| {
            let mut acc = 0;
            for cube in &cubes {
                let c = bdd.domain_cube(cube.clone())?;
                acc = bdd.apply_rec(BddOp::Or, acc, c)?;
                bdd.stack.push(acc);
            }
            Ok(acc)
        })
    }

    /// Make `pair` replace the variables of `from` by those of `to`.
    pub fn set_domain_pair(&mut self, pair: PairId, from: DomainId, to: DomainId) -> Result<()> {
        let from = self.domain_vars(from)?;
        let to = self.domain_vars(to)?;
        self.set_pairs(pair, &from, &to)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(2), 1);
        assert_eq!(bits_for(3), 2);
        assert_eq!(bits_for(8), 3);
        assert_eq!(bits_for(9), 4);
        assert_eq!(bits_for(u64::MAX), 64);
    }

    #[test]
    fn test_aligned_blocks() {
        // 3..=12 over 4 bits: {3}, {4..7}, {8..11}, {12}
        let blocks = aligned_blocks(3, 12, 4);
        let sizes: Vec<usize> = blocks.iter().map(|b| 1 << (4 - b.len())).collect();
        assert_eq!(sizes, vec![1, 4, 4, 1]);
        // The whole range is a single empty cube.
        assert_eq!(aligned_blocks(0, 15, 4), vec![Vec::new()]);
        assert_eq!(aligned_blocks(0, u64::MAX, 64).len(), 1);
    }

    #[test]
    fn test_interleaved() {
        let mut bdd = Bdd::default();
        let ds = bdd.ext_domain(&[4, 16]).unwrap();
        assert_eq!(bdd.var_num(), 6);
        assert_eq!(bdd.domain_vars(ds[0]).unwrap(), vec![0, 2]);
        assert_eq!(bdd.domain_vars(ds[1]).unwrap(), vec![1, 3, 4, 5]);

        let more = bdd.ext_domain(&[1]).unwrap();
        assert_eq!(bdd.domain_vars(more[0]).unwrap(), vec![6]);
        assert_eq!(bdd.num_domains(), 3);
        assert_eq!(bdd.domain(2).unwrap(), more[0]);
        assert!(bdd.domain(3).is_err());
        assert!(bdd.ext_domain(&[0]).is_err());
    }

    #[test]
    fn test_ith_value() {
        let mut bdd = Bdd::default();
        let d = bdd.ext_domain(&[5]).unwrap()[0];
        let set = bdd.domain_var_set(d).unwrap();

        let v = bdd.ith_value(d, 5 - 1).unwrap();
        assert_eq!(bdd.sat_count_set(v, set).unwrap(), 1.0);
        // 4 = 0b100, least significant bit first.
        assert!(bdd.eval(v, &[false, false, true]).unwrap());
        assert!(matches!(bdd.ith_value(d, 5), Err(BddError::Range(_))));
    }

    #[test]
    fn test_domain_bdd() {
        let mut bdd = Bdd::default();
        let d = bdd.ext_domain(&[5]).unwrap()[0];
        let set = bdd.domain_var_set(d).unwrap();
        let all = bdd.domain_bdd(d).unwrap();
        assert_eq!(bdd.sat_count_set(all, set).unwrap(), 5.0);

        let mut expected = bdd.zero();
        for v in 0..5 {
            let x = bdd.ith_value(d, v).unwrap();
            expected = bdd.apply_or(expected, x).unwrap();
        }
        assert_eq!(all, expected);
    }

    #[test]
    fn test_var_range() {
        let mut bdd = Bdd::default();
        let d = bdd.ext_domain(&[16]).unwrap()[0];
        let set = bdd.domain_var_set(d).unwrap();

        let r = bdd.var_range(d, 3, 12).unwrap();
        assert_eq!(bdd.sat_count_set(r, set).unwrap(), 10.0);
        let full = bdd.var_range(d, 0, 15).unwrap();
        assert_eq!(full, bdd.one());
        assert_eq!(bdd.var_range(d, 7, 6).unwrap(), bdd.zero());
        assert!(bdd.var_range(d, 0, 16).is_err());
    }

    #[test]
    fn test_names_and_clear() {
        let mut bdd = Bdd::default();
        let d = bdd.ext_domain(&[3]).unwrap()[0];
        assert_eq!(bdd.domain_name(d).unwrap(), "D0");
        bdd.set_domain_name(d, "state").unwrap();
        assert_eq!(bdd.domain_name(d).unwrap(), "state");

        bdd.clear_domains();
        assert_eq!(bdd.num_domains(), 0);
        assert!(bdd.domain_size(d).is_err());
        // Variables are kept, new domains start over at variable 0.
        assert_eq!(bdd.var_num(), 2);
        let e = bdd.ext_domain(&[3]).unwrap()[0];
        assert_eq!(bdd.domain_vars(e).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_domain_pair() {
        let mut bdd = Bdd::default();
        let ds = bdd.ext_domain(&[8, 8, 2]).unwrap();
        let p = bdd.make_pair();
        bdd.set_domain_pair(p, ds[0], ds[1]).unwrap();

        let a = bdd.ith_value(ds[0], 6).unwrap();
        let b = bdd.replace(a, p).unwrap();
        assert_eq!(b, bdd.ith_value(ds[1], 6).unwrap());

        assert!(matches!(bdd.set_domain_pair(p, ds[0], ds[2]), Err(BddError::VarNum { .. })));
    }

    #[test]
    fn test_count_survives_growth() {
        let mut bdd = Bdd::default();
        let d = bdd.ext_domain(&[6]).unwrap()[0];
        let set = bdd.domain_var_set(d).unwrap();
        let all = bdd.domain_bdd(d).unwrap();
        let before = bdd.sat_count_set(all, set).unwrap();
        bdd.set_var_num(20).unwrap();
        assert_eq!(bdd.sat_count_set(all, set).unwrap(), before);
    }
}
