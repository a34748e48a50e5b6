//! Text format for saving and loading a single BDD.
//!
//! ```text
//! 2 3          node count, variable count
//! 0 1 2        level of each variable
//! 222 1 1 0    id var low high, children first
//! 333 2 1 222
//! ```
//!
//! Ids are local to the file; `0` and `1` are the terminals. A constant is
//! saved as `0 0` followed by its value. The saved levels are informational:
//! loading rebuilds the function in the current order of the manager.

use std::collections::HashMap;
use std::io::{Read, Write};

use log::{debug, warn};

use crate::bdd::Bdd;
use crate::error::{BddError, Result};
use crate::reference::Ref;

impl Bdd {
    /// Write `f` to `out`.
    pub fn save(&self, f: Ref, out: &mut impl Write) -> Result<()> {
        let root = self.check(f)?;
        if root < 2 {
            writeln!(out, "0 0 {}", root)?;
            return Ok(());
        }

        let count = self.node_count(f)?;
        writeln!(out, "{} {}", count, self.var_num)?;
        let levels: Vec<String> = self.var2level[..self.var_num as usize]
            .iter()
            .map(|l| l.to_string())
            .collect();
        writeln!(out, "{}", levels.join(" "))?;

        // Post-order: a node is written once both children are.
        let mut written = vec![false; self.table.capacity()];
        let mut stack = vec![(root, false)];
        while let Some((n, expanded)) = stack.pop() {
            if n < 2 || written[n as usize] {
                continue;
            }
            if expanded {
                written[n as usize] = true;
                writeln!(out, "{} {} {} {}", n, self.var_of(n), self.lo(n), self.hi(n))?;
            } else {
                stack.push((n, true));
                stack.push((self.hi(n), false));
                stack.push((self.lo(n), false));
            }
        }
        Ok(())
    }

    /// Read a BDD written by [`Bdd::save`]. The number of variables grows to
    /// the one in the file when needed.
    pub fn load(&mut self, input: impl Read) -> Result<Ref> {
        self.load_with(input, None)
    }

    /// Like [`Bdd::load`], renaming each saved variable `v` to `translate[v]`.
    pub fn load_with(&mut self, mut input: impl Read, translate: Option<&[u32]>) -> Result<Ref> {
        let mut text = String::new();
        input.read_to_string(&mut text)?;
        let mut tokens = Tokens::new(&text);

        let node_num = tokens.next_u32()?;
        let var_num = tokens.next_u32()?;
        debug!("load: {} nodes over {} variables", node_num, var_num);
        if node_num == 0 && var_num == 0 {
            return match tokens.next_u32()? {
                0 => Ok(self.zero()),
                1 => Ok(self.one()),
                c => Err(BddError::Format(format!("unknown constant {}", c))),
            };
        }
        if node_num == 0 {
            return Err(BddError::Format("no nodes".into()));
        }

        for _ in 0..var_num {
            tokens.next_u32()?;
        }
        if var_num > self.var_num {
            self.set_var_num(var_num)?;
        }

        let mut nodes: HashMap<u32, Ref> = HashMap::new();
        let result = self.load_nodes(&mut tokens, node_num, translate, &mut nodes);

        let mut keep = result.as_ref().ok().copied();
        for (_, r) in nodes {
            if keep == Some(r) {
                keep = None;
                continue;
            }
            if let Err(e) = self.del_ref(r) {
                warn!("load: releasing {} failed: {}", r, e);
            }
        }
        result
    }

    fn load_nodes(
        &mut self,
        tokens: &mut Tokens<'_>,
        node_num: u32,
        translate: Option<&[u32]>,
        nodes: &mut HashMap<u32, Ref>,
    ) -> Result<Ref> {
        let mut root = Ref::ZERO;
        for _ in 0..node_num {
            let key = tokens.next_u32()?;
            let var = tokens.next_u32()?;
            let low = tokens.next_u32()?;
            let high = tokens.next_u32()?;
            if key < 2 {
                return Err(BddError::Format(format!("node id {} is reserved", key)));
            }

            let var = match translate {
                Some(map) => *map
                    .get(var as usize)
                    .ok_or_else(|| BddError::Format(format!("no translation for variable {}", var)))?,
                None => var,
            };
            let lookup = |id: u32| match id {
                0 => Ok(Ref::ZERO),
                1 => Ok(Ref::ONE),
                _ => nodes
                    .get(&id)
                    .copied()
                    .ok_or_else(|| BddError::Format(format!("node {} used before its definition", id))),
            };
            let (low, high) = (lookup(low)?, lookup(high)?);

            let x = self.ith_var(var)?;
            let f = self.apply_ite(x, high, low)?;
            self.del_ref(x)?;
            if let Some(old) = nodes.insert(key, f) {
                self.del_ref(old)?;
            }
            root = f;
        }
        Ok(root)
    }
}

struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace(),
        }
    }

    fn next_u32(&mut self) -> Result<u32> {
        let token = self
            .inner
            .next()
            .ok_or_else(|| BddError::Format("unexpected end of input".into()))?;
        token
            .parse()
            .map_err(|_| BddError::Format(format!("expected a number, found '{}'", token)))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::reorder::ReorderMethod;

    fn save_to_string(bdd: &Bdd, f: Ref) -> String {
        let mut out = Vec::new();
        bdd.save(f, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_load_fixture() {
        let mut bdd = Bdd::default();
        let f = bdd.load("2 3\n0 1 2\n222 1 1 0\n333 2 1 222".as_bytes()).unwrap();
        assert_eq!(bdd.var_num(), 3);
        assert_eq!(bdd.sat_count(f).unwrap(), 6.0);
        // ¬(x1 ∧ x2), rooted at x1 in the identity order.
        assert_eq!(bdd.var(f).unwrap(), 1);
        assert_eq!(bdd.ref_count(f).unwrap(), 1);
    }

    #[test]
    fn test_constants() {
        let mut bdd = Bdd::with_vars(2).unwrap();
        assert_eq!(save_to_string(&bdd, bdd.one()), "0 0 1\n");
        assert_eq!(bdd.load("0 0 0".as_bytes()).unwrap(), bdd.zero());
        assert_eq!(bdd.load("0 0\n1\n".as_bytes()).unwrap(), bdd.one());
        assert!(bdd.load("0 0 2".as_bytes()).is_err());
    }

    #[test]
    fn test_save() {
        let mut bdd = Bdd::with_vars(2).unwrap();
        let x = bdd.ith_var(0).unwrap();
        let y = bdd.ith_var(1).unwrap();
        let f = bdd.apply_and(x, y).unwrap();

        let text = save_to_string(&bdd, f);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "2 2");
        assert_eq!(lines[1], "0 1");
        assert_eq!(lines.len(), 4);
        // The child comes first.
        assert!(lines[2].split(' ').nth(1) == Some("1"));
    }

    #[test]
    fn test_round_trip_across_orders() {
        let mut bdd = Bdd::with_vars(4).unwrap();
        let x: Vec<Ref> = (0..4).map(|v| bdd.ith_var(v).unwrap()).collect();
        let a = bdd.apply_xor(x[0], x[3]).unwrap();
        let b = bdd.apply_and(x[1], x[2]).unwrap();
        let f = bdd.apply_or(a, b).unwrap();
        let text = save_to_string(&bdd, f);

        let mut other = Bdd::default();
        other.set_var_num(4).unwrap();
        other.set_var_order(&[3, 1, 2, 0]).unwrap();
        let g = other.load(text.as_bytes()).unwrap();
        assert_eq!(other.sat_count(g).unwrap(), bdd.sat_count(f).unwrap());
        for bits in 0..16u32 {
            let assignment: Vec<bool> = (0..4).map(|i| bits >> i & 1 == 1).collect();
            assert_eq!(other.eval(g, &assignment).unwrap(), bdd.eval(f, &assignment).unwrap());
        }
        other.validate().unwrap();

        // Loading into the same manager gives the same node.
        assert_eq!(bdd.load(text.as_bytes()).unwrap(), f);
        bdd.reorder(ReorderMethod::Sift).unwrap();
        assert_eq!(bdd.load(text.as_bytes()).unwrap(), f);
    }

    #[test]
    fn test_translate() {
        let mut bdd = Bdd::default();
        let f = bdd
            .load_with("1 1\n0\n5 0 0 1".as_bytes(), Some(&[0]))
            .unwrap();
        assert_eq!(bdd.var(f).unwrap(), 0);

        bdd.set_var_num(3).unwrap();
        let g = bdd
            .load_with("1 1\n0\n5 0 0 1".as_bytes(), Some(&[2]))
            .unwrap();
        assert_eq!(bdd.var(g).unwrap(), 2);
        assert!(bdd.load_with("1 1\n0\n5 0 0 1".as_bytes(), Some(&[])).is_err());
    }

    #[test]
    fn test_malformed() {
        let mut bdd = Bdd::default();
        for text in [
            "",
            "2",
            "1 1\n0\n",
            "1 1\n0\n5 0 0 x",
            "1 1\n0\n5 0 0 7",
            "1 1\n0\n1 0 0 1",
            "0 1\n0\n",
        ] {
            assert!(
                matches!(bdd.load(text.as_bytes()), Err(BddError::Format(_))),
                "{:?}",
                text
            );
        }
        bdd.validate().unwrap();
    }
}
