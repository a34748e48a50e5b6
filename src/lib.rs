//! # bdd-kernel: a BDD engine with dynamic variable reordering
//!
//! **`bdd-kernel`** is a manager-centric library for **Binary Decision Diagrams (BDDs)**:
//! canonical, reduced and ordered representations of Boolean functions.
//!
//! ## What is a BDD?
//!
//! A Binary Decision Diagram represents a Boolean function as a directed acyclic graph.
//! It is **canonical**: for a fixed variable order, every function has exactly one
//! representation, so equivalence checking is a handle comparison.
//!
//! ## Key Features
//!
//! - **Manager-Centric Architecture**: all operations go through the [`Bdd`][crate::bdd::Bdd] manager,
//!   which owns the node table, the operator caches and the variable order.
//! - **Reference Counting & GC**: results carry a reference owned by the caller. Unreferenced nodes
//!   are reclaimed by a mark-and-sweep collector; the node table grows when collection is not enough.
//! - **Generational Handles**: a [`Ref`][crate::reference::Ref] to a collected node is detected instead
//!   of silently reading a recycled slot.
//! - **Dynamic Reordering**: window permutation, sifting and random strategies over a tree of
//!   variable blocks, run on demand or automatically when the table fills up.
//! - **Rich API**: all ten binary operators, ITE, quantification (∃, ∀, unique), relational product,
//!   composition, variable replacement, restriction, model counting and enumeration, finite domains,
//!   and a text format to save and load diagrams.
//!
//! ## Basic Usage
//!
//! ```rust
//! use bdd_kernel::bdd::Bdd;
//!
//! // 1. Initialize the manager with two variables
//! let mut bdd = Bdd::with_vars(2)?;
//!
//! // 2. Build f = x0 AND (NOT x1)
//! let x0 = bdd.ith_var(0)?;
//! let nx1 = bdd.nith_var(1)?;
//! let f = bdd.apply_and(x0, nx1)?;
//!
//! // 3. Check properties
//! assert!(!bdd.is_zero(f)); // satisfiable
//! assert!(!bdd.is_one(f)); // not a tautology
//! assert_eq!(bdd.sat_count(f)?, 1.0);
//! assert!(bdd.eval(f, &[true, false])?);
//!
//! // 4. Give the reference back
//! bdd.del_ref(f)?;
//! # Ok::<(), bdd_kernel::error::BddError>(())
//! ```
//!
//! ## Core Components
//!
//! - **[`bdd`]**: the [`Bdd`][crate::bdd::Bdd] manager, node allocation and garbage collection.
//! - **[`apply`]**: Boolean operators and ITE.
//! - **[`reorder`]**: dynamic variable reordering.
//! - **[`pairing`]** and **[`domain`]**: substitutions and finite domains.
//! - **[`io`]**: the persisted text format.
//!
//! For a deep dive into the implementation, check the [`bdd`] and [`reorder`] module documentation.

pub mod analysis;
pub mod apply;
pub mod bdd;
mod bitset;
mod block;
pub mod cache;
pub mod config;
pub mod domain;
mod engine;
pub mod error;
pub mod io;
pub mod node;
pub mod pairing;
pub mod paths;
pub mod quant;
pub mod reference;
pub mod reorder;
pub mod restrict;
pub mod sat;
mod subtable;
pub mod substitute;
mod table;
pub mod utils;
