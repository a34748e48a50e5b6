//! Variable Reordering Example
//!
//! Builds `(x1 ∧ y1) ∨ (x2 ∧ y2) ∨ ... ∨ (xn ∧ yn)` in the worst order
//! (all x before all y) and shows how reordering shrinks it:
//! - explicit orders with `set_var_order`
//! - single exchanges with `swap_var`
//! - a full reordering pass with the chosen method
//! - blocks that keep the pairs together while sifting
//!
//! Run with:
//! ```bash
//! cargo run --example reorder -- --pairs 8 --method sift
//! ```

use clap::Parser;

use bdd_kernel::bdd::Bdd;
use bdd_kernel::reference::Ref;
use bdd_kernel::reorder::ReorderMethod;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of (x, y) pairs.
    #[arg(long, value_name = "INT", default_value = "8")]
    pairs: u32,

    /// Reordering method.
    #[arg(long, value_name = "METHOD", default_value = "sift")]
    method: ReorderMethod,
}

/// `x_i` is variable `i`, `y_i` is variable `n + i`.
fn build(bdd: &mut Bdd, n: u32) -> color_eyre::Result<Ref> {
    let mut f = bdd.zero();
    for i in 0..n {
        let x = bdd.ith_var(i)?;
        let y = bdd.ith_var(n + i)?;
        let t = bdd.apply_and(x, y)?;
        let g = bdd.apply_or(f, t)?;
        bdd.del_ref(t)?;
        bdd.del_ref(f)?;
        f = g;
    }
    Ok(f)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    println!("args = {:?}", args);
    let n = args.pairs;
    color_eyre::eyre::ensure!(n > 0, "need at least one pair");

    println!("=== Ordering impact ===");
    let mut bdd = Bdd::with_vars(2 * n)?;
    let f = build(&mut bdd, n)?;
    println!("x1..xn, y1..yn: {} nodes", bdd.node_count(f)?);

    let interleaved: Vec<u32> = (0..n).flat_map(|i| [i, n + i]).collect();
    bdd.set_var_order(&interleaved)?;
    println!("x1, y1, x2, y2, ...: {} nodes", bdd.node_count(f)?);

    println!("\n=== Single exchange ===");
    bdd.swap_var(0, n)?;
    println!("after swapping x1 and y1: order = {:?}", bdd.var_order());
    println!("still {} nodes, {} solutions", bdd.node_count(f)?, bdd.sat_count(f)?);

    println!("\n=== Reordering with {} ===", args.method);
    let mut bdd = Bdd::with_vars(2 * n)?;
    let f = build(&mut bdd, n)?;
    let before = bdd.node_count(f)?;
    bdd.reorder(args.method)?;
    let stats = bdd.reorder_stats();
    println!(
        "{} -> {} nodes, {} swaps in {:?} ({:.1}% of the table freed)",
        before,
        bdd.node_count(f)?,
        stats.swaps,
        stats.time,
        stats.reduction_percent()
    );
    println!("order = {:?}", bdd.var_order());

    println!("\n=== Blocks ===");
    let mut bdd = Bdd::with_vars(2 * n)?;
    bdd.add_var_block(0, n - 1, false)?;
    bdd.add_var_block(n, 2 * n - 1, false)?;
    let f = build(&mut bdd, n)?;
    bdd.reorder(args.method)?;
    println!(
        "x and y kept in separate blocks: {} nodes, order = {:?}",
        bdd.node_count(f)?,
        bdd.var_order()
    );

    Ok(())
}
