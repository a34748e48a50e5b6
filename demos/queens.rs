use clap::Parser;

use bdd_kernel::apply::BddOp;
use bdd_kernel::bdd::Bdd;
use bdd_kernel::config::BddConfig;
use bdd_kernel::reference::Ref;
use bdd_kernel::reorder::ReorderMethod;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of queens.
    #[arg(value_name = "INT", default_value = "8")]
    n: u32,

    /// Initial number of node slots.
    #[clap(long, value_name = "INT", default_value = "100000")]
    nodes: usize,

    /// Automatic reordering method (none, win2, win2ite, win3, win3ite, sift, siftite, random).
    #[clap(long, value_name = "METHOD", default_value = "none")]
    reorder: ReorderMethod,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let config = BddConfig {
        node_size: args.nodes,
        cache_size: args.nodes / 4,
        ..Default::default()
    };
    let mut bdd = Bdd::new(config)?;
    let n = args.n;
    bdd.set_var_num(n * n)?;
    bdd.set_auto_reorder(args.reorder, -1)?;
    println!("bdd = {:?}", bdd);

    // Encode N-queens problem:
    // - N queens on an NxN board
    // - One queen per row
    // - No two queens on the same row, column or diagonal
    println!("Encoding n-queens problem with n = {}", n);
    let cell = |i: u32, j: u32| i * n + j;
    let mut res = bdd.one();

    for i in 0..n {
        let mut row = bdd.zero();
        for j in 0..n {
            let x = bdd.ith_var(cell(i, j))?;
            let r = bdd.apply_or(row, x)?;
            bdd.del_ref(row)?;
            row = r;
        }
        res = and_into(&mut bdd, res, row)?;
    }

    for i in 0..n {
        for j in 0..n {
            let a = bdd.ith_var(cell(i, j))?;
            for k in i..n {
                for l in 0..n {
                    if (k, l) <= (i, j) {
                        continue;
                    }
                    let (di, dj) = (k as i64 - i as i64, l as i64 - j as i64);
                    if i != k && j != l && di != dj && di != -dj {
                        continue;
                    }
                    let b = bdd.ith_var(cell(k, l))?;
                    let c = bdd.apply(a, b, BddOp::Nand)?;
                    res = and_into(&mut bdd, res, c)?;
                }
            }
        }
        println!("row {}: {} nodes", i, bdd.node_count(res)?);
    }

    println!("bdd = {:?}", bdd);
    println!("res: {} nodes, {} solutions", bdd.node_count(res)?, bdd.sat_count(res)?);

    for stats in bdd.cache_stats() {
        println!("{:?}", stats);
    }
    println!("gc = {:?}", bdd.gc_stats());
    println!("reorder = {:?}", bdd.reorder_stats());

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}

fn and_into(bdd: &mut Bdd, acc: Ref, g: Ref) -> bdd_kernel::error::Result<Ref> {
    let h = bdd.apply_and(acc, g)?;
    bdd.del_ref(acc)?;
    bdd.del_ref(g)?;
    Ok(h)
}
