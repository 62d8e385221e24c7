use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use clap::{Parser, Subcommand};
use involute::cancel::CancelToken;
use involute::catalog::Catalog;
use involute::coords::{CCoord, Tables};
use involute::cube::{Cube, N_SYM48};
use involute::moves::MoveSeq;
use involute::prune::edge::EdgePrune;
use involute::status::{self, Progress};
use involute::tracker::{MAX_DEPTH, Tracker};
use involute::{Outcome, bits, neighbor, pool, solver, tables};
use itertools::Itertools;
use log::warn;

/// Exhaustive optimal solver for cube involutions
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Directory holding the lookup tables and the involution database
    #[arg(long, global = true)]
    tables: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Make a new, empty involution database
    Create,
    /// Show solution counts by depth
    Count,
    /// Show solution counts expanded to all symmetries
    Countall,
    /// Output symmetry representative solutions
    Solutions,
    /// Run the edge coset solver
    Solve {
        /// Deepest search depth to prove
        #[arg(long, default_value_t = 18, value_parser = clap::value_parser!(u8).range(..=MAX_DEPTH as i64))]
        max_depth: u8,
    },
    /// Transfer known solutions to neighboring cosets
    Neighbor,
    /// Output unsolved cubes in Singmaster notation
    Unsolved,
    /// Ingest solution move sequences from stdin
    Ingest,
    /// Ingest known-optimal solution move sequences from stdin
    Optimal,
    /// Free the shared-memory edge pruning index
    Free,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    if let Some(dir) = cli.tables {
        tables::set_dir(dir);
    }

    match cli.command {
        Commands::Create => cmd_create(),
        Commands::Count => cmd_count(),
        Commands::Countall => cmd_countall(),
        Commands::Solutions => cmd_solutions(),
        Commands::Solve { max_depth } => cmd_solve(max_depth),
        Commands::Neighbor => cmd_neighbor(),
        Commands::Unsolved => cmd_unsolved(),
        Commands::Ingest => cmd_ingest(false),
        Commands::Optimal => cmd_ingest(true),
        Commands::Free => cmd_free(),
    }
}

fn finish(outcome: Outcome) -> color_eyre::Result<()> {
    match outcome {
        Outcome::Done => println!("done"),
        Outcome::Canceled => println!("received terminate signal"),
    }
    Ok(())
}

fn cmd_create() -> color_eyre::Result<()> {
    println!("Creating empty involution database...");
    let tables = Tables::load_or_generate();
    let catalog = Catalog::generate(&tables);
    let prune = EdgePrune::attach(&tables)?;
    Tracker::create(&tables, &catalog, &prune)?;
    println!("done");
    Ok(())
}

fn cmd_count() -> color_eyre::Result<()> {
    let tracker = Tracker::open()?;
    status::show_counts(&tracker);
    Ok(())
}

fn cmd_countall() -> color_eyre::Result<()> {
    let tables = Tables::load_or_generate();
    let catalog = Catalog::generate(&tables);
    let tracker = Tracker::open()?;

    let counts = Mutex::new([0u64; MAX_DEPTH + 1]);
    let cursor = Mutex::new(0usize);

    pool::parallel(|_| {
        loop {
            let Some(idx) = next_coset(&cursor, &tracker) else {
                break;
            };

            let handle = tracker.handle(idx, &tables, &catalog);
            let edges_self = handle.self_sym();

            // Weight each representative by its orbit size under the
            // full symmetry group.
            let mut my_counts = [0u64; MAX_DEPTH + 1];
            for moves in tracker.solutions(idx) {
                let c = Cube::from_moves(&moves);
                let mut self_mask = 1u64;
                for s in bits(edges_self) {
                    if c.symi(s as u8) == c {
                        self_mask |= 1 << s;
                    }
                }
                my_counts[moves.len()] += N_SYM48 as u64 / u64::from(self_mask.count_ones());
            }
            drop(handle);

            let mut counts = counts.lock().unwrap();
            for (total, n) in counts.iter_mut().zip(my_counts) {
                *total += n;
            }
        }
    });

    for (d, n) in counts.into_inner().unwrap().iter().enumerate() {
        println!("{d} {n}");
    }
    Ok(())
}

fn cmd_solutions() -> color_eyre::Result<()> {
    let tracker = Tracker::open()?;
    for idx in 0..tracker.n_cosets() {
        for moves in tracker.solutions(idx) {
            println!("{moves}");
        }
    }
    Ok(())
}

fn cmd_solve(max_depth: u8) -> color_eyre::Result<()> {
    let tables = Tables::load_or_generate();
    let catalog = Catalog::generate(&tables);
    let edge = EdgePrune::attach(&tables)?;
    let tracker = Arc::new(Tracker::open()?);
    tracker.lock();

    let cancel = CancelToken::new();
    cancel.install_signals();

    let mut progress = Progress::start(Arc::clone(&tracker), tracker.n_cosets());
    let outcome = solver::solve_all(
        &tables, &catalog, &edge, &tracker, max_depth, &cancel, &progress,
    );
    progress.stop();

    finish(outcome)
}

fn cmd_neighbor() -> color_eyre::Result<()> {
    let tables = Tables::load_or_generate();
    let catalog = Catalog::generate(&tables);
    let tracker = Arc::new(Tracker::open()?);
    tracker.lock();

    let cancel = CancelToken::new();
    cancel.install_signals();

    let mut progress = Progress::start(Arc::clone(&tracker), tracker.n_cosets());
    let outcome = neighbor::propagate_all(&tables, &catalog, &tracker, &cancel, &progress);
    progress.stop();

    finish(outcome)
}

fn cmd_unsolved() -> color_eyre::Result<()> {
    let tables = Tables::load_or_generate();
    let catalog = Catalog::generate(&tables);
    let tracker = Tracker::open()?;
    tracker.lock();

    let cursor = Mutex::new(0usize);
    let (tx, rx) = crossbeam_channel::bounded::<(usize, String)>(pool::n_workers() * 2);

    thread::scope(|scope| {
        // Workers finish cosets out of order; reassemble ascending before
        // printing so the output is deterministic.
        scope.spawn(move || {
            let mut pending = BTreeMap::new();
            let mut next_out = 0usize;
            for (idx, buf) in rx {
                pending.insert(idx, buf);
                while let Some(buf) = pending.remove(&next_out) {
                    print!("{buf}");
                    next_out += 1;
                }
            }
        });

        pool::parallel(|_| {
            while let Some(idx) = next_coset(&cursor, &tracker) {
                let cubes = unsolved_cubes(&tables, &catalog, &tracker, idx);
                let mut buf = cubes.iter().map(|c| c.to_singmaster()).join("\n");
                if !buf.is_empty() {
                    buf.push('\n');
                }
                tx.send((idx, buf)).unwrap();
            }
        });
        drop(tx);
    });
    Ok(())
}

/// The coset's unsolved involutions, reduced to their least symmetry
/// representative.
fn unsolved_cubes(tables: &Tables, catalog: &Catalog, tracker: &Tracker, idx: usize) -> Vec<Cube> {
    let h = tracker.header(idx);
    if h.n_solved == h.n_cubes {
        return Vec::new();
    }

    let edges = h.ec().cube(tables);
    let handle = tracker.handle(idx, tables, catalog);

    let mut cubes = Vec::new();
    for &cc in catalog.corner.set(h.parity) {
        if !handle.is_unsolved(cc) {
            continue;
        }
        let c = edges * cc.cube(&tables.corner);
        let is_rep = bits(handle.self_sym()).all(|s| !(c.sym(s as u8) < c));
        if is_rep {
            cubes.push(c);
        }
    }
    cubes
}

fn cmd_ingest(optimal: bool) -> color_eyre::Result<()> {
    let tables = Tables::load_or_generate();
    let catalog = Catalog::generate(&tables);
    let tracker = Tracker::open()?;
    tracker.lock();

    let mut lookup = BTreeMap::new();
    for idx in 0..tracker.n_cosets() {
        lookup.entry(tracker.header(idx).ec().cube(&tables)).or_insert(idx);
    }

    let cancel = CancelToken::new();
    cancel.install_signals();

    let lines = Mutex::new(BufReader::new(io::stdin()).lines());

    pool::parallel(|_| {
        while !cancel.canceled() {
            let line = match lines.lock().unwrap().next() {
                Some(Ok(line)) => line,
                _ => break,
            };

            let moves = MoveSeq::parse(&line);
            let c = Cube::from_moves(&moves);
            if c * c != Cube::IDENTITY {
                warn!("not an involution: {line}");
                continue;
            }

            let Some(&idx) = lookup.get(&c.with_corner_perm(0)) else {
                warn!("edge symmetry not canonical: {line}");
                continue;
            };

            let mut handle = tracker.handle(idx, &tables, &catalog);
            let proven = optimal || moves.len() == usize::from(handle.proven_min());
            if proven && handle.is_unsolved(CCoord::from_cube(&tables.corner, c)) {
                handle.record(&moves.canonical());
            }
        }
    });

    finish(if cancel.canceled() {
        Outcome::Canceled
    } else {
        Outcome::Done
    })
}

fn cmd_free() -> color_eyre::Result<()> {
    if EdgePrune::remove() {
        println!("done");
    } else {
        println!("no shared memory to free");
    }
    Ok(())
}

fn next_coset(cursor: &Mutex<usize>, tracker: &Tracker) -> Option<usize> {
    let mut next = cursor.lock().unwrap();
    if *next < tracker.n_cosets() {
        let idx = *next;
        *next += 1;
        Some(idx)
    } else {
        None
    }
}
