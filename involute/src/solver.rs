//! The per-coset iterative-deepening search.
//!
//! A coset is searched from its edge representative: moves drive the edge
//! half toward solved while the corner half drifts freely. Whenever the
//! edges come home at exactly the search depth, the remaining corner state
//! names one involution of the coset and the move word, read as a cube,
//! is that involution. Depths are explored in increasing order, so every
//! recorded word is optimal.
//!
//! Two admissible heuristics prune the tree. The edge pruning index gives
//! the exact edge distance and, through its move masks, an incrementally
//! maintained bound that selects only depth-consistent moves. The corner
//! table bounds the distance from the coset's unsolved corner targets and
//! is rebuilt from scratch each time half of them get solved away.

use std::collections::BTreeSet;
use std::sync::Mutex;

use log::debug;

use crate::cancel::CancelToken;
use crate::catalog::Catalog;
use crate::coords::{CCoord, ECoord, Tables};
use crate::cube::{Cube, N_MOVES};
use crate::moves::{Move, MoveSeq};
use crate::pool;
use crate::prune::corner::{CornerPrune, PrunePool};
use crate::prune::edge::{EdgePrune, Masks};
use crate::status::Progress;
use crate::tracker::{Handle, Tracker};
use crate::{Outcome, bits, working};

/// Depths where sibling branches can reconverge under a coset symmetry.
/// Seeds up to here are deduplicated by their symmetry representative;
/// past it, plain face-order screening is enough.
const SEED_DEPTH: usize = 3;

const ALL_MOVES: u32 = (1 << N_MOVES) - 1;

#[derive(Clone)]
struct Seed {
    ec: ECoord,
    cc: CCoord,
    last_face: i8,
    moves: MoveSeq,
    prune: i32,
    masks: Masks,
}

impl Seed {
    fn new(tables: &Tables, edge: &EdgePrune, c: Cube, last_face: i8, moves: MoveSeq) -> Seed {
        let ec = ECoord::from_cube(tables, c);
        Seed {
            ec,
            cc: CCoord::from_cube(&tables.corner, c),
            last_face,
            moves,
            prune: edge.probe(tables, ec) as i32,
            masks: edge.lookup(ec),
        }
    }
}

/// The least cube among `c`'s images under the given symmetries.
fn sym_rep(c: Cube, self_sym: u64) -> Cube {
    let mut rep = c;
    for s in bits(self_sym) {
        rep = rep.min(c.sym(s as u8));
    }
    rep
}

/// Breadth-first seed layers from the coset representative, one per depth
/// up to [`SEED_DEPTH`], deduplicated modulo the coset's self-symmetry.
fn find_seeds(tables: &Tables, edge: &EdgePrune, self_sym: u64, c0: Cube) -> Vec<Vec<Seed>> {
    let mut seen = BTreeSet::from([c0]);
    let mut seeds = vec![Vec::new(); SEED_DEPTH + 1];
    seeds[0].push(Seed::new(tables, edge, c0, -1, MoveSeq::new()));

    for depth in 0..SEED_DEPTH {
        let (head, tail) = seeds.split_at_mut(depth + 1);
        let next = &mut tail[0];
        for seed in &head[depth] {
            let c = seed.ec.cube(tables) * seed.cc.cube(&tables.corner);
            for m in Move::all() {
                let face = m.face() as i8;
                if face == seed.last_face || face + 3 == seed.last_face {
                    continue;
                }
                let c_m = c.mv(m);
                if seen.insert(sym_rep(c_m, self_sym)) {
                    let mut moves = seed.moves.clone();
                    moves.push(m);
                    next.push(Seed::new(tables, edge, c_m, face, moves));
                }
            }
        }
    }
    seeds
}

struct Run<'a, 'h> {
    tables: &'a Tables,
    catalog: &'a Catalog,
    edge: &'a EdgePrune,
    cancel: &'a CancelToken,
    handle: &'a mut Handle<'h>,
    seeds: Vec<Vec<Seed>>,
    moves: MoveSeq,
    cpr: CornerPrune,
    threshold: usize,
}

/// Searches one coset up to `max_depth`, recording each involution at the
/// first depth it is reachable. Resumes from the coset's proven floor and
/// leaves a raised floor behind for every fully explored depth.
pub fn solve_coset(
    tables: &Tables,
    catalog: &Catalog,
    edge: &EdgePrune,
    cprunes: &PrunePool,
    cancel: &CancelToken,
    handle: &mut Handle<'_>,
    max_depth: u8,
) {
    let self_sym = handle.self_sym();
    let c0 = handle.ec().cube(tables);
    let mut run = Run {
        tables,
        catalog,
        edge,
        cancel,
        handle,
        seeds: find_seeds(tables, edge, self_sym, c0),
        moves: MoveSeq::new(),
        cpr: cprunes.take(),
        threshold: 0,
    };
    run.rebuild_cpr();
    run.solve(i32::from(max_depth));
    cprunes.put(run.cpr);
}

impl Run<'_, '_> {
    fn rebuild_cpr(&mut self) {
        let unsolved: Vec<CCoord> = self
            .catalog
            .corner
            .set(self.handle.parity())
            .iter()
            .copied()
            .filter(|&cc| self.handle.is_unsolved(cc))
            .collect();
        assert_eq!(unsolved.len(), self.handle.todo());

        self.cpr.generate(&self.tables.corner, unsolved);
        self.threshold = self.handle.todo() / 2;
    }

    fn solve(&mut self, max_depth: i32) {
        let mut search_depth = i32::from(self.handle.proven_min());
        while self.handle.todo() > 0 && search_depth <= max_depth {
            debug!(
                working!("coset {} depth {}, {} to go"),
                self.handle.idx(),
                search_depth,
                self.handle.todo()
            );
            let seed_depth = search_depth.min(SEED_DEPTH as i32);
            for seed in self.seeds[seed_depth as usize].clone() {
                let remaining = search_depth - seed_depth;
                if remaining < seed.prune {
                    continue;
                }

                self.moves = seed.moves;

                if remaining == 0 {
                    self.candidate(seed.cc);
                } else {
                    self.search(seed.ec, seed.cc, remaining, seed.masks, seed.prune, seed.last_face);
                    if self.cancel.canceled() {
                        return;
                    }
                }
            }
            self.handle.update_proven_min((search_depth + 1) as u8);
            search_depth += 1;
        }
    }

    fn search(&mut self, ec: ECoord, cc: CCoord, mut depth: i32, r: Masks, prune: i32, last_face: i8) {
        if self.cpr.cuts(cc, depth as u8) {
            return;
        }
        depth -= 1;

        let syms = self.tables.syms();
        let frame = syms.inv(ec.sym());

        if depth == 0 {
            // Last move: it must land the edges on solved, so only the
            // distance-lowering moves qualify (or, when they are already
            // solved, the distance-keeping ones).
            let move_mask = if prune != 0 { r.down } else { ALL_MOVES ^ r.up };
            for sym_m in bits(u64::from(move_mask)) {
                let m = syms.movei(Move::new(sym_m as u8), frame);
                let face = m.face() as i8;
                if face == last_face || face + 3 == last_face {
                    continue;
                }

                self.moves.push(m);
                self.candidate(cc.mv(&self.tables.corner, m));
                self.moves.pop();

                if self.handle.todo() == 0 {
                    break;
                }
            }
        } else {
            let move_mask = if prune < depth {
                ALL_MOVES
            } else if prune == depth {
                ALL_MOVES ^ r.up
            } else {
                r.down
            };
            for sym_m in bits(u64::from(move_mask)) {
                let m = syms.movei(Move::new(sym_m as u8), frame);
                let face = m.face() as i8;
                if face == last_face || face + 3 == last_face {
                    continue;
                }

                let ec_m = ec.mv(self.tables, m);
                let cc_m = cc.mv(&self.tables.corner, m);
                let r_m = self.edge.lookup(ec_m);
                let next_prune =
                    prune + (1 & (r.up >> sym_m)) as i32 - (1 & (r.down >> sym_m)) as i32;

                self.moves.push(m);
                self.search(ec_m, cc_m, depth, r_m, next_prune, face);
                self.moves.pop();

                if self.handle.todo() == 0 || self.cancel.canceled() {
                    break;
                }
            }
        }
    }

    /// The edges just came home; the move word is an optimal solution of
    /// the corner state it leaves behind, provided that state is an
    /// unsolved involution of this coset.
    fn candidate(&mut self, cc: CCoord) {
        if !self.handle.is_unsolved(cc) {
            return;
        }
        let c = cc.cube(&self.tables.corner);
        if c * c != Cube::IDENTITY {
            return;
        }

        self.handle.record(&self.moves);

        if self.handle.todo() > 0 && self.handle.todo() <= self.threshold {
            self.rebuild_cpr();
        }
    }
}

/// Solves every coset whose proven floor admits `max_depth`, handing
/// cosets to workers off a shared cursor. Already finished cosets only
/// tick the progress counter.
pub fn solve_all(
    tables: &Tables,
    catalog: &Catalog,
    edge: &EdgePrune,
    tracker: &Tracker,
    max_depth: u8,
    cancel: &CancelToken,
    progress: &Progress,
) -> Outcome {
    let cprunes = PrunePool::default();
    let cursor = Mutex::new(0usize);

    pool::parallel(|_| {
        while let Some(idx) = claim(tracker, &cursor, max_depth, progress) {
            let mut handle = tracker.handle(idx, tables, catalog);
            solve_coset(tables, catalog, edge, &cprunes, cancel, &mut handle, max_depth);
            drop(handle);

            progress.increment();
            if cancel.canceled() {
                break;
            }
        }
    });

    if cancel.canceled() {
        Outcome::Canceled
    } else {
        Outcome::Done
    }
}

fn claim(
    tracker: &Tracker,
    cursor: &Mutex<usize>,
    max_depth: u8,
    progress: &Progress,
) -> Option<usize> {
    let mut next = cursor.lock().unwrap();
    while *next < tracker.n_cosets() {
        let idx = *next;
        *next += 1;
        let h = tracker.header(idx);
        if h.proven_min <= max_depth && h.n_solved < h.n_cubes {
            return Some(idx);
        }
        progress.increment();
    }
    None
}
