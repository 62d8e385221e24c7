//! Solution transfer between adjacent cosets.
//!
//! Conjugating a state by a single move and a symmetry maps one edge coset
//! onto another. The same wrapping applied to a recorded solution word
//! yields a solution word in the neighboring coset, two moves longer
//! before canonicalization. When the canonical result lands exactly on the
//! neighbor's proven floor it is optimal and can be recorded without any
//! search, which is how the deep tail of the distribution is filled in.

use std::collections::BTreeMap;
use std::sync::Mutex;

use fxhash::FxHashMap;
use itertools::chain;

use crate::Outcome;
use crate::cancel::CancelToken;
use crate::catalog::Catalog;
use crate::coords::{CCoord, Tables};
use crate::cube::{Cube, N_SYM48};
use crate::moves::{Move, MoveSeq};
use crate::pool;
use crate::status::Progress;
use crate::tracker::{Handle, Tracker};

/// Conjugation by `m` followed by symmetry `s`.
fn wrap(c: Cube, m: Move, s: u8) -> Cube {
    c.premv(m.inverse()).mv(m).sym(s)
}

/// Pushes the solutions of coset `src` through `(m, s)` into `dst`,
/// keeping those that meet the destination's proven floor exactly. The
/// pair must actually relate the two cosets' edge representatives.
pub fn transfer(
    tables: &Tables,
    tracker: &Tracker,
    src: usize,
    dst: &mut Handle<'_>,
    m: Move,
    s: u8,
) {
    let src_edges = tracker.header(src).ec().cube(tables);
    assert_eq!(
        wrap(src_edges, m, s).with_corner_perm(0),
        dst.ec().cube(tables),
        "move and symmetry do not relate the cosets"
    );

    let syms = tables.syms();
    let mi = m.inverse();
    let goal = usize::from(dst.proven_min());

    for sol in tracker.solutions(src) {
        let c = wrap(Cube::from_moves(&sol), m, s);
        if !dst.is_unsolved(CCoord::from_cube(&tables.corner, c)) {
            continue;
        }

        let word: MoveSeq = chain!(
            [syms.mv(mi, s)],
            sol.iter().map(|w| syms.mv(w, s)),
            [syms.mv(m, s)],
        )
        .collect();
        let word = word.canonical();

        if word.len() == goal {
            dst.record(&word);
        }
    }
}

/// Runs the transfer across every edge-adjacent coset pair in both
/// directions. Workers claim source cosets off a shared cursor; locks are
/// taken in ascending coset order, so pairs cannot deadlock.
pub fn propagate_all(
    tables: &Tables,
    catalog: &Catalog,
    tracker: &Tracker,
    cancel: &CancelToken,
    progress: &Progress,
) -> Outcome {
    // Which coset, and in which frame, every symmetry image of every edge
    // representative belongs to.
    let mut lookup: FxHashMap<Cube, (usize, u8)> = FxHashMap::default();
    for idx in 0..tracker.n_cosets() {
        let edges = tracker.header(idx).ec().cube(tables);
        for s in 0..N_SYM48 as u8 {
            lookup.entry(edges.symi(s)).or_insert((idx, s));
        }
    }

    let cursor = Mutex::new(0usize);
    pool::parallel(|_| {
        loop {
            let idx = {
                let mut next = cursor.lock().unwrap();
                if *next >= tracker.n_cosets() {
                    break;
                }
                let idx = *next;
                *next += 1;
                idx
            };

            let edges = tracker.header(idx).ec().cube(tables);

            let mut neighbors: BTreeMap<usize, Vec<(Move, u8)>> = BTreeMap::new();
            for m in Move::all() {
                let edges_m = edges.premv(m.inverse()).mv(m).with_corner_perm(0);
                let (idx_m, s) = lookup[&edges_m];
                if idx <= idx_m {
                    neighbors.entry(idx_m).or_default().push((m, s));
                }
            }

            let mut handle = tracker.handle(idx, tables, catalog);
            for (idx_m, pairs) in neighbors {
                if idx_m == idx {
                    for (m, s) in pairs {
                        transfer(tables, tracker, idx, &mut handle, m, s);
                    }
                } else {
                    let mut handle_m = tracker.handle(idx_m, tables, catalog);
                    let syms = tables.syms();
                    for (m, s) in pairs {
                        let si = syms.inv(s);
                        let mi = syms.movei(m, si).inverse();
                        transfer(tables, tracker, idx, &mut handle_m, m, s);
                        transfer(tables, tracker, idx_m, &mut handle, mi, si);
                    }
                }
            }
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
