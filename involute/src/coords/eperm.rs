//! Edge permutations reduced by all 48 symmetries.
//!
//! The 12! edge permutations fall into 9,985,968 classes. The reduced
//! coordinate packs the class index with the symmetry carrying the
//! representative onto the actual permutation. Generation scans every
//! rank for orbit minima in parallel and is the longest table build, so
//! the results are cached on disk; the rank-to-class scatter array is
//! only needed during the build and is dropped afterwards.

use std::sync::atomic::{AtomicU32, Ordering};

use log::{info, warn};

use crate::cube::{Cube, N_EPERM, N_MOVES, N_SYM48};
use crate::moves::Move;
use crate::sym::SymTables;
use crate::{bits, pool, start, success, tables};

/// Edge permutation symmetry classes.
pub const N_EPERM48: usize = 9_985_968;

const FNAME_S2R: &str = "eperm48S2R.dat";
const FNAME_MOVE: &str = "eperm48Move.dat";
const FNAME_SELF: &str = "eperm48SelfSym.dat";

/// An edge permutation as `class | sym << 24`: the permutation is the
/// class representative conjugated by `sym`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EPerm48(u32);

impl EPerm48 {
    pub const SOLVED: EPerm48 = EPerm48(0);

    pub fn new(index: u32, sym: u8) -> EPerm48 {
        EPerm48(index | u32::from(sym) << 24)
    }

    pub fn index(self) -> u32 {
        self.0 & 0x00ff_ffff
    }

    pub fn sym(self) -> u8 {
        (self.0 >> 24) as u8
    }
}

pub struct EpermTables {
    s2r: Vec<u32>,
    mv: Vec<[u32; N_MOVES]>,
    selfsym: Vec<u64>,
}

fn as_atomic(table: &mut [u32]) -> &[AtomicU32] {
    // SAFETY: AtomicU32 has the same size, alignment and bit validity as
    // u32, and the exclusive borrow rules out unsynchronized plain access
    // for the lifetime of the view.
    unsafe { std::slice::from_raw_parts(table.as_mut_ptr().cast(), table.len()) }
}

impl EpermTables {
    /// Loads the cached tables, or regenerates and saves them when any
    /// file is missing or short.
    pub fn load_or_generate() -> EpermTables {
        let mut t = EpermTables {
            s2r: vec![0u32; N_EPERM48],
            mv: vec![[0u32; N_MOVES]; N_EPERM48],
            selfsym: vec![0u64; N_EPERM48],
        };
        let ok = tables::load(FNAME_S2R, &mut t.s2r)
            && tables::load(FNAME_MOVE, t.mv.as_flattened_mut())
            && tables::load(FNAME_SELF, &mut t.selfsym);
        if !ok {
            info!(start!("generating edge permutation tables"));
            t.generate();
            info!(success!("generated edge permutation tables"));
            let saved = tables::save(FNAME_S2R, &t.s2r)
                .and_then(|()| tables::save(FNAME_MOVE, t.mv.as_flattened()))
                .and_then(|()| tables::save(FNAME_SELF, &t.selfsym));
            if let Err(e) = saved {
                warn!("could not save edge permutation tables: {e}");
            }
        }
        t
    }

    fn generate(&mut self) {
        let workers = pool::n_workers();

        // Pass 1: scan rank ranges for representatives, the ranks whose
        // whole orbit lies at or above them. Orbits crossing a range
        // boundary are still seen by exactly one worker.
        let mut per_worker: Vec<Vec<(u32, u64)>> = vec![Vec::new(); workers];
        std::thread::scope(|scope| {
            for (worker, out) in per_worker.iter_mut().enumerate() {
                scope.spawn(move || {
                    let mut reps = Vec::new();
                    for ep in pool::partition(N_EPERM, worker) {
                        let ep = ep as u32;
                        let c = Cube::IDENTITY.with_edge_perm(ep);
                        let mut mask = 0u64;
                        let mut smallest = true;
                        for s in 1..N_SYM48 as u8 {
                            let ep_s = c.sym(s).edge_perm();
                            if ep_s == ep {
                                mask |= 1 << s;
                            } else if ep_s < ep {
                                smallest = false;
                                break;
                            }
                        }
                        if smallest {
                            reps.push((ep, mask));
                        }
                    }
                    *out = reps;
                });
            }
        });

        let mut rep_base = vec![0usize; workers + 1];
        for (worker, reps) in per_worker.iter().enumerate() {
            rep_base[worker + 1] = rep_base[worker] + reps.len();
        }
        assert_eq!(rep_base[workers], N_EPERM48);

        // Pass 2: fill the class arrays and scatter rank-to-class. Each
        // orbit is written by the one worker owning its representative,
        // so the relaxed stores never contend on an element.
        let mut r2s = vec![0u32; N_EPERM];
        let r2s = as_atomic(&mut r2s);
        let mut s2r_rest = self.s2r.as_mut_slice();
        let mut self_rest = self.selfsym.as_mut_slice();
        std::thread::scope(|scope| {
            for (worker, reps) in per_worker.iter().enumerate() {
                let (s2r, rest) = s2r_rest.split_at_mut(reps.len());
                s2r_rest = rest;
                let (selfsym, rest) = self_rest.split_at_mut(reps.len());
                self_rest = rest;
                let base = rep_base[worker];
                scope.spawn(move || {
                    for (i, &(ep, mask)) in reps.iter().enumerate() {
                        let index = (base + i) as u32;
                        s2r[i] = ep;
                        selfsym[i] = mask;
                        r2s[ep as usize].store(index, Ordering::Relaxed);

                        let c = Cube::IDENTITY.with_edge_perm(ep);
                        for s in bits(((1u64 << N_SYM48) - 2) ^ mask) {
                            let ep_s = c.sym(s as u8).edge_perm();
                            r2s[ep_s as usize]
                                .store(s << 24 | index, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        // Pass 3: move table, one row per class.
        let mut mv_rest = self.mv.as_mut_slice();
        std::thread::scope(|scope| {
            for reps in &per_worker {
                let (mv, rest) = mv_rest.split_at_mut(reps.len());
                mv_rest = rest;
                scope.spawn(move || {
                    for (&(ep, _), row) in reps.iter().zip(mv) {
                        let c = Cube::IDENTITY.with_edge_perm(ep);
                        for m in Move::all() {
                            row[m.index()] =
                                r2s[c.mv(m).edge_perm() as usize].load(Ordering::Relaxed);
                        }
                    }
                });
            }
        });
    }

    /// Reduces a cube's edge permutation: finds the symmetry pulling it
    /// to its class representative's rank and packs both.
    pub fn from_cube(&self, syms: &SymTables, c: Cube) -> EPerm48 {
        let mut best = c.edge_perm();
        let mut arg = 0u8;
        for s in 1..N_SYM48 as u8 {
            let ep_s = c.sym(s).edge_perm();
            if ep_s < best {
                best = ep_s;
                arg = s;
            }
        }
        let index = self.s2r.binary_search(&best).unwrap_or_else(|i| i) as u32;
        EPerm48::new(index, syms.inv(arg))
    }

    /// Applies `m`, yielding also the representative-frame move and the
    /// frame shift for the orientation coordinate to follow.
    pub fn move_ex(&self, syms: &SymTables, ep: EPerm48, m: Move) -> (EPerm48, Move, u8) {
        let m = syms.movei(m, ep.sym());
        let moved = EPerm48(self.mv[ep.index() as usize][m.index()]);
        let shift = moved.sym();
        let out = EPerm48::new(moved.index(), syms.compose(shift, ep.sym()));
        (out, m, shift)
    }

    pub fn mv(&self, syms: &SymTables, ep: EPerm48, m: Move) -> EPerm48 {
        self.move_ex(syms, ep, m).0
    }

    /// Move table row access by class index, for table builds that sweep
    /// representatives directly.
    pub fn raw_move(&self, index: u32, m: Move) -> (u32, u8) {
        let moved = EPerm48(self.mv[index as usize][m.index()]);
        (moved.index(), moved.sym())
    }

    /// Rank of the class representative.
    pub fn rep(&self, ep: EPerm48) -> u32 {
        self.s2r[ep.index() as usize]
    }

    /// Mask of symmetries (bit 0 excluded) fixing the representative.
    pub fn selfsym(&self, index: u32) -> u64 {
        self.selfsym[index as usize]
    }
}
