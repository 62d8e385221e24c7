//! Edge-side pruning index.
//!
//! For every edge coordinate cell this stores, per move, whether the move
//! raises or lowers the distance to the solved edge state. The two 18-bit
//! masks answer the solver's only questions: how does the bound shift under
//! a move, and which move walks back toward solved. Distances themselves
//! are only needed while building the masks and are dropped afterwards.
//!
//! The index weighs in near 94 GiB, so it lives in a System V shared
//! memory segment that every process on the machine attaches to. A magic
//! word in the trailing line marks a completed build; a crash mid-build
//! leaves the magic unset and the next attach regenerates.

use std::io;
use std::sync::atomic::{AtomicU8, Ordering::Relaxed};
use std::thread;

use log::info;

use crate::coords::eperm::N_EPERM48;
use crate::coords::{ECoord, Tables};
use crate::cube::N_EORIENT;
use crate::moves::Move;
use crate::region::SharedSegment;
use crate::{bits, pool, start, success};

pub const N_EPRUNE: usize = N_EPERM48 * N_EORIENT;

const CL: usize = 14;
const STRIPE: usize = 147;
const N_CACHE_LINE: usize = N_EPERM48 * STRIPE;

const SHM_KEY: u32 = 0x6e72_7065;
const MAGIC: u64 = 0x42d8_375f_de5b_9c8b;

const UNSET: u8 = 0xff;

/// One cache line of move masks for fourteen orientation cells. Moves 0
/// and 1 occupy two-bit lanes of the leading words, the rest sit shifted
/// down by two in the per-cell words.
#[repr(C)]
#[derive(Clone, Copy, Default)]
struct CacheLine {
    up_low: u32,
    down_low: u32,
    up: [u16; CL],
    down: [u16; CL],
}

const _: () = assert!(size_of::<CacheLine>() == 64);
const _: () = assert!(CL * STRIPE >= N_EORIENT);

impl CacheLine {
    fn get_up(&self, i: usize) -> u32 {
        (self.up_low >> (i * 2)) & 3 | u32::from(self.up[i]) << 2
    }

    fn get_down(&self, i: usize) -> u32 {
        (self.down_low >> (i * 2)) & 3 | u32::from(self.down[i]) << 2
    }

    fn set_up(&mut self, i: usize, m: Move) {
        let bit = 1u32 << m.index();
        if bit <= 0b10 {
            self.up_low |= bit << (i * 2);
        } else {
            self.up[i] |= (bit >> 2) as u16;
        }
    }

    fn set_down(&mut self, i: usize, m: Move) {
        let bit = 1u32 << m.index();
        if bit <= 0b10 {
            self.down_low |= bit << (i * 2);
        } else {
            self.down[i] |= (bit >> 2) as u16;
        }
    }
}

/// The move masks of one cell. Bit `m` of `up` is set when move `m` moves
/// the edges farther from solved, bit `m` of `down` when it moves closer.
#[derive(Clone, Copy, Debug)]
pub struct Masks {
    pub up: u32,
    pub down: u32,
}

pub struct EdgePrune {
    segment: SharedSegment,
}

impl EdgePrune {
    /// Attaches to the shared index, building it first if no completed
    /// build is present.
    pub fn attach(tables: &Tables) -> io::Result<EdgePrune> {
        let len = (N_CACHE_LINE + 1) * size_of::<CacheLine>();
        let segment = SharedSegment::get_or_create(SHM_KEY, len)
            .ok_or_else(|| io::Error::other("no shared memory for the edge pruning index"))?;

        let mut prune = EdgePrune { segment };
        if prune.magic() != MAGIC {
            info!(start!("generating the edge pruning index"));
            prune.generate(tables);
            prune.set_magic(MAGIC);
            info!(success!("generated the edge pruning index"));
        }
        Ok(prune)
    }

    /// Schedules the shared segment for destruction.
    pub fn remove() -> bool {
        SharedSegment::remove(SHM_KEY)
    }

    pub fn lookup(&self, ec: ECoord) -> Masks {
        let eo = usize::from(ec.orient());
        let line = &self.lines()[ec.index() as usize * STRIPE + eo / CL];
        Masks {
            up: line.get_up(eo % CL),
            down: line.get_down(eo % CL),
        }
    }

    /// Exact distance of `ec` from the solved edge state, found by walking
    /// a distance-lowering move until none is left.
    pub fn probe(&self, tables: &Tables, mut ec: ECoord) -> u32 {
        let mut depth = 0;
        while !ec.is_solved() {
            depth += 1;
            ec = ec.normalize();
            let m = self.lookup(ec).down.trailing_zeros();
            ec = ec.mv(tables, Move::new(m as u8));
        }
        depth
    }

    fn lines(&self) -> &[CacheLine] {
        // SAFETY: the segment spans N_CACHE_LINE + 1 lines, is page aligned
        // and lives for the lifetime of self.
        unsafe {
            std::slice::from_raw_parts(self.segment.as_ptr().cast::<CacheLine>(), N_CACHE_LINE)
        }
    }

    fn lines_mut(&mut self) -> &mut [CacheLine] {
        // SAFETY: as in lines, and the exclusive borrow keeps the view
        // unique within this process for the duration of the build.
        unsafe {
            std::slice::from_raw_parts_mut(self.segment.as_ptr().cast::<CacheLine>(), N_CACHE_LINE)
        }
    }

    fn magic(&self) -> u64 {
        // SAFETY: the trailing line starts within the segment and is
        // 8-byte aligned.
        unsafe { self.magic_ptr().read() }
    }

    fn set_magic(&mut self, magic: u64) {
        // SAFETY: as in magic.
        unsafe { self.magic_ptr().write(magic) };
    }

    fn magic_ptr(&self) -> *mut u64 {
        // SAFETY: N_CACHE_LINE lines fit in the segment with one to spare.
        unsafe {
            self.segment
                .as_ptr()
                .add(N_CACHE_LINE * size_of::<CacheLine>())
                .cast::<u64>()
        }
    }

    fn generate(&mut self, tables: &Tables) {
        let distance = distance_field(tables);

        let workers = pool::n_workers();
        let mut rest = self.lines_mut();
        thread::scope(|s| {
            for worker in 0..workers {
                let range = pool::partition(N_EPERM48, worker);
                let (chunk, tail) = rest.split_at_mut(range.len() * STRIPE);
                rest = tail;
                let distance = &distance;

                s.spawn(move || {
                    // A crashed build may have left stray bits behind.
                    chunk.fill(CacheLine::default());

                    for ep in range.clone() {
                        let stripe = &mut chunk[(ep - range.start) * STRIPE..][..STRIPE];

                        for m in Move::all() {
                            let (ep_m, s_m) = tables.eperm.raw_move(ep as u32, m);

                            for eo in 0..N_EORIENT {
                                let eo_m = tables.eorient.movei(eo as u16, m, s_m);

                                let p0 = distance[ep * N_EORIENT + eo];
                                let p1 =
                                    distance[ep_m as usize * N_EORIENT + usize::from(eo_m)];

                                if p0 < p1 {
                                    stripe[eo / CL].set_up(eo % CL, m);
                                } else if p0 > p1 {
                                    stripe[eo / CL].set_down(eo % CL, m);
                                }
                            }
                        }
                    }
                });
            }
        });
    }
}

fn as_atomic(table: &mut [u8]) -> &[AtomicU8] {
    // SAFETY: AtomicU8 has the same size and alignment as u8, and the
    // exclusive borrow guarantees no plain accesses alias the atomics.
    unsafe { std::slice::from_raw_parts(table.as_ptr().cast::<AtomicU8>(), table.len()) }
}

fn set(table: &[AtomicU8], idx: usize, depth: u8) -> usize {
    usize::from(
        table[idx]
            .compare_exchange(UNSET, depth, Relaxed, Relaxed)
            .is_ok(),
    )
}

fn set_sym(tables: &Tables, table: &[AtomicU8], ec: ECoord, depth: u8) -> usize {
    let mut found = set(table, ec.prune_index(), depth);
    if found != 0 {
        for sym in bits(tables.eperm.selfsym(ec.index())) {
            let eo = tables.eorient.symi(ec.orient(), sym as u8);
            found += set(
                table,
                ec.index() as usize * N_EORIENT + usize::from(eo),
                depth,
            );
        }
    }
    found
}

/// Breadth-first distance of every cell from the solved one, a byte per
/// cell. Layers are filled by expanding the frontier while most cells are
/// unknown and by pulling from the unknown side once fewer than half are.
fn distance_field(tables: &Tables) -> Vec<u8> {
    let mut table = vec![UNSET; N_EPRUNE];
    table[0] = 0;

    let shared = as_atomic(&mut table);
    let workers = pool::n_workers();

    let mut todo = N_EPRUNE - 1;
    let mut depth = 0;
    while todo > 0 {
        let reverse = todo < N_EPRUNE / 2;

        let mut found = vec![0usize; workers];
        thread::scope(|s| {
            for (worker, found) in found.iter_mut().enumerate() {
                let range = pool::partition(N_EPERM48, worker);
                s.spawn(move || {
                    *found = scan(tables, shared, range, depth, reverse);
                });
            }
        });

        todo -= found.iter().sum::<usize>();
        depth += 1;
    }

    table
}

fn scan(
    tables: &Tables,
    table: &[AtomicU8],
    range: std::ops::Range<usize>,
    depth: u8,
    reverse: bool,
) -> usize {
    let want = if reverse { UNSET } else { depth };
    let neighbor = if reverse { depth } else { UNSET };

    let mut found = 0;
    let mut active: Vec<u16> = Vec::new();

    for ep in range {
        let base = ep * N_EORIENT;

        active.clear();
        for eo in 0..N_EORIENT {
            if table[base + eo].load(Relaxed) == want {
                active.push(eo as u16);
            }
        }
        if active.is_empty() {
            continue;
        }

        for m in Move::all() {
            let (ep_m, s_m) = tables.eperm.raw_move(ep as u32, m);

            for &eo in &active {
                if table[base + usize::from(eo)].load(Relaxed) != want {
                    continue;
                }

                let eo_m = tables.eorient.movei(eo, m, s_m);
                if table[ep_m as usize * N_EORIENT + usize::from(eo_m)].load(Relaxed) != neighbor
                {
                    continue;
                }

                let ec = if reverse {
                    ECoord::new(ep as u32, eo)
                } else {
                    ECoord::new(ep_m, eo_m)
                };
                found += set_sym(tables, table, ec, depth + 1);
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::{Cube, N_MOVES};

    #[test]
    fn cache_line_round_trips_every_move_bit() {
        for m in Move::all() {
            for i in 0..CL {
                let mut line = CacheLine::default();
                line.set_up(i, m);
                line.set_down(i, m.inverse());
                for j in 0..CL {
                    let up = if j == i { 1 << m.index() } else { 0 };
                    let down = if j == i { 1 << m.inverse().index() } else { 0 };
                    assert_eq!(line.get_up(j), up);
                    assert_eq!(line.get_down(j), down);
                }
            }
        }
    }

    #[test]
    fn cache_line_lanes_do_not_bleed() {
        let mut line = CacheLine::default();
        for i in 0..CL {
            for m in Move::all() {
                line.set_up(i, m);
            }
        }
        for i in 0..CL {
            assert_eq!(line.get_up(i), (1 << N_MOVES) - 1);
            assert_eq!(line.get_down(i), 0);
        }
    }

    #[test]
    #[ignore = "attaches the ~94 GiB shared edge pruning index"]
    fn probe_walks_down_to_solved() {
        let tables = Tables::load_or_generate();
        let prune = EdgePrune::attach(&tables).unwrap();

        assert_eq!(prune.probe(&tables, ECoord::SOLVED), 0);

        fastrand::seed(7);
        let mut ec = ECoord::SOLVED;
        let mut cube = Cube::IDENTITY;
        for turns in 1..=30 {
            let m = Move::new(fastrand::u8(..N_MOVES as u8));
            ec = ec.mv(&tables, m);
            cube = cube.mv(m);

            let depth = prune.probe(&tables, ec);
            assert!(depth <= turns);

            // The walk the probe takes must agree with the masks at the
            // starting cell: some move strictly lowers the distance.
            if depth > 0 {
                assert_ne!(prune.lookup(ec.normalize()).down, 0);
            }

            let direct = ECoord::from_cube(&tables, cube);
            assert_eq!(prune.probe(&tables, direct), depth);
        }
    }
}
