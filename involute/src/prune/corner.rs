//! Corner-side pruning table.
//!
//! Maps every corner coordinate cell to its exact move distance from a seed
//! set, usually the corner involutions of one parity. The table is small
//! enough (2768 * 2187 bytes) to rebuild whenever the seed set shrinks, which
//! the solver does to tighten the bound as a coset fills in.

use std::sync::Mutex;

use crate::bits;
use crate::coords::cperm::N_CPERM16;
use crate::coords::{CCoord, CornerTables};
use crate::cube::N_CORIENT;
use crate::moves::Move;

pub const N_CPRUNE: usize = N_CPERM16 * N_CORIENT;

const UNSET: u8 = 0xff;

#[derive(Default)]
pub struct CornerPrune {
    table: Vec<u8>,
    max_prune: u8,
}

impl CornerPrune {
    /// Rebuilds the table as a breadth-first distance field over the seeds.
    /// Each layer is filled by a forward sweep while most cells are unknown
    /// and by a backward sweep once fewer than half remain.
    pub fn generate(&mut self, tables: &CornerTables, seeds: impl IntoIterator<Item = CCoord>) {
        if self.table.is_empty() {
            self.table = vec![UNSET; N_CPRUNE];
        } else {
            self.table.fill(UNSET);
        }

        let mut todo = N_CPRUNE;
        for cc in seeds {
            todo -= self.set_sym(tables, cc, 0);
        }

        let mut depth = 0;
        while todo > 0 {
            todo -= if todo < N_CPRUNE / 2 {
                self.pull_unknown(tables, depth)
            } else {
                self.push_frontier(tables, depth)
            };
            depth += 1;
        }
        self.max_prune = depth;
    }

    pub fn distance(&self, cc: CCoord) -> u8 {
        self.table[cc.prune_index()]
    }

    /// True when no seed is reachable from `cc` within `depth` more moves.
    pub fn cuts(&self, cc: CCoord, depth: u8) -> bool {
        depth < self.max_prune && depth < self.distance(cc)
    }

    fn set(&mut self, cc: CCoord, depth: u8) -> usize {
        let idx = cc.prune_index();
        if self.table[idx] == UNSET {
            self.table[idx] = depth;
            1
        } else {
            0
        }
    }

    /// Sets a cell and, when it was new, the cells reached by conjugating its
    /// orientation with the stabilizer of its permutation class. Those share
    /// the distance, so each class interior is stamped in one step.
    fn set_sym(&mut self, tables: &CornerTables, cc: CCoord, depth: u8) -> usize {
        let mut found = self.set(cc, depth);
        if found != 0 {
            for s in bits(u64::from(tables.cperm.selfsym(cc.index()))) {
                let co = tables.corient.symi(cc.orient(), s as u8);
                found += self.set(CCoord::new(cc.index(), co), depth);
            }
        }
        found
    }

    fn push_frontier(&mut self, tables: &CornerTables, depth: u8) -> usize {
        let mut found = 0;
        for idx in 0..N_CPRUNE {
            if self.table[idx] != depth {
                continue;
            }
            let cc = CCoord::new((idx / N_CORIENT) as u16, (idx % N_CORIENT) as u16);
            for m in Move::all() {
                let cc_m = cc.mv(tables, m);
                if self.table[cc_m.prune_index()] == UNSET {
                    found += self.set_sym(tables, cc_m, depth + 1);
                }
            }
        }
        found
    }

    fn pull_unknown(&mut self, tables: &CornerTables, depth: u8) -> usize {
        let mut found = 0;
        for idx in 0..N_CPRUNE {
            if self.table[idx] != UNSET {
                continue;
            }
            let cc = CCoord::new((idx / N_CORIENT) as u16, (idx % N_CORIENT) as u16);
            for m in Move::all() {
                if self.table[cc.mv(tables, m).prune_index()] == depth {
                    found += self.set_sym(tables, cc, depth + 1);
                    break;
                }
            }
        }
        found
    }
}

/// Recycles corner tables between worker threads. Each table is ~6 MB of
/// backing storage; reusing them keeps the per-coset rebuilds free of
/// allocator churn.
#[derive(Default)]
pub struct PrunePool {
    free: Mutex<Vec<CornerPrune>>,
}

impl PrunePool {
    /// Hands out a spare table, or a fresh empty one. The table's contents
    /// are stale; regenerate before use.
    pub fn take(&self) -> CornerPrune {
        self.free.lock().unwrap().pop().unwrap_or_default()
    }

    pub fn put(&self, prune: CornerPrune) {
        self.free.lock().unwrap().push(prune);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CornerCatalog;

    fn random_cell(rng: &mut impl FnMut(usize) -> usize) -> CCoord {
        CCoord::new(rng(N_CPERM16) as u16, rng(N_CORIENT) as u16)
    }

    #[test]
    fn distances_form_a_bfs_from_the_solved_seed() {
        let tables = CornerTables::generate();
        let mut prune = CornerPrune::default();
        prune.generate(&tables, [CCoord::SOLVED]);

        assert_eq!(prune.distance(CCoord::SOLVED), 0);
        assert!(prune.max_prune > 0);

        fastrand::seed(5);
        let mut rng = |n: usize| fastrand::usize(..n);
        for _ in 0..20_000 {
            let cc = random_cell(&mut rng);
            let d = prune.distance(cc);
            assert_ne!(d, UNSET);
            assert!(d <= prune.max_prune);

            let mut closest = UNSET;
            for m in Move::all() {
                let d_m = prune.distance(cc.mv(&tables, m));
                assert!(d_m + 1 >= d && d + 1 >= d_m);
                closest = closest.min(d_m);
            }
            if d > 0 {
                assert_eq!(closest, d - 1);
            }
        }
    }

    #[test]
    fn catalog_seeds_only_tighten_the_field() {
        let tables = CornerTables::generate();
        let catalog = CornerCatalog::generate(&tables);

        let mut sparse = CornerPrune::default();
        sparse.generate(&tables, [CCoord::SOLVED]);
        let mut dense = CornerPrune::default();
        dense.generate(&tables, catalog.set(false).iter().copied());

        for &cc in catalog.set(false) {
            assert_eq!(dense.distance(cc), 0);
        }

        // The even involutions include the identity, so every distance can
        // only drop relative to the solved-only field.
        fastrand::seed(6);
        let mut rng = |n: usize| fastrand::usize(..n);
        for _ in 0..20_000 {
            let cc = random_cell(&mut rng);
            assert!(dense.distance(cc) <= sparse.distance(cc));
            assert!(!dense.cuts(cc, dense.distance(cc)));
            if dense.distance(cc) > 0 {
                assert!(dense.cuts(cc, dense.distance(cc) - 1));
            }
        }
    }
}
