//! Corner permutations reduced by the sixteen twist-preserving
//! symmetries.
//!
//! The 8! corner permutations fall into 2768 symmetry classes. A reduced
//! coordinate packs the class index with the symmetry carrying the class
//! representative onto the actual permutation. Tables are regenerated on
//! every start; the scan is a few tens of milliseconds.

use crate::cube::{Cube, N_CPERM, N_MOVES, N_SYM16};
use crate::moves::Move;
use crate::sym::SymTables;

/// Corner permutation symmetry classes.
pub const N_CPERM16: usize = 2768;

/// A corner permutation as `class | sym << 12`: the permutation is the
/// class representative conjugated by `sym`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CPerm16(u16);

impl CPerm16 {
    pub const SOLVED: CPerm16 = CPerm16(0);

    pub fn new(index: u16, sym: u8) -> CPerm16 {
        CPerm16(index | u16::from(sym) << 12)
    }

    pub fn index(self) -> u16 {
        self.0 & 0xfff
    }

    pub fn sym(self) -> u8 {
        (self.0 >> 12) as u8
    }
}

pub struct CpermTables {
    s2r: Vec<u16>,
    s2r_sym: Vec<[u16; N_SYM16]>,
    mv: Vec<[CPerm16; N_MOVES]>,
    selfsym: Vec<u16>,
}

impl CpermTables {
    pub fn generate() -> CpermTables {
        let mut s2r = Vec::with_capacity(N_CPERM16);
        let mut selfsym = Vec::with_capacity(N_CPERM16);
        let mut r2s = vec![CPerm16(0); N_CPERM];

        // Class 0 is the identity, fixed by the whole subgroup; its r2s
        // entry doubles as the unassigned sentinel, which is safe because
        // no other permutation conjugates to rank 0.
        s2r.push(0);
        selfsym.push(((1u32 << N_SYM16) - 2) as u16);

        for cp in 1..N_CPERM as u16 {
            if r2s[cp as usize].0 != 0 {
                continue;
            }
            let index = s2r.len() as u16;
            s2r.push(cp);
            r2s[cp as usize] = CPerm16::new(index, 0);

            let c = Cube::IDENTITY.with_corner_perm(cp);
            let mut mask = 0u16;
            for s in 1..N_SYM16 as u8 {
                let cp_s = c.sym(s).corner_perm();
                if cp_s == cp {
                    mask |= 1 << s;
                }
                if r2s[cp_s as usize].0 == 0 {
                    r2s[cp_s as usize] = CPerm16::new(index, s);
                }
            }
            selfsym.push(mask);
        }
        assert_eq!(s2r.len(), N_CPERM16);

        let mut mv = Vec::with_capacity(N_CPERM16);
        let mut s2r_sym = Vec::with_capacity(N_CPERM16);
        for &rep in &s2r {
            let c = Cube::IDENTITY.with_corner_perm(rep);
            let mut mv_row = [CPerm16(0); N_MOVES];
            for m in Move::all() {
                mv_row[m.index()] = r2s[c.mv(m).corner_perm() as usize];
            }
            mv.push(mv_row);
            let mut sym_row = [0u16; N_SYM16];
            for (s, slot) in sym_row.iter_mut().enumerate() {
                *slot = c.sym(s as u8).corner_perm();
            }
            s2r_sym.push(sym_row);
        }

        CpermTables {
            s2r,
            s2r_sym,
            mv,
            selfsym,
        }
    }

    /// Reduces a cube's corner permutation: finds the symmetry pulling it
    /// to its class representative's rank and packs both.
    pub fn from_cube(&self, syms: &SymTables, c: Cube) -> CPerm16 {
        let mut best = c.corner_perm();
        let mut arg = 0u8;
        for s in 1..N_SYM16 as u8 {
            let cp_s = c.sym(s).corner_perm();
            if cp_s < best {
                best = cp_s;
                arg = s;
            }
        }
        let index = self
            .s2r
            .binary_search(&best)
            .unwrap_or_else(|i| i) as u16;
        CPerm16::new(index, syms.inv(arg))
    }

    /// Applies `m` to the permutation behind `cp`. Also yields the move
    /// as seen in the representative's frame and the frame shift of the
    /// new representative, which the orientation coordinate must follow.
    pub fn move_ex(&self, syms: &SymTables, cp: CPerm16, m: Move) -> (CPerm16, Move, u8) {
        let m = syms.movei(m, cp.sym());
        let moved = self.mv[cp.index() as usize][m.index()];
        let shift = moved.sym();
        let out = CPerm16::new(moved.index(), syms.compose(shift, cp.sym()));
        (out, m, shift)
    }

    pub fn mv(&self, syms: &SymTables, cp: CPerm16, m: Move) -> CPerm16 {
        self.move_ex(syms, cp, m).0
    }

    /// Rank of the class representative.
    pub fn rep(&self, cp: CPerm16) -> u16 {
        self.s2r[cp.index() as usize]
    }

    /// Rank of the actual permutation (representative conjugated by the
    /// packed symmetry).
    pub fn real(&self, cp: CPerm16) -> u16 {
        self.s2r_sym[cp.index() as usize][cp.sym() as usize]
    }

    /// Mask of symmetries (bit 0 excluded) fixing the representative.
    pub fn selfsym(&self, index: u16) -> u16 {
        self.selfsym[index as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> (CpermTables, SymTables) {
        (CpermTables::generate(), SymTables::new())
    }

    #[test]
    fn class_count_and_orbit_sizes() {
        let (t, _) = tables();
        // Orbit-stabilizer: class orbit sizes must cover all of 8!.
        let total: u32 = (0..N_CPERM16 as u16)
            .map(|i| 16 / (1 + t.selfsym(i).count_ones()))
            .sum();
        assert_eq!(total, N_CPERM as u32);
    }

    #[test]
    fn representatives_are_orbit_minima() {
        let (t, _) = tables();
        for index in (0..N_CPERM16 as u16).step_by(97) {
            let rep = t.rep(CPerm16::new(index, 0));
            let c = Cube::IDENTITY.with_corner_perm(rep);
            for s in 0..N_SYM16 as u8 {
                assert!(c.sym(s).corner_perm() >= rep);
            }
        }
    }

    #[test]
    fn from_cube_inverts_real() {
        let (t, syms) = tables();
        fastrand::seed(7);
        for _ in 0..200 {
            let cp = fastrand::u16(..N_CPERM as u16);
            let c = Cube::IDENTITY.with_corner_perm(cp);
            let reduced = t.from_cube(&syms, c);
            assert_eq!(t.real(reduced), cp);
            assert!(usize::from(reduced.index()) < N_CPERM16);
        }
    }

    #[test]
    fn move_ex_tracks_cube_moves() {
        let (t, syms) = tables();
        fastrand::seed(11);
        for _ in 0..100 {
            let cp = fastrand::u16(..N_CPERM as u16);
            let c = Cube::IDENTITY.with_corner_perm(cp);
            let reduced = t.from_cube(&syms, c);
            for m in Move::all() {
                let (moved, _, _) = t.move_ex(&syms, reduced, m);
                assert_eq!(t.real(moved), c.mv(m).corner_perm());
            }
        }
    }

    #[test]
    fn solved_class_is_identity() {
        let (t, syms) = tables();
        assert_eq!(t.rep(CPerm16::SOLVED), 0);
        assert_eq!(t.from_cube(&syms, Cube::IDENTITY).index(), 0);
        assert_eq!(t.selfsym(0), ((1u32 << N_SYM16) - 2) as u16);
    }
}
