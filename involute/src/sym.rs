//! Index-level symmetry arithmetic.
//!
//! Cube-level conjugation is exact but slow; the coordinate tables only
//! ever need the group structure of the 48 symmetries and how they
//! relabel moves. Both are recovered here by probing: conjugating a cube
//! with trivial self-symmetry gives a faithful picture of the group, and
//! conjugating each move cube tells which move it becomes under each
//! symmetry frame.

use fxhash::FxHashMap;

use crate::cube::{Cube, N_MOVES, N_SYM48};
use crate::moves::{Move, MoveSeq};

pub struct SymTables {
    product: [[u8; N_SYM48]; N_SYM48],
    inverse: [u8; N_SYM48],
    move_conj: [[u8; N_SYM48]; N_MOVES],
}

impl SymTables {
    pub fn new() -> SymTables {
        // U1R1 has trivial self-symmetry, so its 48 conjugates are
        // distinct and identify each symmetry index.
        let probe = Cube::from_moves(&MoveSeq::parse("U1R1"));
        let mut lookup = FxHashMap::default();
        for s in 0..N_SYM48 as u8 {
            lookup.insert(probe.sym(s), s);
        }

        let mut product = [[0u8; N_SYM48]; N_SYM48];
        let mut inverse = [0u8; N_SYM48];
        for i in 0..N_SYM48 as u8 {
            for j in 0..N_SYM48 as u8 {
                product[i as usize][j as usize] = lookup[&probe.sym(i).sym(j)];
            }
            inverse[i as usize] = lookup[&probe.symi(i)];
        }

        // Conjugating a face turn by any symmetry yields a face turn.
        let mut move_lookup = FxHashMap::default();
        for m in Move::all() {
            move_lookup.insert(Cube::IDENTITY.mv(m), m);
        }
        let mut move_conj = [[0u8; N_SYM48]; N_MOVES];
        for m in Move::all() {
            for s in 0..N_SYM48 as u8 {
                move_conj[m.index()][s as usize] =
                    move_lookup[&Cube::IDENTITY.mv(m).symi(s)].index() as u8;
            }
        }

        SymTables {
            product,
            inverse,
            move_conj,
        }
    }

    /// The symmetry applying `a` then `b`.
    pub fn compose(&self, a: u8, b: u8) -> u8 {
        self.product[a as usize][b as usize]
    }

    pub fn inv(&self, s: u8) -> u8 {
        self.inverse[s as usize]
    }

    /// The move whose conjugate by `s` is `m`; equivalently, `m` carried
    /// from the reference frame into the frame reached through `s`.
    pub fn movei(&self, m: Move, s: u8) -> Move {
        Move::new(self.move_conj[m.index()][s as usize])
    }

    /// The conjugate of `m` by `s`.
    pub fn mv(&self, m: Move, s: u8) -> Move {
        self.movei(m, self.inv(s))
    }
}

impl Default for SymTables {
    fn default() -> Self {
        SymTables::new()
    }
}
