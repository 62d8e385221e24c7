//! Move and conjugation tables for orientation coordinates.
//!
//! Orientation is independent of permutation under moves, and under the
//! symmetries used with each coordinate: all twelve edge flips change
//! together (or not at all) for every symmetry, and the sixteen corner
//! symmetries carry no twist. That makes conjugation a pure function of
//! the coordinate, so it tabulates.

use crate::cube::{Cube, N_MOVES};
use crate::moves::Move;

/// Tables over an orientation coordinate with `N` values conjugated by
/// the first `N_SYM` symmetries.
pub struct OrientTables<const N: usize, const N_SYM: usize> {
    mv: Vec<[u16; N]>,
    conj: Vec<[u16; N]>,
    selfsym: Vec<u64>,
}

impl<const N: usize, const N_SYM: usize> OrientTables<N, N_SYM> {
    /// Builds the tables through cube arithmetic on orientation-only
    /// states; `set` plants a coordinate on the identity permutation and
    /// `get` reads it back.
    pub fn generate(set: impl Fn(u16) -> Cube, get: impl Fn(Cube) -> u16) -> Self {
        let mut mv = Vec::with_capacity(N_MOVES);
        for m in Move::all() {
            let mut row = [0u16; N];
            for (o, slot) in row.iter_mut().enumerate() {
                *slot = get(set(o as u16).mv(m));
            }
            mv.push(row);
        }

        let mut conj = Vec::with_capacity(N_SYM);
        for s in 0..N_SYM as u8 {
            let mut row = [0u16; N];
            for (o, slot) in row.iter_mut().enumerate() {
                *slot = get(set(o as u16).symi(s));
            }
            conj.push(row);
        }

        let selfsym = (0..N as u16)
            .map(|o| {
                let mut mask = 0u64;
                for (s, row) in conj.iter().enumerate().skip(1) {
                    if row[o as usize] == o {
                        mask |= 1 << s;
                    }
                }
                mask
            })
            .collect();

        OrientTables { mv, conj, selfsym }
    }

    /// The coordinate after move `m`, expressed in the frame reached
    /// through symmetry `s`: conjugation follows the move so the result
    /// tracks a representative that changed frame.
    pub fn movei(&self, o: u16, m: Move, s: u8) -> u16 {
        self.conj[s as usize][self.mv[m.index()][o as usize] as usize]
    }

    /// Conjugates by the inverse of symmetry `s`.
    pub fn symi(&self, o: u16, s: u8) -> u16 {
        self.conj[s as usize][o as usize]
    }

    /// Mask of the symmetries (bit 0 excluded) fixing this coordinate.
    pub fn selfsym(&self, o: u16) -> u64 {
        self.selfsym[o as usize]
    }
}
