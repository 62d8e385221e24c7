//! Packed cube states and the fixed move/symmetry generators.
//!
//! A state is twenty bytes: twelve edge slots and eight corner slots. An
//! edge byte holds its cubelet in the low nibble and the flip bit at 0x10;
//! a corner byte holds its cubelet in bits 0-2 and the twist (0, 1 or 2,
//! counted clockwise) in bits 4-5. Slot numbering and twist reference
//! follow the face order U, R, F, D, L, B.
//!
//! All generator tables ([`MOVES`], [`SYMS`], [`SYM_INV`]) are built at
//! compile time from four literal cubes: the U face turn and the three
//! symmetry generators.

use crate::moves::{Move, MoveSeq};

/// Face turns: three powers of each of U, R, F, D, L, B.
pub const N_MOVES: usize = 18;
/// Symmetries that fix the corner-twist reference axis.
pub const N_SYM16: usize = 16;
/// Full symmetry group of the cube including reflection.
pub const N_SYM48: usize = 48;
/// Edge permutations, 12!.
pub const N_EPERM: usize = 479_001_600;
/// Corner permutations, 8!.
pub const N_CPERM: usize = 40_320;
/// Edge orientation coordinates, 2^11.
pub const N_EORIENT: usize = 2048;
/// Corner orientation coordinates, 3^7.
pub const N_CORIENT: usize = 2187;

/// A cube state as a permutation-with-orientation of edge and corner slots.
///
/// `Cube` is a plain 20-byte value; composition, inversion and symmetry
/// conjugation are `const fn` so the generator tables can live in rodata.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Cube {
    edges: [u8; 12],
    corners: [u8; 8],
}

// The generators, written as (corners, edges 8-11, edges 0-7) byte literals
// with slot i at bits 8i..8i+8. The U turn flips the four edges it cycles so
// that edge flip counts quarter-turn parity.
const M_U: Cube = Cube::literal(0x0706050402010003, 0x0b0a0908, 0x0706050412111013);
const S_URF3: Cube = Cube::literal(0x1226172321152410, 0x02060400, 0x0a070b0309050801);
const S_U4: Cube = Cube::literal(0x0605040702010003, 0x1a19181b, 0x1615141712111013);
const S_LR2: Cube = Cube::literal(0x0607040502030001, 0x0a0b0809, 0x0704050603000102);

impl Cube {
    pub const IDENTITY: Cube = Cube {
        edges: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        corners: [0, 1, 2, 3, 4, 5, 6, 7],
    };

    const fn literal(corners: u64, edges_high: u64, edges_low: u64) -> Cube {
        let mut cube = Cube::IDENTITY;
        let mut i = 0;
        while i < 8 {
            cube.edges[i] = ((edges_low >> (8 * i)) & 0xff) as u8;
            cube.corners[i] = ((corners >> (8 * i)) & 0xff) as u8;
            i += 1;
        }
        let mut i = 0;
        while i < 4 {
            cube.edges[8 + i] = ((edges_high >> (8 * i)) & 0xff) as u8;
            i += 1;
        }
        cube
    }

    /// Composes two states: `self` applied first, then `rhs`.
    ///
    /// With `mirror` set, corner twists subtract instead of add; this is
    /// required when either side of the composition chain is a reflected
    /// symmetry, because reflection reverses the twist direction.
    #[must_use]
    pub const fn compose(self, rhs: Cube, mirror: bool) -> Cube {
        let mut out = Cube::IDENTITY;
        let mut i = 0;
        while i < 12 {
            let e = rhs.edges[i];
            out.edges[i] = self.edges[(e & 0x0f) as usize] ^ (e & 0x10);
            i += 1;
        }
        let mut i = 0;
        while i < 8 {
            let c = rhs.corners[i];
            let x = self.corners[(c & 0x07) as usize];
            let twist = if mirror {
                let d = (x & 0x30).wrapping_sub(c & 0x30);
                if d > 0x30 { d.wrapping_add(0x30) } else { d }
            } else {
                let s = (x & 0x30) + (c & 0x30);
                if s >= 0x30 { s - 0x30 } else { s }
            };
            out.corners[i] = (x & 0x07) | twist;
            i += 1;
        }
        out
    }

    /// The inverse state: `self.compose(self.inverse(), false)` is identity.
    #[must_use]
    pub const fn inverse(self) -> Cube {
        let mut out = Cube::IDENTITY;
        let mut i = 0;
        while i < 12 {
            let e = self.edges[i];
            out.edges[(e & 0x0f) as usize] = (i as u8) | (e & 0x10);
            i += 1;
        }
        let mut i = 0;
        while i < 8 {
            let c = self.corners[i];
            let twist = match c & 0x30 {
                0x10 => 0x20,
                0x20 => 0x10,
                _ => 0,
            };
            out.corners[(c & 0x07) as usize] = (i as u8) | twist;
            i += 1;
        }
        out
    }

    const fn const_eq(self, rhs: Cube) -> bool {
        let mut i = 0;
        while i < 12 {
            if self.edges[i] != rhs.edges[i] {
                return false;
            }
            i += 1;
        }
        let mut i = 0;
        while i < 8 {
            if self.corners[i] != rhs.corners[i] {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Conjugates by symmetry `s`: `syms[s]⁻¹ ∘ self ∘ syms[s]`.
    #[must_use]
    pub const fn sym(self, s: u8) -> Cube {
        let mirror = s & 1 == 1;
        SYMS[SYM_INV[s as usize] as usize]
            .compose(self, mirror)
            .compose(SYMS[s as usize], mirror)
    }

    /// Conjugates by the inverse of symmetry `s`: `syms[s] ∘ self ∘ syms[s]⁻¹`.
    #[must_use]
    pub const fn symi(self, s: u8) -> Cube {
        let mirror = s & 1 == 1;
        SYMS[s as usize]
            .compose(self, mirror)
            .compose(SYMS[SYM_INV[s as usize] as usize], mirror)
    }

    /// Applies move `m` after `self`.
    #[must_use]
    pub const fn mv(self, m: Move) -> Cube {
        self.compose(MOVES[m.index()], false)
    }

    /// Applies move `m` before `self`.
    #[must_use]
    pub const fn premv(self, m: Move) -> Cube {
        MOVES[m.index()].compose(self, false)
    }

    pub fn from_moves(moves: &MoveSeq) -> Cube {
        moves.iter().fold(Cube::IDENTITY, Cube::mv)
    }

    /// Lehmer rank of the edge permutation, in `0..12!`.
    pub fn edge_perm(self) -> u32 {
        let mut rank = 0u32;
        let mut seen = 0u16;
        for i in 0..11 {
            let p = u32::from(self.edges[i] & 0x0f);
            let smaller = (u32::from(seen) & ((1 << p) - 1)).count_ones();
            rank = rank * (12 - i as u32) + (p - smaller);
            seen |= 1 << p;
        }
        rank
    }

    /// Lehmer rank of the corner permutation, in `0..8!`.
    pub fn corner_perm(self) -> u16 {
        let mut rank = 0u16;
        let mut seen = 0u8;
        for i in 0..7 {
            let p = u16::from(self.corners[i] & 0x07);
            let smaller = (u16::from(seen) & ((1 << p) - 1)).count_ones() as u16;
            rank = rank * (8 - i as u16) + (p - smaller);
            seen |= 1 << (self.corners[i] & 0x07);
        }
        rank
    }

    /// Replaces the edge permutation with the unranking of `eperm`,
    /// clearing all edge flips.
    #[must_use]
    pub fn with_edge_perm(self, eperm: u32) -> Cube {
        const FC: [u32; 11] = [
            39_916_800, 3_628_800, 362_880, 40_320, 5_040, 720, 120, 24, 6, 2, 1,
        ];
        let mut out = self;
        let mut remaining: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
        let mut len = 12;
        for i in 0..11 {
            let k = (eperm / FC[i]) as usize % len;
            out.edges[i] = remaining[k];
            for j in k..len - 1 {
                remaining[j] = remaining[j + 1];
            }
            len -= 1;
        }
        out.edges[11] = remaining[0];
        out
    }

    /// Replaces the corner permutation with the unranking of `cperm`,
    /// clearing all corner twists.
    #[must_use]
    pub fn with_corner_perm(self, cperm: u16) -> Cube {
        const FC: [u16; 7] = [5_040, 720, 120, 24, 6, 2, 1];
        let mut out = self;
        let mut remaining: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];
        let mut len = 8;
        for i in 0..7 {
            let k = (cperm / FC[i]) as usize % len;
            out.corners[i] = remaining[k];
            for j in k..len - 1 {
                remaining[j] = remaining[j + 1];
            }
            len -= 1;
        }
        out.corners[7] = remaining[0];
        out
    }

    /// All twelve flip bits, slot i at bit i.
    pub fn edge_orient_raw(self) -> u16 {
        let mut o = 0u16;
        for i in 0..12 {
            o |= u16::from((self.edges[i] >> 4) & 1) << i;
        }
        o
    }

    /// The edge orientation coordinate: flips of slots 0-10. Slot 11 is
    /// determined by the even-total-flip invariant.
    pub fn edge_orient(self) -> u16 {
        self.edge_orient_raw() & 0x7ff
    }

    /// Replaces the edge flips with the 11-bit coordinate `eorient`; the
    /// twelfth flip is derived so the total flip count stays even.
    #[must_use]
    pub fn with_edge_orient(self, eorient: u16) -> Cube {
        let full = eorient | (eorient.count_ones() as u16 & 1) << 11;
        let mut out = self;
        for (i, e) in out.edges.iter_mut().enumerate() {
            *e = (*e & 0x0f) | (((full >> i) & 1) as u8) << 4;
        }
        out
    }

    /// The corner orientation coordinate: twists of slots 1-7 as base-3
    /// digits. Slot 0 is determined by the zero-total-twist invariant.
    pub fn corner_orient(self) -> u16 {
        let mut o = 0u16;
        for i in (1..8).rev() {
            o = o * 3 + u16::from(self.corners[i] >> 4);
        }
        o
    }

    /// Replaces the corner twists with the base-3 coordinate `corient`;
    /// slot 0 is derived so the twists sum to zero mod 3.
    #[must_use]
    pub fn with_corner_orient(self, corient: u16) -> Cube {
        let mut out = self;
        let mut rem = corient;
        let mut sum = 0u16;
        for i in 1..8 {
            let t = rem % 3;
            rem /= 3;
            sum += t;
            out.corners[i] = (out.corners[i] & 0x07) | ((t as u8) << 4);
        }
        out.corners[0] = (out.corners[0] & 0x07) | ((((3 - sum % 3) % 3) as u8) << 4);
        out
    }

    /// Combined inversion parity of the edge and corner permutations.
    ///
    /// Every move permutes both halves oddly, so this is always false on a
    /// reachable full state. Its use is on edge-only states (corner half
    /// identity), where it reduces to the edge permutation's parity and
    /// decides which corner permutations can legally complete the state.
    pub fn parity(self) -> bool {
        let mut inv = 0u32;
        for i in 0..12 {
            for j in i + 1..12 {
                inv += u32::from(self.edges[i] & 0x0f > self.edges[j] & 0x0f);
            }
        }
        for i in 0..8 {
            for j in i + 1..8 {
                inv += u32::from(self.corners[i] & 0x07 > self.corners[j] & 0x07);
            }
        }
        inv & 1 == 1
    }

    /// Singmaster position notation, listing each edge and corner slot's
    /// occupant sticker-first in the conventional slot order.
    pub fn to_singmaster(self) -> String {
        const EDGE_SYMBOL: &str =
            "URU     UFU     ULU     UBU     DRD     DFD     DLD     DBD     FRF     FLF     BLB     BRB     ";
        const EDGE_ORDER: [usize; 12] = [1, 0, 3, 2, 5, 4, 7, 6, 8, 9, 11, 10];
        const EDGE_PARITY: [u8; 12] = [1, 0, 1, 0, 1, 0, 1, 0, 0, 0, 0, 0];
        const CORNER_SYMBOL: &str =
            "UFRUF   ULFUL   UBLUB   URBUR   DRFDR   DFLDF   DLBDL   DBRDB   ";
        const CORNER_ORDER: [usize; 8] = [0, 3, 2, 1, 4, 5, 6, 7];

        let mut s = String::with_capacity(69);
        for &slot in &EDGE_ORDER {
            let e = self.edges[slot];
            let cubelet = usize::from(e & 0x0f);
            let ori = usize::from((e >> 4) ^ EDGE_PARITY[slot] ^ EDGE_PARITY[cubelet]);
            let off = cubelet * 8 + ori;
            s.push_str(&EDGE_SYMBOL[off..off + 2]);
            s.push(' ');
        }
        for &slot in &CORNER_ORDER {
            let c = self.corners[slot];
            let cubelet = usize::from(c & 0x07);
            let ori = usize::from(c >> 4);
            let off = cubelet * 8 + ori;
            s.push_str(&CORNER_SYMBOL[off..off + 3]);
            s.push(' ');
        }
        s.pop();
        s
    }

    /// Replaces the edge slots wholesale; values carry their own flip
    /// bits.
    #[must_use]
    pub fn with_edges(self, edges: [u8; 12]) -> Cube {
        Cube { edges, ..self }
    }

    /// Replaces the corner slots wholesale; values carry their own twist
    /// bits.
    #[must_use]
    pub fn with_corners(self, corners: [u8; 8]) -> Cube {
        Cube { corners, ..self }
    }

    /// Mask of all symmetries fixing this state under conjugation,
    /// identity included at bit 0.
    pub fn self_sym48(self) -> u64 {
        let mut mask = 1u64;
        for s in 1..N_SYM48 as u8 {
            if self.sym(s) == self {
                mask |= 1 << s;
            }
        }
        mask
    }

    pub(crate) const fn edge_byte(self, slot: usize) -> u8 {
        self.edges[slot]
    }

    pub(crate) const fn corner_byte(self, slot: usize) -> u8 {
        self.corners[slot]
    }
}

impl Default for Cube {
    fn default() -> Self {
        Cube::IDENTITY
    }
}

// States order by their packed byte representation taken as one wide
// little-endian integer: corners above edges, higher slots more significant.
// Symmetry class representatives are the minimum of their orbit under this
// order.
impl Ord for Cube {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        for i in (0..8).rev() {
            match self.corners[i].cmp(&other.corners[i]) {
                std::cmp::Ordering::Equal => {}
                ord => return ord,
            }
        }
        for i in (0..12).rev() {
            match self.edges[i].cmp(&other.edges[i]) {
                std::cmp::Ordering::Equal => {}
                ord => return ord,
            }
        }
        std::cmp::Ordering::Equal
    }
}

impl PartialOrd for Cube {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::ops::Mul for Cube {
    type Output = Cube;

    fn mul(self, rhs: Cube) -> Cube {
        self.compose(rhs, false)
    }
}

const fn build_syms() -> ([Cube; N_SYM48], [u8; N_SYM48]) {
    let s_f2 = S_URF3
        .compose(S_U4, false)
        .compose(S_U4, false)
        .compose(S_URF3.inverse(), false);
    let mut syms = [Cube::IDENTITY; N_SYM48];
    syms[1] = S_LR2;
    let mut i = 2;
    while i < 4 {
        syms[i] = s_f2.compose(syms[i - 2], false);
        i += 1;
    }
    let mut i = 4;
    while i < 16 {
        syms[i] = S_U4.compose(syms[i - 4], false);
        i += 1;
    }
    let mut i = 16;
    while i < 48 {
        syms[i] = S_URF3.compose(syms[i - 16], false);
        i += 1;
    }

    let mut inv = [0u8; N_SYM48];
    let mut i = 0;
    while i < 48 {
        let mut j = 0;
        while j < 48 {
            if syms[i].compose(syms[j], i & 1 == 1).const_eq(Cube::IDENTITY) {
                inv[i] = j as u8;
            }
            j += 1;
        }
        i += 1;
    }
    (syms, inv)
}

const SYM_TABLES: ([Cube; N_SYM48], [u8; N_SYM48]) = build_syms();

/// The 48 symmetry cubes. The first 16 fix the corner-twist reference axis
/// and form the subgroup used for corner coordinates; odd indices are
/// reflected.
pub const SYMS: [Cube; N_SYM48] = SYM_TABLES.0;

/// Index of each symmetry's group inverse: `SYMS[s] ∘ SYMS[SYM_INV[s]]` is
/// the identity.
pub const SYM_INV: [u8; N_SYM48] = SYM_TABLES.1;

const fn build_moves() -> [Cube; N_MOVES] {
    let mut moves = [Cube::IDENTITY; N_MOVES];
    moves[0] = M_U;
    let mut i = 1;
    while i < 3 {
        moves[i] = moves[i - 1].compose(moves[0], false);
        i += 1;
    }
    // R, F by rotating U; D, L, B as the inverses of the opposite-face
    // turns conjugated through the cube.
    let mut i = 3;
    while i < 9 {
        moves[i] = moves[i - 3].sym(16);
        i += 1;
    }
    let mut i = 9;
    while i < 18 {
        moves[i] = moves[i - 9].sym(11).inverse();
        i += 1;
    }
    moves
}

/// The 18 face-turn cubes in move-index order: U1 U2 U3 R1 .. B3.
pub const MOVES: [Cube; N_MOVES] = build_moves();

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::MoveSeq;

    fn random_cube(rng: &mut impl FnMut(usize) -> usize) -> Cube {
        let mut c = Cube::IDENTITY;
        for _ in 0..40 {
            c = c.mv(Move::new(rng(N_MOVES) as u8));
        }
        c
    }

    fn rng() -> impl FnMut(usize) -> usize {
        fastrand::seed(0x5eed);
        move |n| fastrand::usize(..n)
    }

    #[test]
    fn identity_is_neutral() {
        let c = Cube::from_moves(&MoveSeq::parse("U1R2F3D1L2B3"));
        assert_eq!(c * Cube::IDENTITY, c);
        assert_eq!(Cube::IDENTITY * c, c);
    }

    #[test]
    fn moves_invert() {
        for m in Move::all() {
            assert_eq!(MOVES[m.index()] * MOVES[m.inverse().index()], Cube::IDENTITY);
        }
    }

    #[test]
    fn quarter_turns_have_order_four() {
        for face in 0..6 {
            let m = MOVES[face * 3];
            assert_eq!(m * m * m * m, Cube::IDENTITY);
            assert_eq!(m * m, MOVES[face * 3 + 1]);
            assert_eq!(m * m * m, MOVES[face * 3 + 2]);
        }
    }

    #[test]
    fn u_turn_flips_its_edges() {
        // Quarter-turn parity is counted in the flip bits, so every
        // quarter turn flips exactly four edges.
        assert_eq!(MOVES[0].edge_orient_raw().count_ones(), 4);
        assert_eq!(MOVES[15].edge_orient_raw().count_ones(), 4);
        assert_eq!(MOVES[1].edge_orient_raw(), 0);
    }

    #[test]
    fn compose_is_associative() {
        let mut rng = rng();
        for _ in 0..20 {
            let a = random_cube(&mut rng);
            let b = random_cube(&mut rng);
            let c = random_cube(&mut rng);
            assert_eq!((a * b) * c, a * (b * c));
        }
    }

    #[test]
    fn inverse_round_trips() {
        let mut rng = rng();
        for _ in 0..20 {
            let c = random_cube(&mut rng);
            assert_eq!(c * c.inverse(), Cube::IDENTITY);
            assert_eq!(c.inverse().inverse(), c);
        }
    }

    #[test]
    fn syms_are_distinct_and_close() {
        let mut seen = std::collections::HashSet::new();
        for s in 0..N_SYM48 {
            assert!(seen.insert(SYMS[s]));
        }
        for s in 0..N_SYM48 as u8 {
            let mirror = s & 1 == 1;
            assert_eq!(
                SYMS[s as usize].compose(SYMS[SYM_INV[s as usize] as usize], mirror),
                Cube::IDENTITY
            );
        }
    }

    #[test]
    fn sym_conjugation_round_trips() {
        let mut rng = rng();
        for _ in 0..10 {
            let c = random_cube(&mut rng);
            for s in 0..N_SYM48 as u8 {
                assert_eq!(c.sym(s).symi(s), c);
            }
        }
    }

    #[test]
    fn sym_respects_composition() {
        let mut rng = rng();
        for _ in 0..10 {
            let a = random_cube(&mut rng);
            let b = random_cube(&mut rng);
            for s in [0u8, 1, 5, 11, 16, 23, 40, 47] {
                assert_eq!((a * b).sym(s), a.sym(s) * b.sym(s));
            }
        }
    }

    #[test]
    fn edge_perm_round_trips() {
        let mut rng = rng();
        for _ in 0..50 {
            let rank = (rng(N_EPERM)) as u32;
            assert_eq!(Cube::IDENTITY.with_edge_perm(rank).edge_perm(), rank);
        }
        assert_eq!(Cube::IDENTITY.edge_perm(), 0);
        assert_eq!(Cube::IDENTITY.with_edge_perm(N_EPERM as u32 - 1).edge_perm(), N_EPERM as u32 - 1);
    }

    #[test]
    fn corner_perm_round_trips() {
        for rank in (0..N_CPERM as u16).step_by(37) {
            assert_eq!(Cube::IDENTITY.with_corner_perm(rank).corner_perm(), rank);
        }
        assert_eq!(Cube::IDENTITY.with_corner_perm(N_CPERM as u16 - 1).corner_perm(), N_CPERM as u16 - 1);
    }

    #[test]
    fn edge_orient_round_trips() {
        for o in (0..N_EORIENT as u16).step_by(13) {
            let c = Cube::IDENTITY.with_edge_orient(o);
            assert_eq!(c.edge_orient(), o);
            assert_eq!(c.edge_orient_raw().count_ones() % 2, 0);
        }
    }

    #[test]
    fn corner_orient_round_trips() {
        for o in (0..N_CORIENT as u16).step_by(11) {
            let c = Cube::IDENTITY.with_corner_orient(o);
            assert_eq!(c.corner_orient(), o);
            let total: u16 = (0..8).map(|i| u16::from(c.corner_byte(i) >> 4)).sum();
            assert_eq!(total % 3, 0);
        }
    }

    #[test]
    fn parity_tracks_the_edge_half_alone() {
        // A face turn permutes both halves oddly, so the combined parity
        // cancels; stripping the corner half exposes the edge parity.
        assert!(!MOVES[0].parity());
        assert!(MOVES[0].with_corner_perm(0).parity());
        assert!(!MOVES[1].with_corner_perm(0).parity());
        assert!(!Cube::IDENTITY.parity());
    }

    #[test]
    fn parity_is_a_homomorphism() {
        let mut rng = rng();
        for _ in 0..20 {
            let a = random_cube(&mut rng);
            let b = random_cube(&mut rng);
            assert_eq!((a * b).parity(), a.parity() ^ b.parity());
        }
    }

    #[test]
    fn singmaster_of_identity() {
        assert_eq!(
            Cube::IDENTITY.to_singmaster(),
            "UF UR UB UL DF DR DB DL FR FL BR BL UFR URB UBL ULF DRF DFL DLB DBR"
        );
    }

    #[test]
    fn singmaster_of_u_turn() {
        // U cycles the top edges against their flip marker and the top
        // corners in place value order.
        assert_eq!(
            MOVES[0].to_singmaster(),
            "UR UB UL UF DF DR DB DL FR FL BR BL URB UBL ULF UFR DRF DFL DLB DBR"
        );
    }

    #[test]
    fn from_moves_matches_composition() {
        let seq = MoveSeq::parse("U1R1");
        assert_eq!(Cube::from_moves(&seq), MOVES[0] * MOVES[3]);
    }

    #[test]
    fn order_is_total_on_sym_orbits() {
        let mut rng = rng();
        let c = random_cube(&mut rng);
        let min = (0..N_SYM48 as u8).map(|s| c.sym(s)).min();
        let direct = (0..N_SYM48 as u8).fold(c, |best, s| best.min(c.sym(s)));
        assert_eq!(min, Some(direct));
    }
}
