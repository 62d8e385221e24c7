//! Move indices and move sequences.
//!
//! A move is an index in `0..18`: face (U, R, F, D, L, B in that order)
//! times three, plus the power (1, 2 or 3 quarter turns clockwise, encoded
//! 0-2). Faces 0-2 and 3-5 are opposite pairs, so `face % 3` names the
//! axis and `face / 3` the pole on that axis.

use std::fmt;

use crate::cube::N_MOVES;

/// One of the eighteen face turns.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Move(u8);

impl Move {
    pub fn new(index: u8) -> Move {
        debug_assert!((index as usize) < N_MOVES);
        Move(index)
    }

    pub fn all() -> impl Iterator<Item = Move> {
        (0..N_MOVES as u8).map(Move)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Face in `0..6`, in U R F D L B order.
    pub const fn face(self) -> u8 {
        self.0 / 3
    }

    /// Rotation axis in `0..3`; opposite faces share an axis.
    pub const fn axis(self) -> u8 {
        (self.0 / 3) % 3
    }

    /// Quarter turns minus one, in `0..3`.
    pub const fn power(self) -> u8 {
        self.0 % 3
    }

    /// The move undoing this one: same face, complementary power.
    #[must_use]
    pub const fn inverse(self) -> Move {
        Move(self.0 + 2 - 2 * (self.0 % 3))
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            b"URFDLB"[self.face() as usize] as char,
            b"123"[self.power() as usize] as char
        )
    }
}

/// A sequence of face turns.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct MoveSeq(Vec<Move>);

impl MoveSeq {
    pub fn new() -> MoveSeq {
        MoveSeq(Vec::new())
    }

    /// Parses lenient face-turn notation.
    ///
    /// Face letters are case-insensitive; a following `2` doubles, `3` or
    /// `'` inverts, and anything else (including `1`, whitespace, or a new
    /// face letter) closes the pending turn as a single quarter turn.
    /// Unrecognized characters never fail, they only separate.
    pub fn parse(s: &str) -> MoveSeq {
        let mut moves = Vec::new();
        let mut pending: Option<u8> = None;
        for ch in s.chars() {
            let face = match ch {
                'u' | 'U' => Some(0),
                'r' | 'R' => Some(3),
                'f' | 'F' => Some(6),
                'd' | 'D' => Some(9),
                'l' | 'L' => Some(12),
                'b' | 'B' => Some(15),
                _ => None,
            };
            if let Some(face) = face {
                if let Some(prev) = pending {
                    moves.push(Move(prev));
                }
                pending = Some(face);
            } else if let Some(prev) = pending {
                let power = match ch {
                    '3' | '\'' => 2,
                    '2' => 1,
                    _ => 0,
                };
                moves.push(Move(prev + power));
                pending = None;
            }
        }
        if let Some(prev) = pending {
            moves.push(Move(prev));
        }
        MoveSeq(moves)
    }

    pub fn push(&mut self, m: Move) {
        self.0.push(m);
    }

    pub fn pop(&mut self) -> Option<Move> {
        self.0.pop()
    }

    /// Merges consecutive same-axis turns and drops identity turns.
    ///
    /// Within a run of turns on one axis the two poles commute, so their
    /// powers accumulate independently mod 4; each pole that ends up
    /// nonzero emits one turn, opposite pole last. The result reaches the
    /// same state in canonical form.
    #[must_use]
    pub fn canonical(&self) -> MoveSeq {
        fn flush(out: &mut Vec<Move>, axis: u8, power: &mut [u8; 2]) {
            for (pole, p) in power.iter_mut().enumerate() {
                *p %= 4;
                if *p != 0 {
                    out.push(Move(axis * 3 + pole as u8 * 9 + *p - 1));
                }
                *p = 0;
            }
        }

        let mut out = Vec::with_capacity(self.0.len());
        let mut last_axis = 0u8;
        let mut power = [0u8; 2];
        for &m in &self.0 {
            if m.axis() != last_axis {
                flush(&mut out, last_axis, &mut power);
                last_axis = m.axis();
            }
            power[usize::from(m.index() >= 9)] += m.power() + 1;
        }
        flush(&mut out, last_axis, &mut power);
        MoveSeq(out)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Move> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for MoveSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.0 {
            write!(f, "{m}")?;
        }
        Ok(())
    }
}

impl FromIterator<Move> for MoveSeq {
    fn from_iter<I: IntoIterator<Item = Move>>(iter: I) -> MoveSeq {
        MoveSeq(iter.into_iter().collect())
    }
}

impl std::ops::Deref for MoveSeq {
    type Target = [Move];

    fn deref(&self) -> &[Move] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(ms: &[u8]) -> MoveSeq {
        ms.iter().map(|&m| Move::new(m)).collect()
    }

    #[test]
    fn inverse_complements_power() {
        for m in Move::all() {
            assert_eq!(m.inverse().face(), m.face());
            assert_eq!(m.inverse().inverse(), m);
            assert_eq!((m.power() + m.inverse().power() + 2) % 4, 0);
        }
    }

    #[test]
    fn parse_basic_notation() {
        assert_eq!(MoveSeq::parse("U1R2F3"), seq(&[0, 4, 8]));
        assert_eq!(MoveSeq::parse("D1L1B1"), seq(&[9, 12, 15]));
    }

    #[test]
    fn parse_is_lenient() {
        assert_eq!(MoveSeq::parse("U R' f2"), seq(&[0, 5, 7]));
        assert_eq!(MoveSeq::parse("UR"), seq(&[0, 3]));
        assert_eq!(MoveSeq::parse("u2 // comment"), seq(&[1]));
        assert_eq!(MoveSeq::parse(""), MoveSeq::new());
        assert_eq!(MoveSeq::parse("xyz 123"), MoveSeq::new());
    }

    #[test]
    fn parse_round_trips_display() {
        let s = "U1R2F3D1L2B3U2";
        assert_eq!(MoveSeq::parse(s).to_string(), s);
    }

    #[test]
    fn canonical_merges_same_face() {
        assert_eq!(MoveSeq::parse("U1U1").canonical(), seq(&[1]));
        assert_eq!(MoveSeq::parse("U1U3").canonical(), MoveSeq::new());
        assert_eq!(MoveSeq::parse("U2U2").canonical(), MoveSeq::new());
    }

    #[test]
    fn canonical_merges_across_opposite_faces() {
        // U and D commute; both powers survive independently.
        assert_eq!(MoveSeq::parse("U1D1U1").canonical(), seq(&[1, 9]));
        assert_eq!(MoveSeq::parse("U1D2U3D2").canonical(), MoveSeq::new());
    }

    #[test]
    fn canonical_keeps_distinct_axes() {
        let s = seq(&[0, 3, 6, 9, 12, 15]);
        assert_eq!(s.canonical(), s);
    }

    #[test]
    fn canonical_preserves_the_state() {
        use crate::cube::Cube;
        let raw = MoveSeq::parse("U1U2D3R1R1F2F2B1L3D1D1D1");
        assert_eq!(
            Cube::from_moves(&raw),
            Cube::from_moves(&raw.canonical())
        );
        assert!(raw.canonical().len() < raw.len());
    }
}
