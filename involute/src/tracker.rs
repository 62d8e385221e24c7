//! The persistent result database.
//!
//! One file holds everything the search has proven so far: a fixed-size
//! header per coset followed by a flat array of packed solutions, one
//! slot per involution. The whole file is memory-mapped read-write and
//! shared between processes; an exclusive advisory lock on the file
//! keeps two solving processes apart, and a per-coset mutex serializes
//! threads within one process.
//!
//! Which of a coset's corner targets remain unsolved is not stored. It
//! is replayed on first access from the stored solutions: start from the
//! parity's full corner bitmap and clear the perfect-hash bit of every
//! recorded solution and of its self-symmetric images.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::sync::{Mutex, MutexGuard, OnceLock};

use log::info;
use memmap2::MmapMut;
use thiserror::Error;

use crate::bits;
use crate::catalog::{Catalog, N_CORNER_HASH, N_EDGE_CLASSES, N_INVOLUTIONS};
use crate::coords::{CCoord, ECoord, Tables};
use crate::cube::Cube;
use crate::moves::{Move, MoveSeq};
use crate::prune::edge::EdgePrune;
use crate::{region, start, success, tables};

/// Longest storable solution.
pub const MAX_DEPTH: usize = 20;

const DB_FILE: &str = "invo.dat";
const HEADER_BYTES: usize = 64;
const SOLUTION_BYTES: usize = 11;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("involution database already exists")]
    Exists,
    #[error("no involution database, create one first")]
    Missing,
    #[error("involution database: {0}")]
    Io(#[from] io::Error),
}

/// One coset's record, decoded from its 64 on-disk bytes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Header {
    pub offset: u32,
    pub ep: u32,
    pub eo: u16,
    pub n_cubes: u16,
    pub n_solved: u16,
    pub n_length: [u16; MAX_DEPTH + 1],
    pub proven_min: u8,
    pub parity: bool,
    pub prune: u8,
}

fn u16_at(b: &[u8], i: usize) -> u16 {
    u16::from_le_bytes([b[i], b[i + 1]])
}

fn u32_at(b: &[u8], i: usize) -> u32 {
    u32::from_le_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]])
}

impl Header {
    fn decode(b: &[u8]) -> Header {
        let mut n_length = [0u16; MAX_DEPTH + 1];
        for (d, n) in n_length.iter_mut().enumerate() {
            *n = u16_at(b, 14 + 2 * d);
        }
        Header {
            offset: u32_at(b, 0),
            ep: u32_at(b, 4),
            eo: u16_at(b, 8),
            n_cubes: u16_at(b, 10),
            n_solved: u16_at(b, 12),
            n_length,
            proven_min: b[60],
            parity: b[61] != 0,
            prune: b[62],
        }
    }

    fn encode(&self, b: &mut [u8]) {
        b[0..4].copy_from_slice(&self.offset.to_le_bytes());
        b[4..8].copy_from_slice(&self.ep.to_le_bytes());
        b[8..10].copy_from_slice(&self.eo.to_le_bytes());
        b[10..12].copy_from_slice(&self.n_cubes.to_le_bytes());
        b[12..14].copy_from_slice(&self.n_solved.to_le_bytes());
        for (d, n) in self.n_length.iter().enumerate() {
            b[14 + 2 * d..16 + 2 * d].copy_from_slice(&n.to_le_bytes());
        }
        b[56..60].fill(0);
        b[60] = self.proven_min;
        b[61] = u8::from(self.parity);
        b[62] = self.prune;
        b[63] = 0;
    }

    /// The coset's edge coordinate, always in the representative frame.
    pub fn ec(&self) -> ECoord {
        ECoord::new(self.ep, self.eo)
    }
}

/// A canonical move sequence in its 11-byte packed form.
///
/// Byte 0 is `0x80` (valid) | low bit of the first move `<< 6` | length;
/// the moves follow as nibbles. The first move is stored halved (its low
/// bit lives in byte 0); every later move drops 3 when its face index
/// rose, which the decoder can undo because canonical sequences never
/// stay on one axis and emit the low pole of an axis first.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Solution {
    bytes: [u8; SOLUTION_BYTES],
}

impl Solution {
    /// Packs `seq`, canonicalizing first. Sequences longer than
    /// [`MAX_DEPTH`] after canonicalization are a caller bug.
    pub fn pack(seq: &MoveSeq) -> Solution {
        let seq = seq.canonical();
        assert!(seq.len() <= MAX_DEPTH);

        let mut bytes = [0u8; SOLUTION_BYTES];
        bytes[0] = 0x80 | seq.len() as u8;

        let mut prev = 0u8;
        for (i, m) in seq.iter().enumerate() {
            let raw = m.index() as u8;
            let mut enc = raw;
            if i == 0 {
                bytes[0] |= (raw & 1) << 6;
                enc = raw >> 1;
            } else if prev < raw {
                enc = raw - 3;
            }
            if i % 2 == 0 {
                enc <<= 4;
            }
            bytes[1 + i / 2] |= enc;
            prev = raw;
        }
        Solution { bytes }
    }

    pub fn unpack(&self) -> MoveSeq {
        let mut seq = MoveSeq::new();
        let mut last_face = u8::MAX;
        for i in 0..self.len() {
            let mut m = self.bytes[1 + i / 2];
            if i % 2 == 0 {
                m >>= 4;
            } else {
                m &= 0x0f;
            }
            if i == 0 {
                m = ((self.bytes[0] >> 6) & 1) | (m << 1);
            }
            let mut face = m / 3;
            if last_face <= face {
                m += 3;
                face += 1;
            }
            last_face = face;
            seq.push(Move::new(m));
        }
        seq
    }

    pub fn valid(&self) -> bool {
        self.bytes[0] & 0x80 != 0
    }

    pub fn len(&self) -> usize {
        usize::from(self.bytes[0] & 0x1f)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A 65,536-bit set over the corner perfect hash.
#[derive(Clone)]
pub struct CornerSet {
    words: [u64; N_CORNER_HASH / 64],
}

impl Default for CornerSet {
    fn default() -> Self {
        CornerSet {
            words: [0; N_CORNER_HASH / 64],
        }
    }
}

impl CornerSet {
    fn test(&self, i: u16) -> bool {
        self.words[usize::from(i) / 64] >> (i % 64) & 1 == 1
    }

    fn set(&mut self, i: u16) {
        self.words[usize::from(i) / 64] |= 1 << (i % 64);
    }

    fn reset(&mut self, i: u16) {
        self.words[usize::from(i) / 64] &= !(1 << (i % 64));
    }

    fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

fn file_len() -> u64 {
    (N_EDGE_CLASSES * HEADER_BYTES) as u64 + N_INVOLUTIONS * SOLUTION_BYTES as u64
}

/// The open, memory-mapped database.
pub struct Tracker {
    file: File,
    _map: MmapMut,
    base: *mut u8,
    locks: Vec<Mutex<Option<Box<CornerSet>>>>,
    corner_init: OnceLock<[CornerSet; 2]>,
}

// SAFETY: the raw base pointer aliases the owned map; all mutation goes
// through methods whose callers hold the matching coset lock.
unsafe impl Send for Tracker {}
// SAFETY: as above.
unsafe impl Sync for Tracker {}

impl Tracker {
    /// Creates the empty database: one header per coset in catalog order
    /// (even parity first), zeroed solution slots for every involution.
    /// Refuses to overwrite an existing database.
    pub fn create(
        tables: &Tables,
        catalog: &Catalog,
        prune: &EdgePrune,
    ) -> Result<(), TrackerError> {
        if tables::exists(DB_FILE) {
            return Err(TrackerError::Exists);
        }

        info!(start!("creating the involution database"));
        let mut head = vec![0u8; N_EDGE_CLASSES * HEADER_BYTES];
        let mut offset = 0u64;
        let mut idx = 0usize;
        for parity in [false, true] {
            for &ec in catalog.edges(parity) {
                let n_cubes = catalog.cube_count(tables, ec);
                assert!(n_cubes <= u64::from(u16::MAX));
                let bound = prune.probe(tables, ec) as u8;

                let h = Header {
                    offset: offset as u32,
                    ep: ec.index(),
                    eo: ec.orient(),
                    n_cubes: n_cubes as u16,
                    n_solved: 0,
                    n_length: [0; MAX_DEPTH + 1],
                    proven_min: bound,
                    parity,
                    prune: bound,
                };
                h.encode(&mut head[idx * HEADER_BYTES..][..HEADER_BYTES]);

                offset += n_cubes;
                idx += 1;
            }
        }
        assert_eq!(idx, N_EDGE_CLASSES);
        assert_eq!(offset, N_INVOLUTIONS);

        tables::save_and_extend(DB_FILE, &head, file_len())?;
        info!(success!("created the involution database"));
        Ok(())
    }

    /// Memory-maps the database. A missing file or a length mismatch is
    /// an error; no context tables are needed until a handle is taken.
    pub fn open() -> Result<Tracker, TrackerError> {
        if !tables::exists(DB_FILE) {
            return Err(TrackerError::Missing);
        }
        let (file, mut map) = region::map_file(&tables::full_path(DB_FILE), file_len(), false)?;
        let base = map.as_mut_ptr();
        let locks = (0..N_EDGE_CLASSES).map(|_| Mutex::new(None)).collect();
        Ok(Tracker {
            file,
            _map: map,
            base,
            locks,
            corner_init: OnceLock::new(),
        })
    }

    /// Takes the process-exclusive advisory lock on the backing file.
    /// A second solving process would interleave half-written records, so
    /// a lock held elsewhere is fatal.
    pub fn lock(&self) {
        // SAFETY: flock on our own open descriptor.
        let rc = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        assert!(
            rc == 0,
            "involution database is locked by another process"
        );
    }

    pub fn n_cosets(&self) -> usize {
        N_EDGE_CLASSES
    }

    pub fn header(&self, idx: usize) -> Header {
        Header::decode(self.header_bytes(idx))
    }

    fn header_bytes(&self, idx: usize) -> &[u8] {
        debug_assert!(idx < N_EDGE_CLASSES);
        // SAFETY: the map spans every header record; the writer of a
        // record holds its coset lock, and cross-coset readers only
        // consume fields that advance monotonically.
        unsafe { std::slice::from_raw_parts(self.base.add(idx * HEADER_BYTES), HEADER_BYTES) }
    }

    /// Caller must hold the coset lock for `idx`.
    fn write_header(&self, idx: usize, h: &Header) {
        debug_assert!(idx < N_EDGE_CLASSES);
        // SAFETY: in-bounds as in header_bytes; exclusivity comes from
        // the caller's coset lock.
        let b =
            unsafe { std::slice::from_raw_parts_mut(self.base.add(idx * HEADER_BYTES), HEADER_BYTES) };
        h.encode(b);
    }

    fn solution_at(&self, slot: u64) -> Solution {
        debug_assert!(slot < N_INVOLUTIONS);
        let off = (N_EDGE_CLASSES * HEADER_BYTES) as u64 + slot * SOLUTION_BYTES as u64;
        let mut bytes = [0u8; SOLUTION_BYTES];
        // SAFETY: slot is within the solution array, which the map spans.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.base.add(off as usize),
                bytes.as_mut_ptr(),
                SOLUTION_BYTES,
            );
        }
        Solution { bytes }
    }

    /// Caller must hold the lock of the coset owning `slot`.
    fn write_solution(&self, slot: u64, sol: &Solution) {
        debug_assert!(slot < N_INVOLUTIONS);
        let off = (N_EDGE_CLASSES * HEADER_BYTES) as u64 + slot * SOLUTION_BYTES as u64;
        // SAFETY: as in solution_at, plus the caller's coset lock.
        unsafe {
            std::ptr::copy_nonoverlapping(
                sol.bytes.as_ptr(),
                self.base.add(off as usize),
                SOLUTION_BYTES,
            );
        }
    }

    /// Every solution recorded for the coset, in discovery order.
    pub fn solutions(&self, idx: usize) -> Vec<MoveSeq> {
        let h = self.header(idx);
        (0..u64::from(h.n_solved))
            .map(|i| self.solution_at(u64::from(h.offset) + i).unpack())
            .collect()
    }

    /// Erases all progress on one coset, rewinding its proven minimum to
    /// the precomputed lower bound.
    pub fn reset(&self, idx: usize) {
        let mut cached = self.locks[idx].lock().unwrap();
        let mut h = self.header(idx);
        for i in 0..u64::from(h.n_cubes) {
            self.write_solution(u64::from(h.offset) + i, &Solution::default());
        }
        h.n_solved = 0;
        h.n_length = [0; MAX_DEPTH + 1];
        h.proven_min = h.prune;
        self.write_header(idx, &h);
        *cached = None;
    }

    fn corner_init(&self, tables: &Tables, catalog: &Catalog, parity: bool) -> &CornerSet {
        let init = self.corner_init.get_or_init(|| {
            let mut sets = [CornerSet::default(), CornerSet::default()];
            for parity in [false, true] {
                for &cc in catalog.corner.set(parity) {
                    sets[usize::from(parity)].set(catalog.corner.hash(&tables.corner, cc));
                }
            }
            sets
        });
        &init[usize::from(parity)]
    }

    /// Opens a solving handle on one coset, taking its lock for the
    /// handle's lifetime and replaying the unsolved bitmap if this is the
    /// coset's first access in this process.
    pub fn handle<'a>(&'a self, idx: usize, tables: &'a Tables, catalog: &'a Catalog) -> Handle<'a> {
        let mut guard = self.locks[idx].lock().unwrap();
        let header = self.header(idx);
        let self_sym = header.ec().selfsym(tables);

        let set = if let Some(set) = guard.take() {
            set
        } else {
            let mut set = Box::new(self.corner_init(tables, catalog, header.parity).clone());
            for seq in self.solutions(idx) {
                let c = Cube::from_moves(&seq);
                set.reset(catalog.corner.hash_cube(c));
                for s in bits(self_sym) {
                    set.reset(catalog.corner.hash_cube(c.symi(s as u8)));
                }
            }
            set
        };
        let todo = set.count();

        Handle {
            tracker: self,
            tables,
            catalog,
            idx,
            guard,
            header,
            self_sym,
            set,
            todo,
        }
    }
}

/// Exclusive access to one coset's record and unsolved bitmap.
pub struct Handle<'a> {
    tracker: &'a Tracker,
    tables: &'a Tables,
    catalog: &'a Catalog,
    idx: usize,
    guard: MutexGuard<'a, Option<Box<CornerSet>>>,
    header: Header,
    self_sym: u64,
    set: Box<CornerSet>,
    todo: usize,
}

impl Drop for Handle<'_> {
    fn drop(&mut self) {
        // Hand the replayed bitmap back so the next handle skips the
        // replay.
        *self.guard = Some(std::mem::take(&mut self.set));
    }
}

impl Handle<'_> {
    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn ec(&self) -> ECoord {
        self.header.ec()
    }

    pub fn parity(&self) -> bool {
        self.header.parity
    }

    pub fn proven_min(&self) -> u8 {
        self.header.proven_min
    }

    pub fn n_solved(&self) -> u16 {
        self.header.n_solved
    }

    pub fn n_cubes(&self) -> u16 {
        self.header.n_cubes
    }

    /// Unsolved targets left, counting self-symmetric duplicates.
    pub fn todo(&self) -> usize {
        self.todo
    }

    /// Symmetries fixing the coset's edge coordinate; solutions propagate
    /// to every corner image under these.
    pub fn self_sym(&self) -> u64 {
        self.self_sym
    }

    pub fn is_unsolved(&self, cc: CCoord) -> bool {
        self.set.test(self.catalog.corner.hash(&self.tables.corner, cc))
    }

    /// Raises the proven search floor; never lowers it.
    pub fn update_proven_min(&mut self, depth: u8) {
        if self.header.proven_min < depth {
            self.header.proven_min = depth;
            self.tracker.write_header(self.idx, &self.header);
        }
    }

    /// Records one solution: clears its bitmap bit and every
    /// self-symmetric image, appends the canonical sequence, and bumps
    /// the histogram. False when the target was already solved.
    pub fn record(&mut self, seq: &MoveSeq) -> bool {
        let c = Cube::from_moves(seq);
        let hash = self.catalog.corner.hash_cube(c);
        if !self.set.test(hash) {
            return false;
        }
        self.set.reset(hash);
        self.todo -= 1;

        for s in bits(self.self_sym) {
            let h_s = self.catalog.corner.hash_cube(c.symi(s as u8));
            if self.set.test(h_s) {
                self.set.reset(h_s);
                self.todo -= 1;
            }
        }

        let canon = seq.canonical();
        let slot = u64::from(self.header.offset) + u64::from(self.header.n_solved);
        self.tracker.write_solution(slot, &Solution::pack(&canon));
        self.header.n_solved += 1;
        self.header.n_length[canon.len()] += 1;
        self.tracker.write_header(self.idx, &self.header);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::N_MOVES;

    #[test]
    fn header_codec_round_trips() {
        let mut n_length = [0u16; MAX_DEPTH + 1];
        n_length[13] = 7;
        n_length[20] = 1;
        let h = Header {
            offset: 0xdead_beef,
            ep: 9_985_967,
            eo: 2047,
            n_cubes: 10_396,
            n_solved: 8,
            n_length,
            proven_min: 14,
            parity: true,
            prune: 9,
        };

        let mut b = [0u8; HEADER_BYTES];
        h.encode(&mut b);
        assert_eq!(Header::decode(&b), h);
        assert_eq!(h.ec().index(), 9_985_967);
        assert_eq!(h.ec().orient(), 2047);
    }

    #[test]
    fn solution_codec_round_trips_canonical_sequences() {
        fastrand::seed(0xbead);
        for _ in 0..500 {
            let mut raw = MoveSeq::new();
            for _ in 0..fastrand::usize(..30) {
                raw.push(Move::new(fastrand::u8(..N_MOVES as u8)));
            }
            let canon = raw.canonical();
            if canon.len() > MAX_DEPTH {
                continue;
            }
            let sol = Solution::pack(&canon);
            assert!(sol.valid());
            assert_eq!(sol.len(), canon.len());
            assert_eq!(sol.unpack(), canon);
        }
    }

    #[test]
    fn solution_codec_empty_and_extremes() {
        let empty = Solution::pack(&MoveSeq::new());
        assert!(empty.valid());
        assert!(empty.is_empty());
        assert_eq!(empty.unpack(), MoveSeq::new());

        // B-family first moves exercise the halved-first-move path.
        for s in ["B3", "B1U1", "U1B1", "L3B2", "B2L3U1"] {
            let seq = MoveSeq::parse(s);
            assert_eq!(Solution::pack(&seq).unpack(), seq);
        }

        // A full-length canonical sequence.
        let long = MoveSeq::parse("U1R1U1R1U1R1U1R1U1R1U1R1U1R1U1R1U1R1U1R1");
        assert_eq!(long.len(), MAX_DEPTH);
        assert_eq!(Solution::pack(&long).unpack(), long);
    }

    #[test]
    fn packing_canonicalizes() {
        let raw = MoveSeq::parse("U1U1R2R2F1");
        let sol = Solution::pack(&raw);
        assert_eq!(sol.unpack(), raw.canonical());
        assert_eq!(sol.len(), 2);
    }

    #[test]
    fn corner_set_bit_ops() {
        let mut set = CornerSet::default();
        assert_eq!(set.count(), 0);
        for i in [0u16, 63, 64, 12345, 65535] {
            assert!(!set.test(i));
            set.set(i);
            assert!(set.test(i));
        }
        assert_eq!(set.count(), 5);
        set.reset(64);
        assert!(!set.test(64));
        assert!(set.test(63));
        assert_eq!(set.count(), 4);
    }

    #[test]
    fn an_unwritten_slot_is_invalid() {
        assert!(!Solution::default().valid());
        assert!(Solution::default().is_empty());
    }
}
