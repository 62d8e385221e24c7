//! Enumeration of involution building blocks.
//!
//! An involution splits into an edge half and a corner half that must be
//! involutions themselves, with matching permutation parity. The edge
//! halves are enumerated once modulo all 48 symmetries and become the
//! cosets of the search; the corner halves are enumerated in full (one
//! entry per state) and are shared by every coset of their parity.
//!
//! Corner states also get a perfect 16-bit hash so each coset can track
//! which of its members remain unsolved in one small bitmap.

use fxhash::FxHashMap;

use crate::bits;
use crate::coords::{CCoord, CornerTables, ECoord, Tables};
use crate::cube::{Cube, N_CORIENT, N_CPERM, N_EORIENT};

/// Involution states modulo symmetry.
pub const N_INVOLUTIONS: u64 = 3_562_686_140;
/// Edge involution classes, the cosets of the search.
pub const N_EDGE_CLASSES: usize = 336_004;
/// Corner involution states, even parity.
pub const N_CORNERS_EVEN: usize = 10_396;
/// Corner involution states, odd parity.
pub const N_CORNERS_ODD: usize = 11_424;

/// Buckets of the perfect corner hash.
pub const N_CORNER_HASH: usize = 1 << 16;

const NOT_INVOLUTION: u16 = u16::MAX;

/// Enumerates the involutive permutations of `N` slots: every slot fixed
/// or swapped with a later one. `parity` selects the transposition-count
/// parity.
fn invo_perms<const N: usize>(
    parity: bool,
    out: &mut Vec<[u8; N]>,
    mut arr: [u8; N],
    mut idx: usize,
    mask: u32,
) {
    while idx < N && (mask >> idx) & 1 == 1 {
        idx += 1;
    }
    if idx == N {
        if !parity {
            out.push(arr);
        }
        return;
    }

    arr[idx] = idx as u8;
    invo_perms(parity, out, arr, idx + 1, mask);

    for k in idx + 1..N {
        if (mask >> k) & 1 == 1 {
            continue;
        }
        arr[idx] = k as u8;
        arr[k] = idx as u8;
        invo_perms(!parity, out, arr, idx + 1, mask | (1 << k));
    }
}

/// The corner-side catalog: all corner involution states by parity, their
/// self-symmetry census, and the perfect hash.
pub struct CornerCatalog {
    corners: [Vec<CCoord>; 2],
    selfsym_count: [FxHashMap<u64, u64>; 2],
    invo_code: Vec<u16>,
}

impl CornerCatalog {
    pub fn generate(tables: &CornerTables) -> CornerCatalog {
        let mut corners = [Vec::new(), Vec::new()];
        let mut invo_code = vec![NOT_INVOLUTION; N_CPERM];
        let mut code = 0u16;

        for parity in 0..2 {
            let mut perms = Vec::new();
            invo_perms::<8>(parity == 1, &mut perms, [0; 8], 0, 0);
            for perm in perms {
                let c = Cube::IDENTITY.with_corners(perm);
                expand_corner(tables, &mut corners[parity], c);
            }
        }

        // Perfect hash support: number the involutive permutations in
        // rank order.
        for rank in 0..N_CPERM as u16 {
            let c = Cube::IDENTITY.with_corner_perm(rank);
            if c * c == Cube::IDENTITY {
                invo_code[rank as usize] = code;
                code += 1;
            }
        }

        let mut selfsym_count = [FxHashMap::default(), FxHashMap::default()];
        for parity in 0..2 {
            for &cc in &corners[parity] {
                let mask = cc.cube(tables).self_sym48();
                *selfsym_count[parity].entry(mask).or_insert(0u64) += 1;
            }
        }

        CornerCatalog {
            corners,
            selfsym_count,
            invo_code,
        }
    }

    /// All corner involution states of one parity.
    pub fn set(&self, parity: bool) -> &[CCoord] {
        &self.corners[usize::from(parity)]
    }

    /// Census of full self-symmetry masks over one parity's states.
    pub fn selfsym_count(&self, parity: bool) -> &FxHashMap<u64, u64> {
        &self.selfsym_count[usize::from(parity)]
    }

    /// Perfect hash of a corner involution state.
    ///
    /// The permutation contributes its index among the 764 involutive
    /// corner permutations; the orientation contributes one base-3 digit
    /// per transposition, the twist at the pair's smaller slot (fixed
    /// slots must be untwisted, and the larger slot's twist is determined
    /// by the smaller's). Injective over all states of either parity,
    /// maximum 61,883.
    pub fn hash(&self, tables: &CornerTables, cc: CCoord) -> u16 {
        let (rank, orient) = cc.real(tables);
        self.hash_cube(
            Cube::IDENTITY
                .with_corner_perm(rank)
                .with_corner_orient(orient),
        )
    }

    /// [`CornerCatalog::hash`] on a cube's corner half directly.
    pub fn hash_cube(&self, c: Cube) -> u16 {
        let code = self.invo_code[c.corner_perm() as usize];
        debug_assert_ne!(code, NOT_INVOLUTION);

        let mut h = u32::from(code) * 81;
        let mut digit = 1u32;
        for slot in 0..8 {
            let other = usize::from(c.corner_byte(slot) & 0x07);
            if other > slot {
                h += u32::from(c.corner_byte(slot) >> 4) * digit;
                digit *= 3;
            }
        }
        h as u16
    }
}

/// The full catalog: corner side plus the symmetry-reduced edge classes.
pub struct Catalog {
    pub corner: CornerCatalog,
    edges: [Vec<ECoord>; 2],
}

impl Catalog {
    pub fn generate(tables: &Tables) -> Catalog {
        let mut edges = [Vec::new(), Vec::new()];
        for parity in 0..2 {
            let mut perms = Vec::new();
            invo_perms::<12>(parity == 1, &mut perms, [0; 12], 0, 0);
            for perm in perms {
                let c = Cube::IDENTITY.with_edges(perm);
                expand_edge(tables, &mut edges[parity], c);
            }
        }

        Catalog {
            corner: CornerCatalog::generate(&tables.corner),
            edges,
        }
    }

    /// Edge involution classes of one parity, each a coset of the search.
    pub fn edges(&self, parity: bool) -> &[ECoord] {
        &self.edges[usize::from(parity)]
    }

    pub fn n_edge_classes(&self) -> usize {
        self.edges[0].len() + self.edges[1].len()
    }

    /// Number of involutions in a coset modulo symmetry: Burnside count
    /// of the matching-parity corner states under the edge stabilizer.
    pub fn cube_count(&self, tables: &Tables, ec: ECoord) -> u64 {
        let c = ec.cube(tables);
        assert_eq!(c * c, Cube::IDENTITY);

        let esym = c.self_sym48();
        let mut count = 0u64;
        for (&csym, &n) in self.corner.selfsym_count(c.parity()) {
            count += n * u64::from((esym & csym).count_ones());
        }
        count / u64::from(esym.count_ones())
    }
}

/// Keeps the involutive orientations of one corner permutation.
fn expand_corner(tables: &CornerTables, out: &mut Vec<CCoord>, c: Cube) {
    for co in 0..N_CORIENT as u16 {
        let c = c.with_corner_orient(co);
        if c * c != Cube::IDENTITY {
            continue;
        }
        out.push(CCoord::from_cube(tables, c));
    }
}

/// Keeps one representative per symmetry class of the involutive edge
/// states over a representative permutation.
fn expand_edge(tables: &Tables, out: &mut Vec<ECoord>, c: Cube) {
    let ep = tables.eperm.from_cube(tables.syms(), c);
    if ep.sym() != 0 {
        // Not its own class representative; the representative's
        // enumeration covers this orbit.
        return;
    }

    let mut seen = [false; N_EORIENT];
    for eo in 0..N_EORIENT as u16 {
        if seen[eo as usize] {
            continue;
        }
        let c = c.with_edge_orient(eo);
        if c * c != Cube::IDENTITY {
            continue;
        }
        out.push(ECoord::from_cube(tables, c));

        for s in bits(tables.eperm.selfsym(ep.index())) {
            seen[tables.eorient.symi(eo, s as u8) as usize] = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::cperm::N_CPERM16;

    #[test]
    fn involutive_permutation_counts() {
        let mut even = Vec::new();
        invo_perms::<8>(false, &mut even, [0; 8], 0, 0);
        let mut odd = Vec::new();
        invo_perms::<8>(true, &mut odd, [0; 8], 0, 0);
        // 1 + 210 + 105 fixed-point-free-or-not even involutions, 28 + 420 odd.
        assert_eq!(even.len(), 316);
        assert_eq!(odd.len(), 448);

        for perm in even.iter().chain(&odd) {
            let c = Cube::IDENTITY.with_corners(*perm);
            assert_eq!(c * c, Cube::IDENTITY);
        }
    }

    #[test]
    fn corner_catalog_counts() {
        let tables = CornerTables::generate();
        let catalog = CornerCatalog::generate(&tables);
        assert_eq!(catalog.set(false).len(), N_CORNERS_EVEN);
        assert_eq!(catalog.set(true).len(), N_CORNERS_ODD);
    }

    #[test]
    fn corner_states_twist_only_transposed_pairs() {
        let tables = CornerTables::generate();
        let catalog = CornerCatalog::generate(&tables);
        for parity in [false, true] {
            for &cc in catalog.set(parity) {
                let c = cc.cube(&tables);
                for slot in 0..8 {
                    let byte = c.corner_byte(slot);
                    if usize::from(byte & 0x07) == slot {
                        assert_eq!(byte >> 4, 0);
                    }
                }
            }
        }
    }

    #[test]
    fn corner_hash_is_perfect_per_parity() {
        let tables = CornerTables::generate();
        let catalog = CornerCatalog::generate(&tables);
        for parity in [false, true] {
            let mut seen = vec![false; N_CORNER_HASH];
            let mut count = 0usize;
            for &cc in catalog.set(parity) {
                let h = catalog.hash(&tables, cc) as usize;
                if !seen[h] {
                    seen[h] = true;
                    count += 1;
                }
            }
            assert_eq!(count, catalog.set(parity).len());
        }
    }

    #[test]
    fn involution_code_covers_the_classes() {
        let tables = CornerTables::generate();
        let catalog = CornerCatalog::generate(&tables);
        let max_code = catalog
            .invo_code
            .iter()
            .filter(|&&c| c != NOT_INVOLUTION)
            .max()
            .copied();
        assert_eq!(max_code, Some(763));
        // Sanity against the class structure reduced by symmetry.
        assert!(N_CPERM16 < N_CPERM);
    }

    #[test]
    fn corner_selfsym_census_sums_to_the_catalog() {
        let tables = CornerTables::generate();
        let catalog = CornerCatalog::generate(&tables);
        for parity in [false, true] {
            let total: u64 = catalog.selfsym_count(parity).values().sum();
            assert_eq!(total, catalog.set(parity).len() as u64);
        }
    }

    #[test]
    #[ignore = "builds or loads the 840 MB edge permutation tables"]
    fn edge_class_count_matches() {
        let tables = Tables::load_or_generate();
        let catalog = Catalog::generate(&tables);
        assert_eq!(catalog.n_edge_classes(), N_EDGE_CLASSES);
    }

    #[test]
    #[ignore = "builds or loads the 840 MB edge permutation tables"]
    fn cube_counts_sum_to_all_involutions() {
        let tables = Tables::load_or_generate();
        let catalog = Catalog::generate(&tables);
        let mut total = 0u64;
        for parity in [false, true] {
            for &ec in catalog.edges(parity) {
                total += catalog.cube_count(&tables, ec);
            }
        }
        assert_eq!(total, N_INVOLUTIONS);
    }
}
