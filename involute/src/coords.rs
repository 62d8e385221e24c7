//! Symmetry-reduced coordinates and the lookup-table context.
//!
//! An [`ECoord`] is the edge half of a state (permutation class plus
//! orientation in the representative's frame); a [`CCoord`] is the corner
//! half. Both keep the orientation expressed in their representative's
//! frame, so pruning indices read off directly and a move is two table
//! lookups plus a frame shift.
//!
//! Edges reduce under all 48 symmetries because every symmetry changes
//! all twelve flips together or none. Corners only reduce under the 16
//! symmetries that fix the up-down axis: the other 32 twist corners
//! unevenly, and a table over the bare orientation coordinate could not
//! follow them.

pub mod cperm;
pub mod eperm;
pub mod orient;

use crate::cube::{Cube, N_CORIENT, N_EORIENT, N_SYM16, N_SYM48};
use crate::moves::Move;
use crate::sym::SymTables;
use cperm::{CPerm16, CpermTables};
use eperm::{EPerm48, EpermTables};
use orient::OrientTables;

/// Tables for the corner coordinates. A fraction of the size of the full
/// [`Tables`] and enough for the corner pruning side.
pub struct CornerTables {
    pub syms: SymTables,
    pub cperm: CpermTables,
    pub corient: OrientTables<N_CORIENT, N_SYM16>,
}

impl CornerTables {
    pub fn generate() -> CornerTables {
        CornerTables {
            syms: SymTables::new(),
            cperm: CpermTables::generate(),
            corient: OrientTables::generate(
                |o| Cube::IDENTITY.with_corner_orient(o),
                Cube::corner_orient,
            ),
        }
    }
}

/// Every lookup table the solvers need, built once per process.
pub struct Tables {
    pub corner: CornerTables,
    pub eperm: EpermTables,
    pub eorient: OrientTables<N_EORIENT, N_SYM48>,
}

impl Tables {
    /// Builds all tables; the edge permutation tables come from their
    /// disk cache when present.
    pub fn load_or_generate() -> Tables {
        Tables {
            corner: CornerTables::generate(),
            eperm: EpermTables::load_or_generate(),
            eorient: OrientTables::generate(
                |o| Cube::IDENTITY.with_edge_orient(o),
                Cube::edge_orient,
            ),
        }
    }

    pub fn syms(&self) -> &SymTables {
        &self.corner.syms
    }
}

/// The edge half of a state: permutation class, frame symmetry, and
/// orientation in the representative's frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ECoord {
    ep: EPerm48,
    eo: u16,
}

impl Default for ECoord {
    fn default() -> Self {
        ECoord::SOLVED
    }
}

impl ECoord {
    pub const SOLVED: ECoord = ECoord {
        ep: EPerm48::SOLVED,
        eo: 0,
    };

    /// A coordinate in the representative frame (symmetry tag zero).
    pub fn new(index: u32, eo: u16) -> ECoord {
        ECoord {
            ep: EPerm48::new(index, 0),
            eo,
        }
    }

    pub fn from_cube(tables: &Tables, c: Cube) -> ECoord {
        let ep = tables.eperm.from_cube(tables.syms(), c);
        let eo = tables.eorient.symi(c.edge_orient(), ep.sym());
        ECoord { ep, eo }
    }

    /// Materializes the edge state; corners stay identity.
    pub fn cube(self, tables: &Tables) -> Cube {
        Cube::IDENTITY
            .with_edge_perm(tables.eperm.rep(self.ep))
            .with_edge_orient(self.eo)
            .sym(self.ep.sym())
    }

    /// Solved means the true state is the identity: representative frame
    /// of the identity class with no flips.
    pub fn is_solved(self) -> bool {
        self.eo == 0 && self.ep.index() == 0
    }

    /// Forgets the frame symmetry, re-basing the coordinate on its
    /// representative as a state in its own right.
    #[must_use]
    pub fn normalize(self) -> ECoord {
        ECoord::new(self.ep.index(), self.eo)
    }

    pub fn index(self) -> u32 {
        self.ep.index()
    }

    pub fn orient(self) -> u16 {
        self.eo
    }

    pub fn sym(self) -> u8 {
        self.ep.sym()
    }

    /// Symmetries fixing both halves of the representative-frame pair.
    pub fn selfsym(self, tables: &Tables) -> u64 {
        tables.eperm.selfsym(self.ep.index()) & tables.eorient.selfsym(self.eo)
    }

    /// Row in the edge pruning table; frame-independent because both
    /// parts are kept in the representative frame.
    pub fn prune_index(self) -> usize {
        self.ep.index() as usize * N_EORIENT + self.eo as usize
    }

    #[must_use]
    pub fn mv(self, tables: &Tables, m: Move) -> ECoord {
        let (ep, m, s) = tables.eperm.move_ex(tables.syms(), self.ep, m);
        ECoord {
            ep,
            eo: tables.eorient.movei(self.eo, m, s),
        }
    }
}

/// The corner half of a state: permutation class, frame symmetry, and
/// orientation in the representative's frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CCoord {
    cp: CPerm16,
    co: u16,
}

impl Default for CCoord {
    fn default() -> Self {
        CCoord::SOLVED
    }
}

impl CCoord {
    pub const SOLVED: CCoord = CCoord {
        cp: CPerm16::SOLVED,
        co: 0,
    };

    pub fn new(index: u16, co: u16) -> CCoord {
        CCoord {
            cp: CPerm16::new(index, 0),
            co,
        }
    }

    pub fn from_cube(tables: &CornerTables, c: Cube) -> CCoord {
        let cp = tables.cperm.from_cube(&tables.syms, c);
        let co = tables.corient.symi(c.corner_orient(), cp.sym());
        CCoord { cp, co }
    }

    /// Materializes the corner state; edges stay identity.
    pub fn cube(self, tables: &CornerTables) -> Cube {
        Cube::IDENTITY
            .with_corner_perm(tables.cperm.rep(self.cp))
            .with_corner_orient(self.co)
            .sym(self.cp.sym())
    }

    pub fn is_solved(self) -> bool {
        self.co == 0 && self.cp.index() == 0
    }

    pub fn index(self) -> u16 {
        self.cp.index()
    }

    pub fn orient(self) -> u16 {
        self.co
    }

    pub fn sym(self) -> u8 {
        self.cp.sym()
    }

    /// The true permutation rank and orientation, undoing the frame.
    pub fn real(self, tables: &CornerTables) -> (u16, u16) {
        let rank = tables.cperm.real(self.cp);
        let orient = tables
            .corient
            .symi(self.co, tables.syms.inv(self.cp.sym()));
        (rank, orient)
    }

    /// Row in the corner pruning table.
    pub fn prune_index(self) -> usize {
        self.cp.index() as usize * N_CORIENT + self.co as usize
    }

    #[must_use]
    pub fn mv(self, tables: &CornerTables, m: Move) -> CCoord {
        let (cp, m, s) = tables.cperm.move_ex(&tables.syms, self.cp, m);
        CCoord {
            cp,
            co: tables.corient.movei(self.co, m, s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::N_CPERM;

    fn random_corner_cube() -> Cube {
        let cp = fastrand::u16(..N_CPERM as u16);
        let co = fastrand::u16(..N_CORIENT as u16);
        Cube::IDENTITY.with_corner_perm(cp).with_corner_orient(co)
    }

    #[test]
    fn ccoord_round_trips_through_cube() {
        let tables = CornerTables::generate();
        fastrand::seed(23);
        for _ in 0..100 {
            let c = random_corner_cube();
            let cc = CCoord::from_cube(&tables, c);
            assert_eq!(cc.cube(&tables), c);
            assert_eq!(CCoord::from_cube(&tables, cc.cube(&tables)), cc);
        }
    }

    #[test]
    fn ccoord_moves_match_cube_moves() {
        let tables = CornerTables::generate();
        fastrand::seed(29);
        for _ in 0..50 {
            let c = random_corner_cube();
            let mut cc = CCoord::from_cube(&tables, c);
            let mut reference = c;
            for _ in 0..10 {
                let m = Move::new(fastrand::u8(..18));
                cc = cc.mv(&tables, m);
                // Moves permute corners of the edge-identity cube, so
                // compare corner projections only.
                reference = reference.mv(m);
                let materialized = cc.cube(&tables);
                assert_eq!(materialized.corner_perm(), reference.corner_perm());
                assert_eq!(materialized.corner_orient(), reference.corner_orient());
            }
        }
    }

    #[test]
    fn ccoord_real_undoes_the_frame() {
        let tables = CornerTables::generate();
        fastrand::seed(31);
        for _ in 0..100 {
            let c = random_corner_cube();
            let cc = CCoord::from_cube(&tables, c);
            assert_eq!(cc.real(&tables), (c.corner_perm(), c.corner_orient()));
        }
    }

    #[test]
    fn ccoord_solved_is_identity() {
        let tables = CornerTables::generate();
        assert!(CCoord::from_cube(&tables, Cube::IDENTITY).is_solved());
        assert!(CCoord::SOLVED.is_solved());
        assert_eq!(CCoord::SOLVED.cube(&tables), Cube::IDENTITY);
    }

    #[test]
    fn ccoord_prune_index_is_dense() {
        let tables = CornerTables::generate();
        fastrand::seed(37);
        for _ in 0..100 {
            let cc = CCoord::from_cube(&tables, random_corner_cube());
            assert!(cc.prune_index() < cperm::N_CPERM16 * N_CORIENT);
        }
    }

    #[test]
    #[ignore = "builds or loads the 840 MB edge permutation tables"]
    fn ecoord_round_trips_and_moves() {
        let tables = Tables::load_or_generate();
        fastrand::seed(41);
        for _ in 0..50 {
            let start = Cube::IDENTITY
                .with_edge_perm(fastrand::u32(..crate::cube::N_EPERM as u32))
                .with_edge_orient(fastrand::u16(..N_EORIENT as u16));
            let ec = ECoord::from_cube(&tables, start);
            assert_eq!(ECoord::from_cube(&tables, ec.cube(&tables)), ec);

            let mut ec = ec;
            let mut reference = start;
            for _ in 0..10 {
                let m = Move::new(fastrand::u8(..18));
                ec = ec.mv(&tables, m);
                reference = reference.mv(m);
                let materialized = ec.cube(&tables);
                assert_eq!(materialized.edge_perm(), reference.edge_perm());
                assert_eq!(materialized.edge_orient(), reference.edge_orient());
            }
        }
    }
}
