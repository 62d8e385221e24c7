//! End-to-end scenarios over a scratch database.
//!
//! The whole lifecycle runs as one test because the table directory is
//! process-global: create the database, solve the shallow depths, replay
//! neighbor transfer, and exercise cancellation and resume. Building the
//! edge tables and the shared pruning index dominates the runtime.

use std::sync::Arc;

use involute::Outcome;
use involute::cancel::CancelToken;
use involute::catalog::Catalog;
use involute::coords::{CCoord, Tables};
use involute::cube::Cube;
use involute::moves::MoveSeq;
use involute::prune::corner::PrunePool;
use involute::prune::edge::EdgePrune;
use involute::status::{EXPECTED, Progress, counts};
use involute::tracker::{Tracker, TrackerError};
use involute::{neighbor, solver, tables};

#[test_log::test]
#[ignore = "builds the full tables, the shared pruning index, and a sparse database"]
fn database_lifecycle_end_to_end() {
    let scratch = std::env::temp_dir().join(format!("involute-test-{}", std::process::id()));
    std::fs::create_dir_all(&scratch).unwrap();
    tables::set_dir(scratch.clone());

    let tables = Tables::load_or_generate();
    let catalog = Catalog::generate(&tables);
    let edge = EdgePrune::attach(&tables).unwrap();

    Tracker::create(&tables, &catalog, &edge).unwrap();
    assert!(matches!(
        Tracker::create(&tables, &catalog, &edge),
        Err(TrackerError::Exists)
    ));

    let tracker = Arc::new(Tracker::open().unwrap());
    tracker.lock();

    // The identity coset starts at a floor of zero and its only depth-0
    // member is the identity itself, solved by the empty word.
    let identity = (0..tracker.n_cosets())
        .find(|&idx| tracker.header(idx).ec().is_solved())
        .unwrap();
    {
        let cprunes = PrunePool::default();
        let cancel = CancelToken::new();
        let mut handle = tracker.handle(identity, &tables, &catalog);
        assert_eq!(handle.proven_min(), 0);
        solver::solve_coset(&tables, &catalog, &edge, &cprunes, &cancel, &mut handle, 0);
        assert_eq!(handle.n_solved(), 1);
        assert!(handle.proven_min() >= 1);
    }
    let sols = tracker.solutions(identity);
    assert_eq!(sols.len(), 1);
    assert!(sols[0].is_empty());

    // Solving everything to depth 5 completes the histogram prefix.
    let cancel = CancelToken::new();
    let mut progress = Progress::start(Arc::clone(&tracker), tracker.n_cosets());
    let outcome = solver::solve_all(&tables, &catalog, &edge, &tracker, 5, &cancel, &progress);
    progress.stop();
    assert_eq!(outcome, Outcome::Done);

    let after_five = counts(&tracker);
    assert_eq!(after_five[..6], EXPECTED[..6]);
    for idx in 0..tracker.n_cosets() {
        assert!(tracker.header(idx).proven_min >= 6);
    }

    // A non-canonical word is stored canonically. Rebuild one solved
    // involution's word with redundant turns and replay it after a reset.
    let witness = (0..tracker.n_cosets())
        .find(|&idx| {
            tracker
                .solutions(idx)
                .iter()
                .any(|s| s.len() == tracker.header(idx).prune as usize && !s.is_empty())
        })
        .unwrap();
    let word = tracker
        .solutions(witness)
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap();
    let mut padded = MoveSeq::new();
    for m in word.iter() {
        padded.push(m);
        padded.push(m.inverse());
        padded.push(m);
    }
    assert_eq!(padded.canonical(), word.canonical());

    tracker.reset(witness);
    {
        let mut handle = tracker.handle(witness, &tables, &catalog);
        assert_eq!(handle.n_solved(), 0);
        assert!(handle.record(&padded));
    }
    let replayed = tracker.solutions(witness);
    assert_eq!(replayed, vec![word.canonical()]);

    // Restore the coset before the global checks below.
    tracker.reset(witness);
    {
        let cprunes = PrunePool::default();
        let cancel = CancelToken::new();
        let mut handle = tracker.handle(witness, &tables, &catalog);
        solver::solve_coset(&tables, &catalog, &edge, &cprunes, &cancel, &mut handle, 5);
    }
    assert_eq!(counts(&tracker)[..6], EXPECTED[..6]);

    // Neighbor transfer only ever adds solutions at a coset's exact
    // proven floor; the completed prefix must survive untouched.
    let before = counts(&tracker);
    let cancel = CancelToken::new();
    let mut progress = Progress::start(Arc::clone(&tracker), tracker.n_cosets());
    let outcome = neighbor::propagate_all(&tables, &catalog, &tracker, &cancel, &progress);
    progress.stop();
    assert_eq!(outcome, Outcome::Done);

    let after_transfer = counts(&tracker);
    assert_eq!(after_transfer[..6], EXPECTED[..6]);
    for (a, b) in before.iter().zip(&after_transfer) {
        assert!(a <= b);
    }

    // A canceled run stops between cosets without corrupting anything; a
    // rerun converges to the complete depth-6 histogram.
    let canceled = CancelToken::new();
    canceled.cancel();
    let mut progress = Progress::start(Arc::clone(&tracker), tracker.n_cosets());
    let outcome = solver::solve_all(&tables, &catalog, &edge, &tracker, 6, &canceled, &progress);
    progress.stop();
    assert_eq!(outcome, Outcome::Canceled);
    assert_eq!(counts(&tracker)[..6], EXPECTED[..6]);

    let cancel = CancelToken::new();
    let mut progress = Progress::start(Arc::clone(&tracker), tracker.n_cosets());
    let outcome = solver::solve_all(&tables, &catalog, &edge, &tracker, 6, &cancel, &progress);
    progress.stop();
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(counts(&tracker)[..7], EXPECTED[..7]);

    // Every stored word squares to the identity.
    for idx in (0..tracker.n_cosets()).step_by(9973) {
        for sol in tracker.solutions(idx) {
            let c = Cube::from_moves(&sol);
            assert_eq!(c * c, Cube::IDENTITY);
            let cc = CCoord::from_cube(&tables.corner, c);
            let handle = tracker.handle(idx, &tables, &catalog);
            assert!(!handle.is_unsolved(cc));
        }
    }
}
