//! Worker-thread fan-out for table generation and coset search.

use std::num::NonZeroUsize;
use std::thread;

/// Number of workers used by [`parallel`], one per available core.
pub fn n_workers() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Runs `f(worker)` once per worker concurrently and waits for all of
/// them. Worker ids are `0..n_workers()`; a panic in any worker
/// propagates after the others finish.
pub fn parallel<F>(f: F)
where
    F: Fn(usize) + Sync,
{
    let workers = n_workers();
    thread::scope(|scope| {
        for worker in 0..workers {
            let f = &f;
            scope.spawn(move || f(worker));
        }
    });
}

/// Splits `len` items into `n_workers()` contiguous ranges; the last
/// range absorbs the remainder.
pub fn partition(len: usize, worker: usize) -> std::ops::Range<usize> {
    let workers = n_workers();
    let chunk = len / workers;
    let start = worker * chunk;
    let end = if worker + 1 == workers {
        len
    } else {
        start + chunk
    };
    start..end
}
