//! Progress reporting over the result database.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::tracker::{MAX_DEPTH, Tracker};

/// Known number of involutions per optimal solution length, modulo
/// symmetry. A finished database reproduces this histogram exactly.
pub const EXPECTED: [u64; MAX_DEPTH + 1] = [
    1,
    1,
    1,
    2,
    4,
    25,
    41,
    292,
    506,
    3_501,
    7_741,
    45_543,
    146_698,
    700_019,
    3_500_419,
    19_478_862,
    130_385_528,
    778_842_829,
    2_184_417_694,
    445_145_591,
    10_842,
];

/// Sums the per-coset length histograms.
pub fn counts(tracker: &Tracker) -> [u64; MAX_DEPTH + 1] {
    let mut counts = [0u64; MAX_DEPTH + 1];
    for idx in 0..tracker.n_cosets() {
        let h = tracker.header(idx);
        for (d, n) in h.n_length.iter().enumerate() {
            counts[d] += u64::from(*n);
        }
    }
    counts
}

pub fn show(counts: &[u64; MAX_DEPTH + 1]) {
    for (d, (&n, &expected)) in counts.iter().zip(&EXPECTED).enumerate() {
        println!("{d:2} {n:10} / {expected}");
    }
}

pub fn show_counts(tracker: &Tracker) {
    show(&counts(tracker));
}

struct Counters {
    done: usize,
    stopped: bool,
}

struct State {
    tracker: Arc<Tracker>,
    total: usize,
    counters: Mutex<Counters>,
    stop: Condvar,
}

impl State {
    fn run(&self) {
        let mut guard = self.counters.lock().unwrap();
        loop {
            let done = guard.done;
            let stopped = guard.stopped;
            drop(guard);

            println!("\nCosets: {done}/{}", self.total);
            show_counts(&self.tracker);
            if stopped {
                return;
            }

            guard = self.counters.lock().unwrap();
            if !guard.stopped {
                guard = self
                    .stop
                    .wait_timeout(guard, Duration::from_secs(5))
                    .unwrap()
                    .0;
            }
        }
    }
}

/// A background thread that prints the database histogram and a coset
/// counter every five seconds until stopped. Stopping prints one final
/// report, so short runs still show their result.
pub struct Progress {
    state: Arc<State>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Progress {
    pub fn start(tracker: Arc<Tracker>, total: usize) -> Progress {
        let state = Arc::new(State {
            tracker,
            total,
            counters: Mutex::new(Counters {
                done: 0,
                stopped: false,
            }),
            stop: Condvar::new(),
        });
        let worker = thread::spawn({
            let state = Arc::clone(&state);
            move || state.run()
        });
        Progress {
            state,
            worker: Some(worker),
        }
    }

    /// Marks one more coset as processed.
    pub fn increment(&self) {
        self.state.counters.lock().unwrap().done += 1;
    }

    pub fn stop(&mut self) {
        self.state.counters.lock().unwrap().stopped = true;
        self.state.stop.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.stop();
    }
}
