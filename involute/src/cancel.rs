//! Cooperative cancellation on termination signals.
//!
//! A [`CancelToken`] is created at startup and handed down the call chain;
//! long runs poll it at coset boundaries and between recursion levels, so
//! a signal never interrupts a half-written database record. The signal
//! handler only performs an atomic store into the installed token; a
//! second signal during shutdown sets the same flag again, it never kills
//! the process mid-write.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

// The token the signal handler reports into. Written once by install,
// read from the handler, intentionally leaked for the process lifetime.
static HOOK: AtomicPtr<AtomicBool> = AtomicPtr::new(std::ptr::null_mut());

extern "C" fn sig_terminate(_sig: libc::c_int) {
    let flag = HOOK.load(Ordering::Acquire);
    if !flag.is_null() {
        // SAFETY: install leaked the Arc this points into, so the flag
        // outlives every signal delivery.
        unsafe { (*flag).store(true, Ordering::Relaxed) };
    }
}

/// A shared cancellation flag, set by termination signals or [`cancel`].
///
/// [`cancel`]: CancelToken::cancel
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Routes SIGHUP, SIGINT, SIGTERM and SIGQUIT to this token.
    pub fn install_signals(&self) {
        HOOK.store(
            Arc::into_raw(Arc::clone(&self.0)).cast_mut(),
            Ordering::Release,
        );
        // SAFETY: the handler only performs atomic loads and stores, which
        // are async-signal-safe, and the sigaction struct is fully
        // initialized.
        unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = sig_terminate as usize;
            for sig in [libc::SIGHUP, libc::SIGINT, libc::SIGTERM, libc::SIGQUIT] {
                libc::sigaction(sig, &sa, std::ptr::null_mut());
            }
        }
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once any termination signal has been received.
    pub fn canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
