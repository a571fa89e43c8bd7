//! SIGINT/SIGTERM handling.
//!
//! The handler only flips an atomic; `main` polls it alongside the monitor's
//! liveness flag and does the actual shutdown on its own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn request_shutdown(_signal: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

pub fn install() {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        let handler = request_shutdown as extern "C" fn(libc::c_int) as libc::sighandler_t;
        // SAFETY: the handler only stores to a static atomic, which is
        // async-signal-safe, and has the C ABI signal(2) expects.
        let previous = unsafe { libc::signal(signal, handler) };
        if previous == libc::SIG_ERR {
            warn!(signal, "Failed to install signal handler");
        }
    }
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}
