use crate::CoreError;
use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Install a Ctrl-C handler that asks in-flight downloads and cleanup to
/// stop at their next checkpoint. A second Ctrl-C exits immediately.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            std::process::exit(130);
        }
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
        eprintln!("\nshutdown requested, finishing current operation...");
    });
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

/// Fail with [`CoreError::Cancelled`] once a shutdown was requested, so no
/// new download or layer contribution starts.
pub fn ensure_not_cancelled() -> Result<(), CoreError> {
    if shutdown_requested() {
        Err(CoreError::Cancelled)
    } else {
        Ok(())
    }
}
