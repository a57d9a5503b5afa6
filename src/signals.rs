//! Signal front-end for the shell.
//!
//! Handlers do the absolute minimum: set a one-bit flag. Everything else
//! (reaping, interrupt delivery) happens later on the main control path,
//! see [`crate::reap`]. Components doing multi-step job-table mutations
//! hold a [`MaskGuard`] so a handler cannot re-enter mid-mutation.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{
    sigaction, sigprocmask, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal,
};

/// Flag indicating SIGCHLD was received (set by signal handler)
static SIGCHLD_PENDING: AtomicBool = AtomicBool::new(false);

/// Flag indicating SIGINT was received (set by signal handler)
static SIGINT_PENDING: AtomicBool = AtomicBool::new(false);

/// Set up signal handlers for the shell
pub fn install() {
    use signal_hook::{consts, low_level};

    // Register handlers that only set the flags
    unsafe {
        if low_level::register(consts::SIGCHLD, || {
            SIGCHLD_PENDING.store(true, Ordering::SeqCst)
        })
        .is_err()
        {
            crate::fatal("failed to install SIGCHLD handler");
        }
        if low_level::register(consts::SIGINT, || {
            SIGINT_PENDING.store(true, Ordering::SeqCst)
        })
        .is_err()
        {
            crate::fatal("failed to install SIGINT handler");
        }
    }

    // Reclaiming the terminal from a finished job raises SIGTTOU; the
    // shell must not be stopped by its own reclaim.
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    unsafe {
        let _ = sigaction(Signal::SIGTTOU, &ignore);
    }
}

pub fn sigchld_pending() -> bool {
    SIGCHLD_PENDING.load(Ordering::SeqCst)
}

/// Check if SIGCHLD was received and clear the flag
pub fn take_sigchld() -> bool {
    SIGCHLD_PENDING.swap(false, Ordering::SeqCst)
}

pub fn sigint_pending() -> bool {
    SIGINT_PENDING.load(Ordering::SeqCst)
}

/// Check if SIGINT was received and clear the flag
pub fn take_sigint() -> bool {
    SIGINT_PENDING.swap(false, Ordering::SeqCst)
}

/// Process-level signal mask, released on drop.
///
/// Everything runs on one logical thread; the mask only serializes a
/// section of code against asynchronous re-entry by its own handler.
pub struct MaskGuard {
    set: SigSet,
}

impl Drop for MaskGuard {
    fn drop(&mut self) {
        if let Err(err) = sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&self.set), None) {
            crate::fatal(&format!("sigprocmask(SIG_UNBLOCK): {}", err));
        }
    }
}

/// Block the given signals until the guard drops.
pub fn mask(signals: &[Signal]) -> MaskGuard {
    let mut set = SigSet::empty();
    for sig in signals {
        set.add(*sig);
    }
    if let Err(err) = sigprocmask(SigmaskHow::SIG_BLOCK, Some(&set), None) {
        crate::fatal(&format!("sigprocmask(SIG_BLOCK): {}", err));
    }
    MaskGuard { set }
}

/// Block both launch-critical signals: a premature reap or interrupt must
/// not race job registration.
pub fn mask_launch() -> MaskGuard {
    mask(&[Signal::SIGCHLD, Signal::SIGINT])
}

/// Clear the launch mask in a forked child. The guard's drop never runs
/// past exec, so the child undoes the inherited mask by hand.
pub fn unmask_in_child() {
    let mut set = SigSet::empty();
    set.add(Signal::SIGCHLD);
    set.add(Signal::SIGINT);
    let _ = sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&set), None);
}

/// Reset dispositions a child must not inherit from the shell: the Rust
/// runtime ignores SIGPIPE process-wide, and the shell ignores SIGTTOU.
pub fn restore_default_dispositions() {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for sig in [
        Signal::SIGINT,
        Signal::SIGQUIT,
        Signal::SIGTSTP,
        Signal::SIGTTIN,
        Signal::SIGTTOU,
        Signal::SIGCHLD,
        Signal::SIGPIPE,
    ] {
        unsafe {
            let _ = sigaction(sig, &default);
        }
    }
}
