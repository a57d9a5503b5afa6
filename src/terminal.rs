//! Terminal controller: moves controlling-terminal ownership between the
//! shell and a job's process group.
//!
//! Both directions are best-effort. A shell without a controlling
//! terminal (scripts, `-c`, pipes) must stay usable, so failure is
//! reported at most and never aborts a launch.

use std::io;
use std::os::fd::AsFd;

use libc::STDIN_FILENO;
use nix::unistd::{getpgrp, isatty, tcsetpgrp, Pid};

/// Whether the shell is attached to a terminal at all.
pub fn is_interactive() -> bool {
    isatty(STDIN_FILENO).unwrap_or(false)
}

/// Hand the terminal to a job's process group.
pub fn give_to(pgid: Pid) -> bool {
    if !is_interactive() {
        return false;
    }
    let stdin = io::stdin();
    match tcsetpgrp(stdin.as_fd(), pgid) {
        Ok(()) => true,
        Err(err) => {
            eprintln!("jobsh: tcsetpgrp: {}", err);
            false
        }
    }
}

/// Take the terminal back for the shell's own process group.
pub fn reclaim() {
    if !is_interactive() {
        return;
    }
    let stdin = io::stdin();
    let _ = tcsetpgrp(stdin.as_fd(), getpgrp());
}
