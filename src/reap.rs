//! Deferred signal processing.
//!
//! The signal front-end only records that something happened; this module
//! does the real work on the main control path, once per loop iteration.
//! Each procedure masks its own signal while it runs and clears the flag
//! before the mask drops, so an occurrence during processing re-raises
//! the flag instead of getting lost.

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::job::{JobState, JobTable};
use crate::signals;

/// A background job that drained through the asynchronous path, pending
/// announcement. Announcing is the main loop's concern, not the engine's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedJob {
    pub job_id: u32,
    pub pgid: Pid,
}

/// Run both deferred procedures if their flags are up.
pub fn process_pending(table: &mut JobTable) -> Vec<FinishedJob> {
    let mut finished = Vec::new();

    if signals::sigchld_pending() {
        let _mask = signals::mask(&[Signal::SIGCHLD]);
        signals::take_sigchld();
        finished = reap_now(table);
    }

    if signals::sigint_pending() {
        let _mask = signals::mask(&[Signal::SIGINT]);
        signals::take_sigint();
        interrupt_foreground(table);
    }

    finished
}

/// Drain every terminated child without blocking, updating the table.
///
/// A reaped PID with no owning job means a process was running before its
/// job was registered; the table can no longer be trusted and the shell
/// terminates rather than corrupt it further.
pub fn reap_now(table: &mut JobTable) -> Vec<FinishedJob> {
    let mut finished = Vec::new();
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, _)) | Ok(WaitStatus::Signaled(pid, _, _)) => {
                let (drained, job_id, pgid, announce) = {
                    let Some(job) = table.find_by_pid_mut(pid) else {
                        crate::fatal(&format!("reaped pid {} with no owning job", pid));
                    };
                    (
                        job.remove_pid(pid) && job.remaining_processes() == 0,
                        job.job_id(),
                        job.pgid(),
                        job.state() == JobState::Background,
                    )
                };
                if drained {
                    table.delete(job_id);
                    if announce {
                        finished.push(FinishedJob { job_id, pgid });
                    }
                }
            }
            Ok(WaitStatus::StillAlive) => break,
            Ok(_) => continue,
            Err(Errno::ECHILD) => break,
            Err(Errno::EINTR) => continue,
            Err(err) => {
                eprintln!("jobsh: waitpid: {}", err);
                break;
            }
        }
    }
    finished
}

/// Deliver SIGINT to the foreground job's whole process group. No
/// foreground job, or a group that already exited, drops the signal.
pub fn interrupt_foreground(table: &JobTable) {
    if let Some(job) = table.find_foreground() {
        let _ = killpg(job.pgid(), Signal::SIGINT);
    }
}
