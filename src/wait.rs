//! Foreground waiter: blocks the shell until a foreground job drains.

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

use crate::job::JobTable;
use crate::terminal;

/// Wait for every member of `job_id`, restricted to its process group.
///
/// The job may also drain through the asynchronous reap path, so ECHILD
/// here is normal loop termination, not an error. Terminal ownership goes
/// back to the shell no matter how the job ended.
pub fn wait_foreground(table: &mut JobTable, job_id: u32) {
    let Some(job) = table.find_by_id(job_id) else {
        eprintln!("jobsh: job {} not found", job_id);
        terminal::reclaim();
        return;
    };
    let pgid = job.pgid();

    loop {
        match table.find_by_id(job_id) {
            Some(job) if job.remaining_processes() > 0 => {}
            _ => break,
        }
        match waitpid(Pid::from_raw(-pgid.as_raw()), None) {
            Ok(WaitStatus::Exited(pid, _)) | Ok(WaitStatus::Signaled(pid, _, _)) => {
                if let Some(job) = table.find_by_id_mut(job_id) {
                    if !job.remove_pid(pid) {
                        eprintln!("jobsh: pid {} is not a member of job {}", pid, job_id);
                    }
                }
            }
            Ok(WaitStatus::StillAlive) => continue,
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => break,
            Err(err) => {
                eprintln!("jobsh: waitpid: {}", err);
                break;
            }
        }
    }

    if table
        .find_by_id(job_id)
        .is_some_and(|job| job.remaining_processes() == 0)
    {
        table.delete(job_id);
    }
    terminal::reclaim();
}
