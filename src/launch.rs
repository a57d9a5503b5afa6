//! Process launcher: turns a token sequence into a registered job.
//!
//! Both entry points share one protocol, and the protocol is what makes
//! asynchronous reaping safe: SIGCHLD and SIGINT are masked, a rendezvous
//! pipe is created, children are forked into the job's process group and
//! held on a one-byte read, and only after the job is fully registered
//! (and, for a foreground job, the terminal handed over) is the byte
//! broadcast and the mask released. A child can therefore never be reaped
//! or signaled before the job table knows about it.

use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::process;

use libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::sys::signal::{kill, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::waitpid;
use nix::unistd::{close, dup2, execvp, fork, pipe, read, setpgid, write, ForkResult, Pid};
use thiserror::Error;

use crate::builtins::{self, Builtin};
use crate::job::{JobState, JobTable};
use crate::lexer::Token;
use crate::signals;
use crate::terminal;
use crate::wait;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("job table full")]
    TableFull,
    #[error("job registration failed")]
    Register,
    #[error("missing filename after redirection")]
    RedirectTarget,
    #[error("empty pipeline stage")]
    EmptyStage,
    #[error("stray '&' in command")]
    StrayBackground,
    #[error("{call}: {errno}")]
    Sys { call: &'static str, errno: Errno },
}

fn sys(call: &'static str) -> impl Fn(Errno) -> LaunchError {
    move |errno| LaunchError::Sys { call, errno }
}

/// One pipeline stage: argv plus at most one stdin and one stdout
/// redirect. A redirection token consumes the following word as its
/// filename instead of passing it as an argument.
#[derive(Debug, Default, PartialEq, Eq)]
struct Stage {
    argv: Vec<String>,
    stdin: Option<String>,
    stdout: Option<String>,
}

impl Stage {
    fn builtin(&self) -> Option<Builtin> {
        builtins::lookup(&self.argv[0])
    }
}

fn split_stages(tokens: &[Token]) -> Vec<&[Token]> {
    tokens.split(|t| matches!(t, Token::Pipe)).collect()
}

fn parse_stage(tokens: &[Token]) -> Result<Stage, LaunchError> {
    let mut stage = Stage::default();
    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        match token {
            Token::Word(w) => stage.argv.push(w.clone()),
            Token::RedirectIn | Token::RedirectOut => {
                let Some(Token::Word(name)) = iter.next() else {
                    return Err(LaunchError::RedirectTarget);
                };
                if matches!(token, Token::RedirectIn) {
                    stage.stdin = Some(name.clone());
                } else {
                    stage.stdout = Some(name.clone());
                }
            }
            Token::Background => return Err(LaunchError::StrayBackground),
            Token::Pipe => unreachable!("stages are split on pipes"),
        }
    }
    if stage.argv.is_empty() {
        return Err(LaunchError::EmptyStage);
    }
    Ok(stage)
}

/// Launch a command line: a single command or an N-stage pipeline.
///
/// Returns the job id. For a foreground launch the job is usually gone
/// from the table again by the time this returns, fully reaped by the
/// foreground waiter.
pub fn launch(table: &mut JobTable, tokens: &[Token], background: bool) -> Result<u32, LaunchError> {
    let mut stages = split_stages(tokens)
        .into_iter()
        .map(parse_stage)
        .collect::<Result<Vec<_>, _>>()?;

    if stages.len() == 1 {
        launch_single(table, stages.remove(0), background)
    } else {
        launch_pipeline(table, stages, background)
    }
}

fn launch_single(table: &mut JobTable, stage: Stage, background: bool) -> Result<u32, LaunchError> {
    let mask = signals::mask_launch();
    let (sync_r, sync_w) = pipe().map_err(sys("pipe"))?;

    let child = match unsafe { fork() }.map_err(sys("fork"))? {
        ForkResult::Child => {
            drop(sync_w);
            // Own process group first, then hold until the parent has
            // registered the job and handed over the terminal.
            if let Err(err) = setpgid(Pid::from_raw(0), Pid::from_raw(0)) {
                eprintln!("jobsh: setpgid: {}", err);
                process::exit(1);
            }
            hold_rendezvous(&sync_r);
            drop(sync_r);
            exec_stage(&stage)
        }
        ForkResult::Parent { child } => child,
    };
    drop(sync_r);

    let job_id = match register_job(table, child, &[child], background) {
        Ok(id) => id,
        Err((partial, err)) => {
            abort_launch(table, partial, &[child], background);
            return Err(err);
        }
    };
    if !background {
        terminal::give_to(child);
    }
    if let Err(err) = release_children(&sync_w, 1) {
        abort_launch(table, Some(job_id), &[child], background);
        return Err(err);
    }
    drop(sync_w);
    drop(mask);

    finish_launch(table, job_id, child, background);
    Ok(job_id)
}

fn launch_pipeline(
    table: &mut JobTable,
    stages: Vec<Stage>,
    background: bool,
) -> Result<u32, LaunchError> {
    let n = stages.len();
    let mask = signals::mask_launch();
    let (sync_r, sync_w) = pipe().map_err(sys("pipe"))?;

    // Pipe i connects stage i's stdout to stage i+1's stdin.
    let mut pipes: Vec<(OwnedFd, OwnedFd)> = Vec::with_capacity(n - 1);
    for _ in 0..n - 1 {
        pipes.push(pipe().map_err(sys("pipe"))?);
    }

    let mut pids: Vec<Pid> = Vec::with_capacity(n);
    for (i, stage) in stages.iter().enumerate() {
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                let group = if i == 0 { None } else { Some(pids[0]) };
                pipeline_child(i, stage, &pipes, &sync_r, &sync_w, group)
            }
            Ok(ForkResult::Parent { child }) => pids.push(child),
            Err(errno) => {
                abort_launch(table, None, &pids, background);
                return Err(sys("fork")(errno));
            }
        }
    }
    drop(pipes);
    drop(sync_r);

    let pgid = pids[0];
    let job_id = match register_job(table, pgid, &pids, background) {
        Ok(id) => id,
        Err((partial, err)) => {
            abort_launch(table, partial, &pids, background);
            return Err(err);
        }
    };
    if !background {
        terminal::give_to(pgid);
    }
    if let Err(err) = release_children(&sync_w, n) {
        abort_launch(table, Some(job_id), &pids, background);
        return Err(err);
    }
    drop(sync_w);
    drop(mask);

    finish_launch(table, job_id, pgid, background);
    Ok(job_id)
}

/// Parent-side registration: the job and all member PIDs enter the table
/// before any child is released. On failure the partially allocated id is
/// handed back so the caller can unwind it.
fn register_job(
    table: &mut JobTable,
    pgid: Pid,
    pids: &[Pid],
    background: bool,
) -> Result<u32, (Option<u32>, LaunchError)> {
    let state = if background {
        JobState::Background
    } else {
        JobState::Foreground
    };
    let Some(job) = table.allocate(pgid, pids.len(), state) else {
        return Err((None, LaunchError::TableFull));
    };
    let job_id = job.job_id();
    for &pid in pids {
        // The child enters the group on its own, too; either side may
        // lose that race.
        let _ = setpgid(pid, pgid);
        if !job.add_pid(pid) {
            return Err((Some(job_id), LaunchError::Register));
        }
    }
    Ok(job_id)
}

/// Broadcast the handshake byte, one per child.
fn release_children(sync_w: &OwnedFd, count: usize) -> Result<(), LaunchError> {
    for _ in 0..count {
        write(sync_w, &[0u8]).map_err(sys("write"))?;
    }
    Ok(())
}

/// Unwind a failed launch so no partial state survives: children are
/// killed and collected while SIGCHLD is still masked, the partial job is
/// dropped, and a foreground transfer is undone.
fn abort_launch(table: &mut JobTable, job_id: Option<u32>, pids: &[Pid], background: bool) {
    for &pid in pids {
        let _ = kill(pid, Signal::SIGKILL);
    }
    for &pid in pids {
        let _ = waitpid(pid, None);
    }
    if let Some(id) = job_id {
        table.delete(id);
    }
    if !background {
        terminal::reclaim();
    }
}

fn finish_launch(table: &mut JobTable, job_id: u32, pgid: Pid, background: bool) {
    if background {
        println!(
            "[{}] Process group: {} running in the background",
            job_id, pgid
        );
    } else {
        wait::wait_foreground(table, job_id);
    }
}

/// Child side of stage `i` of an N-stage pipeline: wire the pipe ends
/// onto stdin/stdout, shed every pipe fd, enter the job's process group,
/// then hold at the rendezvous.
fn pipeline_child(
    i: usize,
    stage: &Stage,
    pipes: &[(OwnedFd, OwnedFd)],
    sync_r: &OwnedFd,
    sync_w: &OwnedFd,
    group: Option<Pid>,
) -> ! {
    let _ = close(sync_w.as_raw_fd());

    if i > 0 && dup2(pipes[i - 1].0.as_raw_fd(), STDIN_FILENO).is_err() {
        process::exit(1);
    }
    if i < pipes.len() && dup2(pipes[i].1.as_raw_fd(), STDOUT_FILENO).is_err() {
        process::exit(1);
    }
    for (r, w) in pipes {
        let _ = close(r.as_raw_fd());
        let _ = close(w.as_raw_fd());
    }

    // The first stage leads the group; later stages join it.
    let target = group.unwrap_or_else(|| Pid::from_raw(0));
    if let Err(err) = setpgid(Pid::from_raw(0), target) {
        eprintln!("jobsh: setpgid: {}", err);
        process::exit(1);
    }

    hold_rendezvous(sync_r);
    let _ = close(sync_r.as_raw_fd());
    exec_stage(stage)
}

/// Block until the parent has registered the job. The read returns once
/// the handshake byte arrives.
fn hold_rendezvous(fd: &OwnedFd) {
    let mut byte = [0u8; 1];
    loop {
        match read(fd.as_raw_fd(), &mut byte) {
            Ok(_) => return,
            Err(Errno::EINTR) => continue,
            Err(_) => process::exit(1),
        }
    }
}

/// Final act of every child: clear the inherited launch mask, restore
/// default dispositions, apply file redirections over whatever the pipe
/// wiring left on stdin/stdout, then run the stage. Never returns.
fn exec_stage(stage: &Stage) -> ! {
    signals::unmask_in_child();
    signals::restore_default_dispositions();
    apply_redirects(stage);

    if let Some(builtin) = stage.builtin() {
        // A built-in forked as a pipeline stage is isolated: it observes
        // its redirections but cannot move or stop the shell itself.
        match builtins::run(builtin, &stage.argv[1..], true) {
            Ok(()) => process::exit(0),
            Err(err) => {
                eprintln!("jobsh: {}", err);
                process::exit(1);
            }
        }
    }

    let argv: Vec<CString> = stage
        .argv
        .iter()
        .filter_map(|arg| CString::new(arg.as_str()).ok())
        .collect();
    if argv.len() != stage.argv.len() {
        eprintln!("jobsh: argument contains a NUL byte");
        process::exit(1);
    }
    if let Err(err) = execvp(&argv[0], &argv) {
        eprintln!("jobsh: {}: {}", stage.argv[0], err);
    }
    process::exit(127);
}

fn apply_redirects(stage: &Stage) {
    if let Some(path) = &stage.stdin {
        redirect_fd(path, OFlag::O_RDONLY, STDIN_FILENO);
    }
    if let Some(path) = &stage.stdout {
        redirect_fd(
            path,
            OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
            STDOUT_FILENO,
        );
    }
}

fn redirect_fd(path: &str, flags: OFlag, target: RawFd) {
    let fd = match open(path, flags, Mode::from_bits_truncate(0o644)) {
        Ok(fd) => fd,
        Err(err) => {
            eprintln!("jobsh: {}: {}", path, err);
            process::exit(1);
        }
    };
    if dup2(fd, target).is_err() {
        eprintln!("jobsh: dup2 failed for {}", path);
        process::exit(1);
    }
    let _ = close(fd);
}
