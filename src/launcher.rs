//! Process launcher (spec §4.2): fork, reset inherited signal disposition,
//! install redirections, join a process group, exec.
//!
//! Built on `std::process::Command`, which already performs the PATH search
//! spec.md names as an out-of-scope external collaborator (§1) and already
//! handles dup'ing the given `Stdio` onto the child's stdin/stdout and
//! closing the parent's copies once spawned — so steps 3–4 of spec §4.2's
//! child protocol are the standard library's job, not ours. What this module
//! adds on top is the race-free process-group protocol (step on both sides
//! of `fork`) and the signal-disposition reset children need before exec.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

use crate::job_control;

/// Signals the shell disables for itself (spec §6) and which must be reset
/// to `SIG_DFL` in every child before exec — `SIG_IGN` survives `execve`, so
/// without this reset external commands would also ignore Ctrl-Z etc.
const RESET_SIGNALS: [libc::c_int; 3] = [libc::SIGTSTP, libc::SIGTTIN, libc::SIGTTOU];

/// One pipeline stage about to be launched.
pub struct LaunchSpec<'a> {
    pub argv: &'a [String],
    /// `None` ⇒ this is the first stage: it becomes its own group leader.
    /// `Some(pgid)` ⇒ join that existing group.
    pub pgid: Option<libc::pid_t>,
    pub stdin: Stdio,
    pub stdout: Stdio,
}

/// Spawn one stage. Returns the child and the process-group id it ended up
/// in (freshly allocated from its own pid when `spec.pgid` was `None`).
pub fn launch(spec: LaunchSpec) -> io::Result<(Child, libc::pid_t)> {
    let (program, args) = spec
        .argv
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty argv"))?;

    let mut command = Command::new(program);
    command.args(args).stdin(spec.stdin).stdout(spec.stdout);

    // Snapshot before the closure so it captures plain data, not `self`.
    let target_pgid = spec.pgid;
    unsafe {
        command.pre_exec(move || {
            // Step 1: a child never inherits the shell's transient
            // SIGCHLD-blocked mask from a critical section racing with fork.
            let mut empty: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut empty);
            libc::sigprocmask(libc::SIG_SETMASK, &empty, std::ptr::null_mut());

            // Step 2: restore job-control signals to default disposition.
            for &sig in &RESET_SIGNALS {
                if libc::signal(sig, libc::SIG_DFL) == libc::SIG_ERR {
                    return Err(io::Error::last_os_error());
                }
            }

            // Child-side half of the double setpgid call (spec §4.2): join
            // `target_pgid` if given, else become a fresh group leader.
            let pgid = target_pgid.unwrap_or(0);
            if libc::setpgid(0, pgid) != 0 {
                return Err(io::Error::last_os_error());
            }

            Ok(())
        });
    }

    let child = command.spawn()?;
    let child_pid = child.id() as libc::pid_t;

    // Parent-side half of the double setpgid call: whichever of parent and
    // child runs first, the outcome is the same group membership.
    let resolved_pgid = target_pgid.unwrap_or(child_pid);
    job_control::set_process_group(child_pid, resolved_pgid)?;

    Ok((child, resolved_pgid))
}
