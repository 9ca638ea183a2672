//! Low-level POSIX job-control primitives: process groups, the controlling
//! terminal, and signalling a whole group. Kept separate from the state
//! machine (`jobs`/`reaper`) and from the protocols that call them
//! (`launcher`, `pipeline`, `foreground`).

use std::io;

/// `setpgid(pid, pgid)`, retried on `EINTR`. Both the parent and the child
/// call this for the same (pid, pgid) pair — spec §4.2's "double-call"
/// protocol that eliminates the race where a later sibling stage would set
/// its pgid before this child has run a single instruction.
pub fn set_process_group(pid: libc::pid_t, pgid: libc::pid_t) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::setpgid(pid, pgid) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            // The child already exec'd (and reset its own pgid) or is gone;
            // whichever of parent/child won the race, the result is correct.
            Some(libc::EACCES) | Some(libc::ESRCH) => return Ok(()),
            _ => return Err(err),
        }
    }
}

/// Send `signal` to every process in group `pgid` (`kill(-pgid, signal)`).
/// Used for `SIGCONT` (`fg`/`bg`) and `SIGTERM` (`kill %n`, shutdown).
pub fn send_to_group(pgid: libc::pid_t, signal: libc::c_int) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }
    loop {
        let rc = unsafe { libc::kill(-pgid, signal) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// RAII guard: hands the controlling terminal to `target_pgid` on
/// construction, returns it to the shell's own group on drop — "Unconditionally
/// reclaim terminal ownership for the shell's own group" (spec §4.5 step 6).
pub struct ForegroundTerminalGuard {
    tty_fd: Option<libc::c_int>,
    shell_pgid: libc::pid_t,
}

impl ForegroundTerminalGuard {
    pub fn new(tty_fd: libc::c_int, target_pgid: libc::pid_t) -> io::Result<Self> {
        let shell_pgid = unsafe { libc::getpgrp() };
        let guard = ForegroundTerminalGuard {
            tty_fd: Some(tty_fd),
            shell_pgid,
        };
        set_terminal_foreground(tty_fd, target_pgid)?;
        Ok(guard)
    }

    /// A no-op guard for contexts with no controlling terminal (stdin is not
    /// a tty — e.g. the integration tests that pipe commands in).
    pub fn noop() -> Self {
        ForegroundTerminalGuard {
            tty_fd: None,
            shell_pgid: unsafe { libc::getpgrp() },
        }
    }
}

impl Drop for ForegroundTerminalGuard {
    fn drop(&mut self) {
        if let Some(fd) = self.tty_fd {
            let _ = set_terminal_foreground(fd, self.shell_pgid);
        }
    }
}

struct SignalIgnoreGuard {
    signal: libc::c_int,
    previous: libc::sighandler_t,
}

impl SignalIgnoreGuard {
    fn ignore(signal: libc::c_int) -> io::Result<Self> {
        let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
        Ok(SignalIgnoreGuard { signal, previous })
    }
}

impl Drop for SignalIgnoreGuard {
    fn drop(&mut self) {
        unsafe {
            libc::signal(self.signal, self.previous);
        }
    }
}

fn set_terminal_foreground(fd: libc::c_int, pgid: libc::pid_t) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }
    // tcsetpgrp raises SIGTTOU in the caller if it isn't already the
    // foreground group; since we're actively changing who's foreground,
    // that delivery is expected and ignored for the duration of the call.
    let _sigttou = SignalIgnoreGuard::ignore(libc::SIGTTOU)?;
    loop {
        let rc = unsafe { libc::tcsetpgrp(fd, pgid) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// Is `fd` a terminal? Used to decide whether terminal hand-off applies at
/// all (background-only contexts, tests with piped stdin, etc.).
pub fn isatty(fd: libc::c_int) -> bool {
    unsafe { libc::isatty(fd) == 1 }
}
