//! Child-state reaper (spec §4.4) and the `SIGCHLD`-blocking discipline that
//! protects the job table (spec §5 "Critical sections").
//!
//! The actual `SIGCHLD` handler only flips an `AtomicBool` — that's the only
//! thing guaranteed async-signal-safe without a heap allocator or locks
//! (spec §9: "implementers... must emulate [masking] (e.g., by serialising
//! via a self-pipe and a single event loop)"; the atomic flag here plays the
//! same role as that self-pipe). All job-table mutation happens afterward,
//! from ordinary (non-signal) control flow, with `SIGCHLD` blocked.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace, warn};

use crate::jobs::{JobTable, ProcState};

static SIGCHLD_PENDING: AtomicBool = AtomicBool::new(false);
static SIGINT_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigchld(_sig: libc::c_int) {
    SIGCHLD_PENDING.store(true, Ordering::SeqCst);
}

extern "C" fn on_sigint(_sig: libc::c_int) {
    SIGINT_PENDING.store(true, Ordering::SeqCst);
}

/// Consume the "a SIGINT arrived since the last check" flag. Used by the
/// prompt's read loop to implement the long-jump checkpoint's semantics
/// without an actual non-local jump (spec §9).
pub fn take_sigint() -> bool {
    SIGINT_PENDING.swap(false, Ordering::SeqCst)
}

/// Install the shell's signal disposition (spec §4.8, §6 "Signals"):
/// `SIGCHLD`/`SIGINT` get handlers, `SIGTSTP`/`SIGTTIN`/`SIGTTOU` are
/// ignored at shell level (children reset them to default before exec).
pub fn install_handlers() -> io::Result<()> {
    unsafe {
        // SIGCHLD: SA_RESTART, since nothing here ever blocks waiting on
        // SIGCHLD specifically to interrupt a syscall — reap_all is always
        // reached by polling, not by relying on EINTR.
        install(libc::SIGCHLD, on_sigchld as usize, libc::SA_RESTART)?;
        // SIGINT: no SA_RESTART. The prompt's blocking read must actually
        // return EINTR so the read loop can discard the in-progress line
        // and reprompt (spec §4.8's "long-jump checkpoint") — SA_RESTART
        // would have the kernel silently resume the read and make Ctrl-C at
        // the prompt do nothing until Enter is pressed.
        install(libc::SIGINT, on_sigint as usize, 0)?;
        ignore(libc::SIGTSTP)?;
        ignore(libc::SIGTTIN)?;
        ignore(libc::SIGTTOU)?;
    }
    Ok(())
}

unsafe fn install(signal: libc::c_int, handler: usize, flags: libc::c_int) -> io::Result<()> {
    let mut action: libc::sigaction = std::mem::zeroed();
    action.sa_sigaction = handler;
    libc::sigemptyset(&mut action.sa_mask);
    action.sa_flags = flags;
    if unsafe { libc::sigaction(signal, &action, std::ptr::null_mut()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

unsafe fn ignore(signal: libc::c_int) -> io::Result<()> {
    if unsafe { libc::signal(signal, libc::SIG_IGN) } == libc::SIG_ERR {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// RAII guard: blocks `SIGCHLD` on construction, restores the previous mask
/// on drop. Every main-thread read or mutation of the job table is wrapped
/// in one of these (spec §5 "Critical sections").
pub struct BlockedSigchld {
    previous: libc::sigset_t,
}

impl BlockedSigchld {
    pub fn new() -> Self {
        unsafe {
            let mut set: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, libc::SIGCHLD);
            let mut previous: libc::sigset_t = std::mem::zeroed();
            libc::sigprocmask(libc::SIG_BLOCK, &set, &mut previous);
            BlockedSigchld { previous }
        }
    }
}

impl Default for BlockedSigchld {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BlockedSigchld {
    fn drop(&mut self) {
        unsafe {
            libc::sigprocmask(libc::SIG_SETMASK, &self.previous, std::ptr::null_mut());
        }
    }
}

/// Atomically unblock `SIGCHLD` and suspend until *any* signal is delivered
/// (spec §4.5 step 2, §5 "Suspension points"). Call only while `SIGCHLD` is
/// currently blocked (i.e. inside a `BlockedSigchld` scope); the mask is
/// restored to the blocked state on return, so the caller must re-drain
/// state with `reap_all` before deciding what to do next — this is what
/// guarantees no wakeup is lost (spec §5 "Ordering guarantees").
pub fn suspend_until_signal() {
    unsafe {
        let mut current: libc::sigset_t = std::mem::zeroed();
        libc::sigprocmask(libc::SIG_SETMASK, std::ptr::null(), &mut current);
        let mut unblocked = current;
        libc::sigdelset(&mut unblocked, libc::SIGCHLD);
        libc::sigsuspend(&unblocked);
    }
}

/// Drain every available state-change notification, non-blockingly, across
/// every occupied job slot (spec §4.4). Must run with `SIGCHLD` blocked.
///
/// Classification: normal exit or killed-by-signal ⇒ FINISHED (exit code =
/// low byte of status, or `128 + signal`); continued ⇒ RUNNING; stopped ⇒
/// STOPPED; no state change available ⇒ left unchanged. After each job's
/// processes are visited, its aggregate state follows from `Job::state()`.
pub fn reap_all(table: &mut JobTable) {
    loop {
        let mut raw_status: libc::c_int = 0;
        let pid = unsafe {
            libc::waitpid(
                -1,
                &mut raw_status,
                libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED,
            )
        };

        if pid == 0 {
            // No more state changes available right now.
            break;
        }
        if pid < 0 {
            // ECHILD: no children left to wait for. Nothing pending.
            break;
        }

        apply_status(table, pid, raw_status);
    }
}

fn apply_status(table: &mut JobTable, pid: libc::pid_t, raw_status: libc::c_int) {
    for slot in table.occupied_slots() {
        let Some(job) = table.get_mut(slot) else {
            continue;
        };
        let Some(proc) = job.processes.iter_mut().find(|p| p.pid == pid) else {
            continue;
        };

        if unsafe { libc::WIFEXITED(raw_status) } {
            let code = unsafe { libc::WEXITSTATUS(raw_status) };
            proc.state = ProcState::Finished(code);
            trace!("pid {pid} exited with status {code}");
        } else if unsafe { libc::WIFSIGNALED(raw_status) } {
            let sig = unsafe { libc::WTERMSIG(raw_status) };
            proc.state = ProcState::Finished(128 + sig);
            trace!("pid {pid} killed by signal {sig}");
        } else if unsafe { libc::WIFSTOPPED(raw_status) } {
            proc.state = ProcState::Stopped;
            debug!("pid {pid} stopped");
        } else if unsafe { libc::WIFCONTINUED(raw_status) } {
            proc.state = ProcState::Running;
            debug!("pid {pid} continued");
        } else {
            warn!("pid {pid} produced an unrecognized wait status");
        }

        let state = job.state();
        trace!("job slot {slot} aggregate state is now {state:?}");
        return;
    }
}
