//! Entry point: terminal setup, the read-eval loop, and shutdown (spec
//! §4.8).

mod builtins;
mod config;
mod error;
mod eval;
mod foreground;
mod job_control;
mod jobs;
mod launcher;
mod line_source;
mod pipeline;
mod reaper;
mod redirect;
mod token;

use std::io::{self, Write};

use jobs::{JobState, JobTable};
use line_source::{LineSource, StdinLineSource};

/// Duplicate stdin onto a private, close-on-exec descriptor and use that for
/// every terminal-control call afterward, so the fd the engine calls
/// `tcsetpgrp` on is never the one a child inherits across `exec`.
fn open_terminal_fd() -> io::Result<libc::c_int> {
    let fd = unsafe { libc::dup(libc::STDIN_FILENO) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(err);
    }
    Ok(fd)
}

/// After every command, drain completed background jobs and announce them
/// (spec §4.3/§6: background completion is reported, not silent).
fn report_finished_background_jobs(table: &mut JobTable) {
    let _blocked = reaper::BlockedSigchld::new();
    reaper::reap_all(table);
    for slot in table.background_slots() {
        let job = table.get(slot).unwrap();
        if job.state() == JobState::Finished {
            println!("{}", job.describe(slot));
            table.del_job(slot);
        }
    }
}

/// Resume every stopped job, `SIGTERM` every occupied slot, and wait until
/// each reports FINISHED before returning. This resolves the Open Question
/// about relying on one `wait()` for an unbounded set of outstanding children
/// (see SPEC_FULL.md) by looping `reap_all` explicitly instead of assuming a
/// single signal delivery accounts for everything.
fn shutdown(table: &mut JobTable) {
    let _blocked = reaper::BlockedSigchld::new();
    for slot in table.occupied_slots() {
        let job = table.get(slot).unwrap();
        let pgid = job.pgid;
        if job.state() == JobState::Stopped {
            let _ = job_control::send_to_group(pgid, libc::SIGCONT);
        }
        let _ = job_control::send_to_group(pgid, libc::SIGTERM);
    }

    while !table.occupied_slots().is_empty() {
        reaper::reap_all(table);
        for slot in table.occupied_slots() {
            if table.get(slot).unwrap().state() == JobState::Finished {
                table.del_job(slot);
            }
        }
        if !table.occupied_slots().is_empty() {
            reaper::suspend_until_signal();
        }
    }
}

fn main() {
    env_logger::init();

    let tty_fd = match open_terminal_fd() {
        Ok(fd) => fd,
        Err(e) => {
            eprintln!("jsh: failed to open terminal descriptor: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = reaper::install_handlers() {
        eprintln!("jsh: failed to install signal handlers: {e}");
        std::process::exit(1);
    }

    if job_control::isatty(tty_fd) {
        let shell_pgid = unsafe { libc::getpgrp() };
        if let Err(e) = job_control::set_process_group(0, shell_pgid) {
            log::warn!("failed to confirm shell's own process group: {e}");
        }
    }

    let mut table = JobTable::new();
    let mut source = StdinLineSource::new();
    let mut last_exit_code: i32 = 0;

    loop {
        print!("{}", config::PROMPT);
        if io::stdout().flush().is_err() {
            break;
        }

        if reaper::take_sigint() {
            println!();
            continue;
        }

        match source.read_line() {
            Ok(None) => break,
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match eval::evaluate(&line, &mut table, tty_fd) {
                    eval::Outcome::Continue(code) => last_exit_code = code,
                    eval::Outcome::Exit(code) => {
                        last_exit_code = code;
                        break;
                    }
                }
                report_finished_background_jobs(&mut table);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                reaper::take_sigint();
                println!();
                continue;
            }
            Err(e) => {
                eprintln!("jsh: error reading input: {e}");
                break;
            }
        }
    }

    shutdown(&mut table);
    unsafe {
        libc::close(tty_fd);
    }
    std::process::exit(last_exit_code);
}
